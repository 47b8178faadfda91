use std::io::{BufRead, IsTerminal, Read};

use serde_json::{json, Value};

use crate::cli::client::ApiReply;
use crate::cli::OutputFormat;
use crate::database::models::AuthorSummary;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print the raw envelope in JSON mode, or hand `data` to `text` otherwise.
pub fn output_reply<F>(output_format: &OutputFormat, reply: ApiReply, text: F) -> anyhow::Result<()>
where
    F: FnOnce(&Value) -> anyhow::Result<()>,
{
    if let OutputFormat::Json = output_format {
        if reply.is_success() {
            println!("{}", serde_json::to_string_pretty(&reply.body)?);
            return Ok(());
        }
    }
    let data = reply.into_data()?;
    text(&data)
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: [] }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

pub fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// One listing line: id, status tag, title, author.
pub fn article_line(article: &Value) -> String {
    let author = article
        .get("author")
        .and_then(|a| serde_json::from_value::<AuthorSummary>(a.clone()).ok())
        .map(|a| a.label().to_string())
        .unwrap_or_default();
    let tag = match article.get("published").and_then(Value::as_bool) {
        Some(false) => "[draft] ",
        _ => "",
    };
    format!("{}  {}{}  by {}", str_field(article, "id"), tag, str_field(article, "title"), author)
}

/// Password from the flag, `ZENN_PASSWORD`, or one line of stdin.
pub fn resolve_password(provided: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    if let Ok(password) = std::env::var("ZENN_PASSWORD") {
        return Ok(password);
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password is required (use --password, ZENN_PASSWORD or stdin)");
    }
    Ok(password)
}

/// Article body from a file, or all of stdin when no file is given.
pub fn read_content(file: Option<&std::path::Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
        None => {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            Ok(content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_line_marks_drafts_and_prefers_display_name() {
        let draft = json!({
            "id": "a1",
            "title": "Hello",
            "published": false,
            "author": { "username": "alice", "display_name": "Alice" }
        });
        assert_eq!(article_line(&draft), "a1  [draft] Hello  by Alice");

        let live = json!({
            "id": "a2",
            "title": "World",
            "published": true,
            "author": { "username": "bob", "display_name": null }
        });
        assert_eq!(article_line(&live), "a2  World  by bob");
    }
}
