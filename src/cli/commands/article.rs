use std::path::PathBuf;

use clap::{ArgGroup, Subcommand};
use serde_json::{json, Value};

use crate::cli::client::ApiClient;
use crate::cli::config::load_environment_config;
use crate::cli::utils::{article_line, output_empty_collection, output_reply, read_content, str_field};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ArticleCommands {
    #[command(about = "List published articles, newest first")]
    List {
        #[arg(long, help = "Maximum number of articles")]
        limit: Option<i32>,
    },

    #[command(about = "List your own articles, drafts included")]
    Dashboard,

    #[command(about = "Show one article")]
    Show {
        #[arg(help = "Article id")]
        id: String,
        #[arg(long, help = "Print rendered HTML instead of Markdown")]
        html: bool,
    },

    #[command(about = "Write a new article (Markdown from --file or stdin)")]
    New {
        #[arg(long, help = "Article title")]
        title: String,
        #[arg(long, help = "Markdown file (stdin when omitted)")]
        file: Option<PathBuf>,
        #[arg(long, help = "Publish immediately instead of saving a draft")]
        publish: bool,
    },

    #[command(about = "Edit one of your articles")]
    #[command(group(ArgGroup::new("state").args(["publish", "draft"])))]
    Edit {
        #[arg(help = "Article id")]
        id: String,
        #[arg(long, help = "New title")]
        title: Option<String>,
        #[arg(long, help = "Markdown file with the new content")]
        file: Option<PathBuf>,
        #[arg(long, help = "Publish the article")]
        publish: bool,
        #[arg(long, help = "Turn the article back into a draft")]
        draft: bool,
    },
}

pub async fn handle(cmd: ArticleCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = ApiClient::from_config(&load_environment_config()?)?;

    match cmd {
        ArticleCommands::List { limit } => {
            let path = match limit {
                Some(limit) => format!("/api/articles?limit={}", limit),
                None => "/api/articles".to_string(),
            };
            let reply = client.get(&path).await?;
            output_reply(&output_format, reply, |data| {
                print_listing(&output_format, data, "articles", "No articles published yet")
            })
        }
        ArticleCommands::Dashboard => {
            let reply = client.get("/api/dashboard").await?;
            output_reply(&output_format, reply, |data| {
                print_listing(&output_format, data, "articles", "You have not written any articles yet")
            })
        }
        ArticleCommands::Show { id, html } => {
            let reply = client.get(&format!("/api/articles/{}", id)).await?;
            output_reply(&output_format, reply, |data| {
                let author = data.get("author").cloned().unwrap_or(Value::Null);
                println!("# {}", str_field(data, "title"));
                println!(
                    "by {} (@{}) · {}",
                    author.get("display_name").and_then(Value::as_str).unwrap_or(str_field(&author, "username")),
                    str_field(&author, "username"),
                    str_field(data, "created_at")
                );
                if data.get("published").and_then(Value::as_bool) == Some(false) {
                    println!("[draft]");
                }
                println!();
                if html {
                    println!("{}", str_field(data, "content_html"));
                } else {
                    println!("{}", str_field(data, "content"));
                }
                Ok(())
            })
        }
        ArticleCommands::New { title, file, publish } => {
            let content = read_content(file.as_deref())?;
            let body = json!({ "title": title, "content": content, "published": publish });
            let reply = client.post("/api/articles", &body).await?;
            output_reply(&output_format, reply, |data| {
                let verb = if publish { "Published" } else { "Saved draft" };
                println!("✓ {} {}", verb, str_field(data, "id"));
                println!("→ /dashboard");
                Ok(())
            })
        }
        ArticleCommands::Edit {
            id,
            title,
            file,
            publish,
            draft,
        } => {
            // Start from the editor's current values so omitted flags keep them
            let current = client.get(&format!("/api/articles/{}/edit", id)).await?.into_data()?;

            let content = match file {
                Some(path) => read_content(Some(path.as_path()))?,
                None => str_field(&current, "content").to_string(),
            };
            let published = match (publish, draft) {
                (true, _) => true,
                (_, true) => false,
                _ => current.get("published").and_then(Value::as_bool).unwrap_or(false),
            };
            let body = json!({
                "title": title.unwrap_or_else(|| str_field(&current, "title").to_string()),
                "content": content,
                "published": published,
            });

            let reply = client.put(&format!("/api/articles/{}", id), &body).await?;
            output_reply(&output_format, reply, |data| {
                println!("✓ Updated {} ({})", str_field(data, "id"), str_field(data, "updated_at"));
                Ok(())
            })
        }
    }
}

fn print_listing(output_format: &OutputFormat, data: &Value, collection: &str, empty: &str) -> anyhow::Result<()> {
    let articles = data.as_array().cloned().unwrap_or_default();
    if articles.is_empty() {
        return output_empty_collection(output_format, collection, empty);
    }
    for article in &articles {
        println!("{}", article_line(article));
    }
    Ok(())
}
