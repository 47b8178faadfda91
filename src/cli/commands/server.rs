use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::client::ApiClient;
use crate::cli::config::{load_environment_config, save_environment_config};
use crate::cli::utils::{output_reply, output_success, str_field};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Point the CLI at a server (persistent selection)")]
    Use {
        #[arg(help = "Server base URL, e.g. http://localhost:3000")]
        url: String,
    },

    #[command(about = "Check server health from the /health endpoint")]
    Health,

    #[command(about = "Show server information from the API root endpoint")]
    Info,
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Use { url } => use_server(&url, &output_format),
        ServerCommands::Health => {
            let client = ApiClient::from_config(&load_environment_config()?)?;
            let reply = client.get("/health").await?;
            output_reply(&output_format, reply, |data| {
                println!(
                    "{}: {} ({} backend, {})",
                    client.base_url(),
                    str_field(data, "status"),
                    str_field(data, "backend"),
                    str_field(data, "timestamp")
                );
                Ok(())
            })
        }
        ServerCommands::Info => {
            let client = ApiClient::from_config(&load_environment_config()?)?;
            let reply = client.get("/").await?;
            output_reply(&output_format, reply, |data| {
                println!("{} v{}", str_field(data, "name"), str_field(data, "version"));
                println!("{}", str_field(data, "description"));
                if let Some(Value::Object(endpoints)) = data.get("endpoints") {
                    println!();
                    for (name, route) in endpoints {
                        println!("  {:<12} {}", name, route.as_str().unwrap_or_default());
                    }
                }
                Ok(())
            })
        }
    }
}

fn use_server(url: &str, output_format: &OutputFormat) -> anyhow::Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", url, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Server URL must use http or https");
    }
    let server_url = url.trim_end_matches('/').to_string();

    let mut config = load_environment_config()?;
    if config.server_url.as_deref() != Some(server_url.as_str()) {
        // A token from another server is meaningless here
        config.clear_session();
    }
    config.server_url = Some(server_url.clone());
    save_environment_config(&config)?;

    tracing::debug!("Selected server {}", server_url);
    output_success(
        output_format,
        &format!("Using server {}", server_url),
        Some(json!({ "server_url": server_url })),
    )
}
