use clap::Subcommand;
use serde_json::Value;

use crate::cli::client::ApiClient;
use crate::cli::config::load_environment_config;
use crate::cli::utils::{article_line, output_reply, str_field};
use crate::cli::OutputFormat;
use crate::database::models::ProfilePatch;

#[derive(Subcommand)]
pub enum ProfileCommands {
    #[command(about = "Show a public profile and its published articles")]
    Show {
        #[arg(help = "Username")]
        username: String,
    },

    #[command(about = "Update your display name, bio or avatar (empty string clears)")]
    Update {
        #[arg(long, help = "Display name")]
        display_name: Option<String>,
        #[arg(long, help = "Short bio")]
        bio: Option<String>,
        #[arg(long, help = "Avatar image URL (http or https)")]
        avatar_url: Option<String>,
    },
}

pub async fn handle(cmd: ProfileCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = ApiClient::from_config(&load_environment_config()?)?;

    match cmd {
        ProfileCommands::Show { username } => {
            let reply = client.get(&format!("/api/profiles/{}", username)).await?;
            output_reply(&output_format, reply, |data| {
                let profile = data.get("profile").cloned().unwrap_or(Value::Null);
                print_profile(&profile);

                let articles = data.get("articles").and_then(Value::as_array).cloned().unwrap_or_default();
                println!();
                if articles.is_empty() {
                    println!("No published articles");
                }
                for article in &articles {
                    println!("{}", article_line(article));
                }
                Ok(())
            })
        }
        ProfileCommands::Update {
            display_name,
            bio,
            avatar_url,
        } => {
            let patch = ProfilePatch {
                display_name,
                bio,
                avatar_url,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update: pass --display-name, --bio or --avatar-url");
            }

            let reply = client.patch("/api/profile", &patch).await?;
            output_reply(&output_format, reply, |data| {
                println!("✓ Profile updated");
                print_profile(data);
                Ok(())
            })
        }
    }
}

fn print_profile(profile: &Value) {
    println!("@{}", str_field(profile, "username"));
    for key in ["display_name", "bio", "avatar_url"] {
        if let Some(value) = profile.get(key).and_then(Value::as_str) {
            println!("  {:<13} {}", format!("{}:", key), value);
        }
    }
}
