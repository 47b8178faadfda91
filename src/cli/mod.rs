pub mod client;
pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::cli::client::RemoteError;

#[derive(Parser)]
#[command(name = "zenn")]
#[command(about = "Zenn CLI - write, publish and browse Markdown articles")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output raw JSON envelopes")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Remote server selection and status")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },

    #[command(about = "Sign up, sign in and session management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Browse, write and publish articles")]
    Article {
        #[command(subcommand)]
        cmd: commands::article::ArticleCommands,
    },

    #[command(about = "Public profiles and your own profile")]
    Profile {
        #[command(subcommand)]
        cmd: commands::profile::ProfileCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json && !cli.text {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let result = match cli.command {
        Commands::Server { cmd } => commands::server::handle(cmd, output_format.clone()).await,
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format.clone()).await,
        Commands::Article { cmd } => commands::article::handle(cmd, output_format.clone()).await,
        Commands::Profile { cmd } => commands::profile::handle(cmd, output_format.clone()).await,
    };

    // JSON mode shows failures exactly as the server sent them
    if let (Err(e), OutputFormat::Json) = (&result, &output_format) {
        match e.downcast_ref::<RemoteError>() {
            Some(remote) => println!("{}", serde_json::to_string_pretty(&remote.envelope)?),
            None => utils::output_error(&output_format, &e.to_string(), None)?,
        }
    }
    result
}
