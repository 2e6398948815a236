use clap::{Parser, Subcommand};
use serde_json::Value;

use edge_gateway::auth::{Identity, TokenValidator};
use edge_gateway::config::JwtConfig;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the edge gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-service circuit breaker states
    Health,
    /// Mint a test token signed with the gateway secret
    Token {
        #[arg(long)]
        secret: String,
        #[arg(long, default_value = "dev-user")]
        user_id: String,
        #[arg(long, default_value = "developer")]
        username: String,
        #[arg(long, default_value = "dev@example.com")]
        email: String,
        #[arg(long, default_value = "admin")]
        role: String,
        #[arg(long)]
        issuer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Health => {
            let res = reqwest::get(format!("{}/health", cli.url)).await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
                if let Ok(text) = res.text().await {
                    eprintln!("Response: {}", text);
                }
                return Ok(());
            }
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Token {
            secret,
            user_id,
            username,
            email,
            role,
            issuer,
        } => {
            let validator = TokenValidator::new(&JwtConfig {
                secret_key: secret,
                issuer,
                audience: None,
                expires_in_secs: 3600,
            });
            let token = validator.issue(&Identity {
                user_id,
                username,
                email,
                role,
            })?;
            println!("{token}");
        }
    }

    Ok(())
}
