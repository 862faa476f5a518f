use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::json;
use std::io::Read;

#[derive(Parser)]
#[command(name = "spam-api-cli")]
#[command(about = "Spam Detection API CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "SPAM_API_ENDPOINT", default_value = "http://localhost:5000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a message (reads stdin when TEXT is omitted)
    Predict {
        #[arg(value_name = "TEXT")]
        text: Option<String>,
    },

    /// Check that the service is running
    Status,

    /// Show service health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let endpoint = cli.endpoint.trim_end_matches('/');

    match cli.command {
        Commands::Predict { text } => {
            let message = match text {
                Some(text) => text,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer.trim_end_matches(['\r', '\n']).to_string()
                }
            };

            let response = client
                .post(format!("{}/predict", endpoint))
                .json(&json!({ "message": message }))
                .send()
                .await?;

            let status = response.status();
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);

            if !status.is_success() {
                anyhow::bail!("prediction failed with status {}", status);
            }
        }

        Commands::Status => {
            let response = client.get(format!("{}/", endpoint)).send().await?;
            let status = response.status();
            let body = response.text().await?;
            println!("{}", body);

            if !status.is_success() {
                anyhow::bail!("service returned status {}", status);
            }
        }

        Commands::Health => {
            let response = client.get(format!("{}/health", endpoint)).send().await?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
