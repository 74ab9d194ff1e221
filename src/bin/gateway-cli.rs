use std::io::Write;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Talk to a running auth-gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "GATEWAY_URL", default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "GATEWAY_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// List upstream models
    Models,
    /// Embed one or more inputs
    Embed {
        #[arg(required = true)]
        input: Vec<String>,
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Send a single-turn chat completion
    Chat {
        message: String,
        #[arg(short, long)]
        model: Option<String>,
        /// Print chunks as they arrive
        #[arg(short, long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    match cli.command {
        Commands::Health => {
            let res = client
                .get(format!("{}/healthz", base))
                .headers(headers)
                .send()
                .await?;
            println!("{} {}", res.status(), res.text().await?);
        }
        Commands::Models => {
            let res = client
                .get(format!("{}/v1/models", base))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Embed { input, model } => {
            let mut body = json!({ "input": input });
            if let Some(model) = model {
                body["model"] = Value::String(model);
            }
            let res = client
                .post(format!("{}/v1/embeddings", base))
                .headers(headers)
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Chat { message, model, stream } => {
            let mut body = json!({
                "messages": [{ "role": "user", "content": message }],
                "stream": stream,
            });
            if let Some(model) = model {
                body["model"] = Value::String(model);
            }
            let res = client
                .post(format!("{}/v1/chat/completions", base))
                .headers(headers)
                .json(&body)
                .send()
                .await?;

            if stream && res.status().is_success() {
                let mut chunks = res.bytes_stream();
                let mut stdout = std::io::stdout();
                while let Some(chunk) = chunks.next().await {
                    stdout.write_all(&chunk?)?;
                    stdout.flush()?;
                }
            } else {
                print_response(res).await?;
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {} (request {})", status, request_id);
        eprintln!("Response: {}", text);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
