use clap::{Parser, Subcommand};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(name = "lb-cli")]
#[command(about = "Management CLI for the least-connections router", long_about = None)]
struct Cli {
    /// Admin API base URL.
    #[arg(short, long, default_value = "http://127.0.0.1:3001")]
    url: String,

    /// Bearer token, when the admin API requires one.
    #[arg(short, long, env = "LB_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check router status
    Status,
    /// List backends with health and active connections
    List,
    /// Register a backend
    Add { backend: String },
    /// Deregister a backend
    Remove { backend: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let backends_url = format!("{}/admin/backends", cli.url);
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::List => client.get(&backends_url),
        Commands::Add { backend } => client.post(&backends_url).json(&json!({ "url": backend })),
        Commands::Remove { backend } => client.delete(&backends_url).json(&json!({ "url": backend })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = serde_json::from_str::<Value>(&text)
        .map(|json| serde_json::to_string_pretty(&json).unwrap_or_else(|_| text.clone()))
        .unwrap_or_else(|_| text.clone());

    if status.is_success() {
        println!("{}", body);
        Ok(())
    } else {
        eprintln!("Error: admin API returned status {}", status);
        eprintln!("{}", body);
        std::process::exit(1);
    }
}
