//! Points CLI - query a running `pointsd`

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "points-cli")]
#[command(about = "Points economy query tool", version)]
struct Cli {
    /// API endpoint
    #[arg(short, long, default_value = "http://localhost:8080")]
    api: String,

    /// Bearer token of the calling account
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Node health
    Health,

    /// The caller's account and referral stats
    Me,

    /// Start a mining cycle
    Mine {
        /// Device fingerprint hash
        fingerprint: String,
    },

    /// Current mining cycle state
    Status,

    /// Open tasks
    Tasks,

    /// Active marketplace items
    Catalog,

    /// Recent audit entries (admin only)
    Audit {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let (method, path, body) = match cli.command {
        Commands::Health => (reqwest::Method::GET, "/health".to_string(), None),
        Commands::Me => (reqwest::Method::GET, "/accounts/me".to_string(), None),
        Commands::Mine { fingerprint } => (
            reqwest::Method::POST,
            "/mining/start".to_string(),
            Some(json!({ "fingerprint_hash": fingerprint })),
        ),
        Commands::Status => (reqwest::Method::GET, "/mining/status".to_string(), None),
        Commands::Tasks => (reqwest::Method::GET, "/tasks".to_string(), None),
        Commands::Catalog => (reqwest::Method::GET, "/marketplace/catalog".to_string(), None),
        Commands::Audit { limit } => (
            reqwest::Method::GET,
            format!("/admin/audit?limit={}", limit),
            None,
        ),
    };

    let mut request = client.request(method, format!("{}{}", cli.api, path));
    if let Some(token) = &cli.token {
        request = request.bearer_auth(token);
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let value: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    } else {
        eprintln!(
            "Error {}: {}",
            status.as_u16(),
            value["message"].as_str().unwrap_or("request failed")
        );
        std::process::exit(1);
    }
}
