use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "workspace-cli")]
#[command(about = "Client for a running workspace server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:4000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show workspace info and project list
    Projects,
    /// List the handlers of a project
    Handlers {
        project: String,
    },
    /// Invoke a handler
    Call {
        project: String,
        handler: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Request body, sent as JSON
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Projects => {
            let res = client.get(format!("{}/", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Handlers { project } => {
            let res = client.get(format!("{}/{}/api", base, project)).send().await?;
            print_response(res).await?;
        }
        Commands::Call { project, handler, method, data } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut req = client.request(method, format!("{}/{}/api/{}", base, project, handler));
            if let Some(data) = data {
                req = req.header(CONTENT_TYPE, "application/json").body(data);
            }
            print_response(req.send().await?).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    }

    let text = res.text().await?;
    if text.is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
