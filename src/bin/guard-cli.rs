use clap::{Parser, Subcommand};
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Inspect and probe a running request guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show limiter status from the admin endpoint
    Status,
    /// Fetch a fresh CSRF token and print the cookie that carries it
    Token,
    /// Send repeated GETs and report when the limiter starts rejecting
    Probe {
        #[arg(short, long, default_value = "/public/ping")]
        path: String,

        #[arg(short, long, default_value_t = 10)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Token => {
            let res = client
                .get(format!("{}/public/csrf-token", cli.url))
                .send()
                .await?;
            if let Some(cookie) = res.headers().get(SET_COOKIE) {
                println!("Set-Cookie: {}", cookie.to_str()?);
            }
            print_response(res).await?;
        }
        Commands::Probe { path, count } => {
            let mut cookie: Option<String> = None;
            for i in 1..=count {
                let mut req = client.get(format!("{}{}", cli.url, path));
                if let Some(c) = &cookie {
                    req = req.header(COOKIE, c.as_str());
                }
                let res = req.send().await?;

                if let Some(set) = res.headers().get(SET_COOKIE).and_then(|v| v.to_str().ok()) {
                    cookie = set.split(';').next().map(str::to_string);
                }

                let remaining = res
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
                    .to_string();
                let status = res.status();
                if status.as_u16() == 429 {
                    let retry = res
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("?")
                        .to_string();
                    println!("#{i}: {status} (retry after {retry}s)");
                    print_response(res).await?;
                    break;
                }
                println!("#{i}: {status} remaining={remaining}");
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() && status.as_u16() != 429 {
        eprintln!("Error: guard returned status {}", status);
    }
    Ok(())
}
