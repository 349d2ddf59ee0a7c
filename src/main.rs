//! Public distribution system backend.
//!
//! ```text
//!   request ──▶ body parse ──▶ CORS ──▶ security headers ──▶ access log
//!           ──▶ rate limit (/api) ──▶ sanitize ──▶ compression
//!           ──▶ dispatch ──▶ /api/<resource> sub-router
//!                      └──▶ 404 {"status":"fail","message":"Can't find <url> on this server"}
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "pds-backend")]
#[command(about = "HTTP backend for the public distribution system", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults to ./pds.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    pds_backend::lifecycle::startup::run(cli.config.as_deref()).await?;
    Ok(())
}
