use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ballot_engine::keys::{DEFAULT_ELGAMAL_BITS, DEFAULT_RSA_BITS};
use ballot_engine::server::{bootstrap, tally_router};

/// Tallying server: ballot encryption helper, submission, tally and
/// per-ballot verification.
#[derive(Parser)]
#[command(name = "tally_server")]
struct Args {
    #[arg(long, default_value_t = 5002, env = "TALLY_PORT")]
    port: u16,
    #[arg(long, default_value = "data", env = "BALLOT_DATA_DIR")]
    data_dir: PathBuf,
    #[arg(long, default_value_t = DEFAULT_ELGAMAL_BITS)]
    elgamal_bits: usize,
    #[arg(long, default_value_t = DEFAULT_RSA_BITS)]
    rsa_bits: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let state = bootstrap::initialize(&args.data_dir, args.elgamal_bits, args.rsa_bits)?;
    let app = tally_router(Arc::new(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "tally server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
