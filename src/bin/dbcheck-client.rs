// dbcheck-client - asks a running dbcheck daemon whether the database is up

use anyhow::Context;
use clap::Parser;
use dbcheck::cli::output;
use dbcheck::client;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dbcheck-client")]
#[command(version, about = "Send one health check to a dbcheck daemon", long_about = None)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:10888")]
    addr: String,

    /// Health-check token to send
    #[arg(short, long, default_value = "8675309")]
    token: String,

    /// Reply that counts as healthy
    #[arg(long, default_value = "SERVER_UP")]
    up_token: String,

    /// Read timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!("Server on {}", args.addr);

    let reply = client::check(
        args.addr.as_str(),
        &args.token,
        Some(Duration::from_millis(args.timeout_ms)),
    )
    .with_context(|| format!("health check against {} failed", args.addr))?;

    output::print_reply(&reply, &args.up_token);
    if reply != args.up_token {
        std::process::exit(1);
    }
    Ok(())
}
