mod cmd;
mod io;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// dealcrypt — two-party shared secrets for deal content.
///
/// A random 32-byte secret is split 2-of-2 with Shamir sharing over
/// GF(2^8): the client share stays in the local store, the server share is
/// handed to the counterpart. Recovery recombines both and checks the
/// secret against its SHA3-256 hash.
///
/// Crypto: AES-256-CBC/PKCS7 (fixed IV) + PBKDF2-HMAC-SHA256 + SHA3-256.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding stored client shares
    #[arg(long, global = true, env = "DEALCRYPT_STORE", default_value = ".dealcrypt")]
    store: PathBuf,

    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: cmd::Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    cmd::run(cli.command, cli.store)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
