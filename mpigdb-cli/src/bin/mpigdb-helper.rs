//! mpigdb-helper - 各ランクで gdbserver を起動するヘルパー
//!
//! mpigdb の制御ポートに自分の gdbserver の接続先を知らせてから、
//! gdbserver に置き換わります。

use anyhow::{Context, Result};
use clap::Parser;
use mpigdb_cli::Endpoint;
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::os::unix::process::CommandExt;
use std::process::Command;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// mpigdb-helper - report this rank's gdbserver to mpigdb and start it
#[derive(Parser)]
#[command(name = "mpigdb-helper")]
#[command(version = "0.1.0")]
#[command(about = "Per-rank helper started by mpigdb under mpiexec", long_about = None)]
struct Cli {
    /// Control address of the mpigdb launcher (host:port)
    control: String,

    /// Port gdbserver listens on
    port: u16,

    /// Verbose logging (0 or 1)
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    verbose: u8,

    /// Path to gdbserver
    gdbserver: String,

    /// Program to debug and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    program: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose == 1 { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let host = nix::unistd::gethostname()?
        .into_string()
        .map_err(|h| anyhow::anyhow!("hostname {:?} is not valid UTF-8", h))?;
    let endpoint = Endpoint::new(host, cli.port);

    // 接続先を知らせる
    {
        debug!("reporting {} to {}", endpoint, cli.control);
        let mut control = TcpStream::connect(&cli.control)
            .with_context(|| format!("failed to connect to mpigdb at {}", cli.control))?;
        control.write_all(endpoint.message().as_bytes())?;
        control.shutdown(Shutdown::Both)?;
    }

    debug!("exec {} --once {} {:?}", cli.gdbserver, endpoint, cli.program);
    let err = Command::new(&cli.gdbserver)
        .arg("--once")
        .arg(endpoint.to_string())
        .args(&cli.program)
        .exec();

    Err(anyhow::Error::new(err).context(format!("failed to exec {}", cli.gdbserver)))
}
