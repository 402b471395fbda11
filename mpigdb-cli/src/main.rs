//! mpigdb - MPIプログラムの全ランクを1つの gdb でデバッグする
//!
//! mpiexec で各ランクに gdbserver を起動し、全ランクを inferior として
//! 接続した gdb を MI で操作する REPL を提供します。

use anyhow::{Context, Result};
use mpigdb_cli::{ControlServer, Endpoint, LaunchArgs, Repl, SessionScript};
use mpigdb_mi::{GdbMi, MiConfig, MiHost};
use std::process::{Command, Stdio};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const HELPMSG: &str = include_str!("../../README.md");

fn main() -> Result<()> {
    let args = LaunchArgs::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", HELPMSG);
        return Ok(());
    }
    init_tracing(args.verbose);
    debug!("{:?}", args);

    let control = Endpoint::new(local_hostname()?, args.base_port);
    let mpiexec_args = args.mpiexec_args(&control.to_string());
    debug!("mpiexec args: {:?}", mpiexec_args);

    if args.dry_run {
        print_dry_run(&args, &mpiexec_args)?;
        return Ok(());
    }

    let server = ControlServer::bind((control.host.as_str(), control.port))
        .with_context(|| format!("failed to listen on {}", control))?;

    let mut mpiexec = Command::new(&args.mpiexec)
        .args(&mpiexec_args)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to start {}", args.mpiexec))?;

    let collected = server.collect(args.total_procs(), || match mpiexec.try_wait()? {
        Some(status) => anyhow::bail!("mpiexec exited ({}) before all ranks reported", status),
        None => Ok(()),
    });
    let endpoints = match collected {
        Ok(endpoints) => endpoints,
        Err(e) => {
            let _ = mpiexec.kill();
            return Err(e);
        }
    };
    info!("ranks: {:?}", endpoints);

    let config = MiConfig {
        gdb_path: args.gdb.clone(),
        args: args.dbg_args.clone(),
        timeout: args.timeout,
    };
    let gdb = GdbMi::spawn(&config).with_context(|| format!("failed to start {}", args.gdb))?;
    let mut host = MiHost::new(gdb);

    SessionScript::new(&endpoints)
        .run(&mut host)
        .context("failed to connect gdb to the ranks")?;
    println!("Connected to {} ranks", endpoints.len());

    let mut repl = Repl::new(host);
    let result = repl.run();

    // gdb を終了させると各 gdbserver も終了する
    drop(repl);
    let status = mpiexec.wait()?;
    info!("mpiexec exited: {}", status);

    result
}

/// ロガーを初期化する（RUST_LOG が優先）
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn local_hostname() -> Result<String> {
    nix::unistd::gethostname()?
        .into_string()
        .map_err(|h| anyhow::anyhow!("hostname {:?} is not valid UTF-8", h))
}

/// 実行せずに mpiexec のコマンドラインとセッションスクリプトを表示する
fn print_dry_run(args: &LaunchArgs, mpiexec_args: &[String]) -> Result<()> {
    let command_line = std::iter::once(args.mpiexec.as_str())
        .chain(mpiexec_args.iter().map(String::as_str));
    println!("{}", shlex::try_join(command_line)?);
    println!();

    let endpoints: Vec<Endpoint> = (0..args.total_procs())
        .map(|rank| Endpoint::new(format!("<rank{}-host>", rank), args.rank_port(rank)))
        .collect();
    print!("{}", SessionScript::new(&endpoints));
    Ok(())
}
