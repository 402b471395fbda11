//! mpigdb ランチャーと REPL
//!
//! `mpiexec` の下で各ランクに `gdbserver` を起動し、1つの gdb から
//! 全ランクに接続して対話的にデバッグするための部品です。

pub mod control;
pub mod launch;
pub mod repl;
pub mod session;

pub use control::{ControlServer, Endpoint};
pub use launch::{LaunchArgs, LaunchError, ProcGroup};
pub use repl::Repl;
pub use session::SessionScript;

/// CLIの結果型
pub type Result<T> = anyhow::Result<T>;
