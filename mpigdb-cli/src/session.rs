//! gdb から全ランクへ接続するためのセッションスクリプト

use crate::control::Endpoint;
use crate::Result;
use mpigdb_core::Host;
use std::fmt;
use tracing::{debug, info};

/// gdb の初期設定
const PREAMBLE: &[&str] = &[
    "set pagination off",
    "set non-stop on",
    "set sysroot /",
    "set exec-file-mismatch off",
    "set confirm off",
];

/// 各ランクの gdbserver に接続するコマンド列
///
/// ランク r は inferior r+1 になります。最後に inferior 1 を選択し直します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionScript {
    commands: Vec<String>,
}

impl SessionScript {
    pub fn new(endpoints: &[Endpoint]) -> Self {
        let mut commands: Vec<String> = PREAMBLE.iter().map(|s| s.to_string()).collect();

        for (rank, endpoint) in endpoints.iter().enumerate() {
            let inferior = rank + 1;
            if rank > 0 {
                commands.push("add-inferior -no-connection".to_string());
                commands.push(format!("inferior {}", inferior));
            }
            commands.push(format!("target extended-remote {}", endpoint));
        }
        if endpoints.len() > 1 {
            commands.push("inferior 1".to_string());
        }

        Self { commands }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// 全コマンドを順に実行する
    pub fn run(&self, host: &mut dyn Host) -> Result<()> {
        for command in &self.commands {
            debug!("session: {}", command);
            let output = host.execute(command)?;
            if !output.trim().is_empty() {
                info!("{}", output.trim_end());
            }
        }
        Ok(())
    }
}

impl fmt::Display for SessionScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for command in &self.commands {
            writeln!(f, "{}", command)?;
        }
        Ok(())
    }
}
