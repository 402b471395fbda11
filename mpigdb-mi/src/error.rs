//! MIバックエンドのエラー型

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MiError {
    /// MI出力行のパースに失敗
    #[error("malformed MI output at column {column}: {reason} in '{line}'")]
    Parse {
        line: String,
        column: usize,
        reason: &'static str,
    },

    /// gdbが `^error` を返した
    #[error("{0}")]
    Command(String),

    /// 応答に期待したフィールドがない
    #[error("missing field '{field}' in response to '{command}'")]
    MissingField { command: String, field: &'static str },

    /// gdbの出力が閉じられた
    #[error("gdb exited")]
    Disconnected,

    /// 応答待ちがタイムアウトした
    #[error("timed out after {timeout:?} waiting for gdb to answer '{command}'")]
    Timeout { command: String, timeout: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
