//! mpigdb の GDB/MI バックエンド
//!
//! このクレートは、`gdb --interpreter=mi` を子プロセスとして起動し、
//! MI出力レコードのパース、トークンによる応答の対応付け、
//! コアの `Host` トレイトの実装を提供します。

pub mod client;
pub mod error;
pub mod event;
pub mod host;
pub mod record;

pub use client::{GdbMi, MiConfig, MiResponse};
pub use error::MiError;
pub use event::describe_event;
pub use host::MiHost;
pub use record::{parse_record, AsyncKind, Record, ResultClass, Results, StreamKind, Value};

/// MIバックエンドの結果型
pub type Result<T> = anyhow::Result<T>;
