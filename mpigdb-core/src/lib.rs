//! mpigdb のコア機能
//!
//! このクレートは、複数のMPIランク（デバッガのinferior）をまとめて操作する
//! コマンド群を提供します。ターゲット指定のパース、ホストデバッガとの
//! インターフェース、各コマンド（mpip / mpib / mpic / mpict）の実装を含みます。

pub mod breakpoint;
pub mod command;
pub mod errors;
pub mod host;
pub mod print;
pub mod resume;
pub mod targets;

pub use breakpoint::{split_condition, BreakCommand, BreakSpec, TargetPolarity};
pub use command::{CommandRegistry, MpiCommand};
pub use errors::TargetParseError;
pub use host::{with_inferior_focus, Host, InferiorId, ThreadInfo, ThreadNum, ThreadState};
pub use print::{PrintCommand, RankValue};
pub use resume::{ContinueAllCommand, ContinueThreadCommand};
pub use targets::{parse_targets, TargetList};

#[cfg(test)]
pub(crate) mod fake;

/// コアの結果型
pub type Result<T> = anyhow::Result<T>;
