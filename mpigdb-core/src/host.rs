//! ホストデバッガとのインターフェース
//!
//! コマンドはホストの具体的な型を知らず、このトレイトが提供する
//! 操作（inferior列挙、スレッド列挙、コマンド実行、式評価）だけを使います。

use crate::Result;
use tracing::warn;

/// inferior番号（ランク）
pub type InferiorId = u32;

/// inferior内のスレッド番号
pub type ThreadNum = u32;

/// スレッドの実行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Stopped,
    Running,
}

/// スレッド情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    /// inferior内のスレッド番号（`thread I.T` の T）
    pub num: ThreadNum,
    pub state: ThreadState,
}

impl ThreadInfo {
    pub fn new(num: ThreadNum, state: ThreadState) -> Self {
        Self { num, state }
    }

    pub fn is_stopped(&self) -> bool {
        self.state == ThreadState::Stopped
    }
}

/// ホストデバッガ
///
/// 「現在選択されているinferior」はホスト側の単一のグローバル状態です。
/// 特定のinferiorを操作するコマンドは `execute("inferior N")` でそれを切り替えます。
pub trait Host {
    /// inferior番号をホストの列挙順で返す
    fn inferiors(&mut self) -> Result<Vec<InferiorId>>;

    /// 指定inferiorのスレッドを返す
    fn threads(&mut self, inferior: InferiorId) -> Result<Vec<ThreadInfo>>;

    /// 現在選択されているinferior番号
    fn selected_inferior(&mut self) -> Result<InferiorId>;

    /// CLIコマンドを同期的に実行し、コンソール出力を返す
    fn execute(&mut self, command: &str) -> Result<String>;

    /// 現在のコンテキストで式を評価し、文字列化した値を返す
    fn evaluate(&mut self, expr: &str) -> Result<String>;
}

/// inferiorを選択する
pub fn select_inferior(host: &mut dyn Host, inferior: InferiorId) -> Result<()> {
    host.execute(&format!("inferior {}", inferior))?;
    Ok(())
}

/// 選択中のinferiorを保存して `f` を実行し、終了後に必ず元へ戻す
///
/// `f` が失敗した場合もフォーカスは復元され、`f` のエラーが返ります。
pub fn with_inferior_focus<T>(
    host: &mut dyn Host,
    f: impl FnOnce(&mut dyn Host) -> Result<T>,
) -> Result<T> {
    let saved = host.selected_inferior()?;
    let result = f(&mut *host);
    let restored = select_inferior(host, saved);

    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            warn!("failed to restore inferior {}: {:#}", saved, restore_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeHost;

    #[test]
    fn test_focus_restored_after_success() {
        let mut host = FakeHost::new().with_inferior(1, &[]).with_inferior(2, &[]);
        let value = with_inferior_focus(&mut host, |h| {
            select_inferior(h, 2)?;
            h.selected_inferior()
        })
        .unwrap();
        assert_eq!(value, 2);
        assert_eq!(host.selected, 1);
    }

    #[test]
    fn test_focus_restored_after_failure() {
        let mut host = FakeHost::new().with_inferior(1, &[]).with_inferior(2, &[]);
        let result: Result<()> = with_inferior_focus(&mut host, |h| {
            select_inferior(h, 2)?;
            Err(anyhow::anyhow!("boom"))
        });
        assert!(result.is_err());
        assert_eq!(host.selected, 1);
        assert_eq!(host.executed, vec!["inferior 2", "inferior 1"]);
    }
}
