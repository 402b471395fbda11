//! テスト用のインメモリホスト

use crate::host::{Host, InferiorId, ThreadInfo, ThreadState};
use crate::Result;
use std::collections::HashMap;

/// 実行されたコマンドを記録し、フォーカスを追跡するホスト
pub struct FakeHost {
    pub inferiors: Vec<(InferiorId, Vec<ThreadInfo>)>,
    pub selected: InferiorId,
    pub selected_thread: Option<u32>,
    pub executed: Vec<String>,
    /// inferiorごとの式の値
    pub values: HashMap<(InferiorId, String), String>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            inferiors: Vec::new(),
            selected: 1,
            selected_thread: None,
            executed: Vec::new(),
            values: HashMap::new(),
        }
    }

    pub fn with_inferior(mut self, num: InferiorId, threads: &[(u32, ThreadState)]) -> Self {
        let threads = threads
            .iter()
            .map(|&(n, state)| ThreadInfo::new(n, state))
            .collect();
        self.inferiors.push((num, threads));
        self
    }

    pub fn with_value(mut self, inferior: InferiorId, expr: &str, value: &str) -> Self {
        self.values
            .insert((inferior, expr.to_string()), value.to_string());
        self
    }

    pub fn selecting(mut self, inferior: InferiorId) -> Self {
        self.selected = inferior;
        self
    }

    fn has_inferior(&self, num: InferiorId) -> bool {
        self.inferiors.iter().any(|(n, _)| *n == num)
    }
}

impl Host for FakeHost {
    fn inferiors(&mut self) -> Result<Vec<InferiorId>> {
        Ok(self.inferiors.iter().map(|(n, _)| *n).collect())
    }

    fn threads(&mut self, inferior: InferiorId) -> Result<Vec<ThreadInfo>> {
        self.inferiors
            .iter()
            .find(|(n, _)| *n == inferior)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| anyhow::anyhow!("No inferior number '{}'", inferior))
    }

    fn selected_inferior(&mut self) -> Result<InferiorId> {
        Ok(self.selected)
    }

    fn execute(&mut self, command: &str) -> Result<String> {
        self.executed.push(command.to_string());
        let words: Vec<&str> = command.split_whitespace().collect();
        match words.as_slice() {
            ["inferior", n] => {
                let n: InferiorId = n.parse()?;
                if !self.has_inferior(n) {
                    return Err(anyhow::anyhow!("Inferior ID {} not known.", n));
                }
                self.selected = n;
                self.selected_thread = None;
            }
            ["thread", id] => {
                let (inf, thr) = id
                    .split_once('.')
                    .ok_or_else(|| anyhow::anyhow!("Invalid thread ID: {}", id))?;
                self.selected = inf.parse()?;
                self.selected_thread = Some(thr.parse()?);
            }
            _ => {}
        }
        Ok(format!("ok: {}\n", command))
    }

    fn evaluate(&mut self, expr: &str) -> Result<String> {
        self.values
            .get(&(self.selected, expr.to_string()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No symbol \"{}\" in current context.", expr))
    }
}
