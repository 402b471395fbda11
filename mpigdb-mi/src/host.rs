//! MI で接続された gdb をコアの `Host` として使う

use crate::client::GdbMi;
use crate::error::MiError;
use crate::record::quote;
use crate::Result;
use mpigdb_core::{Host, InferiorId, ThreadInfo, ThreadNum, ThreadState};
use std::collections::HashMap;
use tracing::{debug, warn};

/// gdb の MI 接続を使ったホスト
pub struct MiHost {
    gdb: GdbMi,
    /// グローバルスレッドID → inferior内のスレッド番号
    thread_nums: HashMap<u32, ThreadNum>,
}

/// `--thread` 付きの評価の前に保存する選択状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    inferior: InferiorId,
    /// 0 はスレッドが選択されていないことを表す
    global_thread: u32,
}

impl MiHost {
    pub fn new(gdb: GdbMi) -> Self {
        Self {
            gdb,
            thread_nums: HashMap::new(),
        }
    }

    /// 下位の MI 接続を取得する
    pub fn gdb_mut(&mut self) -> &mut GdbMi {
        &mut self.gdb
    }

    fn evaluate_with(&mut self, options: &str, expr: &str) -> Result<String> {
        let command = format!("-data-evaluate-expression {}{}", options, quote(expr));
        let response = self.gdb.command(&command)?;
        let value = response
            .results
            .get_str("value")
            .ok_or(MiError::MissingField {
                command,
                field: "value",
            })?;
        Ok(value.to_string())
    }

    /// グローバルスレッドIDからinferior内のスレッド番号を求める
    ///
    /// `$_thread` を `--thread` 指定で評価し、結果をキャッシュします。
    /// 評価できない場合は `fallback` を使います。
    fn thread_num(&mut self, global_id: u32, fallback: ThreadNum) -> ThreadNum {
        if let Some(&num) = self.thread_nums.get(&global_id) {
            return num;
        }
        let options = format!("--thread {} ", global_id);
        match self
            .evaluate_with(&options, "$_thread")
            .and_then(|v| Ok(v.trim().parse::<ThreadNum>()?))
        {
            Ok(num) => {
                self.thread_nums.insert(global_id, num);
                num
            }
            Err(e) => {
                warn!(
                    "cannot resolve thread number of global thread {}: {:#}; using {}",
                    global_id, e, fallback
                );
                fallback
            }
        }
    }

    fn current_selection(&mut self) -> Result<Selection> {
        let inferior: InferiorId = self.evaluate_with("", "$_inferior")?.trim().parse()?;
        let global_thread: u32 = self.evaluate_with("", "$_gthread")?.trim().parse()?;
        Ok(Selection {
            inferior,
            global_thread,
        })
    }

    fn restore_selection(&mut self, selection: Selection) -> Result<()> {
        if selection.global_thread != 0 {
            self.gdb.command(&format!("-thread-select {}", selection.global_thread))?;
        } else {
            self.gdb.console(&format!("inferior {}", selection.inferior))?;
        }
        Ok(())
    }
}

/// `i3` 形式のスレッドグループIDをinferior番号にする
fn parse_group_id(id: &str) -> Option<InferiorId> {
    id.strip_prefix('i')?.parse().ok()
}

impl Host for MiHost {
    fn inferiors(&mut self) -> Result<Vec<InferiorId>> {
        let command = "-list-thread-groups";
        let response = self.gdb.command(command)?;
        let groups = response
            .results
            .get_list("groups")
            .ok_or(MiError::MissingField {
                command: command.to_string(),
                field: "groups",
            })?;
        Ok(groups
            .iter()
            .filter_map(|g| g.get_str("id"))
            .filter_map(parse_group_id)
            .collect())
    }

    fn threads(&mut self, inferior: InferiorId) -> Result<Vec<ThreadInfo>> {
        let response = self
            .gdb
            .command(&format!("-list-thread-groups i{}", inferior))?;
        // プロセスのないinferiorは threads を返さない
        let Some(list) = response.results.get_list("threads") else {
            return Ok(Vec::new());
        };

        let raw: Vec<(u32, ThreadState)> = list
            .iter()
            .filter_map(|t| {
                let id = t.get_str("id")?.parse().ok()?;
                let state = match t.get_str("state") {
                    Some("stopped") => ThreadState::Stopped,
                    _ => ThreadState::Running,
                };
                Some((id, state))
            })
            .collect();

        // `--thread` はgdbの選択スレッドを切り替えることがあるので、
        // キャッシュにない番号を引く間は選択を保存しておく
        let missing = raw.iter().any(|(id, _)| !self.thread_nums.contains_key(id));
        let saved = if missing {
            match self.current_selection() {
                Ok(selection) => Some(selection),
                Err(e) => {
                    warn!("cannot save the current selection: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut threads = Vec::with_capacity(raw.len());
        for (index, (global_id, state)) in raw.into_iter().enumerate() {
            let num = self.thread_num(global_id, index as ThreadNum + 1);
            threads.push(ThreadInfo::new(num, state));
        }
        if let Some(selection) = saved {
            self.restore_selection(selection)?;
        }
        debug!("inferior {} threads: {:?}", inferior, threads);
        Ok(threads)
    }

    fn selected_inferior(&mut self) -> Result<InferiorId> {
        let value = self.evaluate_with("", "$_inferior")?;
        Ok(value.trim().parse()?)
    }

    fn execute(&mut self, command: &str) -> Result<String> {
        Ok(self.gdb.console(command)?)
    }

    fn evaluate(&mut self, expr: &str) -> Result<String> {
        self.evaluate_with("", expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::scripted;

    #[test]
    fn test_parse_group_id() {
        assert_eq!(parse_group_id("i12"), Some(12));
        assert_eq!(parse_group_id("12"), None);
        assert_eq!(parse_group_id("ix"), None);
    }

    #[test]
    fn test_inferiors() {
        let (gdb, sent) = scripted(
            "1^done,groups=[{id=\"i1\",type=\"process\",pid=\"10\"},{id=\"i2\",type=\"process\"}]\n",
        );
        let mut host = MiHost::new(gdb);
        assert_eq!(host.inferiors().unwrap(), vec![1, 2]);
        assert_eq!(sent.lines(), vec!["1-list-thread-groups"]);
    }

    #[test]
    fn test_threads_resolve_per_inferior_numbers() {
        let (gdb, sent) = scripted(concat!(
            "1^done,threads=[{id=\"3\",target-id=\"LWP 20\",state=\"stopped\"},",
            "{id=\"5\",target-id=\"LWP 21\",state=\"running\"}]\n",
            "2^done,value=\"1\"\n",
            "3^done,value=\"4\"\n",
            "4^done,value=\"1\"\n",
            "5^done,value=\"2\"\n",
            "6^done,new-thread-id=\"4\"\n",
            "7^done,threads=[{id=\"3\",state=\"running\"}]\n",
        ));
        let mut host = MiHost::new(gdb);
        let threads = host.threads(2).unwrap();
        assert_eq!(
            threads,
            vec![
                ThreadInfo::new(1, ThreadState::Stopped),
                ThreadInfo::new(2, ThreadState::Running),
            ]
        );
        // 2回目はキャッシュを使い、選択の保存もしない
        let threads = host.threads(2).unwrap();
        assert_eq!(threads, vec![ThreadInfo::new(1, ThreadState::Running)]);
        assert_eq!(
            sent.lines(),
            vec![
                "1-list-thread-groups i2",
                "2-data-evaluate-expression \"$_inferior\"",
                "3-data-evaluate-expression \"$_gthread\"",
                "4-data-evaluate-expression --thread 3 \"$_thread\"",
                "5-data-evaluate-expression --thread 5 \"$_thread\"",
                "6-thread-select 4",
                "7-list-thread-groups i2",
            ]
        );
    }

    #[test]
    fn test_thread_lookup_restores_inferior_without_thread() {
        let (gdb, sent) = scripted(concat!(
            "1^done,threads=[{id=\"2\",state=\"stopped\"}]\n",
            "2^done,value=\"3\"\n",
            "3^done,value=\"0\"\n",
            "4^done,value=\"1\"\n",
            "5^done\n",
        ));
        let mut host = MiHost::new(gdb);
        assert_eq!(
            host.threads(1).unwrap(),
            vec![ThreadInfo::new(1, ThreadState::Stopped)]
        );
        assert_eq!(
            sent.lines().last().map(String::as_str),
            Some("5-interpreter-exec console \"inferior 3\"")
        );
    }

    #[test]
    fn test_thread_number_fallback() {
        let (gdb, sent) = scripted(concat!(
            "1^done,threads=[{id=\"8\",state=\"stopped\"}]\n",
            "2^done,value=\"1\"\n",
            "3^done,value=\"8\"\n",
            "4^error,msg=\"Cannot execute this command while the selected thread is running.\"\n",
            "5^done,new-thread-id=\"8\"\n",
        ));
        let mut host = MiHost::new(gdb);
        let threads = host.threads(1).unwrap();
        assert_eq!(threads, vec![ThreadInfo::new(1, ThreadState::Stopped)]);
        assert_eq!(sent.lines()[4], "5-thread-select 8");
    }

    #[test]
    fn test_threads_of_empty_inferior() {
        let (gdb, _) = scripted("1^done\n");
        let mut host = MiHost::new(gdb);
        assert!(host.threads(3).unwrap().is_empty());
    }

    #[test]
    fn test_selected_and_evaluate() {
        let (gdb, sent) = scripted(concat!(
            "1^done,value=\"2\"\n",
            "2^done,value=\"{a = 1, b = 2}\"\n",
            "3^error,msg=\"No symbol \\\"zz\\\" in current context.\"\n",
        ));
        let mut host = MiHost::new(gdb);
        assert_eq!(host.selected_inferior().unwrap(), 2);
        assert_eq!(host.evaluate("pair").unwrap(), "{a = 1, b = 2}");
        let err = host.evaluate("zz").unwrap_err();
        assert_eq!(err.to_string(), "No symbol \"zz\" in current context.");
        assert_eq!(sent.lines()[0], "1-data-evaluate-expression \"$_inferior\"");
    }

    #[test]
    fn test_execute_returns_console_output() {
        let (gdb, sent) = scripted("~\"[Switching to inferior 2]\\n\"\n1^done\n");
        let mut host = MiHost::new(gdb);
        assert_eq!(host.execute("inferior 2").unwrap(), "[Switching to inferior 2]\n");
        assert_eq!(sent.lines(), vec!["1-interpreter-exec console \"inferior 2\""]);
    }
}
