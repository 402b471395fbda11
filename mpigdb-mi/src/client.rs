//! gdb プロセスの起動と MI コマンドの送受信

use crate::error::MiError;
use crate::record::{parse_record, quote, Record, ResultClass, Results, StreamKind};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// gdb 終了時に出力が閉じられるまで待つ時間
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// gdb の起動設定
#[derive(Debug, Clone)]
pub struct MiConfig {
    /// gdb の実行ファイル
    pub gdb_path: String,
    /// 追加で渡す引数
    pub args: Vec<String>,
    /// 1コマンドの応答待ちの上限
    pub timeout: Duration,
}

impl Default for MiConfig {
    fn default() -> Self {
        Self {
            gdb_path: "gdb".to_string(),
            args: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// コマンドの応答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiResponse {
    pub class: ResultClass,
    pub results: Results,
    /// 応答までに出力されたコンソール・ターゲット出力
    pub console: String,
}

/// MI で接続された gdb
pub struct GdbMi {
    child: Option<Child>,
    stdin: Box<dyn Write + Send>,
    records: Receiver<Record>,
    next_token: u64,
    timeout: Duration,
    /// コマンド応答待ちの間に届いた非同期レコード
    pending: VecDeque<Record>,
}

impl GdbMi {
    /// `gdb --interpreter=mi` を起動する
    pub fn spawn(config: &MiConfig) -> Result<Self, MiError> {
        info!("starting {} in MI mode", config.gdb_path);

        let mut child = Command::new(&config.gdb_path)
            .arg("--interpreter=mi")
            .arg("--quiet")
            .arg("--nx")
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child.stdin.take().ok_or(MiError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(MiError::Disconnected)?;

        let mut gdb = Self::from_streams(stdin, stdout, config.timeout);
        gdb.child = Some(child);
        gdb.command("-gdb-set mi-async on")?;
        Ok(gdb)
    }

    /// 任意の入出力に接続する
    ///
    /// 出力は別スレッドで行単位に読み、パースしたレコードをチャネルに送ります。
    pub fn from_streams(
        stdin: impl Write + Send + 'static,
        stdout: impl Read + Send + 'static,
        timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("error reading gdb output: {}", e);
                        break;
                    }
                }
                // 不正な UTF-8 が混ざっても接続は切らない
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
                debug!("gdb> {}", line);
                match parse_record(line) {
                    Ok(Some(Record::Prompt)) | Ok(None) => {}
                    Ok(Some(record)) => {
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            debug!("gdb output reader stopped");
        });

        Self {
            child: None,
            stdin: Box::new(stdin),
            records: rx,
            next_token: 1,
            timeout,
            pending: VecDeque::new(),
        }
    }

    /// MI コマンドを送り、対応する結果レコードを待つ
    ///
    /// `^error` は `MiError::Command` になります。
    pub fn command(&mut self, command: &str) -> Result<MiResponse, MiError> {
        let token = self.next_token;
        self.next_token += 1;

        debug!("gdb< {}{}", token, command);
        writeln!(self.stdin, "{}{}", token, command)?;
        self.stdin.flush()?;

        let deadline = Instant::now() + self.timeout;
        let mut console = String::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let record = match self.records.recv_timeout(remaining) {
                Ok(record) => record,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(MiError::Timeout {
                        command: command.to_string(),
                        timeout: self.timeout,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => return Err(MiError::Disconnected),
            };

            match record {
                Record::Result {
                    token: Some(t),
                    class,
                    results,
                } if t == token => {
                    if class == ResultClass::Error {
                        let msg = results.get_str("msg").unwrap_or("unknown error");
                        return Err(MiError::Command(msg.to_string()));
                    }
                    return Ok(MiResponse {
                        class,
                        results,
                        console,
                    });
                }
                Record::Result { token, .. } => {
                    debug!("ignoring result for token {:?}", token);
                }
                Record::Stream {
                    kind: StreamKind::Console | StreamKind::Target,
                    text,
                } => console.push_str(&text),
                Record::Stream {
                    kind: StreamKind::Log,
                    text,
                } => debug!("gdb log: {}", text.trim_end()),
                record @ Record::Async { .. } => self.pending.push_back(record),
                Record::Prompt => {}
            }
        }
    }

    /// CLI コマンドをコンソールインタプリタで実行し、その出力を返す
    pub fn console(&mut self, command: &str) -> Result<String, MiError> {
        let response = self.command(&format!("-interpreter-exec console {}", quote(command)))?;
        Ok(response.console)
    }

    /// 全スレッドに割り込む
    pub fn interrupt_all(&mut self) -> Result<(), MiError> {
        self.command("-exec-interrupt --all").map(|_| ())
    }

    /// コマンド外で届いたレコードを取り出す（ブロックしない）
    pub fn drain_events(&mut self) -> Vec<Record> {
        let mut events: Vec<Record> = self.pending.drain(..).collect();
        loop {
            match self.records.try_recv() {
                Ok(Record::Result { token, .. }) => {
                    debug!("ignoring result for token {:?}", token);
                }
                Ok(record) => events.push(record),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// gdb を終了させる
    pub fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let _ = writeln!(self.stdin, "-gdb-exit");
        let _ = self.stdin.flush();

        let deadline = Instant::now() + EXIT_GRACE;
        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Err(RecvTimeoutError::Disconnected) = self.records.recv_timeout(remaining) {
                break;
            }
        }

        let _ = child.kill();
        let _ = child.wait();
        info!("gdb stopped");
    }
}

impl Drop for GdbMi {
    fn drop(&mut self) {
        self.shutdown();
    }
}
