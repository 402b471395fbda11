//! ランクからの接続先通知を受け取る制御サーバ
//!
//! 各ランクのヘルパーは起動時に制御ポートへ接続し、自分の gdbserver の
//! `host:port` を1行送って切断します。

use crate::Result;
use std::fmt;
use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// accept を再試行する間隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 1接続あたりの読み込みタイムアウト
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// gdbserver の接続先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// ヘルパーが送るメッセージ
    pub fn message(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid endpoint '{}': expected host:port", s))?;
        if host.is_empty() {
            anyhow::bail!("invalid endpoint '{}': empty host", s);
        }
        let port = port
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid port in endpoint '{}': {}", s, e))?;
        Ok(Self::new(host, port))
    }
}

/// 制御サーバ
pub struct ControlServer {
    listener: TcpListener,
}

impl ControlServer {
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        info!("control server listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// `count` 個の接続先を受け取り、ポート順に並べて返す
    ///
    /// 接続を待つ間、`alive` を定期的に呼びます。`alive` がエラーを返すと
    /// （mpiexec が先に終了した場合など）待機を打ち切ります。
    pub fn collect(
        &self,
        count: usize,
        mut alive: impl FnMut() -> Result<()>,
    ) -> Result<Vec<Endpoint>> {
        self.listener.set_nonblocking(true)?;
        let mut endpoints = Vec::with_capacity(count);

        while endpoints.len() < count {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    let mut message = String::new();
                    stream.read_to_string(&mut message)?;
                    let endpoint: Endpoint = message.parse()?;
                    debug!("{} reported gdbserver at {}", peer, endpoint);
                    endpoints.push(endpoint);
                    info!("{}/{} ranks reported", endpoints.len(), count);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    alive()?;
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }

        endpoints.sort_by_key(|e| e.port);
        Ok(endpoints)
    }
}
