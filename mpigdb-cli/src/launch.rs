//! ランチャーの引数解析と mpiexec コマンドラインの組み立て
//!
//! 引数は mpiexec の MPMD 形式に合わせています。
//!
//! ```text
//! mpigdb [flags] -n 2 -- ./a.out x : -n 1 -- ./b.out
//! ```
//!
//! `--mpigdb_*` 以外のフラグは、それが現れたグループの mpiexec フラグになります。

use std::time::Duration;
use thiserror::Error;

/// 引数解析のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("missing value for '{0}'")]
    MissingValue(String),

    #[error("invalid value '{value}' for '{flag}'")]
    InvalidNumber { flag: String, value: String },

    #[error("no program given for group {0} (use -- PROGRAM ARGS...)")]
    NoProgram(usize),

    #[error("group {0} has zero processes")]
    NoProcesses(usize),

    #[error("'{0}' is not supported: mpigdb drives gdb over MI itself")]
    Unsupported(String),

    #[error("{procs} ranks starting after port {base_port} exceed the port range")]
    PortRange { base_port: u16, procs: usize },
}

/// MPMD の1グループ（同じプログラムを実行するプロセス群）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcGroup {
    pub procs: usize,
    /// このグループだけに渡す mpiexec フラグ
    pub mpi_args: Vec<String>,
    /// プログラムとその引数
    pub program: Vec<String>,
}

impl ProcGroup {
    fn new() -> Self {
        Self {
            procs: 1,
            mpi_args: Vec::new(),
            program: Vec::new(),
        }
    }
}

/// ランチャーの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchArgs {
    pub groups: Vec<ProcGroup>,
    /// 制御用ポート。ランク r の gdbserver は `base_port + r + 1`
    pub base_port: u16,
    /// 全体に渡す mpiexec フラグ
    pub global_mpi_args: Vec<String>,
    /// gdb に渡す追加引数
    pub dbg_args: Vec<String>,
    pub mpiexec: String,
    pub helper: String,
    pub gdbserver: String,
    pub gdb: String,
    pub timeout: Duration,
    pub dry_run: bool,
    pub verbose: bool,
    pub help: bool,
}

impl Default for LaunchArgs {
    fn default() -> Self {
        Self {
            groups: vec![ProcGroup::new()],
            base_port: 8000,
            global_mpi_args: Vec::new(),
            dbg_args: Vec::new(),
            mpiexec: "mpiexec".to_string(),
            helper: "mpigdb-helper".to_string(),
            gdbserver: "gdbserver".to_string(),
            gdb: "gdb".to_string(),
            timeout: Duration::from_secs(30),
            dry_run: false,
            verbose: false,
            help: false,
        }
    }
}

/// 解析中の状態
enum State {
    /// mpiexec / mpigdb のフラグを読んでいる
    Flags,
    /// `--` の後のプログラム引数を読んでいる
    Program,
    /// 値を取るフラグの直後
    Value(ValueFlag),
}

#[derive(Clone, Copy)]
enum ValueFlag {
    Procs,
    Port,
    Helper,
    GdbServer,
    Gdb,
    MpiExec,
    GlobalFlag,
    DbgArg,
    Timeout,
}

impl LaunchArgs {
    /// プログラム名を除いたコマンドライン引数を解析する
    pub fn parse<I, S>(args: I) -> Result<Self, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = LaunchArgs::default();
        let mut state = State::Flags;
        let mut last_flag = String::new();

        for arg in args {
            let arg: String = arg.into();
            state = match state {
                State::Flags => {
                    let next = match arg.as_str() {
                        "-h" | "--help" => {
                            parsed.help = true;
                            State::Flags
                        }
                        "-n" | "-np" => State::Value(ValueFlag::Procs),
                        "--mpigdb_verbose" => {
                            parsed.verbose = true;
                            State::Flags
                        }
                        "--mpigdb_dryrun" => {
                            parsed.dry_run = true;
                            State::Flags
                        }
                        "--mpigdb_port" => State::Value(ValueFlag::Port),
                        "--mpigdb_helper" => State::Value(ValueFlag::Helper),
                        "--mpigdb_gdbserver" => State::Value(ValueFlag::GdbServer),
                        "--mpigdb_gdb" => State::Value(ValueFlag::Gdb),
                        "--mpigdb_mpiexec" => State::Value(ValueFlag::MpiExec),
                        "--mpigdb_mpi_flag" => State::Value(ValueFlag::GlobalFlag),
                        "--mpigdb_dbg_arg" => State::Value(ValueFlag::DbgArg),
                        "--mpigdb_timeout" => State::Value(ValueFlag::Timeout),
                        s if s.starts_with("--interpreter") => {
                            return Err(LaunchError::Unsupported(arg.clone()));
                        }
                        s if s.starts_with("--tty=") => {
                            parsed.dbg_args.push(arg.clone());
                            State::Flags
                        }
                        "--" => State::Program,
                        _ => {
                            parsed.current_group().mpi_args.push(arg.clone());
                            State::Flags
                        }
                    };
                    last_flag = arg;
                    next
                }
                State::Program => {
                    if arg == ":" {
                        parsed.groups.push(ProcGroup::new());
                        State::Flags
                    } else {
                        parsed.current_group().program.push(arg);
                        State::Program
                    }
                }
                State::Value(flag) => {
                    parsed.apply_value(flag, &last_flag, arg)?;
                    State::Flags
                }
            };
        }

        if let State::Value(_) = state {
            return Err(LaunchError::MissingValue(last_flag));
        }
        if !parsed.help {
            parsed.validate()?;
        }
        Ok(parsed)
    }

    fn current_group(&mut self) -> &mut ProcGroup {
        if self.groups.is_empty() {
            self.groups.push(ProcGroup::new());
        }
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    fn apply_value(&mut self, flag: ValueFlag, name: &str, value: String) -> Result<(), LaunchError> {
        let invalid = || LaunchError::InvalidNumber {
            flag: name.to_string(),
            value: value.clone(),
        };
        match flag {
            ValueFlag::Procs => self.current_group().procs = value.parse().map_err(|_| invalid())?,
            ValueFlag::Port => self.base_port = value.parse().map_err(|_| invalid())?,
            ValueFlag::Timeout => {
                let secs: u64 = value.parse().map_err(|_| invalid())?;
                self.timeout = Duration::from_secs(secs);
            }
            ValueFlag::Helper => self.helper = value,
            ValueFlag::GdbServer => self.gdbserver = value,
            ValueFlag::Gdb => self.gdb = value,
            ValueFlag::MpiExec => self.mpiexec = value,
            ValueFlag::GlobalFlag => self.global_mpi_args.push(value),
            ValueFlag::DbgArg => self.dbg_args.push(value),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), LaunchError> {
        for (i, group) in self.groups.iter().enumerate() {
            if group.program.is_empty() {
                return Err(LaunchError::NoProgram(i));
            }
            if group.procs == 0 {
                return Err(LaunchError::NoProcesses(i));
            }
        }
        let procs = self.total_procs();
        if usize::from(self.base_port) + procs > usize::from(u16::MAX) {
            return Err(LaunchError::PortRange {
                base_port: self.base_port,
                procs,
            });
        }
        Ok(())
    }

    /// 全ランク数
    pub fn total_procs(&self) -> usize {
        self.groups.iter().map(|g| g.procs).sum()
    }

    /// ランク r の gdbserver ポート
    ///
    /// 解析時にポート範囲を検査済みなので、rank は `total_procs()` 未満であること。
    pub fn rank_port(&self, rank: usize) -> u16 {
        (usize::from(self.base_port) + rank + 1) as u16
    }

    /// mpiexec に渡す引数を組み立てる
    ///
    /// 各ランクを `-np 1` の個別グループにし、ヘルパー経由で gdbserver を起動させます。
    pub fn mpiexec_args(&self, control_addr: &str) -> Vec<String> {
        let total = self.total_procs();
        let verbose = if self.verbose { "1" } else { "0" };

        let mut args = self.global_mpi_args.clone();
        let mut rank = 0;
        for group in &self.groups {
            for _ in 0..group.procs {
                args.push("-np".to_string());
                args.push("1".to_string());
                args.extend(group.mpi_args.iter().cloned());
                args.push(self.helper.clone());
                args.push(control_addr.to_string());
                args.push(self.rank_port(rank).to_string());
                args.push(verbose.to_string());
                args.push(self.gdbserver.clone());
                args.extend(group.program.iter().cloned());
                if rank + 1 < total {
                    args.push(":".to_string());
                }
                rank += 1;
            }
        }
        args
    }
}
