//! コマンドレジストリと引数処理

use crate::errors::ERR_UNBALANCED_QUOTES;
use crate::host::Host;
use crate::{BreakCommand, ContinueAllCommand, ContinueThreadCommand, PrintCommand, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::io::Write;
use tracing::debug;

/// ホストに登録されるマルチランクコマンド
pub trait MpiCommand {
    /// コマンド名（REPLでの入力名）
    fn name(&self) -> &'static str;

    /// ヘルプ文字列
    fn help(&self) -> &'static str;

    /// コマンドを実行する
    ///
    /// `args` はコマンド名を除いた残りの入力行です。
    fn invoke(&self, host: &mut dyn Host, args: &str, out: &mut dyn Write) -> Result<()>;
}

/// コマンドレジストリ
pub struct CommandRegistry {
    commands: Vec<Box<dyn MpiCommand>>,
}

impl CommandRegistry {
    /// 空のレジストリを作成する
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// 4つの標準コマンドを登録したレジストリを作成する
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PrintCommand));
        registry.register(Box::new(ContinueAllCommand));
        registry.register(Box::new(BreakCommand));
        registry.register(Box::new(ContinueThreadCommand));
        registry
    }

    /// コマンドを登録する（同名のコマンドは置き換える）
    pub fn register(&mut self, command: Box<dyn MpiCommand>) {
        self.commands.retain(|c| c.name() != command.name());
        self.commands.push(command);
    }

    /// 名前でコマンドを取得する
    pub fn get(&self, name: &str) -> Option<&dyn MpiCommand> {
        self.commands
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    /// 登録済みのコマンドを登録順に返す
    pub fn iter(&self) -> impl Iterator<Item = &dyn MpiCommand> {
        self.commands.iter().map(|c| c.as_ref())
    }

    /// 入力行を解釈して該当コマンドを実行する
    ///
    /// 先頭の単語が登録済みのコマンドでなければ `Ok(false)` を返します。
    pub fn dispatch(&self, host: &mut dyn Host, line: &str, out: &mut dyn Write) -> Result<bool> {
        let line = line.trim();
        let (name, args) = match line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim_start()),
            None => (line, ""),
        };

        match self.get(name) {
            Some(command) => {
                debug!("dispatching '{}' with args '{}'", name, args);
                command.invoke(host, args, out)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 引数文字列をシェルのクォート規則で分割する
pub fn split_args(args: &str) -> Result<Vec<String>> {
    shlex::split(args).ok_or_else(|| anyhow::anyhow!(ERR_UNBALANCED_QUOTES))
}

/// コマンドのオプションをパースする
///
/// `--help` が指定された場合はヘルプを `out` に書き出して `Ok(None)` を返します。
pub fn parse_options<T: Parser>(args: &str, out: &mut dyn Write) -> Result<Option<T>> {
    let tokens = split_args(args)?;
    match T::try_parse_from(tokens) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            write!(out, "{}", e.render())?;
            Ok(None)
        }
        Err(e) => Err(anyhow::anyhow!("{}", e.render().to_string().trim_end())),
    }
}
