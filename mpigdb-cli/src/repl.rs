//! 対話ループ
//!
//! mpi コマンドはレジストリで処理し、それ以外は gdb のコンソールに転送します。

use crate::Result;
use mpigdb_core::{CommandRegistry, Host};
use mpigdb_mi::{describe_event, MiError, MiHost};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use tracing::debug;

const PROMPT: &str = "(mpigdb) ";

/// 入力行の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Empty,
    Quit,
    Help,
    /// `help <mpi コマンド>`
    CommandHelp(&'a str),
    /// 登録済みの mpi コマンド
    Mpi,
    /// gdb にそのまま渡すコマンド
    Gdb(&'a str),
}

/// 入力行を分類する
pub fn classify<'a>(registry: &CommandRegistry, line: &'a str) -> Line<'a> {
    let line = line.trim();
    let first = line.split_whitespace().next().unwrap_or("");
    match first {
        "" => Line::Empty,
        "quit" | "q" | "exit" => Line::Quit,
        "help" | "h" if first == line => Line::Help,
        "help" | "h" => {
            let mut words = line.split_whitespace().skip(1);
            match (words.next(), words.next()) {
                (Some(name), None) if registry.get(name).is_some() => Line::CommandHelp(name),
                _ => Line::Gdb(line),
            }
        }
        name if registry.get(name).is_some() => Line::Mpi,
        _ => Line::Gdb(line),
    }
}

/// レジストリのコマンド一覧を含むヘルプ
pub fn help_text(registry: &CommandRegistry) -> String {
    let mut text = String::from("MPI commands:\n");
    for command in registry.iter() {
        let summary = command.help().lines().next().unwrap_or("");
        text.push_str(&format!("  {:<8} {}\n", command.name(), summary));
    }
    text.push_str("\nOther commands:\n");
    text.push_str("  help     - Show this help message\n");
    text.push_str("  help CMD - Show the full help of an MPI command\n");
    text.push_str("  quit/q   - Exit mpigdb (ends every rank)\n");
    text.push_str("  Ctrl-C   - Interrupt all ranks\n");
    text.push_str("\nAny other input is passed to gdb (e.g. 'info inferiors', 'help break').\n");
    text.push_str("Use '<command> --help' for the options of an MPI command.\n");
    text
}

/// REPL
pub struct Repl {
    host: MiHost,
    registry: CommandRegistry,
}

impl Repl {
    pub fn new(host: MiHost) -> Self {
        Self {
            host,
            registry: CommandRegistry::with_defaults(),
        }
    }

    /// REPLループを実行する
    pub fn run(&mut self) -> Result<()> {
        println!("Type 'help' for mpigdb commands, 'quit' to exit.");
        println!();

        let mut rl = DefaultEditor::new()?;

        loop {
            self.print_events();

            match rl.readline(PROMPT) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;

                    match self.handle(&line) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => {
                            if let Some(MiError::Disconnected) = e.downcast_ref::<MiError>() {
                                eprintln!("gdb exited");
                                break;
                            }
                            eprintln!("Error: {:#}", e);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    if let Err(e) = self.host.gdb_mut().interrupt_all() {
                        eprintln!("Error: {}", e);
                    }
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        Ok(())
    }

    /// 1行を処理する。終了するなら `Ok(false)`
    fn handle(&mut self, line: &str) -> Result<bool> {
        let mut stdout = std::io::stdout().lock();
        match classify(&self.registry, line) {
            Line::Empty => {}
            Line::Quit => return Ok(false),
            Line::Help => write!(stdout, "{}", help_text(&self.registry))?,
            Line::CommandHelp(name) => {
                if let Some(command) = self.registry.get(name) {
                    writeln!(stdout, "{}", command.help())?;
                }
            }
            Line::Mpi => {
                self.registry.dispatch(&mut self.host, line, &mut stdout)?;
            }
            Line::Gdb(command) => {
                debug!("forwarding '{}' to gdb", command);
                let output = self.host.execute(command)?;
                write!(stdout, "{}", output)?;
            }
        }
        stdout.flush()?;
        Ok(true)
    }

    /// 溜まった非同期イベントを表示する
    fn print_events(&mut self) {
        for record in self.host.gdb_mut().drain_events() {
            if let Some(text) = describe_event(&record) {
                println!("{}", text);
            }
        }
    }
}
