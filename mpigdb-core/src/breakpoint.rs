//! 複数ランクへのブレークポイント設定（mpib）

use crate::command::{parse_options, MpiCommand};
use crate::host::{Host, InferiorId};
use crate::targets::{flatten, TargetList};
use crate::Result;
use clap::{Parser, ValueEnum};
use std::io::Write;
use tracing::debug;

const HELP: &str = "break on multiple processes

  <default>         all processes
  -t <num>          target process <num>
  -t <num1>-<num2>  target processes <num1> to <num2>
  -t <rng1>,<rng2>  target process ranges <rng1> and <rng2>
  --polarity exclude  break on every process except the targets
  LOCATION if COND  conditional breakpoint";

/// ターゲット指定の解釈
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TargetPolarity {
    /// 指定したinferiorにだけ設定する
    #[default]
    Include,
    /// 指定したinferior以外に設定する
    Exclude,
}

impl TargetPolarity {
    /// inferiorがブレークポイントの対象かどうか
    pub fn selects(self, targets: &[InferiorId], inferior: InferiorId) -> bool {
        let listed = targets.contains(&inferior);
        match self {
            TargetPolarity::Include => listed,
            TargetPolarity::Exclude => !listed,
        }
    }
}

/// mpib の引数
#[derive(Parser, Debug)]
#[command(name = "mpib", no_binary_name = true, disable_version_flag = true)]
#[command(about = "Set a breakpoint on multiple ranks")]
struct BreakArgs {
    /// Ranks to break on (e.g. 1,3-5); may be repeated
    #[arg(short = 't', long = "targets", value_name = "TARGETS")]
    targets: Vec<TargetList>,

    /// Whether the targets are included or excluded
    #[arg(long, value_enum, default_value_t = TargetPolarity::Include)]
    polarity: TargetPolarity,

    /// Breakpoint location, optionally followed by `if CONDITION`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    location: Vec<String>,
}

/// ブレークポイントの位置と条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakSpec {
    pub location: String,
    /// `if` を含む条件節（例: `if rank == 2`）
    pub condition: Option<String>,
}

impl BreakSpec {
    /// 全inferior共通のブレークポイントコマンド
    pub fn global_command(&self) -> String {
        self.render(None)
    }

    /// 特定スレッドに限定したブレークポイントコマンド
    pub fn thread_command(&self, inferior: InferiorId, thread: u32) -> String {
        self.render(Some(format!("thread {}.{}", inferior, thread)))
    }

    fn render(&self, scope: Option<String>) -> String {
        let mut command = format!("break {}", self.location);
        for part in [scope, self.condition.clone()].into_iter().flatten() {
            command.push(' ');
            command.push_str(&part);
        }
        command
    }
}

/// 最初に現れる単独の `if` トークンで位置と条件を分ける（大文字小文字を区別）
pub fn split_condition(tokens: &[String]) -> BreakSpec {
    match tokens.iter().position(|t| t == "if") {
        Some(p) => BreakSpec {
            location: tokens[..p].join(" "),
            condition: Some(format!("if {}", tokens[p + 1..].join(" ")).trim_end().to_string()),
        },
        None => BreakSpec {
            location: tokens.join(" "),
            condition: None,
        },
    }
}

/// 設定するブレークポイントコマンドを組み立てる
///
/// `targets` が空なら全体に一つだけ設定します。指定がある場合は、
/// `polarity` で選ばれた各inferiorの全スレッドに一つずつ設定します。
pub fn plan_breakpoints(
    host: &mut dyn Host,
    spec: &BreakSpec,
    targets: &[InferiorId],
    polarity: TargetPolarity,
) -> Result<Vec<String>> {
    if targets.is_empty() {
        return Ok(vec![spec.global_command()]);
    }

    let mut commands = Vec::new();
    for inferior in host.inferiors()? {
        if !polarity.selects(targets, inferior) {
            continue;
        }
        for thread in host.threads(inferior)? {
            commands.push(spec.thread_command(inferior, thread.num));
        }
    }
    Ok(commands)
}

/// mpib コマンド
pub struct BreakCommand;

impl MpiCommand for BreakCommand {
    fn name(&self) -> &'static str {
        "mpib"
    }

    fn help(&self) -> &'static str {
        HELP
    }

    fn invoke(&self, host: &mut dyn Host, args: &str, out: &mut dyn Write) -> Result<()> {
        let Some(args) = parse_options::<BreakArgs>(args, out)? else {
            return Ok(());
        };
        let targets = flatten(&args.targets);
        let spec = split_condition(&args.location);
        debug!("breakpoint {:?} targets={:?} polarity={:?}", spec, targets, args.polarity);

        for command in plan_breakpoints(host, &spec, &targets, args.polarity)? {
            let output = host.execute(&command)?;
            write!(out, "{}", output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeHost;
    use crate::host::ThreadState::{Running, Stopped};

    fn tokens(s: &[&str]) -> Vec<String> {
        s.iter().map(|t| t.to_string()).collect()
    }

    fn two_ranks() -> FakeHost {
        FakeHost::new()
            .with_inferior(1, &[(1, Stopped), (2, Running)])
            .with_inferior(2, &[(1, Stopped)])
    }

    #[test]
    fn test_split_condition() {
        let spec = split_condition(&tokens(&["x==1", "if", "rank", "==", "2"]));
        assert_eq!(spec.location, "x==1");
        assert_eq!(spec.condition.as_deref(), Some("if rank == 2"));
    }

    #[test]
    fn test_split_condition_absent() {
        let spec = split_condition(&tokens(&["main.c:42"]));
        assert_eq!(spec.location, "main.c:42");
        assert_eq!(spec.condition, None);
        // 大文字小文字は区別し、トークンの一部は対象外
        let spec = split_condition(&tokens(&["IF", "iffy"]));
        assert_eq!(spec.location, "IF iffy");
        assert_eq!(spec.condition, None);
    }

    #[test]
    fn test_split_condition_first_if_wins() {
        let spec = split_condition(&tokens(&["foo", "if", "a", "if", "b"]));
        assert_eq!(spec.location, "foo");
        assert_eq!(spec.condition.as_deref(), Some("if a if b"));
    }

    #[test]
    fn test_breakpoint_per_thread_of_target() {
        let mut host = two_ranks();
        let mut out = Vec::new();
        BreakCommand.invoke(&mut host, "-t 1 foo", &mut out).unwrap();
        assert_eq!(
            host.executed,
            vec!["break foo thread 1.1", "break foo thread 1.2"]
        );
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("ok: break foo thread 1.1"));
    }

    #[test]
    fn test_breakpoint_with_condition() {
        let mut host = two_ranks();
        let mut out = Vec::new();
        BreakCommand
            .invoke(&mut host, "-t 2 heat.cc:40 if i == 3", &mut out)
            .unwrap();
        assert_eq!(host.executed, vec!["break heat.cc:40 thread 2.1 if i == 3"]);
    }

    #[test]
    fn test_breakpoint_global_keeps_condition() {
        let mut host = two_ranks();
        let mut out = Vec::new();
        BreakCommand.invoke(&mut host, "foo if x > 1", &mut out).unwrap();
        assert_eq!(host.executed, vec!["break foo if x > 1"]);
    }

    #[test]
    fn test_breakpoint_exclude_polarity() {
        let mut host = two_ranks();
        let mut out = Vec::new();
        BreakCommand
            .invoke(&mut host, "--polarity exclude -t 1 foo", &mut out)
            .unwrap();
        assert_eq!(host.executed, vec!["break foo thread 2.1"]);
    }

    #[test]
    fn test_breakpoint_unknown_target_sets_nothing() {
        let mut host = two_ranks();
        let mut out = Vec::new();
        BreakCommand.invoke(&mut host, "-t 9 foo", &mut out).unwrap();
        assert!(host.executed.is_empty());
    }
}
