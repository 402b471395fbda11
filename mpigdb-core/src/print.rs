//! 複数ランクでの式評価（mpip）

use crate::command::{parse_options, MpiCommand};
use crate::host::{select_inferior, with_inferior_focus, Host, InferiorId};
use crate::targets::{flatten, TargetList};
use crate::Result;
use clap::Parser;
use std::fmt;
use std::io::Write;

const HELP: &str = "print a value on multiple processes

  <default>         all processes
  -t <num>          target process <num>
  -t <num1>-<num2>  target processes <num1> to <num2>
  -t <rng1>,<rng2>  target process ranges <rng1> and <rng2>";

/// mpip の引数
#[derive(Parser, Debug)]
#[command(name = "mpip", no_binary_name = true, disable_version_flag = true)]
#[command(about = "Print an expression on multiple ranks")]
struct PrintArgs {
    /// Ranks to evaluate on (e.g. 1,3-5); may be repeated
    #[arg(short = 't', long = "targets", value_name = "TARGETS")]
    targets: Vec<TargetList>,

    /// Expression to evaluate
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    expr: Vec<String>,
}

/// ランクごとの評価結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankValue {
    pub rank: InferiorId,
    pub value: String,
}

impl fmt::Display for RankValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank={}, {}", self.rank, self.value)
    }
}

/// 各ターゲットで式を評価する
///
/// `targets` が空なら全inferiorを列挙順に評価します。評価の間だけフォーカスを
/// 切り替え、終了後は元のinferiorに戻します。一つでも評価に失敗すると
/// 残りは評価せずエラーを返します。
pub fn evaluate_across(
    host: &mut dyn Host,
    targets: &[InferiorId],
    expr: &str,
) -> Result<Vec<RankValue>> {
    with_inferior_focus(host, |host| {
        let targets = if targets.is_empty() {
            host.inferiors()?
        } else {
            targets.to_vec()
        };

        let mut values = Vec::with_capacity(targets.len());
        for rank in targets {
            select_inferior(host, rank)?;
            let value = host.evaluate(expr)?;
            values.push(RankValue { rank, value });
        }
        Ok(values)
    })
}

/// mpip コマンド
pub struct PrintCommand;

impl MpiCommand for PrintCommand {
    fn name(&self) -> &'static str {
        "mpip"
    }

    fn help(&self) -> &'static str {
        HELP
    }

    fn invoke(&self, host: &mut dyn Host, args: &str, out: &mut dyn Write) -> Result<()> {
        let Some(args) = parse_options::<PrintArgs>(args, out)? else {
            return Ok(());
        };
        let expr = args.expr.join(" ");
        let values = evaluate_across(host, &flatten(&args.targets), &expr)?;
        for value in &values {
            writeln!(out, "{}", value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeHost;
    use crate::host::ThreadState::Stopped;

    fn two_ranks() -> FakeHost {
        FakeHost::new()
            .with_inferior(1, &[(1, Stopped)])
            .with_inferior(2, &[(1, Stopped)])
            .with_value(1, "x", "10")
            .with_value(2, "x", "20")
    }

    fn run(host: &mut FakeHost, args: &str) -> Result<String> {
        let mut out = Vec::new();
        PrintCommand.invoke(host, args, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_print_all_ranks() {
        let mut host = two_ranks().selecting(2);
        let output = run(&mut host, "x").unwrap();
        assert_eq!(output, "rank=1, 10\nrank=2, 20\n");
        // フォーカスは元のinferiorに戻る
        assert_eq!(host.selected_inferior().unwrap(), 2);
        assert_eq!(host.executed, vec!["inferior 1", "inferior 2", "inferior 2"]);
    }

    #[test]
    fn test_print_targets_in_given_order() {
        let mut host = two_ranks();
        let output = run(&mut host, "-t 2 -t 1 x").unwrap();
        assert_eq!(output, "rank=2, 20\nrank=1, 10\n");
        assert_eq!(host.selected, 1);
    }

    #[test]
    fn test_print_joins_expression_tokens() {
        let mut host = two_ranks().with_value(1, "a + b", "3");
        let output = run(&mut host, "-t 1 a + b").unwrap();
        assert_eq!(output, "rank=1, 3\n");
    }

    #[test]
    fn test_print_failure_prints_nothing_and_restores_focus() {
        let mut host = FakeHost::new()
            .with_inferior(1, &[(1, Stopped)])
            .with_inferior(2, &[(1, Stopped)])
            .with_value(1, "y", "1");
        let mut out = Vec::new();
        assert!(PrintCommand.invoke(&mut host, "y", &mut out).is_err());
        assert!(out.is_empty());
        assert_eq!(host.selected, 1);
        assert_eq!(host.executed.last().map(String::as_str), Some("inferior 1"));
    }

    #[test]
    fn test_print_bad_targets() {
        let mut host = two_ranks();
        assert!(run(&mut host, "-t a-3 x").is_err());
        assert!(host.executed.is_empty());
    }

    #[test]
    fn test_print_requires_expression() {
        let mut host = two_ranks();
        assert!(run(&mut host, "-t 1").is_err());
    }
}
