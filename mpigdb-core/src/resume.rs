//! 全ランクの実行継続（mpic）とランク巡回（mpict）

use crate::command::{parse_options, MpiCommand};
use crate::host::{Host, InferiorId, ThreadNum};
use crate::Result;
use clap::Parser;
use std::io::Write;
use tracing::debug;

/// mpic の引数（なし）
#[derive(Parser, Debug)]
#[command(name = "mpic", no_binary_name = true, disable_version_flag = true)]
#[command(about = "Continue every rank in the background")]
struct ContinueAllArgs {}

/// mpict の引数（なし）
#[derive(Parser, Debug)]
#[command(name = "mpict", no_binary_name = true, disable_version_flag = true)]
#[command(about = "Continue the current rank and switch to the next stopped one")]
struct ContinueThreadArgs {}

/// 全inferiorの停止中スレッドをバックグラウンドで実行継続する
///
/// inferiorごとに `thread apply I.T... continue &` を1回発行します。
/// 停止中のスレッドがないinferiorは既に実行中なので飛ばします。
/// 発行したinferior番号を返します。
pub fn continue_all(host: &mut dyn Host, out: &mut dyn Write) -> Result<Vec<InferiorId>> {
    let mut resumed = Vec::new();
    for inferior in host.inferiors()? {
        let stopped: Vec<String> = host
            .threads(inferior)?
            .iter()
            .filter(|t| t.is_stopped())
            .map(|t| format!("{}.{}", inferior, t.num))
            .collect();
        if stopped.is_empty() {
            debug!("inferior {} has no stopped threads", inferior);
            continue;
        }
        let output = host.execute(&format!("thread apply {} continue &", stopped.join(" ")))?;
        write!(out, "{}", output)?;
        resumed.push(inferior);
    }
    Ok(resumed)
}

/// 現在のinferiorを実行継続し、停止中のスレッドを持つ次のinferiorへ切り替える
///
/// 他のinferiorを列挙順に調べ、最初に見つかった停止中スレッドを選択します。
/// 見つからなければフォーカスは実行継続したinferiorのままです。
pub fn continue_and_advance(
    host: &mut dyn Host,
    out: &mut dyn Write,
) -> Result<Option<(InferiorId, ThreadNum)>> {
    let current = host.selected_inferior()?;
    let output = host.execute("continue &")?;
    write!(out, "{}", output)?;

    for inferior in host.inferiors()? {
        if inferior == current {
            continue;
        }
        if let Some(thread) = host.threads(inferior)?.into_iter().find(|t| t.is_stopped()) {
            let output = host.execute(&format!("thread {}.{}", inferior, thread.num))?;
            write!(out, "{}", output)?;
            return Ok(Some((inferior, thread.num)));
        }
    }
    Ok(None)
}

/// mpic コマンド
pub struct ContinueAllCommand;

impl MpiCommand for ContinueAllCommand {
    fn name(&self) -> &'static str {
        "mpic"
    }

    fn help(&self) -> &'static str {
        "continue all mpi processes"
    }

    fn invoke(&self, host: &mut dyn Host, args: &str, out: &mut dyn Write) -> Result<()> {
        if parse_options::<ContinueAllArgs>(args, out)?.is_none() {
            return Ok(());
        }
        continue_all(host, out)?;
        Ok(())
    }
}

/// mpict コマンド
pub struct ContinueThreadCommand;

impl MpiCommand for ContinueThreadCommand {
    fn name(&self) -> &'static str {
        "mpict"
    }

    fn help(&self) -> &'static str {
        "continue the current mpi process and advance to the next stopped one"
    }

    fn invoke(&self, host: &mut dyn Host, args: &str, out: &mut dyn Write) -> Result<()> {
        if parse_options::<ContinueThreadArgs>(args, out)?.is_none() {
            return Ok(());
        }
        match continue_and_advance(host, out)? {
            Some((inferior, thread)) => {
                writeln!(out, "now on rank {} (thread {}.{})", inferior, inferior, thread)?
            }
            None => writeln!(out, "no other rank is stopped")?,
        }
        Ok(())
    }
}
