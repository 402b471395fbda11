//! 非同期レコードを利用者向けの1行に整形する

use crate::record::{AsyncKind, Record, Results, StreamKind};

/// REPL に表示する形に整形する。表示不要なレコードは `None`
pub fn describe_event(record: &Record) -> Option<String> {
    match record {
        Record::Stream {
            kind: StreamKind::Console | StreamKind::Target,
            text,
        } => Some(text.trim_end_matches('\n').to_string()),
        Record::Async {
            kind: AsyncKind::Exec,
            class,
            results,
            ..
        } if class == "stopped" => Some(describe_stop(results)),
        Record::Async {
            kind: AsyncKind::Notify,
            class,
            results,
            ..
        } => match class.as_str() {
            "thread-group-exited" => {
                let id = results.get_str("id").unwrap_or("?");
                let rank = id.trim_start_matches('i');
                Some(match results.get_str("exit-code") {
                    Some(code) => format!("[rank {} exited with code {}]", rank, code),
                    None => format!("[rank {} exited]", rank),
                })
            }
            _ => None,
        },
        _ => None,
    }
}

fn describe_stop(results: &Results) -> String {
    let reason = results.get_str("reason").unwrap_or("stopped");
    let mut line = match results.get_str("thread-id") {
        Some(thread) => format!("[thread {} {}", thread, reason),
        None => format!("[{}", reason),
    };

    if let Some(signal) = results.get_str("signal-name") {
        line.push_str(&format!(" {}", signal));
    }
    if let Some(code) = results.get_str("exit-code") {
        line.push_str(&format!(" code={}", code));
    }
    if let Some(frame) = results.get("frame") {
        if let Some(func) = frame.get_str("func") {
            line.push_str(&format!(" in {}", func));
        }
        if let (Some(file), Some(lineno)) = (frame.get_str("file"), frame.get_str("line")) {
            line.push_str(&format!(" at {}:{}", file, lineno));
        }
    }
    line.push(']');
    line
}
