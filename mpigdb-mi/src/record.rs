//! GDB/MI 出力レコードのパーサ
//!
//! 1行が1レコードに対応します。
//!
//! ```text
//! output  := result-record | async-record | stream-record | "(gdb)"
//! result  := [token] "^" class ("," variable "=" value)*
//! async   := [token] ("*" | "+" | "=") class ("," variable "=" value)*
//! stream  := ("~" | "@" | "&") c-string
//! value   := c-string | "{" results "}" | "[" (values | results) "]"
//! ```

use crate::error::MiError;

/// MIの値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Const(String),
    Tuple(Results),
    /// リスト。`[frame={..},frame={..}]` のような結果のリストは名前を落として値のみ保持する
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Const(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Results> {
        match self {
            Value::Tuple(results) => Some(results),
            _ => None,
        }
    }

    /// タプルのフィールドを取得する
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_tuple()?.get(key)
    }

    /// タプルの文字列フィールドを取得する
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }
}

/// `variable=value` の列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results(pub Vec<(String, Value)>);

impl Results {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        self.get(key)?.as_list()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    /// `*` 実行状態の変化
    Exec,
    /// `+` 進捗
    Status,
    /// `=` 通知
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `~` コンソール出力
    Console,
    /// `@` ターゲットの出力
    Target,
    /// `&` gdb内部のログ
    Log,
}

/// MI出力レコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Result {
        token: Option<u64>,
        class: ResultClass,
        results: Results,
    },
    Async {
        token: Option<u64>,
        kind: AsyncKind,
        class: String,
        results: Results,
    },
    Stream {
        kind: StreamKind,
        text: String,
    },
    Prompt,
}

/// MI出力の1行をパースする
///
/// 空行は `Ok(None)` になります。
pub fn parse_record(line: &str) -> Result<Option<Record>, MiError> {
    let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
    if line.trim().is_empty() {
        return Ok(None);
    }
    if line.trim_end() == "(gdb)" {
        return Ok(Some(Record::Prompt));
    }

    let mut cursor = Cursor::new(line);
    cursor.parse_record().map(Some)
}

struct Cursor<'a> {
    line: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            bytes: line.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, reason: &'static str) -> MiError {
        MiError::Parse {
            line: self.line.to_string(),
            column: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, expected: u8, reason: &'static str) -> Result<(), MiError> {
        match self.bump() {
            Some(b) if b == expected => Ok(()),
            _ => Err(self.error(reason)),
        }
    }

    fn parse_record(&mut self) -> Result<Record, MiError> {
        let token = self.parse_token();
        match self.bump() {
            Some(b'^') => {
                let class = match self.parse_word() {
                    "done" => ResultClass::Done,
                    "running" => ResultClass::Running,
                    "connected" => ResultClass::Connected,
                    "error" => ResultClass::Error,
                    "exit" => ResultClass::Exit,
                    _ => return Err(self.error("unknown result class")),
                };
                let results = self.parse_trailing_results()?;
                Ok(Record::Result {
                    token,
                    class,
                    results,
                })
            }
            Some(marker @ (b'*' | b'+' | b'=')) => {
                let kind = match marker {
                    b'*' => AsyncKind::Exec,
                    b'+' => AsyncKind::Status,
                    _ => AsyncKind::Notify,
                };
                let class = self.parse_word().to_string();
                if class.is_empty() {
                    return Err(self.error("missing async class"));
                }
                let results = self.parse_trailing_results()?;
                Ok(Record::Async {
                    token,
                    kind,
                    class,
                    results,
                })
            }
            Some(marker @ (b'~' | b'@' | b'&')) if token.is_none() => {
                let kind = match marker {
                    b'~' => StreamKind::Console,
                    b'@' => StreamKind::Target,
                    _ => StreamKind::Log,
                };
                let text = self.parse_cstring()?;
                Ok(Record::Stream { kind, text })
            }
            _ => Err(self.error("unknown record type")),
        }
    }

    fn parse_token(&mut self) -> Option<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let line = self.line;
        line[start..self.pos].parse().ok()
    }

    /// クラス名・変数名（`,` `=` `{` `[` 以外の連続）
    fn parse_word(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b',' | b'=' | b'{' | b'}' | b'[' | b']' | b'"') {
                break;
            }
            self.pos += 1;
        }
        let line = self.line;
        &line[start..self.pos]
    }

    fn parse_trailing_results(&mut self) -> Result<Results, MiError> {
        let mut results = Vec::new();
        while self.peek() == Some(b',') {
            self.pos += 1;
            results.push(self.parse_result()?);
        }
        if self.pos != self.bytes.len() {
            return Err(self.error("trailing characters"));
        }
        Ok(Results(results))
    }

    fn parse_result(&mut self) -> Result<(String, Value), MiError> {
        let name = self.parse_word().to_string();
        if name.is_empty() {
            return Err(self.error("missing variable name"));
        }
        self.expect(b'=', "expected '='")?;
        let value = self.parse_value()?;
        Ok((name, value))
    }

    fn parse_value(&mut self) -> Result<Value, MiError> {
        match self.peek() {
            Some(b'"') => self.parse_cstring().map(Value::Const),
            Some(b'{') => {
                self.pos += 1;
                let mut results = Vec::new();
                if self.peek() != Some(b'}') {
                    loop {
                        results.push(self.parse_result()?);
                        if self.peek() == Some(b',') {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(b'}', "expected '}'")?;
                Ok(Value::Tuple(Results(results)))
            }
            Some(b'[') => {
                self.pos += 1;
                let mut items = Vec::new();
                if self.peek() != Some(b']') {
                    loop {
                        let item = if matches!(self.peek(), Some(b'"' | b'{' | b'[')) {
                            self.parse_value()?
                        } else {
                            self.parse_result()?.1
                        };
                        items.push(item);
                        if self.peek() == Some(b',') {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(b']', "expected ']'")?;
                Ok(Value::List(items))
            }
            _ => Err(self.error("expected value")),
        }
    }

    /// Cスタイルの文字列リテラルをデコードする（8進エスケープを含む）
    fn parse_cstring(&mut self) -> Result<String, MiError> {
        self.expect(b'"', "expected '\"'")?;
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b'a') => out.push(0x07),
                    Some(b'b') => out.push(0x08),
                    Some(b'f') => out.push(0x0c),
                    Some(b'v') => out.push(0x0b),
                    Some(b'e') => out.push(0x1b),
                    Some(d @ b'0'..=b'7') => {
                        let mut code = u32::from(d - b'0');
                        for _ in 0..2 {
                            match self.peek() {
                                Some(d @ b'0'..=b'7') => {
                                    code = code * 8 + u32::from(d - b'0');
                                    self.pos += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push((code & 0xff) as u8);
                    }
                    Some(other) => out.push(other),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(b) => out.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// 文字列をMIのCスタイル文字列リテラルにクォートする
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Record {
        parse_record(line).unwrap().unwrap()
    }

    #[test]
    fn test_prompt_and_empty() {
        assert_eq!(parse("(gdb) "), Record::Prompt);
        assert_eq!(parse_record("").unwrap(), None);
    }

    #[test]
    fn test_result_done_with_value() {
        match parse(r#"12^done,value="42""#) {
            Record::Result {
                token,
                class,
                results,
            } => {
                assert_eq!(token, Some(12));
                assert_eq!(class, ResultClass::Done);
                assert_eq!(results.get_str("value"), Some("42"));
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_result_error() {
        match parse(r#"3^error,msg="No symbol \"foo\" in current context.""#) {
            Record::Result { class, results, .. } => {
                assert_eq!(class, ResultClass::Error);
                assert_eq!(
                    results.get_str("msg"),
                    Some("No symbol \"foo\" in current context.")
                );
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_thread_groups() {
        let line = r#"5^done,groups=[{id="i1",type="process",pid="123",executable="/tmp/a.out"},{id="i2",type="process"}]"#;
        let Record::Result { results, .. } = parse(line) else {
            panic!("expected result record");
        };
        let groups = results.get_list("groups").unwrap();
        let ids: Vec<_> = groups.iter().filter_map(|g| g.get_str("id")).collect();
        assert_eq!(ids, vec!["i1", "i2"]);
    }

    #[test]
    fn test_threads_of_group() {
        let line = r#"7^done,threads=[{id="1",target-id="Thread 0x7f (LWP 10)",frame={level="0",addr="0x401136",func="main",args=[],file="crash.cc",line="17"},state="stopped",core="3"},{id="4",target-id="LWP 11",state="running"}]"#;
        let Record::Result { results, .. } = parse(line) else {
            panic!("expected result record");
        };
        let threads = results.get_list("threads").unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].get_str("state"), Some("stopped"));
        assert_eq!(
            threads[0].get("frame").and_then(|f| f.get_str("func")),
            Some("main")
        );
        assert_eq!(threads[1].get_str("id"), Some("4"));
    }

    #[test]
    fn test_async_stopped() {
        let line = r#"*stopped,reason="breakpoint-hit",disp="keep",bkptno="1",frame={addr="0x1",func="foo",args=[{name="rank",value="..."}]},thread-id="2",stopped-threads=["2"]"#;
        match parse(line) {
            Record::Async {
                kind,
                class,
                results,
                ..
            } => {
                assert_eq!(kind, AsyncKind::Exec);
                assert_eq!(class, "stopped");
                assert_eq!(results.get_str("thread-id"), Some("2"));
                assert_eq!(results.get_list("stopped-threads").unwrap().len(), 1);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_notify_without_results() {
        match parse("=thread-group-added,id=\"i2\"") {
            Record::Async { kind, class, .. } => {
                assert_eq!(kind, AsyncKind::Notify);
                assert_eq!(class, "thread-group-added");
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert!(matches!(
            parse("*running,thread-id=\"all\""),
            Record::Async { kind: AsyncKind::Exec, .. }
        ));
    }

    #[test]
    fn test_result_list_drops_names() {
        let line = r#"^done,stack=[frame={level="0",func="foo"},frame={level="1",func="main"}]"#;
        let Record::Result { results, .. } = parse(line) else {
            panic!("expected result record");
        };
        let frames = results.get_list("stack").unwrap();
        assert_eq!(frames[1].get_str("func"), Some("main"));
    }

    #[test]
    fn test_stream_escapes() {
        assert_eq!(
            parse(r#"~"Breakpoint 1 at 0x401136: file crash.cc, line 6.\n""#),
            Record::Stream {
                kind: StreamKind::Console,
                text: "Breakpoint 1 at 0x401136: file crash.cc, line 6.\n".into(),
            }
        );
        assert_eq!(
            parse(r#"@"hi \303\251\t0""#),
            Record::Stream {
                kind: StreamKind::Target,
                text: "hi é\t0".into(),
            }
        );
    }

    #[test]
    fn test_malformed() {
        assert!(parse_record("^bogus").is_err());
        assert!(parse_record("^done,value=\"open").is_err());
        assert!(parse_record("^done,value=42").is_err());
        assert!(parse_record("hello").is_err());
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote(r#"print "a\b""#), r#""print \"a\\b\"""#);
    }
}
