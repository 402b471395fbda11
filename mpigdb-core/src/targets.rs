//! ターゲット指定（ランク番号の列）のパース
//!
//! `target-spec := item (',' item)*`、`item := int | int '-' int`
//!
//! 範囲は両端を含み、昇順に展開されます。要素間の重複や順序は
//! 入力のまま保持します。

use crate::errors::TargetParseError;
use crate::host::InferiorId;
use std::str::FromStr;

/// 1つの範囲が展開できる要素数の上限
pub const MAX_RANGE_LEN: u32 = 65536;

/// ターゲット指定文字列をinferior番号の列にパースする
///
/// # Examples
/// ```
/// use mpigdb_core::targets::parse_targets;
///
/// assert_eq!(parse_targets("1,3-5,9").unwrap(), vec![1, 3, 4, 5, 9]);
/// assert_eq!(parse_targets("7").unwrap(), vec![7]);
/// ```
pub fn parse_targets(spec: &str) -> Result<Vec<InferiorId>, TargetParseError> {
    let mut targets = Vec::new();

    for item in spec.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(TargetParseError::Empty {
                spec: spec.to_string(),
            });
        }

        match item.split_once('-') {
            Some((start, stop)) => {
                if stop.contains('-') {
                    return Err(TargetParseError::MalformedRange {
                        token: item.to_string(),
                    });
                }
                let start = parse_bound(start, item)?;
                let stop = parse_bound(stop, item)?;
                if start > stop {
                    return Err(TargetParseError::ReversedRange {
                        token: item.to_string(),
                    });
                }
                if stop - start >= MAX_RANGE_LEN {
                    return Err(TargetParseError::RangeTooLarge {
                        token: item.to_string(),
                        max: MAX_RANGE_LEN,
                    });
                }
                targets.extend(start..=stop);
            }
            None => targets.push(parse_number(item)?),
        }
    }

    Ok(targets)
}

/// 範囲の端点をパースする（空の端点は範囲の形式エラー）
fn parse_bound(bound: &str, item: &str) -> Result<InferiorId, TargetParseError> {
    let bound = bound.trim();
    if bound.is_empty() {
        return Err(TargetParseError::MalformedRange {
            token: item.to_string(),
        });
    }
    parse_number(bound)
}

fn parse_number(token: &str) -> Result<InferiorId, TargetParseError> {
    token
        .parse::<InferiorId>()
        .map_err(|_| TargetParseError::InvalidNumber {
            token: token.to_string(),
        })
}

/// `-t` オプション1回分のターゲット指定
///
/// `-t` は複数回指定でき、それぞれの値を順に連結して一つのターゲット列にします。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetList(pub Vec<InferiorId>);

impl FromStr for TargetList {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_targets(s).map(TargetList)
    }
}

/// 複数の `-t` 指定を一つの列にまとめる
pub fn flatten(lists: &[TargetList]) -> Vec<InferiorId> {
    lists.iter().flat_map(|l| l.0.iter().copied()).collect()
}
