//! エラー型とエラーメッセージ定数

use thiserror::Error;

/// ターゲット指定のパースエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetParseError {
    /// カンマ区切りの要素が空
    #[error("empty target in '{spec}'")]
    Empty { spec: String },

    /// 整数として解釈できない
    #[error("invalid target number '{token}'")]
    InvalidNumber { token: String },

    /// 範囲の形式が不正（ハイフンが複数、または端点が欠けている）
    #[error("malformed target range '{token}'")]
    MalformedRange { token: String },

    /// 開始が終了より大きい範囲
    #[error("reversed target range '{token}' (start must not exceed stop)")]
    ReversedRange { token: String },

    /// 展開すると要素数が上限を超える範囲
    #[error("target range '{token}' is too large (at most {max} ranks)")]
    RangeTooLarge { token: String, max: u32 },
}

/// 引数のクォートが閉じていない場合のエラーメッセージ
pub const ERR_UNBALANCED_QUOTES: &str = "Unbalanced quotes in arguments";
