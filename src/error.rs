//! 精華剪輯流程的錯誤分類
//!
//! 每個致命錯誤都對應一個固定的分類名稱（見 [`HighlightError::category`]），
//! CLI 以此分類作為失敗輸出。清理失敗只記錄警告，不屬於此列舉。

use crate::component::highlight_generator::EventKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HighlightError {
    /// 找不到 ffmpeg / ffprobe，任何階段都不會執行
    #[error("媒體工具無法使用: {0}")]
    ToolchainUnavailable(String),

    #[error("無法讀取影片資訊 {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    /// 單一偵測器失敗；流程會改用其他偵測器或合成時間點
    #[error("{kind}偵測失敗: {reason}")]
    Detection { kind: EventKind, reason: String },

    #[error("片段 {index} 擷取失敗（起點 {start_seconds:.3}s）: {reason}")]
    SegmentExtraction {
        index: usize,
        start_seconds: f64,
        reason: String,
    },

    #[error("輸出檔案驗證失敗 {}: {reason}", path.display())]
    OutputValidation { path: PathBuf, reason: String },

    #[error("設定值無效: {0}")]
    InvalidConfig(String),

    #[error("操作已取消")]
    Cancelled,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl HighlightError {
    /// 對外顯示的錯誤分類
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::ToolchainUnavailable(_) => "ToolchainUnavailable",
            Self::Probe { .. } => "ProbeError",
            Self::Detection { .. } => "DetectionError",
            Self::SegmentExtraction { .. } => "SegmentExtractionError",
            Self::OutputValidation { .. } => "OutputValidationError",
            Self::InvalidConfig(_) => "ConfigError",
            Self::Cancelled => "Cancelled",
            Self::Io { .. } => "IoError",
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type HighlightResult<T> = Result<T, HighlightError>;
