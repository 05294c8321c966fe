use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 探測後的影片資訊，建立後不再變動
#[derive(Debug, Clone, PartialEq)]
pub struct VideoHandle {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub frame_rate: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub has_video: bool,
    pub has_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Scene,
    AudioPeak,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scene => write!(f, "場景變換"),
            Self::AudioPeak => write!(f, "音量峰值"),
        }
    }
}

/// 偵測器產生的單一事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub timestamp_seconds: f64,
    pub kind: EventKind,
}

impl Event {
    #[must_use]
    pub const fn new(timestamp_seconds: f64, kind: EventKind) -> Self {
        Self {
            timestamp_seconds,
            kind,
        }
    }
}

/// 嚴格遞增、皆位於 `[0, duration)` 的時間點序列
///
/// 只能透過 [`super::fuse_events`] 或 [`super::synthetic_timestamps`] 建立。
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampSet {
    pub(super) values: Vec<f64>,
    pub(super) synthetic: bool,
}

impl TimestampSet {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 是否為沒有事件時產生的均勻時間點
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}

/// 規劃中的擷取片段
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start_seconds: f64,
    pub duration_seconds: f64,
    /// 在選取結果中的位置，用來還原播放順序
    pub source_index: usize,
}

impl Segment {
    /// 將片段結尾限制在影片長度內
    #[must_use]
    pub fn clamped_to(&self, video_duration: f64) -> Self {
        let remaining = (video_duration - self.start_seconds).max(0.0);
        Self {
            duration_seconds: self.duration_seconds.min(remaining),
            ..*self
        }
    }
}

/// 已寫入暫存檔的片段
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedClip {
    pub segment: Segment,
    pub temp_file_path: PathBuf,
}

/// 成功產生的精華影片與本次執行摘要
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightOutput {
    pub output_path: PathBuf,
    /// 實際合併的片段數
    pub segment_count: usize,
    pub used_synthetic_timestamps: bool,
    pub output_bytes: u64,
    pub source_duration_seconds: f64,
    /// 偵測器回報的原始事件數（合併去重前）
    pub scene_event_count: usize,
    pub audio_peak_count: usize,
    /// 從開始執行到輸出完成的時間
    pub elapsed: Duration,
}

/// 流程階段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Probing,
    Detecting,
    Selecting,
    Extracting,
    Concatenating,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Probing => "讀取影片資訊",
            Self::Detecting => "偵測事件",
            Self::Selecting => "選取片段",
            Self::Extracting => "擷取片段",
            Self::Concatenating => "合併輸出",
            Self::Done => "完成",
            Self::Failed => "失敗",
        };
        write!(f, "{label}")
    }
}
