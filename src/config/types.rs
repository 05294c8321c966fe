use serde::Deserialize;
use std::time::Duration;

/// 精華剪輯設定
///
/// 所有欄位都有預設值，設定檔只需列出要覆寫的項目。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// 場景變換閾值，範圍 (0, 1]，越低越敏感
    pub scene_threshold: f64,
    /// 音量峰值閾值（dB / LUFS）
    pub audio_threshold_db: f64,
    /// 精華長度佔原片的比例
    pub highlight_fraction: f64,
    /// 精華最短長度（秒）
    pub minimum_highlight_seconds: f64,
    /// 每個片段的長度（秒）
    pub segment_length_seconds: f64,
    /// 沒有偵測到任何事件時使用的合成時間點數量
    pub synthetic_timestamp_count: usize,
    /// 同時擷取的片段數，未設定時使用 CPU 平行度
    pub max_concurrent_extractions: Option<usize>,
    /// 輸出容器（副檔名）
    pub output_container: String,
    pub output_video_codec: String,
    pub output_audio_codec: String,
    /// 合併時是否重新編碼；預設直接複製串流
    pub reencode_output: bool,
    /// 每次呼叫外部工具的逾時（秒）
    pub per_job_timeout_seconds: f64,
    /// 輸出檔案的最小合理大小（位元組）
    pub min_output_bytes: u64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            scene_threshold: 0.3,
            audio_threshold_db: -20.0,
            highlight_fraction: 0.2,
            minimum_highlight_seconds: 30.0,
            segment_length_seconds: 3.0,
            synthetic_timestamp_count: 20,
            max_concurrent_extractions: None,
            output_container: "mp4".to_string(),
            output_video_codec: "libx264".to_string(),
            output_audio_codec: "aac".to_string(),
            reencode_output: false,
            per_job_timeout_seconds: 600.0,
            min_output_bytes: 1000,
        }
    }
}

impl HighlightConfig {
    /// 實際使用的擷取平行數
    #[must_use]
    pub fn extraction_workers(&self) -> usize {
        self.max_concurrent_extractions
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(std::num::NonZeroUsize::get)
                    .unwrap_or(4)
            })
            .max(1)
    }

    #[must_use]
    pub fn per_job_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.per_job_timeout_seconds)
    }

    /// 檢查設定值是否在合理範圍內
    pub fn validate(&self) -> Result<(), String> {
        if !(self.scene_threshold > 0.0 && self.scene_threshold <= 1.0) {
            return Err(format!(
                "scene_threshold 必須介於 (0, 1]: {}",
                self.scene_threshold
            ));
        }
        if !self.audio_threshold_db.is_finite() {
            return Err("audio_threshold_db 必須是有限數值".to_string());
        }
        if !(self.highlight_fraction > 0.0 && self.highlight_fraction <= 1.0) {
            return Err(format!(
                "highlight_fraction 必須介於 (0, 1]: {}",
                self.highlight_fraction
            ));
        }
        if !(self.minimum_highlight_seconds >= 0.0 && self.minimum_highlight_seconds.is_finite()) {
            return Err(format!(
                "minimum_highlight_seconds 不可為負數: {}",
                self.minimum_highlight_seconds
            ));
        }
        if !(self.segment_length_seconds > 0.0 && self.segment_length_seconds.is_finite()) {
            return Err(format!(
                "segment_length_seconds 必須大於 0: {}",
                self.segment_length_seconds
            ));
        }
        if self.synthetic_timestamp_count == 0 {
            return Err("synthetic_timestamp_count 必須至少為 1".to_string());
        }
        if self.max_concurrent_extractions == Some(0) {
            return Err("max_concurrent_extractions 必須至少為 1".to_string());
        }
        if self.output_container.is_empty()
            || !self
                .output_container
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(format!(
                "output_container 必須是單純的副檔名: {:?}",
                self.output_container
            ));
        }
        if !(self.per_job_timeout_seconds > 0.0 && self.per_job_timeout_seconds.is_finite()) {
            return Err(format!(
                "per_job_timeout_seconds 必須大於 0: {}",
                self.per_job_timeout_seconds
            ));
        }
        Ok(())
    }
}
