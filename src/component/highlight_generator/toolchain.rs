use super::audio_detector::{audio_filter_graph, parse_audio_peak_events};
use super::scene_detector::{SceneDetectorConfig, parse_scene_events};
use super::types::{Event, EventKind, Segment, VideoHandle};
use crate::error::{HighlightError, HighlightResult};
use crate::tools::{ProcessOutput, RunError, probe_video, run_with_limits};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// 合併輸出的編碼方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcatMode {
    /// 直接複製串流，不重新編碼
    StreamCopy,
    Reencode {
        video_codec: String,
        audio_codec: String,
    },
}

/// 流程所需的媒體處理能力
///
/// 正式環境使用 [`FfmpegToolchain`]；測試可以替換為記憶體內的實作。
pub trait MediaToolchain: Send + Sync {
    /// 確認外部工具可以呼叫
    fn check_available(&self) -> HighlightResult<()>;

    fn probe(&self, path: &Path) -> HighlightResult<VideoHandle>;

    /// 偵測場景變換，`threshold` 範圍 (0, 1]
    fn detect_scenes(&self, video: &VideoHandle, threshold: f64) -> HighlightResult<Vec<Event>>;

    /// 偵測響度超過 `threshold_db` 的時間點
    fn detect_audio_peaks(
        &self,
        video: &VideoHandle,
        threshold_db: f64,
    ) -> HighlightResult<Vec<Event>>;

    /// 以串流複製方式擷取片段，片段長度已限制在影片範圍內
    fn extract_segment(
        &self,
        video: &VideoHandle,
        segment: &Segment,
        output: &Path,
    ) -> HighlightResult<()>;

    /// 依清單順序合併檔案
    fn concatenate(&self, manifest: &Path, output: &Path, mode: &ConcatMode)
    -> HighlightResult<()>;
}

/// 透過 ffmpeg / ffprobe 命令列實作 [`MediaToolchain`]
pub struct FfmpegToolchain {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    timeout: Duration,
    shutdown_signal: Arc<AtomicBool>,
}

impl FfmpegToolchain {
    /// 從 `PATH` 尋找 ffmpeg 與 ffprobe
    #[must_use]
    pub fn discover(timeout: Duration, shutdown_signal: Arc<AtomicBool>) -> Self {
        let ffmpeg = which::which("ffmpeg").ok();
        let ffprobe = which::which("ffprobe").ok();
        debug!("ffmpeg: {ffmpeg:?}, ffprobe: {ffprobe:?}");

        Self {
            ffmpeg,
            ffprobe,
            timeout,
            shutdown_signal,
        }
    }

    /// 設定檔載入後套用實際的逾時
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn ffmpeg_path(&self) -> Option<&Path> {
        self.ffmpeg.as_deref()
    }

    #[must_use]
    pub fn ffprobe_path(&self) -> Option<&Path> {
        self.ffprobe.as_deref()
    }

    fn ffmpeg(&self) -> HighlightResult<&Path> {
        self.ffmpeg
            .as_deref()
            .ok_or_else(|| HighlightError::ToolchainUnavailable("找不到 ffmpeg".to_string()))
    }

    fn ffprobe(&self) -> HighlightResult<&Path> {
        self.ffprobe
            .as_deref()
            .ok_or_else(|| HighlightError::ToolchainUnavailable("找不到 ffprobe".to_string()))
    }

    fn base_command(&self) -> HighlightResult<Command> {
        let mut command = Command::new(self.ffmpeg()?);
        command.args(["-hide_banner", "-nostdin", "-loglevel", "error"]);
        Ok(command)
    }

    fn run(&self, command: Command) -> Result<ProcessOutput, RunError> {
        run_with_limits(command, self.timeout, &self.shutdown_signal)
    }

    fn run_detection(
        &self,
        command: Command,
        kind: EventKind,
        parse: impl FnOnce(&str) -> Vec<Event>,
    ) -> HighlightResult<Vec<Event>> {
        let detection_error = |reason: String| HighlightError::Detection { kind, reason };

        let output = self.run(command).map_err(|e| match e {
            RunError::Cancelled => HighlightError::Cancelled,
            other => detection_error(other.to_string()),
        })?;

        if !output.status.success() {
            return Err(detection_error(format!(
                "ffmpeg 執行失敗: {}",
                output.stderr_tail(3)
            )));
        }

        let events = parse(&output.stdout);
        debug!("{kind}偵測到 {} 個事件", events.len());
        Ok(events)
    }
}

impl MediaToolchain for FfmpegToolchain {
    fn check_available(&self) -> HighlightResult<()> {
        self.ffmpeg()?;
        self.ffprobe()?;
        Ok(())
    }

    fn probe(&self, path: &Path) -> HighlightResult<VideoHandle> {
        probe_video(self.ffprobe()?, path, self.timeout, &self.shutdown_signal)
    }

    fn detect_scenes(&self, video: &VideoHandle, threshold: f64) -> HighlightResult<Vec<Event>> {
        if !video.has_video {
            return Ok(Vec::new());
        }

        let config = SceneDetectorConfig::auto_adjust(video, threshold);
        debug!(
            "場景偵測設定: threshold={}, analyze_fps={}, scale_width={}",
            config.threshold, config.analyze_fps, config.scale_width
        );

        let mut command = self.base_command()?;
        command
            .arg("-i")
            .arg(&video.path)
            .args(["-an", "-sn", "-dn", "-vf", &config.filter_graph()])
            .args(["-f", "null", "-"]);

        self.run_detection(command, EventKind::Scene, parse_scene_events)
    }

    fn detect_audio_peaks(
        &self,
        video: &VideoHandle,
        threshold_db: f64,
    ) -> HighlightResult<Vec<Event>> {
        if !video.has_audio {
            return Ok(Vec::new());
        }

        let mut command = self.base_command()?;
        command
            .arg("-i")
            .arg(&video.path)
            .args(["-vn", "-sn", "-dn", "-af", &audio_filter_graph()])
            .args(["-f", "null", "-"]);

        self.run_detection(command, EventKind::AudioPeak, |stdout| {
            parse_audio_peak_events(stdout, threshold_db)
        })
    }

    fn extract_segment(
        &self,
        video: &VideoHandle,
        segment: &Segment,
        output: &Path,
    ) -> HighlightResult<()> {
        let extraction_error = |reason: String| HighlightError::SegmentExtraction {
            index: segment.source_index,
            start_seconds: segment.start_seconds,
            reason,
        };

        let mut command = self.base_command()?;
        command
            .args(["-ss", &format!("{:.3}", segment.start_seconds)])
            .arg("-i")
            .arg(&video.path)
            .args(["-t", &format!("{:.3}", segment.duration_seconds)])
            .args(["-map", "0:v:0?", "-map", "0:a:0?"])
            .args(["-c", "copy", "-avoid_negative_ts", "make_zero", "-y"])
            .arg(output);

        let result = self.run(command).map_err(|e| match e {
            RunError::Cancelled => HighlightError::Cancelled,
            other => extraction_error(other.to_string()),
        })?;

        if !result.status.success() {
            return Err(extraction_error(format!(
                "ffmpeg 執行失敗: {}",
                result.stderr_tail(3)
            )));
        }

        Ok(())
    }

    fn concatenate(
        &self,
        manifest: &Path,
        output: &Path,
        mode: &ConcatMode,
    ) -> HighlightResult<()> {
        let concat_error = |reason: String| HighlightError::OutputValidation {
            path: output.to_path_buf(),
            reason,
        };

        let mut command = self.base_command()?;
        command
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(manifest);

        match mode {
            ConcatMode::StreamCopy => {
                command.args(["-c", "copy"]);
            }
            ConcatMode::Reencode {
                video_codec,
                audio_codec,
            } => {
                command
                    .args(["-c:v", video_codec.as_str(), "-pix_fmt", "yuv420p"])
                    .args(["-c:a", audio_codec.as_str()]);
            }
        }

        if is_mp4_family(output) {
            command.args(["-movflags", "+faststart"]);
        }
        command.arg("-y").arg(output);

        let result = self.run(command).map_err(|e| match e {
            RunError::Cancelled => HighlightError::Cancelled,
            other => concat_error(other.to_string()),
        })?;

        if !result.status.success() {
            return Err(concat_error(format!(
                "ffmpeg 合併失敗: {}",
                result.stderr_tail(3)
            )));
        }

        Ok(())
    }
}

/// `-movflags` 只對 MP4 / MOV 系列容器有效
fn is_mp4_family(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "mp4" | "m4v" | "mov"
            )
        })
}
