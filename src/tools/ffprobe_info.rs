use crate::component::highlight_generator::VideoHandle;
use crate::error::{HighlightError, HighlightResult};
use crate::tools::process_runner::{RunError, run_with_limits};
use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

/// 使用 ffprobe 取得影片資訊
pub fn probe_video(
    ffprobe: &Path,
    path: &Path,
    timeout: Duration,
    shutdown_signal: &AtomicBool,
) -> HighlightResult<VideoHandle> {
    let mut command = Command::new(ffprobe);
    command
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path);

    let output = run_with_limits(command, timeout, shutdown_signal).map_err(|e| match e {
        RunError::Cancelled => HighlightError::Cancelled,
        other => probe_error(path, other.to_string()),
    })?;

    if !output.status.success() {
        return Err(probe_error(
            path,
            format!("ffprobe 執行失敗: {}", output.stderr_tail(3)),
        ));
    }

    parse_ffprobe_output(path, &output.stdout)
}

/// 解析 ffprobe 的 JSON 輸出
pub fn parse_ffprobe_output(path: &Path, json: &str) -> HighlightResult<VideoHandle> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| probe_error(path, format!("無法解析 ffprobe 輸出: {e}")))?;

    let streams = probe.streams.unwrap_or_default();
    let video_stream = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    if video_stream.is_none() && !has_audio {
        return Err(probe_error(path, "找不到視訊或音訊串流".to_string()));
    }

    // 取得影片長度（優先從 format，其次從任一串流）
    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            streams
                .iter()
                .filter_map(|s| s.duration.as_deref())
                .find_map(|d| d.parse::<f64>().ok())
        })
        .ok_or_else(|| probe_error(path, "無法取得影片長度".to_string()))?;

    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Err(probe_error(
            path,
            format!("影片長度無效: {duration_seconds}"),
        ));
    }

    let frame_rate = video_stream
        .and_then(|s| s.r_frame_rate.as_deref())
        .and_then(parse_frame_rate);

    let handle = VideoHandle {
        path: path.to_path_buf(),
        duration_seconds,
        frame_rate,
        width: video_stream.and_then(|s| s.width),
        height: video_stream.and_then(|s| s.height),
        has_video: video_stream.is_some(),
        has_audio,
    };

    debug!(
        "影片資訊: {:.2}s, {:?}x{:?}, fps={:?}, audio={}",
        handle.duration_seconds, handle.width, handle.height, handle.frame_rate, handle.has_audio
    );

    Ok(handle)
}

/// 解析幀率字串（例如 "30/1" 或 "30000/1001"）
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: f64 = num_str.parse().ok()?;
        let den: f64 = den_str.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.parse().ok().filter(|r: &f64| *r > 0.0)
}

fn probe_error(path: &Path, reason: String) -> HighlightError {
    HighlightError::Probe {
        path: path.to_path_buf(),
        reason,
    }
}
