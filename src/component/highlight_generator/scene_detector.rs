use super::metadata_parser::parse_metadata_frames;
use super::types::{Event, EventKind, VideoHandle};

/// `select` 濾鏡輸出的場景分數 key
pub const SCENE_SCORE_KEY: &str = "lavfi.scene_score";

/// 場景偵測設定
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDetectorConfig {
    /// 場景變換閾值 (0, 1]，越低越敏感
    pub threshold: f64,
    /// 分析用的 FPS，越低越快但可能漏掉短鏡頭
    pub analyze_fps: f64,
    /// 縮放到的寬度（加速分析）
    pub scale_width: u32,
}

impl SceneDetectorConfig {
    /// 根據影片長度自動調整分析 FPS
    #[must_use]
    pub fn auto_adjust(video: &VideoHandle, threshold: f64) -> Self {
        let duration = video.duration_seconds;

        let analyze_fps = if duration > 7200.0 {
            // > 2 小時
            0.5
        } else if duration > 3600.0 {
            // > 1 小時
            1.0
        } else {
            2.0
        };

        Self {
            threshold,
            analyze_fps,
            scale_width: 320,
        }
    }

    /// 組出 ffmpeg `-vf` 濾鏡鏈，場景分數以 metadata 格式輸出到 stdout
    #[must_use]
    pub fn filter_graph(&self) -> String {
        format!(
            "scale={}:-2,fps={},select='gt(scene\\,{:.4})',metadata=print:file=-",
            self.scale_width, self.analyze_fps, self.threshold
        )
    }
}

/// 將 metadata 輸出轉換為場景事件
///
/// `select` 只會留下分數超過閾值的幀，每一幀即是一個場景變換點。
#[must_use]
pub fn parse_scene_events(output: &str) -> Vec<Event> {
    parse_metadata_frames(output, SCENE_SCORE_KEY)
        .into_iter()
        .map(|frame| Event::new(frame.pts_time, EventKind::Scene))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn video_with_duration(duration_seconds: f64) -> VideoHandle {
        VideoHandle {
            path: PathBuf::from("/videos/a.mp4"),
            duration_seconds,
            frame_rate: Some(30.0),
            width: Some(1920),
            height: Some(1080),
            has_video: true,
            has_audio: true,
        }
    }

    #[test]
    fn test_config_auto_adjust() {
        let config = SceneDetectorConfig::auto_adjust(&video_with_duration(600.0), 0.3);
        assert!((config.analyze_fps - 2.0).abs() < 0.01);
        assert!((config.threshold - 0.3).abs() < 0.01);

        let config = SceneDetectorConfig::auto_adjust(&video_with_duration(5000.0), 0.3);
        assert!((config.analyze_fps - 1.0).abs() < 0.01);

        let config = SceneDetectorConfig::auto_adjust(&video_with_duration(7500.0), 0.3);
        assert!((config.analyze_fps - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_filter_graph() {
        let config = SceneDetectorConfig {
            threshold: 0.25,
            analyze_fps: 2.0,
            scale_width: 320,
        };
        let filter = config.filter_graph();
        assert!(filter.starts_with("scale=320:-2,fps=2,"));
        assert!(filter.contains("gt(scene\\,0.2500)"));
        assert!(filter.ends_with("metadata=print:file=-"));
    }

    #[test]
    fn test_parse_scene_events() {
        let output = "\
frame:0    pts:22      pts_time:11.5
lavfi.scene_score=0.412
frame:1    pts:61      pts_time:30.5
lavfi.scene_score=0.887
";
        let events = parse_scene_events(output);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == EventKind::Scene));
        assert!((events[0].timestamp_seconds - 11.5).abs() < 1e-9);
        assert!((events[1].timestamp_seconds - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_scene_events_empty() {
        assert!(parse_scene_events("").is_empty());
    }
}
