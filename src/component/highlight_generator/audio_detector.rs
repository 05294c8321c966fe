use super::metadata_parser::{MetadataFrame, parse_metadata_frames};
use super::types::{Event, EventKind};

/// `ebur128` 短期響度（3 秒視窗）的 metadata key
pub const SHORT_TERM_LOUDNESS_KEY: &str = "lavfi.r128.S";

/// 組出 ffmpeg `-af` 濾鏡鏈，每 100ms 輸出一次短期響度
#[must_use]
pub fn audio_filter_graph() -> String {
    format!("ebur128=metadata=1,ametadata=mode=print:key={SHORT_TERM_LOUDNESS_KEY}:file=-")
}

/// 將響度輸出轉換為音量峰值事件
#[must_use]
pub fn parse_audio_peak_events(output: &str, threshold_db: f64) -> Vec<Event> {
    peaks_from_levels(
        &parse_metadata_frames(output, SHORT_TERM_LOUDNESS_KEY),
        threshold_db,
    )
}

/// 響度由低於閾值轉為達到閾值的時間點即為一個峰值
///
/// 持續高於閾值的區段只產生一個事件。
#[must_use]
pub fn peaks_from_levels(levels: &[MetadataFrame], threshold_db: f64) -> Vec<Event> {
    let mut events = Vec::new();
    let mut above = false;

    for frame in levels {
        let is_above = frame.value >= threshold_db;
        if is_above && !above {
            events.push(Event::new(frame.pts_time, EventKind::AudioPeak));
        }
        above = is_above;
    }

    events
}
