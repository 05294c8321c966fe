use log::debug;
use regex::Regex;
use std::sync::LazyLock;

/// `metadata` / `ametadata` 濾鏡的幀標頭
/// 例如: frame:12   pts:12012   pts_time:12.012
static FRAME_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^frame:\s*\d+\s+pts:\s*-?\d+\s+pts_time:\s*(-?[0-9]+(?:\.[0-9]+)?)")
        .expect("frame header regex")
});

/// 單一幀的量測值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataFrame {
    pub pts_time: f64,
    pub value: f64,
}

/// 解析 `metadata=print:file=-` 的輸出，取出指定 key 的值
///
/// 格式：
/// ```text
/// frame:12   pts:12012   pts_time:12.012
/// lavfi.scene_score=0.456
/// ```
/// 無法辨識的行、沒有幀標頭的值、無法解析的數字都會被略過。
#[must_use]
pub fn parse_metadata_frames(output: &str, key: &str) -> Vec<MetadataFrame> {
    let mut frames = Vec::new();
    let mut current_pts: Option<f64> = None;
    let mut skipped = 0usize;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("frame:") {
            current_pts = FRAME_HEADER
                .captures(line)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .filter(|t| t.is_finite());
            if current_pts.is_none() {
                skipped += 1;
            }
            continue;
        }

        let Some((line_key, raw_value)) = line.split_once('=') else {
            skipped += 1;
            continue;
        };
        if line_key != key {
            continue;
        }

        match (current_pts, raw_value.trim().parse::<f64>()) {
            (Some(pts_time), Ok(value)) if !value.is_nan() => {
                frames.push(MetadataFrame { pts_time, value });
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("略過 {skipped} 行無法解析的 metadata 輸出（key={key}）");
    }

    frames
}
