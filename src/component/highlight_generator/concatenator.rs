use super::toolchain::{ConcatMode, MediaToolchain};
use super::types::ExtractedClip;
use crate::error::{HighlightError, HighlightResult};
use log::{debug, info};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// 合併清單檔名（位於暫存目錄）
pub const MANIFEST_FILE_NAME: &str = "concat_list.txt";

/// 依 `source_index` 排序片段，與擷取完成順序無關
#[must_use]
pub fn order_clips(mut clips: Vec<ExtractedClip>) -> Vec<ExtractedClip> {
    clips.sort_by_key(|clip| clip.segment.source_index);
    clips
}

/// 產生 ffmpeg concat demuxer 清單內容
///
/// 路徑中的單引號需跳脫為 `'\''`。
#[must_use]
pub fn build_manifest(clips: &[ExtractedClip]) -> String {
    clips.iter().fold(String::new(), |mut manifest, clip| {
        let path = clip.temp_file_path.to_string_lossy().replace('\'', r"'\''");
        let _ = writeln!(manifest, "file '{path}'");
        manifest
    })
}

/// 檢查輸出檔案存在且大小合理
pub fn validate_output(path: &Path, min_bytes: u64) -> HighlightResult<u64> {
    let validation_error = |reason: String| HighlightError::OutputValidation {
        path: path.to_path_buf(),
        reason,
    };

    let size = fs::metadata(path)
        .map_err(|_| validation_error("輸出檔案不存在".to_string()))?
        .len();

    if size < min_bytes {
        return Err(validation_error(format!(
            "輸出檔案過小: {size} bytes（至少需要 {min_bytes} bytes）"
        )));
    }

    Ok(size)
}

/// 合併所有片段到 `staging_path`，驗證後移動到 `output_path`
///
/// 驗證失敗時不會碰觸 `output_path`，因此不會留下不完整的輸出。
/// 回傳最終檔案大小。
pub fn concatenate_clips(
    toolchain: &dyn MediaToolchain,
    clips: Vec<ExtractedClip>,
    work_dir: &Path,
    staging_path: &Path,
    output_path: &Path,
    mode: &ConcatMode,
    min_output_bytes: u64,
) -> HighlightResult<u64> {
    if clips.is_empty() {
        return Err(HighlightError::OutputValidation {
            path: output_path.to_path_buf(),
            reason: "沒有可合併的片段".to_string(),
        });
    }

    let clips = order_clips(clips);
    let manifest_path = work_dir.join(MANIFEST_FILE_NAME);
    fs::write(&manifest_path, build_manifest(&clips))
        .map_err(|e| HighlightError::io(format!("無法寫入合併清單 {}", manifest_path.display()), e))?;

    debug!(
        "合併 {} 個片段，清單: {}",
        clips.len(),
        manifest_path.display()
    );

    toolchain.concatenate(&manifest_path, staging_path, mode)?;
    let size = validate_output(staging_path, min_output_bytes)?;

    fs::rename(staging_path, output_path).map_err(|e| {
        HighlightError::io(
            format!(
                "無法移動輸出檔案 {} -> {}",
                staging_path.display(),
                output_path.display()
            ),
            e,
        )
    })?;

    info!(
        "精華影片已建立: {} ({size} bytes)",
        output_path.display()
    );

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::highlight_generator::Segment;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn clip(source_index: usize, path: &str) -> ExtractedClip {
        ExtractedClip {
            segment: Segment {
                start_seconds: source_index as f64 * 10.0,
                duration_seconds: 3.0,
                source_index,
            },
            temp_file_path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_order_clips_by_source_index() {
        let clips = vec![clip(2, "/w/c.mp4"), clip(0, "/w/a.mp4"), clip(1, "/w/b.mp4")];
        let ordered = order_clips(clips);
        let indices: Vec<usize> = ordered.iter().map(|c| c.segment.source_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_build_manifest() {
        let clips = vec![clip(0, "/w/a.mp4"), clip(1, "/w/it's.mp4")];
        let manifest = build_manifest(&clips);
        assert_eq!(manifest, "file '/w/a.mp4'\nfile '/w/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_validate_output() {
        let dir = tempdir().unwrap();
        let small = dir.path().join("small.mp4");
        let large = dir.path().join("large.mp4");
        fs::write(&small, vec![0u8; 10]).unwrap();
        fs::write(&large, vec![0u8; 2048]).unwrap();

        assert_eq!(validate_output(&large, 1000).unwrap(), 2048);

        let err = validate_output(&small, 1000).unwrap_err();
        assert_eq!(err.category(), "OutputValidationError");

        let err = validate_output(&dir.path().join("missing.mp4"), 1000).unwrap_err();
        assert_eq!(err.category(), "OutputValidationError");
    }
}
