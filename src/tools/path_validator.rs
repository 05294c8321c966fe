use crate::error::{HighlightError, HighlightResult};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// 確認輸入檔案存在且為一般檔案
pub fn validate_input_file(path: &Path) -> HighlightResult<()> {
    let reason = if !path.exists() {
        "路徑不存在"
    } else if !path.is_file() {
        "路徑不是檔案"
    } else {
        return Ok(());
    };

    Err(HighlightError::Probe {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    })
}

/// 產生輸出路徑：與輸入同目錄的 `<檔名>_highlights.<副檔名>`
///
/// 檔名以 `OsString` 組合，非 UTF-8 的檔名也會原樣保留。
#[must_use]
pub fn highlight_output_path(input: &Path, container: &str) -> PathBuf {
    let mut file_name = input
        .file_stem()
        .map_or_else(|| OsString::from("output"), OsStr::to_os_string);
    file_name.push(format!("_highlights.{container}"));

    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(file_name)
}
