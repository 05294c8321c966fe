use super::concatenator::concatenate_clips;
use super::segment_extractor::{create_extraction_tasks, extract_segments_parallel};
use super::timestamp_selector::{SelectionPlan, fuse_or_synthesize, plan_segments};
use super::toolchain::{ConcatMode, MediaToolchain};
use super::types::{Event, EventKind, HighlightOutput, PipelineStage, Segment, VideoHandle};
use crate::config::HighlightConfig;
use crate::error::{HighlightError, HighlightResult};
use crate::tools::{WorkerPool, highlight_output_path, validate_input_file};
use log::{debug, error, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tempfile::TempDir;

/// 精華影片產生器
///
/// 流程：
/// 1. 讀取影片資訊（ffprobe）
/// 2. 平行偵測場景變換與音量峰值
/// 3. 合併時間點並選出片段
/// 4. 平行擷取片段到暫存目錄
/// 5. 依原始順序合併、驗證並輸出
///
/// 暫存目錄在擷取階段建立，無論成功、失敗或中斷都會在回傳前清除。
pub struct HighlightGenerator {
    config: HighlightConfig,
    toolchain: Arc<dyn MediaToolchain>,
    shutdown_signal: Arc<AtomicBool>,
    show_progress: bool,
}

impl HighlightGenerator {
    pub fn new(
        config: HighlightConfig,
        toolchain: Arc<dyn MediaToolchain>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            toolchain,
            shutdown_signal,
            show_progress: false,
        }
    }

    /// 擷取時是否顯示進度條
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        highlight_output_path(input, &self.config.output_container)
    }

    /// 執行完整流程，成功時回傳輸出檔案資訊與執行摘要
    pub fn run(&self, input: &Path) -> HighlightResult<HighlightOutput> {
        let started = Instant::now();
        let mut stage = PipelineStage::Probing;
        let result = self
            .run_stages(input, &mut stage, started)
            .map_err(|e| self.interrupted_as_cancelled(e));

        match &result {
            Ok(output) => info!(
                "精華影片完成: {} ({} 個片段，場景變換 {} / 音量峰值 {}，原片 {:.1}s，耗時 {:.2}s)",
                output.output_path.display(),
                output.segment_count,
                output.scene_event_count,
                output.audio_peak_count,
                output.source_duration_seconds,
                output.elapsed.as_secs_f64()
            ),
            Err(e) => {
                let failed_at = stage;
                enter_stage(&mut stage, PipelineStage::Failed);
                error!("流程於「{failed_at}」階段失敗 [{}]: {e}", e.category());
            }
        }

        result
    }

    fn run_stages(
        &self,
        input: &Path,
        stage: &mut PipelineStage,
        started: Instant,
    ) -> HighlightResult<HighlightOutput> {
        self.toolchain.check_available()?;
        self.config
            .validate()
            .map_err(HighlightError::InvalidConfig)?;
        validate_input_file(input)?;

        enter_stage(stage, PipelineStage::Probing);
        let video = self.toolchain.probe(input)?;
        info!(
            "影片長度 {:.1}s，解析度 {}",
            video.duration_seconds,
            video
                .width
                .zip(video.height)
                .map_or_else(|| "未知".to_string(), |(w, h)| format!("{w}x{h}"))
        );
        self.check_cancelled()?;

        enter_stage(stage, PipelineStage::Detecting);
        let events = self.detect_events(&video)?;
        let scene_event_count = events
            .iter()
            .filter(|e| e.kind == EventKind::Scene)
            .count();
        let audio_peak_count = events.len() - scene_event_count;
        self.check_cancelled()?;

        enter_stage(stage, PipelineStage::Selecting);
        let timestamps = fuse_or_synthesize(
            &events,
            video.duration_seconds,
            self.config.synthetic_timestamp_count,
        );
        let segments = plan_segments(&timestamps, &self.selection_plan(), video.duration_seconds);
        info!(
            "{} 個時間點{}，選出 {} 個片段",
            timestamps.len(),
            if timestamps.is_synthetic() {
                "（均勻合成）"
            } else {
                ""
            },
            segments.len()
        );

        enter_stage(stage, PipelineStage::Extracting);
        let output_path = self.output_path_for(input);
        let work_dir = create_work_dir(input)?;
        let result = self.extract_and_concatenate(
            &video,
            &segments,
            work_dir.path(),
            &output_path,
            stage,
        );
        cleanup_work_dir(work_dir);
        let (output_bytes, segment_count) = result?;

        enter_stage(stage, PipelineStage::Done);
        Ok(HighlightOutput {
            output_path,
            segment_count,
            used_synthetic_timestamps: timestamps.is_synthetic(),
            output_bytes,
            source_duration_seconds: video.duration_seconds,
            scene_event_count,
            audio_peak_count,
            elapsed: started.elapsed(),
        })
    }

    /// 平行執行兩個偵測器
    ///
    /// 單一偵測器失敗只記錄警告；全部失敗時回傳空列表，由選取階段改用合成時間點。
    fn detect_events(&self, video: &VideoHandle) -> HighlightResult<Vec<Event>> {
        let (scenes, peaks) = rayon::join(
            || {
                self.toolchain
                    .detect_scenes(video, self.config.scene_threshold)
            },
            || {
                self.toolchain
                    .detect_audio_peaks(video, self.config.audio_threshold_db)
            },
        );

        let mut events = Vec::new();
        let mut failed = 0;

        for (kind, result) in [(EventKind::Scene, scenes), (EventKind::AudioPeak, peaks)] {
            match result {
                Ok(found) => {
                    info!("{kind}: {} 個事件", found.len());
                    events.extend(found);
                }
                Err(HighlightError::Cancelled) => return Err(HighlightError::Cancelled),
                Err(e) => {
                    warn!("{kind}偵測失敗，略過 [{}]: {e}", e.category());
                    failed += 1;
                }
            }
        }

        if failed == 2 {
            warn!("所有偵測器皆失敗，改用均勻時間點");
        }

        Ok(events)
    }

    /// 回傳（輸出大小, 合併的片段數）
    fn extract_and_concatenate(
        &self,
        video: &VideoHandle,
        segments: &[Segment],
        work_dir: &Path,
        output_path: &Path,
        stage: &mut PipelineStage,
    ) -> HighlightResult<(u64, usize)> {
        let pool = WorkerPool::new(self.config.extraction_workers()).map_err(|e| {
            HighlightError::io("無法建立工作執行緒池", io::Error::other(e.to_string()))
        })?;

        let tasks =
            create_extraction_tasks(video, segments, work_dir, &self.config.output_container);
        let clips = extract_segments_parallel(
            self.toolchain.as_ref(),
            video,
            tasks,
            &pool,
            &self.shutdown_signal,
            self.show_progress,
        )?;
        self.check_cancelled()?;
        let clip_count = clips.len();

        enter_stage(stage, PipelineStage::Concatenating);
        let staging_path = work_dir.join(format!(
            "highlights_partial.{}",
            self.config.output_container
        ));
        let output_bytes = concatenate_clips(
            self.toolchain.as_ref(),
            clips,
            work_dir,
            &staging_path,
            output_path,
            &self.concat_mode(),
            self.config.min_output_bytes,
        )?;

        Ok((output_bytes, clip_count))
    }

    fn selection_plan(&self) -> SelectionPlan {
        SelectionPlan {
            highlight_fraction: self.config.highlight_fraction,
            minimum_highlight_seconds: self.config.minimum_highlight_seconds,
            segment_length_seconds: self.config.segment_length_seconds,
        }
    }

    fn concat_mode(&self) -> ConcatMode {
        if self.config.reencode_output {
            ConcatMode::Reencode {
                video_codec: self.config.output_video_codec.clone(),
                audio_codec: self.config.output_audio_codec.clone(),
            }
        } else {
            ConcatMode::StreamCopy
        }
    }

    /// 收到中斷信號後，子程序被信號終止造成的任何失敗都回報為取消
    fn interrupted_as_cancelled(&self, error: HighlightError) -> HighlightError {
        if self.shutdown_signal.load(Ordering::SeqCst)
            && !matches!(error, HighlightError::Cancelled)
        {
            debug!("中斷期間的錯誤視為取消: {error}");
            return HighlightError::Cancelled;
        }
        error
    }

    fn check_cancelled(&self) -> HighlightResult<()> {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            warn!("收到中斷信號，停止處理");
            return Err(HighlightError::Cancelled);
        }
        Ok(())
    }
}

fn enter_stage(stage: &mut PipelineStage, next: PipelineStage) {
    debug!("階段: {stage} -> {next}");
    *stage = next;
}

/// 在輸入檔案旁建立 `.tmp_<檔名>_XXXXXX` 暫存目錄
fn create_work_dir(input: &Path) -> HighlightResult<TempDir> {
    let parent = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let video_stem = input
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());

    tempfile::Builder::new()
        .prefix(&format!(".tmp_{video_stem}_"))
        .tempdir_in(parent)
        .map_err(|e| HighlightError::io(format!("無法建立暫存目錄於 {}", parent.display()), e))
}

/// 清除暫存目錄；失敗只記錄警告
fn cleanup_work_dir(work_dir: TempDir) {
    let path = work_dir.path().to_path_buf();
    if let Err(e) = work_dir.close() {
        warn!("CleanupWarning: 無法清理暫存目錄 {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_work_dir_is_created_next_to_input_and_removed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("match.mp4");
        fs::write(&input, b"video").unwrap();

        let work_dir = create_work_dir(&input).unwrap();
        let work_path = work_dir.path().to_path_buf();
        assert_eq!(work_path.parent().unwrap(), dir.path());
        assert!(
            work_path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(".tmp_match_")
        );

        fs::write(work_path.join("segment_0000.mp4"), b"data").unwrap();
        cleanup_work_dir(work_dir);
        assert!(!work_path.exists());
    }

    #[test]
    fn test_enter_stage() {
        let mut stage = PipelineStage::Probing;
        enter_stage(&mut stage, PipelineStage::Detecting);
        assert_eq!(stage, PipelineStage::Detecting);
    }
}
