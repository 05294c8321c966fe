use super::toolchain::MediaToolchain;
use super::types::{ExtractedClip, Segment, VideoHandle};
use crate::error::{HighlightError, HighlightResult};
use crate::tools::WorkerPool;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// 片段擷取任務
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    pub segment: Segment,
    pub output_path: PathBuf,
}

/// 單一任務的執行結果
#[derive(Debug)]
enum TaskOutcome {
    Done(ExtractedClip),
    Failed(HighlightError),
    /// 其他任務已失敗或收到中斷，未執行
    Skipped,
}

/// 限制在影片範圍後短於此長度的片段不擷取
pub const MIN_SEGMENT_SECONDS: f64 = 0.1;

/// 建立擷取任務，片段長度限制在影片範圍內
///
/// 每個暫存檔名都包含索引與 UUID，平行寫入時不會互相覆蓋。
/// 貼近影片結尾、限制後不足 [`MIN_SEGMENT_SECONDS`] 的片段會被略過。
#[must_use]
pub fn create_extraction_tasks(
    video: &VideoHandle,
    segments: &[Segment],
    work_dir: &Path,
    container: &str,
) -> Vec<ExtractionTask> {
    segments
        .iter()
        .filter_map(|segment| {
            let clamped = segment.clamped_to(video.duration_seconds);
            if clamped.duration_seconds < MIN_SEGMENT_SECONDS {
                debug!(
                    "略過過短的片段 {}: {:.3}s",
                    segment.source_index, clamped.duration_seconds
                );
                return None;
            }

            Some(ExtractionTask {
                segment: clamped,
                output_path: work_dir.join(format!(
                    "segment_{:04}_{}.{container}",
                    segment.source_index,
                    Uuid::new_v4().simple()
                )),
            })
        })
        .collect()
}

/// 擷取單一片段並確認輸出檔案存在且非空
pub fn extract_segment(
    toolchain: &dyn MediaToolchain,
    video: &VideoHandle,
    task: &ExtractionTask,
) -> HighlightResult<ExtractedClip> {
    debug!(
        "擷取片段 {}: {:.2}s + {:.2}s -> {}",
        task.segment.source_index,
        task.segment.start_seconds,
        task.segment.duration_seconds,
        task.output_path.display()
    );

    toolchain.extract_segment(video, &task.segment, &task.output_path)?;

    let extraction_error = |reason: String| HighlightError::SegmentExtraction {
        index: task.segment.source_index,
        start_seconds: task.segment.start_seconds,
        reason,
    };

    let size = fs::metadata(&task.output_path)
        .map_err(|_| extraction_error(format!("片段檔案未建立: {}", task.output_path.display())))?
        .len();

    if size == 0 {
        return Err(extraction_error(format!(
            "片段檔案為空: {}",
            task.output_path.display()
        )));
    }

    Ok(ExtractedClip {
        segment: task.segment,
        temp_file_path: task.output_path.clone(),
    })
}

/// 平行擷取所有片段
///
/// 任一片段失敗即視為整體失敗；失敗後尚未開始的任務會被略過。
/// 回傳的片段順序與 `tasks` 相同。
pub fn extract_segments_parallel(
    toolchain: &dyn MediaToolchain,
    video: &VideoHandle,
    tasks: Vec<ExtractionTask>,
    pool: &WorkerPool,
    shutdown_signal: &AtomicBool,
    show_progress: bool,
) -> HighlightResult<Vec<ExtractedClip>> {
    let total = tasks.len();
    let abort = AtomicBool::new(false);
    let progress_bar = create_progress_bar(total, show_progress);

    info!("開始擷取 {total} 個片段（{} 個工作執行緒）", pool.size());

    let outcomes = pool.run_all(tasks, |task| {
        if shutdown_signal.load(Ordering::SeqCst) || abort.load(Ordering::SeqCst) {
            return TaskOutcome::Skipped;
        }

        let outcome = match extract_segment(toolchain, video, &task) {
            Ok(clip) => TaskOutcome::Done(clip),
            Err(e) => {
                error!("片段擷取失敗 [{}]: {e}", task.segment.source_index);
                abort.store(true, Ordering::SeqCst);
                TaskOutcome::Failed(e)
            }
        };

        progress_bar.inc(1);
        outcome
    });

    progress_bar.finish_and_clear();

    collect_outcomes(outcomes, shutdown_signal)
}

/// 依提交順序整理結果，回傳第一個實際失敗的錯誤
fn collect_outcomes(
    outcomes: Vec<TaskOutcome>,
    shutdown_signal: &AtomicBool,
) -> HighlightResult<Vec<ExtractedClip>> {
    let mut clips = Vec::with_capacity(outcomes.len());
    let mut first_failure: Option<HighlightError> = None;
    let mut skipped = 0usize;

    for outcome in outcomes {
        match outcome {
            TaskOutcome::Done(clip) => clips.push(clip),
            TaskOutcome::Failed(HighlightError::Cancelled) => skipped += 1,
            TaskOutcome::Failed(e) => {
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
            TaskOutcome::Skipped => skipped += 1,
        }
    }

    // 中斷信號也會送到子程序，此時的擷取失敗是中斷造成的
    if shutdown_signal.load(Ordering::SeqCst) {
        return Err(HighlightError::Cancelled);
    }

    if let Some(e) = first_failure {
        return Err(e);
    }

    if skipped > 0 {
        return Err(HighlightError::Cancelled);
    }

    info!("片段擷取完成: {} 個", clips.len());
    Ok(clips)
}

fn create_progress_bar(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let progress_bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress_bar.set_style(style.progress_chars("#>-"));
    }
    progress_bar.set_message("擷取片段中...");
    progress_bar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> VideoHandle {
        VideoHandle {
            path: PathBuf::from("/videos/game.mp4"),
            duration_seconds: 100.0,
            frame_rate: Some(25.0),
            width: Some(1280),
            height: Some(720),
            has_video: true,
            has_audio: true,
        }
    }

    fn segment(start_seconds: f64, source_index: usize) -> Segment {
        Segment {
            start_seconds,
            duration_seconds: 3.0,
            source_index,
        }
    }

    fn clip(index: usize) -> ExtractedClip {
        ExtractedClip {
            segment: segment(index as f64, index),
            temp_file_path: PathBuf::from(format!("/tmp/seg_{index}.mp4")),
        }
    }

    #[test]
    fn test_create_extraction_tasks() {
        let segments = vec![segment(10.0, 0), segment(98.0, 1)];
        let tasks = create_extraction_tasks(&video(), &segments, Path::new("/work"), "mp4");

        assert_eq!(tasks.len(), 2);
        assert!((tasks[0].segment.duration_seconds - 3.0).abs() < 1e-9);
        assert!((tasks[1].segment.duration_seconds - 2.0).abs() < 1e-9);

        let name = tasks[0].output_path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("segment_0000_"));
        assert!(name.ends_with(".mp4"));
        assert_ne!(tasks[0].output_path, tasks[1].output_path);
        assert!(tasks.iter().all(|t| t.output_path.starts_with("/work")));
    }

    #[test]
    fn test_create_extraction_tasks_skips_sliver_at_end() {
        let segments = vec![segment(50.0, 0), segment(99.9996, 1), segment(99.5, 2)];
        let tasks = create_extraction_tasks(&video(), &segments, Path::new("/work"), "mp4");

        let indices: Vec<usize> = tasks.iter().map(|t| t.segment.source_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!((tasks[1].segment.duration_seconds - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_collect_outcomes_failure_after_interrupt_is_cancelled() {
        let outcomes = vec![
            TaskOutcome::Done(clip(0)),
            TaskOutcome::Failed(HighlightError::SegmentExtraction {
                index: 1,
                start_seconds: 1.0,
                reason: "exit signal: 2 (SIGINT)".into(),
            }),
        ];
        let err = collect_outcomes(outcomes, &AtomicBool::new(true)).unwrap_err();
        assert_eq!(err.category(), "Cancelled");
    }

    #[test]
    fn test_collect_outcomes_success() {
        let outcomes = vec![TaskOutcome::Done(clip(0)), TaskOutcome::Done(clip(1))];
        let clips = collect_outcomes(outcomes, &AtomicBool::new(false)).unwrap();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[1].segment.source_index, 1);
    }

    #[test]
    fn test_collect_outcomes_reports_real_failure_over_skips() {
        let outcomes = vec![
            TaskOutcome::Done(clip(0)),
            TaskOutcome::Skipped,
            TaskOutcome::Failed(HighlightError::SegmentExtraction {
                index: 2,
                start_seconds: 2.0,
                reason: "片段檔案為空".into(),
            }),
            TaskOutcome::Failed(HighlightError::Cancelled),
        ];
        let err = collect_outcomes(outcomes, &AtomicBool::new(false)).unwrap_err();
        assert_eq!(err.category(), "SegmentExtractionError");
    }

    #[test]
    fn test_collect_outcomes_cancelled() {
        let outcomes = vec![TaskOutcome::Done(clip(0)), TaskOutcome::Skipped];
        let err = collect_outcomes(outcomes, &AtomicBool::new(true)).unwrap_err();
        assert_eq!(err.category(), "Cancelled");
    }
}
