//! 精華影片產生元件
//!
//! 五階段流程：
//! A. 取得影片資訊（ffprobe）
//! B. 場景變換與音量峰值偵測
//! C. 合併時間點並選取片段
//! D. 平行擷取片段
//! E. 依原始順序合併為精華影片

mod audio_detector;
mod concatenator;
mod main;
mod metadata_parser;
mod scene_detector;
mod segment_extractor;
mod timestamp_selector;
mod toolchain;
mod types;

pub use audio_detector::{audio_filter_graph, parse_audio_peak_events, peaks_from_levels};
pub use concatenator::{
    MANIFEST_FILE_NAME, build_manifest, concatenate_clips, order_clips, validate_output,
};
pub use main::HighlightGenerator;
pub use metadata_parser::{MetadataFrame, parse_metadata_frames};
pub use scene_detector::{SceneDetectorConfig, parse_scene_events};
pub use segment_extractor::{
    ExtractionTask, MIN_SEGMENT_SECONDS, create_extraction_tasks, extract_segment,
    extract_segments_parallel,
};
pub use timestamp_selector::{
    SelectionPlan, fuse_events, fuse_or_synthesize, plan_segments, select_evenly,
    synthetic_timestamps,
};
pub use toolchain::{ConcatMode, FfmpegToolchain, MediaToolchain};
pub use types::{
    Event, EventKind, ExtractedClip, HighlightOutput, PipelineStage, Segment, TimestampSet,
    VideoHandle,
};
