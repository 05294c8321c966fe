use anyhow::Result;
use clap::Parser;
use console::style;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use video_highlights::HighlightError;
use video_highlights::component::HighlightGenerator;
use video_highlights::component::highlight_generator::{FfmpegToolchain, MediaToolchain};
use video_highlights::config::HighlightConfig;
use video_highlights::init;
use video_highlights::signal::setup_shutdown_signal;

/// 從影片中擷取場景變換與音量峰值，合併成精華影片
#[derive(Debug, Parser)]
#[command(name = "video_highlights", version)]
struct Cli {
    /// 輸入影片路徑
    #[arg(required_unless_present = "check_tools")]
    input: Option<PathBuf>,

    /// 設定檔（JSON），未指定時讀取目前目錄的 settings.json
    #[arg(long)]
    config: Option<PathBuf>,

    /// 場景變換閾值 (0, 1]
    #[arg(long)]
    scene_threshold: Option<f64>,

    /// 音量峰值閾值（dB）
    #[arg(long, allow_negative_numbers = true)]
    audio_threshold_db: Option<f64>,

    /// 每個片段的長度（秒）
    #[arg(long)]
    segment_length: Option<f64>,

    /// 同時擷取的片段數
    #[arg(long)]
    jobs: Option<usize>,

    /// 每次呼叫 ffmpeg 的逾時（秒）
    #[arg(long)]
    timeout: Option<f64>,

    /// 不顯示進度條
    #[arg(long)]
    no_progress: bool,

    /// 只檢查 ffmpeg / ffprobe 是否可用
    #[arg(long)]
    check_tools: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut HighlightConfig) {
        if let Some(threshold) = self.scene_threshold {
            config.scene_threshold = threshold;
        }
        if let Some(threshold) = self.audio_threshold_db {
            config.audio_threshold_db = threshold;
        }
        if let Some(length) = self.segment_length {
            config.segment_length_seconds = length;
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent_extractions = Some(jobs);
        }
        if let Some(timeout) = self.timeout {
            config.per_job_timeout_seconds = timeout;
        }
    }
}

fn main() -> ExitCode {
    init::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            warn!("Program error: {e:#}");
            eprintln!("{} {e:#}", style("錯誤:").red().bold());
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let shutdown_signal = setup_shutdown_signal()?;
    let toolchain = FfmpegToolchain::discover(
        HighlightConfig::default().per_job_timeout(),
        Arc::clone(&shutdown_signal),
    );

    if cli.check_tools {
        return Ok(report_toolchain(&toolchain));
    }
    let Some(input) = cli.input.as_deref() else {
        return Ok(ExitCode::from(2));
    };

    let config = match prepare_config(cli, &toolchain) {
        Ok(config) => config,
        Err(e) => return Ok(report_failure(&e)),
    };

    let toolchain = toolchain.with_timeout(config.per_job_timeout());
    let generator = HighlightGenerator::new(config, Arc::new(toolchain), shutdown_signal)
        .with_progress(!cli.no_progress);

    eprintln!(
        "{} {}",
        style("處理中").cyan(),
        style(input.display()).bold()
    );

    match generator.run(input) {
        Ok(output) => {
            println!("{}", output.output_path.display());
            info!(
                "輸出 {} bytes，{} 個片段，耗時 {:.2}s{}",
                output.output_bytes,
                output.segment_count,
                output.elapsed.as_secs_f64(),
                if output.used_synthetic_timestamps {
                    "（未偵測到事件，使用均勻時間點）"
                } else {
                    ""
                }
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report_failure(&e)),
    }
}

/// 確認工具鏈後才讀取設定檔，再套用命令列覆寫並驗證
fn prepare_config(
    cli: &Cli,
    toolchain: &dyn MediaToolchain,
) -> Result<HighlightConfig, HighlightError> {
    toolchain.check_available()?;

    let mut config = HighlightConfig::load(cli.config.as_deref())
        .map_err(|e| HighlightError::InvalidConfig(format!("{e:#}")))?;
    cli.apply_overrides(&mut config);
    config.validate().map_err(HighlightError::InvalidConfig)?;

    Ok(config)
}

fn report_toolchain(toolchain: &FfmpegToolchain) -> ExitCode {
    let describe = |path: Option<&Path>| {
        path.map_or_else(
            || style("找不到".to_string()).red().to_string(),
            |p| style(p.display().to_string()).green().to_string(),
        )
    };
    println!("ffmpeg:  {}", describe(toolchain.ffmpeg_path()));
    println!("ffprobe: {}", describe(toolchain.ffprobe_path()));

    match toolchain.check_available() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e),
    }
}

fn report_failure(error: &HighlightError) -> ExitCode {
    eprintln!("{} {error}", style(error.category()).red().bold());
    ExitCode::from(exit_code(error))
}

/// 各錯誤分類對應的結束代碼
const fn exit_code(error: &HighlightError) -> u8 {
    match error {
        HighlightError::ToolchainUnavailable(_) => 3,
        HighlightError::InvalidConfig(_) => 2,
        HighlightError::Cancelled => 130,
        _ => 1,
    }
}
