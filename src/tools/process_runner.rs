use log::{debug, warn};
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// 輪詢子程序狀態的間隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 已結束程序的輸出
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// 取 stderr 最後幾行作為錯誤描述
    #[must_use]
    pub fn stderr_tail(&self, lines: usize) -> String {
        let collected: Vec<&str> = self
            .stderr
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = collected.len().saturating_sub(lines);
        let tail = collected[start..].join("\n");
        if tail.is_empty() {
            format!("結束狀態 {}", self.status)
        } else {
            tail
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("無法啟動 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("執行逾時（超過 {0:?}）")]
    TimedOut(Duration),

    #[error("操作已取消")]
    Cancelled,

    #[error("等待程序時發生錯誤: {0}")]
    Wait(#[source] io::Error),
}

/// 執行外部程序，附帶逾時與中斷檢查
///
/// stdout / stderr 由背景執行緒持續讀取，避免管線緩衝區塞滿造成子程序阻塞。
/// 逾時或收到中斷信號時會終止子程序。
pub fn run_with_limits(
    mut command: Command,
    timeout: Duration,
    shutdown_signal: &AtomicBool,
) -> Result<ProcessOutput, RunError> {
    let program = command.get_program().to_string_lossy().to_string();

    if shutdown_signal.load(Ordering::SeqCst) {
        return Err(RunError::Cancelled);
    }

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| RunError::Spawn {
        program: program.clone(),
        source,
    })?;

    let pid = child.id();
    debug!("啟動程序 [{pid}]: {program}");

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                terminate(&mut child, pid);
                join_reader(stdout_reader);
                join_reader(stderr_reader);
                return Err(RunError::Wait(e));
            }
        }

        if shutdown_signal.load(Ordering::SeqCst) {
            warn!("收到中斷信號，終止程序 [{pid}]");
            terminate(&mut child, pid);
            join_reader(stdout_reader);
            join_reader(stderr_reader);
            return Err(RunError::Cancelled);
        }

        if started.elapsed() >= timeout {
            warn!("程序逾時，終止程序 [{pid}]: {program}");
            terminate(&mut child, pid);
            join_reader(stdout_reader);
            join_reader(stderr_reader);
            return Err(RunError::TimedOut(timeout));
        }

        thread::sleep(POLL_INTERVAL);
    };

    Ok(ProcessOutput {
        status,
        stdout: join_reader(stdout_reader),
        stderr: join_reader(stderr_reader),
    })
}

fn spawn_reader<R>(source: Option<R>) -> Option<JoinHandle<String>>
where
    R: Read + Send + 'static,
{
    source.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            String::from_utf8_lossy(&buffer).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn terminate(child: &mut Child, pid: u32) {
    if let Err(e) = child.kill() {
        debug!("終止程序失敗 [{pid}]: {e}");
    }
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_collects_output() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo hello; echo oops >&2"]);

        let output =
            run_with_limits(command, Duration::from_secs(10), &AtomicBool::new(false)).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr_tail(5), "oops");
    }

    #[test]
    fn test_run_times_out() {
        let mut command = Command::new("sh");
        command.args(["-c", "exec sleep 5"]);

        let started = Instant::now();
        let result = run_with_limits(
            command,
            Duration::from_millis(200),
            &AtomicBool::new(false),
        );
        assert!(matches!(result, Err(RunError::TimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_run_cancelled_before_spawn() {
        let command = Command::new("sh");
        let result = run_with_limits(command, Duration::from_secs(1), &AtomicBool::new(true));
        assert!(matches!(result, Err(RunError::Cancelled)));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let command = Command::new("definitely-not-a-real-program-xyz");
        let result =
            run_with_limits(command, Duration::from_secs(1), &AtomicBool::new(false));
        assert!(matches!(result, Err(RunError::Spawn { .. })));
    }
}
