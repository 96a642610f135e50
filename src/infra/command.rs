//! # Command Execution Module / 命令执行模块
//!
//! Spawns child processes and captures their combined stdout/stderr.
//!
//! 派生子进程并捕获其合并的 stdout/stderr。

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::infra::t;

/// Spawns a command, captures its stdout and stderr.
/// The output streams are read concurrently and combined into a single string.
///
/// # Arguments
/// * `cmd` - The `tokio::process::Command` to execute.
/// * `timeout` - Optional limit on how long to wait for the process. When it
///   elapses the child is killed and an `io::ErrorKind::TimedOut` error is returned
///   together with whatever output was captured so far.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 输出流被并发读取并合并到一个字符串中。
///
/// # Arguments
/// * `cmd` - 要执行的 `tokio::process::Command`。
/// * `timeout` - 可选的等待时限。超时后子进程会被终止，并返回
///   `io::ErrorKind::TimedOut` 错误以及目前已捕获的输出。
///
/// # Returns
/// 一个元组，包含：
/// - 进程的 `ExitStatus`（包装在 `io::Result` 中）。
/// - 合并的 stdout 和 stderr，为一个 `String`。
pub async fn spawn_and_capture(
    mut cmd: Command,
    timeout: Option<Duration>,
) -> (io::Result<ExitStatus>, String) {
    // A timed child gets its own process group so a kill also reaches its descendants.
    // 有时限的子进程使用独立的进程组，终止时也能覆盖其后代进程。
    #[cfg(unix)]
    if timeout.is_some() {
        cmd.process_group(0);
    }

    // Configure the command to capture stdout and stderr.
    // 配置命令以捕获 stdout 和 stderr。
    let mut child = match cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            // If spawning fails, we return the error and an empty string for the output.
            // 如果派生失败，我们返回错误和空字符串作为输出。
            return (Err(e), String::new());
        }
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return (
            Err(io::Error::other(t!("command.capture_failed").to_string())),
            String::new(),
        );
    };

    // Use an Arc<Mutex<String>> to allow concurrent writes from stdout and stderr tasks.
    // 使用 Arc<Mutex<String>> 来允许多个任务（stdout 和 stderr）并发写入。
    let output = Arc::new(tokio::sync::Mutex::new(String::new()));
    let stdout_handle = collect_lines(stdout, Arc::clone(&output));
    let stderr_handle = collect_lines(stderr, Arc::clone(&output));

    // Wait for the process to exit.
    // 等待进程退出。
    let mut killed = false;
    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                killed = true;
                kill_tree(&mut child).await;
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    t!("command.timed_out", limit = format!("{:?}", limit)).to_string(),
                ))
            }
        },
        None => child.wait().await,
    };

    // Wait for the stdout and stderr reading tasks to complete to ensure all output is captured.
    // After a kill, a surviving descendant may still hold the pipes, so the wait is bounded.
    // 等待 stdout 和 stderr 读取任务完成，以确保所有输出都被捕获。
    // 终止之后，存活的后代进程可能仍持有管道，因此等待是有限的。
    let grace = killed.then_some(READER_GRACE);
    join_reader(stdout_handle, grace, "stdout").await;
    join_reader(stderr_handle, grace, "stderr").await;

    let captured = output.lock().await.clone();
    (status, captured)
}

/// How long the readers may keep draining after a timed out child was killed.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Kills the child's whole process group, then the child itself.
async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let group = Command::new("kill")
            .arg("-KILL")
            .arg("--")
            .arg(format!("-{}", pid))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = group {
            eprintln!("Failed to kill process group {}: {}", pid, e);
        }
    }
    if let Err(e) = child.kill().await {
        eprintln!("Failed to kill timed out process: {}", e);
    }
}

async fn join_reader(mut handle: JoinHandle<()>, grace: Option<Duration>, stream: &str) {
    let joined = match grace {
        Some(grace) => match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return;
            }
        },
        None => handle.await,
    };
    if let Err(e) = joined {
        eprintln!("Failed to join {} task: {}", stream, e);
    }
}

/// Spawns a task that appends every line of `stream` to the shared buffer.
/// Bytes that are not valid UTF-8 are replaced, never dropped.
fn collect_lines<R>(stream: R, output: Arc<tokio::sync::Mutex<String>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        while let Ok(n) = reader.read_until(b'\n', &mut line).await {
            if n == 0 {
                break;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            }
            let mut output = output.lock().await;
            output.push_str(&String::from_utf8_lossy(&line));
            output.push('\n');
            line.clear();
        }
    })
}
