use crate::config::GlobalConfig;
use crate::core::interrupt::{InterruptSignal, SignalQueue};
use crate::core::models::{OutcomeStatus, RunDirs, ScanInvocation, ScanOutcome};
use crate::core::recorder::{timeout_hints, Recorder};
use crate::scanners::catalog::ScanStage;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Run one stage's external tool to a terminal outcome. The child gets its
/// own process group so termination reaches whatever it spawned; the poll
/// loop observes operator signals and the wall-clock budget between ticks.
///
/// Every exit path below terminates the group before returning — an
/// invocation may never leak a running child.
pub async fn execute(
    stage: &ScanStage,
    invocation: ScanInvocation,
    dirs: &RunDirs,
    signals: &mut SignalQueue,
    config: &GlobalConfig,
) -> ScanOutcome {
    let recorder = Recorder::new(&config.output);
    let started = Instant::now();
    let grace = config.grace_period();

    let Some((program, args)) = invocation.command.split_first() else {
        return ScanOutcome::internal(started.elapsed(), "empty command vector");
    };

    tracing::debug!("Executing: {} in {:?}", invocation.echo(), invocation.cwd);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(&invocation.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // New session -> new process group, so group signals reach the tool's
    // own children too.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Tool not found: {}", program);
            return ScanOutcome::tool_missing(program);
        }
        Err(e) => {
            tracing::error!("Failed to spawn {}: {}", program, e);
            return ScanOutcome::internal(started.elapsed(), e);
        }
    };

    // Drain both pipes concurrently; a chatty tool must not stall on a full
    // pipe while the poll loop waits.
    let stdout_task = child
        .stdout
        .take()
        .map(|h| tokio::spawn(read_lines(BufReader::new(h))));
    let stderr_task = child
        .stderr
        .take()
        .map(|h| tokio::spawn(read_lines(BufReader::new(h))));

    let abort_readers = |t1: &Option<tokio::task::JoinHandle<String>>,
                         t2: &Option<tokio::task::JoinHandle<String>>| {
        if let Some(t) = t1 {
            t.abort();
        }
        if let Some(t) = t2 {
            t.abort();
        }
    };

    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let exit_status = loop {
        ticker.tick().await;

        // Signal priority: skip, then quit, then the clock.
        match signals.poll() {
            Some(InterruptSignal::Skip) => {
                tracing::info!("Skipping {} at operator request", stage.label);
                terminate_group(&mut child, grace).await;
                abort_readers(&stdout_task, &stderr_task);
                let elapsed = started.elapsed();
                let (artifact, bytes) = match recorder.write_skip_artifact(dirs, stage, elapsed) {
                    Ok((path, bytes)) => (Some(path), bytes),
                    Err(e) => {
                        tracing::warn!("Failed to write skip artifact: {}", e);
                        (None, 0)
                    }
                };
                return ScanOutcome::finished(OutcomeStatus::Skipped, elapsed, artifact, bytes, None)
                    .with_detail("skipped by operator request");
            }
            Some(InterruptSignal::Quit) => {
                tracing::info!("Operator requested quit during {}", stage.label);
                terminate_group(&mut child, grace).await;
                abort_readers(&stdout_task, &stderr_task);
                return ScanOutcome::finished(
                    OutcomeStatus::Quit,
                    started.elapsed(),
                    None,
                    0,
                    None,
                )
                .with_detail("operator quit; remaining stages halted");
            }
            None => {}
        }

        if started.elapsed() >= invocation.timeout {
            tracing::warn!(
                "{} timed out after {}s",
                stage.label,
                invocation.timeout.as_secs()
            );
            terminate_group(&mut child, grace).await;
            abort_readers(&stdout_task, &stderr_task);
            let (artifact, bytes) =
                match recorder.write_timeout_artifact(dirs, stage, invocation.timeout) {
                    Ok((path, bytes)) => (Some(path), bytes),
                    Err(e) => {
                        tracing::warn!("Failed to write timeout artifact: {}", e);
                        (None, 0)
                    }
                };
            return ScanOutcome::finished(
                OutcomeStatus::TimedOut,
                started.elapsed(),
                artifact,
                bytes,
                None,
            )
            .with_detail(timeout_hints());
        }

        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => continue,
            Err(e) => {
                terminate_group(&mut child, grace).await;
                abort_readers(&stdout_task, &stderr_task);
                return ScanOutcome::internal(started.elapsed(), e);
            }
        }
    };

    let duration = started.elapsed();
    let stdout = join_reader(stdout_task).await;
    let stderr = join_reader(stderr_task).await;

    let success = exit_status.success();
    let exit_code = exit_status.code();

    let (artifact, bytes) = match recorder.write_artifact(
        dirs,
        stage,
        &invocation.echo(),
        success,
        duration,
        &stdout,
        &stderr,
    ) {
        Ok((path, bytes)) => (Some(path), bytes),
        Err(e) => {
            tracing::warn!("Failed to write artifact for {}: {}", stage.label, e);
            (None, 0)
        }
    };

    if success {
        recorder.print_highlights(&stdout, stage.family);
        ScanOutcome::finished(OutcomeStatus::Succeeded, duration, artifact, bytes, exit_code)
    } else {
        let tail = stderr_tail(&stderr, 3);
        let outcome =
            ScanOutcome::finished(OutcomeStatus::Failed, duration, artifact, bytes, exit_code);
        if tail.is_empty() {
            outcome
        } else {
            outcome.with_detail(tail)
        }
    }
}

async fn read_lines<R>(reader: BufReader<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    let mut reader = reader.lines();

    loop {
        match reader.next_line().await {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("output stream ended early: {}", e);
                break;
            }
        }
    }

    lines.join("\n")
}

/// Collect a reader task's output, with a bound: a grandchild the tool left
/// behind can hold the pipe open past the tool's own exit, and that must not
/// stall the pipeline.
async fn join_reader(task: Option<tokio::task::JoinHandle<String>>) -> String {
    match task {
        Some(mut handle) => {
            match tokio::time::timeout(Duration::from_secs(5), &mut handle).await {
                Ok(joined) => joined.unwrap_or_default(),
                Err(_) => {
                    tracing::debug!("output stream still open after exit; abandoning it");
                    handle.abort();
                    String::new()
                }
            }
        }
        None => String::new(),
    }
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let collected: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    collected
        .iter()
        .rev()
        .take(lines)
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two-phase group termination: SIGTERM, bounded wait, SIGKILL. A group that
/// already exited is not an error.
async fn terminate_group(child: &mut Child, grace: Duration) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    let Some(pid) = child.id() else {
        return; // already reaped
    };

    signal_group(pid, libc::SIGTERM);

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    tracing::warn!("Process group {} ignored SIGTERM, escalating", pid);
    signal_group(pid, libc::SIGKILL);
    let _ = child.wait().await;
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: i32) {
    // Negative pid addresses the whole group; ESRCH means it already exited.
    let rc = unsafe { libc::kill(-(pid as i32), signal) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!("kill({}) failed for group {}: {}", signal, pid, err);
        }
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: i32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interrupt::signal_channel;
    use crate::scanners::catalog::{stage, StageKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_dirs(tmp: &TempDir) -> RunDirs {
        RunDirs {
            root: tmp.path().to_path_buf(),
            scans: tmp.path().join("scans"),
            report: tmp.path().join("report"),
            logs: tmp.path().join("logs"),
        }
    }

    fn fast_config() -> GlobalConfig {
        let mut config = GlobalConfig::default();
        config.general.grace_period_secs = 1;
        config.general.poll_interval_ms = 50;
        config
    }

    fn sh(script: &str, timeout: Duration) -> ScanInvocation {
        ScanInvocation::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            PathBuf::from("/tmp"),
            timeout,
        )
    }

    #[tokio::test]
    async fn successful_run_records_artifact_and_exit() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let config = fast_config();
        let (_tx, mut queue) = signal_channel();

        let outcome = execute(
            stage(StageKind::NmapQuick),
            sh("echo '80/tcp open http'", Duration::from_secs(10)),
            &dirs,
            &mut queue,
            &config,
        )
        .await;

        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(outcome.exit_code, Some(0));
        let artifact = outcome.artifact.expect("artifact written");
        let content = std::fs::read_to_string(artifact).unwrap();
        assert!(content.contains("80/tcp open http"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failed_not_error() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let config = fast_config();
        let (_tx, mut queue) = signal_channel();

        let outcome = execute(
            stage(StageKind::Nikto),
            sh("echo 'error: no host' >&2; exit 3", Duration::from_secs(10)),
            &dirs,
            &mut queue,
            &config,
        )
        .await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.exit_code, Some(3));
        assert!(outcome.detail.unwrap().contains("no host"));
    }

    #[tokio::test]
    async fn missing_tool_is_a_distinct_outcome() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let config = fast_config();
        let (_tx, mut queue) = signal_channel();

        let invocation = ScanInvocation::new(
            vec!["ipscout-test-no-such-tool".to_string()],
            PathBuf::from("/tmp"),
            Duration::from_secs(5),
        );
        let outcome = execute(
            stage(StageKind::WhatWeb),
            invocation,
            &dirs,
            &mut queue,
            &config,
        )
        .await;

        assert_eq!(outcome.status, OutcomeStatus::ToolNotFound);
        assert!(outcome.artifact.is_none());
    }

    #[tokio::test]
    async fn timeout_terminates_and_leaves_hints() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let config = fast_config();
        let (_tx, mut queue) = signal_channel();

        let started = Instant::now();
        let outcome = execute(
            stage(StageKind::NmapFull),
            sh("sleep 30", Duration::from_millis(300)),
            &dirs,
            &mut queue,
            &config,
        )
        .await;

        assert_eq!(outcome.status, OutcomeStatus::TimedOut);
        // Bounded: poll interval + grace period, with margin
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcome.detail.unwrap().contains("smaller wordlist"));
        let content = std::fs::read_to_string(outcome.artifact.unwrap()).unwrap();
        assert!(content.contains("TIMEOUT"));
    }

    #[tokio::test]
    async fn skip_signal_cancels_within_the_bound() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let config = fast_config();
        let (tx, mut queue) = signal_channel();

        tx.send(InterruptSignal::Skip).unwrap();

        let started = Instant::now();
        let outcome = execute(
            stage(StageKind::Feroxbuster),
            sh("sleep 30", Duration::from_secs(60)),
            &dirs,
            &mut queue,
            &config,
        )
        .await;

        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        // One poll interval to observe + grace period to terminate
        assert!(started.elapsed() < Duration::from_secs(3));
        let content = std::fs::read_to_string(outcome.artifact.unwrap()).unwrap();
        assert!(content.contains("SKIPPED BY OPERATOR"));
    }

    #[tokio::test]
    async fn quit_signal_produces_quit_outcome() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let config = fast_config();
        let (tx, mut queue) = signal_channel();

        tx.send(InterruptSignal::Quit).unwrap();

        let outcome = execute(
            stage(StageKind::Ffuf),
            sh("sleep 30", Duration::from_secs(60)),
            &dirs,
            &mut queue,
            &config,
        )
        .await;

        assert_eq!(outcome.status, OutcomeStatus::Quit);
        assert!(outcome.artifact.is_none());
    }

    #[tokio::test]
    async fn skip_reaches_grandchildren_via_the_process_group() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let config = fast_config();
        let (tx, mut queue) = signal_channel();

        tx.send(InterruptSignal::Skip).unwrap();

        // The shell spawns its own child; group termination must cover both.
        let started = Instant::now();
        let outcome = execute(
            stage(StageKind::NmapUdp),
            sh("sleep 30 & wait", Duration::from_secs(60)),
            &dirs,
            &mut queue,
            &config,
        )
        .await;

        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
