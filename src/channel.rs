//! Decoder subprocess and the pipe feeding it.
//!
//! Every `start()` spawns a fresh child with a piped stdin; `stop()` closes the
//! pipe, signals the child and reaps it. On unix the pipe is non-blocking and
//! writes are single best-effort `write` calls: a short or failed write is
//! counted and logged, never retried, so a stuck decoder cannot stall the
//! sample path.

use std::io::{ErrorKind, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::error::{Error, Result};

/// Replaced by the sample rate in decoder arguments
pub const RATE_PLACEHOLDER: &str = "{rate}";

/// How to launch the external decoder
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Send the decoder's stdout/stderr to null instead of inheriting them
    pub quiet: bool,
}

impl DecoderCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            quiet: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Arguments with the rate filled in. Without a `{rate}` placeholder the
    /// rate goes last.
    pub fn resolved_args(&self, sample_rate: f32) -> Vec<String> {
        let rate = format!("{}", sample_rate);
        if self.args.iter().any(|a| a.contains(RATE_PLACEHOLDER)) {
            self.args
                .iter()
                .map(|a| a.replace(RATE_PLACEHOLDER, &rate))
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(rate);
            args
        }
    }

    fn build(&self, sample_rate: f32) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.resolved_args(sample_rate));
        command.stdin(Stdio::piped());
        if self.quiet {
            command.stdout(Stdio::null());
            command.stderr(Stdio::null());
        }
        command
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No child has been started, or the last start failed
    Absent,
    /// Spawn in progress
    Starting,
    /// Child alive (as far as we know) and pipe open
    Running,
    /// Child torn down by `stop()`
    Stopped,
}

/// Result of one best-effort write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Complete(usize),
    Partial { written: usize, requested: usize },
    Failed(ErrorKind),
    /// No live pipe; nothing was attempted
    NotRunning,
}

/// Counters for the data path, kept across restarts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub writes: u64,
    pub bytes_requested: u64,
    pub bytes_written: u64,
    pub partial_writes: u64,
    pub failed_writes: u64,
    /// Writes asked for while no decoder was running
    pub skipped_writes: u64,
}

impl WriteStats {
    pub fn bytes_dropped(&self) -> u64 {
        self.bytes_requested - self.bytes_written
    }
}

struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    started_at: DateTime<Local>,
    exit: Option<ExitStatus>,
}

/// Owns at most one decoder child and the write end of its stdin pipe
pub struct SubprocessChannel {
    command: DecoderCommand,
    stop_grace: Duration,
    state: ChannelState,
    session: Option<Session>,
    stats: WriteStats,
    failure_streak: u64,
}

impl SubprocessChannel {
    pub fn new(command: DecoderCommand) -> Self {
        Self {
            command,
            stop_grace: Duration::ZERO,
            state: ChannelState::Absent,
            session: None,
            stats: WriteStats::default(),
            failure_streak: 0,
        }
    }

    /// How long `stop()` waits for the decoder to exit on EOF before killing it
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn command(&self) -> &DecoderCommand {
        &self.command
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ChannelState::Running
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    pub fn pid(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.child.id())
    }

    /// Spawn the decoder. A running decoder is torn down first.
    pub fn start(&mut self, sample_rate: f32) -> Result<()> {
        if self.session.is_some() {
            log::info!("restarting decoder `{}`", self.command.program);
            self.stop();
        }

        self.state = ChannelState::Starting;
        let mut command = self.command.build(sample_rate);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state = ChannelState::Absent;
                return Err(Error::Spawn {
                    program: self.command.program.clone(),
                    source,
                });
            }
        };

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            self.state = ChannelState::Absent;
            return Err(Error::pipe("decoder stdin was not captured"));
        };

        if let Err(e) = set_nonblocking(&stdin) {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            self.state = ChannelState::Absent;
            return Err(Error::pipe(format!("decoder stdin cannot be made non-blocking: {}", e)));
        }

        log::info!(
            "decoder `{}` started (pid {}, {} Hz)",
            self.command.program,
            child.id(),
            sample_rate
        );

        self.session = Some(Session {
            child,
            stdin: Some(stdin),
            started_at: Local::now(),
            exit: None,
        });
        self.failure_streak = 0;
        self.state = ChannelState::Running;
        Ok(())
    }

    /// Hand bytes to the decoder with a single `write` call.
    pub fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
        let Some(stdin) = self.session.as_mut().and_then(|s| s.stdin.as_mut()) else {
            self.stats.skipped_writes += 1;
            return WriteOutcome::NotRunning;
        };
        if bytes.is_empty() {
            return WriteOutcome::Complete(0);
        }

        let requested = bytes.len();
        self.stats.writes += 1;
        self.stats.bytes_requested += requested as u64;

        match stdin.write(bytes) {
            Ok(written) if written == requested => {
                self.stats.bytes_written += written as u64;
                if self.failure_streak > 0 {
                    log::info!(
                        "decoder pipe recovered after {} short or failed writes",
                        self.failure_streak
                    );
                    self.failure_streak = 0;
                }
                WriteOutcome::Complete(written)
            }
            Ok(written) => {
                self.stats.bytes_written += written as u64;
                self.stats.partial_writes += 1;
                self.failure_streak += 1;
                let level = self.streak_level();
                log::log!(
                    level,
                    "decoder pipe took {} of {} bytes, dropping the rest",
                    written,
                    requested
                );
                WriteOutcome::Partial { written, requested }
            }
            Err(e) => {
                self.stats.failed_writes += 1;
                self.failure_streak += 1;
                let level = self.streak_level();
                match e.kind() {
                    ErrorKind::WouldBlock => {
                        log::log!(level, "decoder pipe is full, dropping {} bytes", requested)
                    }
                    _ => log::log!(level, "write to decoder pipe failed: {}", e),
                }
                if e.kind() == ErrorKind::BrokenPipe {
                    self.poll_exit();
                }
                WriteOutcome::Failed(e.kind())
            }
        }
    }

    /// One warning per run of shortfalls; a stuck or dead decoder hits every chunk.
    fn streak_level(&self) -> log::Level {
        if self.failure_streak == 1 {
            log::Level::Warn
        } else {
            log::Level::Debug
        }
    }

    /// Check without blocking whether the decoder exited on its own.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        let session = self.session.as_mut()?;
        if session.exit.is_some() {
            return session.exit;
        }
        match session.child.try_wait() {
            Ok(Some(status)) => {
                log::warn!("decoder pid {} exited: {}", session.child.id(), status);
                session.exit = Some(status);
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                log::debug!("try_wait on decoder failed: {}", e);
                None
            }
        }
    }

    /// Close the pipe, terminate the decoder and reap it. No-op when nothing runs.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let pid = session.child.id();

        // EOF first, so a decoder can drain and exit by itself
        drop(session.stdin.take());

        if session.exit.is_none() {
            match wait_with_grace(&mut session.child, self.stop_grace) {
                Some(status) => log::debug!("decoder pid {} exited: {}", pid, status),
                None => {
                    if let Err(e) = session.child.kill() {
                        log::debug!("kill decoder pid {}: {}", pid, e);
                    }
                    match session.child.wait() {
                        Ok(status) => log::debug!("decoder pid {} terminated: {}", pid, status),
                        Err(e) => log::warn!("failed to reap decoder pid {}: {}", pid, e),
                    }
                }
            }
        }

        let elapsed = Local::now().signed_duration_since(session.started_at);
        log::info!(
            "decoder pid {} stopped after {:.1}s",
            pid,
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        self.state = ChannelState::Stopped;
    }
}

impl Drop for SubprocessChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn set_nonblocking(stdin: &ChildStdin) -> std::io::Result<()> {
    use rustix::fs::{fcntl_getfl, fcntl_setfl, OFlags};

    let flags = fcntl_getfl(stdin)?;
    fcntl_setfl(stdin, flags | OFlags::NONBLOCK)?;
    Ok(())
}

// Anonymous pipes elsewhere have no non-blocking switch; writes may block there.
#[cfg(not(unix))]
fn set_nonblocking(_stdin: &ChildStdin) -> std::io::Result<()> {
    Ok(())
}

fn wait_with_grace(child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(_) => return None,
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
