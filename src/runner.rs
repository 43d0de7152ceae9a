//! # External Process Execution
//!
//! This module is the only place that touches `std::process`. It exposes two
//! small traits so the rest of the crate can run `git` without knowing
//! whether a real binary or a test double sits behind it:
//!
//! - **`CommandRunner`** builds a not-yet-started `Process` for a program and
//!   its arguments.
//! - **`Process`** starts, hands out its error stream, reports exit status
//!   without blocking, and can be killed.
//!
//! `execute` drives a `Process` to completion. The error stream is drained
//! line by line on a reader thread while the calling thread polls for exit,
//! so a child blocked on a full pipe can never deadlock the parent. Both
//! sides are joined before `execute` returns. When the `CancelToken` fires,
//! the child is killed and `execute` returns `Error::Cancelled` after at most
//! a short grace period for the reader.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::defaults::READER_GRACE_PERIOD;
use crate::error::{Error, Result};

/// A cloneable cancellation flag shared between a caller and a running fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels this token from a background thread once `timeout` elapses.
    pub fn cancel_after(&self, timeout: Duration) {
        let token = self.clone();
        thread::spawn(move || {
            thread::sleep(timeout);
            token.cancel();
        });
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// The exit code, or `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A handle to an external process.
pub trait Process: Send {
    /// Starts the process. Called exactly once.
    fn start(&mut self) -> io::Result<()>;

    /// Takes the process's error stream. Returns `None` once taken.
    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Returns the exit status if the process has finished, without blocking.
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    /// Terminates the process and reaps it.
    fn kill(&mut self) -> io::Result<()>;

    /// A short human-readable description, used in logs and errors.
    fn describe(&self) -> String;
}

/// Creates process handles for a program and its arguments.
pub trait CommandRunner: Send + Sync {
    fn command(&self, program: &str, args: &[String]) -> Box<dyn Process>;
}

/// Runs real processes through `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn command(&self, program: &str, args: &[String]) -> Box<dyn Process> {
        Box::new(SystemProcess::new(program, args))
    }
}

struct SystemProcess {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl SystemProcess {
    fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
            child: None,
        }
    }

    fn child(&mut self) -> io::Result<&mut Child> {
        self.child
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "process not started"))
    }
}

impl Process for SystemProcess {
    fn start(&mut self) -> io::Result<()> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        self.child = Some(child);
        Ok(())
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        let stderr = self.child.as_mut()?.stderr.take()?;
        Some(Box::new(stderr))
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        let status = self.child()?.try_wait()?;
        Ok(status.map(|s| ProcessExit { code: s.code() }))
    }

    fn kill(&mut self) -> io::Result<()> {
        let child = self.child()?;
        match child.kill() {
            Ok(()) => {}
            // Already exited.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e),
        }
        child.wait()?;
        Ok(())
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Receives the lines of a process's error stream, on the reader thread.
pub trait LineSink: Send + 'static {
    fn line(&mut self, line: &str);
}

/// Runs `process` to completion, feeding its error stream to `sink`.
///
/// Returns the exit status and the sink once the stream is fully drained and
/// the process has exited. A non-zero exit is not an error at this level.
pub fn execute<S: LineSink>(
    mut process: Box<dyn Process>,
    cancel: &CancelToken,
    poll_interval: Duration,
    mut sink: S,
) -> Result<(ProcessExit, S)> {
    let description = process.describe();
    if cancel.is_cancelled() {
        return Err(Error::Cancelled {
            operation: description,
        });
    }

    debug!("running: {}", description);
    process.start().map_err(|source| Error::Spawn {
        program: description.clone(),
        source,
    })?;

    let stderr = process
        .take_stderr()
        .unwrap_or_else(|| Box::new(io::empty()));
    let reader = thread::spawn(move || {
        if let Err(e) = read_lines(stderr, |line| sink.line(line)) {
            trace!("stderr read ended with error: {}", e);
        }
        sink
    });

    let exit = loop {
        if cancel.is_cancelled() {
            debug!("cancelling: {}", description);
            if let Err(e) = process.kill() {
                warn!("failed to kill {}: {}", description, e);
            }
            release_reader(reader, poll_interval);
            return Err(Error::Cancelled {
                operation: description,
            });
        }
        match process.try_wait() {
            Ok(Some(exit)) => break exit,
            Ok(None) => thread::sleep(poll_interval),
            Err(e) => {
                let _ = process.kill();
                return Err(Error::Io(e));
            }
        }
    };

    // A grandchild can hold the stream open after the process itself exits.
    while !reader.is_finished() {
        if cancel.is_cancelled() {
            debug!("cancelling: {} (exited, stderr still open)", description);
            release_reader(reader, poll_interval);
            return Err(Error::Cancelled {
                operation: description,
            });
        }
        thread::sleep(poll_interval);
    }

    let sink = reader
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "stderr reader panicked"))?;

    debug!("{} exited with {:?}", description, exit.code);
    Ok((exit, sink))
}

/// Waits up to `READER_GRACE_PERIOD` for the reader to finish, then detaches it.
fn release_reader<T>(reader: thread::JoinHandle<T>, poll_interval: Duration) {
    let deadline = Instant::now() + READER_GRACE_PERIOD;
    while !reader.is_finished() && Instant::now() < deadline {
        thread::sleep(poll_interval);
    }
    if reader.is_finished() {
        let _ = reader.join();
    } else {
        trace!("detaching stderr reader");
    }
}

/// Splits `reader` into lines on `\n` and `\r` and calls `f` for each
/// non-empty one.
///
/// git redraws its progress with bare carriage returns, so both separators
/// end a line. Invalid UTF-8 is replaced rather than rejected.
pub fn read_lines<R, F>(reader: R, mut f: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        let (consumed, done) = {
            let buf = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if buf.is_empty() {
                (0, true)
            } else {
                for &byte in buf {
                    if byte == b'\n' || byte == b'\r' {
                        emit(&mut line, &mut f);
                    } else {
                        line.push(byte);
                    }
                }
                (buf.len(), false)
            }
        };
        if done {
            emit(&mut line, &mut f);
            return Ok(());
        }
        reader.consume(consumed);
    }
}

fn emit<F: FnMut(&str)>(line: &mut Vec<u8>, f: &mut F) {
    if !line.is_empty() {
        f(&String::from_utf8_lossy(line));
        line.clear();
    }
}
