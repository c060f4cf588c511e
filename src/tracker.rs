use std::fmt;
use std::io;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use itertools::Itertools;
use log::{debug, info};

use crate::output::{Diagnostics, Errorable, ProcessEvent};

/// Sink for the commands we run and everything they print.
///
/// This is injected into the tracker rather than being a global so
/// callers (and tests) decide where process chatter ends up.
pub trait CommandLog: Send + Sync {
    /// Called once per invocation, before the process is spawned
    fn command(&self, invocation: &Invocation);
    /// Called for every line the process writes
    fn output(&self, line: &str);
}

/// [`CommandLog`] that forwards to the `log` crate under the `kind` target
pub struct LogCommandLog;

impl CommandLog for LogCommandLog {
    fn command(&self, invocation: &Invocation) {
        info!(target: "kind", "{}", invocation);
    }

    fn output(&self, line: &str) {
        debug!(target: "kind", "{}", line);
    }
}

/// An external program and its ordered argument list.
///
/// Arguments are passed straight to the OS. Nothing is ever interpreted
/// by a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
}

impl Invocation {
    /// Start an invocation of `program` with no arguments
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
        }
    }

    /// Append a single argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program to run
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed to the program
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut c = Command::new(&self.program);
        c.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        c
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .join(" ");
        write!(f, "$ {}", line)
    }
}

/// Stream child stdout to the receiver, one event per line.
///
/// Calling this function will spawn a thread that takes ownership
/// over the child's stdout and reads until the process closes it.
fn stream_child_output(
    updates: Sender<ProcessEvent>,
    log: Arc<dyn CommandLog>,
    child: &mut Child,
) -> Option<JoinHandle<()>> {
    let stdout = child.stdout.take()?;
    let mut reader = BufReader::new(stdout);

    let handle = thread::spawn(move || loop {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                // Remove newline
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                log.output(&line);
                // Receiver may have gone away. Keep draining so the child
                // never blocks on a full pipe.
                let _ = updates.send(ProcessEvent::Line(line));
            }
            Err(e) => {
                debug!("Failed to read from child stdout: {}", e);
                break;
            }
        };
    });

    Some(handle)
}

/// Extracts stderr out from the child.
///
/// Any failures in extraction will be encoded into the return string.
fn extract_child_stderr(log: &dyn CommandLog, child: &mut Child) -> String {
    let mut err = String::new();

    if let Some(mut stderr) = child.stderr.take() {
        let mut buf = Vec::new();
        if let Err(e) = stderr.read_to_end(&mut buf) {
            err += &format!("<failed to read child stderr: {}>", e);
        }
        err.insert_str(0, &String::from_utf8_lossy(&buf));
    }

    for line in err.lines() {
        log.output(line);
    }

    err
}

/// Decide the terminal event given how the child exited
fn terminal_event(program: &str, status: io::Result<ExitStatus>, stderr: String) -> ProcessEvent {
    let status = match status {
        Ok(s) => s,
        Err(e) => return ProcessEvent::Failed(format!("Failed to wait on '{}': {}", program, e)),
    };

    if status.success() {
        return ProcessEvent::Succeeded;
    }

    if !stderr.trim().is_empty() {
        return ProcessEvent::Failed(stderr);
    }

    match status.code() {
        Some(rc) => ProcessEvent::Failed(format!("'{}' exited with status {}", program, rc)),
        None => ProcessEvent::Failed(format!("'{}' was terminated by a signal", program)),
    }
}

/// Run the child to completion, reporting through `updates`
fn supervise(
    mut command: Command,
    program: String,
    updates: Sender<ProcessEvent>,
    log: Arc<dyn CommandLog>,
) {
    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to spawn '{}': {}", program, e);
            let _ = updates.send(ProcessEvent::Failed(format!(
                "Failed to run '{}': {}",
                program, e
            )));
            return;
        }
    };
    debug!("Spawned '{}' as PID={}", program, child.id());

    let reader = stream_child_output(updates.clone(), log.clone(), &mut child);
    let stderr = extract_child_stderr(log.as_ref(), &mut child);
    let status = child.wait();
    debug!("'{}' finished: {:?}", program, status);

    // Every line must be delivered before the terminal event
    if let Some(reader) = reader {
        if reader.join().is_err() {
            debug!("stdout reader for '{}' panicked", program);
        }
    }

    let _ = updates.send(terminal_event(&program, status, stderr));
}

/// Spawn `invocation` and track it.
///
/// Returns immediately. The child runs concurrently and its lifecycle is
/// reported on the returned receiver: one `Line` per stdout line, in write
/// order, then exactly one terminal event, then hangup. Failing to spawn is
/// reported as a `Failed` event, never as an error to the caller.
///
/// Dropping the receiver does not stop the child. It runs to completion in
/// the background.
pub fn track(invocation: &Invocation, log: Arc<dyn CommandLog>) -> Receiver<ProcessEvent> {
    let (sender, receiver) = channel::<ProcessEvent>();
    log.command(invocation);

    let command = invocation.command();
    let program = invocation.program().display().to_string();
    thread::spawn(move || supervise(command, program, sender, log));

    receiver
}

/// Run `invocation` to completion and return its stdout.
///
/// The output is normalised: lines are joined with `\n`, carriage returns
/// are dropped and there is no trailing newline. `description` labels the
/// diagnostic on failure, eg. `kind get clusters`.
pub fn exec(
    invocation: &Invocation,
    description: &str,
    log: Arc<dyn CommandLog>,
) -> Errorable<String> {
    let mut lines = Vec::new();
    for event in track(invocation, log) {
        match event {
            ProcessEvent::Line(l) => lines.push(l),
            ProcessEvent::Succeeded => return Ok(lines.join("\n")),
            ProcessEvent::Failed(stderr) => {
                return Err(Diagnostics::new(format!("{} error: {}", description, stderr)))
            }
        }
    }

    // Tracker hung up without a terminal event
    Err(Diagnostics::new(format!(
        "{} error: no exit status reported",
        description
    )))
}
