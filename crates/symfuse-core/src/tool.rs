//! # Tool Runner
//!
//! Every non-trivial step (UUID extraction, dSYM repair, archiving,
//! xcframework assembly) is done by an external Apple tool. This module
//! describes those invocations as data ([`ToolCommand`]) and runs them
//! through the [`ToolRunner`] trait, so the decision logic above it can be
//! tested with a fake runner.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use symfuse_core::tool::{ProcessRunner, ToolCommand, ToolRunner};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let runner = ProcessRunner::new();
//!     let command = ToolCommand::new("dwarfdump").arg("--uuid").arg("MySDK.framework.dSYM");
//!
//!     // Fails with ExternalToolFailure on a non-zero exit
//!     let output = runner.run_checked(&command)?;
//!     println!("{}", output.stdout);
//!     Ok(())
//! }
//! ```

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{SymfuseError, SymfuseResult};

/// How often a running child is checked for exit or interrupt
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A single external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand
{
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl ToolCommand
{
    pub fn new(program: impl Into<String>) -> Self
    {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self
    {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self
    {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str
    {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString]
    {
        &self.args
    }

    /// Arguments as lossy UTF-8, mostly for assertions and logs
    pub fn arg_strings(&self) -> Vec<String>
    {
        self.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    pub fn get_current_dir(&self) -> Option<&Path>
    {
        self.current_dir.as_deref()
    }
}

impl fmt::Display for ToolCommand
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.program)?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput
{
    /// Exit code, `None` if the process died from a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput
{
    /// A successful run with the given stdout
    pub fn success_with(stdout: impl Into<String>) -> Self
    {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self
    {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool
    {
        self.status == Some(0)
    }

    /// stderr followed by stdout, as shown to the operator on failure
    pub fn diagnostics(&self) -> String
    {
        match (self.stderr.is_empty(), self.stdout.is_empty()) {
            (false, false) => format!("{}\n{}", self.stderr, self.stdout),
            (false, true) => self.stderr.clone(),
            (true, _) => self.stdout.clone(),
        }
    }
}

/// Runs external tools
///
/// Implementations block until the tool exits. There is no timeout.
pub trait ToolRunner
{
    /// Run `command` and capture its output
    ///
    /// A non-zero exit is *not* an error here; see [`ToolRunner::run_checked`].
    ///
    /// ## Errors
    ///
    /// Returns `Io` when the tool cannot be started and `Interrupted` when
    /// the operator cancelled it.
    fn run(&self, command: &ToolCommand) -> SymfuseResult<ToolOutput>;

    /// Run `command` and turn a non-zero exit into `ExternalToolFailure`
    ///
    /// ## Errors
    ///
    /// Everything [`ToolRunner::run`] returns, plus `ExternalToolFailure`.
    fn run_checked(&self, command: &ToolCommand) -> SymfuseResult<ToolOutput>
    {
        let output = self.run(command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(SymfuseError::ExternalToolFailure {
                tool: command.program().to_string(),
                status: output.status,
                output: output.diagnostics(),
            })
        }
    }
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T
{
    fn run(&self, command: &ToolCommand) -> SymfuseResult<ToolOutput>
    {
        (**self).run(command)
    }
}

impl<T: ToolRunner + ?Sized> ToolRunner for Box<T>
{
    fn run(&self, command: &ToolCommand) -> SymfuseResult<ToolOutput>
    {
        (**self).run(command)
    }
}

/// [`ToolRunner`] backed by real subprocesses
///
/// The runner owns an interrupt flag. When the flag is raised (the CLI does
/// this from a Ctrl-C handler) the running child is killed and reaped, and
/// the run fails with `Interrupted`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner
{
    interrupted: Arc<AtomicBool>,
}

impl ProcessRunner
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Flag that cancels the running tool when set to `true`
    pub fn interrupt_handle(&self) -> Arc<AtomicBool>
    {
        Arc::clone(&self.interrupted)
    }

    fn is_interrupted(&self) -> bool
    {
        self.interrupted.load(Ordering::SeqCst)
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>>
{
    source.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
    })
}

fn collect(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> SymfuseResult<String>
{
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| std::io::Error::other("output reader thread panicked"))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl ToolRunner for ProcessRunner
{
    fn run(&self, command: &ToolCommand) -> SymfuseResult<ToolOutput>
    {
        let interrupted = || SymfuseError::Interrupted {
            tool: command.program().to_string(),
        };
        if self.is_interrupted() {
            return Err(interrupted());
        }

        debug!(%command, "running tool");
        let mut process = Command::new(command.program());
        process
            .args(command.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = command.get_current_dir() {
            process.current_dir(dir);
        }

        let mut child = process.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait()? {
                // Ctrl-C reaches the child too, which may exit before the flag is seen
                if self.is_interrupted() {
                    warn!(tool = command.program(), ?status, "tool exited after interrupt");
                    return Err(interrupted());
                }
                break status;
            }
            if self.is_interrupted() {
                warn!(tool = command.program(), "interrupted, killing tool");
                // The child may have exited between try_wait and kill
                let _ = child.kill();
                child.wait()?;
                return Err(interrupted());
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = ToolOutput {
            status: status.code(),
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
        };
        trace!(tool = command.program(), status = ?output.status, "tool finished");
        Ok(output)
    }
}
