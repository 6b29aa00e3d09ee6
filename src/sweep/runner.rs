use std::borrow::Cow;
use std::ffi::OsString;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::error::{process_error, Result};
use crate::sweep::grid::ParameterPoint;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Environment values visible to exactly one invocation.
///
/// Nothing here touches the environment of the current process, so two
/// invocations never observe each other's blocking parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationEnv {
    vars: Vec<(String, String)>,
}

impl InvocationEnv {
    /// Sets `key`, replacing an earlier value of the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// One invocation of the benchmark binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepTask {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub bench_type: String,
    pub backend: String,
    pub params: ParameterPoint,
    /// Longest the invocation may run; expiry aborts the sweep.
    pub timeout: Option<Duration>,
}

impl SweepTask {
    /// Command-line flags understood by the benchmark binary.
    pub fn args(&self) -> Vec<String> {
        vec![
            "--m".to_string(),
            self.m.to_string(),
            "--n".to_string(),
            self.n.to_string(),
            "--k".to_string(),
            self.k.to_string(),
            "--bench-type".to_string(),
            self.bench_type.clone(),
            "--backend".to_string(),
            self.backend.clone(),
        ]
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitState {
    Code(i32),
    /// Terminated by a signal.
    Signal,
    /// The process could not be started.
    LaunchFailed(String),
}

impl ExitState {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitState::Code(code) => Some(*code),
            _ => None,
        }
    }

    pub fn success(&self) -> bool {
        *self == ExitState::Code(0)
    }
}

impl From<ExitStatus> for ExitState {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitState::Code(code),
            None => ExitState::Signal,
        }
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Code(code) => write!(f, "{code}"),
            ExitState::Signal => write!(f, "signal"),
            ExitState::LaunchFailed(reason) => write!(f, "spawn-error: {reason}"),
        }
    }
}

/// What an invocation left behind.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub task: SweepTask,
    pub exit: ExitState,
    /// Complete standard output, byte for byte.
    pub output: Vec<u8>,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.exit.success()
    }

    pub fn output_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    /// Log line flagging a failed invocation, `None` on success.
    pub fn failure_marker(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        Some(format!("!! backend={} exit={}\n", self.task.backend, self.exit))
    }
}

/// Executes sweep tasks.
///
/// Implementations block until the invocation is over. Non-zero exits and
/// launch failures are normal outcomes; `Err` is reserved for invocations
/// that did not finish, such as an expired timeout.
pub trait ExternalRunner {
    fn run(&self, task: &SweepTask, env: &InvocationEnv) -> Result<ExecutionOutcome>;
}

/// Runs the benchmark binary as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    launcher_args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            launcher_args: Vec::new(),
            timeout: None,
        }
    }

    /// Arguments placed between the program and the benchmark flags, for
    /// launchers such as `taskset -c 0 ./bench` or `sh bench.sh`.
    pub fn with_launcher_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.launcher_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Fallback limit for tasks that carry no timeout of their own.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Waits for `child`; `None` means `limit` expired and the child was
    /// killed.
    fn wait(
        child: &mut Child,
        limit: Option<Duration>,
        backend: &str,
    ) -> Result<Option<ExitStatus>> {
        let wait_failed = |e: std::io::Error| process_error(backend, format!("wait failed: {e}"));

        let Some(limit) = limit else {
            return child.wait().map(Some).map_err(wait_failed);
        };

        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait().map_err(wait_failed)? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ExternalRunner for ProcessRunner {
    fn run(&self, task: &SweepTask, env: &InvocationEnv) -> Result<ExecutionOutcome> {
        let started_at = Local::now();
        let start = Instant::now();

        let spawned = Command::new(&self.program)
            .args(&self.launcher_args)
            .args(task.args())
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let reason = format!("{}: {e}", self.program.display());
                warn!(backend = %task.backend, "launch failed: {reason}");
                return Ok(ExecutionOutcome {
                    task: task.clone(),
                    exit: ExitState::LaunchFailed(reason),
                    output: Vec::new(),
                    started_at,
                    elapsed: start.elapsed(),
                });
            }
        };

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| process_error(&task.backend, "stdout was not captured"))?;
        let stdout_thread = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| process_error(&task.backend, "stderr was not captured"))?;
        let backend = task.backend.clone();
        let stderr_thread = thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(|line| line.ok()) {
                debug!(backend = %backend, "stderr: {line}");
            }
        });

        let limit = task.timeout.or(self.timeout);
        let Some(status) = Self::wait(&mut child, limit, &task.backend)? else {
            return Err(process_error(
                &task.backend,
                format!(
                    "timed out after {:?} (NC={}, KC={})",
                    limit.unwrap_or_default(),
                    task.params.nc,
                    task.params.kc
                ),
            ));
        };

        let output = stdout_thread
            .join()
            .map_err(|_| process_error(&task.backend, "stdout reader panicked"))?
            .map_err(|e| process_error(&task.backend, format!("reading stdout failed: {e}")))?;
        stderr_thread
            .join()
            .map_err(|_| process_error(&task.backend, "stderr reader panicked"))?;

        let elapsed = start.elapsed();
        debug!(
            backend = %task.backend,
            exit_code = ?status.code(),
            elapsed_ms = elapsed.as_millis() as u64,
            "invocation finished"
        );

        Ok(ExecutionOutcome {
            task: task.clone(),
            exit: status.into(),
            output,
            started_at,
            elapsed,
        })
    }
}
