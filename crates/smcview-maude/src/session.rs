// crates/smcview-maude/src/session.rs

//! Interpreter process lifecycle.
//!
//! A [`Session`] owns at most one interpreter process. Queries on a session
//! without a live process return a neutral value (empty string, `false`,
//! empty list, a not-ok result) instead of failing; so does any query during
//! which the interpreter closes its output, after which the session is
//! inactive. Sessions are not meant to be shared: one workflow owns one
//! session and passes it around.
//!
//! # Threads
//! - One drain thread per live process copies the interpreter's stderr into
//!   the log (target `maude::stderr`). It ends by itself when the pipe
//!   closes.
//! - [`Session::quit_with_timeout`] runs the graceful quit on a helper thread
//!   and kills the process if that has not finished in time. Killing a
//!   process that already exited is harmless.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::console::Console;
use crate::parse::ParseOutcome;
use crate::reduce::ReduceResult;
use crate::show::{ExtendedModuleInfo, ModuleInfo, NamedStrategy, Operator, StatementKind};

/// Environment variable telling the model checker where to write its dump.
pub const SMC_OUTPUT_VAR: &str = "MAUDE_SMC_OUTPUT";

/// Flags for a quiet, line-oriented interpreter.
pub const INTERPRETER_FLAGS: [&str; 6] =
    ["-no-banner", "-no-advise", "-no-wrap", "-no-ansi-color", "-no-tecla", "-interactive"];

/// How long [`Session::start`] lets a previous process quit politely.
pub const RESTART_TIMEOUT: Duration = Duration::from_secs(1);

const EXIT_POLL: Duration = Duration::from_millis(5);

type Pipes = Console<ChildStdout, ChildStdin>;
type SharedChild = Arc<Mutex<Child>>;

#[derive(Debug)]
struct Live {
    child: SharedChild,
    console: Pipes,
}

/// Handle that can kill a session's current process from another thread.
#[derive(Clone, Debug)]
pub struct KillSwitch {
    child: SharedChild,
}

impl KillSwitch {
    /// Kill the process. Returns `false` only if the kill itself failed.
    pub fn kill(&self) -> bool {
        kill_child(&self.child)
    }
}

/// One managed interpreter.
#[derive(Debug)]
pub struct Session {
    program: PathBuf,
    env: BTreeMap<String, OsString>,
    live: Option<Live>,
}

impl Session {
    /// A session for the interpreter at `program`. Nothing is spawned until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), env: BTreeMap::new(), live: None }
    }

    /// Interpreter executable.
    #[inline]
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Whether a process is running and answering.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.live.is_some()
    }

    /// Where the model checker will write its dump (an empty path disables
    /// the dump). Applies from the next [`start`](Self::start) on and is
    /// kept across restarts.
    pub fn set_output_path(&mut self, path: impl AsRef<Path>) {
        self.env.insert(SMC_OUTPUT_VAR.to_owned(), path.as_ref().as_os_str().to_owned());
    }

    /// Killer for the current process, if any.
    #[must_use]
    pub fn kill_switch(&self) -> Option<KillSwitch> {
        self.live.as_ref().map(|live| KillSwitch { child: Arc::clone(&live.child) })
    }

    /* ---------------- Lifecycle ---------------- */

    /// Start a fresh interpreter, replacing the current one, and wait for
    /// its first prompt.
    pub fn start(&mut self) -> Result<()> {
        if self.is_active() && !self.quit_with_timeout(RESTART_TIMEOUT) {
            warn!("previous interpreter did not quit in time and was killed");
        }

        let mut child = Command::new(&self.program)
            .args(INTERPRETER_FLAGS)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;
        let pid = child.id();

        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let child = Arc::new(Mutex::new(child));
        let (Some(stdin), Some(stdout), Some(stderr)) = pipes else {
            kill_child(&child);
            anyhow::bail!("interpreter pipes unavailable");
        };

        if let Err(err) = thread::Builder::new()
            .name("maude-stderr".to_owned())
            .spawn(move || drain_stderr(stderr))
        {
            kill_child(&child);
            return Err(err).context("spawn stderr drain thread");
        }

        let mut live = Live { child, console: Console::new(stdout, stdin) };
        if let Err(err) = live.console.advance_until_prompt() {
            kill_child(&live.child);
            return Err(err).context("waiting for the first interpreter prompt");
        }
        info!(pid, program = %self.program.display(), "interpreter started");
        self.live = Some(live);
        Ok(())
    }

    /// Send `quit .` and wait for the process to exit. Returns whether it
    /// exited successfully; `true` if there was nothing to quit.
    pub fn quit(&mut self) -> bool {
        self.live.take().map_or(true, graceful_quit)
    }

    /// Kill the process at once. Returns whether there was one to kill.
    pub fn kill(&mut self) -> bool {
        let Some(live) = self.live.take() else {
            return false;
        };
        kill_child(&live.child);
        info!("interpreter killed");
        true
    }

    /// Quit politely, killing the process if it takes longer than `timeout`.
    /// Returns whether the polite quit finished in time.
    pub fn quit_with_timeout(&mut self, timeout: Duration) -> bool {
        let Some(live) = self.live.take() else {
            return true;
        };
        let child = Arc::clone(&live.child);
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new().name("maude-quit".to_owned()).spawn(move || {
            // The receiver is gone if the timeout already fired.
            let _ = tx.send(graceful_quit(live));
        });
        if spawned.is_err() {
            kill_child(&child);
            return false;
        }

        match rx.recv_timeout(timeout) {
            Ok(_) => true,
            Err(_) => {
                warn!(?timeout, "interpreter did not quit in time, killing it");
                kill_child(&child);
                false
            }
        }
    }

    /* ---------------- Queries ---------------- */

    /// Run `op` on the live console; a dead interpreter yields `neutral`
    /// and deactivates the session.
    fn with_console<T>(&mut self, neutral: T, op: impl FnOnce(&mut Pipes) -> io::Result<T>) -> T {
        let Some(live) = self.live.as_mut() else {
            return neutral;
        };
        match op(&mut live.console) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "interpreter stopped answering; session is now inactive");
                self.kill();
                neutral
            }
        }
    }

    /// Load a source file. `false` if inactive.
    pub fn load(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref().display().to_string();
        debug!(%path, "load");
        self.with_console(false, |c| c.load(&path).map(|()| true))
    }

    /// Make `module` the current module. `false` if inactive.
    pub fn select(&mut self, module: &str) -> bool {
        self.with_console(false, |c| c.select(module).map(|()| true))
    }

    /// Name of the current module, empty if inactive or unknown.
    pub fn current_module_name(&mut self) -> String {
        self.with_console(String::new(), Pipes::current_module_name)
    }

    /// Send free-form text and return the reply verbatim.
    pub fn raw_input(&mut self, text: &str) -> String {
        self.with_console(String::new(), |c| c.raw_input(text))
    }

    /// Print terms in mixfix syntax (or prefix syntax with `false`).
    pub fn set_mixfix(&mut self, on: bool) -> bool {
        self.with_console(false, |c| c.set_mixfix(on).map(|()| true))
    }

    /// Reduce `term` in the current module.
    pub fn reduce(&mut self, term: &str) -> ReduceResult {
        self.with_console(ReduceResult::default(), |c| c.reduce(term))
    }

    /// Reduce `term` in `module`.
    pub fn reduce_in(&mut self, module: &str, term: &str) -> ReduceResult {
        self.with_console(ReduceResult::default(), |c| c.reduce_in(module, term))
    }

    /// Parse `term` as a term of `sort` in the current module.
    pub fn parse(&mut self, term: &str, sort: &str) -> ParseOutcome {
        self.with_console(ParseOutcome::Error, |c| c.parse(term, sort))
    }

    /// Parse `expr` as a strategy expression in the current module.
    pub fn strat_parse(&mut self, expr: &str) -> ParseOutcome {
        self.with_console(ParseOutcome::Error, |c| c.strat_parse(expr))
    }

    /// Modules and theories loaded so far.
    pub fn modules(&mut self) -> Vec<ModuleInfo> {
        self.with_console(Vec::new(), Pipes::modules)
    }

    /// Kind and parameter theories of `name` (kind empty if inactive).
    pub fn module_info(&mut self, name: &str) -> ExtendedModuleInfo {
        let neutral = ExtendedModuleInfo {
            info: ModuleInfo { name: name.to_owned(), kind: String::new() },
            params: Vec::new(),
        };
        self.with_console(neutral, |c| c.module_info(name))
    }

    /// Sorts of the current module.
    pub fn sorts(&mut self) -> Vec<String> {
        self.with_console(Vec::new(), Pipes::sorts)
    }

    /// `(subsorts, supersorts)` of `sort`; `None` if inactive or unknown.
    pub fn subsorts(&mut self, sort: &str) -> Option<(Vec<String>, Vec<String>)> {
        self.with_console(None, |c| c.subsorts(sort))
    }

    /// Strategy declarations of the current module.
    pub fn strategies(&mut self) -> Vec<NamedStrategy> {
        self.with_console(Vec::new(), Pipes::strategies)
    }

    /// Atomic propositions of the current module.
    pub fn atomic_props(&mut self) -> Vec<Operator> {
        self.with_console(Vec::new(), Pipes::atomic_props)
    }

    /// Labelled statements of `kind`, filtered by `label` unless empty.
    pub fn statements(&mut self, kind: StatementKind, label: &str) -> Vec<String> {
        self.with_console(Vec::new(), |c| c.statements(kind, label))
    }

    /// Whether the current module includes the strategy model checker.
    pub fn smc_available(&mut self) -> bool {
        self.with_console(false, Pipes::smc_available)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.kill();
    }
}

/* ---------------- Process helpers ---------------- */

fn lock(child: &SharedChild) -> std::sync::MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Send `quit .`, close the interpreter's input and wait for it to exit.
/// The wait polls so that a concurrent [`kill_child`] is never blocked.
fn graceful_quit(mut live: Live) -> bool {
    if let Err(err) = live.console.quit() {
        debug!(%err, "could not send quit");
    }
    let (stdout, stdin) = live.console.into_parts();
    drop(stdin);

    let status = loop {
        match lock(&live.child).try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => thread::sleep(EXIT_POLL),
            Err(err) => {
                warn!(%err, "waiting for the interpreter failed");
                break None;
            }
        }
    };
    drop(stdout);
    info!(?status, "interpreter quit");
    status.is_some_and(|st| st.success())
}

fn kill_child(child: &SharedChild) -> bool {
    let mut child = lock(child);
    // Already exited is fine; the wait below reaps it either way.
    let killed = match child.kill() {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => true,
        Err(err) => {
            warn!(%err, "could not kill the interpreter");
            false
        }
    };
    if let Err(err) = child.wait() {
        debug!(%err, "reaping the interpreter failed");
    }
    killed
}

fn drain_stderr(stderr: ChildStderr) {
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                info!(target: "maude::stderr", "{}", text.trim_end());
            }
        }
    }
    debug!("interpreter stderr closed");
}
