// crates/smcview-maude/src/model_checker.rs

//! Running the strategy model checker.
//!
//! [`Session::prepare_model_check`] validates a [`ModelCheckRequest`] against
//! the loaded module and builds the `modelCheck(...)` term; when the module
//! lacks the model checker, or the strategy is an expression rather than a
//! declared name, a helper module wrapping it is entered first.
//! [`ModelCheckJob`] then reduces that term on a worker thread and signals
//! completion once to every waiter. A check cannot be cancelled; the only
//! way out is [`ModelCheckJob::kill`], which wakes waiters with a not-ok
//! result.

use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::console::Console;
use crate::parse::ParseOutcome;
use crate::reduce::ReduceResult;
use crate::session::{KillSwitch, Session};

/// Line of `show op .` present iff the model checker is imported.
const SMC_HOOK_LINE: &str = "    id-hook StrategyModelCheckerSymbol";

/// Module providing `modelCheck` for strategy-controlled systems.
pub const SMC_MODULE: &str = "STRATEGY-MODEL-CHECKER";

/// Helper module entered when the user module cannot be used directly.
pub const HELPER_MODULE: &str = "%SMCVIEW-MODULE";

/// Strategy name declared by the helper module for expression strategies.
pub const HELPER_STRATEGY: &str = "%smcview-strat";

/// Sort of model checker states.
pub const STATE_SORT: &str = "State";

/// Sort of LTL formulae.
pub const FORMULA_SORT: &str = "Formula";

/// Everything needed to run one check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCheckRequest {
    /// Module defining the system.
    pub module: String,
    /// Initial state term.
    pub initial: String,
    /// LTL formula.
    pub formula: String,
    /// Declared strategy name or strategy expression.
    pub strategy: String,
    /// Strategies whose executions count as a single step.
    #[serde(default)]
    pub opaques: Vec<String>,
}

/// Why a request was rejected before running the model checker.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// A required field is empty.
    #[error("missing {0}")]
    Missing(&'static str),
    /// The initial term does not parse as a `State`.
    #[error("initial term: {0:?}")]
    InitialTerm(ParseOutcome),
    /// The formula does not parse as a `Formula`.
    #[error("formula: {0:?}")]
    Formula(ParseOutcome),
    /// The strategy is neither declared nor a valid expression.
    #[error("strategy: {0:?}")]
    Strategy(ParseOutcome),
    /// An opaque strategy name is not declared.
    #[error("opaque strategy #{index} `{name}` is not declared")]
    UnknownOpaque {
        /// Position in the opaque list.
        index: usize,
        /// Offending name.
        name: String,
    },
}

impl InputError {
    /// Parse error position, if the rejection carries one.
    #[must_use]
    pub const fn position(&self) -> Option<usize> {
        match self {
            Self::InitialTerm(o) | Self::Formula(o) | Self::Strategy(o) => o.position(),
            Self::UnknownOpaque { index, .. } => Some(*index),
            Self::Missing(_) => None,
        }
    }
}

impl<R: Read, W: Write> Console<R, W> {
    /// Whether the current module includes the strategy model checker.
    pub fn smc_available(&mut self) -> io::Result<bool> {
        self.send("show op .\n")?;
        let mut found = false;
        self.for_each_line(|line| {
            found |= line.trim_end_matches('\n') == SMC_HOOK_LINE;
        })?;
        Ok(found)
    }
}

/// `nil 'a 'b ...` for the opaque strategy list.
fn qid_list(names: &[String]) -> String {
    names.iter().fold("nil".to_owned(), |acc, n| format!("{acc} '{n}"))
}

fn helper_module(module: &str, strategy: Option<&str>) -> String {
    let mut text =
        format!("smod {HELPER_MODULE} is\n\tprotecting {module} .\n\tincluding {SMC_MODULE} .\n");
    if let Some(expr) = strategy {
        text.push_str(&format!(
            "\tstrat {HELPER_STRATEGY} @ {STATE_SORT} .\n\tsd {HELPER_STRATEGY} := {expr} .\n"
        ));
    }
    text.push_str("endsm");
    text
}

impl Session {
    /// Check the initial term, strategy and opaque names in the current
    /// module. On success, returns whether the strategy is a declared name
    /// (as opposed to an expression). The formula is checked later, once a
    /// module with the LTL syntax is current.
    pub fn check_model_input(
        &mut self,
        initial: &str,
        strategy: &str,
        opaques: &[String],
    ) -> Result<bool, InputError> {
        let outcome = self.parse(initial, STATE_SORT);
        if !outcome.is_ok() {
            return Err(InputError::InitialTerm(outcome));
        }

        let declared = self.strategies();
        let is_name = !strategy.contains(' ') && declared.iter().any(|s| s.name == strategy);
        if !is_name {
            let outcome = self.strat_parse(strategy);
            if !outcome.is_ok() {
                return Err(InputError::Strategy(outcome));
            }
        }

        if let Some((index, name)) = opaques
            .iter()
            .enumerate()
            .find(|(_, name)| !declared.iter().any(|s| &s.name == *name))
        {
            return Err(InputError::UnknownOpaque { index, name: name.clone() });
        }
        Ok(is_name)
    }

    /// Validate `req` and return the `modelCheck(...)` term to reduce. May
    /// enter a helper module, which stays current afterwards.
    pub fn prepare_model_check(&mut self, req: &ModelCheckRequest) -> Result<String, InputError> {
        let fields = [
            (&req.module, "module"),
            (&req.initial, "initial term"),
            (&req.formula, "formula"),
            (&req.strategy, "strategy"),
        ];
        for (value, field) in fields {
            if value.trim().is_empty() {
                return Err(InputError::Missing(field));
            }
        }

        self.select(&req.module);
        let is_name = self.check_model_input(&req.initial, &req.strategy, &req.opaques)?;

        let mut strategy = req.strategy.as_str();
        if !is_name || !self.smc_available() {
            let expr = (!is_name).then_some(req.strategy.as_str());
            debug!(module = %req.module, expression = !is_name, "entering helper module");
            self.raw_input(&helper_module(&req.module, expr));
            if !is_name {
                strategy = HELPER_STRATEGY;
            }
        }

        let outcome = self.parse(&req.formula, FORMULA_SORT);
        if !outcome.is_ok() {
            return Err(InputError::Formula(outcome));
        }

        Ok(format!(
            "modelCheck({}, {}, '{strategy}, {})",
            req.initial,
            req.formula,
            qid_list(&req.opaques)
        ))
    }
}

/* ---------------- Background checks ---------------- */

/// One-shot completion signal observed by every waiter.
#[derive(Debug, Default)]
struct Completion {
    result: Mutex<Option<ReduceResult>>,
    ready: Condvar,
}

impl Completion {
    fn fire(&self, result: ReduceResult) {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(result);
        self.ready.notify_all();
    }

    fn peek(&self) -> Option<ReduceResult> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn wait(&self, timeout: Option<Duration>) -> Option<ReduceResult> {
        let slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = match timeout {
            None => self
                .ready
                .wait_while(slot, |r| r.is_none())
                .unwrap_or_else(PoisonError::into_inner),
            Some(t) => {
                self.ready
                    .wait_timeout_while(slot, t, |r| r.is_none())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        slot.clone()
    }
}

/// A model check reducing on a worker thread that owns the session.
#[derive(Debug)]
pub struct ModelCheckJob {
    done: Arc<Completion>,
    kill: Option<KillSwitch>,
    worker: JoinHandle<Session>,
}

impl ModelCheckJob {
    /// Reduce `command` in `session` on a new thread. `restore_module` is
    /// selected again once the reduction is over.
    pub fn spawn(mut session: Session, command: String, restore_module: String) -> Result<Self> {
        let done = Arc::new(Completion::default());
        let kill = session.kill_switch();
        let signal = Arc::clone(&done);

        let worker = thread::Builder::new()
            .name("model-check".to_owned())
            .spawn(move || {
                info!(%command, "model checking");
                let result = session.reduce(&command);
                session.select(&restore_module);
                info!(ok = result.ok, sort = %result.sort, "model check finished");
                signal.fire(result);
                session
            })
            .context("spawn model checker thread")?;

        Ok(Self { done, kill, worker })
    }

    /// Whether the check has finished (or was killed).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done.peek().is_some()
    }

    /// Block until the check finishes.
    #[must_use]
    pub fn wait(&self) -> ReduceResult {
        self.done.wait(None).unwrap_or_default()
    }

    /// Block at most `timeout`; `None` if still running.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ReduceResult> {
        self.done.wait(Some(timeout))
    }

    /// Kill the interpreter; waiters observe a not-ok result.
    pub fn kill(&self) -> bool {
        self.kill.as_ref().map_or(false, KillSwitch::kill)
    }

    /// Wait for the worker and get the session back with the result.
    pub fn join(self) -> Result<(Session, ReduceResult)> {
        let session = self.worker.join().map_err(|_| anyhow!("model checker thread panicked"))?;
        Ok((session, self.done.peek().unwrap_or_default()))
    }
}
