// crates/smcview-maude/src/lib.rs

//! Synchronous request/response access to an interactive Maude interpreter.
//!
//! The interpreter is an external process speaking a line protocol: commands
//! end in ` .` and a newline, replies end when the prompt `Maude> ` appears at
//! the start of a line, and structured replies are recognised by fixed line
//! prefixes (`result`, `sort`, `strat`, `op`, module headers, ...).
//!
//! - [`console::Console`]: prompt framing and every command, generic over
//!   the byte streams so it can be exercised without a process.
//! - [`session::Session`]: process lifecycle (start, quit, kill, quit with
//!   timeout), stderr draining, and neutral results while inactive.
//! - [`model_checker`]: input validation and background model checks.
//! - [`locate`]: finding an interpreter with strategy support.
//! - [`simplify`]: optional term simplification for display.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
// Pattern literals compiled once in `lazy_static!` blocks.
#![cfg_attr(not(test), allow(clippy::expect_used))]

/// Prompt framing and interpreter commands.
pub mod console;
/// Finding the interpreter.
pub mod locate;
/// Model checker input validation and background runs.
pub mod model_checker;
/// Meta-level parsing of terms and strategies.
pub mod parse;
/// Reductions.
pub mod reduce;
/// Interpreter process lifecycle.
pub mod session;
/// Declaration listings.
pub mod show;
/// Display-time term simplification.
pub mod simplify;

pub use console::{Console, PROMPT};
pub use locate::{locate_maude, maude_version};
pub use model_checker::{InputError, ModelCheckJob, ModelCheckRequest};
pub use parse::ParseOutcome;
pub use reduce::ReduceResult;
pub use session::{KillSwitch, Session, SMC_OUTPUT_VAR};
pub use show::{ExtendedModuleInfo, ModuleInfo, NamedStrategy, Operator, StatementKind};
pub use simplify::{simplifier_for, Identity, TermSimplifier};
