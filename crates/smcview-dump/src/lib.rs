// crates/smcview-dump/src/lib.rs

//! Strategy model checker dumps: on-disk format, random-access reader and a
//! writer for fixtures.
//!
//! The model checker writes a binary file describing the explored system
//! automaton (states, transitions, interned strings) and, when the checked
//! property fails, a counterexample made of a path and a cycle. This crate
//! reads such files without loading them wholesale:
//!
//! - `format`: constants and the decoded record types (`State`, `Transition`).
//! - `reader`: [`SmcDump`], which keeps two small index tables in memory and
//!   serves every state and string query with a fresh positioned read.
//! - `writer`: [`DumpWriter`], a bit-exact encoder used by tests, benches and
//!   the `simulate` subcommand.
//! - `generator`: deterministic synthetic automata for demos and benches.
//!
//! Callers use stable module paths such as `smcview_dump::reader::SmcDump`;
//! the handful of re-exports below cover the common case.

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

/// Typed errors surfaced by the reader.
pub mod error;
/// Wire constants and decoded record types.
pub mod format;
/// Deterministic synthetic dump generator (for demos/benches).
pub mod generator;
/// Random-access dump reader.
pub mod reader;
/// Bit-exact dump encoder.
pub mod writer;

pub use error::DumpError;
pub use format::{DumpSummary, State, StateIndex, StringIndex, Transition, TransitionKind};
pub use reader::{has_signature, SmcDump};
pub use writer::DumpWriter;
