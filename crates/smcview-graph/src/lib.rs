// crates/smcview-graph/src/lib.rs

//! GraphViz rendering of strategy model checker dumps.
//!
//! - [`dot::Grapher`] walks an open [`SmcDump`](smcview_dump::SmcDump) and
//!   writes a `digraph`, either for the whole system automaton or for the
//!   counterexample (path followed by cycle).
//! - [`image::LayoutTool`] pipes such a description through `dot` to get a
//!   rendered image without buffering either side in memory.
//! - [`text`] holds the label cleaning helpers (ANSI stripping, escaping,
//!   truncation).

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

/// DOT generation for full automata and counterexamples.
pub mod dot;
/// External layout tool invocation.
pub mod image;
/// Label cleaning helpers.
pub mod text;

pub use dot::{Grapher, LabelMode, TermMap};
pub use image::LayoutTool;
