// crates/smcview-maude/src/reduce.rs

//! `reduce` and its reply.

use std::io::{self, Read, Write};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::console::Console;

lazy_static! {
    /// `result <Sort>: <term>`
    static ref RESULT_LINE: Regex =
        Regex::new(r"^result ([^:]+): (.*)$").expect("result regex is valid");
}

/// Outcome of a reduction.
///
/// `ok` is false when the session is inactive or no `result` line appeared
/// before the prompt (a syntax error, for instance).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReduceResult {
    /// Whether a result was printed.
    pub ok: bool,
    /// Sort of the result.
    pub sort: String,
    /// Result term, possibly spanning several lines.
    pub term: String,
}

impl<R: Read, W: Write> Console<R, W> {
    /// `red <term> .` in the current module.
    pub fn reduce(&mut self, term: &str) -> io::Result<ReduceResult> {
        self.run_reduce(&format!("red {term} .\n"))
    }

    /// `red in <module> : <term> .`
    pub fn reduce_in(&mut self, module: &str, term: &str) -> io::Result<ReduceResult> {
        self.run_reduce(&format!("red in {module} : {term} .\n"))
    }

    fn run_reduce(&mut self, command: &str) -> io::Result<ReduceResult> {
        self.send(command)?;

        let mut result = ReduceResult::default();
        while !self.prompt_reached()? {
            let line = self.next_line()?;
            if let Some(caps) = RESULT_LINE.captures(line.trim_end_matches('\n')) {
                result = ReduceResult { ok: true, sort: caps[1].to_owned(), term: caps[2].to_owned() };
                break;
            }
        }

        // Pretty-printed terms continue on the following lines.
        if result.ok && !self.prompt_reached()? {
            result.term.push('\n');
            while !self.prompt_reached()? {
                result.term.push_str(&self.next_line()?);
            }
            if result.term.ends_with('\n') {
                result.term.pop();
            }
        }

        self.advance_until_prompt()?;
        Ok(result)
    }
}
