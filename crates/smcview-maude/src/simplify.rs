// crates/smcview-maude/src/simplify.rs

//! Term simplification before display.
//!
//! Dump terms can be large; a user-provided Maude operator may map them to
//! something more readable. The operator lives in [`SIMPLIFIER_FILE`] and is
//! applied by reducing `op((term))` in a dedicated session.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::session::Session;

/// Maude file expected to define the simplification operator.
pub const SIMPLIFIER_FILE: &str = "smcview-simpl.maude";

/// Turns terms into display text.
pub trait TermSimplifier {
    /// Simplified form of `term`.
    fn simplify(&mut self, term: &str) -> String;
}

/// Leaves terms untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl TermSimplifier for Identity {
    fn simplify(&mut self, term: &str) -> String {
        term.to_owned()
    }
}

/// Reduces `op((term))` in its own interpreter session.
#[derive(Debug)]
pub struct ReduceSimplifier {
    session: Session,
    op: String,
}

impl ReduceSimplifier {
    /// Start `session`, load `definitions` and simplify with `op`.
    pub fn new(mut session: Session, op: impl Into<String>, definitions: &Path) -> Result<Self> {
        if !definitions.is_file() {
            bail!("simplifier definitions {} not found", definitions.display());
        }
        session.start()?;
        if !session.load(definitions) {
            bail!("could not load {}", definitions.display());
        }
        Ok(Self { session, op: op.into() })
    }
}

impl TermSimplifier for ReduceSimplifier {
    fn simplify(&mut self, term: &str) -> String {
        let result = self.session.reduce(&format!("{}(({term}))", self.op));
        if !result.ok {
            debug!(op = %self.op, "simplification failed, keeping the term");
            return term.to_owned();
        }
        unquote(&result.term).to_owned()
    }
}

/// Strip the quotes of a string-looking result.
fn unquote(text: &str) -> &str {
    match text.strip_prefix('"') {
        Some(inner) => inner.strip_suffix('"').unwrap_or(inner),
        None => text,
    }
}

/// A [`ReduceSimplifier`] when `op` is given and the interpreter and
/// [`SIMPLIFIER_FILE`] in `dir` are usable, [`Identity`] otherwise.
#[must_use]
pub fn simplifier_for(op: Option<&str>, program: Option<&Path>, dir: &Path) -> Box<dyn TermSimplifier> {
    let (Some(op), Some(program)) = (op.filter(|o| !o.is_empty()), program) else {
        return Box::new(Identity);
    };
    match ReduceSimplifier::new(Session::new(program), op, &dir.join(SIMPLIFIER_FILE)) {
        Ok(simplifier) => Box::new(simplifier),
        Err(err) => {
            warn!(%err, "term simplifier unavailable, terms are shown as they are");
            Box::new(Identity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquotes_string_results() {
        assert_eq!(unquote("\"3 tokens\""), "3 tokens");
        assert_eq!(unquote("< 1 | 2 >"), "< 1 | 2 >");
        assert_eq!(unquote("\""), "");
    }

    #[test]
    fn falls_back_to_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = simplifier_for(Some("pretty"), Some(Path::new("/nonexistent/maude")), dir.path());
        assert_eq!(s.simplify("f(x)"), "f(x)");
        let mut s = simplifier_for(None, None, dir.path());
        assert_eq!(s.simplify("g"), "g");
    }
}
