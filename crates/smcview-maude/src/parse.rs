// crates/smcview-maude/src/parse.rs

//! Term and strategy parsing through the meta-level.
//!
//! Both checks tokenize the text in `LEXICAL`, then ask `META-LEVEL` to parse
//! the token list against the current module. The current module is selected
//! again afterwards, whatever happened in between.

use std::io::{self, Read, Write};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::console::Console;
use crate::reduce::ReduceResult;

lazy_static! {
    /// `noParse(<pos>)` or `noStratParse(<pos>)`
    static ref NO_PARSE: Regex =
        Regex::new(r"^no(?:Strat)?Parse\(([^\)]+)\)$").expect("no-parse regex is valid");
}

/// Classification of a parse attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ParseOutcome {
    /// The text parses, unambiguously.
    Ok,
    /// More than one parse.
    Ambiguous,
    /// Syntax error at token position `pos`.
    NoParse {
        /// Zero-based token position of the error.
        pos: usize,
    },
    /// Anything else (inactive session, unknown module, failed reduction).
    Error,
}

impl ParseOutcome {
    /// Whether the text parsed.
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Error position, for [`ParseOutcome::NoParse`].
    #[must_use]
    pub const fn position(self) -> Option<usize> {
        match self {
            Self::NoParse { pos } => Some(pos),
            _ => None,
        }
    }

    /// Classify the reply of a meta-level parse whose failure sort is
    /// `error_sort`.
    fn classify(result: &ReduceResult, error_sort: &str) -> Self {
        if !result.ok {
            return Self::Error;
        }
        if result.sort != error_sort {
            return Self::Ok;
        }
        if result.term.starts_with("ambiguity") {
            return Self::Ambiguous;
        }
        NO_PARSE
            .captures(&result.term)
            .and_then(|caps| caps[1].trim().parse().ok())
            .map_or(Self::Error, |pos| Self::NoParse { pos })
    }
}

/// `text` as the body of a Maude string literal.
fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl<R: Read, W: Write> Console<R, W> {
    /// Parse `term` as a term of `sort` in the current module.
    pub fn parse(&mut self, term: &str, sort: &str) -> io::Result<ParseOutcome> {
        self.meta_parse(term, "ResultPair?", |module, tokens| {
            format!("metaParse(upModule('{module}, false), {tokens}, '{sort})")
        })
    }

    /// Parse `expr` as a strategy expression in the current module.
    pub fn strat_parse(&mut self, expr: &str) -> io::Result<ParseOutcome> {
        self.meta_parse(expr, "Strategy?", |module, tokens| {
            format!("metaStratParse(upModule('{module}, false), {tokens})")
        })
    }

    fn meta_parse(
        &mut self,
        text: &str,
        error_sort: &str,
        call: impl FnOnce(&str, &str) -> String,
    ) -> io::Result<ParseOutcome> {
        let module = self.current_module_name()?;
        if module.is_empty() {
            return Ok(ParseOutcome::Error);
        }

        let outcome = self.tokenize_and_parse(&module, text, error_sort, call);
        let restored = self.select(&module);
        let outcome = outcome?;
        restored?;
        Ok(outcome)
    }

    fn tokenize_and_parse(
        &mut self,
        module: &str,
        text: &str,
        error_sort: &str,
        call: impl FnOnce(&str, &str) -> String,
    ) -> io::Result<ParseOutcome> {
        let tokens = self.reduce_in("LEXICAL", &format!("tokenize({})", string_literal(text)))?;
        if !tokens.ok {
            return Ok(ParseOutcome::Error);
        }
        let parsed = self.reduce_in("META-LEVEL", &call(module, &tokens.term))?;
        Ok(ParseOutcome::classify(&parsed, error_sort))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::tests::{scripted, sent};

    fn reply(sort: &str, term: &str) -> ReduceResult {
        ReduceResult { ok: true, sort: sort.to_owned(), term: term.to_owned() }
    }

    #[test]
    fn classification() {
        let e = "ResultPair?";
        assert_eq!(ParseOutcome::classify(&reply("ResultPair", "{'a.A, 'A}"), e), ParseOutcome::Ok);
        assert_eq!(
            ParseOutcome::classify(&reply(e, "ambiguity({'a.A, 'A}, {'a.B, 'B})"), e),
            ParseOutcome::Ambiguous
        );
        assert_eq!(
            ParseOutcome::classify(&reply(e, "noParse(3)"), e),
            ParseOutcome::NoParse { pos: 3 }
        );
        assert_eq!(
            ParseOutcome::classify(&reply("Strategy?", "noStratParse(0)"), "Strategy?"),
            ParseOutcome::NoParse { pos: 0 }
        );
        assert_eq!(ParseOutcome::classify(&reply(e, "noParse(x)"), e), ParseOutcome::Error);
        assert_eq!(ParseOutcome::classify(&ReduceResult::default(), e), ParseOutcome::Error);
    }

    #[test]
    fn literal_escapes_quotes_and_backslashes() {
        assert_eq!(string_literal(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
    }

    #[test]
    fn parse_restores_current_module() {
        let script = concat!(
            "mod COUNTER is\n  sort State .\nendm\nMaude> ",
            "result NeQidList: 'next '`( '0 '`)\nMaude> ",
            "result ResultPair?: noParse(1)\nMaude> ",
            "Maude> ",
        );
        let mut c = scripted(script);
        let outcome = c.parse("next ( 0 )", "State").unwrap();
        assert_eq!(outcome, ParseOutcome::NoParse { pos: 1 });
        assert_eq!(outcome.position(), Some(1));
        assert_eq!(
            sent(c),
            concat!(
                "show module .\n",
                "red in LEXICAL : tokenize(\"next ( 0 )\") .\n",
                "red in META-LEVEL : metaParse(upModule('COUNTER, false), 'next '`( '0 '`), 'State) .\n",
                "select COUNTER .\n",
            )
        );
    }

    #[test]
    fn failed_tokenize_still_restores() {
        let script = "smod S is\nendsm\nMaude> Warning: bad\nMaude> Maude> ";
        let mut c = scripted(script);
        assert_eq!(c.strat_parse("x").unwrap(), ParseOutcome::Error);
        assert!(sent(c).ends_with("select S .\n"));
    }
}
