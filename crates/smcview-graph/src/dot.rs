// crates/smcview-graph/src/dot.rs

//! DOT generation for model checker dumps.
//!
//! # Output
//!
//! ```text
//! digraph {
//! 	0 [label="(3, 1)", style = filled];
//! 	0 -> 1 [label="tick"];
//! 	...
//! 	legendTerms [shape=plaintext, label=< <table ...> ... </table> >];
//! 	legendStrats [shape=plaintext, label=< <table ...> ... </table> >];
//! }
//! ```
//!
//! Node labels depend on [`LabelMode`]. In [`LabelMode::Legend`] nodes show
//! the `(term, strategy)` string numbers and the full texts are listed once
//! in two legend tables at the end; the other modes print inline.
//! Solution states are filled. Edge labels are `idle`, the rule label, or
//! `opaque(<name>)`, truncated by [`truncate_label`].
//!
//! State terms (inline in [`LabelMode::Term`] and in the `legendTerms` rows)
//! go through the optional [`TermMap`] first.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{Context, Result};
use smcview_dump::{SmcDump, StateIndex, StringIndex, Transition, TransitionKind};
use tracing::debug;

use crate::text::{clean_html, clean_quoted, truncate_label};

const LEGEND_BEGIN: &str =
    "[shape=plaintext, label=< <table cellspacing=\"0\" border =\"0\" cellborder=\"1\">\n";
const LEGEND_END: &str = "\t</table> >];\n";

/// How node labels are printed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LabelMode {
    /// `(term, strategy)` numbers plus legend tables.
    #[default]
    Legend,
    /// Full state term.
    Term,
    /// Full pending strategy.
    Strat,
    /// `(term, strategy)` numbers without legend.
    Short,
}

/// Which outgoing transitions of a state are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetFilter {
    /// Every transition.
    All,
    /// Only the first transition reaching this state.
    Only(StateIndex),
}

/// Rewrites a state term before it is printed.
pub type TermMap<'a> = Box<dyn FnMut(&str) -> String + 'a>;

/// Generates DOT graphs from dumps.
///
/// The seen-string sets only matter in [`LabelMode::Legend`]; they are reset
/// at the start of every render, so one `Grapher` can be reused.
#[derive(Default)]
pub struct Grapher<'a> {
    mode: LabelMode,
    term_map: Option<TermMap<'a>>,
    seen_terms: BTreeSet<StringIndex>,
    seen_strats: BTreeSet<StringIndex>,
}

impl std::fmt::Debug for Grapher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grapher")
            .field("mode", &self.mode)
            .field("term_map", &self.term_map.is_some())
            .field("seen_terms", &self.seen_terms.len())
            .field("seen_strats", &self.seen_strats.len())
            .finish()
    }
}

impl<'a> Grapher<'a> {
    /// A grapher printing node labels in `mode`.
    #[must_use]
    pub const fn new(mode: LabelMode) -> Self {
        Self { mode, term_map: None, seen_terms: BTreeSet::new(), seen_strats: BTreeSet::new() }
    }

    /// Print state terms through `map` (e.g. a term simplifier).
    #[must_use]
    pub fn with_term_map(mut self, map: impl FnMut(&str) -> String + 'a) -> Self {
        self.term_map = Some(Box::new(map));
        self
    }

    /// Label mode in use.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> LabelMode {
        self.mode
    }

    /// Forget the strings collected for the legend.
    pub fn clean(&mut self) {
        self.seen_terms.clear();
        self.seen_strats.clear();
    }

    /// Render the whole system automaton.
    pub fn render_full<W: Write + ?Sized>(&mut self, w: &mut W, dump: &SmcDump) -> Result<()> {
        self.clean();
        debug!(states = dump.num_states(), mode = ?self.mode, "rendering automaton");

        w.write_all(b"digraph {\n")?;
        for index in 0..dump.num_states() {
            self.render_state(w, dump, index, TargetFilter::All)?;
        }
        self.finish(w, dump)
    }

    /// Render only the counterexample: every path and cycle state with the
    /// single edge to its successor in the sequence. The last path state
    /// links to the cycle entry and the last cycle state back to it.
    ///
    /// A dump whose property holds yields an empty graph.
    pub fn render_counterexample<W: Write + ?Sized>(
        &mut self,
        w: &mut W,
        dump: &SmcDump,
    ) -> Result<()> {
        self.clean();
        debug!(
            path = dump.path().len(),
            cycle = dump.cycle().len(),
            mode = ?self.mode,
            "rendering counterexample"
        );

        w.write_all(b"digraph {\n")?;
        if let Some(&cycle_head) = dump.cycle().first() {
            for (seq, next_of_last) in [(dump.path(), cycle_head), (dump.cycle(), cycle_head)] {
                for (k, &state) in seq.iter().enumerate() {
                    let next = seq.get(k + 1).copied().unwrap_or(next_of_last);
                    self.render_state(w, dump, state, TargetFilter::Only(next))?;
                }
            }
        }
        self.finish(w, dump)
    }

    fn finish<W: Write + ?Sized>(&mut self, w: &mut W, dump: &SmcDump) -> Result<()> {
        if self.mode == LabelMode::Legend {
            self.render_legend(w, dump)?;
        }
        w.write_all(b"}\n")?;
        Ok(())
    }

    fn render_state<W: Write + ?Sized>(
        &mut self,
        w: &mut W,
        dump: &SmcDump,
        index: StateIndex,
        filter: TargetFilter,
    ) -> Result<()> {
        let state = dump
            .state(index)
            .with_context(|| format!("reading state {index}"))?;

        let label = match self.mode {
            LabelMode::Legend => {
                self.seen_terms.insert(state.term);
                self.seen_strats.insert(state.strategy);
                format!("({}, {})", state.term, state.strategy)
            }
            LabelMode::Short => format!("({}, {})", state.term, state.strategy),
            LabelMode::Term => {
                let term = dump.get_string(state.term)?;
                clean_quoted(&map_term(&mut self.term_map, term))
            }
            LabelMode::Strat => clean_quoted(&dump.get_string(state.strategy)?),
        };
        let style = if state.solution { ", style = filled" } else { "" };
        writeln!(w, "\t{index} [label=\"{label}\"{style}];")?;

        let limit = match filter {
            TargetFilter::All => usize::MAX,
            TargetFilter::Only(_) => 1,
        };
        let drawn = state
            .successors
            .iter()
            .filter(|tr| match filter {
                TargetFilter::All => true,
                TargetFilter::Only(target) => tr.target == target,
            })
            .take(limit);
        for tr in drawn {
            let label = edge_label(dump, tr)?;
            writeln!(
                w,
                "\t{index} -> {} [label=\"{}\"];",
                tr.target,
                clean_quoted(&truncate_label(&label))
            )?;
        }
        Ok(())
    }

    fn render_legend<W: Write + ?Sized>(&mut self, w: &mut W, dump: &SmcDump) -> Result<()> {
        let tables = [("legendTerms", &self.seen_terms, true), ("legendStrats", &self.seen_strats, false)];
        for (name, seen, is_term) in tables {
            write!(w, "\n\t{name} {LEGEND_BEGIN}")?;
            for &key in seen {
                let mut text = dump
                    .get_string(key)
                    .with_context(|| format!("reading legend string {key}"))?;
                if is_term {
                    text = map_term(&mut self.term_map, text);
                }
                writeln!(w, "\t\t<tr><td>{key}</td><td>{}</td></tr>", clean_html(&text))?;
            }
            w.write_all(LEGEND_END.as_bytes())?;
        }
        Ok(())
    }
}

fn map_term(map: &mut Option<TermMap<'_>>, term: String) -> String {
    match map {
        Some(map) => map(&term),
        None => term,
    }
}

fn edge_label(dump: &SmcDump, tr: &Transition) -> Result<String> {
    let text = |label: Option<StringIndex>| -> Result<String> {
        let idx = label.with_context(|| format!("{:?} transition without label", tr.kind))?;
        Ok(dump.get_string(idx)?)
    };
    Ok(match tr.kind {
        TransitionKind::Idle => "idle".to_owned(),
        TransitionKind::Rule => text(tr.label)?,
        TransitionKind::Opaque => format!("opaque({})", text(tr.label)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use smcview_dump::{DumpWriter, State};

    fn tiny() -> (tempfile::NamedTempFile, SmcDump) {
        let mut w = DumpWriter::new("a", "[] p");
        let a = w.intern("a");
        let s = w.intern("st");
        let r = w.intern("a-rather-long-rule-label");
        w.add_state(State {
            term: a,
            strategy: s,
            solution: true,
            successors: vec![Transition::rule(0, r), Transition::idle(0)],
        });
        let f = tempfile::NamedTempFile::new().unwrap();
        w.write_to(f.path()).unwrap();
        let dump = SmcDump::open(f.path()).unwrap();
        (f, dump)
    }

    #[test]
    fn short_mode_prints_numbers_and_no_legend() {
        let (_f, dump) = tiny();
        let mut out = Vec::new();
        Grapher::new(LabelMode::Short).render_full(&mut out, &dump).unwrap();
        let dot = String::from_utf8(out).unwrap();
        assert_eq!(
            dot,
            "digraph {\n\t0 [label=\"(0, 1)\", style = filled];\n\
             \t0 -> 0 [label=\"a-rather-long-rule-l...\"];\n\
             \t0 -> 0 [label=\"idle\"];\n}\n"
        );
    }

    #[test]
    fn term_mode_inlines_text() {
        let (_f, dump) = tiny();
        let mut out = Vec::new();
        Grapher::new(LabelMode::Term).render_full(&mut out, &dump).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("\t0 [label=\"a\", style = filled];"));
    }

    #[test]
    fn edge_labels_are_cut_before_escaping() {
        let mut w = DumpWriter::new("i", "f");
        let t = w.intern("t");
        let r = w.intern("a<b & \"c\" > d-and-then-more");
        w.add_state(State { term: t, strategy: t, solution: false, successors: vec![Transition::rule(0, r)] });
        let f = tempfile::NamedTempFile::new().unwrap();
        w.write_to(f.path()).unwrap();
        let dump = SmcDump::open(f.path()).unwrap();

        let mut out = Vec::new();
        Grapher::new(LabelMode::Short).render_full(&mut out, &dump).unwrap();
        let dot = String::from_utf8(out).unwrap();
        assert!(
            dot.contains("\t0 -> 0 [label=\"a&lt;b &amp; &#34;c&#34; &gt; d-and-th...\"];"),
            "{dot}"
        );
    }

    #[test]
    fn term_map_rewrites_inline_terms_and_legend_rows() {
        let mut w = DumpWriter::new("i", "f");
        let t = w.intern("< 1 | big >");
        let s = w.intern("step");
        w.add_state(State { term: t, strategy: s, solution: false, successors: vec![] });
        let f = tempfile::NamedTempFile::new().unwrap();
        w.write_to(f.path()).unwrap();
        let dump = SmcDump::open(f.path()).unwrap();

        let render = |mode| {
            let mut calls = 0;
            let mut out = Vec::new();
            Grapher::new(mode)
                .with_term_map(|term: &str| {
                    calls += 1;
                    format!("short({})", term.len())
                })
                .render_full(&mut out, &dump)
                .unwrap();
            (String::from_utf8(out).unwrap(), calls)
        };

        let (dot, calls) = render(LabelMode::Term);
        assert!(dot.contains("\t0 [label=\"short(11)\"];"), "{dot}");
        assert_eq!(calls, 1);

        let (dot, calls) = render(LabelMode::Legend);
        assert!(dot.contains("<tr><td>0</td><td>short(11)</td></tr>"), "{dot}");
        // strategies are left alone
        assert!(dot.contains("<tr><td>1</td><td>step</td></tr>"), "{dot}");
        assert_eq!(calls, 1);

        let (_, calls) = render(LabelMode::Strat);
        assert_eq!(calls, 0);
    }

    #[test]
    fn holding_property_has_empty_counterexample() {
        let (_f, dump) = tiny();
        let mut out = Vec::new();
        Grapher::new(LabelMode::Short).render_counterexample(&mut out, &dump).unwrap();
        assert_eq!(out, b"digraph {\n}\n");
    }
}
