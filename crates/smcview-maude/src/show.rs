// crates/smcview-maude/src/show.rs

//! Declaration listings (`show modules`, `show sorts`, `show strats`, ...).
//!
//! Each listing sends one command and matches every reply line against a
//! fixed pattern. Lines that do not match are skipped.

use std::collections::HashSet;
use std::io::{self, Read, Write};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::console::Console;

lazy_static! {
    static ref MOD_DECL: Regex =
        Regex::new(r"^(fmod|mod|smod|fth|th|sth) ([^ {]+)(?:\{([^}]*)\})? is$")
            .expect("module declaration regex is valid");
    static ref MOD_ENTRY: Regex =
        Regex::new(r"^(fmod|mod|smod|fth|th|sth) ([^ {]+)$").expect("module entry regex is valid");
    static ref SORT: Regex = Regex::new(r"^sort ([^ ]+) .").expect("sort regex is valid");
    static ref STRAT: Regex = Regex::new(r"^strat ([^ ]+)(?: : ([^@]+))? @ ([^ ]+)")
        .expect("strategy declaration regex is valid");
    static ref OP: Regex =
        Regex::new(r"^op ([^ ]+) : (.*)-> ([^ ]+)").expect("operator declaration regex is valid");
}

/// Sort of atomic propositions.
pub const PROP_SORT: &str = "Prop";

/// A module or theory known to the interpreter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Module name.
    pub name: String,
    /// `fmod`, `mod`, `smod`, `fth`, `th` or `sth`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// A module with the theories its parameters range over.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtendedModuleInfo {
    /// Name and kind.
    #[serde(flatten)]
    pub info: ModuleInfo,
    /// Parameter theory names, in declaration order.
    pub params: Vec<String>,
}

/// A strategy declaration `strat name : params @ subject .`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedStrategy {
    /// Strategy name.
    pub name: String,
    /// Parameter sorts.
    pub params: Vec<String>,
    /// Sort the strategy applies to.
    pub subject_sort: String,
}

/// An operator signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Operator {
    /// Operator name.
    pub name: String,
    /// Argument sorts.
    pub params: Vec<String>,
    /// Range sort.
    pub range: String,
}

/// Kinds of labelled statements that can be listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `rl` / `crl`
    Rule,
    /// `eq` / `ceq`
    Equation,
    /// `mb` / `cmb`
    Membership,
    /// `sd` / `csd`
    StrategyDefinition,
}

impl StatementKind {
    const fn listing(self) -> &'static str {
        match self {
            Self::Rule => "rules",
            Self::Equation => "eqs",
            Self::Membership => "mbs",
            Self::StrategyDefinition => "sds",
        }
    }

    const fn keyword(self) -> &'static str {
        match self {
            Self::Rule => "rl",
            Self::Equation => "eq",
            Self::Membership => "mb",
            Self::StrategyDefinition => "sd",
        }
    }
}

fn line_body(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Sub- and supersorts of `sort` in a `show sorts` line, if the line
/// declares `sort`.
///
/// Lines look like `sort S . subsorts A B < S < C .`, with the `subsorts`
/// part (or either side of it) omitted when empty.
fn sort_relations(line: &str, sort: &str) -> Option<(Vec<String>, Vec<String>)> {
    let rest = line_body(line).strip_prefix("sort ")?.strip_prefix(sort)?.strip_prefix(" .")?;
    let Some(chain) = rest.trim().strip_prefix("subsorts ") else {
        return Some((Vec::new(), Vec::new()));
    };
    let chain = chain.trim_end_matches('.').trim();

    let groups: Vec<Vec<&str>> =
        chain.split('<').map(|g| g.split_whitespace().collect()).collect();
    let Some(pivot) = groups.iter().position(|g| g.as_slice() == [sort]) else {
        return Some((Vec::new(), Vec::new()));
    };
    Some((flatten(&groups[..pivot]), flatten(&groups[pivot + 1..])))
}

fn flatten(groups: &[Vec<&str>]) -> Vec<String> {
    groups.iter().flatten().map(|s| (*s).to_owned()).collect()
}

impl<R: Read, W: Write> Console<R, W> {
    /// Name of the current module (`show module .`), empty if unparsable.
    pub fn current_module_name(&mut self) -> io::Result<String> {
        self.send("show module .\n")?;
        let mut name = String::new();
        if !self.prompt_reached()? {
            let first = self.next_line()?;
            if let Some(caps) = MOD_DECL.captures(line_body(&first)) {
                name = caps[2].to_owned();
            }
        }
        self.advance_until_prompt()?;
        Ok(name)
    }

    /// Kind and parameter theories of module `name`.
    pub fn module_info(&mut self, name: &str) -> io::Result<ExtendedModuleInfo> {
        self.send(&format!("show module {name} .\n"))?;
        let mut info = ExtendedModuleInfo {
            info: ModuleInfo { name: name.to_owned(), kind: String::new() },
            params: Vec::new(),
        };
        if !self.prompt_reached()? {
            let first = self.next_line()?;
            if let Some(caps) = MOD_DECL.captures(line_body(&first)) {
                info.info.kind = caps[1].to_owned();
                if let Some(params) = caps.get(3).filter(|m| !m.as_str().is_empty()) {
                    info.params = params
                        .as_str()
                        .split(", ")
                        .map(|p| p.rsplit_once(" :: ").map_or(p, |(_, theory)| theory).to_owned())
                        .collect();
                }
            }
        }
        self.advance_until_prompt()?;
        Ok(info)
    }

    /// All modules and theories (`show modules .`). Instantiations and
    /// renamings are not listed.
    pub fn modules(&mut self) -> io::Result<Vec<ModuleInfo>> {
        self.send("show modules .\n")?;
        let mut modules = Vec::new();
        self.for_each_line(|line| {
            if let Some(caps) = MOD_ENTRY.captures(line_body(line)) {
                modules.push(ModuleInfo { name: caps[2].to_owned(), kind: caps[1].to_owned() });
            }
        })?;
        Ok(modules)
    }

    /// All sorts of the current module.
    pub fn sorts(&mut self) -> io::Result<Vec<String>> {
        self.send("show sorts .\n")?;
        let mut sorts = Vec::new();
        self.for_each_line(|line| {
            if let Some(caps) = SORT.captures(line) {
                sorts.push(caps[1].to_owned());
            }
        })?;
        Ok(sorts)
    }

    /// `(subsorts, supersorts)` of `sort`, or `None` if there is no such
    /// sort in the current module.
    pub fn subsorts(&mut self, sort: &str) -> io::Result<Option<(Vec<String>, Vec<String>)>> {
        self.send("show sorts .\n")?;
        let mut found = None;
        self.for_each_line(|line| {
            if found.is_none() {
                found = sort_relations(line, sort);
            }
        })?;
        Ok(found)
    }

    /// Strategy declarations of the current module.
    pub fn strategies(&mut self) -> io::Result<Vec<NamedStrategy>> {
        self.send("show strats .\n")?;
        let mut strats = Vec::new();
        self.for_each_line(|line| {
            if let Some(caps) = STRAT.captures(line) {
                strats.push(NamedStrategy {
                    name: caps[1].to_owned(),
                    params: caps
                        .get(2)
                        .map(|m| m.as_str().split_whitespace().map(str::to_owned).collect())
                        .unwrap_or_default(),
                    subject_sort: caps[3].to_owned(),
                });
            }
        })?;
        Ok(strats)
    }

    /// Operators whose range is `Prop` or one of its subsorts. Empty when
    /// the current module has no `Prop` sort.
    pub fn atomic_props(&mut self) -> io::Result<Vec<Operator>> {
        let Some((subs, _)) = self.subsorts(PROP_SORT)? else {
            return Ok(Vec::new());
        };
        let prop_sorts: HashSet<String> =
            subs.into_iter().chain(std::iter::once(PROP_SORT.to_owned())).collect();

        self.send("show op .\n")?;
        let mut props = Vec::new();
        self.for_each_line(|line| {
            if let Some(caps) = OP.captures(line) {
                if prop_sorts.contains(&caps[3]) {
                    props.push(Operator {
                        name: caps[1].to_owned(),
                        params: caps[2].split_whitespace().map(str::to_owned).collect(),
                        range: PROP_SORT.to_owned(),
                    });
                }
            }
        })?;
        Ok(props)
    }

    /// Statements of `kind`, reassembled across lines. With a non-empty
    /// `label`, only statements carrying `label <label>` are kept.
    pub fn statements(&mut self, kind: StatementKind, label: &str) -> io::Result<Vec<String>> {
        self.send(&format!("show {} .\n", kind.listing()))?;

        let keyword = format!("{} ", kind.keyword());
        let conditional = format!("c{keyword}");
        let label_attr = format!("label {label}");

        let mut statements = Vec::new();
        let mut keep = |stmt: String| {
            let stmt = stmt.trim_end_matches('\n').to_owned();
            if label.is_empty() || stmt.contains(&label_attr) {
                statements.push(stmt);
            }
        };

        let mut current = String::new();
        self.for_each_line(|line| {
            if line.starts_with(&keyword) || line.starts_with(&conditional) {
                if !current.is_empty() {
                    keep(std::mem::take(&mut current));
                }
                current.push_str(line);
            } else if !current.is_empty() {
                current.push_str(line);
            }
        })?;
        if !current.is_empty() {
            keep(current);
        }
        Ok(statements)
    }

    /// Rules (`rl`/`crl`), optionally filtered by label.
    pub fn rules(&mut self, label: &str) -> io::Result<Vec<String>> {
        self.statements(StatementKind::Rule, label)
    }

    /// Equations (`eq`/`ceq`), optionally filtered by label.
    pub fn equations(&mut self, label: &str) -> io::Result<Vec<String>> {
        self.statements(StatementKind::Equation, label)
    }

    /// Membership axioms (`mb`/`cmb`), optionally filtered by label.
    pub fn memberships(&mut self, label: &str) -> io::Result<Vec<String>> {
        self.statements(StatementKind::Membership, label)
    }

    /// Strategy definitions (`sd`/`csd`), optionally filtered by label.
    pub fn strategy_definitions(&mut self, label: &str) -> io::Result<Vec<String>> {
        self.statements(StatementKind::StrategyDefinition, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::tests::{scripted, sent};

    #[test]
    fn lists_modules() {
        let mut c = scripted("fmod BOOL\nmod COUNTER\nsmod COUNTER-STRAT\nfmod LIST{X}\nMaude> ");
        let mods = c.modules().unwrap();
        let names: Vec<_> = mods.iter().map(|m| (m.kind.as_str(), m.name.as_str())).collect();
        assert_eq!(names, [("fmod", "BOOL"), ("mod", "COUNTER"), ("smod", "COUNTER-STRAT")]);
    }

    #[test]
    fn module_info_keeps_theory_names() {
        let mut c = scripted("fmod LIST{X :: TRIV, Y :: DEFAULT} is\n  sort List .\nendfm\nMaude> ");
        let info = c.module_info("LIST").unwrap();
        assert_eq!(info.info.kind, "fmod");
        assert_eq!(info.params, ["TRIV", "DEFAULT"]);

        let mut c = scripted("mod COUNTER is\nendm\nMaude> ");
        assert!(c.module_info("COUNTER").unwrap().params.is_empty());
        assert_eq!(sent(c), "show module COUNTER .\n");
    }

    #[test]
    fn sorts_and_subsorts() {
        let listing = "sort Bool .\nsort Prop . subsorts Ready Busy < Prop < Formula .\n\
                       sort Formula .\nsort State . subsorts State < Configuration .\nMaude> ";
        assert_eq!(scripted(listing).sorts().unwrap(), ["Bool", "Prop", "Formula", "State"]);

        let (subs, sups) = scripted(listing).subsorts("Prop").unwrap().unwrap();
        assert_eq!(subs, ["Ready", "Busy"]);
        assert_eq!(sups, ["Formula"]);

        let (subs, sups) = scripted(listing).subsorts("State").unwrap().unwrap();
        assert!(subs.is_empty());
        assert_eq!(sups, ["Configuration"]);

        assert_eq!(scripted(listing).subsorts("Bool").unwrap(), Some((vec![], vec![])));
        assert_eq!(scripted(listing).subsorts("Nat").unwrap(), None);
    }

    #[test]
    fn strategy_declarations() {
        let mut c = scripted("strat loop @ State .\nstrat move : Nat Nat @ State .\nMaude> ");
        let s = c.strategies().unwrap();
        assert_eq!(s[0], NamedStrategy { name: "loop".into(), params: vec![], subject_sort: "State".into() });
        assert_eq!(s[1].params, ["Nat", "Nat"]);
    }

    #[test]
    fn atomic_props_follow_prop_subsorts() {
        let script = concat!(
            "sort Prop . subsorts Sig < Prop < Formula .\nMaude> ",
            "op _|=_ : State Formula -> Bool .\n",
            "op done : -> Prop .\n",
            "op at : Nat -> Sig .\n",
            "op next : Nat -> Nat .\n",
            "Maude> ",
        );
        let props = scripted(script).atomic_props().unwrap();
        let names: Vec<_> = props.iter().map(|p| (p.name.as_str(), p.params.clone())).collect();
        assert_eq!(names, [("done", vec![]), ("at", vec!["Nat".to_owned()])]);

        assert!(scripted("sort Bool .\nMaude> ").atomic_props().unwrap().is_empty());
    }

    #[test]
    fn statements_span_lines() {
        let script = concat!(
            "rl [tick] : n => s n .\n",
            "crl [big] : n\n  => 0\n  if n > 10 = true [label big] .\n",
            "rl x => y [label other] .\n",
            "Maude> ",
        );
        let all = scripted(script).rules("").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], "rl [tick] : n => s n .");
        assert_eq!(all[1], "crl [big] : n\n  => 0\n  if n > 10 = true [label big] .");

        let mut c = scripted(script);
        assert_eq!(c.rules("big").unwrap().len(), 1);
        assert_eq!(sent(c), "show rules .\n");
    }
}
