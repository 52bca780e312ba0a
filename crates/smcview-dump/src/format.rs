// crates/smcview-dump/src/format.rs

//! Wire constants and decoded records of a model checker dump.
//!
//! Layout (all integers are little-endian `i32`):
//!
//! ```text
//! signature(11) | version(1) | initial term \0 | formula \0 | holds(1) | states
//! [if !holds: path_len path[..] cycle_len cycle[..]]
//! state_offsets[states] | string_table_offset
//! ... at string_table_offset: string_count string_offsets[string_count + 1]
//! ```
//!
//! A state record is `term strat solution(1) successor_count successors[..]`
//! and a successor is `target kind(1) [label if kind != idle]`.

use serde::Serialize;

use crate::error::DumpError;

/// Starting bytes of every dump file.
pub const SIGNATURE: &[u8; 11] = b"msmc-output";

/// The only format version understood by this crate.
pub const FORMAT_VERSION: u8 = 0;

/// Dense state number in `[0, state_count)`.
pub type StateIndex = u32;

/// Index into the interned string table.
pub type StringIndex = u32;

/// Kind of a system-automaton transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TransitionKind {
    /// Idle step (no rule applied).
    Idle = 0,
    /// Rule application; labelled by the rule label.
    Rule = 1,
    /// Opaque strategy call executed as a single step; labelled by its name.
    Opaque = 2,
}

impl TransitionKind {
    /// Whether a label index follows the kind tag on disk.
    #[inline]
    #[must_use]
    pub const fn is_labelled(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl TryFrom<u8> for TransitionKind {
    type Error = DumpError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Idle),
            1 => Ok(Self::Rule),
            2 => Ok(Self::Opaque),
            other => Err(DumpError::BadTransitionKind(other)),
        }
    }
}

/// An outgoing transition of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Target state.
    pub target: StateIndex,
    /// Transition kind.
    pub kind: TransitionKind,
    /// Label string; `Some` exactly when `kind.is_labelled()`.
    pub label: Option<StringIndex>,
}

impl Transition {
    /// An idle transition.
    #[inline]
    #[must_use]
    pub const fn idle(target: StateIndex) -> Self {
        Self { target, kind: TransitionKind::Idle, label: None }
    }

    /// A rule transition labelled by `label`.
    #[inline]
    #[must_use]
    pub const fn rule(target: StateIndex, label: StringIndex) -> Self {
        Self { target, kind: TransitionKind::Rule, label: Some(label) }
    }

    /// An opaque strategy transition labelled by `label`.
    #[inline]
    #[must_use]
    pub const fn opaque(target: StateIndex, label: StringIndex) -> Self {
        Self { target, kind: TransitionKind::Opaque, label: Some(label) }
    }
}

/// A system-automaton state as stored in the dump.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct State {
    /// Interned string holding the state term.
    pub term: StringIndex,
    /// Interned string holding the pending strategy expression.
    pub strategy: StringIndex,
    /// Whether the strategy has a solution at this state.
    pub solution: bool,
    /// Outgoing transitions, in file order.
    pub successors: Vec<Transition>,
}

/// Header-level information, convenient for printing or JSON output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DumpSummary {
    /// Initial term of the model checking problem.
    pub initial_term: String,
    /// Checked LTL formula.
    pub ltl_formula: String,
    /// Number of explored states.
    pub states: u32,
    /// Whether the property holds.
    pub holds: bool,
    /// Counterexample path (empty if the property holds).
    pub path: Vec<StateIndex>,
    /// Counterexample cycle (empty if the property holds).
    pub cycle: Vec<StateIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_wire_values() {
        for kind in [TransitionKind::Idle, TransitionKind::Rule, TransitionKind::Opaque] {
            assert_eq!(TransitionKind::try_from(kind as u8).unwrap(), kind);
        }
        assert!(matches!(
            TransitionKind::try_from(7),
            Err(DumpError::BadTransitionKind(7))
        ));
    }

    #[test]
    fn only_idle_is_unlabelled() {
        assert!(!TransitionKind::Idle.is_labelled());
        assert!(TransitionKind::Rule.is_labelled());
        assert!(TransitionKind::Opaque.is_labelled());
    }
}
