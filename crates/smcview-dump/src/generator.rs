// crates/smcview-dump/src/generator.rs

//! Tiny synthetic automaton generator used by the CLI `simulate` subcommand
//! and the benches. Produces a [`DumpWriter`] with `n` states, a spine
//! `0 -> 1 -> ... -> n-1` and up to `branching` random extra successors per
//! state. With `violated`, the spine is split into a path and a cycle whose
//! last state loops back to the cycle entry, so the counterexample is
//! realizable by actual transitions.

use rand::{rngs::StdRng, Rng as _, SeedableRng};

use crate::format::{State, Transition};
use crate::writer::DumpWriter;

const RULES: [&str; 5] = ["tick", "send", "receive", "acquire-lock", "release-everything-now"];
const STRATEGIES: [&str; 3] = ["idle", "step ; loop", "(send | receive) ! ; loop"];

/// Generate a deterministic synthetic dump.
///
/// `n == 0` yields an empty automaton (and never a counterexample).
#[must_use]
pub fn generate_dump(n: u32, branching: u8, violated: bool) -> DumpWriter {
    let mut rng = StdRng::seed_from_u64(42);
    let mut w = DumpWriter::new("init", "[] <> done");

    let rules: Vec<_> = RULES.iter().map(|r| w.intern(r)).collect();
    let strats: Vec<_> = STRATEGIES.iter().map(|s| w.intern(s)).collect();

    for i in 0..n {
        let term = w.intern(&format!("< {i} | counter: {} >", i % 7));
        let strategy = strats[rng.random_range(0..strats.len())];
        let solution = rng.random_bool(0.1);
        w.add_state(State { term, strategy, solution, successors: Vec::new() });
    }
    if n == 0 {
        return w;
    }

    // Split point between path and cycle (cycle is never empty).
    let cycle_start = if violated { rng.random_range(0..n) } else { n };

    for i in 0..n {
        let mut successors = Vec::new();
        if i + 1 < n {
            successors.push(Transition::rule(i + 1, rules[rng.random_range(0..rules.len())]));
        } else if violated {
            successors.push(Transition::opaque(cycle_start, rules[rules.len() - 1]));
        }
        for _ in 0..rng.random_range(0..=branching) {
            let target = rng.random_range(0..n);
            let tr = match rng.random_range(0..3) {
                0 => Transition::idle(target),
                1 => Transition::rule(target, rules[rng.random_range(0..rules.len())]),
                _ => Transition::opaque(target, strats[rng.random_range(0..strats.len())]),
            };
            successors.push(tr);
        }
        if let Some(state) = w.state_mut(i) {
            state.successors = successors;
        }
    }

    if violated {
        w.set_counterexample((0..cycle_start).collect(), (cycle_start..n).collect());
    }

    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_is_deterministic() {
        let a = generate_dump(20, 2, true).to_bytes().unwrap();
        let b = generate_dump(20, 2, true).to_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_automaton_encodes() {
        let w = generate_dump(0, 3, true);
        assert_eq!(w.num_states(), 0);
        assert!(w.to_bytes().is_ok());
    }
}
