//! Writer → file → reader properties of the dump format.

use proptest::prelude::*;
use smcview_dump::generator::generate_dump;
use smcview_dump::{has_signature, DumpWriter, SmcDump, State, Transition, TransitionKind};

#[track_caller]
fn open_written(w: &DumpWriter) -> (tempfile::TempDir, SmcDump) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.dump");
    w.write_to(&path).unwrap();
    assert!(has_signature(&path));
    let dump = SmcDump::open(&path).unwrap();
    (dir, dump)
}

#[test]
fn every_state_decodes_with_in_range_targets() {
    for violated in [false, true] {
        let (_dir, dump) = open_written(&generate_dump(64, 3, violated));
        assert_eq!(dump.num_states(), 64);
        for i in 0..dump.num_states() {
            let st = dump.state(i).unwrap();
            for tr in &st.successors {
                assert!(tr.target < dump.num_states(), "state {i} -> {}", tr.target);
                assert_eq!(tr.label.is_some(), tr.kind.is_labelled());
            }
            dump.get_string(st.term).unwrap();
            dump.get_string(st.strategy).unwrap();
        }
    }
}

#[test]
fn holds_iff_cycle_is_empty() {
    let (_d1, holds) = open_written(&generate_dump(10, 1, false));
    assert!(holds.property_holds());
    assert!(holds.path().is_empty() && holds.cycle().is_empty());

    let (_d2, fails) = open_written(&generate_dump(10, 1, true));
    assert!(!fails.property_holds());
    assert!(!fails.cycle().is_empty());
    assert_eq!(fails.path().len() + fails.cycle().len(), 10);
}

#[test]
fn counterexample_is_realizable_in_generated_dumps() {
    let (_dir, dump) = open_written(&generate_dump(30, 2, true));
    let seq: Vec<u32> = dump.path().iter().chain(dump.cycle()).copied().collect();
    let cycle_head = dump.cycle()[0];
    for (k, &s) in seq.iter().enumerate() {
        let next = seq.get(k + 1).copied().unwrap_or(cycle_head);
        let st = dump.state(s).unwrap();
        assert!(
            st.successors.iter().any(|t| t.target == next),
            "no transition {s} -> {next}"
        );
    }
}

#[test]
fn header_strings_and_transitions_survive() {
    let mut w = DumpWriter::new("s(0) | nil", "[] ~ deadlock");
    let t0 = w.intern("s(0)");
    let t1 = w.intern("s(1)");
    let st = w.intern("step !");
    let lbl = w.intern("inc");
    w.add_state(State {
        term: t0,
        strategy: st,
        solution: false,
        successors: vec![Transition::rule(1, lbl), Transition::idle(0)],
    });
    w.add_state(State {
        term: t1,
        strategy: st,
        solution: true,
        successors: vec![Transition::opaque(0, st)],
    });
    w.set_counterexample(vec![0], vec![1]);

    let (_dir, dump) = open_written(&w);
    assert_eq!(dump.initial_term(), "s(0) | nil");
    assert_eq!(dump.ltl_formula(), "[] ~ deadlock");
    assert_eq!(dump.path(), &[0]);
    assert_eq!(dump.cycle(), &[1]);

    let s0 = dump.state(0).unwrap();
    assert_eq!(s0.successors.len(), 2);
    assert_eq!(s0.successors[0].kind, TransitionKind::Rule);
    assert_eq!(dump.get_string(s0.successors[0].label.unwrap()).unwrap(), "inc");
    assert_eq!(s0.successors[1], Transition::idle(0));

    let s1 = dump.state(1).unwrap();
    assert!(s1.solution);
    assert_eq!(dump.get_string(s1.term).unwrap(), "s(1)");
    assert_eq!(s1.successors[0].kind, TransitionKind::Opaque);

    let summary = dump.summary();
    assert!(!summary.holds);
    assert_eq!(summary.states, 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn get_string_returns_exactly_what_was_written(
        strings in proptest::collection::vec("\\PC{0,24}", 0..24)
    ) {
        let mut w = DumpWriter::new("i", "f");
        let ids: Vec<u32> = strings.iter().map(|s| w.push_string(s)).collect();
        let (_dir, dump) = open_written(&w);

        prop_assert_eq!(dump.num_strings() as usize, strings.len());
        for (id, s) in ids.iter().zip(&strings) {
            prop_assert_eq!(&dump.get_string(*id).unwrap(), s);
        }
    }
}
