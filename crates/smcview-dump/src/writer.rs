// crates/smcview-dump/src/writer.rs

//! Bit-exact dump encoder.
//!
//! The model checker is the real producer of dumps; this writer exists so
//! tests, benches and the `simulate` subcommand can build files with exactly
//! the layout the reader expects. Records are laid out as
//! `header | state offsets | string table pointer | state records | string
//! bytes | string table`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::format::{State, StateIndex, StringIndex, FORMAT_VERSION, SIGNATURE};

/// In-memory builder for a dump file.
#[derive(Clone, Debug, Default)]
pub struct DumpWriter {
    initial_term: String,
    ltl_formula: String,
    counterexample: Option<(Vec<StateIndex>, Vec<StateIndex>)>,
    states: Vec<State>,
    strings: Vec<String>,
    interned: HashMap<String, StringIndex>,
}

impl DumpWriter {
    /// Start a dump for the given problem; the property holds until
    /// [`set_counterexample`](Self::set_counterexample) is called.
    #[must_use]
    pub fn new(initial_term: impl Into<String>, ltl_formula: impl Into<String>) -> Self {
        Self {
            initial_term: initial_term.into(),
            ltl_formula: ltl_formula.into(),
            ..Self::default()
        }
    }

    /// Intern `s`, returning the index of an existing equal string if any.
    pub fn intern(&mut self, s: &str) -> StringIndex {
        if let Some(&idx) = self.interned.get(s) {
            return idx;
        }
        let idx = self.push_string(s);
        self.interned.insert(s.to_owned(), idx);
        idx
    }

    /// Append `s` to the string table unconditionally.
    pub fn push_string(&mut self, s: &str) -> StringIndex {
        self.strings.push(s.to_owned());
        (self.strings.len() - 1) as StringIndex
    }

    /// Append a state, returning its index.
    pub fn add_state(&mut self, state: State) -> StateIndex {
        self.states.push(state);
        (self.states.len() - 1) as StateIndex
    }

    /// Mutable access to a previously added state (to add transitions later).
    pub fn state_mut(&mut self, index: StateIndex) -> Option<&mut State> {
        self.states.get_mut(index as usize)
    }

    /// Mark the property as violated with the given counterexample.
    pub fn set_counterexample(&mut self, path: Vec<StateIndex>, cycle: Vec<StateIndex>) {
        self.counterexample = Some((path, cycle));
    }

    /// Number of states added so far.
    #[inline]
    #[must_use]
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Encode the whole dump.
    ///
    /// Fails only if an offset does not fit the format's `i32` fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(SIGNATURE);
        out.push(FORMAT_VERSION);
        push_cstring(&mut out, &self.initial_term)?;
        push_cstring(&mut out, &self.ltl_formula)?;
        out.push(u8::from(self.counterexample.is_some()));
        push_len(&mut out, self.states.len())?;
        if let Some((path, cycle)) = &self.counterexample {
            push_len(&mut out, path.len())?;
            for &s in path {
                push_u32(&mut out, s)?;
            }
            push_len(&mut out, cycle.len())?;
            for &s in cycle {
                push_u32(&mut out, s)?;
            }
        }

        // Records start right after the offset table and the table pointer.
        let mut cursor = out.len() + 4 * self.states.len() + 4;
        let mut records = Vec::new();
        for state in &self.states {
            push_len(&mut out, cursor)?;
            let before = records.len();
            encode_state(&mut records, state)?;
            cursor += records.len() - before;
        }

        let mut string_offsets = Vec::with_capacity(self.strings.len() + 1);
        let mut string_bytes = Vec::new();
        for s in &self.strings {
            string_offsets.push(cursor + string_bytes.len());
            string_bytes.extend_from_slice(s.as_bytes());
        }
        string_offsets.push(cursor + string_bytes.len());
        let table_offset = cursor + string_bytes.len();

        push_len(&mut out, table_offset)?;
        out.extend_from_slice(&records);
        out.extend_from_slice(&string_bytes);
        push_len(&mut out, self.strings.len())?;
        for off in string_offsets {
            push_len(&mut out, off)?;
        }
        Ok(out)
    }

    /// Encode and write the dump to `path`, creating parent directories.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(dir) = path_ref.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating parent directory {}", dir.display()))?;
            }
        }
        let bytes = self.to_bytes()?;
        let f = File::create(path_ref).with_context(|| format!("create {}", path_ref.display()))?;
        let mut w = BufWriter::new(f);
        w.write_all(&bytes).with_context(|| "write dump bytes")?;
        w.flush().with_context(|| "flush dump writer")?;
        Ok(())
    }
}

fn encode_state(out: &mut Vec<u8>, state: &State) -> Result<()> {
    push_u32(out, state.term)?;
    push_u32(out, state.strategy)?;
    out.push(u8::from(state.solution));
    push_len(out, state.successors.len())?;
    for tr in &state.successors {
        push_u32(out, tr.target)?;
        out.push(tr.kind as u8);
        if tr.kind.is_labelled() {
            let label = tr
                .label
                .ok_or_else(|| anyhow!("{:?} transition to {} has no label", tr.kind, tr.target))?;
            push_u32(out, label)?;
        }
    }
    Ok(())
}

fn push_cstring(out: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(anyhow!("header string contains a NUL byte"));
    }
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

fn push_u32(out: &mut Vec<u8>, v: u32) -> Result<()> {
    let v = i32::try_from(v).map_err(|_| anyhow!("value {v} does not fit an i32 field"))?;
    out.extend_from_slice(&v.to_le_bytes());
    Ok(())
}

fn push_len(out: &mut Vec<u8>, v: usize) -> Result<()> {
    let v = i32::try_from(v).map_err(|_| anyhow!("length/offset {v} does not fit an i32 field"))?;
    out.extend_from_slice(&v.to_le_bytes());
    Ok(())
}
