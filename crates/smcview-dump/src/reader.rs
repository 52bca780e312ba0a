// crates/smcview-dump/src/reader.rs

//! Random-access reader for model checker dumps.
//!
//! Only the header, the counterexample, the per-state offset table and the
//! string offset table are kept in memory. States and strings are decoded on
//! demand with a positioned read; there is no cache, so callers that revisit
//! the same state repeatedly should keep their own.
//!
//! Path and cycle entries are range-checked when the dump is opened. Indices
//! stored inside state records (targets, string numbers) are checked when the
//! query that needs them runs.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::error::DumpError;
use crate::format::{
    DumpSummary, State, StateIndex, StringIndex, Transition, TransitionKind, FORMAT_VERSION,
    SIGNATURE,
};

/// Upper bound for eager `Vec` reservations driven by on-disk lengths.
const MAX_PREALLOC: usize = 1 << 16;

type Result<T> = std::result::Result<T, DumpError>;

/// An open model checker dump.
///
/// The file handle is owned by the value and released on drop (or
/// explicitly through [`SmcDump::close`]).
#[derive(Debug)]
pub struct SmcDump {
    initial_term: String,
    ltl_formula: String,
    path: Vec<StateIndex>,
    cycle: Vec<StateIndex>,
    state_offsets: Vec<u32>,
    string_offsets: Vec<u32>,
    file: RefCell<BufReader<File>>,
}

/// Cheap check of the first bytes of `path` against the dump signature.
///
/// Any I/O failure (missing file, directory, short file) yields `false`.
#[must_use]
pub fn has_signature<P: AsRef<Path>>(path: P) -> bool {
    let Ok(mut file) = File::open(path.as_ref()) else {
        return false;
    };
    let mut mark = [0u8; SIGNATURE.len()];
    file.read_exact(&mut mark).is_ok() && &mark == SIGNATURE
}

impl SmcDump {
    /// Open and validate the dump at `path`.
    ///
    /// # Errors
    /// [`DumpError::BadSignature`] / [`DumpError::BadVersion`] for foreign
    /// files, [`DumpError::Truncated`] / [`DumpError::Corrupt`] for damaged
    /// headers and tables, [`DumpError::StateOutOfRange`] when the
    /// counterexample names a state that does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref();
        let file = File::open(file_path).map_err(DumpError::Io)?;
        let mut rdr = BufReader::with_capacity(1024, file);

        let mut mark = [0u8; SIGNATURE.len()];
        rdr.read_exact(&mut mark)
            .map_err(|e| match DumpError::from_io(e, "signature") {
                DumpError::Truncated(_) => DumpError::BadSignature,
                other => other,
            })?;
        if &mark != SIGNATURE {
            return Err(DumpError::BadSignature);
        }

        let version = read_u8(&mut rdr, "version")?;
        if version != FORMAT_VERSION {
            return Err(DumpError::BadVersion(version));
        }

        let initial_term = read_cstring(&mut rdr, "initial term")?;
        let ltl_formula = read_cstring(&mut rdr, "formula")?;

        // Zero means the property holds; only then is the counterexample absent.
        let holds = read_u8(&mut rdr, "holds flag")? == 0;
        let n_states = read_len(&mut rdr, "state count")?;

        let (path, cycle) = if holds {
            (Vec::new(), Vec::new())
        } else {
            let n = read_len(&mut rdr, "path length")?;
            let path = read_u32_array(&mut rdr, n, "path")?;
            let n = read_len(&mut rdr, "cycle length")?;
            let cycle = read_u32_array(&mut rdr, n, "cycle")?;
            (path, cycle)
        };

        let count = u32::try_from(n_states)
            .map_err(|_| DumpError::Corrupt(format!("state count {n_states}")))?;
        for &index in path.iter().chain(&cycle) {
            if index >= count {
                return Err(DumpError::StateOutOfRange { index, count });
            }
        }

        let state_offsets = read_u32_array(&mut rdr, n_states, "state offsets")?;
        let table_offset = read_u32(&mut rdr, "string table offset")?;

        // The string table lives elsewhere; reposition the same reader.
        rdr.seek(SeekFrom::Start(u64::from(table_offset)))
            .map_err(DumpError::Io)?;
        let n_strings = read_len(&mut rdr, "string count")?;
        let string_offsets = read_u32_array(&mut rdr, n_strings + 1, "string offsets")?;

        debug!(
            states = n_states,
            strings = n_strings,
            holds,
            path_len = path.len(),
            cycle_len = cycle.len(),
            "opened dump {}",
            file_path.display()
        );

        Ok(Self {
            initial_term,
            ltl_formula,
            path,
            cycle,
            state_offsets,
            string_offsets,
            file: RefCell::new(rdr),
        })
    }

    /// Whether the model-checked property holds (the cycle is empty).
    #[inline]
    #[must_use]
    pub fn property_holds(&self) -> bool {
        self.cycle.is_empty()
    }

    /// Total number of explored states.
    #[inline]
    #[must_use]
    pub fn num_states(&self) -> u32 {
        // Fits: the count was read as a non-negative i32.
        self.state_offsets.len() as u32
    }

    /// Number of interned strings.
    #[inline]
    #[must_use]
    pub fn num_strings(&self) -> u32 {
        (self.string_offsets.len() - 1) as u32
    }

    /// Initial term of the model checking problem.
    #[inline]
    #[must_use]
    pub fn initial_term(&self) -> &str {
        &self.initial_term
    }

    /// Checked LTL formula.
    #[inline]
    #[must_use]
    pub fn ltl_formula(&self) -> &str {
        &self.ltl_formula
    }

    /// Counterexample path, from the initial state to the cycle entry.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[StateIndex] {
        &self.path
    }

    /// Counterexample cycle.
    #[inline]
    #[must_use]
    pub fn cycle(&self) -> &[StateIndex] {
        &self.cycle
    }

    /// Header-level information as an owned value.
    #[must_use]
    pub fn summary(&self) -> DumpSummary {
        DumpSummary {
            initial_term: self.initial_term.clone(),
            ltl_formula: self.ltl_formula.clone(),
            states: self.num_states(),
            holds: self.property_holds(),
            path: self.path.clone(),
            cycle: self.cycle.clone(),
        }
    }

    /// Decode the state record for `index`.
    ///
    /// # Errors
    /// [`DumpError::StateOutOfRange`] for a bad `index` or successor target,
    /// plus format errors for a damaged record.
    pub fn state(&self, index: StateIndex) -> Result<State> {
        let count = self.num_states();
        let offset = *self
            .state_offsets
            .get(index as usize)
            .ok_or(DumpError::StateOutOfRange { index, count })?;

        let mut rdr = self.file.borrow_mut();
        rdr.seek(SeekFrom::Start(u64::from(offset)))
            .map_err(DumpError::Io)?;

        let term = read_u32(&mut *rdr, "state term")?;
        let strategy = read_u32(&mut *rdr, "state strategy")?;
        let solution = read_u8(&mut *rdr, "solution flag")? != 0;
        let n_succ = read_len(&mut *rdr, "successor count")?;

        let mut successors = Vec::with_capacity(n_succ.min(MAX_PREALLOC));
        for _ in 0..n_succ {
            let target = read_u32(&mut *rdr, "successor target")?;
            if target >= count {
                return Err(DumpError::StateOutOfRange { index: target, count });
            }
            let kind = TransitionKind::try_from(read_u8(&mut *rdr, "successor kind")?)?;
            let label = if kind.is_labelled() {
                Some(read_u32(&mut *rdr, "successor label")?)
            } else {
                None
            };
            successors.push(Transition { target, kind, label });
        }

        Ok(State { term, strategy, solution, successors })
    }

    /// Decode interned string `index`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the interpreter prints
    /// terms as bytes.
    ///
    /// # Errors
    /// [`DumpError::StringOutOfRange`] for a bad index, format errors for
    /// decreasing offsets or a short read.
    pub fn get_string(&self, index: StringIndex) -> Result<String> {
        let i = index as usize;
        let (Some(&start), Some(&end)) = (self.string_offsets.get(i), self.string_offsets.get(i + 1))
        else {
            return Err(DumpError::StringOutOfRange { index, count: self.num_strings() });
        };
        let len = end.checked_sub(start).ok_or_else(|| {
            DumpError::Corrupt(format!("string {index} ends before it starts ({start} > {end})"))
        })?;

        let mut buf = vec![0u8; len as usize];
        let mut rdr = self.file.borrow_mut();
        rdr.seek(SeekFrom::Start(u64::from(start)))
            .map_err(DumpError::Io)?;
        rdr.read_exact(&mut buf)
            .map_err(|e| DumpError::from_io(e, "string"))?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Close the dump, releasing the file handle.
    pub fn close(self) {
        drop(self);
    }
}

/* ---------------- Small helpers ---------------- */

fn read_u8<R: Read>(rdr: &mut R, what: &'static str) -> Result<u8> {
    let mut b = [0u8; 1];
    rdr.read_exact(&mut b).map_err(|e| DumpError::from_io(e, what))?;
    Ok(b[0])
}

fn read_i32<R: Read>(rdr: &mut R, what: &'static str) -> Result<i32> {
    let mut b = [0u8; 4];
    rdr.read_exact(&mut b).map_err(|e| DumpError::from_io(e, what))?;
    Ok(i32::from_le_bytes(b))
}

/// Read an `i32` that must be a non-negative index or offset.
fn read_u32<R: Read>(rdr: &mut R, what: &'static str) -> Result<u32> {
    let v = read_i32(rdr, what)?;
    u32::try_from(v).map_err(|_| DumpError::Corrupt(format!("negative {what} ({v})")))
}

fn read_len<R: Read>(rdr: &mut R, what: &'static str) -> Result<usize> {
    read_u32(rdr, what).map(|v| v as usize)
}

fn read_u32_array<R: Read>(rdr: &mut R, n: usize, what: &'static str) -> Result<Vec<u32>> {
    let mut out = Vec::with_capacity(n.min(MAX_PREALLOC));
    for _ in 0..n {
        out.push(read_u32(rdr, what)?);
    }
    Ok(out)
}

fn read_cstring<R: BufRead>(rdr: &mut R, what: &'static str) -> Result<String> {
    let mut buf = Vec::new();
    rdr.read_until(0, &mut buf).map_err(DumpError::Io)?;
    if buf.pop() != Some(0) {
        return Err(DumpError::Truncated(what));
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::DumpWriter;
    use std::io::Write as _;

    fn write_tmp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn rejects_foreign_files() {
        let f = write_tmp(b"definitely not a dump");
        assert!(matches!(SmcDump::open(f.path()), Err(DumpError::BadSignature)));
        assert!(!has_signature(f.path()));

        let short = write_tmp(b"msmc");
        assert!(matches!(SmcDump::open(short.path()), Err(DumpError::BadSignature)));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = SIGNATURE.to_vec();
        bytes.push(3);
        let f = write_tmp(&bytes);
        assert!(has_signature(f.path()));
        let err = SmcDump::open(f.path()).unwrap_err();
        assert!(matches!(err, DumpError::BadVersion(3)));
        assert!(err.is_format_error());
    }

    #[test]
    fn truncated_header_is_a_format_error() {
        let mut bytes = SIGNATURE.to_vec();
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(b"init\0form");
        let f = write_tmp(&bytes);
        let err = SmcDump::open(f.path()).unwrap_err();
        assert!(matches!(err, DumpError::Truncated("formula")), "{err}");
    }

    #[test]
    fn counterexample_indices_are_checked_at_open() {
        let mut w = DumpWriter::new("init", "[] p");
        let t = w.intern("t");
        w.add_state(State { term: t, strategy: t, solution: false, successors: vec![] });
        w.set_counterexample(vec![0], vec![5]);
        let f = write_tmp(&w.to_bytes().unwrap());
        assert!(matches!(
            SmcDump::open(f.path()),
            Err(DumpError::StateOutOfRange { index: 5, count: 1 })
        ));
    }

    #[test]
    fn out_of_range_queries_fail_lazily() {
        let mut w = DumpWriter::new("init", "[] p");
        let t = w.intern("t");
        w.add_state(State { term: t, strategy: t, solution: true, successors: vec![] });
        let f = write_tmp(&w.to_bytes().unwrap());
        let dump = SmcDump::open(f.path()).unwrap();

        assert!(dump.state(0).unwrap().solution);
        assert!(matches!(
            dump.state(1),
            Err(DumpError::StateOutOfRange { index: 1, count: 1 })
        ));
        assert!(matches!(
            dump.get_string(9),
            Err(DumpError::StringOutOfRange { index: 9, count: 1 })
        ));
        dump.close();
    }
}
