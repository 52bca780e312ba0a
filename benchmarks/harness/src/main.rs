//! smcview-bench-harness
//!
//! Run small end-to-end benchmarks (generate -> open -> scan -> render)
//! and append CSV rows into `benchmarks/reports/bench-<unix>.csv`.
//!
//! Usage examples:
//!   cargo run -p smcview-bench-harness -- --profile benchmarks/profiles/small.toml
//!   cargo run --release -p smcview-bench-harness -- --profile benchmarks/profiles/large.toml

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Deserialize;

use smcview_dump::{generator::generate_dump, SmcDump};
use smcview_graph::{Grapher, LabelMode};

#[derive(Debug, Deserialize)]
struct Profile {
    /// States in the synthetic automaton
    states: u32,
    /// Maximum random extra successors per state
    branching: u8,
    /// Whether the dump carries a counterexample
    violated: bool,
    /// Label mode of the rendered graphs
    #[serde(default)]
    mode: Mode,
    /// Repetitions of the whole pipeline
    repeats: u32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    #[default]
    Legend,
    Term,
    Strat,
    Short,
}

impl From<Mode> for LabelMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Legend => Self::Legend,
            Mode::Term => Self::Term,
            Mode::Strat => Self::Strat,
            Mode::Short => Self::Short,
        }
    }
}

fn parse_flag(name: &str, default: &str) -> String {
    let mut it = std::env::args().skip(1);
    while let Some(k) = it.next() {
        if k == format!("--{name}") {
            return it.next().unwrap_or_else(|| default.to_string());
        }
    }
    default.to_string()
}

fn dur_ms(d: Duration) -> u128 {
    d.as_millis()
}

fn main() -> Result<()> {
    let profile_path = PathBuf::from(parse_flag("profile", "benchmarks/profiles/small.toml"));

    let profile_src = fs::read_to_string(&profile_path)
        .with_context(|| format!("read profile {}", profile_path.display()))?;
    let profile: Profile = toml::from_str(&profile_src).context("parse profile toml")?;
    println!(
        "Profile: states={}, branching={}, violated={}, mode={:?}, repeats={}",
        profile.states, profile.branching, profile.violated, profile.mode, profile.repeats
    );

    fs::create_dir_all("benchmarks/reports").context("create benchmarks/reports")?;

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let csv_path = PathBuf::from(format!("benchmarks/reports/bench-{ts}.csv"));
    let mut csv = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&csv_path)
        .with_context(|| format!("open {}", csv_path.display()))?;
    writeln!(csv, "timestamp,states,branching,violated,repeat,stage,ms,extra")?;

    let row = |csv: &mut fs::File, rep: u32, stage: &str, d: Duration, extra: String| {
        writeln!(
            csv,
            "{ts},{},{},{},{rep},{stage},{},{extra}",
            profile.states,
            profile.branching,
            profile.violated,
            dur_ms(d)
        )
    };

    for rep in 0..profile.repeats {
        let dump_path = PathBuf::from(format!("benchmarks/tmp-dump-{ts}-{rep}.dump"));

        // 1) generate + encode
        let t0 = Instant::now();
        let writer = generate_dump(profile.states, profile.branching, profile.violated);
        writer.write_to(&dump_path)?;
        let t_gen = t0.elapsed();
        let bytes = fs::metadata(&dump_path).map(|m| m.len()).unwrap_or_default();
        row(&mut csv, rep, "gen", t_gen, format!("bytes={bytes}"))?;

        // 2) open (header + index tables)
        let t0 = Instant::now();
        let dump = SmcDump::open(&dump_path)?;
        let t_open = t0.elapsed();
        row(&mut csv, rep, "open", t_open, format!("strings={}", dump.num_strings()))?;

        // 3) scan every state record
        let t0 = Instant::now();
        let mut edges = 0usize;
        for i in 0..dump.num_states() {
            edges += dump.state(i)?.successors.len();
        }
        let t_scan = t0.elapsed();
        row(&mut csv, rep, "scan", t_scan, format!("edges={edges}"))?;

        // 4) render the automaton, then the counterexample if any
        let mut grapher = Grapher::new(profile.mode.into());
        let mut out = Vec::new();
        let t0 = Instant::now();
        grapher.render_full(&mut out, &dump)?;
        let t_full = t0.elapsed();
        row(&mut csv, rep, "render-full", t_full, format!("dot_bytes={}", out.len()))?;

        if !dump.property_holds() {
            out.clear();
            let t0 = Instant::now();
            grapher.render_counterexample(&mut out, &dump)?;
            let t_cex = t0.elapsed();
            row(&mut csv, rep, "render-cex", t_cex, format!("dot_bytes={}", out.len()))?;
        }

        dump.close();
        // cleanup temp files to avoid disk bloat
        let _ = fs::remove_file(&dump_path);
    }

    println!("Wrote report -> {}", csv_path.display());
    Ok(())
}
