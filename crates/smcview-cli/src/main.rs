// crates/smcview-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use smcview_dump::{generator::generate_dump, DumpSummary, SmcDump};
use smcview_graph::{Grapher, LabelMode, LayoutTool};
use smcview_maude::{
    locate_maude, maude_version, simplifier_for, ModelCheckJob, ModelCheckRequest,
    Session, TermSimplifier,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Automata with more states than this are written as DOT even with `--pdf`.
const MAX_PDF_STATES: u32 = 200;

/// How long the interpreter gets to quit after a check.
const QUIT_TIMEOUT: Duration = Duration::from_millis(250);

const MAUDE_NOT_AVAILABLE: &str = "no version of Maude with support for strategy model checking was found; \
     give its path with --maudecmd or the SMAUDE environment variable";

#[derive(Parser, Debug)]
#[command(
    name = "smcview",
    about = "Strategy-aware model checker for Maude: dump viewer and driver",
    long_about = "Strategy-aware model checker for Maude.\n\nUse this tool to inspect model checker dumps, render them with GraphViz, and run checks through a Maude interpreter.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(clap::Args, Debug)]
struct GraphArgs {
    /// How state labels are printed in the graphs
    #[arg(long, value_enum, default_value_t = GraphOpt::Legend)]
    gopt: GraphOpt,

    /// Generate PDF instead of DOT files (GraphViz `dot` is required)
    #[arg(long, default_value_t = false)]
    pdf: bool,

    /// Directory for the generated graphs
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print a dump's summary and write `<stem>-automaton` and, if the
    /// property fails, `<stem>-counterexpl` graphs.
    View {
        /// Model checker dump
        dump: PathBuf,

        #[command(flatten)]
        graph: GraphArgs,

        /// Simplify the initial term with this operator from smcview-simpl.maude
        #[arg(long)]
        simplifier: Option<String>,

        /// Maude executable (needed by --simplifier)
        #[arg(long, env = "SMAUDE")]
        maudecmd: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run the strategy model checker on a Maude specification.
    Check {
        /// Maude source file to load
        #[arg(long)]
        file: PathBuf,

        /// Module defining the system
        #[arg(long)]
        module: String,

        /// Initial state term
        #[arg(long)]
        initial: String,

        /// LTL formula
        #[arg(long)]
        formula: String,

        /// Strategy name or expression
        #[arg(long, default_value = "all")]
        strategy: String,

        /// Strategies executed as a single step (repeatable)
        #[arg(long = "opaque")]
        opaques: Vec<String>,

        /// Where the model checker writes its dump
        #[arg(long, default_value = "smc.dump")]
        dump: PathBuf,

        /// Render the dump afterwards
        #[arg(long, default_value_t = false)]
        render: bool,

        #[command(flatten)]
        graph: GraphArgs,

        /// Maude executable
        #[arg(long, env = "SMAUDE")]
        maudecmd: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write a deterministic synthetic dump (for demos and benches).
    Simulate {
        /// Number of states (>0)
        #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..))]
        states: u32,

        /// Maximum random extra successors per state
        #[arg(long, default_value_t = 2)]
        branching: u8,

        /// Include a counterexample
        #[arg(long, default_value_t = false)]
        violated: bool,

        /// Output dump path
        #[arg(long, default_value = "synthetic.dump")]
        out: PathBuf,
    },

    /// Print the Maude interpreter that would be used.
    Locate {
        /// Maude executable to check instead of searching
        #[arg(long, env = "SMAUDE")]
        maudecmd: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum GraphOpt {
    /// Numbered states with legend tables
    Legend,
    /// Full state terms
    Term,
    /// Full pending strategies
    Strat,
    /// Numbered states without legend
    Short,
}

impl From<GraphOpt> for LabelMode {
    fn from(opt: GraphOpt) -> Self {
        match opt {
            GraphOpt::Legend => Self::Legend,
            GraphOpt::Term => Self::Term,
            GraphOpt::Strat => Self::Strat,
            GraphOpt::Short => Self::Short,
        }
    }
}

#[derive(Serialize, Debug)]
struct CheckReport<'a> {
    module: &'a str,
    result_sort: &'a str,
    result: &'a str,
    dump: &'a Path,
    summary: Option<DumpSummary>,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::View {
            dump,
            graph,
            simplifier,
            maudecmd,
            json,
        } => view(&dump, &graph, simplifier.as_deref(), maudecmd.as_deref(), json),

        Cmd::Check {
            file,
            module,
            initial,
            formula,
            strategy,
            opaques,
            dump,
            render,
            graph,
            maudecmd,
            json,
        } => {
            let request = ModelCheckRequest { module, initial, formula, strategy, opaques };
            check(&file, &request, &dump, render.then_some(&graph), maudecmd.as_deref(), json)
        }

        Cmd::Simulate {
            states,
            branching,
            violated,
            out,
        } => simulate(states, branching, violated, &out),

        Cmd::Locate { maudecmd } => {
            let (path, version) = resolve_maude(maudecmd.as_deref())?;
            println!("Maude: {}", path.display());
            println!("Maude version: {version}");
            Ok(())
        }
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(true).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Ensure the parent directory for a file exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

/// The interpreter at `explicit`, or the first one found on the system.
fn resolve_maude(explicit: Option<&Path>) -> Result<(PathBuf, String)> {
    match explicit {
        Some(path) => {
            let version = maude_version(path).unwrap_or_default();
            if !version.contains("+strat") {
                bail!(
                    "{} is not a Maude interpreter with strategy support (version {version:?})",
                    path.display()
                );
            }
            Ok((path.to_path_buf(), version))
        }
        None => locate_maude().context(MAUDE_NOT_AVAILABLE),
    }
}

fn view(
    path: &Path,
    graph: &GraphArgs,
    simplifier: Option<&str>,
    maudecmd: Option<&Path>,
    json: bool,
) -> Result<()> {
    let dump = SmcDump::open(path).with_context(|| format!("open dump {}", path.display()))?;
    info!(dump = %path.display(), states = dump.num_states(), "dump opened");

    let mut simplifier: Option<Box<dyn TermSimplifier>> = match simplifier {
        Some(op) => {
            let (maude, _) = resolve_maude(maudecmd)?;
            let cwd = std::env::current_dir().context("current directory")?;
            Some(simplifier_for(Some(op), Some(&maude), &cwd))
        }
        None => None,
    };

    let mut summary = dump.summary();
    if let Some(simplifier) = simplifier.as_mut() {
        summary.initial_term = simplifier.simplify(&summary.initial_term);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&summary).context("serialize summary")?);
    } else {
        print_summary(&summary);
    }

    let stem = path
        .file_stem()
        .map_or_else(|| "dump".to_owned(), |s| s.to_string_lossy().into_owned());
    let simplifier = simplifier.as_deref_mut().map(|s| s as &mut dyn TermSimplifier);
    for written in write_graphs(&dump, graph, &stem, simplifier)? {
        info!(file = %written.display(), "graph written");
    }
    dump.close();
    Ok(())
}

fn print_summary(summary: &DumpSummary) {
    println!("     LTL formula:  {}", summary.ltl_formula);
    println!("    Initial term:  {}", summary.initial_term);
    println!("Number of states:  {}", summary.states);
    println!("           Holds:  {}", summary.holds);
    if !summary.holds {
        println!("            Path:  {:?}", summary.path);
        println!("           Cycle:  {:?}", summary.cycle);
    }
}

/// `<out_dir>/<stem>-<kind>.<ext>`
fn graph_path(out_dir: &Path, stem: &str, kind: &str, pdf: bool) -> PathBuf {
    let ext = if pdf { "pdf" } else { "dot" };
    out_dir.join(format!("{stem}-{kind}.{ext}"))
}

/// Write the automaton graph and, for a failing property, the
/// counterexample graph, with state terms passed through `simplifier`.
/// Returns the written paths.
fn write_graphs(
    dump: &SmcDump,
    args: &GraphArgs,
    stem: &str,
    simplifier: Option<&mut dyn TermSimplifier>,
) -> Result<Vec<PathBuf>> {
    let tool = LayoutTool::dot("pdf");

    let pdf = args.pdf && {
        let available = tool.available();
        if !available {
            warn!("GraphViz dot is not available; DOT sources are written instead of PDF");
        }
        available
    };
    let automaton_pdf = pdf && dump.num_states() <= MAX_PDF_STATES;
    if pdf && !automaton_pdf {
        warn!(
            states = dump.num_states(),
            "automaton may be too large for GraphViz; its DOT source is written instead of PDF"
        );
    }

    let mut grapher = Grapher::new(args.gopt.into());
    if let Some(simplifier) = simplifier {
        grapher = grapher.with_term_map(move |term: &str| simplifier.simplify(term));
    }
    let mut written = Vec::new();

    let path = graph_path(&args.out_dir, stem, "automaton", automaton_pdf);
    write_graph(&path, automaton_pdf.then_some(&tool), |w| grapher.render_full(w, dump))?;
    written.push(path);

    if !dump.property_holds() {
        let path = graph_path(&args.out_dir, stem, "counterexpl", pdf);
        write_graph(&path, pdf.then_some(&tool), |w| grapher.render_counterexample(w, dump))?;
        written.push(path);
    }
    Ok(written)
}

fn write_graph(
    path: &Path,
    tool: Option<&LayoutTool>,
    render: impl FnOnce(&mut dyn Write) -> Result<()>,
) -> Result<()> {
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    match tool {
        Some(tool) => tool.to_image(&mut w, render),
        None => render(&mut w),
    }
    .with_context(|| format!("rendering {}", path.display()))?;
    w.flush().with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

fn check(
    file: &Path,
    request: &ModelCheckRequest,
    dump: &Path,
    render: Option<&GraphArgs>,
    maudecmd: Option<&Path>,
    json: bool,
) -> Result<()> {
    if !file.is_file() {
        bail!("source file {} does not exist", file.display());
    }
    let (maude, version) = resolve_maude(maudecmd)?;
    info!(maude = %maude.display(), %version, "interpreter");

    let dump = if dump.is_absolute() {
        dump.to_path_buf()
    } else {
        std::env::current_dir().context("current directory")?.join(dump)
    };
    ensure_parent_dir(&dump)?;
    // A leftover dump must not pass for this run's output.
    remove_stale_dump(&dump)?;

    let mut session = Session::new(maude);
    session.set_output_path(&dump);
    session.start()?;
    if !session.load(file) {
        bail!("could not load {}", file.display());
    }

    let command = match session.prepare_model_check(request) {
        Ok(command) => command,
        Err(err) => {
            session.quit_with_timeout(QUIT_TIMEOUT);
            return Err(err).context("invalid model checker input");
        }
    };

    let job = ModelCheckJob::spawn(session, command, request.module.clone())?;
    let result = job.wait();
    let (mut session, _) = job.join()?;
    session.quit_with_timeout(QUIT_TIMEOUT);

    if !result.ok {
        bail!("the model checker did not produce a result");
    }

    let summary = if smcview_dump::has_signature(&dump) {
        Some(SmcDump::open(&dump).with_context(|| format!("open dump {}", dump.display()))?.summary())
    } else {
        if render.is_some() {
            bail!("the model checker wrote no dump to {}; nothing to render", dump.display());
        }
        warn!(dump = %dump.display(), "no dump was written");
        None
    };

    if json {
        let report = CheckReport {
            module: &request.module,
            result_sort: &result.sort,
            result: &result.term,
            dump: &dump,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&report).context("serialize report")?);
    } else {
        println!("Result {}: {}", result.sort, result.term);
        if summary.is_some() {
            println!("Dump: {}", dump.display());
        }
    }

    if let Some(graph) = render {
        let opened = SmcDump::open(&dump).with_context(|| format!("open dump {}", dump.display()))?;
        let stem = dump
            .file_stem()
            .map_or_else(|| "smc".to_owned(), |s| s.to_string_lossy().into_owned());
        for written in write_graphs(&opened, graph, &stem, None)? {
            println!("Wrote {}", written.display());
        }
    }
    Ok(())
}

fn remove_stale_dump(dump: &Path) -> Result<()> {
    match std::fs::remove_file(dump) {
        Ok(()) => {
            info!(dump = %dump.display(), "removed dump of a previous run");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove stale dump {}", dump.display())),
    }
}

fn simulate(states: u32, branching: u8, violated: bool, out: &Path) -> Result<()> {
    info!(states, branching, violated, "generating synthetic dump");
    let writer = generate_dump(states, branching, violated);
    ensure_parent_dir(out)?;
    writer
        .write_to(out)
        .with_context(|| format!("writing dump to {}", out.display()))?;

    println!(
        "Simulated automaton: {} states, branching {} ({}) -> {}",
        states,
        branching,
        if violated { "violated" } else { "holds" },
        out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    fn graph_args(dir: &Path, gopt: GraphOpt) -> GraphArgs {
        GraphArgs { gopt, pdf: false, out_dir: dir.to_path_buf() }
    }

    #[test]
    fn graph_names_keep_dots_in_stem() {
        let p = graph_path(Path::new("out"), "model.v2", "automaton", false);
        assert_eq!(p, Path::new("out/model.v2-automaton.dot"));
        let p = graph_path(Path::new("out"), "m", "counterexpl", true);
        assert_eq!(p, Path::new("out/m-counterexpl.pdf"));
    }

    #[test]
    fn counterexample_graph_only_when_violated() {
        let dir = tempfile::tempdir().unwrap();
        for (violated, expected) in [(false, 1), (true, 2)] {
            let path = dir.path().join(format!("d{violated}.dump"));
            simulate(12, 2, violated, &path).unwrap();
            let dump = SmcDump::open(&path).unwrap();
            let stem = format!("d{violated}");
            let written =
                write_graphs(&dump, &graph_args(dir.path(), GraphOpt::Short), &stem, None).unwrap();
            assert_eq!(written.len(), expected);
            for p in written {
                let text = std::fs::read_to_string(p).unwrap();
                assert!(text.starts_with("digraph {\n"));
            }
        }
    }

    struct Tag;

    impl TermSimplifier for Tag {
        fn simplify(&mut self, term: &str) -> String {
            format!("<<{}>>", term.len())
        }
    }

    #[test]
    fn simplifier_reaches_graph_terms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.dump");
        simulate(4, 0, false, &path).unwrap();
        let dump = SmcDump::open(&path).unwrap();

        let written =
            write_graphs(&dump, &graph_args(dir.path(), GraphOpt::Term), "s", Some(&mut Tag)).unwrap();
        let text = std::fs::read_to_string(&written[0]).unwrap();
        // "< 0 | counter: 0 >" is 18 characters long
        assert!(text.contains("\t0 [label=\"&lt;&lt;18&gt;&gt;\""), "{text}");
        assert!(!text.contains("counter:"));
    }

    #[cfg(unix)]
    const NO_DUMP_MAUDE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo '3.3.1+strat'; exit 0; fi
printf 'Maude> '
while IFS= read -r line; do
  case "$line" in
    "quit .") exit 0 ;;
    "show module .") printf 'mod M is\nendm\n' ;;
    "show strats .") printf 'strat all @ State .\n' ;;
    "show op .") printf '    id-hook StrategyModelCheckerSymbol\n' ;;
    "red in LEXICAL : "*) printf '%s\n' "result NeQidList: 'x" ;;
    "red in META-LEVEL : "*) printf '%s\n' "result ResultPair: {'x.State,'State}" ;;
    "red "*) printf 'result ModelCheckResult: true\n' ;;
    *) ;;
  esac
  printf 'Maude> '
done
"#;

    #[cfg(unix)]
    #[test]
    fn check_never_reports_a_leftover_dump() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let maude = dir.path().join("maude");
        std::fs::write(&maude, NO_DUMP_MAUDE).unwrap();
        std::fs::set_permissions(&maude, std::fs::Permissions::from_mode(0o755)).unwrap();
        let source = dir.path().join("m.maude");
        std::fs::write(&source, "mod M is endm\n").unwrap();

        let dump = dir.path().join("old.dump");
        simulate(8, 1, true, &dump).unwrap();
        let request = ModelCheckRequest {
            module: "M".to_owned(),
            initial: "init".to_owned(),
            formula: "[] p".to_owned(),
            strategy: "all".to_owned(),
            opaques: Vec::new(),
        };
        let out = dir.path().join("graphs");
        let graph = graph_args(&out, GraphOpt::Short);

        let err = check(&source, &request, &dump, Some(&graph), Some(&maude), false).unwrap_err();
        assert!(err.to_string().contains("wrote no dump"), "{err:#}");
        assert!(!dump.exists());
        assert!(!graph_path(&out, "old", "automaton", false).exists());

        // Without rendering the run succeeds and still reports no dump.
        simulate(8, 1, true, &dump).unwrap();
        check(&source, &request, &dump, None, Some(&maude), true).unwrap();
        assert!(!dump.exists());
    }

    #[test]
    fn explicit_interpreter_must_support_strategies() {
        let err = resolve_maude(Some(Path::new("/nonexistent/maude"))).unwrap_err();
        assert!(err.to_string().contains("strategy support"));
    }

    #[test]
    fn cli_parses_check() {
        let cli = Cli::try_parse_from([
            "smcview", "check", "--file", "m.maude", "--module", "M", "--initial", "init",
            "--formula", "[] p", "--opaque", "a", "--opaque", "b",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Check { strategy, opaques, graph, .. } => {
                assert_eq!(strategy, "all");
                assert_eq!(opaques, ["a", "b"]);
                assert_eq!(graph.gopt, GraphOpt::Legend);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
