// crates/smcview-maude/src/locate.rs

//! Finding an interpreter with strategy support.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

/// Environment variable naming the interpreter explicitly.
pub const MAUDE_ENV: &str = "SMAUDE";

/// Marker in `--version` output of builds with the strategy language.
pub const STRATEGY_MARKER: &str = "+strat";

const EXECUTABLE: &str = "maude";

/// First line of `<path> --version`, or `None` if it cannot be run.
#[must_use]
pub fn maude_version(path: &Path) -> Option<String> {
    let output = Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines().next().map(|l| l.trim().to_owned()).filter(|l| !l.is_empty())
}

/// Version of the interpreter at `path` if it is a file whose version
/// mentions [`STRATEGY_MARKER`].
#[must_use]
pub fn check_maude(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let version = maude_version(path)?;
    debug!(path = %path.display(), %version, "interpreter candidate");
    version.contains(STRATEGY_MARKER).then_some(version)
}

/// Candidates in lookup order: `./maude`, `maude` next to the running
/// executable, `$SMAUDE`, then every `maude` on `PATH`.
fn candidates(
    cwd: Option<PathBuf>,
    exe: Option<PathBuf>,
    explicit: Option<&OsStr>,
    search_path: Option<&OsStr>,
) -> Vec<PathBuf> {
    let mut out = Vec::new();
    out.extend(cwd.map(|d| d.join(EXECUTABLE)));
    out.extend(exe.as_deref().and_then(Path::parent).map(|d| d.join(EXECUTABLE)));
    out.extend(explicit.filter(|s| !s.is_empty()).map(PathBuf::from));
    if let Some(paths) = search_path {
        out.extend(env::split_paths(paths).map(|d| d.join(EXECUTABLE)));
    }
    out
}

/// Path and version of the first usable interpreter.
#[must_use]
pub fn locate_maude() -> Option<(PathBuf, String)> {
    let explicit = env::var_os(MAUDE_ENV);
    let search_path = env::var_os("PATH");
    candidates(
        env::current_dir().ok(),
        env::current_exe().ok(),
        explicit.as_deref(),
        search_path.as_deref(),
    )
    .into_iter()
    .find_map(|path| check_maude(&path).map(|version| (path, version)))
}
