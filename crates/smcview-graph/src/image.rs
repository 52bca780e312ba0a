// crates/smcview-graph/src/image.rs

//! Piping DOT text through an external layout program.
//!
//! The description is written to the child's stdin on the calling thread
//! while a scoped thread copies the child's stdout into the destination, so
//! neither side can fill its pipe and stall the other. The producer stays on
//! the calling thread because [`SmcDump`](smcview_dump::SmcDump) is not
//! `Sync`.

use std::io::{self, BufWriter, Write};
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

/// An external program turning DOT on stdin into an image on stdout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutTool {
    program: String,
    args: Vec<String>,
}

impl LayoutTool {
    /// GraphViz `dot` producing `format` (`pdf`, `svg`, `png`, ...).
    #[must_use]
    pub fn dot(format: &str) -> Self {
        Self::new("dot", [format!("-T{format}")])
    }

    /// Any program following the same stdin/stdout contract.
    #[must_use]
    pub fn new<S, I>(program: impl Into<String>, args: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        Self { program: program.into(), args: args.into_iter().map(Into::into).collect() }
    }

    /// Program name.
    #[inline]
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the program can be run at all (`<program> -V` exits normally).
    #[must_use]
    pub fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("-V")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|st| st.success())
    }

    /// Run the tool, feeding it whatever `produce` writes and copying its
    /// output to `out`.
    ///
    /// Fails if the program cannot be spawned, if `produce` fails, or if the
    /// program exits unsuccessfully.
    pub fn to_image<W, F>(&self, out: &mut W, produce: F) -> Result<()>
    where
        W: Write + Send,
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        debug!(program = %self.program, args = ?self.args, "spawning layout tool");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn {}", self.program))?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow!("{} stdin unavailable", self.program))?;
        let mut stdout =
            child.stdout.take().ok_or_else(|| anyhow!("{} stdout unavailable", self.program))?;

        let (produced, copied) = thread::scope(|s| {
            let copier = s.spawn(move || io::copy(&mut stdout, out));

            let mut input = BufWriter::new(stdin);
            let produced = produce(&mut input).and_then(|()| input.flush().map_err(Into::into));
            // Closing stdin lets the tool finish and the copier reach EOF.
            drop(input);

            let copied = copier
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("output copier panicked")));
            (produced, copied)
        });

        let status = child.wait().with_context(|| format!("wait for {}", self.program))?;
        produced.context("writing graph description")?;
        let bytes = copied.context("copying rendered image")?;
        if !status.success() {
            warn!(program = %self.program, %status, "layout tool failed");
            bail!("{} exited with {status}", self.program);
        }
        debug!(bytes, "image written");
        Ok(())
    }
}
