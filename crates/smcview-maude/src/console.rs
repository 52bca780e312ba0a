// crates/smcview-maude/src/console.rs

//! Prompt framing over the interpreter's byte streams.
//!
//! The interpreter prints [`PROMPT`] at the start of a line whenever it is
//! ready for the next command. After writing a command the console peeks at
//! the next `PROMPT.len()` bytes: if they are the prompt, the reply is over
//! and those bytes are discarded; otherwise one line of reply is consumed and
//! the peek repeats. The reply-specific parsers (`reduce`, `parse`, `show`)
//! are all built on [`Console::prompt_reached`], [`Console::read_line`] and
//! [`Console::advance_until_prompt`].
//!
//! Every operation returns `io::Result`; end of stream before a prompt is an
//! [`io::ErrorKind::UnexpectedEof`] error, which the owning session turns
//! into "inactive".

use std::io::{self, Read, Write};

use tracing::trace;

/// Literal prompt bytes.
pub const PROMPT: &[u8] = b"Maude> ";

const CHUNK: usize = 8 * 1024;

/// Command/reply channel to one interpreter.
///
/// `R` is the interpreter's output, `W` its input. Tests drive it with byte
/// slices and vectors; sessions with the child's pipes.
#[derive(Debug)]
pub struct Console<R, W> {
    reader: R,
    writer: W,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: Read, W: Write> Console<R, W> {
    /// Wrap the two ends of an interpreter.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer, buf: Vec::new(), pos: 0 }
    }

    /// Split back into reader and writer (e.g. to close the interpreter's
    /// input while still holding its output).
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Write `command` verbatim and flush.
    pub fn send(&mut self, command: &str) -> io::Result<()> {
        trace!(command = command.trim_end(), "-> maude");
        self.writer.write_all(command.as_bytes())?;
        self.writer.flush()
    }

    /* ---------------- Framing ---------------- */

    /// Block until at least `n` unread bytes are buffered or the stream
    /// ends. Returns whether `n` bytes are available.
    ///
    /// Consumed bytes are dropped once they fill a chunk, so a long reply
    /// only keeps its unread tail in memory.
    fn fill(&mut self, n: usize) -> io::Result<bool> {
        if self.pos > 0 && self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos >= CHUNK {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let mut chunk = [0u8; CHUNK];
        while self.buf.len() - self.pos < n {
            match self.reader.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(k) => self.buf.extend_from_slice(&chunk[..k]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Whether the next unread bytes are the prompt. Does not consume.
    pub fn prompt_reached(&mut self) -> io::Result<bool> {
        if !self.fill(PROMPT.len())? {
            return Ok(false);
        }
        Ok(&self.buf[self.pos..self.pos + PROMPT.len()] == PROMPT)
    }

    /// Consume one line including its `\n`. The last line of a stream may
    /// lack the terminator; an empty string means end of stream.
    pub fn read_line(&mut self) -> io::Result<String> {
        // Offset from `pos`; `fill` may move the buffer but keeps unread bytes.
        let mut scanned = 0;
        loop {
            let from = self.pos + scanned;
            if let Some(nl) = self.buf[from..].iter().position(|&b| b == b'\n') {
                let end = from + nl + 1;
                return Ok(self.take(end));
            }
            scanned = self.buf.len() - self.pos;
            if !self.fill(scanned + 1)? {
                let end = self.buf.len();
                return Ok(self.take(end));
            }
        }
    }

    fn take(&mut self, end: usize) -> String {
        let line = String::from_utf8_lossy(&self.buf[self.pos..end]).into_owned();
        self.pos = end;
        line
    }

    /// Like [`read_line`](Self::read_line) but end of stream is an error.
    pub fn next_line(&mut self) -> io::Result<String> {
        let line = self.read_line()?;
        if line.is_empty() {
            return Err(closed());
        }
        trace!(line = line.trim_end(), "<- maude");
        Ok(line)
    }

    /// Skip lines until the prompt and consume it.
    pub fn advance_until_prompt(&mut self) -> io::Result<()> {
        self.for_each_line(|_| {})
    }

    /// Feed every reply line (with its `\n`) to `f`, then consume the prompt.
    pub fn for_each_line(&mut self, mut f: impl FnMut(&str)) -> io::Result<()> {
        while !self.prompt_reached()? {
            let line = self.next_line()?;
            f(&line);
        }
        self.pos += PROMPT.len();
        Ok(())
    }

    /// Send `command` and collect its whole reply.
    pub fn exchange(&mut self, command: &str) -> io::Result<String> {
        self.send(command)?;
        let mut out = String::new();
        self.for_each_line(|line| out.push_str(line))?;
        Ok(out)
    }

    /* ---------------- Simple commands ---------------- */

    /// `load <path> .`
    pub fn load(&mut self, path: &str) -> io::Result<()> {
        self.send(&format!("load {path} .\n"))?;
        self.advance_until_prompt()
    }

    /// `select <module> .`
    pub fn select(&mut self, module: &str) -> io::Result<()> {
        self.send(&format!("select {module} .\n"))?;
        self.advance_until_prompt()
    }

    /// `set print mixfix on|off .`
    pub fn set_mixfix(&mut self, on: bool) -> io::Result<()> {
        let value = if on { "on" } else { "off" };
        self.send(&format!("set print mixfix {value} .\n"))?;
        self.advance_until_prompt()
    }

    /// Send arbitrary text (a newline is appended) and return everything
    /// printed before the next prompt.
    pub fn raw_input(&mut self, text: &str) -> io::Result<String> {
        self.exchange(&format!("{text}\n"))
    }

    /// `quit .` without waiting for any reply.
    pub fn quit(&mut self) -> io::Result<()> {
        self.send("quit .\n")
    }
}

pub(crate) fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "interpreter closed its output")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A console replaying `script` as interpreter output.
    pub(crate) fn scripted(script: &str) -> Console<&[u8], Vec<u8>> {
        Console::new(script.as_bytes(), Vec::new())
    }

    pub(crate) fn sent(console: Console<&[u8], Vec<u8>>) -> String {
        String::from_utf8(console.into_parts().1).unwrap()
    }

    #[test]
    fn frames_replies_by_prompt() {
        let mut c = scripted("Maude> line one\nline two\nMaude> ");
        c.advance_until_prompt().unwrap();
        let out = c.raw_input("show something .").unwrap();
        assert_eq!(out, "line one\nline two\n");
        assert_eq!(sent(c), "show something .\n");
    }

    #[test]
    fn short_lines_before_prompt() {
        let mut c = scripted("a\n\nb\nMaude> ");
        let mut seen = Vec::new();
        c.for_each_line(|l| seen.push(l.to_owned())).unwrap();
        assert_eq!(seen, ["a\n", "\n", "b\n"]);
    }

    #[test]
    fn prompt_text_inside_a_line_is_not_a_prompt() {
        let mut c = scripted("echo Maude> here\nMaude> ");
        assert_eq!(c.exchange("x\n").unwrap(), "echo Maude> here\n");
    }

    #[test]
    fn end_of_stream_is_an_error() {
        let mut c = scripted("half a reply\n");
        let err = c.advance_until_prompt().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut c = scripted("");
        assert!(!c.prompt_reached().unwrap());
        assert_eq!(c.read_line().unwrap(), "");
    }

    #[test]
    fn long_replies_do_not_accumulate() {
        let mut script: String = (0..4_000).map(|i| format!("op f{i} : Nat -> Nat .\n")).collect();
        script.push_str("Maude> ");
        assert!(script.len() > 8 * CHUNK);

        let mut c = scripted(&script);
        let (mut lines, mut peak) = (0, 0);
        while !c.prompt_reached().unwrap() {
            c.next_line().unwrap();
            lines += 1;
            peak = peak.max(c.buf.len());
        }
        assert_eq!(lines, 4_000);
        assert!(peak < 2 * CHUNK + 64, "buffer grew to {peak} bytes");
    }

    #[test]
    fn commands_are_terminated() {
        let mut c = scripted("Maude> Maude> Maude> ");
        c.load("file.maude").unwrap();
        c.select("FOO").unwrap();
        c.set_mixfix(false).unwrap();
        assert_eq!(
            sent(c),
            "load file.maude .\nselect FOO .\nset print mixfix off .\n"
        );
    }
}
