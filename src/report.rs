use std::io::{self, Write};

use crate::error::CheckFailure;

const RULE: &str = "------------------------------------------------";

/// Decorated status lines written to the audit's output stream.
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn rule(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", RULE)
    }

    pub fn banner(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.out, "🛡️ {}", msg)
    }

    pub fn step(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.out, "🔍 {}", msg)
    }

    pub fn pass(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.out, "✅ {}", msg)
    }

    pub fn warn(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.out, "⚠️ {}", msg)
    }

    /// Indented detail line under a warning or failure.
    pub fn detail(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.out, "   {}", msg)
    }

    pub fn fail(&mut self, failure: &CheckFailure) -> io::Result<()> {
        writeln!(self.out, "❌ {}", failure)?;
        if let Some(hint) = failure.hint() {
            self.detail(&hint)?;
        }
        Ok(())
    }

    /// A line with a caller-chosen icon, for the deep audit stages.
    pub fn icon(&mut self, icon: &str, msg: &str) -> io::Result<()> {
        writeln!(self.out, "{} {}", icon, msg)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
