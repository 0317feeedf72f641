//! Minimal output capture (SPEC_FULL §B), modeled on (but much smaller
//! than) `git-branchless-lib::core::effects::Effects`: this core has no
//! long-running multi-commit walk that needs progress bars, so `Effects`
//! is just a seam for redirecting human-readable status lines in tests.

use std::io::Write;

/// A place to write human-readable progress/status lines, so CLI commands
/// and their tests can supply different sinks.
pub struct Effects<'a> {
    sink: Box<dyn Write + 'a>,
}

impl<'a> Effects<'a> {
    pub fn new(sink: impl Write + 'a) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// An `Effects` that writes to stdout.
    pub fn new_stdout() -> Effects<'static> {
        Effects::new(std::io::stdout())
    }

    pub fn println(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.sink, "{}", line.as_ref());
    }
}
