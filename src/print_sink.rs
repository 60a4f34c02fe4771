//! The ambient I/O seam `console.log` writes through.
//!
//! Both backends thread a `&mut dyn PrintSink` through evaluation instead of
//! calling `println!` directly, so execution is observable in tests without
//! capturing real stdout. Mirrors the split the teacher threads through its
//! VM (`PrintWriter`/`StdPrint`/`NoPrint`, re-exported from `lib.rs`) at the
//! scale this crate's single built-in needs.

pub trait PrintSink {
    fn print_line(&mut self, line: &str);
}

#[derive(Debug, Default)]
pub struct StdoutSink;

impl PrintSink for StdoutSink {
    fn print_line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Captures printed lines in memory; used by tests to assert on output.
#[derive(Debug, Default)]
pub struct VecSink(pub Vec<String>);

impl PrintSink for VecSink {
    fn print_line(&mut self, line: &str) {
        self.0.push(line.to_string());
    }
}

/// Discards everything written to it.
#[derive(Debug, Default)]
pub struct NullSink;

impl PrintSink for NullSink {
    fn print_line(&mut self, _line: &str) {}
}
