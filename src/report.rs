//! Human-readable run reporting and the job-runner status record.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::error::DocumentError;
use crate::types::RunSummary;

/// Receives run progress as it happens.
pub trait Reporter {
    /// Called once, before any file is processed.
    fn discovered(&mut self, count: usize) -> io::Result<()>;

    fn passed(&mut self, file: &str) -> io::Result<()>;

    fn failed(&mut self, file: &str, error: &DocumentError) -> io::Result<()>;

    /// Called once, after the last file.
    fn finished(&mut self, summary: &RunSummary) -> io::Result<()>;
}

/// Streams a line-oriented report to any writer.
pub struct ConsoleReporter<W> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn discovered(&mut self, count: usize) -> io::Result<()> {
        if count == 0 {
            writeln!(self.out, "No files found matching the patterns.")
        } else {
            writeln!(self.out, "Found {count} file(s) to validate.\n")
        }
    }

    fn passed(&mut self, file: &str) -> io::Result<()> {
        writeln!(self.out, "PASS: {file}")
    }

    fn failed(&mut self, file: &str, error: &DocumentError) -> io::Result<()> {
        writeln!(self.out, "FAIL: {file}")?;
        match error {
            DocumentError::SchemaViolation { errors } => {
                for violation in errors {
                    writeln!(self.out, "  {violation}")?;
                }
            }
            other => writeln!(self.out, "  {other}")?,
        }
        writeln!(self.out)?;
        self.out.flush()
    }

    fn finished(&mut self, summary: &RunSummary) -> io::Result<()> {
        if summary.total() == 0 {
            return self.out.flush();
        }
        writeln!(
            self.out,
            "\nResults: {} passed, {} failed out of {} files.",
            summary.validated,
            summary.failed,
            summary.total()
        )?;
        if !summary.is_success() {
            writeln!(self.out, "\nValidation failed.")?;
        }
        self.out.flush()
    }
}

/// Append `validated=<n>` and `failed=<n>` lines to the status file.
pub fn write_status(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "validated={}", summary.validated)?;
    writeln!(file, "failed={}", summary.failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Violation;
    use std::fs;
    use tempfile::TempDir;

    fn output(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn reports_pass_and_fail_lines() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.discovered(2).unwrap();
        reporter.passed("a.json").unwrap();
        reporter
            .failed("b.json", &DocumentError::MissingSchemaReference)
            .unwrap();
        reporter
            .finished(&RunSummary {
                validated: 1,
                failed: 1,
                failures: vec![],
            })
            .unwrap();

        assert_eq!(
            output(reporter),
            "Found 2 file(s) to validate.\n\n\
             PASS: a.json\n\
             FAIL: b.json\n  Missing $schema field\n\n\
             \nResults: 1 passed, 1 failed out of 2 files.\n\
             \nValidation failed.\n"
        );
    }

    #[test]
    fn violations_get_one_line_each() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        let error = DocumentError::SchemaViolation {
            errors: vec![
                Violation {
                    location: "/".into(),
                    message: "\"x\" is a required property".into(),
                },
                Violation {
                    location: "/y".into(),
                    message: "1 is not of type \"string\"".into(),
                },
            ],
        };
        reporter.failed("doc.json", &error).unwrap();

        assert_eq!(
            output(reporter),
            "FAIL: doc.json\n  /: \"x\" is a required property\n  /y: 1 is not of type \"string\"\n\n"
        );
    }

    #[test]
    fn empty_run_has_no_results_line() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.discovered(0).unwrap();
        reporter.finished(&RunSummary::default()).unwrap();
        assert_eq!(output(reporter), "No files found matching the patterns.\n");
    }

    #[test]
    fn status_record_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output");
        fs::write(&path, "previous=1\n").unwrap();

        write_status(
            &path,
            &RunSummary {
                validated: 4,
                failed: 2,
                failures: vec![],
            },
        )
        .unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "previous=1\nvalidated=4\nfailed=2\n"
        );
    }
}
