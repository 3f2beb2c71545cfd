//! JSON Lines episode source.
//!
//! One step record per line. Blank lines are skipped. Episode boundaries
//! come from the `episode_done` field of each record.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::core::step::Step;
use crate::error::{Error, Result};
use crate::source::EpisodeSource;

/// Reads steps from a JSON Lines stream.
///
/// The next non-blank line is read ahead so `epoch_done` can answer without
/// consuming anything.
pub struct JsonlSource<R: BufRead> {
    lines: Lines<R>,
    /// Next non-blank line and its 1-based line number.
    lookahead: Option<(usize, String)>,
    /// Read failure to report on the next pull.
    read_error: Option<Error>,
    line_no: usize,
    steps_read: usize,
}

impl JsonlSource<BufReader<File>> {
    /// Open a JSON Lines file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlSource<R> {
    /// Wrap any buffered reader.
    pub fn from_reader(reader: R) -> Self {
        let mut source = Self {
            lines: reader.lines(),
            lookahead: None,
            read_error: None,
            line_no: 0,
            steps_read: 0,
        };
        source.fill_lookahead();
        source
    }

    /// Number of steps produced so far.
    pub fn steps_read(&self) -> usize {
        self.steps_read
    }

    fn fill_lookahead(&mut self) {
        self.lookahead = None;
        for line in self.lines.by_ref() {
            self.line_no += 1;
            match line {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => {
                    self.lookahead = Some((self.line_no, text));
                    return;
                }
                Err(e) => {
                    self.read_error = Some(Error::Source {
                        steps_read: self.steps_read,
                        reason: format!("line {}: {e}", self.line_no),
                    });
                    return;
                }
            }
        }
    }
}

impl<R: BufRead> EpisodeSource for JsonlSource<R> {
    fn epoch_done(&self) -> bool {
        self.lookahead.is_none() && self.read_error.is_none()
    }

    fn next_step(&mut self) -> Result<Step> {
        if let Some(err) = self.read_error.take() {
            return Err(err);
        }
        let (line_no, text) = self.lookahead.take().ok_or_else(|| Error::Source {
            steps_read: self.steps_read,
            reason: "next step requested after end of epoch".into(),
        })?;

        let step = serde_json::from_str::<Step>(&text).map_err(|e| Error::Source {
            steps_read: self.steps_read,
            reason: format!("line {line_no}: {e}"),
        })?;

        self.steps_read += 1;
        self.fill_lookahead();
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_reads_records_and_skips_blank_lines() {
        let data = "{\"text\": \"a\"}\n\n{\"text\": \"b\", \"episode_done\": true}\n   \n";
        let mut source = JsonlSource::from_reader(Cursor::new(data));

        assert!(!source.epoch_done());
        assert_eq!(source.next_step().unwrap().text, "a");
        let last = source.next_step().unwrap();
        assert!(last.episode_done);
        assert!(source.epoch_done());
        assert_eq!(source.steps_read(), 2);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let data = "{\"text\": \"a\"}\n\nnot json\n";
        let mut source = JsonlSource::from_reader(Cursor::new(data));

        source.next_step().unwrap();
        match source.next_step() {
            Err(Error::Source { steps_read, reason }) => {
                assert_eq!(steps_read, 1);
                assert!(reason.starts_with("line 3"), "{reason}");
            }
            other => panic!("expected source error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input_is_done() {
        let source = JsonlSource::from_reader(Cursor::new(""));
        assert!(source.epoch_done());
    }
}
