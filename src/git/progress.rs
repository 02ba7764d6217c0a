use std::io::BufRead;

use regex_lite::Regex;

/// Splits git output into lines on both `\n` and `\r`.
///
/// git redraws its progress meters with carriage returns, each redraw is
/// reported as its own line. Empty lines are skipped.
pub(super) struct OutputLines<R> {
    reader: R,
}

impl<R: BufRead> OutputLines<R> {
    pub(super) fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for OutputLines<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut pending = Vec::new();
        loop {
            let buffer = match self.reader.fill_buf() {
                Ok(buffer) => buffer,
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => &[][..],
            };
            if buffer.is_empty() {
                return if pending.is_empty() {
                    None
                } else {
                    Some(String::from_utf8_lossy(&pending).into_owned())
                };
            }
            match buffer.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(end) => {
                    pending.extend_from_slice(&buffer[..end]);
                    self.reader.consume(end + 1);
                    if !pending.is_empty() {
                        return Some(String::from_utf8_lossy(&pending).into_owned());
                    }
                }
                None => {
                    let len = buffer.len();
                    pending.extend_from_slice(buffer);
                    self.reader.consume(len);
                }
            }
        }
    }
}

/// Decides which git output lines reach the caller.
pub(super) struct ProgressFilter {
    raw: bool,
    percent: Regex,
}

impl ProgressFilter {
    pub(super) fn new(raw: bool) -> Self {
        Self {
            raw,
            percent: Regex::new(r"^(?:remote: )?[A-Za-z ]+:\s+(\d{1,3})%").unwrap(),
        }
    }

    /// A meter redraw that has not reached 100% yet.
    pub(super) fn is_intermediate(&self, line: &str) -> bool {
        self.percent
            .captures(line)
            .is_some_and(|captures| &captures[1] != "100")
    }

    pub(super) fn accept(&self, line: &str) -> bool {
        self.raw || !self.is_intermediate(line)
    }
}
