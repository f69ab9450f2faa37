use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::Path,
    sync::{Arc, Mutex},
};

/// Drops ANSI escape sequences so the log file stays plain text.
pub fn strip_ansi_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Escape sequences end at the first alphabetic character.
            for t in chars.by_ref() {
                if t.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Appends to a file and periodically prunes old lines to stay under a
/// maximum line count.
#[derive(Clone)]
pub(crate) struct CircularFileWriter {
    path: String,
    max_lines: u32,
    unpruned: Arc<Mutex<u32>>,
}

impl CircularFileWriter {
    pub fn new(path: String, max_lines: u32) -> Self {
        Self {
            path,
            max_lines,
            unpruned: Arc::new(Mutex::new(0)),
        }
    }

    fn prune(&self) -> io::Result<()> {
        if !Path::new(&self.path).exists() {
            return Ok(());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

        let keep = self.max_lines as usize;
        if lines.len() > keep {
            let tail = lines.split_off(lines.len() - keep);
            let mut file = File::create(&self.path)?;
            for line in &tail {
                writeln!(file, "{}", line)?;
            }
        }
        Ok(())
    }
}

impl io::Write for CircularFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(buf)?;

        let added = buf.iter().filter(|&&b| b == b'\n').count() as u32;
        let prune_due = {
            let mut unpruned = self.unpruned.lock().unwrap_or_else(|e| e.into_inner());
            *unpruned += added;
            // Prune once 10% of max_lines (at least 50 lines) have accumulated.
            if *unpruned >= (self.max_lines / 10).max(50) {
                *unpruned = 0;
                true
            } else {
                false
            }
        };
        if prune_due {
            if let Err(e) = self.prune() {
                eprintln!("failed to prune log file: {}", e);
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CircularFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        let colored = "\x1b[32mINFO \x1b[0m message";
        assert_eq!(strip_ansi_escapes(colored), "INFO  message");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_ansi_escapes("no escapes here"), "no escapes here");
    }

    #[test]
    fn prune_keeps_only_the_newest_lines() {
        let path = std::env::temp_dir().join(format!("legato-writer-test-{}.log", std::process::id()));
        let path_str = path.to_string_lossy().into_owned();
        let _ = std::fs::remove_file(&path);

        let mut writer = CircularFileWriter::new(path_str, 10);
        for i in 0..60 {
            writer.write_all(format!("line {}\n", i).as_bytes()).unwrap();
        }

        // The 50th newline triggers a prune down to 10 lines; the last 10
        // writes then append on top of that.
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 20);
        assert_eq!(lines.first().copied(), Some("line 40"));
        assert_eq!(lines.last().copied(), Some("line 59"));

        let _ = std::fs::remove_file(&path);
    }
}
