//! Fixed-size command history with file persistence.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Number of lines kept; older lines are evicted first.
pub const HISTORY_CAPACITY: usize = 50;

/// Ring buffer of the most recent command lines.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
    file: Option<PathBuf>,
}

impl Default for History {
    fn default() -> Self {
        History::new(HISTORY_CAPACITY)
    }
}

impl History {
    /// In-memory history that is never persisted.
    pub fn new(capacity: usize) -> Self {
        History {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            file: None,
        }
    }

    /// Load history from `path`, which also becomes the save target.
    ///
    /// A missing file gives an empty history.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut history = History::default();
        match fs::File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line.with_context(|| format!("reading {}", path.display()))?;
                    history.push(&line);
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("opening {}", path.display()));
            }
        }
        history.file = Some(path);
        Ok(history)
    }

    /// Append a line, evicting the oldest entry when full.
    pub fn push(&mut self, line: &str) {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.to_string());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Rewrite the history file, if there is one.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        let mut file = fs::File::create(path)
            .with_context(|| format!("cannot write history to {}", path.display()))?;
        for line in self.iter() {
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("history_tests_{}_{}", std::process::id(), tag));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let mut history = History::new(3);
        for line in ["a", "b", "c", "d"] {
            history.push(line);
        }
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["b", "c", "d"]);
    }

    #[test]
    fn newlines_and_blank_lines() {
        let mut history = History::default();
        history.push("ls -l\n");
        history.push("\n");
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["ls -l"]);
    }

    #[test]
    fn default_capacity_is_fifty() {
        let mut history = History::default();
        for i in 0..60 {
            history.push(&format!("cmd {}", i));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next(), Some("cmd 10"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let path = temp_file("missing");
        let history = History::load(&path).unwrap();
        assert!(history.is_empty());
        assert_eq!(history.file(), Some(path.as_path()));
    }

    #[test]
    fn save_then_load() -> Result<()> {
        let path = temp_file("roundtrip");
        let mut history = History::load(&path)?;
        history.push("echo one");
        history.push("ls | wc");
        history.save()?;

        assert_eq!(fs::read_to_string(&path)?, "echo one\nls | wc\n");
        let reloaded = History::load(&path)?;
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), vec!["echo one", "ls | wc"]);

        let _ = fs::remove_file(path);
        Ok(())
    }

    #[test]
    fn clear_persists_empty_file() -> Result<()> {
        let path = temp_file("clear");
        let mut history = History::load(&path)?;
        history.push("pwd");
        history.save()?;
        history.clear();
        history.save()?;
        assert_eq!(fs::read_to_string(&path)?, "");
        let _ = fs::remove_file(path);
        Ok(())
    }
}
