use crate::history::History;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the shell state that builtins act on.
///
/// The environment contains:
/// - `vars`: variables captured from the shell's own process environment.
///   They are read by builtins (e.g. `HOME` for `cd`) but never passed on to
///   external commands, which always start with an empty environment.
/// - `current_dir`: the working directory, kept in sync by `cd`.
/// - `should_exit`: set by `exit`; the interpreter loop stops when it sees it.
/// - `history`: recent command lines.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
    pub history: History,
}

impl Environment {
    /// Capture the current process state.
    pub fn new(history: History) -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            should_exit: false,
            history,
        }
    }

    /// Get the value of a captured variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}
