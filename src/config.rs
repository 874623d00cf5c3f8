//! Startup settings.

use crate::parser::Limits;
use crate::path::PathTable;
use std::path::PathBuf;

/// Default history file, relative to the directory the shell starts in.
pub const DEFAULT_HISTORY_FILE: &str = ".history";

/// Settings fixed at startup and shared read-only by the parser and executor.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Directories searched for bare command names.
    pub path_table: PathTable,
    /// Bounds on stages and arguments per line.
    pub limits: Limits,
    /// Print `RUNNING:`/`ENDED:` around every stage on stderr.
    pub debug: bool,
    /// Where history is persisted.
    pub history_file: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            path_table: PathTable::default(),
            limits: Limits::default(),
            debug: false,
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
        }
    }
}

impl ShellConfig {
    /// Configuration with the path table taken from `PATH`.
    pub fn from_env() -> Self {
        Self {
            path_table: PathTable::from_env(),
            ..Self::default()
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = path.into();
        self
    }

    pub fn with_path_table(mut self, path_table: PathTable) -> Self {
        self.path_table = path_table;
        self
    }
}
