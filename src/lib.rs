//! A small line-oriented shell.
//!
//! A line is parsed into a [`Pipeline`](parser::Pipeline) of stages joined by
//! `|`, with optional `<` and `>` redirections at its ends and `*suffix` globs
//! expanded against the working directory. Bare command names are looked up
//! in a [`PathTable`]; the pipeline then runs as one child process per stage,
//! connected by pipes.
//!
//! The main entry point is [`Interpreter`], which owns the shell state and
//! runs lines from a prompt or a script. [`Parser`], [`Executor`] and the
//! [`command::BuiltinDispatcher`] trait can be used on their own.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod executor;
pub mod glob;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod parser;
pub mod path;
pub mod plan;

pub use builtin::Builtins;
pub use config::ShellConfig;
pub use executor::Executor;
pub use interpreter::{Interpreter, LineError, describe, report};
pub use parser::{Limits, Parser};
pub use path::PathTable;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Serializes tests that fork, count descriptors or change directory.
    pub fn lock_process() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
