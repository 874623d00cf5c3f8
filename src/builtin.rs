//! Commands that run inside the shell process: `cd`, `history` and `exit`.
//!
//! Each builtin is an [`argh`] command; `--help` and argument errors are
//! written to the stage's output like any other output.

use crate::command::{BuiltinDispatcher, Dispatch, ExitCode};
use crate::env::Environment;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` means the builtin could not do its job at all and aborts the pipeline.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Parse `argv` as `T` and run it against the stage's streams.
fn run<T: BuiltinCommand>(
    argv: &[&str],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> Dispatch {
    let args = argv.get(1..).unwrap_or_default();
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => match cmd.execute(stdin, stdout, env) {
            Ok(code) => Dispatch::Handled(code),
            Err(e) => Dispatch::Failed(e),
        },
        Err(EarlyExit { output: text, status }) => {
            if let Err(e) = stdout.write_all(text.as_bytes()) {
                return Dispatch::Failed(e.into());
            }
            Dispatch::Handled(if status.is_err() { 1 } else { 0 })
        }
    }
}

/// The shell's builtin table, bound to the environment it mutates.
pub struct Builtins<'e> {
    env: &'e mut Environment,
}

impl<'e> Builtins<'e> {
    pub fn new(env: &'e mut Environment) -> Self {
        Self { env }
    }
}

impl BuiltinDispatcher for Builtins<'_> {
    fn is_builtin(&self, name: &str) -> bool {
        [Cd::name(), History::name(), Exit::name()].contains(&name)
    }

    fn dispatch(&mut self, argv: &[&str], stdin: &mut dyn Read, stdout: &mut dyn Write) -> Dispatch {
        let Some(&name) = argv.first() else {
            return Dispatch::NotHandled;
        };
        tracing::debug!(name, "running builtin");
        match name {
            n if n == Cd::name() => run::<Cd>(argv, stdin, stdout, self.env),
            n if n == History::name() => run::<History>(argv, stdin, stdout, self.env),
            n if n == Exit::name() => run::<Exit>(argv, stdin, stdout, self.env),
            _ => Dispatch::NotHandled,
        }
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the command history, oldest first.
pub struct History {
    #[argh(switch, short = 'c')]
    /// clear the history instead of printing it.
    pub clear: bool,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.clear {
            env.history.clear();
            env.history.save()?;
            return Ok(0);
        }
        for line in env.history.iter() {
            writeln!(stdout, "{}", line)?;
        }
        stdout.flush()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell after the current line.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}
