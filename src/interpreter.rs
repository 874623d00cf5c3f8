//! The read-run-report loop around the parser and executor.

use crate::builtin::Builtins;
use crate::command::ExitCode;
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::error::{ExecError, ParseError};
use crate::executor::Executor;
use crate::history::History;
use crate::parser::Parser;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Why a line did not run to completion.
#[derive(Debug, Error)]
pub enum LineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl LineError {
    pub fn code(&self) -> i32 {
        match self {
            LineError::Parse(e) => e.code(),
            LineError::Exec(e) => e.code(),
        }
    }
}

/// The shell: reads lines, runs them as pipelines and reports failures.
///
/// Example
/// ```no_run
/// use pipesh::{Interpreter, ShellConfig};
/// let mut sh = Interpreter::new(ShellConfig::from_env()).unwrap();
/// let code = sh.run_line("ls | wc -l").unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    config: ShellConfig,
    env: Environment,
    parser: Parser,
}

impl Interpreter {
    /// Create an interpreter, loading history from the configured file.
    pub fn new(config: ShellConfig) -> anyhow::Result<Self> {
        let history = History::load(&config.history_file)
            .with_context(|| format!("loading history from {}", config.history_file.display()))?;
        let parser = Parser::new(config.limits);
        Ok(Self {
            env: Environment::new(history),
            parser,
            config,
        })
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// True once `exit` has run.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Parse and run one line, returning the status of its last stage.
    pub fn run_line(&mut self, line: &str) -> Result<ExitCode, LineError> {
        let pipeline = self.parser.parse(line)?;
        if pipeline.is_empty() {
            return Ok(0);
        }
        self.record(line);

        let mut builtins = Builtins::new(&mut self.env);
        let status = Executor::new(&self.config).execute(&pipeline, &mut builtins)?;
        Ok(status)
    }

    fn record(&mut self, line: &str) {
        let line = line.trim();
        if line.split_whitespace().next() == Some("exit") {
            return;
        }
        self.env.history.push(line);
        if let Err(e) = self.env.history.save() {
            tracing::warn!(file = ?self.env.history.file(), error = %format!("{:#}", e), "could not save history");
        }
    }

    /// Run a line and print any failure the way the prompt does.
    pub fn run_and_report(&mut self, line: &str) -> Option<ExitCode> {
        let result = self.run_line(line);
        report(&result);
        result.ok()
    }

    /// Interactive loop until end of input or `exit`.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        while !self.should_exit() {
            let prompt = format!("[{}] pipesh> ", self.env.current_dir.display());
            match rl.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    self.run_and_report(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Run every line of `path` without prompting.
    pub fn run_script(&mut self, path: &Path) -> anyhow::Result<()> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        for line in text.lines() {
            if self.should_exit() {
                break;
            }
            self.run_and_report(line);
        }
        Ok(())
    }
}

/// Print the outcome of a line if it failed.
///
/// Execution failures and non-zero statuses go to stdout, parse errors to
/// stderr.
pub fn report(result: &Result<ExitCode, LineError>) {
    let Some(message) = describe(result) else {
        return;
    };
    match result {
        Err(LineError::Parse(e)) => {
            tracing::debug!(error = %e, "parse failed");
            eprintln!("{}", message);
        }
        Err(LineError::Exec(e)) => {
            tracing::debug!(error = %e, "pipeline failed");
            println!("{}", message);
        }
        Ok(_) => println!("{}", message),
    }
}

/// The message [`report`] prints for `result`, if any.
///
/// Parse errors show the errno magnitude; execution failures show the
/// negative code.
pub fn describe(result: &Result<ExitCode, LineError>) -> Option<String> {
    match result {
        Ok(0) => None,
        Ok(status) => Some(format!("Failed to run command - error {}", status)),
        Err(LineError::Exec(e)) => Some(format!("Failed to run command - error {}", e.code())),
        Err(LineError::Parse(e)) => Some(format!(
            "Parsing error.  Cannot execute command. {}",
            -e.code()
        )),
    }
}
