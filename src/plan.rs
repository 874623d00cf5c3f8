//! Descriptor planning for a pipeline, computed before any process exists.
//!
//! For `N` stages the plan uses `N - 1` pipes. Stage `i` reads from pipe
//! `i - 1` and writes to pipe `i`; the ends of the pipeline are the shell's own
//! standard streams unless a redirection file replaces them.

use crate::command::BuiltinDispatcher;
use crate::error::ExecResult;
use crate::parser::Pipeline;
use crate::path::{self, PathTable};
use std::path::PathBuf;

/// What a stage runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// Handled in-process by the builtin dispatcher.
    Builtin,
    /// An executable file, already resolved.
    External(PathBuf),
}

/// Where a stage's standard input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Inherit,
    File(PathBuf),
    Pipe(usize),
}

/// Where a stage's standard output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Inherit,
    File(PathBuf),
    Pipe(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan<'p> {
    pub argv: Vec<&'p str>,
    pub program: Program,
    pub stdin: Source,
    pub stdout: Sink,
}

impl StagePlan<'_> {
    pub fn name(&self) -> &str {
        self.argv.first().copied().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan<'p> {
    pub stages: Vec<StagePlan<'p>>,
    /// Number of pipes to create.
    pub pipes: usize,
}

/// Build the plan for `pipeline`.
///
/// Only the first stage may be a builtin. Every other command is resolved
/// against `table` now, so a missing command aborts the pipeline before any
/// pipe is created or process spawned.
pub fn plan<'p>(
    pipeline: &'p Pipeline<'_>,
    table: &PathTable,
    builtins: &dyn BuiltinDispatcher,
) -> ExecResult<PipelinePlan<'p>> {
    let count = pipeline.len();
    let last = count.saturating_sub(1);
    let mut stages = Vec::with_capacity(count);

    for (i, stage) in pipeline.stages.iter().enumerate() {
        let name = stage.name();
        let program = if i == 0 && builtins.is_builtin(name) {
            Program::Builtin
        } else {
            Program::External(path::resolve(name, table)?)
        };

        let stdin = match (i, pipeline.redirection.infile) {
            (0, Some(file)) => Source::File(PathBuf::from(file)),
            (0, None) => Source::Inherit,
            _ => Source::Pipe(i - 1),
        };
        let stdout = match (i == last, pipeline.redirection.outfile) {
            (true, Some(file)) => Sink::File(PathBuf::from(file)),
            (true, None) => Sink::Inherit,
            (false, _) => Sink::Pipe(i),
        };

        stages.push(StagePlan {
            argv: stage.args(),
            program,
            stdin,
            stdout,
        });
    }

    Ok(PipelinePlan {
        stages,
        pipes: last,
    })
}
