use std::io::{Read, Write};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Processes killed by a signal report `128 + signal`, as POSIX shells do.
pub type ExitCode = i32;

/// Verdict of a [`BuiltinDispatcher`] for one command.
#[derive(Debug)]
pub enum Dispatch {
    /// The command is not a builtin after all; the executor resolves and
    /// spawns it like any other command.
    NotHandled,
    /// The builtin ran in-process and finished with this exit code.
    Handled(ExitCode),
    /// The builtin ran and failed; the rest of the pipeline is abandoned.
    Failed(anyhow::Error),
}

/// Commands implemented inside the shell process.
///
/// The executor consults the dispatcher for the first stage of a pipeline
/// only. [`is_builtin`](Self::is_builtin) is used while planning and must not
/// have side effects; [`dispatch`](Self::dispatch) runs the command with the
/// stage's standard input. Output is collected by the executor and delivered
/// to the stage's sink once the rest of the pipeline is running.
pub trait BuiltinDispatcher {
    fn is_builtin(&self, name: &str) -> bool;

    fn dispatch(&mut self, argv: &[&str], stdin: &mut dyn Read, stdout: &mut dyn Write) -> Dispatch;
}

/// Dispatcher that knows no builtins: every command is external.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBuiltins;

impl BuiltinDispatcher for NoBuiltins {
    fn is_builtin(&self, _name: &str) -> bool {
        false
    }

    fn dispatch(&mut self, _argv: &[&str], _stdin: &mut dyn Read, _stdout: &mut dyn Write) -> Dispatch {
        Dispatch::NotHandled
    }
}
