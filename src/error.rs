//! Error types for the parse and execute phases.
//!
//! Every error here is recoverable at the pipeline boundary: the interpreter
//! prints it with its numeric [`code`](ExecError::code) and moves on to the
//! next line.

use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for the execute phase.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors produced while turning a line into a [`Pipeline`](crate::parser::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("too many pipeline stages (at most {max})")]
    TooManyStages { max: usize },
    #[error("too many arguments in stage {stage} (at most {max})")]
    TooManyArgs { stage: usize, max: usize },
    #[error("redirection '{op}' has no target")]
    MissingRedirectTarget { op: char },
    #[error("redirection '{op}' is only allowed on the {allowed} stage")]
    MisplacedRedirect { op: char, allowed: &'static str },
    #[error("more than one '{op}' redirection in pipeline")]
    DuplicateRedirect { op: char },
    #[error("redirection without a command")]
    EmptyCommand,
}

impl ParseError {
    /// Negative errno-style code reported to the user.
    pub fn code(&self) -> i32 {
        match self {
            ParseError::TooManyStages { .. } | ParseError::TooManyArgs { .. } => {
                -(Errno::E2BIG as i32)
            }
            _ => -(Errno::EINVAL as i32),
        }
    }
}

/// Failure to find an executable for a command name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("command not found: {0}")]
    NotFound(String),
}

/// Errors that abort a single pipeline.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("{name}: {message}")]
    Builtin { name: String, message: String },
    #[error("cannot open {}: {source}", path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot create pipe: {0}")]
    Pipe(#[source] Errno),
    #[error("cannot fork {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: Errno,
    },
    #[error("wait failed: {0}")]
    Wait(#[source] Errno),
    #[error("argument contains a NUL byte: {0:?}")]
    Nul(String),
    #[error("builtin i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl ExecError {
    /// Negative errno-style code reported to the user.
    pub fn code(&self) -> i32 {
        match self {
            ExecError::NotFound(_) => -(Errno::ENOENT as i32),
            ExecError::Builtin { .. } => -1,
            ExecError::Redirect { source, .. } | ExecError::Io(source) => {
                -source.raw_os_error().unwrap_or(Errno::EIO as i32)
            }
            ExecError::Pipe(errno) | ExecError::Wait(errno) => -(*errno as i32),
            ExecError::Spawn { source, .. } => -(*source as i32),
            ExecError::Nul(_) => -(Errno::EINVAL as i32),
        }
    }
}

impl From<ResolveError> for ExecError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound(name) => ExecError::NotFound(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_codes_are_negative() {
        assert_eq!(ParseError::TooManyStages { max: 32 }.code(), -7);
        assert_eq!(ParseError::TooManyArgs { stage: 0, max: 15 }.code(), -7);
        assert_eq!(ParseError::EmptyCommand.code(), -22);
    }

    #[test]
    fn exec_error_codes_follow_errno() {
        assert_eq!(ExecError::NotFound("x".into()).code(), -2);
        assert_eq!(
            ExecError::Builtin {
                name: "cd".into(),
                message: "no such dir".into()
            }
            .code(),
            -1
        );
        let redirect = ExecError::Redirect {
            path: PathBuf::from("/nope/file"),
            source: io::Error::from_raw_os_error(libc::EACCES),
        };
        assert_eq!(redirect.code(), -libc::EACCES);
        let io = ExecError::from(io::Error::from_raw_os_error(libc::EBADF));
        assert_eq!(io.code(), -libc::EBADF);
        assert_eq!(ExecError::Spawn { name: "ls".into(), source: Errno::EAGAIN }.code(), -11);
    }

    #[test]
    fn resolve_error_converts_to_not_found() {
        let e: ExecError = ResolveError::NotFound("tool".into()).into();
        assert!(matches!(e, ExecError::NotFound(ref n) if n == "tool"));
        assert_eq!(e.to_string(), "command not found: tool");
    }
}
