//! Launches a planned pipeline as a chain of processes.
//!
//! Execution runs in three steps: [`plan`](crate::plan::plan) decides where
//! every stage reads and writes, the spawn loop creates the processes in stage
//! order, and the join step waits for all of them. A builtin in the first
//! stage runs in the shell process; its output is buffered and written out
//! after the downstream stages have started. Every descriptor the shell
//! opens is an [`OwnedFd`] and is dropped in the parent as soon as the stage
//! that needed it has been started, on error paths too.

use crate::command::{BuiltinDispatcher, Dispatch, ExitCode};
use crate::config::ShellConfig;
use crate::error::{ExecError, ExecResult};
use crate::io_adapters::{FdStream, MemWriter};
use crate::parser::Pipeline;
use crate::path;
use crate::plan::{self, PipelinePlan, Program, Sink, Source, StagePlan};
use libc::c_char;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use std::cell::RefCell;
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Exit status reported when `execve` fails in the child.
const EXEC_FAILED: ExitCode = 126;

/// Runs pipelines with the settings in a [`ShellConfig`].
pub struct Executor<'c> {
    config: &'c ShellConfig,
    trace: RefCell<Box<dyn Write + 'c>>,
}

impl<'c> Executor<'c> {
    pub fn new(config: &'c ShellConfig) -> Self {
        Self {
            config,
            trace: RefCell::new(Box::new(io::stderr())),
        }
    }

    /// Send the `RUNNING:`/`ENDED:` lines to `out` instead of stderr.
    pub fn with_trace(mut self, out: impl Write + 'c) -> Self {
        self.trace = RefCell::new(Box::new(out));
        self
    }

    /// Run `pipeline` to completion.
    ///
    /// Returns the exit status of the last stage. An empty pipeline does
    /// nothing and succeeds.
    pub fn execute(
        &self,
        pipeline: &Pipeline<'_>,
        builtins: &mut dyn BuiltinDispatcher,
    ) -> ExecResult<ExitCode> {
        if pipeline.is_empty() {
            return Ok(0);
        }
        let plan = plan::plan(pipeline, &self.config.path_table, builtins)?;
        tracing::debug!(stages = plan.stages.len(), pipes = plan.pipes, "executing pipeline");

        let _stdio = StdioGuard::save();
        let mut pipes = PipeSet::open(plan.pipes)?;
        let mut statuses: Vec<Option<ExitCode>> = vec![None; plan.stages.len()];
        let mut children: Vec<(usize, Pid)> = Vec::with_capacity(plan.stages.len());

        let spawned = self.spawn_all(&plan, &mut pipes, builtins, &mut statuses, &mut children);
        drop(pipes);
        let joined = join(&children, &mut statuses);

        for (stage, status) in plan.stages.iter().zip(&statuses) {
            if let Some(code) = status {
                self.trace_end(stage, *code);
            }
        }

        spawned?;
        joined?;
        let last = statuses.last().copied().flatten().unwrap_or(0);
        tracing::debug!(status = last, "pipeline finished");
        Ok(last)
    }

    fn spawn_all(
        &self,
        plan: &PipelinePlan<'_>,
        pipes: &mut PipeSet,
        builtins: &mut dyn BuiltinDispatcher,
        statuses: &mut [Option<ExitCode>],
        children: &mut Vec<(usize, Pid)>,
    ) -> ExecResult<()> {
        // Output of an in-process builtin, held back until its reader exists.
        let mut pending: Option<(Endpoint, Vec<u8>)> = None;

        for (i, stage) in plan.stages.iter().enumerate() {
            self.trace_start(stage);
            let stdin = Endpoint::input(&stage.stdin, pipes)?;
            let stdout = Endpoint::output(&stage.stdout, pipes)?;

            let program = match &stage.program {
                Program::Builtin => {
                    match run_builtin(stage, &stdin, builtins)? {
                        Some((code, output)) => {
                            statuses[i] = Some(code);
                            pending = Some((stdout, output));
                            continue;
                        }
                        None => path::resolve(stage.name(), &self.config.path_table)?,
                    }
                }
                Program::External(resolved) => resolved.clone(),
            };

            let image = ExecImage::new(&program, &stage.argv)?;
            let mut close = pipes.raw_fds();
            close.extend(stdin.owned_raw_fd());
            close.extend(stdout.owned_raw_fd());
            close.extend(pending.as_ref().and_then(|(sink, _)| sink.owned_raw_fd()));
            let pid = spawn(stage.name(), &image, stdin.as_fd(), stdout.as_fd(), &close)?;
            tracing::trace!(stage = i, pid = pid.as_raw(), "spawned");
            children.push((i, pid));
            // stdin and stdout drop here, closing the parent's copies.
        }

        match pending {
            Some((sink, output)) => deliver(sink, &output),
            None => Ok(()),
        }
    }

    fn trace_start(&self, stage: &StagePlan<'_>) {
        if self.config.debug {
            let _ = writeln!(self.trace.borrow_mut(), "RUNNING: [{}]", stage.name());
        }
    }

    fn trace_end(&self, stage: &StagePlan<'_>, code: ExitCode) {
        if self.config.debug {
            let _ = writeln!(self.trace.borrow_mut(), "ENDED: [{}] (ret={})", stage.name(), code);
        }
    }
}

/// Run a stage-0 builtin, returning its status and collected output.
///
/// `None` means the dispatcher declined the command.
fn run_builtin(
    stage: &StagePlan<'_>,
    stdin: &Endpoint,
    builtins: &mut dyn BuiltinDispatcher,
) -> ExecResult<Option<(ExitCode, Vec<u8>)>> {
    let mut input = FdStream::new(stdin.as_fd())?;
    let (mut output, buffer) = MemWriter::with_handle();
    match builtins.dispatch(&stage.argv, &mut input, &mut output) {
        Dispatch::Handled(code) => Ok(Some((code, buffer.take()))),
        Dispatch::NotHandled => {
            tracing::debug!(name = stage.name(), "builtin declined, running as a command");
            Ok(None)
        }
        Dispatch::Failed(e) => Err(ExecError::Builtin {
            name: stage.name().to_string(),
            message: format!("{:#}", e),
        }),
    }
}

/// Write a builtin's collected output to its sink, then close the sink.
///
/// A reader that exits early is not an error.
fn deliver(sink: Endpoint, output: &[u8]) -> ExecResult<()> {
    io::stdout().flush()?;
    let mut out = FdStream::new(sink.as_fd())?;
    match out.write_all(output) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        result => Ok(result?),
    }
}

/// Fork a child that runs `image` with the given standard streams.
fn spawn(
    name: &str,
    image: &ExecImage,
    stdin: BorrowedFd<'_>,
    stdout: BorrowedFd<'_>,
    close: &[RawFd],
) -> ExecResult<Pid> {
    let stdin = stdin.as_raw_fd();
    let stdout = stdout.as_raw_fd();
    // Flush buffered shell output so the child does not inherit a copy of it.
    let _ = io::stdout().flush();

    // SAFETY: the child only calls async-signal-safe functions before exec.
    match unsafe { unistd::fork() } {
        Ok(ForkResult::Child) => unsafe { exec_child(stdin, stdout, close, image) },
        Ok(ForkResult::Parent { child }) => Ok(child),
        Err(source) => Err(ExecError::Spawn {
            name: name.to_string(),
            source,
        }),
    }
}

/// Child side of a fork: wire up stdin/stdout, drop plumbing, exec.
///
/// # Safety
///
/// Must only be called in a freshly forked child. Everything it touches was
/// allocated before the fork; it does not allocate or lock.
unsafe fn exec_child(stdin: RawFd, stdout: RawFd, close: &[RawFd], image: &ExecImage) -> ! {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        if move_fd(stdin, libc::STDIN_FILENO) && move_fd(stdout, libc::STDOUT_FILENO) {
            for &fd in close {
                if fd > libc::STDERR_FILENO {
                    libc::close(fd);
                }
            }
            libc::execve(image.path.as_ptr(), image.argv.as_ptr(), image.envp.as_ptr());
        }
        libc::_exit(EXEC_FAILED)
    }
}

/// Make `target` refer to `fd` and survive exec.
unsafe fn move_fd(fd: RawFd, target: RawFd) -> bool {
    unsafe {
        if fd == target {
            libc::fcntl(target, libc::F_SETFD, 0) != -1
        } else {
            libc::dup2(fd, target) != -1
        }
    }
}

/// Everything `execve` needs, prepared before forking.
struct ExecImage {
    path: CString,
    _args: Vec<CString>,
    argv: Vec<*const c_char>,
    envp: [*const c_char; 1],
}

impl ExecImage {
    fn new(path: &Path, argv: &[&str]) -> ExecResult<Self> {
        let path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| ExecError::Nul(path.display().to_string()))?;
        let args = argv
            .iter()
            .map(|a| CString::new(*a).map_err(|_| ExecError::Nul(a.to_string())))
            .collect::<ExecResult<Vec<_>>>()?;
        let argv = args
            .iter()
            .map(|a| a.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        Ok(Self {
            path,
            _args: args,
            argv,
            // Children start with an empty environment.
            envp: [std::ptr::null()],
        })
    }
}

/// One end of a stage: the shell's own stream or a descriptor it owns.
enum Endpoint {
    Stdin(io::Stdin),
    Stdout(io::Stdout),
    Owned(OwnedFd),
}

impl Endpoint {
    fn input(source: &Source, pipes: &mut PipeSet) -> ExecResult<Self> {
        match source {
            Source::Inherit => Ok(Endpoint::Stdin(io::stdin())),
            Source::File(path) => {
                let file = File::open(path).map_err(|source| ExecError::Redirect {
                    path: path.clone(),
                    source,
                })?;
                Ok(Endpoint::Owned(file.into()))
            }
            Source::Pipe(i) => pipes.take_read(*i).map(Endpoint::Owned),
        }
    }

    fn output(sink: &Sink, pipes: &mut PipeSet) -> ExecResult<Self> {
        match sink {
            Sink::Inherit => Ok(Endpoint::Stdout(io::stdout())),
            Sink::File(path) => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .mode(0o644)
                    .open(path)
                    .map_err(|source| ExecError::Redirect {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Endpoint::Owned(file.into()))
            }
            Sink::Pipe(i) => pipes.take_write(*i).map(Endpoint::Owned),
        }
    }

    fn owned_raw_fd(&self) -> Option<RawFd> {
        match self {
            Endpoint::Owned(fd) => Some(fd.as_raw_fd()),
            _ => None,
        }
    }
}

impl AsFd for Endpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Endpoint::Stdin(s) => s.as_fd(),
            Endpoint::Stdout(s) => s.as_fd(),
            Endpoint::Owned(fd) => fd.as_fd(),
        }
    }
}

/// The `N - 1` pipes of a pipeline. Ends are taken out as stages consume them.
struct PipeSet {
    pipes: Vec<(Option<OwnedFd>, Option<OwnedFd>)>,
}

impl PipeSet {
    fn open(count: usize) -> ExecResult<Self> {
        let mut pipes = Vec::with_capacity(count);
        for _ in 0..count {
            let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
            pipes.push((Some(read), Some(write)));
        }
        Ok(Self { pipes })
    }

    fn take_read(&mut self, i: usize) -> ExecResult<OwnedFd> {
        self.pipes
            .get_mut(i)
            .and_then(|(read, _)| read.take())
            .ok_or(ExecError::Pipe(Errno::EBADF))
    }

    fn take_write(&mut self, i: usize) -> ExecResult<OwnedFd> {
        self.pipes
            .get_mut(i)
            .and_then(|(_, write)| write.take())
            .ok_or(ExecError::Pipe(Errno::EBADF))
    }

    /// Raw descriptors of every end still held by the parent.
    fn raw_fds(&self) -> Vec<RawFd> {
        self.pipes
            .iter()
            .flat_map(|(r, w)| [r, w])
            .filter_map(|end| end.as_ref().map(|fd| fd.as_raw_fd()))
            .collect()
    }
}

/// Wait for every spawned child, recording each stage's status.
///
/// All children are waited even if one wait fails; the first failure is
/// returned.
fn join(children: &[(usize, Pid)], statuses: &mut [Option<ExitCode>]) -> ExecResult<()> {
    let mut result = Ok(());
    for &(stage, pid) in children {
        match wait_for(pid) {
            Ok(code) => statuses[stage] = Some(code),
            Err(e) => {
                if result.is_ok() {
                    result = Err(ExecError::Wait(e));
                }
            }
        }
    }
    result
}

fn wait_for(pid: Pid) -> nix::Result<ExitCode> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Saves the shell's stdin and stdout and puts them back when dropped.
struct StdioGuard {
    stdin: Option<OwnedFd>,
    stdout: Option<OwnedFd>,
}

impl StdioGuard {
    fn save() -> Self {
        Self {
            stdin: io::stdin().as_fd().try_clone_to_owned().ok(),
            stdout: io::stdout().as_fd().try_clone_to_owned().ok(),
        }
    }
}

impl Drop for StdioGuard {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        if let Some(fd) = &self.stdin {
            let _ = unistd::dup2(fd.as_raw_fd(), libc::STDIN_FILENO);
        }
        if let Some(fd) = &self.stdout {
            let _ = unistd::dup2(fd.as_raw_fd(), libc::STDOUT_FILENO);
        }
    }
}
