use crate::builtin::{Builtin, BuiltinContext};
use crate::command::{Command, ExitCode, Flow};
use crate::env::Environment;
use crate::error::{Result, ShellError};
use crate::external::which;
use crate::history::History;
use crate::parser;
use crate::redirect::RedirectStreams;
use crate::terminal;
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, dup2, execv, fork};
use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::debug;

/// Status of a command that could not be found or started.
const NOT_FOUND: ExitCode = 127;

/// Runs parsed command lines: builtins in-process, everything else in
/// forked children, with redirects and pipes wired onto descriptors 0/1/2.
///
/// Execution is synchronous: `execute` returns only after every process it
/// started has terminated.
///
/// Example
/// ```no_run
/// use minish::{Environment, History, Interpreter};
/// let sh = Interpreter::new(Environment::new());
/// let mut history = History::new();
/// sh.run_line("echo hello | tr a-z A-Z", &mut history).unwrap();
/// ```
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Parses and executes one input line.
    pub fn run_line(&self, line: &str, history: &mut History) -> Result<Flow> {
        self.execute(&parser::parse(line), history)
    }

    /// Executes a parsed line: a single command, or a pipeline when there
    /// are several stages.
    pub fn execute(&self, commands: &[Command], history: &mut History) -> Result<Flow> {
        match commands {
            [] => Ok(Flow::Continue(0)),
            [command] => self.run_single(command, history),
            _ => self.run_pipeline(commands, history).map(Flow::Continue),
        }
    }

    fn run_single(&self, command: &Command, history: &mut History) -> Result<Flow> {
        let streams = RedirectStreams::open(&command.redirects)?;
        let program = command.program();

        if let Some(builtin) = Builtin::lookup(program) {
            let mut ctx = BuiltinContext {
                env: &self.env,
                history,
            };
            return Ok(builtin.run(
                &command.arguments,
                &mut streams.output(),
                &mut streams.error(),
                &mut ctx,
            ));
        }

        let Some(path) = which(&self.env, program) else {
            println!("{program}: command not found");
            return Ok(Flow::Continue(NOT_FOUND));
        };
        let (path, argv) = c_command(program, &path, &command.arguments)?;

        flush_std_streams();
        // SAFETY: the child only duplicates descriptors and replaces its image.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                terminal::default_signals();
                if streams.install().is_err() {
                    exit_child(1);
                }
                drop(streams);
                exec(program, &path, &argv)
            }
            Ok(ForkResult::Parent { child }) => {
                drop(streams);
                debug!(%child, program, "spawned command");
                wait_for(child).map(Flow::Continue)
            }
            Err(source) => Err(ShellError::Spawn {
                program: program.to_string(),
                source,
            }),
        }
    }

    /// Spawns one child per stage, chained with pipes, then waits for all of
    /// them. Returns the status of the last stage.
    fn run_pipeline(&self, commands: &[Command], history: &mut History) -> Result<ExitCode> {
        let mut children = Vec::with_capacity(commands.len());
        let mut failure = None;
        let mut upstream: Option<OwnedFd> = None;

        for (index, command) in commands.iter().enumerate() {
            let is_last = index + 1 == commands.len();
            let (downstream, write_end) = if is_last {
                (None, None)
            } else {
                match cloexec_pipe() {
                    Ok((read, write)) => (Some(read), Some(write)),
                    Err(errno) => {
                        failure = Some(ShellError::Pipe(errno));
                        break;
                    }
                }
            };

            flush_std_streams();
            // SAFETY: the child runs a builtin or replaces its image and never
            // returns into the caller.
            match unsafe { fork() } {
                Ok(ForkResult::Child) => {
                    drop(downstream);
                    self.run_stage(command, upstream, write_end, history)
                }
                Ok(ForkResult::Parent { child }) => {
                    debug!(%child, program = command.program(), stage = index, "spawned pipeline stage");
                    children.push(child);
                }
                Err(source) => {
                    failure = Some(ShellError::Spawn {
                        program: command.program().to_string(),
                        source,
                    });
                    break;
                }
            }

            // Keep no writable end in the shell, or the next stage never sees EOF.
            drop(write_end);
            upstream = downstream;
        }
        drop(upstream);

        let mut status = 0;
        for child in children {
            match wait_for(child) {
                Ok(code) => status = code,
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(status),
        }
    }

    /// Body of a forked pipeline stage.
    fn run_stage(
        &self,
        command: &Command,
        stdin: Option<OwnedFd>,
        stdout: Option<OwnedFd>,
        history: &mut History,
    ) -> ! {
        terminal::default_signals();

        if let Some(fd) = stdin {
            if dup2(fd.as_raw_fd(), 0).is_err() {
                exit_child(1);
            }
        }
        if let Some(fd) = stdout {
            if dup2(fd.as_raw_fd(), 1).is_err() {
                exit_child(1);
            }
        }

        // Redirects are applied after the pipe ends, so they take precedence.
        let streams = match RedirectStreams::open(&command.redirects) {
            Ok(streams) => streams,
            Err(err) => {
                let _ = writeln!(io::stderr(), "minish: {err}");
                exit_child(1);
            }
        };
        if streams.install().is_err() {
            exit_child(1);
        }
        drop(streams);

        let program = command.program();
        if let Some(builtin) = Builtin::lookup(program) {
            let mut ctx = BuiltinContext {
                env: &self.env,
                history,
            };
            let flow = builtin.run(
                &command.arguments,
                &mut io::stdout(),
                &mut io::stderr(),
                &mut ctx,
            );
            exit_child(flow.code());
        }

        let Some(path) = which(&self.env, program) else {
            let _ = writeln!(io::stderr(), "{program}: command not found");
            exit_child(NOT_FOUND);
        };
        match c_command(program, &path, &command.arguments) {
            Ok((path, argv)) => exec(program, &path, &argv),
            Err(err) => {
                let _ = writeln!(io::stderr(), "minish: {err}");
                exit_child(NOT_FOUND);
            }
        }
    }
}

/// Converts the resolved path and argument vector for `execv`.
fn c_command(program: &str, path: &Path, arguments: &[String]) -> Result<(CString, Vec<CString>)> {
    let nul = |_| ShellError::NulByte {
        program: program.to_string(),
    };

    let path = CString::new(path.as_os_str().as_bytes()).map_err(nul)?;
    let argv = arguments
        .iter()
        .map(|argument| CString::new(argument.as_bytes()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(nul)?;
    Ok((path, argv))
}

/// Replaces the child's image. Only returns by terminating the child.
fn exec(program: &str, path: &CStr, argv: &[CString]) -> ! {
    let Err(errno) = execv(path, argv);
    let _ = writeln!(io::stderr(), "{program}: {errno}");
    exit_child(NOT_FOUND)
}

/// Terminates a forked child without running the parent's exit handlers.
fn exit_child(code: ExitCode) -> ! {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    // SAFETY: _exit is async-signal-safe and never returns.
    unsafe { nix::libc::_exit(code) }
}

/// Anything still buffered would otherwise be written twice, once per process.
fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

/// A pipe whose descriptors are not inherited across `execv`; only the copies
/// duplicated onto 0/1 survive in the new image.
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    {
        nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    {
        use nix::fcntl::{FcntlArg, FdFlag, fcntl};
        let (read, write) = nix::unistd::pipe()?;
        for fd in [&read, &write] {
            fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        }
        Ok((read, write))
    }
}

fn wait_for(child: Pid) -> Result<ExitCode> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                debug!(%child, code, "child exited");
                return Ok(code);
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                debug!(%child, %signal, "child killed by signal");
                return Ok(128 + signal as i32);
            }
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(errno) => return Err(ShellError::Wait(errno)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Redirect, StreamTarget};
    use std::fs;

    fn interpreter() -> Interpreter {
        Interpreter::new(Environment::new())
    }

    fn run(line: &str) -> Flow {
        interpreter().run_line(line, &mut History::new()).unwrap()
    }

    #[test]
    fn test_empty_line_does_nothing() {
        assert_eq!(run(""), Flow::Continue(0));
    }

    #[test]
    fn test_builtin_output_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        let flow = run(&format!("echo hello   world > '{}'", out.display()));

        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello world\n");
    }

    #[test]
    fn test_builtin_append_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let sh = interpreter();
        let mut history = History::new();

        sh.run_line(&format!("echo one >> '{}'", out.display()), &mut history)
            .unwrap();
        sh.run_line(&format!("echo two 1>> '{}'", out.display()), &mut history)
            .unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_exit_builtin_requests_termination() {
        assert_eq!(run("exit 5"), Flow::Exit(5));
    }

    #[test]
    fn test_external_command_output_redirect() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::write(dir.path().join("b"), "").unwrap();
        let out = dir.path().join("listing");

        let flow = run(&format!(
            "ls '{}' > '{}'",
            dir.path().join("a").display(),
            out.display()
        ));

        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            format!("{}\n", dir.path().join("a").display())
        );
    }

    #[test]
    fn test_external_error_redirect_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let err = dir.path().join("err.txt");

        let flow = run(&format!(
            "ls '{}' 2> '{}'",
            dir.path().join("does-not-exist").display(),
            err.display()
        ));

        assert_ne!(flow.code(), 0);
        assert!(!fs::read_to_string(&err).unwrap().is_empty());
    }

    #[test]
    fn test_external_status_is_reported() {
        assert_eq!(run("false"), Flow::Continue(1));
        assert_eq!(run("true"), Flow::Continue(0));
    }

    #[test]
    fn test_command_not_found() {
        assert_eq!(
            run("definitely_not_a_command_42 arg"),
            Flow::Continue(NOT_FOUND)
        );
    }

    #[test]
    fn test_redirect_open_failure_aborts_command() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("missing-dir").join("out.txt");
        let sh = interpreter();

        let commands = vec![Command::new(
            vec!["echo".to_string(), "hi".to_string()],
            vec![Redirect::new(StreamTarget::Output, &bad, false)],
        )];
        let err = sh.execute(&commands, &mut History::new()).unwrap_err();

        assert!(matches!(err, ShellError::RedirectOpen { .. }));
        assert!(!bad.exists());
    }

    #[test]
    fn test_two_stage_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        let flow = run(&format!(
            "echo hello world | tr a-z A-Z > '{}'",
            out.display()
        ));

        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "HELLO WORLD\n");
    }

    #[test]
    fn test_three_stage_pipeline_matches_two_step_run() {
        let dir = tempfile::tempdir().unwrap();
        let piped = dir.path().join("piped.txt");
        let middle = dir.path().join("middle.txt");
        let stepped = dir.path().join("stepped.txt");
        let sh = interpreter();
        let mut history = History::new();

        sh.run_line(
            &format!("echo c b a | tr ' ' '\\n' | sort > '{}'", piped.display()),
            &mut history,
        )
        .unwrap();
        sh.run_line(
            &format!("echo c b a | tr ' ' '\\n' > '{}'", middle.display()),
            &mut history,
        )
        .unwrap();
        sh.run_line(
            &format!("sort '{}' > '{}'", middle.display(), stepped.display()),
            &mut history,
        )
        .unwrap();

        let piped = fs::read(&piped).unwrap();
        assert_eq!(piped, b"a\nb\nc\n");
        assert_eq!(piped, fs::read(&stepped).unwrap());
    }

    #[test]
    fn test_builtin_as_pipeline_stage() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        let flow = run(&format!("type echo | cat > '{}'", out.display()));

        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "echo is a shell builtin\n");
    }

    #[test]
    fn test_exit_inside_pipeline_does_not_exit_shell() {
        assert_eq!(run("exit 3 | cat"), Flow::Continue(0));
        assert_eq!(run("cat /dev/null | exit 4"), Flow::Continue(4));
    }

    #[test]
    fn test_missing_stage_yields_empty_input_downstream() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        let flow = run(&format!(
            "definitely_not_a_command_42 | cat > '{}'",
            out.display()
        ));

        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "");
    }

    #[test]
    fn test_redirect_overrides_pipe_in_middle_stage() {
        let dir = tempfile::tempdir().unwrap();
        let middle = dir.path().join("middle.txt");
        let out = dir.path().join("out.txt");

        run(&format!(
            "echo hi > '{}' | cat > '{}'",
            middle.display(),
            out.display()
        ));

        assert_eq!(fs::read_to_string(&middle).unwrap(), "hi\n");
        assert_eq!(fs::read_to_string(&out).unwrap(), "");
    }

    #[test]
    fn test_stage_redirect_failure_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("missing-dir").join("x");
        let out = dir.path().join("out.txt");

        let flow = run(&format!(
            "echo hi > '{}' | cat > '{}'",
            bad.display(),
            out.display()
        ));

        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "");
    }

    #[test]
    fn test_wide_pipeline_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        let stages = vec!["cat"; 8].join(" | ");
        let flow = run(&format!("echo deep | {stages} > '{}'", out.display()));

        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "deep\n");
    }

    #[test]
    fn test_writer_stops_quietly_when_reader_exits() {
        let dir = tempfile::tempdir().unwrap();
        let err = dir.path().join("err.txt");
        let out = dir.path().join("out.txt");

        let flow = run(&format!(
            "yes 2> '{}' | head -n 1 > '{}'",
            err.display(),
            out.display()
        ));

        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "y\n");
        // killed by SIGPIPE, not told about EPIPE
        assert_eq!(fs::read_to_string(&err).unwrap(), "");
    }

    #[test]
    fn test_non_executable_match_fails_in_child() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("not_runnable"), "plain text").unwrap();
        let env = Environment::from_vars([("PATH", dir.path().display().to_string())]);

        let flow = Interpreter::new(env)
            .run_line("not_runnable", &mut History::new())
            .unwrap();

        assert_eq!(flow, Flow::Continue(NOT_FOUND));
    }
}
