use crate::command::{ExitCode, Flow};
use crate::env::Environment;
use crate::external::which;
use crate::history::History;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Commands implemented inside the shell process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Echo,
    Type,
    Pwd,
    Cd,
    History,
}

/// State a builtin may read or update besides its streams.
pub struct BuiltinContext<'a> {
    pub env: &'a Environment,
    pub history: &'a mut History,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Exit,
        Builtin::Echo,
        Builtin::Type,
        Builtin::Pwd,
        Builtin::Cd,
        Builtin::History,
    ];

    /// Canonical name of the command, e.g. "echo" or "cd".
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Exit => "exit",
            Builtin::Echo => "echo",
            Builtin::Type => "type",
            Builtin::Pwd => "pwd",
            Builtin::Cd => "cd",
            Builtin::History => "history",
        }
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(Builtin::name)
    }

    pub fn lookup(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    /// Runs the builtin with `arguments` (including the command name).
    ///
    /// Errors never escape: they are written to `stderr` and turn into a
    /// status of 1.
    pub fn run(
        self,
        arguments: &[String],
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut BuiltinContext<'_>,
    ) -> Flow {
        let flow = match self.execute(arguments, stdout, stderr, ctx) {
            Ok(flow) => flow,
            Err(e) => {
                let _ = writeln!(stderr, "{e:#}");
                Flow::Continue(1)
            }
        };
        let _ = stdout.flush();
        let _ = stderr.flush();
        flow
    }

    fn execute(
        self,
        arguments: &[String],
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut BuiltinContext<'_>,
    ) -> Result<Flow> {
        let name = self.name();
        let rest = arguments.get(1..).unwrap_or_default();

        let code = match self {
            // exit and echo take their operands verbatim; everything else goes through argh
            Builtin::Exit => return Ok(Flow::Exit(exit_status(rest)?)),
            Builtin::Echo => {
                writeln!(stdout, "{}", rest.join(" "))?;
                0
            }
            Builtin::Type => match parse_args(name, rest, stdout, stderr)? {
                Ok(args) => type_of(args, stdout, ctx)?,
                Err(code) => code,
            },
            Builtin::Pwd => match parse_args::<PwdArgs>(name, rest, stdout, stderr)? {
                Ok(_) => {
                    let cwd = env::current_dir().context("pwd")?;
                    writeln!(stdout, "{}", cwd.display())?;
                    0
                }
                Err(code) => code,
            },
            Builtin::Cd => match parse_args(name, rest, stdout, stderr)? {
                Ok(args) => change_dir(args, stdout, stderr, ctx)?,
                Err(code) => code,
            },
            Builtin::History => match parse_args(name, rest, stdout, stderr)? {
                Ok(args) => history(args, stdout, ctx)?,
                Err(code) => code,
            },
        };

        Ok(Flow::Continue(code))
    }
}

/// Parses builtin arguments; `Err(code)` means argh already printed help or
/// a usage error and the builtin should not run.
fn parse_args<T: FromArgs>(
    name: &str,
    args: &[String],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> io::Result<std::result::Result<T, ExitCode>> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[name], &args) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(EarlyExit { output, status }) => match status {
            Ok(()) => {
                write!(stdout, "{output}")?;
                Ok(Err(0))
            }
            Err(()) => {
                write!(stderr, "{output}")?;
                Ok(Err(2))
            }
        },
    }
}

/// Status requested by `exit`; 0 when omitted. Negative values are allowed.
fn exit_status(status: &[String]) -> Result<ExitCode> {
    match status {
        [] => Ok(0),
        [code] => code
            .parse()
            .with_context(|| format!("exit: {code}: numeric argument required")),
        _ => Err(anyhow!("exit: too many arguments")),
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
struct PwdArgs {}

#[derive(FromArgs)]
/// Tell how each name would be interpreted if used as a command.
struct TypeArgs {
    #[argh(positional, greedy)]
    /// command names to look up.
    names: Vec<String>,
}

fn type_of(args: TypeArgs, stdout: &mut dyn Write, ctx: &BuiltinContext<'_>) -> Result<ExitCode> {
    let mut code = 0;
    for name in args.names {
        if Builtin::lookup(&name).is_some() {
            writeln!(stdout, "{name} is a shell builtin")?;
        } else if let Some(path) = which(ctx.env, &name) {
            writeln!(stdout, "{name} is {}", path.display())?;
        } else {
            writeln!(stdout, "{name}: not found")?;
            code = 1;
        }
    }
    Ok(code)
}

#[derive(FromArgs)]
/// Change the current working directory.
struct CdArgs {
    #[argh(positional)]
    /// absolute path, `.`-relative path or `~`-prefixed path. Defaults to `~`.
    target: Option<String>,
}

/// Where `cd` should go, or why it cannot.
#[derive(Debug, PartialEq, Eq)]
enum CdTarget {
    Dir(PathBuf),
    HomeNotSet,
    Unsupported,
}

fn resolve_cd_target(target: &str, cwd: &Path, env: &Environment) -> CdTarget {
    let resolved = if target.starts_with('/') {
        PathBuf::from(target)
    } else if target.starts_with('.') {
        cwd.join(target)
    } else if let Some(rest) = target.strip_prefix('~') {
        let Some(home) = env.home() else {
            return CdTarget::HomeNotSet;
        };
        home.join(rest.trim_start_matches('/'))
    } else {
        return CdTarget::Unsupported;
    };

    CdTarget::Dir(normalize(&resolved))
}

/// Collapses `.` and `..` segments without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn change_dir(
    args: CdArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    ctx: &BuiltinContext<'_>,
) -> Result<ExitCode> {
    let target = args.target.unwrap_or_else(|| "~".to_string());
    let cwd = env::current_dir().context("cd")?;

    let dir = match resolve_cd_target(&target, &cwd, ctx.env) {
        CdTarget::Dir(dir) => dir,
        CdTarget::HomeNotSet => {
            writeln!(stdout, "cd: {target}: $HOME not set")?;
            return Ok(1);
        }
        CdTarget::Unsupported => {
            writeln!(stdout, "cd: {target}: unsupported path")?;
            return Ok(1);
        }
    };

    match env::set_current_dir(&dir) {
        Ok(()) => Ok(0),
        Err(e) => {
            let reason = match e.kind() {
                io::ErrorKind::NotFound => "No such file or directory".to_string(),
                io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
                _ => e.to_string(),
            };
            writeln!(stderr, "cd: {target}: {reason}")?;
            Ok(1)
        }
    }
}

#[derive(FromArgs)]
/// Display or persist the command history.
struct HistoryArgs {
    #[argh(option, short = 'r')]
    /// append the lines of this file to the history.
    read: Option<PathBuf>,

    #[argh(option, short = 'w')]
    /// write the whole history to this file.
    write: Option<PathBuf>,

    #[argh(option, short = 'a')]
    /// append the lines not yet written to this file.
    append: Option<PathBuf>,

    #[argh(positional)]
    /// show only the last N entries.
    count: Option<usize>,
}

fn history(args: HistoryArgs, stdout: &mut dyn Write, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
    if let Some(path) = args.read {
        ctx.history
            .load(&path)
            .with_context(|| format!("history: {}", path.display()))?;
        return Ok(0);
    }
    if let Some(path) = args.write {
        ctx.history
            .save(&path)
            .with_context(|| format!("history: {}", path.display()))?;
        return Ok(0);
    }
    if let Some(path) = args.append {
        ctx.history
            .append_to(&path)
            .with_context(|| format!("history: {}", path.display()))?;
        return Ok(0);
    }

    if args.count == Some(0) {
        return Err(anyhow!("history: count must be positive"));
    }
    for (index, line) in ctx.history.iterate(args.count.unwrap_or(0)) {
        writeln!(stdout, "{index:>5}  {line}")?;
    }
    Ok(0)
}
