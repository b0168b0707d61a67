use anyhow::Result;
use argh::FromArgs;
use minish::{Environment, Shell, ShellOptions, ignore_interrupts};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// An interactive shell with pipelines, redirects and tab completion.
struct Args {
    #[argh(option)]
    /// file to load history from and save it to; defaults to $HISTFILE.
    history_file: Option<PathBuf>,

    #[argh(option, default = "String::from(\"$ \")")]
    /// prompt shown before each line.
    prompt: String,

    #[argh(switch, short = 'v')]
    /// log debug output to stderr.
    verbose: bool,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    // RUST_LOG wins over --verbose
    let level = if args.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();

    let env = Environment::new();
    let interactive = io::stdin().is_terminal();
    info!(version = env!("CARGO_PKG_VERSION"), interactive, "starting minish");

    if interactive {
        ignore_interrupts();
    }

    let options = ShellOptions {
        prompt: args.prompt,
        history_file: args.history_file,
        interactive,
    };
    let code = Shell::stdio(env, options)?.run()?;

    debug!(code, "exiting");
    process::exit(code);
}
