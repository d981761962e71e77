//! PowerShell Session - run commands through a long-lived interpreter.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use powershell_session::config::ConfigLoader;
use powershell_session::display;
use powershell_session::shell::{conduits, ConduitReceivers, Session, SessionError};
use powershell_session::LocalBackend;

#[derive(Parser)]
#[command(
    name = "powershell-session",
    about = "Run commands through a long-lived PowerShell process",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Interpreter binary (overrides config).
    #[arg(long, global = true)]
    program: Option<String>,

    /// Per-command timeout in milliseconds (overrides config).
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run each command in order in one session.
    Run {
        /// Commands to execute.
        #[arg(required = true)]
        commands: Vec<String>,
        /// Do not echo commands or session banners.
        #[arg(short, long)]
        quiet: bool,
        /// Print each command's output only after it finishes, stdout first.
        #[arg(long)]
        collect: bool,
    },
    /// Read commands from standard input, one per line.
    Repl,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Execute `cmd`, printing lines as they arrive.
async fn run_command(session: &mut Session, cmd: &str) -> Result<(), SessionError> {
    let (tx, rx) = conduits(session.config().channel_buffer());
    let ConduitReceivers {
        stdout: mut stdout_rx,
        stderr: mut stderr_rx,
    } = rx;

    let printer = async {
        let stdout = async {
            while let Some(line) = stdout_rx.recv().await {
                display::print_stdout_line(&line);
            }
        };
        let stderr = async {
            while let Some(line) = stderr_rx.recv().await {
                display::print_stderr_line(&line);
            }
        };
        tokio::join!(stdout, stderr);
    };

    let (result, ()) = tokio::join!(session.execute_into(cmd, tx), printer);
    result
}

async fn run_repl(session: &mut Session) -> bool {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ok = true;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                display::print_error(&format!("Failed to read input: {e}"));
                return false;
            }
        };
        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }
        if cmd.eq_ignore_ascii_case("exit") {
            break;
        }

        if let Err(e) = run_command(session, cmd).await {
            tracing::debug!(error = %e, "Command failed");
            ok = false;
            if session.is_closed() {
                display::print_error(&e.to_string());
                break;
            }
        }
    }
    ok
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    if let Some(program) = cli.program {
        config.program = program;
    }
    if let Some(timeout) = cli.timeout_ms {
        config.command_timeout_ms = Some(timeout);
    }

    let quiet = matches!(cli.command, Commands::Run { quiet: true, .. });
    let mut session = match Session::with_config(&LocalBackend::new(), config).await {
        Ok(session) => session,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    if !quiet {
        display::print_session_start(&session.config().program, session.pid());
    }

    let ok = match cli.command {
        Commands::Run {
            commands, collect, ..
        } => {
            let mut ok = true;
            for cmd in &commands {
                if !quiet {
                    display::print_command(cmd);
                }
                let result = if collect {
                    session
                        .execute(cmd)
                        .await
                        .map(|output| display::print_output(&output))
                } else {
                    run_command(&mut session, cmd).await
                };
                if let Err(e) = result {
                    tracing::debug!(error = %e, "Command failed");
                    ok = false;
                    if session.is_closed() {
                        display::print_error(&e.to_string());
                        break;
                    }
                }
            }
            ok
        }
        Commands::Repl => run_repl(&mut session).await,
    };

    if !session.is_closed() {
        match session.exit().await {
            Ok(code) if !quiet => display::print_session_end(code),
            Ok(_) => {}
            Err(e) => display::print_error(&e.to_string()),
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
