//! replterm - a terminal front-end for line-oriented REPL backends
//!
//! replterm launches one backend program with piped standard streams,
//! shows everything it prints (stdout and stderr merged) in a scrolling
//! transcript, and sends each line you type to its stdin.
//!
//! # Quick Start
//!
//! ```text
//! replterm                       # Start the configured backend (default: nlbt)
//! replterm -c python3 -- -i -q   # Any line-oriented program
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Send the line |
//! | Esc / Ctrl+C | Quit |
//! | Ctrl+D | Quit (empty line) |
//! | Ctrl+U | Clear the line |

mod config;
mod core;
mod shell;
mod ui;

use std::env;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::core::process::PipeSpawner;
use crate::shell::SessionShell;
use crate::ui::{InputAction, InputLine, Renderer};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest wait for terminal input before the loop checks the backend again
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

fn print_version() {
    eprintln!("replterm {}", VERSION);
}

fn print_help() {
    eprintln!("replterm {} - A terminal front-end for REPL backends", VERSION);
    eprintln!();
    eprintln!("Usage: replterm [OPTIONS] [-- ARGS...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <CMD>   Backend program (default: from config.toml or nlbt)");
    eprintln!("  -t, --title <TEXT>    Title shown above the transcript");
    eprintln!("  -l, --limit <N>       Transcript lines kept on screen (default: 100)");
    eprintln!("  -d, --delay <MS>      Busy indicator duration in ms (default: 100)");
    eprintln!("  -e, --echo            Echo submitted lines into the transcript");
    eprintln!("  -x, --exit            Quit when the backend exits");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Arguments after -- are passed to the backend.");
    eprintln!();
    eprintln!("Configuration: ~/.replterm/config.toml");
    eprintln!("Log file:      ~/.replterm/replterm.log (RUST_LOG to adjust)");
}

/// Apply command line arguments on top of the loaded config
fn parse_args(args: &[String], mut config: Config) -> Result<Config, String> {
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--command" => {
                config.command = value_of(args, &mut i)?.to_string();
                // Args from the config file belong to the old command
                config.args.clear();
            }
            "-t" | "--title" => {
                config.title = value_of(args, &mut i)?.to_string();
            }
            "-l" | "--limit" => {
                let value = value_of(args, &mut i)?;
                config.transcript_limit = value
                    .parse()
                    .map_err(|_| format!("Invalid line limit: {}", value))?;
            }
            "-d" | "--delay" => {
                let value = value_of(args, &mut i)?;
                config.busy_delay_ms = value
                    .parse()
                    .map_err(|_| format!("Invalid delay: {}", value))?;
            }
            "-e" | "--echo" => {
                config.echo_input = true;
            }
            "-x" | "--exit" => {
                config.exit_on_terminate = true;
            }
            "--" => {
                config.args = args[i + 1..].to_vec();
                break;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Consume the value following a flag
fn value_of<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, String> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value for {}", flag))
}

/// Send tracing output to ~/.replterm/replterm.log
fn init_logging() {
    let log_path = config::config_dir()
        .map(|dir| dir.join("replterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("replterm.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = match parse_args(&args, Config::load()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    info!("replterm {} starting", VERSION);
    info!("Backend: {} {:?}", config.command, config.args);

    let mut spawner = PipeSpawner::new(config.command.clone(), config.args.clone());
    let mut shell = SessionShell::new(&mut spawner, config.shell_options());

    let mut renderer = Renderer::new(config.title.clone(), config.theme.clone());
    renderer.init()?;

    let result = run_main_loop(&mut shell, &mut renderer, config.exit_on_terminate);

    shell.shutdown();
    let _ = renderer.cleanup();

    if let Some(e) = shell.spawn_error() {
        eprintln!("replterm: {}", e);
    }
    info!("replterm exiting");
    result
}

/// Cooperative event loop: backend events, busy timers and key presses
/// are all handled here on one thread.
fn run_main_loop(
    shell: &mut SessionShell,
    renderer: &mut Renderer,
    exit_on_terminate: bool,
) -> anyhow::Result<()> {
    let mut input = InputLine::new();
    let mut dirty = true;

    loop {
        dirty |= shell.tick();

        if exit_on_terminate && shell.is_terminated() {
            info!("Backend gone, leaving");
            break;
        }

        // The spinner animates while busy
        if dirty || shell.is_busy() {
            renderer.render(shell, &input)?;
            dirty = false;
        }

        let timeout = match shell.next_deadline() {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(POLL_TIMEOUT),
            None => POLL_TIMEOUT,
        };

        if !event::poll(timeout)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match input.handle_key(&key) {
                    InputAction::Quit => break,
                    InputAction::Submit(text) => {
                        shell.submit(&text);
                        dirty = true;
                    }
                    InputAction::Edited => dirty = true,
                    InputAction::None => {}
                }
            }
            Event::Resize(_, _) => dirty = true,
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_overrides() {
        let config = parse_args(
            &args(&["-c", "python3", "--limit", "20", "-d", "250", "-e", "--", "-i", "-q"]),
            Config::default(),
        )
        .unwrap();

        assert_eq!(config.command, "python3");
        assert_eq!(config.args, ["-i", "-q"]);
        assert_eq!(config.transcript_limit, 20);
        assert_eq!(config.busy_delay_ms, 250);
        assert!(config.echo_input);
        assert!(!config.exit_on_terminate);
    }

    #[test]
    fn test_parse_args_command_resets_config_args() {
        let mut base = Config::default();
        base.args = vec!["--old".to_string()];
        let config = parse_args(&args(&["--command", "bc"]), base).unwrap();
        assert_eq!(config.command, "bc");
        assert!(config.args.is_empty());
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&["--bogus"]), Config::default()).is_err());
        assert!(parse_args(&args(&["-c"]), Config::default()).is_err());
        assert!(parse_args(&args(&["-l", "many"]), Config::default()).is_err());
    }
}
