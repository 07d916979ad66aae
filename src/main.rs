//! Greenscreen CLI - AS400 session automation from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use greenscreen::host::default_host;
use greenscreen::prelude::*;
use greenscreen::runner::{RunStepsOptions, run_steps};
use greenscreen::steps::StepsFile;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "greenscreen")]
#[command(author, version, about = "Playwright-like automation for AS400 5250 sessions")]
struct Cli {
    /// Session letter (A-Z)
    #[arg(short, long, default_value = "A", global = true)]
    session: String,

    /// Seconds the input-ready guard waits before each read or write
    #[arg(long, default_value = "2", value_parser = parse_seconds, global = true)]
    guard_timeout: Duration,

    /// Launch the session file if no window is open
    #[arg(long, global = true)]
    auto_launch: bool,

    /// Directory holding "Session <LETTER>.ws" files (implies --auto-launch)
    #[arg(long, global = true)]
    session_dir: Option<PathBuf>,

    /// Seconds to wait after launching a session file
    #[arg(long, value_parser = parse_seconds, global = true)]
    launch_grace: Option<Duration>,

    /// Log more (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List open session windows
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Read text at a position
    Read {
        #[arg(long)]
        row: u16,
        #[arg(long)]
        col: u16,
        /// Number of characters
        #[arg(long, default_value = "1")]
        len: u32,
    },

    /// Read a rectangle of text
    Rect {
        #[arg(long)]
        row: u16,
        #[arg(long)]
        col: u16,
        #[arg(long)]
        end_row: u16,
        #[arg(long)]
        end_col: u16,
    },

    /// Write text at a position
    Write {
        #[arg(long)]
        row: u16,
        #[arg(long)]
        col: u16,
        /// The text to write
        text: String,
    },

    /// Send a SendKeys mnemonic string, e.g. "[pf3]"
    Keys {
        keys: String,
    },

    /// Press a named key, e.g. Enter, F3, PageDown
    Press {
        key: String,
        /// Press this many times
        #[arg(long, default_value = "1")]
        times: u32,
    },

    /// Print the cursor position
    Cursor,

    /// Print the whole screen
    Screen {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Wait for text at a position
    WaitString {
        #[arg(long)]
        row: u16,
        #[arg(long)]
        col: u16,
        /// Timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
        text: String,
    },

    /// Wait for the cursor to reach a position
    WaitCursor {
        #[arg(long)]
        row: u16,
        #[arg(long)]
        col: u16,
        /// Timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Run a YAML or JSON step file
    Run {
        /// Path to the step file
        steps: PathBuf,
        /// Write trace.json into the artifacts directory
        #[arg(long)]
        trace: bool,
    },
}

#[derive(Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonCompact,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-compact" | "jsoncompact" => Ok(OutputFormat::JsonCompact),
            _ => Err(format!("Unknown format: {}. Use text, json, or json-compact", s)),
        }
    }
}

fn parse_seconds(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of seconds: {s}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {s}: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut host = default_host()?;

    if let Commands::List { json } = cli.command {
        return list_sessions(&mut host, json);
    }

    if let Commands::Run { steps, trace } = &cli.command {
        return run_steps_file(host, &cli, steps, *trace);
    }

    let session = builder_from_cli(&cli).connect(host, &cli.session)?;
    execute(&session, cli.command)
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn builder_from_cli(cli: &Cli) -> SessionBuilder {
    let mut builder = SessionBuilder::new().guard_timeout(cli.guard_timeout);
    if cli.auto_launch {
        builder = builder.auto_launch();
    }
    if let Some(dir) = &cli.session_dir {
        builder = builder.session_dir(dir);
    }
    if let Some(grace) = cli.launch_grace {
        builder = builder.launch_grace(grace);
    }
    builder
}

fn list_sessions<H: Host>(host: &mut H, json: bool) -> Result<()> {
    let connections = Session::list(host)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&connections)?);
        return Ok(());
    }
    if connections.is_empty() {
        println!("No open sessions");
        return Ok(());
    }
    println!("NAME  STARTED  COMM  API  READY");
    for conn in connections {
        println!(
            "{:<4}  {:<7}  {:<4}  {:<3}  {}",
            conn.name,
            yes_no(conn.started),
            yes_no(conn.comm_started),
            yes_no(conn.api_enabled),
            yes_no(conn.ready)
        );
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn run_steps_file<H: Host>(host: H, cli: &Cli, path: &Path, trace: bool) -> Result<()> {
    let steps_file = StepsFile::load(path)?;

    let session = match &steps_file.session {
        Some(spec) => spec.builder().connect(host, &spec.name)?,
        None => builder_from_cli(cli).connect(host, &cli.session)?,
    };

    let report = run_steps(&session, &steps_file, &RunStepsOptions { trace })?;
    eprintln!("{} steps passed", report.steps_run);
    if let Some(dir) = report.artifacts_dir {
        eprintln!("Artifacts: {}", dir.display());
    }
    Ok(())
}

fn execute<H: Host>(session: &Session<H>, command: Commands) -> Result<()> {
    match command {
        Commands::List { .. } | Commands::Run { .. } => {}
        Commands::Read { row, col, len } => {
            println!("{}", session.get_text((row, col), len)?);
        }
        Commands::Rect {
            row,
            col,
            end_row,
            end_col,
        } => {
            println!("{}", session.get_text_rect((row, col), (end_row, end_col))?);
        }
        Commands::Write { row, col, text } => {
            session.set_text(&text, (row, col))?;
        }
        Commands::Keys { keys } => {
            session.send_keys(&keys)?;
        }
        Commands::Press { key, times } => {
            let key: Key = key.parse()?;
            for _ in 0..times {
                session.send_key(key.clone())?;
            }
        }
        Commands::Cursor => {
            let pos = session.cursor()?;
            println!("{} {}", pos.row, pos.col);
        }
        Commands::Screen { format } => {
            let screen = session.snapshot()?;
            match format {
                OutputFormat::Text => println!("{}", screen.text()),
                OutputFormat::Json => println!("{}", screen.to_json()?),
                OutputFormat::JsonCompact => println!("{}", screen.to_json_compact()?),
            }
        }
        Commands::WaitString {
            row,
            col,
            timeout,
            text,
        } => {
            let timeout = Duration::from_secs(timeout);
            if !session.wait_for_string(&text, (row, col), timeout)? {
                return Err(GreenscreenError::Timeout {
                    condition: format!("text '{text}' at row={row}, col={col}"),
                    timeout,
                });
            }
        }
        Commands::WaitCursor { row, col, timeout } => {
            let timeout = Duration::from_secs(timeout);
            if !session.wait_for_cursor((row, col), timeout)? {
                return Err(GreenscreenError::Timeout {
                    condition: format!("cursor at row={row}, col={col}"),
                    timeout,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenscreen::session::DEFAULT_LAUNCH_GRACE;

    #[test]
    fn test_cli_parses_launch_flags() {
        let cli = Cli::try_parse_from([
            "greenscreen",
            "--session",
            "b",
            "--session-dir",
            "/opt/sessions",
            "read",
            "--row",
            "1",
            "--col",
            "2",
        ])
        .unwrap();
        let builder = builder_from_cli(&cli);
        let launch = builder.config().launch.clone().unwrap();
        assert_eq!(launch.session_dir, PathBuf::from("/opt/sessions"));
        assert_eq!(launch.grace, DEFAULT_LAUNCH_GRACE);
        assert_eq!(cli.session, "b");
    }

    #[test]
    fn test_cli_parses_fractional_seconds() {
        let cli = Cli::try_parse_from(["greenscreen", "--guard-timeout", "0.25", "cursor"]).unwrap();
        assert_eq!(cli.guard_timeout, Duration::from_millis(250));
        assert_eq!(cli.launch_grace, None);
    }

    #[test]
    fn test_cli_rejects_unrepresentable_seconds() {
        let cases: [&[&str]; 5] = [
            &["greenscreen", "--guard-timeout", "inf", "cursor"],
            &["greenscreen", "--guard-timeout=-1", "cursor"],
            &["greenscreen", "--launch-grace", "1e30", "cursor"],
            &["greenscreen", "--launch-grace", "NaN", "cursor"],
            &["greenscreen", "--launch-grace", "soon", "cursor"],
        ];
        for args in cases {
            let err = Cli::try_parse_from(args).err().unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{args:?}");
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("png".parse::<OutputFormat>().is_err());
    }
}
