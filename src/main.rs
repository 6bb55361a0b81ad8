//! Claude Code CLI - Entry Point

use claude_code_cli::command::{self, CommandContext, DemoRequest, DEFAULT_DEMO_MAX_TURNS};
use claude_code_cli::config::{self, CliOverrides};
use claude_code_cli::model::{AppError, CommandError, PermissionMode, QueryOptions, PERMISSION_MODES};
use claude_code_cli::sdk::{ClaudeCliLauncher, ReplayLauncher, SessionLauncher};
use claude_code_cli::telemetry::{TelemetryEmitter, TelemetryMode};
use claude_code_cli::tools::demo::DEFAULT_DEMO_PROMPT;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Drive Claude Code from the command line with Braintrust telemetry
#[derive(Parser, Debug)]
#[command(name = "claude-code-cli")]
#[command(version)]
#[command(about = "Run Claude Code queries and tool demos, logging every event to Braintrust")]
pub struct Args {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Replay a recorded stream-json transcript instead of starting Claude Code
    #[arg(long, global = true, value_name = "PATH")]
    pub replay: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Send a single prompt to Claude Code
    Query(QueryArgs),
    /// Demonstrate in-process tools against a sample customer
    DemoTools(DemoArgs),
}

/// Flags of `query`.
#[derive(clap::Args, Debug, PartialEq)]
pub struct QueryArgs {
    /// Prompt to send
    pub prompt: String,

    /// System prompt override
    #[arg(long = "system")]
    pub system: Option<String>,

    /// Model to use
    #[arg(long)]
    pub model: Option<String>,

    /// Tool the agent may use without asking (repeatable)
    #[arg(long = "allow-tool", value_name = "TOOL")]
    pub allow_tool: Vec<String>,

    /// Permission policy
    #[arg(long, value_parser = PossibleValuesParser::new(PERMISSION_MODES).try_map(|s| s.parse::<PermissionMode>()))]
    pub permission_mode: Option<PermissionMode>,

    /// Working directory for the agent
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Maximum number of agent turns
    #[arg(long)]
    pub max_turns: Option<u32>,
}

/// Flags of `demo-tools`.
#[derive(clap::Args, Debug, PartialEq)]
pub struct DemoArgs {
    /// Prompt to send
    #[arg(long, default_value = DEFAULT_DEMO_PROMPT)]
    pub prompt: String,

    /// Maximum number of agent turns
    #[arg(long, default_value_t = DEFAULT_DEMO_MAX_TURNS)]
    pub max_turns: u32,

    /// Model to use
    #[arg(long)]
    pub model: Option<String>,

    /// Working directory for the agent
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

impl Commands {
    fn overrides(&self) -> CliOverrides {
        match self {
            Commands::Query(q) => CliOverrides {
                model: q.model.clone(),
                permission_mode: q.permission_mode,
                max_turns: q.max_turns,
            },
            Commands::DemoTools(d) => CliOverrides {
                model: d.model.clone(),
                permission_mode: None,
                max_turns: Some(d.max_turns),
            },
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let Some(command) = args.command else {
        let _ = Args::command().print_help();
        return ExitCode::FAILURE;
    };

    match run(args.config, args.replay, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<PathBuf>, replay: Option<PathBuf>, command: Commands) -> Result<(), AppError> {
    // Defaults → Config File → Env Vars → CLI Args
    let config = config::resolve(config_path, command.overrides())?;

    claude_code_cli::logging::init(config.log_file_path.as_deref())?;
    info!(config = ?config, "Configuration loaded and resolved");

    let telemetry = TelemetryEmitter::from_mode(&TelemetryMode::from_env(config.otlp_endpoint.as_deref()));

    let launcher: Box<dyn SessionLauncher> = match replay {
        Some(path) => Box::new(ReplayLauncher::from_path(&path).map_err(CommandError::from)?),
        None => Box::new(ClaudeCliLauncher::new(&config.claude_path)),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut ctx = CommandContext {
        launcher: launcher.as_ref(),
        telemetry: &telemetry,
        out: &mut out,
    };

    let result = match command {
        Commands::Query(q) => {
            let options = QueryOptions {
                system_prompt: q.system,
                allowed_tools: q.allow_tool,
                permission_mode: config.permission_mode,
                model: config.model,
                cwd: q.cwd,
                max_turns: config.max_turns,
            };
            command::run_query(&mut ctx, &q.prompt, options)
        }
        Commands::DemoTools(d) => {
            let demo = DemoRequest {
                prompt: d.prompt,
                max_turns: config.max_turns.unwrap_or(DEFAULT_DEMO_MAX_TURNS),
                model: config.model,
                cwd: d.cwd,
            };
            command::run_demo_tools(&mut ctx, &demo)
        }
    };

    telemetry.shutdown();
    result.map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_does_not_error() {
        let err = Args::try_parse_from(["claude-code-cli", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_does_not_error() {
        let err = Args::try_parse_from(["claude-code-cli", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_no_args_has_no_command() {
        let args = Args::try_parse_from(["claude-code-cli"]).unwrap();
        assert_eq!(args.command, None);
        assert_eq!(args.config, None);
        assert_eq!(args.replay, None);
    }

    #[test]
    fn test_query_collects_repeated_allow_tool() {
        let args = Args::try_parse_from([
            "claude-code-cli",
            "query",
            "List files",
            "--allow-tool",
            "Read",
            "--allow-tool",
            "Bash",
            "--permission-mode",
            "acceptEdits",
            "--max-turns",
            "2",
        ])
        .unwrap();

        let Some(Commands::Query(q)) = args.command else {
            panic!("expected query");
        };
        assert_eq!(q.prompt, "List files");
        assert_eq!(q.allow_tool, vec!["Read", "Bash"]);
        assert_eq!(q.permission_mode, Some(PermissionMode::AcceptEdits));
        assert_eq!(q.max_turns, Some(2));
        assert_eq!(q.system, None);
    }

    #[test]
    fn test_query_requires_prompt() {
        let err = Args::try_parse_from(["claude-code-cli", "query"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_query_rejects_unknown_permission_mode() {
        let err = Args::try_parse_from(["claude-code-cli", "query", "hi", "--permission-mode", "yolo"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn test_demo_tools_defaults() {
        let args = Args::try_parse_from(["claude-code-cli", "demo-tools"]).unwrap();
        let Some(Commands::DemoTools(d)) = args.command else {
            panic!("expected demo-tools");
        };
        assert_eq!(d.prompt, DEFAULT_DEMO_PROMPT);
        assert_eq!(d.max_turns, 4);
        assert_eq!(d.model, None);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "claude-code-cli",
            "demo-tools",
            "--replay",
            "session.jsonl",
            "--config",
            "cfg.toml",
        ])
        .unwrap();
        assert_eq!(args.replay, Some(PathBuf::from("session.jsonl")));
        assert_eq!(args.config, Some(PathBuf::from("cfg.toml")));
    }

    #[test]
    fn test_demo_overrides_carry_max_turns() {
        let command = Commands::DemoTools(DemoArgs {
            prompt: "p".into(),
            max_turns: 7,
            model: Some("m".into()),
            cwd: None,
        });
        assert_eq!(
            command.overrides(),
            CliOverrides {
                model: Some("m".into()),
                permission_mode: None,
                max_turns: Some(7),
            }
        );
    }
}
