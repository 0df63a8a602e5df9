//! Command-line entry point for `autopilot`.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use autopilot::core::types::FinalStatus;
use autopilot::exit_codes;
use autopilot::io::config::{AutopilotConfig, CONFIG_ENV, config_path, load_config};
use autopilot::io::signals::{CancelFlag, install_interrupt_handler};
use autopilot::io::worker::CommandWorker;
use autopilot::io::workspace::{
    ResolutionError, WORKSPACES_ENV, WorkspaceResolver, list_workspaces, resolve_base_dir,
};
use autopilot::logging;
use autopilot::prepare::{PrepareRequest, PreparedRun, prepare_run};
use autopilot::supervise::{SessionEvent, SuperviseOutcome, SuperviseRequest, supervise};

const OBJECTIVE_PREVIEW_CHARS: usize = 100;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0  completed, timed out, or interrupted (state saved for --resume)
  1  workspace resolution, configuration, or unexpected error
  2  worker exited with a nonzero status
  3  restart budget exhausted (state saved for --resume)";

#[derive(Parser, Debug)]
#[command(
    name = "autopilot",
    version,
    about = "Supervise an autonomous worker across checkpoint restarts",
    after_help = EXIT_CODES_HELP
)]
struct Cli {
    /// Objective text, or a path to a file holding it.
    objective: Option<String>,

    /// Use this directory as the workspace instead of creating one.
    #[arg(short, long, value_name = "PATH")]
    workspace: Option<PathBuf>,

    /// Continue a previous session from its saved memory.
    #[arg(long)]
    resume: bool,

    /// Per-session wall-clock limit.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Maximum automatic relaunches after a checkpoint.
    #[arg(long, value_name = "N")]
    max_restarts: Option<u32>,

    /// List known workspaces and exit.
    #[arg(
        long,
        conflicts_with_all = ["objective", "workspace", "resume", "timeout", "max_restarts"]
    )]
    list: bool,

    /// Print the workspace list as JSON.
    #[arg(long, requires = "list")]
    json: bool,

    /// Config file (default: $AUTOPILOT_CONFIG or ~/.autopilot/config.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let cwd = env::current_dir().context("read current directory")?;
    let home = home_dir();

    let config = match config_path(
        cli.config.as_deref(),
        env::var_os(CONFIG_ENV).map(PathBuf::from),
        home.as_deref(),
    ) {
        Some(path) => load_config(&path)?,
        None => AutopilotConfig::default(),
    };
    let base_dir = resolve_base_dir(
        env::var_os(WORKSPACES_ENV),
        config.workspaces_dir.as_deref(),
        home.as_deref(),
        &cwd,
    )?;

    if cli.list {
        return cmd_list(&base_dir, cli.json);
    }
    cmd_run(cli, config, base_dir, &cwd)
}

fn cmd_list(base_dir: &Path, json: bool) -> Result<i32> {
    let summaries = list_workspaces(base_dir)?;
    if json {
        let payload =
            serde_json::to_string_pretty(&summaries).context("serialize workspace list")?;
        println!("{payload}");
        return Ok(exit_codes::OK);
    }
    if summaries.is_empty() {
        println!("no workspaces in {}", base_dir.display());
        return Ok(exit_codes::OK);
    }
    for summary in &summaries {
        let state = if summary.complete { "complete" } else { "open" };
        println!(
            "{}\t{}\t{}",
            summary.name,
            state,
            summary.objective.as_deref().unwrap_or("-")
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_run(cli: &Cli, mut config: AutopilotConfig, base_dir: PathBuf, cwd: &Path) -> Result<i32> {
    if let Some(max_restarts) = cli.max_restarts {
        config.max_restarts = max_restarts;
    }
    if let Some(secs) = cli.timeout {
        config.timeout_secs = Some(secs);
    }
    config.validate()?;

    let install_root = config.install_root.clone().or_else(executable_dir);
    let resolver = WorkspaceResolver::new(base_dir, cwd);
    let run = prepare_run(
        &resolver,
        &PrepareRequest {
            objective: cli.objective.as_deref(),
            workspace: cli.workspace.as_deref(),
            resume: cli.resume,
            cwd,
            install_root: install_root.as_deref(),
        },
        chrono::Local::now().naive_local(),
    )?;
    print_banner(&run);

    let cancel = CancelFlag::new();
    install_interrupt_handler(cancel.clone())?;
    let worker = CommandWorker::new(config.worker.clone(), cancel.clone(), config.poll_interval());
    let outcome = supervise(
        &worker,
        &SuperviseRequest {
            workspace: run.workspace_path(),
            objective: &run.objective,
            mode: run.mode,
            max_restarts: config.max_restarts,
            timeout: config.timeout(),
            transcripts: config.worker.transcripts,
        },
        &cancel,
        print_event,
    )?;

    print_outcome(&outcome, config.timeout_secs);
    Ok(exit_codes::for_status(outcome.status))
}

fn print_banner(run: &PreparedRun) {
    println!("autopilot: workspace {}", run.workspace_path().display());
    println!("autopilot: memory {}", run.paths.memory_dir.display());
    if run.mode.is_resume() {
        println!("autopilot: resuming from saved state");
    } else {
        println!("autopilot: objective {}", preview(&run.objective));
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Launching { session, mode } => {
            println!("autopilot: launching session {session} ({})", mode.as_str());
        }
        SessionEvent::Ended { .. } => {}
        SessionEvent::CheckpointRestart {
            restart,
            max_restarts,
        } => {
            println!("autopilot: worker checkpointed, restarting ({restart}/{max_restarts})");
        }
    }
}

fn print_outcome(outcome: &SuperviseOutcome, timeout_secs: Option<u64>) {
    match outcome.status {
        FinalStatus::Completed => {
            println!(
                "autopilot: objective completed after {} session(s), {} restart(s)",
                outcome.launches, outcome.restarts
            );
            if let Some(report) = &outcome.completion_report {
                println!();
                println!("{}", report.trim_end());
            }
        }
        FinalStatus::Failed { code: Some(code) } => {
            println!("autopilot: worker exited with code {code}");
        }
        FinalStatus::Failed { code: None } => {
            println!("autopilot: worker was terminated by a signal");
        }
        FinalStatus::TimedOut => match timeout_secs {
            Some(secs) => println!("autopilot: worker timed out after {secs}s"),
            None => println!("autopilot: worker timed out"),
        },
        FinalStatus::Interrupted => println!("autopilot: interrupted"),
        FinalStatus::BudgetExhausted { restarts } => {
            println!(
                "autopilot: restart budget exhausted after {restarts} restart(s); consider splitting the objective into smaller pieces"
            );
        }
    }
    if outcome.status.resumable() {
        println!(
            "autopilot: state saved; continue with `autopilot --resume --workspace {}`",
            outcome.workspace.display()
        );
    }
}

fn report_error(err: &anyhow::Error) {
    eprintln!("autopilot: {err:#}");
    let resolution = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ResolutionError>());
    if let Some(ResolutionError::NoSavedState { .. }) = resolution {
        eprintln!("hint: run `autopilot --list` to see known workspaces, or pass an objective");
    }
}

fn preview(objective: &str) -> String {
    let line = objective.lines().next().unwrap_or_default();
    if line.chars().count() > OBJECTIVE_PREVIEW_CHARS || objective.lines().nth(1).is_some() {
        let head: String = line.chars().take(OBJECTIVE_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        line.to_string()
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn executable_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}
