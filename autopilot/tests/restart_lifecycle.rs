//! Lifecycle tests for the restart loop.
//!
//! These drive `prepare_run` and `supervise` with a scripted worker to verify
//! checkpoint restarts, budget exhaustion, failure handling, and the sentinel
//! bookkeeping between sessions.

use std::fs;
use std::time::Duration;

use autopilot::core::layout::MemoryPaths;
use autopilot::core::types::{FinalStatus, RESUME_TOKEN, RunMode, SessionOutcome};
use autopilot::io::signals::CancelFlag;
use autopilot::io::workspace::WorkspaceResolver;
use autopilot::prepare::{PrepareRequest, prepare_run};
use autopilot::supervise::{SuperviseOutcome, SuperviseRequest, supervise};
use autopilot::test_support::{ScriptedSession, ScriptedWorker, TestWorkspace};
use chrono::{NaiveDate, NaiveDateTime};

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid date")
}

fn run(
    worker: &ScriptedWorker,
    workspace: &std::path::Path,
    mode: RunMode,
    max_restarts: u32,
) -> SuperviseOutcome {
    supervise(
        worker,
        &SuperviseRequest {
            workspace,
            objective: "Build a login page",
            mode,
            max_restarts,
            timeout: Some(Duration::from_secs(60)),
            transcripts: true,
        },
        &CancelFlag::new(),
        |_| {},
    )
    .expect("supervise")
}

/// Fresh session → two checkpoints → completion.
///
/// Each checkpoint consumes one restart, relaunches in resume mode, and the
/// sentinel is gone by the time the next session starts.
#[test]
fn checkpoints_relaunch_in_resume_mode_until_completion() {
    let env = TestWorkspace::new();
    let resolver = WorkspaceResolver::new(env.base_dir(), env.root());
    let prepared = prepare_run(
        &resolver,
        &PrepareRequest {
            objective: Some("Build a login page"),
            workspace: None,
            resume: false,
            cwd: env.root(),
            install_root: None,
        },
        noon(),
    )
    .expect("prepare");

    let worker = ScriptedWorker::new(vec![
        ScriptedSession::checkpoint(),
        ScriptedSession::checkpoint(),
        ScriptedSession::complete("# Done\nLogin page shipped.\n"),
    ]);
    let outcome = run(&worker, prepared.workspace_path(), prepared.mode, 5);

    assert_eq!(outcome.status, FinalStatus::Completed);
    assert_eq!(outcome.launches, 3);
    assert_eq!(outcome.restarts, 2);
    assert_eq!(
        outcome.completion_report.as_deref(),
        Some("# Done\nLogin page shipped.\n")
    );

    let launches = worker.launches();
    let modes: Vec<RunMode> = launches.iter().map(|l| l.request.mode).collect();
    assert_eq!(modes, vec![RunMode::Fresh, RunMode::Resume, RunMode::Resume]);
    assert!(launches.iter().all(|l| !l.sentinel_present));
    assert!(launches.iter().all(|l| l.partitions_ready));
    assert!(launches[0].request.prompt.contains("Build a login page"));
    assert!(!launches[1].request.prompt.contains("Build a login page"));

    let transcripts: Vec<_> = launches
        .iter()
        .map(|l| l.request.transcript_path.clone().expect("transcript path"))
        .collect();
    assert_eq!(transcripts.len(), 3);
    assert!(transcripts[0] != transcripts[1]);

    let paths = MemoryPaths::new(prepared.workspace_path());
    assert!(!paths.status_path.exists());
}

#[test]
fn budget_exhaustion_stops_relaunching() {
    let env = TestWorkspace::new();
    let workspace = env.workspace("project");
    let worker = ScriptedWorker::new(vec![
        ScriptedSession::checkpoint(),
        ScriptedSession::checkpoint(),
        ScriptedSession::checkpoint(),
        ScriptedSession::complete("never reached"),
    ]);

    let outcome = run(&worker, &workspace, RunMode::Fresh, 2);

    assert_eq!(outcome.status, FinalStatus::BudgetExhausted { restarts: 2 });
    assert_eq!(outcome.launches, 3);
    assert_eq!(worker.remaining(), 1);
    assert!(outcome.status.resumable());
}

#[test]
fn zero_budget_never_relaunches() {
    let env = TestWorkspace::new();
    let workspace = env.workspace("project");
    let worker = ScriptedWorker::new(vec![ScriptedSession::checkpoint()]);

    let outcome = run(&worker, &workspace, RunMode::Fresh, 0);

    assert_eq!(outcome.status, FinalStatus::BudgetExhausted { restarts: 0 });
    assert_eq!(outcome.launches, 1);
}

#[test]
fn nonzero_exit_is_not_retried_even_with_sentinel() {
    let env = TestWorkspace::new();
    let workspace = env.workspace("project");
    let worker = ScriptedWorker::new(vec![
        ScriptedSession::exit(2).leaving_status(RESUME_TOKEN),
        ScriptedSession::exit(0),
    ]);

    let outcome = run(&worker, &workspace, RunMode::Fresh, 5);

    assert_eq!(outcome.status, FinalStatus::Failed { code: Some(2) });
    assert_eq!(outcome.launches, 1);
    // Left untouched for inspection.
    let paths = MemoryPaths::new(&workspace);
    assert_eq!(
        fs::read_to_string(&paths.status_path).expect("sentinel"),
        RESUME_TOKEN
    );
}

#[test]
fn timeout_and_interrupt_are_terminal() {
    for (outcome, expected) in [
        (SessionOutcome::TimedOut, FinalStatus::TimedOut),
        (SessionOutcome::Interrupted, FinalStatus::Interrupted),
    ] {
        let env = TestWorkspace::new();
        let workspace = env.workspace("project");
        let worker = ScriptedWorker::new(vec![
            ScriptedSession::with_outcome(outcome).leaving_status(RESUME_TOKEN),
            ScriptedSession::exit(0),
        ]);

        let result = run(&worker, &workspace, RunMode::Fresh, 5);

        assert_eq!(result.status, expected);
        assert_eq!(result.launches, 1);
        assert!(result.status.resumable());
    }
}

#[test]
fn other_status_content_is_not_a_resume_request() {
    let env = TestWorkspace::new();
    let workspace = env.workspace("project");
    let worker =
        ScriptedWorker::new(vec![ScriptedSession::exit(0).leaving_status("WORKING\n")]);

    let outcome = run(&worker, &workspace, RunMode::Fresh, 5);

    assert_eq!(outcome.status, FinalStatus::Completed);
    assert_eq!(outcome.launches, 1);
    assert!(outcome.completion_report.is_none());
}

#[test]
fn stale_sentinel_is_cleared_before_first_launch() {
    let env = TestWorkspace::new();
    let workspace = env.saved_workspace("project", "Build a login page");
    let paths = MemoryPaths::new(&workspace);
    fs::create_dir_all(&paths.current_dir).expect("mkdir");
    fs::write(&paths.status_path, RESUME_TOKEN).expect("write sentinel");

    let worker = ScriptedWorker::new(vec![ScriptedSession::exit(0)]);
    let outcome = run(&worker, &workspace, RunMode::Resume, 5);

    assert_eq!(outcome.status, FinalStatus::Completed);
    assert!(!worker.launches()[0].sentinel_present);
}

#[test]
fn resume_picks_up_saved_workspace() {
    let env = TestWorkspace::new();
    let saved = env.saved_workspace("build_a_login_page", "Build a login page");
    let resolver = WorkspaceResolver::new(env.base_dir(), env.root());

    let prepared = prepare_run(
        &resolver,
        &PrepareRequest {
            objective: None,
            workspace: None,
            resume: true,
            cwd: env.root(),
            install_root: None,
        },
        noon(),
    )
    .expect("prepare");
    assert_eq!(prepared.workspace_path(), saved);

    let worker = ScriptedWorker::new(vec![ScriptedSession::complete("done")]);
    let outcome = run(&worker, prepared.workspace_path(), prepared.mode, 5);

    assert_eq!(outcome.status, FinalStatus::Completed);
    assert_eq!(worker.launches()[0].request.mode, RunMode::Resume);
}

#[test]
fn repeated_fresh_runs_get_distinct_workspaces() {
    let env = TestWorkspace::new();
    let resolver = WorkspaceResolver::new(env.base_dir(), env.root());
    let request = PrepareRequest {
        objective: Some("Build a login page"),
        workspace: None,
        resume: false,
        cwd: env.root(),
        install_root: None,
    };

    let first = prepare_run(&resolver, &request, noon()).expect("first");
    let second = prepare_run(&resolver, &request, noon()).expect("second");

    assert_eq!(first.workspace_path(), env.workspace("build_a_login_page"));
    assert_eq!(
        second.workspace_path(),
        env.workspace("build_a_login_page_20240101_120000")
    );
}

#[test]
fn non_utf8_status_file_counts_as_no_signal() {
    let env = TestWorkspace::new();
    let workspace = env.workspace("project");
    let worker = ScriptedWorker::new(vec![
        ScriptedSession::exit(0).leaving_status(b"\xff\xfe\x00"),
        ScriptedSession::exit(0),
    ]);

    let outcome = run(&worker, &workspace, RunMode::Fresh, 5);

    assert_eq!(outcome.status, FinalStatus::Completed);
    assert_eq!(outcome.launches, 1);
    assert!(MemoryPaths::new(&workspace).status_path.exists());
}

#[test]
fn non_utf8_completion_report_is_read_lossily() {
    let env = TestWorkspace::new();
    let workspace = env.workspace("project");
    let worker =
        ScriptedWorker::new(vec![ScriptedSession::exit(0).leaving_report(b"shipped \xff\n")]);

    let outcome = run(&worker, &workspace, RunMode::Fresh, 5);

    assert_eq!(outcome.status, FinalStatus::Completed);
    assert_eq!(
        outcome.completion_report.as_deref(),
        Some("shipped \u{fffd}\n")
    );
}
