//! Integration tests for the experiment coordinator
//!
//! These tests drive the coordinator end-to-end through its public handle.

use std::sync::Arc;
use std::time::Duration;

use expcoord::experiment::builtin::{ScriptTrace, Scripted};
use expcoord::{
    Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle, ExperimentCode, ExperimentRegistry,
    FollowOptions, IterationResult, MissionConfig, MissionLoop, MissionLoopHandle, RunEnd, StartResult, follow_run,
};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

fn spawn(experiments: Vec<Scripted>) -> (Coordinator, CoordinatorHandle) {
    let mut registry = ExperimentRegistry::new();
    for exp in experiments {
        registry.register(Box::new(exp)).expect("Failed to register experiment");
    }
    let coordinator = Coordinator::spawn(registry, CoordinatorConfig::default());
    let handle = coordinator.handle();
    (coordinator, handle)
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for {}", what));
}

/// Wait until `trace` has seen `runs` stops and the coordinator is idle again
async fn wait_for_runs(handle: &CoordinatorHandle, trace: &Arc<ScriptTrace>, runs: usize) {
    wait_until("run to end", || trace.stops().len() >= runs && !handle.in_progress()).await;
}

async fn admit(handle: &CoordinatorHandle, code: u8) {
    assert!(handle.request_experiment(ExperimentCode(code)).await.unwrap());
    handle.start_experiment().await.unwrap();
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_scenario_loop_wait_finish() {
    let exp = Scripted::new(
        5,
        vec![
            IterationResult::LoopImmediately,
            IterationResult::WaitForNextCycle,
            IterationResult::Finished,
        ],
    );
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    admit(&handle, 5).await;
    wait_until("run to park", || trace.iterations() == 2).await;

    // spaced mission ticks; the second one finds nothing waiting
    for _ in 0..2 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.notify_loop_iteration_start();
    }
    wait_for_runs(&handle, &trace, 1).await;

    let state = handle.current_state().await.unwrap();
    assert_eq!(state.current_experiment, None);
    assert_eq!(state.last_start_result, Some(StartResult::Success));
    assert_eq!(state.last_iteration_result, Some(IterationResult::Finished));
    assert_eq!(state.iteration_counter, 3);
    assert!(!handle.in_progress());

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scenario_repeated_request_overwrites() {
    let (coordinator, handle) = spawn(vec![Scripted::new(5, vec![IterationResult::Finished])]);

    assert!(handle.request_experiment(ExperimentCode(5)).await.unwrap());
    assert!(handle.request_experiment(ExperimentCode(5)).await.unwrap());

    let state = handle.current_state().await.unwrap();
    assert_eq!(state.requested_experiment, Some(ExperimentCode(5)));
    assert!(handle.is_experiment_requested().await.unwrap());

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scenario_unregistered_code_is_dropped() {
    let (coordinator, handle) = spawn(vec![Scripted::new(5, vec![IterationResult::Finished])]);

    admit(&handle, 99).await;
    wait_until("lookup miss", || handle.metrics().lookup_misses == 1).await;

    let state = handle.current_state().await.unwrap();
    assert_eq!(state.current_experiment, None);
    assert_eq!(state.requested_experiment, None);
    assert_eq!(state.last_start_result, None);
    assert!(!handle.in_progress());
    assert_eq!(handle.metrics().runs_started, 0);

    coordinator.shutdown().await.unwrap();
}

// =============================================================================
// Run loop
// =============================================================================

#[tokio::test]
async fn test_finished_after_n_iterations() {
    let exp = Scripted::new(3, vec![IterationResult::None; 6]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    admit(&handle, 3).await;
    wait_for_runs(&handle, &trace, 1).await;

    // six `None` results, then the exhausted script reports `Finished`
    let state = handle.current_state().await.unwrap();
    assert_eq!(state.iteration_counter, 7);
    assert_eq!(state.last_iteration_result, Some(IterationResult::Finished));
    assert_eq!(trace.stops(), vec![IterationResult::Finished]);
    assert_eq!(handle.metrics().total_iterations, 7);
    assert_eq!(handle.metrics().runs_finished, 1);

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_failure_still_stops() {
    let exp = Scripted::new(4, vec![IterationResult::LoopImmediately]).with_start(StartResult::Failure);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    admit(&handle, 4).await;
    wait_for_runs(&handle, &trace, 1).await;

    let state = handle.current_state().await.unwrap();
    assert_eq!(state.last_start_result, Some(StartResult::Failure));
    assert_eq!(state.last_iteration_result, None);
    assert_eq!(state.iteration_counter, 0);
    assert_eq!(trace.iterations(), 0);
    assert_eq!(trace.stops(), vec![IterationResult::Failure]);
    assert_eq!(handle.metrics().runs_failed, 1);

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wait_for_next_cycle_gates_iteration() {
    let exp = Scripted::new(6, vec![IterationResult::WaitForNextCycle, IterationResult::Finished]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    admit(&handle, 6).await;
    wait_until("first iteration", || trace.iterations() == 1).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(trace.iterations(), 1);
    assert!(handle.in_progress());
    let state = handle.current_state().await.unwrap();
    assert_eq!(state.current_experiment, Some(ExperimentCode(6)));
    assert_eq!(state.last_iteration_result, Some(IterationResult::WaitForNextCycle));

    handle.notify_loop_iteration_start();
    wait_for_runs(&handle, &trace, 1).await;
    assert_eq!(trace.iterations(), 2);

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_idle_ticks_do_not_release_next_wait() {
    let exp = Scripted::new(7, vec![IterationResult::WaitForNextCycle, IterationResult::Finished]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    for _ in 0..3 {
        handle.notify_loop_iteration_start();
    }

    admit(&handle, 7).await;
    wait_until("first iteration", || trace.iterations() == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(trace.iterations(), 1);

    handle.notify_loop_iteration_start();
    wait_for_runs(&handle, &trace, 1).await;

    coordinator.shutdown().await.unwrap();
}

// =============================================================================
// Abort
// =============================================================================

#[tokio::test]
async fn test_abort_mid_run() {
    let long = Scripted::new(8, vec![IterationResult::LoopImmediately; 1000]).with_iteration_delay(Duration::from_millis(5));
    let long_trace = long.trace();
    let short = Scripted::new(9, vec![IterationResult::LoopImmediately, IterationResult::Finished]);
    let short_trace = short.trace();
    let (coordinator, handle) = spawn(vec![long, short]);

    admit(&handle, 8).await;
    wait_until("a few iterations", || long_trace.iterations() >= 3).await;
    handle.abort_experiment();
    wait_for_runs(&handle, &long_trace, 1).await;

    let state = handle.current_state().await.unwrap();
    assert_eq!(state.current_experiment, None);
    assert_eq!(state.last_iteration_result, Some(IterationResult::Failure));
    assert_eq!(long_trace.stops(), vec![IterationResult::Failure]);
    assert_eq!(handle.metrics().runs_aborted, 1);

    // the next run starts with the abort already consumed
    admit(&handle, 9).await;
    wait_for_runs(&handle, &short_trace, 1).await;
    assert_eq!(short_trace.stops(), vec![IterationResult::Finished]);
    assert_eq!(long_trace.stops().len(), 1);

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_abort_while_parked() {
    let exp = Scripted::new(2, vec![IterationResult::WaitForNextCycle; 5]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    admit(&handle, 2).await;
    wait_until("run to park", || trace.iterations() == 1).await;
    handle.abort_experiment();
    wait_for_runs(&handle, &trace, 1).await;

    assert_eq!(trace.iterations(), 1);
    assert_eq!(trace.stops(), vec![IterationResult::Failure]);
    let state = handle.current_state().await.unwrap();
    assert_eq!(state.last_iteration_result, Some(IterationResult::Failure));

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_abort_while_idle_is_cleared_by_next_run() {
    let exp = Scripted::new(1, vec![IterationResult::LoopImmediately, IterationResult::Finished]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    handle.abort_experiment();
    admit(&handle, 1).await;
    wait_for_runs(&handle, &trace, 1).await;

    assert_eq!(trace.stops(), vec![IterationResult::Finished]);
    assert_eq!(handle.current_state().await.unwrap().iteration_counter, 2);

    coordinator.shutdown().await.unwrap();
}

// =============================================================================
// Admission
// =============================================================================

#[tokio::test]
async fn test_request_rejected_while_running() {
    let exp = Scripted::new(5, vec![IterationResult::WaitForNextCycle, IterationResult::Finished]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp, Scripted::new(6, vec![])]);

    admit(&handle, 5).await;
    wait_until("run to park", || trace.iterations() == 1).await;

    assert!(!handle.request_experiment(ExperimentCode(6)).await.unwrap());
    let state = handle.current_state().await.unwrap();
    assert_eq!(state.requested_experiment, None);
    assert_eq!(state.current_experiment, Some(ExperimentCode(5)));
    assert!(handle.in_progress());
    assert_eq!(handle.metrics().admissions_rejected, 1);

    handle.notify_loop_iteration_start();
    wait_for_runs(&handle, &trace, 1).await;
    assert!(handle.request_experiment(ExperimentCode(6)).await.unwrap());

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_without_request_fails() {
    let (coordinator, handle) = spawn(vec![]);

    let err = handle.start_experiment().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::NoPendingRequest));
    assert!(!handle.in_progress());

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_back_to_back_runs_reset_counters() {
    let exp = Scripted::new(5, vec![IterationResult::None, IterationResult::None, IterationResult::Finished]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    admit(&handle, 5).await;
    wait_for_runs(&handle, &trace, 1).await;
    admit(&handle, 5).await;
    wait_for_runs(&handle, &trace, 2).await;

    assert_eq!(trace.starts(), 2);
    assert_eq!(handle.current_state().await.unwrap().iteration_counter, 3);
    assert_eq!(handle.metrics().runs_finished, 2);

    coordinator.shutdown().await.unwrap();
}

#[test]
fn test_duplicate_registration_rejected() {
    let mut registry = ExperimentRegistry::new();
    registry.register(Box::new(Scripted::new(5, vec![]))).unwrap();

    let err = registry.register(Box::new(Scripted::new(5, vec![]))).unwrap_err();
    assert!(matches!(err, CoordinatorError::DuplicateExperiment(ExperimentCode(5))));
}

// =============================================================================
// Following a run
// =============================================================================

fn start_mission(handle: &CoordinatorHandle) -> MissionLoopHandle {
    let config = MissionConfig {
        tick_ms: 5,
        max_ticks: 0,
    };
    MissionLoop::new(config, handle.clone()).spawn()
}

fn fast_options(tick_budget: u64, abort_after_ticks: Option<u64>) -> FollowOptions {
    FollowOptions {
        poll_interval: Duration::from_millis(5),
        ..FollowOptions::new(tick_budget, abort_after_ticks)
    }
}

#[tokio::test]
async fn test_follow_sees_dropped_code_that_ended_before_polling() {
    let (coordinator, handle) = spawn(vec![Scripted::new(2, vec![IterationResult::Finished])]);
    let mission = start_mission(&handle);

    assert!(handle.request_experiment(ExperimentCode(99)).await.unwrap());
    let baseline = handle.metrics();
    handle.start_experiment().await.unwrap();
    wait_until("lookup miss", || handle.metrics().lookup_misses == 1).await;

    let report = tokio::time::timeout(
        WAIT_LIMIT,
        follow_run(&coordinator, &mission, &baseline, &fast_options(100, None), |_, _| {}),
    )
    .await
    .expect("follow_run did not return")
    .unwrap();

    assert_eq!(report.end, RunEnd::Dropped);
    assert!(!report.abort_sent);
    assert_eq!(report.state.current_experiment, None);

    mission.stop().await;
    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_follow_sees_short_run_that_ended_before_polling() {
    let exp = Scripted::new(2, vec![IterationResult::Finished]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);
    let mission = start_mission(&handle);

    assert!(handle.request_experiment(ExperimentCode(2)).await.unwrap());
    let baseline = handle.metrics();
    handle.start_experiment().await.unwrap();
    wait_for_runs(&handle, &trace, 1).await;
    wait_until("run counted", || handle.metrics().runs_finished == 1).await;

    let report = tokio::time::timeout(
        WAIT_LIMIT,
        follow_run(&coordinator, &mission, &baseline, &fast_options(100, None), |_, _| {}),
    )
    .await
    .expect("follow_run did not return")
    .unwrap();

    assert_eq!(report.end, RunEnd::Finished);
    assert_eq!(report.state.iteration_counter, 1);
    assert_eq!(report.state.last_iteration_result, Some(IterationResult::Finished));

    mission.stop().await;
    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_follow_aborts_after_requested_ticks() {
    let exp = Scripted::new(3, vec![IterationResult::LoopImmediately; 100_000]).with_iteration_delay(Duration::from_millis(2));
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);
    let mission = start_mission(&handle);

    assert!(handle.request_experiment(ExperimentCode(3)).await.unwrap());
    let baseline = handle.metrics();
    handle.start_experiment().await.unwrap();

    let mut progress = Vec::new();
    let report = tokio::time::timeout(
        WAIT_LIMIT,
        follow_run(&coordinator, &mission, &baseline, &fast_options(1000, Some(3)), |tick, state| {
            progress.push((tick, state.iteration_counter));
        }),
    )
    .await
    .expect("follow_run did not return")
    .unwrap();

    assert_eq!(report.end, RunEnd::Aborted);
    assert!(report.abort_sent);
    assert_eq!(report.state.last_iteration_result, Some(IterationResult::Failure));
    assert_eq!(trace.stops(), vec![IterationResult::Failure]);
    assert!(!progress.is_empty());
    assert!(mission.tick_count() >= 3);

    mission.stop().await;
    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_follow_aborts_when_tick_budget_runs_out() {
    let exp = Scripted::new(4, vec![IterationResult::WaitForNextCycle; 100_000]);
    let (coordinator, handle) = spawn(vec![exp]);
    let mission = start_mission(&handle);

    assert!(handle.request_experiment(ExperimentCode(4)).await.unwrap());
    let baseline = handle.metrics();
    handle.start_experiment().await.unwrap();

    let report = tokio::time::timeout(
        WAIT_LIMIT,
        follow_run(&coordinator, &mission, &baseline, &fast_options(4, None), |_, _| {}),
    )
    .await
    .expect("follow_run did not return")
    .unwrap();

    assert_eq!(report.end, RunEnd::Aborted);
    assert!(report.abort_sent);
    assert_eq!(report.metrics.runs_aborted, 1);

    mission.stop().await;
    coordinator.shutdown().await.unwrap();
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_shutdown_stops_parked_run_without_mission_loop() {
    let exp = Scripted::new(6, vec![IterationResult::WaitForNextCycle; 10]);
    let trace = exp.trace();
    let (coordinator, handle) = spawn(vec![exp]);

    admit(&handle, 6).await;
    wait_until("run to park", || trace.iterations() == 1).await;

    tokio::time::timeout(WAIT_LIMIT, coordinator.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
    assert_eq!(trace.stops(), vec![IterationResult::Failure]);
    assert_eq!(handle.metrics().runs_aborted, 1);
}

#[tokio::test]
async fn test_failed_start_after_shutdown_keeps_request() {
    let (coordinator, handle) = spawn(vec![]);
    coordinator.shutdown().await.unwrap();

    assert!(handle.request_experiment(ExperimentCode(5)).await.unwrap());
    let err = handle.start_experiment().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Closed));
    assert_eq!(
        handle.current_state().await.unwrap().requested_experiment,
        Some(ExperimentCode(5))
    );
}
