/*!
 * Process Lifecycle Tests
 * State transitions of spawned processes, driven through the orchestrator
 */

use pretty_assertions::assert_eq;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_kernel::core::limits::STDIN_FD;
use relay_kernel::process::ProcessError;
use relay_kernel::{
    BufferConsole, ExitStatus, KernelConfig, NativeLoader, Orchestrator, ProcessContext,
    ProcessState, ProgramError,
};

const WAIT: Duration = Duration::from_secs(5);

fn orchestrator(loader: NativeLoader) -> (Orchestrator, BufferConsole) {
    let console = BufferConsole::new();
    let config = KernelConfig::default()
        .with_restart_delay(Duration::from_millis(10))
        .with_teardown_timeout(Duration::from_millis(500));
    let orchestrator = Orchestrator::builder()
        .with_console(console.clone())
        .with_loader(loader)
        .with_config(config)
        .build()
        .unwrap();
    (orchestrator, console)
}

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut).await.expect("timed out")
}

async fn exits(_ctx: ProcessContext) -> Result<(), ProgramError> {
    Ok(())
}

async fn fails(_ctx: ProcessContext) -> Result<(), ProgramError> {
    Err("boom".into())
}

async fn panics(_ctx: ProcessContext) -> Result<(), ProgramError> {
    panic!("kaboom");
}

/// Blocks on console input until it is closed
async fn waits_for_input(ctx: ProcessContext) -> Result<(), ProgramError> {
    let mut buf = [0u8; 16];
    let len = buf.len();
    ctx.sys.read(STDIN_FD, &mut buf, 0, len).await?;
    Ok(())
}

fn argv(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[tokio::test]
async fn test_exit_moves_to_halted() {
    let (orch, _) = orchestrator(NativeLoader::new().with_program("exits", exits));

    let handle = orch.spawn("exits", argv("exits"), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();

    assert_eq!(handle.last_exit(), Some(ExitStatus::Exited));
    assert_eq!(handle.generation(), 1);

    within(orch.teardown(handle.pid())).await.unwrap();
    assert_eq!(handle.state(), ProcessState::TornDown);
    assert!(orch.is_empty());
}

#[tokio::test]
async fn test_program_error_is_failed_status() {
    let (orch, _) = orchestrator(NativeLoader::new().with_program("fails", fails));

    let handle = orch.spawn("fails", argv("fails"), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();

    assert_eq!(handle.last_exit(), Some(ExitStatus::Failed("boom".into())));
}

#[tokio::test]
async fn test_panic_is_contained() {
    let (orch, _) = orchestrator(
        NativeLoader::new()
            .with_program("panics", panics)
            .with_program("exits", exits),
    );

    let bad = orch.spawn("panics", argv("panics"), None).unwrap();
    within(bad.wait_for(ProcessState::Halted)).await.unwrap();
    match bad.last_exit() {
        Some(ExitStatus::Failed(reason)) => assert!(reason.contains("kaboom")),
        other => panic!("unexpected exit {:?}", other),
    }

    // Other processes are unaffected
    let good = orch.spawn("exits", argv("exits"), None).unwrap();
    within(good.wait_for(ProcessState::Halted)).await.unwrap();
    assert_eq!(good.last_exit(), Some(ExitStatus::Exited));
}

#[tokio::test]
async fn test_unknown_image_fails_instantiation() {
    let (orch, _) = orchestrator(NativeLoader::new());

    let handle = orch.spawn("missing", argv("missing"), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();

    assert!(matches!(
        handle.last_exit(),
        Some(ExitStatus::InstantiationFailed(_))
    ));
}

#[tokio::test]
async fn test_teardown_stops_running_program() {
    let (orch, _) = orchestrator(NativeLoader::new().with_program("wait", waits_for_input));

    let handle = orch.spawn("wait", argv("wait"), None).unwrap();
    within(handle.wait_for(ProcessState::Running)).await.unwrap();

    within(handle.teardown()).await.unwrap();
    assert_eq!(handle.state(), ProcessState::TornDown);
    assert_eq!(handle.last_exit(), Some(ExitStatus::Shutdown));

    // Idempotent
    within(handle.teardown()).await.unwrap();
}

#[tokio::test]
async fn test_restart_runs_a_new_generation() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let loader = NativeLoader::new().with_program("count", move |_ctx: ProcessContext| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<(), ProgramError>(()) }
    });
    let (orch, _) = orchestrator(loader);

    let handle = orch.spawn("count", argv("count"), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();

    assert_eq!(handle.restart().unwrap(), 2);
    within(handle.wait_for_generation(ProcessState::Halted, 2))
        .await
        .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(handle.info().generation, 2);
}

#[tokio::test]
async fn test_restart_requires_halted() {
    let (orch, console) = orchestrator(NativeLoader::new().with_program("wait", waits_for_input));

    let handle = orch.spawn("wait", argv("wait"), None).unwrap();
    within(handle.wait_for(ProcessState::Running)).await.unwrap();

    assert!(matches!(
        handle.restart(),
        Err(ProcessError::InvalidStateTransition {
            from: ProcessState::Running,
            to: ProcessState::Instantiating,
        })
    ));

    // Closing input lets the program finish on its own
    console.close_input();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();
    assert_eq!(handle.last_exit(), Some(ExitStatus::Exited));
}

#[tokio::test]
async fn test_primary_is_restarted_after_exit() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let loader = NativeLoader::new().with_program("init", move |_ctx: ProcessContext| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<(), ProgramError>(()) }
    });
    let (orch, _) = orchestrator(loader);

    let primary = orch.spawn_primary("init", argv("init")).unwrap();
    within(primary.wait_for_generation(ProcessState::Halted, 3))
        .await
        .unwrap();
    assert!(runs.load(Ordering::SeqCst) >= 3);
    assert_eq!(orch.primary().map(|h| h.pid()), Some(primary.pid()));

    within(orch.shutdown()).await;
    assert_eq!(primary.state(), ProcessState::TornDown);
    assert!(orch.primary().is_none());
}

#[tokio::test]
async fn test_wait_fails_once_torn_down() {
    let (orch, _) = orchestrator(NativeLoader::new().with_program("exits", exits));

    let handle = orch.spawn("exits", argv("exits"), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();
    within(orch.teardown(handle.pid())).await.unwrap();

    let err = within(handle.wait_for(ProcessState::Running)).await.unwrap_err();
    assert!(matches!(err, ProcessError::InvalidStateTransition { .. }));
}
