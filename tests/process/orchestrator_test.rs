/*!
 * Orchestrator Tests
 * Programs issuing real syscalls through the relay
 */

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_kernel::core::limits::{O_CREAT, O_RDONLY, O_RDWR, STDIN_FD, STDOUT_FD, TTY_ICANON};
use relay_kernel::devices::Console;
use relay_kernel::process::ProcessError;
use relay_kernel::syscalls::types::{Errno, OpKind};
use relay_kernel::{
    BufferConsole, ExitStatus, FileSystem, KernelConfig, KernelError, MemFS, NativeLoader,
    Orchestrator, ProcessContext, ProcessState, ProgramError, SyscallRecorder, WireFormat,
};

const WAIT: Duration = Duration::from_secs(5);

fn build(loader: NativeLoader, config: KernelConfig) -> (Orchestrator, BufferConsole) {
    let console = BufferConsole::new();
    let fs = MemFS::new();
    fs.create_dir(Path::new("/home")).unwrap();
    let orchestrator = Orchestrator::builder()
        .with_filesystem(fs)
        .with_console(console.clone())
        .with_loader(loader)
        .with_config(config.with_teardown_timeout(Duration::from_millis(500)))
        .build()
        .unwrap();
    (orchestrator, console)
}

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut).await.expect("timed out")
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

async fn hello(ctx: ProcessContext) -> Result<(), ProgramError> {
    let text = format!("Hi from {}", ctx.args().join(" "));
    ctx.sys.write(STDOUT_FD, text.as_bytes(), 0, text.len()).await?;
    Ok(())
}

async fn waits_for_input(ctx: ProcessContext) -> Result<(), ProgramError> {
    let mut buf = [0u8; 16];
    let len = buf.len();
    ctx.sys.read(STDIN_FD, &mut buf, 0, len).await?;
    Ok(())
}

/// Copies one chunk of console input to the console output
async fn echo_input(ctx: ProcessContext) -> Result<(), ProgramError> {
    let mut buf = [0u8; 16];
    let len = buf.len();
    let n = ctx.sys.read(STDIN_FD, &mut buf, 0, len).await?;
    ctx.sys.write(STDOUT_FD, &buf, 0, n).await?;
    Ok(())
}

async fn file_round_trip(ctx: ProcessContext) -> Result<(), ProgramError> {
    let sys = &ctx.sys;
    let fd = sys.open("/greeting", O_CREAT | O_RDWR, 0o644).await?;
    let written = sys.write(fd, b"hello relay", 0, 11).await?;
    if written != 11 {
        return Err(format!("short write: {}", written).into());
    }
    sys.close(fd).await?;

    let fd = sys.open("/greeting", O_RDONLY, 0).await?;
    let info = sys.fstat(fd).await?;
    if !info.is_file() || info.size != 11 {
        return Err(format!("unexpected info {:?}", info).into());
    }

    let mut buf = [0u8; 32];
    let n = sys.read(fd, &mut buf, 4, 11).await?;
    if &buf[4..4 + n] != b"hello relay" {
        return Err("content mismatch".into());
    }

    match sys.stat("/missing").await {
        Err(err) if err.errno() == Some(Errno::Enoent) => {}
        other => return Err(format!("stat /missing gave {:?}", other).into()),
    }
    Ok(())
}

#[tokio::test]
async fn test_program_output_reaches_console() {
    let (orch, console) = build(
        NativeLoader::new().with_program("hello", hello),
        KernelConfig::default(),
    );

    let handle = orch.spawn("hello", argv(&["hello", "relay"]), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();

    assert_eq!(handle.last_exit(), Some(ExitStatus::Exited));
    assert_eq!(console.output_string(), "Hi from relay");
}

#[tokio::test]
async fn test_file_io_through_relay_in_both_formats() {
    for format in [WireFormat::Bincode, WireFormat::Json] {
        let (orch, _) = build(
            NativeLoader::new().with_program("files", file_round_trip),
            KernelConfig::default().with_wire_format(format),
        );

        let handle = orch.spawn("files", argv(&["files"]), None).unwrap();
        within(handle.wait_for(ProcessState::Halted)).await.unwrap();
        assert_eq!(handle.last_exit(), Some(ExitStatus::Exited), "format {}", format);
    }
}

#[tokio::test]
async fn test_concurrent_calls_from_one_process() {
    let loader = NativeLoader::new().with_program("many", |ctx: ProcessContext| async move {
        let sys = &ctx.sys;
        let (root, cwd, missing) = tokio::join!(sys.stat("/"), sys.getwd(), sys.stat("/nope"));
        if !root?.is_dir() || cwd? != "/" || missing.is_ok() {
            return Err(ProgramError::from("wrong results"));
        }
        if sys.pending_count() != 0 {
            return Err(ProgramError::from("calls left pending"));
        }
        Ok::<(), ProgramError>(())
    });
    let (orch, _) = build(loader, KernelConfig::default());

    let handle = orch.spawn("many", argv(&["many"]), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();
    assert_eq!(handle.last_exit(), Some(ExitStatus::Exited));
}

#[tokio::test]
async fn test_observer_sees_each_request_and_reply() {
    let loader = NativeLoader::new().with_program("observed", |ctx: ProcessContext| async move {
        ctx.sys.getwd().await?;
        let _ = ctx.sys.stat("/missing").await;
        Ok::<(), ProgramError>(())
    });
    let (orch, _) = build(loader, KernelConfig::default());
    let recorder = SyscallRecorder::new();

    let handle = orch
        .spawn("observed", argv(&["observed"]), Some(recorder.observer()))
        .unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();
    within(async {
        while recorder.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert_eq!(recorder.kinds(), vec![OpKind::Getwd, OpKind::Stat]);
    let records = recorder.records();
    assert!(records.iter().all(|r| r.pid == handle.pid()));
    assert!(records.iter().all(|r| r.reply.id == r.request.id));
    assert_eq!(records[0].reply.data.as_deref(), Some(&b"/"[..]));
    assert!(records[1].reply.is_error());
}

/// What one run saw: (pid, first fd, last call id, pending calls)
type RunLog = Arc<Mutex<Vec<(u32, u32, u64, usize)>>>;

fn recording_program(
    log: RunLog,
) -> impl Fn(ProcessContext) -> BoxFuture<'static, Result<(), ProgramError>> + Send + Sync {
    move |ctx: ProcessContext| {
        let log = Arc::clone(&log);
        async move {
            let fd = ctx.sys.open("/state", O_CREAT | O_RDWR, 0o644).await?;
            let cwd = ctx.sys.getwd().await?;
            if cwd != "/" {
                return Err(format!("inherited cwd {}", cwd).into());
            }
            ctx.sys.chdir("home").await?;
            log.lock()
                .push((ctx.pid, fd, ctx.sys.last_id(), ctx.sys.pending_count()));
            Ok::<(), ProgramError>(())
        }
        .boxed()
    }
}

#[tokio::test]
async fn test_respawned_processes_share_nothing() {
    let log: RunLog = Arc::default();
    let loader = NativeLoader::new().with_program("rec", recording_program(Arc::clone(&log)));
    let (orch, _) = build(loader, KernelConfig::default());

    let mut pids = Vec::new();
    for _ in 0..3 {
        let handle = orch.spawn("rec", argv(&["rec"]), None).unwrap();
        within(handle.wait_for(ProcessState::Halted)).await.unwrap();
        assert_eq!(handle.last_exit(), Some(ExitStatus::Exited));
        assert_eq!(handle.generation(), 1);

        within(orch.teardown(handle.pid())).await.unwrap();
        assert_eq!(orch.dispatcher().open_count(handle.pid()), None);
        assert_eq!(orch.dispatcher().cwd(handle.pid()), None);
        pids.push(handle.pid());
    }

    let runs = log.lock().clone();
    assert_eq!(
        runs,
        vec![(pids[0], 3, 3, 0), (pids[1], 3, 3, 0), (pids[2], 3, 3, 0)]
    );
    assert!(pids[0] < pids[1] && pids[1] < pids[2]);
}

#[tokio::test]
async fn test_restart_resets_descriptors_but_not_call_ids() {
    let log: RunLog = Arc::default();
    let loader = NativeLoader::new().with_program("rec", recording_program(Arc::clone(&log)));
    let (orch, _) = build(loader, KernelConfig::default());

    let handle = orch.spawn("rec", argv(&["rec"]), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();
    handle.restart().unwrap();
    within(handle.wait_for_generation(ProcessState::Halted, 2))
        .await
        .unwrap();

    let runs = log.lock().clone();
    let pid = handle.pid();
    // Same fd again; ids keep counting on the shared endpoint
    assert_eq!(runs, vec![(pid, 3, 3, 0), (pid, 3, 6, 0)]);
}

#[tokio::test]
async fn test_input_after_teardown_reaches_live_process() {
    let (orch, console) = build(
        NativeLoader::new()
            .with_program("wait", waits_for_input)
            .with_program("echo", echo_input),
        KernelConfig::default(),
    );
    // Only program writes show up in the output
    console.set_flags(TTY_ICANON);

    let first = orch.spawn("wait", argv(&["wait"]), None).unwrap();
    within(first.wait_for(ProcessState::Running)).await.unwrap();
    // Let the console read reach the dispatcher
    tokio::time::sleep(Duration::from_millis(50)).await;
    within(orch.teardown(first.pid())).await.unwrap();

    let second = orch.spawn("echo", argv(&["echo"]), None).unwrap();
    within(second.wait_for(ProcessState::Running)).await.unwrap();
    console.push_input(b"line".to_vec());

    within(second.wait_for(ProcessState::Halted)).await.unwrap();
    assert_eq!(second.last_exit(), Some(ExitStatus::Exited));
    assert_eq!(console.output_string(), "line");
}

#[tokio::test]
async fn test_restart_cancels_calls_of_previous_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let loader = NativeLoader::new().with_program("flaky", move |ctx: ProcessContext| {
        let run = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if run == 0 {
                // Give up on input; the read stays outstanding on the kernel side
                let mut buf = [0u8; 16];
                let len = buf.len();
                let _ = tokio::time::timeout(
                    Duration::from_millis(50),
                    ctx.sys.read(STDIN_FD, &mut buf, 0, len),
                )
                .await;
                return Ok(());
            }
            let fd = ctx.sys.open("/after", O_CREAT | O_RDWR, 0o644).await?;
            if fd != 3 {
                return Err(format!("fresh table handed out fd {}", fd).into());
            }
            ctx.sys.close(fd).await?;
            echo_input(ctx).await
        }
        .boxed()
    });
    let (orch, console) = build(loader, KernelConfig::default());
    console.set_flags(TTY_ICANON);

    let handle = orch.spawn("flaky", argv(&["flaky"]), None).unwrap();
    within(handle.wait_for(ProcessState::Halted)).await.unwrap();
    assert_eq!(handle.restart().unwrap(), 2);
    within(handle.wait_for_generation(ProcessState::Running, 2))
        .await
        .unwrap();

    console.push_input(b"line".to_vec());
    within(handle.wait_for_generation(ProcessState::Halted, 2))
        .await
        .unwrap();

    assert_eq!(handle.last_exit(), Some(ExitStatus::Exited));
    assert_eq!(console.output_string(), "line");
    assert_eq!(orch.dispatcher().open_count(handle.pid()), Some(3));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_process_limit() {
    let (orch, console) = build(
        NativeLoader::new().with_program("wait", waits_for_input),
        KernelConfig::default().with_max_processes(2),
    );

    let first = orch.spawn("wait", argv(&["wait"]), None).unwrap();
    let second = orch.spawn("wait", argv(&["wait"]), None).unwrap();
    let err = orch.spawn("wait", argv(&["wait"]), None).unwrap_err();
    assert!(matches!(
        err,
        KernelError::Process(ProcessError::LimitReached {
            current: 2,
            limit: 2
        })
    ));

    let listed: Vec<u32> = orch.processes().iter().map(|p| p.pid).collect();
    assert_eq!(listed, vec![first.pid(), second.pid()]);

    within(orch.teardown(first.pid())).await.unwrap();
    let third = orch.spawn("wait", argv(&["wait"]), None).unwrap();
    assert!(third.pid() > second.pid());

    console.close_input();
    within(orch.shutdown()).await;
    assert!(orch.is_empty());
}

#[tokio::test]
async fn test_teardown_unknown_pid() {
    let (orch, _) = build(NativeLoader::new(), KernelConfig::default());
    let err = orch.teardown(99).await.unwrap_err();
    assert!(matches!(err, KernelError::Process(ProcessError::NotFound(99))));
}

#[test]
fn test_builder_requires_loader() {
    let err = Orchestrator::builder().build().unwrap_err();
    assert!(matches!(err, KernelError::Configuration(_)));
}
