/*!
 * Relay Kernel - Main Entry Point
 *
 * Boots an orchestrator on an in-memory filesystem and a console mirrored
 * to stdout, then runs a small shell as the primary process. Host stdin
 * lines are fed to the console; end of input or Ctrl+C shuts down.
 */

use std::io::{BufRead, Write};
use tracing::{error, info};

use relay_kernel::core::limits::{O_CREAT, O_RDONLY, O_RDWR, O_TRUNC, STDIN_FD, STDOUT_FD, TTY_ICANON};
use relay_kernel::{
    init_tracing, BufferConsole, KernelConfig, MemFS, NativeLoader, Orchestrator,
    ProcessContext, ProgramError,
};

const MOTD_PATH: &str = "/motd";

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();

    info!("Relay kernel starting...");
    info!("================================================");

    let config = KernelConfig::from_env()?;
    info!(?config, "Configuration loaded");

    let console = BufferConsole::with_mirror(|bytes| {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(bytes);
        let _ = stdout.flush();
    });

    let loader = NativeLoader::new()
        .with_program("sh", shell)
        .with_program("echo", echo);

    let orchestrator = Orchestrator::builder()
        .with_filesystem(MemFS::new())
        .with_console(console.clone())
        .with_loader(loader)
        .with_config(config)
        .build()?;

    let echo_handle = orchestrator.spawn(
        "echo",
        vec!["echo".into(), "relay".into(), "kernel".into(), "ready".into()],
        None,
    )?;
    let shell_handle = orchestrator.spawn_primary("sh", vec!["sh".into()])?;
    info!(echo = echo_handle.pid(), shell = shell_handle.pid(), "Processes spawned");

    info!("Kernel initialization complete");
    info!("================================================");
    info!("Type lines for the shell, Ctrl+D or Ctrl+C to exit");

    let (eof_tx, eof_rx) = flume::bounded::<()>(1);
    spawn_stdin_pump(console.clone(), eof_tx);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Received Ctrl+C");
        }
        _ = eof_rx.recv_async() => info!("Host input closed"),
    }

    orchestrator.shutdown().await;
    info!("Kernel stopped");
    Ok(())
}

/// Forward host stdin lines to the console until end of input
fn spawn_stdin_pump(console: BufferConsole, eof: flume::Sender<()>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(mut line) = line else { break };
            line.push('\n');
            if !console.push_input(line) {
                break;
            }
        }
        console.close_input();
        let _ = eof.send(());
    });
}

// ============================================================================
// Demo programs
// ============================================================================

async fn echo(ctx: ProcessContext) -> Result<(), ProgramError> {
    let line = format!("{}\n", ctx.args().join(" "));
    let len = line.len();
    ctx.sys.write(STDOUT_FD, line.as_bytes(), 0, len).await?;
    Ok(())
}

async fn shell(ctx: ProcessContext) -> Result<(), ProgramError> {
    let sys = &ctx.sys;
    say(&ctx, &format!("{} (pid {}, generation {})\n", ctx.name(), ctx.pid, ctx.generation)).await?;

    // Write a file and read it back through a second descriptor
    let fd = sys.open(MOTD_PATH, O_CREAT | O_RDWR | O_TRUNC, 0o644).await?;
    let motd = b"welcome to the relay kernel\n";
    sys.write(fd, motd, 0, motd.len()).await?;
    sys.close(fd).await?;

    let fd = sys.open(MOTD_PATH, O_RDONLY, 0).await?;
    let info = sys.fstat(fd).await?;
    let mut buf = vec![0u8; info.size as usize];
    let len = buf.len();
    let n = sys.read(fd, &mut buf, 0, len).await?;
    sys.close(fd).await?;
    sys.write(STDOUT_FD, &buf[..n], 0, n).await?;

    let cwd = sys.getwd().await?;
    for entry in sys.readdir(cwd.as_str()).await? {
        say(&ctx, &format!("  {}\n", entry.name)).await?;
    }

    // The host terminal echoes typed lines
    sys.set_flags(STDIN_FD, TTY_ICANON).await?;

    let mut input = [0u8; 256];
    loop {
        let cap = input.len();
        let n = sys.read(STDIN_FD, &mut input, 0, cap).await?;
        if n == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&input[..n]);
        match line.trim() {
            "" => {}
            "exit" => return Ok(()),
            "pwd" => say(&ctx, &format!("{}\n", sys.getwd().await?)).await?,
            other => say(&ctx, &format!("sh: {}\n", other)).await?,
        }
    }
}

async fn say(ctx: &ProcessContext, text: &str) -> Result<(), ProgramError> {
    ctx.sys.write(STDOUT_FD, text.as_bytes(), 0, text.len()).await?;
    Ok(())
}
