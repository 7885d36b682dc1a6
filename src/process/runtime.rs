/*!
 * Unit Runtime
 * Receive loop of one isolated unit
 *
 * The unit owns only its endpoint. It waits for `init`, instantiates the
 * image through the loader, announces `started`, then drives the program
 * while routing inbound replies to the run's syscall client. When the
 * program ends, outstanding calls are failed and `halted` is reported;
 * the unit then waits for the next `init` (restart) or `shutdown`.
 */

use futures::future::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::program::{ProcessContext, ProgramLoader};
use super::types::ExitStatus;
use crate::core::id::CallIdGenerator;
use crate::core::limits::FIRST_CALL_ID;
use crate::core::types::{Generation, Pid};
use crate::ipc::{InitCommand, ProcessEndpoint, ToKernel, ToProcess};
use crate::syscalls::client::{ClientConfig, SyscallClient};
use crate::syscalls::types::SyscallError;

/// What the receive loop does after a run
enum Flow {
    AwaitInit,
    Stop,
}

/// Process side of a spawned process
pub(crate) struct UnitRuntime {
    pid: Pid,
    endpoint: ProcessEndpoint,
    loader: Arc<dyn ProgramLoader>,
    client_config: ClientConfig,
    /// Shared by every run on this endpoint
    ids: CallIdGenerator,
}

impl UnitRuntime {
    pub(crate) fn new(
        pid: Pid,
        endpoint: ProcessEndpoint,
        loader: Arc<dyn ProgramLoader>,
        client_config: ClientConfig,
    ) -> Self {
        Self {
            pid,
            endpoint,
            loader,
            client_config,
            ids: CallIdGenerator::new(FIRST_CALL_ID),
        }
    }

    /// Run until shutdown or until the orchestrator side goes away
    pub(crate) async fn run(self) {
        loop {
            let init = match self.endpoint.recv().await {
                Some(ToProcess::Init(init)) => init,
                Some(ToProcess::Reply(reply)) => {
                    warn!(pid = self.pid, id = reply.id, "Dropping reply while no program is running");
                    continue;
                }
                Some(ToProcess::Shutdown) | None => break,
            };

            match self.run_generation(init).await {
                Flow::AwaitInit => continue,
                Flow::Stop => break,
            }
        }
        debug!(pid = self.pid, "Unit receive loop finished");
    }

    async fn run_generation(&self, init: InitCommand) -> Flow {
        let InitCommand {
            argv,
            program_image,
            generation,
        } = init;

        let program = match self.loader.instantiate(&program_image, &argv) {
            Ok(program) => program,
            Err(e) => {
                warn!(pid = self.pid, generation, error = %e, "Instantiation failed");
                return self.report_halt(generation, ExitStatus::InstantiationFailed(e.to_string()));
            }
        };

        let client = SyscallClient::new(
            self.pid,
            self.ids.clone(),
            self.endpoint.sender(),
            self.client_config,
        );
        if self.endpoint.send(&ToKernel::Started { generation }).is_err() {
            return Flow::Stop;
        }

        let ctx = ProcessContext {
            pid: self.pid,
            argv,
            generation,
            sys: client.clone(),
        };
        let mut run = AssertUnwindSafe(program.run(ctx)).catch_unwind();

        let (status, flow) = loop {
            tokio::select! {
                outcome = &mut run => {
                    let status = match outcome {
                        Ok(Ok(())) => ExitStatus::Exited,
                        Ok(Err(e)) => ExitStatus::Failed(e.to_string()),
                        Err(panic) => ExitStatus::Failed(panic_message(panic.as_ref())),
                    };
                    break (status, Flow::AwaitInit);
                }
                frame = self.endpoint.recv() => match frame {
                    Some(ToProcess::Reply(reply)) => {
                        client.complete(reply);
                    }
                    Some(ToProcess::Init(_)) => {
                        warn!(pid = self.pid, generation, "Ignoring init while a program is running");
                    }
                    Some(ToProcess::Shutdown) | None => break (ExitStatus::Shutdown, Flow::Stop),
                },
            }
        };
        drop(run);

        let abandoned = client.fail_all(SyscallError::ProcessTerminated);
        if abandoned > 0 {
            debug!(pid = self.pid, generation, abandoned, "Failed outstanding syscalls of halted run");
        }

        info!(pid = self.pid, generation, status = %status, "Program halted");
        match (self.report_halt(generation, status), flow) {
            (Flow::Stop, _) | (_, Flow::Stop) => Flow::Stop,
            _ => Flow::AwaitInit,
        }
    }

    fn report_halt(&self, generation: Generation, status: ExitStatus) -> Flow {
        match self.endpoint.send(&ToKernel::Halted { generation, status }) {
            Ok(()) => Flow::AwaitInit,
            Err(_) => Flow::Stop,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
