// src/launch.rs

//! Brings up a process group and runs one render across it.
//!
//! The coordinator always runs on the calling thread. Workers are either
//! forked child processes joined by Unix socket pairs, or scoped threads
//! joined by in-memory queues. Both paths speak the same protocol; only the
//! [`Channel`](crate::transport::Channel) implementation differs.

use crate::config::{ConfigError, RunConfig, TransportKind};
use crate::coordinator::{self, RenderReport};
use crate::error::{RenderError, Result};
use crate::shade::Shader;
use crate::transport::socket::{self, SocketChannel};
use crate::transport::LocalChannel;
use crate::worker;

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::os::unix::net::UnixStream;
use std::panic::{self, AssertUnwindSafe};

const EXIT_OK: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_PANICKED: i32 = 101;

/// Runs the render with the chosen transport.
pub fn run<S>(config: &RunConfig, shader: &S, transport: TransportKind) -> Result<RenderReport>
where
    S: Shader + Sync + ?Sized,
{
    match transport {
        TransportKind::Processes => run_in_processes(config, shader),
        TransportKind::Threads => run_in_threads(config, shader),
    }
}

/// Forks one worker process per non-coordinator rank and coordinates them
/// from the calling process.
///
/// Each child inherits the shader by copy-on-write, runs the worker loop over
/// its end of a socket pair, and leaves with `_exit` so nothing of the
/// parent's state (buffered output, destructors, test harness) runs twice.
///
/// Call this while the calling thread is the only thread in the process.
/// The children allocate and log after `fork`; a lock held by another thread
/// at fork time (allocator, logger, stdio) would never be released in them.
/// Hosts that already run other threads should use [`run_in_threads`].
pub fn run_in_processes<S>(config: &RunConfig, shader: &S) -> Result<RenderReport>
where
    S: Shader + ?Sized,
{
    if !config.is_coordinator() {
        return Err(ConfigError::WrongRole {
            rank: config.rank(),
            role: "the launcher",
        }
        .into());
    }
    let size = config.process_count();
    let mut peers: Vec<Option<UnixStream>> = vec![None];
    let mut children = WorkerProcesses::default();

    for rank in 1..size {
        let worker_config = config.with_rank(rank)?;
        let (coordinator_side, worker_side) =
            socket::stream_pair().map_err(|e| RenderError::Launch {
                rank,
                detail: format!("{:#}", e),
            })?;

        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                drop(worker_side);
                log::debug!("Forked worker rank {} as PID {}", rank, child);
                peers.push(Some(coordinator_side));
                children.push(rank, child);
            }
            Ok(ForkResult::Child) => {
                // Close every descriptor that belongs to the coordinator and
                // never reap siblings from here.
                drop(coordinator_side);
                drop(peers);
                std::mem::forget(children);
                let code = worker_process_main(&worker_config, worker_side, shader);
                unsafe { libc::_exit(code) }
            }
            Err(e) => {
                return Err(RenderError::Launch {
                    rank,
                    detail: format!("fork failed: {}", e),
                });
            }
        }
    }

    let mut channel = SocketChannel::new(config.rank(), size, peers);
    let result = coordinator::run(config, &mut channel, shader);
    // Closing our ends lets workers blocked on a dead coordinator see EOF.
    drop(channel);

    let worker_failures = children
        .wait_all()
        .into_iter()
        .filter_map(Result::err)
        .collect();
    settle(result, worker_failures)
}

fn worker_process_main<S>(config: &RunConfig, stream: UnixStream, shader: &S) -> i32
where
    S: Shader + ?Sized,
{
    let rank = config.rank();
    log::info!("Worker {} PID: {}", rank, std::process::id());

    let mut peers: Vec<Option<UnixStream>> = (0..config.process_count()).map(|_| None).collect();
    peers[crate::config::COORDINATOR_RANK] = Some(stream);
    let mut channel = SocketChannel::new(rank, config.process_count(), peers);

    match panic::catch_unwind(AssertUnwindSafe(|| worker::run(config, &mut channel, shader))) {
        Ok(Ok(summary)) => {
            log::debug!("Worker {} finished: {:?}", rank, summary);
            EXIT_OK
        }
        Ok(Err(e)) => {
            log::error!("Worker {} failed: {}", rank, e);
            EXIT_FAILED
        }
        Err(_) => {
            log::error!("Worker {} panicked", rank);
            EXIT_PANICKED
        }
    }
}

/// Child processes still owned by the coordinator.
#[derive(Debug, Default)]
struct WorkerProcesses {
    children: Vec<(usize, Pid)>,
}

impl WorkerProcesses {
    fn push(&mut self, rank: usize, pid: Pid) {
        self.children.push((rank, pid));
    }

    /// Blocks until every child has exited, in rank order.
    fn wait_all(&mut self) -> Vec<Result<()>> {
        self.children
            .drain(..)
            .map(|(rank, pid)| match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, EXIT_OK)) => {
                    log::debug!("Worker rank {} (PID {}) exited cleanly", rank, pid);
                    Ok(())
                }
                Ok(WaitStatus::Exited(_, code)) => Err(RenderError::Launch {
                    rank,
                    detail: format!("PID {} exited with status {}", pid, code),
                }),
                Ok(WaitStatus::Signaled(_, signal, _)) => Err(RenderError::Launch {
                    rank,
                    detail: format!("PID {} was killed by {:?}", pid, signal),
                }),
                Ok(other) => Err(RenderError::Launch {
                    rank,
                    detail: format!("PID {} changed state unexpectedly: {:?}", pid, other),
                }),
                Err(e) => Err(RenderError::Launch {
                    rank,
                    detail: format!("waitpid on PID {} failed: {}", pid, e),
                }),
            })
            .collect()
    }
}

impl Drop for WorkerProcesses {
    fn drop(&mut self) {
        for (rank, pid) in self.children.drain(..) {
            log::warn!("Killing worker rank {} (PID {}) left running", rank, pid);
            if let Err(e) = kill(pid, Some(Signal::SIGKILL)) {
                if !matches!(e, nix::Error::ESRCH) {
                    log::warn!("Failed to send SIGKILL to PID {}: {}", pid, e);
                }
            }
            if let Err(e) = waitpid(pid, None) {
                log::debug!("waitpid on PID {} after SIGKILL: {}", pid, e);
            }
        }
    }
}

/// Runs every worker rank on its own scoped thread over an in-memory mesh.
pub fn run_in_threads<S>(config: &RunConfig, shader: &S) -> Result<RenderReport>
where
    S: Shader + Sync + ?Sized,
{
    if !config.is_coordinator() {
        return Err(ConfigError::WrongRole {
            rank: config.rank(),
            role: "the launcher",
        }
        .into());
    }
    let mut mesh = LocalChannel::mesh(config.process_count());
    let worker_ends = mesh.split_off(1);
    let mut coordinator_end = mesh.pop().ok_or(ConfigError::NoProcesses)?;
    let worker_configs = (1..config.process_count())
        .map(|rank| config.with_rank(rank))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    std::thread::scope(|scope| {
        let handles: Vec<_> = worker_ends
            .into_iter()
            .zip(worker_configs.iter())
            .map(|(mut endpoint, worker_config)| {
                scope.spawn(move || worker::run(worker_config, &mut endpoint, shader))
            })
            .collect();

        let result = coordinator::run(config, &mut coordinator_end, shader);
        drop(coordinator_end);

        let mut worker_failures = Vec::new();
        for (index, handle) in handles.into_iter().enumerate() {
            let rank = index + 1;
            let outcome = match handle.join() {
                Ok(outcome) => outcome.map(|summary| {
                    log::debug!("Worker thread {} finished: {:?}", rank, summary);
                }),
                Err(_) => Err(RenderError::Launch {
                    rank,
                    detail: "worker thread panicked".to_string(),
                }),
            };
            if let Err(e) = outcome {
                log::error!("Worker {} failed: {}", rank, e);
                worker_failures.push(e);
            }
        }
        settle(result, worker_failures)
    })
}

/// Picks the error to surface when both sides may have failed.
///
/// Once the coordinator gives up it closes every channel, so healthy workers
/// still waiting for `Exit` fail as well. Only the worker the coordinator
/// blamed can hold the root cause: a coordinator transport error against rank
/// `r` yields rank `r`'s own failure when there is one, and every other
/// coordinator error is reported as is.
fn settle(
    result: Result<RenderReport>,
    worker_failures: Vec<RenderError>,
) -> Result<RenderReport> {
    match result {
        Ok(report) => match worker_failures.into_iter().next() {
            None => Ok(report),
            Some(worker_err) => Err(worker_err),
        },
        Err(RenderError::Transport {
            rank,
            phase,
            source,
        }) => match worker_failures
            .into_iter()
            .find(|failure| failure.rank() == Some(rank))
        {
            Some(worker_err) => {
                log::debug!(
                    "Coordinator transport error (rank {}, {}: {}) superseded by the worker's own failure",
                    rank,
                    phase,
                    source
                );
                Err(worker_err)
            }
            None => Err(RenderError::Transport {
                rank,
                phase,
                source,
            }),
        },
        Err(e) => Err(e),
    }
}
