//! Ownership of the process-wide sandbox.
//!
//! [`SandboxLifecycle`] holds at most one sandbox. Concurrent callers of
//! [`SandboxLifecycle::acquire`] share a single in-flight boot, a failed boot
//! is forgotten so the next caller retries, and [`SandboxLifecycle::destroy`]
//! tears the sandbox down and returns the manager to its initial state.
//!
//! ```text
//! Uninitialized --acquire--> Booting --ok--> Ready --destroy--> Destroying --> Uninitialized
//!                            Booting --err--> Uninitialized
//!                            Booting --destroy--> Destroying
//! ```
//!
//! An `acquire` that arrives while the manager is `Destroying` waits for the
//! teardown to finish before starting a fresh boot, so two boots never run at
//! once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::Shared;
use tokio::sync::Mutex;

use crate::engine::{BoxFuture, SandboxBooter, SandboxHandle};
use crate::error::{RepoboxError, Result, SandboxError};

type BootOutcome = std::result::Result<SandboxHandle, String>;
type PendingBoot = Shared<BoxFuture<'static, BootOutcome>>;
type PendingTeardown = Shared<BoxFuture<'static, ()>>;

/// Observable state of a [`SandboxLifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// No sandbox exists and no boot is running.
    Uninitialized,
    /// A boot is in flight.
    Booting,
    /// A sandbox is ready for use.
    Ready,
    /// The sandbox (or the boot producing it) is being torn down.
    Destroying,
}

enum State {
    Uninitialized,
    Booting { attempt: u64, pending: PendingBoot },
    Ready(SandboxHandle),
    Destroying { attempt: u64, done: PendingTeardown },
}

impl State {
    const fn phase(&self) -> LifecyclePhase {
        match self {
            Self::Uninitialized => LifecyclePhase::Uninitialized,
            Self::Booting { .. } => LifecyclePhase::Booting,
            Self::Ready(_) => LifecyclePhase::Ready,
            Self::Destroying { .. } => LifecyclePhase::Destroying,
        }
    }
}

enum Wait {
    Boot { attempt: u64, pending: PendingBoot },
    Teardown { attempt: u64, done: PendingTeardown },
}

/// Owns the one sandbox instance shared by the workspace and its shells.
pub struct SandboxLifecycle {
    booter: Arc<dyn SandboxBooter>,
    state: Mutex<State>,
    next_attempt: AtomicU64,
}

impl SandboxLifecycle {
    /// Create a manager that boots sandboxes with `booter`.
    #[must_use]
    pub fn new(booter: Arc<dyn SandboxBooter>) -> Self {
        Self {
            booter,
            state: Mutex::new(State::Uninitialized),
            next_attempt: AtomicU64::new(1),
        }
    }

    /// Return the ready sandbox, booting one if necessary.
    ///
    /// Callers arriving while a boot is in flight wait for that same boot.
    /// Callers arriving during a teardown wait for it to finish, then boot.
    /// The boot runs on its own task, so dropping this future does not cancel
    /// it.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::BootFailed` when the boot fails. The failed
    /// attempt is cleared before returning.
    pub async fn acquire(&self) -> Result<SandboxHandle> {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                match &*state {
                    State::Ready(handle) => return Ok(handle.clone()),
                    State::Booting { attempt, pending } => Wait::Boot {
                        attempt: *attempt,
                        pending: pending.clone(),
                    },
                    State::Destroying { attempt, done } => Wait::Teardown {
                        attempt: *attempt,
                        done: done.clone(),
                    },
                    State::Uninitialized => {
                        let attempt = self.next_attempt();
                        let pending = self.start_boot(attempt);
                        *state = State::Booting {
                            attempt,
                            pending: pending.clone(),
                        };
                        Wait::Boot { attempt, pending }
                    }
                }
            };

            match wait {
                Wait::Boot { attempt, pending } => {
                    let outcome = pending.await;
                    self.settle(attempt, &outcome).await;
                    return outcome
                        .map_err(|message| RepoboxError::from(SandboxError::BootFailed { message }));
                }
                Wait::Teardown { attempt, done } => {
                    done.await;
                    self.finish_teardown(attempt).await;
                }
            }
        }
    }

    /// Tear down the sandbox and return to the uninitialised state.
    ///
    /// A boot in flight is awaited and its sandbox torn down. Teardown
    /// failures are logged, not returned; the manager is reset regardless.
    pub async fn destroy(&self) {
        let (attempt, done) = {
            let mut state = self.state.lock().await;
            let (attempt, done) = match std::mem::replace(&mut *state, State::Uninitialized) {
                State::Uninitialized => {
                    tracing::debug!("destroy requested with no sandbox; nothing to do");
                    return;
                }
                State::Destroying { attempt, done } => (attempt, done),
                State::Ready(handle) => {
                    let attempt = self.next_attempt();
                    let target = async move { Ok::<_, String>(handle) }.boxed();
                    (attempt, start_teardown(attempt, target))
                }
                State::Booting { attempt, pending } => {
                    (attempt, start_teardown(attempt, pending.boxed()))
                }
            };
            *state = State::Destroying {
                attempt,
                done: done.clone(),
            };
            (attempt, done)
        };

        done.await;
        self.finish_teardown(attempt).await;
    }

    /// Return the ready sandbox without booting one.
    pub async fn current(&self) -> Option<SandboxHandle> {
        match &*self.state.lock().await {
            State::Ready(handle) => Some(handle.clone()),
            State::Uninitialized | State::Booting { .. } | State::Destroying { .. } => None,
        }
    }

    /// Return the current lifecycle phase.
    pub async fn phase(&self) -> LifecyclePhase {
        self.state.lock().await.phase()
    }

    fn next_attempt(&self) -> u64 {
        self.next_attempt.fetch_add(1, Ordering::Relaxed)
    }

    fn start_boot(&self, attempt: u64) -> PendingBoot {
        let booter = Arc::clone(&self.booter);
        tracing::info!(attempt, "booting sandbox");
        let task = tokio::spawn(async move {
            booter.boot().await.map_err(|error| error.to_string())
        });

        async move {
            task.await
                .map_err(|error| format!("boot task ended abnormally: {error}"))
                .and_then(|outcome| outcome)
        }
        .boxed()
        .shared()
    }

    async fn settle(&self, attempt: u64, outcome: &BootOutcome) {
        let mut state = self.state.lock().await;
        let is_current =
            matches!(&*state, State::Booting { attempt: current, .. } if *current == attempt);
        if !is_current {
            return;
        }

        match outcome {
            Ok(handle) => {
                tracing::info!(attempt, sandbox_id = %handle.id(), "sandbox ready");
                *state = State::Ready(handle.clone());
            }
            Err(message) => {
                tracing::warn!(attempt, %message, "sandbox boot failed; cleared for retry");
                *state = State::Uninitialized;
            }
        }
    }

    async fn finish_teardown(&self, attempt: u64) {
        let mut state = self.state.lock().await;
        if matches!(&*state, State::Destroying { attempt: current, .. } if *current == attempt) {
            *state = State::Uninitialized;
        }
    }
}

/// Tear down whatever `target` resolves to on a task of its own.
fn start_teardown(attempt: u64, target: BoxFuture<'static, BootOutcome>) -> PendingTeardown {
    let task = tokio::spawn(async move {
        let handle = match target.await {
            Ok(handle) => handle,
            Err(message) => {
                tracing::debug!(attempt, %message, "in-flight boot failed during destroy");
                return;
            }
        };

        match handle.teardown().await {
            Ok(()) => tracing::info!(sandbox_id = %handle.id(), "sandbox destroyed"),
            Err(error) => tracing::warn!(
                sandbox_id = %handle.id(),
                error = %error,
                "sandbox teardown failed; state reset anyway"
            ),
        }
    });

    async move {
        if let Err(error) = task.await {
            tracing::warn!(attempt, error = %error, "teardown task ended abnormally");
        }
    }
    .boxed()
    .shared()
}

impl fmt::Debug for SandboxLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = self.state.try_lock().map(|state| state.phase()).ok();
        f.debug_struct("SandboxLifecycle")
            .field("phase", &phase)
            .finish_non_exhaustive()
    }
}
