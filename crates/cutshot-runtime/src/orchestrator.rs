//! Execution orchestrator: runs a dispatch plan with whole-attempt retry.
//!
//! Each attempt executes every (provider, backend) group and converts the
//! results to counts. A `Missing` job outcome, or an attempt outliving the
//! configured timeout, discards the attempt entirely and starts over; the
//! time it took is added to the retry counter. Any other error is fatal.
//!
//! Sequential mode builds every adapter on the coordinator and joins one
//! blocking task per group. Parallel mode fans out one isolated unit per
//! group that constructs its own adapter and hands its report back over a
//! channel or through the file mailbox; nothing is read before all units
//! have finished. A mailbox attempt that is dropped mid-flight, by the
//! attempt timeout, marks itself abandoned so late artifacts are removed
//! by the unit that wrote them.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cutshot_backend::{AdapterFactory, BackendAdapter, BackendRegistry};
use cutshot_core::{
    BackendId, DispatchItem, DispatchPlan, Error, ExecutionConfig, ExecutionMode, Handoff, Result,
};
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::counting::{results_to_counts, AttemptOutcome};
use crate::mailbox::Mailbox;
use crate::types::{ExecutionOutput, Phase, PhaseTimes, UnitReport};

/// One (provider, backend) group with its resolved factory.
#[derive(Clone)]
struct Unit {
    backend: BackendId,
    factory: AdapterFactory,
    items: Arc<Vec<DispatchItem>>,
}

pub struct Orchestrator {
    registry: Arc<BackendRegistry>,
    config: ExecutionConfig,
    run_id: String,
}

impl Orchestrator {
    pub fn new(registry: Arc<BackendRegistry>, config: ExecutionConfig) -> Self {
        Self {
            registry,
            config,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Use a caller-chosen run id (names mailbox artifacts).
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Execute `plan` until one attempt completes.
    ///
    /// Every backend is resolved before anything runs, so an unsupported
    /// pair fails without dispatching a single shot.
    pub async fn execute(&self, plan: &DispatchPlan) -> Result<ExecutionOutput> {
        let units: Vec<Unit> = self
            .registry
            .resolve_all(plan.backends())?
            .into_iter()
            .map(|(backend, factory)| {
                let items = plan.get(&backend).map(<[_]>::to_vec).unwrap_or_default();
                Unit {
                    backend,
                    factory,
                    items: Arc::new(items),
                }
            })
            .collect();

        info!(
            "Executing {} backend groups ({:?} mode)",
            units.len(),
            self.config.mode
        );

        let limit = self.config.attempt_timeout_secs.map(Duration::from_secs);
        let mut retry_time = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let mut times = PhaseTimes::new();

            let outcome = match limit {
                Some(limit) => {
                    tokio::time::timeout(limit, self.run_attempt(attempt, &units, &mut times)).await
                }
                None => Ok(self.run_attempt(attempt, &units, &mut times).await),
            };
            let lost = started.elapsed();

            match outcome {
                Ok(result) => match result? {
                    AttemptOutcome::Counts(counts) => {
                        times.record(Phase::ExecutionRetries, retry_time);
                        info!(
                            attempt,
                            retry_ms = retry_time.as_millis() as u64,
                            "Execution complete"
                        );
                        return Ok(ExecutionOutput {
                            counts,
                            attempts: attempt,
                            retry_time,
                            times,
                        });
                    }
                    AttemptOutcome::Retry { backend, reason } => {
                        warn!(
                            run_id = %self.run_id,
                            provider = %backend.provider,
                            backend = %backend.backend,
                            attempt,
                            elapsed_ms = lost.as_millis() as u64,
                            "Discarding attempt: {}",
                            reason
                        );
                    }
                },
                Err(_) => {
                    warn!(
                        run_id = %self.run_id,
                        attempt,
                        elapsed_ms = lost.as_millis() as u64,
                        "Discarding attempt: timed out"
                    );
                }
            }

            retry_time += lost;
            if let Some(max) = self.config.max_retries {
                if attempt > max {
                    return Err(Error::RetriesExhausted { attempts: attempt });
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        attempt: u32,
        units: &[Unit],
        times: &mut PhaseTimes,
    ) -> Result<AttemptOutcome> {
        debug!("Starting attempt {}", attempt);
        let reports = match self.config.mode {
            ExecutionMode::Sequential => self.run_sequential(units, times).await?,
            ExecutionMode::Parallel => match self.config.handoff {
                Handoff::Channel => fan_out_channel(units, times).await?,
                Handoff::Mailbox => self.fan_out_mailbox(attempt, units, times).await?,
            },
        };

        let counting = Instant::now();
        let outcome = results_to_counts(reports)?;
        times.record(Phase::Counts, counting.elapsed());
        Ok(outcome)
    }

    async fn run_sequential(&self, units: &[Unit], times: &mut PhaseTimes) -> Result<Vec<UnitReport>> {
        let start = Instant::now();
        let mut adapters = Vec::with_capacity(units.len());
        for unit in units {
            adapters.push((unit.clone(), (unit.factory)(&unit.backend)?));
        }

        let tasks = adapters
            .into_iter()
            .map(|(unit, adapter)| spawn_unit(move || run_unit(adapter, unit.backend, &unit.items)));
        let reports = settle(join_all(tasks).await)?;
        times.record(Phase::Execution, start.elapsed());
        Ok(reports)
    }

    async fn fan_out_mailbox(
        &self,
        attempt: u32,
        units: &[Unit],
        times: &mut PhaseTimes,
    ) -> Result<Vec<UnitReport>> {
        let start = Instant::now();
        let mailbox = Mailbox::open(&self.config.scratch_dir, &self.run_id)?;
        let paths: Vec<PathBuf> = (0..units.len())
            .map(|i| mailbox.artifact_path(attempt, i))
            .collect();

        let mut guard = AttemptGuard {
            mailbox: &mailbox,
            paths: &paths,
            abandoned: Arc::new(AtomicBool::new(false)),
            armed: true,
        };

        let tasks = units.iter().cloned().zip(paths.iter().cloned()).map(|(unit, path)| {
            let abandoned = guard.abandoned.clone();
            spawn_unit(move || -> Result<()> {
                let adapter = (unit.factory)(&unit.backend)?;
                let report = run_unit(adapter, unit.backend, &unit.items)?;
                Mailbox::deposit(&path, &report)?;
                if abandoned.load(Ordering::SeqCst) {
                    Mailbox::withdraw(&path);
                }
                Ok(())
            })
        });
        settle(join_all(tasks).await)?;
        times.record(Phase::Execution, start.elapsed());

        let sync = Instant::now();
        let reports = mailbox.collect(&paths)?;
        guard.armed = false;
        times.record(Phase::Synchronization, sync.elapsed());
        Ok(reports)
    }
}

/// Cleans up a mailbox attempt that did not complete.
///
/// Dropped while armed, it flags still-running units so they withdraw what
/// they deposit late, and removes what was already written.
struct AttemptGuard<'a> {
    mailbox: &'a Mailbox,
    paths: &'a [PathBuf],
    abandoned: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.store(true, Ordering::SeqCst);
            self.mailbox.discard(self.paths);
        }
    }
}

async fn fan_out_channel(units: &[Unit], times: &mut PhaseTimes) -> Result<Vec<UnitReport>> {
    let start = Instant::now();
    let (tx, mut rx) = mpsc::unbounded_channel::<UnitReport>();

    let tasks = units.iter().cloned().map(|unit| {
        let tx = tx.clone();
        spawn_unit(move || -> Result<()> {
            let adapter = (unit.factory)(&unit.backend)?;
            let report = run_unit(adapter, unit.backend, &unit.items)?;
            tx.send(report)
                .map_err(|_| Error::Internal("coordinator stopped listening".into()))
        })
    });
    let joined = join_all(tasks).await;
    drop(tx);
    settle(joined)?;
    times.record(Phase::Execution, start.elapsed());

    let sync = Instant::now();
    let mut reports = Vec::with_capacity(units.len());
    while let Some(report) = rx.recv().await {
        reports.push(report);
    }
    times.record(Phase::Synchronization, sync.elapsed());
    Ok(reports)
}

/// Run `f` on the blocking pool inside the caller's span and subscriber.
fn spawn_unit<T, F>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());
    tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || span.in_scope(f))
    })
}

/// Run one group on its adapter. Blocking.
fn run_unit(
    mut adapter: Box<dyn BackendAdapter>,
    backend: BackendId,
    items: &[DispatchItem],
) -> Result<UnitReport> {
    let start = Instant::now();
    let results = adapter.run(items)?;
    if results.len() != items.len() {
        return Err(Error::Backend(format!(
            "{} returned {} results for {} jobs",
            backend,
            results.len(),
            items.len()
        )));
    }
    debug!(
        provider = %backend.provider,
        backend = %backend.backend,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Unit finished {} jobs",
        items.len()
    );
    Ok(UnitReport {
        bit_order: adapter.bit_order(),
        backend,
        results,
    })
}

/// Join-all barrier result: the first failure wins.
fn settle<T>(joined: Vec<std::result::Result<Result<T>, JoinError>>) -> Result<Vec<T>> {
    joined
        .into_iter()
        .map(|r| {
            r.map_err(|e| Error::Internal(format!("execution unit panicked: {}", e)))
                .and_then(|inner| inner)
        })
        .collect()
}
