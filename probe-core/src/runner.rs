//! Wave-barrier scheduling of scenario executions.
//!
//! Scenarios are split, in enumeration order, into waves of at most
//! `concurrency` scenarios. Every scenario of a wave runs as its own task
//! on the multi-threaded runtime; the next wave starts only after the
//! whole wave has drained. A failing or panicking scenario settles as
//! Failed inside its own task and never disturbs its siblings.

use crate::ledger::{LedgerError, LedgerSnapshot, OutcomeLedger};
use crate::placement::is_placeable;
use async_trait::async_trait;
use futures_util::FutureExt;
use probe_types::{ProbeError, Scenario};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Scenarios in flight at once unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Runs one scenario end to end.
///
/// `Ok` means verified. [`ProbeError::InsufficientCapacity`] settles the
/// scenario as Skipped; any other error settles it as Failed.
#[async_trait]
pub trait ScenarioExecutor: Send + Sync + 'static {
    /// Execute `scenario`.
    async fn execute(&self, scenario: &Scenario) -> Result<(), ProbeError>;
}

/// Bounded-concurrency runner.
#[derive(Debug, Clone)]
pub struct ConcurrentRunner {
    concurrency: usize,
    available_locations: Option<usize>,
}

impl Default for ConcurrentRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl ConcurrentRunner {
    /// Runner with at most `concurrency` scenarios in flight (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            available_locations: None,
        }
    }

    /// Skip, before scheduling, scenarios needing more distinct locations
    /// than the cluster has.
    pub fn with_available_locations(mut self, locations: usize) -> Self {
        self.available_locations = Some(locations);
        self
    }

    /// Concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Split `scenarios` into waves, preserving order.
    pub fn plan_waves(&self, scenarios: &[Scenario]) -> Vec<Vec<Scenario>> {
        scenarios
            .chunks(self.concurrency)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Execute every scenario and return the final partition.
    ///
    /// The returned snapshot has no pending scenarios.
    pub async fn run<E: ScenarioExecutor>(
        &self,
        scenarios: Vec<Scenario>,
        executor: Arc<E>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        let ledger = Arc::new(OutcomeLedger::new(scenarios.iter().cloned())?);

        let mut schedulable = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            match self.available_locations {
                Some(available) if !is_placeable(&scenario, available) => {
                    let reason = ProbeError::InsufficientCapacity {
                        required: scenario.required_locations(),
                        available,
                    };
                    ledger.mark_skipped(scenario.index(), reason)?;
                }
                _ => schedulable.push(scenario),
            }
        }

        let waves = self.plan_waves(&schedulable);
        let total_waves = waves.len();

        for (wave_no, wave) in waves.into_iter().enumerate() {
            tracing::debug!(wave = wave_no + 1, total_waves, size = wave.len(), "starting wave");

            let mut tasks = JoinSet::new();
            for scenario in wave {
                let ledger = Arc::clone(&ledger);
                let executor = Arc::clone(&executor);
                tasks.spawn(async move { execute_unit(&*executor, &ledger, scenario).await });
            }

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("scenario task did not complete: {}", e);
                }
            }
        }

        // A task that vanished without settling (runtime shutdown) must not
        // leave its scenario pending.
        for scenario in ledger.snapshot().pending {
            ledger.mark_failed(scenario.index(), "scenario task ended without an outcome")?;
        }

        Ok(ledger.snapshot())
    }
}

async fn execute_unit<E: ScenarioExecutor + ?Sized>(
    executor: &E,
    ledger: &OutcomeLedger,
    scenario: Scenario,
) {
    tracing::info!(index = scenario.index(), state = "START", "VIP_TEST START {}", scenario);

    let result = AssertUnwindSafe(executor.execute(&scenario))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            Err(ProbeError::ProbeUnreachable(
                "scenario execution panicked".into(),
            ))
        });

    if let Err(e) = ledger.record(scenario.index(), result) {
        tracing::error!(index = scenario.index(), "ledger rejected transition: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::ScenarioEnumerator;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn scenarios(n: usize) -> Vec<Scenario> {
        ScenarioEnumerator::default()
            .enumerate()
            .into_iter()
            .take(n)
            .collect()
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Start(usize),
        Finish(usize),
    }

    /// Records start/finish order and the peak number of scenarios in flight.
    #[derive(Default)]
    struct RecordingExecutor {
        events: Mutex<Vec<Event>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ScenarioExecutor for RecordingExecutor {
        async fn execute(&self, scenario: &Scenario) -> Result<(), ProbeError> {
            self.events.lock().unwrap().push(Event::Start(scenario.index()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            // Vary durations so a missing barrier would interleave waves.
            let ms = 5 + (scenario.index() * 7) % 20;
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(Event::Finish(scenario.index()));
            Ok(())
        }
    }

    /// Fails every third scenario, panics on index 4.
    struct FlakyExecutor;

    #[async_trait]
    impl ScenarioExecutor for FlakyExecutor {
        async fn execute(&self, scenario: &Scenario) -> Result<(), ProbeError> {
            if scenario.index() == 4 {
                panic!("boom");
            }
            if scenario.index() % 3 == 0 {
                return Err(ProbeError::RoutingMismatch {
                    expected: "a".into(),
                    actual: "b".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn twenty_scenarios_make_three_waves() {
        let runner = ConcurrentRunner::new(8);
        let waves = runner.plan_waves(&scenarios(20));
        let sizes: Vec<usize> = waves.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![8, 8, 4]);
        assert_eq!(waves[1][0].index(), 8);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        assert_eq!(ConcurrentRunner::new(0).concurrency(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waves_are_separated_by_barriers() {
        let executor = Arc::new(RecordingExecutor::default());
        let runner = ConcurrentRunner::new(8);

        let snap = runner
            .run(scenarios(20), Arc::clone(&executor))
            .await
            .unwrap();
        assert_eq!(snap.passed.len(), 20);

        let events = executor.events.lock().unwrap().clone();
        let wave_of = |i: usize| i / 8;
        for (pos, event) in events.iter().enumerate() {
            if let Event::Start(i) = *event {
                // Every scenario of earlier waves has finished before this start.
                let finished: HashSet<usize> = events[..pos]
                    .iter()
                    .filter_map(|e| match e {
                        Event::Finish(j) => Some(*j),
                        _ => None,
                    })
                    .collect();
                for j in 0..20 {
                    if wave_of(j) < wave_of(i) {
                        assert!(finished.contains(&j), "scenario {} started before {} finished", i, j);
                    }
                }
            }
        }
        assert!(executor.peak.load(Ordering::SeqCst) <= 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failures_and_panics_are_isolated() {
        let snap = ConcurrentRunner::new(8)
            .run(scenarios(12), Arc::new(FlakyExecutor))
            .await
            .unwrap();

        assert!(snap.pending.is_empty());
        assert_eq!(snap.total(), 12);

        let failed: Vec<usize> = snap.failed.iter().map(|(s, _)| s.index()).collect();
        assert_eq!(failed, vec![0, 3, 4, 6, 9]);
        assert!(snap.failed[2].1.contains("panicked"));
        assert_eq!(snap.passed.len(), 7);
    }

    #[tokio::test]
    async fn split_scenarios_skip_on_single_location() {
        let executor = Arc::new(RecordingExecutor::default());
        let all = ScenarioEnumerator::default().enumerate();
        let snap = ConcurrentRunner::new(8)
            .with_available_locations(1)
            .run(all, Arc::clone(&executor))
            .await
            .unwrap();

        assert_eq!(snap.skipped.len(), 18);
        assert!(snap.skipped.iter().all(|(s, _)| !s.co_located()));
        assert_eq!(snap.passed.len(), 18);
        assert!(snap.failed.is_empty());

        let started: HashSet<usize> = executor
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Start(i) => Some(*i),
                _ => None,
            })
            .collect();
        assert!(snap.skipped.iter().all(|(s, _)| !started.contains(&s.index())));
    }

    #[tokio::test]
    async fn capacity_error_from_executor_skips() {
        struct NoRoom;

        #[async_trait]
        impl ScenarioExecutor for NoRoom {
            async fn execute(&self, scenario: &Scenario) -> Result<(), ProbeError> {
                Err(ProbeError::InsufficientCapacity {
                    required: scenario.required_locations(),
                    available: 0,
                })
            }
        }

        let snap = ConcurrentRunner::default()
            .run(scenarios(3), Arc::new(NoRoom))
            .await
            .unwrap();
        assert_eq!(snap.skipped.len(), 3);
        assert!(snap.failed.is_empty());
    }
}
