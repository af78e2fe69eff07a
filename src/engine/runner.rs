use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::{SynthesisEngine, SynthesisError};
use crate::core::params::SynthesisParams;
use crate::core::period::{ANCHOR_DAY, PeriodKeyResolver};
use crate::core::scheduler::WorkItem;
use crate::error::Result;
use crate::io::archive::OutputIndexer;
use crate::types::{PeriodKey, Tile};

/// Cooperative stop request, checked between work items.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A work item the engine completed, with the products recognized for its period.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub tile: Tile,
    pub period: PeriodKey,
    pub products: Vec<PathBuf>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub tile: Tile,
    pub period: PeriodKey,
    pub error: SynthesisError,
}

/// End-of-batch report
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub discovered: usize,
    pub outcomes: Vec<SynthesisOutcome>,
    pub failures: Vec<ItemFailure>,
    /// Items left unprocessed because the batch was stopped
    pub skipped: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn log(&self) {
        info!("Synthesis batch complete!");
        info!("Discovered: {}", self.discovered);
        info!("Succeeded: {}", self.succeeded());
        info!("Failed: {}", self.failed());
        info!("Skipped: {}", self.skipped);
        for failure in &self.failures {
            warn!("  {}/{}: {}", failure.tile, failure.period, failure.error);
        }
    }
}

/// Drives a [`SynthesisEngine`] over work items, one at a time.
pub struct SynthesisRunner<E> {
    engine: E,
    params: SynthesisParams,
    resolver: PeriodKeyResolver,
    cancel: CancelToken,
    stop_file: Option<PathBuf>,
}

impl<E: SynthesisEngine> SynthesisRunner<E> {
    /// Fails if `params` does not validate.
    pub fn new(engine: E, params: SynthesisParams, resolver: PeriodKeyResolver) -> Result<Self> {
        Ok(Self {
            engine,
            params: params.validated()?,
            resolver,
            cancel: CancelToken::new(),
            stop_file: None,
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stop the batch once this file exists.
    pub fn with_stop_file(mut self, path: Option<PathBuf>) -> Self {
        self.stop_file = path;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn stop_requested(&self) -> bool {
        self.cancel.is_cancelled() || self.stop_file.as_ref().is_some_and(|p| p.exists())
    }

    /// Parameters for one invocation: the configured options plus the item's
    /// synthesis date and scratch directory.
    pub fn materialize(&self, item: &WorkItem) -> std::result::Result<SynthesisParams, SynthesisError> {
        let mut params = self.params.clone();

        match params.date {
            // A product dated outside the item's period would never close its gap.
            Some(date) if self.resolver.resolve_date(date) != Some(item.period) => {
                return Err(SynthesisError::DateOutsidePeriod {
                    date,
                    period: item.period,
                });
            }
            Some(_) => {}
            None => {
                let date = self
                    .resolver
                    .anchor_date(item.period, ANCHOR_DAY)
                    .ok_or_else(|| {
                        SynthesisError::Engine(format!(
                            "no synthesis date for period {}",
                            item.period
                        ))
                    })?;
                params.date = Some(date);
            }
        }

        let temp_root = self
            .params
            .temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("synthpro"));
        params.temp_dir = Some(
            temp_root
                .join(item.tile.as_str())
                .join(item.period.to_string()),
        );
        Ok(params)
    }

    /// Synthesize one item and confirm a product for its period now exists.
    pub fn run(&self, item: &WorkItem) -> std::result::Result<SynthesisOutcome, SynthesisError> {
        let started = Instant::now();
        let params = self.materialize(item)?;

        fs::create_dir_all(&item.output_dir).map_err(|e| SynthesisError::io(&item.output_dir, e))?;
        if let Some(temp) = &params.temp_dir {
            fs::create_dir_all(temp).map_err(|e| SynthesisError::io(temp, e))?;
        }

        let before = self.period_products(item)?;
        if let Err(error) = self.engine.run(item, &params) {
            self.discard_partial(item, &before);
            return Err(error);
        }

        let products: Vec<PathBuf> = self.period_products(item)?.into_iter().collect();
        if products.is_empty() {
            return Err(SynthesisError::NoOutput {
                period: item.period,
                dir: item.output_dir.clone(),
            });
        }

        Ok(SynthesisOutcome {
            tile: item.tile.clone(),
            period: item.period,
            products,
            elapsed: started.elapsed(),
        })
    }

    /// Product directories for the item's period currently in its output directory.
    fn period_products(
        &self,
        item: &WorkItem,
    ) -> std::result::Result<BTreeSet<PathBuf>, SynthesisError> {
        Ok(OutputIndexer::new(self.resolver)
            .products_in(&item.output_dir)
            .map_err(|e| SynthesisError::io(&item.output_dir, e))?
            .into_iter()
            .filter(|p| p.period == item.period)
            .map(|p| p.path)
            .collect())
    }

    /// Remove products a failed invocation left behind, so the period stays a gap.
    fn discard_partial(&self, item: &WorkItem, before: &BTreeSet<PathBuf>) {
        let after = match self.period_products(item) {
            Ok(after) => after,
            Err(e) => {
                warn!("Could not check {:?} for partial output: {}", item.output_dir, e);
                return;
            }
        };
        for partial in after.difference(before) {
            warn!("Removing partial product {:?}", partial);
            if let Err(e) = fs::remove_dir_all(partial) {
                warn!("Could not remove {:?}: {}", partial, e);
            }
        }
    }

    /// Run every item in order. Failures are recorded and the batch continues;
    /// a stop request ends it after the running item.
    pub fn run_batch(&self, items: &[WorkItem]) -> BatchSummary {
        let mut summary = BatchSummary {
            discovered: items.len(),
            ..Default::default()
        };

        if let Some(date) = self.params.date {
            let periods: BTreeSet<PeriodKey> = items.iter().map(|item| item.period).collect();
            if periods.len() > 1 {
                warn!(
                    "Fixed synthesis date {} can serve at most one of {} scheduled periods; the other items will fail",
                    date.format("%Y%m%d"),
                    periods.len()
                );
            }
        }

        for (i, item) in items.iter().enumerate() {
            if self.stop_requested() {
                summary.cancelled = true;
                summary.skipped = items.len() - i;
                warn!("Stop requested; skipping {} remaining items", summary.skipped);
                break;
            }

            info!("[{}/{}] Synthesizing {}", i + 1, items.len(), item);
            match self.run(item) {
                Ok(outcome) => {
                    info!(
                        "Successfully synthesized {}/{} in {:.1}s",
                        item.tile,
                        item.period,
                        outcome.elapsed.as_secs_f64()
                    );
                    summary.outcomes.push(outcome);
                }
                Err(error) => {
                    warn!("Synthesis failed for {}: {}", item, error);
                    summary.failures.push(ItemFailure {
                        tile: item.tile.clone(),
                        period: item.period,
                        error,
                    });
                }
            }
        }

        summary
    }
}
