//! Gap detection between the L2 archive and the L3 outputs.
//!
//! A (tile, period) pair becomes a [`WorkItem`] iff the L2 index has
//! descriptors for it and no L3 product of that period exists on disk. Nothing is
//! persisted between runs: an item whose synthesis wrote no recognizable product
//! is simply scheduled again by the next scan.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::io::archive::{L2Index, OutputIndexer};
use crate::types::{PeriodKey, Tile};

/// One synthesis task: all descriptors of a tile/period and where the product goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub tile: Tile,
    pub period: PeriodKey,
    pub inputs: Vec<PathBuf>,
    /// The tile's L3 directory; the engine writes one product directory into it.
    pub output_dir: PathBuf,
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({} inputs)", self.tile, self.period, self.inputs.len())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GapScheduler {
    outputs: OutputIndexer,
}

impl GapScheduler {
    pub fn new(outputs: OutputIndexer) -> Self {
        Self { outputs }
    }

    /// Work items for every indexed (tile, period) without an L3 product, in
    /// index order. The L3 directory of each tile is scanned once.
    pub fn compute_work_items(&self, l2_index: &L2Index, l3_root: &Path) -> Result<Vec<WorkItem>> {
        let mut items = Vec::new();

        for (tile, periods) in l2_index.iter() {
            let done: BTreeSet<PeriodKey> = self.outputs.index(l3_root, tile)?;
            let output_dir = OutputIndexer::tile_dir(l3_root, tile);

            for (period, descriptors) in periods {
                if done.contains(period) {
                    debug!("{}/{} already synthesized", tile, period);
                    continue;
                }
                items.push(WorkItem {
                    tile: tile.clone(),
                    period: *period,
                    inputs: descriptors.iter().cloned().collect(),
                    output_dir: output_dir.clone(),
                });
            }
        }

        info!(
            "Scheduled {} work items over {} tiles",
            items.len(),
            l2_index.tiles().count()
        );
        Ok(items)
    }
}
