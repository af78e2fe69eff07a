//! High-level library API: plan a batch (index L2, compute gaps), run it through
//! a synthesis engine, then assemble, package and optionally upload composites.
//! Prefer these entrypoints over wiring the indexers and runner by hand.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::catalog::{CatalogUploader, UploadMetadata};
use crate::composite::{AssemblyOutcome, CompositeAssembler, CompositeOptions, CompositeProduct};
use crate::core::params::SynthesisParams;
use crate::core::period::PeriodKeyResolver;
use crate::core::scheduler::{GapScheduler, WorkItem};
use crate::engine::{BatchSummary, CancelToken, SynthesisEngine, SynthesisRunner};
use crate::error::Result;
use crate::io::archive::{L2Index, OutputIndexer, ProductIndexer, SkippedEntry};
use crate::types::{Calendar, Tile};

/// Indexed inputs and the work items still missing an output.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub index: L2Index,
    pub items: Vec<WorkItem>,
}

/// Index `l2_root` and schedule every (tile, period) without an L3 product.
pub fn plan_batch(l2_root: &Path, l3_root: &Path, calendar: Calendar) -> Result<BatchPlan> {
    let resolver = PeriodKeyResolver::new(calendar);
    let index = ProductIndexer::new(resolver).index(l2_root)?;
    info!(
        "Indexed {} descriptors across {} tiles ({} skipped)",
        index.descriptor_count(),
        index.tiles().count(),
        index.skipped().len()
    );
    let items = GapScheduler::new(OutputIndexer::new(resolver)).compute_work_items(&index, l3_root)?;
    Ok(BatchPlan { index, items })
}

/// Where and how composites are produced.
#[derive(Debug, Clone)]
pub struct CompositeConfig {
    pub nrgb_root: PathBuf,
    pub options: CompositeOptions,
}

#[derive(Debug, Clone)]
pub struct ProductFailure {
    pub product: PathBuf,
    pub reason: String,
}

/// Composite stage report
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub packaged: usize,
    pub already_packaged: usize,
    pub without_masks: usize,
    pub uploaded: usize,
    pub failures: Vec<ProductFailure>,
}

impl PublishReport {
    pub fn log(&self) {
        info!("Composite stage complete!");
        info!("Packaged: {}", self.packaged);
        info!("Already packaged: {}", self.already_packaged);
        info!("Without masks: {}", self.without_masks);
        info!("Uploaded: {}", self.uploaded);
        info!("Failed: {}", self.failures.len());
        for failure in &self.failures {
            warn!("  {:?}: {}", failure.product, failure.reason);
        }
    }
}

/// Upload a packaged composite. On failure the zip is removed, so the next
/// run packages and uploads the product again.
pub fn upload_composite(uploader: &dyn CatalogUploader, composite: &CompositeProduct) -> Result<()> {
    let metadata = UploadMetadata::for_composite(composite);
    uploader.upload(&composite.zip_path, &metadata).inspect_err(|e| {
        warn!("Upload failed for {:?}: {}", composite.zip_path, e);
        if let Err(rm) = fs::remove_file(&composite.zip_path) {
            warn!("Could not remove {:?}: {}", composite.zip_path, rm);
        }
    })
}

/// Assemble and package a composite for every L3 product of `tiles`, uploading
/// each new package when `uploader` is given. A package whose upload fails is
/// removed so the next run builds and uploads it again.
pub fn publish_composites<'a, I>(
    l3_root: &Path,
    tiles: I,
    calendar: Calendar,
    assembler: &CompositeAssembler,
    uploader: Option<&dyn CatalogUploader>,
) -> Result<PublishReport>
where
    I: IntoIterator<Item = &'a Tile>,
{
    let outputs = OutputIndexer::new(PeriodKeyResolver::new(calendar));
    let mut report = PublishReport::default();

    for tile in tiles {
        for product in outputs.products(l3_root, tile)? {
            let composite = match assembler.assemble(tile, &product) {
                Ok(AssemblyOutcome::Packaged(composite)) => composite,
                Ok(AssemblyOutcome::AlreadyPackaged(_)) => {
                    report.already_packaged += 1;
                    continue;
                }
                Ok(AssemblyOutcome::NoMasks) => {
                    report.without_masks += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Composite failed for {:?}: {}", product.path, e);
                    report.failures.push(ProductFailure {
                        product: product.path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            report.packaged += 1;

            let Some(uploader) = uploader else { continue };
            match upload_composite(uploader, &composite) {
                Ok(()) => report.uploaded += 1,
                Err(e) => report.failures.push(ProductFailure {
                    product: product.path,
                    reason: e.to_string(),
                }),
            }
        }
    }

    Ok(report)
}

/// Everything a full batch run needs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub l2_root: PathBuf,
    pub l3_root: PathBuf,
    pub calendar: Calendar,
    pub params: SynthesisParams,
    pub stop_file: Option<PathBuf>,
    /// Composite stage; skipped when `None`
    pub composite: Option<CompositeConfig>,
}

/// Full run report
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Index entries skipped for malformed names or read errors
    pub malformed: Vec<SkippedEntry>,
    pub synthesis: BatchSummary,
    pub publish: Option<PublishReport>,
}

impl BatchReport {
    pub fn log(&self) {
        if !self.malformed.is_empty() {
            warn!("Skipped {} malformed index entries", self.malformed.len());
        }
        self.synthesis.log();
        if let Some(publish) = &self.publish {
            publish.log();
        }
    }
}

/// Plan, synthesize and publish. Archive-root errors and invalid parameters
/// abort; per-item and per-product failures are collected in the report.
/// The composite stage does not run after a stop request.
pub fn run_batch<E: SynthesisEngine>(
    config: &BatchConfig,
    engine: E,
    cancel: CancelToken,
    uploader: Option<&dyn CatalogUploader>,
) -> Result<BatchReport> {
    let plan = plan_batch(&config.l2_root, &config.l3_root, config.calendar)?;
    let runner = SynthesisRunner::new(
        engine,
        config.params.clone(),
        PeriodKeyResolver::new(config.calendar),
    )?
    .with_cancel_token(cancel)
    .with_stop_file(config.stop_file.clone());

    let synthesis = runner.run_batch(&plan.items);

    let publish = match &config.composite {
        Some(composite) if !synthesis.cancelled => {
            let assembler =
                CompositeAssembler::new(&composite.nrgb_root, composite.options.clone());
            Some(publish_composites(
                &config.l3_root,
                plan.index.tiles(),
                config.calendar,
                &assembler,
                uploader,
            )?)
        }
        _ => None,
    };

    Ok(BatchReport {
        malformed: plan.index.skipped().to_vec(),
        synthesis,
        publish,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::SyntheticProductName;
    use crate::error::Error;
    use std::cell::RefCell;

    fn packaged(dir: &Path) -> CompositeProduct {
        let name =
            SyntheticProductName::parse("SENTINEL2X_20240501-000000-000_L3A_T01_C_1.0").unwrap();
        let zip_path = dir.join(name.zip_name());
        fs::write(&zip_path, b"PK").unwrap();
        CompositeProduct {
            period: name.period,
            tile: Tile::new("T01"),
            tif_path: dir.join(name.tif_name()),
            zip_path,
            name,
        }
    }

    #[test]
    fn successful_upload_keeps_the_package() {
        let dir = tempfile::tempdir().unwrap();
        let composite = packaged(dir.path());
        let sent = RefCell::new(Vec::new());
        let uploader = |_: &Path, m: &UploadMetadata| -> Result<()> {
            sent.borrow_mut().push(m.clone());
            Ok(())
        };

        upload_composite(&uploader, &composite).unwrap();

        assert!(composite.zip_path.exists());
        assert_eq!(
            sent.into_inner(),
            vec![UploadMetadata {
                year: 2024,
                month: 5,
                scene_name: "T01".to_string(),
            }]
        );
    }

    #[test]
    fn failed_upload_discards_the_package() {
        let dir = tempfile::tempdir().unwrap();
        let composite = packaged(dir.path());
        let uploader =
            |_: &Path, _: &UploadMetadata| -> Result<()> { Err(Error::upload("HTTP 502")) };

        let err = upload_composite(&uploader, &composite).unwrap_err();

        assert!(matches!(err, Error::Upload(_)));
        assert!(!composite.zip_path.exists());
    }
}
