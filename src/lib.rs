#![doc = r#"
SYNTHPRO: a batch scheduler for Sentinel-2 L3 temporal syntheses.

This crate indexes an archive of Sentinel-2 L2 products, works out which
(tile, month) syntheses are still missing from the L3 archive, and drives an
external synthesis engine (WASP-style executable) to fill those gaps. Months are
counted in a configurable calendar (Persian by default). Finished L3 products can
then be turned into RGB+NIR composites, zipped, and uploaded to a catalog service.

The scan is the only state: every run rebuilds the L2 index and the per-tile
output sets, so an interrupted or failed item is simply scheduled again.

Requirements
------------
- GDAL development headers and runtime available on your system, plus the
  `gdalwarp` utility on `PATH` for the composite stage.
- Rust 2024 edition toolchain.

Plan a batch (no side effects besides creating L3 tile directories)
--------------------------------------------------------------------
```rust,no_run
use std::path::Path;
use synthpro::{plan_batch, Calendar};

fn main() -> synthpro::Result<()> {
    let plan = plan_batch(
        Path::new("/data/L2A"),
        Path::new("/data/L3A"),
        Calendar::Persian,
    )?;

    for item in &plan.items {
        println!("{item}");
    }
    Ok(())
}
```

Run the engine over the gaps
----------------------------
```rust,no_run
use std::time::Duration;
use synthpro::{
    plan_batch, Calendar, PeriodKeyResolver, ProcessEngine, SynthesisParams, SynthesisRunner,
};

fn main() -> synthpro::Result<()> {
    let plan = plan_batch("/data/L2A".as_ref(), "/data/L3A".as_ref(), Calendar::Persian)?;

    let engine = ProcessEngine::new("/opt/wasp/bin/WASP")
        .with_timeout(Some(Duration::from_secs(6 * 3600)));
    let params = SynthesisParams {
        n_threads: 8,
        cog: true,
        ..Default::default()
    };

    let runner = SynthesisRunner::new(engine, params, PeriodKeyResolver::new(Calendar::Persian))?;
    let summary = runner.run_batch(&plan.items);
    summary.log();
    Ok(())
}
```

Any closure with the right signature is a [`SynthesisEngine`], which makes
in-process engines and test doubles easy:

```rust
use synthpro::{SynthesisError, SynthesisParams, WorkItem};

let engine = |item: &WorkItem, _params: &SynthesisParams| -> Result<(), SynthesisError> {
    println!("would synthesize {item}");
    Ok(())
};
# let _ = engine;
```

Full pipeline with composites and upload
----------------------------------------
```rust,no_run
use synthpro::{
    run_batch, BatchConfig, CancelToken, CatalogClient, CatalogUploader, Calendar,
    CompositeConfig, CompositeOptions, ProcessEngine, SynthesisParams,
};

fn main() -> synthpro::Result<()> {
    let config = BatchConfig {
        l2_root: "/data/L2A".into(),
        l3_root: "/data/L3A".into(),
        calendar: Calendar::Persian,
        params: SynthesisParams::default(),
        stop_file: Some("/tmp/synthpro.stop".into()),
        composite: Some(CompositeConfig {
            nrgb_root: "/data/NRGB".into(),
            options: CompositeOptions::default(),
        }),
    };

    // Logs in on the first upload; a failed login fails uploads, not the run.
    let catalog = CatalogClient::new("https://catalog.example.org/gcms", "ops@example.org", "secret")?;
    let report = run_batch(
        &config,
        ProcessEngine::new("WASP"),
        CancelToken::new(),
        Some(&catalog as &dyn CatalogUploader),
    )?;
    report.log();
    Ok(())
}
```

Error handling
--------------
All public functions return `synthpro::Result<T>`. Only archive-root failures
and invalid configuration are returned as `Err`; per-item engine failures and
per-product composite/upload failures are collected in the batch reports.

```rust,no_run
use synthpro::{plan_batch, Calendar, Error};

fn main() {
    match plan_batch("/missing".as_ref(), "/data/L3A".as_ref(), Calendar::Gregorian) {
        Ok(plan) => println!("{} items", plan.items.len()),
        Err(Error::ArchiveUnavailable { path, source }) => eprintln!("{path:?}: {source}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level entry points (`plan_batch`, `run_batch`, `publish_composites`).
- [`core`]: period keys, naming conventions, parameters and the gap scheduler.
- [`engine`]: the `SynthesisEngine` seam, `ProcessEngine` and the batch runner.
- [`io`]: archive indexers and GDAL readers/writers.
- [`composite`] / [`catalog`]: composite assembly and catalog upload.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod catalog;
pub mod composite;
pub mod core;
pub mod engine;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::naming::{L3ProductId, SyntheticProductName};
pub use core::params::SynthesisParams;
pub use core::period::PeriodKeyResolver;
pub use core::scheduler::{GapScheduler, WorkItem};
pub use error::{Error, Result};
pub use types::{Band, Calendar, PeriodKey, Tile};

// Indexers
pub use io::archive::{L2Index, L3Product, OutputIndexer, ProductIndexer};

// Synthesis
pub use engine::{
    BatchSummary, CancelToken, ProcessEngine, SynthesisEngine, SynthesisError, SynthesisRunner,
};

// Composites and catalog
pub use catalog::{CatalogClient, CatalogUploader, UploadMetadata};
pub use composite::{AssemblyOutcome, CompositeAssembler, CompositeOptions, CompositeProduct};

// High-level API re-exports
pub use api::{
    BatchConfig, BatchPlan, BatchReport, CompositeConfig, PublishReport, plan_batch,
    publish_composites, run_batch, upload_composite,
};
