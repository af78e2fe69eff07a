//! Archive fixtures shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use synthpro::{SynthesisError, SynthesisParams, WorkItem};

pub struct Archive {
    pub root: tempfile::TempDir,
}

impl Archive {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn l2(&self) -> PathBuf {
        self.root.path().join("L2A")
    }

    pub fn l3(&self) -> PathBuf {
        self.root.path().join("L3A")
    }

    pub fn scratch(&self) -> PathBuf {
        self.root.path().join("work")
    }

    /// L2 product `SENTINEL2A_<date>-103021-456_L2A_<tile>_C_V3-1` with its descriptor.
    pub fn add_descriptor(&self, tile: &str, date: &str) -> PathBuf {
        let product = format!("SENTINEL2A_{date}-103021-456_L2A_{tile}_C_V3-1");
        let dir = self.l2().join(tile).join(&product);
        fs::create_dir_all(&dir).expect("Failed to create L2 product dir");
        let descriptor = dir.join(format!("{product}_MTD_ALL.xml"));
        fs::write(&descriptor, b"<Muscate_Metadata_Document/>").expect("Failed to write descriptor");
        descriptor
    }

    /// L3 product directory dated `date` under `<l3>/<tile>`.
    pub fn add_l3_product(&self, tile: &str, date: &str) -> PathBuf {
        let dir = self
            .l3()
            .join(tile)
            .join(l3_product_name(tile, date));
        fs::create_dir_all(&dir).expect("Failed to create L3 product dir");
        dir
    }

    pub fn params(&self) -> SynthesisParams {
        SynthesisParams {
            temp_dir: Some(self.scratch()),
            ..Default::default()
        }
    }
}

pub fn l3_product_name(tile: &str, date: &str) -> String {
    format!("SENTINEL2X_{date}-000000-000_L3A_{tile}_C_V1-0")
}

/// Behaves like a well-mannered engine: writes one product dated with the
/// materialized synthesis date into the item's output directory.
pub fn write_product(item: &WorkItem, params: &SynthesisParams) -> Result<(), SynthesisError> {
    let date = params
        .date
        .ok_or_else(|| SynthesisError::Engine("no date".to_string()))?;
    let dir = item.output_dir.join(l3_product_name(
        item.tile.as_str(),
        &date.format("%Y%m%d").to_string(),
    ));
    fs::create_dir_all(&dir).map_err(|e| SynthesisError::io(&dir, e))
}

pub fn touch(path: &Path) {
    fs::create_dir_all(path.parent().expect("path has a parent")).expect("Failed to create dir");
    fs::write(path, b"").expect("Failed to write file");
}
