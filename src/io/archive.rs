//! Archive indexers.
//!
//! `ProductIndexer` walks the L2 archive (`<root>/<tile>/**/*MTD_ALL.xml`) into
//! an [`L2Index`]; `OutputIndexer` lists the L3 products already present under
//! `<root>/<tile>/`. Both key products through the same
//! [`PeriodKeyResolver`], which keeps the gap computation sound.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::naming::is_descriptor;
use crate::core::period::PeriodKeyResolver;
use crate::error::{Error, Result};
use crate::types::{PeriodKey, Tile};

/// Descriptors of one tile, grouped by period.
pub type TilePeriods = BTreeMap<PeriodKey, BTreeSet<PathBuf>>;

/// An archive entry that was reported and left out of an index.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// Tile → period → descriptor paths of an L2 archive. Built fresh on every run.
#[derive(Debug, Clone, Default)]
pub struct L2Index {
    tiles: BTreeMap<Tile, TilePeriods>,
    skipped: Vec<SkippedEntry>,
}

impl L2Index {
    pub(crate) fn insert(&mut self, tile: Tile, period: PeriodKey, descriptor: PathBuf) {
        self.tiles
            .entry(tile)
            .or_default()
            .entry(period)
            .or_default()
            .insert(descriptor);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tile, &TilePeriods)> {
        self.tiles.iter()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.keys()
    }

    pub fn periods(&self, tile: &Tile) -> Option<&TilePeriods> {
        self.tiles.get(tile)
    }

    pub fn descriptor_count(&self) -> usize {
        self.tiles
            .values()
            .flat_map(|periods| periods.values())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Entries reported and skipped while indexing (malformed names, unreadable entries).
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }
}

fn archive_unavailable(path: &Path, source: std::io::Error) -> Error {
    Error::ArchiveUnavailable {
        path: path.to_path_buf(),
        source,
    }
}

/// Immediate subdirectories of `root`, sorted by name.
fn list_subdirectories(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| archive_unavailable(root, e))? {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                } else {
                    debug!("Skipping non-directory: {:?}", path);
                }
            }
            Err(e) => warn!("Error accessing entry under {:?}: {}", root, e),
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductIndexer {
    resolver: PeriodKeyResolver,
}

impl ProductIndexer {
    pub fn new(resolver: PeriodKeyResolver) -> Self {
        Self { resolver }
    }

    /// Index every descriptor under `l2_root`. Tiles without descriptors are dropped.
    pub fn index(&self, l2_root: &Path) -> Result<L2Index> {
        let mut index = L2Index::default();

        for tile_dir in list_subdirectories(l2_root)? {
            let tile = Tile::new(file_name_string(&tile_dir));
            let mut found = 0usize;

            let walker = WalkDir::new(&tile_dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter();
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Error accessing entry in tile {}: {}", tile, e);
                        index.skipped.push(SkippedEntry {
                            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| tile_dir.clone()),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if !is_descriptor(&name) {
                    continue;
                }
                match self.resolver.resolve_name(&name) {
                    Ok(period) => {
                        index.insert(tile.clone(), period, entry.path().to_path_buf());
                        found += 1;
                    }
                    Err(e) => {
                        warn!("Skipping descriptor {:?}: {}", entry.path(), e);
                        index.skipped.push(SkippedEntry {
                            path: entry.path().to_path_buf(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if found == 0 {
                debug!("Tile {} has no descriptors; dropped", tile);
            } else {
                debug!("Tile {}: {} descriptors", tile, found);
            }
        }

        Ok(index)
    }
}

/// An L3 product directory and the period its name resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L3Product {
    pub path: PathBuf,
    pub period: PeriodKey,
}

impl L3Product {
    pub fn id(&self) -> String {
        file_name_string(&self.path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputIndexer {
    resolver: PeriodKeyResolver,
}

impl OutputIndexer {
    pub fn new(resolver: PeriodKeyResolver) -> Self {
        Self { resolver }
    }

    /// Directory holding the L3 products of `tile`.
    pub fn tile_dir(l3_root: &Path, tile: &Tile) -> PathBuf {
        l3_root.join(tile)
    }

    /// L3 product directories of `tile`, sorted by name. Creates the tile
    /// directory on first use.
    pub fn products(&self, l3_root: &Path, tile: &Tile) -> Result<Vec<L3Product>> {
        self.products_in(&Self::tile_dir(l3_root, tile))
    }

    /// L3 product directories directly under `dir`, which is created if absent.
    pub fn products_in(&self, dir: &Path) -> Result<Vec<L3Product>> {
        fs::create_dir_all(dir).map_err(|e| archive_unavailable(dir, e))?;

        let mut products = Vec::new();
        for path in list_subdirectories(dir)? {
            let name = file_name_string(&path);
            match self.resolver.resolve_name(&name) {
                Ok(period) => products.push(L3Product { path, period }),
                Err(e) => warn!("Ignoring L3 entry {:?}: {}", path, e),
            }
        }
        Ok(products)
    }

    /// Periods already synthesized for `tile`.
    pub fn index(&self, l3_root: &Path, tile: &Tile) -> Result<BTreeSet<PeriodKey>> {
        Ok(self
            .products(l3_root, tile)?
            .into_iter()
            .map(|p| p.period)
            .collect())
    }
}
