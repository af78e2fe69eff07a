//! RGB+NIR composites of L3 products.
//!
//! For an L3 product directory, the weight mask `MASKS/*-0_WGT_R1.tif` gives the
//! reference grid and the `_B2`, `_B3`, `_B4`, `_B8` rasters are stacked in that
//! order into an Int16 GeoTIFF, reprojected, and zipped under the synthetic
//! product name. An existing zip means the product was already packaged.
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, Axis};
use tracing::{debug, info, warn};

use crate::core::naming::{L3ProductId, SyntheticProductName};
use crate::error::{Error, Result};
use crate::io::archive::L3Product;
use crate::io::gdal::{RasterError, RasterGrid, RasterReader};
use crate::io::writers::package::zip_single_file;
use crate::io::writers::tiff::write_tiff_multiband_i16;
use crate::io::writers::warp::warp_to_srs;
use crate::types::{Band, PeriodKey, Tile};

/// No-data value of composite bands
pub const NODATA: i16 = -10000;

/// Sub-directory of an L3 product holding the weight masks
pub const MASKS_DIR: &str = "MASKS";

/// Mask providing the reference grid (last `-` field of the file stem)
pub const REFERENCE_MASK: &str = "0_WGT_R1";

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeOptions {
    pub target_srs: String,
    /// Output pixel size in target SRS units
    pub resolution: f64,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            target_srs: "EPSG:3857".to_string(),
            resolution: 10.0,
        }
    }
}

/// A packaged composite, ready for upload.
#[derive(Debug, Clone)]
pub struct CompositeProduct {
    pub name: SyntheticProductName,
    pub tile: Tile,
    pub period: PeriodKey,
    pub tif_path: PathBuf,
    pub zip_path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum AssemblyOutcome {
    Packaged(CompositeProduct),
    /// The zip for this product already exists
    AlreadyPackaged(PathBuf),
    /// The product has no mask rasters to take a grid from
    NoMasks,
}

/// Rasters of one L3 product that make up its composite.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSources {
    pub mask: PathBuf,
    /// In [`Band::STACK_ORDER`]
    pub bands: Vec<PathBuf>,
}

fn tif_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "tif"))
        .collect();
    files.sort();
    Ok(files)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Find the reference mask and band rasters of `product_dir`.
/// Returns `None` when the product has no mask rasters at all.
pub fn locate_sources(product_dir: &Path) -> Result<Option<CompositeSources>> {
    let masks = tif_files(&product_dir.join(MASKS_DIR))?;
    if masks.is_empty() {
        return Ok(None);
    }

    let mask = masks
        .iter()
        .find(|m| stem(m).rsplit('-').next() == Some(REFERENCE_MASK))
        .cloned()
        .ok_or_else(|| {
            Error::assembly(product_dir, format!("no *-{REFERENCE_MASK}.tif mask"))
        })?;

    let rasters = tif_files(product_dir)?;
    let mut bands = Vec::with_capacity(Band::STACK_ORDER.len());
    for band in Band::STACK_ORDER {
        let matches: Vec<&PathBuf> = rasters
            .iter()
            .filter(|r| stem(r).rsplit('_').next() == Some(band.token()))
            .collect();
        match matches.as_slice() {
            [single] => bands.push((*single).clone()),
            [] => return Err(Error::assembly(product_dir, format!("missing band {band}"))),
            many => {
                return Err(Error::assembly(
                    product_dir,
                    format!("{} rasters for band {band}", many.len()),
                ));
            }
        }
    }

    Ok(Some(CompositeSources { mask, bands }))
}

/// Read the bands of `sources` and stack them in order on the reference mask grid.
pub fn stack_sources(
    product_dir: &Path,
    sources: &CompositeSources,
) -> Result<(RasterGrid, Array3<i16>)> {
    let to_assembly = |e: RasterError| Error::assembly(product_dir, e);
    let grid = RasterReader::open(&sources.mask).map_err(to_assembly)?.grid;

    let mut planes: Vec<Array2<i16>> = Vec::with_capacity(sources.bands.len());
    for path in &sources.bands {
        let reader = RasterReader::open(path).map_err(to_assembly)?;
        if (reader.grid.size_x, reader.grid.size_y) != (grid.size_x, grid.size_y) {
            return Err(Error::assembly(
                product_dir,
                format!(
                    "{:?} is {}x{}, reference grid is {}x{}",
                    path, reader.grid.size_x, reader.grid.size_y, grid.size_x, grid.size_y
                ),
            ));
        }
        planes.push(reader.read_i16().map_err(to_assembly)?);
    }
    let views: Vec<_> = planes.iter().map(|p| p.view()).collect();
    let stack = ndarray::stack(Axis(0), &views).map_err(|e| Error::assembly(product_dir, e))?;
    Ok((grid, stack))
}

pub struct CompositeAssembler {
    nrgb_root: PathBuf,
    options: CompositeOptions,
}

impl CompositeAssembler {
    pub fn new<P: Into<PathBuf>>(nrgb_root: P, options: CompositeOptions) -> Self {
        Self {
            nrgb_root: nrgb_root.into(),
            options,
        }
    }

    /// Composite name for `product` and its `.tif` / `.zip` paths.
    pub fn target_for(
        &self,
        tile: &Tile,
        product: &L3Product,
    ) -> Result<(SyntheticProductName, PathBuf, PathBuf)> {
        let id = L3ProductId::parse(&product.id())?;
        let name = SyntheticProductName::for_product(&id, product.period);
        let dir = self.nrgb_root.join(tile);
        let tif = dir.join(name.tif_name());
        let zip = dir.join(name.zip_name());
        Ok((name, tif, zip))
    }

    /// Build, reproject and package the composite of one L3 product.
    pub fn assemble(&self, tile: &Tile, product: &L3Product) -> Result<AssemblyOutcome> {
        let (name, tif_path, zip_path) = self.target_for(tile, product)?;
        if zip_path.exists() {
            debug!("Already packaged: {:?}", zip_path);
            return Ok(AssemblyOutcome::AlreadyPackaged(zip_path));
        }

        let Some(sources) = locate_sources(&product.path)? else {
            warn!("No mask rasters in {:?}; no composite to merge", product.path);
            return Ok(AssemblyOutcome::NoMasks);
        };

        let out_dir = self.nrgb_root.join(tile);
        fs::create_dir_all(&out_dir)?;

        let to_assembly = |e: RasterError| Error::assembly(&product.path, e);
        let (grid, stack) = stack_sources(&product.path, &sources)?;

        // Unwarped stack lives in a temp file; gdalwarp writes the final raster.
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}_", name))
            .suffix("_stack.tif")
            .tempfile()?;
        write_tiff_multiband_i16(staging.path(), &grid, &stack, NODATA).map_err(to_assembly)?;
        warp_to_srs(
            staging.path(),
            &tif_path,
            &self.options.target_srs,
            self.options.resolution,
        )
        .map_err(to_assembly)?;
        info!("Composite written: {:?}", tif_path);

        zip_single_file(&tif_path, &name.tif_name(), &zip_path)?;
        info!("Composite packaged: {:?}", zip_path);

        Ok(AssemblyOutcome::Packaged(CompositeProduct {
            period: name.period,
            name,
            tile: tile.clone(),
            tif_path,
            zip_path,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT: &str = "SENTINEL2X_20240415-000000-000_L3A_T39SWA_C_V1-0";

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn product_with_bands(root: &Path, bands: &[&str]) -> PathBuf {
        let dir = root.join(PRODUCT);
        touch(&dir.join(MASKS_DIR).join(format!("{PRODUCT}_WGT_R1.tif")));
        touch(&dir.join(MASKS_DIR).join(format!("{PRODUCT}_MG2_R1.tif")));
        for band in bands {
            touch(&dir.join(format!("{PRODUCT}_FRC_{band}.tif")));
        }
        dir
    }

    #[test]
    fn locates_reference_mask_and_bands_in_stack_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = product_with_bands(tmp.path(), &["B8", "B4", "B2", "B3", "B11"]);

        let sources = locate_sources(&dir).unwrap().unwrap();
        assert!(stem(&sources.mask).ends_with("-0_WGT_R1"));
        let tokens: Vec<String> = sources
            .bands
            .iter()
            .map(|b| stem(b).rsplit('_').next().unwrap().to_string())
            .collect();
        assert_eq!(tokens, ["B2", "B3", "B4", "B8"]);
    }

    #[test]
    fn missing_band_is_an_assembly_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = product_with_bands(tmp.path(), &["B2", "B3", "B4"]);
        assert!(matches!(
            locate_sources(&dir),
            Err(Error::RasterAssembly { .. })
        ));
    }

    #[test]
    fn no_masks_means_nothing_to_locate() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(PRODUCT);
        touch(&dir.join(format!("{PRODUCT}_FRC_B2.tif")));
        assert_eq!(locate_sources(&dir).unwrap(), None);
    }

    /// Single-band Int16 GTiff where pixel (row, col) holds `base + 10 * row + col`.
    fn write_raster(path: &Path, cols: usize, rows: usize, base: i16) {
        use gdal::DriverManager;
        use gdal::raster::Buffer;

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut ds = driver
            .create_with_band_type::<i16, _>(path, cols, rows, 1)
            .unwrap();
        ds.set_geo_transform(&[500000.0, 20.0, 0.0, 4000020.0, 0.0, -20.0])
            .unwrap();
        let data: Vec<i16> = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| base + 10 * r as i16 + c as i16))
            .collect();
        let mut band = ds.rasterband(1).unwrap();
        let mut buf = Buffer::new((cols, rows), data);
        band.write((0, 0), (cols, rows), &mut buf).unwrap();
    }

    fn raster_product(root: &Path, b8_size: (usize, usize)) -> PathBuf {
        let dir = root.join(PRODUCT);
        write_raster(&dir.join(MASKS_DIR).join(format!("{PRODUCT}_WGT_R1.tif")), 3, 2, 0);
        write_raster(&dir.join(format!("{PRODUCT}_FRC_B2.tif")), 3, 2, 200);
        write_raster(&dir.join(format!("{PRODUCT}_FRC_B3.tif")), 3, 2, 300);
        write_raster(&dir.join(format!("{PRODUCT}_FRC_B4.tif")), 3, 2, 400);
        write_raster(&dir.join(format!("{PRODUCT}_FRC_B8.tif")), b8_size.0, b8_size.1, 800);
        dir
    }

    #[test]
    fn bands_are_stacked_in_order_with_nodata_on_every_band() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = raster_product(tmp.path(), (3, 2));
        let sources = locate_sources(&dir).unwrap().unwrap();

        let (grid, stack) = stack_sources(&dir, &sources).unwrap();
        assert_eq!((grid.size_x, grid.size_y), (3, 2));
        assert_eq!(stack.dim(), (4, 2, 3));
        assert_eq!(stack[[0, 0, 0]], 200);
        assert_eq!(stack[[1, 1, 2]], 312);
        assert_eq!(stack[[3, 1, 0]], 810);

        let out = tmp.path().join("stack.tif");
        write_tiff_multiband_i16(&out, &grid, &stack, NODATA).unwrap();

        let ds = gdal::Dataset::open(&out).unwrap();
        assert_eq!(ds.raster_count(), 4);
        assert_eq!(ds.geo_transform().unwrap(), grid.geotransform);
        for (index, base) in [200i16, 300, 400, 800].into_iter().enumerate() {
            let band = ds.rasterband(index + 1).unwrap();
            assert_eq!(band.no_data_value(), Some(NODATA as f64));
            let buf = band.read_as::<i16>((0, 0), (3, 2), (3, 2), None).unwrap();
            assert_eq!(
                buf.data().to_vec(),
                vec![base, base + 1, base + 2, base + 10, base + 11, base + 12]
            );
        }
    }

    #[test]
    fn band_off_the_reference_grid_is_an_assembly_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = raster_product(tmp.path(), (2, 2));
        let sources = locate_sources(&dir).unwrap().unwrap();

        match stack_sources(&dir, &sources) {
            Err(Error::RasterAssembly { product, reason }) => {
                assert_eq!(product, dir);
                assert!(reason.contains("reference grid is 3x2"), "{reason}");
            }
            other => panic!("expected assembly error, got {:?}", other.map(|_| ())),
        }
    }
}
