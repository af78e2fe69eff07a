use gdal::{Dataset, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

/// Errors encountered when reading, writing or warping rasters
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported raster: {0}")]
    Unsupported(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("gdalwarp failed: {0}")]
    Warp(String),
}

/// Reference grid of a raster: size, georeferencing and spatial reference
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection in WKT format, as stored in the dataset
    pub projection: String,
}

/// Reader for single GeoTIFF rasters of an L3 product
pub struct RasterReader {
    pub dataset: Dataset,
    pub grid: RasterGrid,
}

impl RasterReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        if dataset.raster_count() == 0 {
            return Err(RasterError::Unsupported(format!(
                "no raster bands in {}",
                path.as_ref().display()
            )));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let projection = dataset.projection();
        Ok(RasterReader {
            dataset,
            grid: RasterGrid {
                size_x: size_x as usize,
                size_y: size_y as usize,
                geotransform,
                projection,
            },
        })
    }

    /// Read the first band as an i16 ndarray of shape (height, width)
    pub fn read_i16(&self) -> Result<Array2<i16>, RasterError> {
        let band = self.dataset.rasterband(1)?;
        let window = (self.grid.size_x, self.grid.size_y);
        let buf = band.read_as::<i16>((0, 0), window, window, None)?;
        let data_vec = buf.data().to_vec();
        Array2::from_shape_vec((self.grid.size_y, self.grid.size_x), data_vec).map_err(|_| {
            RasterError::DimensionMismatch(
                self.grid.size_x,
                self.grid.size_y,
                self.grid.size_x,
                self.grid.size_y,
            )
        })
    }
}
