use gdal::DriverManager;
use gdal::raster::Buffer;
use ndarray::Array3;
use std::path::Path;

use crate::io::gdal::{RasterError, RasterGrid};

/// Write a (bands, rows, cols) i16 stack as a multi-band GeoTIFF on `grid`,
/// flagging `nodata` on every band. The dataset is closed (flushed) on return.
pub fn write_tiff_multiband_i16(
    output: &Path,
    grid: &RasterGrid,
    bands: &Array3<i16>,
    nodata: i16,
) -> Result<(), RasterError> {
    let (count, rows, cols) = bands.dim();
    if (cols, rows) != (grid.size_x, grid.size_y) {
        return Err(RasterError::DimensionMismatch(
            grid.size_x,
            grid.size_y,
            cols,
            rows,
        ));
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<i16, _>(output, cols, rows, count)?;
    ds.set_geo_transform(&grid.geotransform)?;
    if !grid.projection.is_empty() {
        ds.set_projection(&grid.projection)?;
    }

    for (index, plane) in bands.outer_iter().enumerate() {
        let mut band = ds.rasterband(index + 1)?;
        band.set_no_data_value(Some(nodata as f64))?;
        let mut buf = Buffer::new((cols, rows), plane.iter().copied().collect::<Vec<i16>>());
        band.write((0, 0), (cols, rows), &mut buf)?;
    }

    Ok(())
}
