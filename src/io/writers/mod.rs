//! Output writers for composite products: multi-band GeoTIFF, `gdalwarp`
//! reprojection and zip packaging.
pub mod package;
pub mod tiff;
pub mod warp;
