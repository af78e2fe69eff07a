//! I/O layer: archive indexers for L2 descriptors and L3 products, the GDAL
//! raster adapter, and `writers` for composite GeoTIFFs and packages.
pub mod archive;
pub use archive::{L2Index, L3Product, OutputIndexer, ProductIndexer, SkippedEntry};

pub mod gdal;
pub use gdal::{RasterError, RasterGrid, RasterReader};

pub mod writers;
