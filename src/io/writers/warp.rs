use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::io::gdal::RasterError;

/// Reproject `input` to `target_srs` at `resolution` (target units per pixel)
/// into an LZW-compressed GeoTIFF at `output`.
pub fn warp_to_srs(
    input: &Path,
    output: &Path,
    target_srs: &str,
    resolution: f64,
) -> Result<(), RasterError> {
    info!("Warping to target CRS: {} at {}", target_srs, resolution);
    let res = resolution.to_string();
    let args: Vec<String> = vec![
        "-of".into(),
        "GTiff".into(),
        "-overwrite".into(),
        "-r".into(),
        "near".into(),
        "-t_srs".into(),
        target_srs.into(),
        "-tr".into(),
        res.clone(),
        res,
        "-co".into(),
        "COMPRESS=LZW".into(),
        "-co".into(),
        "PREDICTOR=2".into(),
    ];
    let output_status = Command::new("gdalwarp")
        .args(args.iter().map(|s| s.as_str()))
        .arg(input)
        .arg(output)
        .output()
        .map_err(|e| RasterError::Warp(format!("gdalwarp exec error: {}", e)))?;
    if !output_status.status.success() {
        // Best-effort cleanup
        let _ = std::fs::remove_file(output);
        return Err(RasterError::Warp(
            String::from_utf8_lossy(&output_status.stderr).trim().to_string(),
        ));
    }
    Ok(())
}
