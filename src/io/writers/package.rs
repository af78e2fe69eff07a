use std::fs::{self, File};
use std::path::Path;

use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::error::Result;

/// Deflate `source` into a new archive at `zip_path` as its only entry,
/// `entry_name`. The archive appears under its final name only once complete.
pub fn zip_single_file(source: &Path, entry_name: &str, zip_path: &Path) -> Result<()> {
    let partial = zip_path.with_extension("zip.part");
    let result = write_archive(source, entry_name, &partial);
    if result.is_err() {
        let _ = fs::remove_file(&partial);
        return result;
    }
    fs::rename(&partial, zip_path)?;
    Ok(())
}

fn write_archive(source: &Path, entry_name: &str, path: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);
    zip.start_file(entry_name, options)?;
    let mut input = File::open(source)?;
    std::io::copy(&mut input, &mut zip)?;
    zip.finish()?;
    Ok(())
}
