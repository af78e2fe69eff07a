use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Synthesis engine options, suitable for config files and presets.
///
/// Every option recognized by the engine is listed here with its default; the
/// runner forwards them verbatim, filling in only the per-item synthesis date
/// and temp directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisParams {
    /// Version tag written into product names
    pub version: String,
    /// Fixed synthesis date for every item; None derives it from the period
    pub date: Option<NaiveDate>,
    /// Half-width of the synthesis window, in days
    pub synth_half: u32,
    pub weight_aot_min: f64,
    pub weight_aot_max: f64,
    pub aot_max: f64,
    /// Coarse resolution (m) used for cloud distance computation
    pub coarse_res: u32,
    /// Cloud kernel width, in pixels
    pub kernel_width: u32,
    pub sigma_small_cloud: f64,
    pub sigma_large_cloud: f64,
    pub weight_date_min: f64,
    pub n_threads: usize,
    /// Previous L3A product for incremental synthesis
    pub prev_l3a: Option<PathBuf>,
    /// Write cloud-optimized GeoTIFFs
    pub cog: bool,
    pub log_path: Option<PathBuf>,
    pub scattering_coeff_path: Option<PathBuf>,
    /// Root for engine scratch directories; defaults to the system temp dir
    pub temp_dir: Option<PathBuf>,
    /// Ask the engine to delete its scratch files on completion
    pub remove_temp: bool,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            date: None,
            synth_half: 23,
            weight_aot_min: 0.33,
            weight_aot_max: 1.0,
            aot_max: 0.8,
            coarse_res: 240,
            kernel_width: 801,
            sigma_small_cloud: 2.0,
            sigma_large_cloud: 10.0,
            weight_date_min: 0.5,
            n_threads: 4,
            prev_l3a: None,
            cog: false,
            log_path: None,
            scattering_coeff_path: None,
            temp_dir: None,
            remove_temp: false,
        }
    }
}

impl SynthesisParams {
    /// Check option ranges; returns the params unchanged when valid.
    pub fn validated(self) -> Result<Self> {
        let invalid = |arg: &'static str, value: String| Err(Error::InvalidArgument { arg, value });

        if self.version.is_empty() || self.version.contains('_') {
            return invalid("version", self.version);
        }
        if self.synth_half == 0 {
            return invalid("synthalf", self.synth_half.to_string());
        }
        if !(0.0..=1.0).contains(&self.weight_aot_min)
            || !(0.0..=1.0).contains(&self.weight_aot_max)
            || self.weight_aot_min > self.weight_aot_max
        {
            return invalid(
                "weight-aot-min/max",
                format!("{}/{}", self.weight_aot_min, self.weight_aot_max),
            );
        }
        if !(self.aot_max > 0.0) {
            return invalid("aot-max", self.aot_max.to_string());
        }
        if self.coarse_res == 0 {
            return invalid("coarse-res", self.coarse_res.to_string());
        }
        if self.kernel_width == 0 {
            return invalid("kernel-width", self.kernel_width.to_string());
        }
        if !(self.sigma_small_cloud > 0.0) || !(self.sigma_large_cloud > 0.0) {
            return invalid(
                "sigma-small-cloud/sigma-large-cloud",
                format!("{}/{}", self.sigma_small_cloud, self.sigma_large_cloud),
            );
        }
        if !(0.0..=1.0).contains(&self.weight_date_min) {
            return invalid("weight-date-min", self.weight_date_min.to_string());
        }
        if self.n_threads == 0 {
            return invalid("nthreads", self.n_threads.to_string());
        }
        Ok(self)
    }

    /// Save as a preset: a `//` comment header followed by pretty JSON.
    pub fn save_preset(&self, path: &Path) -> Result<()> {
        let mut content = String::new();
        content.push_str("// ==========================================\n");
        content.push_str("// synthpro synthesis preset\n");
        content.push_str(&format!("// Version: {}\n", env!("CARGO_PKG_VERSION")));
        content.push_str(&format!("// Generated: {}\n", chrono::Utc::now().to_rfc3339()));
        content.push_str("// Note: archive roots are not included in presets\n");
        content.push_str("// ==========================================\n\n");

        let json = serde_json::to_string_pretty(self).map_err(|e| Error::Preset {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        content.push_str(&json);
        content.push('\n');

        fs::write(path, content)?;
        tracing::info!("Preset saved to: {:?}", path);
        Ok(())
    }

    /// Load a preset written by [`save_preset`](Self::save_preset). Missing
    /// fields take their defaults.
    pub fn load_preset(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let preset_err = |reason: String| Error::Preset {
            path: path.to_path_buf(),
            reason,
        };

        // Skip the comment header
        let json_start = content
            .find('{')
            .ok_or_else(|| preset_err("no JSON content found".to_string()))?;
        let params: SynthesisParams =
            serde_json::from_str(&content[json_start..]).map_err(|e| preset_err(e.to_string()))?;

        tracing::info!("Preset loaded from: {:?}", path);
        params.validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SynthesisParams::default().validated().is_ok());
    }

    #[test]
    fn rejects_out_of_range_options() {
        let bad = [
            SynthesisParams {
                synth_half: 0,
                ..Default::default()
            },
            SynthesisParams {
                weight_aot_min: 0.9,
                weight_aot_max: 0.5,
                ..Default::default()
            },
            SynthesisParams {
                n_threads: 0,
                ..Default::default()
            },
            SynthesisParams {
                version: "1_0".into(),
                ..Default::default()
            },
            SynthesisParams {
                sigma_large_cloud: f64::NAN,
                ..Default::default()
            },
        ];
        for params in bad {
            assert!(matches!(
                params.validated(),
                Err(Error::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn preset_round_trip_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monthly.preset");
        let params = SynthesisParams {
            version: "2.1".into(),
            date: NaiveDate::from_ymd_opt(2024, 4, 4),
            n_threads: 12,
            cog: true,
            ..Default::default()
        };
        params.save_preset(&path).unwrap();

        let loaded = SynthesisParams::load_preset(&path).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn partial_preset_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.preset");
        fs::write(&path, "// header\n{ \"synth_half\": 15 }").unwrap();

        let loaded = SynthesisParams::load_preset(&path).unwrap();
        assert_eq!(loaded.synth_half, 15);
        assert_eq!(loaded.kernel_width, 801);
    }
}
