use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use synthpro::Calendar;

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {e}"))
}

#[derive(Parser)]
#[command(
    name = "synthpro",
    version,
    disable_version_flag = true,
    about = "Schedule Sentinel-2 L3 temporal syntheses for every missing (tile, month)"
)]
pub struct CliArgs {
    /// Print version
    #[arg(short = 'V', long = "app-version", action = ArgAction::Version)]
    pub app_version: Option<bool>,

    /// Synthesis engine executable
    #[arg(long)]
    pub engine: Option<PathBuf>,

    /// L2 archive root (<root>/<tile>/**/*MTD_ALL.xml)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// L3 archive root (<root>/<tile>/<product>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Root for engine scratch directories
    #[arg(long)]
    pub tempout: Option<PathBuf>,

    /// Version tag of synthesized products
    #[arg(long)]
    pub version: Option<String>,

    /// Engine log path
    #[arg(long)]
    pub logpath: Option<PathBuf>,

    /// Fixed synthesis date (YYYYMMDD) for every item; default is mid-period
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Half-width of the synthesis window, in days
    #[arg(long)]
    pub synthalf: Option<u32>,

    /// Previous L3A product for incremental synthesis
    #[arg(long)]
    pub prev_l3a: Option<PathBuf>,

    /// Write cloud-optimized GeoTIFFs
    #[arg(long, default_value_t = false)]
    pub cog: bool,

    #[arg(long)]
    pub weight_aot_min: Option<f64>,

    #[arg(long)]
    pub weight_aot_max: Option<f64>,

    #[arg(long)]
    pub aot_max: Option<f64>,

    /// Coarse resolution (m) for cloud distance computation
    #[arg(long)]
    pub coarse_res: Option<u32>,

    /// Cloud kernel width, in pixels
    #[arg(long)]
    pub kernel_width: Option<u32>,

    #[arg(long)]
    pub sigma_small_cloud: Option<f64>,

    #[arg(long)]
    pub sigma_large_cloud: Option<f64>,

    #[arg(long)]
    pub weight_date_min: Option<f64>,

    /// Engine thread count
    #[arg(long)]
    pub nthreads: Option<usize>,

    #[arg(long)]
    pub scattering_coeff_path: Option<PathBuf>,

    /// Ask the engine to delete its scratch files
    #[arg(long, default_value_t = false)]
    pub remove_temp: bool,

    /// Calendar in which synthesis months are counted
    #[arg(long, value_enum, default_value_t = Calendar::Persian)]
    pub calendar: Calendar,

    /// Only list the scheduled work items
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Kill an engine invocation after this many seconds
    #[arg(long)]
    pub engine_timeout: Option<u64>,

    /// Stop the batch after the running item once this file exists
    #[arg(long)]
    pub stop_file: Option<PathBuf>,

    /// Load synthesis options from a preset; flags override its values
    #[arg(long)]
    pub preset: Option<PathBuf>,

    /// Save the effective synthesis options as a preset
    #[arg(long)]
    pub save_preset: Option<PathBuf>,

    /// Root for RGB+NIR composites; enables the composite stage
    #[arg(long)]
    pub composite_dir: Option<PathBuf>,

    /// Target CRS of composites
    #[arg(long, default_value = "EPSG:3857")]
    pub target_crs: String,

    /// Composite pixel size, in target CRS units
    #[arg(long, default_value_t = 10.0)]
    pub resolution: f64,

    /// Catalog base URL; enables uploading new composites
    #[arg(long)]
    pub catalog_url: Option<String>,

    #[arg(long)]
    pub catalog_email: Option<String>,

    #[arg(long, env = "SYNTHPRO_CATALOG_PASSWORD", hide_env_values = true)]
    pub catalog_password: Option<String>,

    /// Catalog resource receiving composites
    #[arg(long, default_value = synthpro::catalog::DEFAULT_RESOURCE)]
    pub catalog_resource: String,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,
}
