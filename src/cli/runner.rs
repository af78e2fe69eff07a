use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use synthpro::{
    BatchConfig, CancelToken, CatalogClient, CatalogUploader, CompositeConfig, CompositeOptions,
    ProcessEngine, SynthesisParams, plan_batch, run_batch,
};

use super::args::CliArgs;
use super::errors::AppError;

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn required(value: Option<PathBuf>, arg: &str) -> Result<PathBuf, AppError> {
    value.ok_or_else(|| AppError::MissingArgument {
        arg: arg.to_string(),
    })
}

/// Preset values (or defaults) with command-line overrides applied.
fn build_params(args: &CliArgs) -> Result<SynthesisParams, AppError> {
    let mut params = match &args.preset {
        Some(path) => SynthesisParams::load_preset(path)?,
        None => SynthesisParams::default(),
    };

    if let Some(v) = &args.version {
        params.version = v.clone();
    }
    if args.date.is_some() {
        params.date = args.date;
    }
    if let Some(v) = args.synthalf {
        params.synth_half = v;
    }
    if let Some(v) = args.weight_aot_min {
        params.weight_aot_min = v;
    }
    if let Some(v) = args.weight_aot_max {
        params.weight_aot_max = v;
    }
    if let Some(v) = args.aot_max {
        params.aot_max = v;
    }
    if let Some(v) = args.coarse_res {
        params.coarse_res = v;
    }
    if let Some(v) = args.kernel_width {
        params.kernel_width = v;
    }
    if let Some(v) = args.sigma_small_cloud {
        params.sigma_small_cloud = v;
    }
    if let Some(v) = args.sigma_large_cloud {
        params.sigma_large_cloud = v;
    }
    if let Some(v) = args.weight_date_min {
        params.weight_date_min = v;
    }
    if let Some(v) = args.nthreads {
        params.n_threads = v;
    }
    if args.prev_l3a.is_some() {
        params.prev_l3a = args.prev_l3a.clone();
    }
    if args.logpath.is_some() {
        params.log_path = args.logpath.clone();
    }
    if args.scattering_coeff_path.is_some() {
        params.scattering_coeff_path = args.scattering_coeff_path.clone();
    }
    if args.tempout.is_some() {
        params.temp_dir = args.tempout.clone();
    }
    params.cog |= args.cog;
    params.remove_temp |= args.remove_temp;

    Ok(params.validated()?)
}

fn composite_config(args: &CliArgs) -> Result<Option<CompositeConfig>, AppError> {
    let Some(nrgb_root) = args.composite_dir.clone() else {
        return Ok(None);
    };
    if !(args.resolution > 0.0) {
        return Err(AppError::InvalidValue {
            arg: "--resolution".to_string(),
            value: args.resolution.to_string(),
        });
    }
    Ok(Some(CompositeConfig {
        nrgb_root,
        options: CompositeOptions {
            target_srs: args.target_crs.clone(),
            resolution: args.resolution,
        },
    }))
}

fn connect_catalog(args: &CliArgs) -> Result<Option<CatalogClient>, AppError> {
    let Some(url) = &args.catalog_url else {
        return Ok(None);
    };
    if args.composite_dir.is_none() {
        return Err(AppError::Requires {
            arg: "--catalog-url".to_string(),
            requires: "--composite-dir".to_string(),
        });
    }
    let email = args
        .catalog_email
        .as_deref()
        .ok_or_else(|| AppError::MissingArgument {
            arg: "--catalog-email".to_string(),
        })?;
    let password = args
        .catalog_password
        .as_deref()
        .ok_or_else(|| AppError::MissingArgument {
            arg: "--catalog-password".to_string(),
        })?;

    let client = CatalogClient::new(url, email, password)?.with_resource(&args.catalog_resource);
    if let Err(e) = client.login() {
        warn!("Catalog login failed ({}); uploads will retry it", e);
    }
    Ok(Some(client))
}

/// First Ctrl-C stops the batch after the running item; a second one exits.
fn install_interrupt_handler(cancel: &CancelToken) {
    let cancel = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            warn!("Second interrupt, exiting");
            std::process::exit(130);
        }
        warn!("Interrupt received; stopping after the current item (Ctrl-C again to exit)");
        cancel.cancel();
    });
    if let Err(e) = installed {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);

    let params = build_params(&args)?;
    if let Some(path) = &args.save_preset {
        params.save_preset(path)?;
    }

    let input = required(args.input.clone(), "--input")?;
    let output = required(args.output.clone(), "--output")?;

    info!("L2 archive: {:?}", input);
    info!("L3 archive: {:?}", output);
    info!("Calendar: {}", args.calendar);

    if args.dry_run {
        let plan = plan_batch(&input, &output, args.calendar)?;
        for item in &plan.items {
            info!("Would synthesize {}", item);
        }
        info!("Dry run complete: {} work items", plan.items.len());
        return Ok(());
    }

    let engine = ProcessEngine::new(required(args.engine.clone(), "--engine")?)
        .with_timeout(args.engine_timeout.map(Duration::from_secs));
    let composite = composite_config(&args)?;
    let catalog = connect_catalog(&args)?;

    let config = BatchConfig {
        l2_root: input,
        l3_root: output,
        calendar: args.calendar,
        params,
        stop_file: args.stop_file.clone(),
        composite,
    };

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    let report = run_batch(
        &config,
        engine,
        cancel,
        catalog.as_ref().map(|c| c as &dyn CatalogUploader),
    )?;
    report.log();

    Ok(())
}
