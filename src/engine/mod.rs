//! External synthesis engine.
//!
//! The scheduler never knows how the engine is loaded: anything implementing
//! [`SynthesisEngine`] can serve a [`SynthesisRunner`]. [`ProcessEngine`]
//! drives a WASP-style executable; closures implement the trait for in-process
//! engines and tests.
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::params::SynthesisParams;
use crate::core::scheduler::WorkItem;
use crate::types::PeriodKey;

pub mod runner;
pub use runner::{BatchSummary, CancelToken, ItemFailure, SynthesisOutcome, SynthesisRunner};

/// Lines of engine output kept in failure reports
const LOG_TAIL_LINES: usize = 20;

/// Interval between exit polls when a timeout is set
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Errors of a single synthesis invocation. Never fatal to a batch.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    #[error("failed to launch engine {engine:?}: {reason}")]
    Launch { engine: PathBuf, reason: String },

    #[error("engine exited with {status}: {log_tail}")]
    Exit { status: String, log_tail: String },

    #[error("engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("synthesis date {date} is outside period {period}")]
    DateOutsidePeriod { date: NaiveDate, period: PeriodKey },

    #[error("engine wrote no product for period {period} in {dir:?}")]
    NoOutput { period: PeriodKey, dir: PathBuf },

    #[error("I/O error on {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("{0}")]
    Engine(String),
}

impl SynthesisError {
    pub fn io<P: Into<PathBuf>, E: std::fmt::Display>(path: P, e: E) -> Self {
        SynthesisError::Io {
            path: path.into(),
            reason: e.to_string(),
        }
    }
}

/// Capability to synthesize one work item with fully materialized parameters.
pub trait SynthesisEngine {
    fn run(&self, item: &WorkItem, params: &SynthesisParams) -> Result<(), SynthesisError>;
}

impl<F> SynthesisEngine for F
where
    F: Fn(&WorkItem, &SynthesisParams) -> Result<(), SynthesisError>,
{
    fn run(&self, item: &WorkItem, params: &SynthesisParams) -> Result<(), SynthesisError> {
        self(item, params)
    }
}

/// Runs the engine as a child process, one invocation per work item.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessEngine {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill invocations that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command-line arguments for one invocation.
    pub fn arguments(item: &WorkItem, params: &SynthesisParams) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--input".into()];
        args.extend(item.inputs.iter().map(|p| p.as_os_str().to_owned()));
        args.push("--out".into());
        args.push(item.output_dir.as_os_str().to_owned());

        if let Some(temp) = &params.temp_dir {
            args.push("--tempout".into());
            args.push(temp.as_os_str().to_owned());
        }
        args.push("--version".into());
        args.push(params.version.clone().into());
        if let Some(log) = &params.log_path {
            args.push("--logpath".into());
            args.push(log.as_os_str().to_owned());
        }
        if let Some(date) = params.date {
            args.push("--date".into());
            args.push(date.format("%Y%m%d").to_string().into());
        }
        if let Some(prev) = &params.prev_l3a {
            args.push("--pathprevL3A".into());
            args.push(prev.as_os_str().to_owned());
        }
        if let Some(path) = &params.scattering_coeff_path {
            args.push("--scatteringcoeffpath".into());
            args.push(path.as_os_str().to_owned());
        }

        let numeric = [
            ("--synthalf", params.synth_half.to_string()),
            ("--weightaotmin", params.weight_aot_min.to_string()),
            ("--weightaotmax", params.weight_aot_max.to_string()),
            ("--aotmax", params.aot_max.to_string()),
            ("--coarseres", params.coarse_res.to_string()),
            ("--kernelwidth", params.kernel_width.to_string()),
            ("--sigmasmallcloud", params.sigma_small_cloud.to_string()),
            ("--sigmalargecloud", params.sigma_large_cloud.to_string()),
            ("--weightdatemin", params.weight_date_min.to_string()),
            ("--nthreads", params.n_threads.to_string()),
        ];
        for (flag, value) in numeric {
            args.push(flag.into());
            args.push(value.into());
        }

        if params.cog {
            args.push("--cog".into());
        }
        if params.remove_temp {
            args.push("--removeTemp".into());
        }
        args
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, SynthesisError> {
        let Some(timeout) = self.timeout else {
            return child.wait().map_err(|e| SynthesisError::io(&self.program, e));
        };
        let start = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| SynthesisError::io(&self.program, e))?
            {
                return Ok(status);
            }
            if start.elapsed() >= timeout {
                warn!("Engine exceeded {:?}; killing pid {}", timeout, child.id());
                let _ = child.kill();
                let _ = child.wait();
                return Err(SynthesisError::Timeout(timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl SynthesisEngine for ProcessEngine {
    fn run(&self, item: &WorkItem, params: &SynthesisParams) -> Result<(), SynthesisError> {
        let log_dir = params.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&log_dir).map_err(|e| SynthesisError::io(&log_dir, e))?;
        let log_path = log_dir.join(format!("engine_{}_{}.log", item.tile, item.period));
        let log = File::create(&log_path).map_err(|e| SynthesisError::io(&log_path, e))?;
        let log_err = log.try_clone().map_err(|e| SynthesisError::io(&log_path, e))?;

        let args = Self::arguments(item, params);
        debug!("Engine command: {:?} {:?}", self.program, args);
        info!("Running engine for {} (log: {:?})", item, log_path);

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        // Own process group: a terminal Ctrl-C stops the batch, not the running item.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let mut child = command
            .spawn()
            .map_err(|e| SynthesisError::Launch {
                engine: self.program.clone(),
                reason: e.to_string(),
            })?;

        let status = self.wait(&mut child)?;
        if !status.success() {
            return Err(SynthesisError::Exit {
                status: status.to_string(),
                log_tail: log_tail(&log_path, LOG_TAIL_LINES),
            });
        }
        Ok(())
    }
}

/// Last `lines` lines of an engine log, joined on one line.
fn log_tail(path: &Path, lines: usize) -> String {
    let Ok(bytes) = fs::read(path) else {
        return String::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join(" | ")
}
