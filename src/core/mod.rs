//! Core scheduling building blocks: period keys, product naming, engine
//! parameters and gap detection. These are consumed by the runner and the
//! high-level `api` module.
pub mod naming;
pub mod params;
pub mod period;
pub mod scheduler;
