//! Remote catalog uploads.
//!
//! [`CatalogClient`] logs in with email/password on first use and keeps the
//! token for every later upload. Packaged composites are posted as multipart forms carrying the
//! period year/month and the scene (tile) name. Anything implementing
//! [`CatalogUploader`] can stand in for the HTTP client.
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, multipart};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::composite::CompositeProduct;
use crate::error::{Error, Result};

pub const DEFAULT_RESOURCE: &str = "Sentinel2Raster";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const USER_AGENT: &str = concat!("synthpro/", env!("CARGO_PKG_VERSION"));

/// Form fields sent alongside a composite archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadMetadata {
    pub year: i32,
    pub month: u32,
    pub scene_name: String,
}

impl UploadMetadata {
    pub fn for_composite(product: &CompositeProduct) -> Self {
        Self {
            year: product.name.period.year,
            month: product.name.period.month,
            scene_name: product.name.tile.clone(),
        }
    }
}

pub trait CatalogUploader {
    fn upload(&self, zip_path: &Path, metadata: &UploadMetadata) -> Result<()>;
}

impl<F> CatalogUploader for F
where
    F: Fn(&Path, &UploadMetadata) -> Result<()>,
{
    fn upload(&self, zip_path: &Path, metadata: &UploadMetadata) -> Result<()> {
        self(zip_path, metadata)
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// HTTP client for the catalog. Logs in on first use and again after the
/// token is rejected, so an unreachable catalog fails uploads, not the run.
pub struct CatalogClient {
    client: Client,
    base_url: String,
    resource: String,
    email: String,
    password: String,
    token: Mutex<Option<String>>,
    retry_delay: Duration,
}

impl CatalogClient {
    pub fn new(base_url: &str, email: &str, password: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            resource: DEFAULT_RESOURCE.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            token: Mutex::new(None),
            retry_delay: RETRY_DELAY,
        })
    }

    pub fn with_resource<S: Into<String>>(mut self, resource: S) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn login_url(&self) -> String {
        format!("{}/accounts/api/auth/login", self.base_url)
    }

    pub fn upload_url(&self) -> String {
        format!("{}/api/{}/", self.base_url, self.resource)
    }

    fn cached_token(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Authenticate with the configured credentials and keep the token.
    pub fn login(&self) -> Result<()> {
        let url = self.login_url();
        debug!("Logging in to catalog at {}", url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                email: &self.email,
                password: &self.password,
            })
            .send()?;
        if !response.status().is_success() {
            return Err(Error::Upload(format!(
                "login failed: HTTP {}",
                response.status().as_u16()
            )));
        }
        let LoginResponse { token } = response.json()?;
        info!("Logged in to catalog {}", self.base_url);
        *self.cached_token() = Some(token);
        Ok(())
    }

    fn token(&self) -> Result<String> {
        if let Some(token) = self.cached_token().clone() {
            return Ok(token);
        }
        self.login()?;
        self.cached_token()
            .clone()
            .ok_or_else(|| Error::upload("login returned no token"))
    }

    fn try_upload_once(&self, zip_path: &Path, metadata: &UploadMetadata) -> Result<()> {
        let token = self.token()?;
        let form = multipart::Form::new()
            .text("year", metadata.year.to_string())
            .text("month", metadata.month.to_string())
            .text("scene_name", metadata.scene_name.clone())
            .file("zip_file", zip_path)?;

        let response = self
            .client
            .post(self.upload_url())
            .header("Authorization", format!("Token {token}"))
            .multipart(form)
            .send()?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            *self.cached_token() = None;
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Upload(format!(
                "HTTP {} {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                body.trim()
            )));
        }
        Ok(())
    }
}

impl CatalogUploader for CatalogClient {
    fn upload(&self, zip_path: &Path, metadata: &UploadMetadata) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            debug!("Upload attempt {} of {} for {:?}", attempt, MAX_ATTEMPTS, zip_path);
            match self.try_upload_once(zip_path, metadata) {
                Ok(()) => {
                    info!("Uploaded {:?}", zip_path);
                    return Ok(());
                }
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        warn!("Upload attempt {} failed ({}), retrying...", attempt, e);
                        thread::sleep(self.retry_delay);
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::upload("upload failed after all retries")))
    }
}
