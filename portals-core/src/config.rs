use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything the daemon needs: pipeline sizing, the publish command and the
/// list of portals (bucket pairs wired to a repository).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    pub portals: Vec<PortalConfig>,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            portals_count = self.portals.len(),
            buffer_size = self.pipeline.buffer_size,
            workers = self.pipeline.workers,
            publisher = %self.publisher.command,
            "Loaded Config"
        );
        for portal in &self.portals {
            portal.trace_loaded();
        }
        debug!(pipeline = ?self.pipeline, "Pipeline config loaded (full debug)");
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.portals.is_empty() {
            return Err(ConfigError::NoPortals);
        }
        if self.pipeline.buffer_size == 0 {
            return Err(ConfigError::ZeroBuffer);
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        for portal in &self.portals {
            portal.validate()?;
        }
        Ok(())
    }

    /// Distinct repository names, in configuration order.
    pub fn repository_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for portal in &self.portals {
            if !names.contains(&portal.repository) {
                names.push(portal.repository.clone());
            }
        }
        names
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no portals configured")]
    NoPortals,
    #[error("pipeline buffer_size must be at least 1")]
    ZeroBuffer,
    #[error("pipeline workers must be at least 1")]
    ZeroWorkers,
    #[error("portal has an empty bucket name")]
    EmptyBucket,
    #[error("portal for bucket {0} has no repository")]
    EmptyRepository(String),
    #[error("portal for bucket {0} is missing {1}")]
    MissingCredential(String, &'static str),
}

/// Sizing of the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Capacity of every channel between stages.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Number of workers spawned per stage.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Where downloaded tarballs are staged. Defaults to the system temp dir.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Pause between two listings of the same bucket. Zero re-lists at once.
    #[serde(default)]
    pub poll_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            workers: default_workers(),
            scratch_dir: None,
            poll_interval_secs: 0,
        }
    }
}

fn default_buffer_size() -> usize {
    10
}

fn default_workers() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Binary invoked as `<command> ingest -t <tar> -b <path> <repository>`.
    #[serde(default = "default_publisher_command")]
    pub command: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            command: default_publisher_command(),
        }
    }
}

fn default_publisher_command() -> String {
    "cvmfs_server".to_string()
}

/// One data bucket, its status bucket and the repository it feeds.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortalConfig {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    pub bucket: String,
    #[serde(default)]
    pub status_bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    pub host_url: String,
    pub repository: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl PortalConfig {
    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.bucket,
            status_bucket = %self.status_bucket(),
            region = %self.region,
            host_url = %self.host_url,
            repository = %self.repository,
            "Loaded portal"
        );
    }

    /// The configured status bucket, or `<bucket>.status`.
    pub fn status_bucket(&self) -> String {
        match &self.status_bucket {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}.status", self.bucket),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::EmptyBucket);
        }
        if self.repository.is_empty() {
            return Err(ConfigError::EmptyRepository(self.bucket.clone()));
        }
        if self.access_key.is_empty() {
            return Err(ConfigError::MissingCredential(
                self.bucket.clone(),
                "access_key",
            ));
        }
        if self.secret_key.is_empty() {
            return Err(ConfigError::MissingCredential(
                self.bucket.clone(),
                "secret_key",
            ));
        }
        Ok(())
    }
}

// Secrets never reach the logs.
impl std::fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalConfig")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("status_bucket", &self.status_bucket())
            .field("region", &self.region)
            .field("host_url", &self.host_url)
            .field("repository", &self.repository)
            .finish()
    }
}
