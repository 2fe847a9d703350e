use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info};

use crate::contract::{PublishError, Publisher};

/// Publishes tarballs by running `<command> ingest -t <tar> -b <path> <repository>`.
#[derive(Debug, Clone)]
pub struct IngestPublisher {
    command: String,
}

impl IngestPublisher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Value passed to `-b`: the target path, or `/` for the repository root.
    fn base_dir(target_path: &str) -> &str {
        if target_path.is_empty() {
            "/"
        } else {
            target_path
        }
    }
}

#[async_trait]
impl Publisher for IngestPublisher {
    async fn publish(
        &self,
        repository: &str,
        tarball: &Path,
        target_path: &str,
    ) -> Result<(), PublishError> {
        let base_dir = Self::base_dir(target_path);
        info!(
            command = %self.command,
            repository,
            tarball = %tarball.display(),
            base_dir,
            "Starting ingest"
        );

        let output = Command::new(&self.command)
            .arg("ingest")
            .arg("-t")
            .arg(tarball)
            .arg("-b")
            .arg(base_dir)
            .arg(repository)
            .output()
            .await
            .map_err(|e| {
                error!(error = ?e, command = %self.command, "Failed to launch ingest process");
                PublishError::Launch(e)
            })?;

        if output.status.success() {
            info!(repository, base_dir, status = ?output.status, "Ingest finished");
            return Ok(());
        }

        error!(
            repository,
            base_dir,
            status = %output.status,
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Ingest exited with non-zero code"
        );
        Err(PublishError::Failed {
            repository: repository.to_string(),
            status: output.status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_target_maps_to_slash() {
        assert_eq!(IngestPublisher::base_dir(""), "/");
        assert_eq!(IngestPublisher::base_dir("repo/sub"), "repo/sub");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_decides_outcome() {
        let tarball = tempfile::NamedTempFile::new().unwrap();

        let ok = IngestPublisher::new("true");
        assert!(ok.publish("repo.example.org", tarball.path(), "").await.is_ok());

        let failing = IngestPublisher::new("false");
        let err = failing
            .publish("repo.example.org", tarball.path(), "a/b")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Failed { .. }));

        let missing = IngestPublisher::new("/nonexistent/portals-ingest");
        let err = missing
            .publish("repo.example.org", tarball.path(), "a/b")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Launch(_)));
    }
}
