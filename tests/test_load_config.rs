use portals::load_config::{load_config, ACCESS_KEY_ENV, SECRET_KEY_ENV};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

fn clear_credentials() {
    env::remove_var(ACCESS_KEY_ENV);
    env::remove_var(SECRET_KEY_ENV);
}

/// A minimal portal gets the default status bucket, region and pipeline sizing.
#[tokio::test]
#[serial]
async fn test_load_config_fills_defaults() {
    clear_credentials();
    let file = config_file(
        r#"
portals:
  - access_key: AKIA
    secret_key: s3cr3t
    bucket: software
    host_url: http://localhost:9000
    repository: software.example.org
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.portals.len(), 1);
    let portal = &config.portals[0];
    assert_eq!(portal.status_bucket(), "software.status");
    assert_eq!(portal.region, "us-east-1");
    assert_eq!(portal.repository, "software.example.org");
    assert_eq!(config.pipeline.buffer_size, 10);
    assert_eq!(config.pipeline.workers, 10);
    assert_eq!(config.pipeline.poll_interval_secs, 0);
    assert_eq!(config.pipeline.scratch_dir, None);
    assert_eq!(config.publisher.command, "cvmfs_server");
}

/// Every section can be overridden, and portals may share a repository.
#[tokio::test]
#[serial]
async fn test_load_config_with_all_sections() {
    clear_credentials();
    let file = config_file(
        r#"
pipeline:
  buffer_size: 4
  workers: 2
  scratch_dir: /var/spool/portals
  poll_interval_secs: 15
publisher:
  command: /usr/local/bin/ingest
portals:
  - access_key: a1
    secret_key: s1
    bucket: first
    status_bucket: first-markers
    region: eu-west-1
    host_url: https://s3.example.org
    repository: shared.example.org
  - access_key: a2
    secret_key: s2
    bucket: second
    host_url: https://s3.example.org
    repository: shared.example.org
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.pipeline.buffer_size, 4);
    assert_eq!(config.pipeline.workers, 2);
    assert_eq!(
        config.pipeline.scratch_dir,
        Some(PathBuf::from("/var/spool/portals"))
    );
    assert_eq!(config.pipeline.poll_interval_secs, 15);
    assert_eq!(config.publisher.command, "/usr/local/bin/ingest");
    assert_eq!(config.portals[0].status_bucket(), "first-markers");
    assert_eq!(config.portals[0].region, "eu-west-1");
    assert_eq!(config.repository_names(), vec!["shared.example.org"]);
}

/// Credentials left out of the file are taken from the environment.
#[tokio::test]
#[serial]
async fn test_load_config_reads_credentials_from_env() {
    let file = config_file(
        r#"
portals:
  - bucket: software
    host_url: http://localhost:9000
    repository: software.example.org
  - access_key: from-file
    secret_key: also-from-file
    bucket: other
    host_url: http://localhost:9000
    repository: software.example.org
"#,
    );
    env::set_var(ACCESS_KEY_ENV, "env-access");
    env::set_var(SECRET_KEY_ENV, "env-secret");

    let config = load_config(file.path()).expect("Config should load");
    clear_credentials();

    assert_eq!(config.portals[0].access_key, "env-access");
    assert_eq!(config.portals[0].secret_key, "env-secret");
    assert_eq!(config.portals[1].access_key, "from-file");
    assert_eq!(config.portals[1].secret_key, "also-from-file");
}

/// Without the file or the environment providing a key, loading fails.
#[tokio::test]
#[serial]
async fn test_load_config_errors_on_missing_credentials() {
    clear_credentials();
    let file = config_file(
        r#"
portals:
  - bucket: software
    host_url: http://localhost:9000
    repository: software.example.org
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(
        msg.contains("missing access_key"),
        "Missing credential expected, got: {msg}"
    );
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_on_zero_workers() {
    clear_credentials();
    let file = config_file(
        r#"
pipeline:
  workers: 0
portals:
  - access_key: a
    secret_key: s
    bucket: software
    host_url: http://localhost:9000
    repository: software.example.org
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("workers"), "Worker error expected, got: {msg}");
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_on_empty_portal_list() {
    clear_credentials();
    let file = config_file("portals: []\n");

    let err = load_config(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("no portals configured"));
}

/// This test ensures that if the config file is not valid YAML, load_config errors and reports as such.
#[tokio::test]
#[serial]
async fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");

    let err = load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_for_missing_file() {
    let err = load_config("/nonexistent/portals.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
