use chrono::DateTime;
use portals::daemon::{ping_once, PING_KEY};
use portals_core::contract::{MockObjectStore, StoreError};

#[tokio::test]
async fn ping_writes_a_timestamp_to_the_status_bucket() {
    let mut store = MockObjectStore::new();
    store
        .expect_upload()
        .times(1)
        .returning(|bucket: &str, key: &str, body: Vec<u8>, content_type: &str| {
            assert_eq!(bucket, "software.status");
            assert_eq!(key, PING_KEY);
            assert_eq!(content_type, "text");
            let text = String::from_utf8(body).unwrap();
            assert!(DateTime::parse_from_rfc3339(&text).is_ok(), "not a timestamp: {text}");
            Ok(())
        });

    ping_once(&store, "software.status").await.unwrap();
}

#[tokio::test]
async fn ping_reports_upload_errors() {
    let mut store = MockObjectStore::new();
    store.expect_upload().returning(|bucket: &str, key: &str, _: Vec<u8>, _: &str| {
        Err(StoreError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: "access denied".into(),
        })
    });

    let err = ping_once(&store, "software.status").await.unwrap_err();
    assert!(matches!(err, StoreError::Upload { .. }));
}
