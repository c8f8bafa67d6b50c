//! Blob Storage scenarios.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::ops::Range;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use azure_storage::shared_access_signature::service_sas::BlobSasPermissions;
use azure_storage_blobs::prelude::*;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Error, ErrorCode, Result};

/// Page size for container and blob listings.
pub const PAGE_SIZE: u32 = 100;

/// Attempts per range when downloading a blob to a file.
pub const DOWNLOAD_RETRIES: u32 = 3;

/// Range size when downloading a blob to a file.
pub const DOWNLOAD_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Name of the blob uploaded with tags by the misc scenario.
pub const TAGGED_BLOB: &str = "testblob";

/// Name of the `i`-th numbered blob.
pub fn numbered_blob_name(i: usize) -> String {
    format!("testblob{}", i)
}

fn page_size() -> NonZeroU32 {
    NonZeroU32::new(PAGE_SIZE).unwrap_or(NonZeroU32::MIN)
}

/// Creates the container, treating `ContainerAlreadyExists` as success.
pub async fn create_container_if_not_exists(
    service: &BlobServiceClient,
    name: &str,
) -> Result<ContainerClient> {
    let container = service.container_client(name);

    match container.create().await {
        Ok(_) => info!(container = name, "created container"),
        Err(e) => {
            let err = Error::from(e);
            if !err.has_code(ErrorCode::ContainerAlreadyExists) {
                return Err(err);
            }
            debug!(container = name, "container already exists");
        }
    }

    Ok(container)
}

/// Lists every container in the account.
pub async fn list_containers(service: &BlobServiceClient) -> Result<Vec<String>> {
    let mut stream = service.list_containers().max_results(page_size()).into_stream();
    let mut names = Vec::new();

    while let Some(page) = stream.next().await {
        for container in page?.containers {
            info!(name = %container.name, "container");
            names.push(container.name);
        }
    }

    Ok(names)
}

/// Uploads `testblob0..count` with a timestamped body, overwriting existing
/// blobs.
pub async fn upload_numbered_blobs(container: &ContainerClient, count: usize) -> Result<()> {
    for i in 0..count {
        let name = numbered_blob_name(i);
        let body = format!("Hello, World! now={}", Utc::now());
        container.blob_client(&name).put_block_blob(body).await?;
        debug!(blob = %name, "uploaded blob");
    }

    info!(count, "uploaded blobs");
    Ok(())
}

/// Lists every blob in the container.
pub async fn list_blobs(container: &ContainerClient) -> Result<Vec<String>> {
    let mut stream = container.list_blobs().max_results(page_size()).into_stream();
    let mut names = Vec::new();

    while let Some(page) = stream.next().await {
        let page = page?;
        for blob in page.blobs.blobs() {
            info!(name = %blob.name, "blob");
            names.push(blob.name.clone());
        }
    }

    Ok(names)
}

/// Downloads a blob into memory through the chunked response stream.
pub async fn download_to_bytes(blob: &BlobClient) -> Result<Bytes> {
    let mut stream = blob.get().into_stream();
    let mut data = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk?.data.collect().await?;
        data.extend_from_slice(&bytes);
    }

    Ok(data.freeze())
}

/// Ranged reads of one blob.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Size of the blob in bytes.
    async fn content_length(&self) -> Result<u64>;

    /// Reads `range` of the blob.
    async fn fetch_range(&self, range: Range<u64>) -> Result<Bytes>;
}

#[async_trait]
impl RangeSource for BlobClient {
    async fn content_length(&self) -> Result<u64> {
        Ok(self.get_properties().await?.blob.properties.content_length)
    }

    async fn fetch_range(&self, range: Range<u64>) -> Result<Bytes> {
        let mut stream = self.get().range(range).into_stream();
        let mut data = BytesMut::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk?.data.collect().await?;
            data.extend_from_slice(&bytes);
        }

        Ok(data.freeze())
    }
}

/// Downloads a blob into `path`, replacing any existing file. Each range is
/// retried up to `max_retries` times. Returns the number of bytes written.
pub async fn download_to_file<S>(source: &S, path: &Path, max_retries: u32) -> Result<u64>
where
    S: RangeSource,
{
    download_in_chunks(source, path, max_retries, DOWNLOAD_CHUNK_SIZE).await
}

async fn download_in_chunks<S>(
    source: &S,
    path: &Path,
    max_retries: u32,
    chunk_size: u64,
) -> Result<u64>
where
    S: RangeSource,
{
    let length = source.content_length().await?;
    let mut file = tokio::fs::File::create(path).await?;
    let mut offset = 0;

    while offset < length {
        let end = (offset + chunk_size).min(length);
        let mut attempt = 0;

        let bytes = loop {
            match source.fetch_range(offset..end).await {
                Ok(bytes) => break bytes,
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    warn!(offset, end, attempt, error = %e, "range download failed, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        file.write_all(&bytes).await?;
        offset = end;
    }

    file.flush().await?;
    info!(path = %path.display(), bytes = length, "downloaded blob to file");
    Ok(length)
}

/// Deletes `testblob0..count`.
pub async fn delete_numbered_blobs(container: &ContainerClient, count: usize) -> Result<()> {
    for i in 0..count {
        container.blob_client(numbered_blob_name(i)).delete().await?;
    }

    info!(count, "deleted blobs");
    Ok(())
}

/// Deletes the container.
pub async fn delete_container(container: &ContainerClient) -> Result<()> {
    container.delete().await?;
    info!(container = %container.container_name(), "deleted container");
    Ok(())
}

/// Tags attached to the blob uploaded by the misc scenario.
pub fn sample_tags() -> HashMap<String, String> {
    (1..=4)
        .map(|i| (format!("tag{}", i), format!("value{}", i)))
        .collect()
}

/// Uploads a `text/plain` blob carrying `tags`.
pub async fn upload_with_tags(blob: &BlobClient, tags: &HashMap<String, String>) -> Result<()> {
    let mut blob_tags = Tags::new();
    for (key, value) in tags {
        blob_tags.insert(key.clone(), value.clone());
    }

    let body = format!("Hello, World!. time={}", Utc::now());
    blob.put_block_blob(body)
        .content_type("text/plain")
        .tags(blob_tags)
        .await?;

    info!(blob = %blob.blob_name(), tags = tags.len(), "uploaded tagged blob");
    Ok(())
}

/// Validity window of a generated SAS token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SasWindow {
    pub start: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl SasWindow {
    /// Window valid from one minute before `now` (clock skew) until 24 hours
    /// after it.
    pub fn around(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::minutes(1),
            expiry: now + Duration::hours(24),
        }
    }

    /// Returns true if `at` falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.expiry
    }
}

fn to_offset(dt: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Config(format!("timestamp {} out of range: {}", dt, e)))
}

fn from_offset(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

/// Generates a read-only SAS URL for the blob, valid for `window`.
pub async fn read_only_sas_url(blob: &BlobClient, window: SasWindow) -> Result<Url> {
    let permissions = BlobSasPermissions {
        read: true,
        ..Default::default()
    };

    let sas = blob
        .shared_access_signature(permissions, to_offset(window.expiry)?)
        .await?
        .start(to_offset(window.start)?);

    let url = blob.generate_signed_blob_url(&sas)?;
    info!(blob = %blob.blob_name(), expiry = %window.expiry, "generated SAS URL");
    Ok(url)
}

/// Reads the blob's tags.
pub async fn blob_tags(blob: &BlobClient) -> Result<HashMap<String, String>> {
    let tags: HashMap<String, String> = blob.get_tags().await?.tags.into();
    for (key, value) in &tags {
        info!(%key, %value, "tag");
    }
    Ok(tags)
}

/// Properties reported for a blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobSummary {
    pub content_type: String,
    pub content_length: u64,
    pub created_on: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Reads the blob's properties.
pub async fn blob_properties(blob: &BlobClient) -> Result<BlobSummary> {
    let properties = blob.get_properties().await?.blob.properties;

    let summary = BlobSummary {
        content_type: properties.content_type.clone(),
        content_length: properties.content_length,
        created_on: from_offset(properties.creation_time),
        last_modified: from_offset(properties.last_modified),
    };

    info!(
        content_type = %summary.content_type,
        created_on = ?summary.created_on,
        last_modified = ?summary.last_modified,
        "blob properties"
    );
    Ok(summary)
}

/// Create, list, upload, download both ways, then delete everything.
pub async fn run_basic(config: &Config) -> Result<()> {
    let service = crate::clients::blob_service_client(config)?;
    let container = create_container_if_not_exists(&service, &config.names.container).await?;

    let containers = list_containers(&service).await?;
    if !containers.contains(&config.names.container) {
        return Err(Error::Mismatch(format!(
            "container '{}' missing from listing",
            config.names.container
        )));
    }

    upload_numbered_blobs(&container, config.blob_count).await?;

    let blobs = list_blobs(&container).await?;
    if let Some(missing) = (0..config.blob_count)
        .map(numbered_blob_name)
        .find(|name| !blobs.contains(name))
    {
        return Err(Error::Mismatch(format!("blob '{}' missing from listing", missing)));
    }

    if config.blob_count > 0 {
        let content = download_to_bytes(&container.blob_client(numbered_blob_name(0))).await?;
        info!(content = %String::from_utf8_lossy(&content), "blob content");
    }

    if config.blob_count > 1 {
        let name = numbered_blob_name(1);
        let path: PathBuf = config.download_dir.join(&name);
        download_to_file(&container.blob_client(&name), &path, DOWNLOAD_RETRIES).await?;
    }

    delete_numbered_blobs(&container, config.blob_count).await?;
    delete_container(&container).await
}

/// Tagged upload, SAS generation, tag and property retrieval.
pub async fn run_misc(config: &Config) -> Result<()> {
    let service = crate::clients::blob_service_client(config)?;
    let container = create_container_if_not_exists(&service, &config.names.container).await?;
    let blob = container.blob_client(TAGGED_BLOB);

    let tags = sample_tags();
    upload_with_tags(&blob, &tags).await?;

    let url = read_only_sas_url(&blob, SasWindow::around(Utc::now())).await?;
    info!(%url, "SAS URL");

    let read_back = blob_tags(&blob).await?;
    if read_back != tags {
        return Err(Error::Mismatch(format!(
            "tags read back as {:?}, expected {:?}",
            read_back, tags
        )));
    }

    let summary = blob_properties(&blob).await?;
    if !summary.content_type.starts_with("text/plain") {
        return Err(Error::Mismatch(format!(
            "content type is '{}', expected text/plain",
            summary.content_type
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceFailure;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    /// In-memory blob whose first `failures` range reads fail.
    struct FlakyBlob {
        data: Bytes,
        failures: Mutex<u32>,
        reads: Mutex<Vec<Range<u64>>>,
    }

    impl FlakyBlob {
        fn new(data: &'static [u8], failures: u32) -> Self {
            Self {
                data: Bytes::from_static(data),
                failures: Mutex::new(failures),
                reads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RangeSource for FlakyBlob {
        async fn content_length(&self) -> Result<u64> {
            Ok(self.data.len() as u64)
        }

        async fn fetch_range(&self, range: Range<u64>) -> Result<Bytes> {
            self.reads.lock().push(range.clone());
            {
                let mut failures = self.failures.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(Error::Service(ServiceFailure::new(
                        503,
                        Some("ServerBusy"),
                        "The server is busy.",
                    )));
                }
            }
            Ok(self.data.slice(range.start as usize..range.end as usize))
        }
    }

    #[tokio::test]
    async fn test_download_retries_each_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        let blob = FlakyBlob::new(b"Hello, World!", DOWNLOAD_RETRIES);

        let written = download_to_file(&blob, &path, DOWNLOAD_RETRIES).await.unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&path).unwrap(), b"Hello, World!");
        assert_eq!(blob.reads.lock().len(), DOWNLOAD_RETRIES as usize + 1);
    }

    #[tokio::test]
    async fn test_download_gives_up_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        let blob = FlakyBlob::new(b"Hello, World!", DOWNLOAD_RETRIES + 1);

        let err = download_to_file(&blob, &path, DOWNLOAD_RETRIES).await.unwrap_err();

        assert!(matches!(err, Error::Service(ref f) if f.status == 503));
        assert_eq!(blob.reads.lock().len(), DOWNLOAD_RETRIES as usize + 1);
    }

    #[tokio::test]
    async fn test_download_assembles_ranges_and_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, b"stale content that is longer than the blob").unwrap();
        let blob = FlakyBlob::new(b"0123456789", 1);

        let written = download_in_chunks(&blob, &path, DOWNLOAD_RETRIES, 4).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
        // The first range failed once
        assert_eq!(*blob.reads.lock(), vec![0..4, 0..4, 4..8, 8..10]);
    }

    #[test]
    fn test_numbered_blob_names() {
        let names: Vec<_> = (0..3).map(numbered_blob_name).collect();
        assert_eq!(names, ["testblob0", "testblob1", "testblob2"]);
    }

    #[test]
    fn test_sas_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let window = SasWindow::around(now);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 0).unwrap());
        assert_eq!(window.expiry, Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap());
        assert!(window.contains(now));
        assert!(window.contains(now - Duration::seconds(30)));
        assert!(!window.contains(now + Duration::hours(24)));
        assert!(!window.contains(now - Duration::minutes(2)));
    }

    #[test]
    fn test_offset_conversion_round_trip() {
        let now = Utc.with_ymd_and_hms(2021, 8, 21, 1, 1, 0).unwrap();
        let offset = to_offset(now).unwrap();
        assert_eq!(offset.unix_timestamp(), now.timestamp());
        assert_eq!(from_offset(offset), Some(now));
    }

    #[test]
    fn test_sample_tags() {
        let tags = sample_tags();
        assert_eq!(tags.len(), 4);
        assert_eq!(tags.get("tag1").map(String::as_str), Some("value1"));
        assert_eq!(tags.get("tag4").map(String::as_str), Some("value4"));
    }
}
