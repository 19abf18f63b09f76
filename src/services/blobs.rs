use std::path::Path as FsPath;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{Attribute, Attributes, GetOptions, ObjectStore, PutMultipartOpts, WriteMultipart};
use percent_encoding::percent_decode_str;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, Result};
use crate::models::blob::{BlobProperties, BlobSummary};
use crate::services::containers::ContainerAdmin;

/// The user metadata key holding the download filename.
pub const FILENAME_METADATA_KEY: &str = "filename";

/// Size of the chunks read from a spooled upload.
const UPLOAD_CHUNK_BYTES: usize = 1024 * 1024;

/// Parts of one upload allowed in flight at once.
const MAX_CONCURRENT_PARTS: usize = 4;

/// Content type recorded when neither the upload nor sniffing yields one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Blob operations scoped to the single configured container.
///
/// Retries happen inside the clients according to their configured policy;
/// every call here either succeeds or reports one terminal error.
#[derive(Clone)]
pub struct BlobGateway {
    store: Arc<dyn ObjectStore>,
    admin: Arc<dyn ContainerAdmin>,
    container: String,
}

impl BlobGateway {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        admin: Arc<dyn ContainerAdmin>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            store,
            admin,
            container: container.into(),
        }
    }

    /// The name of the container every blob lives in.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Creates the container if it does not exist yet.
    pub async fn ensure_container(&self) -> Result<bool> {
        self.admin.ensure_container(&self.container).await
    }

    /// Makes blob content publicly downloadable by direct URL.
    pub async fn set_public_read_acl(&self) -> Result<()> {
        self.admin.set_public_read_acl(&self.container).await
    }

    /// Lists the blobs in the container, in backend order.
    pub async fn list(&self) -> Result<Vec<BlobSummary>> {
        let blobs = self
            .store
            .list(None)
            .map_ok(|meta| BlobSummary {
                name: item_name(&meta.location),
                size: meta.size,
                last_modified: meta.last_modified,
            })
            .try_collect::<Vec<_>>()
            .await?;

        tracing::debug!("Listed {} blobs in {}", blobs.len(), self.container);
        Ok(blobs)
    }

    /// Reads the content type and filename metadata of one blob.
    pub async fn get_properties(&self, name: &str) -> Result<BlobProperties> {
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = self.store.get_opts(&Path::from(name), options).await?;
        let attributes = &result.attributes;

        Ok(BlobProperties {
            content_type: attributes
                .get(&Attribute::ContentType)
                .map(|v| v.to_string())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            file_name: attributes
                .get(&Attribute::Metadata(FILENAME_METADATA_KEY.into()))
                .map(|v| v.to_string()),
        })
    }

    /// Copies the blob's bytes into `sink`, returning the number written.
    ///
    /// An error after the first chunk leaves whatever reached the sink in place.
    pub async fn stream_to<W>(&self, name: &str, mut sink: W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut stream = self.store.get(&Path::from(name)).await?.into_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        sink.shutdown().await?;
        Ok(written)
    }

    /// Uploads a local file as `name`, overwriting any blob with that name.
    ///
    /// # Arguments
    ///
    /// * `name` - The blob key, as entered by the user.
    /// * `local_path` - The spooled upload to read from.
    /// * `content_type` - The content type recorded on the blob.
    /// * `metadata_file_name` - The download filename stored as `filename` metadata.
    ///
    /// The file is streamed in parts, so it is never held in memory whole. A
    /// failed part aborts the upload and leaves any previous blob untouched.
    pub async fn put_from_local_file(
        &self,
        name: &str,
        local_path: &FsPath,
        content_type: &str,
        metadata_file_name: &str,
    ) -> Result<()> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        attributes.insert(
            Attribute::Metadata(FILENAME_METADATA_KEY.into()),
            metadata_file_name.to_string().into(),
        );
        let options = PutMultipartOpts {
            attributes,
            ..Default::default()
        };

        let file = tokio::fs::File::open(local_path).await?;
        let upload = self
            .store
            .put_multipart_opts(&Path::from(name), options)
            .await?;
        let mut writer = WriteMultipart::new(upload);

        match copy_parts(file, &mut writer).await {
            Ok(size) => {
                writer.finish().await?;
                tracing::info!(
                    "✅ Blob stored: {}/{} ({} bytes, {})",
                    self.container,
                    name,
                    size,
                    content_type
                );
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = writer.abort().await {
                    tracing::warn!("⚠️ Aborting upload of {} failed: {}", name, abort);
                }
                Err(e)
            }
        }
    }

    /// Removes a blob. A missing blob is reported as not found.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = Path::from(name);
        self.store.head(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => AppError::NotFound(format!("blob {}", name)),
            other => AppError::Storage(other),
        })?;
        self.store.delete(&path).await?;

        tracing::info!("🗑️ Blob deleted: {}/{}", self.container, name);
        Ok(())
    }
}

/// Feeds the file into the multipart writer, returning the bytes written.
async fn copy_parts(file: tokio::fs::File, writer: &mut WriteMultipart) -> Result<u64> {
    let mut chunks = ReaderStream::with_capacity(file, UPLOAD_CHUNK_BYTES);
    let mut size = 0u64;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await?;
        size += chunk.len() as u64;
        writer.write(&chunk);
    }

    Ok(size)
}

/// The item name a listed object was stored under.
///
/// Object locations are kept percent-encoded, so the name has to be decoded
/// before it can be handed back to `Path::from`.
fn item_name(location: &Path) -> String {
    percent_decode_str(location.as_ref())
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::containers::{ContainerAccess, MemoryContainerAdmin};
    use object_store::memory::InMemory;
    use std::io::Write;

    fn gateway() -> (BlobGateway, Arc<MemoryContainerAdmin>) {
        let admin = Arc::new(MemoryContainerAdmin::new());
        let gateway = BlobGateway::new(Arc::new(InMemory::new()), admin.clone(), "webpi");
        (gateway, admin)
    }

    fn temp_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn ensure_container_twice_keeps_one_public_container() {
        let (gateway, admin) = gateway();

        assert!(gateway.ensure_container().await.unwrap());
        gateway.set_public_read_acl().await.unwrap();
        assert!(!gateway.ensure_container().await.unwrap());

        assert_eq!(
            admin.containers().await,
            vec![("webpi".to_string(), ContainerAccess::PublicBlob)]
        );
    }

    #[tokio::test]
    async fn upload_records_content_type_and_filename() {
        let (gateway, _) = gateway();
        let file = temp_file(b"%PDF-1.4 quarterly");

        gateway
            .put_from_local_file("report", file.path(), "application/pdf", "report.pdf")
            .await
            .unwrap();

        let properties = gateway.get_properties("report").await.unwrap();
        assert_eq!(properties.content_type, "application/pdf");
        assert_eq!(properties.file_name.as_deref(), Some("report.pdf"));
    }

    #[tokio::test]
    async fn stream_to_copies_all_bytes() {
        let (gateway, _) = gateway();
        let file = temp_file(b"hello blob");
        gateway
            .put_from_local_file("greeting", file.path(), "text/plain", "greeting.txt")
            .await
            .unwrap();

        let mut sink = Vec::new();
        let written = gateway.stream_to("greeting", &mut sink).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(sink, b"hello blob");
    }

    #[tokio::test]
    async fn reupload_under_same_name_overwrites() {
        let (gateway, _) = gateway();
        let first = temp_file(b"one");
        let second = temp_file(b"two two");

        gateway
            .put_from_local_file("item", first.path(), "text/plain", "item.txt")
            .await
            .unwrap();
        gateway
            .put_from_local_file("item", second.path(), "text/csv", "item.csv")
            .await
            .unwrap();

        let blobs = gateway.list().await.unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].name, "item");
        assert_eq!(blobs[0].size, 7);
        assert_eq!(
            gateway.get_properties("item").await.unwrap().file_name.as_deref(),
            Some("item.csv")
        );
    }

    #[tokio::test]
    async fn listing_returns_names_usable_for_lookup() {
        let (gateway, _) = gateway();
        let file = temp_file(b"discount");

        for name in ["50%off", "a#b", "q3 report", "{draft}"] {
            gateway
                .put_from_local_file(name, file.path(), "text/plain", "notes.txt")
                .await
                .unwrap();
        }

        let mut names: Vec<String> = gateway.list().await.unwrap().into_iter().map(|b| b.name).collect();
        names.sort();
        assert_eq!(names, vec!["50%off", "a#b", "q3 report", "{draft}"]);

        for name in &names {
            assert!(gateway.get_properties(name).await.is_ok(), "lookup of {}", name);
            gateway.delete(name).await.unwrap();
        }
        assert!(gateway.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn large_upload_is_stored_in_parts() {
        let (gateway, _) = gateway();
        let contents: Vec<u8> = (0..(UPLOAD_CHUNK_BYTES * 5 / 2)).map(|i| (i % 251) as u8).collect();
        let file = temp_file(&contents);

        gateway
            .put_from_local_file("big", file.path(), "application/octet-stream", "big.bin")
            .await
            .unwrap();

        let mut sink = Vec::new();
        let written = gateway.stream_to("big", &mut sink).await.unwrap();
        assert_eq!(written, contents.len() as u64);
        assert_eq!(sink, contents);
        assert_eq!(
            gateway.get_properties("big").await.unwrap().file_name.as_deref(),
            Some("big.bin")
        );
    }

    #[tokio::test]
    async fn missing_local_file_stores_nothing() {
        let (gateway, _) = gateway();
        let dir = tempfile::tempdir().unwrap();

        let err = gateway
            .put_from_local_file("ghost", &dir.path().join("absent"), "text/plain", "ghost.txt")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Io(_)));
        assert!(gateway.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let (gateway, _) = gateway();

        assert!(gateway.get_properties("ghost").await.unwrap_err().is_not_found());
        assert!(gateway.delete("ghost").await.unwrap_err().is_not_found());
        assert!(gateway.stream_to("ghost", Vec::new()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_removes_blob() {
        let (gateway, _) = gateway();
        let file = temp_file(b"bye");
        gateway
            .put_from_local_file("old", file.path(), "text/plain", "old.txt")
            .await
            .unwrap();

        gateway.delete("old").await.unwrap();
        assert!(gateway.list().await.unwrap().is_empty());
    }
}
