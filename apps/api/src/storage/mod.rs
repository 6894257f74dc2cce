//! File storage behind a single trait so uploads land on local disk in
//! development and in an S3 bucket in production.

pub mod local;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::AppError;

pub use local::LocalDiskStore;
pub use s3::S3Store;

pub const PROFILE_PICTURES_DIR: &str = "profiles";
pub const CVS_DIR: &str = "cvs";
pub const CERTIFICATES_DIR: &str = "certificates";

/// A file received in a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Lower-cased extension of the client-supplied file name.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `contents` at `path`, replacing anything already there.
    async fn put(&self, path: &str, contents: Bytes, content_type: &str) -> Result<(), AppError>;

    /// Base URL that stored paths are served under.
    fn url_base(&self) -> &str;

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.url_base().trim_end_matches('/'), path)
    }
}

/// `dir/<uuid>.<ext>`; the random basename keeps uploads from colliding.
pub fn generate_path(dir: &str, extension: &str) -> String {
    format!("{dir}/{}.{extension}", Uuid::new_v4().simple())
}

/// Stores an upload under `dir` with a generated name and returns its path.
///
/// The stored content type follows the validated extension; the client's
/// multipart header is never trusted.
pub async fn store_upload(
    store: &dyn FileStore,
    dir: &str,
    file: UploadedFile,
) -> Result<String, AppError> {
    let extension = file.extension().unwrap_or_else(|| "bin".to_string());
    let path = generate_path(dir, &extension);
    store
        .put(&path, file.bytes, content_type_for(&extension))
        .await?;
    Ok(path)
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}
