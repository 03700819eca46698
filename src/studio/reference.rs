//! Reference image held in memory for a single submission

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

use crate::api::models::ReferenceType;
use crate::error::{AppError, Result};

/// Largest upload the server accepts
pub const MAX_REFERENCE_BYTES: usize = 16 * 1024 * 1024;

/// Encoded reference image plus its classification tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    data_url: String,
    pub kind: ReferenceType,
}

impl ReferenceImage {
    /// Wrap an already-encoded `data:` URL
    pub fn from_data_url(data_url: impl Into<String>, kind: ReferenceType) -> Result<Self> {
        let data_url = data_url.into();
        if !data_url.starts_with("data:image/") || !data_url.contains(";base64,") {
            return Err(AppError::InvalidRequest(
                "Reference image must be a base64 image data URL".to_string(),
            ));
        }
        Ok(Self { data_url, kind })
    }

    /// Encode raw image bytes
    pub fn from_bytes(bytes: &[u8], mime: &str, kind: ReferenceType) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AppError::precondition("Reference image is empty"));
        }
        if bytes.len() > MAX_REFERENCE_BYTES {
            return Err(AppError::precondition(format!(
                "Reference image is larger than {} MB",
                MAX_REFERENCE_BYTES / (1024 * 1024)
            )));
        }
        Ok(Self {
            data_url: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
            kind,
        })
    }

    /// Read and encode an image file; the MIME type comes from the extension
    pub fn from_file(path: impl AsRef<Path>, kind: ReferenceType) -> Result<Self> {
        let path = path.as_ref();
        let mime = mime_for(path).ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "Unsupported reference image type: {}",
                path.display()
            ))
        })?;
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, mime, kind)
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Size of the encoded payload in bytes
    pub fn encoded_len(&self) -> usize {
        self.data_url.len()
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
