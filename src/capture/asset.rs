//! Images as the rest of the application sees them

use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::client::ImageUpload;

/// A user-supplied file with its declared media type
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring its media type from the extension
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }
}

/// True for any `image/*` media type
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .trim()
        .to_ascii_lowercase()
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

/// Build a `data:<mime>;base64,<payload>` URL
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Split a base64 data URL into its media type and decoded bytes
pub fn decode_data_url(data_url: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let bytes = general_purpose::STANDARD.decode(payload.trim()).ok()?;
    Some((mime_type.to_string(), bytes))
}

/// The image currently held by the capture component.
///
/// The data URL is the display form; `raw` keeps the original bytes when they
/// are known so re-submission doesn't need to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    data_url: String,
    raw: Option<ImageUpload>,
}

impl ImageAsset {
    pub fn from_bytes(bytes: Vec<u8>, mime_type: &str) -> Self {
        let data_url = encode_data_url(mime_type, &bytes);
        Self {
            data_url,
            raw: Some(ImageUpload::new(bytes, mime_type)),
        }
    }

    /// Wrap a data URL restored from the cache
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
            raw: None,
        }
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn raw(&self) -> Option<&ImageUpload> {
        self.raw.as_ref()
    }

    /// Bytes to upload, decoding the data URL when no raw handle is held
    pub fn upload(&self) -> Option<ImageUpload> {
        if let Some(raw) = &self.raw {
            return Some(raw.clone());
        }
        decode_data_url(&self.data_url).map(|(mime, bytes)| ImageUpload::new(bytes, mime))
    }

    /// SHA-256 of the data URL, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.data_url.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
