use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{constants::IMAGE_EXTENSIONS, error::ApiError};

/// Decoded `data:image/<ext>;base64,<payload>` value.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn decode_image(field: &str, value: &str) -> Result<DecodedImage, ApiError> {
    let invalid = |message: &str| ApiError::validation(field, message);

    let (header, payload) = value
        .trim()
        .split_once(";base64,")
        .ok_or_else(|| invalid("Expected a base64 encoded data URI"))?;
    let extension = header
        .strip_prefix("data:image/")
        .ok_or_else(|| invalid("Expected an image data URI"))?
        .to_ascii_lowercase();

    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid("Unsupported image format"));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid("Image is not valid base64"))?;
    if bytes.is_empty() {
        return Err(invalid("The submitted file is empty"));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Stores uploaded images under the media root and builds their public URLs.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    url_prefix: String,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    /// Writes the image and returns its path relative to the media root.
    pub async fn save(&self, folder: &str, image: DecodedImage) -> Result<String, ApiError> {
        let relative = format!("{folder}/{}.{}", uuid::Uuid::new_v4(), image.extension);
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                log::error!("Failed to create {}: {e}", parent.display());
                ApiError::Internal("Failed to store image".to_string())
            })?;
        }
        tokio::fs::write(&target, &image.bytes).await.map_err(|e| {
            log::error!("Failed to write {}: {e}", target.display());
            ApiError::Internal("Failed to store image".to_string())
        })?;

        log::trace!("> Stored image {relative}");
        Ok(relative)
    }

    /// Best effort; a missing file is not an error.
    pub async fn delete(&self, relative: &str) {
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to delete image {relative}: {e}");
            }
        }
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}{relative}", self.url_prefix)
    }
}
