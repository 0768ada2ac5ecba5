use std::{fmt, path::Path, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::Serialize;
use shared::error::ClassificationError;
use tracing::debug;

pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

const FALLBACK_FILE_NAME: &str = "image";

/// MIME type and size of a file the user picked, before its content is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub mime_type: String,
    pub size_bytes: u64,
}

impl FileDescriptor {
    pub fn new(mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

pub fn validate(descriptor: &FileDescriptor) -> Result<&FileDescriptor, ClassificationError> {
    let mime = descriptor.mime_type.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") {
        return Err(ClassificationError::validation(
            "Please upload an image file (JPG, PNG or WEBP).",
        ));
    }
    if descriptor.size_bytes > MAX_IMAGE_BYTES {
        return Err(ClassificationError::validation(format!(
            "Image is {:.1} MB; the maximum size is 5 MB.",
            descriptor.size_bytes as f64 / (1024.0 * 1024.0)
        )));
    }
    Ok(descriptor)
}

/// A selected image that passed [`validate`]. Content and preview are shared,
/// so clones are cheap and never copy the pixels.
#[derive(Clone, Serialize)]
pub struct UploadedImage {
    file_name: String,
    mime_type: String,
    size_bytes: u64,
    #[serde(skip)]
    content: Bytes,
    #[serde(skip)]
    preview: Arc<str>,
}

impl UploadedImage {
    pub fn from_bytes(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Result<Self, ClassificationError> {
        let content = Bytes::from(content.into());
        let descriptor = FileDescriptor::new(mime_type, content.len() as u64);
        validate(&descriptor)?;

        let mime_type = descriptor.mime_type.trim().to_string();
        let preview = format!("data:{mime_type};base64,{}", STANDARD.encode(&content));
        let mut file_name = file_name.into();
        if file_name.trim().is_empty() {
            file_name = FALLBACK_FILE_NAME.to_string();
        }

        Ok(Self {
            file_name,
            mime_type,
            size_bytes: descriptor.size_bytes,
            content,
            preview: preview.into(),
        })
    }

    /// Reads and validates an image from disk. The size and type checks run on
    /// file metadata first, so oversized files are rejected without being read.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ClassificationError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|err| {
            ClassificationError::validation(format!("Cannot read {}: {err}", path.display()))
        })?;
        if !metadata.is_file() {
            return Err(ClassificationError::validation(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        validate(&FileDescriptor::new(mime_type.as_str(), metadata.len()))?;

        let content = tokio::fs::read(path).await.map_err(|err| {
            ClassificationError::validation(format!("Cannot read {}: {err}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(FALLBACK_FILE_NAME)
            .to_string();
        debug!(
            file = %path.display(),
            mime_type = %mime_type,
            size_bytes = content.len(),
            "validation: image loaded"
        );
        Self::from_bytes(file_name, mime_type, content)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Shared handle to the content; cloning it never copies the buffer.
    pub fn content_bytes(&self) -> Bytes {
        self.content.clone()
    }

    /// `data:` URL a front end can render directly.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// True when both values share the same underlying content buffer.
    pub fn same_content(&self, other: &Self) -> bool {
        self.content.as_ptr() == other.content.as_ptr() && self.content.len() == other.content.len()
    }
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
