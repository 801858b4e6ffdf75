//! Storage of uploaded images beneath `MEDIA_ROOT`.
//!
//! Stored paths are relative to the media root (`images/articles/<uuid>.png`)
//! and are served under `/media/`.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{config::DEFAULT_IMAGE, error::AppError};

pub const ARTICLE_IMAGES: &str = "images/articles";
pub const PROFILE_IMAGES: &str = "images/bloggers";

const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// 1x1 transparent PNG written as the placeholder when none is present.
const PLACEHOLDER_PNG: [u8; 67] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// An image received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Lower-cased extension if it is one of the accepted image types.
    pub fn image_extension(&self) -> Option<String> {
        let ext = Path::new(&self.file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }
}

/// Writes `file` under `media_root/subdir` with a random name and returns the
/// stored relative path.
pub async fn save_image(
    media_root: &str,
    subdir: &str,
    file: &UploadedFile,
) -> Result<String, AppError> {
    let ext = file.image_extension().ok_or_else(|| {
        AppError::BadRequest("Upload a valid image (png, jpg, jpeg, gif or webp).".to_string())
    })?;

    let relative = format!("{}/{}.{}", subdir, Uuid::new_v4(), ext);
    let dir = PathBuf::from(media_root).join(subdir);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(PathBuf::from(media_root).join(&relative), &file.bytes).await?;

    tracing::debug!("Stored upload {} as {}", file.file_name, relative);
    Ok(relative)
}

/// Removes a previously stored upload. The shared placeholder is never removed.
pub async fn remove_image(media_root: &str, relative: &str) {
    if relative == DEFAULT_IMAGE || relative.contains("..") {
        return;
    }
    if let Err(e) = tokio::fs::remove_file(PathBuf::from(media_root).join(relative)).await {
        tracing::warn!("Failed to remove old upload {}: {}", relative, e);
    }
}

/// Makes sure the placeholder image exists so `/media/images/default.png` resolves.
pub async fn ensure_default_image(media_root: &str) -> Result<(), AppError> {
    let path = PathBuf::from(media_root).join(DEFAULT_IMAGE);
    if tokio::fs::try_exists(&path).await? {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, PLACEHOLDER_PNG).await?;
    tracing::info!("Created placeholder image at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn only_image_extensions_are_accepted() {
        assert_eq!(upload("cat.PNG").image_extension().as_deref(), Some("png"));
        assert_eq!(upload("a.b.jpeg").image_extension().as_deref(), Some("jpeg"));
        assert_eq!(upload("run.sh").image_extension(), None);
        assert_eq!(upload("noext").image_extension(), None);
    }

    #[tokio::test]
    async fn saved_image_lands_under_subdir() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_str().unwrap();

        let stored = save_image(root_str, ARTICLE_IMAGES, &upload("cover.jpg"))
            .await
            .unwrap();
        assert!(stored.starts_with("images/articles/"));
        assert!(stored.ends_with(".jpg"));
        assert_eq!(std::fs::read(root.path().join(&stored)).unwrap(), vec![1, 2, 3]);

        remove_image(root_str, &stored).await;
        assert!(!root.path().join(&stored).exists());
    }

    #[tokio::test]
    async fn placeholder_is_created_once() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_str().unwrap();
        ensure_default_image(root_str).await.unwrap();
        ensure_default_image(root_str).await.unwrap();
        assert!(root.path().join(DEFAULT_IMAGE).exists());
    }
}
