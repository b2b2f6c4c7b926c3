//! Uploaded file storage.

use crate::error::{AppError, AppResult};
use anyhow::Context;
use async_trait::async_trait;
use axum::body::Bytes;
use std::path::{Path, PathBuf};

const MB: usize = 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];
const DOCUMENT_TYPES: &[&str] = &["pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    EventPoster,
    ClubImage,
    ClubResource,
    LostFoundImage,
    ProfilePicture,
}

impl UploadKind {
    /// Directory under the upload root, also the URL segment.
    pub fn dir(self) -> &'static str {
        match self {
            UploadKind::EventPoster => "events",
            UploadKind::ClubImage => "clubs",
            UploadKind::ClubResource => "resources",
            UploadKind::LostFoundImage => "lost-found",
            UploadKind::ProfilePicture => "profiles",
        }
    }

    pub fn max_bytes(self) -> usize {
        match self {
            UploadKind::ClubResource => 10 * MB,
            UploadKind::ProfilePicture => 5 * MB / 2,
            _ => 5 * MB,
        }
    }

    /// The error for a file over [`UploadKind::max_bytes`].
    pub fn too_large(self) -> AppError {
        AppError::validation(
            "file",
            format!(
                "file is too large, maximum size is {:.1}MB",
                self.max_bytes() as f64 / MB as f64
            ),
        )
    }

    fn is_image(self) -> bool {
        self != UploadKind::ClubResource
    }

    fn allowed(self) -> &'static [&'static str] {
        if self.is_image() {
            IMAGE_TYPES
        } else {
            DOCUMENT_TYPES
        }
    }
}

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content: Bytes,
}

impl Upload {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }
}

/// Checks `upload` against the limits of `kind` and returns the extension
/// the stored file will carry.
pub fn check(kind: UploadKind, upload: &Upload) -> AppResult<String> {
    let allowed = kind.allowed();
    let unsupported = || {
        AppError::validation(
            "file",
            format!("unsupported file type, allowed: {}", allowed.join(", ")),
        )
    };

    if upload.len() > kind.max_bytes() {
        return Err(kind.too_large());
    }
    let extension = upload
        .extension()
        .filter(|ext| allowed.contains(&ext.as_str()))
        .ok_or_else(unsupported)?;

    if kind.is_image() {
        let sniffed = infer::get(&upload.content).ok_or_else(unsupported)?;
        let mime: mime::Mime = sniffed.mime_type().parse().map_err(|_| unsupported())?;
        if mime.type_() != mime::IMAGE || !allowed.contains(&sniffed.extension()) {
            return Err(unsupported());
        }
    }
    Ok(extension)
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the file and returns the URL it is served under.
    async fn store(&self, kind: UploadKind, upload: &Upload) -> AppResult<String>;
}

/// Writes uploads to a directory served at `/uploads`.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> LocalBlobStore {
        LocalBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, kind: UploadKind, upload: &Upload) -> AppResult<String> {
        let extension = check(kind, upload)?;
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let name = format!("{}.{}", nanoid::nanoid!(), extension);
        let path = dir.join(&name);
        tokio::fs::write(&path, &upload.content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::debug!(path = %path.display(), bytes = upload.len(), "stored upload");
        Ok(format!("/uploads/{}/{}", kind.dir(), name))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    pub(crate) fn png(name: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            content: Bytes::from_static(PNG),
        }
    }

    pub(crate) fn pdf(name: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            content: Bytes::from_static(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n"),
        }
    }

    #[rstest]
    #[case(UploadKind::EventPoster, "poster.PNG", true)]
    #[case(UploadKind::EventPoster, "poster.exe", false)]
    #[case(UploadKind::ClubResource, "poster.png", false)]
    #[case(UploadKind::ProfilePicture, "me.png", true)]
    fn extension_allow_lists(#[case] kind: UploadKind, #[case] name: &str, #[case] ok: bool) {
        assert_eq!(check(kind, &png(name)).is_ok(), ok);
    }

    #[test]
    fn documents_are_checked_by_extension() {
        assert_eq!(check(UploadKind::ClubResource, &pdf("notes.pdf")).unwrap(), "pdf");
    }

    #[test]
    fn image_content_must_match() {
        let fake = Upload {
            file_name: "cat.jpg".into(),
            content: Bytes::from_static(b"not an image at all"),
        };
        assert!(matches!(
            check(UploadKind::ClubImage, &fake),
            Err(AppError::Validation { field: "file", .. })
        ));
    }

    #[test]
    fn size_limits_per_kind() {
        let mut big = PNG.to_vec();
        big.resize(3 * MB, 0);
        let upload = Upload {
            file_name: "big.png".into(),
            content: Bytes::from(big),
        };
        assert!(check(UploadKind::EventPoster, &upload).is_ok());
        let err = check(UploadKind::ProfilePicture, &upload).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn local_store_writes_under_kind_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let url = blobs.store(UploadKind::LostFoundImage, &png("umbrella.png")).await.unwrap();
        assert!(url.starts_with("/uploads/lost-found/"));
        assert!(url.ends_with(".png"));

        let name = url.rsplit('/').next().unwrap();
        let written = std::fs::read(dir.path().join("lost-found").join(name)).unwrap();
        assert_eq!(written, PNG);
    }
}
