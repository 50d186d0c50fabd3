// File storage for page attachments and avatars. Attachments keep their
// original name for display but are stored under generated collision-free
// names in a flat upload directory; avatars live in a subdirectory keyed by
// username. None of this is transactional with the database; the file is
// written before the row that references it.

use image::imageops::FilterType;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub stored_name: String,
    pub original_name: String,
}

pub struct FileStore {
    upload_dir: PathBuf,
    avatar_dir: PathBuf,
    allowed_uploads: Vec<String>,
    allowed_avatars: Vec<String>,
    avatar_size: u32,
}

impl FileStore {
    pub fn new(config: &Config) -> Self {
        FileStore {
            upload_dir: config.uploads.dir.clone(),
            avatar_dir: config.avatars.dir.clone(),
            allowed_uploads: config.uploads.allowed_extensions.clone(),
            allowed_avatars: config.avatars.allowed_extensions.clone(),
            avatar_size: config.avatars.size,
        }
    }

    pub fn ensure_dirs(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.avatar_dir)?;
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn avatar_dir(&self) -> &Path {
        &self.avatar_dir
    }

    /// Lower-cased extension of a client-supplied filename.
    pub fn extension(filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }

    pub fn is_allowed_upload(&self, filename: &str) -> bool {
        Self::extension(filename)
            .map(|ext| self.allowed_uploads.contains(&ext))
            .unwrap_or(false)
    }

    /// Persist an attachment under a fresh `<uuid>.<ext>` name.
    pub async fn store_attachment(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> AppResult<StoredFile> {
        let ext = Self::extension(original_name).ok_or_else(|| {
            AppError::Validation(format!("file '{}' has no extension", original_name))
        })?;
        if !self.allowed_uploads.contains(&ext) {
            return Err(AppError::Validation(format!(
                "files of type '{}' are not accepted",
                ext
            )));
        }

        let stored_name = format!("{}.{}", Uuid::new_v4().simple(), ext);
        tokio::fs::write(self.upload_dir.join(&stored_name), bytes).await?;

        Ok(StoredFile {
            stored_name,
            original_name: original_name.to_string(),
        })
    }

    /// Best-effort removal of a stored attachment. Missing files are fine:
    /// the row they backed is already gone or being deleted.
    pub async fn remove_attachment(&self, stored_name: &str) {
        if let Ok(path) = self.attachment_path(stored_name) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("failed to remove attachment {}: {}", stored_name, e);
                }
            }
        }
    }

    /// Resolve a stored name to a path inside the upload directory. Stored
    /// names are generated server-side, so anything with a path separator
    /// is hostile input.
    pub fn attachment_path(&self, stored_name: &str) -> AppResult<PathBuf> {
        if stored_name.contains('/') || stored_name.contains('\\') || stored_name.contains("..") {
            return Err(AppError::NotFound(format!(
                "file '{}' not found",
                stored_name
            )));
        }
        Ok(self.upload_dir.join(stored_name))
    }

    pub fn is_allowed_avatar(&self, filename: &str) -> bool {
        Self::extension(filename)
            .map(|ext| self.allowed_avatars.contains(&ext))
            .unwrap_or(false)
    }

    fn avatar_path_for(&self, username: &str) -> PathBuf {
        self.avatar_dir.join(format!("{}.png", username))
    }

    pub fn has_avatar(&self, username: &str) -> bool {
        self.avatar_path_for(username).exists()
    }

    /// Scale the image so its shorter side equals the configured size, then
    /// center-crop to an exact square and persist as PNG, replacing any
    /// previously stored avatar for the user.
    pub fn store_avatar(&self, username: &str, filename: &str, bytes: &[u8]) -> AppResult<()> {
        let ext = Self::extension(filename).unwrap_or_default();
        if !self.allowed_avatars.contains(&ext) {
            return Err(AppError::Validation(
                "avatar must be a png, jpg, jpeg or gif image".to_string(),
            ));
        }

        let img = image::load_from_memory(bytes)
            .map_err(|e| AppError::Validation(format!("could not decode image: {}", e)))?;

        let size = self.avatar_size;
        let (w, h) = (img.width(), img.height());
        let shorter = w.min(h).max(1);
        // integer ceil keeps the shorter side at exactly `size` and never
        // rounds the longer side below it
        let nw = ((w as u64 * size as u64 + shorter as u64 - 1) / shorter as u64) as u32;
        let nh = ((h as u64 * size as u64 + shorter as u64 - 1) / shorter as u64) as u32;
        let resized = img.resize_exact(nw, nh, FilterType::Lanczos3);
        let square = resized.crop_imm((nw - size) / 2, (nh - size) / 2, size, size);

        self.remove_stale_avatars(username);
        square
            .save_with_format(self.avatar_path_for(username), ImageFormat::Png)
            .map_err(|e| AppError::Internal(format!("failed to save avatar: {}", e)))?;

        Ok(())
    }

    // Old uploads may predate the always-PNG convention
    fn remove_stale_avatars(&self, username: &str) {
        for ext in &self.allowed_avatars {
            let path = self.avatar_dir.join(format!("{}.{}", username, ext));
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
        }
    }

    /// Keep the stored avatar attached to the account across a username
    /// change.
    pub fn rename_avatar(&self, old_username: &str, new_username: &str) {
        let old_path = self.avatar_path_for(old_username);
        if old_path.exists() {
            let _ = std::fs::rename(old_path, self.avatar_path_for(new_username));
        }
    }

    /// Local avatar when one was uploaded, otherwise a deterministic
    /// Gravatar identicon keyed by the lower-cased email.
    pub fn avatar_url(&self, username: &str, email: &str) -> String {
        if self.has_avatar(username) {
            format!("/avatars/{}.png", username)
        } else {
            gravatar_url(email, self.avatar_size)
        }
    }
}

pub fn gravatar_url(email: &str, size: u32) -> String {
    let digest = md5::compute(email.to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{:x}?d=identicon&s={}",
        digest, size
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AvatarConfig, UploadConfig};

    fn test_store(dir: &Path) -> FileStore {
        let upload_dir = dir.join("uploads");
        let config = Config {
            uploads: UploadConfig {
                dir: upload_dir.clone(),
                allowed_extensions: vec!["pdf".to_string(), "txt".to_string()],
                max_content_length: 1024,
            },
            avatars: AvatarConfig {
                dir: upload_dir.join("avatars"),
                allowed_extensions: vec![
                    "png".to_string(),
                    "jpg".to_string(),
                    "jpeg".to_string(),
                    "gif".to_string(),
                ],
                size: 128,
            },
            ..Config::from_env().unwrap()
        };
        let store = FileStore::new(&config);
        store.ensure_dirs().unwrap();
        store
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(FileStore::extension("Report.PDF"), Some("pdf".to_string()));
        assert_eq!(FileStore::extension("no_extension"), None);
        assert_eq!(FileStore::extension("trailing."), None);
    }

    #[tokio::test]
    async fn attachment_rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let err = store.store_attachment("evil.exe", b"MZ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn attachment_roundtrip_preserves_original_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let stored = store
            .store_attachment("lesson plan.pdf", b"%PDF-1.4")
            .await
            .unwrap();
        assert_eq!(stored.original_name, "lesson plan.pdf");
        assert!(stored.stored_name.ends_with(".pdf"));
        assert_ne!(stored.stored_name, "lesson plan.pdf");

        let path = store.attachment_path(&stored.stored_name).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn attachment_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        assert!(store.attachment_path("../secret.pdf").is_err());
        assert!(store.attachment_path("a/b.pdf").is_err());
    }

    #[test]
    fn avatar_is_cropped_to_exact_square() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store
            .store_avatar("alice", "photo.png", &png_bytes(300, 200))
            .unwrap();

        let saved = image::open(store.avatar_dir().join("alice.png")).unwrap();
        assert_eq!((saved.width(), saved.height()), (128, 128));
    }

    #[test]
    fn avatar_handles_portrait_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store
            .store_avatar("bob", "photo.png", &png_bytes(150, 400))
            .unwrap();

        let saved = image::open(store.avatar_dir().join("bob.png")).unwrap();
        assert_eq!((saved.width(), saved.height()), (128, 128));
    }

    #[test]
    fn avatar_rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let err = store
            .store_avatar("alice", "photo.bmp", &png_bytes(10, 10))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn avatar_url_falls_back_to_gravatar() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let url = store.avatar_url("carol", "Carol@Example.com");
        assert!(url.starts_with("https://www.gravatar.com/avatar/"));
        assert!(url.contains("d=identicon"));
        // digest is over the lower-cased address
        assert_eq!(url, store.avatar_url("carol", "carol@example.com"));

        store
            .store_avatar("carol", "photo.png", &png_bytes(128, 128))
            .unwrap();
        assert_eq!(store.avatar_url("carol", "carol@example.com"), "/avatars/carol.png");
    }
}
