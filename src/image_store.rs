//! Stores uploaded product images on the local filesystem and produces the
//! URLs they are served from.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{Error, endpoints};

/// Writes uploaded images to a directory on disk.
///
/// The directory is served by the router under [endpoints::IMAGES], so the
/// URL returned by [ImageStore::save] can be stored on a product and used
/// directly in an `img` tag.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Create an image store that writes images into `root`.
    ///
    /// # Errors
    /// Returns an error if `root` does not exist and cannot be created.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .map_err(|error| Error::ImageWriteError(error.to_string()))?;

        Ok(Self { root })
    }

    /// The directory images are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` to disk under `file_name` and return the URL the image
    /// will be served from.
    ///
    /// An existing image with the same name is overwritten, which is what we
    /// want when a product image is replaced.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, file_name: &str, data: &[u8]) -> Result<String, Error> {
        let path = self.root.join(file_name);

        fs::write(&path, data).map_err(|error| Error::ImageWriteError(error.to_string()))?;

        Ok(format!("{}/{file_name}", endpoints::IMAGES))
    }
}

#[cfg(test)]
mod image_store_tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::ImageStore;

    #[test]
    fn new_creates_missing_directory() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().join("images");

        let _store = ImageStore::new(&root).unwrap();

        assert!(root.is_dir());
    }

    #[test]
    fn save_writes_file_and_returns_url() {
        let temp_dir = tempdir().unwrap();
        let store = ImageStore::new(temp_dir.path()).unwrap();

        let url = store.save("1.png", b"not a real png").unwrap();

        assert_eq!(url, "/images/1.png");
        let written = fs::read(temp_dir.path().join("1.png")).unwrap();
        assert_eq!(written, b"not a real png");
    }

    #[test]
    fn save_overwrites_existing_file() {
        let temp_dir = tempdir().unwrap();
        let store = ImageStore::new(temp_dir.path()).unwrap();

        store.save("1.png", b"old").unwrap();
        store.save("1.png", b"new").unwrap();

        let written = fs::read(temp_dir.path().join("1.png")).unwrap();
        assert_eq!(written, b"new");
    }
}
