// ============================================================================
// PERSISTENCE GATEWAY — list / fetch / overwrite assets in one folder
// ============================================================================
//
// The session only ever talks to `PersistenceGateway`. `FsGateway` is the
// filesystem implementation: one root directory, fixed at construction, and
// identifiers that are plain file names inside it. Nothing resolves outside
// the root.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::io::is_supported_image;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    ListingUnavailable(String),
    NotFound(String),
    AccessDenied(String),
    WriteFailed(String),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::ListingUnavailable(e) => write!(f, "cannot list assets: {}", e),
            GatewayError::NotFound(id) => write!(f, "'{}' not found", id),
            GatewayError::AccessDenied(id) => write!(f, "access denied for '{}'", id),
            GatewayError::WriteFailed(e) => write!(f, "write failed: {}", e),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Storage the edit session reads originals from and writes exports to.
///
/// Implementations are shared with background IO threads, hence `Send + Sync`.
pub trait PersistenceGateway: Send + Sync {
    fn list_assets(&self) -> Result<Vec<String>, GatewayError>;
    fn fetch_asset(&self, identifier: &str) -> Result<Vec<u8>, GatewayError>;
    /// Replace the stored bytes entirely. Readers never see a partial file.
    fn write_asset(&self, identifier: &str, bytes: &[u8]) -> Result<(), GatewayError>;
}

/// Folder-backed gateway.
#[derive(Clone, Debug)]
pub struct FsGateway {
    root: PathBuf,
}

impl FsGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an identifier to a path inside the root, or refuse it.
    fn resolve(&self, identifier: &str) -> Result<PathBuf, GatewayError> {
        let denied = || GatewayError::AccessDenied(identifier.to_string());

        let name = Path::new(identifier);
        let mut components = name.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(denied()),
        }
        if identifier.contains(['/', '\\']) {
            return Err(denied());
        }

        let path = self.root.join(name);

        // Symlinks may still point elsewhere; compare canonical forms when the
        // target exists.
        if path.exists() {
            let root = fs::canonicalize(&self.root).map_err(|_| denied())?;
            let real = fs::canonicalize(&path).map_err(|_| denied())?;
            if !real.starts_with(&root) {
                return Err(denied());
            }
        }
        Ok(path)
    }
}

impl PersistenceGateway for FsGateway {
    fn list_assets(&self) -> Result<Vec<String>, GatewayError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            GatewayError::ListingUnavailable(format!("{}: {}", self.root.display(), e))
        })?;

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_supported_image(name))
            .collect();
        names.sort();
        Ok(names)
    }

    fn fetch_asset(&self, identifier: &str) -> Result<Vec<u8>, GatewayError> {
        let path = self.resolve(identifier)?;
        if !path.is_file() {
            return Err(GatewayError::NotFound(identifier.to_string()));
        }
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GatewayError::NotFound(identifier.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                GatewayError::AccessDenied(identifier.to_string())
            }
            _ => GatewayError::NotFound(format!("{} ({})", identifier, e)),
        })
    }

    fn write_asset(&self, identifier: &str, bytes: &[u8]) -> Result<(), GatewayError> {
        let path = self.resolve(identifier)?;
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", identifier, Uuid::new_v4().simple()));

        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&tmp, &path)
        })();

        result.map_err(|e| {
            let _ = fs::remove_file(&tmp);
            GatewayError::WriteFailed(format!("{}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_only_images_sorted() {
        let dir = tempdir().unwrap();
        for name in ["b.png", "a.JPG", "c.jpeg", "notes.txt", "d.webp"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let gw = FsGateway::new(dir.path());
        assert_eq!(
            gw.list_assets().unwrap(),
            vec!["a.JPG", "b.png", "c.jpeg", "d.webp"]
        );
    }

    #[test]
    fn missing_root_is_listing_unavailable() {
        let dir = tempdir().unwrap();
        let gw = FsGateway::new(dir.path().join("nope"));
        assert!(matches!(
            gw.list_assets(),
            Err(GatewayError::ListingUnavailable(_))
        ));
    }

    #[test]
    fn fetch_reports_not_found() {
        let dir = tempdir().unwrap();
        let gw = FsGateway::new(dir.path());
        assert_eq!(
            gw.fetch_asset("ghost.png"),
            Err(GatewayError::NotFound("ghost.png".into()))
        );
    }

    #[test]
    fn identifiers_cannot_escape_the_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("img");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("secret.png"), b"top secret").unwrap();

        let gw = FsGateway::new(&root);
        for id in ["../secret.png", "", "..", "sub/secret.png", "/etc/passwd"] {
            assert!(
                matches!(gw.fetch_asset(id), Err(GatewayError::AccessDenied(_))),
                "{:?} should be denied",
                id
            );
        }
        assert!(matches!(
            gw.write_asset("../secret.png", b"x"),
            Err(GatewayError::AccessDenied(_))
        ));
        assert_eq!(fs::read(dir.path().join("secret.png")).unwrap(), b"top secret");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_denied() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("img");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("outside.png"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("outside.png"), root.join("link.png")).unwrap();

        let gw = FsGateway::new(&root);
        assert!(matches!(
            gw.fetch_asset("link.png"),
            Err(GatewayError::AccessDenied(_))
        ));
    }

    #[test]
    fn write_overwrites_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("car.png"), b"old bytes, longer than new").unwrap();

        let gw = FsGateway::new(dir.path());
        gw.write_asset("car.png", b"new").unwrap();

        assert_eq!(gw.fetch_asset("car.png").unwrap(), b"new");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn write_into_missing_root_fails_cleanly() {
        let dir = tempdir().unwrap();
        let gw = FsGateway::new(dir.path().join("gone"));
        assert!(matches!(
            gw.write_asset("a.jpg", b"x"),
            Err(GatewayError::WriteFailed(_))
        ));
    }
}
