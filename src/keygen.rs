use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// File holding the random key material, in app-private storage.
pub(crate) const KEY_FILE: &str = "db_key";

/// Loads or creates the secret key material and derives the database
/// passphrase from it.
///
/// The material is 32 random bytes, hex-encoded, written once with owner-only
/// permissions; the passphrase handed to the encryption layer is its SHA-256
/// digest, so the on-disk material and the effective key differ. Any I/O
/// failure propagates: without a key there is no database.
pub fn load_or_create_key(data_dir: &Path) -> Result<String> {
    let material = load_or_create_material(data_dir)?;
    let digest = Sha256::digest(material.as_bytes());
    Ok(hex_string(digest.as_slice()))
}

fn load_or_create_material(data_dir: &Path) -> Result<String> {
    use rand::Rng;

    let path = data_dir.join(KEY_FILE);

    if path.exists() {
        let material =
            std::fs::read_to_string(&path).context("Failed to read database key file")?;
        let material = material.trim().to_string();
        if !material.is_empty() {
            return Ok(material);
        }
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    let bytes: [u8; 32] = rand::rng().random();
    let material = hex_string(&bytes);
    std::fs::write(&path, &material).context("Failed to write database key file")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .context("Failed to set database key file permissions")?;
    }
    Ok(material)
}

fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_is_stable_across_calls() {
        let dir = TempDir::new().unwrap();
        let first = load_or_create_key(dir.path()).unwrap();
        let second = load_or_create_key(dir.path()).unwrap();
        assert_eq!(first, second);
        // SHA-256 hex
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_keys_differ_per_data_dir() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        assert_ne!(
            load_or_create_key(a.path()).unwrap(),
            load_or_create_key(b.path()).unwrap()
        );
    }

    #[test]
    fn test_passphrase_is_not_the_stored_material() {
        let dir = TempDir::new().unwrap();
        let key = load_or_create_key(dir.path()).unwrap();
        let material = std::fs::read_to_string(dir.path().join(KEY_FILE)).unwrap();
        assert_ne!(key, material.trim());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        load_or_create_key(dir.path()).unwrap();
        let mode = std::fs::metadata(dir.path().join(KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
