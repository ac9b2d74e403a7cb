// ABOUTME: Explicit credentials passed to every remote call
// ABOUTME: Loads and stores the access token in a small TOML credentials file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub const ACCESS_TOKEN_ENV: &str = "ORCHESITY_ACCESS_TOKEN";

/// Bearer credentials for the remote API.
///
/// The client receives this at construction time instead of looking a token
/// up from shared storage on each request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    token: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    access_token: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            Self::anonymous()
        } else {
            Self {
                token: Some(token.to_string()),
            }
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Value for the `Authorization` header, if a token is present.
    pub fn bearer(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {}", token))
    }

    /// Reads `access_token` from a credentials file. A missing file yields an
    /// anonymous context.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No credentials file found");
            return Ok(Self::anonymous());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials from {}", path.display()))?;
        let file: CredentialsFile = toml::from_str(&raw)
            .with_context(|| format!("Invalid credentials file {}", path.display()))?;

        Ok(file
            .access_token
            .map(Self::with_token)
            .unwrap_or_default())
    }

    /// Environment token wins over the credentials file.
    pub fn resolve(path: &Path) -> Result<Self> {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::with_token(token)),
            _ => Self::load(path),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = CredentialsFile {
            access_token: self.token.clone(),
        };
        let raw = toml::to_string(&file).context("Failed to serialize credentials")?;
        let mut file = open_private(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        file.write_all(raw.as_bytes())
            .with_context(|| format!("Failed to write credentials to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Saved access token");
        Ok(())
    }
}

/// Opens `path` for writing, readable and writable by the owner only.
fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let file = options.mode(0o600).open(path)?;
        // `mode` only applies on create; tighten a file that already existed.
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    {
        options.open(path)
    }
}

// Keeps tokens out of logs.
impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let auth = AuthContext::with_token("abc123");
        assert_eq!(auth.bearer().as_deref(), Some("Bearer abc123"));
        assert!(AuthContext::anonymous().bearer().is_none());
    }

    #[test]
    fn test_blank_token_is_anonymous() {
        assert!(!AuthContext::with_token("  ").is_authenticated());
    }

    #[test]
    fn test_debug_redacts_token() {
        let auth = AuthContext::with_token("secret-token");
        let printed = format!("{:?}", auth);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.toml");

        AuthContext::with_token("tok-1").save(&path).unwrap();
        let loaded = AuthContext::load(&path).unwrap();
        assert_eq!(loaded.token(), Some("tok-1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_credentials_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");

        // A pre-existing world-readable file gets tightened too.
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        AuthContext::with_token("secret").save(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "mode was {:o}", mode & 0o777);
        assert_eq!(AuthContext::load(&path).unwrap().token(), Some("secret"));
    }

    #[test]
    fn test_missing_file_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AuthContext::load(&dir.path().join("absent.toml")).unwrap();
        assert!(!loaded.is_authenticated());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "access_token = [").unwrap();
        assert!(AuthContext::load(&path).is_err());
    }
}
