//! OAuth credential and its file-backed store.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicTokenResponse;
use oauth2::TokenResponse;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AuthError;

/// Tokens are treated as expired this long before Google says they are.
const EXPIRY_SKEW_SECS: i64 = 60;

pub const TOKEN_FILE_NAME: &str = "google_photos_token.json";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes,
        }
    }

    /// Build a credential from a token endpoint response.
    ///
    /// Google omits the refresh token on refresh grants, so the previous one is
    /// carried over via `previous_refresh_token`. Scopes fall back to the
    /// requested ones when the response does not echo them.
    pub(crate) fn from_token_response(
        response: &BasicTokenResponse,
        previous_refresh_token: Option<String>,
        requested_scopes: &[String],
    ) -> Self {
        let scopes = response
            .scopes()
            .map(|granted| granted.iter().map(|s| s.to_string()).collect())
            .unwrap_or_else(|| requested_scopes.to_vec());
        Self::new(
            response.access_token().secret().clone(),
            response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or(previous_refresh_token),
            response.expires_in().map(|d| d.as_secs() as i64),
            scopes,
        )
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= expires_at,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Persists a single [`Credential`] as JSON.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/gphotos-viewer/google_photos_token.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_DIR_NAME)
            .join(TOKEN_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Credential>, AuthError> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let credential = serde_json::from_str(&content)
            .map_err(|e| AuthError::Storage(format!("failed to parse token file: {}", e)))?;
        info!("loaded credential from {:?}", self.path);
        Ok(Some(credential))
    }

    /// Replace the stored credential. The new file is written next to the
    /// old one and renamed over it so readers never see a partial write.
    pub fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| AuthError::Storage(format!("failed to serialize credential: {}", e)))?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        debug!("saved credential to {:?}", self.path);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("deleted token file {:?}", self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn default_path_lives_under_the_data_dir() {
        let dir = TempDir::new().unwrap();
        let previous = std::env::var_os("XDG_DATA_HOME");
        std::env::set_var("XDG_DATA_HOME", dir.path());

        let path = TokenStore::default_path();
        assert_eq!(
            path,
            dir.path().join("gphotos-viewer").join("google_photos_token.json")
        );

        match previous {
            Some(value) => std::env::set_var("XDG_DATA_HOME", value),
            None => std::env::remove_var("XDG_DATA_HOME"),
        }
    }

    #[test]
    fn fresh_credential_is_not_expired() {
        let cred = Credential::new("access", Some("refresh".into()), Some(3600), vec![]);
        assert!(!cred.is_expired());
        assert!(cred.can_refresh());
    }

    #[test]
    fn credential_inside_skew_window_is_expired() {
        let cred = Credential::new("access", None, Some(30), vec![]);
        assert!(cred.is_expired());
    }

    #[test]
    fn credential_without_expiry_never_expires() {
        let cred = Credential::new("access", None, None, vec![]);
        assert!(!cred.is_expired());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let cred = Credential::new("secret-access", Some("secret-refresh".into()), None, vec![]);
        let out = format!("{:?}", cred);
        assert!(!out.contains("secret-access"));
        assert!(!out.contains("secret-refresh"));
    }

    #[test]
    fn scope_check() {
        let cred = Credential::new("a", None, None, vec!["s1".into(), "s2".into()]);
        assert!(cred.has_scopes(&["s1".into()]));
        assert!(!cred.has_scopes(&["s3".into()]));
    }

    #[test]
    fn store_save_load_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join(TOKEN_FILE_NAME));
        assert!(store.load().unwrap().is_none());

        let cred = Credential::new("access", Some("refresh".into()), Some(3600), vec!["s".into()]);
        store.save(&cred).unwrap();
        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());
        assert_eq!(store.load().unwrap(), Some(cred));

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_replaces_previous_credential() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join(TOKEN_FILE_NAME));
        store.save(&Credential::new("old", Some("r".into()), Some(3600), vec![])).unwrap();
        store.save(&Credential::new("new", Some("r".into()), Some(3600), vec![])).unwrap();
        assert_eq!(store.load().unwrap().unwrap().access_token, "new");
    }

    #[test]
    fn malformed_token_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TOKEN_FILE_NAME);
        fs::write(&path, "not json").unwrap();
        let err = TokenStore::new(path).load().unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join(TOKEN_FILE_NAME));
        store.save(&Credential::new("a", None, None, vec![])).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
