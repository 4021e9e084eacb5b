use std::path::Path;

use serde::Deserialize;

use crate::AuthError;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client credentials as downloaded from the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecrets {
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        if !path.exists() {
            return Err(AuthError::ClientSecretsNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Accepts both the `installed` (desktop) and `web` layouts.
    pub fn from_json(content: &str) -> Result<Self, AuthError> {
        let file: SecretsFile =
            serde_json::from_str(content).map_err(|e| AuthError::ClientSecrets(e.to_string()))?;
        file.installed.or(file.web).ok_or_else(|| {
            AuthError::ClientSecrets("expected an \"installed\" or \"web\" section".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_installed_layout() {
        let json = r#"{
            "installed": {
                "client_id": "id.apps.googleusercontent.com",
                "project_id": "demo",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "secret",
                "redirect_uris": ["http://localhost"]
            }
        }"#;
        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret, "secret");
        assert_eq!(secrets.auth_uri, "https://accounts.google.com/o/oauth2/auth");
    }

    #[test]
    fn web_layout_uses_default_endpoints() {
        let json = r#"{"web": {"client_id": "id", "client_secret": "secret"}}"#;
        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);
    }

    #[test]
    fn missing_section_is_rejected() {
        let err = ClientSecrets::from_json(r#"{"other": {}}"#).unwrap_err();
        assert!(matches!(err, AuthError::ClientSecrets(_)));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = ClientSecrets::from_file(Path::new("/nonexistent/client_secret.json")).unwrap_err();
        match err {
            AuthError::ClientSecretsNotFound(p) => {
                assert!(p.ends_with("client_secret.json"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
