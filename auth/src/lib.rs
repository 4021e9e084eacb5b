//! Authentication module for the Google Photos Library API.
//!
//! [`Authenticator`] owns the OAuth lifecycle: it hands out the stored
//! [`Credential`] while it is valid, refreshes it when it expires and falls
//! back to the interactive authorization-code flow (system browser plus a
//! loopback redirect listener) when no usable credential exists.

mod credential;
mod error;
mod loopback;
mod secrets;

pub use credential::{Credential, TokenStore, TOKEN_FILE_NAME};
pub use error::AuthError;
pub use secrets::ClientSecrets;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oauth2::basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AccessToken, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    RedirectUrl, RefreshToken, RequestTokenError, RevocationUrl, Scope, StandardRevocableToken,
    TokenUrl,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use loopback::LoopbackListener;

/// Directory name used under the OS data directory.
pub const APP_DIR_NAME: &str = "gphotos-viewer";

pub const PHOTOS_APP_CREATED_SCOPE: &str =
    "https://www.googleapis.com/auth/photoslibrary.readonly.appcreateddata";

pub const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Opens the authorization URL for the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the platform's default browser.
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_secrets_path: PathBuf,
    pub token_path: PathBuf,
    pub scopes: Vec<String>,
    /// Port for the redirect listener, 0 picks a free one.
    pub redirect_port: u16,
    pub consent_timeout: Duration,
    pub revocation_url: String,
}

impl AuthConfig {
    pub fn new(client_secrets_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secrets_path: client_secrets_path.into(),
            token_path: TokenStore::default_path(),
            scopes: vec![PHOTOS_APP_CREATED_SCOPE.to_string()],
            redirect_port: 0,
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
            revocation_url: GOOGLE_REVOKE_URL.to_string(),
        }
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_redirect_port(mut self, port: u16) -> Self {
        self.redirect_port = port;
        self
    }
}

pub struct Authenticator {
    config: AuthConfig,
    store: TokenStore,
    browser: Arc<dyn BrowserLauncher>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self::with_browser(config, Arc::new(SystemBrowser))
    }

    pub fn with_browser(config: AuthConfig, browser: Arc<dyn BrowserLauncher>) -> Self {
        let store = TokenStore::new(config.token_path.clone());
        Self {
            config,
            store,
            browser,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Return a valid credential, running the interactive flow if needed.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn authenticate(&self) -> Result<Credential, AuthError> {
        if let Some(credential) = self.restore().await? {
            return Ok(credential);
        }
        self.run_consent_flow().await
    }

    /// Run the interactive flow even if a usable credential is stored.
    ///
    /// The new credential replaces the stored one once the code exchange
    /// succeeds.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn reauthenticate(&self) -> Result<Credential, AuthError> {
        self.run_consent_flow().await
    }

    /// Like [`authenticate`](Self::authenticate) but never opens a browser.
    ///
    /// Returns `None` when there is no stored credential or the stored one can
    /// no longer be refreshed.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn restore(&self) -> Result<Option<Credential>, AuthError> {
        let Some(stored) = self.stored_credential() else {
            return Ok(None);
        };
        if !stored.has_scopes(&self.config.scopes) {
            info!("stored credential lacks the required scopes");
            return Ok(None);
        }
        if !stored.is_expired() {
            debug!("using stored credential");
            return Ok(Some(stored));
        }

        info!("stored credential expired, refreshing");
        match self.refresh(&stored).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(e) if e.requires_reauthentication() => {
                warn!(error = %e, "stored credential cannot be refreshed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange the credential's refresh token for a new access token.
    ///
    /// Makes exactly one call to the token endpoint. On a rejected refresh
    /// token the stored credential is deleted.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, credential)))]
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let result = self.exchange_refresh_token(credential).await;
        match result {
            Ok(refreshed) => {
                self.store.save(&refreshed)?;
                info!("refreshed access token");
                Ok(refreshed)
            }
            Err(e) => {
                if e.requires_reauthentication() {
                    self.store.clear()?;
                }
                Err(e)
            }
        }
    }

    /// Revoke the stored grant at Google and delete the token file.
    ///
    /// Remote revocation is best effort; the local credential is removed
    /// either way.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn revoke(&self) -> Result<(), AuthError> {
        if let Some(credential) = self.stored_credential() {
            if let Err(e) = self.revoke_remote(&credential).await {
                warn!(error = %e, "failed to revoke credential");
            }
        }
        self.store.clear()
    }

    /// The stored credential, treating an unreadable token file as absent.
    pub fn stored_credential(&self) -> Option<Credential> {
        match self.store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable token file");
                None
            }
        }
    }

    /// Whether a stored credential is usable without user interaction.
    pub fn is_authenticated(&self) -> bool {
        self.stored_credential()
            .is_some_and(|c| !c.is_expired() || c.can_refresh())
    }

    async fn exchange_refresh_token(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or(AuthError::MissingRefreshToken)?;
        let secrets = ClientSecrets::from_file(&self.config.client_secrets_path)?;
        let client = self.oauth_client(&secrets)?;

        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(map_token_error)?;

        let scopes = if credential.scopes.is_empty() {
            &self.config.scopes
        } else {
            &credential.scopes
        };
        Ok(Credential::from_token_response(
            &response,
            Some(refresh_token),
            scopes,
        ))
    }

    async fn run_consent_flow(&self) -> Result<Credential, AuthError> {
        let secrets = ClientSecrets::from_file(&self.config.client_secrets_path)?;
        let listener = LoopbackListener::bind(self.config.redirect_port).await?;
        let client = self
            .oauth_client(&secrets)?
            .set_redirect_uri(RedirectUrl::new(listener.redirect_uri())?);

        let (authorize_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.config.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        info!("Opening browser for Google Photos authorization");
        if let Err(e) = self.browser.open(authorize_url.as_str()) {
            warn!(error = %e, "failed to open browser, open this URL manually: {}", authorize_url);
        }

        let code = timeout(
            self.config.consent_timeout,
            listener.wait_for_code(csrf_state.secret()),
        )
        .await
        .map_err(|_| AuthError::Consent("timed out waiting for the browser redirect".into()))??;

        info!("received authorization code, exchanging for tokens");
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(async_http_client)
            .await
            .map_err(map_token_error)?;

        let credential = Credential::from_token_response(&response, None, &self.config.scopes);
        self.store.save(&credential)?;
        info!("Authentication successful");
        Ok(credential)
    }

    async fn revoke_remote(&self, credential: &Credential) -> Result<(), AuthError> {
        let secrets = ClientSecrets::from_file(&self.config.client_secrets_path)?;
        let client = self.oauth_client(&secrets)?;
        let token = match &credential.refresh_token {
            Some(refresh) => StandardRevocableToken::RefreshToken(RefreshToken::new(refresh.clone())),
            None => StandardRevocableToken::AccessToken(AccessToken::new(
                credential.access_token.clone(),
            )),
        };
        client
            .revoke_token(token)
            .map_err(|e| AuthError::Config(e.to_string()))?
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::TokenEndpoint(e.to_string()))?;
        info!("revoked credential at Google");
        Ok(())
    }

    fn oauth_client(&self, secrets: &ClientSecrets) -> Result<BasicClient, AuthError> {
        Ok(BasicClient::new(
            ClientId::new(secrets.client_id.clone()),
            Some(ClientSecret::new(secrets.client_secret.clone())),
            AuthUrl::new(secrets.auth_uri.clone())?,
            Some(TokenUrl::new(secrets.token_uri.clone())?),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_revocation_uri(RevocationUrl::new(self.config.revocation_url.clone())?))
    }
}

fn map_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> AuthError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => {
            let kind: &str = response.error().as_ref();
            let detail = match response.error_description() {
                Some(description) => format!("{}: {}", kind, description),
                None => kind.to_string(),
            };
            match response.error() {
                BasicErrorResponseType::InvalidGrant => AuthError::Revoked(detail),
                _ => AuthError::TokenEndpoint(detail),
            }
        }
        RequestTokenError::Request(e) => AuthError::Network(e.to_string()),
        RequestTokenError::Parse(e, _) => {
            AuthError::TokenEndpoint(format!("unparseable token response: {}", e))
        }
        RequestTokenError::Other(msg) => AuthError::TokenEndpoint(msg),
    }
}
