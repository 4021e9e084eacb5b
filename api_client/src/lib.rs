//! API client module for the Google Photos Library API.
//!
//! Read-only access to the three listing endpoints the viewer needs plus a
//! few single-record lookups. Every request carries the current access token;
//! a `401` triggers exactly one refresh-and-retry through the
//! [`Authenticator`].

mod error;
mod models;

pub use error::{ApiClientError, ErrorCategory};
pub use models::{Album, MediaItem, MediaMetadata};

use std::sync::Arc;
use std::time::Duration;

use auth::{AuthError, Authenticator, Credential};
use models::{
    GoogleErrorResponse, ListAlbumsResponse, ListMediaItemsResponse, ListSharedAlbumsResponse,
    PagedResponse, SearchMediaItemsRequest,
};
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://photoslibrary.googleapis.com";

pub const MAX_MEDIA_ITEMS_PAGE_SIZE: u32 = 100;
pub const MAX_ALBUMS_PAGE_SIZE: u32 = 50;
pub const MAX_SHARED_ALBUMS_PAGE_SIZE: u32 = 50;

/// A page of records and the cursor for the next one (`None` on the last page).
pub type Page<T> = (Vec<T>, Option<String>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub media_items_page_size: u32,
    pub albums_page_size: u32,
    pub shared_albums_page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            media_items_page_size: MAX_MEDIA_ITEMS_PAGE_SIZE,
            albums_page_size: MAX_ALBUMS_PAGE_SIZE,
            shared_albums_page_size: MAX_SHARED_ALBUMS_PAGE_SIZE,
        }
    }
}

impl ApiConfig {
    /// Create a config against a custom API base URL. Mainly used for testing.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    config: ApiConfig,
    authenticator: Arc<Authenticator>,
    credential: Credential,
}

impl ApiClient {
    pub fn new(authenticator: Arc<Authenticator>, credential: Credential) -> Self {
        Self::with_config(authenticator, credential, ApiConfig::default())
    }

    pub fn with_config(
        authenticator: Arc<Authenticator>,
        credential: Credential,
        config: ApiConfig,
    ) -> Self {
        ApiClient {
            client: reqwest::Client::new(),
            config,
            authenticator,
            credential,
        }
    }

    /// The credential currently attached to requests.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn list_media_items(
        &mut self,
        page_token: Option<&str>,
    ) -> Result<Page<MediaItem>, ApiClientError> {
        let size = self
            .config
            .media_items_page_size
            .clamp(1, MAX_MEDIA_ITEMS_PAGE_SIZE);
        self.list_page::<ListMediaItemsResponse>("/v1/mediaItems", size, page_token)
            .await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn list_albums(
        &mut self,
        page_token: Option<&str>,
    ) -> Result<Page<Album>, ApiClientError> {
        let size = self.config.albums_page_size.clamp(1, MAX_ALBUMS_PAGE_SIZE);
        self.list_page::<ListAlbumsResponse>("/v1/albums", size, page_token)
            .await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn list_shared_albums(
        &mut self,
        page_token: Option<&str>,
    ) -> Result<Page<Album>, ApiClientError> {
        let size = self
            .config
            .shared_albums_page_size
            .clamp(1, MAX_SHARED_ALBUMS_PAGE_SIZE);
        self.list_page::<ListSharedAlbumsResponse>("/v1/sharedAlbums", size, page_token)
            .await
    }

    pub async fn fetch_all_media_items(&mut self) -> Result<Vec<MediaItem>, ApiClientError> {
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let (items, next) = self.list_media_items(page_token.as_deref()).await?;
            all.extend(items);
            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        info!("Fetched {} media items", all.len());
        Ok(all)
    }

    pub async fn fetch_all_albums(&mut self) -> Result<Vec<Album>, ApiClientError> {
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let (albums, next) = self.list_albums(page_token.as_deref()).await?;
            all.extend(albums);
            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        info!("Fetched {} albums", all.len());
        Ok(all)
    }

    pub async fn fetch_all_shared_albums(&mut self) -> Result<Vec<Album>, ApiClientError> {
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let (albums, next) = self.list_shared_albums(page_token.as_deref()).await?;
            all.extend(albums);
            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        info!("Fetched {} shared albums", all.len());
        Ok(all)
    }

    pub async fn get_media_item(&mut self, id: &str) -> Result<MediaItem, ApiClientError> {
        let url = format!("{}/v1/mediaItems/{}", self.config.base_url, id);
        self.execute(|client| client.get(&url)).await
    }

    pub async fn get_album(&mut self, id: &str) -> Result<Album, ApiClientError> {
        let url = format!("{}/v1/albums/{}", self.config.base_url, id);
        self.execute(|client| client.get(&url)).await
    }

    /// Page through the media items of one album (or the whole library when
    /// `album_id` is `None`).
    pub async fn search_media_items(
        &mut self,
        album_id: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<Page<MediaItem>, ApiClientError> {
        let url = format!("{}/v1/mediaItems:search", self.config.base_url);
        let body = SearchMediaItemsRequest {
            album_id,
            page_size: self
                .config
                .media_items_page_size
                .clamp(1, MAX_MEDIA_ITEMS_PAGE_SIZE),
            page_token,
        };
        let response: ListMediaItemsResponse =
            self.execute(|client| client.post(&url).json(&body)).await?;
        Ok(response.into_page())
    }

    async fn list_page<R: PagedResponse>(
        &mut self,
        path: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<R::Item>, ApiClientError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut query = vec![("pageSize", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        debug!(path, has_cursor = page_token.is_some(), "fetching page");

        let response: R = self
            .execute(|client| client.get(&url).query(&query))
            .await?;
        let (items, next) = response.into_page();
        debug!(path, count = items.len(), last = next.is_none(), "page received");
        Ok((items, next))
    }

    /// Send a request built by `build`, refreshing the credential first when it
    /// has expired and once more if the API answers `401`.
    async fn execute<T, F>(&mut self, build: F) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        if self.credential.is_expired() {
            debug!("access token expired before request, refreshing");
            self.refresh_credential().await?;
        }

        let response = build(&self.client)
            .bearer_auth(&self.credential.access_token)
            .send()
            .await?;
        if response.status().as_u16() != 401 {
            return decode(response).await;
        }

        info!("access token rejected, refreshing and retrying once");
        self.refresh_credential().await?;
        let retry = build(&self.client)
            .bearer_auth(&self.credential.access_token)
            .send()
            .await?;
        if retry.status().as_u16() == 401 {
            let message = error_message(retry).await;
            warn!("access token rejected again after refresh");
            return Err(AuthError::Unauthorized(message).into());
        }
        decode(retry).await
    }

    async fn refresh_credential(&mut self) -> Result<(), ApiClientError> {
        self.credential = self.authenticator.refresh(&self.credential).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiClientError> {
    let status = response.status();
    if status.is_success() {
        let body = response.bytes().await?;
        let body: &[u8] = if body.is_empty() { b"{}" } else { &body };
        return serde_json::from_slice(body).map_err(|e| ApiClientError::Decode(e.to_string()));
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let message = error_message(response).await;
    warn!(status = status.as_u16(), %message, "API request failed");

    let code = status.as_u16();
    Err(match code {
        401 => AuthError::Unauthorized(message).into(),
        403 => ApiClientError::Permission { message },
        429 | 500..=599 => ApiClientError::Transient {
            status: code,
            message,
            retry_after,
        },
        _ => ApiClientError::Api {
            status: code,
            message,
        },
    })
}

/// Google's `error.message` if the body carries one, else the raw body.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<GoogleErrorResponse>(&text) {
        Ok(parsed) => parsed.error.message,
        Err(_) if !text.trim().is_empty() => text,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}
