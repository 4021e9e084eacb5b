//! HTTP fixtures for the OAuth token endpoint and the Photos Library API.

use httptest::{matchers::*, responders::*, Expectation};
use serde_json::{json, Value};

pub use httptest::{self, Server};

/// Create a mock server for the OAuth token endpoint.
/// The server expects exactly one refresh grant on POST `/token` and answers
/// with `access_token`.
pub fn token_server(access_token: &str) -> Server {
    let server = Server::run();
    expect_token_grant(&server, "refresh_token", access_token, None);
    server
}

/// A token endpoint that rejects exactly one refresh grant with `invalid_grant`.
pub fn revoked_token_server() -> Server {
    let server = Server::run();
    expect_revoked_refresh(&server);
    server
}

/// Expect one POST `/token` with the given `grant_type`.
pub fn expect_token_grant(
    server: &Server,
    grant_type: &'static str,
    access_token: &str,
    refresh_token: Option<&str>,
) {
    let mut body = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = json!(refresh);
    }
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/token"),
            request::body(url_decoded(contains(("grant_type", grant_type)))),
        ])
        .times(1)
        .respond_with(json_encoded(body)),
    );
}

/// Expect one refresh grant and reject it the way Google does for a revoked
/// refresh token.
pub fn expect_revoked_refresh(server: &Server) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/token"),
            request::body(url_decoded(contains(("grant_type", "refresh_token")))),
        ])
        .times(1)
        .respond_with(
            status_code(400)
                .append_header("Content-Type", "application/json")
                .body(
                    json!({
                        "error": "invalid_grant",
                        "error_description": "Token has been expired or revoked."
                    })
                    .to_string(),
                ),
        ),
    );
}

/// Expect one POST `/revoke`.
pub fn expect_revocation(server: &Server) {
    server.expect(
        Expectation::matching(request::method_path("POST", "/revoke"))
            .times(1)
            .respond_with(status_code(200)),
    );
}

/// Desktop client secrets whose endpoints point at `server`.
pub fn client_secrets_json(server: &Server) -> String {
    json!({
        "installed": {
            "client_id": "test-client.apps.googleusercontent.com",
            "client_secret": "test-secret",
            "auth_uri": server.url_str("/auth"),
            "token_uri": server.url_str("/token"),
            "redirect_uris": ["http://localhost"]
        }
    })
    .to_string()
}

/// Create an empty mock server for Google Photos API endpoints.
pub fn photos_server() -> Server {
    Server::run()
}

pub fn media_item(id: &str) -> Value {
    json!({
        "id": id,
        "description": "desc",
        "productUrl": format!("https://photos.google.com/lr/photo/{}", id),
        "baseUrl": format!("https://lh3.googleusercontent.com/{}", id),
        "mimeType": "image/jpeg",
        "mediaMetadata": {
            "creationTime": "2023-01-01T00:00:00Z",
            "width": "100",
            "height": "200",
            "photo": { "cameraMake": "Pixel" }
        },
        "filename": format!("{}.jpg", id)
    })
}

pub fn album(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "productUrl": format!("https://photos.google.com/lr/album/{}", id),
        "isWriteable": true,
        "mediaItemsCount": "3",
        "coverPhotoBaseUrl": format!("https://lh3.googleusercontent.com/cover/{}", id),
        "coverPhotoMediaItemId": "cover"
    })
}

/// Expect one GET on a list endpoint and answer with one page.
///
/// `page_token` is the cursor the request must carry (`None` = no
/// `pageToken` parameter at all), `next` the cursor to hand back.
pub fn expect_page(
    server: &Server,
    path: &'static str,
    field: &str,
    items: Vec<Value>,
    page_token: Option<&'static str>,
    next: Option<&str>,
) {
    let mut body = serde_json::Map::new();
    body.insert(field.to_string(), Value::Array(items));
    if let Some(next) = next {
        body.insert("nextPageToken".to_string(), json!(next));
    }
    let expectation = match page_token {
        Some(token) => Expectation::matching(all_of![
            request::method_path("GET", path),
            request::query(url_decoded(contains(("pageToken", token)))),
        ]),
        None => Expectation::matching(all_of![
            request::method_path("GET", path),
            request::query(url_decoded(not(contains(key("pageToken"))))),
        ]),
    };
    server.expect(expectation.times(1).respond_with(json_encoded(Value::Object(body))));
}

/// Expect `times` GETs on `path` answered with `status` and a Google error body.
pub fn expect_error(server: &Server, path: &'static str, status: u16, message: &str, times: usize) {
    let body = json!({
        "error": { "code": status, "message": message, "status": "ERROR" }
    });
    server.expect(
        Expectation::matching(request::method_path("GET", path))
            .times(times)
            .respond_with(
                status_code(status)
                    .append_header("Content-Type", "application/json")
                    .body(body.to_string()),
            ),
    );
}
