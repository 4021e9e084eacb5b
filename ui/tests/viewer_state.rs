use api_client::{Album, ApiConfig, MediaItem};
use auth::{AuthError, Credential, PHOTOS_APP_CREATED_SCOPE};
use iced::Application;
use refresh::{RefreshProgress, RefreshSummary, ResourceBatch};
use serde_json::json;
use tempfile::TempDir;
use ui::{Message, RefreshFailure, Tab, ViewerApp, ViewerFlags};

fn flags(dir: &TempDir, with_secrets: bool) -> ViewerFlags {
    ViewerFlags {
        client_secrets: with_secrets.then(|| dir.path().join("client_secret.json")),
        token_path: dir.path().join("token.json"),
        redirect_port: 0,
        api: ApiConfig::with_base_url("http://127.0.0.1:9"),
    }
}

fn credential() -> Credential {
    Credential::new(
        "access",
        Some("refresh".into()),
        Some(3600),
        vec![PHOTOS_APP_CREATED_SCOPE.to_string()],
    )
}

fn media_item(id: &str) -> MediaItem {
    serde_json::from_value(json!({
        "id": id,
        "filename": format!("{id}.jpg"),
        "mimeType": "image/jpeg",
        "mediaMetadata": {"creationTime": "2023-01-01T00:00:00Z", "width": "10", "height": "20"}
    }))
    .unwrap()
}

fn album(id: &str) -> Album {
    serde_json::from_value(json!({"id": id, "title": "Trip", "mediaItemsCount": "2"})).unwrap()
}

/// A viewer that has just completed authentication.
fn signed_in(dir: &TempDir) -> ViewerApp {
    let (mut ui, _) = ViewerApp::new(flags(dir, true));
    let _ = ui.update(Message::Authenticated(Ok(credential())));
    ui
}

#[test]
fn initial_state_is_signed_out() {
    let dir = TempDir::new().unwrap();
    let (ui, _) = ViewerApp::new(flags(&dir, false));
    assert!(!ui.is_authenticated());
    assert_eq!(ui.auth_status(), "Not authenticated");
    assert_eq!(ui.auth_button_label(), "Authenticate");
    assert_eq!(ui.refresh_button_label(), "Refresh Data");
    assert!(!ui.can_refresh());
    assert!(ui.media_items().is_empty());
    assert_eq!(ui.tab(), Tab::MediaItems);
}

#[test]
fn authentication_starts_a_refresh() {
    let dir = TempDir::new().unwrap();
    let ui = signed_in(&dir);
    assert!(ui.is_authenticated());
    assert_eq!(ui.auth_status(), "Authenticated");
    assert_eq!(ui.auth_button_label(), "Re-authenticate");
    assert!(ui.is_loading());
    assert_eq!(ui.refresh_button_label(), "Loading...");
    assert!(!ui.can_refresh());
}

#[test]
fn refresh_request_while_loading_is_ignored() {
    let dir = TempDir::new().unwrap();
    let mut ui = signed_in(&dir);
    let _ = ui.update(Message::RefreshData);
    assert!(ui.is_loading());

    let _ = ui.update(Message::RefreshFinished(ui.session(), Ok(RefreshSummary::default())));
    assert!(!ui.is_loading());
    assert!(ui.can_refresh());
}

#[test]
fn restored_session_does_not_refresh_on_its_own() {
    let dir = TempDir::new().unwrap();
    let (mut ui, _) = ViewerApp::new(flags(&dir, true));
    let _ = ui.update(Message::SessionRestored(Ok(Some(credential()))));
    assert!(ui.is_authenticated());
    assert!(!ui.is_loading());
}

#[test]
fn batches_fill_tables_and_selection_shows_details() {
    let dir = TempDir::new().unwrap();
    let mut ui = signed_in(&dir);
    let _ = ui.update(Message::RefreshProgress(ui.session(), RefreshProgress::Completed(
        ResourceBatch::MediaItems(vec![media_item("m1"), media_item("m2")]),
    )));
    let _ = ui.update(Message::RefreshProgress(ui.session(), RefreshProgress::Completed(
        ResourceBatch::SharedAlbums(vec![album("s1")]),
    )));
    assert_eq!(ui.media_items().len(), 2);
    assert!(ui.albums().is_empty());
    assert_eq!(ui.shared_albums().len(), 1);

    let _ = ui.update(Message::SelectMediaItem(1));
    assert_eq!(ui.tab(), Tab::Details);
    assert!(ui.details().starts_with("Media Item Details:\n\n"));
    assert!(ui.details().contains("\"id\": \"m2\""));

    let _ = ui.update(Message::SelectSharedAlbum(0));
    assert!(ui.details().starts_with("Shared Album Details:"));

    // Out of range selections leave the pane alone.
    let _ = ui.update(Message::SelectAlbum(5));
    assert!(ui.details().starts_with("Shared Album Details:"));
}

#[test]
fn progress_updates_the_status_line() {
    let dir = TempDir::new().unwrap();
    let mut ui = signed_in(&dir);
    let _ = ui.update(Message::RefreshProgress(ui.session(), RefreshProgress::Finished(RefreshSummary {
        media_items: 4,
        albums: 1,
        shared_albums: 0,
    })));
    assert_eq!(ui.status(), "Loaded 4 media items, 1 albums, 0 shared albums");
}

#[test]
fn refresh_failure_is_reported_and_dismissable() {
    let dir = TempDir::new().unwrap();
    let mut ui = signed_in(&dir);
    let _ = ui.update(Message::RefreshFinished(ui.session(), Err(RefreshFailure {
        message: "Failed to fetch albums: quota".into(),
        requires_reauthentication: false,
    })));
    assert!(!ui.is_loading());
    assert!(ui.is_authenticated());
    assert_eq!(ui.errors().len(), 1);
    assert!(ui.errors()[0].contains("quota"));

    let _ = ui.update(Message::DismissError(0));
    assert!(ui.errors().is_empty());
    let _ = ui.update(Message::DismissError(3));
}

#[test]
fn revoked_grant_during_refresh_signs_out() {
    let dir = TempDir::new().unwrap();
    let mut ui = signed_in(&dir);
    let _ = ui.update(Message::RefreshProgress(ui.session(), RefreshProgress::Completed(
        ResourceBatch::Albums(vec![album("a1")]),
    )));
    let failure = RefreshFailure::from(refresh::RefreshError::Fetch {
        kind: refresh::ResourceKind::MediaItems,
        source: AuthError::Revoked("invalid_grant".into()).into(),
    });
    assert!(failure.requires_reauthentication);

    let _ = ui.update(Message::RefreshFinished(ui.session(), Err(failure)));
    assert!(!ui.is_authenticated());
    assert!(ui.albums().is_empty());
    assert_eq!(ui.auth_button_label(), "Authenticate");
}

#[test]
fn failed_authentication_keeps_signed_out_state() {
    let dir = TempDir::new().unwrap();
    let (mut ui, _) = ViewerApp::new(flags(&dir, true));
    let _ = ui.update(Message::Authenticated(Err("access_denied".into())));
    assert!(!ui.is_authenticated());
    assert!(ui.errors()[0].contains("access_denied"));
}

#[test]
fn sign_out_clears_everything() {
    let dir = TempDir::new().unwrap();
    let mut ui = signed_in(&dir);
    let _ = ui.update(Message::RefreshProgress(ui.session(), RefreshProgress::Completed(
        ResourceBatch::MediaItems(vec![media_item("m1")]),
    )));
    let _ = ui.update(Message::SelectMediaItem(0));
    assert!(!ui.details().is_empty());
    let old_session = ui.session();

    let _ = ui.update(Message::SignOut);
    assert!(!ui.is_authenticated());
    assert!(ui.media_items().is_empty());
    assert!(ui.details().is_empty());

    // Late batches from a refresh that was still running are dropped.
    let _ = ui.update(Message::RefreshProgress(old_session, RefreshProgress::Completed(
        ResourceBatch::MediaItems(vec![media_item("late")]),
    )));
    assert!(ui.media_items().is_empty());
}

#[test]
fn tabs_switch() {
    let dir = TempDir::new().unwrap();
    let (mut ui, _) = ViewerApp::new(flags(&dir, false));
    let _ = ui.update(Message::SelectTab(Tab::SharedAlbums));
    assert_eq!(ui.tab(), Tab::SharedAlbums);
}

#[test]
fn refresh_of_a_previous_session_cannot_end_the_new_one() {
    let dir = TempDir::new().unwrap();
    let mut ui = signed_in(&dir);
    let first_session = ui.session();

    let _ = ui.update(Message::SignOut);
    assert!(!ui.is_authenticated());
    // The cancelled task has not reported back yet.
    assert!(ui.is_loading());

    let _ = ui.update(Message::Authenticated(Ok(credential())));
    assert!(ui.is_authenticated());
    assert_ne!(ui.session(), first_session);
    assert!(ui.is_loading());
    assert!(!ui.can_refresh());

    let _ = ui.update(Message::RefreshProgress(
        first_session,
        RefreshProgress::Completed(ResourceBatch::MediaItems(vec![media_item("stale")])),
    ));
    assert!(ui.media_items().is_empty());

    let stale = RefreshFailure::from(refresh::RefreshError::Fetch {
        kind: refresh::ResourceKind::MediaItems,
        source: AuthError::Revoked("invalid_grant".into()).into(),
    });
    let _ = ui.update(Message::RefreshFinished(first_session, Err(stale)));
    assert!(ui.is_authenticated());
    assert!(ui.errors().is_empty());
    // The refresh queued by the new sign-in starts once the old one is gone.
    assert!(ui.is_loading());

    let _ = ui.update(Message::RefreshProgress(
        ui.session(),
        RefreshProgress::Completed(ResourceBatch::MediaItems(vec![media_item("fresh")])),
    ));
    assert_eq!(ui.media_items().len(), 1);
    let _ = ui.update(Message::RefreshFinished(ui.session(), Ok(RefreshSummary::default())));
    assert!(!ui.is_loading());
    assert!(ui.can_refresh());
}

#[test]
fn late_finish_after_sign_out_only_clears_loading() {
    let dir = TempDir::new().unwrap();
    let mut ui = signed_in(&dir);
    let first_session = ui.session();
    let _ = ui.update(Message::SignOut);

    let _ = ui.update(Message::RefreshFinished(first_session, Ok(RefreshSummary::default())));
    assert!(!ui.is_loading());
    assert!(!ui.is_authenticated());
    assert!(!ui.can_refresh());
}
