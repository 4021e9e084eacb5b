//! User interface for the Google Photos viewer.
//!
//! A single iced window with an authentication bar, three tables (media
//! items, albums, shared albums) and a JSON detail pane. Network work runs
//! off the UI thread: authentication through `Command::perform`, data loading
//! through a [`refresh::RefreshTask`] whose batches arrive on a progress
//! subscription.

mod style;
pub mod table;

use std::path::PathBuf;
use std::sync::Arc;

use api_client::{Album, ApiClientError, ApiConfig, ApiClient, MediaItem};
use auth::{AuthConfig, Authenticator, Credential};
use iced::widget::{button, column, container, row, scrollable, text, Column, Row};
use iced::{
    executor, subscription, theme, Alignment, Application, Command, Element, Font, Length,
    Settings, Subscription, Theme,
};
use refresh::{
    RefreshError, RefreshProgress, RefreshSlot, RefreshSummary, RefreshTask, Refresher,
    ResourceBatch,
};
use rfd::AsyncFileDialog;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::style::Palette;

pub struct ViewerFlags {
    /// Client secrets JSON; when `None` the user is asked for one on first
    /// authentication.
    pub client_secrets: Option<PathBuf>,
    pub token_path: PathBuf,
    pub redirect_port: u16,
    pub api: ApiConfig,
}

#[cfg_attr(feature = "trace-spans", tracing::instrument(skip(flags)))]
pub fn run(flags: ViewerFlags) -> iced::Result {
    ViewerApp::run(Settings::with_flags(flags))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    MediaItems,
    Albums,
    SharedAlbums,
    Details,
}

/// Why a refresh ended without data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub message: String,
    pub requires_reauthentication: bool,
}

impl RefreshFailure {
    fn cancelled() -> Self {
        RefreshFailure {
            message: "Refresh cancelled".to_string(),
            requires_reauthentication: false,
        }
    }
}

impl From<RefreshError> for RefreshFailure {
    fn from(e: RefreshError) -> Self {
        let requires_reauthentication = matches!(
            &e,
            RefreshError::Fetch {
                source: ApiClientError::Auth(auth),
                ..
            } if auth.requires_reauthentication()
        );
        RefreshFailure {
            message: e.to_string(),
            requires_reauthentication,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Authenticate,
    ClientSecretsChosen(Option<PathBuf>),
    Authenticated(Result<Credential, String>),
    SessionRestored(Result<Option<Credential>, String>),
    RefreshData,
    /// Progress of the refresh started in the given session.
    RefreshProgress(u64, RefreshProgress),
    RefreshFinished(u64, Result<RefreshSummary, RefreshFailure>),
    SelectTab(Tab),
    SelectMediaItem(usize),
    SelectAlbum(usize),
    SelectSharedAlbum(usize),
    SignOut,
    SignedOut(Result<(), String>),
    DismissError(usize),
}

pub struct ViewerApp {
    token_path: PathBuf,
    redirect_port: u16,
    api_config: ApiConfig,
    authenticator: Option<Arc<Authenticator>>,
    refresher: Option<Refresher>,
    refresh_slot: RefreshSlot,
    /// Bumped whenever a session starts or ends; refresh messages tagged with
    /// an older value are dropped.
    session: u64,
    /// Dropping the sender cancels the running refresh.
    refresh_cancel: Option<oneshot::Sender<()>>,
    refresh_queued: bool,
    authenticated: bool,
    authenticating: bool,
    loading: bool,
    media_items: Vec<MediaItem>,
    albums: Vec<Album>,
    shared_albums: Vec<Album>,
    tab: Tab,
    selected: Option<(Tab, usize)>,
    details: String,
    status: String,
    errors: Vec<String>,
    progress_sender: mpsc::UnboundedSender<(u64, RefreshProgress)>,
    progress_receiver: Arc<Mutex<mpsc::UnboundedReceiver<(u64, RefreshProgress)>>>,
}

impl ViewerApp {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// True while a refresh task is alive, including one still winding down
    /// after sign-out.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn auth_status(&self) -> &'static str {
        if self.authenticated {
            "Authenticated"
        } else {
            "Not authenticated"
        }
    }

    pub fn auth_button_label(&self) -> &'static str {
        if self.authenticated {
            "Re-authenticate"
        } else {
            "Authenticate"
        }
    }

    pub fn refresh_button_label(&self) -> &'static str {
        if self.loading {
            "Loading..."
        } else {
            "Refresh Data"
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.authenticated && !self.loading
    }

    pub fn media_items(&self) -> &[MediaItem] {
        &self.media_items
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn shared_albums(&self) -> &[Album] {
        &self.shared_albums
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn authenticator_for(&self, client_secrets: PathBuf) -> Arc<Authenticator> {
        let config = AuthConfig::new(client_secrets)
            .with_token_path(self.token_path.clone())
            .with_redirect_port(self.redirect_port);
        Arc::new(Authenticator::new(config))
    }

    fn start_authentication(&mut self) -> Command<Message> {
        let Some(authenticator) = self.authenticator.clone() else {
            return Command::none();
        };
        self.authenticating = true;
        let force_consent = self.authenticated;
        Command::perform(
            async move {
                let result = if force_consent {
                    authenticator.reauthenticate().await
                } else {
                    authenticator.authenticate().await
                };
                result.map_err(|e| e.to_string())
            },
            Message::Authenticated,
        )
    }

    fn install_session(&mut self, credential: Credential) {
        if let Some(authenticator) = &self.authenticator {
            let client =
                ApiClient::with_config(Arc::clone(authenticator), credential, self.api_config.clone());
            self.cancel_refresh();
            self.session += 1;
            self.refresher = Some(Refresher::with_slot(client, self.refresh_slot.clone()));
            self.authenticated = true;
        }
    }

    /// Drop the session. A refresh still running for it is cancelled, and
    /// `loading` stays set until its finish message comes back.
    fn end_session(&mut self) {
        self.cancel_refresh();
        self.session += 1;
        self.authenticated = false;
        self.refresher = None;
        self.refresh_queued = false;
        self.clear_tables();
    }

    fn cancel_refresh(&mut self) {
        if self.refresh_cancel.take().is_some() {
            tracing::info!("Cancelling refresh of the previous session");
        }
    }

    fn clear_tables(&mut self) {
        self.media_items.clear();
        self.albums.clear();
        self.shared_albums.clear();
        self.selected = None;
        self.details.clear();
    }

    fn start_refresh(&mut self) -> Command<Message> {
        if self.loading {
            return Command::none();
        }
        let Some(refresher) = &self.refresher else {
            return Command::none();
        };
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        match refresher.begin(Some(progress_tx)) {
            Ok(task) => {
                let (cancel_tx, cancel_rx) = oneshot::channel();
                self.refresh_cancel = Some(cancel_tx);
                self.loading = true;
                self.status = "Refreshing...".to_string();
                let session = self.session;
                Command::perform(
                    run_refresh(
                        task,
                        session,
                        progress_rx,
                        self.progress_sender.clone(),
                        cancel_rx,
                    ),
                    move |result| Message::RefreshFinished(session, result),
                )
            }
            Err(e) => {
                tracing::info!("{}", e);
                Command::none()
            }
        }
    }

    fn apply_batch(&mut self, batch: ResourceBatch) {
        let tab = match batch {
            ResourceBatch::MediaItems(items) => {
                self.media_items = items;
                Tab::MediaItems
            }
            ResourceBatch::Albums(albums) => {
                self.albums = albums;
                Tab::Albums
            }
            ResourceBatch::SharedAlbums(albums) => {
                self.shared_albums = albums;
                Tab::SharedAlbums
            }
        };
        if matches!(self.selected, Some((selected, _)) if selected == tab) {
            self.selected = None;
        }
    }

    fn show_details<T: serde::Serialize>(&mut self, tab: Tab, index: usize, kind: &str, record: Option<&T>) {
        if let Some(record) = record {
            self.selected = Some((tab, index));
            self.details = table::details_text(kind, record);
            self.tab = Tab::Details;
        }
    }

    fn push_error(&mut self, message: String) {
        tracing::error!("{}", message);
        self.errors.push(message);
    }
}

/// Run `task` until it ends or is cancelled, forwarding its progress tagged
/// with `session`.
async fn run_refresh(
    task: RefreshTask,
    session: u64,
    mut progress: mpsc::UnboundedReceiver<RefreshProgress>,
    forward_to: mpsc::UnboundedSender<(u64, RefreshProgress)>,
    cancel: oneshot::Receiver<()>,
) -> Result<RefreshSummary, RefreshFailure> {
    let run = async move {
        tokio::select! {
            result = task.run() => result
                .map(|snapshot| snapshot.summary())
                .map_err(RefreshFailure::from),
            _ = cancel => Err(RefreshFailure::cancelled()),
        }
    };
    let forward = async move {
        while let Some(update) = progress.recv().await {
            if forward_to.send((session, update)).is_err() {
                break;
            }
        }
    };
    let (result, ()) = tokio::join!(run, forward);
    result
}

async fn pick_client_secrets() -> Option<PathBuf> {
    AsyncFileDialog::new()
        .set_title("Select Google Photos Credentials File")
        .add_filter("JSON Files", &["json"])
        .set_directory(dirs::home_dir().unwrap_or_default())
        .pick_file()
        .await
        .map(|handle| handle.path().to_path_buf())
}

impl Application for ViewerApp {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ViewerFlags;

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(flags)))]
    fn new(flags: ViewerFlags) -> (Self, Command<Message>) {
        let (progress_sender, progress_receiver) = mpsc::unbounded_channel();
        let mut app = Self {
            token_path: flags.token_path,
            redirect_port: flags.redirect_port,
            api_config: flags.api,
            authenticator: None,
            refresher: None,
            refresh_slot: RefreshSlot::new(),
            session: 0,
            refresh_cancel: None,
            refresh_queued: false,
            authenticated: false,
            authenticating: false,
            loading: false,
            media_items: Vec::new(),
            albums: Vec::new(),
            shared_albums: Vec::new(),
            tab: Tab::MediaItems,
            selected: None,
            details: String::new(),
            status: String::new(),
            errors: Vec::new(),
            progress_sender,
            progress_receiver: Arc::new(Mutex::new(progress_receiver)),
        };

        let command = match flags.client_secrets {
            Some(path) => {
                let authenticator = app.authenticator_for(path);
                app.authenticator = Some(Arc::clone(&authenticator));
                Command::perform(
                    async move { authenticator.restore().await.map_err(|e| e.to_string()) },
                    Message::SessionRestored,
                )
            }
            None => Command::none(),
        };
        (app, command)
    }

    fn title(&self) -> String {
        String::from("Google Photos Viewer")
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::Authenticate => {
                if self.authenticating {
                    return Command::none();
                }
                if self.authenticator.is_none() {
                    self.authenticating = true;
                    return Command::perform(pick_client_secrets(), Message::ClientSecretsChosen);
                }
                return self.start_authentication();
            }
            Message::ClientSecretsChosen(path) => {
                self.authenticating = false;
                if let Some(path) = path {
                    tracing::info!("Using client secrets from {}", path.display());
                    self.authenticator = Some(self.authenticator_for(path));
                    return self.start_authentication();
                }
            }
            Message::Authenticated(Ok(credential)) => {
                self.authenticating = false;
                self.install_session(credential);
                self.status = "Successfully authenticated with Google Photos".to_string();
                if self.loading {
                    // The previous session's refresh is still winding down.
                    self.refresh_queued = true;
                    return Command::none();
                }
                return self.start_refresh();
            }
            Message::Authenticated(Err(e)) => {
                self.authenticating = false;
                self.push_error(format!("Failed to authenticate: {}", e));
            }
            Message::SessionRestored(Ok(Some(credential))) => {
                tracing::info!("Restored stored Google Photos session");
                self.install_session(credential);
            }
            Message::SessionRestored(Ok(None)) => {
                tracing::debug!("No stored session to restore");
            }
            Message::SessionRestored(Err(e)) => {
                tracing::warn!("Failed to restore session: {}", e);
            }
            Message::RefreshData => {
                if self.authenticated {
                    return self.start_refresh();
                }
            }
            Message::RefreshProgress(session, _) if session != self.session => {
                tracing::debug!("Dropping progress from an earlier session");
            }
            Message::RefreshProgress(_, update) => match update {
                RefreshProgress::Started => {
                    self.status = "Refreshing...".to_string();
                }
                RefreshProgress::PageFetched { kind, total } => {
                    self.status = format!("Loading {}... {} so far", kind, total);
                }
                RefreshProgress::Completed(batch) => {
                    self.apply_batch(batch);
                }
                RefreshProgress::Finished(summary) => {
                    self.status = format!(
                        "Loaded {}, {}, {}",
                        table::media_items_label(summary.media_items),
                        table::albums_label(summary.albums),
                        table::shared_albums_label(summary.shared_albums)
                    );
                }
                RefreshProgress::Failed(message) => {
                    self.status = format!("Refresh failed: {}", message);
                }
            },
            Message::RefreshFinished(session, result) => {
                self.loading = false;
                if session != self.session {
                    tracing::debug!("Refresh of an earlier session ended: {:?}", result);
                    if std::mem::take(&mut self.refresh_queued) && self.authenticated {
                        return self.start_refresh();
                    }
                    return Command::none();
                }
                self.refresh_cancel = None;
                match result {
                    Ok(summary) => tracing::info!("Refresh finished: {:?}", summary),
                    Err(failure) => {
                        self.push_error(format!("Failed to refresh data: {}", failure.message));
                        if failure.requires_reauthentication {
                            self.end_session();
                        }
                    }
                }
            }
            Message::SelectTab(tab) => {
                self.tab = tab;
            }
            Message::SelectMediaItem(index) => {
                let record = self.media_items.get(index).cloned();
                self.show_details(Tab::MediaItems, index, "Media Item", record.as_ref());
            }
            Message::SelectAlbum(index) => {
                let record = self.albums.get(index).cloned();
                self.show_details(Tab::Albums, index, "Album", record.as_ref());
            }
            Message::SelectSharedAlbum(index) => {
                let record = self.shared_albums.get(index).cloned();
                self.show_details(Tab::SharedAlbums, index, "Shared Album", record.as_ref());
            }
            Message::SignOut => {
                self.end_session();
                self.status = "Signed out".to_string();
                if let Some(authenticator) = self.authenticator.clone() {
                    return Command::perform(
                        async move { authenticator.revoke().await.map_err(|e| e.to_string()) },
                        Message::SignedOut,
                    );
                }
            }
            Message::SignedOut(Ok(())) => {
                tracing::info!("Signed out of Google Photos");
            }
            Message::SignedOut(Err(e)) => {
                self.push_error(format!("Failed to sign out: {}", e));
            }
            Message::DismissError(index) => {
                if index < self.errors.len() {
                    self.errors.remove(index);
                }
            }
        }
        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let receiver = Arc::clone(&self.progress_receiver);
        subscription::unfold("refresh-progress", receiver, |rx| async move {
            let mut lock = rx.lock().await;
            let msg = loop {
                match lock.recv().await {
                    Some((session, update)) => break Message::RefreshProgress(session, update),
                    // The app holds a sender, so this only happens on shutdown.
                    None => std::future::pending::<()>().await,
                }
            };
            drop(lock);
            (msg, rx)
        })
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    fn view(&self) -> Element<Message> {
        let header = row![
            text("Google Photos").size(24),
            text(self.auth_status()),
            button(self.auth_button_label())
                .style(theme::Button::Primary)
                .on_press_maybe((!self.authenticating).then_some(Message::Authenticate)),
            button("Sign out")
                .style(theme::Button::Secondary)
                .on_press_maybe(self.authenticated.then_some(Message::SignOut)),
            button(self.refresh_button_label())
                .style(theme::Button::Primary)
                .on_press_maybe(self.can_refresh().then_some(Message::RefreshData)),
            text(&self.status),
        ]
        .spacing(Palette::SPACING)
        .align_items(Alignment::Center);

        let tabs = row![
            tab_button("Media Items", Tab::MediaItems, self.tab),
            tab_button("Albums", Tab::Albums, self.tab),
            tab_button("Shared Albums", Tab::SharedAlbums, self.tab),
            tab_button("Details", Tab::Details, self.tab),
        ]
        .spacing(8);

        let selected_in = |tab: Tab| match self.selected {
            Some((selected, index)) if selected == tab => Some(index),
            _ => None,
        };
        let body: Element<Message> = match self.tab {
            Tab::MediaItems => column![
                text(table::media_items_label(self.media_items.len())),
                table_view(
                    table::MEDIA_ITEM_COLUMNS,
                    self.media_items.iter().map(table::media_item_row),
                    selected_in(Tab::MediaItems),
                    Message::SelectMediaItem,
                ),
            ]
            .spacing(8)
            .into(),
            Tab::Albums => column![
                text(table::albums_label(self.albums.len())),
                table_view(
                    table::ALBUM_COLUMNS,
                    self.albums.iter().map(table::album_row),
                    selected_in(Tab::Albums),
                    Message::SelectAlbum,
                ),
            ]
            .spacing(8)
            .into(),
            Tab::SharedAlbums => column![
                text(table::shared_albums_label(self.shared_albums.len())),
                table_view(
                    table::ALBUM_COLUMNS,
                    self.shared_albums.iter().map(table::album_row),
                    selected_in(Tab::SharedAlbums),
                    Message::SelectSharedAlbum,
                ),
            ]
            .spacing(8)
            .into(),
            Tab::Details => container(
                scrollable(text(&self.details).font(Font::MONOSPACE)).height(Length::Fill),
            )
            .style(style::card())
            .padding(10)
            .width(Length::Fill)
            .height(Length::Fill)
            .into(),
        };

        let mut layout = Column::new().spacing(Palette::SPACING).padding(Palette::SPACING).push(header);

        if !self.errors.is_empty() {
            let mut list = Column::new().spacing(5);
            for (i, msg) in self.errors.iter().enumerate() {
                list = list.push(
                    row![
                        text(msg).size(16).width(Length::Fill),
                        button("Dismiss")
                            .style(theme::Button::Secondary)
                            .on_press(Message::DismissError(i))
                    ]
                    .spacing(10)
                    .align_items(Alignment::Center),
                );
            }
            layout = layout.push(
                container(list)
                    .style(style::error_banner())
                    .padding(10)
                    .width(Length::Fill),
            );
        }

        layout.push(tabs).push(body).into()
    }
}

fn tab_button(label: &str, tab: Tab, current: Tab) -> Element<'_, Message> {
    let style = if tab == current {
        theme::Button::Primary
    } else {
        theme::Button::Secondary
    };
    button(label).style(style).on_press(Message::SelectTab(tab)).into()
}

fn table_view<'a, const N: usize>(
    columns: [&'static str; N],
    rows: impl Iterator<Item = [String; N]>,
    selected: Option<usize>,
    on_select: fn(usize) -> Message,
) -> Element<'a, Message> {
    let header = Row::with_children(
        columns
            .iter()
            .map(|title| text(*title).size(16).width(Length::Fill).into())
            .collect::<Vec<Element<'a, Message>>>(),
    )
    .spacing(8)
    .padding([4, 8]);

    let mut list = Column::new();
    for (index, cells) in rows.enumerate() {
        let cells = Row::with_children(
            cells
                .into_iter()
                .map(|cell| text(cell).size(14).width(Length::Fill).into())
                .collect::<Vec<Element<'a, Message>>>(),
        )
        .spacing(8);
        let line = button(cells)
            .style(theme::Button::Text)
            .width(Length::Fill)
            .on_press(on_select(index));
        list = if selected == Some(index) {
            list.push(container(line).style(style::selected_row()).width(Length::Fill))
        } else {
            list.push(line)
        };
    }

    container(column![header, scrollable(list).height(Length::Fill)])
        .style(style::card())
        .padding(4)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
