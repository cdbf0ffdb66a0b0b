//! Sync and refresh controller
//!
//! A [`ChatClient`] is one client context (one "tab"). It owns the session
//! state of whoever is logged in through it and keeps that state in line with
//! the shared server record:
//! - on demand (`refresh_all`, and after every user action)
//! - on a recurring auto-refresh timer
//! - when another context writes the server or session record
//!
//! Session state sits behind an async mutex, so timer ticks, change
//! notifications and caller operations never interleave within a context.

use crate::{
    server::ServerEmulator,
    session::{
        directory::{self, SearchOutcome},
        SessionState, SortOrder, User,
    },
    settings::Settings,
    storage::{codec, ContextId, KeyValueStore, StoreHandle},
    view::{self, ChatListRow, ConversationView},
    Error, Result,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Everything a front end needs to draw after a refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSnapshot {
    /// Chat list rows in the configured order
    pub chats: Vec<ChatListRow>,
    /// The open conversation, if any
    pub conversation: Option<ConversationView>,
}

impl RefreshSnapshot {
    /// Whether the chat list is empty
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

/// Transient user-facing notice produced by an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Login succeeded
    Welcome(String),
    /// Session cleared
    LoggedOut,
    /// Auto-refresh now runs every given number of milliseconds
    AutoRefreshEvery(u64),
    /// Auto-refresh turned off
    AutoRefreshOff,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Welcome(nickname) => write!(f, "Welcome, {}!", nickname),
            Notice::LoggedOut => write!(f, "Logged out. All local data has been removed."),
            Notice::AutoRefreshEvery(ms) => {
                write!(f, "Auto refresh every {} seconds", *ms as f64 / 1000.0)
            }
            Notice::AutoRefreshOff => write!(f, "Auto refresh off"),
        }
    }
}

/// State shared between a client and its background tasks
struct Inner {
    store: StoreHandle,
    server: ServerEmulator,
    settings: Settings,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<RefreshSnapshot>,
}

impl Inner {
    fn is_watched_key(&self, key: &str) -> bool {
        key == self.settings.server_key || key == self.settings.session_key
    }

    fn persist_locked(&self, state: &SessionState) -> Result<()> {
        state.persist(&self.store, &self.settings.session_key)
    }

    fn sync_locked(&self, state: &mut SessionState) -> bool {
        let record = self.server.snapshot();
        state.sync_from_server(&record)
    }

    /// Render the open conversation, marking it read
    ///
    /// The session is persisted only when viewing changed the read state, so
    /// contexts sharing a session record settle instead of re-triggering each
    /// other forever.
    fn render_conversation_locked(&self, state: &mut SessionState) -> Result<Option<ConversationView>> {
        let (Some(chat), Some(nickname)) = (state.active_chat(), state.nickname()) else {
            return Ok(None);
        };
        let conversation = ConversationView::from_chat(chat, nickname);

        if state.mark_viewed(&conversation.id, codec::now_millis()) {
            self.persist_locked(state)?;
        }
        Ok(Some(conversation))
    }

    fn render_locked(&self, state: &mut SessionState) -> Result<RefreshSnapshot> {
        let conversation = self.render_conversation_locked(state)?;
        let snapshot = RefreshSnapshot {
            chats: view::render_chat_list(state, self.settings.preview_max_chars),
            conversation,
        };
        self.snapshots.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    fn refresh_locked(&self, state: &mut SessionState) -> Result<RefreshSnapshot> {
        self.sync_locked(state);
        self.render_locked(state)
    }

    async fn refresh_all(&self) -> Result<RefreshSnapshot> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state)
    }
}

/// One client context over a shared store
///
/// Must be used inside a tokio runtime; the auto-refresh timer and the
/// storage watcher run as spawned tasks and are aborted on drop.
///
/// # Example
/// ```rust,no_run
/// use chatex::{storage::MemoryStore, ChatClient, Settings};
/// use std::sync::Arc;
///
/// # async fn example() -> chatex::Result<()> {
/// let store = Arc::new(MemoryStore::new());
/// let alice = ChatClient::new(store.clone(), Settings::default().with_session_key("alice"));
/// let bob = ChatClient::new(store, Settings::default().with_session_key("bob"));
///
/// alice.login("Alice", "secret", 0).await?;
/// bob.login("Bob", "secret", 0).await?;
/// bob.watch_storage().await;
///
/// alice.select_candidate("Bob").await;
/// alice.start_new_chat().await?;
/// alice.send_message("hi").await?;
/// # Ok(())
/// # }
/// ```
pub struct ChatClient {
    inner: Arc<Inner>,
    auto_refresh_task: Mutex<Option<JoinHandle<()>>>,
    watcher_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatClient {
    /// Create a client context over `store`
    pub fn new(store: Arc<dyn KeyValueStore>, settings: Settings) -> Self {
        let handle = StoreHandle::new(store, ContextId::new());
        let server = ServerEmulator::new(handle.clone(), settings.server_key.clone());
        let (snapshots, _) = watch::channel(RefreshSnapshot::default());

        Self {
            inner: Arc::new(Inner {
                store: handle,
                server,
                settings,
                state: Mutex::new(SessionState::new()),
                snapshots,
            }),
            auto_refresh_task: Mutex::new(None),
            watcher_task: Mutex::new(None),
        }
    }

    /// Context id this client writes as
    pub fn context_id(&self) -> ContextId {
        self.inner.store.origin()
    }

    /// Settings this client was created with
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// The server emulator this client writes through
    pub fn server(&self) -> &ServerEmulator {
        &self.inner.server
    }

    /// Receive every snapshot this client renders
    pub fn subscribe(&self) -> watch::Receiver<RefreshSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Copy of the current session state
    pub async fn session(&self) -> SessionState {
        self.inner.state.lock().await.clone()
    }

    /// Log in, replacing whatever session this context had
    ///
    /// An empty nickname gets a random one. An empty password fails with
    /// [`Error::MissingPassword`] before any state changes.
    pub async fn login(&self, nickname: &str, password: &str, auto_refresh_ms: u64) -> Result<Notice> {
        let password = password.trim();
        if password.is_empty() {
            return Err(Error::MissingPassword);
        }
        let nickname = match nickname.trim() {
            "" => directory::random_nickname(),
            given => given.to_string(),
        };

        {
            let mut state = self.inner.state.lock().await;
            self.inner.server.ensure_user_registered(&nickname)?;
            state.start(
                User {
                    nickname: nickname.clone(),
                    password: password.to_string(),
                },
                directory::build_directory(self.inner.settings.directory_variants_per_name),
            );
            self.inner.sync_locked(&mut state);
            state.auto_refresh_ms = auto_refresh_ms;
            self.inner.persist_locked(&state)?;
            self.inner.render_locked(&mut state)?;
        }

        self.start_auto_refresh(auto_refresh_ms).await;
        info!("{} logged in on context {}", nickname, self.context_id());
        Ok(Notice::Welcome(nickname))
    }

    /// Log out, deleting the stored session
    pub async fn logout(&self) -> Result<Notice> {
        self.inner.store.remove(&self.inner.settings.session_key)?;
        {
            let mut state = self.inner.state.lock().await;
            if let Some(nickname) = state.nickname() {
                info!("{} logged out on context {}", nickname, self.context_id());
            }
            state.clear();
        }
        self.start_auto_refresh(0).await;
        self.inner.snapshots.send_replace(RefreshSnapshot::default());
        Ok(Notice::LoggedOut)
    }

    /// Resume the session stored in the shared store
    ///
    /// # Returns
    /// `true` if a logged-in session was found and restored
    pub async fn restore(&self) -> Result<bool> {
        let loaded = SessionState::load(&self.inner.store, &self.inner.settings.session_key);
        let Some(nickname) = loaded.nickname().map(str::to_string) else {
            return Ok(false);
        };
        let auto_refresh_ms = loaded.auto_refresh_ms;

        {
            let mut state = self.inner.state.lock().await;
            *state = loaded;
            self.inner.server.ensure_user_registered(&nickname)?;
            self.inner.refresh_locked(&mut state)?;
        }

        self.start_auto_refresh(auto_refresh_ms).await;
        info!("Restored session of {}", nickname);
        Ok(true)
    }

    /// Rebuild the chat list from the server record without rendering
    ///
    /// # Returns
    /// `false` if no user is logged in
    pub async fn sync_from_server(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        self.inner.sync_locked(&mut state)
    }

    /// Sync, then render the chat list and the open conversation
    pub async fn refresh_all(&self) -> Result<RefreshSnapshot> {
        self.inner.refresh_all().await
    }

    /// Open conversation `id`, mark it read now and persist the marker
    pub async fn open_conversation(&self, id: &str) -> Result<Option<ConversationView>> {
        let mut state = self.inner.state.lock().await;
        state.active_chat_id = Some(id.to_string());
        if state.chat(id).is_some() {
            state.mark_read(id, codec::now_millis());
            self.inner.persist_locked(&state)?;
        }
        Ok(self.inner.render_locked(&mut state)?.conversation)
    }

    /// Close the open conversation and go back to the chat list
    pub async fn close_conversation(&self) -> Result<Vec<ChatListRow>> {
        let mut state = self.inner.state.lock().await;
        state.active_chat_id = None;
        Ok(self.inner.render_locked(&mut state)?.chats)
    }

    /// Send `text` to the open conversation
    ///
    /// Blank text, or no open conversation, does nothing.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let mut state = self.inner.state.lock().await;
        let nickname = state.nickname().ok_or(Error::NotLoggedIn)?.to_string();
        let Some(chat) = state.active_chat() else {
            return Ok(());
        };
        let (id, partner) = (chat.id.clone(), chat.partner.clone());

        self.inner.server.push_message(&nickname, &partner, text, &nickname)?;
        state.mark_read(&id, codec::now_millis());
        self.inner.sync_locked(&mut state);
        self.inner.persist_locked(&state)?;
        self.inner.refresh_locked(&mut state)?;
        Ok(())
    }

    /// Search the directory for someone to start a chat with
    pub async fn search(&self, keyword: &str) -> SearchOutcome {
        let mut state = self.inner.state.lock().await;
        let outcome = state.search(keyword, self.inner.settings.directory_variants_per_name);
        if outcome == SearchOutcome::PromptForKeyword {
            state.selected_search = None;
        }
        outcome
    }

    /// Pick `nickname` as the partner for [`ChatClient::start_new_chat`]
    pub async fn select_candidate(&self, nickname: &str) {
        self.inner.state.lock().await.selected_search = Some(nickname.to_string());
    }

    /// Start (or reopen) a chat with the selected candidate and open it
    ///
    /// # Returns
    /// The conversation id, or `None` if nothing was selected
    pub async fn start_new_chat(&self) -> Result<Option<String>> {
        let mut state = self.inner.state.lock().await;
        let nickname = state.nickname().ok_or(Error::NotLoggedIn)?.to_string();
        let Some(partner) = state.selected_search.take() else {
            return Ok(None);
        };

        let conversation = self.inner.server.upsert_conversation(&nickname, &partner)?;
        state.seed_meta(&conversation.id);
        self.inner.sync_locked(&mut state);
        state.active_chat_id = Some(conversation.id.clone());
        state.mark_read(&conversation.id, codec::now_millis());
        self.inner.persist_locked(&state)?;
        self.inner.refresh_locked(&mut state)?;

        info!("{} started chat {}", nickname, conversation.id);
        Ok(Some(conversation.id))
    }

    /// Change the chat list order
    pub async fn set_sort_order(&self, order: SortOrder) -> Result<Vec<ChatListRow>> {
        let mut state = self.inner.state.lock().await;
        state.sort_order = order;
        self.inner.persist_locked(&state)?;

        let rows = view::render_chat_list(&state, self.inner.settings.preview_max_chars);
        self.inner.snapshots.send_modify(|s| s.chats = rows.clone());
        Ok(rows)
    }

    /// Set the auto-refresh interval (0 turns it off) and persist it
    pub async fn set_auto_refresh(&self, ms: u64) -> Result<Notice> {
        {
            let mut state = self.inner.state.lock().await;
            state.auto_refresh_ms = ms;
            self.inner.persist_locked(&state)?;
        }
        self.start_auto_refresh(ms).await;

        Ok(if ms == 0 {
            Notice::AutoRefreshOff
        } else {
            Notice::AutoRefreshEvery(ms)
        })
    }

    /// Number of running auto-refresh timers (0 or 1)
    pub async fn active_timer_count(&self) -> usize {
        let task = self.auto_refresh_task.lock().await;
        usize::from(task.as_ref().is_some_and(|t| !t.is_finished()))
    }

    /// Replace the auto-refresh timer
    ///
    /// Any running timer is cancelled first; `ms == 0` leaves none running.
    async fn start_auto_refresh(&self, ms: u64) {
        let mut task = self.auto_refresh_task.lock().await;
        if let Some(running) = task.take() {
            running.abort();
            debug!("Cancelled auto refresh timer");
        }
        if ms == 0 {
            return;
        }

        let inner = self.inner.clone();
        let period = Duration::from_millis(ms);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = inner.refresh_all().await {
                    error!("Auto refresh failed: {}", e);
                }
            }
        }));
        info!("Auto refresh every {} ms", ms);
    }

    /// React to other contexts' writes of the server or session record
    ///
    /// Subscribes before returning, so every later write from another context
    /// triggers a refresh. Writes made by this context are ignored.
    pub async fn watch_storage(&self) {
        let mut task = self.watcher_task.lock().await;
        if let Some(running) = task.take() {
            running.abort();
        }

        let inner = self.inner.clone();
        let mut changes = inner.store.subscribe();
        *task = Some(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if change.origin == inner.store.origin() || !inner.is_watched_key(&change.key) {
                            continue;
                        }
                        debug!("'{}' changed by context {}, refreshing", change.key, change.origin);
                        if let Err(e) = inner.refresh_all().await {
                            error!("Refresh after storage change failed: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} storage notifications, refreshing", skipped);
                        if let Err(e) = inner.refresh_all().await {
                            error!("Refresh after storage change failed: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Stop reacting to storage changes
    pub async fn stop_watching(&self) {
        if let Some(task) = self.watcher_task.lock().await.take() {
            task.abort();
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        for slot in [&self.auto_refresh_task, &self.watcher_task] {
            if let Some(task) = slot.try_lock().ok().and_then(|mut guard| guard.take()) {
                task.abort();
            }
        }
    }
}
