// Test helpers for ChatClient tests

use crate::client::{ChatClient, RefreshSnapshot};
use crate::settings::Settings;
use crate::storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// A fresh store shared by every client of one test
pub fn shared_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// A client on `store` with its own session record
pub fn client(store: &Arc<MemoryStore>, session_key: &str) -> ChatClient {
    ChatClient::new(store.clone(), Settings::default().with_session_key(session_key))
}

/// A client already logged in as `nickname`, auto-refresh off
pub async fn logged_in(store: &Arc<MemoryStore>, nickname: &str) -> ChatClient {
    let client = client(store, &format!("session-{}", nickname.to_lowercase()));
    client
        .login(nickname, "secret", 0)
        .await
        .expect("Failed to log in");
    client
}

/// Open a chat from `from` to `to` and send `text`
pub async fn send(from: &ChatClient, to: &str, text: &str) -> String {
    from.select_candidate(to).await;
    let id = from
        .start_new_chat()
        .await
        .expect("Failed to start chat")
        .expect("No candidate selected");
    from.send_message(text).await.expect("Failed to send");
    id
}

/// Wait until a snapshot satisfies `predicate`
pub async fn wait_for_snapshot<F>(rx: &mut watch::Receiver<RefreshSnapshot>, predicate: F) -> RefreshSnapshot
where
    F: FnMut(&RefreshSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(30), rx.wait_for(predicate))
        .await
        .expect("Timed out waiting for snapshot")
        .expect("Snapshot channel closed")
        .clone()
}

/// Let timestamps of later writes differ from earlier ones
pub fn next_millisecond() {
    std::thread::sleep(Duration::from_millis(3));
}
