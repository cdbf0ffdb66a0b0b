// Client Tests Module - Testing the ChatClient sync/refresh controller
// - helpers: Shared store and client construction
// - login_tests: Login, logout, restore
// - messaging_tests: Starting chats, sending, read markers, search
// - refresh_tests: Auto-refresh timer and cross-context notifications

mod helpers;
mod refresh_tests;
