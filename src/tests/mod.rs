// Test modules for chatEX
// Each module tests the corresponding source module

mod client_tests;
mod session_tests;
