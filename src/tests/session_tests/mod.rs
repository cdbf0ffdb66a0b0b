// Session Tests Module - Testing the session module
// - state_tests: SessionState sync, hasNew derivation, sorting, persistence
// - directory_tests: Directory search outcomes
