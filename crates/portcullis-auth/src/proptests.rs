//! Property-based tests for API-key verification.
