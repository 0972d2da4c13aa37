//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Security group used by rule scenarios.
pub const TEST_GROUP: &str = "r006-sg-1";

/// Bearer token issued by the mock IAM endpoint.
pub const TEST_TOKEN: &str = "integration-token";
