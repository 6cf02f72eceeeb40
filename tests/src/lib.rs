//! # Pipe Bindings Test Suite
//!
//! Unified test crate for scenarios that span crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Proxy ↔ target over in-process pipes
//!     ├── request_response.rs
//!     ├── teardown.rs
//!     ├── reply_order.rs
//!     ├── flush.rs
//!     └── callbacks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p pipe-tests
//!
//! # By category
//! cargo test -p pipe-tests integration::teardown::
//! ```

pub mod integration;
