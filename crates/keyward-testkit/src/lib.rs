//! # Keyward Testkit
//!
//! Testing utilities for Keyward.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: [`Scenario`] wires an engine to instrumented collaborators
//! - **Instrumented collaborators**: key stores and stores that count calls,
//!   fail, or lose a compare-and-swap on demand
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use keyward_testkit::{Scenario, SAMPLE_DOCUMENT};
//!
//! async fn example() {
//!     let scenario = Scenario::new();
//!     let doc = scenario.shared_document(SAMPLE_DOCUMENT).await.unwrap();
//!     let outcome = scenario.rotate(&doc).await.unwrap();
//!     assert_eq!(outcome.plaintext, SAMPLE_DOCUMENT);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use keyward_testkit::generators::{key_bundle, plaintext};
//!
//! proptest! {
//!     #[test]
//!     fn seal_open(bundle in key_bundle(), body in plaintext(256)) {
//!         let token = bundle.encrypt(&body).unwrap();
//!         prop_assert_eq!(bundle.decrypt(&token).unwrap(), body);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod instrumented;

pub use fixtures::{init_tracing, Scenario, SAMPLE_DOCUMENT};
pub use instrumented::{ContendedStore, RecordingKeyStore, RecordingStore, UnreachableKeyStore};
