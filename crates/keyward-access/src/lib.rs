//! # Keyward Access
//!
//! The access gate: decides whether a third party may decrypt a document.
//!
//! ## Key Types
//!
//! - [`AccessGate`] - Evaluates an [`AccessRequest`] against the store
//! - [`Authorization`] - The admitted document and the grant that admitted it
//! - [`CapabilityPolicy`] - How grant capabilities are matched
//!
//! ## Decision Order
//!
//! 1. Active, unexpired grant for `(document, third_party)` from the
//!    requesting account, else `PermissionDenied`.
//! 2. Delegation setting on the account, else `DelegationDisabled`.
//! 3. Document exists and is owned by the account.

pub mod error;
pub mod gate;
pub mod policy;

pub use error::{AccessError, Result};
pub use gate::{AccessGate, AccessRequest, Authorization, DEFAULT_DELEGATION_KEY};
pub use policy::CapabilityPolicy;
