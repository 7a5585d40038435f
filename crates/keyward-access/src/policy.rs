//! How a grant's capability is matched against a request.

use keyward_core::Capability;
use serde::{Deserialize, Serialize};

/// Capability matching rule applied by the gate.
///
/// Deployments that rely on read-only grants for third parties should use
/// `RequireMatching`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityPolicy {
    /// Any active grant on the document admits the request, whatever its
    /// capability.
    #[default]
    AnyActiveGrant,
    /// The grant's capability must equal the requested one.
    RequireMatching,
}

impl CapabilityPolicy {
    /// Whether a grant of `granted` admits a request for `requested`.
    pub fn admits(&self, granted: Capability, requested: Capability) -> bool {
        match self {
            CapabilityPolicy::AnyActiveGrant => true,
            CapabilityPolicy::RequireMatching => granted == requested,
        }
    }
}
