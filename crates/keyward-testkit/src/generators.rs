//! Proptest generators for property-based testing.

use proptest::prelude::*;

use keyward_core::{AccountId, Capability, KeyBundle, ThirdPartyId, KEY_LEN};

/// Random key bytes.
pub fn key_bytes() -> impl Strategy<Value = [u8; KEY_LEN]> {
    any::<[u8; KEY_LEN]>()
}

/// A bundle around random key bytes.
pub fn key_bundle() -> impl Strategy<Value = KeyBundle> {
    key_bytes().prop_map(|bytes| KeyBundle::from_bytes(&bytes))
}

/// Document content of up to `max_len` bytes.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// A non-empty account id.
pub fn account_id() -> impl Strategy<Value = AccountId> {
    "[a-z][a-z0-9-]{0,31}".prop_map(|s| AccountId::new(s).expect("non-empty"))
}

/// A non-empty third-party id.
pub fn third_party_id() -> impl Strategy<Value = ThirdPartyId> {
    "[a-z][a-z0-9-]{0,31}".prop_map(|s| ThirdPartyId::new(s).expect("non-empty"))
}

pub fn capability() -> impl Strategy<Value = Capability> {
    prop_oneof![
        Just(Capability::Read),
        Just(Capability::Write),
        Just(Capability::Delete),
        Just(Capability::Other),
    ]
}

/// Grant lifetime in seconds; `None` never expires.
pub fn ttl() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![Just(None), (1i64..=86_400).prop_map(Some)]
}
