//! Default nicknames for freshly created profiles.

use uuid::Uuid;

const ADJECTIVES: &[&str] = &[
    "brave", "calm", "clever", "curious", "gentle", "happy", "lucky", "mellow", "nimble",
    "quiet", "sunny", "swift", "tidy", "witty",
];

const NOUNS: &[&str] = &[
    "badger", "comet", "falcon", "fern", "harbor", "lantern", "maple", "otter", "pebble",
    "quill", "sparrow", "tiger", "willow",
];

/// Pick a nickname such as `swift-otter-042`.
pub fn random_nickname() -> String {
    nickname_from_seed(Uuid::new_v4())
}

pub fn nickname_from_seed(seed: Uuid) -> String {
    let bytes = seed.as_bytes();
    let adjective = ADJECTIVES[usize::from(bytes[0]) % ADJECTIVES.len()];
    let noun = NOUNS[usize::from(bytes[1]) % NOUNS.len()];
    let suffix = u16::from_be_bytes([bytes[2], bytes[3]]) % 1000;
    format!("{adjective}-{noun}-{suffix:03}")
}
