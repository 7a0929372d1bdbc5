//! Service identity derivation
//!
//! Maps a free-form role or playbook name to a systemd-legal unit stem.
//! The mapping is deterministic but not injective, so callers that derive
//! many names in one pass must check for collisions themselves.

pub const SERVICE_SUFFIX: &str = "-monitor";
pub const NAMESPACE_PREFIX: &str = "ansible-";

/// Derive the service identity for `raw_name`.
///
/// Lowercases, turns underscores (and any other character outside
/// `[a-z0-9-]`) into hyphens, appends [`SERVICE_SUFFIX`] unless already
/// present, and prefixes [`NAMESPACE_PREFIX`] when the result does not
/// start with a letter.
pub fn derive_service_name(raw_name: &str) -> String {
    let mut name: String = raw_name
        .chars()
        .flat_map(char::to_lowercase)
        .map(|character| {
            if character.is_ascii_lowercase() || character.is_ascii_digit() {
                character
            } else {
                '-'
            }
        })
        .collect();

    if !name.ends_with(SERVICE_SUFFIX) {
        name.push_str(SERVICE_SUFFIX);
    }

    if !name.starts_with(|character: char| character.is_ascii_lowercase()) {
        name.insert_str(0, NAMESPACE_PREFIX);
    }

    name
}
