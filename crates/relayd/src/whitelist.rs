//! Publisher whitelist: accepts either lowercase-hex or `npub1…` bech32
//! pubkeys in `ALLOWED_PUBKEYS`, matching events by their hex pubkey.

/// Normalize an `ALLOWED_PUBKEYS` entry to lowercase hex. Returns `None`
/// if it's neither valid hex nor a valid `npub1` bech32 string.
pub fn normalize_pubkey(entry: &str) -> Option<String> {
    if entry.len() == 64 && entry.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(entry.to_lowercase());
    }
    if entry.starts_with("npub1") {
        if let Ok((hrp, bytes)) = bech32::decode(entry) {
            if hrp.as_str() == "npub" && bytes.len() == 32 {
                return Some(hex::encode(bytes));
            }
        }
    }
    None
}

/// A whitelist of publisher pubkeys (hex). Empty means "allow everyone".
pub struct Whitelist {
    allowed: Vec<String>,
}

impl Whitelist {
    pub fn new(entries: &[String]) -> Self {
        Self {
            allowed: entries.iter().filter_map(|e| normalize_pubkey(e)).collect(),
        }
    }

    pub fn allows(&self, pubkey_hex: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|pk| pk == pubkey_hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_whitelist_allows_everyone() {
        let wl = Whitelist::new(&[]);
        assert!(wl.allows(&"a".repeat(64)));
    }

    #[test]
    fn hex_entry_matches_case_insensitively() {
        let wl = Whitelist::new(&["AB".repeat(32)]);
        assert!(wl.allows(&"ab".repeat(32)));
        assert!(!wl.allows(&"cd".repeat(32)));
    }

    #[test]
    fn invalid_entries_are_dropped_not_panicked_on() {
        let wl = Whitelist::new(&["not-a-valid-key".to_string()]);
        // No valid entries survive normalization, so the whitelist is
        // effectively empty and allows everyone -- same fallback as if
        // ALLOWED_PUBKEYS had never been set.
        assert!(wl.allows(&"a".repeat(64)));
    }
}
