//! Magnet URI parsing and construction (data model §3, wire format §6).

use crate::error::{Error, Result};
use url::form_urlencoded;

/// A decoded magnet URI: a 40-char lowercase-hex infohash, an optional
/// display name, and an ordered, deduplicated tracker list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagnetUri {
    pub infohash_hex: String,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

impl MagnetUri {
    pub fn new(infohash: &[u8; 20], display_name: impl Into<String>) -> Self {
        Self {
            infohash_hex: hex::encode(infohash),
            display_name: Some(display_name.into()),
            trackers: Vec::new(),
        }
    }

    pub fn infohash(&self) -> Result<[u8; 20]> {
        let bytes = hex::decode(&self.infohash_hex)?;
        bytes
            .try_into()
            .map_err(|_| Error::InvalidMagnet("infohash must be 20 bytes".into()))
    }

    /// Add a tracker, preserving insertion order and deduplicating.
    pub fn with_tracker(mut self, tracker: impl Into<String>) -> Self {
        self.add_tracker(tracker);
        self
    }

    pub fn add_tracker(&mut self, tracker: impl Into<String>) {
        let tracker = tracker.into();
        if !self.trackers.contains(&tracker) {
            self.trackers.push(tracker);
        }
    }

    /// Union another tracker set into this one, preserving order of first
    /// appearance.
    pub fn union_trackers(&mut self, others: impl IntoIterator<Item = String>) {
        for t in others {
            self.add_tracker(t);
        }
    }

    pub fn encode(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        ser.append_pair("xt", &format!("urn:btih:{}", self.infohash_hex));
        if let Some(name) = &self.display_name {
            ser.append_pair("dn", name);
        }
        for tracker in &self.trackers {
            ser.append_pair("tr", tracker);
        }
        format!("magnet:?{}", ser.finish())
    }

    pub fn decode(uri: &str) -> Result<Self> {
        let stripped = uri
            .strip_prefix("magnet:?")
            .ok_or_else(|| Error::InvalidMagnet(uri.to_string()))?;

        let mut infohash_hex = None;
        let mut display_name = None;
        let mut trackers = Vec::new();

        for (key, value) in form_urlencoded::parse(stripped.as_bytes()) {
            match key.as_ref() {
                "xt" => {
                    let hex_part = value
                        .strip_prefix("urn:btih:")
                        .ok_or_else(|| Error::InvalidMagnet("unsupported xt urn".into()))?;
                    infohash_hex = Some(hex_part.to_lowercase());
                }
                "dn" => display_name = Some(value.into_owned()),
                "tr" => {
                    let tracker = value.into_owned();
                    if !trackers.contains(&tracker) {
                        trackers.push(tracker);
                    }
                }
                _ => {}
            }
        }

        let infohash_hex =
            infohash_hex.ok_or_else(|| Error::InvalidMagnet("missing xt=urn:btih:".into()))?;
        if infohash_hex.len() != 40 || !infohash_hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidMagnet(format!(
                "infohash must be 40 hex chars, got {infohash_hex:?}"
            )));
        }

        Ok(Self {
            infohash_hex,
            display_name,
            trackers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_infohash_and_trackers() {
        let m = MagnetUri::new(&[0xab; 20], "a.json")
            .with_tracker("udp://tracker.example:80")
            .with_tracker("wss://tracker2.example");
        let encoded = m.encode();
        let decoded = MagnetUri::decode(&encoded).unwrap();
        assert_eq!(decoded.infohash().unwrap(), m.infohash().unwrap());
        assert_eq!(decoded.trackers, m.trackers);
    }

    #[test]
    fn rejects_non_magnet_scheme() {
        assert!(MagnetUri::decode("http://example.com").is_err());
    }

    #[test]
    fn rejects_short_infohash() {
        assert!(MagnetUri::decode("magnet:?xt=urn:btih:deadbeef").is_err());
    }

    #[test]
    fn tracker_set_dedups_on_union() {
        let mut m = MagnetUri::new(&[1; 20], "x");
        m.union_trackers(vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(m.trackers, vec!["a".to_string(), "b".to_string()]);
    }
}
