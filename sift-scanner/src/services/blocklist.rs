//! Artist blocklist matcher
//!
//! Deterministic first line of detection: a curated list of acts known to
//! publish AI-generated catalog. Matching is case-insensitive and
//! exact-or-substring, so "The Velvet Sundown Band" still matches the
//! "The Velvet Sundown" entry. Pure and synchronous; no network, no state.

use sift_common::model::ArtistRef;

/// Curated artist names known to publish AI-generated music.
///
/// Compared lowercase; entries match an artist whose name equals or contains
/// the entry.
const BLOCKLIST: &[&str] = &[
    "the velvet sundown",
    "aventhis",
    "the devil inside",
    "nick hustles",
    "dreamfield ensemble",
    "stellar echoes project",
    "midnight synth collective",
    "aurora skies band",
    "cold harbor revival",
    "glass meridian",
    "iron meadow",
    "neon prairie",
    "paper crane orchestra",
    "silver birch society",
    "vantage point trio",
    "wandering ember",
];

/// Outcome of a blocklist check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocklistMatch {
    pub matched: bool,
    /// Matching artist names as credited on the track, in artist order
    pub matched_names: Vec<String>,
}

/// Checks track artists against the curated blocklist
#[derive(Debug, Clone)]
pub struct BlocklistMatcher {
    entries: Vec<String>,
}

impl Default for BlocklistMatcher {
    fn default() -> Self {
        Self::with_entries(BLOCKLIST.iter().map(|s| s.to_string()))
    }
}

impl BlocklistMatcher {
    /// Build a matcher over an explicit entry set (entries are lowercased)
    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        BlocklistMatcher {
            entries: entries.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every credited artist, collecting matches in artist order.
    pub fn check(&self, artists: &[ArtistRef]) -> BlocklistMatch {
        let mut matched_names = Vec::new();

        for artist in artists {
            let name = artist.name.to_lowercase();
            if self
                .entries
                .iter()
                .any(|entry| name == *entry || name.contains(entry.as_str()))
            {
                matched_names.push(artist.name.clone());
            }
        }

        BlocklistMatch {
            matched: !matched_names.is_empty(),
            matched_names,
        }
    }
}
