// 🗂️ Masking Table
// Bidirectional literal <-> placeholder map with a collision check

use regex::Regex;
use std::collections::HashMap;

use crate::error::{SentinelError, SentinelResult};
use crate::rules::{RISKY_GEOLOCATION, SANCTIONED_ENTITY};

/// Placeholder standing in for the "Sanctioned Entity" reason
pub const MONITORED_ENTITY_REASON: &str = "[Reason: Monitored Entity]";
/// Placeholder standing in for the "Risky Geolocation" reason
pub const HIGH_RISK_LOCATION_REASON: &str = "[Reason: High-Risk Location]";

// Locations are labelled from A, entities from X
const LOCATION_LABEL_OFFSET: usize = 0;
const ENTITY_LABEL_OFFSET: usize = 23;

/// Anything that looks like one of our placeholders, known or not
pub const PLACEHOLDER_SHAPE: &str = r"\[(?:Location|Entity)-[A-Z]+\]|\[Reason: [^\]\[]+\]";

// ============================================================================
// ENTRIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Fixed human-readable flag reason
    ReasonPhrase,
    Location,
    Entity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskingEntry {
    pub literal: String,
    pub placeholder: String,
    pub kind: EntryKind,
}

/// Bijective base-26 label: 0 -> A, 25 -> Z, 26 -> AA, 27 -> AB, ...
pub fn letter_label(index: usize) -> String {
    let mut n = index + 1;
    let mut label = Vec::new();
    while n > 0 {
        n -= 1;
        label.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

// ============================================================================
// TABLE
// ============================================================================

/// Compiled single-pass matchers, one per direction
#[derive(Debug, Clone)]
pub(crate) struct Matchers {
    pub(crate) literals: Regex,
    pub(crate) placeholders: Regex,
    pub(crate) shape: Regex,
}

/// Literal -> placeholder map and its exact inverse.
///
/// Built fresh for every request from the two catalogs; never shared or
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct MaskingTable {
    entries: Vec<MaskingEntry>,
    forward: HashMap<String, String>,
    inverse: HashMap<String, String>,
    pub(crate) matchers: Matchers,
}

impl MaskingTable {
    /// Build the table in its fixed order: the two reason phrases, then
    /// locations, then entities. Fails fast on any collision.
    pub fn build<S: AsRef<str>>(
        sanctioned_entities: &[S],
        high_risk_locations: &[S],
    ) -> SentinelResult<Self> {
        let mut entries = vec![
            MaskingEntry {
                literal: SANCTIONED_ENTITY.to_string(),
                placeholder: MONITORED_ENTITY_REASON.to_string(),
                kind: EntryKind::ReasonPhrase,
            },
            MaskingEntry {
                literal: RISKY_GEOLOCATION.to_string(),
                placeholder: HIGH_RISK_LOCATION_REASON.to_string(),
                kind: EntryKind::ReasonPhrase,
            },
        ];

        for (i, location) in high_risk_locations.iter().enumerate() {
            entries.push(MaskingEntry {
                literal: location.as_ref().to_string(),
                placeholder: format!("[Location-{}]", letter_label(LOCATION_LABEL_OFFSET + i)),
                kind: EntryKind::Location,
            });
        }

        for (i, entity) in sanctioned_entities.iter().enumerate() {
            entries.push(MaskingEntry {
                literal: entity.as_ref().to_string(),
                placeholder: format!("[Entity-{}]", letter_label(ENTITY_LABEL_OFFSET + i)),
                kind: EntryKind::Entity,
            });
        }

        check_collisions(&entries)?;

        let forward: HashMap<String, String> = entries
            .iter()
            .map(|e| (e.literal.clone(), e.placeholder.clone()))
            .collect();
        let inverse: HashMap<String, String> = forward
            .iter()
            .map(|(literal, placeholder)| (placeholder.clone(), literal.clone()))
            .collect();

        let matchers = Matchers {
            literals: alternation(entries.iter().map(|e| e.literal.as_str()))?,
            placeholders: alternation(entries.iter().map(|e| e.placeholder.as_str()))?,
            shape: Regex::new(PLACEHOLDER_SHAPE)?,
        };

        Ok(MaskingTable {
            entries,
            forward,
            inverse,
            matchers,
        })
    }

    /// Entries in construction order
    pub fn entries(&self) -> &[MaskingEntry] {
        &self.entries
    }

    pub fn placeholder_for(&self, literal: &str) -> Option<&str> {
        self.forward.get(literal).map(String::as_str)
    }

    pub fn literal_for(&self, placeholder: &str) -> Option<&str> {
        self.inverse.get(placeholder).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Longest-first alternation of escaped literals. The regex engine picks the
/// leftmost match and, among those, the first alternative, so sorting by
/// length gives longest-match-first.
fn alternation<'a>(items: impl Iterator<Item = &'a str>) -> SentinelResult<Regex> {
    let mut items: Vec<&str> = items.collect();
    items.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let pattern = items
        .iter()
        .map(|item| regex::escape(item))
        .collect::<Vec<_>>()
        .join("|");

    Ok(Regex::new(&pattern)?)
}

fn check_collisions(entries: &[MaskingEntry]) -> SentinelResult<()> {
    for (i, entry) in entries.iter().enumerate() {
        if entry.literal.trim().is_empty() {
            return Err(SentinelError::MaskingCollision(format!(
                "empty literal at position {}",
                i
            )));
        }

        for (j, other) in entries.iter().enumerate() {
            if i == j {
                continue;
            }
            if entry.literal == other.literal {
                return Err(SentinelError::MaskingCollision(format!(
                    "literal {:?} appears more than once",
                    entry.literal
                )));
            }
            if other.literal.contains(entry.literal.as_str()) {
                return Err(SentinelError::MaskingCollision(format!(
                    "literal {:?} is a substring of literal {:?}",
                    entry.literal, other.literal
                )));
            }
            if other.placeholder.contains(entry.placeholder.as_str()) {
                return Err(SentinelError::MaskingCollision(format!(
                    "placeholder {:?} is a substring of placeholder {:?}",
                    entry.placeholder, other.placeholder
                )));
            }
        }

        for other in entries {
            if other.placeholder.contains(entry.literal.as_str()) {
                return Err(SentinelError::MaskingCollision(format!(
                    "literal {:?} appears inside placeholder {:?}",
                    entry.literal, other.placeholder
                )));
            }
            if entry.literal.contains(other.placeholder.as_str()) {
                return Err(SentinelError::MaskingCollision(format!(
                    "placeholder {:?} appears inside literal {:?}",
                    other.placeholder, entry.literal
                )));
            }
        }
    }

    Ok(())
}
