// 🎭 Reversible Masking
// Swap sensitive literals for stable placeholders before text leaves the
// process, and swap them back on the way in.
//
// - table: which literal maps to which placeholder (built per request)
// - codec: single-pass substitution in both directions

pub mod codec;
pub mod table;

pub use codec::{mask, unmask, MaskingCodec};
pub use table::{
    letter_label, EntryKind, MaskingEntry, MaskingTable, HIGH_RISK_LOCATION_REASON,
    MONITORED_ENTITY_REASON, PLACEHOLDER_SHAPE,
};
