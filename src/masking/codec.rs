// 🔁 Masking Codec
// Single left-to-right pass per direction: replaced text is never rescanned,
// so the order of table entries cannot corrupt the output.

use regex::Captures;
use serde_json::Value;
use std::borrow::Cow;

use super::table::MaskingTable;
use crate::error::{SentinelError, SentinelResult};

/// Replace every catalog literal with its placeholder.
///
/// Text that already contains one of the table's placeholders is refused:
/// unmasking would otherwise turn it into a literal that was never there.
pub fn mask<'a>(text: &'a str, table: &MaskingTable) -> SentinelResult<Cow<'a, str>> {
    if let Some(found) = table.matchers.placeholders.find(text) {
        return Err(SentinelError::ReservedToken {
            token: found.as_str().to_string(),
        });
    }

    Ok(table.matchers.literals.replace_all(text, |caps: &Captures| {
        let literal = &caps[0];
        table
            .placeholder_for(literal)
            .unwrap_or(literal)
            .to_string()
    }))
}

/// Replace every known placeholder with its literal. Placeholder-shaped
/// tokens the table does not know are left as they are.
pub fn unmask<'a>(text: &'a str, table: &MaskingTable) -> Cow<'a, str> {
    table.matchers.placeholders.replace_all(text, |caps: &Captures| {
        let placeholder = &caps[0];
        table
            .literal_for(placeholder)
            .unwrap_or(placeholder)
            .to_string()
    })
}

/// A table bound to one request, with helpers for structured payloads
#[derive(Debug, Clone, Copy)]
pub struct MaskingCodec<'t> {
    table: &'t MaskingTable,
}

impl<'t> MaskingCodec<'t> {
    pub fn new(table: &'t MaskingTable) -> Self {
        MaskingCodec { table }
    }

    pub fn table(&self) -> &'t MaskingTable {
        self.table
    }

    pub fn mask<'a>(&self, text: &'a str) -> SentinelResult<Cow<'a, str>> {
        mask(text, self.table)
    }

    pub fn unmask<'a>(&self, text: &'a str) -> Cow<'a, str> {
        unmask(text, self.table)
    }

    /// Mask every string and object key in a JSON payload, then serialize it.
    /// Strings are masked before serialization so escaping cannot hide a literal.
    pub fn mask_json(&self, value: &Value) -> SentinelResult<String> {
        let masked = self.mask_value(value)?;
        Ok(serde_json::to_string(&masked)?)
    }

    fn mask_value(&self, value: &Value) -> SentinelResult<Value> {
        Ok(match value {
            Value::String(text) => Value::String(self.mask(text)?.into_owned()),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.mask_value(item))
                    .collect::<SentinelResult<_>>()?,
            ),
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, item)| Ok((self.mask(key)?.into_owned(), self.mask_value(item)?)))
                    .collect::<SentinelResult<_>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Placeholder-shaped tokens in `text` that this table cannot restore
    pub fn unknown_placeholders(&self, text: &str) -> Vec<String> {
        self.table
            .matchers
            .shape
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|token| self.table.literal_for(token).is_none())
            .map(str::to_string)
            .collect()
    }
}
