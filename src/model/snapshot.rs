//! The stored document and its transport encoding.
//!
//! The whole transaction sequence is one pretty-printed JSON array, carried as base64. Remote
//! stores may insert line breaks into the base64 payload; `decode` removes them.

use crate::model::Transaction;
use crate::Res;
use anyhow::Context;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::warn;

/// Opaque revision identifier issued by the store on every successful write.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VersionTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The full ordered transaction sequence as observed by one load, plus its version tag. A
/// `version` of `None` means the document does not exist yet and will be created on first write.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    transactions: Vec<Transaction>,
    version: Option<VersionTag>,
}

impl Snapshot {
    pub fn new(transactions: Vec<Transaction>, version: Option<VersionTag>) -> Self {
        Self {
            transactions,
            version,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn version(&self) -> Option<&VersionTag> {
        self.version.as_ref()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Transaction>, Option<VersionTag>) {
        (self.transactions, self.version)
    }
}

/// Serializes the sequence as a pretty-printed JSON array.
pub fn to_document(transactions: &[Transaction]) -> Res<String> {
    serde_json::to_string_pretty(transactions).context("Unable to serialize transactions")
}

/// Parses a JSON document. A document that is valid JSON but not an array is treated as empty.
pub fn from_document(document: &str) -> Res<Vec<Transaction>> {
    let value: serde_json::Value =
        serde_json::from_str(document).context("The stored document is not valid JSON")?;
    if !value.is_array() {
        warn!("The stored document is not a JSON array, treating it as empty");
        return Ok(Vec::new());
    }
    serde_json::from_value(value).context("The stored document has an invalid transaction record")
}

/// Encodes the sequence for transport: pretty JSON, then standard base64.
pub fn encode(transactions: &[Transaction]) -> Res<String> {
    let document = to_document(transactions)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(document.as_bytes()))
}

/// Reverses `encode`. Line breaks inserted by the transport are stripped before decoding.
pub fn decode(payload: &str) -> Res<Vec<Transaction>> {
    let compact: String = payload
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .context("The stored document is not valid base64")?;
    let document = String::from_utf8(bytes).context("The stored document is not valid UTF-8")?;
    from_document(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTransaction;

    fn txn(amount: &str, kind: &str, note: &str, date: &str) -> Transaction {
        NewTransaction::new(amount, kind)
            .note(note)
            .date(date)
            .validate()
            .unwrap()
    }

    #[test]
    fn test_round_trip_empty() {
        let payload = encode(&[]).unwrap();
        assert!(decode(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_special_characters() {
        let data = vec![
            txn("100", "income", "salary", "2024-01-10"),
            txn(
                "40.25",
                "expense",
                "\"quoted\" \\ back\nslash, tab\t, emoji 🍜, peso ₱",
                "2024-01-20T23:30:00.000Z",
            ),
        ];
        let payload = encode(&data).unwrap();
        assert_eq!(decode(&payload).unwrap(), data);
    }

    #[test]
    fn test_decode_strips_line_breaks() {
        let data = vec![txn("12.5", "expense", "a longer note to wrap", "2024-02-01")];
        let payload = encode(&data).unwrap();
        let wrapped: String = payload
            .as_bytes()
            .chunks(60)
            .map(|c| format!("{}\n", std::str::from_utf8(c).unwrap()))
            .collect();
        assert_eq!(decode(&wrapped).unwrap(), data);
    }

    #[test]
    fn test_document_is_pretty_printed() {
        let doc = to_document(&[txn("1", "income", "", "2024-01-01")]).unwrap();
        assert!(doc.starts_with("[\n  {\n    \"amount\": 1,"));
    }

    #[test]
    fn test_decode_non_array_is_empty() {
        let payload = base64::engine::general_purpose::STANDARD.encode("{\"a\": 1}");
        assert!(decode(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode("***not base64***").is_err());
        let payload = base64::engine::general_purpose::STANDARD.encode("[{");
        assert!(decode(&payload).is_err());
    }

    #[test]
    fn test_decode_preserves_order() {
        let data: Vec<Transaction> = (1..=5)
            .map(|i| txn(&i.to_string(), "income", &format!("n{i}"), "2024-01-01"))
            .collect();
        let decoded = decode(&encode(&data).unwrap()).unwrap();
        let notes: Vec<&str> = decoded.iter().map(|t| t.note()).collect();
        assert_eq!(notes, vec!["n1", "n2", "n3", "n4", "n5"]);
    }
}
