//! Small value types shared by inputs, outputs and transactions.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::TransactionError;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The two ledger operations.
///
/// `Create` mints a new asset and has no spent outputs; `Transfer` moves
/// ownership by spending outputs of earlier transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "CREATE")]
    Create,
    #[serde(rename = "TRANSFER")]
    Transfer,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive: `"create"`, `"Create"` and `"CREATE"` all parse.
impl FromStr for Operation {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "TRANSFER" => Ok(Self::Transfer),
            _ => Err(TransactionError::UnknownOperation(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionLink
// ---------------------------------------------------------------------------

/// Pointer from an input to the output it spends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionLink {
    pub transaction_id: String,
    pub output_index: u32,
}

impl TransactionLink {
    pub fn new(transaction_id: impl Into<String>, output_index: u32) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            output_index,
        }
    }
}

impl fmt::Display for TransactionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_id, self.output_index)
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// `{"data": ...}` on CREATE, `{"id": <creating txid>}` on TRANSFER.
///
/// Parsing is strict: exactly one of the two keys must be present, so a
/// fetched asset always re-serializes to the bytes it was hashed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Asset {
    Link { id: String },
    Definition { data: Option<Value> },
}

impl Asset {
    pub fn data(data: Option<Value>) -> Self {
        Self::Definition { data }
    }

    pub fn link(id: impl Into<String>) -> Self {
        Self::Link { id: id.into() }
    }

    /// The creating transaction id, for a link.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Link { id } => Some(id),
            Self::Definition { .. } => None,
        }
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        const FIELDS: &[&str] = &["id", "data"];

        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let id = fields.remove("id");
        let data = fields.remove("data");
        if let Some(key) = fields.keys().next() {
            return Err(de::Error::unknown_field(key, FIELDS));
        }
        match (id, data) {
            (Some(Value::String(id)), None) => Ok(Self::Link { id }),
            (Some(other), None) => Err(de::Error::custom(format!(
                "asset id must be a string, got {}",
                other
            ))),
            (None, Some(Value::Null)) => Ok(Self::Definition { data: None }),
            (None, Some(data)) => Ok(Self::Definition { data: Some(data) }),
            (Some(_), Some(_)) => Err(de::Error::custom("asset carries both `id` and `data`")),
            (None, None) => Err(de::Error::missing_field("data")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_parses_case_insensitively() {
        assert_eq!("create".parse::<Operation>().unwrap(), Operation::Create);
        assert_eq!("Transfer".parse::<Operation>().unwrap(), Operation::Transfer);
        match "burn".parse::<Operation>() {
            Err(TransactionError::UnknownOperation(op)) => assert_eq!(op, "burn"),
            other => panic!("expected UnknownOperation, got {:?}", other),
        }
    }

    #[test]
    fn operation_wire_names() {
        assert_eq!(serde_json::to_value(Operation::Create).unwrap(), json!("CREATE"));
        assert_eq!(
            serde_json::from_value::<Operation>(json!("TRANSFER")).unwrap(),
            Operation::Transfer
        );
    }

    #[test]
    fn asset_shapes() {
        assert_eq!(
            serde_json::to_value(Asset::data(None)).unwrap(),
            json!({"data": null})
        );
        assert_eq!(
            serde_json::from_value::<Asset>(json!({"id": "abc"})).unwrap(),
            Asset::link("abc")
        );
        assert_eq!(
            serde_json::from_value::<Asset>(json!({"data": {"k": 1}})).unwrap(),
            Asset::data(Some(json!({"k": 1})))
        );
    }

    #[test]
    fn asset_parsing_is_strict() {
        for bad in [
            json!({}),
            json!({"id": "abc", "data": null}),
            json!({"data": null, "extra": 1}),
            json!({"id": 7}),
        ] {
            assert!(
                serde_json::from_value::<Asset>(bad.clone()).is_err(),
                "accepted {}",
                bad
            );
        }
        let parsed: Asset = serde_json::from_value(json!({"data": null})).unwrap();
        assert_eq!(serde_json::to_value(parsed).unwrap(), json!({"data": null}));
    }

    #[test]
    fn link_serializes_with_field_names() {
        assert_eq!(
            serde_json::to_value(TransactionLink::new("ab", 2)).unwrap(),
            json!({"transaction_id": "ab", "output_index": 2})
        );
    }
}
