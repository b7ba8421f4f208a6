//! Transaction inputs: who owned the value before, which output is being
//! spent, and (once fulfilled) the proof.

use serde::{Deserialize, Serialize};

use super::types::TransactionLink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub owners_before: Vec<String>,
    /// `None` for CREATE inputs.
    pub fulfills: Option<TransactionLink>,
    /// Fulfillment URI; `None` until the transaction is fulfilled.
    pub fulfillment: Option<String>,
}

impl Input {
    pub fn unsigned(owners_before: Vec<String>, fulfills: Option<TransactionLink>) -> Self {
        Self {
            owners_before,
            fulfills,
            fulfillment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unsigned_create_input_shape() {
        let input = Input::unsigned(vec!["pk".into()], None);
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"owners_before": ["pk"], "fulfills": null, "fulfillment": null})
        );
    }
}
