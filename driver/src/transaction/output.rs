//! Transaction outputs: an amount locked by a crypto-condition.

use serde::{Deserialize, Serialize};

use super::TransactionError;
use crate::condition::{ConditionDetails, Fulfillment, ThresholdSha256};
use crate::config::MAX_AMOUNT;
use crate::crypto::PublicKey;

/// `output.condition`: the JSON details and the URI they encode to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCondition {
    pub details: ConditionDetails,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Serialized as a decimal string.
    #[serde(with = "amount_string")]
    pub amount: u64,
    pub condition: OutputCondition,
    pub public_keys: Vec<String>,
}

impl Output {
    /// Lock `amount` to `public_keys`: a single key gets an Ed25519
    /// condition, several keys get an n-of-n threshold over them.
    pub fn generate<S: AsRef<str>>(public_keys: &[S], amount: u64) -> Result<Self, TransactionError> {
        if amount == 0 || amount > MAX_AMOUNT {
            return Err(TransactionError::InvalidAmount {
                amount,
                max: MAX_AMOUNT,
            });
        }
        let fulfillment = owners_fulfillment(public_keys)?;
        Ok(Self {
            amount,
            condition: OutputCondition {
                details: fulfillment.to_details()?,
                uri: fulfillment.condition_uri(),
            },
            public_keys: public_keys.iter().map(|k| k.as_ref().to_string()).collect(),
        })
    }
}

/// Unsigned fulfillment structure that locks to exactly `owners`.
pub(crate) fn owners_fulfillment<S: AsRef<str>>(owners: &[S]) -> Result<Fulfillment, TransactionError> {
    let keys = owners
        .iter()
        .map(|k| PublicKey::from_base58(k.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    match keys.as_slice() {
        [] => Err(TransactionError::NoOwners),
        [single] => Ok(Fulfillment::ed25519(*single)),
        many => {
            let mut node = ThresholdSha256::new(many.len());
            for key in many {
                node.add_subfulfillment(Fulfillment::ed25519(*key));
            }
            Ok(Fulfillment::Threshold(node))
        }
    }
}

mod amount_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s
                .parse()
                .map_err(|_| D::Error::custom(format!("amount `{}` is not an unsigned integer", s))),
            Repr::Number(n) => Ok(n),
        }
    }
}
