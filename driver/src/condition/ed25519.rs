//! `ed25519-sha-256`: a single public key, unlocked by a signature over the
//! message.

use std::collections::BTreeSet;

use super::{der, Condition, ConditionError, ConditionType};
use crate::crypto::{sha256, PrivateKey, PublicKey};

/// Fixed cost of an Ed25519 condition.
pub const COST: u64 = 131_072;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ed25519Sha256 {
    public_key: PublicKey,
    signature: Option<[u8; 64]>,
}

impl Ed25519Sha256 {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            signature: None,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn signature(&self) -> Option<&[u8; 64]> {
        self.signature.as_ref()
    }

    /// Sign `message`. The caller has already checked that `key` belongs to
    /// this condition.
    pub(crate) fn sign(&mut self, message: &[u8], key: &PrivateKey) {
        self.signature = Some(key.sign(message));
    }

    /// SHA-256 over `SEQUENCE { [0] publicKey }`.
    pub fn fingerprint(&self) -> [u8; 32] {
        let contents = der::tlv(
            der::SEQUENCE,
            &der::tlv(der::context(0), self.public_key.as_bytes()),
        );
        sha256(&contents)
    }

    pub fn condition(&self) -> Condition {
        Condition {
            condition_type: ConditionType::Ed25519Sha256,
            fingerprint: self.fingerprint(),
            cost: COST,
            subtypes: BTreeSet::new(),
        }
    }

    pub fn validate(&self, message: &[u8]) -> bool {
        match &self.signature {
            Some(signature) => self.public_key.verify(message, signature),
            None => false,
        }
    }

    pub fn to_der(&self) -> Result<Vec<u8>, ConditionError> {
        let signature = self.signature.as_ref().ok_or(ConditionError::Unsigned)?;
        let mut content = der::tlv(der::context(0), self.public_key.as_bytes());
        content.extend(der::tlv(der::context(1), signature));
        Ok(der::tlv(
            der::context_constructed(ConditionType::Ed25519Sha256.id()),
            &content,
        ))
    }

    pub(crate) fn from_der_content(content: &[u8]) -> Result<Self, ConditionError> {
        let mut reader = der::Reader::new(content);
        let public_key: [u8; 32] = reader
            .expect(der::context(0))?
            .try_into()
            .map_err(|_| ConditionError::der("ed25519 public key must be 32 bytes"))?;
        let signature: [u8; 64] = reader
            .expect(der::context(1))?
            .try_into()
            .map_err(|_| ConditionError::der("ed25519 signature must be 64 bytes"))?;
        reader.finish()?;
        Ok(Self {
            public_key: PublicKey::from_bytes(public_key),
            signature: Some(signature),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfillment_der_layout() {
        let key = PrivateKey::from_seed(&[9; 32]);
        let mut f = Ed25519Sha256::new(key.public_key());
        f.sign(b"m", &key);
        let encoded = f.to_der().unwrap();
        assert_eq!(encoded.len(), 102);
        assert_eq!(&encoded[..4], &[0xA4, 0x64, 0x80, 0x20]);
        assert_eq!(&encoded[36..38], &[0x81, 0x40]);
        assert_eq!(Ed25519Sha256::from_der_content(&encoded[2..]).unwrap(), f);
    }

    #[test]
    fn unsigned_does_not_validate() {
        let key = PrivateKey::from_seed(&[9; 32]);
        assert!(!Ed25519Sha256::new(key.public_key()).validate(b"m"));
    }

    #[test]
    fn signature_does_not_change_condition() {
        let key = PrivateKey::from_seed(&[9; 32]);
        let unsigned = Ed25519Sha256::new(key.public_key());
        let mut signed = unsigned.clone();
        signed.sign(b"m", &key);
        assert_eq!(unsigned.condition(), signed.condition());
    }

    #[test]
    fn tampered_signature_fails() {
        let key = PrivateKey::from_seed(&[9; 32]);
        let mut f = Ed25519Sha256::new(key.public_key());
        f.sign(b"m", &key);
        let mut encoded = f.to_der().unwrap();
        encoded[50] ^= 0x01;
        let parsed = Ed25519Sha256::from_der_content(&encoded[2..]).unwrap();
        assert!(!parsed.validate(b"m"));
    }
}
