//! `threshold-sha-256`: satisfied when at least `threshold` of its
//! subconditions are.
//!
//! Subconditions are either full [`Fulfillment`]s (which can be signed) or
//! bare [`Condition`]s (known only by fingerprint, typically the unsigned
//! branches of a parsed fulfillment).
//!
//! When serializing, the cheapest set of `threshold` signed branches is
//! emitted in full and everything else is reduced to its condition. The
//! threshold itself is not encoded: a parser recovers it by counting the
//! embedded fulfillments.

use std::collections::BTreeSet;

use super::{der, Condition, ConditionError, ConditionType, Fulfillment};
use crate::crypto::sha256;

/// Added to the cost for every subcondition.
pub const COST_PER_SUBCONDITION: u64 = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Subcondition {
    Fulfillment(Fulfillment),
    Condition(Condition),
}

impl Subcondition {
    pub fn condition(&self) -> Condition {
        match self {
            Self::Fulfillment(f) => f.condition(),
            Self::Condition(c) => c.clone(),
        }
    }

    fn cost(&self) -> u64 {
        match self {
            Self::Fulfillment(f) => f.cost(),
            Self::Condition(c) => c.cost,
        }
    }

    fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfillment(f) if f.is_fulfilled())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThresholdSha256 {
    threshold: usize,
    subconditions: Vec<Subcondition>,
}

impl ThresholdSha256 {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            subconditions: Vec::new(),
        }
    }

    pub fn add_subfulfillment(&mut self, fulfillment: Fulfillment) -> &mut Self {
        self.subconditions.push(Subcondition::Fulfillment(fulfillment));
        self
    }

    pub fn add_subcondition(&mut self, condition: Condition) -> &mut Self {
        self.subconditions.push(Subcondition::Condition(condition));
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn subconditions(&self) -> &[Subcondition] {
        &self.subconditions
    }

    pub(crate) fn subconditions_mut(&mut self) -> &mut [Subcondition] {
        &mut self.subconditions
    }

    /// SHA-256 over `SEQUENCE { [0] threshold, [1] SET OF Condition }`.
    pub fn fingerprint(&self) -> [u8; 32] {
        let conditions = self
            .subconditions
            .iter()
            .map(|sub| sub.condition().to_der())
            .collect();
        let mut contents = der::tlv(der::context(0), &der::integer(self.threshold as u64));
        contents.extend(der::tlv(
            der::context_constructed(1),
            &der::set_of(conditions),
        ));
        sha256(&der::tlv(der::SEQUENCE, &contents))
    }

    /// Sum of the `threshold` most expensive subconditions plus a fixed
    /// amount per subcondition.
    pub fn cost(&self) -> u64 {
        let mut costs: Vec<u64> = self.subconditions.iter().map(Subcondition::cost).collect();
        costs.sort_unstable_by(|a, b| b.cmp(a));
        let top: u64 = costs
            .iter()
            .take(self.threshold)
            .fold(0u64, |acc, c| acc.saturating_add(*c));
        top.saturating_add(COST_PER_SUBCONDITION.saturating_mul(self.subconditions.len() as u64))
    }

    /// Every condition type used underneath, excluding threshold itself.
    pub fn subtypes(&self) -> BTreeSet<ConditionType> {
        let mut types = BTreeSet::new();
        for sub in &self.subconditions {
            let condition = sub.condition();
            types.insert(condition.condition_type);
            types.extend(condition.subtypes);
        }
        types.remove(&ConditionType::ThresholdSha256);
        types
    }

    pub fn condition(&self) -> Condition {
        Condition {
            condition_type: ConditionType::ThresholdSha256,
            fingerprint: self.fingerprint(),
            cost: self.cost(),
            subtypes: self.subtypes(),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.threshold > 0
            && self
                .subconditions
                .iter()
                .filter(|sub| sub.is_fulfilled())
                .count()
                >= self.threshold
    }

    /// At least `threshold` branches are signed and every signed branch
    /// verifies against `message`.
    pub fn validate(&self, message: &[u8]) -> bool {
        let signed: Vec<&Fulfillment> = self
            .subconditions
            .iter()
            .filter_map(|sub| match sub {
                Subcondition::Fulfillment(f) if f.is_fulfilled() => Some(f),
                _ => None,
            })
            .collect();
        self.threshold > 0
            && signed.len() >= self.threshold
            && signed.iter().all(|f| f.validate(message))
    }

    pub fn to_der(&self) -> Result<Vec<u8>, ConditionError> {
        let mut candidates: Vec<(usize, u64)> = self
            .subconditions
            .iter()
            .enumerate()
            .filter(|(_, sub)| sub.is_fulfilled())
            .map(|(i, sub)| (i, sub.cost()))
            .collect();
        if self.threshold == 0 || candidates.len() < self.threshold {
            return Err(ConditionError::ThresholdNotMet {
                threshold: self.threshold,
                fulfilled: candidates.len(),
            });
        }
        candidates.sort_by_key(|(_, cost)| *cost);
        let chosen: BTreeSet<usize> = candidates
            .iter()
            .take(self.threshold)
            .map(|(i, _)| *i)
            .collect();

        let mut fulfillments = Vec::with_capacity(self.threshold);
        let mut conditions = Vec::new();
        for (i, sub) in self.subconditions.iter().enumerate() {
            match sub {
                Subcondition::Fulfillment(f) if chosen.contains(&i) => {
                    fulfillments.push(f.to_der()?)
                }
                other => conditions.push(other.condition().to_der()),
            }
        }

        let mut content = der::tlv(der::context_constructed(0), &der::set_of(fulfillments));
        content.extend(der::tlv(
            der::context_constructed(1),
            &der::set_of(conditions),
        ));
        Ok(der::tlv(
            der::context_constructed(ConditionType::ThresholdSha256.id()),
            &content,
        ))
    }

    pub(crate) fn from_der_content(content: &[u8], depth: usize) -> Result<Self, ConditionError> {
        let mut reader = der::Reader::new(content);

        let mut node = Self::new(0);
        let mut fulfillments = der::Reader::new(reader.expect(der::context_constructed(0))?);
        while !fulfillments.is_empty() {
            node.add_subfulfillment(Fulfillment::read_nested(&mut fulfillments, depth + 1)?);
        }
        let mut conditions = der::Reader::new(reader.expect(der::context_constructed(1))?);
        while !conditions.is_empty() {
            node.add_subcondition(Condition::read(&mut conditions)?);
        }
        reader.finish()?;

        node.threshold = node
            .subconditions
            .iter()
            .filter(|sub| matches!(sub, Subcondition::Fulfillment(_)))
            .count();
        if node.threshold == 0 {
            return Err(ConditionError::der("threshold fulfillment has no subfulfillments"));
        }
        Ok(node)
    }
}
