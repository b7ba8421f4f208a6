//! Minimal DER reader/writer for the crypto-conditions ASN.1 module.
//!
//! Only the constructs that module uses are supported: context-specific
//! tags (primitive and constructed), definite lengths, non-negative
//! INTEGERs, named BIT STRINGs and SET OF ordering.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::ConditionError;

/// Universal SEQUENCE tag.
pub const SEQUENCE: u8 = 0x30;

/// Context-specific primitive tag `[n]`.
pub const fn context(n: u8) -> u8 {
    0x80 | n
}

/// Context-specific constructed tag `[n]`.
pub const fn context_constructed(n: u8) -> u8 {
    0xA0 | n
}

/// Encode a tag-length-value triple.
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 6);
    out.push(tag);
    write_length(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Content octets of a non-negative INTEGER in minimal two's complement.
pub fn integer(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take_while(|b| **b == 0)
        .count()
        .min(bytes.len() - 1);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

/// Decode the content octets of a non-negative INTEGER.
pub fn decode_integer(content: &[u8]) -> Result<u64, ConditionError> {
    if content.is_empty() {
        return Err(ConditionError::der("empty INTEGER"));
    }
    if content[0] & 0x80 != 0 {
        return Err(ConditionError::der("negative INTEGER"));
    }
    let digits = if content[0] == 0 && content.len() > 1 {
        &content[1..]
    } else {
        content
    };
    if digits.len() > 8 {
        return Err(ConditionError::der("INTEGER does not fit in 64 bits"));
    }
    Ok(digits.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Content octets of a named BIT STRING with bits `set`, trailing zero bits
/// removed as DER requires.
pub fn bit_string(set: &BTreeSet<u8>) -> Vec<u8> {
    let Some(highest) = set.iter().next_back().copied() else {
        return vec![0];
    };
    let len = usize::from(highest / 8) + 1;
    let mut out = vec![0u8; len + 1];
    out[0] = 7 - (highest % 8);
    for bit in set {
        out[1 + usize::from(bit / 8)] |= 0x80 >> (bit % 8);
    }
    out
}

/// Decode the content octets of a named BIT STRING into the set bit positions.
pub fn decode_bit_string(content: &[u8]) -> Result<BTreeSet<u8>, ConditionError> {
    let (&unused, bytes) = content
        .split_first()
        .ok_or_else(|| ConditionError::der("empty BIT STRING"))?;
    if unused > 7 || (bytes.is_empty() && unused != 0) {
        return Err(ConditionError::der("invalid BIT STRING padding"));
    }
    let mut set = BTreeSet::new();
    for (i, byte) in bytes.iter().enumerate() {
        for bit in 0..8u8 {
            if byte & (0x80 >> bit) != 0 {
                let position = i * 8 + usize::from(bit);
                let position = u8::try_from(position)
                    .map_err(|_| ConditionError::der("BIT STRING too long"))?;
                set.insert(position);
            }
        }
    }
    Ok(set)
}

/// X.690 SET OF ordering: compare encodings as octet strings, padding the
/// shorter one with trailing zero octets.
pub fn set_order(a: &[u8], b: &[u8]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Encode `items` as the content of a SET OF.
pub fn set_of(mut items: Vec<Vec<u8>>) -> Vec<u8> {
    items.sort_by(|a, b| set_order(a, b));
    items.concat()
}

/// Cursor over a DER byte string.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Tag of the next element without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read the next element, returning its tag and content octets.
    pub fn read(&mut self) -> Result<(u8, &'a [u8]), ConditionError> {
        let tag = self.byte()?;
        let first = self.byte()?;
        let len = if first < 0x80 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7F);
            if count == 0 || count > std::mem::size_of::<usize>() {
                return Err(ConditionError::der("unsupported length encoding"));
            }
            let mut len = 0usize;
            for _ in 0..count {
                len = (len << 8) | usize::from(self.byte()?);
            }
            if len < 0x80 {
                return Err(ConditionError::der("non-minimal length"));
            }
            len
        };
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| ConditionError::der("truncated element"))?;
        let content = &self.data[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    /// Read the next element and require it to carry `tag`.
    pub fn expect(&mut self, tag: u8) -> Result<&'a [u8], ConditionError> {
        let (found, content) = self.read()?;
        if found != tag {
            return Err(ConditionError::der(format!(
                "expected tag {:#04x}, found {:#04x}",
                tag, found
            )));
        }
        Ok(content)
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), ConditionError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ConditionError::der("trailing bytes"))
        }
    }

    fn byte(&mut self) -> Result<u8, ConditionError> {
        let b = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| ConditionError::der("unexpected end of input"))?;
        self.pos += 1;
        Ok(b)
    }
}
