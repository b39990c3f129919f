use std::fmt;

use num_bigint::{BigUint, RandBigInt};

use serde::{
    ser::{Serialize, Serializer, SerializeSeq},
    de::{Deserialize, Deserializer, SeqAccess, Visitor},
};

use crate::chord_id::ChordId;

/// A point on a ring of 2^160 identifiers, the full width of a SHA-1 digest.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct Identifier{
    id: BigUint,
}

const BITS: u32 = 160;

fn modulus() -> BigUint {
    BigUint::from(1u8) << BITS
}

impl Identifier{
    pub fn from_biguint(id: BigUint) -> Identifier{
        Identifier{
            id: id % modulus()
        }
    }

    pub fn from_vec(vec: Vec<u32>) -> Identifier{
        Identifier::from_biguint(BigUint::new(vec))
    }

    /// Parse a hexadecimal identifier, as printed by Display.
    pub fn from_hex(data: &str) -> Option<Identifier>{
        BigUint::parse_bytes(data.as_bytes(), 16).map(Identifier::from_biguint)
    }

    pub fn zero() -> Identifier{
        Identifier{id: BigUint::from(0u8)}
    }

    pub fn as_biguint(&self) -> &BigUint{
        &self.id
    }
}

impl ChordId for Identifier{
    const BITS: u32 = BITS;

    fn from_digest(digest: &[u8]) -> Self {
        let take = digest.len().min((BITS / 8) as usize);
        Identifier::from_biguint(BigUint::from_bytes_be(&digest[..take]))
    }

    fn random() -> Self {
        let mut rng = rand::thread_rng();
        Identifier{id: rng.gen_biguint_below(&modulus())}
    }

    fn distance(&self, to: &Self) -> Self {
        Identifier::from_biguint(&to.id + modulus() - &self.id)
    }

    fn calculate_finger(&self, index: u32) -> Self {
        Identifier::from_biguint(&self.id + (BigUint::from(1u8) << index))
    }
}

impl From<u64> for Identifier{
    fn from(arg: u64) -> Identifier{
        Identifier::from_biguint(BigUint::from(arg))
    }
}

impl fmt::Display for Identifier{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:040x}", self.id)
    }
}

impl fmt::Debug for Identifier{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let v = self.id.to_u32_digits();
        let mut seq = serializer.serialize_seq(Some(v.len()))?;
        for e in v {
            seq.serialize_element(&e)?;
        }
        seq.end()
    }
}


struct IdentifierVisitor;

impl<'de> Visitor<'de> for IdentifierVisitor {
    type Value = Identifier;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an identifier as an array of u32 digits")
    }

    fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>
        {
            let mut v = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(digit) = seq.next_element()? {
                v.push(digit);
            }
            Ok(Identifier::from_vec(v))
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Identifier, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(IdentifierVisitor)
    }
}
