//! Circular identifier space.
//!
//! Ring positions are integers modulo `2^bits`. They are never compared with
//! `<`/`>`: the space wraps, so every position test goes through one of the
//! four range predicates below, which measure forward distance from the start
//! of the range instead of special-casing wraparound.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use sha1::{Digest, Sha1};

use crate::constants::HASH_BITS;
use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identifier(BigUint);

impl Identifier {
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<BigUint> for Identifier {
    fn from(value: BigUint) -> Self {
        Identifier(value)
    }
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Identifier(BigUint::from(value))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier(0x{:x})", self.0)
    }
}

/// Accepts decimal or `0x`-prefixed hex.
impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
            None => BigUint::parse_bytes(s.as_bytes(), 10),
        };
        parsed
            .map(Identifier)
            .ok_or_else(|| Error::Protocol(format!("not an identifier: {s:?}")))
    }
}

/// Forward distance from `from` to `to`, i.e. `(to - from) mod modulus`.
fn distance(from: &BigUint, to: &BigUint, modulus: &BigUint) -> BigUint {
    let from = from % modulus;
    let to = to % modulus;
    (to + modulus - from) % modulus
}

/// `value` in `(start, end)`. Empty when `start == end`.
pub fn in_range_excl_excl(
    value: &BigUint,
    start: &BigUint,
    end: &BigUint,
    modulus: &BigUint,
) -> bool {
    let offset = distance(start, value, modulus);
    !offset.is_zero() && offset < distance(start, end, modulus)
}

/// `value` in `(start, end]`.
pub fn in_range_excl_incl(
    value: &BigUint,
    start: &BigUint,
    end: &BigUint,
    modulus: &BigUint,
) -> bool {
    let offset = distance(start, value, modulus);
    !offset.is_zero() && offset <= distance(start, end, modulus)
}

/// `value` in `[start, end)`.
pub fn in_range_incl_excl(
    value: &BigUint,
    start: &BigUint,
    end: &BigUint,
    modulus: &BigUint,
) -> bool {
    distance(start, value, modulus) < distance(start, end, modulus)
}

/// `value` in `[start, end]`.
pub fn in_range_incl_incl(
    value: &BigUint,
    start: &BigUint,
    end: &BigUint,
    modulus: &BigUint,
) -> bool {
    distance(start, value, modulus) <= distance(start, end, modulus)
}

/// The ring a node lives on: its width in bits and its modulus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdSpace {
    bits: u32,
    modulus: BigUint,
}

impl IdSpace {
    /// A `2^bits` space. `bits` may not exceed the SHA-1 width.
    pub fn new(bits: u32) -> Result<Self> {
        if bits == 0 || bits > HASH_BITS {
            return Err(Error::Configuration(format!(
                "identifier width must be within 1..={HASH_BITS} bits, got {bits}"
            )));
        }
        Ok(IdSpace {
            bits,
            modulus: BigUint::one() << bits as usize,
        })
    }

    /// A space with an arbitrary modulus, used to simulate small rings
    /// (e.g. the 0..100 ring). `bits` becomes the width of `modulus - 1`.
    pub fn with_modulus(modulus: u64) -> Result<Self> {
        if modulus < 2 {
            return Err(Error::Configuration(format!(
                "identifier space needs at least two positions, got {modulus}"
            )));
        }
        let bits = 64 - (modulus - 1).leading_zeros();
        Ok(IdSpace {
            bits,
            modulus: BigUint::from(modulus),
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Largest usable finger table: every `2^i` for `i < bits` is below the modulus.
    pub fn max_fingers(&self) -> usize {
        self.bits as usize
    }

    /// Bytes of the fixed-width wire encoding.
    pub fn width_bytes(&self) -> usize {
        self.bits.div_ceil(8) as usize
    }

    pub fn id(&self, value: u64) -> Identifier {
        Identifier(BigUint::from(value) % &self.modulus)
    }

    /// SHA-1 of `input`, reduced into the space.
    pub fn hash(&self, input: &[u8]) -> Identifier {
        let digest = Sha1::digest(input);
        Identifier(BigUint::from_bytes_be(&digest) % &self.modulus)
    }

    pub fn add(&self, id: &Identifier, delta: u64) -> Identifier {
        Identifier((&id.0 + BigUint::from(delta)) % &self.modulus)
    }

    pub fn sub(&self, id: &Identifier, delta: u64) -> Identifier {
        let delta = BigUint::from(delta) % &self.modulus;
        Identifier((&id.0 + &self.modulus - delta) % &self.modulus)
    }

    /// `(id + 2^index) mod modulus`, the start of finger `index`.
    pub fn finger_start(&self, id: &Identifier, index: usize) -> Identifier {
        Identifier((&id.0 + (BigUint::one() << index)) % &self.modulus)
    }

    /// `(id - 2^index) mod modulus`.
    pub fn finger_origin(&self, id: &Identifier, index: usize) -> Identifier {
        let step = (BigUint::one() << index) % &self.modulus;
        Identifier((&id.0 + &self.modulus - step) % &self.modulus)
    }

    pub fn excl_excl(&self, value: &Identifier, start: &Identifier, end: &Identifier) -> bool {
        in_range_excl_excl(&value.0, &start.0, &end.0, &self.modulus)
    }

    pub fn excl_incl(&self, value: &Identifier, start: &Identifier, end: &Identifier) -> bool {
        in_range_excl_incl(&value.0, &start.0, &end.0, &self.modulus)
    }

    pub fn incl_excl(&self, value: &Identifier, start: &Identifier, end: &Identifier) -> bool {
        in_range_incl_excl(&value.0, &start.0, &end.0, &self.modulus)
    }

    pub fn incl_incl(&self, value: &Identifier, start: &Identifier, end: &Identifier) -> bool {
        in_range_incl_incl(&value.0, &start.0, &end.0, &self.modulus)
    }

    /// Fixed-width big-endian encoding.
    pub fn encode(&self, id: &Identifier) -> Vec<u8> {
        let width = self.width_bytes();
        let raw = if id.0.is_zero() {
            Vec::new()
        } else {
            id.0.to_bytes_be()
        };
        let mut out = vec![0u8; width.saturating_sub(raw.len())];
        out.extend_from_slice(&raw);
        out
    }

    /// Inverse of [`IdSpace::encode`]; shorter big-endian encodings are accepted.
    pub fn decode(&self, bytes: &[u8]) -> Result<Identifier> {
        if bytes.len() > self.width_bytes() {
            return Err(Error::Protocol(format!(
                "identifier is {} bytes, the space is {} bytes wide",
                bytes.len(),
                self.width_bytes()
            )));
        }
        let value = BigUint::from_bytes_be(bytes);
        if value >= self.modulus {
            return Err(Error::Protocol(format!(
                "identifier 0x{value:x} is outside the identifier space"
            )));
        }
        Ok(Identifier(value))
    }

    /// Validates an identifier that arrived from outside (CLI, config).
    pub fn check(&self, id: Identifier) -> Result<Identifier> {
        if id.0 >= self.modulus {
            return Err(Error::Protocol(format!(
                "identifier {id} is outside the identifier space"
            )));
        }
        Ok(id)
    }
}
