//! Match share codes.
//!
//! A share code is the opaque token players exchange to reference one
//! recorded match (`CSGO-xxxxx-xxxxx-xxxxx-xxxxx-xxxxx`). The 25-character
//! payload is a little-endian base-57 rendering of a ~146-bit value packing
//! the match id, the outcome (reservation) id, and a 16-bit token.

use thiserror::Error;

/// Base-57 alphabet; excludes visually ambiguous characters.
const DICTIONARY: &[u8; 57] = b"ABCDEFGHJKLMNOPQRSTUVWXYZabcdefhijkmnopqrstuvwxyz23456789";

/// Payload length after the prefix and dashes are removed.
const PAYLOAD_LEN: usize = 25;

/// Share-code validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareCodeError {
    #[error("share code payload must be {PAYLOAD_LEN} characters, got {0}")]
    BadLength(usize),

    #[error("share code contains {0:?}, which is outside the base-57 alphabet")]
    BadCharacter(char),
}

/// Identifies one match to the coordinator. Correlates to exactly one
/// match-list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRequest {
    pub matchid: u64,
    pub outcomeid: u64,
    pub token: u32,
}

impl MatchRequest {
    /// Decode a share code into its request triple.
    ///
    /// Accepts the `CSGO-` prefix and dashes but does not require them; the
    /// remaining characters must be exactly the 25-digit payload.
    pub fn from_share_code(code: &str) -> Result<Self, ShareCodeError> {
        let payload: Vec<u8> = code
            .trim()
            .trim_start_matches("CSGO")
            .bytes()
            .filter(|&b| b != b'-')
            .collect();
        if payload.len() != PAYLOAD_LEN {
            return Err(ShareCodeError::BadLength(payload.len()));
        }

        // Little-endian base-57: the first payload character is the least
        // significant digit. 25 digits exceed 128 bits, so accumulate into
        // three 64-bit limbs.
        let mut limbs = [0u64; 3];
        for &b in payload.iter().rev() {
            let digit = DICTIONARY
                .iter()
                .position(|&d| d == b)
                .ok_or(ShareCodeError::BadCharacter(b as char))?;
            mul_add(&mut limbs, 57, digit as u64);
        }

        Ok(Self {
            matchid: limbs[0],
            outcomeid: limbs[1],
            token: (limbs[2] & 0xFFFF) as u32,
        })
    }

    /// Render the request triple back into a canonical share code.
    pub fn to_share_code(&self) -> String {
        let mut limbs = [self.matchid, self.outcomeid, u64::from(self.token & 0xFFFF)];
        let mut payload = [0u8; PAYLOAD_LEN];
        for slot in payload.iter_mut() {
            *slot = DICTIONARY[div_rem(&mut limbs, 57) as usize];
        }

        let mut out = String::with_capacity(5 + PAYLOAD_LEN + 5);
        out.push_str("CSGO");
        for chunk in payload.chunks(5) {
            out.push('-');
            // chunks(5) over 25 bytes always yields full, valid ASCII chunks
            out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        }
        out
    }
}

/// `limbs = limbs * mul + add` over little-endian 64-bit limbs.
fn mul_add(limbs: &mut [u64; 3], mul: u64, add: u64) {
    let mut carry = u128::from(add);
    for limb in limbs.iter_mut() {
        let v = u128::from(*limb) * u128::from(mul) + carry;
        *limb = v as u64;
        carry = v >> 64;
    }
}

/// `limbs /= div`, returning the remainder.
fn div_rem(limbs: &mut [u64; 3], div: u64) -> u64 {
    let mut rem: u128 = 0;
    for limb in limbs.iter_mut().rev() {
        let cur = (rem << 64) | u128::from(*limb);
        *limb = (cur / u128::from(div)) as u64;
        rem = cur % u128::from(div);
    }
    rem as u64
}
