//! Security identifiers in their binary and `S-1-...` string forms.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const SID_HDR_LEN: usize = 8;
const MAX_SUB_AUTHORITIES: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sid {
    pub revision: u8,
    pub authority: u64,
    pub sub_authorities: Vec<u32>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SidError {
    #[error("sid is {0} bytes, too short")]
    TooShort(usize),
    #[error("sid declares {declared} sub-authorities but carries {present}")]
    LengthMismatch { declared: usize, present: usize },
    #[error("invalid sid string: {0}")]
    InvalidString(String),
}

impl Sid {
    /// Decodes the self-relative binary layout used by `objectSid` and `tokenGroups`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SidError> {
        if bytes.len() < SID_HDR_LEN {
            return Err(SidError::TooShort(bytes.len()));
        }
        let revision: u8 = bytes[0];
        let count: usize = bytes[1] as usize;

        // 48-bit big-endian identifier authority
        let authority: u64 = bytes[2..8]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

        let present: usize = (bytes.len() - SID_HDR_LEN) / 4;
        if count > MAX_SUB_AUTHORITIES || present < count {
            return Err(SidError::LengthMismatch {
                declared: count,
                present,
            });
        }

        let sub_authorities: Vec<u32> = bytes[SID_HDR_LEN..SID_HDR_LEN + count * 4]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-", self.revision)?;
        if self.authority >= 1 << 32 {
            write!(f, "0x{:012X}", self.authority)?;
        } else {
            write!(f, "{}", self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

impl FromStr for Sid {
    type Err = SidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SidError::InvalidString(s.to_string());
        let mut parts = s.split('-');

        if !parts.next().is_some_and(|p| p.eq_ignore_ascii_case("S")) {
            return Err(invalid());
        }
        let revision: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let authority_str: &str = parts.next().ok_or_else(invalid)?;
        let authority: u64 = match authority_str.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).map_err(|_| invalid())?,
            None => authority_str.parse().map_err(|_| invalid())?,
        };

        let sub_authorities: Vec<u32> = parts
            .map(|p| p.parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(invalid());
        }

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_admins_bytes() -> Vec<u8> {
        let mut bytes: Vec<u8> = vec![1, 5, 0, 0, 0, 0, 0, 5];
        for sub in [21u32, 1004336348, 1177238915, 682003330, 512] {
            bytes.extend_from_slice(&sub.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn binary_sid_renders_as_string() {
        let sid = Sid::from_bytes(&domain_admins_bytes()).unwrap();
        assert_eq!(
            sid.to_string(),
            "S-1-5-21-1004336348-1177238915-682003330-512"
        );
        assert_eq!(sid.sub_authorities.last(), Some(&512));
    }

    #[test]
    fn string_and_binary_forms_agree() {
        let parsed: Sid = "S-1-5-21-1004336348-1177238915-682003330-512".parse().unwrap();
        assert_eq!(parsed, Sid::from_bytes(&domain_admins_bytes()).unwrap());

        let everyone: Sid = "S-1-1-0".parse().unwrap();
        assert_eq!(everyone.sub_authorities, vec![0]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Sid::from_bytes(&[1, 1, 0]), Err(SidError::TooShort(3)));
        assert!(matches!(
            Sid::from_bytes(&[1, 2, 0, 0, 0, 0, 0, 5, 21, 0, 0, 0]),
            Err(SidError::LengthMismatch { declared: 2, present: 1 })
        ));
        assert!("X-1-5".parse::<Sid>().is_err());
        assert!("S-1-5-abc".parse::<Sid>().is_err());
        assert!("S-1".parse::<Sid>().is_err());
    }
}
