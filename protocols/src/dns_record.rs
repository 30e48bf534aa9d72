//! # dnsRecord Codec
//!
//! Decodes the typed record values a directory-integrated DNS zone keeps in the
//! multi-valued `dnsRecord` attribute of each `dnsNode` object.
//!
//! Every value is a fixed 24-byte header followed by a kind-specific payload.
//! Names inside the payload use the *counted name* layout (total length, label
//! count, length-prefixed labels and a terminating zero) rather than the
//! compressed form found on the wire.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

pub const DNS_RECORD_HDR_LEN: usize = 24;

const TYPE_A: u16 = 1;
const TYPE_NS: u16 = 2;
const TYPE_CNAME: u16 = 5;
const TYPE_SOA: u16 = 6;
const TYPE_PTR: u16 = 12;
const TYPE_MX: u16 = 15;
const TYPE_TXT: u16 = 16;
const TYPE_AAAA: u16 = 28;
const TYPE_SRV: u16 = 33;

/// The record kinds this codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RecordKind {
    A,
    AAAA,
    NS,
    CNAME,
    PTR,
    TXT,
    MX,
    SRV,
    SOA,
}

impl RecordKind {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            TYPE_A => Some(Self::A),
            TYPE_AAAA => Some(Self::AAAA),
            TYPE_NS => Some(Self::NS),
            TYPE_CNAME => Some(Self::CNAME),
            TYPE_PTR => Some(Self::PTR),
            TYPE_TXT => Some(Self::TXT),
            TYPE_MX => Some(Self::MX),
            TYPE_SRV => Some(Self::SRV),
            TYPE_SOA => Some(Self::SOA),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::NS => "NS",
            Self::CNAME => "CNAME",
            Self::PTR => "PTR",
            Self::TXT => "TXT",
            Self::MX => "MX",
            Self::SRV => "SRV",
            Self::SOA => "SOA",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::AAAA),
            "NS" => Ok(Self::NS),
            "CNAME" => Ok(Self::CNAME),
            "PTR" => Ok(Self::PTR),
            "TXT" => Ok(Self::TXT),
            "MX" => Ok(Self::MX),
            "SRV" => Ok(Self::SRV),
            "SOA" => Ok(Self::SOA),
            _ => Err(RecordError::InvalidText(s.to_string())),
        }
    }
}

/// A single decoded `dnsRecord` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedRecord {
    Address(Ipv4Addr),
    AddressV6(Ipv6Addr),
    NameServer(String),
    Alias(String),
    Pointer(String),
    Text(Vec<String>),
    MailExchange {
        preference: u16,
        exchange: String,
    },
    Service {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    StartOfAuthority {
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum_ttl: u32,
        primary_server: String,
        /// Mailbox in domain-name form, e.g. `hostmaster.corp.local`.
        admin_mailbox: String,
    },
    /// A type code this codec does not know. Never an error on its own.
    Unknown { kind: u16 },
    /// A text record whose mnemonic this codec does not know, e.g. `HINFO`.
    Unrecognized { mnemonic: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is missing its {field} field")]
    Truncated { field: &'static str },
    #[error("{kind} data has invalid length {len}")]
    InvalidLength { kind: RecordKind, len: usize },
    #[error("record name is not valid UTF-8")]
    InvalidName,
    #[error("unparseable record text: {0}")]
    InvalidText(String),
}

impl TypedRecord {
    /// Returns `None` for [`TypedRecord::Unknown`].
    pub fn kind(&self) -> Option<RecordKind> {
        match self {
            Self::Address(_) => Some(RecordKind::A),
            Self::AddressV6(_) => Some(RecordKind::AAAA),
            Self::NameServer(_) => Some(RecordKind::NS),
            Self::Alias(_) => Some(RecordKind::CNAME),
            Self::Pointer(_) => Some(RecordKind::PTR),
            Self::Text(_) => Some(RecordKind::TXT),
            Self::MailExchange { .. } => Some(RecordKind::MX),
            Self::Service { .. } => Some(RecordKind::SRV),
            Self::StartOfAuthority { .. } => Some(RecordKind::SOA),
            Self::Unknown { .. } | Self::Unrecognized { .. } => None,
        }
    }

    /// Decodes one binary `dnsRecord` value.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut header = Reader::new(bytes);
        let data_len: usize = header.u16_le("header")? as usize;
        let code: u16 = header.u16_le("header")?;
        header.take(DNS_RECORD_HDR_LEN - 4, "header")?;

        let data: &[u8] = header.take(data_len, "data")?;
        decode_data(code, data)
    }
}

/// Parses the presentation form `"<KIND> <fields...>"`, as some exports carry
/// records already rendered to text. `TYPE<n>` yields [`TypedRecord::Unknown`],
/// other mnemonics missing from [`RecordKind`] [`TypedRecord::Unrecognized`].
impl FromStr for TypedRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        let kind_str: &str = fields.first().ok_or(RecordError::Truncated { field: "type" })?;

        if let Some(code) = kind_str
            .strip_prefix("TYPE")
            .and_then(|n| n.parse::<u16>().ok())
        {
            if RecordKind::from_code(code).is_some() {
                return Err(RecordError::InvalidText(s.to_string()));
            }
            return Ok(Self::Unknown { kind: code });
        }

        let kind: RecordKind = match kind_str.parse() {
            Ok(kind) => kind,
            Err(_) if kind_str.chars().all(|c| c.is_ascii_alphanumeric()) => {
                return Ok(Self::Unrecognized {
                    mnemonic: kind_str.to_string(),
                });
            }
            Err(err) => return Err(err),
        };
        let field = |idx: usize, name: &'static str| {
            fields
                .get(idx)
                .copied()
                .ok_or(RecordError::Truncated { field: name })
        };

        let record = match kind {
            RecordKind::A => Self::Address(parse_field(field(1, "data")?, s)?),
            RecordKind::AAAA => Self::AddressV6(parse_field(field(1, "data")?, s)?),
            RecordKind::NS => Self::NameServer(field(1, "data")?.to_string()),
            RecordKind::CNAME => Self::Alias(field(1, "data")?.to_string()),
            RecordKind::PTR => Self::Pointer(field(1, "data")?.to_string()),
            RecordKind::TXT => {
                field(1, "data")?;
                Self::Text(fields[1..].iter().map(|f| f.to_string()).collect())
            }
            RecordKind::MX => Self::MailExchange {
                preference: parse_field(field(1, "preference")?, s)?,
                exchange: field(2, "exchange")?.to_string(),
            },
            RecordKind::SRV => Self::Service {
                priority: parse_field(field(1, "priority")?, s)?,
                weight: parse_field(field(2, "weight")?, s)?,
                port: parse_field(field(3, "port")?, s)?,
                target: field(4, "target")?.to_string(),
            },
            RecordKind::SOA => Self::StartOfAuthority {
                primary_server: field(1, "primary server")?.to_string(),
                admin_mailbox: field(2, "admin mailbox")?.to_string(),
                serial: parse_field(field(3, "serial")?, s)?,
                refresh: parse_field(field(4, "refresh")?, s)?,
                retry: parse_field(field(5, "retry")?, s)?,
                expire: parse_field(field(6, "expire")?, s)?,
                minimum_ttl: parse_field(field(7, "minimum ttl")?, s)?,
            },
        };
        Ok(record)
    }
}

fn parse_field<T: FromStr>(field: &str, original: &str) -> Result<T, RecordError> {
    field
        .parse::<T>()
        .map_err(|_| RecordError::InvalidText(original.to_string()))
}

fn decode_data(code: u16, data: &[u8]) -> Result<TypedRecord, RecordError> {
    let Some(kind) = RecordKind::from_code(code) else {
        return Ok(TypedRecord::Unknown { kind: code });
    };
    let mut reader = Reader::new(data);

    let record = match kind {
        RecordKind::A => {
            let octets: [u8; 4] = data
                .try_into()
                .map_err(|_| invalid_or_missing(kind, data.len()))?;
            TypedRecord::Address(Ipv4Addr::from(octets))
        }
        RecordKind::AAAA => {
            let octets: [u8; 16] = data
                .try_into()
                .map_err(|_| invalid_or_missing(kind, data.len()))?;
            TypedRecord::AddressV6(Ipv6Addr::from(octets))
        }
        RecordKind::NS => TypedRecord::NameServer(reader.counted_name("data")?),
        RecordKind::CNAME => TypedRecord::Alias(reader.counted_name("data")?),
        RecordKind::PTR => TypedRecord::Pointer(reader.counted_name("data")?),
        RecordKind::TXT => {
            let mut strings: Vec<String> = Vec::new();
            while !reader.is_empty() {
                let len: usize = reader.u8("data")? as usize;
                let raw: &[u8] = reader.take(len, "data")?;
                strings.push(String::from_utf8_lossy(raw).into_owned());
            }
            if strings.is_empty() {
                return Err(RecordError::Truncated { field: "data" });
            }
            TypedRecord::Text(strings)
        }
        RecordKind::MX => TypedRecord::MailExchange {
            preference: reader.u16_be("preference")?,
            exchange: reader.counted_name("exchange")?,
        },
        RecordKind::SRV => TypedRecord::Service {
            priority: reader.u16_be("priority")?,
            weight: reader.u16_be("weight")?,
            port: reader.u16_be("port")?,
            target: reader.counted_name("target")?,
        },
        RecordKind::SOA => TypedRecord::StartOfAuthority {
            serial: reader.u32_be("serial")?,
            refresh: reader.u32_be("refresh")?,
            retry: reader.u32_be("retry")?,
            expire: reader.u32_be("expire")?,
            minimum_ttl: reader.u32_be("minimum ttl")?,
            primary_server: reader.counted_name("primary server")?,
            admin_mailbox: reader.counted_name("admin mailbox")?,
        },
    };
    Ok(record)
}

fn invalid_or_missing(kind: RecordKind, len: usize) -> RecordError {
    match len {
        0 => RecordError::Truncated { field: "data" },
        _ => RecordError::InvalidLength { kind, len },
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    fn is_empty(&self) -> bool {
        self.cursor >= self.buf.len()
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], RecordError> {
        let end: usize = self.cursor + len;
        if end > self.buf.len() {
            return Err(RecordError::Truncated { field });
        }
        let bytes: &'a [u8] = &self.buf[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, RecordError> {
        Ok(self.take(1, field)?[0])
    }

    fn u16_le(&mut self, field: &'static str) -> Result<u16, RecordError> {
        let bytes: &[u8] = self.take(2, field)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u16_be(&mut self, field: &'static str) -> Result<u16, RecordError> {
        let bytes: &[u8] = self.take(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32_be(&mut self, field: &'static str) -> Result<u32, RecordError> {
        let bytes: &[u8] = self.take(4, field)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a counted name. The root name decodes to `"."`.
    fn counted_name(&mut self, field: &'static str) -> Result<String, RecordError> {
        let total_len: usize = self.u8(field)? as usize;
        let label_count: usize = self.u8(field)? as usize;
        let raw: &[u8] = self.take(total_len, field)?;

        let mut labels: Vec<&str> = Vec::with_capacity(label_count);
        let mut cursor: usize = 0;
        while cursor < raw.len() && labels.len() < label_count {
            let len: usize = raw[cursor] as usize;
            if len == 0 {
                break;
            }
            cursor += 1;
            if cursor + len > raw.len() {
                return Err(RecordError::Truncated { field });
            }
            let label: &str = std::str::from_utf8(&raw[cursor..cursor + len])
                .map_err(|_| RecordError::InvalidName)?;
            labels.push(label);
            cursor += len;
        }

        if labels.len() < label_count {
            return Err(RecordError::Truncated { field });
        }
        if labels.is_empty() {
            return Ok(String::from("."));
        }
        Ok(labels.join("."))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn counted_name(name: &str) -> Vec<u8> {
        let mut raw: Vec<u8> = Vec::new();
        let mut count: u8 = 0;
        for label in name.split('.').filter(|l| !l.is_empty()) {
            raw.push(label.len() as u8);
            raw.extend_from_slice(label.as_bytes());
            count += 1;
        }
        raw.push(0);
        let mut out: Vec<u8> = vec![raw.len() as u8, count];
        out.extend(raw);
        out
    }

    pub(crate) fn record(code: u16, data: &[u8]) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(&code.to_le_bytes());
        out.push(5); // version
        out.push(240); // rank
        out.extend_from_slice(&[0u8; 2]); // flags
        out.extend_from_slice(&1u32.to_le_bytes()); // serial
        out.extend_from_slice(&600u32.to_be_bytes()); // ttl
        out.extend_from_slice(&[0u8; 8]); // reserved + timestamp
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn decodes_address_records() {
        let v4 = record(1, &[10, 0, 0, 5]);
        assert_eq!(
            TypedRecord::decode(&v4),
            Ok(TypedRecord::Address(Ipv4Addr::new(10, 0, 0, 5)))
        );

        let mut octets = [0u8; 16];
        octets[0] = 0xfe;
        octets[1] = 0x80;
        octets[15] = 1;
        let v6 = record(28, &octets);
        assert_eq!(
            TypedRecord::decode(&v6),
            Ok(TypedRecord::AddressV6("fe80::1".parse().unwrap()))
        );
    }

    #[test]
    fn decodes_structured_records() {
        let mut mx: Vec<u8> = 10u16.to_be_bytes().to_vec();
        mx.extend(counted_name("mail.corp.local"));
        assert_eq!(
            TypedRecord::decode(&record(15, &mx)),
            Ok(TypedRecord::MailExchange {
                preference: 10,
                exchange: "mail.corp.local".into()
            })
        );

        let mut srv: Vec<u8> = Vec::new();
        for v in [0u16, 100, 389] {
            srv.extend_from_slice(&v.to_be_bytes());
        }
        srv.extend(counted_name("dc01.corp.local"));
        assert_eq!(
            TypedRecord::decode(&record(33, &srv)),
            Ok(TypedRecord::Service {
                priority: 0,
                weight: 100,
                port: 389,
                target: "dc01.corp.local".into()
            })
        );

        let mut soa: Vec<u8> = Vec::new();
        for v in [42u32, 900, 600, 86400, 3600] {
            soa.extend_from_slice(&v.to_be_bytes());
        }
        soa.extend(counted_name("dc01.corp.local"));
        soa.extend(counted_name("hostmaster.corp.local"));
        let decoded = TypedRecord::decode(&record(6, &soa)).unwrap();
        assert!(matches!(
            decoded,
            TypedRecord::StartOfAuthority { serial: 42, ref primary_server, ref admin_mailbox, .. }
                if primary_server == "dc01.corp.local" && admin_mailbox == "hostmaster.corp.local"
        ));
    }

    #[test]
    fn decodes_text_strings() {
        let data: Vec<u8> = [&[5u8][..], b"hello", &[5u8][..], b"world"].concat();
        assert_eq!(
            TypedRecord::decode(&record(16, &data)),
            Ok(TypedRecord::Text(vec!["hello".into(), "world".into()]))
        );
    }

    #[test]
    fn unknown_kind_is_not_an_error() {
        assert_eq!(
            TypedRecord::decode(&record(0, &[])),
            Ok(TypedRecord::Unknown { kind: 0 })
        );
        assert_eq!(
            TypedRecord::decode(&record(65, &[1, 2, 3])),
            Ok(TypedRecord::Unknown { kind: 65 })
        );
    }

    #[test]
    fn missing_fields_name_the_field() {
        assert_eq!(
            TypedRecord::decode(&[0u8; 10]),
            Err(RecordError::Truncated { field: "header" })
        );

        // header announces four bytes of data that never arrive
        let mut short = record(1, &[10, 0, 0, 5]);
        short.truncate(DNS_RECORD_HDR_LEN);
        assert_eq!(
            TypedRecord::decode(&short),
            Err(RecordError::Truncated { field: "data" })
        );

        let mx: Vec<u8> = 10u16.to_be_bytes().to_vec();
        assert_eq!(
            TypedRecord::decode(&record(15, &mx)),
            Err(RecordError::Truncated { field: "exchange" })
        );
    }

    #[test]
    fn parses_presentation_form() {
        assert_eq!(
            "A 192.168.1.10".parse::<TypedRecord>(),
            Ok(TypedRecord::Address(Ipv4Addr::new(192, 168, 1, 10)))
        );
        assert_eq!(
            "SRV 0 100 88 dc01.corp.local".parse::<TypedRecord>(),
            Ok(TypedRecord::Service {
                priority: 0,
                weight: 100,
                port: 88,
                target: "dc01.corp.local".into()
            })
        );
        assert_eq!("TYPE99".parse::<TypedRecord>(), Ok(TypedRecord::Unknown { kind: 99 }));
        assert_eq!(
            "A".parse::<TypedRecord>(),
            Err(RecordError::Truncated { field: "data" })
        );
        assert!(matches!(
            "not-a-record".parse::<TypedRecord>(),
            Err(RecordError::InvalidText(_))
        ));
    }

    #[test]
    fn unlisted_mnemonics_are_unrecognized_not_malformed() {
        assert_eq!(
            "BOGUS 1".parse::<TypedRecord>(),
            Ok(TypedRecord::Unrecognized {
                mnemonic: "BOGUS".into()
            })
        );
        let hinfo: TypedRecord = "HINFO x86 Windows".parse().unwrap();
        assert_eq!(hinfo.kind(), None);
    }
}
