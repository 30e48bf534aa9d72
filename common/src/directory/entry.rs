use std::borrow::Cow;
use std::collections::BTreeMap;

use adlens_protocols::filter::AttributeSource;
use adlens_protocols::sid::Sid;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use super::search::AttributeSelection;

pub const DN_ATTRIBUTE: &str = "distinguishedName";

/// Attributes whose binary values are security identifiers.
const SID_ATTRIBUTES: &[&str] = &[
    "objectSid",
    "tokenGroups",
    "tokenGroupsNoGCAcceptable",
    "tokenGroupsGlobalAndUniversal",
    "sIDHistory",
];

/// A single attribute value as handed over by the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireValue", into = "WireValue")]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Binary(Vec<u8>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireValue {
    Integer(i64),
    Text(String),
    Binary { base64: String },
}

impl TryFrom<WireValue> for AttributeValue {
    type Error = base64::DecodeError;

    fn try_from(value: WireValue) -> Result<Self, Self::Error> {
        Ok(match value {
            WireValue::Integer(i) => Self::Integer(i),
            WireValue::Text(s) => Self::Text(s),
            WireValue::Binary { base64 } => Self::Binary(BASE64.decode(base64)?),
        })
    }
}

impl From<AttributeValue> for WireValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Integer(i) => Self::Integer(i),
            AttributeValue::Text(s) => Self::Text(s),
            AttributeValue::Binary(b) => Self::Binary {
                base64: BASE64.encode(b),
            },
        }
    }
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Integer syntax attributes sometimes arrive as their decimal text.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Binary(_) => None,
        }
    }

    /// Renders a security identifier held either as `S-1-...` text or binary.
    pub fn to_sid_string(&self) -> Option<String> {
        match self {
            Self::Text(s) => s.parse::<Sid>().ok().map(|sid| sid.to_string()),
            Self::Binary(b) => Sid::from_bytes(b).ok().map(|sid| sid.to_string()),
            Self::Integer(_) => None,
        }
    }

    fn render(&self, sid_valued: bool) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Integer(i) => Cow::Owned(i.to_string()),
            Self::Binary(b) if sid_valued => match Sid::from_bytes(b) {
                Ok(sid) => Cow::Owned(sid.to_string()),
                Err(_) => Cow::Owned(BASE64.encode(b)),
            },
            Self::Binary(b) => Cow::Owned(BASE64.encode(b)),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// One object's attribute set. Multi-valued attributes keep server order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<AttributeValue>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder used by fixtures and snapshot imports.
    pub fn with<V: Into<AttributeValue>>(
        mut self,
        attr: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.attributes
            .insert(attr.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// All values of `attr`, empty when absent. Lookup ignores case.
    pub fn get(&self, attr: &str) -> &[AttributeValue] {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attr))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn texts<'a>(&'a self, attr: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.get(attr).iter().filter_map(AttributeValue::as_text)
    }

    pub fn first_text(&self, attr: &str) -> Option<&str> {
        self.texts(attr).next()
    }

    pub fn integer(&self, attr: &str) -> Option<i64> {
        self.get(attr).iter().find_map(AttributeValue::as_integer)
    }

    pub fn object_classes(&self) -> impl Iterator<Item = &str> {
        self.texts("objectClass")
    }

    pub fn has_object_class(&self, class: &str) -> bool {
        self.object_classes().any(|c| c.eq_ignore_ascii_case(class))
    }

    /// Copy of the entry restricted to the requested attributes.
    pub fn select(&self, selection: &AttributeSelection) -> Self {
        let attributes: BTreeMap<String, Vec<AttributeValue>> = match selection {
            AttributeSelection::All => self.attributes.clone(),
            AttributeSelection::Only(wanted) => self
                .attributes
                .iter()
                .filter(|(name, _)| wanted.iter().any(|w| w.eq_ignore_ascii_case(name)))
                .map(|(name, values)| (name.clone(), values.clone()))
                .collect(),
        };
        Self {
            dn: self.dn.clone(),
            attributes,
        }
    }
}

impl AttributeSource for DirectoryEntry {
    fn text_values(&self, attr: &str) -> Vec<Cow<'_, str>> {
        if attr.eq_ignore_ascii_case(DN_ATTRIBUTE) {
            return vec![Cow::Borrowed(self.dn.as_str())];
        }
        let sid_valued: bool = SID_ATTRIBUTES.iter().any(|a| a.eq_ignore_ascii_case(attr));
        self.get(attr).iter().map(|v| v.render(sid_valued)).collect()
    }
}
