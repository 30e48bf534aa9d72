//! # LDAP String Filters
//!
//! A typed representation of RFC 4515 search filters. Filters are built as
//! values, rendered to their string form for the search collaborator and can be
//! evaluated locally against anything implementing [`AttributeSource`].

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality { attr: String, value: String },
    Presence { attr: String },
    Substring {
        attr: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
    GreaterOrEqual { attr: String, value: String },
    LessOrEqual { attr: String, value: String },
    Approx { attr: String, value: String },
    /// `attr:dn:rule:=value`, where either `attr` or `rule` may be absent.
    Extensible {
        attr: Option<String>,
        rule: Option<String>,
        dn_attributes: bool,
        value: String,
    },
}

/// LDAP_MATCHING_RULE_BIT_AND
pub const RULE_BIT_AND: &str = "1.2.840.113556.1.4.803";
/// LDAP_MATCHING_RULE_BIT_OR
pub const RULE_BIT_OR: &str = "1.2.840.113556.1.4.804";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter ended unexpectedly")]
    UnexpectedEnd,
    #[error("unexpected '{found}' at position {pos}")]
    Unexpected { pos: usize, found: char },
    #[error("missing attribute name at position {0}")]
    EmptyAttribute(usize),
    #[error("invalid attribute description at position {0}")]
    InvalidAttribute(usize),
    #[error("invalid escape sequence at position {0}")]
    InvalidEscape(usize),
    #[error("trailing input after position {0}")]
    TrailingInput(usize),
}

/// Read access to an entry's attribute values for filter evaluation.
pub trait AttributeSource {
    /// Every value of `attr` rendered as text. Attribute lookup is case-insensitive.
    fn text_values(&self, attr: &str) -> Vec<Cow<'_, str>>;
}

impl Filter {
    pub fn equals(attr: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equality {
            attr: attr.into(),
            value: value.into(),
        }
    }

    pub fn present(attr: impl Into<String>) -> Self {
        Self::Presence { attr: attr.into() }
    }

    pub fn negate(inner: Filter) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Builds a filter item from an unescaped assertion pattern where `*` is a
    /// wildcard, e.g. `_ldap.*` or a plain `@`.
    pub fn pattern(attr: impl Into<String>, pattern: &str) -> Self {
        let attr: String = attr.into();
        if pattern == "*" {
            return Self::Presence { attr };
        }
        if !pattern.contains('*') {
            return Self::Equality {
                attr,
                value: pattern.to_string(),
            };
        }
        let parts: Vec<String> = pattern.split('*').map(str::to_string).collect();
        substring_from_parts(attr, parts)
    }

    /// `(objectClass=*)` style filters render as presence tests.
    pub fn object_class(class: &str) -> Self {
        Self::pattern("objectClass", class)
    }

    pub fn matches<S: AttributeSource + ?Sized>(&self, source: &S) -> bool {
        match self {
            Self::And(items) => items.iter().all(|f| f.matches(source)),
            Self::Or(items) => items.iter().any(|f| f.matches(source)),
            Self::Not(inner) => !inner.matches(source),
            // every object carries a class even when its attributes are unreadable
            Self::Presence { attr } if attr.eq_ignore_ascii_case("objectClass") => true,
            Self::Presence { attr } => !source.text_values(attr).is_empty(),
            Self::Equality { attr, value } => source
                .text_values(attr)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            Self::Substring {
                attr,
                initial,
                any,
                last,
            } => source
                .text_values(attr)
                .iter()
                .any(|v| substring_matches(&v.to_lowercase(), initial, any, last)),
            Self::GreaterOrEqual { attr, value } => source
                .text_values(attr)
                .iter()
                .any(|v| compare(v, value).is_ge()),
            Self::LessOrEqual { attr, value } => source
                .text_values(attr)
                .iter()
                .any(|v| compare(v, value).is_le()),
            Self::Approx { attr, value } => source
                .text_values(attr)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            // without an attribute every attribute would have to be tried
            Self::Extensible { attr: None, .. } => false,
            Self::Extensible {
                attr: Some(attr),
                rule,
                value,
                ..
            } => source
                .text_values(attr)
                .iter()
                .any(|v| rule_matches(rule.as_deref(), v, value)),
        }
    }
}

/// Integers compare numerically, anything else case-insensitively.
fn compare(value: &str, assertion: &str) -> Ordering {
    match (value.trim().parse::<i64>(), assertion.trim().parse::<i64>()) {
        (Ok(v), Ok(a)) => v.cmp(&a),
        _ => value.to_lowercase().cmp(&assertion.to_lowercase()),
    }
}

/// Rules other than the bitwise ones, in-chain included, fall back to equality.
fn rule_matches(rule: Option<&str>, value: &str, assertion: &str) -> bool {
    let bits = || Some((value.trim().parse::<i64>().ok()?, assertion.trim().parse::<i64>().ok()?));
    match rule {
        Some(RULE_BIT_AND) => bits().is_some_and(|(v, a)| v & a == a),
        Some(RULE_BIT_OR) => bits().is_some_and(|(v, a)| v & a != 0),
        _ => value.eq_ignore_ascii_case(assertion),
    }
}

fn substring_from_parts(attr: String, mut parts: Vec<String>) -> Filter {
    let last: Option<String> = parts.pop().filter(|p| !p.is_empty());
    let initial: Option<String> = match parts.is_empty() {
        true => None,
        false => Some(parts.remove(0)).filter(|p| !p.is_empty()),
    };
    let any: Vec<String> = parts.into_iter().filter(|p| !p.is_empty()).collect();
    Filter::Substring {
        attr,
        initial,
        any,
        last,
    }
}

fn substring_matches(
    value: &str,
    initial: &Option<String>,
    any: &[String],
    last: &Option<String>,
) -> bool {
    let mut rest: &str = value;
    if let Some(initial) = initial {
        match rest.strip_prefix(initial.to_lowercase().as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for part in any {
        let part: String = part.to_lowercase();
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    match last {
        Some(last) => rest.ends_with(last.to_lowercase().as_str()),
        None => true,
    }
}

fn escape(value: &str) -> String {
    let mut out: String = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(items) | Self::Or(items) => {
                let op: char = if matches!(self, Self::And(_)) { '&' } else { '|' };
                write!(f, "({op}")?;
                for item in items {
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Self::Not(inner) => write!(f, "(!{inner})"),
            Self::Equality { attr, value } => write!(f, "({attr}={})", escape(value)),
            Self::Presence { attr } => write!(f, "({attr}=*)"),
            Self::Substring {
                attr,
                initial,
                any,
                last,
            } => {
                write!(f, "({attr}=")?;
                if let Some(initial) = initial {
                    write!(f, "{}", escape(initial))?;
                }
                write!(f, "*")?;
                for part in any {
                    write!(f, "{}*", escape(part))?;
                }
                if let Some(last) = last {
                    write!(f, "{}", escape(last))?;
                }
                write!(f, ")")
            }
            Self::GreaterOrEqual { attr, value } => write!(f, "({attr}>={})", escape(value)),
            Self::LessOrEqual { attr, value } => write!(f, "({attr}<={})", escape(value)),
            Self::Approx { attr, value } => write!(f, "({attr}~={})", escape(value)),
            Self::Extensible {
                attr,
                rule,
                dn_attributes,
                value,
            } => {
                write!(f, "(")?;
                if let Some(attr) = attr {
                    write!(f, "{attr}")?;
                }
                if *dn_attributes {
                    write!(f, ":dn")?;
                }
                if let Some(rule) = rule {
                    write!(f, ":{rule}")?;
                }
                write!(f, ":={})", escape(value))
            }
        }
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed: &str = s.trim();
        // ldapsearch style: a bare item without surrounding parentheses
        let owned: String;
        let input: &str = if trimmed.starts_with('(') {
            trimmed
        } else {
            owned = format!("({trimmed})");
            &owned
        };

        let mut parser = Parser {
            chars: input.chars().collect(),
            pos: 0,
        };
        let filter: Filter = parser.filter()?;
        if parser.pos != parser.chars.len() {
            return Err(FilterError::TrailingInput(parser.pos));
        }
        Ok(filter)
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(FilterError::Unexpected {
                pos: self.pos,
                found,
            }),
            None => Err(FilterError::UnexpectedEnd),
        }
    }

    fn filter(&mut self) -> Result<Filter, FilterError> {
        self.expect('(')?;
        let filter: Filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::negate(self.filter()?)
            }
            Some(_) => self.item()?,
            None => return Err(FilterError::UnexpectedEnd),
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut items: Vec<Filter> = Vec::new();
        while self.peek() == Some('(') {
            items.push(self.filter()?);
        }
        Ok(items)
    }

    fn item(&mut self) -> Result<Filter, FilterError> {
        let start: usize = self.pos;
        while let Some(c) = self.peek() {
            if c == '=' {
                break;
            }
            if c == '(' || c == ')' {
                return Err(FilterError::Unexpected { pos: self.pos, found: c });
            }
            self.pos += 1;
        }
        let lhs: String = self.chars[start..self.pos].iter().collect::<String>().trim().to_string();
        self.expect('=')?;

        let (op, attr): (Option<char>, &str) = match lhs.chars().last() {
            Some(op @ ('>' | '<' | '~' | ':')) => (Some(op), &lhs[..lhs.len() - 1]),
            _ => (None, lhs.as_str()),
        };

        if op == Some(':') {
            return self.extensible(attr, start);
        }
        if attr.is_empty() {
            return Err(FilterError::EmptyAttribute(start));
        }
        if !is_attribute_description(attr) {
            return Err(FilterError::InvalidAttribute(start));
        }
        let attr: String = attr.to_string();

        if op.is_some() {
            let value: String = self.single_value()?;
            return Ok(match op {
                Some('>') => Filter::GreaterOrEqual { attr, value },
                Some('<') => Filter::LessOrEqual { attr, value },
                _ => Filter::Approx { attr, value },
            });
        }

        let mut parts: Vec<String> = self.assertion(true)?;
        Ok(match parts.len() {
            1 => Filter::Equality {
                attr,
                value: parts.remove(0),
            },
            2 if parts.iter().all(String::is_empty) => Filter::Presence { attr },
            _ => substring_from_parts(attr, parts),
        })
    }

    fn extensible(&mut self, lhs: &str, start: usize) -> Result<Filter, FilterError> {
        let mut pieces = lhs.split(':');
        let attr: Option<String> = pieces
            .next()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let mut dn_attributes: bool = false;
        let mut rule: Option<String> = None;
        for piece in pieces {
            if piece.eq_ignore_ascii_case("dn") && !dn_attributes && rule.is_none() {
                dn_attributes = true;
            } else if rule.is_none() && is_attribute_description(piece) {
                rule = Some(piece.to_string());
            } else {
                return Err(FilterError::InvalidAttribute(start));
            }
        }
        match (&attr, &rule) {
            (None, None) => return Err(FilterError::EmptyAttribute(start)),
            (Some(attr), _) if !is_attribute_description(attr) => {
                return Err(FilterError::InvalidAttribute(start));
            }
            _ => {}
        }
        Ok(Filter::Extensible {
            attr,
            rule,
            dn_attributes,
            value: self.single_value()?,
        })
    }

    fn single_value(&mut self) -> Result<String, FilterError> {
        let mut parts: Vec<String> = self.assertion(false)?;
        Ok(parts.remove(0))
    }

    /// Reads an assertion value up to the closing parenthesis, split on
    /// unescaped `*` when `wildcards` is set. Escapes are collected as bytes
    /// so multi-byte sequences decode as UTF-8.
    fn assertion(&mut self, wildcards: bool) -> Result<Vec<String>, FilterError> {
        let value_start: usize = self.pos;
        let mut parts: Vec<Vec<u8>> = vec![Vec::new()];
        loop {
            match self.peek() {
                None => return Err(FilterError::UnexpectedEnd),
                Some(')') => break,
                Some(c @ '(') => {
                    return Err(FilterError::Unexpected { pos: self.pos, found: c });
                }
                Some(c @ '*') if !wildcards => {
                    return Err(FilterError::Unexpected { pos: self.pos, found: c });
                }
                Some('*') => {
                    self.pos += 1;
                    parts.push(Vec::new());
                }
                Some('\\') => {
                    let byte: u8 = self.escaped()?;
                    if let Some(part) = parts.last_mut() {
                        part.push(byte);
                    }
                }
                Some(c) => {
                    self.pos += 1;
                    let mut buf: [u8; 4] = [0; 4];
                    if let Some(part) = parts.last_mut() {
                        part.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    }
                }
            }
        }

        parts
            .into_iter()
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|_| FilterError::InvalidEscape(value_start))
            })
            .collect()
    }

    fn escaped(&mut self) -> Result<u8, FilterError> {
        let at: usize = self.pos;
        let hex: String = self
            .chars
            .get(at + 1..at + 3)
            .ok_or(FilterError::InvalidEscape(at))?
            .iter()
            .collect();
        let byte: u8 = u8::from_str_radix(&hex, 16).map_err(|_| FilterError::InvalidEscape(at))?;
        self.pos += 3;
        Ok(byte)
    }
}

/// Attribute names, OIDs and options: letters, digits, `-`, `.`, `;`, `_`.
fn is_attribute_description(attr: &str) -> bool {
    !attr.is_empty()
        && attr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ';' | '_'))
}
