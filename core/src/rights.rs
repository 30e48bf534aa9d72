//! # Effective Rights Classifier
//!
//! Reports, per directory object, what the bound credential may write or
//! create there. Nothing is inferred from ACLs: the server already computes
//! the answer in three constructed attributes, each read through a
//! [`RightsChannel`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use adlens_common::directory::{
    AttributeValue, DirectoryEntry, DirectorySearch, EntryStream, SearchError, SearchRequest,
};
use adlens_protocols::filter::Filter;
use serde::Serialize;

/// Subject recorded in summary mode instead of the attribute or class names.
pub const SUMMARY_SUBJECT: &str = "permission";

/// Subject recorded for rights on the security descriptor itself.
pub const DESCRIPTOR_SUBJECT: &str = "nTSecurityDescriptor";

// [MS-ADTS] sDRightsEffective
const SD_OWNER_MASK: i64 = 0x3;
const SD_DACL_MASK: i64 = 0x4;
const SD_SACL_MASK: i64 = 0x8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RightKind {
    Write,
    CreateChild,
    Owner,
    Dacl,
    Sacl,
}

impl RightKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "WRITE",
            Self::CreateChild => "CREATE_CHILD",
            Self::Owner => "OWNER",
            Self::Dacl => "DACL",
            Self::Sacl => "SACL",
        }
    }
}

impl fmt::Display for RightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical object categories the scan can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectType {
    #[default]
    All,
    Ou,
    User,
    Computer,
    Group,
    Domain,
    Gpo,
}

impl ObjectType {
    pub fn object_class(self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Ou => "container",
            Self::User => "user",
            Self::Computer => "computer",
            Self::Group => "group",
            Self::Domain => "domain",
            Self::Gpo => "groupPolicyContainer",
        }
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "OU" => Ok(Self::Ou),
            "USER" => Ok(Self::User),
            "COMPUTER" => Ok(Self::Computer),
            "GROUP" => Ok(Self::Group),
            "DOMAIN" => Ok(Self::Domain),
            "GPO" => Ok(Self::Gpo),
            _ => Err(format!("invalid object type: {s}")),
        }
    }
}

/// Which family of rights to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RightFilter {
    #[default]
    All,
    Write,
    Child,
}

impl FromStr for RightFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "WRITE" => Ok(Self::Write),
            "CHILD" => Ok(Self::Child),
            _ => Err(format!("invalid right: {s}")),
        }
    }
}

/// A constructed attribute carrying part of the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightsChannel {
    /// `allowedAttributesEffective`: attributes the caller may write.
    WritableAttributes,
    /// `sDRightsEffective`: which descriptor parts the caller may write.
    DescriptorRights,
    /// `allowedChildClassesEffective`: classes the caller may create below.
    CreatableClasses,
}

impl RightsChannel {
    pub fn for_filter(right: RightFilter) -> &'static [RightsChannel] {
        match right {
            RightFilter::All => &[
                Self::WritableAttributes,
                Self::DescriptorRights,
                Self::CreatableClasses,
            ],
            RightFilter::Write => &[Self::WritableAttributes, Self::DescriptorRights],
            RightFilter::Child => &[Self::CreatableClasses],
        }
    }

    pub fn attribute(self) -> &'static str {
        match self {
            Self::WritableAttributes => "allowedAttributesEffective",
            Self::DescriptorRights => "sDRightsEffective",
            Self::CreatableClasses => "allowedChildClassesEffective",
        }
    }

    /// Decodes the channel's values into `(right, subject)` pairs.
    pub fn decode(self, values: &[AttributeValue], detail: bool) -> Vec<(RightKind, String)> {
        match self {
            Self::WritableAttributes => names(values, detail)
                .into_iter()
                .map(|name| (RightKind::Write, name))
                .collect(),
            Self::CreatableClasses => names(values, detail)
                .into_iter()
                .map(|name| (RightKind::CreateChild, name))
                .collect(),
            Self::DescriptorRights => {
                let mask: i64 = values.iter().find_map(AttributeValue::as_integer).unwrap_or(0);
                descriptor_rights(mask)
                    .into_iter()
                    .map(|kind| (kind, DESCRIPTOR_SUBJECT.to_string()))
                    .collect()
            }
        }
    }
}

impl fmt::Display for RightsChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// Decodes an `sDRightsEffective` mask.
pub fn descriptor_rights(mask: i64) -> Vec<RightKind> {
    let mut rights: Vec<RightKind> = Vec::new();
    if mask & SD_OWNER_MASK != 0 {
        rights.push(RightKind::Owner);
    }
    if mask & SD_DACL_MASK != 0 {
        rights.push(RightKind::Dacl);
    }
    if mask & SD_SACL_MASK != 0 {
        rights.push(RightKind::Sacl);
    }
    rights
}

fn names(values: &[AttributeValue], detail: bool) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in values.iter().filter_map(AttributeValue::as_text) {
        let name: &str = if name.eq_ignore_ascii_case("distinguishedName") {
            "dn"
        } else {
            name
        };
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    match (detail, names.is_empty()) {
        (true, _) | (false, true) => names,
        (false, false) => vec![SUMMARY_SUBJECT.to_string()],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RightsEntry {
    #[serde(rename = "distinguishedName")]
    pub distinguished_name: String,
    #[serde(flatten)]
    pub rights: BTreeMap<RightKind, Vec<String>>,
}

impl RightsEntry {
    pub fn subjects(&self, kind: RightKind) -> &[String] {
        self.rights.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct EffectiveRightsClassifier<'a, D: DirectorySearch + ?Sized> {
    directory: &'a D,
}

impl<'a, D: DirectorySearch + ?Sized> EffectiveRightsClassifier<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Scans the domain partition for objects of `object_type` carrying any
    /// of the `right` family.
    pub fn classify(
        &self,
        object_type: ObjectType,
        right: RightFilter,
        detail: bool,
    ) -> Result<Rights<'a>, SearchError> {
        let directory: &'a D = self.directory;
        let channels: &'static [RightsChannel] = RightsChannel::for_filter(right);
        let request = SearchRequest::subtree(
            directory.naming_contexts().domain.as_str(),
            Filter::object_class(object_type.object_class()),
        )
        .attributes(channels.iter().map(|c| c.attribute()));

        Ok(Rights {
            stream: directory.search(&request)?,
            channels,
            detail,
        })
    }
}

/// Iterator returned by [`EffectiveRightsClassifier::classify`]. Objects
/// without any right are never yielded.
pub struct Rights<'a> {
    stream: EntryStream<'a>,
    channels: &'static [RightsChannel],
    detail: bool,
}

impl Rights<'_> {
    fn classify_entry(&self, entry: DirectoryEntry) -> Option<RightsEntry> {
        let mut rights: BTreeMap<RightKind, Vec<String>> = BTreeMap::new();
        for channel in self.channels {
            for (kind, subject) in channel.decode(entry.get(channel.attribute()), self.detail) {
                let subjects: &mut Vec<String> = rights.entry(kind).or_default();
                if !subjects.contains(&subject) {
                    subjects.push(subject);
                }
            }
        }
        if rights.is_empty() {
            return None;
        }
        Some(RightsEntry {
            distinguished_name: entry.dn,
            rights,
        })
    }
}

impl Iterator for Rights<'_> {
    type Item = Result<RightsEntry, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stream.next()? {
                Ok(entry) => {
                    if let Some(rights) = self.classify_entry(entry) {
                        return Some(Ok(rights));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlens_common::directory::{NamingContexts, SnapshotDirectory};

    const DOMAIN: &str = "DC=corp,DC=local";

    fn directory() -> SnapshotDirectory {
        SnapshotDirectory::new(
            NamingContexts {
                domain: DOMAIN.into(),
                application: vec![],
            },
            vec![
                DirectoryEntry::new(DOMAIN)
                    .with("objectClass", ["top", "domain"])
                    .with("sDRightsEffective", [0i64]),
                DirectoryEntry::new(format!("CN=alice,CN=Users,{DOMAIN}"))
                    .with("objectClass", ["user"])
                    .with(
                        "allowedAttributesEffective",
                        ["description", "distinguishedName", "description"],
                    )
                    .with("sDRightsEffective", [7i64]),
                DirectoryEntry::new(format!("OU=Lab,{DOMAIN}"))
                    .with("objectClass", ["organizationalUnit"])
                    .with("allowedChildClassesEffective", ["user", "computer"]),
                DirectoryEntry::new(format!("CN=Users,{DOMAIN}"))
                    .with("objectClass", ["container"])
                    .with("sDRightsEffective", [12i64]),
                DirectoryEntry::new(format!("CN=bob,CN=Users,{DOMAIN}"))
                    .with("objectClass", ["user"]),
            ],
        )
    }

    fn classify(object_type: ObjectType, right: RightFilter, detail: bool) -> Vec<RightsEntry> {
        let dir = directory();
        EffectiveRightsClassifier::new(&dir)
            .classify(object_type, right, detail)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn descriptor_mask_decoding() {
        use RightKind::*;
        assert!(descriptor_rights(0).is_empty());
        assert_eq!(descriptor_rights(3), vec![Owner]);
        assert_eq!(descriptor_rights(1), vec![Owner]);
        assert_eq!(descriptor_rights(4), vec![Dacl]);
        assert_eq!(descriptor_rights(8), vec![Sacl]);
        assert_eq!(descriptor_rights(7), vec![Owner, Dacl]);
        assert_eq!(descriptor_rights(12), vec![Dacl, Sacl]);
    }

    #[test]
    fn detail_lists_every_distinct_name() {
        let entries = classify(ObjectType::User, RightFilter::Write, true);
        assert_eq!(entries.len(), 1);
        let alice = &entries[0];
        assert_eq!(alice.subjects(RightKind::Write), &["description", "dn"]);
        assert_eq!(alice.subjects(RightKind::Owner), &[DESCRIPTOR_SUBJECT]);
        assert_eq!(alice.subjects(RightKind::Dacl), &[DESCRIPTOR_SUBJECT]);
        assert!(alice.subjects(RightKind::Sacl).is_empty());
    }

    #[test]
    fn summary_collapses_to_a_marker() {
        let summary = classify(ObjectType::All, RightFilter::All, false);
        let detailed = classify(ObjectType::All, RightFilter::All, true);
        assert_eq!(summary.len(), detailed.len());

        for (s, d) in summary.iter().zip(&detailed) {
            for kind in [RightKind::Write, RightKind::CreateChild] {
                assert_eq!(s.subjects(kind).is_empty(), d.subjects(kind).is_empty());
                if !s.subjects(kind).is_empty() {
                    assert_eq!(s.subjects(kind), &[SUMMARY_SUBJECT]);
                }
            }
        }
    }

    #[test]
    fn objects_without_rights_are_never_reported() {
        for right in [RightFilter::All, RightFilter::Write, RightFilter::Child] {
            for detail in [true, false] {
                let entries = classify(ObjectType::All, right, detail);
                let dns: Vec<&str> =
                    entries.iter().map(|e| e.distinguished_name.as_str()).collect();
                assert!(!dns.contains(&DOMAIN));
                assert!(!dns.contains(&"CN=bob,CN=Users,DC=corp,DC=local"));
                assert!(entries.iter().all(|e| !e.rights.is_empty()));
            }
        }
    }

    #[test]
    fn right_filter_selects_channels() {
        let child = classify(ObjectType::All, RightFilter::Child, true);
        assert_eq!(child.len(), 1);
        assert_eq!(child[0].subjects(RightKind::CreateChild), &["user", "computer"]);

        let write = classify(ObjectType::All, RightFilter::Write, false);
        assert_eq!(write.len(), 2);
        assert!(write.iter().all(|e| e.subjects(RightKind::CreateChild).is_empty()));
    }

    #[test]
    fn object_type_maps_to_class() {
        let containers = classify(ObjectType::Ou, RightFilter::All, false);
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].subjects(RightKind::Sacl), &[DESCRIPTOR_SUBJECT]);
        assert_eq!(
            "gpo".parse::<ObjectType>().map(ObjectType::object_class),
            Ok("groupPolicyContainer")
        );
        assert!("printer".parse::<ObjectType>().is_err());
    }

    #[test]
    fn serializes_rights_by_kind() {
        let entries = classify(ObjectType::Ou, RightFilter::All, false);
        assert_eq!(
            serde_json::to_value(&entries[0]).unwrap(),
            serde_json::json!({
                "distinguishedName": "CN=Users,DC=corp,DC=local",
                "DACL": ["nTSecurityDescriptor"],
                "SACL": ["nTSecurityDescriptor"]
            })
        );
    }
}
