#![cfg(test)]
use std::io::Write;

use adlens_common::config::Config;
use adlens_common::directory::{
    AttributeSelection, DirectoryEntry, DirectorySearch, SearchError, SnapshotDirectory,
};
use adlens_core::membership::{GroupMembership, MembershipResolver};
use adlens_core::records::{RecordDecoder, RecordValue, ZoneEntry};
use adlens_core::browse;
use adlens_core::rights::{
    EffectiveRightsClassifier, ObjectType, RightFilter, RightKind, RightsEntry,
};
use adlens_protocols::dns_record::RecordKind;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value, json};
use tempfile::NamedTempFile;

const DOMAIN: &str = "DC=corp,DC=local";
const DNS_ZONES: &str = "CN=MicrosoftDNS,DC=DomainDnsZones,DC=corp,DC=local";

fn sid(rid: u32) -> Value {
    let mut bytes: Vec<u8> = vec![1, 5, 0, 0, 0, 0, 0, 5];
    for sub in [21u32, 1, 2, 3, rid] {
        bytes.extend_from_slice(&sub.to_le_bytes());
    }
    json!({ "base64": BASE64.encode(bytes) })
}

/// A binary `dnsRecord` holding an A record.
fn address_record(octets: [u8; 4]) -> Value {
    let mut bytes: Vec<u8> = Vec::new();
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&[5, 240, 0, 0]);
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&3600u32.to_be_bytes());
    bytes.extend_from_slice(&[0u8; 8]);
    bytes.extend_from_slice(&octets);
    json!({ "base64": BASE64.encode(bytes) })
}

fn snapshot_json() -> Value {
    json!({
        "domain": DOMAIN,
        "application_partitions": ["DC=DomainDnsZones,DC=corp,DC=local"],
        "entries": [
            { "dn": DOMAIN, "attributes": { "objectClass": ["top", "domain"] } },
            { "dn": format!("CN=alice,CN=Users,{DOMAIN}"), "attributes": {
                "objectClass": ["top", "person", "user"],
                "sAMAccountName": ["alice"],
                "objectSid": [sid(1104)],
                "memberOf": [format!("CN=Helpdesk,CN=Users,{DOMAIN}")],
                "tokenGroups": [sid(513), sid(1105)],
                "allowedAttributesEffective": ["description", "info"],
                "sDRightsEffective": [4]
            }},
            { "dn": format!("CN=Domain Users,CN=Users,{DOMAIN}"), "attributes": {
                "objectClass": ["group"],
                "sAMAccountName": ["Domain Users"],
                "objectSid": ["S-1-5-21-1-2-3-513"]
            }},
            { "dn": format!("CN=Helpdesk,CN=Users,{DOMAIN}"), "attributes": {
                "objectClass": ["group"],
                "sAMAccountName": ["Helpdesk"],
                "objectSid": [sid(1105)],
                "allowedChildClassesEffective": ["contact"]
            }},
            { "dn": format!("DC=corp.local,{DNS_ZONES}"), "attributes": {
                "objectClass": ["top", "dnsZone"]
            }},
            { "dn": format!("DC=www,DC=corp.local,{DNS_ZONES}"), "attributes": {
                "objectClass": ["top", "dnsNode"],
                "name": ["www"],
                "dnsRecord": [address_record([10, 0, 0, 5]), "CNAME web.corp.local."]
            }},
            { "dn": format!("DC=_ldap._tcp,DC=corp.local,{DNS_ZONES}"), "attributes": {
                "objectClass": ["top", "dnsNode"],
                "name": ["_ldap._tcp"],
                "dnsRecord": ["SRV 0 100 389 dc01.corp.local."]
            }},
            { "dn": format!("DC=0.10.in-addr.arpa,{DNS_ZONES}"), "attributes": {
                "objectClass": ["top", "dnsZone"]
            }},
            { "dn": format!("DC=5,DC=0.10.in-addr.arpa,{DNS_ZONES}"), "attributes": {} }
        ]
    })
}

fn load() -> SnapshotDirectory {
    let mut file: NamedTempFile = NamedTempFile::new().unwrap();
    write!(file, "{}", snapshot_json()).unwrap();
    SnapshotDirectory::from_path(file.path()).unwrap()
}

#[test]
fn snapshot_file_loads_with_partitions() {
    let directory: SnapshotDirectory = load();
    assert_eq!(directory.naming_contexts().domain, DOMAIN);
    assert_eq!(directory.naming_contexts().application.len(), 1);
    assert_eq!(directory.entries().len(), 9);
}

#[test]
fn dns_dump_decodes_binary_and_text_records() {
    let directory: SnapshotDirectory = load();
    let cfg: Config = Config::default();
    let entries: Vec<ZoneEntry> = RecordDecoder::new(&directory, &cfg)
        .decode(None, false)
        .collect::<Result<_, _>>()
        .unwrap();

    let www: &ZoneEntry = entries
        .iter()
        .find(|e| e.record_name == "www.corp.local")
        .expect("www record");
    assert_eq!(www.values(RecordKind::A), &[RecordValue::Text("10.0.0.5".into())]);
    assert_eq!(www.values(RecordKind::CNAME).len(), 1);
    assert!(!entries.iter().any(|e| e.record_name.starts_with("_ldap")));

    let denied: &ZoneEntry = entries.iter().find(|e| e.is_denied()).expect("denied entry");
    assert_eq!(denied.record_name, "10.0.5");
    assert_eq!(
        serde_json::to_value(denied).unwrap(),
        json!({ "recordName": "10.0.5", "type": "ACCESS DENIED" })
    );
}

#[test]
fn dns_dump_with_detail_keeps_system_records() {
    let directory: SnapshotDirectory = load();
    let cfg: Config = Config::default();
    let entries: Vec<ZoneEntry> = RecordDecoder::new(&directory, &cfg)
        .decode(Some("corp"), true)
        .collect::<Result<_, _>>()
        .unwrap();

    let ldap: &ZoneEntry = entries
        .iter()
        .find(|e| e.record_name == "_ldap._tcp.corp.local")
        .expect("system record");
    assert_eq!(
        ldap.values(RecordKind::SRV),
        &[RecordValue::Text("dc01.corp.local.:389".into())]
    );
    assert!(entries.iter().all(|e| !e.is_denied()));
}

#[test]
fn membership_direct_and_transitive() {
    let directory: SnapshotDirectory = load();
    let resolver = MembershipResolver::new(&directory);

    let direct: Vec<GroupMembership> = resolver
        .resolve("alice", true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].sid, "S-1-5-21-1-2-3-1105");

    let transitive: Vec<String> = resolver
        .resolve("S-1-5-21-1-2-3-1104", false)
        .unwrap()
        .map(|g| g.unwrap().account_name)
        .collect();
    assert_eq!(transitive, vec!["Domain Users", "Helpdesk"]);
}

#[test]
fn writable_reports_only_objects_with_rights() {
    let directory: SnapshotDirectory = load();
    let entries: Vec<RightsEntry> = EffectiveRightsClassifier::new(&directory)
        .classify(ObjectType::All, RightFilter::All, false)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 2);
    let alice: &RightsEntry = &entries[0];
    assert_eq!(alice.distinguished_name, format!("CN=alice,CN=Users,{DOMAIN}"));
    assert_eq!(alice.subjects(RightKind::Write), &["permission"]);
    assert_eq!(alice.subjects(RightKind::Dacl), &["nTSecurityDescriptor"]);
    assert_eq!(entries[1].subjects(RightKind::CreateChild), &["permission"]);

    let groups: Vec<RightsEntry> = EffectiveRightsClassifier::new(&directory)
        .classify(ObjectType::Group, RightFilter::Child, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].subjects(RightKind::CreateChild), &["contact"]);
}

#[test]
fn children_and_search_browse_the_snapshot() {
    let directory: SnapshotDirectory = load();
    let users: Vec<String> = browse::children(&directory, DOMAIN, "user")
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(users, vec![format!("CN=alice,CN=Users,{DOMAIN}")]);

    let found = browse::search(
        &directory,
        DOMAIN,
        "(objectSid=S-1-5-21-1-2-3-1105)",
        AttributeSelection::only(["sAMAccountName"]),
    )
    .unwrap()
    .map(Result::unwrap)
    .collect::<Vec<_>>();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].first_text("sAMAccountName"), Some("Helpdesk"));
}

#[test]
fn object_reads_one_principal_by_account_name() {
    let directory: SnapshotDirectory = load();
    let alice: DirectoryEntry =
        browse::object(&directory, "alice", AttributeSelection::only(["sAMAccountName"])).unwrap();
    assert_eq!(alice.dn, format!("CN=alice,CN=Users,{DOMAIN}"));
    assert_eq!(alice.attributes.len(), 1);

    let helpdesk: DirectoryEntry =
        browse::object(&directory, "S-1-5-21-1-2-3-1105", AttributeSelection::All).unwrap();
    assert_eq!(helpdesk.first_text("sAMAccountName"), Some("Helpdesk"));

    assert!(matches!(
        browse::object(&directory, "mallory", AttributeSelection::All),
        Err(SearchError::NoSuchObject(_))
    ));
}
