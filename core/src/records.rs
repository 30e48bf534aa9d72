//! # Zone Record Decoder
//!
//! Walks every partition that may host directory-integrated DNS zones and
//! turns the `dnsRecord` values of each `dnsNode` into name → addresses
//! mappings.
//!
//! Each partition is read in two passes:
//! 1. **Records**: zone containers and readable record objects, system
//!    records filtered out on the server unless requested.
//! 2. **Listing**: zones that yielded no readable record are listed again
//!    asking for nothing but `objectClass`. Children whose class stays hidden
//!    exist, but cannot be read, and are reported as access denied.
//!
//! A partition (or zone) that does not exist is skipped silently.

use std::collections::{BTreeMap, HashMap, VecDeque};

use adlens_common::config::Config;
use adlens_common::directory::dn;
use adlens_common::directory::{
    AttributeValue, DirectoryEntry, DirectorySearch, EntryStream, SearchError, SearchRequest,
};
use adlens_protocols::dns_record::{RecordError, RecordKind, TypedRecord};
use adlens_protocols::filter::Filter;
use serde::Serialize;
use tracing::{debug, error, warn};

const RECORD_ATTRIBUTES: &[&str] = &["dnsRecord", "name", "objectClass"];

/// A decoded value. Everything but the SOA flattens to a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Text(String),
    Authority {
        #[serde(rename = "PrimaryServer")]
        primary_server: String,
        #[serde(rename = "zoneAdminEmail")]
        admin_email: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Access {
    #[serde(rename = "ACCESS DENIED")]
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneEntry {
    #[serde(rename = "recordName")]
    pub record_name: String,
    #[serde(flatten)]
    pub records: BTreeMap<RecordKind, Vec<RecordValue>>,
    /// Set on names only known from the listing pass.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
}

impl ZoneEntry {
    pub fn is_denied(&self) -> bool {
        self.access == Some(Access::Denied)
    }

    pub fn values(&self, kind: RecordKind) -> &[RecordValue] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct RecordDecoder<'a, D: DirectorySearch + ?Sized> {
    directory: &'a D,
    config: &'a Config,
}

impl<'a, D: DirectorySearch + ?Sized> RecordDecoder<'a, D> {
    pub fn new(directory: &'a D, config: &'a Config) -> Self {
        Self { directory, config }
    }

    /// Lazily decodes every readable zone record.
    ///
    /// `zone` keeps only zones whose name contains it, `include_system_records`
    /// lifts the default exclusion of locator and bootstrap records.
    pub fn decode(&self, zone: Option<&str>, include_system_records: bool) -> ZoneRecords<'a, D> {
        let partitions: VecDeque<String> = self
            .directory
            .naming_contexts()
            .all()
            .map(str::to_string)
            .collect();

        ZoneRecords {
            directory: self.directory,
            config: self.config,
            filter: record_filter(self.config, include_system_records),
            wanted_zone: zone.map(str::to_lowercase),
            partitions,
            phase: Phase::NextPartition,
            zones: VecDeque::new(),
            decoded_per_zone: HashMap::new(),
        }
    }
}

/// The first pass filter: zones and records, minus system names.
pub fn record_filter(config: &Config, include_system_records: bool) -> Filter {
    let kinds: Filter = Filter::Or(vec![
        Filter::object_class("dnsNode"),
        Filter::object_class("dnsZone"),
    ]);
    if include_system_records {
        return kinds;
    }

    let mut items: Vec<Filter> = vec![kinds];
    items.extend(
        config
            .system_record_patterns
            .iter()
            .map(|pattern| Filter::negate(Filter::pattern("name", pattern))),
    );
    Filter::And(items)
}

/// Flips the octets of a reverse lookup name: `4.3.2.1.in-addr.arpa` is `1.2.3.4`.
/// Other names come back unchanged.
pub fn canonical_name(name: &str, reverse_suffix: &str) -> String {
    let cut: usize = name.len().saturating_sub(reverse_suffix.len());
    match name.get(cut..) {
        Some(tail) if cut > 0 && tail.eq_ignore_ascii_case(reverse_suffix) => {
            let mut octets: Vec<&str> = name[..cut].split('.').collect();
            octets.reverse();
            octets.join(".")
        }
        _ => name.to_string(),
    }
}

enum Phase<'a> {
    NextPartition,
    Records(EntryStream<'a>),
    NextZone,
    Listing(EntryStream<'a>),
    Done,
}

/// Iterator returned by [`RecordDecoder::decode`].
pub struct ZoneRecords<'a, D: DirectorySearch + ?Sized> {
    directory: &'a D,
    config: &'a Config,
    filter: Filter,
    wanted_zone: Option<String>,
    partitions: VecDeque<String>,
    phase: Phase<'a>,
    /// Zone container DNs of the current partition, in discovery order.
    zones: VecDeque<String>,
    /// Records decoded per zone DN (lowercased) in the current partition.
    decoded_per_zone: HashMap<String, usize>,
}

impl<'a, D: DirectorySearch + ?Sized> Iterator for ZoneRecords<'a, D> {
    type Item = Result<ZoneEntry, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Done => return None,
                Phase::NextPartition => {
                    let partition: String = self.partitions.pop_front()?;
                    self.zones.clear();
                    self.decoded_per_zone.clear();

                    let request = SearchRequest::subtree(partition.as_str(), self.filter.clone())
                        .attributes(RECORD_ATTRIBUTES.iter().copied());
                    match self.directory.search(&request) {
                        Ok(stream) => self.phase = Phase::Records(stream),
                        Err(SearchError::NoSuchObject(_)) => {
                            debug!(%partition, "partition not found, skipping");
                            self.phase = Phase::NextPartition;
                        }
                        Err(err) => return Some(Err(err)),
                    }
                }
                Phase::Records(mut stream) => match stream.next() {
                    Some(Ok(entry)) => {
                        self.phase = Phase::Records(stream);
                        if let Some(zone_entry) = self.handle_record(&entry) {
                            return Some(Ok(zone_entry));
                        }
                    }
                    Some(Err(SearchError::NoSuchObject(base))) => {
                        debug!(%base, "partition vanished while reading, skipping");
                        self.phase = Phase::NextZone;
                    }
                    Some(Err(err)) => return Some(Err(err)),
                    None => self.phase = Phase::NextZone,
                },
                Phase::NextZone => {
                    let Some(zone_dn) = self.zones.pop_front() else {
                        self.phase = Phase::NextPartition;
                        continue;
                    };
                    self.phase = Phase::NextZone;
                    if self.decoded_per_zone.contains_key(&zone_dn.to_lowercase()) {
                        continue;
                    }

                    let request =
                        SearchRequest::subtree(zone_dn.as_str(), Filter::present("objectClass"))
                            .attributes(["objectClass"]);
                    match self.directory.search(&request) {
                        Ok(stream) => self.phase = Phase::Listing(stream),
                        Err(SearchError::NoSuchObject(_)) => {
                            debug!(zone = %zone_dn, "zone not found, skipping listing");
                        }
                        Err(err) => {
                            self.phase = Phase::Done;
                            return Some(Err(err));
                        }
                    }
                }
                Phase::Listing(mut stream) => match stream.next() {
                    Some(Ok(entry)) => {
                        self.phase = Phase::Listing(stream);
                        if let Some(zone_entry) = self.handle_listing(&entry) {
                            return Some(Ok(zone_entry));
                        }
                    }
                    Some(Err(SearchError::NoSuchObject(_))) | None => self.phase = Phase::NextZone,
                    Some(Err(err)) => return Some(Err(err)),
                },
            }
        }
    }
}

impl<D: DirectorySearch + ?Sized> ZoneRecords<'_, D> {
    fn is_ignored_zone(&self, zone: &str) -> bool {
        self.config
            .ignored_zones
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(zone))
    }

    fn is_wanted_zone(&self, zone: &str) -> bool {
        match &self.wanted_zone {
            Some(wanted) => zone.to_lowercase().contains(wanted.as_str()),
            None => true,
        }
    }

    fn handle_record(&mut self, entry: &DirectoryEntry) -> Option<ZoneEntry> {
        let zone_suffix: &str = dn::nth_value(&entry.dn, 1)?;
        if self.is_ignored_zone(zone_suffix) {
            return None;
        }

        if entry.has_object_class("dnsZone") {
            let zone_name: &str = dn::nth_value(&entry.dn, 0)?;
            if !self.is_ignored_zone(zone_name) && self.is_wanted_zone(zone_name) {
                self.zones.push_back(entry.dn.clone());
            }
            return None;
        }

        if !self.is_wanted_zone(zone_suffix) {
            return None;
        }

        let name: &str = entry
            .first_text("name")
            .or_else(|| dn::nth_value(&entry.dn, 0))?;
        let record_name: String = self.record_name(name, zone_suffix);
        if let Some(zone_dn) = dn::parent(&entry.dn) {
            *self.decoded_per_zone.entry(zone_dn.to_lowercase()).or_default() += 1;
        }

        let records: BTreeMap<RecordKind, Vec<RecordValue>> =
            decode_records(&record_name, entry.get("dnsRecord"));
        Some(ZoneEntry {
            record_name,
            records,
            access: None,
        })
    }

    fn handle_listing(&self, entry: &DirectoryEntry) -> Option<ZoneEntry> {
        if entry.object_classes().next().is_some() {
            return None;
        }
        let prefix: &str = dn::nth_value(&entry.dn, 0)?;
        let suffix: &str = dn::nth_value(&entry.dn, 1)?;
        let name: String = format!("{prefix}.{suffix}");

        Some(ZoneEntry {
            record_name: canonical_name(&name, &self.config.reverse_zone_suffix),
            records: BTreeMap::new(),
            access: Some(Access::Denied),
        })
    }

    fn record_name(&self, name: &str, zone_suffix: &str) -> String {
        let full: String = if name == self.config.zone_root_marker {
            zone_suffix.to_string()
        } else {
            format!("{name}.{zone_suffix}")
        };
        canonical_name(&full, &self.config.reverse_zone_suffix)
    }
}

/// Decodes every value, dropping (and logging) the ones that fail.
fn decode_records(
    record_name: &str,
    values: &[AttributeValue],
) -> BTreeMap<RecordKind, Vec<RecordValue>> {
    let mut records: BTreeMap<RecordKind, Vec<RecordValue>> = BTreeMap::new();

    for value in values {
        let record: TypedRecord = match decode_value(value) {
            Ok(record) => record,
            Err(err) => {
                error!(record = record_name, %err, "malformed dnsRecord value");
                continue;
            }
        };
        let Some(kind) = record.kind() else {
            match record {
                TypedRecord::Unknown { kind } => {
                    warn!(record = record_name, kind, "unsupported record kind ignored");
                }
                TypedRecord::Unrecognized { mnemonic } => {
                    warn!(record = record_name, %mnemonic, "unsupported record kind ignored");
                }
                _ => {}
            }
            continue;
        };
        records.entry(kind).or_default().push(flatten(record));
    }
    records
}

fn decode_value(value: &AttributeValue) -> Result<TypedRecord, RecordError> {
    match value {
        AttributeValue::Binary(bytes) => TypedRecord::decode(bytes),
        AttributeValue::Text(text) => text.parse(),
        AttributeValue::Integer(i) => Err(RecordError::InvalidText(i.to_string())),
    }
}

fn flatten(record: TypedRecord) -> RecordValue {
    let text: String = match record {
        TypedRecord::Address(ip) => ip.to_string(),
        TypedRecord::AddressV6(ip) => ip.to_string(),
        TypedRecord::NameServer(name) | TypedRecord::Alias(name) | TypedRecord::Pointer(name) => {
            name
        }
        TypedRecord::Text(strings) => strings.join(" "),
        TypedRecord::MailExchange { exchange, .. } => exchange,
        // priority and weight are dropped on purpose
        TypedRecord::Service { target, port, .. } => format!("{target}:{port}"),
        TypedRecord::StartOfAuthority {
            primary_server,
            admin_mailbox,
            ..
        } => {
            return RecordValue::Authority {
                primary_server,
                admin_email: admin_mailbox.replacen('.', "@", 1),
            };
        }
        TypedRecord::Unknown { kind } => format!("TYPE{kind}"),
        TypedRecord::Unrecognized { mnemonic } => mnemonic,
    };
    RecordValue::Text(text)
}
