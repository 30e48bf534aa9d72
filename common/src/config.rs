/// Names of the default system record patterns hidden from zone dumps.
///
/// Covers the global catalog marker and locators, Kerberos and password change
/// locators, LDAP locators, the domain controller locator container, the zone
/// root marker and the two built-in DNS application partitions.
pub const SYSTEM_RECORD_PATTERNS: &[&str] = &[
    "gc",
    "_gc.*",
    "_kerberos.*",
    "_kpasswd.*",
    "_ldap.*",
    "_msdcs",
    "@",
    "DomainDnsZones",
    "ForestDnsZones",
];

/// Zones kept by every DNS server that carry nothing site specific.
pub const IGNORED_ZONES: &[&str] = &["RootDNSServers", "..TrustAnchors"];

pub const REVERSE_ZONE_SUFFIX: &str = ".in-addr.arpa";
pub const ZONE_ROOT_MARKER: &str = "@";

#[derive(Debug, Clone)]
pub struct Config {
    /// Record name patterns (`*` wildcards) excluded unless system records
    /// are requested.
    pub system_record_patterns: Vec<String>,
    /// Zones skipped entirely, whatever the other options say.
    pub ignored_zones: Vec<String>,
    /// Suffix marking a reverse lookup name whose octets must be flipped.
    pub reverse_zone_suffix: String,
    /// Record name standing for the zone itself.
    pub zone_root_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system_record_patterns: SYSTEM_RECORD_PATTERNS.iter().map(|p| p.to_string()).collect(),
            ignored_zones: IGNORED_ZONES.iter().map(|z| z.to_string()).collect(),
            reverse_zone_suffix: REVERSE_ZONE_SUFFIX.to_string(),
            zone_root_marker: ZONE_ROOT_MARKER.to_string(),
        }
    }
}
