//! # Snapshot Directory
//!
//! An offline [`DirectorySearch`] backed by a JSON export of directory entries:
//!
//! ```json
//! {
//!   "domain": "DC=corp,DC=local",
//!   "application_partitions": ["DC=DomainDnsZones,DC=corp,DC=local"],
//!   "entries": [
//!     { "dn": "CN=alice,CN=Users,DC=corp,DC=local",
//!       "attributes": { "sAMAccountName": ["alice"], "sDRightsEffective": [4] } }
//!   ]
//! }
//! ```
//!
//! Binary values are written as `{"base64": "..."}`.

use std::path::Path;

use anyhow::Context;
use adlens_protocols::filter::AttributeSource;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dn;
use super::entry::DirectoryEntry;
use super::search::{
    DirectorySearch, EntryStream, NamingContexts, SearchError, SearchRequest, SearchScope,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDirectory {
    #[serde(flatten)]
    contexts: NamingContexts,
    #[serde(default)]
    entries: Vec<DirectoryEntry>,
}

impl SnapshotDirectory {
    pub fn new(contexts: NamingContexts, entries: Vec<DirectoryEntry>) -> Self {
        Self { contexts, entries }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parsing directory snapshot")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json: String = std::fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Resolves a search base given as DN, account name or SID.
    ///
    /// A DN that no entry carries still resolves when entries exist below it,
    /// as exports rarely include the partition heads themselves.
    fn resolve_base(&self, base: &str) -> Option<String> {
        let by_identity = self.entries.iter().find(|entry| {
            entry.dn.eq_ignore_ascii_case(base)
                || entry
                    .texts("sAMAccountName")
                    .any(|name| name.eq_ignore_ascii_case(base))
                || entry
                    .text_values("objectSid")
                    .iter()
                    .any(|sid| sid.eq_ignore_ascii_case(base))
        });
        if let Some(entry) = by_identity {
            return Some(entry.dn.clone());
        }

        let is_dn: bool = base.contains('=');
        if is_dn && self.entries.iter().any(|entry| dn::is_within(&entry.dn, base)) {
            return Some(base.to_string());
        }
        None
    }
}

impl DirectorySearch for SnapshotDirectory {
    fn naming_contexts(&self) -> &NamingContexts {
        &self.contexts
    }

    fn search(&self, request: &SearchRequest) -> Result<EntryStream<'_>, SearchError> {
        let base_dn: String = self
            .resolve_base(&request.base)
            .ok_or_else(|| SearchError::NoSuchObject(request.base.clone()))?;
        debug!(base = %base_dn, filter = %request.filter, "snapshot search");

        // subtree searches stop at the boundary of nested naming contexts
        let nested: Vec<String> = self
            .contexts
            .all()
            .filter(|nc| !nc.eq_ignore_ascii_case(&base_dn) && dn::is_within(nc, &base_dn))
            .map(str::to_string)
            .collect();

        let request: SearchRequest = request.clone();
        let stream = self.entries.iter().filter_map(move |entry| {
            let in_scope: bool = match request.scope {
                SearchScope::Base => entry.dn.eq_ignore_ascii_case(&base_dn),
                SearchScope::Subtree => {
                    dn::is_within(&entry.dn, &base_dn)
                        && !nested.iter().any(|nc| dn::is_within(&entry.dn, nc))
                }
            };
            if !in_scope || !request.filter.matches(entry) {
                return None;
            }
            Some(Ok(entry.select(&request.attributes)))
        });
        Ok(Box::new(stream))
    }
}
