//! # Group Membership Resolver
//!
//! Resolves the groups a principal belongs to without walking the group graph:
//! * **direct**: the principal's `memberOf` back-links;
//! * **transitive**: the server-computed `tokenGroups`, falling back to
//!   `tokenGroupsNoGCAcceptable` when no global catalog is reachable.
//!
//! Either way the references end up in one OR filter, resolved by a single
//! search over the domain partition.

use std::collections::HashSet;
use std::fmt;

use adlens_common::directory::{DirectorySearch, EntryStream, SearchError, SearchRequest};
use adlens_protocols::filter::Filter;
use serde::Serialize;
use tracing::{debug, warn};

const MEMBER_OF: &str = "memberOf";
const TOKEN_GROUPS: &str = "tokenGroups";
const TOKEN_GROUPS_NO_GC: &str = "tokenGroupsNoGCAcceptable";

/// A group the principal belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupMembership {
    #[serde(rename = "distinguishedName")]
    pub distinguished_name: String,
    #[serde(rename = "objectSid")]
    pub sid: String,
    #[serde(rename = "sAMAccountName")]
    pub account_name: String,
}

/// Non-fatal conditions met while resolving, also logged as warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipWarning {
    /// `memberOf` was empty.
    NoDirectMembership,
    /// `tokenGroups` could not be computed, the fallback may miss groups.
    IncompleteTokenGroups,
    /// Neither token group attribute returned anything.
    NoTokenGroups,
}

impl fmt::Display for MembershipWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg: &str = match self {
            Self::NoDirectMembership => "No direct group membership found",
            Self::IncompleteTokenGroups => {
                "no GC Server available, the set of groups might be incomplete"
            }
            Self::NoTokenGroups => "No group membership found",
        };
        f.write_str(msg)
    }
}

pub struct MembershipResolver<'a, D: DirectorySearch + ?Sized> {
    directory: &'a D,
}

impl<'a, D: DirectorySearch + ?Sized> MembershipResolver<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Resolves the groups of `principal` (DN, account name or SID).
    ///
    /// A principal that cannot be found is an error. Finding no group is not.
    pub fn resolve(
        &self,
        principal: &str,
        direct_only: bool,
    ) -> Result<Memberships<'a>, SearchError> {
        let mut warnings: Vec<MembershipWarning> = Vec::new();

        let terms: Vec<Filter> = if direct_only {
            let terms: Vec<Filter> = self.direct_terms(principal)?;
            if terms.is_empty() {
                note(&mut warnings, MembershipWarning::NoDirectMembership);
            }
            terms
        } else {
            let mut terms: Vec<Filter> = self.token_terms(principal, TOKEN_GROUPS)?;
            if terms.is_empty() {
                note(&mut warnings, MembershipWarning::IncompleteTokenGroups);
                terms = self.token_terms(principal, TOKEN_GROUPS_NO_GC)?;
            }
            if terms.is_empty() {
                note(&mut warnings, MembershipWarning::NoTokenGroups);
            }
            terms
        };

        if terms.is_empty() {
            return Ok(Memberships {
                warnings,
                stream: None,
                seen: HashSet::new(),
            });
        }

        let directory: &'a D = self.directory;
        let domain: &str = &directory.naming_contexts().domain;
        let request = SearchRequest::subtree(domain, Filter::Or(terms))
            .attributes(["objectSid", "sAMAccountName"]);
        debug!(filter = %request.filter, "resolving group references");
        let stream: EntryStream<'a> = directory.search(&request)?;

        Ok(Memberships {
            warnings,
            stream: Some(stream),
            seen: HashSet::new(),
        })
    }

    fn direct_terms(&self, principal: &str) -> Result<Vec<Filter>, SearchError> {
        let request = SearchRequest::object(principal).attributes(["objectSid", MEMBER_OF]);
        let mut terms: Vec<Filter> = Vec::new();
        for entry in self.directory.search(&request)? {
            let entry = entry?;
            terms.extend(
                entry
                    .texts(MEMBER_OF)
                    .map(|group| Filter::equals("distinguishedName", group)),
            );
        }
        Ok(terms)
    }

    fn token_terms(&self, principal: &str, attr: &str) -> Result<Vec<Filter>, SearchError> {
        let request = SearchRequest::object(principal).attributes([attr]);
        let mut terms: Vec<Filter> = Vec::new();
        for entry in self.directory.search(&request)? {
            let entry = entry?;
            terms.extend(
                entry
                    .get(attr)
                    .iter()
                    .filter_map(|value| value.to_sid_string())
                    .map(|sid| Filter::equals("objectSid", sid)),
            );
        }
        Ok(terms)
    }
}

fn note(warnings: &mut Vec<MembershipWarning>, warning: MembershipWarning) {
    warn!("{warning}");
    warnings.push(warning);
}

/// Groups resolved by [`MembershipResolver::resolve`], unique by SID.
pub struct Memberships<'a> {
    warnings: Vec<MembershipWarning>,
    stream: Option<EntryStream<'a>>,
    seen: HashSet<String>,
}

impl Memberships<'_> {
    pub fn warnings(&self) -> &[MembershipWarning] {
        &self.warnings
    }
}

impl Iterator for Memberships<'_> {
    type Item = Result<GroupMembership, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let stream = self.stream.as_mut()?;
        loop {
            let entry = match stream.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            let Some(sid) = entry.get("objectSid").iter().find_map(|v| v.to_sid_string()) else {
                debug!(group = %entry.dn, "group without readable objectSid");
                continue;
            };
            if !self.seen.insert(sid.clone()) {
                continue;
            }
            let account_name: String =
                entry.first_text("sAMAccountName").unwrap_or_default().to_string();
            return Some(Ok(GroupMembership {
                distinguished_name: entry.dn,
                sid,
                account_name,
            }));
        }
    }
}
