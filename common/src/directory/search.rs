//! The search collaborator seam.
//!
//! Transport, binding and paging are somebody else's problem. Analyzers only
//! ever see a [`DirectorySearch`] that turns a [`SearchRequest`] into a lazy
//! stream of entries.

use adlens_protocols::filter::{Filter, FilterError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entry::DirectoryEntry;

pub type EntryStream<'a> = Box<dyn Iterator<Item = Result<DirectoryEntry, SearchError>> + 'a>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The search base does not exist on the server. The only condition the
    /// analyzers recover from.
    #[error("no such object: {0}")]
    NoSuchObject(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Only the base object itself.
    #[default]
    Base,
    /// The base object and everything below it.
    Subtree,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeSelection {
    #[default]
    All,
    /// Only the listed attributes. An empty list returns bare DNs.
    Only(Vec<String>),
}

impl AttributeSelection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }
}

/// A single search, always returning raw (unformatted) values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Distinguished name, or any identifier the collaborator can resolve to
    /// one (account name, SID).
    pub base: String,
    pub filter: Filter,
    pub scope: SearchScope,
    pub attributes: AttributeSelection,
}

impl SearchRequest {
    /// Reads the object named by `base`.
    pub fn object(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            filter: Filter::present("objectClass"),
            scope: SearchScope::Base,
            attributes: AttributeSelection::All,
        }
    }

    pub fn subtree(base: impl Into<String>, filter: Filter) -> Self {
        Self {
            base: base.into(),
            filter,
            scope: SearchScope::Subtree,
            attributes: AttributeSelection::All,
        }
    }

    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = AttributeSelection::only(names);
        self
    }

    pub fn selection(mut self, selection: AttributeSelection) -> Self {
        self.attributes = selection;
        self
    }
}

/// The naming contexts (partitions) hosted by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingContexts {
    /// The default domain partition.
    pub domain: String,
    /// Application partitions such as `DC=DomainDnsZones,...`.
    #[serde(default, rename = "application_partitions")]
    pub application: Vec<String>,
}

impl NamingContexts {
    /// Application partitions first, then the domain partition.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.application
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.domain.as_str()))
    }
}

/// Anything able to run a directory search.
pub trait DirectorySearch {
    fn naming_contexts(&self) -> &NamingContexts;

    /// Starts a search. A missing base must surface as
    /// [`SearchError::NoSuchObject`], either here or from the stream.
    fn search(&self, request: &SearchRequest) -> Result<EntryStream<'_>, SearchError>;
}
