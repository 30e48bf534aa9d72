//! Plain directory browsing: single object reads, child listing and raw
//! searches.

use adlens_common::directory::{
    AttributeSelection, DirectoryEntry, DirectorySearch, EntryStream, SearchError, SearchRequest,
};
use adlens_protocols::filter::Filter;
use tracing::debug;

/// Default filter of [`search`].
pub const ANY_OBJECT: &str = "(objectClass=*)";

/// Reads a single object given as DN, account name or SID.
pub fn object<D: DirectorySearch + ?Sized>(
    directory: &D,
    target: &str,
    attributes: AttributeSelection,
) -> Result<DirectoryEntry, SearchError> {
    let request = SearchRequest::object(target).selection(attributes);
    directory
        .search(&request)?
        .next()
        .unwrap_or_else(|| Err(SearchError::NoSuchObject(target.to_string())))
}

/// Lists the distinguished names of every object of `class` under `target`,
/// the target itself included when it matches. `class` may be `*`.
pub fn children<'a, D: DirectorySearch + ?Sized>(
    directory: &'a D,
    target: &str,
    class: &str,
) -> Result<impl Iterator<Item = Result<String, SearchError>> + use<'a, D>, SearchError> {
    let request = SearchRequest::subtree(target, Filter::object_class(class))
        .selection(AttributeSelection::Only(Vec::new()));
    let stream: EntryStream<'a> = directory.search(&request)?;
    Ok(stream.map(|entry| entry.map(|entry| entry.dn)))
}

/// Runs a subtree search with a textual filter. Entries come back untouched.
pub fn search<'a, D: DirectorySearch + ?Sized>(
    directory: &'a D,
    base: &str,
    filter: &str,
    attributes: AttributeSelection,
) -> Result<EntryStream<'a>, SearchError> {
    let filter: Filter = filter.parse()?;
    debug!(%base, %filter, "raw search");
    directory.search(&SearchRequest::subtree(base, filter).selection(attributes))
}
