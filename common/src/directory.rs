//! # Directory Model
//!
//! Everything the analyzers need to know about the directory service they
//! read from: the shape of a returned entry, the search collaborator seam and
//! an offline implementation of that seam backed by an exported snapshot.

pub mod dn;
pub mod entry;
pub mod search;
pub mod snapshot;

pub use entry::{AttributeValue, DirectoryEntry};
pub use search::{
    AttributeSelection, DirectorySearch, EntryStream, NamingContexts, SearchError,
    SearchRequest, SearchScope,
};
pub use snapshot::SnapshotDirectory;
