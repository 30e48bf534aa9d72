//! Read-path analyzers over an Active Directory search collaborator.

pub mod browse;
pub mod membership;
pub mod records;
pub mod rights;
