//! Wire-level codecs for values stored in, or sent to, a directory service.

pub mod dns_record;
pub mod filter;
pub mod sid;
