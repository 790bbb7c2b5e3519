//! Core POP3 types.

mod capability;
mod listing;
mod response;

pub use capability::{Capabilities, Capability};
pub use listing::{DropListing, ScanListing, UniqueIdListing};
pub use response::{ExtendedCode, Greeting, StatusLine};
