//! Domain types: batches, grant records, recipients.

pub mod batch;
pub mod grant;
pub mod recipient;
