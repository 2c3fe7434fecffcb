// League pipeline: everything between raw match records and the ranked
// table / today-feed. Pure functions over an immutable snapshot; no I/O.

pub mod dedup;
pub mod identity;
pub mod record;
pub mod standings;
pub mod today;
