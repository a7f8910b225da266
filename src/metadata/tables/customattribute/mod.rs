//! CustomAttribute table (0x0C): attribute instances attached to metadata rows.
//!
//! Only the parent and constructor columns are interpreted; the value blob is never decoded.

mod raw;
mod reader;

pub use raw::CustomAttributeRaw;
