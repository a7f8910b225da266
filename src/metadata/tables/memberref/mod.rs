//! MemberRef table (0x0A): references to fields and methods of other types, including the
//! constructors of custom attributes.

mod raw;
mod reader;

pub use raw::MemberRefRaw;
