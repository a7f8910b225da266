//! NestedClass table (0x29): links each nested TypeDef to its enclosing TypeDef.

mod raw;
mod reader;

pub use raw::NestedClassRaw;
