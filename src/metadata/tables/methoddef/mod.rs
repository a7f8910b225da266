//! MethodDef table (0x06): one row per method defined in the module, grouped by owning type.

mod raw;
mod reader;

pub use raw::MethodDefRaw;
