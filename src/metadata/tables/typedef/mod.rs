//! TypeDef table (0x02): one row per type defined in the module.
//!
//! A row's `method_list` is the first MethodDef row owned by the type; the type owns every
//! method up to the next row's `method_list` (or the end of the MethodDef table).

mod raw;
mod reader;

pub use raw::TypeDefRaw;
