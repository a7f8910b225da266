//! Metadata streams: the `#~` tables stream and the `#Strings` and `#Blob` heaps.

mod blob;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
