use crate::metadata::{tables::CodedIndex, token::Token};

/// A raw CustomAttribute row.
#[derive(Clone, Debug)]
pub struct CustomAttributeRaw {
    /// 1-based row
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Decorated row, `HasCustomAttribute`
    pub parent: CodedIndex,
    /// Attribute constructor, `CustomAttributeType`
    pub constructor: CodedIndex,
    /// `#Blob` index of the encoded arguments
    pub value: u32,
}
