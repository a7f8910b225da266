use crate::metadata::{tables::CodedIndex, token::Token};

/// A raw TypeRef row.
#[derive(Clone, Debug)]
pub struct TypeRefRaw {
    /// 1-based row
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Where the type lives, `ResolutionScope`; a TypeRef scope means a nested type
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
}
