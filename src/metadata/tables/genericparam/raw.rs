use crate::metadata::{tables::CodedIndex, token::Token};

/// A raw GenericParam row.
#[derive(Clone, Debug)]
pub struct GenericParamRaw {
    /// 1-based row
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// 0-based position within the owner's parameter list
    pub number: u32,
    /// `GenericParamAttributes`
    pub flags: u32,
    /// Owning type or method, `TypeOrMethodDef`
    pub owner: CodedIndex,
    /// `#Strings` index of the name
    pub name: u32,
}
