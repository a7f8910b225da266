use crate::metadata::{tables::CodedIndex, token::Token};

/// A raw TypeDef row.
#[derive(Clone, Debug)]
pub struct TypeDefRaw {
    /// 1-based row
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `TypeAttributes`
    pub flags: u32,
    /// `#Strings` index of the name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// Base type, `TypeDefOrRef`
    pub extends: CodedIndex,
    /// First owned Field row
    pub field_list: u32,
    /// First owned MethodDef row
    pub method_list: u32,
}
