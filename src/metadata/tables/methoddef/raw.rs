use crate::metadata::token::Token;

/// A raw MethodDef row.
#[derive(Clone, Debug)]
pub struct MethodDefRaw {
    /// 1-based row
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// RVA of the IL body, 0 for abstract and runtime-implemented methods
    pub rva: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u32,
    /// `MethodAttributes`
    pub flags: u32,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the `MethodDefSig`
    pub signature: u32,
    /// First owned Param row
    pub param_list: u32,
}
