//! Raw metadata tables of the `#~` stream.
//!
//! Only the tables needed to enumerate types and methods are decoded into row structs; all other
//! tables are skipped using the row sizes in [`TableInfo`].

mod customattribute;
mod genericparam;
mod memberref;
mod methoddef;
mod nestedclass;
mod typedef;
mod typeref;
mod types;

pub use customattribute::CustomAttributeRaw;
pub use genericparam::GenericParamRaw;
pub use memberref::MemberRefRaw;
pub use methoddef::MethodDefRaw;
pub use nestedclass::NestedClassRaw;
pub use typedef::TypeDefRaw;
pub use typeref::TypeRefRaw;
pub use types::{
    CodedIndex, CodedIndexType, MetadataTable, RowReadable, TableId, TableInfo, TableInfoRef,
    TableRowInfo,
};
