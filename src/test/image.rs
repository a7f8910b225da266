//! In-memory ECMA-335 images for loader tests.

use std::collections::HashMap;

use crate::metadata::{
    tables::{CodedIndexType, TableId, TableInfo},
    token::Token,
};

struct TypeDefRow {
    flags: u32,
    name: u32,
    namespace: u32,
    method_list: u32,
}

struct MethodDefRow {
    impl_flags: u16,
    flags: u16,
    name: u32,
    signature: u32,
}

/// Builds the metadata section of a module table by table.
///
/// Rows are appended in the order they are declared; methods always belong to the type that was
/// declared last, as a compiler emits them.
pub struct MetadataImage {
    strings: Vec<u8>,
    string_offsets: HashMap<String, u32>,
    blobs: Vec<u8>,
    type_refs: Vec<(Token, u32, u32)>,
    type_defs: Vec<TypeDefRow>,
    methods: Vec<MethodDefRow>,
    member_refs: Vec<(Token, u32, u32)>,
    custom_attributes: Vec<(Token, Token)>,
    nested: Vec<(u32, u32)>,
    generic_params: Vec<(u16, Token, u32)>,
}

impl MetadataImage {
    /// Creates an image holding only the `<Module>` type.
    pub fn new() -> Self {
        let mut image = MetadataImage {
            strings: vec![0],
            string_offsets: HashMap::new(),
            blobs: vec![0],
            type_refs: Vec::new(),
            type_defs: Vec::new(),
            methods: Vec::new(),
            member_refs: Vec::new(),
            custom_attributes: Vec::new(),
            nested: Vec::new(),
            generic_params: Vec::new(),
        };
        image.type_def(0, "", "<Module>", None);
        image
    }

    fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(offset) = self.string_offsets.get(value) {
            return *offset;
        }

        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(value.as_bytes());
        self.strings.push(0);
        self.string_offsets.insert(value.to_string(), offset);
        offset
    }

    fn blob(&mut self, value: &[u8]) -> u32 {
        assert!(value.len() < 0x80);
        let offset = self.blobs.len() as u32;
        self.blobs.push(value.len() as u8);
        self.blobs.extend_from_slice(value);
        offset
    }

    /// Adds a TypeRef scoped to this module and returns its token.
    pub fn type_ref(&mut self, namespace: &str, name: &str) -> u32 {
        let name = self.string(name);
        let namespace = self.string(namespace);
        self.type_refs
            .push((Token::from_parts(TableId::Module, 1), name, namespace));
        Token::from_parts(TableId::TypeRef, self.type_refs.len() as u32).value()
    }

    /// Adds a TypeDef, nested in `enclosing` if given, and returns its token.
    pub fn type_def(
        &mut self,
        flags: u32,
        namespace: &str,
        name: &str,
        enclosing: Option<u32>,
    ) -> u32 {
        let row = TypeDefRow {
            flags,
            name: self.string(name),
            namespace: self.string(namespace),
            method_list: self.methods.len() as u32 + 1,
        };
        self.type_defs.push(row);

        let rid = self.type_defs.len() as u32;
        if let Some(enclosing) = enclosing {
            self.nested.push((rid, Token::new(enclosing).row()));
        }
        Token::from_parts(TableId::TypeDef, rid).value()
    }

    /// Adds a method to `owner`, which must be the last declared type, and returns its token.
    pub fn method_def(&mut self, owner: u32, flags: u16, name: &str, signature: &[u8]) -> u32 {
        assert_eq!(Token::new(owner).row() as usize, self.type_defs.len());

        let row = MethodDefRow {
            impl_flags: 0,
            flags,
            name: self.string(name),
            signature: self.blob(signature),
        };
        self.methods.push(row);
        Token::from_parts(TableId::MethodDef, self.methods.len() as u32).value()
    }

    /// Adds a MemberRef on the TypeRef or TypeDef `class` and returns its token.
    pub fn member_ref(&mut self, class: u32, name: &str, signature: &[u8]) -> u32 {
        let name = self.string(name);
        let signature = self.blob(signature);
        self.member_refs.push((Token::new(class), name, signature));
        Token::from_parts(TableId::MemberRef, self.member_refs.len() as u32).value()
    }

    /// Attaches an argument-less custom attribute constructed by `constructor` to `parent`.
    pub fn custom_attribute(&mut self, parent: u32, constructor: u32) {
        self.custom_attributes
            .push((Token::new(parent), Token::new(constructor)));
    }

    /// Declares generic parameter `number` of the TypeDef or MethodDef `owner`.
    pub fn generic_param(&mut self, owner: u32, number: u16, name: &str) {
        let name = self.string(name);
        self.generic_params.push((number, Token::new(owner), name));
    }

    /// Serializes the metadata root and its `#~`, `#Strings` and `#Blob` streams.
    pub fn build(mut self) -> Vec<u8> {
        align(&mut self.strings);
        align(&mut self.blobs);
        let tables = self.tables_stream();

        let streams: [(&str, &[u8]); 3] = [
            ("#~", &tables),
            ("#Strings", &self.strings),
            ("#Blob", &self.blobs),
        ];

        let version = b"v4.0.30319\0\0";
        let headers_size: usize = streams
            .iter()
            .map(|(name, _)| 8 + ((name.len() + 1 + 3) & !3))
            .sum();
        let mut offset = 16 + version.len() + 4 + headers_size;

        let mut root = Vec::new();
        root.extend_from_slice(b"BSJB");
        put(&mut root, 1, 2);
        put(&mut root, 1, 2);
        put(&mut root, 0, 4);
        put(&mut root, version.len() as u32, 4);
        root.extend_from_slice(version);
        put(&mut root, 0, 2);
        put(&mut root, streams.len() as u32, 2);
        for (name, data) in &streams {
            put(&mut root, offset as u32, 4);
            put(&mut root, data.len() as u32, 4);
            root.extend_from_slice(name.as_bytes());
            root.push(0);
            align(&mut root);
            offset += data.len();
        }
        for (_, data) in &streams {
            root.extend_from_slice(data);
        }

        root
    }

    fn tables_stream(&mut self) -> Vec<u8> {
        self.custom_attributes
            .sort_by_key(|(parent, _)| coded(CodedIndexType::HasCustomAttribute, *parent));
        self.nested.sort_by_key(|(nested, _)| *nested);
        self.generic_params.sort_by_key(|(number, owner, _)| {
            (coded(CodedIndexType::TypeOrMethodDef, *owner), *number)
        });

        let counts = [
            (TableId::Module, 1),
            (TableId::TypeRef, self.type_refs.len()),
            (TableId::TypeDef, self.type_defs.len()),
            (TableId::MethodDef, self.methods.len()),
            (TableId::MemberRef, self.member_refs.len()),
            (TableId::CustomAttribute, self.custom_attributes.len()),
            (TableId::NestedClass, self.nested.len()),
            (TableId::GenericParam, self.generic_params.len()),
        ];
        let present: Vec<(TableId, u32)> = counts
            .iter()
            .filter(|(_, rows)| *rows > 0)
            .map(|(table, rows)| (*table, *rows as u32))
            .collect();
        let info = TableInfo::from_rows(&present, false, false, false);

        let str_bytes = info.str_bytes();
        let blob_bytes = info.blob_bytes();
        let put_coded = |data: &mut Vec<u8>, kind: CodedIndexType, token: Token| {
            put(data, coded(kind, token), info.coded_index_bytes(kind));
        };

        let mut data = Vec::new();
        put(&mut data, 0, 4);
        data.push(2);
        data.push(0);
        data.push(0);
        data.push(1);
        let valid = present
            .iter()
            .fold(0_u64, |valid, (table, _)| valid | 1 << *table as u64);
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0_u64.to_le_bytes());
        for (_, rows) in &present {
            put(&mut data, *rows, 4);
        }

        // Module
        put(&mut data, 0, 2);
        put(&mut data, 0, str_bytes);
        put(&mut data, 0, info.guid_bytes());
        put(&mut data, 0, info.guid_bytes());
        put(&mut data, 0, info.guid_bytes());

        for (scope, name, namespace) in &self.type_refs {
            put_coded(&mut data, CodedIndexType::ResolutionScope, *scope);
            put(&mut data, *name, str_bytes);
            put(&mut data, *namespace, str_bytes);
        }

        for row in &self.type_defs {
            put(&mut data, row.flags, 4);
            put(&mut data, row.name, str_bytes);
            put(&mut data, row.namespace, str_bytes);
            put(&mut data, 0, info.coded_index_bytes(CodedIndexType::TypeDefOrRef));
            put(&mut data, 1, info.table_index_bytes(TableId::Field));
            put(&mut data, row.method_list, info.table_index_bytes(TableId::MethodDef));
        }

        for row in &self.methods {
            put(&mut data, 0, 4);
            put(&mut data, u32::from(row.impl_flags), 2);
            put(&mut data, u32::from(row.flags), 2);
            put(&mut data, row.name, str_bytes);
            put(&mut data, row.signature, blob_bytes);
            put(&mut data, 1, info.table_index_bytes(TableId::Param));
        }

        for (class, name, signature) in &self.member_refs {
            put_coded(&mut data, CodedIndexType::MemberRefParent, *class);
            put(&mut data, *name, str_bytes);
            put(&mut data, *signature, blob_bytes);
        }

        for (parent, constructor) in &self.custom_attributes {
            put_coded(&mut data, CodedIndexType::HasCustomAttribute, *parent);
            put_coded(&mut data, CodedIndexType::CustomAttributeType, *constructor);
            put(&mut data, 0, blob_bytes);
        }

        for (nested, enclosing) in &self.nested {
            put(&mut data, *nested, info.table_index_bytes(TableId::TypeDef));
            put(&mut data, *enclosing, info.table_index_bytes(TableId::TypeDef));
        }

        for (number, owner, name) in &self.generic_params {
            put(&mut data, u32::from(*number), 2);
            put(&mut data, 0, 2);
            put_coded(&mut data, CodedIndexType::TypeOrMethodDef, *owner);
            put(&mut data, *name, str_bytes);
        }

        align(&mut data);
        data
    }
}

/// Metadata of a module that declares nothing but `<Module>`.
pub fn minimal_metadata() -> Vec<u8> {
    MetadataImage::new().build()
}

/// Wraps a metadata section into a 32-bit PE image with a single `.text` section.
pub struct PeImageBuilder {
    metadata: Vec<u8>,
}

const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: u32 = 0x2000;
const TEXT_RVA: u32 = 0x2000;
const CLR_HEADER_SIZE: u32 = 72;

impl PeImageBuilder {
    /// Creates a builder for an image carrying `metadata`.
    pub fn new(metadata: Vec<u8>) -> Self {
        PeImageBuilder { metadata }
    }

    /// Produces the image bytes.
    pub fn build(self) -> Vec<u8> {
        let mut text = Vec::new();
        put(&mut text, CLR_HEADER_SIZE, 4);
        put(&mut text, 2, 2);
        put(&mut text, 5, 2);
        put(&mut text, TEXT_RVA + CLR_HEADER_SIZE, 4);
        put(&mut text, self.metadata.len() as u32, 4);
        put(&mut text, 1, 4);
        put(&mut text, 0, 4);
        text.resize(CLR_HEADER_SIZE as usize, 0);
        text.extend_from_slice(&self.metadata);

        let virtual_size = text.len() as u32;
        let raw_size = text.len().next_multiple_of(FILE_ALIGNMENT);
        text.resize(raw_size, 0);
        let image_size = (TEXT_RVA + virtual_size).next_multiple_of(SECTION_ALIGNMENT);

        let mut image = vec![0_u8; 0x80];
        image[0] = b'M';
        image[1] = b'Z';
        image[0x3C] = 0x80;

        // COFF header
        image.extend_from_slice(b"PE\0\0");
        put(&mut image, 0x014C, 2);
        put(&mut image, 1, 2);
        put(&mut image, 0, 4);
        put(&mut image, 0, 4);
        put(&mut image, 0, 4);
        put(&mut image, 0xE0, 2);
        put(&mut image, 0x2102, 2);

        // PE32 optional header
        put(&mut image, 0x010B, 2);
        image.push(8);
        image.push(0);
        put(&mut image, raw_size as u32, 4);
        put(&mut image, 0, 4);
        put(&mut image, 0, 4);
        put(&mut image, 0, 4);
        put(&mut image, TEXT_RVA, 4);
        put(&mut image, 0, 4);
        put(&mut image, 0x1000_0000, 4);
        put(&mut image, SECTION_ALIGNMENT, 4);
        put(&mut image, FILE_ALIGNMENT as u32, 4);
        put(&mut image, 4, 2);
        put(&mut image, 0, 2);
        put(&mut image, 0, 2);
        put(&mut image, 0, 2);
        put(&mut image, 4, 2);
        put(&mut image, 0, 2);
        put(&mut image, 0, 4);
        put(&mut image, image_size, 4);
        put(&mut image, FILE_ALIGNMENT as u32, 4);
        put(&mut image, 0, 4);
        put(&mut image, 3, 2);
        put(&mut image, 0x8540, 2);
        put(&mut image, 0x0010_0000, 4);
        put(&mut image, 0x1000, 4);
        put(&mut image, 0x0010_0000, 4);
        put(&mut image, 0x1000, 4);
        put(&mut image, 0, 4);
        put(&mut image, 16, 4);
        for directory in 0..16 {
            if directory == 14 {
                put(&mut image, TEXT_RVA, 4);
                put(&mut image, CLR_HEADER_SIZE, 4);
            } else {
                put(&mut image, 0, 4);
                put(&mut image, 0, 4);
            }
        }

        // Section table
        image.extend_from_slice(b".text\0\0\0");
        put(&mut image, virtual_size, 4);
        put(&mut image, TEXT_RVA, 4);
        put(&mut image, raw_size as u32, 4);
        put(&mut image, FILE_ALIGNMENT as u32, 4);
        put(&mut image, 0, 4);
        put(&mut image, 0, 4);
        put(&mut image, 0, 2);
        put(&mut image, 0, 2);
        put(&mut image, 0x6000_0020, 4);

        image.resize(FILE_ALIGNMENT, 0);
        image.extend_from_slice(&text);
        image
    }
}

fn put(data: &mut Vec<u8>, value: u32, bytes: u8) {
    match bytes {
        2 => data.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => data.extend_from_slice(&value.to_le_bytes()),
    }
}

fn align(data: &mut Vec<u8>) {
    let aligned = data.len().next_multiple_of(4);
    data.resize(aligned, 0);
}

fn coded(kind: CodedIndexType, token: Token) -> u32 {
    let tag = match kind {
        CodedIndexType::CustomAttributeType => {
            if token.is_table(TableId::MemberRef) {
                3
            } else {
                2
            }
        }
        _ => kind
            .tables()
            .iter()
            .position(|table| token.is_table(*table))
            .map_or(0, |tag| tag as u32),
    };

    token.row() << kind.tag_bits() | tag
}
