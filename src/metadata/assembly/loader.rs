//! Builds an [`Assembly`] from the metadata tables of a PE image.

use std::collections::HashMap;

use log::debug;

use crate::{
    file::File,
    metadata::{
        assembly::Assembly,
        cor20header::Cor20Header,
        method::{
            MethodAccessFlags, MethodDefinition, MethodImplCodeType, MethodImplOptions,
            MethodModifiers, MethodSignature,
        },
        root::Root,
        signatures::{parse_method_sig, TypeNameContext},
        streams::{Blob, Strings, TablesHeader},
        tables::{
            CustomAttributeRaw, GenericParamRaw, MemberRefRaw, MethodDefRaw, NestedClassRaw,
            RowReadable, TableId, TypeDefRaw, TypeRefRaw,
        },
        token::Token,
        typesystem::TypeDefinition,
    },
    Error::NotSupported,
    Result,
};

const COMPILER_GENERATED_NAMESPACE: &str = "System.Runtime.CompilerServices";
const COMPILER_GENERATED_NAME: &str = "CompilerGeneratedAttribute";
const MAX_NESTING: usize = 64;

/// Reads the module metadata out of `file`.
pub(super) fn load(name: String, file: &File) -> Result<Assembly> {
    let (clr_rva, clr_size) = file.clr();
    let clr_offset = file.rva_to_offset(clr_rva)?;
    let header = Cor20Header::read(file.data_slice(clr_offset, clr_size.max(72))?)?;

    let meta_offset = file.rva_to_offset(header.meta_data_rva as usize)?;
    let meta = file.data_slice(meta_offset, header.meta_data_size as usize)?;
    let root = Root::read(meta)?;

    if root.stream(meta, "#-").is_some() {
        return Err(NotSupported);
    }
    let Some(tables) = root.stream(meta, "#~") else {
        return Err(malformed_error!("Metadata has no #~ stream"));
    };
    let Some(strings) = root.stream(meta, "#Strings") else {
        return Err(malformed_error!("Metadata has no #Strings stream"));
    };
    let strings = Strings::from(strings)?;
    let blobs = Blob::from(root.stream(meta, "#Blob").unwrap_or(&[0]))?;
    let tables = TablesHeader::from(tables)?;

    debug!(
        "Reading metadata of '{}' ({}, {} streams)",
        name,
        root.version,
        root.stream_headers.len()
    );

    let reader = MetadataReader {
        tables: &tables,
        strings: &strings,
        blobs: &blobs,
    };
    reader.read(name)
}

struct MetadataReader<'a> {
    tables: &'a TablesHeader<'a>,
    strings: &'a Strings<'a>,
    blobs: &'a Blob<'a>,
}

impl MetadataReader<'_> {
    fn rows<T: RowReadable>(&self) -> Result<Vec<T>> {
        match self.tables.table::<T>()? {
            Some(table) => table.rows(),
            None => Ok(Vec::new()),
        }
    }

    fn string(&self, index: u32) -> Result<String> {
        Ok(self.strings.get(index as usize)?.to_string())
    }

    fn read(&self, name: String) -> Result<Assembly> {
        let type_rows = self.rows::<TypeDefRaw>()?;
        let method_rows = self.rows::<MethodDefRaw>()?;
        let method_count = u32::try_from(method_rows.len())
            .map_err(|_| malformed_error!("Too many methods"))?;

        let mut types = Vec::with_capacity(type_rows.len());
        let mut owners = vec![Token::new(0); method_rows.len()];
        for (index, row) in type_rows.iter().enumerate() {
            let end = type_rows
                .get(index + 1)
                .map_or(method_count + 1, |next| next.method_list)
                .min(method_count + 1);
            let start = row.method_list.max(1);

            let methods: Vec<Token> = (start..end)
                .map(|rid| Token::from_parts(TableId::MethodDef, rid))
                .collect();
            for method in &methods {
                owners[method.row() as usize - 1] = row.token;
            }

            types.push(TypeDefinition {
                token: row.token,
                name: self.string(row.type_name)?,
                namespace: self.string(row.type_namespace)?,
                flags: row.flags,
                enclosing: None,
                generic_params: Vec::new(),
                methods,
                nested: Vec::new(),
                compiler_generated: false,
            });
        }

        let mut nested_rows = self.rows::<NestedClassRaw>()?;
        nested_rows.sort_by_key(|row| row.nested_class);
        for row in &nested_rows {
            let nested = Token::from_parts(TableId::TypeDef, row.nested_class);
            let enclosing = Token::from_parts(TableId::TypeDef, row.enclosing_class);
            let (Some(nested_index), Some(enclosing_index)) = (
                (row.nested_class as usize).checked_sub(1),
                (row.enclosing_class as usize).checked_sub(1),
            ) else {
                return Err(malformed_error!("Null row in NestedClass - {}", row.rid));
            };
            if nested_index >= types.len() || enclosing_index >= types.len() {
                return Err(malformed_error!("NestedClass row {} out of range", row.rid));
            }

            types[nested_index].enclosing = Some(enclosing);
            types[enclosing_index].nested.push(nested);
        }

        let mut type_params: HashMap<Token, Vec<(u32, String)>> = HashMap::new();
        for row in self.rows::<GenericParamRaw>()? {
            type_params
                .entry(row.owner.token)
                .or_default()
                .push((row.number, self.string(row.name)?));
        }
        let mut generic_params = |owner: Token| -> Vec<String> {
            let mut params = type_params.remove(&owner).unwrap_or_default();
            params.sort_by_key(|(number, _)| *number);
            params.into_iter().map(|(_, name)| name).collect()
        };
        for ty in &mut types {
            ty.generic_params = generic_params(ty.token);
        }

        let generated = self.compiler_generated_targets(&types)?;
        for ty in &mut types {
            ty.compiler_generated = generated.contains(&ty.token);
        }

        let type_names = TypeNames::new(&types, &self.rows::<TypeRefRaw>()?, self)?;

        let mut methods = Vec::with_capacity(method_rows.len());
        for (row, declaring_type) in method_rows.iter().zip(owners) {
            let method_generics = generic_params(row.token);
            let declaring_generics = declaring_type
                .row()
                .checked_sub(1)
                .and_then(|index| types.get(index as usize))
                .map(|ty| ty.generic_params.as_slice())
                .unwrap_or_default();

            let sig = parse_method_sig(self.blobs.get(row.signature as usize)?)?;
            let context = SignatureContext {
                names: &type_names,
                type_params: declaring_generics,
                method_params: &method_generics,
            };

            methods.push(MethodDefinition {
                token: row.token,
                name: self.string(row.name)?,
                access: MethodAccessFlags::from_method_flags(row.flags),
                modifiers: MethodModifiers::from_method_flags(row.flags),
                impl_code_type: MethodImplCodeType::from_impl_flags(row.impl_flags),
                impl_options: MethodImplOptions::from_impl_flags(row.impl_flags),
                rva: row.rva,
                signature: MethodSignature {
                    has_this: sig.has_this,
                    generic_param_count: sig.generic_param_count,
                    return_type: sig.return_type.name(&context),
                    params: sig.params.iter().map(|p| p.name(&context)).collect(),
                },
                generic_params: method_generics,
                compiler_generated: generated.contains(&row.token),
                declaring_type,
            });
        }

        debug!(
            "Loaded {} types and {} methods from '{}'",
            types.len(),
            methods.len(),
            name
        );

        Ok(Assembly {
            name,
            types,
            methods,
        })
    }

    /// Tokens of every TypeDef and MethodDef carrying `CompilerGeneratedAttribute`.
    fn compiler_generated_targets(&self, types: &[TypeDefinition]) -> Result<Vec<Token>> {
        let type_refs = self.rows::<TypeRefRaw>()?;
        let member_refs = self.rows::<MemberRefRaw>()?;

        let is_attribute_typeref = |row: u32| -> Result<bool> {
            let Some(type_ref) = (row as usize)
                .checked_sub(1)
                .and_then(|index| type_refs.get(index))
            else {
                return Ok(false);
            };
            Ok(self.strings.get(type_ref.type_name as usize)? == COMPILER_GENERATED_NAME
                && self.strings.get(type_ref.type_namespace as usize)?
                    == COMPILER_GENERATED_NAMESPACE)
        };
        let is_attribute_typedef = |token: Token| {
            types.iter().any(|ty| {
                ty.token == token
                    && ty.name == COMPILER_GENERATED_NAME
                    && ty.namespace == COMPILER_GENERATED_NAMESPACE
            })
        };

        let mut targets = Vec::new();
        for attribute in self.rows::<CustomAttributeRaw>()? {
            if !matches!(attribute.parent.tag, TableId::MethodDef | TableId::TypeDef) {
                continue;
            }

            let matches = match attribute.constructor.tag {
                TableId::MemberRef => {
                    let Some(member) = (attribute.constructor.row as usize)
                        .checked_sub(1)
                        .and_then(|index| member_refs.get(index))
                    else {
                        continue;
                    };
                    match member.class.tag {
                        TableId::TypeRef => is_attribute_typeref(member.class.row)?,
                        TableId::TypeDef => is_attribute_typedef(member.class.token),
                        _ => false,
                    }
                }
                TableId::MethodDef => types.iter().any(|ty| {
                    ty.methods.contains(&attribute.constructor.token)
                        && is_attribute_typedef(ty.token)
                }),
                _ => false,
            };

            if matches {
                targets.push(attribute.parent.token);
            }
        }

        Ok(targets)
    }
}

/// Full names of every TypeDef and TypeRef in the module.
struct TypeNames {
    names: HashMap<Token, String>,
}

impl TypeNames {
    fn new(
        types: &[TypeDefinition],
        type_refs: &[TypeRefRaw],
        reader: &MetadataReader,
    ) -> Result<Self> {
        let mut names = HashMap::new();

        for ty in types {
            let mut name = ty.name.clone();
            let mut current = ty;
            let mut depth = 0;
            while let Some(enclosing) = current
                .enclosing
                .and_then(|token| types.get((token.row() as usize).checked_sub(1)?))
            {
                if depth == MAX_NESTING {
                    return Err(malformed_error!("Nesting of '{}' is too deep", ty.name));
                }
                name = format!("{}+{}", enclosing.name, name);
                current = enclosing;
                depth += 1;
            }
            if !current.namespace.is_empty() {
                name = format!("{}.{}", current.namespace, name);
            }
            names.insert(ty.token, name);
        }

        for type_ref in type_refs {
            let mut name = reader.string(type_ref.type_name)?;
            let mut scope = type_ref.resolution_scope;
            let mut namespace = reader.string(type_ref.type_namespace)?;
            let mut depth = 0;
            while scope.tag == TableId::TypeRef && depth < MAX_NESTING {
                let Some(outer) = (scope.row as usize)
                    .checked_sub(1)
                    .and_then(|index| type_refs.get(index))
                else {
                    break;
                };
                name = format!("{}+{}", reader.string(outer.type_name)?, name);
                namespace = reader.string(outer.type_namespace)?;
                scope = outer.resolution_scope;
                depth += 1;
            }
            if !namespace.is_empty() {
                name = format!("{namespace}.{name}");
            }
            names.insert(type_ref.token, name);
        }

        Ok(TypeNames { names })
    }
}

struct SignatureContext<'a> {
    names: &'a TypeNames,
    type_params: &'a [String],
    method_params: &'a [String],
}

impl TypeNameContext for SignatureContext<'_> {
    fn type_name(&self, token: Token) -> String {
        self.names
            .names
            .get(&token)
            .cloned()
            .unwrap_or_else(|| token.to_string())
    }

    fn type_param_name(&self, index: u32) -> Option<String> {
        self.type_params.get(index as usize).cloned()
    }

    fn method_param_name(&self, index: u32) -> Option<String> {
        self.method_params.get(index as usize).cloned()
    }
}
