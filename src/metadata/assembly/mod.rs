//! The compiled module model.
//!
//! An [`Assembly`] is the member table of one compiled module: its types, each with its methods
//! in metadata enumeration order. It is produced either by the in-process compiler through an
//! [`AssemblyBuilder`] or by reading a PE image with [`Assembly::from_file`] /
//! [`Assembly::from_mem`].

mod builder;
mod loader;

pub use builder::AssemblyBuilder;

use std::path::Path;

use crate::{
    file::File,
    metadata::{
        method::MethodDefinition,
        tables::TableId,
        token::Token,
        typesystem::TypeDefinition,
    },
    Result,
};

/// A compiled module: types and methods addressable by token.
#[derive(Debug, Clone)]
pub struct Assembly {
    name: String,
    types: Vec<TypeDefinition>,
    methods: Vec<MethodDefinition>,
}

impl Assembly {
    /// Reads the module at `path`. The assembly is named after the file stem.
    ///
    /// # Errors
    /// Returns an error if the file is not a .NET PE image or its metadata is damaged.
    pub fn from_file(path: &Path) -> Result<Assembly> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file = File::from_file(path)?;
        loader::load(name, &file)
    }

    /// Reads a module held in memory.
    ///
    /// # Errors
    /// Returns an error if `data` is not a .NET PE image or its metadata is damaged.
    pub fn from_mem(name: &str, data: Vec<u8>) -> Result<Assembly> {
        let file = File::from_mem(data)?;
        loader::load(name.to_string(), &file)
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All types, in TypeDef order. The first entry is the `<Module>` pseudo type.
    #[must_use]
    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    /// All methods, in MethodDef order.
    #[must_use]
    pub fn methods(&self) -> &[MethodDefinition] {
        &self.methods
    }

    /// Looks up a type by TypeDef token.
    #[must_use]
    pub fn type_definition(&self, token: Token) -> Option<&TypeDefinition> {
        if !token.is_table(TableId::TypeDef) || token.row() == 0 {
            return None;
        }
        self.types.get(token.row() as usize - 1)
    }

    /// Looks up a method by MethodDef token.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDefinition> {
        if !token.is_table(TableId::MethodDef) || token.row() == 0 {
            return None;
        }
        self.methods.get(token.row() as usize - 1)
    }

    /// Finds a top-level type by namespace and metadata name (`` Name`N `` for generics).
    #[must_use]
    pub fn find_type(&self, namespace: &str, name: &str) -> Option<&TypeDefinition> {
        self.types
            .iter()
            .find(|ty| ty.enclosing.is_none() && ty.namespace == namespace && ty.name == name)
    }

    /// Finds a type by its full name, e.g. `N.Outer+Inner`.
    #[must_use]
    pub fn find_type_by_full_name(&self, full_name: &str) -> Option<&TypeDefinition> {
        let mut segments = full_name.split('+');
        let top = segments.next()?;
        let (namespace, name) = top.rsplit_once('.').unwrap_or(("", top));

        let mut current = self.find_type(namespace, name)?;
        for nested in segments {
            current = self.nested_type(current.token, nested)?;
        }
        Some(current)
    }

    /// Finds a type directly nested in `enclosing` by metadata name.
    #[must_use]
    pub fn nested_type(&self, enclosing: Token, name: &str) -> Option<&TypeDefinition> {
        self.type_definition(enclosing)?
            .nested
            .iter()
            .filter_map(|token| self.type_definition(*token))
            .find(|ty| ty.name == name)
    }

    /// Methods declared by `ty`, in metadata enumeration order.
    pub fn declared_methods(&self, ty: Token) -> impl Iterator<Item = &MethodDefinition> + '_ {
        self.type_definition(ty)
            .map(|ty| ty.methods.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|token| self.method(*token))
    }

    /// Full reflection-style name of a type: namespace-qualified, nested types joined with `+`.
    #[must_use]
    pub fn type_full_name(&self, token: Token) -> String {
        let Some(ty) = self.type_definition(token) else {
            return token.to_string();
        };

        match ty.enclosing {
            Some(enclosing) => format!("{}+{}", self.type_full_name(enclosing), ty.name),
            None if ty.namespace.is_empty() => ty.name.clone(),
            None => format!("{}.{}", ty.namespace, ty.name),
        }
    }

    /// `DeclaringType.Name` of a method.
    #[must_use]
    pub fn method_display_name(&self, token: Token) -> String {
        match self.method(token) {
            Some(method) => format!(
                "{}.{}",
                self.type_full_name(method.declaring_type),
                method.name
            ),
            None => token.to_string(),
        }
    }

    /// `ReturnType DeclaringType.Name(Params)` of a method.
    #[must_use]
    pub fn method_signature_text(&self, token: Token) -> String {
        match self.method(token) {
            Some(method) => format!(
                "{} {}({})",
                method.signature.return_type,
                self.method_display_name(token),
                method.signature.params.join(", ")
            ),
            None => token.to_string(),
        }
    }
}
