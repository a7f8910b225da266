use crate::metadata::{
    assembly::Assembly,
    method::MethodDefinition,
    tables::TableId,
    token::Token,
    typesystem::TypeDefinition,
};

/// Builds an [`Assembly`] row by row.
///
/// Types and methods receive consecutive TypeDef / MethodDef tokens in the order they are
/// added, the same way a compiler numbers the rows it emits. Row 1 of the TypeDef table is
/// always the `<Module>` pseudo type.
pub struct AssemblyBuilder {
    name: String,
    types: Vec<TypeDefinition>,
    methods: Vec<MethodDefinition>,
}

impl AssemblyBuilder {
    /// Starts a new module called `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut builder = AssemblyBuilder {
            name: name.to_string(),
            types: Vec::new(),
            methods: Vec::new(),
        };
        builder.add_type("", "<Module>", 0, None, Vec::new());
        builder
    }

    /// Adds a type and returns its token. A nested type is linked into `enclosing`.
    ///
    /// `generic_params` must list every type parameter in scope, inherited ones first.
    pub fn add_type(
        &mut self,
        namespace: &str,
        name: &str,
        flags: u32,
        enclosing: Option<Token>,
        generic_params: Vec<String>,
    ) -> Token {
        let row = u32::try_from(self.types.len() + 1).unwrap_or(u32::MAX);
        let token = Token::from_parts(TableId::TypeDef, row);

        if let Some(parent) = enclosing.and_then(|parent| self.type_mut(parent)) {
            parent.nested.push(token);
        }

        self.types.push(TypeDefinition {
            token,
            name: name.to_string(),
            namespace: namespace.to_string(),
            flags,
            enclosing,
            generic_params,
            methods: Vec::new(),
            nested: Vec::new(),
            compiler_generated: false,
        });
        token
    }

    /// Adds `method` to `declaring` and returns the method's token.
    pub fn add_method(&mut self, declaring: Token, mut method: MethodDefinition) -> Token {
        let row = u32::try_from(self.methods.len() + 1).unwrap_or(u32::MAX);
        let token = Token::from_parts(TableId::MethodDef, row);

        method.token = token;
        method.declaring_type = declaring;
        if let Some(ty) = self.type_mut(declaring) {
            ty.methods.push(token);
        }

        self.methods.push(method);
        token
    }

    /// Marks a type as compiler generated.
    pub fn mark_type_compiler_generated(&mut self, ty: Token) {
        if let Some(ty) = self.type_mut(ty) {
            ty.compiler_generated = true;
        }
    }

    /// Looks up a type added earlier.
    #[must_use]
    pub fn type_definition(&self, token: Token) -> Option<&TypeDefinition> {
        let index = (token.row() as usize).checked_sub(1)?;
        self.types.get(index)
    }

    /// Methods added so far.
    #[must_use]
    pub fn methods(&self) -> &[MethodDefinition] {
        &self.methods
    }

    /// Finishes the module.
    #[must_use]
    pub fn build(self) -> Assembly {
        Assembly {
            name: self.name,
            types: self.types,
            methods: self.methods,
        }
    }

    fn type_mut(&mut self, token: Token) -> Option<&mut TypeDefinition> {
        let index = (token.row() as usize).checked_sub(1)?;
        self.types.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::MethodSignature;

    #[test]
    fn tokens_are_sequential() {
        let mut builder = AssemblyBuilder::new("m");
        let a = builder.add_type("", "A", 0, None, Vec::new());
        let b = builder.add_type("", "B", 0, Some(a), Vec::new());
        assert_eq!(a, Token::new(0x0200_0002));
        assert_eq!(b, Token::new(0x0200_0003));

        let m1 = builder.add_method(b, MethodDefinition::new("X", MethodSignature::void(false)));
        let m2 = builder.add_method(a, MethodDefinition::new("Y", MethodSignature::void(true)));
        assert_eq!(m1, Token::new(0x0600_0001));
        assert_eq!(m2, Token::new(0x0600_0002));

        builder.mark_type_compiler_generated(b);
        let assembly = builder.build();
        assert_eq!(assembly.type_definition(a).unwrap().nested, vec![b]);
        assert_eq!(assembly.type_definition(a).unwrap().methods, vec![m2]);
        assert!(assembly.type_definition(b).unwrap().compiler_generated);
        assert!(assembly.method(m1).unwrap().is_static());
        assert!(!assembly.method(m2).unwrap().is_static());
    }
}
