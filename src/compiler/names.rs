//! Binding type names written in source to CLR type names.

use crate::{
    metadata::typesystem::{generic_arity_name, keyword_clr_name, keyword_is_value_type},
    syntax::ast::{
        CompilationUnit, MemberDecl, NameSegment, NamespaceMember, TypeDecl, TypeKind, TypeSyntax,
    },
};

/// A type declared somewhere in the compilation unit.
#[derive(Debug, Clone)]
pub(super) struct DeclaredType {
    pub namespace: String,
    pub name: String,
    pub arity: usize,
    pub kind: TypeKind,
    pub enclosing: Option<usize>,
}

/// Collects every type declaration of `unit` in pre-order.
///
/// The emitter visits declarations in the same order, so the n-th type it meets is entry n.
pub(super) fn declared_types(unit: &CompilationUnit) -> Vec<DeclaredType> {
    let mut types = Vec::new();
    collect_namespace(&unit.members, "", &mut types);
    types
}

fn collect_namespace(members: &[NamespaceMember], namespace: &str, types: &mut Vec<DeclaredType>) {
    for member in members {
        match member {
            NamespaceMember::Namespace(decl) => {
                let nested = qualify(namespace, &decl.name);
                collect_namespace(&decl.members, &nested, types);
            }
            NamespaceMember::Type(decl) => {
                collect_type(decl, namespace, None, types);
            }
        }
    }
}

fn collect_type(
    decl: &TypeDecl,
    namespace: &str,
    enclosing: Option<usize>,
    types: &mut Vec<DeclaredType>,
) {
    let index = types.len();
    types.push(DeclaredType {
        namespace: namespace.to_string(),
        name: decl.name.clone(),
        arity: decl.arity(),
        kind: decl.kind,
        enclosing,
    });

    for member in &decl.members {
        if let MemberDecl::Type(nested) = member {
            collect_type(nested, namespace, Some(index), types);
        }
    }
}

/// Joins a namespace and a name with a dot, leaving out an empty namespace.
pub(super) fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// The names visible at one point of the source.
#[derive(Debug, Clone)]
pub(super) struct TypeScope<'a> {
    types: &'a [DeclaredType],
    namespace: String,
    usings: Vec<String>,
    enclosing: Option<usize>,
    type_params: Vec<String>,
}

impl<'a> TypeScope<'a> {
    /// Scope at the top of a file.
    pub fn new(types: &'a [DeclaredType]) -> Self {
        TypeScope {
            types,
            namespace: String::new(),
            usings: Vec::new(),
            enclosing: None,
            type_params: Vec::new(),
        }
    }

    /// Scope inside namespace `name`, relative to this scope's namespace.
    pub fn enter_namespace(&self, name: &str) -> Self {
        let mut scope = self.clone();
        scope.namespace = qualify(&self.namespace, name);
        scope
    }

    /// Adds imported namespaces; `using static` and aliases are handled by the caller.
    pub fn import(&mut self, namespace: &str) {
        self.usings.push(namespace.to_string());
    }

    /// Scope inside the declared type at `index`.
    pub fn enter_type(&self, index: usize, type_params: &[String]) -> Self {
        let mut scope = self.clone();
        scope.enclosing = Some(index);
        scope.type_params.extend(type_params.iter().cloned());
        scope
    }

    /// Scope inside a generic method.
    pub fn with_method_params(&self, type_params: &[String]) -> Self {
        let mut scope = self.clone();
        scope.type_params.extend(type_params.iter().cloned());
        scope
    }

    /// Current namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Metadata full name of a declared type: `Ns.Outer+Inner`1`.
    pub fn full_name(&self, index: usize) -> String {
        let Some(ty) = self.types.get(index) else {
            return String::new();
        };

        let name = generic_arity_name(&ty.name, ty.arity);
        match ty.enclosing {
            Some(enclosing) => format!("{}+{name}", self.full_name(enclosing)),
            None => qualify(&ty.namespace, &name),
        }
    }

    /// C# display name of a declared type, nested types joined with dots.
    fn display_name(&self, index: usize) -> String {
        let Some(ty) = self.types.get(index) else {
            return String::new();
        };

        match ty.enclosing {
            Some(enclosing) => format!("{}.{}", self.display_name(enclosing), ty.name),
            None => qualify(&ty.namespace, &ty.name),
        }
    }

    /// Renders `ty` as a CLR type name, e.g. `` System.Collections.Generic.List`1[System.Int32] ``.
    pub fn clr_name(&self, ty: &TypeSyntax) -> String {
        match ty {
            TypeSyntax::Predefined(keyword) => keyword_clr_name(keyword)
                .map(str::to_string)
                .unwrap_or_else(|| keyword.clone()),
            TypeSyntax::Named { segments, .. } => {
                if let [segment] = segments.as_slice() {
                    if segment.args.is_empty() && self.type_params.contains(&segment.name) {
                        return segment.name.clone();
                    }
                }

                let base = match self.lookup(segments) {
                    Some(index) => self.full_name(index),
                    None => segments
                        .iter()
                        .map(|segment| generic_arity_name(&segment.name, segment.args.len()))
                        .collect::<Vec<_>>()
                        .join("."),
                };
                self.with_arguments(base, segments)
            }
            TypeSyntax::Array { element, rank } => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                format!("{}[{commas}]", self.clr_name(element))
            }
            TypeSyntax::Nullable(inner) if self.is_value_type(inner) => {
                format!("System.Nullable`1[{}]", self.clr_name(inner))
            }
            TypeSyntax::Nullable(inner) => self.clr_name(inner),
            TypeSyntax::Pointer(inner) => format!("{}*", self.clr_name(inner)),
            TypeSyntax::Tuple(elements) => self.tuple_name(elements),
        }
    }

    /// Renders the interface of an explicit implementation the way C# prefixes member names:
    /// `Ns.IFoo<System.Int32>` for declared interfaces, the source text otherwise.
    pub fn interface_name(&self, ty: &TypeSyntax) -> String {
        let TypeSyntax::Named { segments, .. } = ty else {
            return ty.to_string();
        };
        let Some(index) = self.lookup(segments) else {
            return ty.to_string();
        };

        let args: Vec<String> = segments
            .iter()
            .flat_map(|segment| segment.args.iter())
            .map(|arg| self.clr_name(arg))
            .collect();
        if args.is_empty() {
            self.display_name(index)
        } else {
            format!("{}<{}>", self.display_name(index), args.join(","))
        }
    }

    fn with_arguments(&self, base: String, segments: &[NameSegment]) -> String {
        let args: Vec<String> = segments
            .iter()
            .flat_map(|segment| segment.args.iter())
            .map(|arg| self.clr_name(arg))
            .collect();
        if args.is_empty() {
            base
        } else {
            format!("{base}[{}]", args.join(","))
        }
    }

    fn tuple_name(&self, elements: &[TypeSyntax]) -> String {
        const MAX_ELEMENTS: usize = 7;

        let mut args: Vec<String> = elements
            .iter()
            .take(MAX_ELEMENTS)
            .map(|element| self.clr_name(element))
            .collect();
        if elements.len() > MAX_ELEMENTS {
            args.push(self.tuple_name(&elements[MAX_ELEMENTS..]));
        }
        format!("System.ValueTuple`{}[{}]", args.len(), args.join(","))
    }

    /// Returns `true` if `ty` is a value type: a value keyword, or a declared struct or enum.
    pub fn is_value_type(&self, ty: &TypeSyntax) -> bool {
        match ty {
            TypeSyntax::Predefined(keyword) => keyword_is_value_type(keyword),
            TypeSyntax::Named { segments, .. } => self
                .lookup(segments)
                .and_then(|index| self.types.get(index))
                .is_some_and(|declared| matches!(declared.kind, TypeKind::Struct | TypeKind::Enum)),
            TypeSyntax::Nullable(_) | TypeSyntax::Tuple(_) => true,
            TypeSyntax::Array { .. } | TypeSyntax::Pointer(_) => false,
        }
    }

    /// Binds a dotted name to a declared type.
    fn lookup(&self, segments: &[NameSegment]) -> Option<usize> {
        let (first, rest) = segments.split_first()?;

        if let Some(found) = self.lookup_simple(first) {
            if let Some(found) = self.lookup_nested(found, rest) {
                return Some(found);
            }
        }

        // A namespace prefix, absolute or relative to one of the enclosing namespaces
        for split in 1..segments.len() {
            let written = segments[..split]
                .iter()
                .map(|segment| segment.name.as_str())
                .collect::<Vec<_>>()
                .join(".");

            for namespace in self.enclosing_namespaces() {
                let namespace = qualify(namespace, &written);
                let top = &segments[split];
                let Some(found) = self.find_top_level(&namespace, top) else {
                    continue;
                };
                if let Some(found) = self.lookup_nested(found, &segments[split + 1..]) {
                    return Some(found);
                }
            }
        }

        None
    }

    fn lookup_simple(&self, segment: &NameSegment) -> Option<usize> {
        let arity = segment.args.len();

        let mut enclosing = self.enclosing;
        while let Some(current) = enclosing {
            if let Some(found) = self.find_nested(current, &segment.name, arity) {
                return Some(found);
            }
            enclosing = self.types.get(current)?.enclosing;
        }

        for namespace in self.enclosing_namespaces() {
            if let Some(found) = self.find_top_level(namespace, segment) {
                return Some(found);
            }
        }

        self.usings
            .iter()
            .find_map(|namespace| self.find_top_level(namespace, segment))
    }

    fn lookup_nested(&self, mut current: usize, rest: &[NameSegment]) -> Option<usize> {
        for segment in rest {
            current = self.find_nested(current, &segment.name, segment.args.len())?;
        }
        Some(current)
    }

    /// The current namespace and each of its parents, ending with the global namespace.
    fn enclosing_namespaces(&self) -> Vec<&str> {
        let mut namespaces = vec![self.namespace.as_str()];
        let mut current = self.namespace.as_str();
        while let Some((parent, _)) = current.rsplit_once('.') {
            namespaces.push(parent);
            current = parent;
        }
        if !current.is_empty() {
            namespaces.push("");
        }
        namespaces
    }

    fn find_top_level(&self, namespace: &str, segment: &NameSegment) -> Option<usize> {
        self.types.iter().position(|ty| {
            ty.enclosing.is_none()
                && ty.namespace == namespace
                && ty.name == segment.name
                && ty.arity == segment.args.len()
        })
    }

    fn find_nested(&self, enclosing: usize, name: &str, arity: usize) -> Option<usize> {
        self.types.iter().position(|ty| {
            ty.enclosing == Some(enclosing) && ty.name == name && ty.arity == arity
        })
    }
}
