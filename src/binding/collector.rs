use std::fmt;

use crate::{
    metadata::typesystem::generic_arity_name,
    syntax::ast::{
        AccessorDecl, AccessorKind, CompilationUnit, MemberDecl, Modifiers, NamespaceMember,
        Span, TypeDecl, TypeKind,
    },
};

/// What a [`DeclarationNode`] declares, with the identity needed to name its compiled member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    /// A class or struct
    Type {
        /// Namespace, empty for nested types and the global namespace
        namespace: String,
        /// Simple name
        name: String,
        /// Number of the type's own type parameters
        arity: usize,
    },
    /// An instance constructor or type initializer
    Constructor {
        /// `static`, i.e. the type initializer
        is_static: bool,
        /// Number of parameters
        param_count: usize,
    },
    /// A method with a body
    Method {
        /// Plain identifier, without interface qualification
        name: String,
        /// Number of the method's type parameters
        arity: usize,
        /// `IFoo<int>` of an explicit implementation, as written
        explicit_interface: Option<String>,
        /// Declared `static`
        is_static: bool,
        /// Number of parameters
        param_count: usize,
    },
    /// A property or indexer accessor with a body
    Accessor {
        /// Property name, `Item` for indexers
        property: String,
        /// `get`, `set` or `init`
        accessor: AccessorKind,
        /// Interface of an explicit implementation, as written
        explicit_interface: Option<String>,
        /// Number of parameters of the accessor method
        param_count: usize,
    },
}

/// One declaration eligible for disassembly.
///
/// Only type nodes have children: their nested types and members in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationNode {
    /// What is declared
    pub kind: DeclarationKind,
    /// Source range of the declaration
    pub span: Span,
    /// Nested declarations in source order
    pub children: Vec<DeclarationNode>,
}

impl DeclarationNode {
    /// Returns `true` for class and struct declarations.
    #[must_use]
    pub fn is_type(&self) -> bool {
        matches!(self.kind, DeclarationKind::Type { .. })
    }

    /// The name the node's compiled member is grouped under.
    ///
    /// Types use their metadata name (`` G`1 ``), constructors `.ctor` / `.cctor`, methods their
    /// identifier with a `` `N `` suffix when generic and accessors `get_P` / `set_P`.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        match &self.kind {
            DeclarationKind::Type { name, arity, .. }
            | DeclarationKind::Method { name, arity, .. } => generic_arity_name(name, *arity),
            DeclarationKind::Constructor { is_static: true, .. } => ".cctor".to_string(),
            DeclarationKind::Constructor { is_static: false, .. } => ".ctor".to_string(),
            DeclarationKind::Accessor {
                property, accessor, ..
            } => format!("{}{property}", accessor.method_prefix()),
        }
    }

    /// Number of parameters of a method-like node.
    #[must_use]
    pub fn param_count(&self) -> Option<usize> {
        match &self.kind {
            DeclarationKind::Type { .. } => None,
            DeclarationKind::Constructor { param_count, .. }
            | DeclarationKind::Method { param_count, .. }
            | DeclarationKind::Accessor { param_count, .. } => Some(*param_count),
        }
    }

    /// Total number of nodes in this subtree, the node itself included.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(DeclarationNode::count).sum::<usize>()
    }
}

impl fmt::Display for DeclarationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DeclarationKind::Type {
                namespace,
                name,
                arity,
            } => write!(f, "{}", qualify(namespace, &generic_arity_name(name, *arity))),
            DeclarationKind::Method {
                explicit_interface: Some(interface),
                ..
            }
            | DeclarationKind::Accessor {
                explicit_interface: Some(interface),
                ..
            } => write!(f, "{interface}.{}", self.canonical_name()),
            _ => write!(f, "{}", self.canonical_name()),
        }
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// Collects the declaration forest of a compilation unit.
///
/// The walk is pre-order and keeps source order. Classes and structs become type nodes;
/// interfaces, enums and delegates are skipped with everything inside them. Inside a type,
/// constructors are always collected, methods unless they are bodiless partial definitions,
/// and property and indexer accessors only when they have a body. An expression-bodied property
/// counts as its `get` accessor. Fields, events, operators and destructors are not collected.
#[must_use]
pub fn collect_declarations(unit: &CompilationUnit) -> Vec<DeclarationNode> {
    let mut forest = Vec::new();
    collect_namespace(&unit.members, "", &mut forest);
    forest
}

fn collect_namespace(members: &[NamespaceMember], namespace: &str, forest: &mut Vec<DeclarationNode>) {
    for member in members {
        match member {
            NamespaceMember::Namespace(decl) => {
                let nested = qualify(namespace, &decl.name);
                collect_namespace(&decl.members, &nested, forest);
            }
            NamespaceMember::Type(decl) => {
                if let Some(node) = collect_type(decl, namespace) {
                    forest.push(node);
                }
            }
        }
    }
}

fn collect_type(decl: &TypeDecl, namespace: &str) -> Option<DeclarationNode> {
    if !matches!(decl.kind, TypeKind::Class | TypeKind::Struct) {
        return None;
    }

    let mut children = Vec::new();
    for member in &decl.members {
        collect_member(member, &mut children);
    }

    Some(DeclarationNode {
        kind: DeclarationKind::Type {
            namespace: namespace.to_string(),
            name: decl.name.clone(),
            arity: decl.arity(),
        },
        span: decl.span.clone(),
        children,
    })
}

fn collect_member(member: &MemberDecl, children: &mut Vec<DeclarationNode>) {
    match member {
        MemberDecl::Type(nested) => children.extend(collect_type(nested, "")),
        MemberDecl::Constructor(decl) => children.push(DeclarationNode {
            kind: DeclarationKind::Constructor {
                is_static: decl.modifiers.contains(Modifiers::STATIC),
                param_count: decl.params.len(),
            },
            span: decl.span.clone(),
            children: Vec::new(),
        }),
        MemberDecl::Method(decl) => {
            if decl.body.is_none() && decl.modifiers.contains(Modifiers::PARTIAL) {
                return;
            }
            children.push(DeclarationNode {
                kind: DeclarationKind::Method {
                    name: decl.name.clone(),
                    arity: decl.type_params.len(),
                    explicit_interface: decl.explicit_interface.as_ref().map(ToString::to_string),
                    is_static: decl.modifiers.contains(Modifiers::STATIC),
                    param_count: decl.params.len(),
                },
                span: decl.span.clone(),
                children: Vec::new(),
            });
        }
        MemberDecl::Property(decl) => collect_accessors(
            &decl.name,
            decl.explicit_interface.as_ref().map(ToString::to_string),
            0,
            &decl.accessors,
            decl.expression_body.is_some(),
            &decl.span,
            children,
        ),
        MemberDecl::Indexer(decl) => collect_accessors(
            "Item",
            decl.explicit_interface.as_ref().map(ToString::to_string),
            decl.params.len(),
            &decl.accessors,
            decl.expression_body.is_some(),
            &decl.span,
            children,
        ),
        MemberDecl::Field(_)
        | MemberDecl::Destructor(_)
        | MemberDecl::Event(_)
        | MemberDecl::Operator(_) => {}
    }
}

fn collect_accessors(
    property: &str,
    explicit_interface: Option<String>,
    index_count: usize,
    accessors: &[AccessorDecl],
    expression_bodied: bool,
    span: &Span,
    children: &mut Vec<DeclarationNode>,
) {
    let accessor = |kind: AccessorKind, span: &Span| {
        let param_count = match kind {
            AccessorKind::Get => index_count,
            _ => index_count + 1,
        };
        DeclarationNode {
            kind: DeclarationKind::Accessor {
                property: property.to_string(),
                accessor: kind,
                explicit_interface: explicit_interface.clone(),
                param_count,
            },
            span: span.clone(),
            children: Vec::new(),
        }
    };

    if expression_bodied {
        children.push(accessor(AccessorKind::Get, span));
        return;
    }

    for decl in accessors.iter().filter(|decl| decl.body.is_some()) {
        if matches!(
            decl.kind,
            AccessorKind::Get | AccessorKind::Set | AccessorKind::Init
        ) {
            children.push(accessor(decl.kind, &decl.span));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax;

    fn forest(source: &str) -> Vec<DeclarationNode> {
        collect_declarations(syntax::parse(source).unwrap().root())
    }

    fn names(node: &DeclarationNode) -> Vec<String> {
        node.children.iter().map(DeclarationNode::canonical_name).collect()
    }

    #[test]
    fn overloads_and_constructors() {
        let forest = forest(
            "class C {
                static C() { }
                C(int x) { }
                void M(int i) { }
                long M(string s) { return 0; }
                T Id<T>(T t) => t;
            }",
        );
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].canonical_name(), "C");
        assert_eq!(names(&forest[0]), [".cctor", ".ctor", "M", "M", "Id`1"]);
        assert_eq!(forest[0].children[1].param_count(), Some(1));
        assert_eq!(forest[0].count(), 6);
    }

    #[test]
    fn interfaces_are_skipped() {
        assert!(forest("interface I { void M(); int P { get; } }").is_empty());

        let forest = forest(
            "interface I { void M(); }
             class C : I { public void M() { } void I.M() { } }",
        );
        assert_eq!(forest.len(), 1);
        assert_eq!(names(&forest[0]), ["M", "M"]);
        assert_eq!(forest[0].children[1].to_string(), "I.M");
    }

    #[test]
    fn accessors_need_a_body() {
        let forest = forest(
            "struct S {
                int a;
                public int Both { get { return a; } set { a = value; } }
                public int Auto { get; set; }
                public int Mixed { get; init { } }
                public int this[int i] { get => i; set { } }
                public int Expression => 1;
                public int Arrow { get => 1; }
            }",
        );
        assert_eq!(
            names(&forest[0]),
            [
                "get_Both",
                "set_Both",
                "set_Mixed",
                "get_Item",
                "set_Item",
                "get_Expression",
                "get_Arrow",
            ]
        );
        assert_eq!(forest[0].children[3].param_count(), Some(1));
        assert_eq!(forest[0].children[4].param_count(), Some(2));
    }

    #[test]
    fn nested_types_and_namespaces() {
        let forest = forest(
            "namespace A.B {
                class Outer<T> {
                    void Before() { }
                    class Inner { void M() { } }
                    enum E { X }
                    delegate void D();
                    interface I { void N(); }
                    void After() { }
                }
             }
             namespace A { struct S { } }",
        );
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].to_string(), "A.B.Outer`1");
        assert_eq!(names(&forest[0]), ["Before", "Inner", "After"]);
        assert!(forest[0].children[1].is_type());
        assert_eq!(names(&forest[0].children[1]), ["M"]);
        assert_eq!(forest[1].to_string(), "A.S");
    }

    #[test]
    fn excluded_members() {
        let forest = forest(
            "class C {
                partial void Hook();
                partial void Hook() { }
                event System.Action E;
                event System.Action F { add { } remove { } }
                public static C operator +(C a, C b) => a;
                ~C() { }
                const int K = 1;
            }",
        );
        assert_eq!(names(&forest[0]), ["Hook"]);
    }
}
