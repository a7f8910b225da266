use log::warn;

use crate::{
    binding::MemberNode,
    metadata::{assembly::Assembly, tables::TableId, token::Token},
    runtime::ExecutionHost,
    Result,
};

/// A node of the disassembly forest, one per resolved member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisassemblyNode {
    /// A closed type; renders its children
    Type {
        /// TypeDef token
        token: Token,
        /// Nested types and members in declaration order
        children: Vec<DisassemblyNode>,
    },
    /// A method, constructor or accessor with native code to list
    Method {
        /// MethodDef token
        token: Token,
    },
    /// A type with unbound type parameters; renders a single diagnostic line
    OpenGenericType {
        /// TypeDef token
        token: Token,
        /// Nested types and members, kept for shape but never rendered
        children: Vec<DisassemblyNode>,
    },
    /// A method with unbound type parameters; renders a single diagnostic line
    OpenGenericMethod {
        /// MethodDef token
        token: Token,
    },
}

impl DisassemblyNode {
    /// The member this node stands for.
    #[must_use]
    pub fn token(&self) -> Token {
        match self {
            DisassemblyNode::Type { token, .. }
            | DisassemblyNode::Method { token }
            | DisassemblyNode::OpenGenericType { token, .. }
            | DisassemblyNode::OpenGenericMethod { token } => *token,
        }
    }

    /// Child nodes; empty for methods.
    #[must_use]
    pub fn children(&self) -> &[DisassemblyNode] {
        match self {
            DisassemblyNode::Type { children, .. }
            | DisassemblyNode::OpenGenericType { children, .. } => children,
            DisassemblyNode::Method { .. } | DisassemblyNode::OpenGenericMethod { .. } => &[],
        }
    }

    /// Returns `true` for open generic placeholders.
    #[must_use]
    pub fn is_open_generic(&self) -> bool {
        matches!(
            self,
            DisassemblyNode::OpenGenericType { .. } | DisassemblyNode::OpenGenericMethod { .. }
        )
    }

    /// Total number of nodes in this subtree, the node itself included.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(DisassemblyNode::count)
            .sum::<usize>()
    }
}

/// Maps a resolved member forest to a [`DisassemblyNode`] forest of the same shape.
///
/// Every method of a closed type that is neither abstract nor generic is prepared through the
/// [`ExecutionHost`] while the forest is built, so that the runtime has native code for it by the
/// time it is rendered. Members of open generic types are never prepared.
pub struct DisassemblyTreeBuilder<'a> {
    assembly: &'a Assembly,
    host: &'a dyn ExecutionHost,
}

impl<'a> DisassemblyTreeBuilder<'a> {
    /// Creates a builder for members of `assembly`, prepared through `host`.
    #[must_use]
    pub fn new(assembly: &'a Assembly, host: &'a dyn ExecutionHost) -> Self {
        DisassemblyTreeBuilder { assembly, host }
    }

    /// Builds the disassembly forest for `members`.
    ///
    /// A member the runtime refuses to prepare is still part of the forest; rendering reports
    /// it as not compiled.
    ///
    /// # Errors
    /// Returns [`crate::Error::Resolution`] if a token does not name a type or method of the
    /// assembly.
    pub fn build(&self, members: &[MemberNode]) -> Result<Vec<DisassemblyNode>> {
        members
            .iter()
            .map(|member| self.node(member, true))
            .collect()
    }

    fn node(&self, member: &MemberNode, prepare: bool) -> Result<DisassemblyNode> {
        let token = member.token;

        if token.is_table(TableId::TypeDef) {
            let Some(ty) = self.assembly.type_definition(token) else {
                return Err(resolution_error!("Type {} is not part of the module", token));
            };

            let open = ty.is_generic_type_definition();
            let children = member
                .children
                .iter()
                .map(|child| self.node(child, prepare && !open))
                .collect::<Result<Vec<_>>>()?;

            return Ok(if open {
                DisassemblyNode::OpenGenericType { token, children }
            } else {
                DisassemblyNode::Type { token, children }
            });
        }

        let Some(method) = self.assembly.method(token) else {
            return Err(resolution_error!("Method {} is not part of the module", token));
        };

        if method.is_generic_method_definition() {
            return Ok(DisassemblyNode::OpenGenericMethod { token });
        }

        if prepare && !method.is_abstract() {
            if let Err(error) = self.host.prepare_method(self.assembly, token) {
                warn!(
                    "Failed to prepare {}: {}",
                    self.assembly.method_display_name(token),
                    error
                );
            }
        }

        Ok(DisassemblyNode::Method { token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binding::{collect_declarations, MemberResolver},
        compiler::{CompileOptions, Compiler, MetadataCompiler},
        runtime::{Architecture, RuntimeSnapshot},
        syntax, Error,
    };

    fn compile(source: &str) -> (Assembly, Vec<MemberNode>) {
        let tree = syntax::parse(source).unwrap();
        let assembly = MetadataCompiler::new()
            .compile("tree", &tree, &CompileOptions::default())
            .unwrap();
        let resolved = MemberResolver::new(&assembly)
            .resolve(&collect_declarations(tree.root()))
            .unwrap();
        (assembly, resolved)
    }

    fn count(nodes: &[MemberNode]) -> usize {
        nodes.iter().map(MemberNode::count).sum()
    }

    #[test]
    fn shape_matches_resolution() {
        let (assembly, resolved) = compile(
            "class C {
                void M() { }
                class N { int P { get { return 1; } set { } } }
                static C() { }
            }",
        );
        let host = RuntimeSnapshot::builder(Architecture::X64).build();
        let forest = DisassemblyTreeBuilder::new(&assembly, &host)
            .build(&resolved)
            .unwrap();

        assert_eq!(forest.len(), 1);
        assert_eq!(
            forest.iter().map(DisassemblyNode::count).sum::<usize>(),
            count(&resolved)
        );
        assert!(matches!(forest[0], DisassemblyNode::Type { .. }));
        assert!(matches!(forest[0].children()[1], DisassemblyNode::Type { .. }));
        assert_eq!(forest[0].children()[1].children().len(), 2);
        assert_eq!(host.prepared_count(), 4);
        assert!(host.is_prepared(&assembly, forest[0].children()[0].token()));
    }

    #[test]
    fn open_generics() {
        let (assembly, resolved) = compile(
            "class G<T> { void M() { } }
             class C { T Id<T>(T t) => t; void N() { } }",
        );
        let host = RuntimeSnapshot::builder(Architecture::X64).build();
        let forest = DisassemblyTreeBuilder::new(&assembly, &host)
            .build(&resolved)
            .unwrap();

        assert!(matches!(forest[0], DisassemblyNode::OpenGenericType { .. }));
        assert_eq!(forest[0].children().len(), 1);
        assert!(matches!(
            forest[1].children()[0],
            DisassemblyNode::OpenGenericMethod { .. }
        ));
        assert!(forest[1].children()[0].is_open_generic());

        assert_eq!(host.prepared_count(), 1);
        assert!(host.is_prepared(&assembly, forest[1].children()[1].token()));
    }

    #[test]
    fn preparation_is_idempotent() {
        let (assembly, resolved) = compile("class C { void M() { } }");
        let host = RuntimeSnapshot::builder(Architecture::X86).build();
        let builder = DisassemblyTreeBuilder::new(&assembly, &host);

        let first = builder.build(&resolved).unwrap();
        let second = builder.build(&resolved).unwrap();
        assert_eq!(first, second);
        assert_eq!(host.prepared_count(), 1);
    }

    #[test]
    fn foreign_tokens() {
        let (assembly, _) = compile("class C { }");
        let host = RuntimeSnapshot::builder(Architecture::X64).build();
        let stray = MemberNode {
            token: Token::new(0x0600_0099),
            children: Vec::new(),
        };

        match DisassemblyTreeBuilder::new(&assembly, &host).build(&[stray]) {
            Err(Error::Resolution(message)) => assert!(message.contains("0x06000099")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
