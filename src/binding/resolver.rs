use std::collections::{HashMap, VecDeque};

use log::{debug, info, warn};

use crate::{
    binding::collector::{DeclarationKind, DeclarationNode},
    metadata::{
        assembly::Assembly, method::MethodDefinition, token::Token,
        typesystem::generic_arity_name,
    },
    Result,
};

/// A resolved declaration: the compiled member and the resolved nested declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberNode {
    /// TypeDef token for types, MethodDef token for everything else
    pub token: Token,
    /// Resolved children, in the order of the declaration's children
    pub children: Vec<MemberNode>,
}

impl MemberNode {
    /// Total number of nodes in this subtree, the node itself included.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(MemberNode::count).sum::<usize>()
    }
}

/// The name a compiled method is grouped under.
///
/// Explicit interface implementations lose their qualification (`N.IFoo<System.Int32>.M` → `M`)
/// and generic methods get a `` `N `` arity suffix, so the result matches
/// [`DeclarationNode::canonical_name`] for the declaration the method was compiled from.
#[must_use]
pub fn canonical_member_name(method: &MethodDefinition) -> String {
    let name = if method.name.starts_with('.') {
        method.name.as_str()
    } else {
        method
            .name
            .rsplit_once('.')
            .map_or(method.name.as_str(), |(_, plain)| plain)
    };
    generic_arity_name(name, method.signature.generic_param_count as usize)
}

/// FIFO queues of a type's methods, keyed by canonical name.
///
/// Queue order is the module's method enumeration order, which for members that share a name
/// is their declaration order.
#[derive(Debug, Clone, Default)]
pub struct MethodNameGroups {
    queues: HashMap<String, VecDeque<Token>>,
}

impl MethodNameGroups {
    /// Groups the methods declared by `ty`, leaving out compiler-generated ones.
    #[must_use]
    pub fn build(assembly: &Assembly, ty: Token) -> Self {
        let mut queues: HashMap<String, VecDeque<Token>> = HashMap::new();
        for method in assembly
            .declared_methods(ty)
            .filter(|method| !method.compiler_generated)
        {
            queues
                .entry(canonical_member_name(method))
                .or_default()
                .push_back(method.token);
        }
        MethodNameGroups { queues }
    }

    /// Takes the next method called `name`.
    pub fn dequeue(&mut self, name: &str) -> Option<Token> {
        self.queues.get_mut(name)?.pop_front()
    }

    /// Number of methods called `name` not yet taken.
    #[must_use]
    pub fn remaining(&self, name: &str) -> usize {
        self.queues.get(name).map_or(0, VecDeque::len)
    }
}

/// Matches a declaration forest against a compiled module.
///
/// Members are matched positionally: each declaration takes the next compiled method with the
/// same canonical name. No signatures are compared. The name groups of a type are built on
/// first use and kept for the resolver's lifetime, so several partial declarations of one type
/// consume the same queues.
pub struct MemberResolver<'a> {
    assembly: &'a Assembly,
    groups: HashMap<Token, MethodNameGroups>,
}

impl<'a> MemberResolver<'a> {
    /// Creates a resolver for `assembly`.
    #[must_use]
    pub fn new(assembly: &'a Assembly) -> Self {
        MemberResolver {
            assembly,
            groups: HashMap::new(),
        }
    }

    /// Resolves every declaration in `forest`. The result has the same shape as the input.
    ///
    /// # Errors
    /// Returns [`crate::Error::Resolution`] when a type cannot be found or a name queue runs
    /// dry, meaning the forest and the module disagree.
    pub fn resolve(&mut self, forest: &[DeclarationNode]) -> Result<Vec<MemberNode>> {
        let mut resolved = Vec::with_capacity(forest.len());
        for node in forest {
            let DeclarationKind::Type { namespace, .. } = &node.kind else {
                return Err(resolution_error!(
                    "Top-level declaration '{}' is not a type",
                    node
                ));
            };

            let name = node.canonical_name();
            let ty = self.assembly.find_type(namespace, &name).ok_or_else(|| {
                resolution_error!(
                    "Type '{}' not found in module '{}'",
                    node,
                    self.assembly.name()
                )
            })?;
            resolved.push(self.resolve_type(ty.token, node)?);
        }

        info!(
            "Resolved {} members",
            resolved.iter().map(MemberNode::count).sum::<usize>()
        );
        Ok(resolved)
    }

    fn resolve_type(&mut self, ty: Token, node: &DeclarationNode) -> Result<MemberNode> {
        debug!("Resolving members of {}", self.assembly.type_full_name(ty));

        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let resolved = if child.is_type() {
                let name = child.canonical_name();
                let nested = self.assembly.nested_type(ty, &name).ok_or_else(|| {
                    resolution_error!(
                        "Nested type '{}' not found in '{}'",
                        name,
                        self.assembly.type_full_name(ty)
                    )
                })?;
                self.resolve_type(nested.token, child)?
            } else {
                MemberNode {
                    token: self.resolve_member(ty, child)?,
                    children: Vec::new(),
                }
            };
            children.push(resolved);
        }

        Ok(MemberNode {
            token: ty,
            children,
        })
    }

    fn resolve_member(&mut self, ty: Token, node: &DeclarationNode) -> Result<Token> {
        let assembly = self.assembly;
        let name = node.canonical_name();
        let groups = self
            .groups
            .entry(ty)
            .or_insert_with(|| MethodNameGroups::build(assembly, ty));

        let token = groups.dequeue(&name).ok_or_else(|| {
            resolution_error!(
                "No compiled member left for '{}' in '{}'",
                node,
                assembly.type_full_name(ty)
            )
        })?;
        let left = groups.remaining(&name);

        if let (Some(method), Some(expected)) = (assembly.method(token), node.param_count()) {
            if method.signature.params.len() != expected {
                warn!(
                    "'{}' declares {} parameters but matched {} with {}",
                    node,
                    expected,
                    assembly.method_signature_text(token),
                    method.signature.params.len()
                );
            }
        }

        debug!("Resolved {} to {} ({} '{}' left)", node, token, left, name);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binding::collect_declarations,
        compiler::{CompileOptions, Compiler, MetadataCompiler},
        metadata::{assembly::AssemblyBuilder, method::MethodSignature},
        syntax, Error,
    };

    fn resolve(source: &str) -> (Assembly, Vec<DeclarationNode>, Vec<MemberNode>) {
        let tree = syntax::parse(source).unwrap();
        let assembly = MetadataCompiler::new()
            .compile("test", &tree, &CompileOptions::default())
            .unwrap();
        let forest = collect_declarations(tree.root());
        let resolved = MemberResolver::new(&assembly).resolve(&forest).unwrap();
        (assembly, forest, resolved)
    }

    fn same_shape(declared: &[DeclarationNode], resolved: &[MemberNode]) -> bool {
        declared.len() == resolved.len()
            && declared
                .iter()
                .zip(resolved)
                .all(|(d, r)| same_shape(&d.children, &r.children))
    }

    #[test]
    fn canonical_names() {
        let mut method = MethodDefinition::new("N.IFoo<System.Int32>.M", MethodSignature::void(true));
        assert_eq!(canonical_member_name(&method), "M");

        method.name = ".cctor".to_string();
        assert_eq!(canonical_member_name(&method), ".cctor");

        method.name = "Map".to_string();
        method.signature.generic_param_count = 2;
        assert_eq!(canonical_member_name(&method), "Map`2");

        method.name = "N.IList<System.Collections.Generic.List`1[T]>.get_Item".to_string();
        method.signature.generic_param_count = 0;
        assert_eq!(canonical_member_name(&method), "get_Item");
    }

    #[test]
    fn overloads_resolve_in_declaration_order() {
        let (assembly, forest, resolved) =
            resolve("class C { void M(int i){} long M(string s){return 0;} }");
        assert!(same_shape(&forest, &resolved));

        let methods: Vec<&MethodDefinition> = resolved[0]
            .children
            .iter()
            .map(|node| assembly.method(node.token).unwrap())
            .collect();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].signature.params, ["System.Int32"]);
        assert_eq!(methods[1].signature.params, ["System.String"]);
        assert_eq!(methods[1].signature.return_type, "System.Int64");
    }

    #[test]
    fn constructors_accessors_and_explicit_members() {
        let (assembly, forest, resolved) = resolve(
            "namespace N {
                interface IFoo { void M(); }
                class C : IFoo {
                    public C() { }
                    public C(int x) : this() { }
                    static C() { }
                    public int this[int i] { get { return i; } set { } }
                    public int Auto { get; set; }
                    public void M() { }
                    void IFoo.M() { }
                }
            }",
        );
        assert!(same_shape(&forest, &resolved));

        let names: Vec<String> = resolved[0]
            .children
            .iter()
            .map(|node| assembly.method_display_name(node.token))
            .collect();
        assert_eq!(
            names,
            [
                "N.C..ctor",
                "N.C..ctor",
                "N.C..cctor",
                "N.C.get_Item",
                "N.C.set_Item",
                "N.C.M",
                "N.C.N.IFoo.M",
            ]
        );

        let ctor = assembly.method(resolved[0].children[1].token).unwrap();
        assert_eq!(ctor.signature.params, ["System.Int32"]);
    }

    #[test]
    fn nested_and_generic_types() {
        let (assembly, forest, resolved) = resolve(
            "class Outer {
                class Inner<T> { void A() { } U B<U>(U u) => u; }
                void C() { }
            }",
        );
        assert!(same_shape(&forest, &resolved));
        assert_eq!(resolved[0].count(), 5);

        let inner = &resolved[0].children[0];
        assert_eq!(assembly.type_full_name(inner.token), "Outer+Inner`1");
        let b = assembly.method(inner.children[1].token).unwrap();
        assert_eq!(b.name, "B");
        assert!(b.is_generic_method_definition());
    }

    #[test]
    fn partial_declarations_share_queues() {
        let (assembly, forest, resolved) = resolve(
            "partial class P { void M(int a) { } }
             partial class P { void M(string b) { } }",
        );
        assert_eq!(forest.len(), 2);
        assert_eq!(resolved[0].token, resolved[1].token);

        let first = assembly.method(resolved[0].children[0].token).unwrap();
        let second = assembly.method(resolved[1].children[0].token).unwrap();
        assert_eq!(first.signature.params, ["System.Int32"]);
        assert_eq!(second.signature.params, ["System.String"]);
    }

    #[test]
    fn diverged_module_is_a_fault() {
        let tree = syntax::parse("class C { void M() { } void M(int x) { } class D { } }").unwrap();
        let forest = collect_declarations(tree.root());

        let mut builder = AssemblyBuilder::new("test");
        let class = builder.add_type("", "C", 0, None, Vec::new());
        builder.add_method(class, MethodDefinition::new("M", MethodSignature::void(true)));
        let assembly = builder.build();

        match MemberResolver::new(&assembly).resolve(&forest) {
            Err(Error::Resolution(message)) => assert!(message.contains("'M'")),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut builder = AssemblyBuilder::new("test");
        let class = builder.add_type("", "C", 0, None, Vec::new());
        builder.add_method(class, MethodDefinition::new("M", MethodSignature::void(true)));
        builder.add_method(class, MethodDefinition::new("M", MethodSignature::void(true)));
        let assembly = builder.build();

        match MemberResolver::new(&assembly).resolve(&forest) {
            Err(Error::Resolution(message)) => assert!(message.contains("Nested type 'D'")),
            other => panic!("unexpected result: {other:?}"),
        }

        let assembly = AssemblyBuilder::new("empty").build();
        assert!(matches!(
            MemberResolver::new(&assembly).resolve(&forest),
            Err(Error::Resolution(_))
        ));
    }

    #[test]
    fn compiler_generated_members_are_not_queued() {
        let mut builder = AssemblyBuilder::new("test");
        let class = builder.add_type("", "C", 0, None, Vec::new());
        let mut generated = MethodDefinition::new("get_P", MethodSignature::void(true));
        generated.compiler_generated = true;
        builder.add_method(class, generated);
        let user = builder.add_method(class, MethodDefinition::new("get_P", MethodSignature::void(true)));
        let assembly = builder.build();

        let mut groups = MethodNameGroups::build(&assembly, class);
        assert_eq!(groups.remaining("get_P"), 1);
        assert_eq!(groups.dequeue("get_P"), Some(user));
        assert_eq!(groups.dequeue("get_P"), None);
        assert_eq!(groups.remaining("missing"), 0);
    }
}
