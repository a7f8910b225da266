//! In-process lowering of declarations into metadata.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::{
    compiler::{
        names::{declared_types, qualify, TypeScope},
        CompileOptions, Compiler,
    },
    diagnostics::{Diagnostic, Diagnostics, Location, Severity},
    metadata::{
        assembly::{Assembly, AssemblyBuilder},
        method::{
            MethodAccessFlags, MethodDefinition, MethodImplCodeType, MethodImplOptions,
            MethodModifiers, MethodSignature,
        },
        token::Token,
        typesystem::{generic_arity_name, TypeAttributes},
    },
    syntax::{
        ast::{
            AccessorDecl, AccessorKind, ConstructorDecl, DestructorDecl, EventDecl, FieldDecl,
            IndexerDecl, MemberDecl, MethodDecl, Modifiers, NamespaceMember, OperatorDecl,
            OperatorKind, Parameter, ParameterModifier, PropertyDecl, Span, TypeDecl, TypeKind,
            TypeSyntax, UsingDirective,
        },
        SyntaxTree,
    },
    Error, Result,
};

/// First RVA handed out to method bodies.
const FIRST_BODY_RVA: u32 = 0x2050;
/// Distance between consecutive method bodies.
const BODY_ALIGNMENT: u32 = 0x10;

const ACCESS_MODIFIERS: Modifiers = Modifiers::PUBLIC
    .union(Modifiers::PRIVATE)
    .union(Modifiers::PROTECTED)
    .union(Modifiers::INTERNAL);

/// Compiles a syntax tree straight into metadata, without an external compiler.
///
/// Types and members are laid out the way the C# compiler lays out its metadata: one TypeDef per
/// declaration (partial declarations merged), methods in member order with accessors, event
/// accessors and operators under their metadata names, and the implicit constructors a C#
/// compiler synthesizes appended last. Member bodies are not compiled; methods that have one
/// receive a distinct RVA.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataCompiler;

impl MetadataCompiler {
    /// Creates a compiler.
    #[must_use]
    pub fn new() -> Self {
        MetadataCompiler
    }
}

impl Compiler for MetadataCompiler {
    fn compile(
        &self,
        module_name: &str,
        tree: &SyntaxTree,
        options: &CompileOptions,
    ) -> Result<Assembly> {
        let declared = declared_types(tree.root());
        debug!("Compiling {} type declarations", declared.len());

        let mut scope = TypeScope::new(&declared);
        import(&mut scope, &tree.root().usings);

        let mut emitter = Emitter::new(module_name, tree, *options);
        emitter.namespace_members(&tree.root().members, &scope);
        emitter.synthesize();
        emitter.finish()
    }
}

/// Adds the namespaces imported by plain `using` directives to `scope`.
fn import(scope: &mut TypeScope<'_>, usings: &[UsingDirective]) {
    for using in usings {
        if using.alias.is_none() && !using.is_static {
            scope.import(&using.name);
        }
    }
}

/// What the emitter remembers about a TypeDef across partial declarations.
#[derive(Debug, Clone)]
struct TypeState {
    token: Token,
    kind: TypeKind,
    partial: bool,
    is_static: bool,
    is_abstract: bool,
    has_instance_ctor: bool,
    has_static_ctor: bool,
    has_static_initializers: bool,
}

/// The type whose members are being emitted.
struct TypeContext<'s> {
    token: Token,
    state: usize,
    kind: TypeKind,
    /// Simple name, for constructor checks
    simple: String,
    /// C# display name, for diagnostics
    display: String,
    scope: TypeScope<'s>,
}

impl TypeContext<'_> {
    fn in_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }
}

/// The property, indexer or event an accessor belongs to.
struct AccessorOwner<'d> {
    modifiers: Modifiers,
    /// `Ns.IFoo.` for explicit implementations, empty otherwise
    prefix: String,
    /// Name used in accessor method names: the property name, `Item` or the event name
    name: &'d str,
    /// CLR name of the property, element or delegate type
    value_type: String,
    /// CLR names of indexer parameters
    index_params: Vec<String>,
    /// C# display name, for diagnostics
    display: String,
    /// Bodiless accessors make an auto-implemented property
    auto_allowed: bool,
}

struct Emitter<'a> {
    tree: &'a SyntaxTree,
    options: CompileOptions,
    builder: AssemblyBuilder,
    diagnostics: Diagnostics,
    /// Index of the next declaration in the pre-order type list
    cursor: usize,
    /// Emitted TypeDefs keyed by enclosing type, namespace and metadata name
    emitted: HashMap<(Option<Token>, String, String), usize>,
    types: Vec<TypeState>,
    signatures: HashSet<(Token, String, u32, Vec<String>, String)>,
    next_rva: u32,
}

impl<'a> Emitter<'a> {
    fn new(module_name: &str, tree: &'a SyntaxTree, options: CompileOptions) -> Self {
        Emitter {
            tree,
            options,
            builder: AssemblyBuilder::new(module_name),
            diagnostics: Diagnostics::new(),
            cursor: 0,
            emitted: HashMap::new(),
            types: Vec::new(),
            signatures: HashSet::new(),
            next_rva: FIRST_BODY_RVA,
        }
    }

    fn finish(self) -> Result<Assembly> {
        for diagnostic in self.diagnostics.iter() {
            if diagnostic.severity == Severity::Warning {
                warn!("{diagnostic}");
            }
        }
        if self.diagnostics.has_errors() {
            return Err(Error::Compilation(self.diagnostics));
        }

        let assembly = self.builder.build();
        info!(
            "Compiled module '{}': {} types, {} methods",
            assembly.name(),
            assembly.types().len(),
            assembly.methods().len()
        );
        Ok(assembly)
    }

    fn report(&mut self, diagnostic: Diagnostic, span: &Span) {
        let location = Location::from_offset(self.tree.source(), span.start);
        self.diagnostics.push(diagnostic.at(location));
    }

    fn require_body(&mut self, what: &str, span: &Span) {
        self.report(
            Diagnostic::error(
                "CS0501",
                format!(
                    "'{what}' must declare a body because it is not marked abstract, extern, or partial"
                ),
            ),
            span,
        );
    }

    fn namespace_members(&mut self, members: &[NamespaceMember], scope: &TypeScope<'_>) {
        for member in members {
            match member {
                NamespaceMember::Namespace(decl) => {
                    let mut inner = scope.enter_namespace(&decl.name);
                    import(&mut inner, &decl.usings);
                    self.namespace_members(&decl.members, &inner);
                }
                NamespaceMember::Type(decl) => self.type_decl(decl, scope, None),
            }
        }
    }

    fn type_decl(&mut self, decl: &TypeDecl, scope: &TypeScope<'_>, outer: Option<&TypeContext<'_>>) {
        let index = self.cursor;
        self.cursor += 1;

        let metadata_name = generic_arity_name(&decl.name, decl.arity());
        let namespace = if outer.is_some() { "" } else { scope.namespace() };
        let key = (outer.map(|o| o.token), namespace.to_string(), metadata_name.clone());
        let partial = decl.modifiers.contains(Modifiers::PARTIAL);

        let state = match self.emitted.get(&key).copied() {
            Some(existing)
                if partial
                    && self.types[existing].partial
                    && self.types[existing].kind == decl.kind =>
            {
                existing
            }
            Some(_) => {
                self.duplicate_type(decl, scope, outer);
                self.cursor += nested_type_count(decl);
                return;
            }
            None => {
                let mut generic_params = outer
                    .and_then(|o| self.builder.type_definition(o.token))
                    .map(|ty| ty.generic_params.clone())
                    .unwrap_or_default();
                generic_params.extend(decl.type_params.iter().cloned());

                let token = self.builder.add_type(
                    namespace,
                    &metadata_name,
                    type_flags(decl, outer.is_some()),
                    outer.map(|o| o.token),
                    generic_params,
                );
                debug!("Emitted type {metadata_name} as {token}");

                self.types.push(TypeState {
                    token,
                    kind: decl.kind,
                    partial,
                    is_static: false,
                    is_abstract: false,
                    has_instance_ctor: false,
                    has_static_ctor: false,
                    has_static_initializers: false,
                });
                let state = self.types.len() - 1;
                self.emitted.insert(key, state);
                state
            }
        };

        let type_state = &mut self.types[state];
        type_state.is_static |= decl.is_static();
        type_state.is_abstract |= decl.modifiers.contains(Modifiers::ABSTRACT);

        let context = TypeContext {
            token: type_state.token,
            state,
            kind: decl.kind,
            simple: decl.name.clone(),
            display: match outer {
                Some(outer) => format!("{}.{}", outer.display, decl.name),
                None => qualify(scope.namespace(), &decl.name),
            },
            scope: scope.enter_type(index, &decl.type_params),
        };

        match decl.kind {
            TypeKind::Delegate => self.delegate_members(&context, decl),
            TypeKind::Enum => {}
            TypeKind::Class | TypeKind::Struct | TypeKind::Interface => {
                for member in &decl.members {
                    self.member(&context, member);
                }
            }
        }
    }

    fn duplicate_type(
        &mut self,
        decl: &TypeDecl,
        scope: &TypeScope<'_>,
        outer: Option<&TypeContext<'_>>,
    ) {
        let diagnostic = match outer {
            Some(outer) => Diagnostic::error(
                "CS0102",
                format!(
                    "The type '{}' already contains a definition for '{}'",
                    outer.display, decl.name
                ),
            ),
            None => {
                let namespace = if scope.namespace().is_empty() {
                    "<global namespace>"
                } else {
                    scope.namespace()
                };
                Diagnostic::error(
                    "CS0101",
                    format!(
                        "The namespace '{namespace}' already contains a definition for '{}'",
                        decl.name
                    ),
                )
            }
        };
        self.report(diagnostic, &decl.span);
    }

    fn member(&mut self, ctx: &TypeContext<'_>, member: &MemberDecl) {
        match member {
            MemberDecl::Type(nested) => self.type_decl(nested, &ctx.scope, Some(ctx)),
            MemberDecl::Field(decl) => self.field(ctx, decl),
            MemberDecl::Constructor(decl) => self.constructor(ctx, decl),
            MemberDecl::Destructor(decl) => self.destructor(ctx, decl),
            MemberDecl::Method(decl) => self.method(ctx, decl),
            MemberDecl::Property(decl) => self.property(ctx, decl),
            MemberDecl::Indexer(decl) => self.indexer(ctx, decl),
            MemberDecl::Event(decl) => self.event(ctx, decl),
            MemberDecl::Operator(decl) => self.operator(ctx, decl),
        }
    }

    fn field(&mut self, ctx: &TypeContext<'_>, decl: &FieldDecl) {
        let is_static = decl.modifiers.contains(Modifiers::STATIC)
            && !decl.modifiers.contains(Modifiers::CONST);
        if is_static && decl.variables.iter().any(|v| v.has_initializer) {
            self.types[ctx.state].has_static_initializers = true;
        }
    }

    fn constructor(&mut self, ctx: &TypeContext<'_>, decl: &ConstructorDecl) {
        if decl.name != ctx.simple {
            self.report(
                Diagnostic::error("CS1520", "Method must have a return type"),
                &decl.span,
            );
            return;
        }

        let is_static = decl.modifiers.contains(Modifiers::STATIC);
        if decl.body.is_none() && !decl.modifiers.contains(Modifiers::EXTERN) {
            let what = format!("{}.{}({})", ctx.display, decl.name, display_params(&decl.params));
            self.require_body(&what, &decl.span);
        }

        let state = &mut self.types[ctx.state];
        if is_static {
            state.has_static_ctor = true;
        } else {
            state.has_instance_ctor = true;
        }

        let signature = MethodSignature {
            has_this: !is_static,
            generic_param_count: 0,
            return_type: "System.Void".to_string(),
            params: parameter_types(&ctx.scope, &decl.params),
        };
        let mut method =
            MethodDefinition::new(if is_static { ".cctor" } else { ".ctor" }, signature);
        method.access = if is_static {
            MethodAccessFlags::PRIVATE
        } else {
            access_flags(decl.modifiers, MethodAccessFlags::PRIVATE)
        };
        method.modifiers |= MethodModifiers::SPECIAL_NAME | MethodModifiers::RTSPECIAL_NAME;

        self.add_method(ctx, method, decl.body.is_some(), &decl.span);
    }

    fn destructor(&mut self, ctx: &TypeContext<'_>, decl: &DestructorDecl) {
        if decl.body.is_none() {
            let what = format!("{}.~{}()", ctx.display, decl.name);
            self.require_body(&what, &decl.span);
        }

        let mut method = MethodDefinition::new("Finalize", MethodSignature::void(true));
        method.access = MethodAccessFlags::FAMILY;
        method.modifiers |= MethodModifiers::VIRTUAL;
        self.add_method(ctx, method, decl.body.is_some(), &decl.span);
    }

    fn method(&mut self, ctx: &TypeContext<'_>, decl: &MethodDecl) {
        // Only the implementing part of a partial method is compiled
        if decl.body.is_none() && decl.modifiers.contains(Modifiers::PARTIAL) {
            return;
        }

        if decl.body.is_none()
            && !ctx.in_interface()
            && !decl.modifiers.intersects(Modifiers::ABSTRACT | Modifiers::EXTERN)
        {
            let what = format!("{}.{}({})", ctx.display, decl.name, display_params(&decl.params));
            self.require_body(&what, &decl.span);
        }

        let scope = ctx.scope.with_method_params(&decl.type_params);
        let is_static = decl.modifiers.contains(Modifiers::STATIC);
        let signature = MethodSignature {
            has_this: !is_static,
            generic_param_count: u32::try_from(decl.type_params.len()).unwrap_or(u32::MAX),
            return_type: scope.clr_name(&decl.return_type),
            params: parameter_types(&scope, &decl.params),
        };

        let (name, access, modifiers) = match &decl.explicit_interface {
            Some(interface) => (
                format!("{}.{}", scope.interface_name(interface), decl.name),
                MethodAccessFlags::PRIVATE,
                explicit_modifiers(is_static),
            ),
            None => {
                let (access, modifiers) =
                    method_flags(decl.modifiers, ctx.in_interface(), decl.body.is_some());
                (decl.name.clone(), access, modifiers)
            }
        };

        let mut method = MethodDefinition::new(name, signature);
        method.access = access;
        method.modifiers = modifiers;
        method.generic_params = decl.type_params.clone();
        self.add_method(ctx, method, decl.body.is_some(), &decl.span);
    }

    fn property(&mut self, ctx: &TypeContext<'_>, decl: &PropertyDecl) {
        if decl.has_initializer && decl.modifiers.contains(Modifiers::STATIC) {
            self.types[ctx.state].has_static_initializers = true;
        }

        let owner = AccessorOwner {
            modifiers: decl.modifiers,
            prefix: explicit_prefix(&ctx.scope, decl.explicit_interface.as_ref()),
            name: &decl.name,
            value_type: ctx.scope.clr_name(&decl.ty),
            index_params: Vec::new(),
            display: format!("{}.{}", ctx.display, decl.name),
            auto_allowed: true,
        };
        self.accessors(ctx, &owner, &decl.accessors, decl.expression_body.is_some(), &decl.span);
    }

    fn indexer(&mut self, ctx: &TypeContext<'_>, decl: &IndexerDecl) {
        let owner = AccessorOwner {
            modifiers: decl.modifiers,
            prefix: explicit_prefix(&ctx.scope, decl.explicit_interface.as_ref()),
            name: "Item",
            value_type: ctx.scope.clr_name(&decl.ty),
            index_params: parameter_types(&ctx.scope, &decl.params),
            display: format!("{}.this[{}]", ctx.display, display_params(&decl.params)),
            auto_allowed: false,
        };
        self.accessors(ctx, &owner, &decl.accessors, decl.expression_body.is_some(), &decl.span);
    }

    fn event(&mut self, ctx: &TypeContext<'_>, decl: &EventDecl) {
        let prefix = explicit_prefix(&ctx.scope, decl.explicit_interface.as_ref());
        let value_type = ctx.scope.clr_name(&decl.ty);

        for name in &decl.names {
            let owner = AccessorOwner {
                modifiers: decl.modifiers,
                prefix: prefix.clone(),
                name,
                value_type: value_type.clone(),
                index_params: Vec::new(),
                display: format!("{}.{name}", ctx.display),
                auto_allowed: false,
            };

            if decl.accessors.is_empty() {
                // Field-like event
                let generated = !ctx.in_interface() && !decl.modifiers.contains(Modifiers::ABSTRACT);
                for kind in [AccessorKind::Add, AccessorKind::Remove] {
                    self.accessor_method(
                        ctx,
                        &owner,
                        kind,
                        Modifiers::empty(),
                        generated,
                        generated,
                        &decl.span,
                    );
                }
            } else {
                self.accessors(ctx, &owner, &decl.accessors, false, &decl.span);
            }
        }
    }

    fn accessors(
        &mut self,
        ctx: &TypeContext<'_>,
        owner: &AccessorOwner<'_>,
        accessors: &[AccessorDecl],
        expression_bodied: bool,
        span: &Span,
    ) {
        if expression_bodied {
            self.accessor_method(
                ctx,
                owner,
                AccessorKind::Get,
                Modifiers::empty(),
                true,
                false,
                span,
            );
            return;
        }

        let bodiless_allowed = ctx.in_interface()
            || owner
                .modifiers
                .intersects(Modifiers::ABSTRACT | Modifiers::EXTERN);
        let auto = owner.auto_allowed
            && !bodiless_allowed
            && accessors.iter().all(|accessor| accessor.body.is_none());

        for accessor in accessors {
            if accessor.body.is_none() && !bodiless_allowed && !auto {
                let what = format!("{}.{}", owner.display, accessor_keyword(accessor.kind));
                self.require_body(&what, &accessor.span);
            }

            self.accessor_method(
                ctx,
                owner,
                accessor.kind,
                accessor.modifiers,
                accessor.body.is_some() || auto,
                auto,
                &accessor.span,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn accessor_method(
        &mut self,
        ctx: &TypeContext<'_>,
        owner: &AccessorOwner<'_>,
        kind: AccessorKind,
        accessor_modifiers: Modifiers,
        has_body: bool,
        compiler_generated: bool,
        span: &Span,
    ) {
        let is_static = owner.modifiers.contains(Modifiers::STATIC);
        let mut params = owner.index_params.clone();
        let return_type = match kind {
            AccessorKind::Get => owner.value_type.clone(),
            AccessorKind::Set | AccessorKind::Init | AccessorKind::Add | AccessorKind::Remove => {
                params.push(owner.value_type.clone());
                "System.Void".to_string()
            }
        };
        let signature = MethodSignature {
            has_this: !is_static,
            generic_param_count: 0,
            return_type,
            params,
        };

        let (access, modifiers) = if owner.prefix.is_empty() {
            let mut modifiers = owner.modifiers;
            if accessor_modifiers.intersects(ACCESS_MODIFIERS) {
                modifiers = (modifiers - ACCESS_MODIFIERS) | (accessor_modifiers & ACCESS_MODIFIERS);
            }
            method_flags(modifiers, ctx.in_interface(), has_body)
        } else {
            (MethodAccessFlags::PRIVATE, explicit_modifiers(is_static))
        };

        let name = format!("{}{}{}", owner.prefix, kind.method_prefix(), owner.name);
        let mut method = MethodDefinition::new(name, signature);
        method.access = access;
        method.modifiers = modifiers | MethodModifiers::SPECIAL_NAME;
        method.compiler_generated = compiler_generated;
        self.add_method(ctx, method, has_body, span);
    }

    fn operator(&mut self, ctx: &TypeContext<'_>, decl: &OperatorDecl) {
        let name = match &decl.kind {
            OperatorKind::Implicit => "op_Implicit",
            OperatorKind::Explicit => "op_Explicit",
            OperatorKind::Symbol(symbol) => match operator_name(symbol, decl.params.len()) {
                Some(name) => name,
                None if decl.params.len() == 2 => {
                    self.report(
                        Diagnostic::error("CS1020", "Overloadable binary operator expected"),
                        &decl.span,
                    );
                    return;
                }
                None => {
                    self.report(
                        Diagnostic::error("CS1019", "Overloadable unary operator expected"),
                        &decl.span,
                    );
                    return;
                }
            },
        };

        if decl.body.is_none()
            && !ctx.in_interface()
            && !decl.modifiers.contains(Modifiers::EXTERN)
        {
            let what = format!("{}.{name}({})", ctx.display, display_params(&decl.params));
            self.require_body(&what, &decl.span);
        }

        let signature = MethodSignature {
            has_this: false,
            generic_param_count: 0,
            return_type: ctx.scope.clr_name(&decl.return_type),
            params: parameter_types(&ctx.scope, &decl.params),
        };
        let mut method = MethodDefinition::new(name, signature);
        method.access = access_flags(decl.modifiers, MethodAccessFlags::PRIVATE);
        method.modifiers |= MethodModifiers::SPECIAL_NAME;
        self.add_method(ctx, method, decl.body.is_some(), &decl.span);
    }

    fn delegate_members(&mut self, ctx: &TypeContext<'_>, decl: &TypeDecl) {
        let Some(delegate) = &decl.delegate else {
            return;
        };

        let return_type = ctx.scope.clr_name(&delegate.return_type);
        let params = parameter_types(&ctx.scope, &delegate.params);
        let by_ref: Vec<String> = delegate
            .params
            .iter()
            .zip(&params)
            .filter(|(param, _)| param.is_by_ref())
            .map(|(_, ty)| ty.clone())
            .collect();

        let runtime_method = |name: &str, return_type: String, params: Vec<String>| {
            let mut method = MethodDefinition::new(
                name,
                MethodSignature {
                    has_this: true,
                    generic_param_count: 0,
                    return_type,
                    params,
                },
            );
            method.impl_code_type = MethodImplCodeType::RUNTIME;
            method
        };

        let mut ctor = runtime_method(
            ".ctor",
            "System.Void".to_string(),
            vec!["System.Object".to_string(), "System.IntPtr".to_string()],
        );
        ctor.modifiers |= MethodModifiers::SPECIAL_NAME | MethodModifiers::RTSPECIAL_NAME;

        let mut begin_params = params.clone();
        begin_params.push("System.AsyncCallback".to_string());
        begin_params.push("System.Object".to_string());
        let mut end_params = by_ref;
        end_params.push("System.IAsyncResult".to_string());

        let virtual_methods = [
            runtime_method("Invoke", return_type.clone(), params),
            runtime_method("BeginInvoke", "System.IAsyncResult".to_string(), begin_params),
            runtime_method("EndInvoke", return_type, end_params),
        ];

        self.types[ctx.state].has_instance_ctor = true;
        self.add_method(ctx, ctor, false, &decl.span);
        for mut method in virtual_methods {
            method.modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT;
            self.add_method(ctx, method, false, &decl.span);
        }
    }

    /// Appends the constructors a C# compiler synthesizes.
    fn synthesize(&mut self) {
        for index in 0..self.types.len() {
            let state = self.types[index].clone();
            let class = state.kind == TypeKind::Class;

            if class && !state.is_static && !state.has_instance_ctor {
                let mut ctor = MethodDefinition::new(".ctor", MethodSignature::void(true));
                ctor.access = if state.is_abstract {
                    MethodAccessFlags::FAMILY
                } else {
                    MethodAccessFlags::PUBLIC
                };
                ctor.modifiers |= MethodModifiers::SPECIAL_NAME | MethodModifiers::RTSPECIAL_NAME;
                self.push_method(state.token, ctor, true);
            }

            if (class || state.kind == TypeKind::Struct)
                && state.has_static_initializers
                && !state.has_static_ctor
            {
                let mut cctor = MethodDefinition::new(".cctor", MethodSignature::void(false));
                cctor.access = MethodAccessFlags::PRIVATE;
                cctor.modifiers |= MethodModifiers::SPECIAL_NAME | MethodModifiers::RTSPECIAL_NAME;
                self.push_method(state.token, cctor, true);
            }
        }
    }

    /// Adds a declared method, reporting `CS0111` for a repeated signature.
    fn add_method(
        &mut self,
        ctx: &TypeContext<'_>,
        method: MethodDefinition,
        has_body: bool,
        span: &Span,
    ) {
        // Conversion operators may overload on the return type alone
        let return_type = if matches!(method.name.as_str(), "op_Implicit" | "op_Explicit") {
            method.signature.return_type.clone()
        } else {
            String::new()
        };
        let key = (
            ctx.token,
            method.name.clone(),
            method.signature.generic_param_count,
            method.signature.params.clone(),
            return_type,
        );

        if !self.signatures.insert(key) {
            let member = if method.is_constructor() {
                ctx.simple.as_str()
            } else {
                method.name.as_str()
            };
            let message = format!(
                "Type '{}' already defines a member called '{member}' with the same parameter types",
                ctx.display
            );
            self.report(Diagnostic::error("CS0111", message), span);
        }

        self.push_method(ctx.token, method, has_body);
    }

    fn push_method(&mut self, declaring: Token, mut method: MethodDefinition, has_body: bool) {
        if self.options.disable_optimization {
            method.impl_options |= MethodImplOptions::NO_OPTIMIZATION;
        }
        if has_body {
            method.rva = self.next_rva;
            self.next_rva += BODY_ALIGNMENT;
        }

        let name = method.name.clone();
        let token = self.builder.add_method(declaring, method);
        debug!("Emitted method {name} as {token}");
    }
}

/// Number of types declared inside `decl`, at any depth.
fn nested_type_count(decl: &TypeDecl) -> usize {
    decl.members
        .iter()
        .map(|member| match member {
            MemberDecl::Type(nested) => 1 + nested_type_count(nested),
            _ => 0,
        })
        .sum()
}

fn type_flags(decl: &TypeDecl, nested: bool) -> u32 {
    let modifiers = decl.modifiers;
    let has = |flag| modifiers.contains(flag);

    let mut flags = if !nested {
        if has(Modifiers::PUBLIC) {
            TypeAttributes::PUBLIC
        } else {
            TypeAttributes::NOT_PUBLIC
        }
    } else if has(Modifiers::PUBLIC) {
        TypeAttributes::NESTED_PUBLIC
    } else if has(Modifiers::PROTECTED) && has(Modifiers::INTERNAL) {
        TypeAttributes::NESTED_FAM_OR_ASSEM
    } else if has(Modifiers::PROTECTED) && has(Modifiers::PRIVATE) {
        TypeAttributes::NESTED_FAM_AND_ASSEM
    } else if has(Modifiers::PROTECTED) {
        TypeAttributes::NESTED_FAMILY
    } else if has(Modifiers::INTERNAL) {
        TypeAttributes::NESTED_ASSEMBLY
    } else {
        TypeAttributes::NESTED_PRIVATE
    };

    let explicit_cctor = decl.members.iter().any(|member| {
        matches!(member, MemberDecl::Constructor(ctor) if ctor.modifiers.contains(Modifiers::STATIC))
    });

    match decl.kind {
        TypeKind::Class => {
            if has(Modifiers::STATIC) {
                flags |= TypeAttributes::ABSTRACT | TypeAttributes::SEALED;
            }
            if has(Modifiers::ABSTRACT) {
                flags |= TypeAttributes::ABSTRACT;
            }
            if has(Modifiers::SEALED) {
                flags |= TypeAttributes::SEALED;
            }
            if !explicit_cctor {
                flags |= TypeAttributes::BEFORE_FIELD_INIT;
            }
        }
        TypeKind::Struct => {
            flags |= TypeAttributes::SEALED | TypeAttributes::SEQUENTIAL_LAYOUT;
            if !explicit_cctor {
                flags |= TypeAttributes::BEFORE_FIELD_INIT;
            }
        }
        TypeKind::Interface => flags |= TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
        TypeKind::Enum | TypeKind::Delegate => flags |= TypeAttributes::SEALED,
    }
    flags
}

fn access_flags(modifiers: Modifiers, default: MethodAccessFlags) -> MethodAccessFlags {
    let has = |flag| modifiers.contains(flag);

    if has(Modifiers::PUBLIC) {
        MethodAccessFlags::PUBLIC
    } else if has(Modifiers::PROTECTED) && has(Modifiers::INTERNAL) {
        MethodAccessFlags::FAM_OR_ASSEM
    } else if has(Modifiers::PROTECTED) && has(Modifiers::PRIVATE) {
        MethodAccessFlags::FAM_AND_ASSEM
    } else if has(Modifiers::PROTECTED) {
        MethodAccessFlags::FAMILY
    } else if has(Modifiers::INTERNAL) {
        MethodAccessFlags::ASSEM
    } else if has(Modifiers::PRIVATE) {
        MethodAccessFlags::PRIVATE
    } else {
        default
    }
}

fn method_flags(
    modifiers: Modifiers,
    in_interface: bool,
    has_body: bool,
) -> (MethodAccessFlags, MethodModifiers) {
    let default = if in_interface {
        MethodAccessFlags::PUBLIC
    } else {
        MethodAccessFlags::PRIVATE
    };
    let access = access_flags(modifiers, default);

    let mut flags = MethodModifiers::HIDE_BY_SIG;
    let is_static = modifiers.contains(Modifiers::STATIC);
    if is_static {
        flags |= MethodModifiers::STATIC;
    }

    if in_interface {
        let overridable = access != MethodAccessFlags::PRIVATE && !modifiers.contains(Modifiers::SEALED);
        if !is_static && overridable {
            flags |= MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT;
            if !has_body {
                flags |= MethodModifiers::ABSTRACT;
            }
        } else if is_static && modifiers.contains(Modifiers::ABSTRACT) {
            flags |= MethodModifiers::ABSTRACT | MethodModifiers::VIRTUAL;
        }
    } else if modifiers.contains(Modifiers::ABSTRACT) {
        flags |= MethodModifiers::ABSTRACT | MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT;
    } else if modifiers.contains(Modifiers::VIRTUAL) {
        flags |= MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT;
    } else if modifiers.contains(Modifiers::OVERRIDE) {
        flags |= MethodModifiers::VIRTUAL;
        if modifiers.contains(Modifiers::SEALED) {
            flags |= MethodModifiers::FINAL;
        }
    }

    if modifiers.contains(Modifiers::EXTERN) {
        flags |= MethodModifiers::PINVOKE_IMPL;
    }
    (access, flags)
}

/// Modifiers of an explicit interface implementation: `private final virtual newslot`.
fn explicit_modifiers(is_static: bool) -> MethodModifiers {
    let mut flags = MethodModifiers::HIDE_BY_SIG;
    if is_static {
        flags |= MethodModifiers::STATIC;
    } else {
        flags |= MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT | MethodModifiers::FINAL;
    }
    flags
}

fn explicit_prefix(scope: &TypeScope<'_>, interface: Option<&TypeSyntax>) -> String {
    interface
        .map(|interface| format!("{}.", scope.interface_name(interface)))
        .unwrap_or_default()
}

fn parameter_types(scope: &TypeScope<'_>, params: &[Parameter]) -> Vec<String> {
    params
        .iter()
        .map(|param| {
            let name = scope.clr_name(&param.ty);
            if param.is_by_ref() {
                format!("{name}&")
            } else {
                name
            }
        })
        .collect()
}

/// Parameter list as C# displays it in diagnostics: `ref int, string`.
fn display_params(params: &[Parameter]) -> String {
    params
        .iter()
        .map(|param| {
            let modifier = match param.modifier {
                Some(ParameterModifier::Ref) => "ref ",
                Some(ParameterModifier::Out) => "out ",
                Some(ParameterModifier::In) => "in ",
                Some(ParameterModifier::Params) => "params ",
                Some(ParameterModifier::This) => "this ",
                None => "",
            };
            format!("{modifier}{}", param.ty)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn accessor_keyword(kind: AccessorKind) -> &'static str {
    match kind {
        AccessorKind::Get => "get",
        AccessorKind::Set => "set",
        AccessorKind::Init => "init",
        AccessorKind::Add => "add",
        AccessorKind::Remove => "remove",
    }
}

/// Metadata name of an overloadable operator with `arity` operands.
fn operator_name(symbol: &str, arity: usize) -> Option<&'static str> {
    let name = match (symbol, arity) {
        ("+", 1) => "op_UnaryPlus",
        ("-", 1) => "op_UnaryNegation",
        ("!", 1) => "op_LogicalNot",
        ("~", 1) => "op_OnesComplement",
        ("++", 1) => "op_Increment",
        ("--", 1) => "op_Decrement",
        ("true", 1) => "op_True",
        ("false", 1) => "op_False",
        ("+", 2) => "op_Addition",
        ("-", 2) => "op_Subtraction",
        ("*", 2) => "op_Multiply",
        ("/", 2) => "op_Division",
        ("%", 2) => "op_Modulus",
        ("&", 2) => "op_BitwiseAnd",
        ("|", 2) => "op_BitwiseOr",
        ("^", 2) => "op_ExclusiveOr",
        ("<<", 2) => "op_LeftShift",
        (">>", 2) => "op_RightShift",
        (">>>", 2) => "op_UnsignedRightShift",
        ("==", 2) => "op_Equality",
        ("!=", 2) => "op_Inequality",
        ("<", 2) => "op_LessThan",
        (">", 2) => "op_GreaterThan",
        ("<=", 2) => "op_LessThanOrEqual",
        (">=", 2) => "op_GreaterThanOrEqual",
        _ => return None,
    };
    Some(name)
}
