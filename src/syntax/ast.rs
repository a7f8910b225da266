//! Declaration-level syntax tree for C#.
//!
//! The tree records every declaration with the structural information needed to name its compiled
//! counterpart. Member bodies are kept only as spans of the source text.

use std::{fmt, ops::Range};

use bitflags::bitflags;

/// Byte range in the source text.
pub type Span = Range<usize>;

bitflags! {
    /// Declaration modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u32 {
        /// `public`
        const PUBLIC = 0x0001;
        /// `private`
        const PRIVATE = 0x0002;
        /// `protected`
        const PROTECTED = 0x0004;
        /// `internal`
        const INTERNAL = 0x0008;
        /// `static`
        const STATIC = 0x0010;
        /// `abstract`
        const ABSTRACT = 0x0020;
        /// `sealed`
        const SEALED = 0x0040;
        /// `virtual`
        const VIRTUAL = 0x0080;
        /// `override`
        const OVERRIDE = 0x0100;
        /// `extern`
        const EXTERN = 0x0200;
        /// `readonly`
        const READONLY = 0x0400;
        /// `unsafe`
        const UNSAFE = 0x0800;
        /// `new`
        const NEW = 0x1000;
        /// `const`
        const CONST = 0x2000;
        /// `volatile`
        const VOLATILE = 0x4000;
        /// `partial`
        const PARTIAL = 0x8000;
        /// `async`
        const ASYNC = 0x1_0000;
        /// `ref`, on `ref struct` declarations and `ref` returns
        const REF = 0x2_0000;
        /// `fixed`
        const FIXED = 0x4_0000;
    }
}

impl Modifiers {
    /// Parses a single modifier keyword.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Modifiers> {
        Some(match keyword {
            "public" => Modifiers::PUBLIC,
            "private" => Modifiers::PRIVATE,
            "protected" => Modifiers::PROTECTED,
            "internal" => Modifiers::INTERNAL,
            "static" => Modifiers::STATIC,
            "abstract" => Modifiers::ABSTRACT,
            "sealed" => Modifiers::SEALED,
            "virtual" => Modifiers::VIRTUAL,
            "override" => Modifiers::OVERRIDE,
            "extern" => Modifiers::EXTERN,
            "readonly" => Modifiers::READONLY,
            "unsafe" => Modifiers::UNSAFE,
            "new" => Modifiers::NEW,
            "const" => Modifiers::CONST,
            "volatile" => Modifiers::VOLATILE,
            "partial" => Modifiers::PARTIAL,
            "async" => Modifiers::ASYNC,
            "ref" => Modifiers::REF,
            "fixed" => Modifiers::FIXED,
            _ => return None,
        })
    }
}

/// Root of a parsed file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    /// `extern alias` names
    pub extern_aliases: Vec<String>,
    /// Top-level using directives
    pub usings: Vec<UsingDirective>,
    /// Namespaces and types in declaration order
    pub members: Vec<NamespaceMember>,
}

/// A `using` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingDirective {
    /// Imported namespace or type, as written
    pub name: String,
    /// Alias name of `using A = B;`
    pub alias: Option<String>,
    /// `using static`
    pub is_static: bool,
    /// `global using`
    pub is_global: bool,
}

/// A member of a compilation unit or namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceMember {
    /// A nested namespace declaration
    Namespace(NamespaceDecl),
    /// A type declaration
    Type(TypeDecl),
}

/// A `namespace` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    /// Dotted name, e.g. `A.B`
    pub name: String,
    /// `namespace A.B;` form
    pub file_scoped: bool,
    /// Using directives inside the namespace
    pub usings: Vec<UsingDirective>,
    /// Members in declaration order
    pub members: Vec<NamespaceMember>,
    /// Source range of the declaration
    pub span: Span,
}

/// The kind of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// `class`
    Class,
    /// `struct`
    Struct,
    /// `interface`
    Interface,
    /// `enum`
    Enum,
    /// `delegate`
    Delegate,
}

/// A type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    /// Declaration kind
    pub kind: TypeKind,
    /// Simple name, without arity
    pub name: String,
    /// Names of the declared type parameters
    pub type_params: Vec<String>,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Base class and interfaces; the underlying type of an enum
    pub bases: Vec<TypeSyntax>,
    /// Members in declaration order, empty for enums and delegates
    pub members: Vec<MemberDecl>,
    /// Enumerator names of an enum
    pub enumerators: Vec<String>,
    /// Return type and parameters of a delegate
    pub delegate: Option<DelegateSignature>,
    /// Source range of the declaration
    pub span: Span,
}

impl TypeDecl {
    /// Number of type parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.type_params.len()
    }

    /// Returns `true` for `static` classes.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(Modifiers::STATIC)
    }
}

/// The signature of a `delegate` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateSignature {
    /// Return type
    pub return_type: TypeSyntax,
    /// Parameters
    pub params: Vec<Parameter>,
}

/// A member of a class, struct or interface.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberDecl {
    /// A nested type
    Type(TypeDecl),
    /// A field or constant declaration, possibly declaring several variables
    Field(FieldDecl),
    /// An instance or static constructor
    Constructor(ConstructorDecl),
    /// A destructor (finalizer)
    Destructor(DestructorDecl),
    /// A method
    Method(MethodDecl),
    /// A property
    Property(PropertyDecl),
    /// An indexer
    Indexer(IndexerDecl),
    /// An event
    Event(EventDecl),
    /// A user-defined operator or conversion
    Operator(OperatorDecl),
}

impl MemberDecl {
    /// Source range of the member.
    #[must_use]
    pub fn span(&self) -> &Span {
        match self {
            MemberDecl::Type(decl) => &decl.span,
            MemberDecl::Field(decl) => &decl.span,
            MemberDecl::Constructor(decl) => &decl.span,
            MemberDecl::Destructor(decl) => &decl.span,
            MemberDecl::Method(decl) => &decl.span,
            MemberDecl::Property(decl) => &decl.span,
            MemberDecl::Indexer(decl) => &decl.span,
            MemberDecl::Event(decl) => &decl.span,
            MemberDecl::Operator(decl) => &decl.span,
        }
    }
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Modifiers, `CONST` for constants
    pub modifiers: Modifiers,
    /// Field type
    pub ty: TypeSyntax,
    /// Declared variables
    pub variables: Vec<VariableDeclarator>,
    /// Source range of the declaration
    pub span: Span,
}

/// One variable of a field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclarator {
    /// Variable name
    pub name: String,
    /// The variable has an `= initializer`
    pub has_initializer: bool,
}

/// The `: base(...)` or `: this(...)` clause of a constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorInitializer {
    /// `: base(...)`
    Base,
    /// `: this(...)`
    This,
}

/// A constructor declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    /// Modifiers, `STATIC` for type initializers
    pub modifiers: Modifiers,
    /// Name as written; a mismatch with the type name is reported by the compiler
    pub name: String,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Chained constructor call
    pub initializer: Option<ConstructorInitializer>,
    /// Body, `None` for `extern` constructors
    pub body: Option<Body>,
    /// Source range of the declaration
    pub span: Span,
}

/// A destructor declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DestructorDecl {
    /// Name as written after `~`
    pub name: String,
    /// Body
    pub body: Option<Body>,
    /// Source range of the declaration
    pub span: Span,
}

/// A method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    /// Modifiers
    pub modifiers: Modifiers,
    /// Return type
    pub return_type: TypeSyntax,
    /// Interface of an explicit implementation, e.g. `IFoo<int>` in `void IFoo<int>.M()`
    pub explicit_interface: Option<TypeSyntax>,
    /// Plain identifier
    pub name: String,
    /// Names of the method's type parameters
    pub type_params: Vec<String>,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Body, `None` for abstract, extern, interface and partial definitions
    pub body: Option<Body>,
    /// Source range of the declaration
    pub span: Span,
}

/// A property declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    /// Modifiers
    pub modifiers: Modifiers,
    /// Property type
    pub ty: TypeSyntax,
    /// Interface of an explicit implementation
    pub explicit_interface: Option<TypeSyntax>,
    /// Property name
    pub name: String,
    /// Accessors in declaration order, empty for expression-bodied properties
    pub accessors: Vec<AccessorDecl>,
    /// Body of `T P => expr;`
    pub expression_body: Option<Body>,
    /// The property has an `= initializer;`
    pub has_initializer: bool,
    /// Source range of the declaration
    pub span: Span,
}

/// An indexer declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerDecl {
    /// Modifiers
    pub modifiers: Modifiers,
    /// Element type
    pub ty: TypeSyntax,
    /// Interface of an explicit implementation
    pub explicit_interface: Option<TypeSyntax>,
    /// Index parameters
    pub params: Vec<Parameter>,
    /// Accessors in declaration order
    pub accessors: Vec<AccessorDecl>,
    /// Body of `T this[int i] => expr;`
    pub expression_body: Option<Body>,
    /// Source range of the declaration
    pub span: Span,
}

/// An event declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDecl {
    /// Modifiers
    pub modifiers: Modifiers,
    /// Delegate type
    pub ty: TypeSyntax,
    /// Interface of an explicit implementation
    pub explicit_interface: Option<TypeSyntax>,
    /// Declared names; several for `event E A, B;`
    pub names: Vec<String>,
    /// `add`/`remove` accessors, empty for field-like events
    pub accessors: Vec<AccessorDecl>,
    /// Source range of the declaration
    pub span: Span,
}

/// The operator a user-defined operator declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorKind {
    /// `operator +` and friends, the operator token as written
    Symbol(String),
    /// `implicit operator T`
    Implicit,
    /// `explicit operator T`
    Explicit,
}

/// A user-defined operator or conversion declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDecl {
    /// Modifiers
    pub modifiers: Modifiers,
    /// Which operator is declared
    pub kind: OperatorKind,
    /// Result type; the target type for conversions
    pub return_type: TypeSyntax,
    /// Operands
    pub params: Vec<Parameter>,
    /// Body
    pub body: Option<Body>,
    /// Source range of the declaration
    pub span: Span,
}

/// Accessor keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    /// `get`
    Get,
    /// `set`
    Set,
    /// `init`
    Init,
    /// `add`
    Add,
    /// `remove`
    Remove,
}

impl AccessorKind {
    /// Prefix of the accessor's compiled method name, e.g. `get_`.
    #[must_use]
    pub fn method_prefix(&self) -> &'static str {
        match self {
            AccessorKind::Get => "get_",
            AccessorKind::Set | AccessorKind::Init => "set_",
            AccessorKind::Add => "add_",
            AccessorKind::Remove => "remove_",
        }
    }
}

/// A property, indexer or event accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorDecl {
    /// Accessor keyword
    pub kind: AccessorKind,
    /// Accessibility modifiers
    pub modifiers: Modifiers,
    /// Body, `None` for auto-implemented accessors
    pub body: Option<Body>,
    /// Source range of the accessor
    pub span: Span,
}

/// How a member body is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `{ ... }`
    Block,
    /// `=> expression;`
    Expression,
}

/// The source range of a member body, which is not parsed further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    /// Block or expression body
    pub kind: BodyKind,
    /// Source range, including braces or the arrow
    pub span: Span,
}

/// Parameter passing modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterModifier {
    /// `ref`
    Ref,
    /// `out`
    Out,
    /// `in`
    In,
    /// `params`
    Params,
    /// `this`, on the first parameter of an extension method
    This,
}

/// A formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Passing modifier
    pub modifier: Option<ParameterModifier>,
    /// Parameter type
    pub ty: TypeSyntax,
    /// Parameter name
    pub name: String,
    /// The parameter has a default value
    pub has_default: bool,
}

impl Parameter {
    /// Returns `true` for `ref`, `out` and `in` parameters, which are passed as managed pointers.
    #[must_use]
    pub fn is_by_ref(&self) -> bool {
        matches!(
            self.modifier,
            Some(ParameterModifier::Ref | ParameterModifier::Out | ParameterModifier::In)
        )
    }
}

/// One dotted segment of a type name, with its type arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct NameSegment {
    /// Identifier
    pub name: String,
    /// Type arguments, empty for non-generic segments
    pub args: Vec<TypeSyntax>,
}

/// A type as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSyntax {
    /// A keyword type such as `int` or `void`
    Predefined(String),
    /// A possibly qualified, possibly generic type name
    Named {
        /// `global` or an extern alias before `::`
        alias: Option<String>,
        /// Dotted segments
        segments: Vec<NameSegment>,
    },
    /// `T[]`, `T[,]`
    Array {
        /// Element type
        element: Box<TypeSyntax>,
        /// Number of dimensions
        rank: u32,
    },
    /// `T?`
    Nullable(Box<TypeSyntax>),
    /// `T*`
    Pointer(Box<TypeSyntax>),
    /// `(T1 a, T2 b)`
    Tuple(Vec<TypeSyntax>),
}

impl TypeSyntax {
    /// A simple, non-generic name.
    #[must_use]
    pub fn simple(name: &str) -> TypeSyntax {
        TypeSyntax::Named {
            alias: None,
            segments: vec![NameSegment {
                name: name.to_string(),
                args: Vec::new(),
            }],
        }
    }

    /// Returns `true` for the `void` keyword.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSyntax::Predefined(keyword) if keyword == "void")
    }
}

impl fmt::Display for TypeSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSyntax::Predefined(keyword) => write!(f, "{keyword}"),
            TypeSyntax::Named { alias, segments } => {
                if let Some(alias) = alias {
                    write!(f, "{alias}::")?;
                }
                for (index, segment) in segments.iter().enumerate() {
                    if index > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", segment.name)?;
                    if !segment.args.is_empty() {
                        write!(f, "<")?;
                        for (index, arg) in segment.args.iter().enumerate() {
                            if index > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{arg}")?;
                        }
                        write!(f, ">")?;
                    }
                }
                Ok(())
            }
            TypeSyntax::Array { element, rank } => {
                write!(f, "{element}[")?;
                for _ in 1..*rank {
                    write!(f, ",")?;
                }
                write!(f, "]")
            }
            TypeSyntax::Nullable(inner) => write!(f, "{inner}?"),
            TypeSyntax::Pointer(inner) => write!(f, "{inner}*"),
            TypeSyntax::Tuple(elements) => {
                write!(f, "(")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, ")")
            }
        }
    }
}
