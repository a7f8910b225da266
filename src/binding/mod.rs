//! Re-associating source declarations with compiled members.
//!
//! Binding happens in two steps:
//!
//! 1. [`collect_declarations`] walks the syntax tree and keeps the declarations that have
//!    disassemblable code: classes and structs, their constructors, methods and accessors with
//!    bodies, in source order.
//! 2. [`MemberResolver`] matches that forest against the compiled module. Compiled methods are
//!    grouped by [`canonical_member_name`] into FIFO queues ([`MethodNameGroups`]) and each
//!    declaration takes the next method from its name's queue.
//!
//! Positional matching works because a compiler emits members that share a name in the order
//! they were declared. A queue that runs dry therefore means the forest and the module have
//! diverged, and is reported as [`crate::Error::Resolution`].
//!
//! # Examples
//!
//! ```rust
//! use jitscope::{
//!     binding::{collect_declarations, MemberResolver},
//!     compiler::{CompileOptions, Compiler, MetadataCompiler},
//!     syntax,
//! };
//!
//! let tree = syntax::parse("class C { void M(int i) { } void M(string s) { } }")?;
//! let assembly = MetadataCompiler::new().compile("test", &tree, &CompileOptions::default())?;
//!
//! let forest = collect_declarations(tree.root());
//! let resolved = MemberResolver::new(&assembly).resolve(&forest)?;
//!
//! let second = assembly.method(resolved[0].children[1].token).unwrap();
//! assert_eq!(second.signature.params, ["System.String"]);
//! # Ok::<(), jitscope::Error>(())
//! ```

mod collector;
mod resolver;

pub use collector::{collect_declarations, DeclarationKind, DeclarationNode};
pub use resolver::{canonical_member_name, MemberNode, MemberResolver, MethodNameGroups};
