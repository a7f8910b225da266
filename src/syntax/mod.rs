//! C# source parsing.
//!
//! [`parse`] turns source text into a [`SyntaxTree`]: the source together with a
//! declaration-level [`ast::CompilationUnit`]. Namespaces, types and members are parsed fully;
//! member bodies are recorded as source spans only.
//!
//! # Examples
//!
//! ```rust
//! use jitscope::syntax::{self, ast::{MemberDecl, NamespaceMember}};
//!
//! let tree = syntax::parse("class C { void M(int i) { } }")?;
//! let NamespaceMember::Type(class) = &tree.root().members[0] else { unreachable!() };
//! assert!(matches!(&class.members[0], MemberDecl::Method(m) if m.name == "M"));
//! # Ok::<(), jitscope::Error>(())
//! ```

pub mod ast;

mod lexer;
mod parser;

use std::path::Path;

use log::debug;

use crate::{diagnostics::Diagnostics, syntax::ast::CompilationUnit, Error, Result};

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    root: CompilationUnit,
}

impl SyntaxTree {
    /// The parsed source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The root of the declaration tree.
    #[must_use]
    pub fn root(&self) -> &CompilationUnit {
        &self.root
    }

    /// Source text covered by `span`, empty if it lies outside the source.
    #[must_use]
    pub fn text(&self, span: &ast::Span) -> &str {
        self.source.get(span.clone()).unwrap_or_default()
    }
}

/// Parses C# source text.
///
/// # Errors
/// Returns [`Error::Syntax`] with the diagnostics reported before parsing gave up.
pub fn parse(text: &str) -> Result<SyntaxTree> {
    let tokens = lexer::tokenize(text).map_err(Error::Syntax)?;
    debug!("Lexed {} tokens", tokens.len());

    let root = parser::Parser::new(text, tokens)
        .compilation_unit()
        .map_err(|diagnostic| Error::Syntax(Diagnostics::from(vec![diagnostic])))?;

    Ok(SyntaxTree {
        source: text.to_string(),
        root,
    })
}

/// Reads and parses the C# file at `path`.
///
/// # Errors
/// Returns [`Error::FileError`] if the file cannot be read, or [`Error::Syntax`] if it does
/// not parse.
pub fn parse_file(path: &Path) -> Result<SyntaxTree> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}
