//! Tokenizer for C# source text.
//!
//! Only the token classes a declaration-level parser needs are distinguished. Keywords that shape
//! declarations get their own kinds; everything else that may appear inside a member body is
//! folded into a few coarse kinds, since bodies are captured as token spans and never parsed.

use logos::Logos;

use crate::{
    diagnostics::{Diagnostic, Diagnostics, Location},
    syntax::ast::Span,
};

/// Kinds of C# tokens.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    #[regex(r"[ \t\r\n\f\u{FEFF}]+", logos::skip)]
    Whitespace,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[token("/*", lex_block_comment)]
    BlockComment,

    // #region, #nullable, #pragma and friends
    #[regex(r"#[^\n]*", logos::skip)]
    Directive,

    #[token("using")]
    Using,

    #[token("namespace")]
    Namespace,

    #[token("extern")]
    Extern,

    #[token("class")]
    Class,

    #[token("struct")]
    Struct,

    #[token("interface")]
    Interface,

    #[token("enum")]
    Enum,

    #[token("delegate")]
    Delegate,

    #[token("event")]
    Event,

    #[token("operator")]
    Operator,

    #[token("implicit")]
    Implicit,

    #[token("explicit")]
    Explicit,

    #[token("this")]
    This,

    #[token("base")]
    Base,

    #[token("public")]
    #[token("private")]
    #[token("protected")]
    #[token("internal")]
    #[token("static")]
    #[token("abstract")]
    #[token("sealed")]
    #[token("virtual")]
    #[token("override")]
    #[token("readonly")]
    #[token("unsafe")]
    #[token("new")]
    #[token("const")]
    #[token("volatile")]
    #[token("fixed")]
    Modifier,

    #[token("ref")]
    #[token("out")]
    #[token("in")]
    #[token("params")]
    ParameterModifier,

    #[token("bool")]
    #[token("byte")]
    #[token("sbyte")]
    #[token("char")]
    #[token("short")]
    #[token("ushort")]
    #[token("int")]
    #[token("uint")]
    #[token("long")]
    #[token("ulong")]
    #[token("float")]
    #[token("double")]
    #[token("decimal")]
    #[token("string")]
    #[token("object")]
    #[token("void")]
    PredefinedType,

    #[regex(r"@?[\p{L}_][\p{L}\p{N}_]*")]
    Identifier,

    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9]+)?[a-zA-Z]*")]
    #[regex(r"0[xX][0-9a-fA-F_]+[a-zA-Z]*")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?[a-zA-Z]*")]
    Number,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r#"@"([^"]|"")*""#)]
    #[regex(r#"\$@?""#, lex_interpolated)]
    #[regex(r#"@\$""#, lex_interpolated)]
    String,

    #[regex(r"'([^'\\\n]|\\.)+'")]
    Char,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,

    #[token("::")]
    DoubleColon,

    #[token(".")]
    Dot,

    #[token("=")]
    Assign,

    #[token("=>")]
    Arrow,

    #[token("?")]
    Question,

    #[token("*")]
    Star,

    #[token("~")]
    Tilde,

    #[regex(r"==|!=|<=|>=|&&|\|\||\+\+|--|<<|<<=|\?\?|\?\?=|\?\.|->|\.\.|[+\-*/%&|^]=|[+\-/%&|^!]")]
    Punct,

    /// End of input
    Eof,
}

fn lex_block_comment(lex: &mut logos::Lexer<TokenKind>) -> logos::Skip {
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => lex.bump(end + 2),
        // Unterminated comment runs to the end of input
        None => lex.bump(remainder.len()),
    }

    logos::Skip
}

/// Consumes the rest of an interpolated string, including holes that contain nested strings.
fn lex_interpolated(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let verbatim = lex.slice().contains('@');
    let bytes = lex.remainder().as_bytes();
    let mut depth = 0_usize;
    let mut index = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        let next = bytes.get(index + 1).copied();
        match byte {
            b'"' if depth == 0 => {
                if verbatim && next == Some(b'"') {
                    index += 2;
                    continue;
                }
                lex.bump(index + 1);
                return true;
            }
            b'\\' if depth == 0 && !verbatim => index += 1,
            b'\n' if depth == 0 && !verbatim => return false,
            b'{' if depth == 0 && next == Some(b'{') => index += 1,
            b'}' if depth == 0 && next == Some(b'}') => index += 1,
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'"' | b'\'' => {
                // String or char literal inside a hole
                index += 1;
                while index < bytes.len() && bytes[index] != byte {
                    if bytes[index] == b'\\' {
                        index += 1;
                    }
                    index += 1;
                }
            }
            _ => {}
        }
        index += 1;
    }

    false
}

/// A token with its kind and source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Kind of the token
    pub kind: TokenKind,
    /// Byte range in the source
    pub span: Span,
}

/// Splits `source` into tokens, terminated by a single [`TokenKind::Eof`].
///
/// # Errors
/// Returns a `CS1056` diagnostic for every character that starts no token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostics> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Diagnostics::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(kind) => tokens.push(Token { kind, span }),
            Err(()) => {
                let character = source[span.start..].chars().next().unwrap_or('\0');
                errors.push(
                    Diagnostic::error("CS1056", format!("Unexpected character '{character}'"))
                        .at(Location::from_offset(source, span.start)),
                );
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: source.len()..source.len(),
    });

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}
