//! Recursive-descent parser for C# declarations.
//!
//! The parser walks namespaces, types and members. Member bodies, initializers, attribute
//! arguments and constraint clauses are skipped as balanced token runs. Parsing stops at the
//! first syntax error.

use crate::{
    diagnostics::{Diagnostic, Location},
    syntax::{
        ast::{
            AccessorDecl, AccessorKind, Body, BodyKind, CompilationUnit, ConstructorDecl,
            ConstructorInitializer, DelegateSignature, DestructorDecl, EventDecl, FieldDecl,
            IndexerDecl, MemberDecl, MethodDecl, Modifiers, NameSegment, NamespaceDecl,
            NamespaceMember, OperatorDecl, OperatorKind, Parameter, ParameterModifier,
            PropertyDecl, Span, TypeDecl, TypeKind, TypeSyntax, UsingDirective,
            VariableDeclarator,
        },
        lexer::{Token, TokenKind},
    },
};

type ParseResult<T> = std::result::Result<T, Diagnostic>;

/// Contextual keywords that act as modifiers when a declaration follows them.
const CONTEXTUAL_MODIFIERS: &[&str] = &["partial", "async", "required", "file"];

pub(crate) struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` must end with [`TokenKind::Eof`].
    pub(crate) fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Parser {
            source,
            tokens,
            position: 0,
        }
    }

    pub(crate) fn compilation_unit(&mut self) -> ParseResult<CompilationUnit> {
        let mut unit = CompilationUnit::default();

        while self.at(TokenKind::Extern) && self.is_text_at(1, "alias") {
            self.advance();
            self.advance();
            unit.extern_aliases.push(self.identifier()?);
            self.expect(TokenKind::Semicolon)?;
        }

        unit.usings = self.using_directives()?;
        unit.members = self.namespace_members(false)?;

        Ok(unit)
    }

    // Token access

    fn peek(&self) -> TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.position + offset)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    fn span(&self) -> Span {
        self.span_at(0)
    }

    fn span_at(&self, offset: usize) -> Span {
        self.tokens
            .get(self.position + offset)
            .or(self.tokens.last())
            .map_or(self.source.len()..self.source.len(), |token| {
                token.span.clone()
            })
    }

    fn text_at(&self, offset: usize) -> &'a str {
        let span = self.span_at(offset);
        let source = self.source;
        &source[span]
    }

    fn text(&self) -> &'a str {
        self.text_at(0)
    }

    fn is_text_at(&self, offset: usize, text: &str) -> bool {
        self.peek_at(offset) == TokenKind::Identifier && self.text_at(offset) == text
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn advance(&mut self) -> Span {
        let span = self.span();
        if self.peek() != TokenKind::Eof {
            self.position += 1;
        }
        span
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// End offset of the most recently consumed token.
    fn last_end(&self) -> usize {
        self.position
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
            .map_or(0, |token| token.span.end)
    }

    fn error(&self, code: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(code, message).at(Location::from_offset(self.source, self.span().start))
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Span> {
        if self.at(kind) {
            return Ok(self.advance());
        }

        Err(self.expected(kind))
    }

    fn expected(&self, kind: TokenKind) -> Diagnostic {
        match kind {
            TokenKind::Semicolon => self.error("CS1002", "; expected"),
            TokenKind::RBrace => self.error("CS1513", "} expected"),
            TokenKind::LBrace => self.error("CS1514", "{ expected"),
            TokenKind::RParen => self.error("CS1026", ") expected"),
            TokenKind::Identifier => self.error("CS1001", "Identifier expected"),
            _ => self.error(
                "CS1003",
                format!("Syntax error, '{}' expected", describe(kind)),
            ),
        }
    }

    fn identifier(&mut self) -> ParseResult<String> {
        if !self.at(TokenKind::Identifier) {
            return Err(self.error("CS1001", "Identifier expected"));
        }

        let text = self.text();
        self.advance();
        Ok(text.strip_prefix('@').unwrap_or(text).to_string())
    }

    // Skipping

    /// Skips a balanced `open ... close` run starting at the current token.
    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) -> ParseResult<Span> {
        let start = self.expect(open)?.start;
        let mut depth = 1_usize;
        loop {
            match self.peek() {
                TokenKind::Eof => return Err(self.expected(close)),
                kind if kind == open => depth += 1,
                kind if kind == close => {
                    depth -= 1;
                    if depth == 0 {
                        let end = self.advance().end;
                        return Ok(start..end);
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Skips tokens up to, not including, the first of `stops` outside any brackets.
    fn skip_until(&mut self, stops: &[TokenKind]) -> ParseResult<()> {
        let mut depth = 0_usize;
        loop {
            let kind = self.peek();
            if depth == 0 && stops.contains(&kind) {
                return Ok(());
            }

            match kind {
                TokenKind::Eof => {
                    return Err(match stops.first() {
                        Some(stop) => self.expected(*stop),
                        None => self.error("CS1002", "; expected"),
                    })
                }
                TokenKind::Lt => {
                    // `new Dictionary<string, int>()`: the commas belong to the type
                    if let Some(length) = self.type_argument_list_length() {
                        for _ in 0..length {
                            self.advance();
                        }
                        continue;
                    }
                }
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return Err(self.error(
                            "CS1519",
                            format!("Invalid token '{}' in expression", self.text()),
                        ));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// If the current `<` opens a type argument list, the number of tokens up to and including
    /// its closing `>`.
    ///
    /// Only type-shaped tokens may appear inside, so `a < b` in an expression is not taken for
    /// one.
    fn type_argument_list_length(&self) -> Option<usize> {
        let mut depth = 0_usize;
        let mut offset = 0;
        loop {
            match self.peek_at(offset) {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(offset + 1);
                    }
                }
                TokenKind::Identifier
                | TokenKind::PredefinedType
                | TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::DoubleColon
                | TokenKind::Question
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::RBracket => {}
                _ => return None,
            }
            offset += 1;
        }
    }

    fn skip_attributes(&mut self) -> ParseResult<()> {
        while self.at(TokenKind::LBracket) {
            self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket)?;
        }
        Ok(())
    }

    fn skip_constraints(&mut self) -> ParseResult<()> {
        while self.is_text_at(0, "where") {
            self.advance();
            let mut depth = 0_usize;
            loop {
                match self.peek() {
                    TokenKind::Eof => return Err(self.error("CS1514", "{ expected")),
                    TokenKind::LParen => depth += 1,
                    TokenKind::RParen => depth = depth.saturating_sub(1),
                    TokenKind::LBrace | TokenKind::Semicolon | TokenKind::Arrow if depth == 0 => {
                        return Ok(())
                    }
                    TokenKind::Identifier if depth == 0 && self.text() == "where" => break,
                    _ => {}
                }
                self.advance();
            }
        }
        Ok(())
    }

    // Namespaces

    fn using_directives(&mut self) -> ParseResult<Vec<UsingDirective>> {
        let mut usings = Vec::new();
        loop {
            let is_global = self.is_text_at(0, "global") && self.peek_at(1) == TokenKind::Using;
            if is_global {
                self.advance();
            } else if !self.at(TokenKind::Using) {
                return Ok(usings);
            }
            self.advance();

            let is_static = self.at(TokenKind::Modifier) && self.text() == "static";
            if is_static {
                self.advance();
            }

            let alias = if self.at(TokenKind::Identifier) && self.peek_at(1) == TokenKind::Assign {
                let alias = self.identifier()?;
                self.advance();
                Some(alias)
            } else {
                None
            };

            let start = self.span().start;
            self.skip_until(&[TokenKind::Semicolon])?;
            let name = self.source[start..self.last_end()].trim().to_string();
            self.expect(TokenKind::Semicolon)?;

            usings.push(UsingDirective {
                name,
                alias,
                is_static,
                is_global,
            });
        }
    }

    fn qualified_name(&mut self) -> ParseResult<String> {
        let mut name = self.identifier()?;
        while self.eat(TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn namespace_members(&mut self, in_block: bool) -> ParseResult<Vec<NamespaceMember>> {
        let mut members = Vec::new();
        loop {
            self.skip_attributes()?;
            match self.peek() {
                TokenKind::Eof if in_block => return Err(self.error("CS1513", "} expected")),
                TokenKind::Eof => return Ok(members),
                TokenKind::RBrace if in_block => return Ok(members),
                TokenKind::Namespace => {
                    let start = self.advance().start;
                    let name = self.qualified_name()?;

                    if self.eat(TokenKind::Semicolon) {
                        let usings = self.using_directives()?;
                        let inner = self.namespace_members(in_block)?;
                        members.push(NamespaceMember::Namespace(NamespaceDecl {
                            name,
                            file_scoped: true,
                            usings,
                            members: inner,
                            span: start..self.last_end(),
                        }));
                        return Ok(members);
                    }

                    self.expect(TokenKind::LBrace)?;
                    let usings = self.using_directives()?;
                    let inner = self.namespace_members(true)?;
                    self.expect(TokenKind::RBrace)?;
                    self.eat(TokenKind::Semicolon);

                    members.push(NamespaceMember::Namespace(NamespaceDecl {
                        name,
                        file_scoped: false,
                        usings,
                        members: inner,
                        span: start..self.last_end(),
                    }));
                }
                _ => {
                    let start = self.span().start;
                    let modifiers = self.modifiers();
                    if !self.at_type_keyword() {
                        return Err(self.error(
                            "CS1022",
                            "Type or namespace definition, or end-of-file expected",
                        ));
                    }
                    members.push(NamespaceMember::Type(self.type_decl(start, modifiers)?));
                }
            }
        }
    }

    // Types

    fn modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::empty();
        loop {
            let text = self.text();
            let modifier = match self.peek() {
                TokenKind::Modifier | TokenKind::Extern => Modifiers::from_keyword(text),
                TokenKind::ParameterModifier if text == "ref" => Some(Modifiers::REF),
                TokenKind::Identifier
                    if CONTEXTUAL_MODIFIERS.contains(&text)
                        && matches!(
                            self.peek_at(1),
                            TokenKind::Identifier
                                | TokenKind::PredefinedType
                                | TokenKind::Modifier
                                | TokenKind::Class
                                | TokenKind::Struct
                                | TokenKind::Interface
                                | TokenKind::Enum
                                | TokenKind::Delegate
                                | TokenKind::Event
                                | TokenKind::LParen
                        )
                        && self.peek_at(2) != TokenKind::LParen =>
                {
                    Some(Modifiers::from_keyword(text).unwrap_or_default())
                }
                _ => None,
            };

            match modifier {
                Some(modifier) => {
                    modifiers |= modifier;
                    self.advance();
                }
                None => return modifiers,
            }
        }
    }

    fn at_type_keyword(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Class
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::Enum
                | TokenKind::Delegate
        )
    }

    fn type_decl(&mut self, start: usize, modifiers: Modifiers) -> ParseResult<TypeDecl> {
        let kind = match self.peek() {
            TokenKind::Class => TypeKind::Class,
            TokenKind::Struct => TypeKind::Struct,
            TokenKind::Interface => TypeKind::Interface,
            TokenKind::Enum => TypeKind::Enum,
            _ => TypeKind::Delegate,
        };
        self.advance();

        let mut decl = TypeDecl {
            kind,
            name: String::new(),
            type_params: Vec::new(),
            modifiers,
            bases: Vec::new(),
            members: Vec::new(),
            enumerators: Vec::new(),
            delegate: None,
            span: start..start,
        };

        match kind {
            TypeKind::Delegate => {
                let return_type = self.type_name()?;
                decl.name = self.identifier()?;
                decl.type_params = self.type_parameters()?;
                let params = self.parameters(TokenKind::LParen, TokenKind::RParen)?;
                self.skip_constraints()?;
                self.expect(TokenKind::Semicolon)?;
                decl.delegate = Some(DelegateSignature {
                    return_type,
                    params,
                });
            }
            TypeKind::Enum => {
                decl.name = self.identifier()?;
                if self.eat(TokenKind::Colon) {
                    decl.bases.push(self.type_name()?);
                }
                decl.enumerators = self.enumerators()?;
                self.eat(TokenKind::Semicolon);
            }
            TypeKind::Class | TypeKind::Struct | TypeKind::Interface => {
                decl.name = self.identifier()?;
                decl.type_params = self.type_parameters()?;
                if self.eat(TokenKind::Colon) {
                    loop {
                        decl.bases.push(self.type_name()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.skip_constraints()?;

                self.expect(TokenKind::LBrace)?;
                while !self.at(TokenKind::RBrace) {
                    if self.at(TokenKind::Eof) {
                        return Err(self.error("CS1513", "} expected"));
                    }
                    let member = self.member()?;
                    decl.members.push(member);
                }
                self.expect(TokenKind::RBrace)?;
                self.eat(TokenKind::Semicolon);
            }
        }

        decl.span = start..self.last_end();
        Ok(decl)
    }

    fn type_parameters(&mut self) -> ParseResult<Vec<String>> {
        let mut names = Vec::new();
        if !self.eat(TokenKind::Lt) {
            return Ok(names);
        }

        loop {
            self.skip_attributes()?;
            // Variance
            if self.at(TokenKind::ParameterModifier) && matches!(self.text(), "in" | "out") {
                self.advance();
            }
            names.push(self.identifier()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt)?;

        Ok(names)
    }

    fn enumerators(&mut self) -> ParseResult<Vec<String>> {
        self.expect(TokenKind::LBrace)?;
        let mut names = Vec::new();
        loop {
            self.skip_attributes()?;
            if self.eat(TokenKind::RBrace) {
                return Ok(names);
            }

            names.push(self.identifier()?);
            if self.eat(TokenKind::Assign) {
                self.skip_until(&[TokenKind::Comma, TokenKind::RBrace])?;
            }
            if !self.eat(TokenKind::Comma) {
                self.expect(TokenKind::RBrace)?;
                return Ok(names);
            }
        }
    }

    // Members

    fn member(&mut self) -> ParseResult<MemberDecl> {
        self.skip_attributes()?;
        let start = self.span().start;
        let modifiers = self.modifiers();

        match self.peek() {
            _ if self.at_type_keyword() => {
                Ok(MemberDecl::Type(self.type_decl(start, modifiers)?))
            }
            TokenKind::Tilde => {
                self.advance();
                let name = self.identifier()?;
                self.expect(TokenKind::LParen)?;
                self.expect(TokenKind::RParen)?;
                let body = self.body()?;
                Ok(MemberDecl::Destructor(DestructorDecl {
                    name,
                    body,
                    span: start..self.last_end(),
                }))
            }
            TokenKind::Event => self.event(start, modifiers),
            TokenKind::Implicit | TokenKind::Explicit => {
                let kind = if self.at(TokenKind::Implicit) {
                    OperatorKind::Implicit
                } else {
                    OperatorKind::Explicit
                };
                self.advance();
                self.expect(TokenKind::Operator)?;
                let return_type = self.type_name()?;
                self.operator(start, modifiers, kind, return_type)
            }
            TokenKind::Identifier if self.peek_at(1) == TokenKind::LParen => {
                self.constructor(start, modifiers)
            }
            TokenKind::Identifier | TokenKind::PredefinedType | TokenKind::LParen => {
                let ty = self.ty()?;
                self.typed_member(start, modifiers, ty)
            }
            _ => Err(self.invalid_member_token()),
        }
    }

    fn invalid_member_token(&self) -> Diagnostic {
        self.error(
            "CS1519",
            format!(
                "Invalid token '{}' in class, record, struct, or interface member declaration",
                self.text()
            ),
        )
    }

    fn constructor(&mut self, start: usize, modifiers: Modifiers) -> ParseResult<MemberDecl> {
        let name = self.identifier()?;
        let params = self.parameters(TokenKind::LParen, TokenKind::RParen)?;

        let initializer = if self.eat(TokenKind::Colon) {
            let initializer = match self.peek() {
                TokenKind::Base => ConstructorInitializer::Base,
                TokenKind::This => ConstructorInitializer::This,
                _ => {
                    return Err(self.error("CS1018", "Keyword 'this' or 'base' expected"));
                }
            };
            self.advance();
            self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
            Some(initializer)
        } else {
            None
        };

        let body = self.body()?;
        Ok(MemberDecl::Constructor(ConstructorDecl {
            modifiers,
            name,
            params,
            initializer,
            body,
            span: start..self.last_end(),
        }))
    }

    /// Members that start with a type: methods, properties, indexers, fields and operators.
    fn typed_member(
        &mut self,
        start: usize,
        modifiers: Modifiers,
        ty: TypeSyntax,
    ) -> ParseResult<MemberDecl> {
        if self.eat(TokenKind::Operator) {
            let mut symbol = String::new();
            while !matches!(self.peek(), TokenKind::LParen | TokenKind::Eof) && symbol.len() < 4 {
                symbol.push_str(self.text());
                self.advance();
            }
            return self.operator(start, modifiers, OperatorKind::Symbol(symbol), ty);
        }

        if self.at(TokenKind::This) {
            return self.indexer(start, modifiers, ty, None);
        }

        let mut segments = Vec::new();
        loop {
            let name = self.identifier()?;
            let args = if self.at(TokenKind::Lt) {
                self.type_arguments()?
            } else {
                Vec::new()
            };
            segments.push(NameSegment { name, args });

            if self.at(TokenKind::Dot) && self.peek_at(1) == TokenKind::This {
                self.advance();
                let interface = TypeSyntax::Named {
                    alias: None,
                    segments,
                };
                return self.indexer(start, modifiers, ty, Some(interface));
            }
            if !(self.at(TokenKind::Dot) && self.peek_at(1) == TokenKind::Identifier) {
                break;
            }
            self.advance();
        }

        let Some(NameSegment { name, args }) = segments.pop() else {
            return Err(self.error("CS1001", "Identifier expected"));
        };
        let explicit_interface = if segments.is_empty() {
            None
        } else {
            Some(TypeSyntax::Named {
                alias: None,
                segments,
            })
        };

        match self.peek() {
            TokenKind::LParen => {
                let type_params = args
                    .iter()
                    .map(|arg| match arg {
                        TypeSyntax::Named { alias: None, segments }
                            if segments.len() == 1 && segments[0].args.is_empty() =>
                        {
                            Ok(segments[0].name.clone())
                        }
                        _ => Err(self.error(
                            "CS0081",
                            "Type parameter declaration must be an identifier not a type",
                        )),
                    })
                    .collect::<ParseResult<Vec<_>>>()?;
                let params = self.parameters(TokenKind::LParen, TokenKind::RParen)?;
                self.skip_constraints()?;
                let body = self.body()?;

                Ok(MemberDecl::Method(MethodDecl {
                    modifiers,
                    return_type: ty,
                    explicit_interface,
                    name,
                    type_params,
                    params,
                    body,
                    span: start..self.last_end(),
                }))
            }
            TokenKind::LBrace | TokenKind::Arrow => {
                let (accessors, expression_body) = if self.at(TokenKind::Arrow) {
                    (Vec::new(), Some(self.expression_body()?))
                } else {
                    (self.accessors()?, None)
                };

                let has_initializer = expression_body.is_none() && self.eat(TokenKind::Assign);
                if has_initializer {
                    self.skip_until(&[TokenKind::Semicolon])?;
                    self.expect(TokenKind::Semicolon)?;
                }

                Ok(MemberDecl::Property(PropertyDecl {
                    modifiers,
                    ty,
                    explicit_interface,
                    name,
                    accessors,
                    expression_body,
                    has_initializer,
                    span: start..self.last_end(),
                }))
            }
            TokenKind::Assign | TokenKind::Comma | TokenKind::Semicolon | TokenKind::LBracket
                if explicit_interface.is_none() && args.is_empty() =>
            {
                let variables = self.variables(name)?;
                Ok(MemberDecl::Field(FieldDecl {
                    modifiers,
                    ty,
                    variables,
                    span: start..self.last_end(),
                }))
            }
            _ => Err(self.expected(TokenKind::Semicolon)),
        }
    }

    fn variables(&mut self, first: String) -> ParseResult<Vec<VariableDeclarator>> {
        let mut variables = Vec::new();
        let mut name = first;
        loop {
            // Fixed size buffer
            if self.at(TokenKind::LBracket) {
                self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket)?;
            }

            let has_initializer = self.eat(TokenKind::Assign);
            if has_initializer {
                self.skip_until(&[TokenKind::Comma, TokenKind::Semicolon])?;
            }
            variables.push(VariableDeclarator {
                name,
                has_initializer,
            });

            if !self.eat(TokenKind::Comma) {
                self.expect(TokenKind::Semicolon)?;
                return Ok(variables);
            }
            name = self.identifier()?;
        }
    }

    fn indexer(
        &mut self,
        start: usize,
        modifiers: Modifiers,
        ty: TypeSyntax,
        explicit_interface: Option<TypeSyntax>,
    ) -> ParseResult<MemberDecl> {
        self.expect(TokenKind::This)?;
        let params = self.parameters(TokenKind::LBracket, TokenKind::RBracket)?;
        let (accessors, expression_body) = if self.at(TokenKind::Arrow) {
            (Vec::new(), Some(self.expression_body()?))
        } else {
            (self.accessors()?, None)
        };

        Ok(MemberDecl::Indexer(IndexerDecl {
            modifiers,
            ty,
            explicit_interface,
            params,
            accessors,
            expression_body,
            span: start..self.last_end(),
        }))
    }

    fn event(&mut self, start: usize, modifiers: Modifiers) -> ParseResult<MemberDecl> {
        self.expect(TokenKind::Event)?;
        let ty = self.ty()?;

        let mut segments = vec![self.identifier()?];
        while self.at(TokenKind::Dot) || self.at(TokenKind::Lt) {
            if self.at(TokenKind::Lt) {
                // Generic interface of an explicit implementation
                self.type_arguments()?;
                continue;
            }
            self.advance();
            segments.push(self.identifier()?);
        }
        let name = segments.pop().unwrap_or_default();
        let explicit_interface = if segments.is_empty() {
            None
        } else {
            Some(TypeSyntax::Named {
                alias: None,
                segments: segments
                    .into_iter()
                    .map(|name| NameSegment {
                        name,
                        args: Vec::new(),
                    })
                    .collect(),
            })
        };

        if self.at(TokenKind::LBrace) {
            let accessors = self.accessors()?;
            return Ok(MemberDecl::Event(EventDecl {
                modifiers,
                ty,
                explicit_interface,
                names: vec![name],
                accessors,
                span: start..self.last_end(),
            }));
        }

        let names = self
            .variables(name)?
            .into_iter()
            .map(|variable| variable.name)
            .collect();
        Ok(MemberDecl::Event(EventDecl {
            modifiers,
            ty,
            explicit_interface,
            names,
            accessors: Vec::new(),
            span: start..self.last_end(),
        }))
    }

    fn operator(
        &mut self,
        start: usize,
        modifiers: Modifiers,
        kind: OperatorKind,
        return_type: TypeSyntax,
    ) -> ParseResult<MemberDecl> {
        let params = self.parameters(TokenKind::LParen, TokenKind::RParen)?;
        let body = self.body()?;

        Ok(MemberDecl::Operator(OperatorDecl {
            modifiers,
            kind,
            return_type,
            params,
            body,
            span: start..self.last_end(),
        }))
    }

    fn accessors(&mut self) -> ParseResult<Vec<AccessorDecl>> {
        self.expect(TokenKind::LBrace)?;
        let mut accessors = Vec::new();
        loop {
            self.skip_attributes()?;
            if self.eat(TokenKind::RBrace) {
                return Ok(accessors);
            }
            if self.at(TokenKind::Eof) {
                return Err(self.error("CS1513", "} expected"));
            }

            let start = self.span().start;
            let modifiers = self.modifiers();
            let kind = match (self.peek(), self.text()) {
                (TokenKind::Identifier, "get") => AccessorKind::Get,
                (TokenKind::Identifier, "set") => AccessorKind::Set,
                (TokenKind::Identifier, "init") => AccessorKind::Init,
                (TokenKind::Identifier, "add") => AccessorKind::Add,
                (TokenKind::Identifier, "remove") => AccessorKind::Remove,
                _ => return Err(self.error("CS1014", "A get or set accessor expected")),
            };
            self.advance();

            let body = self.body()?;
            accessors.push(AccessorDecl {
                kind,
                modifiers,
                body,
                span: start..self.last_end(),
            });
        }
    }

    /// A block body, an expression body, or `;` for none.
    fn body(&mut self) -> ParseResult<Option<Body>> {
        match self.peek() {
            TokenKind::Semicolon => {
                self.advance();
                Ok(None)
            }
            TokenKind::LBrace => {
                let span = self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
                Ok(Some(Body {
                    kind: BodyKind::Block,
                    span,
                }))
            }
            TokenKind::Arrow => Ok(Some(self.expression_body()?)),
            _ => Err(self.error("CS1002", "; expected")),
        }
    }

    fn expression_body(&mut self) -> ParseResult<Body> {
        let start = self.expect(TokenKind::Arrow)?.start;
        self.skip_until(&[TokenKind::Semicolon])?;
        let end = self.expect(TokenKind::Semicolon)?.end;

        Ok(Body {
            kind: BodyKind::Expression,
            span: start..end,
        })
    }

    fn parameters(&mut self, open: TokenKind, close: TokenKind) -> ParseResult<Vec<Parameter>> {
        self.expect(open)?;
        let mut params = Vec::new();
        if self.eat(close) {
            return Ok(params);
        }

        loop {
            self.skip_attributes()?;
            if self.is_text_at(0, "scoped") && self.peek_at(1) != TokenKind::Identifier {
                self.advance();
            }

            let modifier = match (self.peek(), self.text()) {
                (TokenKind::ParameterModifier, "ref") => Some(ParameterModifier::Ref),
                (TokenKind::ParameterModifier, "out") => Some(ParameterModifier::Out),
                (TokenKind::ParameterModifier, "in") => Some(ParameterModifier::In),
                (TokenKind::ParameterModifier, _) => Some(ParameterModifier::Params),
                (TokenKind::This, _) => Some(ParameterModifier::This),
                _ => None,
            };
            if modifier.is_some() {
                self.advance();
                // ref readonly
                if self.at(TokenKind::Modifier) && self.text() == "readonly" {
                    self.advance();
                }
            }

            let ty = self.type_name()?;
            let name = self.identifier()?;
            let has_default = self.eat(TokenKind::Assign);
            if has_default {
                self.skip_until(&[close, TokenKind::Comma])?;
            }

            params.push(Parameter {
                modifier,
                ty,
                name,
                has_default,
            });

            if !self.eat(TokenKind::Comma) {
                self.expect(close)?;
                return Ok(params);
            }
        }
    }

    // Types

    /// A type at the start of a member header. A dotted name stops before `IFace.Member`.
    fn ty(&mut self) -> ParseResult<TypeSyntax> {
        self.type_syntax(true)
    }

    /// A type in a base list, constraint, parameter or type argument. Dotted names always
    /// continue.
    fn type_name(&mut self) -> ParseResult<TypeSyntax> {
        self.type_syntax(false)
    }

    fn type_syntax(&mut self, member_header: bool) -> ParseResult<TypeSyntax> {
        let mut ty = match self.peek() {
            TokenKind::PredefinedType => {
                let keyword = self.text().to_string();
                self.advance();
                TypeSyntax::Predefined(keyword)
            }
            TokenKind::LParen => {
                self.advance();
                let mut elements = Vec::new();
                loop {
                    elements.push(self.type_name()?);
                    // Element name
                    if self.at(TokenKind::Identifier) {
                        self.advance();
                    }
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                TypeSyntax::Tuple(elements)
            }
            TokenKind::Identifier => {
                let alias = if self.peek_at(1) == TokenKind::DoubleColon {
                    let alias = self.identifier()?;
                    self.advance();
                    Some(alias)
                } else {
                    None
                };

                let mut segments = Vec::new();
                loop {
                    let name = self.identifier()?;
                    let args = if self.at(TokenKind::Lt) {
                        self.type_arguments()?
                    } else {
                        Vec::new()
                    };
                    segments.push(NameSegment { name, args });

                    // A dot followed by an identifier and then more of a type continues the
                    // name; `Type IFace.Member` is left for the member parser.
                    if self.at(TokenKind::Dot)
                        && self.peek_at(1) == TokenKind::Identifier
                        && (!member_header || self.continues_type_name())
                    {
                        self.advance();
                    } else {
                        break;
                    }
                }
                TypeSyntax::Named { alias, segments }
            }
            _ => return Err(self.error("CS1031", "Type expected")),
        };

        loop {
            match self.peek() {
                TokenKind::Question => {
                    self.advance();
                    ty = TypeSyntax::Nullable(Box::new(ty));
                }
                TokenKind::Star => {
                    self.advance();
                    ty = TypeSyntax::Pointer(Box::new(ty));
                }
                TokenKind::LBracket
                    if matches!(self.peek_at(1), TokenKind::RBracket | TokenKind::Comma) =>
                {
                    self.advance();
                    let mut rank = 1;
                    while self.eat(TokenKind::Comma) {
                        rank += 1;
                    }
                    self.expect(TokenKind::RBracket)?;
                    ty = TypeSyntax::Array {
                        element: Box::new(ty),
                        rank,
                    };
                }
                _ => return Ok(ty),
            }
        }
    }

    /// Looks past `.Identifier` (and any type arguments) to decide whether the dotted name still
    /// names a type, i.e. it is not immediately followed by a member's parameter list, accessor
    /// list or `.this`.
    fn continues_type_name(&self) -> bool {
        let mut offset = 2;
        if self.peek_at(offset) == TokenKind::Lt {
            let mut depth = 0_usize;
            loop {
                match self.peek_at(offset) {
                    TokenKind::Lt => depth += 1,
                    TokenKind::Gt => {
                        depth -= 1;
                        if depth == 0 {
                            offset += 1;
                            break;
                        }
                    }
                    TokenKind::Eof | TokenKind::Semicolon | TokenKind::LBrace => return false,
                    _ => {}
                }
                offset += 1;
            }
        }

        let member_follows = matches!(
            self.peek_at(offset),
            TokenKind::LParen
                | TokenKind::LBrace
                | TokenKind::Arrow
                | TokenKind::Semicolon
                | TokenKind::Assign
                | TokenKind::Comma
        );
        let indexer_follows =
            self.peek_at(offset) == TokenKind::Dot && self.peek_at(offset + 1) == TokenKind::This;

        !member_follows && !indexer_follows
    }

    fn type_arguments(&mut self) -> ParseResult<Vec<TypeSyntax>> {
        self.expect(TokenKind::Lt)?;
        let mut args = Vec::new();
        loop {
            args.push(self.type_name()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt)?;
        Ok(args)
    }
}

fn describe(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::LBrace => "{",
        TokenKind::RBrace => "}",
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::LBracket => "[",
        TokenKind::RBracket => "]",
        TokenKind::Lt => "<",
        TokenKind::Gt => ">",
        TokenKind::Comma => ",",
        TokenKind::Semicolon => ";",
        TokenKind::Colon => ":",
        TokenKind::Dot => ".",
        TokenKind::Assign => "=",
        TokenKind::Arrow => "=>",
        TokenKind::This => "this",
        TokenKind::Operator => "operator",
        TokenKind::Event => "event",
        _ => "token",
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        syntax::{
            ast::{
                AccessorKind, BodyKind, CompilationUnit, ConstructorInitializer, MemberDecl,
                Modifiers, NamespaceMember, OperatorKind, ParameterModifier, TypeDecl, TypeKind,
            },
            parse,
        },
        Error,
    };

    fn unit(source: &str) -> CompilationUnit {
        parse(source).unwrap().root().clone()
    }

    fn single_type(source: &str) -> TypeDecl {
        match unit(source).members.into_iter().next() {
            Some(NamespaceMember::Type(decl)) => decl,
            other => panic!("expected a type, got {other:?}"),
        }
    }

    fn error_code(source: &str) -> String {
        match parse(source) {
            Err(Error::Syntax(diagnostics)) => diagnostics.iter().next().unwrap().code.clone(),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("'{source}' parsed"),
        }
    }

    #[test]
    fn overloads() {
        let class = single_type("class C { void M(int i){} long M(string s){return 0;} }");
        assert_eq!(class.kind, TypeKind::Class);
        assert_eq!(class.members.len(), 2);

        let MemberDecl::Method(first) = &class.members[0] else {
            panic!()
        };
        assert_eq!(first.name, "M");
        assert!(first.return_type.is_void());
        assert_eq!(first.params.len(), 1);
        assert_eq!(first.params[0].ty.to_string(), "int");

        let MemberDecl::Method(second) = &class.members[1] else {
            panic!()
        };
        assert_eq!(second.return_type.to_string(), "long");
        assert_eq!(second.params[0].name, "s");
        assert_eq!(second.body.as_ref().unwrap().kind, BodyKind::Block);
    }

    #[test]
    fn namespaces_and_usings() {
        let unit = unit(
            "extern alias Lib;\n\
             using System;\n\
             using static System.Math;\n\
             using L = System.Collections.Generic.List<int>;\n\
             namespace A.B { namespace C { struct S { } } class D { } }",
        );
        assert_eq!(unit.extern_aliases, ["Lib"]);
        assert_eq!(unit.usings.len(), 3);
        assert!(unit.usings[1].is_static);
        assert_eq!(unit.usings[2].alias.as_deref(), Some("L"));
        assert_eq!(unit.usings[2].name, "System.Collections.Generic.List<int>");

        let NamespaceMember::Namespace(ns) = &unit.members[0] else {
            panic!()
        };
        assert_eq!(ns.name, "A.B");
        assert_eq!(ns.members.len(), 2);
        let NamespaceMember::Namespace(inner) = &ns.members[0] else {
            panic!()
        };
        let NamespaceMember::Type(s) = &inner.members[0] else {
            panic!()
        };
        assert_eq!(s.kind, TypeKind::Struct);
    }

    #[test]
    fn file_scoped_namespace() {
        let unit = unit("namespace N;\nusing System;\nclass A { }\ninterface I { void M(); }");
        let NamespaceMember::Namespace(ns) = &unit.members[0] else {
            panic!()
        };
        assert!(ns.file_scoped);
        assert_eq!(ns.usings.len(), 1);
        assert_eq!(ns.members.len(), 2);
    }

    #[test]
    fn constructors_and_destructor() {
        let class = single_type(
            "public class C : Base, IDisposable {
                static C() { }
                public C() : this(1) { }
                private C(int x) : base(x) => Init();
                ~C() { }
            }",
        );
        assert_eq!(class.bases.len(), 2);
        assert_eq!(class.members.len(), 4);

        let MemberDecl::Constructor(cctor) = &class.members[0] else {
            panic!()
        };
        assert!(cctor.modifiers.contains(Modifiers::STATIC));

        let MemberDecl::Constructor(ctor) = &class.members[1] else {
            panic!()
        };
        assert_eq!(ctor.initializer, Some(ConstructorInitializer::This));

        let MemberDecl::Constructor(ctor) = &class.members[2] else {
            panic!()
        };
        assert_eq!(ctor.initializer, Some(ConstructorInitializer::Base));
        assert_eq!(ctor.body.as_ref().unwrap().kind, BodyKind::Expression);

        assert!(matches!(&class.members[3], MemberDecl::Destructor(d) if d.name == "C"));
    }

    #[test]
    fn properties_and_indexers() {
        let class = single_type(
            "class C {
                int a;
                public int P { get { return a; } private set { a = value; } }
                public int Auto { get; init; } = 5;
                public int Expr => a * 2;
                public string this[int i] { get => i.ToString(); set { } }
                int IList<int>.this[int i] { get { return 0; } }
            }",
        );

        let MemberDecl::Property(p) = &class.members[1] else {
            panic!()
        };
        assert_eq!(p.accessors.len(), 2);
        assert_eq!(p.accessors[0].kind, AccessorKind::Get);
        assert_eq!(p.accessors[1].kind, AccessorKind::Set);
        assert!(p.accessors[1].modifiers.contains(Modifiers::PRIVATE));

        let MemberDecl::Property(auto) = &class.members[2] else {
            panic!()
        };
        assert!(auto.has_initializer);
        assert!(auto.accessors.iter().all(|accessor| accessor.body.is_none()));
        assert_eq!(auto.accessors[1].kind, AccessorKind::Init);

        let MemberDecl::Property(expr) = &class.members[3] else {
            panic!()
        };
        assert!(expr.accessors.is_empty());
        assert!(expr.expression_body.is_some());

        let MemberDecl::Indexer(indexer) = &class.members[4] else {
            panic!()
        };
        assert_eq!(indexer.params.len(), 1);
        assert_eq!(indexer.accessors.len(), 2);
        assert!(indexer.explicit_interface.is_none());

        let MemberDecl::Indexer(explicit) = &class.members[5] else {
            panic!()
        };
        assert_eq!(explicit.explicit_interface.as_ref().unwrap().to_string(), "IList<int>");
    }

    #[test]
    fn explicit_and_generic_methods() {
        let class = single_type(
            "class C : IFoo<int> {
                void IFoo<int>.M() { }
                System.Collections.Generic.List<T> Make<T, U>(ref T x, out U y, params int[] rest)
                    where T : class, new() where U : struct { y = default; return null; }
                public static C operator +(C a, C b) => a;
                public static implicit operator int(C c) { return 0; }
                public static bool operator >>(C a, int b) => true;
            }",
        );

        let MemberDecl::Method(explicit) = &class.members[0] else {
            panic!()
        };
        assert_eq!(explicit.name, "M");
        assert_eq!(explicit.explicit_interface.as_ref().unwrap().to_string(), "IFoo<int>");

        let MemberDecl::Method(generic) = &class.members[1] else {
            panic!()
        };
        assert_eq!(generic.type_params, ["T", "U"]);
        assert_eq!(
            generic.return_type.to_string(),
            "System.Collections.Generic.List<T>"
        );
        assert_eq!(generic.params[0].modifier, Some(ParameterModifier::Ref));
        assert_eq!(generic.params[1].modifier, Some(ParameterModifier::Out));
        assert_eq!(generic.params[2].modifier, Some(ParameterModifier::Params));
        assert_eq!(generic.params[2].ty.to_string(), "int[]");

        let MemberDecl::Operator(plus) = &class.members[2] else {
            panic!()
        };
        assert_eq!(plus.kind, OperatorKind::Symbol("+".to_string()));

        let MemberDecl::Operator(conversion) = &class.members[3] else {
            panic!()
        };
        assert_eq!(conversion.kind, OperatorKind::Implicit);
        assert_eq!(conversion.return_type.to_string(), "int");

        let MemberDecl::Operator(shift) = &class.members[4] else {
            panic!()
        };
        assert_eq!(shift.kind, OperatorKind::Symbol(">>".to_string()));
    }

    #[test]
    fn fields_events_and_nested_types() {
        let class = single_type(
            "partial class Outer<T> where T : new() {
                public const int A = 1, B = 2;
                static readonly string[] names = { \"x\", \"y\" };
                public event System.EventHandler Changed;
                event Action E { add { } remove { } }
                enum Color : byte { Red = 1, Green, Blue = Red | 4 }
                delegate void Callback(int value);
                private class Inner<U> { }
            }",
        );
        assert!(class.modifiers.contains(Modifiers::PARTIAL));
        assert_eq!(class.type_params, ["T"]);

        let MemberDecl::Field(constants) = &class.members[0] else {
            panic!()
        };
        assert!(constants.modifiers.contains(Modifiers::CONST));
        assert_eq!(constants.variables.len(), 2);

        let MemberDecl::Field(names) = &class.members[1] else {
            panic!()
        };
        assert!(names.variables[0].has_initializer);

        let MemberDecl::Event(changed) = &class.members[2] else {
            panic!()
        };
        assert!(changed.accessors.is_empty());
        assert_eq!(changed.names, ["Changed"]);

        let MemberDecl::Event(e) = &class.members[3] else {
            panic!()
        };
        assert_eq!(e.accessors.len(), 2);

        let MemberDecl::Type(color) = &class.members[4] else {
            panic!()
        };
        assert_eq!(color.kind, TypeKind::Enum);
        assert_eq!(color.enumerators, ["Red", "Green", "Blue"]);

        let MemberDecl::Type(callback) = &class.members[5] else {
            panic!()
        };
        assert_eq!(callback.kind, TypeKind::Delegate);
        assert_eq!(callback.delegate.as_ref().unwrap().params.len(), 1);

        let MemberDecl::Type(inner) = &class.members[6] else {
            panic!()
        };
        assert_eq!(inner.arity(), 1);
    }

    #[test]
    fn attributes_and_tuples() {
        let class = single_type(
            "[Serializable]
             class C {
                [Obsolete(\"x\")] public (int a, string b) Pair([In] int x = 3) => (x, \"\");
                public int? Maybe { get; set; }
                public unsafe int* Raw;
                public int[,] Grid;
             }",
        );

        let MemberDecl::Method(pair) = &class.members[0] else {
            panic!()
        };
        assert_eq!(pair.return_type.to_string(), "(int, string)");
        assert!(pair.params[0].has_default);

        let MemberDecl::Property(maybe) = &class.members[1] else {
            panic!()
        };
        assert_eq!(maybe.ty.to_string(), "int?");

        let MemberDecl::Field(raw) = &class.members[2] else {
            panic!()
        };
        assert_eq!(raw.ty.to_string(), "int*");

        let MemberDecl::Field(grid) = &class.members[3] else {
            panic!()
        };
        assert_eq!(grid.ty.to_string(), "int[,]");
    }

    #[test]
    fn generic_initializers() {
        let class = single_type(
            "class C {
                Dictionary<string, int> d = new Dictionary<string, int>(), e = null;
                static List<KeyValuePair<int, string>> pairs = new List<KeyValuePair<int, string>>();
                bool less = 1 < 2, more = 3 > 2;
                void M(Dictionary<string, int> map = null, int x = 0) { }
            }",
        );
        assert_eq!(class.members.len(), 4);

        let MemberDecl::Field(d) = &class.members[0] else {
            panic!()
        };
        assert_eq!(d.ty.to_string(), "Dictionary<string, int>");
        assert_eq!(d.variables.len(), 2);
        assert_eq!(d.variables[1].name, "e");

        let MemberDecl::Field(pairs) = &class.members[1] else {
            panic!()
        };
        assert_eq!(pairs.variables.len(), 1);

        let MemberDecl::Field(comparisons) = &class.members[2] else {
            panic!()
        };
        assert_eq!(comparisons.variables.len(), 2);

        let MemberDecl::Method(m) = &class.members[3] else {
            panic!()
        };
        assert_eq!(m.params.len(), 2);
    }

    #[test]
    fn qualified_base_types() {
        let class = single_type("class C : System.IDisposable { }");
        assert_eq!(class.bases.len(), 1);
        assert_eq!(class.bases[0].to_string(), "System.IDisposable");

        let class = single_type(
            "class E : System.Exception, System.Collections.Generic.IComparer<System.String> {
                public System.String Text;
                System.Int32 System.Collections.Generic.IComparer<System.String>.Compare(System.String a, System.String b) => 0;
            }",
        );
        assert_eq!(
            class
                .bases
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            [
                "System.Exception",
                "System.Collections.Generic.IComparer<System.String>"
            ]
        );

        let MemberDecl::Field(text) = &class.members[0] else {
            panic!()
        };
        assert_eq!(text.ty.to_string(), "System.String");

        let MemberDecl::Method(compare) = &class.members[1] else {
            panic!()
        };
        assert_eq!(compare.name, "Compare");
        assert_eq!(compare.return_type.to_string(), "System.Int32");
        assert_eq!(compare.params[0].ty.to_string(), "System.String");

        let decl = single_type("enum Flags : System.Byte { A }");
        assert_eq!(decl.bases[0].to_string(), "System.Byte");
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(error_code("class C { void M() { }"), "CS1513");
        assert_eq!(error_code("class C { int x }"), "CS1002");
        assert_eq!(error_code("class C int x; }"), "CS1514");
        assert_eq!(error_code("class { }"), "CS1001");
        assert_eq!(error_code("int x;"), "CS1022");
        assert_eq!(error_code("class C { ; }"), "CS1519");
    }

    #[test]
    fn error_location() {
        let Err(Error::Syntax(diagnostics)) = parse("class C\n{\n  int x\n}") else {
            panic!()
        };
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.code, "CS1002");
        assert_eq!(diagnostic.location.unwrap().line, 4);
    }
}
