//! Recursive-descent parser for the Nova surface language.
//!
//! Expressions use precedence climbing; statements are newline- or
//! semicolon-terminated. Two disambiguation rules worth knowing:
//!
//! - A lone `?` is postfix error propagation when the next token cannot begin
//!   an expression; otherwise it opens a ternary.
//! - `f<T>(x)` call-site type arguments are recognised by bounded lookahead
//!   for `< Ident (, Ident)* > (`; anything else is a comparison.

use crate::{
    ast::{
        Annotation, Arg, AssignOp, BinOp, BindPattern, Block, CatchClause, ClassDecl, ClassKind, CmpOp, CtorParam,
        EnumEntryDecl, Expr, FunDecl, IncDecOp, InterpPart, LambdaParam, LogicOp, MemberDecl, Modifiers, ParamDecl,
        Program, PropSpec, Span, Stmt, UnaryOp, VisibilityMod, WhenArm, WhenSubject, WhenTest,
    },
    error::NovaError,
    lexer::{Lexer, StrPart, Tok, Token},
};

/// Parses a full compilation unit.
pub fn parse(source: &str) -> Result<Program, NovaError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).program()
}

/// Parses a single expression (used for string-interpolation fragments).
fn parse_fragment(source: &str, line: u32, column: u32) -> Result<Expr, NovaError> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|err| NovaError::syntax(line, column, format!("in interpolation: {}", err.message)))?;
    let mut parser = Parser::new(tokens);
    parser.skip_newlines();
    let expr = parser.expression()?;
    parser.skip_newlines();
    if !parser.at(&Tok::Eof) {
        return Err(NovaError::syntax(line, column, "unexpected trailing tokens in interpolation"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Suppresses bare trailing-lambda attachment (`x { ... }`) while parsing
    /// an expression that a `{` block must follow, e.g. an `if let` value.
    no_trailing_lambda: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            no_trailing_lambda: false,
        }
    }

    /// Parses an expression with bare trailing-lambda attachment disabled.
    fn expr_before_block(&mut self) -> Result<Expr, NovaError> {
        let saved = self.no_trailing_lambda;
        self.no_trailing_lambda = true;
        let result = self.expression();
        self.no_trailing_lambda = saved;
        result
    }

    // --- token plumbing ---

    fn peek(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn span(&self) -> Span {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        Span::new(token.line, token.column)
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn at_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s == name)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.at_ident(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<Token, NovaError> {
        if self.at(tok) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, NovaError> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected {what}, found {other:?}"))),
        }
    }

    fn error(&self, message: impl std::fmt::Display) -> NovaError {
        let span = self.span();
        NovaError::syntax(span.line, span.column, message)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Tok::Newline | Tok::Semi) {
            self.advance();
        }
    }

    /// Consumes a statement terminator (newline, `;`, `}` lookahead, or EOF).
    fn terminate_stmt(&mut self) -> Result<(), NovaError> {
        match self.peek() {
            Tok::Newline | Tok::Semi => {
                self.advance();
                Ok(())
            }
            Tok::RBrace | Tok::Eof => Ok(()),
            other => Err(self.error(format!("expected end of statement, found {other:?}"))),
        }
    }

    // --- program and statements ---

    fn program(&mut self) -> Result<Program, NovaError> {
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !self.at(&Tok::Eof) {
            stmts.push(self.statement()?);
            self.terminate_stmt()?;
            self.skip_newlines();
        }
        Ok(Program { stmts })
    }

    fn block(&mut self) -> Result<Block, NovaError> {
        self.expect(&Tok::LBrace, "'{'")?;
        self.block_body()
    }

    /// Parses statements up to and including the closing `}`.
    fn block_body(&mut self) -> Result<Block, NovaError> {
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !self.at(&Tok::RBrace) {
            if self.at(&Tok::Eof) {
                return Err(self.error("unterminated block"));
            }
            stmts.push(self.statement()?);
            if self.at(&Tok::RBrace) {
                break;
            }
            self.terminate_stmt()?;
            self.skip_newlines();
        }
        self.expect(&Tok::RBrace, "'}'")?;
        Ok(Block { stmts })
    }

    /// Parses either a braced block or a single statement as a one-entry block.
    fn block_or_single(&mut self) -> Result<Block, NovaError> {
        if self.at(&Tok::LBrace) {
            self.block()
        } else {
            self.skip_newlines();
            let stmt = self.statement()?;
            Ok(Block { stmts: vec![stmt] })
        }
    }

    fn statement(&mut self) -> Result<Stmt, NovaError> {
        let annotations = self.annotations()?;
        let modifiers = self.modifiers();

        match self.peek() {
            Tok::Fun => {
                let fun = self.fun_decl(modifiers, annotations)?;
                return Ok(Stmt::Fun(fun));
            }
            Tok::Class | Tok::Interface | Tok::Object | Tok::Enum => {
                return Ok(Stmt::Class(self.class_decl(modifiers, annotations)?));
            }
            Tok::Ident(name) if name == "annotation" && matches!(self.peek_at(1), Tok::Class) => {
                self.advance();
                let mut decl = self.class_decl(modifiers, annotations)?;
                decl.kind = ClassKind::Annotation;
                return Ok(Stmt::Class(decl));
            }
            _ => {}
        }

        if !annotations.is_empty() {
            return Err(self.error("annotations are only allowed on declarations"));
        }

        match self.peek().clone() {
            Tok::Val | Tok::Var => self.binding_stmt(),
            Tok::While => self.while_stmt(),
            Tok::For => self.for_stmt(),
            Tok::Ident(name) if name == "guard" && matches!(self.peek_at(1), Tok::Ident(n) if n == "let") => {
                self.guard_let_stmt()
            }
            _ => self.expr_or_assign_stmt(),
        }
    }

    fn annotations(&mut self) -> Result<Vec<Annotation>, NovaError> {
        let mut annotations = Vec::new();
        while self.at(&Tok::At) {
            self.advance();
            let name = self.expect_ident("annotation name")?;
            let args = if self.at(&Tok::LParen) {
                self.call_args()?
            } else {
                Vec::new()
            };
            self.skip_newlines();
            annotations.push(Annotation { name, args });
        }
        Ok(annotations)
    }

    fn modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();
        loop {
            match self.peek() {
                Tok::Ident(name) => match name.as_str() {
                    // Contextual keywords: only treated as modifiers when a
                    // declaration keyword can still follow.
                    "abstract" if self.decl_follows() => {
                        modifiers.is_abstract = true;
                        self.advance();
                    }
                    "sealed" if self.decl_follows() => {
                        modifiers.is_sealed = true;
                        self.advance();
                    }
                    "data" if matches!(self.peek_at(1), Tok::Class) => {
                        modifiers.is_data = true;
                        self.advance();
                    }
                    "open" if self.decl_follows() => {
                        modifiers.is_open = true;
                        self.advance();
                    }
                    "override" if self.decl_follows() => {
                        modifiers.is_override = true;
                        self.advance();
                    }
                    "inline" if self.decl_follows() => {
                        modifiers.is_inline = true;
                        self.advance();
                    }
                    "private" if self.decl_follows() => {
                        modifiers.visibility = VisibilityMod::Private;
                        self.advance();
                    }
                    "protected" if self.decl_follows() => {
                        modifiers.visibility = VisibilityMod::Protected;
                        self.advance();
                    }
                    "public" if self.decl_follows() => {
                        modifiers.visibility = VisibilityMod::Public;
                        self.advance();
                    }
                    _ => return modifiers,
                },
                _ => return modifiers,
            }
        }
    }

    /// Whether a declaration keyword (possibly after more modifiers) follows
    /// the current contextual-modifier candidate.
    fn decl_follows(&self) -> bool {
        let mut offset = 1;
        loop {
            match self.peek_at(offset) {
                Tok::Fun | Tok::Class | Tok::Interface | Tok::Object | Tok::Enum | Tok::Val | Tok::Var | Tok::Constructor => {
                    return true;
                }
                Tok::Ident(name)
                    if matches!(
                        name.as_str(),
                        "abstract" | "sealed" | "data" | "open" | "override" | "inline" | "private" | "protected" | "public" | "annotation"
                    ) =>
                {
                    offset += 1;
                }
                _ => return false,
            }
        }
    }

    fn binding_stmt(&mut self) -> Result<Stmt, NovaError> {
        let span = self.span();
        let mutable = matches!(self.peek(), Tok::Var);
        self.advance();

        // Extension property: `val String.name get() = expr`
        if let Tok::Ident(receiver) = self.peek().clone()
            && matches!(self.peek_at(1), Tok::Dot)
        {
            self.advance();
            self.advance();
            let name = self.expect_ident("extension property name")?;
            if self.at(&Tok::Colon) {
                self.advance();
                self.type_name()?;
            }
            self.skip_newlines();
            if !self.eat_ident("get") {
                return Err(self.error("expected 'get' in extension property"));
            }
            self.expect(&Tok::LParen, "'('")?;
            self.expect(&Tok::RParen, "')'")?;
            self.expect(&Tok::Assign, "'='")?;
            let body = self.expression()?;
            return Ok(Stmt::ExtProp {
                receiver,
                name,
                body,
                span,
            });
        }

        let pattern = self.bind_pattern()?;
        if self.at(&Tok::Colon) {
            self.advance();
            self.type_name()?;
        }
        self.expect(&Tok::Assign, "'=' after binding")?;
        let init = self.expression()?;
        Ok(if mutable {
            Stmt::Var { pattern, init, span }
        } else {
            Stmt::Val { pattern, init, span }
        })
    }

    fn bind_pattern(&mut self) -> Result<BindPattern, NovaError> {
        if self.at(&Tok::LParen) {
            self.advance();
            let mut names = Vec::new();
            loop {
                let name = self.expect_ident("binding name")?;
                names.push((name != "_").then_some(name));
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            self.expect(&Tok::RParen, "')'")?;
            Ok(BindPattern::Tuple(names))
        } else {
            Ok(BindPattern::Name(self.expect_ident("binding name")?))
        }
    }

    fn while_stmt(&mut self) -> Result<Stmt, NovaError> {
        let span = self.span();
        self.advance();
        self.expect(&Tok::LParen, "'(' after while")?;
        let cond = self.expression()?;
        self.expect(&Tok::RParen, "')'")?;
        let body = self.block_or_single()?;
        Ok(Stmt::While { cond, body, span })
    }

    fn for_stmt(&mut self) -> Result<Stmt, NovaError> {
        let span = self.span();
        self.advance();
        self.expect(&Tok::LParen, "'(' after for")?;
        let pattern = self.bind_pattern()?;
        self.expect(&Tok::In, "'in'")?;
        let iter = self.expression()?;
        self.expect(&Tok::RParen, "')'")?;
        let body = self.block_or_single()?;
        Ok(Stmt::For {
            pattern,
            iter,
            body,
            span,
        })
    }

    fn guard_let_stmt(&mut self) -> Result<Stmt, NovaError> {
        let span = self.span();
        self.advance(); // guard
        self.advance(); // let
        let name = self.expect_ident("binding name")?;
        self.expect(&Tok::Assign, "'='")?;
        let init = self.expression()?;
        if !self.eat(&Tok::Else) {
            return Err(self.error("expected 'else' in guard let"));
        }
        let else_body = self.block()?;
        Ok(Stmt::GuardLet {
            name,
            init,
            else_body,
            span,
        })
    }

    fn expr_or_assign_stmt(&mut self) -> Result<Stmt, NovaError> {
        let span = self.span();
        let expr = self.expression()?;
        let op = match self.peek() {
            Tok::Assign => AssignOp::Set,
            Tok::PlusEq => AssignOp::Add,
            Tok::MinusEq => AssignOp::Sub,
            Tok::StarEq => AssignOp::Mul,
            Tok::SlashEq => AssignOp::Div,
            Tok::PercentEq => AssignOp::Rem,
            Tok::NullAssign => AssignOp::NullCoalesce,
            _ => return Ok(Stmt::Expr(expr)),
        };
        if !matches!(expr, Expr::Ident(..) | Expr::Member { .. } | Expr::Index { .. }) {
            return Err(self.error("invalid assignment target"));
        }
        self.advance();
        let value = self.expression()?;
        Ok(Stmt::Assign {
            target: expr,
            op,
            value,
            span,
        })
    }

    // --- types ---

    /// Parses a type reference, returning its simple base name.
    ///
    /// Generic arguments and the nullable suffix are accepted and discarded:
    /// types only matter at runtime for casts, `is`-checks, and arrays.
    fn type_name(&mut self) -> Result<String, NovaError> {
        let mut name = self.expect_ident("type name")?;
        while self.at(&Tok::Dot) {
            self.advance();
            let segment = self.expect_ident("type name segment")?;
            name.push('.');
            name.push_str(&segment);
        }
        if self.at(&Tok::Lt) {
            let mut depth = 0_u32;
            loop {
                match self.peek() {
                    Tok::Lt => depth += 1,
                    Tok::Gt => {
                        depth -= 1;
                        if depth == 0 {
                            self.advance();
                            break;
                        }
                    }
                    Tok::Eof => return Err(self.error("unterminated type arguments")),
                    _ => {}
                }
                self.advance();
            }
        }
        self.eat(&Tok::Question);
        // `(Int) -> Int` style function types reduce to "Function"
        Ok(name)
    }

    // --- functions and classes ---

    fn fun_decl(&mut self, modifiers: Modifiers, annotations: Vec<Annotation>) -> Result<FunDecl, NovaError> {
        let span = self.span();
        self.expect(&Tok::Fun, "'fun'")?;

        let mut type_params = Vec::new();
        if self.at(&Tok::Lt) {
            self.advance();
            loop {
                self.eat_ident("reified");
                type_params.push(self.expect_ident("type parameter")?);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            self.expect(&Tok::Gt, "'>'")?;
        }

        let mut name = self.expect_ident("function name")?;
        let mut receiver = None;
        while self.at(&Tok::Dot) {
            self.advance();
            let next = self.expect_ident("function name")?;
            receiver = Some(match receiver {
                None => name,
                Some(prefix) => format!("{prefix}.{name}"),
            });
            name = next;
        }

        let params = self.param_list()?;
        if self.at(&Tok::Colon) {
            self.advance();
            self.type_name()?;
        }
        let (body, has_body) = if self.eat(&Tok::Assign) {
            self.skip_newlines();
            let expr = self.expression()?;
            (
                Block {
                    stmts: vec![Stmt::Expr(expr)],
                },
                true,
            )
        } else if self.at(&Tok::LBrace) {
            (self.block()?, true)
        } else {
            // abstract/interface method without a body
            (Block::default(), false)
        };
        Ok(FunDecl {
            name,
            receiver,
            type_params,
            params,
            body,
            has_body,
            modifiers,
            annotations,
            span,
        })
    }

    fn param_list(&mut self) -> Result<Vec<ParamDecl>, NovaError> {
        self.expect(&Tok::LParen, "'('")?;
        let mut params = Vec::new();
        self.skip_newlines();
        while !self.at(&Tok::RParen) {
            let name = self.expect_ident("parameter name")?;
            let ty = if self.eat(&Tok::Colon) {
                Some(self.type_name()?)
            } else {
                None
            };
            let default = if self.eat(&Tok::Assign) {
                Some(self.expression()?)
            } else {
                None
            };
            params.push(ParamDecl { name, ty, default });
            if !self.eat(&Tok::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.expect(&Tok::RParen, "')'")?;
        Ok(params)
    }

    fn class_decl(&mut self, modifiers: Modifiers, annotations: Vec<Annotation>) -> Result<ClassDecl, NovaError> {
        let span = self.span();
        let kind = match self.peek() {
            Tok::Class => {
                self.advance();
                ClassKind::Class
            }
            Tok::Interface => {
                self.advance();
                ClassKind::Interface
            }
            Tok::Object => {
                self.advance();
                ClassKind::Object
            }
            Tok::Enum => {
                self.advance();
                self.expect(&Tok::Class, "'class' after 'enum'")?;
                ClassKind::Enum
            }
            other => return Err(self.error(format!("expected class-like declaration, found {other:?}"))),
        };
        let name = self.expect_ident("class name")?;

        let mut type_params = Vec::new();
        if self.at(&Tok::Lt) {
            self.advance();
            loop {
                self.eat_ident("reified");
                type_params.push(self.expect_ident("type parameter")?);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            self.expect(&Tok::Gt, "'>'")?;
        }

        let primary = if self.at(&Tok::LParen) {
            Some(self.ctor_param_list()?)
        } else {
            None
        };

        let mut superclass = None;
        let mut interfaces = Vec::new();
        if self.eat(&Tok::Colon) {
            loop {
                self.skip_newlines();
                let super_name = self.type_name()?;
                if self.at(&Tok::LParen) {
                    if superclass.is_some() {
                        return Err(self.error("only one superclass constructor call is allowed"));
                    }
                    let args = self.call_args()?;
                    superclass = Some((super_name, args));
                } else {
                    interfaces.push(super_name);
                }
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }

        let mut members = Vec::new();
        let mut enum_entries = Vec::new();
        if self.at(&Tok::LBrace) {
            self.advance();
            self.skip_newlines();
            if kind == ClassKind::Enum {
                while let Tok::Ident(_) = self.peek() {
                    // entry list ends at ';' or '}'
                    let entry_name = self.expect_ident("enum entry")?;
                    let args = if self.at(&Tok::LParen) {
                        self.call_args()?
                    } else {
                        Vec::new()
                    };
                    enum_entries.push(EnumEntryDecl { name: entry_name, args });
                    self.skip_newlines();
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                    self.skip_newlines();
                }
                self.skip_newlines();
                self.eat(&Tok::Semi);
                self.skip_newlines();
            }
            while !self.at(&Tok::RBrace) {
                if self.at(&Tok::Eof) {
                    return Err(self.error("unterminated class body"));
                }
                members.push(self.member_decl()?);
                self.skip_newlines();
            }
            self.expect(&Tok::RBrace, "'}'")?;
        }

        Ok(ClassDecl {
            kind,
            name,
            annotations,
            modifiers,
            type_params,
            primary,
            superclass,
            interfaces,
            members,
            enum_entries,
            span,
        })
    }

    fn ctor_param_list(&mut self) -> Result<Vec<CtorParam>, NovaError> {
        self.expect(&Tok::LParen, "'('")?;
        let mut params = Vec::new();
        self.skip_newlines();
        while !self.at(&Tok::RParen) {
            let modifiers = self.modifiers_for_ctor_param();
            let prop = match self.peek() {
                Tok::Val => {
                    self.advance();
                    Some(PropSpec {
                        mutable: false,
                        visibility: modifiers,
                    })
                }
                Tok::Var => {
                    self.advance();
                    Some(PropSpec {
                        mutable: true,
                        visibility: modifiers,
                    })
                }
                _ => None,
            };
            let name = self.expect_ident("constructor parameter")?;
            let ty = if self.eat(&Tok::Colon) {
                Some(self.type_name()?)
            } else {
                None
            };
            let default = if self.eat(&Tok::Assign) {
                Some(self.expression()?)
            } else {
                None
            };
            params.push(CtorParam {
                name,
                ty,
                default,
                prop,
            });
            if !self.eat(&Tok::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.expect(&Tok::RParen, "')'")?;
        Ok(params)
    }

    fn modifiers_for_ctor_param(&mut self) -> VisibilityMod {
        match self.peek() {
            Tok::Ident(name) if name == "private" && matches!(self.peek_at(1), Tok::Val | Tok::Var) => {
                self.advance();
                VisibilityMod::Private
            }
            Tok::Ident(name) if name == "protected" && matches!(self.peek_at(1), Tok::Val | Tok::Var) => {
                self.advance();
                VisibilityMod::Protected
            }
            _ => VisibilityMod::Public,
        }
    }

    fn member_decl(&mut self) -> Result<MemberDecl, NovaError> {
        let annotations = self.annotations()?;
        let modifiers = self.modifiers();
        match self.peek().clone() {
            Tok::Fun => Ok(MemberDecl::Method(self.fun_decl(modifiers, annotations)?)),
            Tok::Init => {
                self.advance();
                Ok(MemberDecl::Init(self.block()?))
            }
            Tok::Constructor => {
                let span = self.span();
                self.advance();
                let params = self.param_list()?;
                let delegate = if self.eat(&Tok::Colon) {
                    self.expect(&Tok::This, "'this' delegation")?;
                    Some(self.call_args()?)
                } else {
                    None
                };
                let body = if self.at(&Tok::LBrace) {
                    self.block()?
                } else {
                    Block::default()
                };
                Ok(MemberDecl::SecondaryCtor {
                    params,
                    delegate,
                    body,
                    span,
                })
            }
            Tok::Companion => {
                self.advance();
                self.expect(&Tok::Object, "'object' after 'companion'")?;
                let name = if let Tok::Ident(n) = self.peek().clone() {
                    self.advance();
                    Some(n)
                } else {
                    None
                };
                self.expect(&Tok::LBrace, "'{'")?;
                self.skip_newlines();
                let mut members = Vec::new();
                while !self.at(&Tok::RBrace) {
                    if self.at(&Tok::Eof) {
                        return Err(self.error("unterminated companion object"));
                    }
                    members.push(self.member_decl()?);
                    self.skip_newlines();
                }
                self.expect(&Tok::RBrace, "'}'")?;
                Ok(MemberDecl::Companion { name, members })
            }
            Tok::Val | Tok::Var => {
                let span = self.span();
                let mutable = matches!(self.peek(), Tok::Var);
                self.advance();
                let name = self.expect_ident("property name")?;
                if self.eat(&Tok::Colon) {
                    self.type_name()?;
                }
                let init = if self.eat(&Tok::Assign) {
                    Some(self.expression()?)
                } else {
                    None
                };
                self.terminate_stmt()?;
                Ok(MemberDecl::Property {
                    name,
                    mutable,
                    visibility: match modifiers.visibility {
                        VisibilityMod::Public => VisibilityMod::Public,
                        other => other,
                    },
                    init,
                    span,
                })
            }
            other => Err(self.error(format!("unexpected token in class body: {other:?}"))),
        }
    }

    // --- expressions ---

    fn expression(&mut self) -> Result<Expr, NovaError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, NovaError> {
        let cond = self.pipeline()?;
        if self.at(&Tok::Question) && starts_expr(self.peek_at(1)) {
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let then = self.expression()?;
            self.skip_newlines();
            self.expect(&Tok::Colon, "':' in ternary")?;
            self.skip_newlines();
            let els = self.expression()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
                span,
            });
        }
        Ok(cond)
    }

    fn pipeline(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.elvis()?;
        while self.at(&Tok::Pipeline) {
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.elvis()?;
            lhs = Expr::Pipeline {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn elvis(&mut self) -> Result<Expr, NovaError> {
        let lhs = self.logic_or()?;
        if self.at(&Tok::Elvis) {
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.elvis()?;
            return Ok(Expr::Elvis {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }
        Ok(lhs)
    }

    fn logic_or(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.logic_and()?;
        while self.at(&Tok::OrOr) {
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.logic_and()?;
            lhs = Expr::Logic {
                op: LogicOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn logic_and(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.equality()?;
        while self.at(&Tok::AndAnd) {
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.equality()?;
            lhs = Expr::Logic {
                op: LogicOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinOp::Eq,
                Tok::NotEq => BinOp::NotEq,
                _ => return Ok(lhs),
            };
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.comparison()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
    }

    /// Comparison level; collects `a < b < c` chains into one node with the
    /// middle operands evaluated once after lowering.
    fn comparison(&mut self) -> Result<Expr, NovaError> {
        let first = self.containment()?;
        let mut operands = vec![first];
        let mut ops = Vec::new();
        let span = self.span();
        loop {
            let op = match self.peek() {
                Tok::Lt if !self.type_args_ahead() => CmpOp::Lt,
                Tok::LtEq => CmpOp::LtEq,
                Tok::Gt => CmpOp::Gt,
                Tok::GtEq => CmpOp::GtEq,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            ops.push(op);
            operands.push(self.containment()?);
        }
        Ok(match (operands.len(), ops.len()) {
            (1, 0) => operands.pop().unwrap_or(Expr::Null(span)),
            (2, 1) => {
                let rhs = operands.pop().unwrap_or(Expr::Null(span));
                let lhs = operands.pop().unwrap_or(Expr::Null(span));
                Expr::Binary {
                    op: match ops[0] {
                        CmpOp::Lt => BinOp::Lt,
                        CmpOp::LtEq => BinOp::LtEq,
                        CmpOp::Gt => BinOp::Gt,
                        CmpOp::GtEq => BinOp::GtEq,
                    },
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    span,
                }
            }
            _ => Expr::Chained { operands, ops, span },
        })
    }

    /// `in`/`!in`/`is`/`!is` checks.
    fn containment(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.infix_to()?;
        loop {
            match self.peek() {
                Tok::In => {
                    let span = self.span();
                    self.advance();
                    let collection = self.infix_to()?;
                    lhs = Expr::InOp {
                        item: Box::new(lhs),
                        collection: Box::new(collection),
                        negated: false,
                        span,
                    };
                }
                Tok::NotIn => {
                    let span = self.span();
                    self.advance();
                    let collection = self.infix_to()?;
                    lhs = Expr::InOp {
                        item: Box::new(lhs),
                        collection: Box::new(collection),
                        negated: true,
                        span,
                    };
                }
                Tok::Is => {
                    let span = self.span();
                    self.advance();
                    let ty = self.type_name()?;
                    lhs = Expr::Is {
                        expr: Box::new(lhs),
                        ty,
                        negated: false,
                        span,
                    };
                }
                Tok::NotIs => {
                    let span = self.span();
                    self.advance();
                    let ty = self.type_name()?;
                    lhs = Expr::Is {
                        expr: Box::new(lhs),
                        ty,
                        negated: true,
                        span,
                    };
                }
                _ => return Ok(lhs),
            }
        }
    }

    /// The `to` pair-building infix function.
    fn infix_to(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.range()?;
        while self.at_ident("to") {
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.range()?;
            lhs = Expr::MethodCall {
                recv: Box::new(lhs),
                name: "to".to_owned(),
                type_args: Vec::new(),
                args: vec![Arg::positional(rhs)],
                safe: false,
                on_super: false,
                span,
            };
        }
        Ok(lhs)
    }

    fn range(&mut self) -> Result<Expr, NovaError> {
        let lhs = self.additive()?;
        let inclusive = match self.peek() {
            Tok::DotDot => true,
            Tok::DotDotLt => false,
            _ => return Ok(lhs),
        };
        let span = self.span();
        self.advance();
        // `a..` (open-ended slice) appears inside index brackets; the end
        // defaults to the last element.
        let rhs = if matches!(self.peek(), Tok::RBracket | Tok::Comma) {
            Expr::Int(-1, span)
        } else {
            self.additive()?
        };
        Ok(Expr::Range {
            start: Box::new(lhs),
            end: Box::new(rhs),
            inclusive,
            span,
        })
    }

    fn additive(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.cast()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Rem,
                _ => return Ok(lhs),
            };
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.cast()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
    }

    fn cast(&mut self) -> Result<Expr, NovaError> {
        let mut lhs = self.unary()?;
        loop {
            let safe = match self.peek() {
                Tok::As => false,
                Tok::SafeAs => true,
                _ => return Ok(lhs),
            };
            let span = self.span();
            self.advance();
            let ty = self.type_name()?;
            lhs = Expr::Cast {
                expr: Box::new(lhs),
                ty,
                safe,
                span,
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, NovaError> {
        let span = self.span();
        match self.peek() {
            Tok::Bang => {
                self.advance();
                let expr = self.unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                    span,
                })
            }
            Tok::Minus => {
                self.advance();
                let expr = self.unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                    span,
                })
            }
            Tok::Plus => {
                self.advance();
                let expr = self.unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Plus,
                    expr: Box::new(expr),
                    span,
                })
            }
            Tok::PlusPlus => {
                self.advance();
                let target = self.unary()?;
                Ok(Expr::IncDec {
                    op: IncDecOp::Inc,
                    target: Box::new(target),
                    prefix: true,
                    span,
                })
            }
            Tok::MinusMinus => {
                self.advance();
                let target = self.unary()?;
                Ok(Expr::IncDec {
                    op: IncDecOp::Dec,
                    target: Box::new(target),
                    prefix: true,
                    span,
                })
            }
            _ => self.postfix(),
        }
    }

    /// Whether `< T (, T)* > (` follows, marking call-site type arguments.
    fn type_args_ahead(&self) -> bool {
        if !matches!(self.peek(), Tok::Lt) {
            return false;
        }
        let mut offset = 1;
        loop {
            match self.peek_at(offset) {
                Tok::Ident(_) => offset += 1,
                _ => return false,
            }
            match self.peek_at(offset) {
                Tok::Comma => offset += 1,
                Tok::Gt => return matches!(self.peek_at(offset + 1), Tok::LParen),
                _ => return false,
            }
        }
    }

    fn postfix(&mut self) -> Result<Expr, NovaError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().clone() {
                Tok::Dot | Tok::SafeDot => {
                    let safe = matches!(self.peek(), Tok::SafeDot);
                    let span = self.span();
                    self.advance();
                    self.skip_newlines();
                    let name = self.expect_ident("member name")?;
                    let type_args = if self.type_args_ahead() {
                        self.parse_type_args()?
                    } else {
                        Vec::new()
                    };
                    if self.at(&Tok::LParen) {
                        let args = self.call_args_with_trailing_lambda()?;
                        expr = Expr::MethodCall {
                            recv: Box::new(expr),
                            name,
                            type_args,
                            args,
                            safe,
                            on_super: false,
                            span,
                        };
                    } else if self.at(&Tok::LBrace) {
                        let lambda = self.lambda()?;
                        expr = Expr::MethodCall {
                            recv: Box::new(expr),
                            name,
                            type_args,
                            args: vec![Arg::positional(lambda)],
                            safe,
                            on_super: false,
                            span,
                        };
                    } else {
                        expr = Expr::Member {
                            recv: Box::new(expr),
                            name,
                            safe,
                            on_super: false,
                            span,
                        };
                    }
                }
                Tok::LParen => {
                    let span = self.span();
                    let type_args = Vec::new();
                    let args = self.call_args_with_trailing_lambda()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        type_args,
                        args,
                        span,
                    };
                }
                Tok::Lt if self.type_args_ahead() => {
                    let span = self.span();
                    let type_args = self.parse_type_args()?;
                    let args = self.call_args_with_trailing_lambda()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        type_args,
                        args,
                        span,
                    };
                }
                Tok::LBracket | Tok::SafeBracket => {
                    let safe = matches!(self.peek(), Tok::SafeBracket);
                    let span = self.span();
                    self.advance();
                    let mut args = Vec::new();
                    loop {
                        args.push(self.index_arg()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                    self.expect(&Tok::RBracket, "']'")?;
                    expr = Expr::Index {
                        recv: Box::new(expr),
                        args,
                        safe,
                        span,
                    };
                }
                Tok::LBrace if !self.no_trailing_lambda && matches!(expr, Expr::Ident(..) | Expr::Call { .. }) => {
                    // bare trailing lambda: `scope { ... }` / `f(x) { ... }`
                    let span = self.span();
                    let lambda = self.lambda()?;
                    expr = match expr {
                        Expr::Call {
                            callee,
                            type_args,
                            mut args,
                            span: call_span,
                        } => {
                            args.push(Arg::positional(lambda));
                            Expr::Call {
                                callee,
                                type_args,
                                args,
                                span: call_span,
                            }
                        }
                        other => Expr::Call {
                            callee: Box::new(other),
                            type_args: Vec::new(),
                            args: vec![Arg::positional(lambda)],
                            span,
                        },
                    };
                }
                Tok::PlusPlus => {
                    let span = self.span();
                    self.advance();
                    expr = Expr::IncDec {
                        op: IncDecOp::Inc,
                        target: Box::new(expr),
                        prefix: false,
                        span,
                    };
                }
                Tok::MinusMinus => {
                    let span = self.span();
                    self.advance();
                    expr = Expr::IncDec {
                        op: IncDecOp::Dec,
                        target: Box::new(expr),
                        prefix: false,
                        span,
                    };
                }
                Tok::Question if !starts_expr(self.peek_at(1)) => {
                    let span = self.span();
                    self.advance();
                    expr = Expr::Propagate {
                        expr: Box::new(expr),
                        span,
                    };
                }
                Tok::ColonColon => {
                    let span = self.span();
                    let qualifier = match &expr {
                        Expr::Ident(name, _) => name.clone(),
                        _ => return Err(self.error("method references require a type name qualifier")),
                    };
                    self.advance();
                    let name = if self.at(&Tok::Class) {
                        self.advance();
                        "class".to_owned()
                    } else {
                        self.expect_ident("member name after '::'")?
                    };
                    expr = Expr::MethodRef {
                        qualifier: Some(qualifier),
                        name,
                        span,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_type_args(&mut self) -> Result<Vec<String>, NovaError> {
        self.expect(&Tok::Lt, "'<'")?;
        let mut args = Vec::new();
        loop {
            args.push(self.expect_ident("type argument")?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(&Tok::Gt, "'>'")?;
        Ok(args)
    }

    /// One `[...]` index argument: a slice form or a plain expression.
    ///
    /// Open-ended slices `a..` and `..b` only exist inside brackets; the
    /// range rule itself handles the missing right operand.
    fn index_arg(&mut self) -> Result<Expr, NovaError> {
        let span = self.span();
        if matches!(self.peek(), Tok::DotDot | Tok::DotDotLt) {
            let inclusive = matches!(self.peek(), Tok::DotDot);
            self.advance();
            let end = self.expression()?;
            return Ok(Expr::Range {
                start: Box::new(Expr::Int(0, span)),
                end: Box::new(end),
                inclusive,
                span,
            });
        }
        self.expression()
    }

    fn call_args(&mut self) -> Result<Vec<Arg>, NovaError> {
        self.expect(&Tok::LParen, "'('")?;
        let saved = self.no_trailing_lambda;
        self.no_trailing_lambda = false;
        let mut args = Vec::new();
        self.skip_newlines();
        while !self.at(&Tok::RParen) {
            let arg = self.call_arg();
            match arg {
                Ok(arg) => args.push(arg),
                Err(err) => {
                    self.no_trailing_lambda = saved;
                    return Err(err);
                }
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.no_trailing_lambda = saved;
        self.expect(&Tok::RParen, "')'")?;
        Ok(args)
    }

    fn call_args_with_trailing_lambda(&mut self) -> Result<Vec<Arg>, NovaError> {
        let mut args = self.call_args()?;
        if self.at(&Tok::LBrace) {
            let lambda = self.lambda()?;
            args.push(Arg::positional(lambda));
        }
        Ok(args)
    }

    fn call_arg(&mut self) -> Result<Arg, NovaError> {
        if self.at(&Tok::Star) {
            self.advance();
            let value = self.expression()?;
            return Ok(Arg {
                name: None,
                value,
                spread: true,
            });
        }
        if let Tok::Ident(name) = self.peek().clone()
            && matches!(self.peek_at(1), Tok::Assign)
        {
            self.advance();
            self.advance();
            let value = self.expression()?;
            return Ok(Arg {
                name: Some(name),
                value,
                spread: false,
            });
        }
        Ok(Arg::positional(self.expression()?))
    }

    fn lambda(&mut self) -> Result<Expr, NovaError> {
        let span = self.span();
        self.expect(&Tok::LBrace, "'{'")?;
        self.skip_newlines();

        // Try to parse a parameter list followed by '->'; roll back when the
        // brace opens a parameterless body instead.
        let saved = self.pos;
        let params = self.lambda_params();
        let params = match params {
            Some(params) if self.eat(&Tok::Arrow) => params,
            _ => {
                self.pos = saved;
                Vec::new()
            }
        };
        let body = self.block_body()?;
        Ok(Expr::Lambda { params, body, span })
    }

    /// Attempts `a, b` or `(a, b), c` parameter forms; returns `None` when the
    /// tokens cannot be a parameter list.
    fn lambda_params(&mut self) -> Option<Vec<LambdaParam>> {
        let mut params = Vec::new();
        loop {
            match self.peek().clone() {
                Tok::Ident(name) => {
                    self.advance();
                    let pattern = if name == "_" {
                        BindPattern::Tuple(vec![None])
                    } else {
                        BindPattern::Name(name)
                    };
                    // an optional type annotation
                    if self.at(&Tok::Colon) {
                        self.advance();
                        self.type_name().ok()?;
                    }
                    params.push(LambdaParam { pattern });
                }
                Tok::LParen => {
                    self.advance();
                    let mut names = Vec::new();
                    loop {
                        match self.peek().clone() {
                            Tok::Ident(name) => {
                                self.advance();
                                names.push((name != "_").then_some(name));
                            }
                            _ => return None,
                        }
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                    if !self.eat(&Tok::RParen) {
                        return None;
                    }
                    params.push(LambdaParam {
                        pattern: BindPattern::Tuple(names),
                    });
                }
                _ => return None,
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.at(&Tok::Arrow).then_some(params)
    }

    #[expect(clippy::too_many_lines, reason = "single dispatch over every literal and keyword form")]
    fn primary(&mut self) -> Result<Expr, NovaError> {
        let span = self.span();
        match self.peek().clone() {
            Tok::Null => {
                self.advance();
                Ok(Expr::Null(span))
            }
            Tok::True => {
                self.advance();
                Ok(Expr::Bool(true, span))
            }
            Tok::False => {
                self.advance();
                Ok(Expr::Bool(false, span))
            }
            Tok::Int(v) => {
                self.advance();
                Ok(Expr::Int(v, span))
            }
            Tok::Long(v) => {
                self.advance();
                Ok(Expr::Long(v, span))
            }
            Tok::Float(v) => {
                self.advance();
                Ok(Expr::Float(v, span))
            }
            Tok::Double(v) => {
                self.advance();
                Ok(Expr::Double(v, span))
            }
            Tok::CharLit(c) => {
                self.advance();
                Ok(Expr::Char(c, span))
            }
            Tok::Str(parts) => {
                self.advance();
                let mut interp = Vec::new();
                for part in parts {
                    match part {
                        StrPart::Lit(text) => interp.push(InterpPart::Lit(text)),
                        StrPart::Expr { source, line, column } => {
                            interp.push(InterpPart::Expr(parse_fragment(&source, line, column)?));
                        }
                    }
                }
                Ok(Expr::Str(interp, span))
            }
            Tok::Ident(name) => {
                self.advance();
                if name == "_" {
                    Ok(Expr::Hole(span))
                } else {
                    Ok(Expr::Ident(name, span))
                }
            }
            Tok::This => {
                self.advance();
                Ok(Expr::This(span))
            }
            Tok::Super => {
                self.advance();
                self.expect(&Tok::Dot, "'.' after super")?;
                let name = self.expect_ident("member name")?;
                if self.at(&Tok::LParen) {
                    let args = self.call_args_with_trailing_lambda()?;
                    Ok(Expr::MethodCall {
                        recv: Box::new(Expr::This(span)),
                        name,
                        type_args: Vec::new(),
                        args,
                        safe: false,
                        on_super: true,
                        span,
                    })
                } else {
                    Ok(Expr::Member {
                        recv: Box::new(Expr::This(span)),
                        name,
                        safe: false,
                        on_super: true,
                        span,
                    })
                }
            }
            Tok::LParen => {
                self.advance();
                let saved = self.no_trailing_lambda;
                self.no_trailing_lambda = false;
                self.skip_newlines();
                let expr = self.expression();
                self.no_trailing_lambda = saved;
                let expr = expr?;
                self.skip_newlines();
                self.expect(&Tok::RParen, "')'")?;
                Ok(expr)
            }
            Tok::LBracket => {
                self.advance();
                let mut items = Vec::new();
                self.skip_newlines();
                while !self.at(&Tok::RBracket) {
                    items.push(self.call_arg()?);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                    self.skip_newlines();
                }
                self.expect(&Tok::RBracket, "']'")?;
                Ok(Expr::ListLit(items, span))
            }
            Tok::HashBrace => {
                self.advance();
                let mut entries = Vec::new();
                self.skip_newlines();
                while !self.at(&Tok::RBrace) {
                    let key = self.expression()?;
                    self.expect(&Tok::Colon, "':' in map literal")?;
                    self.skip_newlines();
                    let value = self.expression()?;
                    entries.push((key, value));
                    self.skip_newlines();
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                    self.skip_newlines();
                }
                self.skip_newlines();
                self.expect(&Tok::RBrace, "'}' closing map literal")?;
                Ok(Expr::MapLit(entries, span))
            }
            Tok::LBrace => self.lambda(),
            Tok::If => self.if_expr(),
            Tok::When => self.when_expr(),
            Tok::Try => self.try_expr(),
            Tok::Throw => {
                self.advance();
                let value = self.expression()?;
                Ok(Expr::Throw {
                    value: Box::new(value),
                    span,
                })
            }
            Tok::Return => {
                self.advance();
                let value = if starts_expr(self.peek()) {
                    Some(Box::new(self.expression()?))
                } else {
                    None
                };
                Ok(Expr::Return { value, span })
            }
            Tok::Break => {
                self.advance();
                Ok(Expr::Break(span))
            }
            Tok::Continue => {
                self.advance();
                Ok(Expr::Continue(span))
            }
            Tok::ColonColon => {
                self.advance();
                let name = self.expect_ident("member name after '::'")?;
                Ok(Expr::MethodRef {
                    qualifier: None,
                    name,
                    span,
                })
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn if_expr(&mut self) -> Result<Expr, NovaError> {
        let span = self.span();
        self.expect(&Tok::If, "'if'")?;

        // `if let x = expr { ... }`
        if self.at_ident("let") {
            self.advance();
            let name = self.expect_ident("binding name")?;
            self.expect(&Tok::Assign, "'='")?;
            let value = self.expr_before_block()?;
            let then = self.block()?;
            let els = if self.else_ahead() {
                self.skip_newlines();
                self.advance();
                Some(self.else_branch()?)
            } else {
                None
            };
            return Ok(Expr::IfLet {
                name,
                value: Box::new(value),
                then,
                els,
                span,
            });
        }

        self.expect(&Tok::LParen, "'(' after if")?;
        let cond = self.expression()?;
        self.expect(&Tok::RParen, "')'")?;
        self.skip_newlines();
        let then = self.branch_block()?;
        let els = if self.else_ahead() {
            self.skip_newlines();
            self.advance();
            self.skip_newlines();
            Some(self.else_branch()?)
        } else {
            None
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then,
            els,
            span,
        })
    }

    /// Whether an `else` follows, possibly after newlines.
    fn else_ahead(&self) -> bool {
        let mut offset = 0;
        while matches!(self.peek_at(offset), Tok::Newline) {
            offset += 1;
        }
        matches!(self.peek_at(offset), Tok::Else)
    }

    fn else_branch(&mut self) -> Result<Block, NovaError> {
        if self.at(&Tok::If) {
            let chained = self.if_expr()?;
            Ok(Block {
                stmts: vec![Stmt::Expr(chained)],
            })
        } else {
            self.branch_block()
        }
    }

    /// A branch body: a `{ ... }` block or a single expression.
    fn branch_block(&mut self) -> Result<Block, NovaError> {
        if self.at(&Tok::LBrace) {
            self.block()
        } else {
            let expr = self.expression()?;
            Ok(Block {
                stmts: vec![Stmt::Expr(expr)],
            })
        }
    }

    fn when_expr(&mut self) -> Result<Expr, NovaError> {
        let span = self.span();
        self.expect(&Tok::When, "'when'")?;
        let subject = if self.at(&Tok::LParen) {
            self.advance();
            let binding = if self.at(&Tok::Val) {
                self.advance();
                let name = self.expect_ident("binding name")?;
                self.expect(&Tok::Assign, "'='")?;
                Some(name)
            } else {
                None
            };
            let expr = self.expression()?;
            self.expect(&Tok::RParen, "')'")?;
            Some(WhenSubject {
                binding,
                expr: Box::new(expr),
            })
        } else {
            None
        };

        self.skip_newlines();
        self.expect(&Tok::LBrace, "'{' after when")?;
        self.skip_newlines();
        let mut arms = Vec::new();
        let mut els = None;
        while !self.at(&Tok::RBrace) {
            if self.at(&Tok::Eof) {
                return Err(self.error("unterminated when"));
            }
            if self.at(&Tok::Else) {
                self.advance();
                self.expect(&Tok::Arrow, "'->'")?;
                els = Some(self.arm_body()?);
            } else {
                let mut tests = Vec::new();
                loop {
                    let test = match self.peek() {
                        Tok::In => {
                            self.advance();
                            WhenTest::In(self.expression()?)
                        }
                        Tok::NotIn => {
                            self.advance();
                            WhenTest::NotIn(self.expression()?)
                        }
                        Tok::Is => {
                            self.advance();
                            WhenTest::Is(self.type_name()?)
                        }
                        Tok::NotIs => {
                            self.advance();
                            WhenTest::NotIs(self.type_name()?)
                        }
                        _ => WhenTest::Expr(self.expression()?),
                    };
                    tests.push(test);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                    self.skip_newlines();
                }
                self.expect(&Tok::Arrow, "'->'")?;
                let body = self.arm_body()?;
                arms.push(WhenArm { tests, body });
            }
            self.skip_newlines();
        }
        self.expect(&Tok::RBrace, "'}'")?;
        Ok(Expr::When {
            subject,
            arms,
            els,
            span,
        })
    }

    fn arm_body(&mut self) -> Result<Block, NovaError> {
        self.skip_newlines();
        self.branch_block()
    }

    fn try_expr(&mut self) -> Result<Expr, NovaError> {
        let span = self.span();
        self.expect(&Tok::Try, "'try'")?;
        self.skip_newlines();
        let body = self.block()?;
        let mut catches = Vec::new();
        loop {
            let mut offset = 0;
            while matches!(self.peek_at(offset), Tok::Newline) {
                offset += 1;
            }
            if !matches!(self.peek_at(offset), Tok::Catch) {
                break;
            }
            self.skip_newlines();
            self.advance();
            self.expect(&Tok::LParen, "'(' after catch")?;
            let name = self.expect_ident("exception binding")?;
            let ty = if self.eat(&Tok::Colon) {
                Some(self.type_name()?)
            } else {
                None
            };
            self.expect(&Tok::RParen, "')'")?;
            self.skip_newlines();
            let catch_body = self.block()?;
            catches.push(CatchClause {
                name,
                ty,
                body: catch_body,
            });
        }
        let mut offset = 0;
        while matches!(self.peek_at(offset), Tok::Newline) {
            offset += 1;
        }
        let finally = if matches!(self.peek_at(offset), Tok::Finally) {
            self.skip_newlines();
            self.advance();
            self.skip_newlines();
            Some(self.block()?)
        } else {
            None
        };
        Ok(Expr::Try {
            body,
            catches,
            finally,
            span,
        })
    }
}

/// Whether a token can begin an expression; drives the postfix-`?` vs
/// ternary decision. Unary `+`/`-` are deliberately excluded so `x? + 1`
/// propagates (a ternary with a unary-signed branch needs parentheses).
fn starts_expr(tok: &Tok) -> bool {
    matches!(
        tok,
        Tok::Int(_)
            | Tok::Long(_)
            | Tok::Float(_)
            | Tok::Double(_)
            | Tok::CharLit(_)
            | Tok::Str(_)
            | Tok::Ident(_)
            | Tok::Null
            | Tok::True
            | Tok::False
            | Tok::This
            | Tok::Super
            | Tok::If
            | Tok::When
            | Tok::Try
            | Tok::Throw
            | Tok::Return
            | Tok::LParen
            | Tok::LBracket
            | Tok::LBrace
            | Tok::HashBrace
            | Tok::Bang
            | Tok::PlusPlus
            | Tok::MinusMinus
            | Tok::ColonColon
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        parse(src).expect("parse failed")
    }

    #[test]
    fn parses_function_with_expression_body() {
        let program = parse_ok("fun fact(n: Int): Int = if (n <= 1) 1 else n * fact(n - 1)");
        let Stmt::Fun(fun) = &program.stmts[0] else { panic!("expected fun") };
        assert_eq!(fun.name, "fact");
        assert_eq!(fun.params.len(), 1);
        assert_eq!(fun.body.stmts.len(), 1);
    }

    #[test]
    fn parses_map_literal_and_index() {
        let program = parse_ok(r#"val m = #{"a": 1, "b": 2}
m["b"]"#);
        assert_eq!(program.stmts.len(), 2);
        let Stmt::Expr(Expr::Index { .. }) = &program.stmts[1] else {
            panic!("expected index expression");
        };
    }

    #[test]
    fn parses_chained_comparison() {
        let program = parse_ok("a < b < c");
        let Stmt::Expr(Expr::Chained { operands, ops, .. }) = &program.stmts[0] else {
            panic!("expected chained comparison");
        };
        assert_eq!(operands.len(), 3);
        assert_eq!(ops, &[CmpOp::Lt, CmpOp::Lt]);
    }

    #[test]
    fn parses_pipeline_with_placeholder() {
        let program = parse_ok("x |> f(10, _)");
        let Stmt::Expr(Expr::Pipeline { rhs, .. }) = &program.stmts[0] else {
            panic!("expected pipeline");
        };
        let Expr::Call { args, .. } = rhs.as_ref() else { panic!("expected call") };
        assert!(matches!(args[1].value, Expr::Hole(_)));
    }

    #[test]
    fn postfix_question_vs_ternary() {
        let program = parse_ok("val x = f()?\nval y = c ? 1 : 2");
        assert!(matches!(
            &program.stmts[0],
            Stmt::Val {
                init: Expr::Propagate { .. },
                ..
            }
        ));
        assert!(matches!(
            &program.stmts[1],
            Stmt::Val {
                init: Expr::Ternary { .. },
                ..
            }
        ));
    }

    #[test]
    fn parses_class_with_companion_and_init() {
        let src = r#"
class Point(val x: Int, val y: Int) : Shape(), Printable {
    var label = "p"
    init { label = "point" }
    fun dist() = x * x + y * y
    companion object {
        fun origin() = Point(0, 0)
    }
}"#;
        let program = parse_ok(src);
        let Stmt::Class(class) = &program.stmts[0] else { panic!("expected class") };
        assert_eq!(class.name, "Point");
        assert_eq!(class.primary.as_ref().map(Vec::len), Some(2));
        assert!(class.superclass.is_some());
        assert_eq!(class.interfaces, vec!["Printable".to_owned()]);
        assert_eq!(class.members.len(), 4);
    }

    #[test]
    fn parses_enum_with_entries() {
        let program = parse_ok("enum class Color(val rgb: Int) { RED(1), GREEN(2), BLUE(3) }");
        let Stmt::Class(class) = &program.stmts[0] else { panic!("expected class") };
        assert_eq!(class.kind, ClassKind::Enum);
        assert_eq!(class.enum_entries.len(), 3);
    }

    #[test]
    fn parses_when_with_subject_forms() {
        let src = r"when (x) {
            1, 2 -> a
            in 3..10 -> b
            is String -> c
            else -> d
        }";
        let program = parse_ok(src);
        let Stmt::Expr(Expr::When { arms, els, .. }) = &program.stmts[0] else {
            panic!("expected when");
        };
        assert_eq!(arms.len(), 3);
        assert_eq!(arms[0].tests.len(), 2);
        assert!(matches!(arms[1].tests[0], WhenTest::In(_)));
        assert!(matches!(arms[2].tests[0], WhenTest::Is(_)));
        assert!(els.is_some());
    }

    #[test]
    fn parses_try_catch_finally_as_expression() {
        let src = r#"val r = try { risky() } catch (e: Exception) { "caught" } finally { cleanup() }"#;
        let program = parse_ok(src);
        let Stmt::Val { init: Expr::Try { catches, finally, .. }, .. } = &program.stmts[0] else {
            panic!("expected try expression");
        };
        assert_eq!(catches.len(), 1);
        assert!(finally.is_some());
    }

    #[test]
    fn parses_trailing_lambda_forms() {
        let program = parse_ok("list.map { it * 2 }\nschedule(50) { tick() }\nscope { work() }");
        assert_eq!(program.stmts.len(), 3);
        let Stmt::Expr(Expr::Call { args, .. }) = &program.stmts[1] else {
            panic!("expected call with trailing lambda");
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn parses_named_arguments() {
        let program = parse_ok("p.copy(x = 10)");
        let Stmt::Expr(Expr::MethodCall { args, .. }) = &program.stmts[0] else {
            panic!("expected method call");
        };
        assert_eq!(args[0].name.as_deref(), Some("x"));
    }

    #[test]
    fn parses_destructuring_val() {
        let program = parse_ok("val (a, _, c) = triple()");
        let Stmt::Val { pattern: BindPattern::Tuple(names), .. } = &program.stmts[0] else {
            panic!("expected tuple pattern");
        };
        assert_eq!(names.len(), 3);
        assert!(names[1].is_none());
    }

    #[test]
    fn parses_guard_let() {
        let program = parse_ok("guard let x = find() else { return null }");
        assert!(matches!(&program.stmts[0], Stmt::GuardLet { name, .. } if name == "x"));
    }

    #[test]
    fn parses_reified_call_site_type_args() {
        let program = parse_ok("fun <reified T> cast(x: Any) = x as T\ncast<Int>(v)");
        let Stmt::Expr(Expr::Call { type_args, .. }) = &program.stmts[1] else {
            panic!("expected call");
        };
        assert_eq!(type_args, &vec!["Int".to_owned()]);
    }

    #[test]
    fn less_than_is_not_type_args() {
        let program = parse_ok("a < b");
        assert!(matches!(
            &program.stmts[0],
            Stmt::Expr(Expr::Binary { op: BinOp::Lt, .. })
        ));
    }

    #[test]
    fn parses_spread_argument() {
        let program = parse_ok("f(*xs, 1)");
        let Stmt::Expr(Expr::Call { args, .. }) = &program.stmts[0] else { panic!("expected call") };
        assert!(args[0].spread);
        assert!(!args[1].spread);
    }

    #[test]
    fn parses_extension_function_and_property() {
        let program = parse_ok("fun String.shout() = this + \"!\"\nval String.head get() = this[0]");
        assert!(matches!(&program.stmts[0], Stmt::Fun(f) if f.receiver.as_deref() == Some("String")));
        assert!(matches!(&program.stmts[1], Stmt::ExtProp { receiver, .. } if receiver == "String"));
    }
}
