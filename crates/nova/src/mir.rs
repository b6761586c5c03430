//! The lowered mid-level representation and the AST→MIR lowering pass.
//!
//! MIR is semantically equivalent to the AST but flattened for direct
//! interpretation: pipelines, chained comparisons, `if let`, and `data class`
//! sugar are rewritten here, and self-calls in tail position are marked so
//! the evaluator can reuse the current frame.
//!
//! MIR is fully serializable: `precompile_to_mir` hands the embedder a value
//! that can round-trip through [`Mir::dump`]/[`Mir::load`] and be executed
//! later without re-parsing.

use serde::{Deserialize, Serialize};

use crate::{
    ast,
    types::Visibility,
};

/// A lowered program, ready for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mir {
    pub file: String,
    pub stmts: Vec<Stmt>,
}

impl Mir {
    /// Serializes to a compact binary format.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a program serialized with [`Self::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pattern {
    Name(String),
    /// Destructuring positions; `None` skips (`_`).
    Tuple(Vec<Option<String>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
}

/// Assignment destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Target {
    Name(String),
    Member { recv: Box<Expr>, name: String },
    Index { recv: Box<Expr>, index: Box<Expr> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Bind {
        pattern: Pattern,
        init: Expr,
        mutable: bool,
        line: u32,
    },
    /// Plain or compound assignment; `op` is the compound operator when set.
    Assign {
        target: Target,
        op: Option<BinOp>,
        value: Expr,
        line: u32,
    },
    /// `target ??= value`.
    NullAssign {
        target: Target,
        value: Expr,
        line: u32,
    },
    While {
        cond: Expr,
        body: Block,
        line: u32,
    },
    For {
        pattern: Pattern,
        iter: Expr,
        body: Block,
        line: u32,
    },
    Fun(FunDef),
    Class(ClassDef),
    ExtProp {
        receiver: String,
        name: String,
        body: Expr,
        line: u32,
    },
    GuardLet {
        name: String,
        init: Expr,
        else_body: Block,
        line: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InterpPart {
    Lit(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: Expr,
    pub spread: bool,
    /// The `_` partial-application hole.
    pub hole: bool,
}

impl CallArg {
    #[must_use]
    pub fn positional(value: Expr) -> Self {
        Self {
            name: None,
            value,
            spread: false,
            hole: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaDef {
    pub params: Vec<Param>,
    pub body: Block,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WhenTest {
    Expr(Expr),
    In(Expr),
    NotIn(Expr),
    Is(String),
    NotIs(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhenArm {
    pub tests: Vec<WhenTest>,
    pub body: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catch {
    pub name: String,
    pub ty: Option<String>,
    pub body: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
    /// Interpolated string: concat of literal and expression fragments.
    Interp(Vec<InterpPart>),
    ListLit(Vec<CallArg>),
    MapLit(Vec<(Expr, Expr)>),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        inclusive: bool,
        line: u32,
    },
    Ident(String, u32),
    This(u32),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: u32,
    },
    Logic {
        and: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        line: u32,
    },
    IncDec {
        inc: bool,
        prefix: bool,
        target: Target,
        line: u32,
    },
    Call {
        callee: Box<Expr>,
        type_args: Vec<String>,
        args: Vec<CallArg>,
        /// Marked by lowering for self-calls in tail position.
        tail: bool,
        line: u32,
    },
    MethodCall {
        recv: Box<Expr>,
        name: String,
        type_args: Vec<String>,
        args: Vec<CallArg>,
        safe: bool,
        on_super: bool,
        line: u32,
    },
    Member {
        recv: Box<Expr>,
        name: String,
        safe: bool,
        on_super: bool,
        line: u32,
    },
    Index {
        recv: Box<Expr>,
        index: Box<Expr>,
        safe: bool,
        line: u32,
    },
    Lambda(LambdaDef),
    If {
        cond: Box<Expr>,
        then: Block,
        els: Option<Block>,
    },
    When {
        binding: Option<String>,
        subject: Option<Box<Expr>>,
        arms: Vec<WhenArm>,
        els: Option<Block>,
        line: u32,
    },
    Try {
        body: Block,
        catches: Vec<Catch>,
        finally: Option<Block>,
    },
    Throw {
        value: Box<Expr>,
        line: u32,
    },
    Return {
        value: Option<Box<Expr>>,
        line: u32,
    },
    Break {
        line: u32,
    },
    Continue {
        line: u32,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    Elvis {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Propagate {
        expr: Box<Expr>,
        line: u32,
    },
    Is {
        expr: Box<Expr>,
        ty: String,
        negated: bool,
    },
    Cast {
        expr: Box<Expr>,
        ty: String,
        safe: bool,
        line: u32,
    },
    InOp {
        item: Box<Expr>,
        collection: Box<Expr>,
        negated: bool,
        line: u32,
    },
    MethodRef {
        qualifier: Option<String>,
        name: String,
        line: u32,
    },
    /// Statement prelude + value; introduced by desugaring only.
    Scope {
        stmts: Vec<Stmt>,
        value: Box<Expr>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunDef {
    pub name: String,
    pub receiver: Option<String>,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub body: Block,
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub is_override: bool,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationUse {
    pub name: String,
    pub args: Vec<CallArg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtorParam {
    pub name: String,
    pub default: Option<Expr>,
    /// When set, the parameter is promoted to a field: (mutable, visibility).
    pub prop: Option<(bool, Visibility)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Property {
        name: String,
        mutable: bool,
        visibility: Visibility,
        init: Option<Expr>,
        line: u32,
    },
    Init(Block),
    Method(FunDef),
    Ctor {
        params: Vec<Param>,
        delegate: Option<Vec<CallArg>>,
        body: Block,
        line: u32,
    },
    Companion {
        members: Vec<Member>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumEntry {
    pub name: String,
    pub args: Vec<CallArg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub kind: ClassKind,
    pub name: String,
    pub annotations: Vec<AnnotationUse>,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub type_params: Vec<String>,
    pub primary: Option<Vec<CtorParam>>,
    pub superclass: Option<(String, Vec<CallArg>)>,
    pub interfaces: Vec<String>,
    /// Properties, init blocks, methods, constructors, companion — in
    /// lexical order (instantiation runs property initialisers and init
    /// blocks in this order).
    pub members: Vec<Member>,
    pub entries: Vec<EnumEntry>,
    pub line: u32,
}

/// Lowers a parsed program.
#[must_use]
pub fn lower(program: &ast::Program, file: &str) -> Mir {
    let mut lowerer = Lowerer { temp_counter: 0 };
    let stmts = program.stmts.iter().map(|stmt| lowerer.stmt(stmt)).collect();
    Mir {
        file: file.to_owned(),
        stmts,
    }
}

struct Lowerer {
    temp_counter: u32,
}

impl Lowerer {
    fn temp(&mut self, prefix: &str) -> String {
        self.temp_counter += 1;
        format!("${prefix}{}", self.temp_counter)
    }

    fn block(&mut self, block: &ast::Block) -> Block {
        Block {
            stmts: block.stmts.iter().map(|stmt| self.stmt(stmt)).collect(),
        }
    }

    fn pattern(pattern: &ast::BindPattern) -> Pattern {
        match pattern {
            ast::BindPattern::Name(name) => Pattern::Name(name.clone()),
            ast::BindPattern::Tuple(names) => Pattern::Tuple(names.clone()),
        }
    }

    fn stmt(&mut self, stmt: &ast::Stmt) -> Stmt {
        match stmt {
            ast::Stmt::Expr(expr) => Stmt::Expr(self.expr(expr)),
            ast::Stmt::Val { pattern, init, span } => Stmt::Bind {
                pattern: Self::pattern(pattern),
                init: self.expr(init),
                mutable: false,
                line: span.line,
            },
            ast::Stmt::Var { pattern, init, span } => Stmt::Bind {
                pattern: Self::pattern(pattern),
                init: self.expr(init),
                mutable: true,
                line: span.line,
            },
            ast::Stmt::Assign {
                target,
                op,
                value,
                span,
            } => {
                let target = self.target(target);
                let value = self.expr(value);
                match op {
                    ast::AssignOp::Set => Stmt::Assign {
                        target,
                        op: None,
                        value,
                        line: span.line,
                    },
                    ast::AssignOp::NullCoalesce => Stmt::NullAssign {
                        target,
                        value,
                        line: span.line,
                    },
                    compound => Stmt::Assign {
                        target,
                        op: Some(match compound {
                            ast::AssignOp::Add => BinOp::Add,
                            ast::AssignOp::Sub => BinOp::Sub,
                            ast::AssignOp::Mul => BinOp::Mul,
                            ast::AssignOp::Div => BinOp::Div,
                            _ => BinOp::Rem,
                        }),
                        value,
                        line: span.line,
                    },
                }
            }
            ast::Stmt::While { cond, body, span } => Stmt::While {
                cond: self.expr(cond),
                body: self.block(body),
                line: span.line,
            },
            ast::Stmt::For {
                pattern,
                iter,
                body,
                span,
            } => Stmt::For {
                pattern: Self::pattern(pattern),
                iter: self.expr(iter),
                body: self.block(body),
                line: span.line,
            },
            ast::Stmt::Fun(fun) => Stmt::Fun(self.fun_def(fun)),
            ast::Stmt::Class(class) => Stmt::Class(self.class_def(class)),
            ast::Stmt::ExtProp {
                receiver,
                name,
                body,
                span,
            } => Stmt::ExtProp {
                receiver: receiver.clone(),
                name: name.clone(),
                body: self.expr(body),
                line: span.line,
            },
            ast::Stmt::GuardLet {
                name,
                init,
                else_body,
                span,
            } => Stmt::GuardLet {
                name: name.clone(),
                init: self.expr(init),
                else_body: self.block(else_body),
                line: span.line,
            },
        }
    }

    fn target(&mut self, expr: &ast::Expr) -> Target {
        match expr {
            ast::Expr::Ident(name, _) => Target::Name(name.clone()),
            ast::Expr::Member { recv, name, .. } => Target::Member {
                recv: Box::new(self.expr(recv)),
                name: name.clone(),
            },
            ast::Expr::Index { recv, args, .. } => Target::Index {
                recv: Box::new(self.expr(recv)),
                index: Box::new(args.first().map_or(Expr::Null, |a| self.expr(a))),
            },
            // The parser only feeds lvalues here.
            other => Target::Name(format!("{other:?}")),
        }
    }

    fn args(&mut self, args: &[ast::Arg]) -> Vec<CallArg> {
        args.iter()
            .map(|arg| CallArg {
                name: arg.name.clone(),
                hole: matches!(arg.value, ast::Expr::Hole(_)),
                value: match &arg.value {
                    ast::Expr::Hole(_) => Expr::Null,
                    other => self.expr(other),
                },
                spread: arg.spread,
            })
            .collect()
    }

    fn fun_def(&mut self, fun: &ast::FunDecl) -> FunDef {
        let mut body = self.block(&fun.body);
        mark_block_tail(&mut body, &fun.name);
        FunDef {
            name: fun.name.clone(),
            receiver: fun.receiver.clone(),
            type_params: fun.type_params.clone(),
            params: fun
                .params
                .iter()
                .map(|p| Param {
                    pattern: Pattern::Name(p.name.clone()),
                    default: p.default.as_ref().map(|d| self.expr(d)),
                })
                .collect(),
            body,
            visibility: match fun.modifiers.visibility {
                ast::VisibilityMod::Public => Visibility::Public,
                ast::VisibilityMod::Protected => Visibility::Protected,
                ast::VisibilityMod::Private => Visibility::Private,
            },
            is_abstract: fun.modifiers.is_abstract || !fun.has_body,
            is_override: fun.modifiers.is_override,
            line: fun.span.line,
            column: fun.span.column,
        }
    }

    fn member(&mut self, member: &ast::MemberDecl) -> Member {
        match member {
            ast::MemberDecl::Property {
                name,
                mutable,
                visibility,
                init,
                span,
            } => Member::Property {
                name: name.clone(),
                mutable: *mutable,
                visibility: lower_visibility(*visibility),
                init: init.as_ref().map(|e| self.expr(e)),
                line: span.line,
            },
            ast::MemberDecl::Init(block) => Member::Init(self.block(block)),
            ast::MemberDecl::Method(fun) => Member::Method(self.fun_def(fun)),
            ast::MemberDecl::SecondaryCtor {
                params,
                delegate,
                body,
                span,
            } => Member::Ctor {
                params: params
                    .iter()
                    .map(|p| Param {
                        pattern: Pattern::Name(p.name.clone()),
                        default: p.default.as_ref().map(|d| self.expr(d)),
                    })
                    .collect(),
                delegate: delegate.as_ref().map(|args| self.args(args)),
                body: self.block(body),
                line: span.line,
            },
            ast::MemberDecl::Companion { members, .. } => Member::Companion {
                members: members.iter().map(|m| self.member(m)).collect(),
            },
        }
    }

    fn class_def(&mut self, class: &ast::ClassDecl) -> ClassDef {
        let mut annotations: Vec<AnnotationUse> = class
            .annotations
            .iter()
            .map(|a| AnnotationUse {
                name: a.name.clone(),
                args: self.args(&a.args),
            })
            .collect();
        // `data class` is sugar for the @data annotation processor
        if class.modifiers.is_data && !annotations.iter().any(|a| a.name == "data") {
            annotations.push(AnnotationUse {
                name: "data".to_owned(),
                args: Vec::new(),
            });
        }
        ClassDef {
            kind: match class.kind {
                ast::ClassKind::Class => ClassKind::Class,
                ast::ClassKind::Interface => ClassKind::Interface,
                ast::ClassKind::Enum => ClassKind::Enum,
                ast::ClassKind::Annotation => ClassKind::Annotation,
                ast::ClassKind::Object => ClassKind::Object,
            },
            name: class.name.clone(),
            annotations,
            is_abstract: class.modifiers.is_abstract || class.kind == ast::ClassKind::Interface,
            is_sealed: class.modifiers.is_sealed,
            type_params: class.type_params.clone(),
            primary: class.primary.as_ref().map(|params| {
                params
                    .iter()
                    .map(|p| CtorParam {
                        name: p.name.clone(),
                        default: p.default.as_ref().map(|d| self.expr(d)),
                        prop: p.prop.map(|spec| (spec.mutable, lower_visibility(spec.visibility))),
                    })
                    .collect()
            }),
            superclass: class
                .superclass
                .as_ref()
                .map(|(name, args)| (name.clone(), self.args(args))),
            interfaces: class.interfaces.clone(),
            members: class.members.iter().map(|m| self.member(m)).collect(),
            entries: class
                .enum_entries
                .iter()
                .map(|entry| EnumEntry {
                    name: entry.name.clone(),
                    args: self.args(&entry.args),
                })
                .collect(),
            line: class.span.line,
        }
    }

    #[expect(clippy::too_many_lines, reason = "single dispatch over every AST expression")]
    fn expr(&mut self, expr: &ast::Expr) -> Expr {
        match expr {
            ast::Expr::Null(_) => Expr::Null,
            ast::Expr::Bool(v, _) => Expr::Bool(*v),
            ast::Expr::Int(v, _) => Expr::Int(*v),
            ast::Expr::Long(v, _) => Expr::Long(*v),
            ast::Expr::Float(v, _) => Expr::Float(*v),
            ast::Expr::Double(v, _) => Expr::Double(*v),
            ast::Expr::Char(v, _) => Expr::Char(*v),
            ast::Expr::Str(parts, _) => {
                if let [ast::InterpPart::Lit(text)] = parts.as_slice() {
                    Expr::Str(text.clone())
                } else {
                    Expr::Interp(
                        parts
                            .iter()
                            .map(|part| match part {
                                ast::InterpPart::Lit(text) => InterpPart::Lit(text.clone()),
                                ast::InterpPart::Expr(e) => InterpPart::Expr(self.expr(e)),
                            })
                            .collect(),
                    )
                }
            }
            ast::Expr::ListLit(items, _) => Expr::ListLit(self.args(items)),
            ast::Expr::MapLit(entries, _) => Expr::MapLit(
                entries
                    .iter()
                    .map(|(k, v)| (self.expr(k), self.expr(v)))
                    .collect(),
            ),
            ast::Expr::Range {
                start,
                end,
                inclusive,
                span,
            } => Expr::Range {
                start: Box::new(self.expr(start)),
                end: Box::new(self.expr(end)),
                inclusive: *inclusive,
                line: span.line,
            },
            ast::Expr::Ident(name, span) => Expr::Ident(name.clone(), span.line),
            ast::Expr::Hole(span) => Expr::Ident("_".to_owned(), span.line),
            ast::Expr::This(span) => Expr::This(span.line),
            ast::Expr::Binary { op, lhs, rhs, span } => Expr::Binary {
                op: lower_binop(*op),
                lhs: Box::new(self.expr(lhs)),
                rhs: Box::new(self.expr(rhs)),
                line: span.line,
            },
            ast::Expr::Logic { op, lhs, rhs, .. } => Expr::Logic {
                and: matches!(op, ast::LogicOp::And),
                lhs: Box::new(self.expr(lhs)),
                rhs: Box::new(self.expr(rhs)),
            },
            ast::Expr::Unary { op, expr, span } => Expr::Unary {
                op: match op {
                    ast::UnaryOp::Neg => UnOp::Neg,
                    ast::UnaryOp::Plus => UnOp::Plus,
                    ast::UnaryOp::Not => UnOp::Not,
                },
                expr: Box::new(self.expr(expr)),
                line: span.line,
            },
            ast::Expr::IncDec {
                op,
                target,
                prefix,
                span,
            } => Expr::IncDec {
                inc: matches!(op, ast::IncDecOp::Inc),
                prefix: *prefix,
                target: self.target(target),
                line: span.line,
            },
            ast::Expr::Chained { operands, ops, span } => self.lower_chained(operands, ops, span.line),
            ast::Expr::Call {
                callee,
                type_args,
                args,
                span,
            } => Expr::Call {
                callee: Box::new(self.expr(callee)),
                type_args: type_args.clone(),
                args: self.args(args),
                tail: false,
                line: span.line,
            },
            ast::Expr::MethodCall {
                recv,
                name,
                type_args,
                args,
                safe,
                on_super,
                span,
            } => Expr::MethodCall {
                recv: Box::new(self.expr(recv)),
                name: name.clone(),
                type_args: type_args.clone(),
                args: self.args(args),
                safe: *safe,
                on_super: *on_super,
                line: span.line,
            },
            ast::Expr::Member {
                recv,
                name,
                safe,
                on_super,
                span,
            } => Expr::Member {
                recv: Box::new(self.expr(recv)),
                name: name.clone(),
                safe: *safe,
                on_super: *on_super,
                line: span.line,
            },
            ast::Expr::Index { recv, args, safe, span } => Expr::Index {
                recv: Box::new(self.expr(recv)),
                index: Box::new(args.first().map_or(Expr::Null, |a| self.expr(a))),
                safe: *safe,
                line: span.line,
            },
            ast::Expr::Lambda { params, body, span } => Expr::Lambda(LambdaDef {
                params: params
                    .iter()
                    .map(|p| Param {
                        pattern: Self::pattern(&p.pattern),
                        default: None,
                    })
                    .collect(),
                body: self.block(body),
                line: span.line,
                column: span.column,
            }),
            ast::Expr::If { cond, then, els, .. } => Expr::If {
                cond: Box::new(self.expr(cond)),
                then: self.block(then),
                els: els.as_ref().map(|b| self.block(b)),
            },
            ast::Expr::IfLet {
                name,
                value,
                then,
                els,
                span,
            } => self.lower_if_let(name, value, then, els.as_ref(), span.line),
            ast::Expr::When {
                subject,
                arms,
                els,
                span,
            } => Expr::When {
                binding: subject.as_ref().and_then(|s| s.binding.clone()),
                subject: subject.as_ref().map(|s| Box::new(self.expr(&s.expr))),
                arms: arms
                    .iter()
                    .map(|arm| WhenArm {
                        tests: arm
                            .tests
                            .iter()
                            .map(|test| match test {
                                ast::WhenTest::Expr(e) => WhenTest::Expr(self.expr(e)),
                                ast::WhenTest::In(e) => WhenTest::In(self.expr(e)),
                                ast::WhenTest::NotIn(e) => WhenTest::NotIn(self.expr(e)),
                                ast::WhenTest::Is(ty) => WhenTest::Is(ty.clone()),
                                ast::WhenTest::NotIs(ty) => WhenTest::NotIs(ty.clone()),
                            })
                            .collect(),
                        body: self.block(&arm.body),
                    })
                    .collect(),
                els: els.as_ref().map(|b| self.block(b)),
                line: span.line,
            },
            ast::Expr::Try {
                body,
                catches,
                finally,
                ..
            } => Expr::Try {
                body: self.block(body),
                catches: catches
                    .iter()
                    .map(|c| Catch {
                        name: c.name.clone(),
                        ty: c.ty.clone(),
                        body: self.block(&c.body),
                    })
                    .collect(),
                finally: finally.as_ref().map(|b| self.block(b)),
            },
            ast::Expr::Throw { value, span } => Expr::Throw {
                value: Box::new(self.expr(value)),
                line: span.line,
            },
            ast::Expr::Return { value, span } => Expr::Return {
                value: value.as_ref().map(|v| Box::new(self.expr(v))),
                line: span.line,
            },
            ast::Expr::Break(span) => Expr::Break { line: span.line },
            ast::Expr::Continue(span) => Expr::Continue { line: span.line },
            ast::Expr::Ternary { cond, then, els, .. } => Expr::Ternary {
                cond: Box::new(self.expr(cond)),
                then: Box::new(self.expr(then)),
                els: Box::new(self.expr(els)),
            },
            ast::Expr::Elvis { lhs, rhs, .. } => Expr::Elvis {
                lhs: Box::new(self.expr(lhs)),
                rhs: Box::new(self.expr(rhs)),
            },
            ast::Expr::Propagate { expr, span } => Expr::Propagate {
                expr: Box::new(self.expr(expr)),
                line: span.line,
            },
            ast::Expr::Is {
                expr, ty, negated, ..
            } => Expr::Is {
                expr: Box::new(self.expr(expr)),
                ty: ty.clone(),
                negated: *negated,
            },
            ast::Expr::Cast { expr, ty, safe, span } => Expr::Cast {
                expr: Box::new(self.expr(expr)),
                ty: ty.clone(),
                safe: *safe,
                line: span.line,
            },
            ast::Expr::InOp {
                item,
                collection,
                negated,
                span,
            } => Expr::InOp {
                item: Box::new(self.expr(item)),
                collection: Box::new(self.expr(collection)),
                negated: *negated,
                line: span.line,
            },
            ast::Expr::Pipeline { lhs, rhs, span } => self.lower_pipeline(lhs, rhs, span.line),
            ast::Expr::MethodRef { qualifier, name, span } => Expr::MethodRef {
                qualifier: qualifier.clone(),
                name: name.clone(),
                line: span.line,
            },
        }
    }

    /// `a < b < c` → `val $t = b; (a < $t) && ($t < c)` — middle operands
    /// evaluated exactly once.
    fn lower_chained(&mut self, operands: &[ast::Expr], ops: &[ast::CmpOp], line: u32) -> Expr {
        let mut stmts = Vec::new();
        let mut lowered: Vec<Expr> = Vec::with_capacity(operands.len());
        for (i, operand) in operands.iter().enumerate() {
            let value = self.expr(operand);
            if i == 0 || i == operands.len() - 1 {
                lowered.push(value);
            } else {
                let temp = self.temp("chain");
                stmts.push(Stmt::Bind {
                    pattern: Pattern::Name(temp.clone()),
                    init: value,
                    mutable: false,
                    line,
                });
                lowered.push(Expr::Ident(temp, line));
            }
        }
        let mut comparison: Option<Expr> = None;
        for (i, op) in ops.iter().enumerate() {
            let one = Expr::Binary {
                op: match op {
                    ast::CmpOp::Lt => BinOp::Lt,
                    ast::CmpOp::LtEq => BinOp::LtEq,
                    ast::CmpOp::Gt => BinOp::Gt,
                    ast::CmpOp::GtEq => BinOp::GtEq,
                },
                lhs: Box::new(lowered[i].clone()),
                rhs: Box::new(lowered[i + 1].clone()),
                line,
            };
            comparison = Some(match comparison {
                None => one,
                Some(prev) => Expr::Logic {
                    and: true,
                    lhs: Box::new(prev),
                    rhs: Box::new(one),
                },
            });
        }
        Expr::Scope {
            stmts,
            value: Box::new(comparison.unwrap_or(Expr::Bool(true))),
        }
    }

    /// `x |> f` → `f(x)`; `x |> f(a, _)` → `f(a, x)` with `x` evaluated
    /// before the stage's own arguments.
    fn lower_pipeline(&mut self, lhs: &ast::Expr, rhs: &ast::Expr, line: u32) -> Expr {
        let temp = self.temp("pipe");
        let bind = Stmt::Bind {
            pattern: Pattern::Name(temp.clone()),
            init: self.expr(lhs),
            mutable: false,
            line,
        };
        let piped = Expr::Ident(temp, line);
        let call = match rhs {
            ast::Expr::Call {
                callee,
                type_args,
                args,
                span,
            } if args.iter().any(|a| matches!(a.value, ast::Expr::Hole(_))) => {
                let mut lowered_args = Vec::with_capacity(args.len());
                let mut filled = false;
                for arg in args {
                    if !filled && matches!(arg.value, ast::Expr::Hole(_)) {
                        lowered_args.push(CallArg::positional(piped.clone()));
                        filled = true;
                    } else {
                        lowered_args.push(CallArg {
                            name: arg.name.clone(),
                            hole: matches!(arg.value, ast::Expr::Hole(_)),
                            value: match &arg.value {
                                ast::Expr::Hole(_) => Expr::Null,
                                other => self.expr(other),
                            },
                            spread: arg.spread,
                        });
                    }
                }
                Expr::Call {
                    callee: Box::new(self.expr(callee)),
                    type_args: type_args.clone(),
                    args: lowered_args,
                    tail: false,
                    line: span.line,
                }
            }
            other => Expr::Call {
                callee: Box::new(self.expr(other)),
                type_args: Vec::new(),
                args: vec![CallArg::positional(piped)],
                tail: false,
                line,
            },
        };
        Expr::Scope {
            stmts: vec![bind],
            value: Box::new(call),
        }
    }

    fn lower_if_let(
        &mut self,
        name: &str,
        value: &ast::Expr,
        then: &ast::Block,
        els: Option<&ast::Block>,
        line: u32,
    ) -> Expr {
        let temp = self.temp("iflet");
        let bind = Stmt::Bind {
            pattern: Pattern::Name(temp.clone()),
            init: self.expr(value),
            mutable: false,
            line,
        };
        let mut then_block = Block {
            stmts: vec![Stmt::Bind {
                pattern: Pattern::Name(name.to_owned()),
                init: Expr::Ident(temp.clone(), line),
                mutable: false,
                line,
            }],
        };
        then_block.stmts.extend(self.block(then).stmts);
        Expr::Scope {
            stmts: vec![bind],
            value: Box::new(Expr::If {
                cond: Box::new(Expr::Binary {
                    op: BinOp::NotEq,
                    lhs: Box::new(Expr::Ident(temp, line)),
                    rhs: Box::new(Expr::Null),
                    line,
                }),
                then: then_block,
                els: els.map(|b| self.block(b)),
            }),
        }
    }
}

fn lower_visibility(v: ast::VisibilityMod) -> Visibility {
    match v {
        ast::VisibilityMod::Public => Visibility::Public,
        ast::VisibilityMod::Protected => Visibility::Protected,
        ast::VisibilityMod::Private => Visibility::Private,
    }
}

fn lower_binop(op: ast::BinOp) -> BinOp {
    match op {
        ast::BinOp::Add => BinOp::Add,
        ast::BinOp::Sub => BinOp::Sub,
        ast::BinOp::Mul => BinOp::Mul,
        ast::BinOp::Div => BinOp::Div,
        ast::BinOp::Rem => BinOp::Rem,
        ast::BinOp::Eq => BinOp::Eq,
        ast::BinOp::NotEq => BinOp::NotEq,
        ast::BinOp::Lt => BinOp::Lt,
        ast::BinOp::LtEq => BinOp::LtEq,
        ast::BinOp::Gt => BinOp::Gt,
        ast::BinOp::GtEq => BinOp::GtEq,
    }
}

// --- tail-call marking ---

/// Marks self-calls in tail position of a function body.
///
/// Tail positions: the last expression statement of the body, the branches of
/// `if`/`when`/ternary/elvis-right in tail position, the value of a lowered
/// `Scope`, and any `return <call>`. `try` bodies are only tail positions
/// when the `try` has no catch arms and no `finally` (a reused frame would
/// otherwise skip live handlers). Lambda bodies are not walked — a lambda is
/// its own function.
fn mark_block_tail(block: &mut Block, fn_name: &str) {
    if let Some(Stmt::Expr(expr)) = block.stmts.last_mut() {
        mark_expr_tail(expr, fn_name);
    }
    for stmt in &mut block.stmts {
        mark_returns(stmt, fn_name);
    }
}

fn mark_expr_tail(expr: &mut Expr, fn_name: &str) {
    match expr {
        Expr::Call { callee, tail, .. } => {
            if matches!(callee.as_ref(), Expr::Ident(name, _) if name == fn_name) {
                *tail = true;
            }
        }
        Expr::If { then, els, .. } => {
            mark_block_tail_only(then, fn_name);
            if let Some(els) = els {
                mark_block_tail_only(els, fn_name);
            }
        }
        Expr::When { arms, els, .. } => {
            for arm in arms {
                mark_block_tail_only(&mut arm.body, fn_name);
            }
            if let Some(els) = els {
                mark_block_tail_only(els, fn_name);
            }
        }
        Expr::Ternary { then, els, .. } => {
            mark_expr_tail(then, fn_name);
            mark_expr_tail(els, fn_name);
        }
        Expr::Elvis { rhs, .. } => mark_expr_tail(rhs, fn_name),
        Expr::Scope { value, .. } => mark_expr_tail(value, fn_name),
        Expr::Try {
            body,
            catches,
            finally,
        } => {
            if catches.is_empty() && finally.is_none() {
                mark_block_tail_only(body, fn_name);
            }
        }
        Expr::Return { value: Some(value), .. } => mark_expr_tail(value, fn_name),
        _ => {}
    }
}

fn mark_block_tail_only(block: &mut Block, fn_name: &str) {
    if let Some(Stmt::Expr(expr)) = block.stmts.last_mut() {
        mark_expr_tail(expr, fn_name);
    }
}

/// Walks every statement for `return <self-call>` expressions, which are tail
/// positions wherever they appear (except inside nested lambdas/functions).
fn mark_returns(stmt: &mut Stmt, fn_name: &str) {
    match stmt {
        Stmt::Expr(expr) => mark_returns_expr(expr, fn_name),
        Stmt::Bind { init, .. } => mark_returns_expr(init, fn_name),
        Stmt::Assign { value, .. } | Stmt::NullAssign { value, .. } => mark_returns_expr(value, fn_name),
        Stmt::While { cond, body, .. } => {
            mark_returns_expr(cond, fn_name);
            for stmt in &mut body.stmts {
                mark_returns(stmt, fn_name);
            }
        }
        Stmt::For { iter, body, .. } => {
            mark_returns_expr(iter, fn_name);
            for stmt in &mut body.stmts {
                mark_returns(stmt, fn_name);
            }
        }
        Stmt::GuardLet { init, else_body, .. } => {
            mark_returns_expr(init, fn_name);
            for stmt in &mut else_body.stmts {
                mark_returns(stmt, fn_name);
            }
        }
        Stmt::Fun(_) | Stmt::Class(_) | Stmt::ExtProp { .. } => {}
    }
}

#[expect(clippy::too_many_lines, reason = "structural walk over every expression")]
fn mark_returns_expr(expr: &mut Expr, fn_name: &str) {
    match expr {
        Expr::Return { value: Some(value), .. } => mark_expr_tail(value, fn_name),
        Expr::If { cond, then, els } => {
            mark_returns_expr(cond, fn_name);
            for stmt in &mut then.stmts {
                mark_returns(stmt, fn_name);
            }
            if let Some(els) = els {
                for stmt in &mut els.stmts {
                    mark_returns(stmt, fn_name);
                }
            }
        }
        Expr::When { subject, arms, els, .. } => {
            if let Some(subject) = subject {
                mark_returns_expr(subject, fn_name);
            }
            for arm in arms {
                for stmt in &mut arm.body.stmts {
                    mark_returns(stmt, fn_name);
                }
            }
            if let Some(els) = els {
                for stmt in &mut els.stmts {
                    mark_returns(stmt, fn_name);
                }
            }
        }
        Expr::Try {
            body,
            catches,
            finally,
        } => {
            for stmt in &mut body.stmts {
                mark_returns(stmt, fn_name);
            }
            for catch in catches {
                for stmt in &mut catch.body.stmts {
                    mark_returns(stmt, fn_name);
                }
            }
            if let Some(finally) = finally {
                for stmt in &mut finally.stmts {
                    mark_returns(stmt, fn_name);
                }
            }
        }
        Expr::Scope { stmts, value } => {
            for stmt in stmts {
                mark_returns(stmt, fn_name);
            }
            mark_returns_expr(value, fn_name);
        }
        Expr::Binary { lhs, rhs, .. } | Expr::Logic { lhs, rhs, .. } | Expr::Elvis { lhs, rhs } => {
            mark_returns_expr(lhs, fn_name);
            mark_returns_expr(rhs, fn_name);
        }
        Expr::Ternary { cond, then, els } => {
            mark_returns_expr(cond, fn_name);
            mark_returns_expr(then, fn_name);
            mark_returns_expr(els, fn_name);
        }
        Expr::Unary { expr, .. }
        | Expr::Propagate { expr, .. }
        | Expr::Is { expr, .. }
        | Expr::Cast { expr, .. }
        | Expr::Throw { value: expr, .. } => mark_returns_expr(expr, fn_name),
        Expr::Call { callee, args, .. } => {
            mark_returns_expr(callee, fn_name);
            for arg in args {
                mark_returns_expr(&mut arg.value, fn_name);
            }
        }
        Expr::MethodCall { recv, args, .. } => {
            mark_returns_expr(recv, fn_name);
            for arg in args {
                mark_returns_expr(&mut arg.value, fn_name);
            }
        }
        Expr::Member { recv, .. } => mark_returns_expr(recv, fn_name),
        Expr::Index { recv, index, .. } => {
            mark_returns_expr(recv, fn_name);
            mark_returns_expr(index, fn_name);
        }
        Expr::InOp { item, collection, .. } => {
            mark_returns_expr(item, fn_name);
            mark_returns_expr(collection, fn_name);
        }
        Expr::ListLit(items) => {
            for item in items {
                mark_returns_expr(&mut item.value, fn_name);
            }
        }
        Expr::MapLit(entries) => {
            for (k, v) in entries {
                mark_returns_expr(k, fn_name);
                mark_returns_expr(v, fn_name);
            }
        }
        Expr::Interp(parts) => {
            for part in parts {
                if let InterpPart::Expr(e) = part {
                    mark_returns_expr(e, fn_name);
                }
            }
        }
        Expr::Range { start, end, .. } => {
            mark_returns_expr(start, fn_name);
            mark_returns_expr(end, fn_name);
        }
        // A lambda is its own function; its returns are local to it.
        Expr::Lambda(_) => {}
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn lower_src(src: &str) -> Mir {
        lower(&parse(src).expect("parse failed"), "test.nova")
    }

    fn find_fun<'a>(mir: &'a Mir, name: &str) -> &'a FunDef {
        mir.stmts
            .iter()
            .find_map(|stmt| match stmt {
                Stmt::Fun(f) if f.name == name => Some(f),
                _ => None,
            })
            .expect("function not found")
    }

    fn has_tail_call(block: &Block) -> bool {
        fn expr_has(expr: &Expr) -> bool {
            match expr {
                Expr::Call { tail, args, callee, .. } => {
                    *tail || expr_has(callee) || args.iter().any(|a| expr_has(&a.value))
                }
                Expr::If { cond, then, els } => {
                    expr_has(cond)
                        || then.stmts.iter().any(stmt_has)
                        || els.as_ref().is_some_and(|b| b.stmts.iter().any(stmt_has))
                }
                Expr::Ternary { cond, then, els } => expr_has(cond) || expr_has(then) || expr_has(els),
                Expr::Binary { lhs, rhs, .. } => expr_has(lhs) || expr_has(rhs),
                Expr::Scope { stmts, value } => stmts.iter().any(stmt_has) || expr_has(value),
                Expr::Return { value: Some(v), .. } => expr_has(v),
                _ => false,
            }
        }
        fn stmt_has(stmt: &Stmt) -> bool {
            match stmt {
                Stmt::Expr(e) | Stmt::Bind { init: e, .. } => expr_has(e),
                _ => false,
            }
        }
        block.stmts.iter().any(stmt_has)
    }

    #[test]
    fn marks_self_call_in_if_branch_tail() {
        let mir = lower_src("fun g(n: Int, acc: Int): Int = if (n == 0) acc else g(n - 1, acc + n)");
        assert!(has_tail_call(&find_fun(&mir, "g").body));
    }

    #[test]
    fn non_tail_self_call_is_unmarked() {
        // `n * fact(n - 1)` — the multiply happens after the call returns
        let mir = lower_src("fun fact(n: Int): Int = if (n <= 1) 1 else n * fact(n - 1)");
        let body = &find_fun(&mir, "fact").body;
        fn any_marked(block: &Block) -> bool {
            fn expr_marked(expr: &Expr) -> bool {
                match expr {
                    Expr::Call { tail, callee, args, .. } => {
                        *tail || expr_marked(callee) || args.iter().any(|a| expr_marked(&a.value))
                    }
                    Expr::If { cond, then, els } => {
                        expr_marked(cond)
                            || then.stmts.iter().any(stmt_marked)
                            || els.as_ref().is_some_and(|b| b.stmts.iter().any(stmt_marked))
                    }
                    Expr::Binary { lhs, rhs, .. } => expr_marked(lhs) || expr_marked(rhs),
                    _ => false,
                }
            }
            fn stmt_marked(stmt: &Stmt) -> bool {
                matches!(stmt, Stmt::Expr(e) if expr_marked(e))
            }
            block.stmts.iter().any(stmt_marked)
        }
        assert!(!any_marked(body));
    }

    #[test]
    fn chained_comparison_evaluates_middle_once() {
        let mir = lower_src("a < b < c");
        let Stmt::Expr(Expr::Scope { stmts, value }) = &mir.stmts[0] else {
            panic!("expected scope");
        };
        assert_eq!(stmts.len(), 1, "one temp binding for the middle operand");
        assert!(matches!(value.as_ref(), Expr::Logic { and: true, .. }));
    }

    #[test]
    fn pipeline_fills_placeholder() {
        let mir = lower_src("x |> f(10, _)");
        let Stmt::Expr(Expr::Scope { value, .. }) = &mir.stmts[0] else {
            panic!("expected scope");
        };
        let Expr::Call { args, .. } = value.as_ref() else { panic!("expected call") };
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[1].value, Expr::Ident(name, _) if name.starts_with("$pipe")));
    }

    #[test]
    fn data_class_gains_data_annotation() {
        let mir = lower_src("data class P(val x: Int, val y: Int)");
        let Stmt::Class(class) = &mir.stmts[0] else { panic!("expected class") };
        assert!(class.annotations.iter().any(|a| a.name == "data"));
    }

    #[test]
    fn mir_round_trips_through_postcard() {
        let mir = lower_src("fun add(a: Int, b: Int) = a + b\nadd(1, 2)");
        let bytes = mir.dump().unwrap();
        let restored = Mir::load(&bytes).unwrap();
        assert_eq!(restored.stmts.len(), mir.stmts.len());
        assert_eq!(restored.file, "test.nova");
    }
}
