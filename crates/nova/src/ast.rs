//! The tree produced by the parser.
//!
//! Surface-level constructs (pipelines, chained comparisons, `if let`,
//! placeholders) survive here untouched; lowering to [`crate::mir`] desugars
//! them and marks tail calls.

/// Source position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A parsed compilation unit.
#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

/// A `{ ... }` statement sequence; its value is the last expression statement.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// Binding pattern for `val`/`var`/`for`/lambda parameters.
#[derive(Debug, Clone)]
pub enum BindPattern {
    Name(String),
    /// Destructuring positions; `None` is the `_` skip marker.
    Tuple(Vec<Option<String>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// `??=` assign-if-null
    NullCoalesce,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Val {
        pattern: BindPattern,
        init: Expr,
        span: Span,
    },
    Var {
        pattern: BindPattern,
        init: Expr,
        span: Span,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    For {
        pattern: BindPattern,
        iter: Expr,
        body: Block,
        span: Span,
    },
    Fun(FunDecl),
    Class(ClassDecl),
    /// Extension property: `val String.name get() = expr`.
    ExtProp {
        receiver: String,
        name: String,
        body: Expr,
        span: Span,
    },
    /// `guard let x = expr else { ... }` — the else block must exit.
    GuardLet {
        name: String,
        init: Expr,
        else_body: Block,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    Inc,
    Dec,
}

/// One fragment of an interpolated string.
#[derive(Debug, Clone)]
pub enum InterpPart {
    Lit(String),
    Expr(Expr),
}

/// A call argument: optionally named, optionally a `*spread`.
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
    pub spread: bool,
}

impl Arg {
    #[must_use]
    pub fn positional(value: Expr) -> Self {
        Self {
            name: None,
            value,
            spread: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WhenSubject {
    /// `when (val r = expr)` binds `r` for the arm bodies.
    pub binding: Option<String>,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone)]
pub enum WhenTest {
    /// Literal/equality (subject form) or boolean condition (subject-less form).
    Expr(Expr),
    In(Expr),
    NotIn(Expr),
    Is(String),
    NotIs(String),
}

#[derive(Debug, Clone)]
pub struct WhenArm {
    pub tests: Vec<WhenTest>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub name: String,
    pub ty: Option<String>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct LambdaParam {
    pub pattern: BindPattern,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Null(Span),
    Bool(bool, Span),
    Int(i32, Span),
    Long(i64, Span),
    Float(f32, Span),
    Double(f64, Span),
    Char(char, Span),
    /// String literal as interpolation fragments; plain strings have a single
    /// `Lit` part.
    Str(Vec<InterpPart>, Span),
    ListLit(Vec<Arg>, Span),
    MapLit(Vec<(Expr, Expr)>, Span),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        inclusive: bool,
        span: Span,
    },
    Ident(String, Span),
    This(Span),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Logic {
        op: LogicOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    IncDec {
        op: IncDecOp,
        target: Box<Expr>,
        prefix: bool,
        span: Span,
    },
    /// `a < b < c` — more operands than a single comparison.
    Chained {
        operands: Vec<Expr>,
        ops: Vec<CmpOp>,
        span: Span,
    },
    /// A call; a trailing lambda is appended to `args` by the parser.
    Call {
        callee: Box<Expr>,
        type_args: Vec<String>,
        args: Vec<Arg>,
        span: Span,
    },
    MethodCall {
        recv: Box<Expr>,
        name: String,
        type_args: Vec<String>,
        args: Vec<Arg>,
        safe: bool,
        on_super: bool,
        span: Span,
    },
    Member {
        recv: Box<Expr>,
        name: String,
        safe: bool,
        on_super: bool,
        span: Span,
    },
    Index {
        recv: Box<Expr>,
        args: Vec<Expr>,
        safe: bool,
        span: Span,
    },
    Lambda {
        params: Vec<LambdaParam>,
        body: Block,
        span: Span,
    },
    If {
        cond: Box<Expr>,
        then: Block,
        els: Option<Block>,
        span: Span,
    },
    /// `if let x = e { ... } else { ... }` — binds when `e` is non-null.
    IfLet {
        name: String,
        value: Box<Expr>,
        then: Block,
        els: Option<Block>,
        span: Span,
    },
    When {
        subject: Option<WhenSubject>,
        arms: Vec<WhenArm>,
        els: Option<Block>,
        span: Span,
    },
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
        span: Span,
    },
    Throw {
        value: Box<Expr>,
        span: Span,
    },
    Return {
        value: Option<Box<Expr>>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
        span: Span,
    },
    Elvis {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// Postfix `?` error propagation.
    Propagate {
        expr: Box<Expr>,
        span: Span,
    },
    Is {
        expr: Box<Expr>,
        ty: String,
        negated: bool,
        span: Span,
    },
    Cast {
        expr: Box<Expr>,
        ty: String,
        safe: bool,
        span: Span,
    },
    InOp {
        item: Box<Expr>,
        collection: Box<Expr>,
        negated: bool,
        span: Span,
    },
    Pipeline {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// The `_` placeholder inside call arguments and pipelines.
    Hole(Span),
    /// `Type::name`, `::name`, `Type::class`.
    MethodRef {
        qualifier: Option<String>,
        name: String,
        span: Span,
    },
}

impl Expr {
    /// The source position of this expression.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Null(s)
            | Self::Bool(_, s)
            | Self::Int(_, s)
            | Self::Long(_, s)
            | Self::Float(_, s)
            | Self::Double(_, s)
            | Self::Char(_, s)
            | Self::Str(_, s)
            | Self::ListLit(_, s)
            | Self::MapLit(_, s)
            | Self::Ident(_, s)
            | Self::This(s)
            | Self::Break(s)
            | Self::Continue(s)
            | Self::Hole(s) => *s,
            Self::Range { span, .. }
            | Self::Binary { span, .. }
            | Self::Logic { span, .. }
            | Self::Unary { span, .. }
            | Self::IncDec { span, .. }
            | Self::Chained { span, .. }
            | Self::Call { span, .. }
            | Self::MethodCall { span, .. }
            | Self::Member { span, .. }
            | Self::Index { span, .. }
            | Self::Lambda { span, .. }
            | Self::If { span, .. }
            | Self::IfLet { span, .. }
            | Self::When { span, .. }
            | Self::Try { span, .. }
            | Self::Throw { span, .. }
            | Self::Return { span, .. }
            | Self::Ternary { span, .. }
            | Self::Elvis { span, .. }
            | Self::Propagate { span, .. }
            | Self::Is { span, .. }
            | Self::Cast { span, .. }
            | Self::InOp { span, .. }
            | Self::Pipeline { span, .. }
            | Self::MethodRef { span, .. } => *span,
        }
    }
}

/// Declaration modifiers recognised by the parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_data: bool,
    pub is_open: bool,
    pub is_override: bool,
    pub is_inline: bool,
    pub visibility: VisibilityMod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityMod {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub ty: Option<String>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct FunDecl {
    pub name: String,
    /// Receiver type name when this is an extension function.
    pub receiver: Option<String>,
    /// Reified type parameter names from `<reified T>`.
    pub type_params: Vec<String>,
    pub params: Vec<ParamDecl>,
    pub body: Block,
    /// False for bodiless abstract/interface method signatures.
    pub has_body: bool,
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Object,
}

/// Primary-constructor parameter; `prop` promotes it to a field.
#[derive(Debug, Clone)]
pub struct CtorParam {
    pub name: String,
    pub ty: Option<String>,
    pub default: Option<Expr>,
    pub prop: Option<PropSpec>,
}

#[derive(Debug, Clone, Copy)]
pub struct PropSpec {
    pub mutable: bool,
    pub visibility: VisibilityMod,
}

#[derive(Debug, Clone)]
pub enum MemberDecl {
    Property {
        name: String,
        mutable: bool,
        visibility: VisibilityMod,
        init: Option<Expr>,
        span: Span,
    },
    Init(Block),
    Method(FunDecl),
    SecondaryCtor {
        params: Vec<ParamDecl>,
        /// `: this(...)` delegation arguments.
        delegate: Option<Vec<Arg>>,
        body: Block,
        span: Span,
    },
    Companion {
        name: Option<String>,
        members: Vec<MemberDecl>,
    },
}

#[derive(Debug, Clone)]
pub struct EnumEntryDecl {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub kind: ClassKind,
    pub name: String,
    pub annotations: Vec<Annotation>,
    pub modifiers: Modifiers,
    pub type_params: Vec<String>,
    pub primary: Option<Vec<CtorParam>>,
    pub superclass: Option<(String, Vec<Arg>)>,
    pub interfaces: Vec<String>,
    pub members: Vec<MemberDecl>,
    pub enum_entries: Vec<EnumEntryDecl>,
    pub span: Span,
}
