//! Syntax tree for the host language.
//!
//! Only host node kinds live here. Markup statements never reach this tree in
//! their own shape; the markup hook lowers them to `Stmt::Expr(Expr::Call(..))`
//! before handing them back to the parser.

use crate::position::Pos;
use crate::tokenizer::TokenKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub pos: Pos,
    /// Full text including the `//` or `/* */` markers.
    pub text: String,
}

impl Comment {
    pub fn end(&self) -> Pos {
        self.pos.advance(self.text.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub pos: Pos,
    pub name: String,
}

impl Ident {
    /// A synthetic identifier with no source position.
    pub fn new(name: impl Into<String>) -> Self {
        Self::at(Pos::NONE, name)
    }

    pub fn at(pos: Pos, name: impl Into<String>) -> Self {
        Self {
            pos,
            name: name.into(),
        }
    }

    pub fn end(&self) -> Pos {
        self.pos.advance(self.name.len())
    }

    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicLit {
    pub pos: Pos,
    pub kind: LitKind,
    /// Literal source text, quotes included for strings and runes.
    pub value: String,
}

impl BasicLit {
    /// A synthetic double-quoted string literal. `text` must not need escaping.
    pub fn quoted(text: &str) -> Self {
        Self {
            pos: Pos::NONE,
            kind: LitKind::String,
            value: format!("\"{text}\""),
        }
    }

    pub fn end(&self) -> Pos {
        self.pos.advance(self.value.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub names: Vec<Ident>,
    pub ty: Expr,
    pub tag: Option<BasicLit>,
}

impl Field {
    pub fn pos(&self) -> Pos {
        self.names.first().map(|n| n.pos).unwrap_or_else(|| self.ty.pos())
    }

    pub fn end(&self) -> Pos {
        match &self.tag {
            Some(tag) => tag.end(),
            None => self.ty.end(),
        }
    }
}

/// Parameter, result, struct field, interface method or type parameter list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldList {
    /// `(`, `{` or `[`; `NONE` for an unparenthesized single result.
    pub opening: Pos,
    pub list: Vec<Field>,
    pub closing: Pos,
}

impl FieldList {
    pub fn pos(&self) -> Pos {
        if self.opening.is_valid() {
            return self.opening;
        }
        self.list.first().map(Field::pos).unwrap_or(Pos::NONE)
    }

    pub fn end(&self) -> Pos {
        if self.closing.is_valid() {
            return self.closing.advance(1);
        }
        self.list.last().map(Field::end).unwrap_or(Pos::NONE)
    }

    /// Number of declared entries, counting each name of a multi-name field.
    pub fn num_fields(&self) -> usize {
        self.list.iter().map(|f| f.names.len().max(1)).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    /// Position of `func`, or `NONE` inside interfaces and declarations.
    pub func: Pos,
    pub type_params: Option<FieldList>,
    pub params: FieldList,
    pub results: Option<FieldList>,
}

impl FuncType {
    pub fn pos(&self) -> Pos {
        if self.func.is_valid() {
            self.func
        } else {
            self.params.pos()
        }
    }

    pub fn end(&self) -> Pos {
        match &self.results {
            Some(results) => results.end(),
            None => self.params.end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub ty: FuncType,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLit {
    pub ty: Option<Box<Expr>>,
    pub lbrace: Pos,
    pub elts: Vec<Expr>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub fun: Box<Expr>,
    pub lparen: Pos,
    pub args: Vec<Expr>,
    /// Position of a trailing `...`, if any.
    pub ellipsis: Option<Pos>,
    pub rparen: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bad {
        from: Pos,
        to: Pos,
    },
    Ident(Ident),
    Ellipsis {
        pos: Pos,
        elt: Option<Box<Expr>>,
    },
    BasicLit(BasicLit),
    FuncLit(FuncLit),
    CompositeLit(CompositeLit),
    Paren {
        lparen: Pos,
        x: Box<Expr>,
        rparen: Pos,
    },
    Selector {
        x: Box<Expr>,
        sel: Ident,
    },
    /// `x[i]`, or a generic instantiation `x[A, B]`.
    Index {
        x: Box<Expr>,
        lbrack: Pos,
        indices: Vec<Expr>,
        rbrack: Pos,
    },
    Slice {
        x: Box<Expr>,
        lbrack: Pos,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
        slice3: bool,
        rbrack: Pos,
    },
    /// `x.(T)`; `ty` is `None` for `x.(type)` in a type switch.
    TypeAssert {
        x: Box<Expr>,
        lparen: Pos,
        ty: Option<Box<Expr>>,
        rparen: Pos,
    },
    Call(CallExpr),
    Star {
        star: Pos,
        x: Box<Expr>,
    },
    Unary {
        op_pos: Pos,
        op: TokenKind,
        x: Box<Expr>,
    },
    Binary {
        x: Box<Expr>,
        op_pos: Pos,
        op: TokenKind,
        y: Box<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        colon: Pos,
        value: Box<Expr>,
    },
    /// `[N]T`, `[...]T` (len is an `Ellipsis`) or `[]T` (no len).
    ArrayType {
        lbrack: Pos,
        len: Option<Box<Expr>>,
        elt: Box<Expr>,
    },
    StructType {
        pos: Pos,
        fields: FieldList,
    },
    FuncType(FuncType),
    InterfaceType {
        pos: Pos,
        methods: FieldList,
    },
    MapType {
        pos: Pos,
        key: Box<Expr>,
        value: Box<Expr>,
    },
    ChanType {
        pos: Pos,
        dir: ChanDir,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(Ident::new(name))
    }

    pub fn pos(&self) -> Pos {
        match self {
            Expr::Bad { from, .. } => *from,
            Expr::Ident(id) => id.pos,
            Expr::Ellipsis { pos, .. } => *pos,
            Expr::BasicLit(lit) => lit.pos,
            Expr::FuncLit(lit) => lit.ty.pos(),
            Expr::CompositeLit(lit) => match &lit.ty {
                Some(ty) => ty.pos(),
                None => lit.lbrace,
            },
            Expr::Paren { lparen, .. } => *lparen,
            Expr::Selector { x, .. }
            | Expr::Index { x, .. }
            | Expr::Slice { x, .. }
            | Expr::TypeAssert { x, .. }
            | Expr::Binary { x, .. } => x.pos(),
            Expr::Call(call) => call.fun.pos(),
            Expr::Star { star, .. } => *star,
            Expr::Unary { op_pos, .. } => *op_pos,
            Expr::KeyValue { key, .. } => key.pos(),
            Expr::ArrayType { lbrack, .. } => *lbrack,
            Expr::StructType { pos, .. }
            | Expr::InterfaceType { pos, .. }
            | Expr::MapType { pos, .. }
            | Expr::ChanType { pos, .. } => *pos,
            Expr::FuncType(ty) => ty.pos(),
        }
    }

    pub fn end(&self) -> Pos {
        match self {
            Expr::Bad { to, .. } => *to,
            Expr::Ident(id) => id.end(),
            Expr::Ellipsis { pos, elt } => match elt {
                Some(elt) => elt.end(),
                None => pos.advance(3),
            },
            Expr::BasicLit(lit) => lit.end(),
            Expr::FuncLit(lit) => lit.body.end(),
            Expr::CompositeLit(lit) => lit.rbrace.advance(1),
            Expr::Paren { rparen, .. } => rparen.advance(1),
            Expr::Selector { sel, .. } => sel.end(),
            Expr::Index { rbrack, .. } | Expr::Slice { rbrack, .. } => rbrack.advance(1),
            Expr::TypeAssert { rparen, .. } => rparen.advance(1),
            Expr::Call(call) => call.rparen.advance(1),
            Expr::Star { x, .. } | Expr::Unary { x, .. } => x.end(),
            Expr::Binary { y, .. } => y.end(),
            Expr::KeyValue { value, .. } => value.end(),
            Expr::ArrayType { elt, .. } => elt.end(),
            Expr::StructType { fields, .. } => fields.end(),
            Expr::FuncType(ty) => ty.end(),
            Expr::InterfaceType { methods, .. } => methods.end(),
            Expr::MapType { value, .. } | Expr::ChanType { value, .. } => value.end(),
        }
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren { x, .. } => x.unparen(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub lbrace: Pos,
    pub stmts: Vec<Stmt>,
    pub rbrace: Pos,
}

impl Block {
    pub fn end(&self) -> Pos {
        self.rbrace.advance(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub pos: Pos,
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub body: Block,
    /// Either `Stmt::Block` or `Stmt::If`.
    pub els: Option<Box<Stmt>>,
}

/// One `case`/`default` clause; an empty `list` is `default`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub case: Pos,
    pub list: Vec<Expr>,
    pub colon: Pos,
    pub body: Vec<Stmt>,
}

/// One `case`/`default` clause of a select; `comm` is `None` for `default`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommClause {
    pub case: Pos,
    pub comm: Option<Box<Stmt>>,
    pub colon: Pos,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub pos: Pos,
    pub init: Option<Box<Stmt>>,
    pub tag: Option<Expr>,
    pub lbrace: Pos,
    pub clauses: Vec<CaseClause>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSwitchStmt {
    pub pos: Pos,
    pub init: Option<Box<Stmt>>,
    /// `x := y.(type)` or `y.(type)`.
    pub assign: Box<Stmt>,
    pub lbrace: Pos,
    pub clauses: Vec<CaseClause>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub pos: Pos,
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeStmt {
    pub pos: Pos,
    pub key: Option<Expr>,
    pub value: Option<Expr>,
    /// `:=` or `=` when a key is present.
    pub tok: Option<(Pos, TokenKind)>,
    pub x: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Bad {
        from: Pos,
        to: Pos,
    },
    Decl(GenDecl),
    Empty {
        semi: Pos,
        implicit: bool,
    },
    Labeled {
        label: Ident,
        colon: Pos,
        stmt: Box<Stmt>,
    },
    Expr(Expr),
    Send {
        chan: Expr,
        arrow: Pos,
        value: Expr,
    },
    IncDec {
        x: Expr,
        tok_pos: Pos,
        tok: TokenKind,
    },
    Assign {
        lhs: Vec<Expr>,
        tok_pos: Pos,
        tok: TokenKind,
        rhs: Vec<Expr>,
    },
    Go {
        pos: Pos,
        call: Expr,
    },
    Defer {
        pos: Pos,
        call: Expr,
    },
    Return {
        pos: Pos,
        results: Vec<Expr>,
    },
    /// `break`, `continue`, `goto` or `fallthrough`.
    Branch {
        pos: Pos,
        tok: TokenKind,
        label: Option<Ident>,
    },
    Block(Block),
    If(IfStmt),
    Switch(SwitchStmt),
    TypeSwitch(TypeSwitchStmt),
    Select {
        pos: Pos,
        lbrace: Pos,
        clauses: Vec<CommClause>,
        rbrace: Pos,
    },
    For(ForStmt),
    Range(RangeStmt),
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Bad { from, .. } => *from,
            Stmt::Decl(decl) => decl.pos,
            Stmt::Empty { semi, .. } => *semi,
            Stmt::Labeled { label, .. } => label.pos,
            Stmt::Expr(x) => x.pos(),
            Stmt::Send { chan, .. } => chan.pos(),
            Stmt::IncDec { x, .. } => x.pos(),
            Stmt::Assign { lhs, tok_pos, .. } => lhs.first().map(Expr::pos).unwrap_or(*tok_pos),
            Stmt::Go { pos, .. }
            | Stmt::Defer { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::Branch { pos, .. }
            | Stmt::Select { pos, .. } => *pos,
            Stmt::Block(block) => block.lbrace,
            Stmt::If(s) => s.pos,
            Stmt::Switch(s) => s.pos,
            Stmt::TypeSwitch(s) => s.pos,
            Stmt::For(s) => s.pos,
            Stmt::Range(s) => s.pos,
        }
    }

    pub fn end(&self) -> Pos {
        match self {
            Stmt::Bad { to, .. } => *to,
            Stmt::Decl(decl) => decl.end(),
            Stmt::Empty { semi, implicit } => {
                if *implicit {
                    *semi
                } else {
                    semi.advance(1)
                }
            }
            Stmt::Labeled { stmt, .. } => stmt.end(),
            Stmt::Expr(x) => x.end(),
            Stmt::Send { value, .. } => value.end(),
            Stmt::IncDec { tok_pos, .. } => tok_pos.advance(2),
            Stmt::Assign { rhs, tok_pos, .. } => rhs.last().map(Expr::end).unwrap_or(*tok_pos),
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => call.end(),
            Stmt::Return { pos, results } => match results.last() {
                Some(last) => last.end(),
                None => pos.advance("return".len()),
            },
            Stmt::Branch { pos, tok, label } => match label {
                Some(label) => label.end(),
                None => pos.advance(tok.as_str().len()),
            },
            Stmt::Block(block) => block.end(),
            Stmt::If(s) => match &s.els {
                Some(els) => els.end(),
                None => s.body.end(),
            },
            Stmt::Switch(s) => s.rbrace.advance(1),
            Stmt::TypeSwitch(s) => s.rbrace.advance(1),
            Stmt::Select { rbrace, .. } => rbrace.advance(1),
            Stmt::For(s) => s.body.end(),
            Stmt::Range(s) => s.body.end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub name: Option<Ident>,
    pub path: BasicLit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Option<FieldList>,
    /// Position of `=` for alias declarations.
    pub assign: Option<Pos>,
    pub ty: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

impl Spec {
    pub fn pos(&self) -> Pos {
        match self {
            Spec::Import(s) => s.name.as_ref().map(|n| n.pos).unwrap_or(s.path.pos),
            Spec::Value(s) => s.names.first().map(|n| n.pos).unwrap_or(Pos::NONE),
            Spec::Type(s) => s.name.pos,
        }
    }

    pub fn end(&self) -> Pos {
        match self {
            Spec::Import(s) => s.path.end(),
            Spec::Value(s) => match (s.values.last(), &s.ty) {
                (Some(last), _) => last.end(),
                (None, Some(ty)) => ty.end(),
                (None, None) => s.names.last().map(Ident::end).unwrap_or(Pos::NONE),
            },
            Spec::Type(s) => s.ty.end(),
        }
    }
}

/// `import`, `const`, `type` or `var` declaration, grouped when `lparen` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct GenDecl {
    pub pos: Pos,
    pub tok: TokenKind,
    pub lparen: Option<Pos>,
    pub specs: Vec<Spec>,
    pub rparen: Pos,
}

impl GenDecl {
    pub fn end(&self) -> Pos {
        if self.lparen.is_some() {
            return self.rparen.advance(1);
        }
        self.specs.first().map(Spec::end).unwrap_or(self.pos)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub pos: Pos,
    pub recv: Option<FieldList>,
    pub name: Ident,
    pub ty: FuncType,
    pub body: Option<Block>,
}

impl FuncDecl {
    pub fn end(&self) -> Pos {
        match &self.body {
            Some(body) => body.end(),
            None => self.ty.end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Bad { from: Pos, to: Pos },
    Gen(GenDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn pos(&self) -> Pos {
        match self {
            Decl::Bad { from, .. } => *from,
            Decl::Gen(decl) => decl.pos,
            Decl::Func(decl) => decl.pos,
        }
    }

    pub fn end(&self) -> Pos {
        match self {
            Decl::Bad { to, .. } => *to,
            Decl::Gen(decl) => decl.end(),
            Decl::Func(decl) => decl.end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub package: Pos,
    pub name: Ident,
    pub decls: Vec<Decl>,
    pub comments: Vec<Comment>,
}

impl File {
    /// Import declarations, which always lead the file.
    pub fn imports(&self) -> impl Iterator<Item = &ImportSpec> {
        self.decls
            .iter()
            .flat_map(|decl| match decl {
                Decl::Gen(gen) if gen.tok == TokenKind::Import => gen.specs.as_slice(),
                _ => &[][..],
            })
            .filter_map(|spec| match spec {
                Spec::Import(import) => Some(import),
                _ => None,
            })
    }
}

/// A bare statement list parsed outside any function, with its comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub stmts: Vec<Stmt>,
    pub comments: Vec<Comment>,
}
