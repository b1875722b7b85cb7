//! Pretty-printer for the host syntax tree, following gofmt's layout rules.
//!
//! Layout decisions that depend on the source (blank lines, broken argument
//! lists, one-line function bodies) read line numbers through the
//! [`SourceFile`]; nodes without a position are laid out as if they sat on
//! the same line as their neighbours.
//!
//! Column alignment works like gofmt's tabwriter pass: the printer marks cell
//! boundaries with `\v`, and [`align`] pads every cell of a column block to a
//! common width once the whole text is known.

use crate::ast::{
    Block, CallExpr, CaseClause, ChanDir, CommClause, Comment, Decl, Expr, Field, FieldList, File,
    Fragment, FuncDecl, FuncLit, FuncType, GenDecl, Ident, IfStmt, Spec, Stmt,
};
use crate::config::PrinterOptions;
use crate::position::{Pos, Position, SourceFile};
use crate::tokenizer::{TokenKind, LOWEST_PREC, UNARY_PREC};
use thiserror::Error;

const HIGHEST_PREC: u8 = 7;
/// Cell terminator for column alignment.
const CELL: &str = "\u{b}";
/// Longest header plus body a function may have and still print on one line.
const MAX_ONE_LINE: usize = 100;
/// Longest single-field struct or interface kept on one line.
const MAX_ONE_LINE_FIELD: usize = 30;
/// Keys longer than this break key/value alignment.
const SMALL_KEY: usize = 40;

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("{pos}: cannot print invalid {kind}")]
    Invalid { kind: &'static str, pos: Position },
}

type PrintResult = Result<(), PrintError>;

/// Render a whole file.
pub fn print_file(
    file: &File,
    source: &SourceFile,
    options: &PrinterOptions,
) -> Result<String, PrintError> {
    let mut printer = Printer::new(source, &file.comments);
    printer.file(file)?;
    Ok(printer.finish(options))
}

/// Render a bare statement list at the outermost indentation level.
pub fn print_fragment(
    fragment: &Fragment,
    source: &SourceFile,
    options: &PrinterOptions,
) -> Result<String, PrintError> {
    let mut printer = Printer::new(source, &fragment.comments);
    printer.stmt_list(&fragment.stmts)?;
    Ok(printer.finish(options))
}

struct Printer<'a> {
    source: &'a SourceFile,
    comments: &'a [Comment],
    next_comment: usize,
    out: String,
    indent: usize,
    line_start: bool,
    /// Source line of the last thing printed, 0 when unknown.
    last_line: usize,
    /// Set while a broken binary expression holds an extra indentation level.
    continuation: bool,
}

impl<'a> Printer<'a> {
    fn new(source: &'a SourceFile, comments: &'a [Comment]) -> Self {
        Self {
            source,
            comments,
            next_comment: 0,
            out: String::new(),
            indent: 0,
            line_start: true,
            last_line: 0,
            continuation: false,
        }
    }

    fn finish(mut self, options: &PrinterOptions) -> String {
        let comments = self.comments;
        while let Some(c) = comments.get(self.next_comment) {
            self.comment(c, 1);
        }
        if self.out.is_empty() {
            return String::new();
        }
        let unit = if options.use_spaces {
            " ".repeat(options.indent_width)
        } else {
            "\t".to_string()
        };
        let mut text = align(&self.out, &unit);
        text.push('\n');
        text
    }

    fn write(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if self.line_start {
            for _ in 0..self.indent {
                self.out.push('\t');
            }
            self.line_start = false;
        }
        self.out.push_str(s);
    }

    fn set_line(&mut self, pos: Pos) {
        let line = self.source.line(pos);
        if line > 0 {
            self.last_line = line;
        }
    }

    /// Break the line before something that starts on source `line`, keeping
    /// at most one blank line from the source.
    fn line_break(&mut self, line: usize, min: usize) {
        let n = if line > 0 && self.last_line > 0 && line > self.last_line {
            (line - self.last_line).clamp(min, 2)
        } else {
            min
        };
        if !self.out.is_empty() {
            for _ in 0..n {
                self.out.push('\n');
            }
            self.line_start = true;
        }
        if line > 0 {
            self.last_line = line;
        }
    }

    fn comment_before(&self, pos: Pos) -> Option<&'a Comment> {
        let comments = self.comments;
        comments
            .get(self.next_comment)
            .filter(|c| pos.is_valid() && c.pos < pos)
    }

    fn comment(&mut self, comment: &Comment, min: usize) {
        self.line_break(self.source.line(comment.pos), min);
        self.write(&comment.text);
        self.next_comment += 1;
        self.set_line(comment.end());
    }

    /// Comments that precede `pos` go on their own lines, then the line is
    /// broken for the node at `pos`.
    fn leading(&mut self, pos: Pos, min: usize) {
        let mut min = min;
        while let Some(c) = self.comment_before(pos) {
            self.comment(c, min);
            min = 1;
        }
        self.line_break(self.source.line(pos), min);
    }

    fn trailing(&mut self) {
        self.trailing_with(0);
    }

    /// Comments starting on the line the last node ended on stay on that
    /// line. `extra` empty cells keep them in the same column as comments of
    /// neighbouring lines that have more cells.
    fn trailing_with(&mut self, extra: usize) {
        let comments = self.comments;
        let mut first = true;
        while let Some(c) = comments.get(self.next_comment) {
            if self.last_line == 0 || self.source.line(c.pos) != self.last_line {
                break;
            }
            if first {
                for _ in 0..=extra {
                    self.write(CELL);
                }
                first = false;
            } else {
                self.write(" ");
            }
            self.write(&c.text);
            self.next_comment += 1;
            self.set_line(c.end());
        }
    }

    /// Comments left before the closing token, then the token on its own line.
    fn close(&mut self, pos: Pos, token: &str) {
        while let Some(c) = self.comment_before(pos) {
            self.comment(c, 1);
        }
        self.indent -= 1;
        self.line_break(self.source.line(pos), 1);
        self.write(token);
    }

    fn invalid(&self, kind: &'static str, pos: Pos) -> PrintError {
        PrintError::Invalid {
            kind,
            pos: self.source.position(pos),
        }
    }

    /// Print with a scratch printer; `None` unless the result fits on one line.
    fn render(&self, f: impl FnOnce(&mut Printer<'a>) -> PrintResult) -> Option<String> {
        let mut scratch = Printer::new(self.source, &[]);
        f(&mut scratch).ok()?;
        (!scratch.out.contains('\n') && !scratch.out.contains(CELL)).then_some(scratch.out)
    }

    // ---- declarations ----

    fn file(&mut self, file: &File) -> PrintResult {
        self.leading(file.package, 1);
        self.write("package ");
        self.write(&file.name.name);
        self.set_line(file.name.pos);
        self.trailing();

        let mut prev = None;
        for decl in &file.decls {
            let tok = match decl {
                Decl::Bad { from, .. } => return Err(self.invalid("declaration", *from)),
                Decl::Gen(gen) => gen.tok,
                Decl::Func(_) => TokenKind::Func,
            };
            let documented = self.comment_before(decl.pos()).is_some();
            let min = if prev != Some(tok) || documented { 2 } else { 1 };
            self.leading(decl.pos(), min);
            match decl {
                Decl::Gen(gen) => self.gen_decl(gen)?,
                Decl::Func(func) => self.func_decl(func)?,
                Decl::Bad { .. } => {}
            }
            self.set_line(decl.end());
            self.trailing();
            prev = Some(tok);
        }
        Ok(())
    }

    fn gen_decl(&mut self, decl: &GenDecl) -> PrintResult {
        self.write(decl.tok.as_str());
        self.write(" ");
        let Some(lparen) = decl.lparen else {
            for spec in &decl.specs {
                self.spec(spec, false, false)?;
            }
            return Ok(());
        };

        self.write("(");
        if decl.specs.is_empty() {
            self.write(")");
            return Ok(());
        }
        self.set_line(lparen);
        self.trailing();
        let keep_type = decl.specs.iter().any(|spec| {
            matches!(spec, Spec::Value(value) if value.ty.is_some())
        });
        self.indent += 1;
        for spec in &decl.specs {
            self.leading(spec.pos(), 1);
            let extra = self.spec(spec, true, keep_type)?;
            self.set_line(spec.end());
            self.trailing_with(extra);
        }
        self.close(decl.rparen, ")");
        Ok(())
    }

    /// Returns the number of empty cells a trailing comment needs to line up
    /// with the comments of other specs in the group.
    fn spec(&mut self, spec: &Spec, grouped: bool, keep_type: bool) -> Result<usize, PrintError> {
        let sep = if grouped { CELL } else { " " };
        match spec {
            Spec::Import(import) => {
                if let Some(name) = &import.name {
                    self.write(&name.name);
                    self.write(" ");
                }
                self.write(&import.path.value);
                Ok(0)
            }
            Spec::Value(value) => {
                let mut extra = 2;
                self.ident_list(&value.names);
                if value.ty.is_some() || (grouped && keep_type) {
                    self.write(sep);
                    extra -= 1;
                }
                if let Some(ty) = &value.ty {
                    self.expr(ty)?;
                }
                if !value.values.is_empty() {
                    self.write(sep);
                    self.write("= ");
                    self.expr_list(Pos::NONE, &value.values, 1, Pos::NONE, false)?;
                    extra -= 1;
                }
                Ok(extra)
            }
            Spec::Type(spec) => {
                self.write(&spec.name.name);
                if let Some(params) = &spec.type_params {
                    self.write("[");
                    self.params(&params.list)?;
                    self.write("]");
                }
                self.write(sep);
                if spec.assign.is_some() {
                    self.write("= ");
                }
                self.expr(&spec.ty)?;
                Ok(0)
            }
        }
    }

    fn func_decl(&mut self, decl: &FuncDecl) -> PrintResult {
        self.write("func ");
        let start = self.out.len() - "func ".len();
        if let Some(recv) = &decl.recv {
            self.write("(");
            self.params(&recv.list)?;
            self.write(") ");
        }
        self.write(&decl.name.name);
        self.signature(&decl.ty)?;
        let header = self.out[start..].chars().count();
        match &decl.body {
            Some(body) => self.func_body(header, CELL, body),
            None => Ok(()),
        }
    }

    fn ident_list(&mut self, names: &[Ident]) {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&name.name);
        }
    }

    fn params(&mut self, list: &[Field]) -> PrintResult {
        for (i, field) in list.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            if !field.names.is_empty() {
                self.ident_list(&field.names);
                self.write(" ");
            }
            self.expr(&field.ty)?;
        }
        Ok(())
    }

    /// Type parameters, parameters and results; `func` itself is not printed.
    fn signature(&mut self, ty: &FuncType) -> PrintResult {
        if let Some(type_params) = &ty.type_params {
            self.write("[");
            self.params(&type_params.list)?;
            self.write("]");
        }
        self.write("(");
        self.params(&ty.params.list)?;
        self.write(")");
        if let Some(results) = &ty.results {
            match results.list.as_slice() {
                [single] if single.names.is_empty() => {
                    self.write(" ");
                    self.expr(single.ty.unparen())?;
                }
                list => {
                    self.write(" (");
                    self.params(list)?;
                    self.write(")");
                }
            }
        }
        Ok(())
    }

    /// A body that was written on one line and stays short is kept there.
    fn func_body(&mut self, header: usize, sep: &str, body: &Block) -> PrintResult {
        if let Some(stmts) = self.one_line_body(header, body) {
            self.write(sep);
            if stmts.is_empty() {
                self.write("{}");
            } else {
                self.write("{ ");
                self.write(&stmts.join("; "));
                self.write(" }");
            }
            self.set_line(body.rbrace);
            return Ok(());
        }
        self.write(" ");
        self.block(body)
    }

    fn one_line_body(&self, header: usize, body: &Block) -> Option<Vec<String>> {
        let open = self.source.line(body.lbrace);
        let close = self.source.line(body.rbrace);
        if open > 0 && close > 0 && open != close {
            return None;
        }
        let stmts: Vec<&Stmt> = body
            .stmts
            .iter()
            .filter(|s| !matches!(s, Stmt::Empty { .. }))
            .collect();
        if stmts.len() > 5 {
            return None;
        }
        let commented = self.comments[self.next_comment..]
            .iter()
            .any(|c| c.pos > body.lbrace && c.pos < body.rbrace);
        if commented {
            return None;
        }

        let mut size = 0;
        let mut rendered = Vec::with_capacity(stmts.len());
        for (i, stmt) in stmts.iter().enumerate() {
            let text = self.render(|p| p.stmt(stmt))?;
            size += text.chars().count() + if i > 0 { 2 } else { 0 };
            if header + size > MAX_ONE_LINE {
                return None;
            }
            rendered.push(text);
        }
        Some(rendered)
    }

    // ---- statements ----

    fn stmt_list(&mut self, list: &[Stmt]) -> PrintResult {
        for stmt in list {
            if matches!(stmt, Stmt::Empty { .. }) {
                continue;
            }
            self.leading(stmt.pos(), 1);
            self.stmt(stmt)?;
            self.set_line(stmt.end());
            self.trailing();
        }
        Ok(())
    }

    fn block(&mut self, block: &Block) -> PrintResult {
        self.write("{");
        self.set_line(block.lbrace);
        self.trailing();
        let continuation = std::mem::replace(&mut self.continuation, false);
        self.indent += 1;
        self.stmt_list(&block.stmts)?;
        self.close(block.rbrace, "}");
        self.continuation = continuation;
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> PrintResult {
        match stmt {
            Stmt::Bad { from, .. } => return Err(self.invalid("statement", *from)),
            Stmt::Decl(decl) => self.gen_decl(decl)?,
            Stmt::Empty { .. } => {}
            Stmt::Labeled { label, stmt, .. } => {
                // labels sit one level left of the statement they label
                let indent = self.indent;
                self.indent = indent.saturating_sub(1);
                self.write(&label.name);
                self.write(":");
                self.indent = indent;
                if !matches!(**stmt, Stmt::Empty { .. }) {
                    self.line_break(self.source.line(stmt.pos()), 1);
                    self.stmt(stmt)?;
                }
            }
            Stmt::Expr(x) => self.expr0(x, 1)?,
            Stmt::Send { chan, value, .. } => {
                self.expr0(chan, 1)?;
                self.write(" <- ");
                self.expr0(value, 1)?;
            }
            Stmt::IncDec { x, tok, .. } => {
                self.expr0(x, 2)?;
                self.write(tok.as_str());
            }
            Stmt::Assign {
                lhs,
                tok_pos,
                tok,
                rhs,
            } => {
                let depth = if lhs.len() > 1 && rhs.len() > 1 { 2 } else { 1 };
                self.expr_list(stmt.pos(), lhs, depth, *tok_pos, false)?;
                self.write(" ");
                self.write(tok.as_str());
                self.write(" ");
                self.expr_list(*tok_pos, rhs, depth, Pos::NONE, false)?;
            }
            Stmt::Go { call, .. } => {
                self.write("go ");
                self.expr(call)?;
            }
            Stmt::Defer { call, .. } => {
                self.write("defer ");
                self.expr(call)?;
            }
            Stmt::Return { pos, results } => {
                self.write("return");
                if !results.is_empty() {
                    self.write(" ");
                    self.expr_list(*pos, results, 1, Pos::NONE, false)?;
                }
            }
            Stmt::Branch { tok, label, .. } => {
                self.write(tok.as_str());
                if let Some(label) = label {
                    self.write(" ");
                    self.write(&label.name);
                }
            }
            Stmt::Block(block) => self.block(block)?,
            Stmt::If(s) => self.if_stmt(s)?,
            Stmt::Switch(s) => {
                self.write("switch");
                self.control_clause(false, s.init.as_deref(), s.tag.as_ref(), None)?;
                self.case_body(s.lbrace, &s.clauses, s.rbrace)?;
            }
            Stmt::TypeSwitch(s) => {
                self.write("switch");
                if let Some(init) = &s.init {
                    self.write(" ");
                    self.stmt(init)?;
                    self.write(";");
                }
                self.write(" ");
                self.stmt(&s.assign)?;
                self.write(" ");
                self.case_body(s.lbrace, &s.clauses, s.rbrace)?;
            }
            Stmt::Select {
                lbrace,
                clauses,
                rbrace,
                ..
            } => {
                self.write("select ");
                self.comm_body(*lbrace, clauses, *rbrace)?;
            }
            Stmt::For(s) => {
                self.write("for");
                self.control_clause(true, s.init.as_deref(), s.cond.as_ref(), s.post.as_deref())?;
                self.block(&s.body)?;
            }
            Stmt::Range(s) => {
                self.write("for ");
                if let Some(key) = &s.key {
                    self.expr(key)?;
                    if let Some(value) = &s.value {
                        self.write(", ");
                        self.expr(value)?;
                    }
                    if let Some((_, tok)) = s.tok {
                        self.write(" ");
                        self.write(tok.as_str());
                        self.write(" ");
                    }
                }
                self.write("range ");
                self.expr(strip_parens(&s.x))?;
                self.write(" ");
                self.block(&s.body)?;
            }
        }
        Ok(())
    }

    fn if_stmt(&mut self, s: &IfStmt) -> PrintResult {
        self.write("if");
        self.control_clause(false, s.init.as_deref(), Some(&s.cond), None)?;
        self.block(&s.body)?;
        if let Some(els) = &s.els {
            self.write(" else ");
            match &**els {
                Stmt::If(nested) => self.if_stmt(nested)?,
                other => self.stmt(other)?,
            }
        }
        Ok(())
    }

    /// The header between `if`/`switch`/`for` and the opening brace.
    fn control_clause(
        &mut self,
        is_for: bool,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
    ) -> PrintResult {
        self.write(" ");
        let mut blank = false;
        if init.is_none() && post.is_none() {
            if let Some(cond) = cond {
                self.expr(strip_parens(cond))?;
                blank = true;
            }
        } else {
            if let Some(init) = init {
                self.stmt(init)?;
            }
            self.write("; ");
            if let Some(cond) = cond {
                self.expr(strip_parens(cond))?;
                blank = true;
            }
            if is_for {
                self.write("; ");
                blank = false;
                if let Some(post) = post {
                    self.stmt(post)?;
                    blank = true;
                }
            }
        }
        if blank {
            self.write(" ");
        }
        Ok(())
    }

    fn case_body(&mut self, lbrace: Pos, clauses: &[CaseClause], rbrace: Pos) -> PrintResult {
        self.write("{");
        self.set_line(lbrace);
        self.trailing();
        let continuation = std::mem::replace(&mut self.continuation, false);
        for clause in clauses {
            self.leading(clause.case, 1);
            if clause.list.is_empty() {
                self.write("default");
            } else {
                self.write("case ");
                self.expr_list(clause.case, &clause.list, 1, clause.colon, false)?;
            }
            self.write(":");
            self.set_line(clause.colon);
            self.trailing();
            self.indent += 1;
            self.stmt_list(&clause.body)?;
            self.indent -= 1;
        }
        self.indent += 1;
        self.close(rbrace, "}");
        self.continuation = continuation;
        Ok(())
    }

    fn comm_body(&mut self, lbrace: Pos, clauses: &[CommClause], rbrace: Pos) -> PrintResult {
        self.write("{");
        self.set_line(lbrace);
        self.trailing();
        let continuation = std::mem::replace(&mut self.continuation, false);
        for clause in clauses {
            self.leading(clause.case, 1);
            match &clause.comm {
                Some(comm) => {
                    self.write("case ");
                    self.stmt(comm)?;
                }
                None => self.write("default"),
            }
            self.write(":");
            self.set_line(clause.colon);
            self.trailing();
            self.indent += 1;
            self.stmt_list(&clause.body)?;
            self.indent -= 1;
        }
        self.indent += 1;
        self.close(rbrace, "}");
        self.continuation = continuation;
        Ok(())
    }

    // ---- expressions ----

    fn expr(&mut self, x: &Expr) -> PrintResult {
        self.expr1(x, LOWEST_PREC, 1)
    }

    fn expr0(&mut self, x: &Expr, depth: usize) -> PrintResult {
        self.expr1(x, LOWEST_PREC, depth)
    }

    /// `prec1` is the precedence of the surrounding operator; `depth` counts
    /// nesting levels that make binary operators print more tightly.
    fn expr1(&mut self, x: &Expr, prec1: u8, depth: usize) -> PrintResult {
        match x {
            Expr::Bad { from, .. } => return Err(self.invalid("expression", *from)),
            Expr::Ident(ident) => self.write(&ident.name),
            Expr::BasicLit(lit) => self.write(&lit.value),
            Expr::Ellipsis { elt, .. } => {
                self.write("...");
                if let Some(elt) = elt {
                    self.expr(elt)?;
                }
            }
            Expr::FuncLit(lit) => self.func_lit(lit)?,
            Expr::CompositeLit(lit) => {
                if let Some(ty) = &lit.ty {
                    self.expr1(ty, HIGHEST_PREC, depth)?;
                }
                self.write("{");
                self.expr_list(lit.lbrace, &lit.elts, 1, lit.rbrace, true)?;
                self.write("}");
            }
            Expr::Paren { x: inner, .. } => {
                if matches!(**inner, Expr::Paren { .. }) {
                    self.expr0(inner, depth)?;
                } else {
                    self.write("(");
                    self.expr0(inner, depth.saturating_sub(1).max(1))?;
                    self.write(")");
                }
            }
            Expr::Selector { x: inner, sel } => {
                self.expr1(inner, HIGHEST_PREC, depth)?;
                self.write(".");
                self.write(&sel.name);
            }
            Expr::Index {
                x: inner,
                lbrack,
                indices,
                rbrack,
            } => {
                self.expr1(inner, HIGHEST_PREC, 1)?;
                self.write("[");
                self.expr_list(*lbrack, indices, depth + 1, *rbrack, false)?;
                self.write("]");
            }
            Expr::Slice {
                x: inner,
                low,
                high,
                max,
                slice3,
                ..
            } => {
                self.expr1(inner, HIGHEST_PREC, 1)?;
                self.write("[");
                let mut indices = vec![low.as_deref(), high.as_deref()];
                if *slice3 {
                    indices.push(max.as_deref());
                }
                let present = indices.iter().flatten().count();
                let blanks = depth <= 1
                    && present > 1
                    && indices.iter().flatten().any(|x| matches!(x, Expr::Binary { .. }));
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        if indices[i - 1].is_some() && blanks {
                            self.write(" ");
                        }
                        self.write(":");
                        if index.is_some() && blanks {
                            self.write(" ");
                        }
                    }
                    if let Some(index) = index {
                        self.expr0(index, depth + 1)?;
                    }
                }
                self.write("]");
            }
            Expr::TypeAssert { x: inner, ty, .. } => {
                self.expr1(inner, HIGHEST_PREC, depth)?;
                self.write(".(");
                match ty {
                    Some(ty) => self.expr(ty)?,
                    None => self.write("type"),
                }
                self.write(")");
            }
            Expr::Call(call) => self.call(call, depth)?,
            Expr::Star { x: inner, .. } => {
                if UNARY_PREC < prec1 {
                    self.write("(");
                    self.expr(x)?;
                    self.write(")");
                } else {
                    self.write("*");
                    self.expr(inner)?;
                }
            }
            Expr::Unary { op, x: inner, .. } => {
                if UNARY_PREC < prec1 {
                    self.write("(");
                    self.expr(x)?;
                    self.write(")");
                } else {
                    self.write(op.as_str());
                    if *op == TokenKind::Range {
                        self.write(" ");
                    }
                    self.expr1(inner, UNARY_PREC, depth)?;
                }
            }
            Expr::Binary {
                x: lhs, op, y: rhs, ..
            } => self.binary(lhs, *op, rhs, prec1, depth)?,
            Expr::KeyValue { key, value, .. } => {
                self.expr(key)?;
                self.write(": ");
                self.expr(value)?;
            }
            Expr::ArrayType { len, elt, .. } => {
                self.write("[");
                if let Some(len) = len {
                    self.expr(len)?;
                }
                self.write("]");
                self.expr(elt)?;
            }
            Expr::StructType { fields, .. } => {
                self.write("struct");
                self.field_block(fields, true)?;
            }
            Expr::FuncType(ty) => {
                self.write("func");
                self.signature(ty)?;
            }
            Expr::InterfaceType { methods, .. } => {
                self.write("interface");
                self.field_block(methods, false)?;
            }
            Expr::MapType { key, value, .. } => {
                self.write("map[");
                self.expr(key)?;
                self.write("]");
                self.expr(value)?;
            }
            Expr::ChanType { dir, value, .. } => {
                self.write(match dir {
                    ChanDir::Both => "chan",
                    ChanDir::Recv => "<-chan",
                    ChanDir::Send => "chan<-",
                });
                self.write(" ");
                self.expr(value)?;
            }
        }
        Ok(())
    }

    fn binary(&mut self, lhs: &Expr, op: TokenKind, rhs: &Expr, prec1: u8, depth: usize) -> PrintResult {
        let prec = op.precedence();
        if prec < prec1 {
            self.write("(");
            self.binary(lhs, op, rhs, LOWEST_PREC, depth.saturating_sub(1).max(1))?;
            self.write(")");
            return Ok(());
        }

        let mut blank = prec < cutoff(lhs, op, rhs, depth);
        self.expr1(lhs, prec, depth + diff_prec(lhs, prec))?;
        if blank {
            self.write(" ");
        }
        let lhs_line = self.source.line(lhs.end());
        let rhs_line = self.source.line(rhs.pos());
        self.write(op.as_str());

        // keep the source's line break after the operator
        let mut indented = false;
        if lhs_line > 0 && rhs_line > lhs_line {
            if !self.continuation {
                self.continuation = true;
                self.indent += 1;
                indented = true;
            }
            self.last_line = lhs_line;
            self.trailing();
            self.line_break(rhs_line, 1);
            blank = false;
        }
        if blank {
            self.write(" ");
        }
        self.expr1(rhs, prec + 1, depth + 1)?;
        if indented {
            self.indent -= 1;
            self.continuation = false;
        }
        Ok(())
    }

    fn call(&mut self, call: &CallExpr, depth: usize) -> PrintResult {
        let depth = if call.args.len() > 1 { depth + 1 } else { depth };
        if matches!(*call.fun, Expr::FuncType(_)) {
            self.write("(");
            self.expr(&call.fun)?;
            self.write(")");
        } else {
            self.expr1(&call.fun, HIGHEST_PREC, depth)?;
        }
        self.write("(");
        match call.ellipsis {
            Some(ellipsis) => {
                self.expr_list(call.lparen, &call.args, depth, ellipsis, false)?;
                self.write("...");
            }
            None => self.expr_list(call.lparen, &call.args, depth, call.rparen, false)?,
        }
        self.write(")");
        Ok(())
    }

    fn func_lit(&mut self, lit: &FuncLit) -> PrintResult {
        self.write("func");
        let start = self.out.len() - "func".len();
        self.signature(&lit.ty)?;
        let header = self.out[start..].chars().count();
        self.func_body(header, " ", &lit.body)
    }

    /// A comma separated list that keeps the source's line breaks between
    /// elements. With `pairs`, the values of key/value elements that start
    /// their own line are aligned.
    fn expr_list(
        &mut self,
        open: Pos,
        list: &[Expr],
        depth: usize,
        close: Pos,
        pairs: bool,
    ) -> PrintResult {
        if list.is_empty() {
            return Ok(());
        }
        let broken = |prev: usize, next: usize| prev > 0 && next > prev;
        let open_line = self.source.line(open);
        let close_line = self.source.line(close);

        let mut prev = open_line;
        let mut multi_line = false;
        for x in list {
            multi_line |= broken(prev, self.source.line(x.pos()));
            prev = self.source.line(x.end());
        }
        multi_line |= broken(prev, close_line);

        if !multi_line {
            for (i, x) in list.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.expr0(x, depth)?;
            }
            return Ok(());
        }

        let continuation = std::mem::replace(&mut self.continuation, false);
        self.indent += 1;
        let mut prev = open_line;
        for (i, x) in list.iter().enumerate() {
            let own_line = broken(prev, self.source.line(x.pos()));
            if i > 0 {
                self.write(",");
            }
            if own_line {
                if prev > 0 {
                    self.last_line = prev;
                }
                self.trailing();
                self.leading(x.pos(), 1);
            } else if i > 0 {
                self.write(" ");
            }
            match x {
                Expr::KeyValue { key, value, .. } if pairs && own_line => {
                    let key_size = self.render(|p| p.expr(key)).map(|k| k.chars().count());
                    let single_line = self.render(|p| p.expr(x)).is_some();
                    let aligned = single_line && key_size.is_some_and(|size| size <= SMALL_KEY);
                    self.expr(key)?;
                    self.write(":");
                    self.write(if aligned { CELL } else { " " });
                    self.expr(value)?;
                }
                _ => self.expr0(x, depth)?,
            }
            prev = self.source.line(x.end());
            if prev > 0 {
                self.last_line = prev;
            }
        }

        if broken(prev, close_line) {
            self.write(",");
            self.trailing();
            self.close(close, "");
        } else {
            self.indent -= 1;
        }
        self.continuation = continuation;
        Ok(())
    }

    /// Braced field list of a struct or interface type, after the keyword.
    fn field_block(&mut self, fields: &FieldList, is_struct: bool) -> PrintResult {
        let open = self.source.line(fields.opening);
        let close = self.source.line(fields.closing);
        let commented = self.comment_before(fields.closing).is_some();
        if !commented && open > 0 && open == close {
            if fields.list.is_empty() {
                self.write("{}");
                return Ok(());
            }
            if let [field] = fields.list.as_slice() {
                let small = field.tag.is_none()
                    && self
                        .render(|p| p.field(field, is_struct, " ").map(|_| ()))
                        .is_some_and(|text| text.chars().count() <= MAX_ONE_LINE_FIELD);
                if small {
                    self.write("{ ");
                    self.field(field, is_struct, " ")?;
                    self.write(" }");
                    return Ok(());
                }
            }
        }

        self.write(" {");
        self.set_line(fields.opening);
        self.trailing();
        self.indent += 1;
        for field in &fields.list {
            self.leading(field.pos(), 1);
            let extra = self.field(field, is_struct, CELL)?;
            self.set_line(field.end());
            self.trailing_with(extra);
        }
        self.close(fields.closing, "}");
        Ok(())
    }

    /// Returns the empty cells a trailing comment needs, as for specs.
    fn field(&mut self, field: &Field, is_struct: bool, sep: &str) -> Result<usize, PrintError> {
        if !is_struct {
            match (field.names.first(), &field.ty) {
                (Some(name), Expr::FuncType(ty)) => {
                    self.write(&name.name);
                    self.signature(ty)?;
                }
                _ => self.expr(&field.ty)?,
            }
            return Ok(0);
        }

        let mut extra = if field.names.is_empty() {
            self.expr(&field.ty)?;
            2
        } else {
            self.ident_list(&field.names);
            self.write(sep);
            self.expr(&field.ty)?;
            1
        };
        if let Some(tag) = &field.tag {
            if field.names.is_empty() {
                self.write(sep);
            }
            self.write(sep);
            self.write(&tag.value);
            extra = 0;
        }
        Ok(extra)
    }
}

/// Operator precedence at and above which operators print without blanks.
fn cutoff(lhs: &Expr, op: TokenKind, rhs: &Expr, depth: usize) -> u8 {
    let (has4, has5, max_problem) = walk_binary(lhs, op, rhs);
    if max_problem > 0 {
        return max_problem + 1;
    }
    match (has4 && has5, depth == 1) {
        (true, true) => 5,
        (true, false) => 4,
        (false, true) => 6,
        (false, false) => 4,
    }
}

/// Which precedence levels occur without parentheses, and the highest level
/// at which dropping the blanks would glue two operators into another token
/// (`x - -y`, `x / *p`, `x & ^y`).
fn walk_binary(lhs: &Expr, op: TokenKind, rhs: &Expr) -> (bool, bool, u8) {
    let prec = op.precedence();
    let mut has4 = prec == 4;
    let mut has5 = prec == 5;
    let mut max_problem = 0;

    if let Expr::Binary { x, op: inner, y, .. } = lhs {
        if inner.precedence() >= prec {
            let (h4, h5, mp) = walk_binary(x, *inner, y);
            has4 |= h4;
            has5 |= h5;
            max_problem = max_problem.max(mp);
        }
    }

    match rhs {
        Expr::Binary { x, op: inner, y, .. } if inner.precedence() > prec => {
            let (h4, h5, mp) = walk_binary(x, *inner, y);
            has4 |= h4;
            has5 |= h5;
            max_problem = max_problem.max(mp);
        }
        Expr::Star { .. } if op == TokenKind::Quo => max_problem = 5,
        Expr::Unary { op: unary, .. } => match (op, *unary) {
            (TokenKind::And, TokenKind::And) | (TokenKind::And, TokenKind::Xor) => max_problem = 5,
            (TokenKind::Add, TokenKind::Add) | (TokenKind::Sub, TokenKind::Sub) => {
                max_problem = max_problem.max(4)
            }
            _ => {}
        },
        _ => {}
    }
    (has4, has5, max_problem)
}

fn diff_prec(x: &Expr, prec: u8) -> usize {
    match x {
        Expr::Binary { op, .. } if op.precedence() == prec => 0,
        _ => 1,
    }
}

/// Drop redundant parentheses around a control clause expression. They stay
/// when they protect a composite literal that would otherwise be read as the
/// clause's block.
fn strip_parens(x: &Expr) -> &Expr {
    match x {
        Expr::Paren { x: inner, .. } if !has_named_composite(inner) => strip_parens(inner),
        _ => x,
    }
}

fn has_named_composite(x: &Expr) -> bool {
    match x {
        Expr::CompositeLit(lit) => matches!(
            lit.ty.as_deref(),
            Some(Expr::Ident(_)) | Some(Expr::Selector { .. })
        ),
        Expr::Binary { x, y, .. } => has_named_composite(x) || has_named_composite(y),
        Expr::Unary { x, .. }
        | Expr::Star { x, .. }
        | Expr::Selector { x, .. }
        | Expr::TypeAssert { x, .. } => has_named_composite(x),
        Expr::Index { x, indices, .. } => {
            has_named_composite(x) || indices.iter().any(has_named_composite)
        }
        Expr::Slice {
            x, low, high, max, ..
        } => {
            has_named_composite(x)
                || [low, high, max]
                    .into_iter()
                    .flatten()
                    .any(|e| has_named_composite(e))
        }
        Expr::Call(call) => has_named_composite(&call.fun) || call.args.iter().any(has_named_composite),
        Expr::KeyValue { key, value, .. } => has_named_composite(key) || has_named_composite(value),
        _ => false,
    }
}

/// Pad `\v`-separated cells so that each column block lines up, and turn
/// leading tabs into `unit` indentation.
///
/// A column block is a run of consecutive lines at the same indentation that
/// all have a terminated cell in that column; its width is the widest cell
/// plus one space. Columns holding only empty cells take no room.
fn align(text: &str, unit: &str) -> String {
    let lines: Vec<(usize, Vec<&str>)> = text
        .split('\n')
        .map(|line| {
            let body = line.trim_start_matches('\t');
            (line.len() - body.len(), body.split(CELL).collect())
        })
        .collect();

    let mut widths: Vec<Vec<usize>> = vec![Vec::new(); lines.len()];
    let mut start = 0;
    while start < lines.len() {
        let mut end = start + 1;
        while end < lines.len() && lines[end].0 == lines[start].0 {
            end += 1;
        }
        column_widths(&lines, start, end, 0, &mut widths);
        start = end;
    }

    let mut out = String::with_capacity(text.len());
    for (i, (depth, cells)) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let Some(last) = cells.iter().rposition(|cell| !cell.is_empty()) else {
            continue;
        };
        for _ in 0..*depth {
            out.push_str(unit);
        }
        for (column, cell) in cells[..=last].iter().enumerate() {
            out.push_str(cell);
            if column < last {
                let width = widths[i].get(column).copied().unwrap_or(0);
                let pad = width.saturating_sub(cell.chars().count());
                out.extend(std::iter::repeat(' ').take(pad));
            }
        }
    }
    out
}

fn column_widths(
    lines: &[(usize, Vec<&str>)],
    start: usize,
    end: usize,
    column: usize,
    widths: &mut [Vec<usize>],
) {
    let terminated = |row: usize| column + 1 < lines[row].1.len();
    let mut row = start;
    while row < end {
        if !terminated(row) {
            row += 1;
            continue;
        }
        let block = row;
        let mut width = 0;
        let mut empty = true;
        while row < end && terminated(row) {
            let size = lines[row].1[column].chars().count();
            empty &= size == 0;
            width = width.max(size + 1);
            row += 1;
        }
        if empty {
            width = 0;
        }
        for entry in &mut widths[block..row] {
            entry.push(width);
        }
        column_widths(lines, block, row, column + 1, widths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserOptions;
    use crate::parser::{parse_file, parse_fragment};

    fn format_fragment(src: &str) -> String {
        let source = SourceFile::new("t.go", src);
        let options = ParserOptions {
            fragment: true,
            ..ParserOptions::default()
        };
        let fragment = parse_fragment(&source, src, None, &options)
            .unwrap_or_else(|e| panic!("{src:?}: {e}"));
        print_fragment(&fragment, &source, &PrinterOptions::default()).unwrap()
    }

    fn format_file(src: &str) -> String {
        let source = SourceFile::new("t.go", src);
        let file = parse_file(&source, src, None, &ParserOptions::default())
            .unwrap_or_else(|e| panic!("{src:?}: {e}"));
        print_file(&file, &source, &PrinterOptions::default()).unwrap()
    }

    #[test]
    fn test_binary_spacing() {
        let out = format_fragment("x := a + b * c\nf(a + b, c)\ny := -x - -y\nz := s[a+1 : b]\n");
        assert_eq!(out, "x := a + b*c\nf(a+b, c)\ny := -x - -y\nz := s[a+1 : b]\n");
    }

    #[test]
    fn test_grouped_values_align() {
        let out = format_file("package p\nvar (\nx = 1\nlong = 2\n)\n");
        assert_eq!(out, "package p\n\nvar (\n\tx    = 1\n\tlong = 2\n)\n");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let src = "// leading\nx := 1 // trailing\nyy := 2 // second\n\n\nz := 3\n/* end */\n";
        assert_eq!(
            format_fragment(src),
            "// leading\nx := 1  // trailing\nyy := 2 // second\n\nz := 3\n/* end */\n"
        );
    }

    #[test]
    fn test_control_flow_layout() {
        let src = "if x {\na()\n} else if y {\n} else {\nb()\n}\nswitch v := f(); v {\ncase 1, 2:\nc()\ndefault:\n}\n";
        let expected = "if x {\n\ta()\n} else if y {\n} else {\n\tb()\n}\nswitch v := f(); v {\ncase 1, 2:\n\tc()\ndefault:\n}\n";
        assert_eq!(format_fragment(src), expected);
    }

    #[test]
    fn test_broken_composite_keeps_trailing_comma() {
        let src = "m := map[string]int{\n\"a\": 1,\n\"bcd\": 2,\n}\n";
        assert_eq!(
            format_fragment(src),
            "m := map[string]int{\n\t\"a\":   1,\n\t\"bcd\": 2,\n}\n"
        );
    }

    #[test]
    fn test_broken_call_arguments() {
        let src = "f(a,\nb)\ng(\na,\nb,\n)\n";
        assert_eq!(format_fragment(src), "f(a,\n\tb)\ng(\n\ta,\n\tb,\n)\n");
    }

    #[test]
    fn test_func_literal_bodies() {
        let src = "f := func() { return }\ng := func() {\n}\ngo func() {}()\n";
        assert_eq!(
            format_fragment(src),
            "f := func() { return }\ng := func() {\n}\ngo func() {}()\n"
        );
    }

    #[test]
    fn test_struct_fields_align() {
        let src = "package p\n\ntype T struct {\n\tName string `json:\"name\"`\n\tID int\n\tEmbedded\n}\n";
        assert_eq!(
            format_file(src),
            "package p\n\ntype T struct {\n\tName string `json:\"name\"`\n\tID   int\n\tEmbedded\n}\n"
        );
    }

    #[test]
    fn test_labels_are_outdented() {
        let src = "package p\n\nfunc f() {\nouter:\nfor {\nbreak outer\n}\n}\n";
        assert_eq!(
            format_file(src),
            "package p\n\nfunc f() {\nouter:\n\tfor {\n\t\tbreak outer\n\t}\n}\n"
        );
    }

    #[test]
    fn test_decls_separated_by_blank_lines() {
        let src = "package p\nimport \"fmt\"\nfunc a() {}\nfunc bb() {}\nvar x = fmt.Sprint()\n";
        assert_eq!(
            format_file(src),
            "package p\n\nimport \"fmt\"\n\nfunc a()  {}\nfunc bb() {}\n\nvar x = fmt.Sprint()\n"
        );
    }

    #[test]
    fn test_space_indentation() {
        let src = "if x {\nf()\n}\n";
        let source = SourceFile::new("t.go", src);
        let options = ParserOptions {
            fragment: true,
            ..ParserOptions::default()
        };
        let fragment = parse_fragment(&source, src, None, &options).unwrap();
        let printer = PrinterOptions {
            use_spaces: true,
            indent_width: 2,
        };
        assert_eq!(
            print_fragment(&fragment, &source, &printer).unwrap(),
            "if x {\n  f()\n}\n"
        );
    }

    #[test]
    fn test_bad_node_is_an_error() {
        let source = SourceFile::new("t.go", "???");
        let fragment = Fragment {
            stmts: vec![Stmt::Bad {
                from: Pos::from_offset(0),
                to: Pos::from_offset(3),
            }],
            comments: Vec::new(),
        };
        let err = print_fragment(&fragment, &source, &PrinterOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "t.go:1:1: cannot print invalid statement");
    }

    #[test]
    fn test_positionless_nodes_print_inline() {
        let source = SourceFile::new("t.go", "");
        let call = Expr::Call(CallExpr {
            fun: Box::new(Expr::ident("f")),
            lparen: Pos::NONE,
            args: vec![Expr::ident("a"), Expr::ident("b")],
            ellipsis: None,
            rparen: Pos::NONE,
        });
        let fragment = Fragment {
            stmts: vec![Stmt::Expr(call.clone()), Stmt::Expr(call)],
            comments: Vec::new(),
        };
        let out = print_fragment(&fragment, &source, &PrinterOptions::default()).unwrap();
        assert_eq!(out, "f(a, b)\nf(a, b)\n");
    }

    #[test]
    fn test_align_discards_empty_columns() {
        assert_eq!(align("a\u{b}\u{b}x\nbb\u{b}\u{b}y", "\t"), "a  x\nbb y");
        assert_eq!(align("\tk\u{b}\n\tlong\u{b}v", "  "), "  k\n  long v");
    }
}
