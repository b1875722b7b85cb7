//! Recursive-descent parser for the host language.
//!
//! The parser owns the token vector and the error list for one file. It can be
//! extended through a [`StatementHook`], which is consulted before the default
//! statement grammar at every point where a statement is expected, including
//! inside blocks that the hook itself asks the parser to parse.

mod decl;
mod expr;
mod stmt;

use crate::ast::{Comment, Fragment, Stmt};
use crate::config::ParserOptions;
use crate::error::ErrorList;
use crate::position::{Pos, SourceFile};
use crate::tokenizer::{tokenize, Token, TokenKind};
use std::collections::VecDeque;

/// Raised once too many errors have been collected; unwinds the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bailout;

pub type PResult<T> = Result<T, Bailout>;

/// Extension point invoked before default statement parsing.
///
/// Return `Ok(None)` without consuming tokens to let the host grammar handle
/// the statement.
pub trait StatementHook {
    fn parse_statement(&self, p: &mut Parser<'_>) -> PResult<Option<Stmt>>;
}

/// Tokens that may begin a statement; used to resynchronize after an error.
const STMT_START: &[TokenKind] = &[
    TokenKind::Break,
    TokenKind::Const,
    TokenKind::Continue,
    TokenKind::Defer,
    TokenKind::Fallthrough,
    TokenKind::For,
    TokenKind::Go,
    TokenKind::Goto,
    TokenKind::If,
    TokenKind::Return,
    TokenKind::Select,
    TokenKind::Switch,
    TokenKind::Type,
    TokenKind::Var,
];

const DECL_START: &[TokenKind] = &[
    TokenKind::Import,
    TokenKind::Const,
    TokenKind::Type,
    TokenKind::Var,
];

const EXPR_END: &[TokenKind] = &[
    TokenKind::Comma,
    TokenKind::Colon,
    TokenKind::Semicolon,
    TokenKind::RParen,
    TokenKind::RBrack,
    TokenKind::RBrace,
];

/// Maximum number of errors collected before bailing out, unless `all_errors` is set.
const MAX_ERRORS: usize = 10;

pub struct Parser<'a> {
    file: &'a SourceFile,
    tokens: Vec<Token>,
    idx: usize,
    comments: Vec<Comment>,
    lex_errors: VecDeque<(Pos, String)>,
    errors: ErrorList,
    all_errors: bool,
    hook: Option<&'a dyn StatementHook>,
    /// < 0 while parsing a control clause header, >= 0 inside expressions.
    expr_lev: i32,
    sync_pos: Pos,
    sync_cnt: usize,
}

impl<'a> Parser<'a> {
    pub fn new(
        file: &'a SourceFile,
        src: &str,
        hook: Option<&'a dyn StatementHook>,
        options: &ParserOptions,
    ) -> Self {
        let stream = tokenize(src);
        let mut lex_errors: Vec<(Pos, String)> = stream.errors;
        lex_errors.sort_by_key(|(pos, _)| *pos);
        let mut parser = Self {
            file,
            tokens: stream.tokens,
            idx: 0,
            comments: stream.comments,
            lex_errors: lex_errors.into(),
            errors: ErrorList::new(),
            all_errors: options.all_errors,
            hook,
            expr_lev: 0,
            sync_pos: Pos::NONE,
            sync_cnt: 0,
        };
        parser.flush_lex_errors();
        parser
    }

    // ---------------------------------------------------------------------
    // Token primitives

    pub fn token(&self) -> &Token {
        &self.tokens[self.idx]
    }

    pub fn tok(&self) -> TokenKind {
        self.tokens[self.idx].kind
    }

    pub fn pos(&self) -> Pos {
        self.tokens[self.idx].pos
    }

    pub fn lit(&self) -> &str {
        &self.tokens[self.idx].lit
    }

    /// Kind of the token `n` positions ahead (`0` is the current token).
    pub fn peek_kind(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.idx + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    pub fn next(&mut self) {
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        self.flush_lex_errors();
    }

    /// Lexical errors are reported once the parser reaches them, as a scanner
    /// running in lockstep would.
    fn flush_lex_errors(&mut self) {
        let current = self.pos();
        while self
            .lex_errors
            .front()
            .is_some_and(|(pos, _)| *pos <= current || self.tok() == TokenKind::Eof)
        {
            if let Some((pos, message)) = self.lex_errors.pop_front() {
                self.errors.add(self.file.position(pos), message);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Errors

    /// Record an error. Outside `all_errors` mode only the first error per
    /// line is kept, and more than ten errors abandon the file.
    pub fn error(&mut self, pos: Pos, message: impl Into<String>) -> PResult<()> {
        let position = self.file.position(pos);
        if !self.all_errors {
            if let Some(last) = self.errors.last() {
                if last.pos.line == position.line {
                    return Ok(());
                }
            }
            if self.errors.len() > MAX_ERRORS {
                return Err(Bailout);
            }
        }
        self.errors.add(position, message);
        Ok(())
    }

    pub fn error_expected(&mut self, pos: Pos, what: &str) -> PResult<()> {
        let mut message = format!("expected {what}");
        if pos == self.pos() {
            message.push_str(", found ");
            message.push_str(&self.token().describe());
        }
        self.error(pos, message)
    }

    /// Consume a token of `kind`, reporting an error if the current token
    /// differs. Always advances.
    pub fn expect(&mut self, kind: TokenKind) -> PResult<Pos> {
        let pos = self.pos();
        if self.tok() != kind {
            self.error_expected(pos, &format!("'{}'", kind.as_str()))?;
        }
        self.next();
        Ok(pos)
    }

    /// Like [`Parser::expect`], with a friendlier message when a newline
    /// ended a list early.
    pub fn expect_closing(&mut self, kind: TokenKind, context: &str) -> PResult<Pos> {
        if self.tok() != kind && self.tok() == TokenKind::Semicolon && self.lit() == "\n" {
            let pos = self.pos();
            self.error(pos, format!("missing ',' before newline in {context}"))?;
            self.next();
        }
        self.expect(kind)
    }

    pub fn expect_semi(&mut self) -> PResult<()> {
        match self.tok() {
            TokenKind::RParen | TokenKind::RBrace => Ok(()),
            TokenKind::Semicolon => {
                self.next();
                Ok(())
            }
            TokenKind::Comma => {
                let pos = self.pos();
                self.error_expected(pos, "';'")?;
                self.next();
                Ok(())
            }
            _ => {
                let pos = self.pos();
                self.error_expected(pos, "';'")?;
                self.advance_to(STMT_START);
                Ok(())
            }
        }
    }

    /// Whether a list continues at the current token. A missing comma is
    /// reported and treated as present so parsing can go on.
    pub(crate) fn at_comma(&mut self, context: &str, follow: TokenKind) -> PResult<bool> {
        if self.tok() == TokenKind::Comma {
            return Ok(true);
        }
        if self.tok() != follow {
            let mut message = "missing ','".to_string();
            if self.tok() == TokenKind::Semicolon && self.lit() == "\n" {
                message.push_str(" before newline");
            }
            let pos = self.pos();
            self.error(pos, format!("{message} in {context}"))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Skip tokens until one in `to` (or EOF). Guards against looping on the
    /// same position forever.
    fn advance_to(&mut self, to: &[TokenKind]) {
        while self.tok() != TokenKind::Eof {
            if to.contains(&self.tok()) {
                if self.pos() == self.sync_pos && self.sync_cnt < 10 {
                    self.sync_cnt += 1;
                    return;
                }
                if self.pos() > self.sync_pos {
                    self.sync_pos = self.pos();
                    self.sync_cnt = 0;
                    return;
                }
            }
            self.next();
        }
    }

    // ---------------------------------------------------------------------
    // Nesting

    /// Run `f` at expression level, where composite literals are allowed
    /// again (inside parentheses, brackets and braces).
    pub fn parse_nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.expr_lev += 1;
        let result = f(self);
        self.expr_lev -= 1;
        result
    }

    /// Run `f` as a control clause header, where `{` starts the body.
    fn parse_control_clause<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let prev = self.expr_lev;
        self.expr_lev = -1;
        let result = f(self);
        self.expr_lev = prev;
        result
    }

    /// Report any remaining lexical errors and hand back the sorted error
    /// list together with the collected comments.
    fn finish(mut self) -> (ErrorList, Vec<Comment>) {
        self.idx = self.tokens.len() - 1;
        self.flush_lex_errors();
        let mut errors = self.errors;
        errors.sort();
        (errors, self.comments)
    }
}

/// Parse a complete source file: package clause, imports, declarations.
pub fn parse_file(
    file: &SourceFile,
    src: &str,
    hook: Option<&dyn StatementHook>,
    options: &ParserOptions,
) -> Result<crate::ast::File, ErrorList> {
    let mut parser = Parser::new(file, src, hook, options);
    tracing::debug!(
        file = file.name(),
        tokens = parser.tokens.len(),
        comments = parser.comments.len(),
        "parsing file"
    );
    let result = parser.parse_file_body();
    let (errors, comments) = parser.finish();
    match result {
        Ok(Some(mut ast)) if errors.is_empty() => {
            ast.comments = comments;
            Ok(ast)
        }
        _ => Err(errors),
    }
}

/// Parse a bare statement list, as found inside a function body.
pub fn parse_fragment(
    file: &SourceFile,
    src: &str,
    hook: Option<&dyn StatementHook>,
    options: &ParserOptions,
) -> Result<Fragment, ErrorList> {
    let mut parser = Parser::new(file, src, hook, options);
    tracing::debug!(file = file.name(), tokens = parser.tokens.len(), "parsing fragment");
    let result = parser.parse_fragment_body();
    let (errors, comments) = parser.finish();
    match result {
        Ok(stmts) if errors.is_empty() => Ok(Fragment { stmts, comments }),
        _ => Err(errors),
    }
}

impl<'a> Parser<'a> {
    fn parse_fragment_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while self.tok() != TokenKind::Eof {
            stmts.extend(self.parse_stmt_list()?);
            if self.tok() != TokenKind::Eof {
                let pos = self.pos();
                self.error_expected(pos, "statement")?;
                self.next();
            }
        }
        Ok(stmts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_of(src: &str, options: &ParserOptions) -> Vec<String> {
        let file = SourceFile::new("t.go", src);
        match parse_file(&file, src, None, options) {
            Ok(_) => vec![],
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_expected_message_names_found_token() {
        let errors = errors_of("package p\nfunc f() { x := }\n", &ParserOptions::default());
        assert_eq!(errors[0], "t.go:2:17: expected operand, found '}'");
    }

    #[test]
    fn test_one_error_per_line_by_default() {
        let src = "package p\nfunc f() { a := ; b := }\n";
        let on_line_two = errors_of(src, &ParserOptions::default())
            .into_iter()
            .filter(|e| e.starts_with("t.go:2:"))
            .count();
        assert_eq!(on_line_two, 1);
    }

    #[test]
    fn test_all_errors_mode_keeps_everything() {
        let src = "package p\nfunc f() { a := ; b := }\n";
        let options = ParserOptions {
            all_errors: true,
            ..ParserOptions::default()
        };
        assert!(errors_of(src, &options).len() >= 2);
    }

    #[test]
    fn test_errors_are_sorted_by_position() {
        let src = "package p\nfunc f() {\n\tx := \"open\n\ty := )\n\tz := ]\n}\n";
        let file = SourceFile::new("t.go", src);
        let errors = parse_file(&file, src, None, &ParserOptions::default()).unwrap_err();
        let lines: Vec<usize> = errors.iter().map(|e| e.pos.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert!(lines.len() >= 2);
    }

    #[test]
    fn test_bails_out_after_too_many_errors() {
        let body: String = (0..40).map(|_| "\tvar x = )\n").collect();
        let src = format!("package p\nfunc f() {{\n{body}}}\n");
        let errors = errors_of(&src, &ParserOptions::default());
        assert_eq!(errors.len(), MAX_ERRORS + 1);
    }

    #[test]
    fn test_lexical_errors_are_reported() {
        let errors = errors_of("package p\nvar x = 1 @ 2\n", &ParserOptions::default());
        assert_eq!(errors[0], "t.go:2:11: invalid character U+0040 '@'");
    }

    #[test]
    fn test_fragment_rejects_stray_brace() {
        let src = "x := 1\n}\ny := 2\n";
        let file = SourceFile::new("", src);
        let errors = parse_fragment(&file, src, None, &ParserOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.iter().next().unwrap().message, "expected statement, found '}'");
    }

    struct SkipBang;

    impl StatementHook for SkipBang {
        fn parse_statement(&self, p: &mut Parser<'_>) -> PResult<Option<Stmt>> {
            if p.tok() != TokenKind::Not {
                return Ok(None);
            }
            let pos = p.pos();
            p.next();
            Ok(Some(Stmt::Empty {
                semi: pos,
                implicit: true,
            }))
        }
    }

    #[test]
    fn test_hook_runs_before_default_statement_grammar() {
        let src = "! ; x := 1\nif x > 0 { ! }\n";
        let file = SourceFile::new("", src);
        let fragment = parse_fragment(&file, src, Some(&SkipBang), &ParserOptions::default()).unwrap();
        assert!(matches!(fragment.stmts[0], Stmt::Empty { implicit: true, .. }));
        match fragment.stmts.last() {
            Some(Stmt::If(s)) => assert!(matches!(s.body.stmts[0], Stmt::Empty { implicit: true, .. })),
            other => panic!("expected if statement, got {other:?}"),
        }
    }

    #[test]
    fn test_without_hook_lead_token_is_an_error() {
        let src = "! ; x := 1\n";
        let file = SourceFile::new("", src);
        assert!(parse_fragment(&file, src, None, &ParserOptions::default()).is_err());
    }
}
