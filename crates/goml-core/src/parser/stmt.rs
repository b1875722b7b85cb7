use super::{PResult, Parser, STMT_START};
use crate::ast::{
    Block, CaseClause, CommClause, Expr, ForStmt, IfStmt, RangeStmt, Stmt, SwitchStmt, TypeSwitchStmt,
};
use crate::position::Pos;
use crate::tokenizer::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimpleMode {
    Basic,
    LabelOk,
    RangeOk,
}

impl<'a> Parser<'a> {
    pub fn parse_stmt_list(&mut self) -> PResult<Vec<Stmt>> {
        let mut list = Vec::new();
        while !matches!(
            self.tok(),
            TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
        ) {
            list.push(self.parse_stmt()?);
        }
        Ok(list)
    }

    /// Parse one statement. An installed hook gets the first look.
    pub fn parse_stmt(&mut self) -> PResult<Stmt> {
        if let Some(hook) = self.hook {
            if let Some(stmt) = hook.parse_statement(self)? {
                return Ok(stmt);
            }
        }

        match self.tok() {
            TokenKind::Const | TokenKind::Type | TokenKind::Var => {
                Ok(Stmt::Decl(self.parse_gen_decl(self.tok())?))
            }
            TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Imag
            | TokenKind::Char
            | TokenKind::String
            | TokenKind::Func
            | TokenKind::LParen
            | TokenKind::LBrack
            | TokenKind::Struct
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Interface
            | TokenKind::Add
            | TokenKind::Sub
            | TokenKind::Mul
            | TokenKind::And
            | TokenKind::Xor
            | TokenKind::Arrow
            | TokenKind::Not => {
                let (stmt, _) = self.parse_simple_stmt(SimpleMode::LabelOk)?;
                if !matches!(stmt, Stmt::Labeled { .. }) {
                    self.expect_semi()?;
                }
                Ok(stmt)
            }
            TokenKind::Go => self.parse_go_or_defer(TokenKind::Go),
            TokenKind::Defer => self.parse_go_or_defer(TokenKind::Defer),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Break | TokenKind::Continue | TokenKind::Goto | TokenKind::Fallthrough => {
                self.parse_branch_stmt(self.tok())
            }
            TokenKind::LBrace => {
                let block = self.parse_block_stmt()?;
                self.expect_semi()?;
                Ok(Stmt::Block(block))
            }
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::Switch => self.parse_switch_stmt(),
            TokenKind::Select => self.parse_select_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::Semicolon => {
                let stmt = Stmt::Empty {
                    semi: self.pos(),
                    implicit: self.lit() == "\n",
                };
                self.next();
                Ok(stmt)
            }
            // a semicolon may be omitted before a closing "}"
            TokenKind::RBrace => Ok(Stmt::Empty {
                semi: self.pos(),
                implicit: true,
            }),
            _ => {
                let pos = self.pos();
                self.error_expected(pos, "statement")?;
                self.advance_to(STMT_START);
                Ok(Stmt::Bad {
                    from: pos,
                    to: self.pos(),
                })
            }
        }
    }

    /// Returns the statement and whether it was a `range` clause.
    fn parse_simple_stmt(&mut self, mode: SimpleMode) -> PResult<(Stmt, bool)> {
        let mut lhs = self.parse_expr_list()?;

        match self.tok() {
            TokenKind::Define
            | TokenKind::Assign
            | TokenKind::AddAssign
            | TokenKind::SubAssign
            | TokenKind::MulAssign
            | TokenKind::QuoAssign
            | TokenKind::RemAssign
            | TokenKind::AndAssign
            | TokenKind::OrAssign
            | TokenKind::XorAssign
            | TokenKind::ShlAssign
            | TokenKind::ShrAssign
            | TokenKind::AndNotAssign => {
                let tok_pos = self.pos();
                let tok = self.tok();
                self.next();
                let mut is_range = false;
                let rhs = if mode == SimpleMode::RangeOk
                    && self.tok() == TokenKind::Range
                    && matches!(tok, TokenKind::Define | TokenKind::Assign)
                {
                    is_range = true;
                    vec![self.parse_range_clause()?]
                } else {
                    self.parse_expr_list()?
                };
                return Ok((
                    Stmt::Assign {
                        lhs,
                        tok_pos,
                        tok,
                        rhs,
                    },
                    is_range,
                ));
            }
            _ => {}
        }

        if lhs.len() > 1 {
            let pos = lhs[0].pos();
            self.error_expected(pos, "1 expression")?;
            // continue with the first expression
        }
        let x = lhs.swap_remove(0);

        match self.tok() {
            TokenKind::Colon => {
                let colon = self.pos();
                self.next();
                if let (SimpleMode::LabelOk, Expr::Ident(label)) = (mode, &x) {
                    let stmt = self.parse_stmt()?;
                    return Ok((
                        Stmt::Labeled {
                            label: label.clone(),
                            colon,
                            stmt: Box::new(stmt),
                        },
                        false,
                    ));
                }
                self.error(colon, "illegal label declaration")?;
                Ok((
                    Stmt::Bad {
                        from: x.pos(),
                        to: colon.advance(1),
                    },
                    false,
                ))
            }
            TokenKind::Arrow => {
                let arrow = self.pos();
                self.next();
                let value = self.parse_rhs()?;
                Ok((
                    Stmt::Send {
                        chan: x,
                        arrow,
                        value,
                    },
                    false,
                ))
            }
            TokenKind::Inc | TokenKind::Dec => {
                let stmt = Stmt::IncDec {
                    x,
                    tok_pos: self.pos(),
                    tok: self.tok(),
                };
                self.next();
                Ok((stmt, false))
            }
            _ => Ok((Stmt::Expr(x), false)),
        }
    }

    /// `range x`, kept as a unary expression until the for statement takes it apart.
    fn parse_range_clause(&mut self) -> PResult<Expr> {
        let op_pos = self.expect(TokenKind::Range)?;
        let x = self.parse_rhs()?;
        Ok(Expr::Unary {
            op_pos,
            op: TokenKind::Range,
            x: Box::new(x),
        })
    }

    fn parse_go_or_defer(&mut self, keyword: TokenKind) -> PResult<Stmt> {
        let pos = self.expect(keyword)?;
        let call = self.parse_call_expr(keyword.as_str())?;
        self.expect_semi()?;
        Ok(match call {
            Some(call) if keyword == TokenKind::Go => Stmt::Go { pos, call },
            Some(call) => Stmt::Defer { pos, call },
            None => Stmt::Bad {
                from: pos,
                to: pos.advance(keyword.as_str().len()),
            },
        })
    }

    fn parse_call_expr(&mut self, call_type: &str) -> PResult<Option<Expr>> {
        let x = self.parse_rhs()?;
        let x = match x {
            Expr::Paren { .. } => {
                let pos = x.pos();
                self.error(pos, format!("expression in {call_type} must not be parenthesized"))?;
                x.unparen().clone()
            }
            x => x,
        };
        match x {
            Expr::Call(_) => Ok(Some(x)),
            Expr::Bad { .. } => Ok(None),
            x => {
                let end = x.end();
                self.error(end, format!("expression in {call_type} must be function call"))?;
                Ok(None)
            }
        }
    }

    fn parse_return_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(TokenKind::Return)?;
        let results = if self.tok() != TokenKind::Semicolon && self.tok() != TokenKind::RBrace {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        self.expect_semi()?;
        Ok(Stmt::Return { pos, results })
    }

    fn parse_branch_stmt(&mut self, tok: TokenKind) -> PResult<Stmt> {
        let pos = self.expect(tok)?;
        let label = if tok != TokenKind::Fallthrough && self.tok() == TokenKind::Ident {
            Some(self.parse_ident()?)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(Stmt::Branch { pos, tok, label })
    }

    /// Turns a header statement into the expression it must be.
    fn make_expr(&mut self, stmt: Option<Stmt>, want: &str) -> PResult<Option<Expr>> {
        match stmt {
            None => Ok(None),
            Some(Stmt::Expr(x)) => Ok(Some(x)),
            Some(stmt) => {
                let found = if matches!(stmt, Stmt::Assign { .. }) {
                    "assignment"
                } else {
                    "simple statement"
                };
                self.error(
                    stmt.pos(),
                    format!(
                        "expected {want}, found {found} (missing parentheses around composite literal?)"
                    ),
                )?;
                Ok(Some(Expr::Bad {
                    from: stmt.pos(),
                    to: stmt.end(),
                }))
            }
        }
    }

    fn parse_if_header(&mut self) -> PResult<(Option<Box<Stmt>>, Expr)> {
        if self.tok() == TokenKind::LBrace {
            let pos = self.pos();
            self.error(pos, "missing condition in if statement")?;
            return Ok((None, Expr::Bad { from: pos, to: pos }));
        }

        self.parse_control_clause(|p| {
            let mut init = None;
            if p.tok() != TokenKind::Semicolon {
                // accept a var declaration, but complain
                if p.tok() == TokenKind::Var {
                    p.next();
                    let pos = p.pos();
                    p.error(pos, "var declaration not allowed in if initializer")?;
                }
                init = Some(p.parse_simple_stmt(SimpleMode::Basic)?.0);
            }

            let mut cond_stmt = None;
            let mut semi: Option<(Pos, bool)> = None;
            if p.tok() != TokenKind::LBrace {
                if p.tok() == TokenKind::Semicolon {
                    semi = Some((p.pos(), p.lit() == "\n"));
                    p.next();
                } else {
                    p.expect(TokenKind::Semicolon)?;
                }
                if p.tok() != TokenKind::LBrace {
                    cond_stmt = Some(p.parse_simple_stmt(SimpleMode::Basic)?.0);
                }
            } else {
                cond_stmt = init.take();
            }

            let mut cond = None;
            if cond_stmt.is_some() {
                cond = p.make_expr(cond_stmt, "boolean expression")?;
            } else if let Some((pos, newline)) = semi {
                if newline {
                    p.error(pos, "unexpected newline, expecting { after if clause")?;
                } else {
                    p.error(pos, "missing condition in if statement")?;
                }
            }
            let cond = match cond {
                Some(cond) => cond,
                None => Expr::Bad {
                    from: p.pos(),
                    to: p.pos(),
                },
            };
            Ok((init.map(Box::new), cond))
        })
    }

    fn parse_if_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(TokenKind::If)?;
        let (init, cond) = self.parse_if_header()?;
        let body = self.parse_block_stmt()?;

        let els = if self.tok() == TokenKind::Else {
            self.next();
            match self.tok() {
                TokenKind::If => Some(Box::new(self.parse_if_stmt()?)),
                TokenKind::LBrace => {
                    let block = self.parse_block_stmt()?;
                    self.expect_semi()?;
                    Some(Box::new(Stmt::Block(block)))
                }
                _ => {
                    let pos = self.pos();
                    self.error_expected(pos, "if statement or block")?;
                    Some(Box::new(Stmt::Bad { from: pos, to: pos }))
                }
            }
        } else {
            self.expect_semi()?;
            None
        };

        Ok(Stmt::If(IfStmt {
            pos,
            init,
            cond,
            body,
            els,
        }))
    }

    fn parse_case_clause(&mut self) -> PResult<CaseClause> {
        let case = self.pos();
        let list = if self.tok() == TokenKind::Case {
            self.next();
            self.parse_expr_list()?
        } else {
            self.expect(TokenKind::Default)?;
            Vec::new()
        };
        let colon = self.expect(TokenKind::Colon)?;
        let body = self.parse_stmt_list()?;
        Ok(CaseClause {
            case,
            list,
            colon,
            body,
        })
    }

    fn is_type_switch_guard(&mut self, stmt: &Option<Stmt>) -> PResult<bool> {
        let is_type_assert = |x: &Expr| matches!(x, Expr::TypeAssert { ty: None, .. });
        match stmt {
            Some(Stmt::Expr(x)) => Ok(is_type_assert(x)),
            Some(Stmt::Assign {
                lhs,
                tok_pos,
                tok,
                rhs,
            }) if lhs.len() == 1 && rhs.len() == 1 && is_type_assert(&rhs[0]) => match tok {
                TokenKind::Define => Ok(true),
                TokenKind::Assign => {
                    self.error(*tok_pos, "expected ':=', found '='")?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }

    fn parse_switch_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(TokenKind::Switch)?;

        let (init, tag) = if self.tok() != TokenKind::LBrace {
            self.parse_control_clause(|p| {
                let mut s1 = None;
                let mut s2 = None;
                if p.tok() != TokenKind::Semicolon {
                    s2 = Some(p.parse_simple_stmt(SimpleMode::Basic)?.0);
                }
                if p.tok() == TokenKind::Semicolon {
                    p.next();
                    s1 = s2.take();
                    if p.tok() != TokenKind::LBrace {
                        s2 = Some(p.parse_simple_stmt(SimpleMode::Basic)?.0);
                    }
                }
                Ok((s1, s2))
            })?
        } else {
            (None, None)
        };

        let type_switch = self.is_type_switch_guard(&tag)?;
        let lbrace = self.expect(TokenKind::LBrace)?;
        let mut clauses = Vec::new();
        while matches!(self.tok(), TokenKind::Case | TokenKind::Default) {
            clauses.push(self.parse_case_clause()?);
        }
        let rbrace = self.expect(TokenKind::RBrace)?;
        self.expect_semi()?;

        let init = init.map(Box::new);
        if type_switch {
            if let Some(assign) = tag {
                return Ok(Stmt::TypeSwitch(TypeSwitchStmt {
                    pos,
                    init,
                    assign: Box::new(assign),
                    lbrace,
                    clauses,
                    rbrace,
                }));
            }
        }
        let tag = self.make_expr(tag, "switch expression")?;
        Ok(Stmt::Switch(SwitchStmt {
            pos,
            init,
            tag,
            lbrace,
            clauses,
            rbrace,
        }))
    }

    fn parse_comm_clause(&mut self) -> PResult<CommClause> {
        let case = self.pos();
        let comm = if self.tok() == TokenKind::Case {
            self.next();
            let mut lhs = self.parse_expr_list()?;
            let stmt = if self.tok() == TokenKind::Arrow {
                if lhs.len() > 1 {
                    let pos = lhs[0].pos();
                    self.error_expected(pos, "1 expression")?;
                }
                let arrow = self.pos();
                self.next();
                let value = self.parse_rhs()?;
                Stmt::Send {
                    chan: lhs.swap_remove(0),
                    arrow,
                    value,
                }
            } else if matches!(self.tok(), TokenKind::Assign | TokenKind::Define) {
                if lhs.len() > 2 {
                    let pos = lhs[0].pos();
                    self.error_expected(pos, "1 or 2 expressions")?;
                    lhs.truncate(2);
                }
                let tok_pos = self.pos();
                let tok = self.tok();
                self.next();
                let rhs = self.parse_rhs()?;
                Stmt::Assign {
                    lhs,
                    tok_pos,
                    tok,
                    rhs: vec![rhs],
                }
            } else {
                if lhs.len() > 1 {
                    let pos = lhs[0].pos();
                    self.error_expected(pos, "1 expression")?;
                }
                Stmt::Expr(lhs.swap_remove(0))
            };
            Some(Box::new(stmt))
        } else {
            self.expect(TokenKind::Default)?;
            None
        };
        let colon = self.expect(TokenKind::Colon)?;
        let body = self.parse_stmt_list()?;
        Ok(CommClause {
            case,
            comm,
            colon,
            body,
        })
    }

    fn parse_select_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(TokenKind::Select)?;
        let lbrace = self.expect(TokenKind::LBrace)?;
        let mut clauses = Vec::new();
        while matches!(self.tok(), TokenKind::Case | TokenKind::Default) {
            clauses.push(self.parse_comm_clause()?);
        }
        let rbrace = self.expect(TokenKind::RBrace)?;
        self.expect_semi()?;
        Ok(Stmt::Select {
            pos,
            lbrace,
            clauses,
            rbrace,
        })
    }

    fn parse_for_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(TokenKind::For)?;

        let (s1, s2, s3, is_range) = if self.tok() != TokenKind::LBrace {
            self.parse_control_clause(|p| {
                let mut s1 = None;
                let mut s2 = None;
                let mut s3 = None;
                let mut is_range = false;
                if p.tok() != TokenKind::Semicolon {
                    if p.tok() == TokenKind::Range {
                        // "for range x": no iteration variables
                        let x = p.parse_range_clause()?;
                        s2 = Some(Stmt::Assign {
                            lhs: Vec::new(),
                            tok_pos: Pos::NONE,
                            tok: TokenKind::Assign,
                            rhs: vec![x],
                        });
                        is_range = true;
                    } else {
                        let (stmt, range) = p.parse_simple_stmt(SimpleMode::RangeOk)?;
                        s2 = Some(stmt);
                        is_range = range;
                    }
                }
                if !is_range && p.tok() == TokenKind::Semicolon {
                    p.next();
                    s1 = s2.take();
                    if p.tok() != TokenKind::Semicolon {
                        s2 = Some(p.parse_simple_stmt(SimpleMode::Basic)?.0);
                    }
                    p.expect_semi()?;
                    if p.tok() != TokenKind::LBrace {
                        s3 = Some(p.parse_simple_stmt(SimpleMode::Basic)?.0);
                    }
                }
                Ok((s1, s2, s3, is_range))
            })?
        } else {
            (None, None, None, false)
        };

        let body = self.parse_block_stmt()?;
        self.expect_semi()?;

        if is_range {
            return self.make_range_stmt(pos, s2, body);
        }

        let cond = self.make_expr(s2, "boolean or range expression")?;
        Ok(Stmt::For(ForStmt {
            pos,
            init: s1.map(Box::new),
            cond,
            post: s3.map(Box::new),
            body,
        }))
    }

    /// Take apart the `k, v := range x` assignment built while parsing the header.
    fn make_range_stmt(&mut self, pos: Pos, header: Option<Stmt>, body: Block) -> PResult<Stmt> {
        let (mut lhs, tok_pos, tok, mut rhs) = match header {
            Some(Stmt::Assign {
                lhs,
                tok_pos,
                tok,
                rhs,
            }) => (lhs, tok_pos, tok, rhs),
            _ => (Vec::new(), Pos::NONE, TokenKind::Assign, Vec::new()),
        };
        if lhs.len() > 2 {
            let bad = lhs[lhs.len() - 1].pos();
            self.error_expected(bad, "at most 2 expressions")?;
            return Ok(Stmt::Bad {
                from: pos,
                to: body.end(),
            });
        }
        let value = if lhs.len() == 2 { lhs.pop() } else { None };
        let key = lhs.pop();
        let tok = key.as_ref().map(|_| (tok_pos, tok));
        let x = match rhs.pop() {
            Some(Expr::Unary { x, .. }) => *x,
            Some(other) => other,
            None => Expr::Bad { from: pos, to: pos },
        };
        Ok(Stmt::Range(RangeStmt {
            pos,
            key,
            value,
            tok,
            x,
            body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Stmt};
    use crate::config::ParserOptions;
    use crate::error::ErrorList;
    use crate::parser::parse_fragment;
    use crate::position::SourceFile;
    use crate::tokenizer::TokenKind;

    fn stmts(src: &str) -> Vec<Stmt> {
        let file = SourceFile::new("", src);
        parse_fragment(&file, src, None, &ParserOptions::default())
            .unwrap_or_else(|e| panic!("{src:?}: {e}"))
            .stmts
    }

    fn errors(src: &str) -> ErrorList {
        let file = SourceFile::new("", src);
        parse_fragment(&file, src, None, &ParserOptions::default()).unwrap_err()
    }

    #[test]
    fn test_if_else_chain() {
        let list = stmts("if x := f(); x > 0 {\n\ty()\n} else if x < 0 {\n} else {\n}\n");
        assert_eq!(list.len(), 1);
        match &list[0] {
            Stmt::If(s) => {
                assert!(s.init.is_some());
                assert!(matches!(s.els.as_deref(), Some(Stmt::If(_))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_composite_literal_needs_parens_in_header() {
        let list = stmts("if x == (T{}) {\n}\n");
        assert!(matches!(list[0], Stmt::If(_)));
        let errs = errors("for _, v := range T{1} {\n}\n");
        assert!(!errs.is_empty());
    }

    #[test]
    fn test_range_forms() {
        let list = stmts("for k, v := range m {\n}\nfor range ch {\n}\nfor i := 0; i < n; i++ {\n}\n");
        match &list[0] {
            Stmt::Range(r) => {
                assert!(r.key.is_some() && r.value.is_some());
                assert_eq!(r.tok.map(|(_, t)| t), Some(TokenKind::Define));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &list[1] {
            Stmt::Range(r) => assert!(r.key.is_none() && r.tok.is_none()),
            other => panic!("unexpected {other:?}"),
        }
        match &list[2] {
            Stmt::For(f) => assert!(f.init.is_some() && f.cond.is_some() && f.post.is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_switch_and_type_switch() {
        let list = stmts(
            "switch x {\ncase 1, 2:\n\tf()\ndefault:\n}\nswitch v := y.(type) {\ncase int:\n}\n",
        );
        match &list[0] {
            Stmt::Switch(s) => {
                assert_eq!(s.clauses.len(), 2);
                assert_eq!(s.clauses[0].list.len(), 2);
                assert!(s.clauses[1].list.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(list[1], Stmt::TypeSwitch(_)));
    }

    #[test]
    fn test_select_clauses() {
        let list = stmts("select {\ncase v := <-ch:\n\tuse(v)\ncase out <- 1:\ndefault:\n}\n");
        match &list[0] {
            Stmt::Select { clauses, .. } => {
                assert_eq!(clauses.len(), 3);
                assert!(matches!(clauses[0].comm.as_deref(), Some(Stmt::Assign { .. })));
                assert!(matches!(clauses[1].comm.as_deref(), Some(Stmt::Send { .. })));
                assert!(clauses[2].comm.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_labels_and_branches() {
        let list = stmts("outer:\n\tfor {\n\t\tbreak outer\n\t}\n");
        match &list[0] {
            Stmt::Labeled { label, stmt, .. } => {
                assert_eq!(label.name, "outer");
                assert!(matches!(**stmt, Stmt::For(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_go_requires_call() {
        let errs = errors("go f\n");
        assert_eq!(
            errs.iter().next().map(|e| e.message.as_str()),
            Some("expression in go must be function call")
        );
    }

    #[test]
    fn test_assignment_in_condition() {
        let errs = errors("if x = 1 {\n}\n");
        assert_eq!(
            errs.iter().next().map(|e| e.message.as_str()),
            Some("expected boolean expression, found assignment (missing parentheses around composite literal?)")
        );
    }

    #[test]
    fn test_short_var_decl_and_incdec() {
        let list = stmts("a, b := 1, 2\na++\nch <- a\n");
        assert!(matches!(&list[0], Stmt::Assign { lhs, rhs, .. } if lhs.len() == 2 && rhs.len() == 2));
        assert!(matches!(list[1], Stmt::IncDec { tok: TokenKind::Inc, .. }));
        assert!(matches!(&list[2], Stmt::Send { chan: Expr::Ident(_), .. }));
    }
}
