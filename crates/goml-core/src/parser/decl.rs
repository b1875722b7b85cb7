use super::{PResult, Parser, DECL_START, EXPR_END};
use crate::ast::{
    BasicLit, Decl, FieldList, File, FuncDecl, FuncType, GenDecl, Ident, ImportSpec, LitKind,
    Spec, TypeSpec, ValueSpec,
};
use crate::position::Pos;
use crate::tokenizer::TokenKind;

impl<'a> Parser<'a> {
    /// Package clause, imports, then top-level declarations. Returns `None`
    /// when the package clause itself is broken.
    pub(crate) fn parse_file_body(&mut self) -> PResult<Option<File>> {
        let package = self.expect(TokenKind::Package)?;
        let name = self.parse_ident()?;
        if name.is_blank() {
            let pos = self.pos();
            self.error(pos, "invalid package name _")?;
        }
        self.expect_semi()?;

        // nothing else is worth parsing after a broken package clause
        if !self.errors.is_empty() {
            return Ok(None);
        }

        let mut decls = Vec::new();
        while self.tok() == TokenKind::Import {
            decls.push(Decl::Gen(self.parse_gen_decl(TokenKind::Import)?));
        }

        let mut prev = TokenKind::Import;
        while self.tok() != TokenKind::Eof {
            if self.tok() == TokenKind::Import && prev != TokenKind::Import {
                let pos = self.pos();
                self.error(pos, "imports must appear before other declarations")?;
            }
            prev = self.tok();
            decls.push(self.parse_decl()?);
        }

        Ok(Some(File {
            package,
            name,
            decls,
            comments: Vec::new(),
        }))
    }

    fn parse_decl(&mut self) -> PResult<Decl> {
        match self.tok() {
            TokenKind::Import | TokenKind::Const | TokenKind::Type | TokenKind::Var => {
                Ok(Decl::Gen(self.parse_gen_decl(self.tok())?))
            }
            TokenKind::Func => Ok(Decl::Func(self.parse_func_decl()?)),
            _ => {
                let pos = self.pos();
                self.error_expected(pos, "declaration")?;
                self.advance_to(DECL_START);
                Ok(Decl::Bad {
                    from: pos,
                    to: self.pos(),
                })
            }
        }
    }

    /// `import`, `const`, `type` or `var`, either single or parenthesized.
    pub(crate) fn parse_gen_decl(&mut self, keyword: TokenKind) -> PResult<GenDecl> {
        let pos = self.expect(keyword)?;
        let mut specs = Vec::new();
        let mut lparen = None;
        let mut rparen = Pos::NONE;
        if self.tok() == TokenKind::LParen {
            lparen = Some(self.pos());
            self.next();
            while self.tok() != TokenKind::RParen && self.tok() != TokenKind::Eof {
                specs.push(self.parse_spec(keyword)?);
            }
            rparen = self.expect(TokenKind::RParen)?;
            self.expect_semi()?;
        } else {
            specs.push(self.parse_spec(keyword)?);
        }
        Ok(GenDecl {
            pos,
            tok: keyword,
            lparen,
            specs,
            rparen,
        })
    }

    fn parse_spec(&mut self, keyword: TokenKind) -> PResult<Spec> {
        match keyword {
            TokenKind::Import => self.parse_import_spec().map(Spec::Import),
            TokenKind::Type => self.parse_type_spec().map(Spec::Type),
            _ => self.parse_value_spec(keyword).map(Spec::Value),
        }
    }

    fn parse_import_spec(&mut self) -> PResult<ImportSpec> {
        let name = match self.tok() {
            TokenKind::Ident => Some(self.parse_ident()?),
            TokenKind::Period => {
                let ident = Ident::at(self.pos(), ".");
                self.next();
                Some(ident)
            }
            _ => None,
        };

        let pos = self.pos();
        let path = if self.tok() == TokenKind::String {
            let path = BasicLit {
                pos,
                kind: LitKind::String,
                value: self.lit().to_string(),
            };
            self.next();
            path
        } else {
            if self.tok().is_literal() {
                self.error(pos, "import path must be a string")?;
                self.next();
            } else {
                self.error(pos, "missing import path")?;
                self.advance_to(EXPR_END);
            }
            BasicLit {
                pos,
                kind: LitKind::String,
                value: "\"_\"".to_string(),
            }
        };
        self.expect_semi()?;
        Ok(ImportSpec { name, path })
    }

    fn parse_value_spec(&mut self, keyword: TokenKind) -> PResult<ValueSpec> {
        let names = self.parse_ident_list()?;
        let mut ty = None;
        let mut values = Vec::new();
        if keyword == TokenKind::Const {
            // optional type and values, for more tolerant parsing
            if !matches!(
                self.tok(),
                TokenKind::Eof | TokenKind::Semicolon | TokenKind::RParen
            ) {
                ty = self.try_ident_or_type()?;
                if self.tok() == TokenKind::Assign {
                    self.next();
                    values = self.parse_expr_list()?;
                }
            }
        } else {
            if self.tok() != TokenKind::Assign {
                ty = Some(self.parse_type()?);
            }
            if self.tok() == TokenKind::Assign {
                self.next();
                values = self.parse_expr_list()?;
            }
        }
        self.expect_semi()?;
        Ok(ValueSpec { names, ty, values })
    }

    fn parse_type_spec(&mut self) -> PResult<TypeSpec> {
        let name = self.parse_ident()?;
        let mut spec = TypeSpec {
            name,
            type_params: None,
            assign: None,
            ty: crate::ast::Expr::Bad {
                from: Pos::NONE,
                to: Pos::NONE,
            },
        };

        if self.tok() == TokenKind::LBrack {
            let lbrack = self.pos();
            self.next();
            // `type A[N]T` is an array; `type A[T any] ...` declares type parameters
            if self.tok() == TokenKind::Ident && self.peek_kind(1) != TokenKind::RBrack {
                let list = self.parse_parameter_list(None, TokenKind::RBrack)?;
                let rbrack = self.expect(TokenKind::RBrack)?;
                let params = FieldList {
                    opening: lbrack,
                    list,
                    closing: rbrack,
                };
                if params.num_fields() == 0 {
                    self.error(rbrack, "empty type parameter list")?;
                } else {
                    spec.type_params = Some(params);
                }
                if self.tok() == TokenKind::Assign {
                    spec.assign = Some(self.pos());
                    self.next();
                }
                spec.ty = self.parse_type()?;
            } else {
                let len = self.parse_array_len()?;
                spec.ty = self.parse_array_type(lbrack, len)?;
            }
        } else {
            if self.tok() == TokenKind::Assign {
                spec.assign = Some(self.pos());
                self.next();
            }
            spec.ty = self.parse_type()?;
        }

        self.expect_semi()?;
        Ok(spec)
    }

    fn parse_func_decl(&mut self) -> PResult<FuncDecl> {
        let pos = self.expect(TokenKind::Func)?;
        let recv = if self.tok() == TokenKind::LParen {
            Some(self.parse_parameters(false)?.1)
        } else {
            None
        };
        let name = self.parse_ident()?;
        let (type_params, params) = self.parse_parameters(true)?;
        if let (Some(_), Some(tparams)) = (&recv, &type_params) {
            self.error(tparams.opening, "method must have no type parameters")?;
        }
        let results = self.parse_result()?;

        let body = match self.tok() {
            TokenKind::LBrace => {
                let body = self.parse_nested(|p| p.parse_block_stmt())?;
                self.expect_semi()?;
                Some(body)
            }
            TokenKind::Semicolon => {
                self.next();
                if self.tok() == TokenKind::LBrace {
                    let pos = self.pos();
                    self.error(pos, "unexpected semicolon or newline before {")?;
                    let body = self.parse_nested(|p| p.parse_block_stmt())?;
                    self.expect_semi()?;
                    Some(body)
                } else {
                    None
                }
            }
            _ => {
                self.expect_semi()?;
                None
            }
        };

        Ok(FuncDecl {
            pos,
            recv,
            name,
            ty: FuncType {
                func: pos,
                type_params,
                params,
                results,
            },
            body,
        })
    }
}
