use super::{PResult, Parser, EXPR_END, STMT_START};
use crate::ast::{
    BasicLit, Block, CallExpr, ChanDir, CompositeLit, Expr, Field, FieldList, FuncLit, FuncType,
    Ident, LitKind,
};
use crate::position::Pos;
use crate::tokenizer::{TokenKind, LOWEST_PREC};

/// One parsed entry of a parameter list before names and types are paired up.
struct ParamEntry {
    name: Option<Ident>,
    ty: Option<Expr>,
    /// Entries sharing a group share one type (`a, b int`).
    group: usize,
}

impl<'a> Parser<'a> {
    // ---------------------------------------------------------------------
    // Identifiers and lists

    pub fn parse_ident(&mut self) -> PResult<Ident> {
        let pos = self.pos();
        if self.tok() == TokenKind::Ident {
            let name = self.lit().to_string();
            self.next();
            return Ok(Ident::at(pos, name));
        }
        self.expect(TokenKind::Ident)?;
        Ok(Ident::at(pos, "_"))
    }

    pub(crate) fn parse_ident_list(&mut self) -> PResult<Vec<Ident>> {
        let mut list = vec![self.parse_ident()?];
        while self.tok() == TokenKind::Comma {
            self.next();
            list.push(self.parse_ident()?);
        }
        Ok(list)
    }

    pub(crate) fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.parse_expr()?];
        while self.tok() == TokenKind::Comma {
            self.next();
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    // ---------------------------------------------------------------------
    // Types

    pub(crate) fn parse_type(&mut self) -> PResult<Expr> {
        if let Some(ty) = self.try_ident_or_type()? {
            return Ok(ty);
        }
        let pos = self.pos();
        self.error_expected(pos, "type")?;
        self.advance_to(EXPR_END);
        Ok(Expr::Bad {
            from: pos,
            to: self.pos(),
        })
    }

    fn parse_qualified_ident(&mut self, ident: Ident) -> PResult<Expr> {
        let x = Expr::Ident(ident);
        if self.tok() != TokenKind::Period {
            return Ok(x);
        }
        self.next();
        let sel = self.parse_ident()?;
        Ok(Expr::Selector {
            x: Box::new(x),
            sel,
        })
    }

    fn parse_type_name(&mut self) -> PResult<Expr> {
        let ident = self.parse_ident()?;
        self.parse_qualified_ident(ident)
    }

    /// Parses `[N]`, `[...]` or `[]` after the opening bracket and returns the length.
    pub(crate) fn parse_array_len(&mut self) -> PResult<Option<Box<Expr>>> {
        self.parse_nested(|p| {
            let len = match p.tok() {
                TokenKind::Ellipsis => {
                    let pos = p.pos();
                    p.next();
                    Some(Box::new(Expr::Ellipsis { pos, elt: None }))
                }
                TokenKind::RBrack => None,
                _ => Some(Box::new(p.parse_rhs()?)),
            };
            if p.tok() == TokenKind::Comma {
                let pos = p.pos();
                p.error(pos, "unexpected comma; expecting ]")?;
                p.next();
            }
            Ok(len)
        })
    }

    pub(crate) fn parse_array_type(&mut self, lbrack: Pos, len: Option<Box<Expr>>) -> PResult<Expr> {
        self.expect(TokenKind::RBrack)?;
        let elt = self.parse_type()?;
        Ok(Expr::ArrayType {
            lbrack,
            len,
            elt: Box::new(elt),
        })
    }

    pub(crate) fn parse_type_instance(&mut self, x: Expr) -> PResult<Expr> {
        let lbrack = self.expect(TokenKind::LBrack)?;
        let indices = self.parse_nested(|p| {
            let mut list = Vec::new();
            while p.tok() != TokenKind::RBrack && p.tok() != TokenKind::Eof {
                list.push(p.parse_type()?);
                if !p.at_comma("type argument list", TokenKind::RBrack)? {
                    break;
                }
                p.next();
            }
            Ok(list)
        })?;
        let rbrack = self.expect_closing(TokenKind::RBrack, "type argument list")?;
        if indices.is_empty() {
            self.error_expected(rbrack, "type argument list")?;
            return Ok(Expr::Bad {
                from: x.pos(),
                to: rbrack.advance(1),
            });
        }
        Ok(Expr::Index {
            x: Box::new(x),
            lbrack,
            indices,
            rbrack,
        })
    }

    fn parse_field_decl(&mut self) -> PResult<Field> {
        let mut names = Vec::new();
        let ty = match self.tok() {
            TokenKind::Ident => {
                let name = self.parse_ident()?;
                if matches!(
                    self.tok(),
                    TokenKind::Period | TokenKind::String | TokenKind::Semicolon | TokenKind::RBrace
                ) {
                    // embedded type
                    let ty = self.parse_qualified_ident(name)?;
                    if self.tok() == TokenKind::LBrack {
                        self.parse_type_instance(ty)?
                    } else {
                        ty
                    }
                } else {
                    names.push(name);
                    while self.tok() == TokenKind::Comma {
                        self.next();
                        names.push(self.parse_ident()?);
                    }
                    self.parse_type()?
                }
            }
            TokenKind::Mul => {
                let star = self.pos();
                self.next();
                let base = self.parse_type_name()?;
                Expr::Star {
                    star,
                    x: Box::new(base),
                }
            }
            _ => {
                let pos = self.pos();
                self.error(pos, "cannot parenthesize embedded type")?;
                self.parse_type()?
            }
        };
        let tag = if self.tok() == TokenKind::String {
            let lit = self.basic_lit(LitKind::String);
            self.next();
            Some(lit)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(Field { names, ty, tag })
    }

    fn parse_struct_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(TokenKind::Struct)?;
        let opening = self.expect(TokenKind::LBrace)?;
        let mut list = Vec::new();
        while matches!(self.tok(), TokenKind::Ident | TokenKind::Mul | TokenKind::LParen) {
            list.push(self.parse_field_decl()?);
        }
        let closing = self.expect(TokenKind::RBrace)?;
        Ok(Expr::StructType {
            pos,
            fields: FieldList {
                opening,
                list,
                closing,
            },
        })
    }

    fn parse_pointer_type(&mut self) -> PResult<Expr> {
        let star = self.expect(TokenKind::Mul)?;
        let base = self.parse_type()?;
        Ok(Expr::Star {
            star,
            x: Box::new(base),
        })
    }

    fn parse_dots_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(TokenKind::Ellipsis)?;
        let elt = self.parse_type()?;
        Ok(Expr::Ellipsis {
            pos,
            elt: Some(Box::new(elt)),
        })
    }

    fn parse_param_decl(&mut self, name0: Option<Ident>, type_sets: bool) -> PResult<ParamEntry> {
        let mut entry = ParamEntry {
            name: None,
            ty: None,
            group: 0,
        };
        if name0.is_some() || self.tok() == TokenKind::Ident {
            let name = match name0 {
                Some(name) => name,
                None => self.parse_ident()?,
            };
            entry.name = Some(name);
            match self.tok() {
                TokenKind::Ident
                | TokenKind::Mul
                | TokenKind::Arrow
                | TokenKind::Func
                | TokenKind::Chan
                | TokenKind::Map
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::LParen
                | TokenKind::LBrack => entry.ty = Some(self.parse_type()?),
                TokenKind::Ellipsis => {
                    entry.ty = Some(self.parse_dots_type()?);
                    return Ok(entry);
                }
                TokenKind::Period => {
                    if let Some(name) = entry.name.take() {
                        entry.ty = Some(self.parse_qualified_ident(name)?);
                    }
                }
                TokenKind::Tilde if type_sets => {
                    entry.ty = Some(self.parse_embedded_elem(None)?);
                    return Ok(entry);
                }
                TokenKind::Or if type_sets => {
                    let first = entry.name.take().map(Expr::Ident);
                    entry.ty = Some(self.parse_embedded_elem(first)?);
                    return Ok(entry);
                }
                _ => {}
            }
        } else {
            match self.tok() {
                TokenKind::Mul
                | TokenKind::Arrow
                | TokenKind::Func
                | TokenKind::LBrack
                | TokenKind::Chan
                | TokenKind::Map
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::LParen => entry.ty = Some(self.parse_type()?),
                TokenKind::Ellipsis => {
                    entry.ty = Some(self.parse_dots_type()?);
                    return Ok(entry);
                }
                TokenKind::Tilde if type_sets => {
                    entry.ty = Some(self.parse_embedded_elem(None)?);
                    return Ok(entry);
                }
                _ => {
                    let pos = self.pos();
                    self.error_expected(pos, "')'")?;
                    self.advance_to(EXPR_END);
                }
            }
        }
        if type_sets && self.tok() == TokenKind::Or {
            if let Some(ty) = entry.ty.take() {
                entry.ty = Some(self.parse_embedded_elem(Some(ty))?);
            }
        }
        Ok(entry)
    }

    /// Parses parameters up to `closing` and pairs names with types: either
    /// every entry is a bare type, or every entry is named.
    pub(crate) fn parse_parameter_list(
        &mut self,
        name0: Option<Ident>,
        closing: TokenKind,
    ) -> PResult<Vec<Field>> {
        let type_params = closing == TokenKind::RBrack;
        let mut name0 = name0;
        let mut list: Vec<ParamEntry> = Vec::new();
        let mut named = 0;
        while name0.is_some() || (self.tok() != closing && self.tok() != TokenKind::Eof) {
            let mut entry = self.parse_param_decl(name0.take(), type_params)?;
            if entry.name.is_some() || entry.ty.is_some() {
                if entry.name.is_some() && entry.ty.is_some() {
                    named += 1;
                }
                entry.group = list.len();
                list.push(entry);
            }
            if !self.at_comma("parameter list", closing)? {
                break;
            }
            self.next();
        }

        if list.is_empty() {
            return Ok(Vec::new());
        }

        if named == 0 {
            // all unnamed: the names we found are type names
            for entry in &mut list {
                if let Some(name) = entry.name.take() {
                    entry.ty = Some(Expr::Ident(name));
                }
            }
            if type_params {
                let pos = list[0].ty.as_ref().map(Expr::pos).unwrap_or(Pos::NONE);
                self.error(pos, "type parameters must be named")?;
            }
            return Ok(list
                .into_iter()
                .filter_map(|entry| entry.ty)
                .map(|ty| Field {
                    names: Vec::new(),
                    ty,
                    tag: None,
                })
                .collect());
        }

        if named != list.len() {
            // some named: every entry needs a name and a type
            let mut err_pos = Pos::NONE;
            let mut current: Option<(Expr, usize)> = None;
            for (i, entry) in list.iter_mut().enumerate().rev() {
                if let Some(ty) = &entry.ty {
                    current = Some((ty.clone(), i));
                    entry.group = i;
                    if entry.name.is_none() {
                        err_pos = ty.pos();
                        entry.name = Some(Ident::at(err_pos, "_"));
                    }
                } else if let Some((ty, group)) = &current {
                    entry.ty = Some(ty.clone());
                    entry.group = *group;
                } else if let Some(name) = &entry.name {
                    err_pos = name.pos;
                    entry.ty = Some(Expr::Bad {
                        from: name.pos,
                        to: name.end(),
                    });
                }
            }
            if err_pos.is_valid() {
                let message = if type_params {
                    "missing type constraint"
                } else {
                    "mixed named and unnamed parameters"
                };
                self.error(err_pos, message)?;
            }
        }

        let mut fields: Vec<Field> = Vec::new();
        let mut last_group = None;
        for entry in list {
            let (Some(name), Some(ty)) = (entry.name, entry.ty) else {
                continue;
            };
            match fields.last_mut() {
                Some(field) if last_group == Some(entry.group) => field.names.push(name),
                _ => fields.push(Field {
                    names: vec![name],
                    ty,
                    tag: None,
                }),
            }
            last_group = Some(entry.group);
        }
        Ok(fields)
    }

    /// Parses optional type parameters (when `accept_type_params`) and the
    /// parenthesized parameter list.
    pub(crate) fn parse_parameters(
        &mut self,
        accept_type_params: bool,
    ) -> PResult<(Option<FieldList>, FieldList)> {
        let mut type_params = None;
        if accept_type_params && self.tok() == TokenKind::LBrack {
            let opening = self.pos();
            self.next();
            let list = self.parse_parameter_list(None, TokenKind::RBrack)?;
            let closing = self.expect(TokenKind::RBrack)?;
            let params = FieldList {
                opening,
                list,
                closing,
            };
            if params.num_fields() == 0 {
                self.error(closing, "empty type parameter list")?;
            } else {
                type_params = Some(params);
            }
        }
        let opening = self.expect(TokenKind::LParen)?;
        let list = if self.tok() != TokenKind::RParen {
            self.parse_parameter_list(None, TokenKind::RParen)?
        } else {
            Vec::new()
        };
        let closing = self.expect(TokenKind::RParen)?;
        Ok((
            type_params,
            FieldList {
                opening,
                list,
                closing,
            },
        ))
    }

    pub(crate) fn parse_result(&mut self) -> PResult<Option<FieldList>> {
        if self.tok() == TokenKind::LParen {
            let (_, results) = self.parse_parameters(false)?;
            return Ok(Some(results));
        }
        Ok(self.try_ident_or_type()?.map(|ty| FieldList {
            opening: Pos::NONE,
            list: vec![Field {
                names: Vec::new(),
                ty,
                tag: None,
            }],
            closing: Pos::NONE,
        }))
    }

    fn parse_func_type(&mut self) -> PResult<FuncType> {
        let func = self.expect(TokenKind::Func)?;
        let (type_params, params) = self.parse_parameters(true)?;
        if let Some(tparams) = &type_params {
            self.error(tparams.opening, "function type must have no type parameters")?;
        }
        let results = self.parse_result()?;
        Ok(FuncType {
            func,
            type_params: None,
            params,
            results,
        })
    }

    fn parse_method_spec(&mut self) -> PResult<Field> {
        let x = self.parse_type_name()?;
        let mut names = Vec::new();
        let ty = match x {
            Expr::Ident(ident) if self.tok() == TokenKind::LParen => {
                names.push(ident);
                let (_, params) = self.parse_parameters(false)?;
                let results = self.parse_result()?;
                Expr::FuncType(FuncType {
                    func: Pos::NONE,
                    type_params: None,
                    params,
                    results,
                })
            }
            x if self.tok() == TokenKind::LBrack => self.parse_type_instance(x)?,
            x => x,
        };
        let ty = if names.is_empty() && self.tok() == TokenKind::Or {
            self.parse_embedded_elem(Some(ty))?
        } else {
            ty
        };
        Ok(Field {
            names,
            ty,
            tag: None,
        })
    }

    fn parse_embedded_term(&mut self) -> PResult<Expr> {
        if self.tok() == TokenKind::Tilde {
            let op_pos = self.pos();
            self.next();
            let x = self.parse_type()?;
            return Ok(Expr::Unary {
                op_pos,
                op: TokenKind::Tilde,
                x: Box::new(x),
            });
        }
        if let Some(ty) = self.try_ident_or_type()? {
            return Ok(ty);
        }
        let pos = self.pos();
        self.error_expected(pos, "~ term or type")?;
        self.advance_to(EXPR_END);
        Ok(Expr::Bad {
            from: pos,
            to: self.pos(),
        })
    }

    /// A union of type terms: `~int | string | T`.
    fn parse_embedded_elem(&mut self, first: Option<Expr>) -> PResult<Expr> {
        let mut x = match first {
            Some(x) => x,
            None => self.parse_embedded_term()?,
        };
        while self.tok() == TokenKind::Or {
            let op_pos = self.pos();
            self.next();
            let y = self.parse_embedded_term()?;
            x = Expr::Binary {
                x: Box::new(x),
                op_pos,
                op: TokenKind::Or,
                y: Box::new(y),
            };
        }
        Ok(x)
    }

    fn parse_interface_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(TokenKind::Interface)?;
        let opening = self.expect(TokenKind::LBrace)?;
        let mut list = Vec::new();
        loop {
            let field = match self.tok() {
                TokenKind::Ident => self.parse_method_spec()?,
                TokenKind::Tilde => Field {
                    names: Vec::new(),
                    ty: self.parse_embedded_elem(None)?,
                    tag: None,
                },
                _ => match self.try_ident_or_type()? {
                    Some(ty) => Field {
                        names: Vec::new(),
                        ty: self.parse_embedded_elem(Some(ty))?,
                        tag: None,
                    },
                    None => break,
                },
            };
            list.push(field);
            self.expect_semi()?;
        }
        let closing = self.expect(TokenKind::RBrace)?;
        Ok(Expr::InterfaceType {
            pos,
            methods: FieldList {
                opening,
                list,
                closing,
            },
        })
    }

    fn parse_map_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(TokenKind::Map)?;
        self.expect(TokenKind::LBrack)?;
        let key = self.parse_type()?;
        self.expect(TokenKind::RBrack)?;
        let value = self.parse_type()?;
        Ok(Expr::MapType {
            pos,
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    fn parse_chan_type(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let dir = if self.tok() == TokenKind::Chan {
            self.next();
            if self.tok() == TokenKind::Arrow {
                self.next();
                ChanDir::Send
            } else {
                ChanDir::Both
            }
        } else {
            self.expect(TokenKind::Arrow)?;
            self.expect(TokenKind::Chan)?;
            ChanDir::Recv
        };
        let value = self.parse_type()?;
        Ok(Expr::ChanType {
            pos,
            dir,
            value: Box::new(value),
        })
    }

    pub(crate) fn try_ident_or_type(&mut self) -> PResult<Option<Expr>> {
        let ty = match self.tok() {
            TokenKind::Ident => {
                let ty = self.parse_type_name()?;
                if self.tok() == TokenKind::LBrack {
                    self.parse_type_instance(ty)?
                } else {
                    ty
                }
            }
            TokenKind::LBrack => {
                let lbrack = self.expect(TokenKind::LBrack)?;
                let len = self.parse_array_len()?;
                self.parse_array_type(lbrack, len)?
            }
            TokenKind::Struct => self.parse_struct_type()?,
            TokenKind::Mul => self.parse_pointer_type()?,
            TokenKind::Func => Expr::FuncType(self.parse_func_type()?),
            TokenKind::Interface => self.parse_interface_type()?,
            TokenKind::Map => self.parse_map_type()?,
            TokenKind::Chan | TokenKind::Arrow => self.parse_chan_type()?,
            TokenKind::LParen => {
                let lparen = self.pos();
                self.next();
                let x = self.parse_type()?;
                let rparen = self.expect(TokenKind::RParen)?;
                Expr::Paren {
                    lparen,
                    x: Box::new(x),
                    rparen,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(ty))
    }

    // ---------------------------------------------------------------------
    // Expressions

    fn basic_lit(&self, kind: LitKind) -> BasicLit {
        BasicLit {
            pos: self.pos(),
            kind,
            value: self.lit().to_string(),
        }
    }

    /// Function type, or function literal when a body follows.
    fn parse_func_type_or_lit(&mut self) -> PResult<Expr> {
        let ty = self.parse_func_type()?;
        if self.tok() != TokenKind::LBrace {
            return Ok(Expr::FuncType(ty));
        }
        let body = self.parse_nested(|p| p.parse_block_stmt())?;
        Ok(Expr::FuncLit(FuncLit { ty, body }))
    }

    fn parse_operand(&mut self) -> PResult<Expr> {
        let lit_kind = match self.tok() {
            TokenKind::Ident => return Ok(Expr::Ident(self.parse_ident()?)),
            TokenKind::Int => Some(LitKind::Int),
            TokenKind::Float => Some(LitKind::Float),
            TokenKind::Imag => Some(LitKind::Imag),
            TokenKind::Char => Some(LitKind::Char),
            TokenKind::String => Some(LitKind::String),
            TokenKind::LParen => {
                let lparen = self.pos();
                self.next();
                let x = self.parse_nested(|p| p.parse_rhs())?;
                let rparen = self.expect(TokenKind::RParen)?;
                return Ok(Expr::Paren {
                    lparen,
                    x: Box::new(x),
                    rparen,
                });
            }
            TokenKind::Func => return self.parse_func_type_or_lit(),
            _ => None,
        };
        if let Some(kind) = lit_kind {
            let lit = self.basic_lit(kind);
            self.next();
            return Ok(Expr::BasicLit(lit));
        }
        if let Some(ty) = self.try_ident_or_type()? {
            return Ok(ty);
        }
        let pos = self.pos();
        self.error_expected(pos, "operand")?;
        self.advance_to(STMT_START);
        Ok(Expr::Bad {
            from: pos,
            to: self.pos(),
        })
    }

    fn parse_selector(&mut self, x: Expr) -> PResult<Expr> {
        let sel = self.parse_ident()?;
        Ok(Expr::Selector {
            x: Box::new(x),
            sel,
        })
    }

    fn parse_type_assertion(&mut self, x: Expr) -> PResult<Expr> {
        let lparen = self.expect(TokenKind::LParen)?;
        let ty = if self.tok() == TokenKind::Type {
            // x.(type) in a type switch
            self.next();
            None
        } else {
            Some(Box::new(self.parse_type()?))
        };
        let rparen = self.expect(TokenKind::RParen)?;
        Ok(Expr::TypeAssert {
            x: Box::new(x),
            lparen,
            ty,
            rparen,
        })
    }

    fn parse_index_or_slice_or_instance(&mut self, x: Expr) -> PResult<Expr> {
        let lbrack = self.expect(TokenKind::LBrack)?;
        if self.tok() == TokenKind::RBrack {
            // empty index: accepted for tolerance, but reported
            let pos = self.pos();
            self.error_expected(pos, "operand")?;
            self.next();
            return Ok(Expr::Index {
                x: Box::new(x),
                lbrack,
                indices: vec![Expr::Bad { from: pos, to: pos }],
                rbrack: pos,
            });
        }

        let (mut index, colons, ncolons, args) = self.parse_nested(|p| {
            let mut index: [Option<Box<Expr>>; 3] = [None, None, None];
            let mut colons = [Pos::NONE; 2];
            let mut ncolons = 0;
            let mut args: Vec<Expr> = Vec::new();
            if p.tok() != TokenKind::Colon {
                index[0] = Some(Box::new(p.parse_rhs()?));
            }
            match p.tok() {
                TokenKind::Colon => {
                    while p.tok() == TokenKind::Colon && ncolons < colons.len() {
                        colons[ncolons] = p.pos();
                        ncolons += 1;
                        p.next();
                        if !matches!(
                            p.tok(),
                            TokenKind::Colon | TokenKind::RBrack | TokenKind::Eof
                        ) {
                            index[ncolons] = Some(Box::new(p.parse_rhs()?));
                        }
                    }
                }
                TokenKind::Comma => {
                    if let Some(first) = index[0].take() {
                        args.push(*first);
                    }
                    while p.tok() == TokenKind::Comma {
                        p.next();
                        if p.tok() != TokenKind::RBrack && p.tok() != TokenKind::Eof {
                            args.push(p.parse_type()?);
                        }
                    }
                }
                _ => {}
            }
            Ok((index, colons, ncolons, args))
        })?;
        let rbrack = self.expect(TokenKind::RBrack)?;

        if ncolons > 0 {
            let slice3 = ncolons == 2;
            if slice3 {
                if index[1].is_none() {
                    self.error(colons[0], "middle index required in 3-index slice")?;
                }
                if index[2].is_none() {
                    self.error(colons[1], "final index required in 3-index slice")?;
                }
            }
            let [low, high, max] = index;
            return Ok(Expr::Slice {
                x: Box::new(x),
                lbrack,
                low,
                high,
                max,
                slice3,
                rbrack,
            });
        }

        let indices = if args.is_empty() {
            index[0].take().map(|i| vec![*i]).unwrap_or_default()
        } else {
            args
        };
        Ok(Expr::Index {
            x: Box::new(x),
            lbrack,
            indices,
            rbrack,
        })
    }

    fn parse_call_or_conversion(&mut self, fun: Expr) -> PResult<Expr> {
        let lparen = self.expect(TokenKind::LParen)?;
        let (args, ellipsis) = self.parse_nested(|p| {
            let mut list = Vec::new();
            let mut ellipsis = None;
            while p.tok() != TokenKind::RParen && p.tok() != TokenKind::Eof && ellipsis.is_none() {
                list.push(p.parse_rhs()?);
                if p.tok() == TokenKind::Ellipsis {
                    ellipsis = Some(p.pos());
                    p.next();
                }
                if !p.at_comma("argument list", TokenKind::RParen)? {
                    break;
                }
                p.next();
            }
            Ok((list, ellipsis))
        })?;
        let rparen = self.expect_closing(TokenKind::RParen, "argument list")?;
        Ok(Expr::Call(CallExpr {
            fun: Box::new(fun),
            lparen,
            args,
            ellipsis,
            rparen,
        }))
    }

    fn parse_value(&mut self) -> PResult<Expr> {
        if self.tok() == TokenKind::LBrace {
            return self.parse_literal_value(None);
        }
        self.parse_expr()
    }

    fn parse_element(&mut self) -> PResult<Expr> {
        let x = self.parse_value()?;
        if self.tok() == TokenKind::Colon {
            let colon = self.pos();
            self.next();
            let value = self.parse_value()?;
            return Ok(Expr::KeyValue {
                key: Box::new(x),
                colon,
                value: Box::new(value),
            });
        }
        Ok(x)
    }

    fn parse_literal_value(&mut self, ty: Option<Expr>) -> PResult<Expr> {
        let lbrace = self.expect(TokenKind::LBrace)?;
        let elts = self.parse_nested(|p| {
            let mut list = Vec::new();
            while p.tok() != TokenKind::RBrace && p.tok() != TokenKind::Eof {
                list.push(p.parse_element()?);
                if !p.at_comma("composite literal", TokenKind::RBrace)? {
                    break;
                }
                p.next();
            }
            Ok(list)
        })?;
        let rbrace = self.expect_closing(TokenKind::RBrace, "composite literal")?;
        Ok(Expr::CompositeLit(CompositeLit {
            ty: ty.map(Box::new),
            lbrace,
            elts,
            rbrace,
        }))
    }

    fn parse_primary_expr(&mut self, x: Option<Expr>) -> PResult<Expr> {
        let mut x = match x {
            Some(x) => x,
            None => self.parse_operand()?,
        };
        loop {
            x = match self.tok() {
                TokenKind::Period => {
                    self.next();
                    match self.tok() {
                        TokenKind::Ident => self.parse_selector(x)?,
                        TokenKind::LParen => self.parse_type_assertion(x)?,
                        _ => {
                            let pos = self.pos();
                            self.error_expected(pos, "selector or type assertion")?;
                            if self.tok() != TokenKind::RBrace {
                                self.next();
                            }
                            Expr::Selector {
                                x: Box::new(x),
                                sel: Ident::at(pos, "_"),
                            }
                        }
                    }
                }
                TokenKind::LBrack => self.parse_index_or_slice_or_instance(x)?,
                TokenKind::LParen => self.parse_call_or_conversion(x)?,
                TokenKind::LBrace => {
                    let inner = x.unparen();
                    let literal_type = match inner {
                        Expr::Bad { .. }
                        | Expr::Ident(_)
                        | Expr::Selector { .. }
                        | Expr::Index { .. } => self.expr_lev >= 0,
                        Expr::ArrayType { .. } | Expr::StructType { .. } | Expr::MapType { .. } => true,
                        _ => false,
                    };
                    if !literal_type {
                        return Ok(x);
                    }
                    if !std::ptr::eq(inner, &x) {
                        let pos = inner.pos();
                        self.error(pos, "cannot parenthesize type in composite literal")?;
                    }
                    self.parse_literal_value(Some(x))?
                }
                _ => return Ok(x),
            };
        }
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        match self.tok() {
            TokenKind::Add
            | TokenKind::Sub
            | TokenKind::Not
            | TokenKind::Xor
            | TokenKind::And
            | TokenKind::Tilde => {
                let op_pos = self.pos();
                let op = self.tok();
                self.next();
                let x = self.parse_unary_expr()?;
                Ok(Expr::Unary {
                    op_pos,
                    op,
                    x: Box::new(x),
                })
            }
            TokenKind::Arrow => {
                let arrow = self.pos();
                self.next();
                let x = self.parse_unary_expr()?;
                // <-chan T is a receive-only channel type, not a receive
                if let Expr::ChanType {
                    dir: ChanDir::Both,
                    value,
                    ..
                } = x
                {
                    return Ok(Expr::ChanType {
                        pos: arrow,
                        dir: ChanDir::Recv,
                        value,
                    });
                }
                Ok(Expr::Unary {
                    op_pos: arrow,
                    op: TokenKind::Arrow,
                    x: Box::new(x),
                })
            }
            TokenKind::Mul => {
                let star = self.pos();
                self.next();
                let x = self.parse_unary_expr()?;
                Ok(Expr::Star {
                    star,
                    x: Box::new(x),
                })
            }
            _ => self.parse_primary_expr(None),
        }
    }

    fn parse_binary_expr(&mut self, x: Option<Expr>, prec1: u8) -> PResult<Expr> {
        let mut x = match x {
            Some(x) => x,
            None => self.parse_unary_expr()?,
        };
        loop {
            let op = self.tok();
            let oprec = op.precedence();
            if oprec < prec1 {
                return Ok(x);
            }
            let op_pos = self.expect(op)?;
            let y = self.parse_binary_expr(None, oprec + 1)?;
            x = Expr::Binary {
                x: Box::new(x),
                op_pos,
                op,
                y: Box::new(y),
            };
        }
    }

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_expr(None, LOWEST_PREC + 1)
    }

    /// One right-hand-side expression.
    pub fn parse_rhs(&mut self) -> PResult<Expr> {
        self.parse_expr()
    }

    pub fn parse_block_stmt(&mut self) -> PResult<Block> {
        let lbrace = self.expect(TokenKind::LBrace)?;
        let stmts = self.parse_stmt_list()?;
        let rbrace = self.expect(TokenKind::RBrace)?;
        Ok(Block {
            lbrace,
            stmts,
            rbrace,
        })
    }
}
