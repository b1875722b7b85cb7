//! The markup extension: tag and text-node statements, and their lowering to
//! builder calls.
//!
//! ```text
//! <div(id: "main", .wide)> { ~ title }
//! ```
//!
//! becomes
//!
//! ```text
//! e.AppendElement("div", attributes{"id": "main", ".wide": true}, func(e element) { e.AppendTextNode(title) })
//! ```

use crate::ast::{
    BasicLit, Block, CallExpr, CompositeLit, Expr, Field, FieldList, FuncLit, FuncType, Ident, Stmt,
};
use crate::config::MarkupNames;
use crate::parser::{PResult, Parser, StatementHook};
use crate::position::Pos;
use crate::tokenizer::TokenKind;
use std::cell::RefCell;

/// `<name(attrs)> { body }` as written, before lowering.
#[derive(Debug, Clone, PartialEq)]
pub struct TagStatement {
    /// Position of `<`.
    pub pos: Pos,
    pub name: Ident,
    /// `None` when the tag has no parenthesized list at all.
    pub attributes: Option<Vec<AttributeEntry>>,
    pub body: Option<Block>,
    /// Position of `>`, or of the body's closing brace.
    pub end: Pos,
}

/// One `key: value`, `key` or `.key` entry of an attribute list.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEntry {
    /// Key text, including a leading `.` for class shorthand.
    pub key: String,
    /// `None` for a bare flag, which lowers to `true`.
    pub value: Option<Expr>,
}

/// `~ expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNodeStatement {
    /// Position of `~`.
    pub pos: Pos,
    pub content: Expr,
}

/// Statement hook recognizing `<` and `~` statements.
///
/// Keeps the stack of builder names in scope: the configured root builder
/// at file level, then one closure parameter per enclosing tag body.
pub struct Markup {
    names: MarkupNames,
    scopes: RefCell<Vec<String>>,
}

impl Markup {
    pub fn new(names: MarkupNames) -> Self {
        Self {
            names,
            scopes: RefCell::new(Vec::new()),
        }
    }

    /// Builder the next lowered call is made on.
    fn current_builder(&self) -> String {
        self.scopes
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| self.names.builder.clone())
    }

    fn parse_tag(&self, p: &mut Parser<'_>) -> PResult<TagStatement> {
        let pos = p.expect(TokenKind::Lss)?;
        let name = parse_markup_name(p)?;

        let attributes = if p.tok() == TokenKind::LParen {
            p.next();
            let entries = p.parse_nested(parse_attribute_list)?;
            p.expect(TokenKind::RParen)?;
            Some(entries)
        } else {
            None
        };

        let mut end = p.expect(TokenKind::Gtr)?;

        let body = if p.tok() == TokenKind::LBrace {
            self.scopes.borrow_mut().push(self.names.param.clone());
            let block = p.parse_block_stmt();
            self.scopes.borrow_mut().pop();
            let block = block?;
            end = block.rbrace;
            Some(block)
        } else {
            None
        };

        // `>` does not end a line for semicolon insertion, so the terminator is optional
        if p.tok() == TokenKind::Semicolon {
            p.next();
        }

        Ok(TagStatement {
            pos,
            name,
            attributes,
            body,
            end,
        })
    }

    fn parse_text_node(&self, p: &mut Parser<'_>) -> PResult<TextNodeStatement> {
        let pos = p.expect(TokenKind::Tilde)?;
        let content = p.parse_rhs()?;
        p.expect_semi()?;
        Ok(TextNodeStatement { pos, content })
    }
}

impl StatementHook for Markup {
    fn parse_statement(&self, p: &mut Parser<'_>) -> PResult<Option<Stmt>> {
        match p.tok() {
            TokenKind::Lss => {
                let builder = self.current_builder();
                let tag = self.parse_tag(p)?;
                tracing::trace!(
                    tag = %tag.name.name,
                    builder = %builder,
                    attributes = tag.attributes.as_ref().map(Vec::len),
                    has_body = tag.body.is_some(),
                    "lowering tag"
                );
                Ok(Some(lower_tag(tag, &builder, &self.names)))
            }
            TokenKind::Tilde => {
                let builder = self.current_builder();
                let text = self.parse_text_node(p)?;
                tracing::trace!(builder = %builder, "lowering text node");
                Ok(Some(lower_text(text, &builder, &self.names)))
            }
            _ => Ok(None),
        }
    }
}

/// Tag names and attribute keys are identifiers; keywords are accepted too
/// so that `<select>` and `type: "text"` work.
fn parse_markup_name(p: &mut Parser<'_>) -> PResult<Ident> {
    if p.tok().is_keyword() {
        let ident = Ident::at(p.pos(), p.tok().as_str());
        p.next();
        return Ok(ident);
    }
    p.parse_ident()
}

fn parse_attribute_list(p: &mut Parser<'_>) -> PResult<Vec<AttributeEntry>> {
    let mut entries = Vec::new();
    loop {
        let mut key = String::new();
        if p.tok() == TokenKind::Period {
            p.next();
            key.push('.');
        }
        key.push_str(&parse_markup_name(p)?.name);

        let value = if p.tok() == TokenKind::Colon {
            p.next();
            Some(p.parse_rhs()?)
        } else {
            None
        };
        entries.push(AttributeEntry {
            key,
            value,
        });

        if p.tok() != TokenKind::Comma {
            break;
        }
        p.next();
    }
    Ok(entries)
}

fn builder_method(builder: &str, pos: Pos, method: &str) -> Expr {
    Expr::Selector {
        x: Box::new(Expr::Ident(Ident::at(pos, builder))),
        sel: Ident::new(method),
    }
}

/// `builder.AppendElement("name", attrs-or-nil, func(param element) { body }-or-nil)`.
pub fn lower_tag(tag: TagStatement, builder: &str, names: &MarkupNames) -> Stmt {
    let nil = Expr::ident(&names.nil);

    let attributes = match tag.attributes {
        Some(entries) => Expr::CompositeLit(CompositeLit {
            ty: Some(Box::new(Expr::ident(&names.attributes_type))),
            lbrace: Pos::NONE,
            elts: entries
                .into_iter()
                .map(|entry| Expr::KeyValue {
                    key: Box::new(Expr::BasicLit(BasicLit::quoted(&entry.key))),
                    colon: Pos::NONE,
                    value: Box::new(
                        entry
                            .value
                            .unwrap_or_else(|| Expr::ident(&names.true_ident)),
                    ),
                })
                .collect(),
            rbrace: Pos::NONE,
        }),
        None => nil.clone(),
    };

    let body = match tag.body {
        Some(block) => Expr::FuncLit(FuncLit {
            ty: FuncType {
                func: block.lbrace,
                type_params: None,
                params: FieldList {
                    opening: Pos::NONE,
                    list: vec![Field {
                        names: vec![Ident::new(&names.param)],
                        ty: Expr::ident(&names.element_type),
                        tag: None,
                    }],
                    closing: Pos::NONE,
                },
                results: None,
            },
            body: block,
        }),
        None => nil,
    };

    Stmt::Expr(Expr::Call(CallExpr {
        fun: Box::new(builder_method(builder, tag.pos, &names.append_element)),
        lparen: Pos::NONE,
        args: vec![
            Expr::BasicLit(BasicLit::quoted(&tag.name.name)),
            attributes,
            body,
        ],
        ellipsis: None,
        rparen: tag.end,
    }))
}

/// `builder.AppendTextNode(content)`; the call's parentheses span the content,
/// so the call ends where the content does.
pub fn lower_text(text: TextNodeStatement, builder: &str, names: &MarkupNames) -> Stmt {
    let lparen = text.content.pos();
    let end = text.content.end();
    let rparen = if end.is_valid() {
        Pos::from_offset(end.offset().saturating_sub(1))
    } else {
        Pos::NONE
    };
    Stmt::Expr(Expr::Call(CallExpr {
        fun: Box::new(builder_method(builder, text.pos, &names.append_text)),
        lparen,
        args: vec![text.content],
        ellipsis: None,
        rparen,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserOptions;
    use crate::error::ErrorList;
    use crate::parser::parse_fragment;
    use crate::position::SourceFile;

    fn lower(src: &str) -> Vec<Stmt> {
        lower_with(src, MarkupNames::default())
    }

    fn lower_with(src: &str, names: MarkupNames) -> Vec<Stmt> {
        let file = SourceFile::new("t.goml", src);
        let markup = Markup::new(names);
        parse_fragment(&file, src, Some(&markup), &ParserOptions::default())
            .unwrap_or_else(|e| panic!("{src:?}: {e}"))
            .stmts
    }

    fn errors(src: &str) -> ErrorList {
        let file = SourceFile::new("t.goml", src);
        let markup = Markup::new(MarkupNames::default());
        parse_fragment(&file, src, Some(&markup), &ParserOptions::default()).unwrap_err()
    }

    /// Unwraps `builder.Method(args...)`.
    fn call(stmt: &Stmt) -> (&str, &str, &[Expr]) {
        match stmt {
            Stmt::Expr(Expr::Call(call)) => match call.fun.as_ref() {
                Expr::Selector { x, sel } => match x.as_ref() {
                    Expr::Ident(builder) => (&builder.name, &sel.name, &call.args),
                    other => panic!("unexpected receiver {other:?}"),
                },
                other => panic!("unexpected callee {other:?}"),
            },
            other => panic!("expected call statement, got {other:?}"),
        }
    }

    fn string_value(expr: &Expr) -> &str {
        match expr {
            Expr::BasicLit(lit) => &lit.value,
            other => panic!("expected literal, got {other:?}"),
        }
    }

    fn ident_name(expr: &Expr) -> &str {
        match expr {
            Expr::Ident(id) => &id.name,
            other => panic!("expected identifier, got {other:?}"),
        }
    }

    fn closure(expr: &Expr) -> &FuncLit {
        match expr {
            Expr::FuncLit(lit) => lit,
            other => panic!("expected func literal, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_tag_lowers_to_nil_arguments() {
        let stmts = lower("<br>\n");
        assert_eq!(stmts.len(), 1);
        let (builder, method, args) = call(&stmts[0]);
        assert_eq!(builder, "e");
        assert_eq!(method, "AppendElement");
        assert_eq!(string_value(&args[0]), "\"br\"");
        assert_eq!(ident_name(&args[1]), "nil");
        assert_eq!(ident_name(&args[2]), "nil");
    }

    #[test]
    fn test_nested_tags_and_text() {
        let stmts = lower("<div> { <span(id: \"x\")> { ~ \"hi\" } }");
        let (_, _, div) = call(&stmts[0]);
        assert_eq!(string_value(&div[0]), "\"div\"");
        assert_eq!(ident_name(&div[1]), "nil");

        let outer = closure(&div[2]);
        assert_eq!(outer.ty.params.list[0].names[0].name, "e");
        assert_eq!(ident_name(&outer.ty.params.list[0].ty), "element");

        let (_, _, span) = call(&outer.body.stmts[0]);
        assert_eq!(string_value(&span[0]), "\"span\"");
        match &span[1] {
            Expr::CompositeLit(lit) => {
                assert_eq!(lit.ty.as_deref().map(ident_name), Some("attributes"));
                assert_eq!(lit.elts.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let inner = closure(&span[2]);
        let (builder, method, text) = call(&inner.body.stmts[0]);
        assert_eq!(builder, "e");
        assert_eq!(method, "AppendTextNode");
        assert_eq!(string_value(&text[0]), "\"hi\"");
    }

    #[test]
    fn test_class_shorthand_defaults_to_true() {
        let stmts = lower("<li(.active)>");
        let (_, _, args) = call(&stmts[0]);
        match &args[1] {
            Expr::CompositeLit(lit) => match &lit.elts[0] {
                Expr::KeyValue { key, value, .. } => {
                    assert_eq!(string_value(key), "\".active\"");
                    assert_eq!(ident_name(value), "true");
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ident_name(&args[2]), "nil");
    }

    #[test]
    fn test_attribute_order_and_duplicates_are_kept() {
        let stmts = lower("<a(href: url, .x, disabled, .x, href: \"#\")>");
        let (_, _, args) = call(&stmts[0]);
        let keys: Vec<&str> = match &args[1] {
            Expr::CompositeLit(lit) => lit
                .elts
                .iter()
                .map(|elt| match elt {
                    Expr::KeyValue { key, .. } => string_value(key),
                    other => panic!("unexpected {other:?}"),
                })
                .collect(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(keys, ["\"href\"", "\".x\"", "\"disabled\"", "\".x\"", "\"href\""]);
    }

    #[test]
    fn test_attribute_values_are_full_expressions() {
        let stmts = lower("<input(type: \"text\", value: fmt.Sprint(n+1), .on)>");
        let (_, _, args) = call(&stmts[0]);
        match &args[1] {
            Expr::CompositeLit(lit) => {
                assert!(matches!(&lit.elts[1], Expr::KeyValue { value, .. } if matches!(**value, Expr::Call(_))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_keyword_tag_name() {
        let stmts = lower("<select> {\n\t<option>\n}\n");
        let (_, _, args) = call(&stmts[0]);
        assert_eq!(string_value(&args[0]), "\"select\"");
    }

    #[test]
    fn test_text_node_span_comes_from_content() {
        let src = "~ name\n";
        let stmts = lower(src);
        match &stmts[0] {
            Stmt::Expr(Expr::Call(call)) => {
                assert_eq!(call.lparen, Pos::from_offset(2));
                assert_eq!(call.rparen, Pos::from_offset(5));
                assert_eq!(stmts[0].end(), Pos::from_offset(6));
                assert_eq!(call.fun.pos(), Pos::from_offset(0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tag_positions() {
        let src = "<p> {\n}\n";
        let stmts = lower(src);
        match &stmts[0] {
            Stmt::Expr(Expr::Call(call)) => {
                assert_eq!(call.fun.pos(), Pos::from_offset(0));
                assert_eq!(call.rparen, Pos::from_offset(6));
                let body = closure(&call.args[2]);
                assert_eq!(body.ty.func, Pos::from_offset(4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_host_statements_interleave_with_markup() {
        let src = "<ul> {\n\tfor _, item := range items {\n\t\t<li> { ~ item }\n\t}\n\tif empty {\n\t\t~ \"none\"\n\t}\n}\n";
        let stmts = lower(src);
        let (_, _, ul) = call(&stmts[0]);
        let body = &closure(&ul[2]).body.stmts;
        match &body[0] {
            Stmt::Range(range) => {
                let (_, method, _) = call(&range.body.stmts[0]);
                assert_eq!(method, "AppendElement");
            }
            other => panic!("unexpected {other:?}"),
        }
        match &body[1] {
            Stmt::If(s) => {
                let (_, method, _) = call(&s.body.stmts[0]);
                assert_eq!(method, "AppendTextNode");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_markup_inside_function_literal() {
        let stmts = lower("render := func(e element) {\n\t<hr>\n}\n");
        match &stmts[0] {
            Stmt::Assign { rhs, .. } => {
                let (builder, _, _) = call(&closure(&rhs[0]).body.stmts[0]);
                assert_eq!(builder, "e");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_root_builder_and_param_names_are_configurable() {
        let names = MarkupNames {
            builder: "doc".to_string(),
            param: "el".to_string(),
            element_type: "Node".to_string(),
            ..MarkupNames::default()
        };
        let stmts = lower_with("<div> { <p> }\n~ \"after\"\n", names);
        let (root, _, args) = call(&stmts[0]);
        assert_eq!(root, "doc");
        let body = closure(&args[2]);
        assert_eq!(body.ty.params.list[0].names[0].name, "el");
        assert_eq!(ident_name(&body.ty.params.list[0].ty), "Node");
        let (inner, _, _) = call(&body.body.stmts[0]);
        assert_eq!(inner, "el");
        // scope is restored after the body
        let (after, method, _) = call(&stmts[1]);
        assert_eq!((after, method), ("doc", "AppendTextNode"));
    }

    #[test]
    fn test_missing_closing_angle_reports_one_error() {
        let errs = errors("<div(id:1)\n");
        assert_eq!(errs.len(), 1);
        let err = errs.iter().next().unwrap();
        assert_eq!(err.message, "expected '>', found newline");
        assert_eq!((err.pos.line, err.pos.column), (1, 11));
    }

    #[test]
    fn test_missing_tag_name() {
        let errs = errors("<(id: 1)>\n");
        assert_eq!(
            errs.iter().next().map(|e| e.message.as_str()),
            Some("expected 'IDENT', found '('")
        );
    }

    #[test]
    fn test_missing_closing_paren() {
        let errs = errors("<div(id: 1 {\n");
        let first = errs.iter().next().unwrap();
        assert_eq!(first.message, "expected ')', found '{'");
        assert_eq!((first.pos.line, first.pos.column), (1, 12));
    }

    #[test]
    fn test_gtr_after_value_reads_as_comparison() {
        // `1>` starts a comparison, so the missing operand is reported at the end
        let errs = errors("<div(id: 1>\n");
        assert_eq!(
            errs.iter().next().map(|e| e.message.as_str()),
            Some("expected operand, found 'EOF'")
        );
    }

    #[test]
    fn test_trailing_comma_is_rejected() {
        assert!(!errors("<div(id: 1,)>\n").is_empty());
    }

    #[test]
    fn test_lower_functions_take_builder_explicitly() {
        let names = MarkupNames::default();
        let text = TextNodeStatement {
            pos: Pos::NONE,
            content: Expr::ident("x"),
        };
        let (builder, method, args) = match lower_text(text, "outer", &names) {
            Stmt::Expr(Expr::Call(call)) => match *call.fun {
                Expr::Selector { x, sel } => (ident_name(&x).to_string(), sel.name, call.args),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(builder, "outer");
        assert_eq!(method, "AppendTextNode");
        assert_eq!(args, vec![Expr::ident("x")]);

        let tag = TagStatement {
            pos: Pos::NONE,
            name: Ident::new("img"),
            attributes: Some(Vec::new()),
            body: None,
            end: Pos::NONE,
        };
        let stmt = lower_tag(tag, "b", &names);
        let (builder, _, args) = call(&stmt);
        assert_eq!(builder, "b");
        assert!(matches!(&args[1], Expr::CompositeLit(lit) if lit.elts.is_empty()));
    }
}
