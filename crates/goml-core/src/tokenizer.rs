use crate::ast::Comment;
use crate::position::Pos;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Illegal,
    Eof,

    Ident,
    Int,
    Float,
    Imag,
    Char,
    String,

    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,

    AddAssign,
    SubAssign,
    MulAssign,
    QuoAssign,
    RemAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    AndNotAssign,

    LAnd,
    LOr,
    Arrow,
    Inc,
    Dec,

    Eql,
    Lss,
    Gtr,
    Assign,
    Not,
    Neq,
    Leq,
    Geq,
    Define,
    Ellipsis,
    Tilde,

    LParen,
    LBrack,
    LBrace,
    Comma,
    Period,
    RParen,
    RBrack,
    RBrace,
    Semicolon,
    Colon,

    Break,
    Case,
    Chan,
    Const,
    Continue,
    Default,
    Defer,
    Else,
    Fallthrough,
    For,
    Func,
    Go,
    Goto,
    If,
    Import,
    Interface,
    Map,
    Package,
    Range,
    Return,
    Select,
    Struct,
    Switch,
    Type,
    Var,
}

/// Lowest binary operator precedence; also the precedence a full expression is parsed at.
pub const LOWEST_PREC: u8 = 0;
/// Precedence of unary operators, tighter than every binary operator.
pub const UNARY_PREC: u8 = 6;

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        use TokenKind::*;
        match self {
            Illegal => "ILLEGAL",
            Eof => "EOF",
            Ident => "IDENT",
            Int => "INT",
            Float => "FLOAT",
            Imag => "IMAG",
            Char => "CHAR",
            String => "STRING",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Quo => "/",
            Rem => "%",
            And => "&",
            Or => "|",
            Xor => "^",
            Shl => "<<",
            Shr => ">>",
            AndNot => "&^",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            QuoAssign => "/=",
            RemAssign => "%=",
            AndAssign => "&=",
            OrAssign => "|=",
            XorAssign => "^=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            AndNotAssign => "&^=",
            LAnd => "&&",
            LOr => "||",
            Arrow => "<-",
            Inc => "++",
            Dec => "--",
            Eql => "==",
            Lss => "<",
            Gtr => ">",
            Assign => "=",
            Not => "!",
            Neq => "!=",
            Leq => "<=",
            Geq => ">=",
            Define => ":=",
            Ellipsis => "...",
            Tilde => "~",
            LParen => "(",
            LBrack => "[",
            LBrace => "{",
            Comma => ",",
            Period => ".",
            RParen => ")",
            RBrack => "]",
            RBrace => "}",
            Semicolon => ";",
            Colon => ":",
            Break => "break",
            Case => "case",
            Chan => "chan",
            Const => "const",
            Continue => "continue",
            Default => "default",
            Defer => "defer",
            Else => "else",
            Fallthrough => "fallthrough",
            For => "for",
            Func => "func",
            Go => "go",
            Goto => "goto",
            If => "if",
            Import => "import",
            Interface => "interface",
            Map => "map",
            Package => "package",
            Range => "range",
            Return => "return",
            Select => "select",
            Struct => "struct",
            Switch => "switch",
            Type => "type",
            Var => "var",
        }
    }

    /// Binary operator precedence, 0 for everything that is not a binary operator.
    pub fn precedence(self) -> u8 {
        use TokenKind::*;
        match self {
            LOr => 1,
            LAnd => 2,
            Eql | Neq | Lss | Leq | Gtr | Geq => 3,
            Add | Sub | Or | Xor => 4,
            Mul | Quo | Rem | Shl | Shr | And | AndNot => 5,
            _ => LOWEST_PREC,
        }
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::Imag
                | TokenKind::Char
                | TokenKind::String
        )
    }

    pub fn is_keyword(self) -> bool {
        (self as u16) >= (TokenKind::Break as u16)
    }

    pub fn keyword(ident: &str) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match ident {
            "break" => Break,
            "case" => Case,
            "chan" => Chan,
            "const" => Const,
            "continue" => Continue,
            "default" => Default,
            "defer" => Defer,
            "else" => Else,
            "fallthrough" => Fallthrough,
            "for" => For,
            "func" => Func,
            "go" => Go,
            "goto" => Goto,
            "if" => If,
            "import" => Import,
            "interface" => Interface,
            "map" => Map,
            "package" => Package,
            "range" => Range,
            "return" => Return,
            "select" => Select,
            "struct" => Struct,
            "switch" => Switch,
            "type" => Type,
            "var" => Var,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    /// Source text for identifiers and literals; `"\n"` or `";"` for semicolons.
    pub lit: String,
}

impl Token {
    fn new(kind: TokenKind, pos: Pos, lit: impl Into<String>) -> Self {
        Self {
            kind,
            pos,
            lit: lit.into(),
        }
    }

    /// How the token reads in an "expected X, found Y" message.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Semicolon if self.lit == "\n" => "newline".to_string(),
            kind if kind.is_literal() => self.lit.clone(),
            kind => format!("'{}'", kind.as_str()),
        }
    }
}

/// Output of [`tokenize`]: tokens terminated by `Eof`, comments, and lexical errors.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub errors: Vec<(Pos, String)>,
}

pub fn tokenize(input: &str) -> TokenStream {
    let mut scanner = Scanner {
        src: input,
        bytes: input.as_bytes(),
        offset: 0,
        insert_semi: false,
        out: TokenStream::default(),
    };
    scanner.run();
    scanner.out
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    offset: usize,
    insert_semi: bool,
    out: TokenStream,
}

impl<'a> Scanner<'a> {
    fn run(&mut self) {
        loop {
            self.skip_whitespace();

            let start = self.offset;
            let pos = Pos::from_offset(start);

            if start >= self.bytes.len() {
                if self.insert_semi {
                    self.push(TokenKind::Semicolon, pos, "\n");
                }
                self.push(TokenKind::Eof, pos, "");
                return;
            }

            let b = self.bytes[start];

            if b == b'\n' {
                self.offset += 1;
                if self.insert_semi {
                    self.push(TokenKind::Semicolon, pos, "\n");
                }
                continue;
            }

            if b == b'/' && self.peek_byte(1) == Some(b'/') {
                self.line_comment();
                continue;
            }
            if b == b'/' && self.peek_byte(1) == Some(b'*') {
                let has_newline = self.block_comment();
                if has_newline && self.insert_semi {
                    self.push(TokenKind::Semicolon, pos, "\n");
                }
                continue;
            }

            let c = self.src[start..].chars().next().unwrap_or('\0');
            if is_letter(c) {
                self.identifier();
            } else if c.is_ascii_digit() || (c == '.' && self.peek_byte(1).is_some_and(|d| d.is_ascii_digit())) {
                self.number();
            } else if c == '"' {
                self.interpreted_string();
            } else if c == '`' {
                self.raw_string();
            } else if c == '\'' {
                self.rune();
            } else {
                self.operator(c);
            }
        }
    }

    fn push(&mut self, kind: TokenKind, pos: Pos, lit: impl Into<String>) {
        self.insert_semi = matches!(
            kind,
            TokenKind::Ident
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::Imag
                | TokenKind::Char
                | TokenKind::String
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Fallthrough
                | TokenKind::Return
                | TokenKind::Inc
                | TokenKind::Dec
                | TokenKind::RParen
                | TokenKind::RBrack
                | TokenKind::RBrace
        );
        self.out.tokens.push(Token::new(kind, pos, lit));
    }

    fn error(&mut self, offset: usize, message: impl Into<String>) {
        self.out.errors.push((Pos::from_offset(offset), message.into()));
    }

    fn peek_byte(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.offset + n).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(&b) = self.bytes.get(self.offset) {
            if b == b' ' || b == b'\t' || b == b'\r' {
                self.offset += 1;
            } else {
                break;
            }
        }
    }

    fn line_comment(&mut self) {
        let start = self.offset;
        let end = self.src[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(self.src.len());
        let text = self.src[start..end].trim_end_matches('\r');
        self.out.comments.push(Comment {
            pos: Pos::from_offset(start),
            text: text.to_string(),
        });
        self.offset = end;
    }

    /// Returns whether the comment spans a newline.
    fn block_comment(&mut self) -> bool {
        let start = self.offset;
        match self.src[start + 2..].find("*/") {
            Some(i) => {
                let end = start + 2 + i + 2;
                let text = &self.src[start..end];
                self.out.comments.push(Comment {
                    pos: Pos::from_offset(start),
                    text: text.to_string(),
                });
                self.offset = end;
                text.contains('\n')
            }
            None => {
                self.error(start, "comment not terminated");
                self.out.comments.push(Comment {
                    pos: Pos::from_offset(start),
                    text: self.src[start..].to_string(),
                });
                self.offset = self.src.len();
                true
            }
        }
    }

    fn identifier(&mut self) {
        let start = self.offset;
        let end = self.src[start..]
            .char_indices()
            .find(|&(_, c)| !is_letter(c) && !c.is_ascii_digit() && !c.is_numeric())
            .map(|(i, _)| start + i)
            .unwrap_or(self.src.len());
        self.offset = end;
        let text = &self.src[start..end];
        let pos = Pos::from_offset(start);
        match TokenKind::keyword(text) {
            Some(kw) => self.push(kw, pos, ""),
            None => self.push(TokenKind::Ident, pos, text),
        }
    }

    fn number(&mut self) {
        let start = self.offset;
        let mut kind = TokenKind::Int;

        let radix_prefix = if self.bytes[start] == b'0' {
            self.peek_byte(1).map(|b| b.to_ascii_lowercase())
        } else {
            None
        };

        match radix_prefix {
            Some(b'x') => {
                self.offset += 2;
                self.digits(|b| b.is_ascii_hexdigit());
                if self.bytes.get(self.offset) == Some(&b'.') {
                    kind = TokenKind::Float;
                    self.offset += 1;
                    self.digits(|b| b.is_ascii_hexdigit());
                }
                if matches!(self.bytes.get(self.offset), Some(b'p') | Some(b'P')) {
                    kind = TokenKind::Float;
                    self.exponent();
                }
            }
            Some(b'b') => {
                self.offset += 2;
                self.digits(|b| b == b'0' || b == b'1');
            }
            Some(b'o') => {
                self.offset += 2;
                self.digits(|b| (b'0'..=b'7').contains(&b));
            }
            _ => {
                self.digits(|b| b.is_ascii_digit());
                if self.bytes.get(self.offset) == Some(&b'.') {
                    kind = TokenKind::Float;
                    self.offset += 1;
                    self.digits(|b| b.is_ascii_digit());
                }
                if matches!(self.bytes.get(self.offset), Some(b'e') | Some(b'E')) {
                    kind = TokenKind::Float;
                    self.exponent();
                }
            }
        }

        if self.bytes.get(self.offset) == Some(&b'i') {
            kind = TokenKind::Imag;
            self.offset += 1;
        }

        let text = &self.src[start..self.offset];
        if text.len() == 2 && radix_prefix.is_some_and(|p| matches!(p, b'x' | b'b' | b'o')) {
            self.error(start, format!("{} literal has no digits", radix_name(radix_prefix)));
        }
        self.push(kind, Pos::from_offset(start), text.to_string());
    }

    fn digits(&mut self, accept: impl Fn(u8) -> bool) {
        while let Some(&b) = self.bytes.get(self.offset) {
            if accept(b) || b == b'_' {
                self.offset += 1;
            } else {
                break;
            }
        }
    }

    fn exponent(&mut self) {
        self.offset += 1;
        if matches!(self.bytes.get(self.offset), Some(b'+') | Some(b'-')) {
            self.offset += 1;
        }
        let before = self.offset;
        self.digits(|b| b.is_ascii_digit());
        if self.offset == before {
            self.error(before, "exponent has no digits");
        }
    }

    fn interpreted_string(&mut self) {
        let start = self.offset;
        self.offset += 1;
        loop {
            match self.bytes.get(self.offset) {
                None | Some(b'\n') => {
                    self.error(start, "string literal not terminated");
                    break;
                }
                Some(b'\\') => self.offset += 2,
                Some(b'"') => {
                    self.offset += 1;
                    break;
                }
                Some(_) => self.offset += 1,
            }
        }
        self.offset = self.offset.min(self.src.len());
        let text = self.src[start..self.offset].to_string();
        self.push(TokenKind::String, Pos::from_offset(start), text);
    }

    fn raw_string(&mut self) {
        let start = self.offset;
        match self.src[start + 1..].find('`') {
            Some(i) => self.offset = start + 1 + i + 1,
            None => {
                self.error(start, "raw string literal not terminated");
                self.offset = self.src.len();
            }
        }
        let text = self.src[start..self.offset].replace('\r', "");
        self.push(TokenKind::String, Pos::from_offset(start), text);
    }

    fn rune(&mut self) {
        let start = self.offset;
        self.offset += 1;
        let mut count = 0;
        loop {
            match self.bytes.get(self.offset) {
                None | Some(b'\n') => {
                    self.error(start, "rune literal not terminated");
                    break;
                }
                Some(b'\\') => {
                    self.offset += 2;
                    count += 1;
                }
                Some(b'\'') => {
                    self.offset += 1;
                    if count != 1 {
                        self.error(start, "illegal rune literal");
                    }
                    break;
                }
                Some(_) => {
                    let c = self.src[self.offset..].chars().next().unwrap_or('\0');
                    self.offset += c.len_utf8();
                    count += 1;
                }
            }
        }
        self.offset = self.offset.min(self.src.len());
        let text = self.src[start..self.offset].to_string();
        self.push(TokenKind::Char, Pos::from_offset(start), text);
    }

    fn operator(&mut self, c: char) {
        use TokenKind::*;
        let start = self.offset;
        let pos = Pos::from_offset(start);
        let rest = &self.bytes[start..];
        let starts = |s: &str| rest.starts_with(s.as_bytes());

        // Longest match first.
        let (kind, len) = if starts("<<=") {
            (ShlAssign, 3)
        } else if starts(">>=") {
            (ShrAssign, 3)
        } else if starts("&^=") {
            (AndNotAssign, 3)
        } else if starts("...") {
            (Ellipsis, 3)
        } else if starts("+=") {
            (AddAssign, 2)
        } else if starts("-=") {
            (SubAssign, 2)
        } else if starts("*=") {
            (MulAssign, 2)
        } else if starts("/=") {
            (QuoAssign, 2)
        } else if starts("%=") {
            (RemAssign, 2)
        } else if starts("&=") {
            (AndAssign, 2)
        } else if starts("|=") {
            (OrAssign, 2)
        } else if starts("^=") {
            (XorAssign, 2)
        } else if starts("<<") {
            (Shl, 2)
        } else if starts(">>") {
            (Shr, 2)
        } else if starts("&^") {
            (AndNot, 2)
        } else if starts("&&") {
            (LAnd, 2)
        } else if starts("||") {
            (LOr, 2)
        } else if starts("<-") {
            (Arrow, 2)
        } else if starts("++") {
            (Inc, 2)
        } else if starts("--") {
            (Dec, 2)
        } else if starts("==") {
            (Eql, 2)
        } else if starts("!=") {
            (Neq, 2)
        } else if starts("<=") {
            (Leq, 2)
        } else if starts(">=") {
            (Geq, 2)
        } else if starts(":=") {
            (Define, 2)
        } else {
            let kind = match c {
                '+' => Add,
                '-' => Sub,
                '*' => Mul,
                '/' => Quo,
                '%' => Rem,
                '&' => And,
                '|' => Or,
                '^' => Xor,
                '<' => Lss,
                '>' => Gtr,
                '=' => Assign,
                '!' => Not,
                '~' => Tilde,
                '(' => LParen,
                '[' => LBrack,
                '{' => LBrace,
                ',' => Comma,
                '.' => Period,
                ')' => RParen,
                ']' => RBrack,
                '}' => RBrace,
                ';' => Semicolon,
                ':' => Colon,
                _ => Illegal,
            };
            (kind, 1)
        };

        if kind == Illegal {
            self.error(start, format!("invalid character U+{:04X} {:?}", c as u32, c));
            self.offset += c.len_utf8();
            let insert_semi = self.insert_semi;
            self.push(Illegal, pos, c.to_string());
            self.insert_semi = insert_semi;
            return;
        }

        self.offset += len;
        let lit = if kind == Semicolon { ";" } else { "" };
        self.push(kind, pos, lit);
    }
}

fn is_letter(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn radix_name(prefix: Option<u8>) -> &'static str {
    match prefix {
        Some(b'x') => "hexadecimal",
        Some(b'b') => "binary",
        _ => "octal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_identifiers_and_keywords() {
        let stream = tokenize("func main");
        assert_eq!(stream.tokens[0].kind, Func);
        assert_eq!(stream.tokens[1].kind, Ident);
        assert_eq!(stream.tokens[1].lit, "main");
        assert_eq!(stream.tokens[1].pos, Pos::from_offset(5));
    }

    #[test]
    fn test_semicolon_insertion_after_line_end() {
        assert_eq!(kinds("x\ny"), [Ident, Semicolon, Ident, Semicolon, Eof]);
        let stream = tokenize("x\n");
        assert_eq!(stream.tokens[1].lit, "\n");
        assert_eq!(stream.tokens[1].pos, Pos::from_offset(1));
    }

    #[test]
    fn test_no_semicolon_after_operator_or_gtr() {
        assert_eq!(kinds("a +\nb"), [Ident, Add, Ident, Semicolon, Eof]);
        assert_eq!(kinds("<div>\n"), [Lss, Ident, Gtr, Eof]);
    }

    #[test]
    fn test_semicolon_after_closing_paren() {
        assert_eq!(
            kinds("<div(id:1)\n}"),
            [Lss, Ident, LParen, Ident, Colon, Int, RParen, Semicolon, RBrace, Semicolon, Eof]
        );
    }

    #[test]
    fn test_tilde_and_markup_lead_tokens() {
        assert_eq!(kinds(r#"~ "hi""#), [Tilde, String, Semicolon, Eof]);
        assert_eq!(kinds("<li(.active)>"), [Lss, Ident, LParen, Period, Ident, RParen, Gtr, Eof]);
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(kinds("a &^= b"), [Ident, AndNotAssign, Ident, Semicolon, Eof]);
        assert_eq!(kinds("x := <-ch"), [Ident, Define, Arrow, Ident, Semicolon, Eof]);
        assert_eq!(kinds("f(xs...)"), [Ident, LParen, Ident, Ellipsis, RParen, Semicolon, Eof]);
    }

    #[test]
    fn test_numbers() {
        let stream = tokenize("42 0x1F 3.14 1e9 .5 2i 0b101 1_000");
        let got: Vec<(TokenKind, &str)> = stream
            .tokens
            .iter()
            .filter(|t| t.kind != Semicolon && t.kind != Eof)
            .map(|t| (t.kind, t.lit.as_str()))
            .collect();
        assert_eq!(
            got,
            [
                (Int, "42"),
                (Int, "0x1F"),
                (Float, "3.14"),
                (Float, "1e9"),
                (Float, ".5"),
                (Imag, "2i"),
                (Int, "0b101"),
                (Int, "1_000"),
            ]
        );
        assert!(stream.errors.is_empty());
    }

    #[test]
    fn test_strings_and_runes() {
        let stream = tokenize(r#""a\"b" `raw
line` 'x' '\n'"#);
        let lits: Vec<&str> = stream.tokens.iter().map(|t| t.lit.as_str()).collect();
        assert_eq!(&lits[..4], [r#""a\"b""#, "`raw\nline`", "'x'", r"'\n'"]);
        assert!(stream.errors.is_empty());
    }

    #[test]
    fn test_comments_are_collected() {
        let stream = tokenize("x // trailing\n/* block */ y");
        assert_eq!(stream.comments.len(), 2);
        assert_eq!(stream.comments[0].text, "// trailing");
        assert_eq!(stream.comments[1].text, "/* block */");
        assert_eq!(stream.tokens.iter().filter(|t| t.kind == Semicolon).count(), 2);
    }

    #[test]
    fn test_multiline_block_comment_acts_as_newline() {
        assert_eq!(kinds("x /*\n*/ y"), [Ident, Semicolon, Ident, Semicolon, Eof]);
    }

    #[test]
    fn test_lexical_errors() {
        let stream = tokenize("\"open\nx @ y");
        let messages: Vec<&str> = stream.errors.iter().map(|(_, m)| m.as_str()).collect();
        assert_eq!(messages, ["string literal not terminated", "invalid character U+0040 '@'"]);
    }

    #[test]
    fn test_unicode_identifier() {
        let stream = tokenize("größe := 1");
        assert_eq!(stream.tokens[0].lit, "größe");
        assert_eq!(stream.tokens[1].kind, Define);
    }

    #[test]
    fn test_describe() {
        let stream = tokenize("x\n");
        assert_eq!(stream.tokens[0].describe(), "x");
        assert_eq!(stream.tokens[1].describe(), "newline");
        assert_eq!(stream.tokens[2].describe(), "'EOF'");
    }
}
