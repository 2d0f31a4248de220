//! Tokenizer for predicate scripts.
//!
//! Layout follows the usual indentation rules:
//! - a logical line ends with [`TokenKind::Newline`]
//! - a deeper indent opens a block with [`TokenKind::Indent`]
//! - each closed level emits one [`TokenKind::Dedent`]
//!
//! Line breaks inside `()`, `[]` and `{}` and after a trailing `\` do not
//! end the logical line. Blank and comment-only lines produce nothing.

use crate::error::{Result, ScriptError};

/// Reserved words. Some are recognized only so the parser can reject them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Elif,
    Else,
    For,
    Pass,
    Break,
    Continue,
    True,
    False,
    None,
    Import,
    From,
    Def,
    Class,
    Lambda,
    While,
    With,
    Try,
    Except,
    Finally,
    Raise,
    Return,
    Global,
    Nonlocal,
    Yield,
    Del,
    Assert,
    Async,
    Await,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Self> {
        Some(match word {
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "in" => Self::In,
            "is" => Self::Is,
            "if" => Self::If,
            "elif" => Self::Elif,
            "else" => Self::Else,
            "for" => Self::For,
            "pass" => Self::Pass,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "True" => Self::True,
            "False" => Self::False,
            "None" => Self::None,
            "import" => Self::Import,
            "from" => Self::From,
            "def" => Self::Def,
            "class" => Self::Class,
            "lambda" => Self::Lambda,
            "while" => Self::While,
            "with" => Self::With,
            "try" => Self::Try,
            "except" => Self::Except,
            "finally" => Self::Finally,
            "raise" => Self::Raise,
            "return" => Self::Return,
            "global" => Self::Global,
            "nonlocal" => Self::Nonlocal,
            "yield" => Self::Yield,
            "del" => Self::Del,
            "assert" => Self::Assert,
            "async" => Self::Async,
            "await" => Self::Await,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::In => "in",
            Self::Is => "is",
            Self::If => "if",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::For => "for",
            Self::Pass => "pass",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::True => "True",
            Self::False => "False",
            Self::None => "None",
            Self::Import => "import",
            Self::From => "from",
            Self::Def => "def",
            Self::Class => "class",
            Self::Lambda => "lambda",
            Self::While => "while",
            Self::With => "with",
            Self::Try => "try",
            Self::Except => "except",
            Self::Finally => "finally",
            Self::Raise => "raise",
            Self::Return => "return",
            Self::Global => "global",
            Self::Nonlocal => "nonlocal",
            Self::Yield => "yield",
            Self::Del => "del",
            Self::Assert => "assert",
            Self::Async => "async",
            Self::Await => "await",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Assign,
    PlusAssign,
    MinusAssign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    /// How the token reads in an error message.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Name(n) => format!("name '{n}'"),
            Self::Int(i) => format!("number {i}"),
            Self::Float(f) => format!("number {f}"),
            Self::Str(_) => "string".to_string(),
            Self::Keyword(k) => format!("'{}'", k.as_str()),
            Self::Newline => "end of line".to_string(),
            Self::Indent => "indent".to_string(),
            Self::Dedent => "dedent".to_string(),
            Self::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    const fn symbol(&self) -> &'static str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::DoubleSlash => "//",
            Self::Percent => "%",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

const TAB_WIDTH: usize = 8;

/// Split `source` into tokens, ending with [`TokenKind::Eof`].
///
/// # Errors
///
/// Returns [`ScriptError::Syntax`] for unknown characters, unterminated
/// strings, bad numbers and inconsistent indentation.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            depth: 0,
            indents: vec![0],
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize, col: usize) {
        self.tokens.push(Token { kind, line, col });
    }

    fn error(&self, msg: impl Into<String>) -> ScriptError {
        ScriptError::syntax(self.line, self.col, msg)
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.depth == 0 {
                self.at_line_start = false;
                if self.indentation()? {
                    continue;
                }
            }
            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\n' => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    if self.depth == 0 {
                        self.push(TokenKind::Newline, line, col);
                        self.at_line_start = true;
                    }
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '\\' if self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n') => {
                    self.bump();
                    self.bump();
                    self.bump();
                }
                '\'' | '"' => self.string()?,
                c if c.is_ascii_digit() => self.number()?,
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
                c if c == '_' || c.is_alphabetic() => self.word(),
                _ => self.punct()?,
            }
        }

        let (line, col) = (self.line, self.col);
        if self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.kind, TokenKind::Newline))
        {
            self.push(TokenKind::Newline, line, col);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, line, col);
        }
        self.push(TokenKind::Eof, line, col);
        Ok(self.tokens)
    }

    /// Measure the indentation of a new line and emit block tokens.
    ///
    /// Returns true when the line was blank or a comment and was skipped.
    fn indentation(&mut self) -> Result<bool> {
        let mut width = 0usize;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                '\x0c' => width = 0,
                _ => break,
            }
            self.bump();
        }

        match self.peek() {
            None => return Ok(true),
            Some('#') => {
                self.skip_comment();
                self.skip_line_end();
                return Ok(true);
            }
            Some('\n' | '\r') => {
                self.skip_line_end();
                return Ok(true);
            }
            Some(_) => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        let (line, col) = (self.line, self.col);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, line, col);
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.push(TokenKind::Dedent, line, col);
            }
            if self.indents.last().copied() != Some(width) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(false)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_line_end(&mut self) {
        if self.peek() == Some('\r') {
            self.bump();
        }
        if self.peek() == Some('\n') {
            self.bump();
        }
        self.at_line_start = true;
    }

    fn word(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = Keyword::lookup(&word).map_or(TokenKind::Name(word), TokenKind::Keyword);
        self.push(kind, line, col);
    }

    fn number(&mut self) -> Result<()> {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        let mut is_float = false;

        self.digits(&mut text);
        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.bump();
            self.digits(&mut text);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_at(1);
            let digit_at = if matches!(sign, Some('+' | '-')) { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                text.push('e');
                self.bump();
                if let Some(s @ ('+' | '-')) = sign {
                    text.push(s);
                    self.bump();
                }
                self.digits(&mut text);
            }
        }
        if self.peek().is_some_and(|c| c == '_' || c.is_alphabetic()) {
            return Err(self.error("invalid decimal literal"));
        }

        let kind = if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| ScriptError::syntax(line, col, format!("invalid number '{text}'")))?;
            TokenKind::Float(value)
        } else {
            let value = text.parse::<i64>().map_err(|_| {
                ScriptError::syntax(line, col, format!("integer literal too large: {text}"))
            })?;
            TokenKind::Int(value)
        };
        self.push(kind, line, col);
        Ok(())
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c != '_' {
                break;
            }
            self.bump();
        }
    }

    fn string(&mut self) -> Result<()> {
        let (line, col) = (self.line, self.col);
        let Some(quote) = self.bump() else {
            return Err(self.error("unexpected end of input"));
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(ScriptError::syntax(line, col, "unterminated string literal"));
            };
            match c {
                '\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(ScriptError::syntax(line, col, "unterminated string literal"));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' | '\'' | '"' => value.push(escaped),
                        '\n' => {}
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                '\n' if !triple => {
                    return Err(ScriptError::syntax(line, col, "unterminated string literal"));
                }
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    value.push(c);
                }
                c => value.push(c),
            }
        }
        self.push(TokenKind::Str(value), line, col);
        Ok(())
    }

    fn punct(&mut self) -> Result<()> {
        let (line, col) = (self.line, self.col);
        let Some(c) = self.bump() else {
            return Ok(());
        };
        let next = self.peek();
        let (kind, extra) = match (c, next) {
            ('(', _) => (TokenKind::LParen, false),
            (')', _) => (TokenKind::RParen, false),
            ('[', _) => (TokenKind::LBracket, false),
            (']', _) => (TokenKind::RBracket, false),
            ('{', _) => (TokenKind::LBrace, false),
            ('}', _) => (TokenKind::RBrace, false),
            (',', _) => (TokenKind::Comma, false),
            (':', _) => (TokenKind::Colon, false),
            ('.', _) => (TokenKind::Dot, false),
            ('=', Some('=')) => (TokenKind::Eq, true),
            ('=', _) => (TokenKind::Assign, false),
            ('!', Some('=')) => (TokenKind::Ne, true),
            ('<', Some('=')) => (TokenKind::Le, true),
            ('<', Some('>')) => (TokenKind::Ne, true),
            ('<', _) => (TokenKind::Lt, false),
            ('>', Some('=')) => (TokenKind::Ge, true),
            ('>', _) => (TokenKind::Gt, false),
            ('+', Some('=')) => (TokenKind::PlusAssign, true),
            ('+', _) => (TokenKind::Plus, false),
            ('-', Some('=')) => (TokenKind::MinusAssign, true),
            ('-', _) => (TokenKind::Minus, false),
            ('*', _) => (TokenKind::Star, false),
            ('/', Some('/')) => (TokenKind::DoubleSlash, true),
            ('/', _) => (TokenKind::Slash, false),
            ('%', _) => (TokenKind::Percent, false),
            (other, _) => {
                return Err(ScriptError::syntax(
                    line,
                    col,
                    format!("unexpected character '{other}'"),
                ));
            }
        };
        if extra {
            self.bump();
        }
        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => self.depth += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.depth = self.depth.saturating_sub(1);
            }
            _ => {}
        }
        self.push(kind, line, col);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn blocks_emit_indent_and_dedent() {
        let k = kinds("if x:\n    y = 1\nz = 2\n");
        assert_eq!(
            k,
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Name("x".into()),
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Name("y".into()),
                TokenKind::Assign,
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Name("z".into()),
                TokenKind::Assign,
                TokenKind::Int(2),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn brackets_join_lines_and_comments_vanish() {
        let k = kinds("domain = [  # open\n    ('a', '=', 1),\n]\n\n# trailing\n");
        assert!(!k[3..k.len() - 2].contains(&TokenKind::Newline));
        assert_eq!(k.iter().filter(|t| **t == TokenKind::Newline).count(), 1);
        assert!(!k.contains(&TokenKind::Indent));
    }

    #[test]
    fn strings_and_numbers() {
        let k = kinds(r#"'it\'s' "two" 1_000 2.5 1e3 .5"#);
        assert_eq!(
            &k[..6],
            &[
                TokenKind::Str("it's".into()),
                TokenKind::Str("two".into()),
                TokenKind::Int(1000),
                TokenKind::Float(2.5),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.5),
            ]
        );
        assert_eq!(kinds("'''a\nb'''")[0], TokenKind::Str("a\nb".into()));
    }

    #[test]
    fn operators() {
        let k = kinds("a <> b != c <= d // e += 1");
        assert!(k.contains(&TokenKind::Ne));
        assert!(k.contains(&TokenKind::Le));
        assert!(k.contains(&TokenKind::DoubleSlash));
        assert!(k.contains(&TokenKind::PlusAssign));
    }

    #[test]
    fn errors_carry_position() {
        let err = tokenize("x = 'open\n").expect_err("unterminated");
        assert!(matches!(err, ScriptError::Syntax { line: 1, col: 5, .. }));

        let err = tokenize("if x:\n        a = 1\n    b = 2\n").expect_err("bad dedent");
        assert!(matches!(err, ScriptError::Syntax { line: 3, .. }));

        let err = tokenize("a = $").expect_err("bad char");
        assert!(matches!(err, ScriptError::Syntax { line: 1, col: 5, .. }));

        assert!(tokenize("x = 99999999999999999999").is_err());
    }

    #[test]
    fn comment_only_source_is_empty() {
        assert_eq!(kinds("# only\n#  - a comment\n"), vec![TokenKind::Eof]);
    }
}
