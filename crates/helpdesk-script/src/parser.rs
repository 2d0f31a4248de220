//! Recursive-descent parser for predicate scripts.
//!
//! Two entry points mirror the two evaluation modes:
//! - [`parse_expression`] accepts exactly one expression (a bare tuple
//!   such as `a, b` included)
//! - [`parse_module`] accepts a statement body
//!
//! Constructs the sandbox never runs are rejected here with
//! [`ScriptError::Forbidden`] so they fail at save time.

use crate::ast::{BinaryOp, CompareOp, Expr, Stmt, StmtKind, UnaryOp};
use crate::error::{Result, ScriptError};
use crate::lexer::{Keyword, Token, TokenKind, tokenize};

/// Deepest expression or block nesting accepted.
pub const MAX_NESTING: usize = 64;

/// Parse `source` as a single expression.
///
/// # Errors
///
/// Returns a syntax or forbidden-construct error.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.skip_newlines();
    if parser.at(&TokenKind::Eof) {
        return Err(parser.error("expected an expression"));
    }
    let expr = parser.expr_list()?;
    parser.skip_newlines();
    parser.expect(&TokenKind::Eof)?;
    Ok(expr)
}

/// Parse `source` as a statement body.
///
/// # Errors
///
/// Returns a syntax or forbidden-construct error.
pub fn parse_module(source: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut body = Vec::new();
    loop {
        parser.skip_newlines();
        if parser.at(&TokenKind::Eof) {
            break;
        }
        body.push(parser.statement()?);
    }
    Ok(body)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    loops: usize,
}

impl Parser {
    const fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            loops: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.kind(), TokenKind::Keyword(k) if *k == keyword)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                kind.describe(),
                self.kind().describe()
            )))
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    fn error(&self, msg: impl Into<String>) -> ScriptError {
        let token = self.current();
        ScriptError::syntax(token.line, token.col, msg)
    }

    fn unexpected(&self) -> ScriptError {
        self.error(format!("unexpected {}", self.kind().describe()))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("too many nested expressions or blocks"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt> {
        let line = self.current().line;
        let kind = match self.kind().clone() {
            TokenKind::Keyword(Keyword::If) => return self.if_statement(),
            TokenKind::Keyword(Keyword::For) => return self.for_statement(),
            TokenKind::Keyword(Keyword::Pass) => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Keyword(keyword @ (Keyword::Break | Keyword::Continue)) => {
                if self.loops == 0 {
                    return Err(self.error(format!("'{}' outside loop", keyword.as_str())));
                }
                self.advance();
                if keyword == Keyword::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            TokenKind::Keyword(Keyword::Return) => {
                return Err(self.error("'return' outside function"));
            }
            TokenKind::Keyword(keyword) if forbidden_statement(keyword) => {
                return Err(ScriptError::forbidden(
                    line,
                    format!("'{}' statement", keyword.as_str()),
                ));
            }
            TokenKind::Indent => return Err(self.error("unexpected indent")),
            _ => self.simple_statement()?,
        };
        self.end_of_statement()?;
        Ok(Stmt { line, kind })
    }

    fn end_of_statement(&mut self) -> Result<()> {
        if self.eat(&TokenKind::Newline) || self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn simple_statement(&mut self) -> Result<StmtKind> {
        let line = self.current().line;
        let target = self.expr_list()?;

        if self.eat(&TokenKind::Assign) {
            let targets = assign_targets(&target, line)?;
            let value = self.expr_list()?;
            if self.at(&TokenKind::Assign) {
                return Err(self.error("chained assignment is not supported"));
            }
            return Ok(StmtKind::Assign { targets, value });
        }

        let op = match self.kind() {
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let Expr::Name(name) = target else {
                return Err(ScriptError::syntax(
                    line,
                    1,
                    "augmented assignment needs a plain name",
                ));
            };
            let value = self.expr_list()?;
            return Ok(StmtKind::AugAssign {
                target: name,
                op,
                value,
            });
        }

        Ok(StmtKind::Expr(target))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let line = self.current().line;
        self.advance();
        let mut branches = Vec::new();
        let test = self.expr()?;
        let body = self.block()?;
        branches.push((test, body));

        let mut orelse = Vec::new();
        loop {
            if self.eat_keyword(Keyword::Elif) {
                let test = self.expr()?;
                let body = self.block()?;
                branches.push((test, body));
            } else if self.eat_keyword(Keyword::Else) {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt {
            line,
            kind: StmtKind::If { branches, orelse },
        })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let line = self.current().line;
        self.advance();

        let mut targets = vec![self.name()?];
        while self.eat(&TokenKind::Comma) {
            if self.at_keyword(Keyword::In) {
                break;
            }
            targets.push(self.name()?);
        }
        if !self.eat_keyword(Keyword::In) {
            return Err(self.error("expected 'in'"));
        }
        let iter = self.expr_list()?;

        self.loops += 1;
        let body = self.block();
        self.loops -= 1;

        Ok(Stmt {
            line,
            kind: StmtKind::For {
                targets,
                iter,
                body: body?,
            },
        })
    }

    fn name(&mut self) -> Result<String> {
        match self.kind().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(format!("expected a name, found {}", self.kind().describe()))),
        }
    }

    /// `:` followed by an indented block, or by one statement on the same line.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&TokenKind::Colon)?;
        self.nested(|p| {
            if !p.eat(&TokenKind::Newline) {
                return Ok(vec![p.statement()?]);
            }
            p.skip_newlines();
            if !p.eat(&TokenKind::Indent) {
                return Err(p.error("expected an indented block"));
            }
            let mut body = Vec::new();
            loop {
                p.skip_newlines();
                if p.eat(&TokenKind::Dedent) || p.at(&TokenKind::Eof) {
                    break;
                }
                body.push(p.statement()?);
            }
            Ok(body)
        })
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// `a` or `a, b, ...` (a tuple).
    fn expr_list(&mut self) -> Result<Expr> {
        let first = self.expr()?;
        if !self.at(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if !self.starts_expr() {
                break;
            }
            items.push(self.expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn starts_expr(&self) -> bool {
        match self.kind() {
            TokenKind::Name(_)
            | TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Minus
            | TokenKind::Plus => true,
            TokenKind::Keyword(k) => matches!(
                k,
                Keyword::Not | Keyword::True | Keyword::False | Keyword::None | Keyword::Lambda
            ),
            _ => false,
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        self.nested(|p| {
            if p.at_keyword(Keyword::Lambda) {
                let line = p.current().line;
                return Err(ScriptError::forbidden(line, "lambda expression"));
            }
            let body = p.or_test()?;
            if !p.eat_keyword(Keyword::If) {
                return Ok(body);
            }
            let test = p.or_test()?;
            if !p.eat_keyword(Keyword::Else) {
                return Err(p.error("expected 'else' in conditional expression"));
            }
            let orelse = p.expr()?;
            Ok(Expr::IfElse {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            })
        })
    }

    fn or_test(&mut self) -> Result<Expr> {
        let mut left = self.and_test()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.and_test()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_test(&mut self) -> Result<Expr> {
        let mut left = self.not_test()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.not_test()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_test(&mut self) -> Result<Expr> {
        if self.eat_keyword(Keyword::Not) {
            let operand = self.nested(Self::not_test)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.arith()?;
        let mut chain = Vec::new();
        while let Some(op) = self.compare_op() {
            let right = self.arith()?;
            chain.push((op, right));
        }
        if chain.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), chain))
        }
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.kind() {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::Keyword(Keyword::In) => CompareOp::In,
            TokenKind::Keyword(Keyword::Not)
                if self.peek_kind(1) == Some(&TokenKind::Keyword(Keyword::In)) =>
            {
                self.advance();
                CompareOp::NotIn
            }
            TokenKind::Keyword(Keyword::Is) => {
                if self.peek_kind(1) == Some(&TokenKind::Keyword(Keyword::Not)) {
                    self.advance();
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn factor(&mut self) -> Result<Expr> {
        let op = match self.kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested(Self::factor)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.atom()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let attr = self.name()?;
                    expr = Expr::Attribute(Box::new(expr), attr);
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.call_args()?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                TokenKind::LBracket => {
                    self.advance();
                    if self.at(&TokenKind::Colon) {
                        return Err(self.error("slices are not supported"));
                    }
                    let index = self.expr_list()?;
                    if self.at(&TokenKind::Colon) {
                        return Err(self.error("slices are not supported"));
                    }
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::Subscript(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.eat(&TokenKind::RParen) {
            if matches!(self.kind(), TokenKind::Name(_))
                && self.peek_kind(1) == Some(&TokenKind::Assign)
            {
                return Err(self.error("keyword arguments are not supported"));
            }
            if self.at(&TokenKind::Star) {
                return Err(self.error("argument unpacking is not supported"));
            }
            args.push(self.expr()?);
            if self.at_keyword(Keyword::For) {
                return Err(self.error("comprehensions are not supported"));
            }
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen)?;
                break;
            }
        }
        Ok(args)
    }

    fn atom(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Name(name) => {
                self.advance();
                Ok(Expr::Name(name))
            }
            TokenKind::Int(i) => {
                self.advance();
                Ok(Expr::Int(i))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Float(f))
            }
            TokenKind::Str(mut s) => {
                self.advance();
                while let TokenKind::Str(next) = self.kind() {
                    s.push_str(next);
                    self.advance();
                }
                Ok(Expr::Str(s))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Keyword(Keyword::None) => {
                self.advance();
                Ok(Expr::None)
            }
            TokenKind::Keyword(keyword @ (Keyword::Yield | Keyword::Await | Keyword::Lambda)) => {
                Err(ScriptError::forbidden(
                    token.line,
                    format!("'{}' expression", keyword.as_str()),
                ))
            }
            TokenKind::LParen => {
                self.advance();
                self.nested(Self::paren)
            }
            TokenKind::LBracket => {
                self.advance();
                self.nested(Self::list)
            }
            TokenKind::LBrace => {
                self.advance();
                self.nested(Self::dict)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn paren(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::RParen) {
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.expr()?;
        if self.at_keyword(Keyword::For) {
            return Err(self.error("comprehensions are not supported"));
        }
        if self.eat(&TokenKind::RParen) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.at(&TokenKind::RParen) {
                break;
            }
            items.push(self.expr()?);
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::Tuple(items))
    }

    fn list(&mut self) -> Result<Expr> {
        let mut items = Vec::new();
        while !self.eat(&TokenKind::RBracket) {
            items.push(self.expr()?);
            if self.at_keyword(Keyword::For) {
                return Err(self.error("comprehensions are not supported"));
            }
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBracket)?;
                break;
            }
        }
        Ok(Expr::List(items))
    }

    fn dict(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            let key = self.expr()?;
            if !self.eat(&TokenKind::Colon) {
                return Err(self.error("sets are not supported, expected ':'"));
            }
            let value = self.expr()?;
            entries.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace)?;
                break;
            }
        }
        Ok(Expr::Dict(entries))
    }
}

const fn forbidden_statement(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::Import
            | Keyword::From
            | Keyword::Def
            | Keyword::Class
            | Keyword::While
            | Keyword::With
            | Keyword::Try
            | Keyword::Except
            | Keyword::Finally
            | Keyword::Raise
            | Keyword::Global
            | Keyword::Nonlocal
            | Keyword::Yield
            | Keyword::Del
            | Keyword::Assert
            | Keyword::Async
            | Keyword::Await
    )
}

fn assign_targets(target: &Expr, line: usize) -> Result<Vec<String>> {
    let single = |expr: &Expr| match expr {
        Expr::Name(name) => Ok(name.clone()),
        Expr::Attribute(..) => Err(ScriptError::forbidden(line, "attribute assignment")),
        Expr::Subscript(..) => Err(ScriptError::syntax(
            line,
            1,
            "item assignment is not supported",
        )),
        _ => Err(ScriptError::syntax(line, 1, "cannot assign to expression")),
    };
    match target {
        Expr::Tuple(items) if !items.is_empty() => items.iter().map(single).collect(),
        other => single(other).map(|name| vec![name]),
    }
}
