// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for model equations.
//!
//! Produces the structural `Expr` tree used by the analysis layer.  The
//! grammar is the usual infix expression language with `**`/`^` for powers
//! and if-then-else; indexed population-parameter references written as
//! calls (`THETA(1)`, `ETA(2)`, `EPS(1)`) are collapsed into plain symbols
//! so that the analysis layer sees them the way the model text names them.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::common::{EquationError, ErrorCode, Symbol};
use crate::lexer::{Lexer, Spanned, Token};


// symbol families referenced by index rather than by plain name
const INDEXED_FAMILIES: &[&str] = &["THETA", "ETA", "EPS", "ERR"];
// variance-matrix families referenced by a pair of indices
const MATRIX_FAMILIES: &[&str] = &["OMEGA", "SIGMA"];

/// TokenKind discriminant for efficient peek comparisons without payload
/// matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    If,
    Then,
    Else,
    Eq,
    Neq,
    Not,
    Exp,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    LParen,
    RParen,
    Comma,
    Ident,
    Num,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::If => TokenKind::If,
            Token::Then => TokenKind::Then,
            Token::Else => TokenKind::Else,
            Token::Eq => TokenKind::Eq,
            Token::Neq => TokenKind::Neq,
            Token::Not => TokenKind::Not,
            Token::Exp => TokenKind::Exp,
            Token::Lt => TokenKind::Lt,
            Token::Lte => TokenKind::Lte,
            Token::Gt => TokenKind::Gt,
            Token::Gte => TokenKind::Gte,
            Token::And => TokenKind::And,
            Token::Or => TokenKind::Or,
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Div => TokenKind::Div,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::Comma => TokenKind::Comma,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
        }
    }
}

struct Parser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    fn new(lexer: Lexer<'input>) -> Result<Self, EquationError> {
        let mut tokens = Vec::new();
        for result in lexer {
            match result {
                Ok(tok) => tokens.push(tok),
                Err(e) => return Err(e),
            }
        }
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(tok))
    }

    fn advance(&mut self) -> Option<&Spanned<Token<'input>>> {
        if self.pos < self.tokens.len() {
            let tok = &self.tokens[self.pos];
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<&Spanned<Token<'input>>, EquationError> {
        if self.peek_kind() == Some(expected) {
            Ok(self.advance().unwrap())
        } else if let Some((start, _, end)) = self.peek() {
            Err(EquationError {
                start: *start as u16,
                end: *end as u16,
                code: ErrorCode::UnrecognizedToken,
            })
        } else {
            let pos = self.eof_position();
            Err(EquationError {
                start: pos as u16,
                end: (pos + 1) as u16,
                code: ErrorCode::UnrecognizedEof,
            })
        }
    }

    fn eof_position(&self) -> usize {
        if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Parse an equation from the token stream.
    /// Returns Ok(None) for empty or comment-only input.
    fn parse_equation(&mut self) -> Result<Option<Expr>, EquationError> {
        if self.is_at_end() {
            return Ok(None);
        }

        let expr = self.parse_expr()?;

        if let Some((start, _, end)) = self.peek() {
            return Err(EquationError {
                start: *start as u16,
                end: *end as u16,
                code: ErrorCode::ExtraToken,
            });
        }

        Ok(Some(expr))
    }

    fn parse_expr(&mut self) -> Result<Expr, EquationError> {
        if self.peek_kind() == Some(TokenKind::If) {
            self.parse_if()
        } else {
            self.parse_logical()
        }
    }

    fn parse_if(&mut self) -> Result<Expr, EquationError> {
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Then)?;
        let then_expr = self.parse_expr()?;
        self.expect(TokenKind::Else)?;
        let else_expr = self.parse_expr()?;
        Ok(Expr::If(
            Box::new(cond),
            Box::new(then_expr),
            Box::new(else_expr),
        ))
    }

    fn parse_logical(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_equality()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::And) => BinaryOp::And,
                Some(TokenKind::Or) => BinaryOp::Or,
                _ => break,
            };
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::Op2(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_comparison()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Eq) => BinaryOp::Eq,
                Some(TokenKind::Neq) => BinaryOp::Neq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Op2(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Lte) => BinaryOp::Lte,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Gte) => BinaryOp::Gte,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Op2(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Op2(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Mul) => BinaryOp::Mul,
                Some(TokenKind::Div) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Op2(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EquationError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => UnaryOp::Positive,
            Some(TokenKind::Minus) => UnaryOp::Negative,
            Some(TokenKind::Not) => UnaryOp::Not,
            _ => return self.parse_exponentiation(),
        };
        self.advance();
        let operand = self.parse_exponentiation()?;
        Ok(Expr::Op1(op, Box::new(operand)))
    }

    /// Parse exponentiation (`**` or `^`) - left associative
    fn parse_exponentiation(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_app()?;

        while self.peek_kind() == Some(TokenKind::Exp) {
            self.advance();
            let right = self.parse_app()?;
            left = Expr::Op2(BinaryOp::Exp, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// Parse function application: id(args).  An application of an indexed
    /// symbol family to a single integer literal is an indexed symbol
    /// reference, not a call.
    fn parse_app(&mut self) -> Result<Expr, EquationError> {
        if self.peek_kind() == Some(TokenKind::Ident)
            && self.pos + 1 < self.tokens.len()
            && TokenKind::from(&self.tokens[self.pos + 1].1) == TokenKind::LParen
        {
            let (_, tok, _) = *self.advance().unwrap();
            let name = if let Token::Ident(s) = tok {
                s.to_owned()
            } else {
                unreachable!()
            };

            self.advance(); // consume '('
            let args = self.parse_comma_separated_exprs()?;
            self.expect(TokenKind::RParen)?;

            if let Some(symbol) = indexed_symbol(&name, &args) {
                return Ok(Expr::Var(Symbol::new(symbol)));
            }

            return Ok(Expr::App(name, args));
        }

        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, EquationError> {
        match self.peek_kind() {
            Some(TokenKind::Num) => {
                let (lpos, tok, rpos) = *self.advance().unwrap();
                if let Token::Num(s) = tok {
                    match s.parse::<f64>() {
                        Ok(n) => Ok(Expr::Const(s.to_string(), n)),
                        Err(_) => Err(EquationError {
                            start: lpos as u16,
                            end: rpos as u16,
                            code: ErrorCode::ExpectedNumber,
                        }),
                    }
                } else {
                    unreachable!()
                }
            }
            Some(TokenKind::Ident) => {
                let (_, tok, _) = *self.advance().unwrap();
                if let Token::Ident(s) = tok {
                    Ok(Expr::Var(Symbol::new(s)))
                } else {
                    unreachable!()
                }
            }
            Some(TokenKind::LParen) => {
                self.advance(); // consume '('
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            Some(_) => {
                let (start, _, end) = self.peek().unwrap();
                Err(EquationError {
                    start: *start as u16,
                    end: *end as u16,
                    code: ErrorCode::UnrecognizedToken,
                })
            }
            None => {
                let pos = self.eof_position();
                Err(EquationError {
                    start: pos as u16,
                    end: (pos + 1) as u16,
                    code: ErrorCode::UnrecognizedEof,
                })
            }
        }
    }

    fn parse_comma_separated_exprs(&mut self) -> Result<Vec<Expr>, EquationError> {
        let mut exprs = Vec::new();

        if self.peek_kind() == Some(TokenKind::RParen) {
            return Ok(exprs);
        }

        exprs.push(self.parse_expr()?);

        while self.peek_kind() == Some(TokenKind::Comma) {
            self.advance(); // consume ','

            if self.peek_kind() == Some(TokenKind::RParen) {
                break;
            }

            exprs.push(self.parse_expr()?);
        }

        Ok(exprs)
    }
}

fn indexed_symbol(name: &str, args: &[Expr]) -> Option<String> {
    fn as_index(e: &Expr) -> Option<u32> {
        match e {
            Expr::Const(_, n) if n.fract() == 0.0 && *n >= 1.0 => Some(*n as u32),
            _ => None,
        }
    }

    let family = name.to_uppercase();
    if INDEXED_FAMILIES.contains(&family.as_str())
        && let [arg] = args
        && let Some(i) = as_index(arg)
    {
        return Some(format!("{family}({i})"));
    }
    if MATRIX_FAMILIES.contains(&family.as_str())
        && let [row, col] = args
        && let Some(i) = as_index(row)
        && let Some(j) = as_index(col)
    {
        return Some(format!("{family}({i},{j})"));
    }
    None
}

/// Parse an equation string into an expression tree.
///
/// Returns:
/// - `Ok(Some(expr))` for valid equations
/// - `Ok(None)` for empty or comment-only input
/// - `Err(errors)` for lex or parse errors
pub fn parse(input: &str) -> Result<Option<Expr>, Vec<EquationError>> {
    let lexer = Lexer::new(input);
    let mut parser = match Parser::new(lexer) {
        Ok(p) => p,
        Err(e) => return Err(vec![e]),
    };

    parser.parse_equation().map_err(|e| vec![e])
}
