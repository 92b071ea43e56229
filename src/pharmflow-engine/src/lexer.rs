// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::str::CharIndices;

use unicode_xid::UnicodeXID;

use self::Token::*;
use crate::common::ErrorCode::*;
use crate::common::{EquationError, ErrorCode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'input> {
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
    Ident(&'input str),
    Num(&'input str),
}

fn error<T>(code: ErrorCode, start: usize, end: usize) -> Result<T, EquationError> {
    Err(EquationError {
        start: start as u16,
        end: end as u16,
        code,
    })
}

pub type Spanned<T> = (usize, T, usize);

pub struct Lexer<'input> {
    text: &'input str,
    chars: CharIndices<'input>,
    lookahead: Option<(usize, char)>,
}

const KEYWORDS: &[(&str, Token<'static>)] = &[
    ("if", If),
    ("then", Then),
    ("else", Else),
    ("not", Not),
    ("and", And),
    ("or", Or),
];

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        let mut t = Lexer {
            text: input,
            chars: input.char_indices(),
            lookahead: None,
        };
        t.bump();
        t
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.lookahead = self.chars.next();
        self.lookahead
    }

    fn word(&mut self, idx0: usize) -> Spanned<&'input str> {
        match self.take_while(is_identifier_continue) {
            Some(end) => (idx0, &self.text[idx0..end], end),
            None => (idx0, &self.text[idx0..], self.text.len()),
        }
    }

    fn take_while<F>(&mut self, mut keep_going: F) -> Option<usize>
    where
        F: FnMut(char) -> bool,
    {
        self.take_until(|c| !keep_going(c))
    }

    fn take_until<F>(&mut self, mut terminate: F) -> Option<usize>
    where
        F: FnMut(char) -> bool,
    {
        loop {
            match self.lookahead {
                None => {
                    return None;
                }
                Some((idx1, c)) => {
                    if terminate(c) {
                        return Some(idx1);
                    } else {
                        self.bump();
                    }
                }
            }
        }
    }

    fn identifierish(&mut self, idx0: usize) -> Spanned<Token<'input>> {
        let (start, word, end) = self.word(idx0);
        let lower_word = word.to_lowercase();

        let tok = KEYWORDS
            .iter()
            .filter(|&&(w, _)| w == lower_word)
            .map(|(_, t)| *t)
            .next()
            .unwrap_or(Ident(word));

        (start, tok, end)
    }

    fn number(&mut self, idx0: usize) -> Spanned<Token<'input>> {
        self.take_while(|c| c.is_ascii_digit());
        if let Some((_, '.')) = self.lookahead {
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        // exponent only counts when an actual exponent follows; `2E` alone
        // must lex as a number then an identifier
        if let Some((_, c)) = self.lookahead
            && (c == 'e' || c == 'E')
        {
            let mut peek = self.chars.clone();
            let first = peek.next();
            let starts_exponent = match first {
                Some((_, d)) if d.is_ascii_digit() => true,
                Some((_, '+')) | Some((_, '-')) => {
                    matches!(peek.next(), Some((_, d)) if d.is_ascii_digit())
                }
                _ => false,
            };
            if starts_exponent {
                self.bump();
                if let Some((_, '+')) | Some((_, '-')) = self.lookahead {
                    self.bump();
                }
                self.take_while(|c| c.is_ascii_digit());
            }
        }

        let end = match self.lookahead {
            Some((idx1, _)) => idx1,
            None => self.text.len(),
        };
        (idx0, Num(&self.text[idx0..end]), end)
    }

    #[allow(clippy::unnecessary_wraps)]
    fn consume(
        &mut self,
        i: usize,
        tok: Token<'input>,
        len: usize,
    ) -> Option<Result<Spanned<Token<'input>>, EquationError>> {
        self.bump();
        Some(Ok((i, tok, i + len)))
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Result<Spanned<Token<'input>>, EquationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            return match self.lookahead {
                Some((i, '/')) => self.consume(i, Div, 1),
                Some((i, '=')) => {
                    match self.bump() {
                        Some((_, '=')) => self.consume(i, Eq, 2),
                        // already bumped, don't consume
                        _ => Some(Ok((i, Eq, i + 1))),
                    }
                }
                Some((i, '^')) => self.consume(i, Exp, 1),
                Some((i, '<')) => {
                    match self.bump() {
                        Some((_, '>')) => self.consume(i, Neq, 2),
                        Some((_, '=')) => self.consume(i, Lte, 2),
                        // already bumped, don't consume
                        _ => Some(Ok((i, Lt, i + 1))),
                    }
                }
                Some((i, '>')) => match self.bump() {
                    Some((_, '=')) => self.consume(i, Gte, 2),
                    _ => Some(Ok((i, Gt, i + 1))),
                },
                Some((i, '!')) => match self.bump() {
                    Some((_, '=')) => self.consume(i, Neq, 2),
                    _ => Some(Ok((i, Not, i + 1))),
                },
                Some((i, '&')) => match self.bump() {
                    Some((_, '&')) => self.consume(i, And, 2),
                    _ => Some(error(UnrecognizedToken, i, i + 2)),
                },
                Some((i, '|')) => match self.bump() {
                    Some((_, '|')) => self.consume(i, Or, 2),
                    _ => Some(error(UnrecognizedToken, i, i + 2)),
                },
                Some((i, '-')) => self.consume(i, Minus, 1),
                Some((i, '+')) => self.consume(i, Plus, 1),
                Some((i, '*')) => match self.bump() {
                    // NONMEM-style power operator
                    Some((_, '*')) => self.consume(i, Exp, 2),
                    _ => Some(Ok((i, Mul, i + 1))),
                },
                Some((i, '(')) => self.consume(i, LParen, 1),
                Some((i, ')')) => self.consume(i, RParen, 1),
                Some((i, ',')) => self.consume(i, Comma, 1),
                // a semicolon comments out the rest of the equation
                Some((_, ';')) => None,
                Some((i, c)) if is_identifier_start(c) => Some(Ok(self.identifierish(i))),
                Some((i, c)) if is_number_start(c) => Some(Ok(self.number(i))),
                Some((_, c)) if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                Some((i, _)) => {
                    self.bump(); // eat whatever is killing us
                    let end = match self.lookahead {
                        Some((end, _)) => end,
                        None => self.text.len(),
                    };
                    Some(error(UnrecognizedToken, i, end))
                }
                None => None,
            };
        }
    }
}

fn is_number_start(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

fn is_identifier_start(c: char) -> bool {
    UnicodeXID::is_xid_start(c) || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    UnicodeXID::is_xid_continue(c)
}
