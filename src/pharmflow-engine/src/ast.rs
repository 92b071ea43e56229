// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeMap, BTreeSet};

use crate::common::{Error, ErrorCode, ErrorKind, Result, Symbol};

// expressions are compared structurally all over the analysis layer, so
// they carry no source locations; spans live in lexer/parser errors only
#[derive(PartialEq, Clone, Debug)]
pub enum Expr {
    Const(String, f64),
    Var(Symbol),
    App(String, Vec<Expr>),
    Op1(UnaryOp, Box<Expr>),
    Op2(BinaryOp, Box<Expr>, Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Exp,
    Mul,
    Div,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
    And,
    Or,
}

impl BinaryOp {
    // higher the precedence, the tighter the binding.
    // e.g. Mul.precedence() > Add.precedence()
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Add => 4,
            BinaryOp::Sub => 4,
            BinaryOp::Exp => 6,
            BinaryOp::Mul => 5,
            BinaryOp::Div => 5,
            BinaryOp::Gt => 3,
            BinaryOp::Lt => 3,
            BinaryOp::Gte => 3,
            BinaryOp::Lte => 3,
            BinaryOp::Eq => 2,
            BinaryOp::Neq => 2,
            BinaryOp::And => 1,
            BinaryOp::Or => 1,
        }
    }
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum UnaryOp {
    Positive,
    Negative,
    Not,
}

impl Expr {
    pub fn var(name: &str) -> Expr {
        Expr::Var(Symbol::new(name))
    }

    pub fn num(n: f64) -> Expr {
        Expr::Const(format!("{n}"), n)
    }

    /// The symbol this expression is a bare reference to, if it is one.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Expr::Var(s) => Some(s),
            _ => None,
        }
    }

    /// If the expression is exactly `a/b` for two symbols, the pair
    /// `(numerator, denominator)`.
    pub fn as_symbol_ratio(&self) -> Option<(&Symbol, &Symbol)> {
        match self {
            Expr::Op2(BinaryOp::Div, l, r) => match (l.as_ref(), r.as_ref()) {
                (Expr::Var(a), Expr::Var(b)) => Some((a, b)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut symbols = BTreeSet::new();
        self.collect_symbols(&mut symbols);
        symbols
    }

    fn collect_symbols(&self, symbols: &mut BTreeSet<Symbol>) {
        match self {
            Expr::Const(_, _) => (),
            Expr::Var(s) => {
                symbols.insert(s.clone());
            }
            Expr::App(_, args) => {
                for arg in args.iter() {
                    arg.collect_symbols(symbols);
                }
            }
            Expr::Op1(_, l) => l.collect_symbols(symbols),
            Expr::Op2(_, l, r) => {
                l.collect_symbols(symbols);
                r.collect_symbols(symbols);
            }
            Expr::If(cond, t, f) => {
                cond.collect_symbols(symbols);
                t.collect_symbols(symbols);
                f.collect_symbols(symbols);
            }
        }
    }

    /// Simultaneous substitution: every variable is looked up against the
    /// original mapping in a single pass, so substituted expressions are
    /// never themselves rewritten.
    pub fn subs(&self, mapping: &BTreeMap<Symbol, Expr>) -> Expr {
        match self {
            Expr::Const(s, n) => Expr::Const(s.clone(), *n),
            Expr::Var(v) => match mapping.get(v) {
                Some(replacement) => replacement.clone(),
                None => Expr::Var(v.clone()),
            },
            Expr::App(func, args) => Expr::App(
                func.clone(),
                args.iter().map(|arg| arg.subs(mapping)).collect(),
            ),
            Expr::Op1(op, l) => Expr::Op1(*op, Box::new(l.subs(mapping))),
            Expr::Op2(op, l, r) => {
                Expr::Op2(*op, Box::new(l.subs(mapping)), Box::new(r.subs(mapping)))
            }
            Expr::If(cond, t, f) => Expr::If(
                Box::new(cond.subs(mapping)),
                Box::new(t.subs(mapping)),
                Box::new(f.subs(mapping)),
            ),
        }
    }

    /// Evaluate with concrete values for every free symbol.  Comparison
    /// and logical operators produce 0.0/1.0.
    pub fn eval(&self, env: &BTreeMap<Symbol, f64>) -> Result<f64> {
        match self {
            Expr::Const(_, n) => Ok(*n),
            Expr::Var(s) => env.get(s).copied().ok_or_else(|| {
                Error::new(
                    ErrorKind::Analysis,
                    ErrorCode::UnknownSymbol,
                    Some(s.as_str().to_owned()),
                )
            }),
            Expr::App(func, args) => {
                let args: Result<Vec<f64>> = args.iter().map(|a| a.eval(env)).collect();
                let args = args?;
                apply_fn(func, &args)
            }
            Expr::Op1(op, l) => {
                let l = l.eval(env)?;
                Ok(match op {
                    UnaryOp::Positive => l,
                    UnaryOp::Negative => -l,
                    UnaryOp::Not => bool_val(l == 0.0),
                })
            }
            Expr::Op2(op, l, r) => {
                let l = l.eval(env)?;
                let r = r.eval(env)?;
                Ok(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Exp => l.powf(r),
                    BinaryOp::Gt => bool_val(l > r),
                    BinaryOp::Lt => bool_val(l < r),
                    BinaryOp::Gte => bool_val(l >= r),
                    BinaryOp::Lte => bool_val(l <= r),
                    BinaryOp::Eq => bool_val(l == r),
                    BinaryOp::Neq => bool_val(l != r),
                    BinaryOp::And => bool_val(l != 0.0 && r != 0.0),
                    BinaryOp::Or => bool_val(l != 0.0 || r != 0.0),
                })
            }
            Expr::If(cond, t, f) => {
                if cond.eval(env)? != 0.0 {
                    t.eval(env)
                } else {
                    f.eval(env)
                }
            }
        }
    }
}

fn bool_val(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn apply_fn(func: &str, args: &[f64]) -> Result<f64> {
    let bad_args = || {
        Error::new(
            ErrorKind::Analysis,
            ErrorCode::NonNumericValue,
            Some(func.to_owned()),
        )
    };
    let unary = |f: fn(f64) -> f64| -> Result<f64> {
        if args.len() == 1 {
            Ok(f(args[0]))
        } else {
            Err(bad_args())
        }
    };
    match func.to_lowercase().as_str() {
        "exp" => unary(f64::exp),
        "log" | "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "int" => unary(f64::trunc),
        "min" => args
            .iter()
            .copied()
            .reduce(f64::min)
            .ok_or_else(bad_args),
        "max" => args
            .iter()
            .copied()
            .reduce(f64::max)
            .ok_or_else(bad_args),
        _ => Err(Error::new(
            ErrorKind::Analysis,
            ErrorCode::UnknownSymbol,
            Some(format!("function {func}")),
        )),
    }
}

pub trait Visitor<T> {
    fn walk(&mut self, e: &Expr) -> T;
}

fn child_needs_parens(parent: &Expr, child: &Expr) -> bool {
    match parent {
        // no children so doesn't matter
        Expr::Const(_, _) | Expr::Var(_) => false,
        // children are comma separated, so no ambiguity possible
        Expr::App(_, _) => false,
        Expr::Op1(_, _) => matches!(child, Expr::Op2(_, _, _)),
        Expr::Op2(parent_op, _, _) => match child {
            Expr::Const(_, _)
            | Expr::Var(_)
            | Expr::App(_, _)
            | Expr::If(_, _, _)
            | Expr::Op1(_, _) => false,
            Expr::Op2(child_op, _, _) => parent_op.precedence() > child_op.precedence(),
        },
        Expr::If(_, _, _) => false,
    }
}

fn paren_if_necessary(parent: &Expr, child: &Expr, eqn: String) -> String {
    if child_needs_parens(parent, child) {
        format!("({eqn})")
    } else {
        eqn
    }
}

struct PrintVisitor {}

impl Visitor<String> for PrintVisitor {
    fn walk(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Const(s, _) => s.clone(),
            Expr::Var(id) => id.as_str().to_owned(),
            Expr::App(func, args) => {
                let args: Vec<String> = args.iter().map(|e| self.walk(e)).collect();
                format!("{}({})", func, args.join(", "))
            }
            Expr::Op1(op, l) => {
                let l = paren_if_necessary(expr, l, self.walk(l));
                let op: &str = match op {
                    UnaryOp::Positive => "+",
                    UnaryOp::Negative => "-",
                    UnaryOp::Not => "!",
                };
                format!("{op}{l}")
            }
            Expr::Op2(op, l, r) => {
                let l = paren_if_necessary(expr, l, self.walk(l));
                let r = paren_if_necessary(expr, r, self.walk(r));
                let op: &str = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Exp => "**",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Gt => ">",
                    BinaryOp::Lt => "<",
                    BinaryOp::Gte => ">=",
                    BinaryOp::Lte => "<=",
                    BinaryOp::Eq => "==",
                    BinaryOp::Neq => "!=",
                    BinaryOp::And => "&&",
                    BinaryOp::Or => "||",
                };
                format!("{l}{op}{r}")
            }
            Expr::If(cond, t, f) => {
                let cond = self.walk(cond);
                let t = self.walk(t);
                let f = self.walk(f);
                format!("if ({cond}) then ({t}) else ({f})")
            }
        }
    }
}

pub fn print_eqn(expr: &Expr) -> String {
    let mut visitor = PrintVisitor {};
    visitor.walk(expr)
}
