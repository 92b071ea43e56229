// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::Expr;
use crate::common::{Result, Symbol};
use crate::model_err;
use crate::system::{CompartmentalSystem, ExplicitOdeSystem};

/// A single `symbol = expression` statement.  Statements are ordered and a
/// later assignment to the same symbol redefines it.
#[derive(Clone, PartialEq, Debug)]
pub struct Assignment {
    pub symbol: Symbol,
    pub expression: Expr,
}

impl Assignment {
    pub fn new(symbol: Symbol, expression: Expr) -> Self {
        Assignment { symbol, expression }
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        self.expression.free_symbols()
    }

    /// Substitute throughout the assignment.  A mapping of the assigned
    /// symbol to a plain symbol renames the definition itself; this is how
    /// whole symbol families are shifted (`S2 = V` becoming `S1 = V`).
    pub fn subs(&self, mapping: &BTreeMap<Symbol, Expr>) -> Assignment {
        let symbol = match mapping.get(&self.symbol) {
            Some(Expr::Var(s)) => s.clone(),
            _ => self.symbol.clone(),
        };
        Assignment {
            symbol,
            expression: self.expression.subs(mapping),
        }
    }
}

/// The two representations an ODE system can take in the statement list.
#[derive(Clone, PartialEq, Debug)]
pub enum OdeSystem {
    Compartmental(CompartmentalSystem),
    Explicit(ExplicitOdeSystem),
}

impl OdeSystem {
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        match self {
            OdeSystem::Compartmental(cs) => cs.free_symbols(),
            OdeSystem::Explicit(es) => es.free_symbols(),
        }
    }

    pub fn subs(&self, mapping: &BTreeMap<Symbol, Expr>) -> OdeSystem {
        match self {
            OdeSystem::Compartmental(cs) => OdeSystem::Compartmental(cs.subs(mapping)),
            OdeSystem::Explicit(es) => OdeSystem::Explicit(es.subs(mapping)),
        }
    }

    pub fn as_compartmental(&self) -> Option<&CompartmentalSystem> {
        match self {
            OdeSystem::Compartmental(cs) => Some(cs),
            OdeSystem::Explicit(_) => None,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Statement {
    Assignment(Assignment),
    Ode(OdeSystem),
}

/// An ordered statement list with at most one ODE system entry.  All
/// operations are persistent: they return a new value and leave the
/// receiver untouched.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Statements(Vec<Statement>);

impl Statements {
    pub fn new(statements: Vec<Statement>) -> Result<Self> {
        let n_odes = statements
            .iter()
            .filter(|s| matches!(s, Statement::Ode(_)))
            .count();
        if n_odes > 1 {
            return model_err!(MultipleOdeSystems, format!("{n_odes} ODE systems"));
        }
        Ok(Statements(statements))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Assignments preceding the ODE system (all of them when there is no
    /// ODE system).
    pub fn before_odes(&self) -> Vec<&Assignment> {
        let mut out = Vec::new();
        for s in self.0.iter() {
            match s {
                Statement::Assignment(a) => out.push(a),
                Statement::Ode(_) => break,
            }
        }
        out
    }

    /// Assignments following the ODE system.
    pub fn after_odes(&self) -> Vec<&Assignment> {
        let mut seen_ode = false;
        let mut out = Vec::new();
        for s in self.0.iter() {
            match s {
                Statement::Ode(_) => seen_ode = true,
                Statement::Assignment(a) if seen_ode => out.push(a),
                Statement::Assignment(_) => (),
            }
        }
        out
    }

    pub fn ode_system(&self) -> Option<&OdeSystem> {
        self.0.iter().find_map(|s| match s {
            Statement::Ode(ode) => Some(ode),
            _ => None,
        })
    }

    /// The last assignment defining `symbol`, if any.
    pub fn find_assignment(&self, symbol: &Symbol) -> Option<&Assignment> {
        self.0.iter().rev().find_map(|s| match s {
            Statement::Assignment(a) if &a.symbol == symbol => Some(a),
            _ => None,
        })
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut symbols = BTreeSet::new();
        for s in self.0.iter() {
            match s {
                Statement::Assignment(a) => {
                    symbols.insert(a.symbol.clone());
                    symbols.extend(a.free_symbols());
                }
                Statement::Ode(ode) => symbols.extend(ode.free_symbols()),
            }
        }
        symbols
    }

    pub fn subs(&self, mapping: &BTreeMap<Symbol, Expr>) -> Statements {
        Statements(
            self.0
                .iter()
                .map(|s| match s {
                    Statement::Assignment(a) => Statement::Assignment(a.subs(mapping)),
                    Statement::Ode(ode) => Statement::Ode(ode.subs(mapping)),
                })
                .collect(),
        )
    }

    /// Expand `symbol` to its full definition by folding the assignment
    /// chain backward from its last definition.
    pub fn full_expression(&self, symbol: &Symbol) -> Option<Expr> {
        let assignments: Vec<&Assignment> = self
            .0
            .iter()
            .filter_map(|s| match s {
                Statement::Assignment(a) => Some(a),
                _ => None,
            })
            .collect();

        let i = assignments.iter().rposition(|a| &a.symbol == symbol)?;
        let mut expr = assignments[i].expression.clone();
        for a in assignments[..i].iter().rev() {
            let mapping = BTreeMap::from([(a.symbol.clone(), a.expression.clone())]);
            expr = expr.subs(&mapping);
        }
        Some(expr)
    }
}

impl From<Vec<Assignment>> for Statements {
    fn from(assignments: Vec<Assignment>) -> Self {
        Statements(assignments.into_iter().map(Statement::Assignment).collect())
    }
}

impl IntoIterator for Statements {
    type Item = Statement;
    type IntoIter = std::vec::IntoIter<Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
