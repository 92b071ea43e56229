// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Whole-model expression utilities: observation and prediction
//! expressions, fresh symbol creation, and statement canonicalization.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis_err;
use crate::ast::Expr;
use crate::common::{Result, Symbol};
use crate::model::Model;
use crate::statements::{Assignment, Statement, Statements};

/// The full symbolic observation expression: the dependent variable's
/// definition with every preceding assignment folded in.
pub fn get_observation_expression(model: &Model) -> Result<Expr> {
    match model.statements.full_expression(&model.dependent_variable) {
        Some(expr) => Ok(expr),
        None => analysis_err!(
            UnknownSymbol,
            model.dependent_variable.as_str().to_owned()
        ),
    }
}

/// The observation expression with all residual random effects set to
/// zero.
pub fn get_individual_prediction_expression(model: &Model) -> Result<Expr> {
    let expr = get_observation_expression(model)?;
    let mapping: BTreeMap<Symbol, Expr> = model
        .random_variables
        .epsilons()
        .into_iter()
        .map(|rv| (rv.symbol(), Expr::num(0.0)))
        .collect();
    Ok(expr.subs(&mapping))
}

/// The observation expression with all random effects set to zero.
pub fn get_population_prediction_expression(model: &Model) -> Result<Expr> {
    let expr = get_individual_prediction_expression(model)?;
    let mapping: BTreeMap<Symbol, Expr> = model
        .random_variables
        .etas()
        .into_iter()
        .map(|rv| (rv.symbol(), Expr::num(0.0)))
        .collect();
    Ok(expr.subs(&mapping))
}

/// A fresh symbol based on `stem` that collides with nothing in the model.
/// With `force_numbering` a numeric suffix is appended even when the stem
/// itself is free.
pub fn create_symbol(model: &Model, stem: &str, force_numbering: bool) -> Symbol {
    let mut taken: BTreeSet<String> = model
        .statements
        .free_symbols()
        .into_iter()
        .map(|s| s.as_str().to_owned())
        .collect();
    taken.extend(model.parameters.names());
    taken.extend(model.random_variables.names());
    taken.insert(model.dependent_variable.as_str().to_owned());

    if !taken.contains(stem) && !force_numbering {
        return Symbol::new(stem);
    }

    let mut i = 1u32;
    loop {
        let candidate = format!("{stem}{i}");
        if !taken.contains(&candidate) {
            return Symbol::new(candidate);
        }
        i += 1;
    }
}

/// Fold redefinitions so every symbol is assigned exactly once.  The
/// surviving definition sits where the last redefinition was, with all
/// earlier definitions substituted in.
pub fn make_declarative(statements: &Statements) -> Statements {
    let mut assigned: BTreeSet<Symbol> = BTreeSet::new();
    // symbol -> remaining redefinition indices, oldest first
    let mut redefinitions: BTreeMap<Symbol, Vec<usize>> = BTreeMap::new();
    for (i, s) in statements.iter().enumerate() {
        let Statement::Assignment(a) = s else {
            continue;
        };
        if assigned.contains(&a.symbol) {
            redefinitions.entry(a.symbol.clone()).or_default().push(i);
        } else {
            assigned.insert(a.symbol.clone());
        }
    }

    let mut current: BTreeMap<Symbol, Expr> = BTreeMap::new();
    let mut new_statements: Vec<Statement> = Vec::new();
    for (i, s) in statements.iter().enumerate() {
        let a = match s {
            Statement::Ode(ode) => {
                new_statements.push(Statement::Ode(ode.subs(&current)));
                continue;
            }
            Statement::Assignment(a) => a,
        };

        match redefinitions.get_mut(&a.symbol) {
            Some(indices) => {
                if !indices.contains(&i) {
                    // the first definition; folded forward, not emitted
                    current.insert(a.symbol.clone(), a.expression.clone());
                } else {
                    indices.retain(|idx| *idx != i);
                    if indices.is_empty() {
                        let folded = a.expression.subs(&current);
                        current.remove(&a.symbol);
                        new_statements.push(Statement::Assignment(Assignment::new(
                            a.symbol.clone(),
                            folded,
                        )));
                    } else {
                        current.insert(a.symbol.clone(), a.expression.subs(&current));
                    }
                }
            }
            None => {
                new_statements.push(Statement::Assignment(Assignment::new(
                    a.symbol.clone(),
                    a.expression.subs(&current),
                )));
            }
        }
    }

    Statements::new(new_statements).expect("statement count is unchanged")
}

/// Canonicalize a model's statements: one assignment per symbol, with
/// pure-symbol aliases (`W = F`) inlined away.
pub fn cleanup_model(model: &Model) -> Model {
    let statements = make_declarative(&model.statements);

    let mut current: BTreeMap<Symbol, Expr> = BTreeMap::new();
    let mut new_statements: Vec<Statement> = Vec::new();
    for s in statements.iter() {
        match s {
            Statement::Assignment(a) if a.expression.as_symbol().is_some() => {
                current.insert(a.symbol.clone(), a.expression.clone());
            }
            Statement::Assignment(a) => {
                new_statements.push(Statement::Assignment(a.subs(&current)));
            }
            Statement::Ode(ode) => {
                new_statements.push(Statement::Ode(ode.subs(&current)));
            }
        }
    }

    let mut model = model.clone();
    model.statements =
        Statements::new(new_statements).expect("statement count can only shrink");
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::sym;
    use crate::model::Model;
    use crate::parser::parse;
    use crate::testutils::pheno_def;

    fn pheno() -> Model {
        Model::from_datamodel(&pheno_def()).unwrap()
    }

    #[test]
    fn test_observation_expression() {
        let model = pheno();
        let y = get_observation_expression(&model).unwrap();

        let fs = y.free_symbols();
        // fully folded: only data columns, population parameters and
        // random effects remain
        assert!(fs.contains(&sym("A_CENTRAL")));
        assert!(fs.contains(&sym("EPS(1)")));
        assert!(fs.contains(&sym("THETA(2)")));
        assert!(fs.contains(&sym("ETA(2)")));
        assert!(!fs.contains(&sym("F")));
        assert!(!fs.contains(&sym("S1")));
    }

    #[test]
    fn test_prediction_expressions() {
        let model = pheno();

        let ind = get_individual_prediction_expression(&model).unwrap();
        assert!(!ind.free_symbols().contains(&sym("EPS(1)")));
        assert!(ind.free_symbols().contains(&sym("ETA(2)")));

        let pop = get_population_prediction_expression(&model).unwrap();
        assert!(!pop.free_symbols().contains(&sym("EPS(1)")));
        assert!(!pop.free_symbols().contains(&sym("ETA(2)")));
    }

    #[test]
    fn test_create_symbol() {
        let model = pheno();

        assert_eq!(sym("TEMP"), create_symbol(&model, "TEMP", false));
        assert_eq!(sym("TEMP1"), create_symbol(&model, "TEMP", true));
        // CL exists, so numbering kicks in
        assert_eq!(sym("CL1"), create_symbol(&model, "CL", false));
        // the dependent variable is taken too
        assert_eq!(sym("Y1"), create_symbol(&model, "Y", false));
    }

    #[test]
    fn test_make_declarative() {
        let stmts = Statements::from(vec![
            Assignment::new(sym("TVV"), parse("THETA(2)*WGT").unwrap().unwrap()),
            Assignment::new(
                sym("TVV"),
                parse("if APGR<5 then TVV*(THETA(3)+1) else TVV")
                    .unwrap()
                    .unwrap(),
            ),
            Assignment::new(sym("V"), parse("TVV*EXP(ETA(2))").unwrap().unwrap()),
        ]);

        let declarative = make_declarative(&stmts);
        assert_eq!(2, declarative.len());

        let tvv = declarative.find_assignment(&sym("TVV")).unwrap();
        // the first definition was folded into the survivor
        assert!(tvv.free_symbols().contains(&sym("THETA(2)")));
        assert!(tvv.free_symbols().contains(&sym("WGT")));
        assert!(!tvv.free_symbols().contains(&sym("TVV")));
    }

    #[test]
    fn test_cleanup_inlines_aliases() {
        let model = pheno();
        let cleaned = cleanup_model(&model);

        // S1 = V is gone and F now divides by V directly
        assert!(cleaned.statements.find_assignment(&sym("S1")).is_none());
        let f = cleaned.statements.find_assignment(&sym("F")).unwrap();
        assert!(f.free_symbols().contains(&sym("V")));
        assert!(!f.free_symbols().contains(&sym("S1")));
    }
}
