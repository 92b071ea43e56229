// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Residual error-model classification: additive, proportional, combined.
//!
//! The cancellation tests (`y - eps` free of `eps`, `y / (1 + eps)` free of
//! `eps`) are decided by deterministic numeric probing: the candidate
//! expression is evaluated under a fixed-seed set of random assignments
//! with only the epsilons varied.  Detection is exact for the error-model
//! shapes recognized here.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analysis_err;
use crate::ast::{BinaryOp, Expr};
use crate::common::{Result, Symbol};
use crate::model::Model;
use crate::statements::Statements;

const PROBE_SEED: u64 = 0x7061726d;
const PROBE_ENVS: usize = 4;
const PROBE_DRAWS: usize = 3;
const PROBE_TOL: f64 = 1e-9;

/// Whether the model's residual error is purely additive,
/// `y = f + eps`.
pub fn has_additive_error(model: &Model) -> Result<bool> {
    let (expr, eps) = observation_and_epsilons(model)?;
    let Some(eps) = single_epsilon(eps)? else {
        return Ok(false);
    };

    // y - eps must not depend on eps
    let candidate = Expr::Op2(
        BinaryOp::Sub,
        Box::new(expr),
        Box::new(Expr::Var(eps.clone())),
    );
    independent_of(&candidate, &[eps])
}

/// Whether the model's residual error is purely proportional,
/// `y = f * (1 + eps)`.
pub fn has_proportional_error(model: &Model) -> Result<bool> {
    let (expr, eps) = observation_and_epsilons(model)?;
    let Some(eps) = single_epsilon(eps)? else {
        return Ok(false);
    };

    // y / (1 + eps) must not depend on eps
    let candidate = Expr::Op2(
        BinaryOp::Div,
        Box::new(expr),
        Box::new(Expr::Op2(
            BinaryOp::Add,
            Box::new(Expr::num(1.0)),
            Box::new(Expr::Var(eps.clone())),
        )),
    );
    independent_of(&candidate, &[eps])
}

/// Whether the model's residual error is combined,
/// `y = f * (1 + eps_prop) + eps_add`.
pub fn has_combined_error(model: &Model) -> Result<bool> {
    let (expr, eps) = observation_and_epsilons(model)?;
    if eps.len() != 2 {
        return Ok(false);
    }
    let eps1 = eps[0].clone();
    let eps2 = eps[1].clone();

    let cancellation = |add: &Symbol, prop: &Symbol| {
        Expr::Op2(
            BinaryOp::Div,
            Box::new(Expr::Op2(
                BinaryOp::Sub,
                Box::new(expr.clone()),
                Box::new(Expr::Var(add.clone())),
            )),
            Box::new(Expr::Op2(
                BinaryOp::Add,
                Box::new(Expr::Var(prop.clone())),
                Box::new(Expr::num(1.0)),
            )),
        )
    };

    // either assignment of the two epsilons to the additive/proportional
    // roles may cancel
    let canc1 = cancellation(&eps1, &eps2);
    let canc2 = cancellation(&eps2, &eps1);
    Ok(independent_of(&canc1, &[eps1.clone(), eps2.clone()])?
        || independent_of(&canc2, &[eps1, eps2])?)
}

/// The observation expression folded over the post-ODE statements, plus
/// the epsilons appearing in it.
fn observation_and_epsilons(model: &Model) -> Result<(Expr, Vec<Symbol>)> {
    let dv = &model.dependent_variable;
    // without an ODE system every statement belongs to the fold domain
    let assignments = if model.statements.ode_system().is_some() {
        model.statements.after_odes()
    } else {
        model.statements.before_odes()
    };
    let after: Statements =
        Statements::from(assignments.into_iter().cloned().collect::<Vec<_>>());
    let Some(expr) = after.full_expression(dv) else {
        return analysis_err!(UnknownSymbol, dv.as_str().to_owned());
    };

    let fs = expr.free_symbols();
    let eps: Vec<Symbol> = model
        .random_variables
        .epsilons()
        .into_iter()
        .map(|rv| rv.symbol())
        .filter(|s| fs.contains(s))
        .collect();

    Ok((expr, eps))
}

/// Exactly one epsilon qualifies; none means the detector cannot match,
/// more than one is an ambiguous request rather than a guess.
fn single_epsilon(eps: Vec<Symbol>) -> Result<Option<Symbol>> {
    match eps.len() {
        0 => Ok(None),
        1 => Ok(Some(eps.into_iter().next().unwrap())),
        n => analysis_err!(AmbiguousErrorModel, format!("{n} epsilons in observation")),
    }
}

/// Probe whether `expr` is numerically independent of the `vary` symbols.
fn independent_of(expr: &Expr, vary: &[Symbol]) -> Result<bool> {
    let mut rng = StdRng::seed_from_u64(PROBE_SEED);
    let fs = expr.free_symbols();

    for _ in 0..PROBE_ENVS {
        let mut env: BTreeMap<Symbol, f64> = fs
            .iter()
            .map(|s| (s.clone(), rng.random_range(0.25..2.0)))
            .collect();

        let mut reference: Option<f64> = None;
        for _ in 0..PROBE_DRAWS {
            for s in vary.iter() {
                env.insert(s.clone(), rng.random_range(0.25..2.0));
            }
            let value = expr.eval(&env)?;
            if !value.is_finite() {
                return Ok(false);
            }
            match reference {
                None => reference = Some(value),
                Some(reference) => {
                    let scale = 1.0_f64.max(reference.abs()).max(value.abs());
                    if (value - reference).abs() > PROBE_TOL * scale {
                        return Ok(false);
                    }
                }
            }
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::model::Model;
    use crate::testutils::pheno_def;

    fn model_with_error(y: &str, epsilons: &[&str]) -> Model {
        let mut def = pheno_def();
        def.after_odes = vec![
            crate::datamodel::AssignmentDef::new("F", "A_CENTRAL/S1"),
            crate::datamodel::AssignmentDef::new("Y", y),
        ];
        def.random_variables
            .retain(|rv| !rv.name.starts_with("EPS"));
        for (i, eps) in epsilons.iter().enumerate() {
            def.random_variables
                .push(crate::datamodel::RandomVariableDef::new(
                    eps,
                    "ruv",
                    &format!("SIGMA({n},{n})", n = i + 1),
                ));
        }
        Model::from_datamodel(&def).unwrap()
    }

    #[test]
    fn test_additive() {
        let model = model_with_error("F+EPS(1)", &["EPS(1)"]);
        assert!(has_additive_error(&model).unwrap());
        assert!(!has_proportional_error(&model).unwrap());
        assert!(!has_combined_error(&model).unwrap());
    }

    #[test]
    fn test_proportional() {
        let model = model_with_error("F+F*EPS(1)", &["EPS(1)"]);
        assert!(!has_additive_error(&model).unwrap());
        assert!(has_proportional_error(&model).unwrap());

        let model = model_with_error("F*(1+EPS(1))", &["EPS(1)"]);
        assert!(has_proportional_error(&model).unwrap());
    }

    #[test]
    fn test_combined() {
        let model = model_with_error("F*(1+EPS(1))+EPS(2)", &["EPS(1)", "EPS(2)"]);
        assert!(has_combined_error(&model).unwrap());
        // the symmetric role assignment is accepted too
        let model = model_with_error("F*(1+EPS(2))+EPS(1)", &["EPS(1)", "EPS(2)"]);
        assert!(has_combined_error(&model).unwrap());

        let model = model_with_error("F+F*EPS(1)+EPS(1)*EPS(2)", &["EPS(1)", "EPS(2)"]);
        assert!(!has_combined_error(&model).unwrap());
    }

    #[test]
    fn test_ambiguous_rejection() {
        let model = model_with_error("F+EPS(1)+EPS(2)", &["EPS(1)", "EPS(2)"]);
        let err = has_additive_error(&model).unwrap_err();
        assert_eq!(ErrorCode::AmbiguousErrorModel, err.code);
        let err = has_proportional_error(&model).unwrap_err();
        assert_eq!(ErrorCode::AmbiguousErrorModel, err.code);
        // the combined detector wants exactly two and simply rejects others
        let model = model_with_error("F+EPS(1)", &["EPS(1)"]);
        assert!(!has_combined_error(&model).unwrap());
    }
}
