// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::ast::Expr;
use crate::common::{Result, Symbol};
use crate::datamodel;
use crate::model_err;
use crate::params::{Parameter, Parameters};
use crate::parser::parse;
use crate::rvs::{RandomVariable, RandomVariables};
use crate::statements::{Assignment, OdeSystem, Statement, Statements};
use crate::system::CompartmentalSystemBuilder;

/// The symbolic model: the statement list plus the parameter and
/// random-variable sets and the dependent variable.  Analyses never mutate
/// a model; transformations return replacement values for the caller to
/// assign back.
#[derive(Clone, PartialEq, Debug)]
pub struct Model {
    pub name: String,
    pub statements: Statements,
    pub parameters: Parameters,
    pub random_variables: RandomVariables,
    pub dependent_variable: Symbol,
}

impl Model {
    /// Build the symbolic model from a datamodel definition, parsing every
    /// equation.  Equation errors are collected across all statements
    /// before failing, so a caller sees them all at once.
    pub fn from_datamodel(def: &datamodel::ModelDef) -> Result<Model> {
        fn parse_eqn(errors: &mut Vec<String>, owner: &str, eqn: &str) -> Option<Expr> {
            match parse(eqn) {
                Ok(Some(expr)) => Some(expr),
                Ok(None) => {
                    errors.push(format!("{owner}: empty_equation"));
                    None
                }
                Err(errs) => {
                    for err in errs {
                        errors.push(format!("{owner}: {err}"));
                    }
                    None
                }
            }
        }

        let mut errors: Vec<String> = Vec::new();

        let mut statements: Vec<Statement> = Vec::new();
        for a in def.before_odes.iter() {
            if let Some(expr) = parse_eqn(&mut errors, &a.symbol, &a.equation) {
                statements.push(Statement::Assignment(Assignment::new(
                    Symbol::new(a.symbol.as_str()),
                    expr,
                )));
            }
        }

        if let Some(odes) = &def.odes {
            let mut builder = CompartmentalSystemBuilder::new();
            for c in odes.compartments.iter() {
                let dose = match &c.dose {
                    Some(eqn) => parse_eqn(&mut errors, &c.name, eqn),
                    None => None,
                };
                builder.add_compartment(&c.name, dose);
            }
            for f in odes.flows.iter() {
                if let Some(rate) =
                    parse_eqn(&mut errors, &format!("{}->{}", f.from, f.to), &f.rate)
                {
                    builder.add_flow(&f.from, &f.to, rate);
                }
            }
            if errors.is_empty() {
                statements.push(Statement::Ode(OdeSystem::Compartmental(builder.build()?)));
            }
        }

        for a in def.after_odes.iter() {
            if let Some(expr) = parse_eqn(&mut errors, &a.symbol, &a.equation) {
                statements.push(Statement::Assignment(Assignment::new(
                    Symbol::new(a.symbol.as_str()),
                    expr,
                )));
            }
        }

        let mut rvs: Vec<RandomVariable> = Vec::new();
        for rv in def.random_variables.iter() {
            let level = match rv.level.parse() {
                Ok(level) => level,
                Err(err) => return Err(err),
            };
            if let Some(variance) = parse_eqn(&mut errors, &rv.name, &rv.variance) {
                rvs.push(RandomVariable::new(&rv.name, level, variance));
            }
        }

        if !errors.is_empty() {
            return model_err!(EquationErrors, errors.join("; "));
        }

        let parameters = Parameters::new(
            def.parameters
                .iter()
                .map(|p| Parameter {
                    name: p.name.clone(),
                    init: p.init,
                    lower: p.lower.unwrap_or(f64::NEG_INFINITY),
                    upper: p.upper.unwrap_or(f64::INFINITY),
                    fix: p.fix,
                })
                .collect(),
        )?;

        Ok(Model {
            name: def.name.clone(),
            statements: Statements::new(statements)?,
            parameters,
            random_variables: RandomVariables::new(rvs)?,
            dependent_variable: Symbol::new(def.dependent_variable.as_str()),
        })
    }
}
