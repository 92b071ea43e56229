// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Diff-driven synchronization of the positional record layer with the
//! symbolic model.
//!
//! Every function here is persistent over the control stream: a staged
//! copy is edited and returned, the input is never touched.  Removal and
//! renumbering are computed as a complete plan before any record value is
//! produced, so a failing step can never leave a half-rewritten stream.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;

use crate::ast::Expr;
use crate::common::{Result, Symbol, sym};
use crate::params::{Parameter, Parameters};
use crate::records::{
    ControlStream, Record, RecordKind, is_placeholder_name,
};
use crate::rvs::{RandomVariables, VariabilityLevel};
use crate::statements::{Assignment, OdeSystem, Statements};
use crate::sync_err;

lazy_static! {
    /// Solver downgrades for removing the depot compartment: the
    /// one-tier-simpler option and the rate-constant renames it implies.
    static ref ADVAN_DOWNGRADES: BTreeMap<&'static str, (&'static str, &'static [(&'static str, &'static str)])> = {
        let mut m: BTreeMap<&'static str, (&'static str, &'static [(&'static str, &'static str)])> =
            BTreeMap::new();
        m.insert("ADVAN2", ("ADVAN1", &[] as &[(&str, &str)]));
        m.insert(
            "ADVAN4",
            ("ADVAN3", &[("K23", "K12"), ("K32", "K21")]),
        );
        m.insert(
            "ADVAN12",
            (
                "ADVAN11",
                &[("K23", "K12"), ("K32", "K21"), ("K24", "K13"), ("K42", "K31")],
            ),
        );
        m
    };
}

/// Secondary PK symbol families indexed by compartment number.
const SECONDARY_FAMILIES: &[&str] = &["S", "F", "R", "D", "ALAG"];

#[derive(Clone, PartialEq, Debug)]
enum RecordAction {
    Delete,
    Strip { names: BTreeSet<String>, start: u32 },
    Renumber { start: u32 },
}

/// Synchronize the `$THETA` records with a parameter-set diff.
///
/// Returns the new control stream together with the parameter set as the
/// caller should now see it: parameters named after a positional
/// placeholder follow the placeholder when renumbering shifts it, and a
/// freshly inserted placeholder-named parameter is renamed to the next
/// sequential placeholder.
pub fn update_parameters(
    stream: &ControlStream,
    old: &Parameters,
    new: &Parameters,
    rvs: &RandomVariables,
) -> Result<(ControlStream, Parameters)> {
    let mut staged = stream.clone();
    let mut new_params = new.clone();

    let old_names = old.names();
    let new_names = new.names();

    let removed: BTreeSet<String> = old_names.difference(&new_names).cloned().collect();
    if !removed.is_empty() {
        let renames = apply_removal_plan(&mut staged, RecordKind::Theta, &removed);
        for (from, to) in renames {
            new_params = new_params.renamed(&from, &to);
        }
    }

    let rv_params = rvs.parameter_names();
    for p in new.iter() {
        if old.contains(&p.name) || rv_params.contains(&p.name) {
            continue;
        }
        // a fresh structural parameter gets its own record at the end of
        // the theta block
        let next = next_param_index(&staged, RecordKind::Theta);
        let text = theta_record_text(p);
        let record = staged.insert_record(&text, RecordKind::Theta)?;
        let param_record = record.as_param_mut().expect("theta record");
        param_record.renumber(next);
        if is_placeholder_name(&p.name, "THETA") {
            let placeholder = format!("THETA({next})");
            new_params = new_params.renamed(&p.name, &placeholder);
        } else {
            param_record.set_name(0, &p.name);
        }
    }

    // one renumbering fold over the final record list, then refresh the
    // slot values from the updated parameter set
    staged.renumber_params(RecordKind::Theta);
    let values = new_params.clone();
    for record in staged.records_mut().iter_mut() {
        if let Record::Param(r) = record
            && r.kind() == RecordKind::Theta
        {
            r.update_values(&values);
        }
    }

    Ok((staged, new_params))
}

/// Synchronize the `$OMEGA`/`$SIGMA` records with a random-variable diff.
pub fn update_random_variables(
    stream: &ControlStream,
    old: &RandomVariables,
    new: &RandomVariables,
) -> Result<ControlStream> {
    let mut staged = stream.clone();

    for (kind, level) in [
        (RecordKind::Omega, None),
        (RecordKind::Sigma, Some(VariabilityLevel::Ruv)),
    ] {
        let selector = |rvs: &RandomVariables| -> BTreeSet<String> {
            rvs.iter()
                .filter(|rv| match level {
                    Some(level) => rv.level == level,
                    None => rv.level != VariabilityLevel::Ruv,
                })
                .map(|rv| rv.name.clone())
                .collect()
        };
        let removed: BTreeSet<String> = selector(old)
            .difference(&selector(new))
            .cloned()
            .collect();
        if !removed.is_empty() {
            apply_removal_plan(&mut staged, kind, &removed);
        }
    }

    Ok(staged)
}

/// Synchronize the subroutine/model records with a structural ODE-system
/// change, returning the rewritten stream and statements.
pub fn update_ode_system(
    stream: &ControlStream,
    old: &OdeSystem,
    new: &OdeSystem,
    statements: &Statements,
) -> Result<(ControlStream, Statements)> {
    match (old, new) {
        (OdeSystem::Compartmental(_), OdeSystem::Explicit(es)) => {
            let mut staged = stream.clone();

            let Some(subroutines) = staged
                .first_mut(RecordKind::Subroutines)
                .and_then(|r| r.as_subroutines_mut())
            else {
                return sync_err!(UnknownRecord, "SUBROUTINES".to_owned());
            };
            subroutines.remove_option_startswith("TRANS");
            subroutines.remove_option_startswith("ADVAN");
            subroutines.append_option("ADVAN6");

            let des = staged.insert_record("$DES\nDUMMY=0", RecordKind::Pk)?;
            des.as_des_mut().expect("des record").from_odes(es);

            let record = staged.insert_record("$MODEL TOL=3", RecordKind::Subroutines)?;
            let model_record = record.as_comp_model_mut().expect("model record");
            // the output equation is not declared as a compartment
            let retained = es.odes.len().saturating_sub(1);
            for (eq, (_, ic)) in es.odes[..retained].iter().zip(es.ics[..retained].iter()) {
                let dosing = !matches!(ic, Expr::Const(_, n) if *n == 0.0);
                model_record.add_compartment(eq.compartment_name(), dosing);
            }

            Ok((staged, statements.clone()))
        }
        (OdeSystem::Compartmental(old_cs), OdeSystem::Compartmental(new_cs))
            if old_cs.find_depot().is_some() && new_cs.find_depot().is_none() =>
        {
            let mut staged = stream.clone();

            let advan = staged
                .get_records(RecordKind::Subroutines)
                .first()
                .and_then(|r| match r {
                    Record::Subroutines(s) => {
                        s.get_option_startswith("ADVAN").map(str::to_owned)
                    }
                    _ => None,
                });
            let Some(advan) = advan else {
                return sync_err!(UnknownRecord, "SUBROUTINES".to_owned());
            };

            let Some((downgrade, rate_renames)) = ADVAN_DOWNGRADES.get(advan.as_str()) else {
                // notably ADVAN5/ADVAN7: the removed compartment cannot be
                // identified positionally, so the text would go stale
                return sync_err!(UnsupportedStructuralChange, advan);
            };

            let subroutines = staged
                .first_mut(RecordKind::Subroutines)
                .and_then(|r| r.as_subroutines_mut())
                .expect("checked above");
            subroutines.replace_option(&advan, downgrade);

            let primary: BTreeMap<Symbol, Expr> = rate_renames
                .iter()
                .map(|(from, to)| (sym(from), Expr::var(to)))
                .collect();
            let secondary = secondary_pk_param_conversion_map(old_cs.len(), 1);

            let statements = statements.subs(&primary).subs(&secondary);
            Ok((staged, statements))
        }
        _ => Ok((stream.clone(), statements.clone())),
    }
}

/// Symbol shifts for the secondary PK families (`S`, `F`, `R`, `D`,
/// `ALAG`) after removing one compartment.
///
/// `ncomp` is the compartment count before removal (output included),
/// `removed` the 1-based index of the removed compartment.
pub fn secondary_pk_param_conversion_map(
    ncomp: usize,
    removed: usize,
) -> BTreeMap<Symbol, Expr> {
    let mut mapping = BTreeMap::new();
    for i in removed + 1..=ncomp {
        for family in SECONDARY_FAMILIES {
            mapping.insert(
                Symbol::new(format!("{family}{i}")),
                Expr::var(&format!("{family}{}", i - 1)),
            );
        }
    }
    mapping
}

/// Rewrite the `$PK`/`$ERROR` code blocks from a statement diff, applying
/// `trans` symbol renames.  Structural ODE changes are synchronized first.
pub fn update_statements(
    stream: &ControlStream,
    old: &Statements,
    new: &Statements,
    trans: &BTreeMap<Symbol, Symbol>,
) -> Result<(ControlStream, Statements)> {
    let mut staged = stream.clone();
    let mut statements = new.clone();

    if let (Some(old_ode), Some(new_ode)) = (old.ode_system(), new.ode_system())
        && old_ode != new_ode
    {
        let (next_stream, next_statements) =
            update_ode_system(&staged, old_ode, new_ode, &statements)?;
        staged = next_stream;
        statements = next_statements;
    }

    let mapping: BTreeMap<Symbol, Expr> = trans
        .iter()
        .map(|(from, to)| (from.clone(), Expr::Var(to.clone())))
        .collect();

    let main: Vec<Assignment> = statements
        .before_odes()
        .into_iter()
        .map(|a| a.subs(&mapping))
        .collect();
    let mut error: Vec<Assignment> = statements
        .after_odes()
        .into_iter()
        .map(|a| a.subs(&mapping))
        .collect();

    let Some(pk) = staged
        .first_mut(RecordKind::Pk)
        .and_then(|r| r.as_code_mut())
    else {
        return sync_err!(UnknownRecord, "PK".to_owned());
    };
    pk.statements = main;

    if let Some(error_record) = staged
        .first_mut(RecordKind::Error)
        .and_then(|r| r.as_code_mut())
    {
        if !error.is_empty() {
            // the first post-ODE statement is the link statement
            error.remove(0);
        }
        error_record.statements = error;
    }

    Ok((staged, statements))
}

/// The next free global parameter index for a record kind: one past every
/// slot any record of that kind defines.
pub fn next_param_index(stream: &ControlStream, kind: RecordKind) -> u32 {
    let mut next = 1u32;
    for record in stream.param_records(kind) {
        next += record.len() as u32;
    }
    next
}

fn theta_record_text(p: &Parameter) -> String {
    let mut text = String::from("$THETA  ");
    if p.upper == f64::INFINITY {
        if p.lower == f64::NEG_INFINITY {
            text.push_str(&format!("{}", p.init));
        } else {
            text.push_str(&format!("({},{})", p.lower, p.init));
        }
    } else if p.lower == f64::NEG_INFINITY {
        text.push_str(&format!("(-INF,{},{})", p.init, p.upper));
    } else {
        text.push_str(&format!("({},{},{})", p.lower, p.init, p.upper));
    }
    if p.fix {
        text.push_str(" FIX");
    }
    text
}

/// Compute the full removal/renumbering plan for all records of `kind`,
/// then apply it in one pass.  Returns the placeholder renames the
/// renumbering produced, oldest first.
fn apply_removal_plan(
    stream: &mut ControlStream,
    kind: RecordKind,
    removed: &BTreeSet<String>,
) -> Vec<(String, String)> {
    // plan: visit records in declaration order, advancing the index fold
    // past retained slots only
    let mut plan: BTreeMap<usize, RecordAction> = BTreeMap::new();
    let mut next = 1u32;
    for (i, record) in stream.records().iter().enumerate() {
        let Some(r) = record.as_param() else {
            continue;
        };
        if r.kind() != kind {
            continue;
        }
        let names = r.names();
        if names.is_subset(removed) {
            plan.insert(i, RecordAction::Delete);
        } else if !names.is_disjoint(removed) {
            let strip: BTreeSet<String> = names.intersection(removed).cloned().collect();
            let kept = (names.len() - strip.len()) as u32;
            plan.insert(
                i,
                RecordAction::Strip {
                    names: strip,
                    start: next,
                },
            );
            next += kept;
        } else {
            plan.insert(i, RecordAction::Renumber { start: next });
            next += names.len() as u32;
        }
    }

    // apply: no record is touched before the plan is complete
    let mut renames: Vec<(String, String)> = Vec::new();
    let mut deleted: BTreeSet<usize> = BTreeSet::new();
    for (i, record) in stream.records_mut().iter_mut().enumerate() {
        let Some(action) = plan.get(&i) else {
            continue;
        };
        let r = record.as_param_mut().expect("planned records are params");
        match action {
            RecordAction::Delete => {
                deleted.insert(i);
            }
            RecordAction::Strip { names, start } => {
                r.remove(names);
                let before: Vec<String> = r.names_in_order();
                r.renumber(*start);
                renames.extend(rename_pairs(before, r.names_in_order()));
            }
            RecordAction::Renumber { start } => {
                let before: Vec<String> = r.names_in_order();
                r.renumber(*start);
                renames.extend(rename_pairs(before, r.names_in_order()));
            }
        }
    }
    stream.remove_records(&deleted);

    renames
}

fn rename_pairs(before: Vec<String>, after: Vec<String>) -> Vec<(String, String)> {
    before
        .into_iter()
        .zip(after)
        .filter(|(b, a)| b != a)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::common::ErrorCode;
    use crate::parser::parse;
    use crate::records::parse_record;
    use crate::rvs::RandomVariable;
    use crate::statements::Statement;
    use crate::system::{CompartmentalSystem, CompartmentalSystemBuilder};

    fn stream() -> ControlStream {
        let mut s = ControlStream::new(vec![
            parse_record("$SUBROUTINES ADVAN2 TRANS2").unwrap(),
            parse_record("$PK\nCL=THETA(1)*EXP(ETA(1))\nV=THETA(2)*EXP(ETA(2))").unwrap(),
            parse_record("$ERROR\nF=A_CENTRAL/V\nY=F+F*EPS(1)").unwrap(),
            parse_record("$THETA  (0,0.00469307) (0,1.00916)").unwrap(),
            parse_record("$THETA 0.1").unwrap(),
            parse_record("$OMEGA 0.0309626 0.031128").unwrap(),
            parse_record("$SIGMA 0.013241").unwrap(),
        ]);
        s.renumber_params(RecordKind::Theta);
        s.renumber_params(RecordKind::Omega);
        s.renumber_params(RecordKind::Sigma);
        s
    }

    fn params3() -> Parameters {
        Parameters::new(vec![
            Parameter::new("THETA(1)", 0.00469307).with_bounds(0.0, f64::INFINITY),
            Parameter::new("THETA(2)", 1.00916).with_bounds(0.0, f64::INFINITY),
            Parameter::new("THETA(3)", 0.1),
        ])
        .unwrap()
    }

    fn rvs() -> RandomVariables {
        let variance = |name: &str| parse(name).unwrap().unwrap();
        RandomVariables::new(vec![
            RandomVariable::new("ETA(1)", VariabilityLevel::Iiv, variance("OMEGA(1,1)")),
            RandomVariable::new("ETA(2)", VariabilityLevel::Iiv, variance("OMEGA(2,2)")),
            RandomVariable::new("EPS(1)", VariabilityLevel::Ruv, variance("SIGMA(1,1)")),
        ])
        .unwrap()
    }

    fn theta_slots(stream: &ControlStream) -> Vec<(String, u32)> {
        stream
            .param_records(RecordKind::Theta)
            .into_iter()
            .flat_map(|r| r.slots().iter().map(|s| (s.name.clone(), s.index)))
            .collect()
    }

    fn depot_cs() -> CompartmentalSystem {
        let mut builder = CompartmentalSystemBuilder::new();
        builder.add_compartment("DEPOT", Some(Expr::var("AMT")));
        builder.add_compartment("CENTRAL", None);
        builder.add_compartment("OUTPUT", None);
        builder.add_flow("DEPOT", "CENTRAL", parse("KA").unwrap().unwrap());
        builder.add_flow("CENTRAL", "OUTPUT", parse("CL/V").unwrap().unwrap());
        builder.build().unwrap()
    }

    fn bolus_cs() -> CompartmentalSystem {
        let mut builder = CompartmentalSystemBuilder::new();
        builder.add_compartment("CENTRAL", Some(Expr::var("AMT")));
        builder.add_compartment("OUTPUT", None);
        builder.add_flow("CENTRAL", "OUTPUT", parse("CL/V").unwrap().unwrap());
        builder.build().unwrap()
    }

    #[test]
    fn test_remove_trailing_record() {
        let old = params3();
        let new = Parameters::new(vec![
            old.get("THETA(1)").unwrap().clone(),
            old.get("THETA(2)").unwrap().clone(),
        ])
        .unwrap();

        let (stream, params) = update_parameters(&stream(), &old, &new, &rvs()).unwrap();

        // the one-slot record was deleted outright
        assert_eq!(1, stream.param_records(RecordKind::Theta).len());
        assert_eq!(
            vec![("THETA(1)".to_owned(), 1), ("THETA(2)".to_owned(), 2)],
            theta_slots(&stream)
        );
        assert_eq!(new.names(), params.names());
    }

    #[test]
    fn test_remove_first_slot_renumbers_and_renames() {
        let old = params3();
        let new = Parameters::new(vec![
            old.get("THETA(2)").unwrap().clone(),
            old.get("THETA(3)").unwrap().clone(),
        ])
        .unwrap();

        let (stream, params) = update_parameters(&stream(), &old, &new, &rvs()).unwrap();

        assert_eq!(
            vec![("THETA(1)".to_owned(), 1), ("THETA(2)".to_owned(), 2)],
            theta_slots(&stream)
        );
        // the caller's surviving parameters follow their placeholders
        assert_eq!(
            BTreeSet::from(["THETA(1)".to_owned(), "THETA(2)".to_owned()]),
            params.names()
        );
        assert_eq!(1.00916, params.get("THETA(1)").unwrap().init);
        assert_eq!(0.1, params.get("THETA(2)").unwrap().init);

        // slot values were refreshed against the renamed set
        let slots: Vec<f64> = stream
            .param_records(RecordKind::Theta)
            .into_iter()
            .flat_map(|r| r.slots().iter().map(|s| s.init))
            .collect();
        assert_eq!(vec![1.00916, 0.1], slots);
    }

    #[test]
    fn test_remove_all_records() {
        let old = params3();
        let new = Parameters::default();
        let (stream, _) = update_parameters(&stream(), &old, &new, &rvs()).unwrap();
        assert!(stream.param_records(RecordKind::Theta).is_empty());
    }

    #[test]
    fn test_insert_custom_named_parameter() {
        let old = params3();
        let mut list: Vec<Parameter> = old.clone().into();
        list.push(Parameter::new("MAT", 2.0).with_bounds(0.0, f64::INFINITY));
        let new = Parameters::new(list).unwrap();

        let (stream, params) = update_parameters(&stream(), &old, &new, &rvs()).unwrap();

        assert_eq!(3, stream.param_records(RecordKind::Theta).len());
        let slots = theta_slots(&stream);
        assert_eq!(("MAT".to_owned(), 4), slots[3].clone());
        assert!(params.contains("MAT"));
    }

    #[test]
    fn test_insert_placeholder_parameter_is_renumbered() {
        let old = params3();
        let mut list: Vec<Parameter> = old.clone().into();
        list.push(Parameter::new("THETA(9)", 2.0));
        let new = Parameters::new(list).unwrap();

        let (stream, params) = update_parameters(&stream(), &old, &new, &rvs()).unwrap();

        let slots = theta_slots(&stream);
        assert_eq!(("THETA(4)".to_owned(), 4), slots[3].clone());
        assert!(params.contains("THETA(4)"));
        assert!(!params.contains("THETA(9)"));
    }

    #[test]
    fn test_insert_skips_random_effect_variances() {
        let old = params3();
        let mut list: Vec<Parameter> = old.clone().into();
        list.push(Parameter::new("OMEGA(1,1)", 0.03));
        let new = Parameters::new(list).unwrap();

        let before = stream();
        let (after, _) = update_parameters(&before, &old, &new, &rvs()).unwrap();
        assert_eq!(
            before.param_records(RecordKind::Theta).len(),
            after.param_records(RecordKind::Theta).len()
        );
    }

    #[test]
    fn test_update_values() {
        let old = params3();
        let mut list: Vec<Parameter> = old.clone().into();
        list[0].init = 0.005;
        let new = Parameters::new(list).unwrap();

        let (stream, _) = update_parameters(&stream(), &old, &new, &rvs()).unwrap();
        let first = &stream.param_records(RecordKind::Theta)[0].slots()[0];
        assert_eq!(0.005, first.init);
    }

    #[test]
    fn test_update_random_variables_strip_and_delete() {
        let old = rvs();

        let new = RandomVariables::new(vec![
            old.get("ETA(1)").unwrap().clone(),
            old.get("EPS(1)").unwrap().clone(),
        ])
        .unwrap();
        let stream_a = update_random_variables(&stream(), &old, &new).unwrap();
        let omegas = stream_a.param_records(RecordKind::Omega);
        assert_eq!(1, omegas.len());
        assert_eq!(
            vec!["ETA(1)".to_owned()],
            omegas[0].names_in_order()
        );

        let new = RandomVariables::new(vec![
            old.get("ETA(1)").unwrap().clone(),
            old.get("ETA(2)").unwrap().clone(),
        ])
        .unwrap();
        let stream = update_random_variables(&stream(), &old, &new).unwrap();
        assert!(stream.param_records(RecordKind::Sigma).is_empty());
    }

    #[test]
    fn test_compartmental_to_explicit() {
        let cs = depot_cs();
        let es = cs.to_explicit();
        let old = OdeSystem::Compartmental(cs);
        let new = OdeSystem::Explicit(es);

        let (stream, _) =
            update_ode_system(&stream(), &old, &new, &Statements::default()).unwrap();

        // solver options replaced by the explicit marker
        let subs = match &stream.get_records(RecordKind::Subroutines)[0] {
            Record::Subroutines(r) => r.clone(),
            _ => unreachable!(),
        };
        assert_eq!(vec!["ADVAN6".to_owned()], subs.options().to_vec());

        // $DES lands after $PK with one derivative per retained equation
        let kinds: Vec<RecordKind> = stream.records().iter().map(|r| r.kind()).collect();
        let pk = kinds.iter().position(|k| *k == RecordKind::Pk).unwrap();
        assert_eq!(RecordKind::Des, kinds[pk + 1]);
        let des = match &stream.get_records(RecordKind::Des)[0] {
            Record::Des(r) => r.clone(),
            _ => unreachable!(),
        };
        assert_eq!(2, des.statements.len());
        assert_eq!("DADT(1)", des.statements[0].symbol.as_str());

        // $MODEL lands after $SUBROUTINES, dosing decided by the ICs
        let subs_pos = kinds
            .iter()
            .position(|k| *k == RecordKind::Subroutines)
            .unwrap();
        assert_eq!(RecordKind::CompModel, kinds[subs_pos + 1]);
        let model = match &stream.get_records(RecordKind::CompModel)[0] {
            Record::CompModel(r) => r.clone(),
            _ => unreachable!(),
        };
        let comps: Vec<(String, bool)> = model
            .compartments()
            .iter()
            .map(|c| (c.name.clone(), c.dosing))
            .collect();
        assert_eq!(
            vec![("DEPOT".to_owned(), true), ("CENTRAL".to_owned(), false)],
            comps
        );
    }

    #[test]
    fn test_depot_removal_downgrades_advan2() {
        let old = OdeSystem::Compartmental(depot_cs());
        let new = OdeSystem::Compartmental(bolus_cs());

        let statements = Statements::new(vec![Statement::Assignment(Assignment::new(
            sym("S2"),
            parse("V").unwrap().unwrap(),
        ))])
        .unwrap();

        let (stream, statements) =
            update_ode_system(&stream(), &old, &new, &statements).unwrap();

        let subs = match &stream.get_records(RecordKind::Subroutines)[0] {
            Record::Subroutines(r) => r.clone(),
            _ => unreachable!(),
        };
        assert_eq!(Some("ADVAN1"), subs.get_option_startswith("ADVAN"));

        // the scale of the old second compartment is now S1
        assert!(statements.find_assignment(&sym("S1")).is_some());
        assert!(statements.find_assignment(&sym("S2")).is_none());
    }

    #[test]
    fn test_depot_removal_renames_rate_constants() {
        let mut base = stream();
        base.first_mut(RecordKind::Subroutines)
            .and_then(|r| r.as_subroutines_mut())
            .unwrap()
            .replace_option("ADVAN2", "ADVAN4");

        let old = OdeSystem::Compartmental(depot_cs());
        let new = OdeSystem::Compartmental(bolus_cs());
        let statements = Statements::new(vec![Statement::Assignment(Assignment::new(
            sym("X"),
            parse("K23+K32").unwrap().unwrap(),
        ))])
        .unwrap();

        let (stream, statements) = update_ode_system(&base, &old, &new, &statements).unwrap();

        let subs = match &stream.get_records(RecordKind::Subroutines)[0] {
            Record::Subroutines(r) => r.clone(),
            _ => unreachable!(),
        };
        assert_eq!(Some("ADVAN3"), subs.get_option_startswith("ADVAN"));

        let x = statements.find_assignment(&sym("X")).unwrap();
        assert_eq!(
            BTreeSet::from([sym("K12"), sym("K21")]),
            x.free_symbols()
        );
    }

    #[test]
    fn test_depot_removal_unsupported_solver() {
        let mut base = stream();
        base.first_mut(RecordKind::Subroutines)
            .and_then(|r| r.as_subroutines_mut())
            .unwrap()
            .replace_option("ADVAN2", "ADVAN5");

        let old = OdeSystem::Compartmental(depot_cs());
        let new = OdeSystem::Compartmental(bolus_cs());

        let err =
            update_ode_system(&base, &old, &new, &Statements::default()).unwrap_err();
        assert_eq!(ErrorCode::UnsupportedStructuralChange, err.code);
        assert_eq!(Some("ADVAN5".to_owned()), err.get_details());
    }

    #[test]
    fn test_secondary_conversion_map() {
        let mapping = secondary_pk_param_conversion_map(4, 2);
        assert_eq!(Some(&Expr::var("S2")), mapping.get(&sym("S3")));
        assert_eq!(Some(&Expr::var("ALAG3")), mapping.get(&sym("ALAG4")));
        assert_eq!(Some(&Expr::var("F2")), mapping.get(&sym("F3")));
        // nothing below the removed index moves
        assert!(!mapping.contains_key(&sym("S1")));
        assert!(!mapping.contains_key(&sym("S2")));
    }

    #[test]
    fn test_update_statements_rewrites_code_records() {
        let old = Statements::new(vec![
            Statement::Assignment(Assignment::new(
                sym("CL"),
                parse("THETA(1)*EXP(ETA(1))").unwrap().unwrap(),
            )),
            Statement::Ode(OdeSystem::Compartmental(bolus_cs())),
            Statement::Assignment(Assignment::new(
                sym("F"),
                parse("A_CENTRAL/V").unwrap().unwrap(),
            )),
            Statement::Assignment(Assignment::new(
                sym("Y"),
                parse("F+F*EPS(1)").unwrap().unwrap(),
            )),
        ])
        .unwrap();

        let mut with_new_assignment: Vec<Statement> = old.clone().into_iter().collect();
        with_new_assignment.insert(
            0,
            Statement::Assignment(Assignment::new(
                sym("TVCL"),
                parse("THETA(1)*WT").unwrap().unwrap(),
            )),
        );
        let new = Statements::new(with_new_assignment).unwrap();

        let trans = BTreeMap::from([(sym("WT"), sym("WGT"))]);
        let (stream, _) = update_statements(&stream(), &old, &new, &trans).unwrap();

        let pk = match &stream.get_records(RecordKind::Pk)[0] {
            Record::Code(r) => r.clone(),
            _ => unreachable!(),
        };
        assert_eq!(2, pk.statements.len());
        assert_eq!("TVCL", pk.statements[0].symbol.as_str());
        // the translation map was applied
        assert!(pk.statements[0].free_symbols().contains(&sym("WGT")));
        assert!(!pk.statements[0].free_symbols().contains(&sym("WT")));

        // the link statement F=... is dropped from the error block
        let error = match &stream.get_records(RecordKind::Error)[0] {
            Record::Code(r) => r.clone(),
            _ => unreachable!(),
        };
        assert_eq!(1, error.statements.len());
        assert_eq!("Y", error.statements[0].symbol.as_str());
    }

    proptest! {
        #[test]
        fn renumbering_stays_contiguous(mask in proptest::collection::vec(any::<bool>(), 6)) {
            let mut base = ControlStream::new(vec![
                parse_record("$THETA 0.1 0.2").unwrap(),
                parse_record("$THETA 0.3").unwrap(),
                parse_record("$THETA 0.4 0.5 0.6").unwrap(),
            ]);
            base.renumber_params(RecordKind::Theta);

            let old = Parameters::new(
                (1..=6)
                    .map(|i| Parameter::new(&format!("THETA({i})"), i as f64 / 10.0))
                    .collect(),
            )
            .unwrap();
            let new = Parameters::new(
                old.iter()
                    .zip(mask.iter())
                    .filter(|(_, keep)| **keep)
                    .map(|(p, _)| p.clone())
                    .collect(),
            )
            .unwrap();

            let empty = RandomVariables::default();
            let (stream, params) = update_parameters(&base, &old, &new, &empty).unwrap();

            let slots = theta_slots(&stream);
            let kept = mask.iter().filter(|keep| **keep).count();
            prop_assert_eq!(kept, slots.len());
            for (i, (name, index)) in slots.iter().enumerate() {
                prop_assert_eq!((i + 1) as u32, *index);
                prop_assert_eq!(&format!("THETA({})", i + 1), name);
            }
            // the returned parameter set matches the slot names exactly
            let slot_names: BTreeSet<String> =
                slots.into_iter().map(|(name, _)| name).collect();
            prop_assert_eq!(slot_names, params.names());
        }
    }
}
