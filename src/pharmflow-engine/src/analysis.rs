// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Structural analysis of the compartmental system and the statement
//! graph: which symbols drive absorption, distribution and elimination,
//! and which parameters carry random effects.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::analysis_err;
use crate::ast::Expr;
use crate::common::{Error, ErrorCode, ErrorKind, Result, Symbol, sym};
use crate::deps::{DependencyGraph, dependency_graph, natural_assignments};
use crate::graph::{graph_inverse, reachable_from, strongly_connected_component_of};
use crate::model::Model;
use crate::rvs::EtaSelection;
use crate::statements::{Assignment, Statements};
use crate::system::CompartmentalSystem;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PkParameterKind {
    All,
    Absorption,
    Distribution,
    Elimination,
}

impl FromStr for PkParameterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(PkParameterKind::All),
            "absorption" => Ok(PkParameterKind::Absorption),
            "distribution" => Ok(PkParameterKind::Distribution),
            "elimination" => Ok(PkParameterKind::Elimination),
            _ => Err(Error::new(
                ErrorKind::Analysis,
                ErrorCode::UnsupportedKind,
                Some(s.to_owned()),
            )),
        }
    }
}

/// PK parameters of the model, optionally restricted to one kinetic role.
///
/// Rates are first re-expanded through eliminated synthetic assignments
/// (`K` becomes `CL/V` again), the requested component is cut out of the
/// compartmental graph, and the component's free symbols are reduced to
/// the leaf definitional symbols of the statement graph.
pub fn get_pk_parameters(model: &Model, kind: PkParameterKind) -> Result<Vec<String>> {
    let before = model.statements.before_odes();
    let natural = natural_assignments(&before);
    let cs = remap_compartmental_system(&model.statements, &natural)?;

    let free = pk_free_symbols(&cs, kind);

    let refs: Vec<&Assignment> = natural.iter().collect();
    let graph = dependency_graph(&refs);

    Ok(sorted_names(filter_symbols(&graph, &free, None)))
}

/// Parameters carrying a random effect at the given variability level.
pub fn get_individual_parameters(model: &Model, selection: EtaSelection) -> Vec<String> {
    let rvs = model.random_variables.select_etas(selection);

    let before = model.statements.before_odes();
    let natural = natural_assignments(&before);

    let roots: BTreeSet<Symbol> = natural.iter().map(|a| a.symbol.clone()).collect();
    let leaves: BTreeSet<Symbol> = rvs
        .iter()
        .filter(|rv| !rv.has_zero_variance())
        .flat_map(|rv| rv.free_symbols())
        .collect();

    let refs: Vec<&Assignment> = natural.iter().collect();
    let graph = dependency_graph(&refs);

    sorted_names(filter_symbols(&graph, &roots, Some(&leaves)))
}

/// Parameters reached by the given random variable.
pub fn get_rv_parameters(model: &Model, rv: &str) -> Result<Vec<String>> {
    if model.random_variables.get(rv).is_none() {
        return analysis_err!(UnknownRandomVariable, rv.to_owned());
    }

    let before = model.statements.before_odes();
    let natural = natural_assignments(&before);

    let roots = model.statements.free_symbols();
    let leaves = BTreeSet::from([sym(rv)]);

    let refs: Vec<&Assignment> = natural.iter().collect();
    let graph = dependency_graph(&refs);

    Ok(sorted_names(filter_symbols(&graph, &roots, Some(&leaves))))
}

/// Whether `parameter` depends on any random effect at the given level.
/// Unknown symbols are an error, never a silent `false`.
pub fn has_random_effect(
    model: &Model,
    parameter: &str,
    selection: EtaSelection,
) -> Result<bool> {
    let rvs = model.random_variables.select_etas(selection);

    let before = model.statements.before_odes();
    let graph = dependency_graph(&before);

    let symbol = sym(parameter);
    if !graph.contains_key(&symbol) {
        return analysis_err!(UnknownSymbol, parameter.to_owned());
    }

    let reachable = reachable_from(&BTreeSet::from([symbol]), successors_of(&graph));

    Ok(rvs.iter().any(|rv| reachable.contains(&rv.symbol())))
}

/// The compartmental system with every eliminated (synthetic) assignment
/// substituted back into the rates, in reverse statement order.
fn remap_compartmental_system(
    statements: &Statements,
    natural: &[Assignment],
) -> Result<CompartmentalSystem> {
    let Some(ode) = statements.ode_system() else {
        return analysis_err!(MissingOdeSystem);
    };
    let Some(cs) = ode.as_compartmental() else {
        return analysis_err!(
            MissingOdeSystem,
            "pk analysis requires a compartmental system".to_owned()
        );
    };

    let mut cs = cs.clone();
    for assignment in statements.before_odes().iter().rev() {
        if !natural.iter().any(|n| n == *assignment) {
            let mapping = BTreeMap::from([(
                assignment.symbol.clone(),
                assignment.expression.clone(),
            )]);
            cs = cs.subs(&mapping);
        }
    }
    Ok(cs)
}

fn pk_free_symbols(cs: &CompartmentalSystem, kind: PkParameterKind) -> BTreeSet<Symbol> {
    match kind {
        PkParameterKind::All => cs.free_symbols(),
        PkParameterKind::Absorption => match cs.dosing_compartment() {
            None => BTreeSet::new(),
            Some(dosing) if dosing.name() == cs.central_compartment().name() => BTreeSet::new(),
            Some(dosing) => pk_free_symbols_from_compartment(cs, dosing.name()),
        },
        PkParameterKind::Distribution => {
            pk_free_symbols_from_compartment(cs, cs.central_compartment().name())
        }
        PkParameterKind::Elimination => {
            pk_free_symbols_from_compartment(cs, cs.output_compartment().name())
        }
    }
}

fn pk_free_symbols_from_compartment(
    cs: &CompartmentalSystem,
    compartment: &str,
) -> BTreeSet<Symbol> {
    let vertices = get_component(cs, compartment);
    let edges = get_component_edges(cs, &vertices);
    let is_central = compartment == cs.central_compartment().name();
    get_component_free_symbols(cs, is_central, &vertices, &edges)
}

/// The component a compartment belongs to: the central strongly connected
/// component for the central compartment, otherwise the compartments
/// reachable outward (inward for the output sink) without crossing into
/// the central component.
fn get_component(cs: &CompartmentalSystem, compartment: &str) -> BTreeSet<String> {
    let central = cs.central_compartment().name().to_owned();

    let central_component = strongly_connected_component_of(
        &central,
        |u| {
            cs.outflows(u)
                .into_iter()
                .map(|(c, _)| c.name().to_owned())
                .collect::<Vec<_>>()
        },
        |u| {
            cs.inflows(u)
                .into_iter()
                .map(|(c, _)| c.name().to_owned())
                .collect::<Vec<_>>()
        },
    );

    if compartment == central {
        return central_component;
    }

    let inward = compartment == cs.output_compartment().name();

    reachable_from(&BTreeSet::from([compartment.to_owned()]), |u| {
        let flows = if inward {
            cs.inflows(u)
        } else {
            cs.outflows(u)
        };
        flows
            .into_iter()
            .map(|(c, _)| c.name().to_owned())
            .filter(|name| !central_component.contains(name))
            .collect::<Vec<_>>()
    })
}

/// The flow edges of a component: inflows when the component contains the
/// output sink, outflows otherwise, restricted to edges touching it.
fn get_component_edges(
    cs: &CompartmentalSystem,
    vertices: &BTreeSet<String>,
) -> Vec<(String, String, Expr)> {
    let mut edges = Vec::new();
    if vertices.contains(cs.output_compartment().name()) {
        for v in vertices.iter() {
            for (u, rate) in cs.inflows(v) {
                edges.push((u.name().to_owned(), v.clone(), rate.clone()));
            }
        }
    } else {
        for u in vertices.iter() {
            for (v, rate) in cs.outflows(u) {
                edges.push((u.clone(), v.name().to_owned(), rate.clone()));
            }
        }
    }
    edges
}

/// Free symbols contributed by a component's edges and compartments.
///
/// A boundary edge whose rate is a two-symbol ratio is split: the
/// numerator belongs to the region receiving the flow, the denominator to
/// the region it leaves (this divides `CL/V` between the elimination edge
/// and the distribution volume).  Interior edges always contribute their
/// full rate; for non-central regions boundary edges do too.
fn get_component_free_symbols(
    cs: &CompartmentalSystem,
    is_central: bool,
    vertices: &BTreeSet<String>,
    edges: &[(String, String, Expr)],
) -> BTreeSet<Symbol> {
    let mut symbols = BTreeSet::new();

    for (u, v, rate) in edges.iter() {
        let u_in = vertices.contains(u);
        let v_in = vertices.contains(v);
        debug_assert!(u_in || v_in);

        if !u_in || !v_in {
            if let Some((num, den)) = rate.as_symbol_ratio()
                && num != den
            {
                symbols.insert(if v_in { num.clone() } else { den.clone() });
                continue;
            }
        }

        if (u_in && v_in) || !is_central {
            symbols.extend(rate.free_symbols());
        }
    }

    for name in vertices.iter() {
        if let Some(compartment) = cs.get_compartment(name) {
            symbols.extend(compartment.free_symbols());
        }
    }

    symbols
}

/// Reduce a symbol set to leaf definitional symbols: expand `roots` to its
/// dependency closure, optionally intersect with what reaches the `leaves`
/// backward, and keep only symbols that are defined and have no dependents
/// of their own.
fn filter_symbols(
    graph: &DependencyGraph,
    roots: &BTreeSet<Symbol>,
    leaves: Option<&BTreeSet<Symbol>>,
) -> BTreeSet<Symbol> {
    let dependents = graph_inverse(graph);

    let free_symbols = reachable_from(roots, successors_of(graph));

    let reachable = match leaves {
        None => free_symbols,
        Some(leaves) => {
            let backward = reachable_from(leaves, successors_of(&dependents));
            backward.intersection(&free_symbols).cloned().collect()
        }
    };

    reachable
        .into_iter()
        .filter(|s| !dependents.contains_key(s) && graph.contains_key(s))
        .collect()
}

fn successors_of<'a>(g: &'a DependencyGraph) -> impl FnMut(&Symbol) -> Vec<Symbol> + 'a {
    move |s| {
        g.get(s)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn sorted_names(symbols: BTreeSet<Symbol>) -> Vec<String> {
    symbols.into_iter().map(|s| s.as_str().to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::model::Model;
    use crate::testutils::{pheno_def, two_compartment_def};

    fn pheno() -> Model {
        Model::from_datamodel(&pheno_def()).unwrap()
    }

    #[test]
    fn test_pheno_pk_partition() {
        let model = pheno();

        assert!(
            get_pk_parameters(&model, PkParameterKind::Absorption)
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            vec!["V"],
            get_pk_parameters(&model, PkParameterKind::Distribution).unwrap()
        );
        assert_eq!(
            vec!["CL"],
            get_pk_parameters(&model, PkParameterKind::Elimination).unwrap()
        );

        // the kinds partition 'all'
        let all = get_pk_parameters(&model, PkParameterKind::All).unwrap();
        assert_eq!(vec!["CL", "V"], all);
    }

    #[test]
    fn test_two_compartment_central_component() {
        let model = Model::from_datamodel(&two_compartment_def()).unwrap();
        let before = model.statements.before_odes();
        let natural = natural_assignments(&before);
        let cs = remap_compartmental_system(&model.statements, &natural).unwrap();

        let central = get_component(&cs, "CENTRAL");
        assert_eq!(
            BTreeSet::from(["CENTRAL".to_owned(), "PERIPHERAL".to_owned()]),
            central
        );

        // distribution sees the exchange rates and the split volume
        assert_eq!(
            vec!["Q", "V1", "V2"],
            get_pk_parameters(&model, PkParameterKind::Distribution).unwrap()
        );
        assert_eq!(
            vec!["CL"],
            get_pk_parameters(&model, PkParameterKind::Elimination).unwrap()
        );
    }

    #[test]
    fn test_single_symbol_elimination_rate() {
        // with a plain K on the output edge, elimination symbols are
        // exactly the rate's free symbols
        let mut def = two_compartment_def();
        def.odes.as_mut().unwrap().flows[2].rate = "K10".to_owned();
        def.before_odes.push(crate::datamodel::AssignmentDef::new(
            "K10",
            "THETA(5)*EXP(ETA(3))",
        ));
        def.parameters
            .push(crate::datamodel::ParameterDef::new("THETA(5)", 0.1));
        def.random_variables
            .push(crate::datamodel::RandomVariableDef::new(
                "ETA(3)",
                "iiv",
                "OMEGA(3,3)",
            ));

        let model = Model::from_datamodel(&def).unwrap();
        assert_eq!(
            vec!["K10"],
            get_pk_parameters(&model, PkParameterKind::Elimination).unwrap()
        );
    }

    #[test]
    fn test_depot_absorption() {
        let model = Model::from_datamodel(&crate::testutils::depot_def()).unwrap();

        assert_eq!(
            vec!["KA"],
            get_pk_parameters(&model, PkParameterKind::Absorption).unwrap()
        );
        assert_eq!(
            vec!["V"],
            get_pk_parameters(&model, PkParameterKind::Distribution).unwrap()
        );
        assert_eq!(
            vec!["CL"],
            get_pk_parameters(&model, PkParameterKind::Elimination).unwrap()
        );
    }

    #[test]
    fn test_ratio_rate_is_seen_through_alias() {
        // the model assigns K = CL/V and uses K as the elimination rate;
        // analysis must see CL and V, not K
        let model = Model::from_datamodel(&crate::testutils::k_rate_def()).unwrap();

        assert_eq!(
            vec!["V"],
            get_pk_parameters(&model, PkParameterKind::Distribution).unwrap()
        );
        assert_eq!(
            vec!["CL"],
            get_pk_parameters(&model, PkParameterKind::Elimination).unwrap()
        );
    }

    #[test]
    fn test_individual_parameters() {
        let model = pheno();

        assert_eq!(
            vec!["CL", "V"],
            get_individual_parameters(&model, EtaSelection::All)
        );
        assert_eq!(
            vec!["CL", "V"],
            get_individual_parameters(&model, EtaSelection::Iiv)
        );
        assert!(get_individual_parameters(&model, EtaSelection::Iov).is_empty());
    }

    #[test]
    fn test_zero_variance_etas_are_ignored() {
        let mut def = pheno_def();
        def.random_variables[1].variance = "0".to_owned();
        let model = Model::from_datamodel(&def).unwrap();

        assert_eq!(
            vec!["CL"],
            get_individual_parameters(&model, EtaSelection::All)
        );
    }

    #[test]
    fn test_rv_parameters() {
        let model = pheno();

        assert_eq!(vec!["CL"], get_rv_parameters(&model, "ETA(1)").unwrap());
        assert_eq!(vec!["V"], get_rv_parameters(&model, "ETA(2)").unwrap());

        let err = get_rv_parameters(&model, "ETA(9)").unwrap_err();
        assert_eq!(ErrorCode::UnknownRandomVariable, err.code);
    }

    #[test]
    fn test_has_random_effect() {
        let model = pheno();

        assert!(has_random_effect(&model, "CL", EtaSelection::All).unwrap());
        assert!(has_random_effect(&model, "S1", EtaSelection::All).unwrap());
        assert!(!has_random_effect(&model, "TVCL", EtaSelection::All).unwrap());
        assert!(!has_random_effect(&model, "CL", EtaSelection::Iov).unwrap());

        let err = has_random_effect(&model, "NOPE", EtaSelection::All).unwrap_err();
        assert_eq!(ErrorCode::UnknownSymbol, err.code);
    }

    #[test]
    fn test_missing_ode_system() {
        let mut def = pheno_def();
        def.odes = None;
        def.after_odes.clear();
        let model = Model::from_datamodel(&def).unwrap();

        let err = get_pk_parameters(&model, PkParameterKind::All).unwrap_err();
        assert_eq!(ErrorCode::MissingOdeSystem, err.code);
    }
}
