// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Dependency analysis over ordered assignment sequences: the live
//! dependency graph, the natural/synthetic classification, and the
//! elimination of synthetic assignments.

use std::collections::{BTreeMap, BTreeSet};

use crate::common::Symbol;
use crate::statements::Assignment;

pub type DependencyGraph = BTreeMap<Symbol, BTreeSet<Symbol>>;

/// Build the symbol -> free-symbols map for an ordered assignment
/// sequence.
///
/// On redefinition the previous definition is folded into every entry that
/// referenced the redefined symbol, so each entry always describes the
/// definition chain that is actually live.  Later analyses depend on this:
/// they assume one dependency set per symbol reflecting its final
/// expression chain.
pub fn dependency_graph(assignments: &[&Assignment]) -> DependencyGraph {
    let mut dependencies: DependencyGraph = BTreeMap::new();

    for assignment in assignments {
        let symbol = &assignment.symbol;
        let fs = assignment.free_symbols();

        let previous_def = dependencies.insert(symbol.clone(), fs);

        if let Some(previous_def) = previous_def {
            for value in dependencies.values_mut() {
                if value.remove(symbol) {
                    value.extend(previous_def.iter().cloned());
                }
            }
        }
    }

    dependencies
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Classification {
    Natural,
    Synthetic,
}

/// Tag each assignment as natural or synthetic.
///
/// Synthetic assignments are pure aliases of an already-defined symbol
/// (`S1 = V`) or ratios of two already-defined symbols (`K = CL/V`); they
/// carry no structural information of their own.  Self-referential
/// assignments (`CL = CL + 1`) and everything else are natural.
pub fn classify_assignments<'a>(
    assignments: &[&'a Assignment],
) -> Vec<(Classification, &'a Assignment)> {
    let dependencies = dependency_graph(assignments);

    // only symbols with dependencies of their own qualify as alias/ratio
    // targets; this keeps constants (X = 1) from being folded away
    let symbols: BTreeSet<&Symbol> = dependencies
        .iter()
        .filter(|(_, deps)| !deps.is_empty())
        .map(|(s, _)| s)
        .collect();

    assignments
        .iter()
        .map(|assignment| {
            let fs = assignment.free_symbols();

            if !fs.contains(&assignment.symbol) {
                if fs.len() == 1 {
                    let a = fs.iter().next().unwrap();
                    if symbols.contains(a) {
                        return (Classification::Synthetic, *assignment);
                    }
                } else if fs.len() == 2
                    && let Some((num, den)) = assignment.expression.as_symbol_ratio()
                    && symbols.contains(num)
                    && symbols.contains(den)
                {
                    return (Classification::Synthetic, *assignment);
                }
            }

            (Classification::Natural, *assignment)
        })
        .collect()
}

/// Inline synthetic assignments into their dependents and drop them.
///
/// The pass runs in reverse order.  Retained assignments carry an explicit
/// position (their index in the reversed accumulation); when a synthetic
/// assignment for `s` is folded in, only positions at or after the last
/// natural definition of `s` are rewritten.  Positions before that boundary
/// follow a later redefinition of `s` and must stay untouched.
pub fn remove_synthetic_assignments(
    classified: &[(Classification, &Assignment)],
) -> Vec<Assignment> {
    let mut retained: Vec<(usize, Assignment)> = Vec::new();
    let mut last_defined: BTreeMap<Symbol, usize> = BTreeMap::new();

    for (classification, assignment) in classified.iter().rev() {
        match classification {
            Classification::Synthetic => {
                let boundary = last_defined
                    .get(&assignment.symbol)
                    .copied()
                    .unwrap_or(0);
                let mapping = BTreeMap::from([(
                    assignment.symbol.clone(),
                    assignment.expression.clone(),
                )]);
                for (position, succeeding) in retained.iter_mut() {
                    if *position >= boundary {
                        // expression-only: a retained redefinition of the
                        // synthetic symbol must keep its own name
                        *succeeding = Assignment::new(
                            succeeding.symbol.clone(),
                            succeeding.expression.subs(&mapping),
                        );
                    }
                }
            }
            Classification::Natural => {
                last_defined.insert(assignment.symbol.clone(), retained.len());
                retained.push((retained.len(), (*assignment).clone()));
            }
        }
    }

    retained.reverse();
    retained.into_iter().map(|(_, a)| a).collect()
}

/// The natural assignments of a pre-ODE block: classified, with synthetic
/// assignments folded into their dependents.
pub fn natural_assignments(assignments: &[&Assignment]) -> Vec<Assignment> {
    let classified = classify_assignments(assignments);
    remove_synthetic_assignments(&classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::sym;
    use crate::parser::parse;

    fn assign(symbol: &str, eqn: &str) -> Assignment {
        Assignment::new(sym(symbol), parse(eqn).unwrap().unwrap())
    }

    fn graph_of(assignments: &[Assignment]) -> DependencyGraph {
        let refs: Vec<&Assignment> = assignments.iter().collect();
        dependency_graph(&refs)
    }

    #[test]
    fn test_dependency_graph_simple() {
        let assignments = [
            assign("TVCL", "THETA(1)*WGT"),
            assign("CL", "TVCL*EXP(ETA(1))"),
        ];
        let graph = graph_of(&assignments);

        assert_eq!(
            BTreeSet::from([sym("THETA(1)"), sym("WGT")]),
            graph[&sym("TVCL")]
        );
        assert_eq!(
            BTreeSet::from([sym("TVCL"), sym("ETA(1)")]),
            graph[&sym("CL")]
        );
    }

    #[test]
    fn test_redefinition_folding() {
        // [A = X, B = A, A = Y]: B aliased the first definition of A, so
        // after A is redefined B's entry must hold X, not a stale A
        let assignments = [assign("A", "X"), assign("B", "A"), assign("A", "Y")];
        let graph = graph_of(&assignments);

        assert_eq!(BTreeSet::from([sym("X")]), graph[&sym("B")]);
        assert_eq!(BTreeSet::from([sym("Y")]), graph[&sym("A")]);
    }

    #[test]
    fn test_self_redefinition_folds_through() {
        // CL = CL + 1 keeps the dependencies of the previous definition
        let assignments = [assign("CL", "THETA(1)"), assign("CL", "CL+1")];
        let graph = graph_of(&assignments);

        assert_eq!(BTreeSet::from([sym("THETA(1)")]), graph[&sym("CL")]);
    }

    #[test]
    fn test_classification() {
        let assignments = [
            assign("X", "1"),
            assign("CL", "THETA(1)*EXP(ETA(1))"),
            assign("V", "THETA(2)"),
            assign("S1", "V"),
            assign("K", "CL/V"),
            assign("KINV", "V/CL"),
            assign("SUM", "CL+V"),
            assign("XREF", "X"),
        ];
        let refs: Vec<&Assignment> = assignments.iter().collect();
        let classified = classify_assignments(&refs);

        let by_name: BTreeMap<&str, Classification> = classified
            .iter()
            .map(|(c, a)| (a.symbol.as_str(), *c))
            .collect();

        // constants are natural and do not qualify as alias targets
        assert_eq!(Classification::Natural, by_name["X"]);
        assert_eq!(Classification::Natural, by_name["XREF"]);
        assert_eq!(Classification::Natural, by_name["CL"]);
        assert_eq!(Classification::Natural, by_name["V"]);
        // aliases and parameter ratios are synthetic
        assert_eq!(Classification::Synthetic, by_name["S1"]);
        assert_eq!(Classification::Synthetic, by_name["K"]);
        assert_eq!(Classification::Synthetic, by_name["KINV"]);
        // a sum is not a ratio
        assert_eq!(Classification::Natural, by_name["SUM"]);
    }

    #[test]
    fn test_self_referential_is_natural() {
        let assignments = [assign("CL", "THETA(1)"), assign("CL", "CL+1")];
        let refs: Vec<&Assignment> = assignments.iter().collect();
        let classified = classify_assignments(&refs);
        assert!(classified.iter().all(|(c, _)| *c == Classification::Natural));
    }

    #[test]
    fn test_eliminate_ratio() {
        let assignments = [
            assign("CL", "THETA(1)*EXP(ETA(1))"),
            assign("V", "THETA(2)*EXP(ETA(2))"),
            assign("K", "CL/V"),
            assign("CP", "A/K"),
        ];
        let refs: Vec<&Assignment> = assignments.iter().collect();
        let natural = natural_assignments(&refs);

        let names: Vec<&str> = natural.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(vec!["CL", "V", "CP"], names);

        // no reference to K survives anywhere
        for a in natural.iter() {
            assert!(!a.free_symbols().contains(&sym("K")), "stale K in {a:?}");
        }

        // CP = A/(CL/V): numerically identical to the original chain
        let cp = &natural[2].expression;
        let env = BTreeMap::from([
            (sym("CL"), 3.0),
            (sym("V"), 12.0),
            (sym("A"), 5.0),
        ]);
        let k = 3.0 / 12.0;
        assert_eq!(5.0 / k, cp.eval(&env).unwrap());
    }

    #[test]
    fn test_eliminate_respects_redefinition_boundary() {
        // S aliases V and is used by CL; S is then redefined naturally and
        // used by TVD.  Only CL may see the alias expansion.
        let assignments = [
            assign("V", "THETA(1)"),
            assign("S", "V"),
            assign("CL", "S+WGT"),
            assign("S", "WGT+1"),
            assign("TVD", "S+Q"),
        ];
        let refs: Vec<&Assignment> = assignments.iter().collect();
        let natural = natural_assignments(&refs);

        let names: Vec<&str> = natural.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(vec!["V", "CL", "S", "TVD"], names);

        let by_name: BTreeMap<&str, &Assignment> =
            natural.iter().map(|a| (a.symbol.as_str(), a)).collect();

        // CL saw the alias; its S was replaced by V
        assert_eq!(
            BTreeSet::from([sym("V"), sym("WGT")]),
            by_name["CL"].free_symbols()
        );
        // TVD follows the natural redefinition and is untouched
        assert_eq!(
            BTreeSet::from([sym("S"), sym("Q")]),
            by_name["TVD"].free_symbols()
        );
    }
}
