// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The compartmental representation of an ODE system: a directed graph of
//! compartments with rate-labelled flow edges, plus its expansion into an
//! explicit derivative-equation system.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::common::{Result, Symbol};
use crate::model_err;

/// A dose administered into a compartment.  Only the amount matters to the
/// analyses here; administration kinetics live with the estimation layer.
#[derive(Clone, PartialEq, Debug)]
pub struct Dose {
    pub amount: Expr,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Compartment {
    name: String,
    amount: Symbol,
    dose: Option<Dose>,
}

impl Compartment {
    fn new(name: &str, dose: Option<Dose>) -> Self {
        Compartment {
            name: name.to_owned(),
            amount: Symbol::new(format!("A_{name}")),
            dose,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state symbol for this compartment's drug amount, `A_<name>`.
    pub fn amount(&self) -> &Symbol {
        &self.amount
    }

    pub fn dose(&self) -> Option<&Dose> {
        self.dose.as_ref()
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        match &self.dose {
            Some(dose) => dose.amount.free_symbols(),
            None => BTreeSet::new(),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Flow {
    pub from: String,
    pub to: String,
    pub rate: Expr,
}

/// Builder validating the structural invariants on construction: unique
/// compartment names, flows between known compartments, and exactly one
/// output compartment (a compartment with no outflows).
#[derive(Default)]
pub struct CompartmentalSystemBuilder {
    compartments: Vec<Compartment>,
    flows: Vec<Flow>,
}

impl CompartmentalSystemBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_compartment(&mut self, name: &str, dose_amount: Option<Expr>) -> &mut Self {
        self.compartments
            .push(Compartment::new(name, dose_amount.map(|amount| Dose { amount })));
        self
    }

    pub fn add_flow(&mut self, from: &str, to: &str, rate: Expr) -> &mut Self {
        self.flows.push(Flow {
            from: from.to_owned(),
            to: to.to_owned(),
            rate,
        });
        self
    }

    pub fn build(self) -> Result<CompartmentalSystem> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for c in self.compartments.iter() {
            if !names.insert(c.name()) {
                return model_err!(DuplicateCompartment, c.name().to_owned());
            }
        }
        for flow in self.flows.iter() {
            for name in [&flow.from, &flow.to] {
                if !names.contains(name.as_str()) {
                    return model_err!(UnknownCompartment, name.clone());
                }
            }
        }

        let outputs: Vec<&Compartment> = self
            .compartments
            .iter()
            .filter(|c| !self.flows.iter().any(|f| f.from == c.name))
            .collect();
        match outputs.len() {
            0 => return model_err!(NoOutputCompartment),
            1 => (),
            n => return model_err!(MultipleOutputCompartments, format!("{n} candidates")),
        }

        Ok(CompartmentalSystem {
            compartments: self.compartments,
            flows: self.flows,
        })
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct CompartmentalSystem {
    compartments: Vec<Compartment>,
    flows: Vec<Flow>,
}

impl CompartmentalSystem {
    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Number of compartments, output included.
    pub fn len(&self) -> usize {
        self.compartments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compartments.is_empty()
    }

    pub fn get_compartment(&self, name: &str) -> Option<&Compartment> {
        self.compartments.iter().find(|c| c.name() == name)
    }

    /// The unique compartment without outflows; existence is guaranteed by
    /// the builder.
    pub fn output_compartment(&self) -> &Compartment {
        self.compartments
            .iter()
            .find(|c| !self.flows.iter().any(|f| f.from == c.name))
            .expect("validated at construction")
    }

    /// The compartment eliminating into the output compartment.
    pub fn central_compartment(&self) -> &Compartment {
        let output = self.output_compartment().name().to_owned();
        self.compartments
            .iter()
            .find(|c| {
                self.flows
                    .iter()
                    .any(|f| f.from == c.name && f.to == output)
            })
            .unwrap_or(&self.compartments[0])
    }

    /// The first compartment carrying a dose, in declaration order.
    pub fn dosing_compartment(&self) -> Option<&Compartment> {
        self.compartments.iter().find(|c| c.dose.is_some())
    }

    /// A depot: a dosed, non-central compartment whose only outflow feeds
    /// the central compartment.
    pub fn find_depot(&self) -> Option<&Compartment> {
        let central = self.central_compartment().name().to_owned();
        let dosing = self.dosing_compartment()?;
        if dosing.name() == central {
            return None;
        }
        let outflows = self.outflows(dosing.name());
        if outflows.len() == 1 && outflows[0].0.name() == central {
            Some(dosing)
        } else {
            None
        }
    }

    /// Flow edges leaving `name`, in declaration order.
    pub fn outflows(&self, name: &str) -> Vec<(&Compartment, &Expr)> {
        self.flows
            .iter()
            .filter(|f| f.from == name)
            .filter_map(|f| self.get_compartment(&f.to).map(|c| (c, &f.rate)))
            .collect()
    }

    /// Flow edges entering `name`, in declaration order.
    pub fn inflows(&self, name: &str) -> Vec<(&Compartment, &Expr)> {
        self.flows
            .iter()
            .filter(|f| f.to == name)
            .filter_map(|f| self.get_compartment(&f.from).map(|c| (c, &f.rate)))
            .collect()
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut symbols = BTreeSet::new();
        for flow in self.flows.iter() {
            symbols.extend(flow.rate.free_symbols());
        }
        for c in self.compartments.iter() {
            symbols.extend(c.free_symbols());
        }
        symbols
    }

    pub fn subs(&self, mapping: &BTreeMap<Symbol, Expr>) -> CompartmentalSystem {
        CompartmentalSystem {
            compartments: self
                .compartments
                .iter()
                .map(|c| Compartment {
                    name: c.name.clone(),
                    amount: c.amount.clone(),
                    dose: c.dose.as_ref().map(|d| Dose {
                        amount: d.amount.subs(mapping),
                    }),
                })
                .collect(),
            flows: self
                .flows
                .iter()
                .map(|f| Flow {
                    from: f.from.clone(),
                    to: f.to.clone(),
                    rate: f.rate.subs(mapping),
                })
                .collect(),
        }
    }

    /// Expand into explicit derivative equations, one per compartment in
    /// declaration order, with the dose amount as initial condition for
    /// dosed compartments.
    pub fn to_explicit(&self) -> ExplicitOdeSystem {
        let mut odes = Vec::with_capacity(self.compartments.len());
        let mut ics = Vec::with_capacity(self.compartments.len());

        for c in self.compartments.iter() {
            let mut rhs: Option<Expr> = None;
            for (from, rate) in self.inflows(c.name()) {
                let term = Expr::Op2(
                    BinaryOp::Mul,
                    Box::new(rate.clone()),
                    Box::new(Expr::Var(from.amount().clone())),
                );
                rhs = Some(match rhs {
                    Some(e) => Expr::Op2(BinaryOp::Add, Box::new(e), Box::new(term)),
                    None => term,
                });
            }
            for (_, rate) in self.outflows(c.name()) {
                let term = Expr::Op2(
                    BinaryOp::Mul,
                    Box::new(rate.clone()),
                    Box::new(Expr::Var(c.amount().clone())),
                );
                rhs = Some(match rhs {
                    Some(e) => Expr::Op2(BinaryOp::Sub, Box::new(e), Box::new(term)),
                    None => Expr::Op1(UnaryOp::Negative, Box::new(term)),
                });
            }

            odes.push(OdeEquation {
                amount: c.amount().clone(),
                rhs: rhs.unwrap_or_else(|| Expr::num(0.0)),
            });
            ics.push((
                c.amount().clone(),
                match &c.dose {
                    Some(d) => d.amount.clone(),
                    None => Expr::num(0.0),
                },
            ));
        }

        ExplicitOdeSystem { odes, ics }
    }
}

/// One derivative equation, `dA_<name>/dt = rhs`.
#[derive(Clone, PartialEq, Debug)]
pub struct OdeEquation {
    pub amount: Symbol,
    pub rhs: Expr,
}

impl OdeEquation {
    /// The compartment name the amount symbol refers to.
    pub fn compartment_name(&self) -> &str {
        self.amount.as_str().strip_prefix("A_").unwrap_or(self.amount.as_str())
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct ExplicitOdeSystem {
    pub odes: Vec<OdeEquation>,
    /// Initial conditions in the same order as `odes`.
    pub ics: Vec<(Symbol, Expr)>,
}

impl ExplicitOdeSystem {
    /// Free symbols of the system, excluding the state amounts themselves.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let amounts: BTreeSet<&Symbol> = self.odes.iter().map(|eq| &eq.amount).collect();
        let mut symbols = BTreeSet::new();
        for eq in self.odes.iter() {
            symbols.extend(eq.rhs.free_symbols());
        }
        for (_, ic) in self.ics.iter() {
            symbols.extend(ic.free_symbols());
        }
        symbols.retain(|s| !amounts.contains(s));
        symbols
    }

    pub fn subs(&self, mapping: &BTreeMap<Symbol, Expr>) -> ExplicitOdeSystem {
        ExplicitOdeSystem {
            odes: self
                .odes
                .iter()
                .map(|eq| OdeEquation {
                    amount: eq.amount.clone(),
                    rhs: eq.rhs.subs(mapping),
                })
                .collect(),
            ics: self
                .ics
                .iter()
                .map(|(amount, ic)| (amount.clone(), ic.subs(mapping)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::print_eqn;
    use crate::common::{ErrorCode, sym};
    use crate::parser::parse;

    fn rate(eqn: &str) -> Expr {
        parse(eqn).unwrap().unwrap()
    }

    fn one_compartment() -> CompartmentalSystem {
        let mut builder = CompartmentalSystemBuilder::new();
        builder.add_compartment("CENTRAL", Some(Expr::var("AMT")));
        builder.add_compartment("OUTPUT", None);
        builder.add_flow("CENTRAL", "OUTPUT", rate("CL/V"));
        builder.build().unwrap()
    }

    fn depot_model() -> CompartmentalSystem {
        let mut builder = CompartmentalSystemBuilder::new();
        builder.add_compartment("DEPOT", Some(Expr::var("AMT")));
        builder.add_compartment("CENTRAL", None);
        builder.add_compartment("OUTPUT", None);
        builder.add_flow("DEPOT", "CENTRAL", rate("KA"));
        builder.add_flow("CENTRAL", "OUTPUT", rate("CL/V"));
        builder.build().unwrap()
    }

    #[test]
    fn test_distinguished_compartments() {
        let cs = one_compartment();
        assert_eq!("OUTPUT", cs.output_compartment().name());
        assert_eq!("CENTRAL", cs.central_compartment().name());
        assert_eq!("CENTRAL", cs.dosing_compartment().unwrap().name());
        assert!(cs.find_depot().is_none());

        let cs = depot_model();
        assert_eq!("CENTRAL", cs.central_compartment().name());
        assert_eq!("DEPOT", cs.find_depot().unwrap().name());
    }

    #[test]
    fn test_build_validation() {
        let mut builder = CompartmentalSystemBuilder::new();
        builder.add_compartment("CENTRAL", None);
        builder.add_compartment("CENTRAL", None);
        assert_eq!(
            ErrorCode::DuplicateCompartment,
            builder.build().unwrap_err().code
        );

        let mut builder = CompartmentalSystemBuilder::new();
        builder.add_compartment("CENTRAL", None);
        builder.add_flow("CENTRAL", "NOWHERE", rate("K"));
        assert_eq!(
            ErrorCode::UnknownCompartment,
            builder.build().unwrap_err().code
        );

        // a two-compartment loop has no sink
        let mut builder = CompartmentalSystemBuilder::new();
        builder.add_compartment("CENTRAL", None);
        builder.add_compartment("PERIPHERAL", None);
        builder.add_flow("CENTRAL", "PERIPHERAL", rate("Q/V1"));
        builder.add_flow("PERIPHERAL", "CENTRAL", rate("Q/V2"));
        assert_eq!(
            ErrorCode::NoOutputCompartment,
            builder.build().unwrap_err().code
        );
    }

    #[test]
    fn test_free_symbols_include_dose() {
        let cs = one_compartment();
        assert_eq!(
            BTreeSet::from([sym("AMT"), sym("CL"), sym("V")]),
            cs.free_symbols()
        );
    }

    #[test]
    fn test_to_explicit() {
        let es = depot_model().to_explicit();

        let printed: Vec<(String, String)> = es
            .odes
            .iter()
            .map(|eq| (eq.amount.to_string(), print_eqn(&eq.rhs)))
            .collect();
        assert_eq!(
            vec![
                ("A_DEPOT".to_string(), "-KA*A_DEPOT".to_string()),
                (
                    "A_CENTRAL".to_string(),
                    "KA*A_DEPOT-CL/V*A_CENTRAL".to_string()
                ),
                ("A_OUTPUT".to_string(), "CL/V*A_CENTRAL".to_string()),
            ],
            printed
        );

        // only the depot has a nonzero initial condition
        assert_eq!(Expr::var("AMT"), es.ics[0].1);
        assert_eq!(Expr::num(0.0), es.ics[1].1);

        assert_eq!(
            BTreeSet::from([sym("AMT"), sym("CL"), sym("KA"), sym("V")]),
            es.free_symbols()
        );
    }

    #[test]
    fn test_subs_rewrites_rates() {
        let cs = one_compartment();
        let mapping = BTreeMap::from([(sym("CL"), rate("TVCL*EXP(ETA(1))"))]);
        let cs = cs.subs(&mapping);
        let (_, r) = cs.outflows("CENTRAL")[0];
        assert_eq!("TVCL*EXP(ETA(1))/V", print_eqn(r));
    }
}
