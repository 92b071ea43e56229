// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::ast::Expr;
use crate::common::{Error, ErrorCode, ErrorKind, Result, Symbol};
use crate::model_err;

/// Where a random effect varies: between subjects, between occasions
/// within a subject, or residual (observation-level).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VariabilityLevel {
    Iiv,
    Iov,
    Ruv,
}

impl FromStr for VariabilityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "iiv" => Ok(VariabilityLevel::Iiv),
            "iov" => Ok(VariabilityLevel::Iov),
            "ruv" => Ok(VariabilityLevel::Ruv),
            _ => Err(Error::new(
                ErrorKind::Analysis,
                ErrorCode::UnsupportedKind,
                Some(s.to_owned()),
            )),
        }
    }
}

/// Which etas an analysis should consider.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EtaSelection {
    All,
    Iiv,
    Iov,
}

impl FromStr for EtaSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(EtaSelection::All),
            "iiv" => Ok(EtaSelection::Iiv),
            "iov" => Ok(EtaSelection::Iov),
            _ => Err(Error::new(
                ErrorKind::Analysis,
                ErrorCode::UnsupportedKind,
                Some(s.to_owned()),
            )),
        }
    }
}

/// A zero-mean normal random effect with a symbolic variance, typically a
/// single variance-parameter reference like `OMEGA(1,1)`.
#[derive(Clone, PartialEq, Debug)]
pub struct RandomVariable {
    pub name: String,
    pub level: VariabilityLevel,
    pub variance: Expr,
}

impl RandomVariable {
    pub fn new(name: &str, level: VariabilityLevel, variance: Expr) -> Self {
        RandomVariable {
            name: name.to_owned(),
            level,
            variance,
        }
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(self.name.as_str())
    }

    /// The random variable's own symbol plus its variance symbols.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut symbols = self.variance.free_symbols();
        symbols.insert(self.symbol());
        symbols
    }

    pub fn has_zero_variance(&self) -> bool {
        matches!(self.variance, Expr::Const(_, n) if n == 0.0)
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct RandomVariables(Vec<RandomVariable>);

impl RandomVariables {
    pub fn new(rvs: Vec<RandomVariable>) -> Result<Self> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for rv in rvs.iter() {
            if !names.insert(rv.name.as_str()) {
                return model_err!(DuplicateParameter, rv.name.clone());
            }
        }
        Ok(RandomVariables(rvs))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RandomVariable> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RandomVariable> {
        self.0.iter().find(|rv| rv.name == name)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.0.iter().map(|rv| rv.name.clone()).collect()
    }

    /// Subject-level random effects (IIV and IOV).
    pub fn etas(&self) -> Vec<&RandomVariable> {
        self.0
            .iter()
            .filter(|rv| rv.level != VariabilityLevel::Ruv)
            .collect()
    }

    /// Residual random effects.
    pub fn epsilons(&self) -> Vec<&RandomVariable> {
        self.0
            .iter()
            .filter(|rv| rv.level == VariabilityLevel::Ruv)
            .collect()
    }

    pub fn select_etas(&self, selection: EtaSelection) -> Vec<&RandomVariable> {
        self.0
            .iter()
            .filter(|rv| match selection {
                EtaSelection::All => rv.level != VariabilityLevel::Ruv,
                EtaSelection::Iiv => rv.level == VariabilityLevel::Iiv,
                EtaSelection::Iov => rv.level == VariabilityLevel::Iov,
            })
            .collect()
    }

    pub fn get_variance(&self, name: &str) -> Result<&Expr> {
        match self.get(name) {
            Some(rv) => Ok(&rv.variance),
            None => Err(Error::new(
                ErrorKind::Analysis,
                ErrorCode::UnknownRandomVariable,
                Some(name.to_owned()),
            )),
        }
    }

    /// Names of every parameter referenced by a variance expression, e.g.
    /// `OMEGA(1,1)`.  Used to tell apart fresh structural parameters from
    /// parameters already accounted for by the random-effect records.
    pub fn parameter_names(&self) -> BTreeSet<String> {
        self.0
            .iter()
            .flat_map(|rv| rv.variance.free_symbols())
            .map(|s| s.as_str().to_owned())
            .collect()
    }
}
