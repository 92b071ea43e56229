// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;

use crate::common::{Result, Symbol};
use crate::model_err;

/// A population parameter with its initial estimate and bounds.  Unbounded
/// sides are plus/minus infinity.
#[derive(Clone, PartialEq, Debug)]
pub struct Parameter {
    pub name: String,
    pub init: f64,
    pub lower: f64,
    pub upper: f64,
    pub fix: bool,
}

impl Parameter {
    pub fn new(name: &str, init: f64) -> Self {
        Parameter {
            name: name.to_owned(),
            init,
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            fix: false,
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fix = true;
        self
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(self.name.as_str())
    }
}

/// The model's parameter set: unique names, insertion order preserved.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Parameters(Vec<Parameter>);

impl Parameters {
    pub fn new(params: Vec<Parameter>) -> Result<Self> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for p in params.iter() {
            if !names.insert(p.name.as_str()) {
                return model_err!(DuplicateParameter, p.name.clone());
            }
        }
        Ok(Parameters(params))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.0.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.0.iter().map(|p| p.name.clone()).collect()
    }

    /// A copy with `name` renamed; a no-op when the name is absent.
    pub fn renamed(&self, name: &str, new_name: &str) -> Parameters {
        Parameters(
            self.0
                .iter()
                .map(|p| {
                    if p.name == name {
                        let mut p = p.clone();
                        p.name = new_name.to_owned();
                        p
                    } else {
                        p.clone()
                    }
                })
                .collect(),
        )
    }
}

impl From<Parameters> for Vec<Parameter> {
    fn from(params: Parameters) -> Self {
        params.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn test_unique_names() {
        let err = Parameters::new(vec![
            Parameter::new("TVCL", 0.004),
            Parameter::new("TVCL", 1.0),
        ])
        .unwrap_err();
        assert_eq!(ErrorCode::DuplicateParameter, err.code);
    }

    #[test]
    fn test_lookup_and_rename() {
        let params = Parameters::new(vec![
            Parameter::new("TVCL", 0.004).with_bounds(0.0, f64::INFINITY),
            Parameter::new("TVV", 1.0),
        ])
        .unwrap();

        assert!(params.contains("TVV"));
        assert_eq!(0.004, params.get("TVCL").unwrap().init);

        let renamed = params.renamed("TVV", "THETA(2)");
        assert!(!renamed.contains("TVV"));
        assert!(renamed.contains("THETA(2)"));
        // the original is untouched
        assert!(params.contains("TVV"));
    }
}
