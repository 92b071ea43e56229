// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The serialization-facing project description: equations are plain
//! strings and nothing is parsed or validated here.  `Model::from_datamodel`
//! turns these into the symbolic representation; `json.rs` mirrors these
//! types for interchange.

#[derive(Clone, PartialEq, Debug)]
pub struct AssignmentDef {
    pub symbol: String,
    pub equation: String,
}

impl AssignmentDef {
    pub fn new(symbol: &str, equation: &str) -> Self {
        AssignmentDef {
            symbol: symbol.to_owned(),
            equation: equation.to_owned(),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct CompartmentDef {
    pub name: String,
    /// Dose amount equation, when this compartment is dosed.
    pub dose: Option<String>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct FlowDef {
    pub from: String,
    pub to: String,
    pub rate: String,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct CompartmentSystemDef {
    pub compartments: Vec<CompartmentDef>,
    pub flows: Vec<FlowDef>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ParameterDef {
    pub name: String,
    pub init: f64,
    /// None means unbounded on that side.
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub fix: bool,
}

impl ParameterDef {
    pub fn new(name: &str, init: f64) -> Self {
        ParameterDef {
            name: name.to_owned(),
            init,
            lower: None,
            upper: None,
            fix: false,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct RandomVariableDef {
    pub name: String,
    /// One of `iiv`, `iov`, `ruv`.
    pub level: String,
    pub variance: String,
}

impl RandomVariableDef {
    pub fn new(name: &str, level: &str, variance: &str) -> Self {
        RandomVariableDef {
            name: name.to_owned(),
            level: level.to_owned(),
            variance: variance.to_owned(),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct ModelDef {
    pub name: String,
    pub dependent_variable: String,
    pub before_odes: Vec<AssignmentDef>,
    pub odes: Option<CompartmentSystemDef>,
    pub after_odes: Vec<AssignmentDef>,
    pub parameters: Vec<ParameterDef>,
    pub random_variables: Vec<RandomVariableDef>,
}
