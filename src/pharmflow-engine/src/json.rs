// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! JSON serialization for model definitions.
//!
//! The types here mirror `datamodel` with serde attributes; conversion is
//! lossless in both directions.  This is the interchange boundary for the
//! model-storage collaborator.

use serde::{Deserialize, Serialize};

use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::datamodel;

// Helper functions for serde skip_serializing_if

fn is_false(val: &bool) -> bool {
    !*val
}

fn is_empty_vec<T>(val: &[T]) -> bool {
    val.is_empty()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub symbol: String,
    pub equation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compartment {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dose: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub from: String,
    pub to: String,
    pub rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentSystem {
    pub compartments: Vec<Compartment>,
    pub flows: Vec<Flow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub init: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upper: Option<f64>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub fix: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomVariable {
    pub name: String,
    pub level: String,
    pub variance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub dependent_variable: String,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub before_odes: Vec<Assignment>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub odes: Option<CompartmentSystem>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub after_odes: Vec<Assignment>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub random_variables: Vec<RandomVariable>,
}

impl From<&datamodel::ModelDef> for Model {
    fn from(def: &datamodel::ModelDef) -> Self {
        Model {
            name: def.name.clone(),
            dependent_variable: def.dependent_variable.clone(),
            before_odes: def.before_odes.iter().map(assignment_to_json).collect(),
            odes: def.odes.as_ref().map(|odes| CompartmentSystem {
                compartments: odes
                    .compartments
                    .iter()
                    .map(|c| Compartment {
                        name: c.name.clone(),
                        dose: c.dose.clone(),
                    })
                    .collect(),
                flows: odes
                    .flows
                    .iter()
                    .map(|f| Flow {
                        from: f.from.clone(),
                        to: f.to.clone(),
                        rate: f.rate.clone(),
                    })
                    .collect(),
            }),
            after_odes: def.after_odes.iter().map(assignment_to_json).collect(),
            parameters: def
                .parameters
                .iter()
                .map(|p| Parameter {
                    name: p.name.clone(),
                    init: p.init,
                    lower: p.lower,
                    upper: p.upper,
                    fix: p.fix,
                })
                .collect(),
            random_variables: def
                .random_variables
                .iter()
                .map(|rv| RandomVariable {
                    name: rv.name.clone(),
                    level: rv.level.clone(),
                    variance: rv.variance.clone(),
                })
                .collect(),
        }
    }
}

fn assignment_to_json(a: &datamodel::AssignmentDef) -> Assignment {
    Assignment {
        symbol: a.symbol.clone(),
        equation: a.equation.clone(),
    }
}

impl From<Model> for datamodel::ModelDef {
    fn from(model: Model) -> Self {
        datamodel::ModelDef {
            name: model.name,
            dependent_variable: model.dependent_variable,
            before_odes: model
                .before_odes
                .into_iter()
                .map(assignment_from_json)
                .collect(),
            odes: model.odes.map(|odes| datamodel::CompartmentSystemDef {
                compartments: odes
                    .compartments
                    .into_iter()
                    .map(|c| datamodel::CompartmentDef {
                        name: c.name,
                        dose: c.dose,
                    })
                    .collect(),
                flows: odes
                    .flows
                    .into_iter()
                    .map(|f| datamodel::FlowDef {
                        from: f.from,
                        to: f.to,
                        rate: f.rate,
                    })
                    .collect(),
            }),
            after_odes: model
                .after_odes
                .into_iter()
                .map(assignment_from_json)
                .collect(),
            parameters: model
                .parameters
                .into_iter()
                .map(|p| datamodel::ParameterDef {
                    name: p.name,
                    init: p.init,
                    lower: p.lower,
                    upper: p.upper,
                    fix: p.fix,
                })
                .collect(),
            random_variables: model
                .random_variables
                .into_iter()
                .map(|rv| datamodel::RandomVariableDef {
                    name: rv.name,
                    level: rv.level,
                    variance: rv.variance,
                })
                .collect(),
        }
    }
}

fn assignment_from_json(a: Assignment) -> datamodel::AssignmentDef {
    datamodel::AssignmentDef {
        symbol: a.symbol,
        equation: a.equation,
    }
}

/// Serialize a model definition as pretty-printed JSON.
pub fn to_json(def: &datamodel::ModelDef) -> String {
    let model = Model::from(def);
    serde_json::to_string_pretty(&model).expect("model definitions always serialize")
}

/// Deserialize a model definition from JSON.
pub fn from_json(text: &str) -> Result<datamodel::ModelDef> {
    let model: Model = serde_json::from_str(text).map_err(|err| {
        Error::new(
            ErrorKind::Model,
            ErrorCode::JsonDeserialization,
            Some(err.to_string()),
        )
    })?;
    Ok(model.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::testutils::pheno_def;

    #[test]
    fn test_roundtrip() {
        let def = pheno_def();
        let text = to_json(&def);
        let back = from_json(&text).unwrap();
        assert_eq!(def, back);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let def = pheno_def();
        let text = to_json(&def);
        // unbounded parameters carry no bounds keys, undosed compartments
        // no dose key
        assert!(!text.contains("\"upper\""));
        assert!(text.contains("\"lower\""));
        assert!(text.contains("\"dose\""));

        let mut minimal = pheno_def();
        minimal.odes = None;
        minimal.after_odes.clear();
        let text = to_json(&minimal);
        assert!(!text.contains("\"odes\""));
        assert!(!text.contains("\"after_odes\""));
    }

    #[test]
    fn test_bad_json() {
        let err = from_json("{\"name\": 3}").unwrap_err();
        assert_eq!(ErrorCode::JsonDeserialization, err.code);
    }
}
