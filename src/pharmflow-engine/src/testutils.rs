// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Shared model definitions for tests.

use crate::datamodel::{
    AssignmentDef, CompartmentDef, CompartmentSystemDef, FlowDef, ModelDef, ParameterDef,
    RandomVariableDef,
};

fn positive(name: &str, init: f64) -> ParameterDef {
    ParameterDef {
        name: name.to_owned(),
        init,
        lower: Some(0.0),
        upper: None,
        fix: false,
    }
}

/// A pheno-like one-compartment model: IV bolus, first-order elimination,
/// `CL` and `V` with IIV, proportional residual error.
pub fn pheno_def() -> ModelDef {
    ModelDef {
        name: "pheno".to_owned(),
        dependent_variable: "Y".to_owned(),
        before_odes: vec![
            AssignmentDef::new("BTIME", "if AMT>0 then TIME else 0"),
            AssignmentDef::new("TAD", "TIME-BTIME"),
            AssignmentDef::new("TVCL", "THETA(1)*WGT"),
            AssignmentDef::new("TVV", "THETA(2)*WGT"),
            AssignmentDef::new("CL", "TVCL*EXP(ETA(1))"),
            AssignmentDef::new("V", "TVV*EXP(ETA(2))"),
            AssignmentDef::new("S1", "V"),
        ],
        odes: Some(CompartmentSystemDef {
            compartments: vec![
                CompartmentDef {
                    name: "CENTRAL".to_owned(),
                    dose: Some("AMT".to_owned()),
                },
                CompartmentDef {
                    name: "OUTPUT".to_owned(),
                    dose: None,
                },
            ],
            flows: vec![FlowDef {
                from: "CENTRAL".to_owned(),
                to: "OUTPUT".to_owned(),
                rate: "CL/V".to_owned(),
            }],
        }),
        after_odes: vec![
            AssignmentDef::new("F", "A_CENTRAL/S1"),
            AssignmentDef::new("Y", "F+F*EPS(1)"),
        ],
        parameters: vec![
            positive("THETA(1)", 0.00469307),
            positive("THETA(2)", 1.00916),
            positive("OMEGA(1,1)", 0.0309626),
            positive("OMEGA(2,2)", 0.031128),
            positive("SIGMA(1,1)", 0.013241),
        ],
        random_variables: vec![
            RandomVariableDef::new("ETA(1)", "iiv", "OMEGA(1,1)"),
            RandomVariableDef::new("ETA(2)", "iiv", "OMEGA(2,2)"),
            RandomVariableDef::new("EPS(1)", "ruv", "SIGMA(1,1)"),
        ],
    }
}

/// Two distribution compartments exchanging over `Q`, elimination `CL/V1`.
pub fn two_compartment_def() -> ModelDef {
    ModelDef {
        name: "two_compartment".to_owned(),
        dependent_variable: "Y".to_owned(),
        before_odes: vec![
            AssignmentDef::new("CL", "THETA(1)*EXP(ETA(1))"),
            AssignmentDef::new("V1", "THETA(2)*EXP(ETA(2))"),
            AssignmentDef::new("V2", "THETA(3)"),
            AssignmentDef::new("Q", "THETA(4)"),
        ],
        odes: Some(CompartmentSystemDef {
            compartments: vec![
                CompartmentDef {
                    name: "CENTRAL".to_owned(),
                    dose: Some("AMT".to_owned()),
                },
                CompartmentDef {
                    name: "PERIPHERAL".to_owned(),
                    dose: None,
                },
                CompartmentDef {
                    name: "OUTPUT".to_owned(),
                    dose: None,
                },
            ],
            flows: vec![
                FlowDef {
                    from: "CENTRAL".to_owned(),
                    to: "PERIPHERAL".to_owned(),
                    rate: "Q/V1".to_owned(),
                },
                FlowDef {
                    from: "PERIPHERAL".to_owned(),
                    to: "CENTRAL".to_owned(),
                    rate: "Q/V2".to_owned(),
                },
                FlowDef {
                    from: "CENTRAL".to_owned(),
                    to: "OUTPUT".to_owned(),
                    rate: "CL/V1".to_owned(),
                },
            ],
        }),
        after_odes: vec![
            AssignmentDef::new("F", "A_CENTRAL/V1"),
            AssignmentDef::new("Y", "F+F*EPS(1)"),
        ],
        parameters: vec![
            positive("THETA(1)", 0.005),
            positive("THETA(2)", 1.0),
            positive("THETA(3)", 2.0),
            positive("THETA(4)", 0.5),
            positive("OMEGA(1,1)", 0.03),
            positive("OMEGA(2,2)", 0.03),
            positive("SIGMA(1,1)", 0.013),
        ],
        random_variables: vec![
            RandomVariableDef::new("ETA(1)", "iiv", "OMEGA(1,1)"),
            RandomVariableDef::new("ETA(2)", "iiv", "OMEGA(2,2)"),
            RandomVariableDef::new("EPS(1)", "ruv", "SIGMA(1,1)"),
        ],
    }
}

/// First-order absorption from a depot compartment.
pub fn depot_def() -> ModelDef {
    ModelDef {
        name: "depot".to_owned(),
        dependent_variable: "Y".to_owned(),
        before_odes: vec![
            AssignmentDef::new("CL", "THETA(1)*EXP(ETA(1))"),
            AssignmentDef::new("V", "THETA(2)*EXP(ETA(2))"),
            AssignmentDef::new("KA", "THETA(3)*EXP(ETA(3))"),
        ],
        odes: Some(CompartmentSystemDef {
            compartments: vec![
                CompartmentDef {
                    name: "DEPOT".to_owned(),
                    dose: Some("AMT".to_owned()),
                },
                CompartmentDef {
                    name: "CENTRAL".to_owned(),
                    dose: None,
                },
                CompartmentDef {
                    name: "OUTPUT".to_owned(),
                    dose: None,
                },
            ],
            flows: vec![
                FlowDef {
                    from: "DEPOT".to_owned(),
                    to: "CENTRAL".to_owned(),
                    rate: "KA".to_owned(),
                },
                FlowDef {
                    from: "CENTRAL".to_owned(),
                    to: "OUTPUT".to_owned(),
                    rate: "CL/V".to_owned(),
                },
            ],
        }),
        after_odes: vec![
            AssignmentDef::new("F", "A_CENTRAL/V"),
            AssignmentDef::new("Y", "F+F*EPS(1)"),
        ],
        parameters: vec![
            positive("THETA(1)", 0.005),
            positive("THETA(2)", 1.0),
            positive("THETA(3)", 1.5),
            positive("OMEGA(1,1)", 0.03),
            positive("OMEGA(2,2)", 0.03),
            positive("OMEGA(3,3)", 0.03),
            positive("SIGMA(1,1)", 0.013),
        ],
        random_variables: vec![
            RandomVariableDef::new("ETA(1)", "iiv", "OMEGA(1,1)"),
            RandomVariableDef::new("ETA(2)", "iiv", "OMEGA(2,2)"),
            RandomVariableDef::new("ETA(3)", "iiv", "OMEGA(3,3)"),
            RandomVariableDef::new("EPS(1)", "ruv", "SIGMA(1,1)"),
        ],
    }
}

/// One-compartment model whose elimination rate is spelled through the
/// derived constant `K = CL/V`.
pub fn k_rate_def() -> ModelDef {
    let mut def = pheno_def();
    def.name = "k_rate".to_owned();
    def.before_odes = vec![
        AssignmentDef::new("CL", "THETA(1)*EXP(ETA(1))"),
        AssignmentDef::new("V", "THETA(2)*EXP(ETA(2))"),
        AssignmentDef::new("K", "CL/V"),
    ];
    def.odes.as_mut().unwrap().flows[0].rate = "K".to_owned();
    def.after_odes = vec![
        AssignmentDef::new("F", "A_CENTRAL/V"),
        AssignmentDef::new("Y", "F+F*EPS(1)"),
    ];
    def
}
