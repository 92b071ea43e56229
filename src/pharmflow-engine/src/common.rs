// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

/// The name of a scalar quantity in a model: a parameter, covariate,
/// random effect, intermediate variable, or compartment amount.
///
/// Names are case-significant and compared verbatim; `THETA(1)` and
/// `A_CENTRAL` are ordinary symbols.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Symbol(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol(name.to_owned())
    }
}

/// Shorthand constructor used pervasively in analysis code and tests.
pub fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    Generic,
    UnknownSymbol,
    UnknownRandomVariable,
    UnknownCompartment,
    UnknownRecord,
    UnsupportedKind,
    UnsupportedStructuralChange,
    AmbiguousErrorModel,
    DuplicateParameter,
    DuplicateCompartment,
    MissingOdeSystem,
    MultipleOdeSystems,
    NoOutputCompartment,
    MultipleOutputCompartments,
    EquationErrors,
    JsonDeserialization,
    BadRecordText,
    NonNumericValue,
    InvalidToken,
    UnrecognizedToken,
    UnrecognizedEof,
    ExtraToken,
    ExpectedNumber,
    EmptyEquation,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            Generic => "generic",
            UnknownSymbol => "unknown_symbol",
            UnknownRandomVariable => "unknown_random_variable",
            UnknownCompartment => "unknown_compartment",
            UnknownRecord => "unknown_record",
            UnsupportedKind => "unsupported_kind",
            UnsupportedStructuralChange => "unsupported_structural_change",
            AmbiguousErrorModel => "ambiguous_error_model",
            DuplicateParameter => "duplicate_parameter",
            DuplicateCompartment => "duplicate_compartment",
            MissingOdeSystem => "missing_ode_system",
            MultipleOdeSystems => "multiple_ode_systems",
            NoOutputCompartment => "no_output_compartment",
            MultipleOutputCompartments => "multiple_output_compartments",
            EquationErrors => "equation_errors",
            JsonDeserialization => "json_deserialization",
            BadRecordText => "bad_record_text",
            NonNumericValue => "non_numeric_value",
            InvalidToken => "invalid_token",
            UnrecognizedToken => "unrecognized_token",
            UnrecognizedEof => "unrecognized_eof",
            ExtraToken => "extra_token",
            ExpectedNumber => "expected_number",
            EmptyEquation => "empty_equation",
        };

        write!(f, "{name}")
    }
}

/// An error with a span into the equation text it was produced from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquationError {
    pub start: u16,
    pub end: u16,
    pub code: ErrorCode,
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Model,
    Analysis,
    Synchronization,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Model => "ModelError",
            ErrorKind::Analysis => "AnalysisError",
            ErrorKind::Synchronization => "SyncError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;
pub type EquationResult<T> = result::Result<T, EquationError>;

#[macro_export]
macro_rules! eqn_err(
    ($code:tt, $start:expr, $end:expr) => {{
        use $crate::common::{EquationError, ErrorCode};
        Err(EquationError{ start: $start, end: $end, code: ErrorCode::$code})
    }}
);

#[macro_export]
macro_rules! model_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Model, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Model, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! analysis_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Analysis, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Analysis, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! sync_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Synchronization,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Synchronization, ErrorCode::$code, None))
    }};
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Analysis,
        ErrorCode::UnknownSymbol,
        Some("WT".to_string()),
    );
    assert_eq!("AnalysisError{unknown_symbol: WT}", format!("{err}"));

    let err = Error::new(ErrorKind::Synchronization, ErrorCode::UnsupportedStructuralChange, None);
    assert_eq!("SyncError{unsupported_structural_change}", format!("{err}"));
}

#[test]
fn test_symbol_ordering() {
    let mut syms = vec![sym("V"), sym("CL"), sym("THETA(2)"), sym("THETA(1)")];
    syms.sort();
    let names: Vec<&str> = syms.iter().map(|s| s.as_str()).collect();
    assert_eq!(vec!["CL", "THETA(1)", "THETA(2)", "V"], names);
}
