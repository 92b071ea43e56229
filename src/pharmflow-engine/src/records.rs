// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The positional record layer of the model-definition control stream.
//!
//! Records are numbered, ordered units (`$THETA` groups, the `$SUBROUTINES`
//! option list, `$MODEL` compartment declarations, `$DES`/`$PK`/`$ERROR`
//! code blocks).  The synchronizer in `update.rs` treats a `ControlStream`
//! as a persistent value: it stages a copy, edits that, and returns it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use float_cmp::approx_eq;
use smallvec::SmallVec;

use crate::ast::print_eqn;
use crate::common::{Result, Symbol};
use crate::params::Parameters;
use crate::statements::Assignment;
use crate::sync_err;
use crate::system::ExplicitOdeSystem;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RecordKind {
    Theta,
    Omega,
    Sigma,
    Subroutines,
    CompModel,
    Des,
    Pk,
    Error,
}

impl RecordKind {
    pub fn tag(&self) -> &'static str {
        match self {
            RecordKind::Theta => "THETA",
            RecordKind::Omega => "OMEGA",
            RecordKind::Sigma => "SIGMA",
            RecordKind::Subroutines => "SUBROUTINES",
            RecordKind::CompModel => "MODEL",
            RecordKind::Des => "DES",
            RecordKind::Pk => "PK",
            RecordKind::Error => "ERROR",
        }
    }

    fn from_tag(tag: &str) -> Option<RecordKind> {
        match tag {
            "THETA" => Some(RecordKind::Theta),
            "OMEGA" => Some(RecordKind::Omega),
            "SIGMA" => Some(RecordKind::Sigma),
            "SUBROUTINES" => Some(RecordKind::Subroutines),
            "MODEL" => Some(RecordKind::CompModel),
            "DES" => Some(RecordKind::Des),
            "PK" => Some(RecordKind::Pk),
            "ERROR" => Some(RecordKind::Error),
            _ => None,
        }
    }

    /// The positional name family for slots of this record kind.
    pub fn placeholder_family(&self) -> Option<&'static str> {
        match self {
            RecordKind::Theta => Some("THETA"),
            RecordKind::Omega => Some("ETA"),
            RecordKind::Sigma => Some("EPS"),
            _ => None,
        }
    }
}

/// `FAMILY(<digits>)` is a positional placeholder name; anything else is a
/// user-chosen name that renumbering must not touch.
pub fn is_placeholder_name(name: &str, family: &str) -> bool {
    let Some(rest) = name.strip_prefix(family) else {
        return false;
    };
    let Some(digits) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) else {
        return false;
    };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// One numbered parameter slot within a `$THETA`/`$OMEGA`/`$SIGMA` record.
#[derive(Clone, PartialEq, Debug)]
pub struct ParamSlot {
    pub name: String,
    /// Global 1-based index across all records of the kind.
    pub index: u32,
    pub init: f64,
    pub lower: f64,
    pub upper: f64,
    pub fix: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ParamRecord {
    kind: RecordKind,
    slots: SmallVec<[ParamSlot; 4]>,
}

impl ParamRecord {
    pub fn new(kind: RecordKind, slots: Vec<ParamSlot>) -> Self {
        ParamRecord {
            kind,
            slots: slots.into(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    /// Symbolic name to record-internal 1-based index.
    pub fn name_map(&self) -> BTreeMap<String, u32> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.name.clone(), (i + 1) as u32))
            .collect()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.slots.iter().map(|s| s.name.clone()).collect()
    }

    pub fn names_in_order(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.name.clone()).collect()
    }

    /// Strip the named slots out of the record.
    pub fn remove(&mut self, names: &BTreeSet<String>) {
        self.slots.retain(|slot| !names.contains(&slot.name));
    }

    /// Renumber slots from `start`, renaming positional placeholder names
    /// to match, and return the next free index.
    pub fn renumber(&mut self, start: u32) -> u32 {
        let family = self.kind.placeholder_family().unwrap_or("THETA");
        for (offset, slot) in self.slots.iter_mut().enumerate() {
            let index = start + offset as u32;
            if slot.index != index {
                if is_placeholder_name(&slot.name, family) {
                    slot.name = format!("{family}({index})");
                }
                slot.index = index;
            }
        }
        start + self.slots.len() as u32
    }

    /// Rename a slot, e.g. to attach a user-chosen parameter name.
    pub fn set_name(&mut self, slot: usize, name: &str) {
        if let Some(slot) = self.slots.get_mut(slot) {
            slot.name = name.to_owned();
        }
    }

    /// Refresh initial estimates and bounds from a parameter set, matching
    /// slots by name.
    pub fn update_values(&mut self, params: &Parameters) {
        for slot in self.slots.iter_mut() {
            if let Some(p) = params.get(&slot.name) {
                if !approx_eq!(f64, slot.init, p.init, ulps = 4) {
                    slot.init = p.init;
                }
                slot.lower = p.lower;
                slot.upper = p.upper;
                slot.fix = p.fix;
            }
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct SubroutinesRecord {
    options: Vec<String>,
}

impl SubroutinesRecord {
    pub fn new(options: Vec<String>) -> Self {
        SubroutinesRecord { options }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn get_option_startswith(&self, prefix: &str) -> Option<&str> {
        self.options
            .iter()
            .map(|o| o.as_str())
            .find(|o| o.starts_with(prefix))
    }

    pub fn remove_option_startswith(&mut self, prefix: &str) {
        self.options.retain(|o| !o.starts_with(prefix));
    }

    pub fn replace_option(&mut self, old: &str, new: &str) {
        for option in self.options.iter_mut() {
            if option == old {
                *option = new.to_owned();
            }
        }
    }

    pub fn append_option(&mut self, option: &str) {
        self.options.push(option.to_owned());
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct CompartmentEntry {
    pub name: String,
    pub dosing: bool,
}

/// The `$MODEL` record: one compartment declaration per equation of an
/// explicitly written system.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct CompModelRecord {
    pub tol: Option<u32>,
    compartments: Vec<CompartmentEntry>,
}

impl CompModelRecord {
    pub fn compartments(&self) -> &[CompartmentEntry] {
        &self.compartments
    }

    pub fn add_compartment(&mut self, name: &str, dosing: bool) {
        self.compartments.push(CompartmentEntry {
            name: name.to_owned(),
            dosing,
        });
    }
}

/// The `$DES` record: derivative assignments, one per non-output equation.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct DesRecord {
    pub statements: Vec<Assignment>,
}

impl DesRecord {
    /// Replace the block with one `DADT(i)` assignment per retained
    /// equation (the trailing output equation is dropped).
    pub fn from_odes(&mut self, odes: &ExplicitOdeSystem) {
        let retained = odes.odes.len().saturating_sub(1);
        self.statements = odes.odes[..retained]
            .iter()
            .enumerate()
            .map(|(i, eq)| {
                Assignment::new(Symbol::new(format!("DADT({})", i + 1)), eq.rhs.clone())
            })
            .collect();
    }
}

/// A `$PK` or `$ERROR` abbreviated-code block.
#[derive(Clone, PartialEq, Debug)]
pub struct CodeRecord {
    kind: RecordKind,
    pub statements: Vec<Assignment>,
}

impl CodeRecord {
    pub fn new(kind: RecordKind, statements: Vec<Assignment>) -> Self {
        CodeRecord { kind, statements }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Record {
    Param(ParamRecord),
    Subroutines(SubroutinesRecord),
    CompModel(CompModelRecord),
    Des(DesRecord),
    Code(CodeRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Param(r) => r.kind(),
            Record::Subroutines(_) => RecordKind::Subroutines,
            Record::CompModel(_) => RecordKind::CompModel,
            Record::Des(_) => RecordKind::Des,
            Record::Code(r) => r.kind(),
        }
    }

    pub fn as_param(&self) -> Option<&ParamRecord> {
        match self {
            Record::Param(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_param_mut(&mut self) -> Option<&mut ParamRecord> {
        match self {
            Record::Param(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_subroutines_mut(&mut self) -> Option<&mut SubroutinesRecord> {
        match self {
            Record::Subroutines(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_comp_model_mut(&mut self) -> Option<&mut CompModelRecord> {
        match self {
            Record::CompModel(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_des_mut(&mut self) -> Option<&mut DesRecord> {
        match self {
            Record::Des(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_code_mut(&mut self) -> Option<&mut CodeRecord> {
        match self {
            Record::Code(r) => Some(r),
            _ => None,
        }
    }
}

/// The ordered record list of one model's control stream.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ControlStream {
    records: Vec<Record>,
}

impl ControlStream {
    pub fn new(records: Vec<Record>) -> Self {
        ControlStream { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get_records(&self, kind: RecordKind) -> Vec<&Record> {
        self.records.iter().filter(|r| r.kind() == kind).collect()
    }

    pub fn param_records(&self, kind: RecordKind) -> Vec<&ParamRecord> {
        self.records
            .iter()
            .filter_map(|r| r.as_param())
            .filter(|r| r.kind() == kind)
            .collect()
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    pub fn first_mut(&mut self, kind: RecordKind) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.kind() == kind)
    }

    /// Parse `text` as a record and insert it after the last record of
    /// `anchor` kind (at the end when no anchor record exists).
    pub fn insert_record(&mut self, text: &str, anchor: RecordKind) -> Result<&mut Record> {
        let record = parse_record(text)?;
        let position = self
            .records
            .iter()
            .rposition(|r| r.kind() == anchor)
            .map(|i| i + 1)
            .unwrap_or(self.records.len());
        self.records.insert(position, record);
        Ok(&mut self.records[position])
    }

    /// Renumber every param record of `kind` into one contiguous run
    /// starting at 1, returning the next free index.
    pub fn renumber_params(&mut self, kind: RecordKind) -> u32 {
        let mut next = 1u32;
        for record in self.records.iter_mut() {
            if let Some(r) = record.as_param_mut()
                && r.kind() == kind
            {
                next = r.renumber(next);
            }
        }
        next
    }

    pub fn remove_records(&mut self, indices: &BTreeSet<usize>) {
        let mut i = 0;
        self.records.retain(|_| {
            let keep = !indices.contains(&i);
            i += 1;
            keep
        });
    }
}

fn parse_number(token: &str) -> Result<f64> {
    match token {
        "INF" | "+INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        _ => token
            .parse::<f64>()
            .or_else(|_| sync_err!(BadRecordText, format!("bad number `{token}`"))),
    }
}

/// Split a param record body into items, keeping parenthesized groups
/// together.
fn param_items(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0u32;
    for c in body.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    items.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        items.push(current);
    }
    items
}

fn parse_param_record(kind: RecordKind, body: &str) -> Result<ParamRecord> {
    let family = kind.placeholder_family().expect("param record kind");
    let mut slots: Vec<ParamSlot> = Vec::new();

    for item in param_items(body) {
        if item.eq_ignore_ascii_case("FIX") {
            match slots.last_mut() {
                Some(slot) => slot.fix = true,
                None => return sync_err!(BadRecordText, "FIX without a value".to_owned()),
            }
            continue;
        }

        let (lower, init, upper) = if let Some(inner) =
            item.strip_prefix('(').and_then(|i| i.strip_suffix(')'))
        {
            let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
            match parts.as_slice() {
                [lower, init] => (parse_number(lower)?, parse_number(init)?, f64::INFINITY),
                [lower, init, upper] => {
                    (parse_number(lower)?, parse_number(init)?, parse_number(upper)?)
                }
                _ => return sync_err!(BadRecordText, format!("bad bounds `{item}`")),
            }
        } else {
            (f64::NEG_INFINITY, parse_number(&item)?, f64::INFINITY)
        };

        let index = (slots.len() + 1) as u32;
        slots.push(ParamSlot {
            name: format!("{family}({index})"),
            index,
            init,
            lower,
            upper,
            fix: false,
        });
    }

    Ok(ParamRecord::new(kind, slots))
}

fn parse_comp_model_record(body: &str) -> Result<CompModelRecord> {
    let mut record = CompModelRecord::default();
    for item in param_items(body) {
        if let Some(tol) = item.strip_prefix("TOL=") {
            record.tol = Some(
                tol.parse::<u32>()
                    .or_else(|_| sync_err!(BadRecordText, format!("bad TOL `{item}`")))?,
            );
        } else if let Some(inner) = item
            .strip_prefix("COMP=(")
            .and_then(|i| i.strip_suffix(')'))
        {
            let mut parts = inner.split_whitespace();
            let Some(name) = parts.next() else {
                return sync_err!(BadRecordText, "empty COMP".to_owned());
            };
            let dosing = parts.any(|p| p == "DEFDOSE");
            record.add_compartment(name, dosing);
        } else {
            return sync_err!(BadRecordText, format!("bad MODEL option `{item}`"));
        }
    }
    Ok(record)
}

fn parse_code_statements(body: &str) -> Result<Vec<Assignment>> {
    let mut statements = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((symbol, eqn)) = line.split_once('=') else {
            return sync_err!(BadRecordText, format!("expected assignment `{line}`"));
        };
        let expr = match crate::parser::parse(eqn) {
            Ok(Some(expr)) => expr,
            _ => return sync_err!(BadRecordText, format!("bad equation `{line}`")),
        };
        statements.push(Assignment::new(Symbol::new(symbol.trim()), expr));
    }
    Ok(statements)
}

/// Parse the textual form of a single record.  Only the subset of record
/// text that the synchronizer itself emits is understood; everything else
/// is the external parser collaborator's business.
pub fn parse_record(text: &str) -> Result<Record> {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('$') else {
        return sync_err!(BadRecordText, format!("no record tag in `{text}`"));
    };
    let (tag, body) = match rest.find(|c: char| c.is_whitespace()) {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, ""),
    };
    let Some(kind) = RecordKind::from_tag(tag) else {
        return sync_err!(UnknownRecord, tag.to_owned());
    };

    match kind {
        RecordKind::Theta | RecordKind::Omega | RecordKind::Sigma => {
            Ok(Record::Param(parse_param_record(kind, body)?))
        }
        RecordKind::Subroutines => Ok(Record::Subroutines(SubroutinesRecord::new(
            body.split_whitespace().map(str::to_owned).collect(),
        ))),
        RecordKind::CompModel => Ok(Record::CompModel(parse_comp_model_record(body)?)),
        RecordKind::Des => Ok(Record::Des(DesRecord {
            statements: parse_code_statements(body)?,
        })),
        RecordKind::Pk | RecordKind::Error => Ok(Record::Code(CodeRecord::new(
            kind,
            parse_code_statements(body)?,
        ))),
    }
}

fn fmt_bound(value: f64) -> String {
    if value == f64::INFINITY {
        "INF".to_owned()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_owned()
    } else {
        format!("{value}")
    }
}

fn fmt_slot(slot: &ParamSlot) -> String {
    let mut s = if slot.lower == f64::NEG_INFINITY && slot.upper == f64::INFINITY {
        format!("{}", slot.init)
    } else if slot.upper == f64::INFINITY {
        format!("({},{})", fmt_bound(slot.lower), slot.init)
    } else {
        format!(
            "({},{},{})",
            fmt_bound(slot.lower),
            slot.init,
            fmt_bound(slot.upper)
        )
    };
    if slot.fix {
        s.push_str(" FIX");
    }
    s
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Record::Param(r) => {
                let slots: Vec<String> = r.slots().iter().map(fmt_slot).collect();
                write!(f, "${}  {}", r.kind().tag(), slots.join(" "))
            }
            Record::Subroutines(r) => {
                write!(f, "$SUBROUTINES {}", r.options().join(" "))
            }
            Record::CompModel(r) => {
                write!(f, "$MODEL")?;
                if let Some(tol) = r.tol {
                    write!(f, " TOL={tol}")?;
                }
                for c in r.compartments() {
                    if c.dosing {
                        write!(f, " COMP=({} DEFDOSE)", c.name)?;
                    } else {
                        write!(f, " COMP=({})", c.name)?;
                    }
                }
                Ok(())
            }
            Record::Des(r) => {
                write!(f, "$DES")?;
                for a in r.statements.iter() {
                    write!(f, "\n{}={}", a.symbol, print_eqn(&a.expression))?;
                }
                Ok(())
            }
            Record::Code(r) => {
                write!(f, "${}", r.kind().tag())?;
                for a in r.statements.iter() {
                    write!(f, "\n{}={}", a.symbol, print_eqn(&a.expression))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for ControlStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{record}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_names() {
        assert!(is_placeholder_name("THETA(1)", "THETA"));
        assert!(is_placeholder_name("THETA(12)", "THETA"));
        assert!(!is_placeholder_name("THETA()", "THETA"));
        assert!(!is_placeholder_name("THETA(1", "THETA"));
        assert!(!is_placeholder_name("MAT", "THETA"));
        assert!(!is_placeholder_name("ETA(1)", "THETA"));
    }

    #[test]
    fn test_parse_theta_record() {
        let record = parse_record("$THETA  (0,0.00469307) (0,1.00916) 0.1 FIX").unwrap();
        let r = record.as_param().unwrap();
        assert_eq!(3, r.len());
        assert_eq!(RecordKind::Theta, r.kind());

        let slots = r.slots();
        assert_eq!("THETA(1)", slots[0].name);
        assert_eq!(0.0, slots[0].lower);
        assert_eq!(0.00469307, slots[0].init);
        assert_eq!(f64::INFINITY, slots[0].upper);
        assert!(!slots[0].fix);
        assert!(slots[2].fix);
        assert_eq!(f64::NEG_INFINITY, slots[2].lower);

        assert_eq!(1, r.name_map()["THETA(1)"]);
        assert_eq!(3, r.name_map()["THETA(3)"]);
    }

    #[test]
    fn test_parse_omega_and_bounds() {
        let record = parse_record("$OMEGA 0.0309626").unwrap();
        let r = record.as_param().unwrap();
        assert_eq!("ETA(1)", r.slots()[0].name);

        let record = parse_record("$THETA (-INF,0.5,3)").unwrap();
        let slot = &record.as_param().unwrap().slots()[0];
        assert_eq!(f64::NEG_INFINITY, slot.lower);
        assert_eq!(3.0, slot.upper);
    }

    #[test]
    fn test_parse_subroutines_and_model() {
        let record = parse_record("$SUBROUTINES ADVAN1 TRANS2").unwrap();
        if let Record::Subroutines(r) = &record {
            assert_eq!(Some("ADVAN1"), r.get_option_startswith("ADVAN"));
        } else {
            panic!("expected subroutines record");
        }

        let record = parse_record("$MODEL TOL=3 COMP=(CENTRAL DEFDOSE) COMP=(PERIPHERAL)").unwrap();
        if let Record::CompModel(r) = &record {
            assert_eq!(Some(3), r.tol);
            assert_eq!(2, r.compartments().len());
            assert!(r.compartments()[0].dosing);
            assert!(!r.compartments()[1].dosing);
        } else {
            panic!("expected model record");
        }
    }

    #[test]
    fn test_parse_code_records() {
        let record = parse_record("$DES\nDADT(1)=-K*A_CENTRAL").unwrap();
        if let Record::Des(r) = &record {
            assert_eq!(1, r.statements.len());
            assert_eq!("DADT(1)", r.statements[0].symbol.as_str());
        } else {
            panic!("expected des record");
        }

        let err = parse_record("$BOGUS 1").unwrap_err();
        assert_eq!(crate::common::ErrorCode::UnknownRecord, err.code);
    }

    #[test]
    fn test_renumber_renames_placeholders_only() {
        let mut r = parse_record("$THETA 0.1 0.2 0.3")
            .unwrap()
            .as_param()
            .unwrap()
            .clone();
        r.set_name(1, "MAT");

        let next = r.renumber(4);
        assert_eq!(7, next);

        let slots = r.slots();
        assert_eq!(("THETA(4)", 4), (slots[0].name.as_str(), slots[0].index));
        // user names survive renumbering, only the index moves
        assert_eq!(("MAT", 5), (slots[1].name.as_str(), slots[1].index));
        assert_eq!(("THETA(6)", 6), (slots[2].name.as_str(), slots[2].index));
    }

    #[test]
    fn test_remove_strips_slots() {
        let mut r = parse_record("$THETA 0.1 0.2 0.3")
            .unwrap()
            .as_param()
            .unwrap()
            .clone();
        r.remove(&BTreeSet::from(["THETA(2)".to_owned()]));
        assert_eq!(2, r.len());
        assert_eq!(
            vec!["THETA(1)", "THETA(3)"],
            r.slots().iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_insert_record_after_anchor() {
        let mut stream = ControlStream::new(vec![
            parse_record("$SUBROUTINES ADVAN1 TRANS2").unwrap(),
            parse_record("$PK\nCL=THETA(1)").unwrap(),
            parse_record("$THETA 0.1").unwrap(),
            parse_record("$OMEGA 0.02").unwrap(),
        ]);

        stream.insert_record("$THETA 0.5", RecordKind::Theta).unwrap();
        let kinds: Vec<RecordKind> = stream.records().iter().map(|r| r.kind()).collect();
        assert_eq!(
            vec![
                RecordKind::Subroutines,
                RecordKind::Pk,
                RecordKind::Theta,
                RecordKind::Theta,
                RecordKind::Omega,
            ],
            kinds
        );
    }

    #[test]
    fn test_display_roundtrip() {
        let texts = [
            "$THETA  (0,0.00469307) (0,1.00916,2) 0.1 FIX",
            "$SUBROUTINES ADVAN1 TRANS2",
            "$MODEL TOL=3 COMP=(CENTRAL DEFDOSE)",
        ];
        for text in texts {
            let record = parse_record(text).unwrap();
            let rendered = format!("{record}");
            let reparsed = parse_record(&rendered).unwrap();
            assert_eq!(record, reparsed, "for `{text}`");
        }
    }
}
