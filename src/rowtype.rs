use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::explain::{Attributes, ExplainType, Explainer, Label};
use crate::value::ScalarType;

static NEXT_SCHEMA_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowTypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTypeKind {
    Values,
    Derived,
}

/// Structural descriptor of a row: arity plus one optional type instance per
/// field. A `None` field type means "unknown", and unifies with anything.
#[derive(Debug)]
pub struct RowType {
    id: RowTypeId,
    schema_id: u32,
    kind: RowTypeKind,
    fields: Vec<Option<ScalarType>>,
}

impl RowType {
    pub fn id(&self) -> RowTypeId {
        self.id
    }

    pub fn kind(&self) -> RowTypeKind {
        self.kind
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn type_at(&self, index: usize) -> Option<&ScalarType> {
        self.fields.get(index).and_then(Option::as_ref)
    }

    pub fn fields(&self) -> &[Option<ScalarType>] {
        &self.fields
    }

    pub fn type_string(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|field| match field {
                Some(t) => t.to_string(),
                None => "null".to_string(),
            })
            .collect();
        format!("[{}]", fields.join(", "))
    }

    pub fn explain(&self) -> Explainer {
        let mut att = Attributes::new();
        att.put(Label::Name, Explainer::string(self.to_string()));
        att.put(Label::FieldTypes, Explainer::string(self.type_string()));
        Explainer::compound(ExplainType::RowType, att)
    }
}

impl PartialEq for RowType {
    fn eq(&self, other: &Self) -> bool {
        self.schema_id == other.schema_id && self.id == other.id
    }
}

impl Eq for RowType {}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RowTypeKind::Values => write!(f, "values({})", self.id.0),
            RowTypeKind::Derived => write!(f, "derived({})", self.id.0),
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    id: u32,
    next_type_id: Cell<u32>,
    derived: RefCell<HashMap<Vec<Option<ScalarType>>, Rc<RowType>>>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed),
            next_type_id: Cell::new(1),
            derived: RefCell::new(HashMap::new()),
        }
    }

    fn allocate(&self, kind: RowTypeKind, fields: Vec<Option<ScalarType>>) -> Rc<RowType> {
        let id = self.next_type_id.get();
        self.next_type_id.set(id + 1);
        Rc::new(RowType {
            id: RowTypeId(id),
            schema_id: self.id,
            kind,
            fields,
        })
    }

    /// Registers a fresh row type. Two calls with the same fields give two
    /// distinct types.
    pub fn new_values_type(&self, fields: Vec<Option<ScalarType>>) -> Rc<RowType> {
        self.allocate(RowTypeKind::Values, fields)
    }

    fn derived_type(&self, fields: Vec<Option<ScalarType>>) -> Rc<RowType> {
        if let Some(existing) = self.derived.borrow().get(&fields) {
            return existing.clone();
        }
        let row_type = self.allocate(RowTypeKind::Derived, fields.clone());
        self.derived.borrow_mut().insert(fields, row_type.clone());
        row_type
    }

    fn check_owned(&self, row_type: &RowType) -> Result<()> {
        if row_type.schema_id != self.id {
            return Err(Error::InvalidArgument(format!(
                "row type {} belongs to another schema",
                row_type
            )));
        }
        Ok(())
    }

    /// Identical inputs come back unchanged; merged types are memoized on
    /// their field list.
    pub fn union_row_type(&self, left: &Rc<RowType>, right: &Rc<RowType>) -> Result<Rc<RowType>> {
        self.check_owned(left)?;
        self.check_owned(right)?;
        if Rc::ptr_eq(left, right) {
            return Ok(left.clone());
        }
        if left.field_count() != right.field_count() {
            return Err(not_same_shape(left, right));
        }
        let mut fields = Vec::with_capacity(left.field_count());
        for (l, r) in left.fields.iter().zip(right.fields.iter()) {
            let merged = match (l, r) {
                (l, r) if l == r => *l,
                (None, r) => *r,
                (l, None) => *l,
                _ => return Err(not_same_shape(left, right)),
            };
            fields.push(merged);
        }
        Ok(self.derived_type(fields))
    }
}

fn not_same_shape(left: &RowType, right: &RowType) -> Error {
    Error::ShapeMismatch {
        left: left.to_string(),
        left_fields: left.type_string(),
        right: right.to_string(),
        right_fields: right.type_string(),
    }
}
