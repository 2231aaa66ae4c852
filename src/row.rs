use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::rowtype::RowType;
use crate::value::Value;

pub mod hkey;

pub use hkey::HKey;

/// A fixed-arity tuple of values tagged with its row type.
pub trait Row: Debug + Display {
    fn row_type(&self) -> &Rc<RowType>;

    /// Panics if `index` is outside the row, like slice indexing.
    fn value(&self, index: usize) -> &Value;

    fn field_count(&self) -> usize {
        self.row_type().field_count()
    }

    fn hkey(&self) -> Option<&HKey> {
        None
    }

    fn ancestor_of(&self, that: &dyn Row) -> bool {
        match (self.hkey(), that.hkey()) {
            (Some(mine), Some(theirs)) => mine.is_ancestor_of(theirs),
            _ => false,
        }
    }

    fn compare_to(
        &self,
        other: &dyn Row,
        left_start: usize,
        right_start: usize,
        field_count: usize,
    ) -> Ordering {
        (0..field_count)
            .map(|i| {
                self.value(left_start + i)
                    .compare(other.value(right_start + i))
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

pub type RowRef = Rc<dyn Row>;

#[derive(Debug)]
pub struct ValuesRow {
    row_type: Rc<RowType>,
    values: Vec<Value>,
    hkey: Option<HKey>,
}

impl ValuesRow {
    pub fn new(row_type: Rc<RowType>, values: Vec<Value>) -> Result<Self> {
        if row_type.field_count() != values.len() {
            return Err(Error::InvalidArgument(format!(
                "row of {} values for type {} of {} fields",
                values.len(),
                row_type,
                row_type.field_count()
            )));
        }
        Ok(Self {
            row_type,
            values,
            hkey: None,
        })
    }

    pub fn with_hkey(mut self, hkey: HKey) -> Self {
        self.hkey = Some(hkey);
        self
    }

    pub fn into_ref(self) -> RowRef {
        Rc::new(self)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl Row for ValuesRow {
    fn row_type(&self) -> &Rc<RowType> {
        &self.row_type
    }

    fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }

    fn field_count(&self) -> usize {
        self.values.len()
    }

    fn hkey(&self) -> Option<&HKey> {
        self.hkey.as_ref()
    }
}

impl Display for ValuesRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}

/// Presents a row under another, union-compatible row type.
///
/// Only `row_type()` is overridden; values, hkey and comparisons all go to
/// the shared delegate.
#[derive(Debug)]
pub struct MasqueradingRow {
    row_type: Rc<RowType>,
    delegate: RowRef,
}

impl MasqueradingRow {
    pub fn new(row_type: Rc<RowType>, delegate: RowRef) -> Self {
        Self { row_type, delegate }
    }

    pub fn delegate(&self) -> &RowRef {
        &self.delegate
    }
}

impl Row for MasqueradingRow {
    fn row_type(&self) -> &Rc<RowType> {
        // not the delegate's
        &self.row_type
    }

    fn value(&self, index: usize) -> &Value {
        self.delegate.value(index)
    }

    fn field_count(&self) -> usize {
        self.delegate.field_count()
    }

    fn hkey(&self) -> Option<&HKey> {
        self.delegate.hkey()
    }

    fn ancestor_of(&self, that: &dyn Row) -> bool {
        self.delegate.ancestor_of(that)
    }

    fn compare_to(
        &self,
        other: &dyn Row,
        left_start: usize,
        right_start: usize,
        field_count: usize,
    ) -> Ordering {
        self.delegate
            .compare_to(other, left_start, right_start, field_count)
    }
}

impl Display for MasqueradingRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of type {}", self.delegate, self.row_type)
    }
}

pub struct Pretty<'a>(pub &'a [RowRef]);

impl<'a> Display for Pretty<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.0 {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}
