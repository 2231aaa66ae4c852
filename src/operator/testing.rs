//! Fixtures shared by operator tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bindings::{BoxBindingsCursor, QueryBindings, QueryBindingsCursor};
use crate::context::QueryContext;
use crate::cursor::{BoxCursor, CursorLifecycle, RowProducer};
use crate::error::{Error, Result};
use crate::explain::{Attributes, ExplainType, Explainer, Label};
use crate::row::{Row, RowRef, ValuesRow};
use crate::rowtype::{RowType, Schema};
use crate::value::{ScalarType, TypeClass, Value};

use super::{Describable, Operator, OperatorRef};

pub fn int_type(schema: &Schema, fields: usize) -> Rc<RowType> {
    schema.new_values_type(vec![Some(ScalarType::not_null(TypeClass::BigInt)); fields])
}

pub fn int_rows(row_type: &Rc<RowType>, rows: &[&[i64]]) -> Vec<RowRef> {
    rows.iter()
        .map(|values| {
            let values = values.iter().map(|v| Value::BigInt(*v)).collect();
            ValuesRow::new(row_type.clone(), values).unwrap().into_ref()
        })
        .collect()
}

pub fn firsts(rows: &[RowRef]) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.value(0) {
            Value::BigInt(v) => *v,
            other => panic!("unexpected value {}", other),
        })
        .collect()
}

pub fn collect(cursor: &mut BoxCursor) -> Result<Vec<RowRef>> {
    cursor.open()?;
    let mut rows = vec![];
    while let Some(row) = cursor.next()? {
        rows.push(row);
    }
    Ok(rows)
}

pub fn bind(cursor: &mut BoxCursor) -> Result<Rc<QueryBindings>> {
    cursor.open_bindings()?;
    match cursor.next_bindings()? {
        Some(bindings) => Ok(bindings),
        None => Err(Error::NoBindings { cursor: "test" }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Open(&'static str),
    Next(&'static str),
    Close(&'static str),
    Destroy(&'static str),
    CloseBindings(&'static str),
    CancelBindings(&'static str),
}

pub type History = Rc<RefCell<Vec<Op>>>;

/// Scan that records every cursor call in a shared history.
///
/// Rows are not checked against the declared type, `fail_at` makes the
/// n-th `next` of an activation fail, and a detached scan answers
/// `next_bindings` with activations of its own.
pub struct TraceScan {
    name: &'static str,
    rows: Vec<RowRef>,
    row_type: Rc<RowType>,
    history: History,
    fail_at: Option<usize>,
    detached: bool,
}

impl TraceScan {
    pub fn new(
        name: &'static str,
        rows: Vec<RowRef>,
        row_type: Rc<RowType>,
        history: &History,
    ) -> Self {
        Self {
            name,
            rows,
            row_type,
            history: history.clone(),
            fail_at: None,
            detached: false,
        }
    }

    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn into_ref(self) -> OperatorRef {
        Rc::new(self)
    }
}

impl Describable for TraceScan {
    fn name(&self) -> &'static str {
        self.name
    }

    fn explain(&self) -> Explainer {
        let mut att = Attributes::new();
        att.put(Label::Name, Explainer::string(self.name));
        Explainer::compound(ExplainType::Scan, att)
    }

    fn describe_plan(&self) -> String {
        self.name.to_string()
    }
}

impl Operator for TraceScan {
    fn row_type(&self) -> Rc<RowType> {
        self.row_type.clone()
    }

    fn input_operators(&self) -> Vec<OperatorRef> {
        vec![]
    }

    fn cursor(
        &self,
        _context: &QueryContext,
        bindings_cursor: BoxBindingsCursor,
    ) -> Result<BoxCursor> {
        Ok(Box::new(TraceCursor {
            name: self.name,
            lifecycle: CursorLifecycle::new(self.name),
            bindings_cursor,
            rows: self.rows.clone(),
            position: 0,
            history: self.history.clone(),
            fail_at: self.fail_at,
            detached: self.detached,
        }))
    }
}

struct TraceCursor {
    name: &'static str,
    lifecycle: CursorLifecycle,
    bindings_cursor: BoxBindingsCursor,
    rows: Vec<RowRef>,
    position: usize,
    history: History,
    fail_at: Option<usize>,
    detached: bool,
}

impl RowProducer for TraceCursor {
    fn open(&mut self) -> Result<()> {
        self.history.borrow_mut().push(Op::Open(self.name));
        self.lifecycle.check_idle("open")?;
        self.position = 0;
        self.lifecycle.set_active();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<RowRef>> {
        self.history.borrow_mut().push(Op::Next(self.name));
        self.lifecycle.check_idle_or_active("next")?;
        if self.lifecycle.is_idle() {
            return Ok(None);
        }
        if self.fail_at == Some(self.position) {
            return Err(anyhow::anyhow!("{}: storage failure", self.name).into());
        }
        let row = self.rows.get(self.position).cloned();
        self.position += 1;
        if row.is_none() {
            self.lifecycle.set_idle();
        }
        Ok(row)
    }

    fn close(&mut self) -> Result<()> {
        self.history.borrow_mut().push(Op::Close(self.name));
        self.lifecycle.check_idle_or_active("close")?;
        self.lifecycle.set_idle();
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.history.borrow_mut().push(Op::Destroy(self.name));
        self.lifecycle.set_destroyed();
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.lifecycle.is_idle()
    }

    fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }
}

impl QueryBindingsCursor for TraceCursor {
    fn open_bindings(&mut self) -> Result<()> {
        self.bindings_cursor.open_bindings()
    }

    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
        let bindings = self.bindings_cursor.next_bindings()?;
        if self.detached {
            return Ok(bindings.map(|_| QueryBindings::new()));
        }
        Ok(bindings)
    }

    fn close_bindings(&mut self) -> Result<()> {
        self.history.borrow_mut().push(Op::CloseBindings(self.name));
        self.bindings_cursor.close_bindings()
    }

    fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()> {
        self.history.borrow_mut().push(Op::CancelBindings(self.name));
        self.bindings_cursor.cancel_bindings(bindings)
    }
}
