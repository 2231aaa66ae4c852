use std::rc::Rc;

use crate::bindings::{BoxBindingsCursor, QueryBindings, QueryBindingsCursor};
use crate::context::QueryContext;
use crate::cursor::{BoxCursor, CursorLifecycle, RowProducer};
use crate::error::{Error, Result};
use crate::explain::{Attributes, ExplainType, Explainer, Label};
use crate::row::{Row, RowRef};
use crate::rowtype::RowType;
use crate::tap::InOutTap;

use super::{Describable, Operator, OperatorRef};

const NAME: &str = "ValuesScan";

/// Leaf producing a fixed list of rows, from the first one on every open.
pub struct ValuesScan {
    rows: Rc<[RowRef]>,
    row_type: Rc<RowType>,
}

impl ValuesScan {
    pub fn new(rows: Vec<RowRef>, row_type: Rc<RowType>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| !Rc::ptr_eq(r.row_type(), &row_type)) {
            return Err(Error::InvalidArgument(format!(
                "{}: row {} is of type {}, not {}",
                NAME,
                row,
                row.row_type(),
                row_type
            )));
        }
        if let Some(row) = rows
            .iter()
            .find(|r| r.field_count() != row_type.field_count())
        {
            return Err(Error::InvalidArgument(format!(
                "{}: row {} has {} fields, type {} has {}",
                NAME,
                row,
                row.field_count(),
                row_type,
                row_type.field_count()
            )));
        }
        Ok(Self {
            rows: rows.into(),
            row_type,
        })
    }

    pub fn rows(&self) -> &[RowRef] {
        &self.rows
    }
}

impl Describable for ValuesScan {
    fn name(&self) -> &'static str {
        NAME
    }

    fn explain(&self) -> Explainer {
        let mut att = Attributes::new();
        att.put(Label::Name, Explainer::string(NAME));
        att.put(Label::RowCount, Explainer::long(self.rows.len() as i64));
        att.put(Label::OutputType, self.row_type.explain());
        Explainer::compound(ExplainType::Scan, att)
    }

    fn describe_plan(&self) -> String {
        format!("{}({} rows of {})", NAME, self.rows.len(), self.row_type)
    }
}

impl Operator for ValuesScan {
    fn row_type(&self) -> Rc<RowType> {
        self.row_type.clone()
    }

    fn input_operators(&self) -> Vec<OperatorRef> {
        vec![]
    }

    fn cursor(
        &self,
        context: &QueryContext,
        bindings_cursor: BoxBindingsCursor,
    ) -> Result<BoxCursor> {
        Ok(Box::new(Execution {
            context: context.clone(),
            lifecycle: CursorLifecycle::new(NAME),
            bindings_cursor,
            bindings: None,
            rows: self.rows.clone(),
            position: 0,
            tap_next: context.next_tap("operator: ValuesScan next"),
        }))
    }
}

struct Execution {
    context: QueryContext,
    lifecycle: CursorLifecycle,
    bindings_cursor: BoxBindingsCursor,
    bindings: Option<Rc<QueryBindings>>,
    rows: Rc<[RowRef]>,
    position: usize,
    tap_next: InOutTap,
}

impl RowProducer for Execution {
    fn open(&mut self) -> Result<()> {
        self.lifecycle.check_idle("open")?;
        self.position = 0;
        self.lifecycle.set_active();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<RowRef>> {
        let _tap = self.tap_next.enter();
        self.lifecycle.check_idle_or_active("next")?;
        if self.lifecycle.is_idle() {
            return Ok(None);
        }
        match self.rows.get(self.position) {
            Some(row) => {
                self.position += 1;
                if self.context.log_execution() {
                    tracing::debug!("ValuesScan: yield {}", row);
                }
                Ok(Some(row.clone()))
            }
            None => {
                self.close()?;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.lifecycle.check_idle_or_active("close")?;
        self.lifecycle.set_idle();
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.lifecycle.set_destroyed();
        self.bindings = None;
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

impl QueryBindingsCursor for Execution {
    fn open_bindings(&mut self) -> Result<()> {
        self.bindings = None;
        self.bindings_cursor.open_bindings()
    }

    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
        self.bindings = self.bindings_cursor.next_bindings()?;
        Ok(self.bindings.clone())
    }

    fn close_bindings(&mut self) -> Result<()> {
        self.bindings_cursor.close_bindings()
    }

    fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()> {
        let current = match &self.bindings {
            Some(current) => current.descends_from(bindings),
            None => false,
        };
        if current && self.lifecycle.is_active() {
            self.close()?;
        }
        self.bindings_cursor.cancel_bindings(bindings)
    }
}
