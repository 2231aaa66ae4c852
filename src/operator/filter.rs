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

const NAME: &str = "Filter";

pub type Predicate = Rc<dyn Fn(&dyn Row, &QueryBindings) -> Result<bool>>;

pub fn predicate<F>(f: F) -> Predicate
where
    F: Fn(&dyn Row, &QueryBindings) -> Result<bool> + 'static,
{
    Rc::new(f)
}

/// Passes through the input rows satisfying a predicate.
pub struct Filter {
    input: OperatorRef,
    description: String,
    predicate: Predicate,
}

impl Filter {
    pub fn new(input: OperatorRef, description: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            input,
            description: description.into(),
            predicate,
        }
    }
}

impl Describable for Filter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn explain(&self) -> Explainer {
        let mut att = Attributes::new();
        att.put(Label::Name, Explainer::string(NAME));
        att.put(Label::Predicate, Explainer::string(self.description.clone()));
        att.put(Label::InputOperator, self.input.explain());
        Explainer::compound(ExplainType::Select, att)
    }

    fn describe_plan(&self) -> String {
        format!(
            "{}\n{}({})",
            self.input.describe_plan(),
            NAME,
            self.description
        )
    }
}

impl Operator for Filter {
    fn row_type(&self) -> Rc<RowType> {
        self.input.row_type()
    }

    fn input_operators(&self) -> Vec<OperatorRef> {
        vec![self.input.clone()]
    }

    fn cursor(
        &self,
        context: &QueryContext,
        bindings_cursor: BoxBindingsCursor,
    ) -> Result<BoxCursor> {
        Ok(Box::new(Execution {
            context: context.clone(),
            lifecycle: CursorLifecycle::new(NAME),
            input: self.input.cursor(context, bindings_cursor)?,
            predicate: self.predicate.clone(),
            bindings: None,
            tap_next: context.next_tap("operator: Filter next"),
        }))
    }
}

struct Execution {
    context: QueryContext,
    lifecycle: CursorLifecycle,
    input: BoxCursor,
    predicate: Predicate,
    bindings: Option<Rc<QueryBindings>>,
    tap_next: InOutTap,
}

impl RowProducer for Execution {
    fn open(&mut self) -> Result<()> {
        self.lifecycle.check_idle("open")?;
        if self.bindings.is_none() {
            return Err(Error::NoBindings { cursor: NAME });
        }
        self.input.open()?;
        self.lifecycle.set_active();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<RowRef>> {
        let _tap = self.tap_next.enter();
        self.lifecycle.check_idle_or_active("next")?;
        if self.lifecycle.is_idle() {
            return Ok(None);
        }
        let bindings = match &self.bindings {
            Some(bindings) => bindings.clone(),
            None => return Err(Error::NoBindings { cursor: NAME }),
        };
        while let Some(row) = self.input.next()? {
            if (self.predicate)(row.as_ref(), &bindings)? {
                if self.context.log_execution() {
                    tracing::debug!("Filter: yield {}", row);
                }
                return Ok(Some(row));
            }
        }
        self.close()?;
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.lifecycle.check_idle_or_active("close")?;
        if self.input.is_active() {
            self.input.close()?;
        }
        self.lifecycle.set_idle();
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.lifecycle.is_destroyed() {
            return Ok(());
        }
        self.close()?;
        self.input.destroy()?;
        self.bindings = None;
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

impl QueryBindingsCursor for Execution {
    fn open_bindings(&mut self) -> Result<()> {
        self.bindings = None;
        self.input.open_bindings()
    }

    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
        self.bindings = self.input.next_bindings()?;
        Ok(self.bindings.clone())
    }

    fn close_bindings(&mut self) -> Result<()> {
        self.input.close_bindings()
    }

    fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()> {
        let current = match &self.bindings {
            Some(current) => current.descends_from(bindings),
            None => false,
        };
        if current && self.lifecycle.is_active() {
            self.close()?;
        }
        self.input.cancel_bindings(bindings)
    }
}
