use std::rc::Rc;

use crate::bindings::{
    describe_bindings, same_bindings, BoxBindingsCursor, MultipleBindingsCursor, QueryBindings,
    QueryBindingsCursor,
};
use crate::context::QueryContext;
use crate::cursor::{BoxCursor, CursorLifecycle, RowProducer};
use crate::error::{Error, Result};
use crate::explain::{Attributes, ExplainType, Explainer, Label};
use crate::row::{MasqueradingRow, Row, RowRef};
use crate::rowtype::{RowType, Schema};
use crate::tap::InOutTap;

use super::{Describable, Operator, OperatorRef};

const NAME: &str = "UnionAll";
const TAP_OPEN: &str = "operator: UnionAll open";
const TAP_NEXT: &str = "operator: UnionAll next";

/// Concatenates its inputs in order. Rows whose input type differs from the
/// unified output type are presented through a [`MasqueradingRow`].
pub struct UnionAll {
    inputs: Vec<OperatorRef>,
    input_types: Vec<Rc<RowType>>,
    output_row_type: Rc<RowType>,
    open_all: bool,
}

impl UnionAll {
    pub fn new(
        schema: &Schema,
        inputs: Vec<(OperatorRef, Rc<RowType>)>,
        open_all: bool,
    ) -> Result<Self> {
        if inputs.len() < 2 {
            return Err(Error::InvalidArgument(format!(
                "UnionAll needs at least two inputs, got {}",
                inputs.len()
            )));
        }
        let (inputs, input_types): (Vec<_>, Vec<_>) = inputs.into_iter().unzip();
        let mut output_row_type = input_types[0].clone();
        for input_type in &input_types[1..] {
            output_row_type = schema.union_row_type(&output_row_type, input_type)?;
        }
        Ok(Self {
            inputs,
            input_types,
            output_row_type,
            open_all,
        })
    }

    pub fn of(schema: &Schema, left: OperatorRef, right: OperatorRef, open_all: bool) -> Result<Self> {
        let left_type = left.row_type();
        let right_type = right.row_type();
        Self::new(schema, vec![(left, left_type), (right, right_type)], open_all)
    }

    pub fn open_all(&self) -> bool {
        self.open_all
    }
}

impl Describable for UnionAll {
    fn name(&self) -> &'static str {
        NAME
    }

    fn explain(&self) -> Explainer {
        let mut att = Attributes::new();
        att.put(Label::Name, Explainer::string(NAME));
        att.put(Label::UnionOption, Explainer::string("ALL"));
        for input in &self.inputs {
            att.put(Label::InputOperator, input.explain());
        }
        for input_type in &self.input_types {
            att.put(Label::InputType, input_type.explain());
        }
        att.put(Label::OutputType, self.output_row_type.explain());
        att.put(Label::Pipeline, Explainer::boolean(self.open_all));
        Explainer::compound(ExplainType::Union, att)
    }

    fn describe_plan(&self) -> String {
        let parts: Vec<String> = self.inputs.iter().map(|i| i.describe_plan()).collect();
        parts.join("\nUNION ALL\n")
    }
}

impl Operator for UnionAll {
    fn row_type(&self) -> Rc<RowType> {
        self.output_row_type.clone()
    }

    fn input_operators(&self) -> Vec<OperatorRef> {
        self.inputs.clone()
    }

    fn cursor(
        &self,
        context: &QueryContext,
        bindings_cursor: BoxBindingsCursor,
    ) -> Result<BoxCursor> {
        let multiple = MultipleBindingsCursor::new(bindings_cursor);
        let mut cursors = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            cursors.push(input.cursor(context, multiple.new_cursor()?)?);
        }
        Ok(Box::new(Execution {
            context: context.clone(),
            lifecycle: CursorLifecycle::new(NAME),
            bindings_cursor: multiple,
            cursors,
            input_types: self.input_types.clone(),
            output_row_type: self.output_row_type.clone(),
            open_all: self.open_all,
            next_input: 0,
            current: None,
            tap_open: context.tap(TAP_OPEN),
            tap_next: context.next_tap(TAP_NEXT),
        }))
    }
}

struct Execution {
    context: QueryContext,
    lifecycle: CursorLifecycle,
    bindings_cursor: MultipleBindingsCursor,
    cursors: Vec<BoxCursor>,
    input_types: Vec<Rc<RowType>>,
    output_row_type: Rc<RowType>,
    open_all: bool,
    // next input to try once the current one runs dry
    next_input: usize,
    // input being read and its declared row type
    current: Option<(usize, Rc<RowType>)>,
    tap_open: InOutTap,
    tap_next: InOutTap,
}

impl Execution {
    fn next_cursor_first_row(&mut self) -> Result<Option<(RowRef, Rc<RowType>)>> {
        while self.next_input < self.cursors.len() {
            let index = self.next_input;
            self.next_input += 1;
            let cursor = &mut self.cursors[index];
            if !self.open_all {
                cursor.open()?;
            }
            match cursor.next()? {
                Some(row) => {
                    let input_type = self.input_types[index].clone();
                    self.current = Some((index, input_type.clone()));
                    return Ok(Some((row, input_type)));
                }
                None => cursor.close()?,
            }
        }
        Ok(None)
    }

    fn wrapped(&self, row: RowRef, input_type: &Rc<RowType>) -> Result<RowRef> {
        if !Rc::ptr_eq(row.row_type(), input_type) {
            return Err(Error::WrongRowType {
                row: row.to_string(),
                expected: input_type.to_string(),
                actual: row.row_type().to_string(),
            });
        }
        if Rc::ptr_eq(input_type, &self.output_row_type) {
            return Ok(row);
        }
        Ok(Rc::new(MasqueradingRow::new(
            self.output_row_type.clone(),
            row,
        )))
    }
}

impl RowProducer for Execution {
    fn open(&mut self) -> Result<()> {
        let _tap = self.tap_open.enter();
        self.lifecycle.check_idle("open")?;
        self.lifecycle.set_active();
        if self.open_all {
            for cursor in self.cursors.iter_mut() {
                cursor.open()?;
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<RowRef>> {
        let _tap = self.tap_next.enter();
        self.lifecycle.check_idle_or_active("next")?;
        if self.lifecycle.is_idle() {
            return Ok(None);
        }
        let next = match self.current.clone() {
            None => self.next_cursor_first_row()?,
            Some((index, input_type)) => match self.cursors[index].next()? {
                Some(row) => Some((row, input_type)),
                None => {
                    self.cursors[index].close()?;
                    self.current = None;
                    self.next_cursor_first_row()?
                }
            },
        };
        match next {
            Some((row, input_type)) => {
                let row = self.wrapped(row, &input_type)?;
                if self.context.log_execution() {
                    tracing::debug!("UnionAll: yield {}", row);
                }
                Ok(Some(row))
            }
            None => {
                self.close()?;
                if self.context.log_execution() {
                    tracing::debug!("UnionAll: exhausted");
                }
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.lifecycle.check_idle_or_active("close")?;
        for cursor in self.cursors.iter_mut() {
            if cursor.is_active() {
                cursor.close()?;
            }
        }
        self.current = None;
        self.next_input = 0;
        self.lifecycle.set_idle();
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.lifecycle.is_destroyed() {
            return Ok(());
        }
        self.close()?;
        for cursor in self.cursors.iter_mut() {
            cursor.destroy()?;
        }
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
        self.bindings_cursor.open_bindings()?;
        for cursor in self.cursors.iter_mut() {
            cursor.open_bindings()?;
        }
        Ok(())
    }

    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
        let bindings = self.bindings_cursor.next_bindings()?;
        for cursor in self.cursors.iter_mut() {
            let other = cursor.next_bindings()?;
            if !same_bindings(&bindings, &other) {
                tracing::error!(
                    "UnionAll: child returned {} for activation {}",
                    describe_bindings(&other),
                    describe_bindings(&bindings)
                );
                return Err(Error::BindingsMismatch {
                    cursor: NAME,
                    expected: describe_bindings(&bindings),
                    found: describe_bindings(&other),
                });
            }
        }
        Ok(bindings)
    }

    fn close_bindings(&mut self) -> Result<()> {
        self.bindings_cursor.close_bindings()?;
        for cursor in self.cursors.iter_mut() {
            cursor.close_bindings()?;
        }
        Ok(())
    }

    fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()> {
        for cursor in self.cursors.iter_mut() {
            cursor.cancel_bindings(bindings)?;
        }
        self.bindings_cursor.cancel_bindings(bindings)
    }
}
