//! Drives a cursor tree through the full bindings and row protocol.

use std::rc::Rc;

use crate::bindings::{QueryBindings, SingletonBindingsCursor};
use crate::context::QueryContext;
use crate::cursor::{BoxCursor, Cursor};
use crate::error::Result;
use crate::operator::Operator;
use crate::row::RowRef;

pub fn cursor(
    root: &dyn Operator,
    context: &QueryContext,
    bindings: Rc<QueryBindings>,
) -> Result<BoxCursor> {
    let source = SingletonBindingsCursor::new(Some(bindings));
    root.cursor(context, Box::new(source))
}

/// Runs every activation the cursor receives and collects the rows in
/// delivery order. Leaves the cursor IDLE on success.
pub fn drain(cursor: &mut dyn Cursor) -> Result<Vec<RowRef>> {
    let mut rows = vec![];
    cursor.open_bindings()?;
    while let Some(bindings) = cursor.next_bindings()? {
        tracing::trace!("activation {}", bindings);
        cursor.open()?;
        while let Some(row) = cursor.next()? {
            rows.push(row);
        }
    }
    cursor.close_bindings()?;
    Ok(rows)
}

/// One-shot query: builds the cursor tree, drains it and destroys it.
///
/// The tree is destroyed even when draining fails; the draining error is
/// the one reported.
pub fn execute(
    root: &dyn Operator,
    context: &QueryContext,
    bindings: Rc<QueryBindings>,
) -> Result<Vec<RowRef>> {
    let mut cursor = cursor(root, context, bindings)?;
    let result = drain(cursor.as_mut());
    let destroyed = cursor.destroy();
    match result {
        Ok(rows) => {
            destroyed?;
            if context.log_execution() {
                tracing::debug!("{}: {} rows", root.name(), rows.len());
            }
            Ok(rows)
        }
        Err(err) => {
            if let Err(cleanup) = destroyed {
                tracing::warn!("{}: destroy after failure: {}", root.name(), cleanup);
            }
            Err(err)
        }
    }
}
