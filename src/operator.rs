//! Physical plan nodes.
//!
//! An [`Operator`] is immutable once built and can spawn any number of
//! independent cursors. Construction validates shapes, so a plan that
//! builds never fails with a shape error at execution time.

use std::rc::Rc;

use crate::bindings::BoxBindingsCursor;
use crate::context::QueryContext;
use crate::cursor::BoxCursor;
use crate::error::Result;
use crate::explain::Explainer;
use crate::rowtype::RowType;

mod filter;
mod nested_loops;
#[cfg(test)]
pub(crate) mod testing;
mod union_all;
mod values_scan;

pub use filter::{predicate, Filter, Predicate};
pub use nested_loops::MapNestedLoops;
pub use union_all::UnionAll;
pub use values_scan::ValuesScan;

pub trait Describable {
    fn name(&self) -> &'static str;

    fn explain(&self) -> Explainer;

    fn describe_plan(&self) -> String;
}

pub trait Operator: Describable {
    fn row_type(&self) -> Rc<RowType>;

    fn input_operators(&self) -> Vec<Rc<dyn Operator>>;

    /// A new cursor reading activations from `bindings_cursor`. The context
    /// is passed through unchanged to every descendant cursor.
    fn cursor(&self, context: &QueryContext, bindings_cursor: BoxBindingsCursor)
        -> Result<BoxCursor>;
}

pub type OperatorRef = Rc<dyn Operator>;
