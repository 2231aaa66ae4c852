//! Correlation-variable activations and the cursors that sequence them.
//!
//! A [`QueryBindings`] is one activation of a (sub)plan. Siblings under the
//! same parent must see the *same* `Rc<QueryBindings>` for an activation, so
//! identity (`Rc::ptr_eq`) is what every consistency check compares.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::row::RowRef;
use crate::value::Value;

mod multiple;
mod singleton;

pub use multiple::MultipleBindingsCursor;
pub use singleton::SingletonBindingsCursor;

#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Row(RowRef),
}

#[derive(Debug, Default)]
pub struct QueryBindings {
    parent: Option<Rc<QueryBindings>>,
    depth: u32,
    slots: RefCell<Vec<Option<Binding>>>,
}

impl QueryBindings {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A child activation one level deeper. Slots it does not set are read
    /// through to `self`.
    pub fn create_bindings(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(self.clone()),
            depth: self.depth + 1,
            slots: RefCell::new(vec![]),
        })
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn parent(&self) -> Option<&Rc<QueryBindings>> {
        self.parent.as_ref()
    }

    fn set(&self, index: usize, binding: Binding) {
        let mut slots = self.slots.borrow_mut();
        if slots.len() <= index {
            slots.resize(index + 1, None);
        }
        slots[index] = Some(binding);
    }

    pub fn set_value(&self, index: usize, value: Value) {
        self.set(index, Binding::Value(value));
    }

    pub fn set_row(&self, index: usize, row: RowRef) {
        self.set(index, Binding::Row(row));
    }

    pub fn binding(&self, index: usize) -> Result<Binding> {
        if let Some(Some(binding)) = self.slots.borrow().get(index) {
            return Ok(binding.clone());
        }
        match &self.parent {
            Some(parent) => parent.binding(index),
            None => Err(Error::UnboundSlot {
                index,
                depth: self.depth,
            }),
        }
    }

    pub fn value(&self, index: usize) -> Result<Value> {
        match self.binding(index)? {
            Binding::Value(value) => Ok(value),
            Binding::Row(_) => Err(Error::InvalidArgument(format!(
                "binding {} holds a row, not a value",
                index
            ))),
        }
    }

    pub fn row(&self, index: usize) -> Result<RowRef> {
        match self.binding(index)? {
            Binding::Row(row) => Ok(row),
            Binding::Value(_) => Err(Error::InvalidArgument(format!(
                "binding {} holds a value, not a row",
                index
            ))),
        }
    }

    pub fn descends_from(self: &Rc<Self>, ancestor: &Rc<QueryBindings>) -> bool {
        let mut current = Some(self);
        while let Some(bindings) = current {
            if bindings.depth < ancestor.depth {
                return false;
            }
            if Rc::ptr_eq(bindings, ancestor) {
                return true;
            }
            current = bindings.parent.as_ref();
        }
        false
    }
}

impl fmt::Display for QueryBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bindings@{:p}(depth {})", self as *const Self, self.depth)
    }
}

pub fn same_bindings(a: &Option<Rc<QueryBindings>>, b: &Option<Rc<QueryBindings>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub fn describe_bindings(bindings: &Option<Rc<QueryBindings>>) -> String {
    match bindings {
        Some(b) => b.to_string(),
        None => "no bindings".to_string(),
    }
}

pub trait QueryBindingsCursor {
    fn open_bindings(&mut self) -> Result<()>;
    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>>;
    fn close_bindings(&mut self) -> Result<()>;
    /// Abandons `bindings` and every activation created from it.
    fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()>;
}

pub type BoxBindingsCursor = Box<dyn QueryBindingsCursor>;
