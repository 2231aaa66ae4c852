use std::cell::RefCell;
use std::rc::Rc;

use super::{QueryBindings, QueryBindingsCursor};
use crate::error::Result;

#[derive(Debug, Default)]
struct State {
    bindings: Option<Rc<QueryBindings>>,
    pending: bool,
}

/// Delivers a single activation per `open_bindings`.
///
/// Clones share state: whoever drives a correlated sub-plan keeps one clone
/// and `reset`s it before each activation while the sub-plan's cursor owns
/// the other.
#[derive(Debug, Clone, Default)]
pub struct SingletonBindingsCursor {
    state: Rc<RefCell<State>>,
}

impl SingletonBindingsCursor {
    pub fn new(bindings: Option<Rc<QueryBindings>>) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                bindings,
                pending: false,
            })),
        }
    }

    pub fn reset(&self, bindings: Rc<QueryBindings>) {
        let mut state = self.state.borrow_mut();
        state.bindings = Some(bindings);
        state.pending = false;
    }
}

impl QueryBindingsCursor for SingletonBindingsCursor {
    fn open_bindings(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let pending = state.bindings.is_some();
        state.pending = pending;
        Ok(())
    }

    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
        let mut state = self.state.borrow_mut();
        if !state.pending {
            return Ok(None);
        }
        state.pending = false;
        Ok(state.bindings.clone())
    }

    fn close_bindings(&mut self) -> Result<()> {
        self.state.borrow_mut().pending = false;
        Ok(())
    }

    fn cancel_bindings(&mut self, ancestor: &Rc<QueryBindings>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let cancelled = match &state.bindings {
            Some(bindings) => bindings.descends_from(ancestor),
            None => false,
        };
        if cancelled {
            state.pending = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_per_open_test() {
        let bindings = QueryBindings::new();
        let mut cursor = SingletonBindingsCursor::new(Some(bindings.clone()));
        assert!(cursor.next_bindings().unwrap().is_none());

        cursor.open_bindings().unwrap();
        let first = cursor.next_bindings().unwrap().unwrap();
        assert!(Rc::ptr_eq(&first, &bindings));
        assert!(cursor.next_bindings().unwrap().is_none());

        cursor.open_bindings().unwrap();
        assert!(cursor.next_bindings().unwrap().is_some());
    }

    #[test]
    fn reset_through_clone_test() {
        let mut cursor = SingletonBindingsCursor::new(None);
        let handle = cursor.clone();
        cursor.open_bindings().unwrap();
        assert!(cursor.next_bindings().unwrap().is_none());

        let outer = QueryBindings::new();
        let child = outer.create_bindings();
        handle.reset(child.clone());
        cursor.open_bindings().unwrap();
        let got = cursor.next_bindings().unwrap().unwrap();
        assert!(Rc::ptr_eq(&got, &child));
    }

    #[test]
    fn cancel_test() {
        let outer = QueryBindings::new();
        let child = outer.create_bindings();
        let unrelated = QueryBindings::new();
        let mut cursor = SingletonBindingsCursor::new(Some(child));

        cursor.open_bindings().unwrap();
        cursor.cancel_bindings(&unrelated).unwrap();
        cursor.cancel_bindings(&outer).unwrap();
        assert!(cursor.next_bindings().unwrap().is_none());
    }
}
