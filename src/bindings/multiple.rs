use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{BoxBindingsCursor, QueryBindings, QueryBindingsCursor};
use crate::cursor::CursorState;
use crate::error::{Error, Result};

// the multiplexer itself reads through position 0
const OWN_CURSOR: usize = 0;

struct Shared {
    source: BoxBindingsCursor,
    // activations not yet seen by every derived cursor; pending[0] has
    // absolute index `offset`
    pending: VecDeque<Rc<QueryBindings>>,
    offset: usize,
    positions: Vec<usize>,
    exhausted: bool,
    // cancellations passed on to the source that some reader has yet to
    // repeat; dropped once every reader has
    forwarded: Vec<Forwarded>,
}

struct Forwarded {
    ancestor: Rc<QueryBindings>,
    cancelled_by: Vec<bool>,
}

impl Shared {
    fn reset(&mut self) {
        self.pending.clear();
        self.offset = 0;
        self.exhausted = false;
        self.forwarded.clear();
        for position in self.positions.iter_mut() {
            *position = 0;
        }
    }

    fn next_for(&mut self, id: usize) -> Result<Option<Rc<QueryBindings>>> {
        while self.positions[id] - self.offset >= self.pending.len() {
            if self.exhausted {
                return Ok(None);
            }
            match self.source.next_bindings()? {
                Some(bindings) => self.pending.push_back(bindings),
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            }
        }
        let bindings = self.pending[self.positions[id] - self.offset].clone();
        self.positions[id] += 1;
        self.shrink();
        Ok(Some(bindings))
    }

    fn skip_cancelled(&mut self, id: usize, ancestor: &Rc<QueryBindings>) {
        loop {
            let skip = match self.pending.get(self.positions[id] - self.offset) {
                Some(bindings) => bindings.descends_from(ancestor),
                None => false,
            };
            if !skip {
                break;
            }
            self.positions[id] += 1;
        }
    }

    fn forward_cancel(&mut self, id: usize, ancestor: &Rc<QueryBindings>) -> Result<()> {
        let readers = self.positions.len();
        match self
            .forwarded
            .iter()
            .position(|f| Rc::ptr_eq(&f.ancestor, ancestor))
        {
            Some(i) => {
                let entry = &mut self.forwarded[i];
                entry.cancelled_by[id] = true;
                if entry.cancelled_by.iter().all(|c| *c) {
                    self.forwarded.swap_remove(i);
                }
                Ok(())
            }
            None => {
                if readers > 1 {
                    let mut cancelled_by = vec![false; readers];
                    cancelled_by[id] = true;
                    self.forwarded.push(Forwarded {
                        ancestor: ancestor.clone(),
                        cancelled_by,
                    });
                }
                self.source.cancel_bindings(ancestor)
            }
        }
    }

    fn shrink(&mut self) {
        let min = self.positions.iter().copied().min().unwrap_or(self.offset);
        while self.offset < min {
            self.pending.pop_front();
            self.offset += 1;
        }
    }
}

/// Replays one source of activations to several sibling subtrees.
///
/// Every derived cursor sees the same `Rc<QueryBindings>` at a given
/// position, and the source is advanced once per activation no matter how
/// many cursors read it. Cancellation reaches the source once per activation.
pub struct MultipleBindingsCursor {
    shared: Rc<RefCell<Shared>>,
}

impl MultipleBindingsCursor {
    pub fn new(source: BoxBindingsCursor) -> Self {
        let shared = Shared {
            source,
            pending: VecDeque::new(),
            offset: 0,
            positions: vec![0],
            exhausted: false,
            forwarded: vec![],
        };
        Self {
            shared: Rc::new(RefCell::new(shared)),
        }
    }

    pub fn new_cursor(&self) -> Result<BoxBindingsCursor> {
        let mut shared = self.shared.borrow_mut();
        if shared.offset != 0 {
            return Err(Error::Lifecycle {
                cursor: "MultipleBindingsCursor",
                operation: "new_cursor",
                state: CursorState::Active,
            });
        }
        let id = shared.positions.len();
        shared.positions.push(0);
        Ok(Box::new(DerivedCursor {
            shared: self.shared.clone(),
            id,
        }))
    }
}

impl QueryBindingsCursor for MultipleBindingsCursor {
    fn open_bindings(&mut self) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        shared.source.open_bindings()?;
        shared.reset();
        Ok(())
    }

    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
        self.shared.borrow_mut().next_for(OWN_CURSOR)
    }

    fn close_bindings(&mut self) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        shared.forwarded.clear();
        shared.source.close_bindings()
    }

    fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        for id in 0..shared.positions.len() {
            shared.skip_cancelled(id, bindings);
        }
        shared.shrink();
        shared.forward_cancel(OWN_CURSOR, bindings)
    }
}

struct DerivedCursor {
    shared: Rc<RefCell<Shared>>,
    id: usize,
}

impl QueryBindingsCursor for DerivedCursor {
    // opening and closing belong to the multiplexer
    fn open_bindings(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
        self.shared.borrow_mut().next_for(self.id)
    }

    fn close_bindings(&mut self) -> Result<()> {
        Ok(())
    }

    fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        shared.skip_cancelled(self.id, bindings);
        shared.shrink();
        shared.forward_cancel(self.id, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Op {
        Open,
        Next,
        Close,
        Cancel(u32),
    }

    // source over a fixed list of activations that records every call
    struct TraceSource {
        activations: Vec<Rc<QueryBindings>>,
        position: usize,
        history: Rc<RefCell<Vec<Op>>>,
    }

    impl TraceSource {
        fn new(count: usize) -> (Self, Vec<Rc<QueryBindings>>, Rc<RefCell<Vec<Op>>>) {
            let activations: Vec<_> = (0..count).map(|_| QueryBindings::new()).collect();
            let history = Rc::new(RefCell::new(vec![]));
            let source = Self {
                activations: activations.clone(),
                position: 0,
                history: history.clone(),
            };
            (source, activations, history)
        }
    }

    impl QueryBindingsCursor for TraceSource {
        fn open_bindings(&mut self) -> Result<()> {
            self.history.borrow_mut().push(Op::Open);
            self.position = 0;
            Ok(())
        }
        fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
            self.history.borrow_mut().push(Op::Next);
            let next = self.activations.get(self.position).cloned();
            self.position += 1;
            Ok(next)
        }
        fn close_bindings(&mut self) -> Result<()> {
            self.history.borrow_mut().push(Op::Close);
            Ok(())
        }
        fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()> {
            self.history.borrow_mut().push(Op::Cancel(bindings.depth()));
            Ok(())
        }
    }

    fn count(history: &Rc<RefCell<Vec<Op>>>, op: Op) -> usize {
        history.borrow().iter().filter(|h| **h == op).count()
    }

    #[test]
    fn fan_out_test() {
        let (source, activations, history) = TraceSource::new(2);
        let mut mux = MultipleBindingsCursor::new(Box::new(source));
        let mut left = mux.new_cursor().unwrap();
        let mut right = mux.new_cursor().unwrap();

        mux.open_bindings().unwrap();
        left.open_bindings().unwrap();
        right.open_bindings().unwrap();

        let own1 = mux.next_bindings().unwrap().unwrap();
        let left1 = left.next_bindings().unwrap().unwrap();
        let right1 = right.next_bindings().unwrap().unwrap();
        assert!(Rc::ptr_eq(&own1, &activations[0]));
        assert!(Rc::ptr_eq(&left1, &own1));
        assert!(Rc::ptr_eq(&right1, &own1));
        // one pull from the source for three readers
        assert_eq!(count(&history, Op::Next), 1);

        let left2 = left.next_bindings().unwrap().unwrap();
        let own2 = mux.next_bindings().unwrap().unwrap();
        let right2 = right.next_bindings().unwrap().unwrap();
        assert!(Rc::ptr_eq(&left2, &activations[1]));
        assert!(Rc::ptr_eq(&own2, &left2));
        assert!(Rc::ptr_eq(&right2, &left2));
        assert_eq!(count(&history, Op::Next), 2);

        assert!(mux.next_bindings().unwrap().is_none());
        assert!(left.next_bindings().unwrap().is_none());
        assert!(right.next_bindings().unwrap().is_none());
        // exhaustion is remembered
        assert_eq!(count(&history, Op::Next), 3);

        mux.close_bindings().unwrap();
        assert_eq!(count(&history, Op::Open), 1);
        assert_eq!(count(&history, Op::Close), 1);
    }

    #[test]
    fn released_activations_are_dropped_test() {
        let (source, activations, _history) = TraceSource::new(3);
        let mut mux = MultipleBindingsCursor::new(Box::new(source));
        let mut child = mux.new_cursor().unwrap();
        mux.open_bindings().unwrap();

        mux.next_bindings().unwrap();
        mux.next_bindings().unwrap();
        assert_eq!(mux.shared.borrow().pending.len(), 2);
        child.next_bindings().unwrap();
        assert_eq!(mux.shared.borrow().pending.len(), 1);
        let second = child.next_bindings().unwrap().unwrap();
        assert!(Rc::ptr_eq(&second, &activations[1]));
        assert!(mux.shared.borrow().pending.is_empty());

        // too late to add a reader
        assert!(matches!(
            mux.new_cursor(),
            Err(Error::Lifecycle { .. })
        ));
    }

    #[test]
    fn cancel_forwarded_once_test() {
        let (source, activations, history) = TraceSource::new(1);
        let mut mux = MultipleBindingsCursor::new(Box::new(source));
        let mut left = mux.new_cursor().unwrap();
        let mut right = mux.new_cursor().unwrap();
        mux.open_bindings().unwrap();

        let bindings = mux.next_bindings().unwrap().unwrap();
        left.cancel_bindings(&bindings).unwrap();
        right.cancel_bindings(&bindings).unwrap();
        mux.cancel_bindings(&bindings).unwrap();
        assert_eq!(count(&history, Op::Cancel(0)), 1);

        // the cancelled activation is skipped by the cursors that had not read it
        assert!(left.next_bindings().unwrap().is_none());
        assert!(right.next_bindings().unwrap().is_none());
        assert!(Rc::ptr_eq(&bindings, &activations[0]));

        // a fresh open starts a fresh activation sequence
        mux.open_bindings().unwrap();
        let again = mux.next_bindings().unwrap().unwrap();
        left.cancel_bindings(&again).unwrap();
        assert_eq!(count(&history, Op::Cancel(0)), 2);
    }

    #[test]
    fn long_sequence_ledger_stays_small_test() {
        const ACTIVATIONS: usize = 10_000;
        let (source, _activations, history) = TraceSource::new(ACTIVATIONS);
        let mut mux = MultipleBindingsCursor::new(Box::new(source));
        let mut child = mux.new_cursor().unwrap();
        mux.open_bindings().unwrap();

        while let Some(bindings) = mux.next_bindings().unwrap() {
            let seen = child.next_bindings().unwrap().unwrap();
            assert!(Rc::ptr_eq(&seen, &bindings));
            child.cancel_bindings(&bindings).unwrap();
            assert_eq!(mux.shared.borrow().forwarded.len(), 1);
            mux.cancel_bindings(&bindings).unwrap();
            assert!(mux.shared.borrow().forwarded.is_empty());
        }
        assert_eq!(count(&history, Op::Cancel(0)), ACTIVATIONS);
        assert!(mux.shared.borrow().pending.is_empty());
        mux.close_bindings().unwrap();
    }
}
