use std::rc::Rc;

use crate::bindings::{
    describe_bindings, same_bindings, BoxBindingsCursor, QueryBindings, QueryBindingsCursor,
    SingletonBindingsCursor,
};
use crate::context::QueryContext;
use crate::cursor::{BoxCursor, CursorLifecycle, RowProducer};
use crate::error::{Error, Result};
use crate::explain::{Attributes, ExplainType, Explainer, Label};
use crate::row::RowRef;
use crate::rowtype::RowType;
use crate::tap::InOutTap;

use super::{Describable, Operator, OperatorRef};

const NAME: &str = "MapNestedLoops";

/// Runs `inner` once per `outer` row, with that row bound at
/// `binding_position` of a child activation, and yields the inner rows.
pub struct MapNestedLoops {
    outer: OperatorRef,
    inner: OperatorRef,
    binding_position: usize,
}

impl MapNestedLoops {
    pub fn new(outer: OperatorRef, inner: OperatorRef, binding_position: usize) -> Self {
        Self {
            outer,
            inner,
            binding_position,
        }
    }
}

impl Describable for MapNestedLoops {
    fn name(&self) -> &'static str {
        NAME
    }

    fn explain(&self) -> Explainer {
        let mut att = Attributes::new();
        att.put(Label::Name, Explainer::string(NAME));
        att.put(
            Label::BindingPosition,
            Explainer::long(self.binding_position as i64),
        );
        att.put(Label::OuterInput, self.outer.explain());
        att.put(Label::InnerInput, self.inner.explain());
        Explainer::compound(ExplainType::Map, att)
    }

    fn describe_plan(&self) -> String {
        format!(
            "{}\n{}(${})\n{}",
            self.outer.describe_plan(),
            NAME,
            self.binding_position,
            self.inner.describe_plan()
        )
    }
}

impl Operator for MapNestedLoops {
    fn row_type(&self) -> Rc<RowType> {
        self.inner.row_type()
    }

    fn input_operators(&self) -> Vec<OperatorRef> {
        vec![self.outer.clone(), self.inner.clone()]
    }

    fn cursor(
        &self,
        context: &QueryContext,
        bindings_cursor: BoxBindingsCursor,
    ) -> Result<BoxCursor> {
        let inner_bindings = SingletonBindingsCursor::default();
        Ok(Box::new(Execution {
            context: context.clone(),
            lifecycle: CursorLifecycle::new(NAME),
            outer: self.outer.cursor(context, bindings_cursor)?,
            inner: self.inner.cursor(context, Box::new(inner_bindings.clone()))?,
            inner_bindings,
            binding_position: self.binding_position,
            bindings: None,
            activation: None,
            tap_next: context.next_tap("operator: MapNestedLoops next"),
        }))
    }
}

struct Execution {
    context: QueryContext,
    lifecycle: CursorLifecycle,
    outer: BoxCursor,
    inner: BoxCursor,
    // feeds `inner`; shares state with the cursor it was cloned into
    inner_bindings: SingletonBindingsCursor,
    binding_position: usize,
    bindings: Option<Rc<QueryBindings>>,
    // child activation the inner cursor is currently running under
    activation: Option<Rc<QueryBindings>>,
    tap_next: InOutTap,
}

impl Execution {
    fn start_inner(&mut self, bindings: &Rc<QueryBindings>, row: RowRef) -> Result<()> {
        let child = bindings.create_bindings();
        child.set_row(self.binding_position, row);
        self.inner_bindings.reset(child.clone());
        self.inner.open_bindings()?;
        // from here on `finish_inner` owes the inner cursor its cancel and close
        self.activation = Some(child);
        let delivered = self.inner.next_bindings()?;
        if !same_bindings(&self.activation, &delivered) {
            return Err(Error::BindingsMismatch {
                cursor: NAME,
                expected: describe_bindings(&self.activation),
                found: describe_bindings(&delivered),
            });
        }
        self.inner.open()
    }

    fn finish_inner(&mut self) -> Result<()> {
        if let Some(child) = self.activation.take() {
            if self.inner.is_active() {
                self.inner.close()?;
            }
            self.inner.cancel_bindings(&child)?;
            self.inner.close_bindings()?;
        }
        Ok(())
    }
}

impl RowProducer for Execution {
    fn open(&mut self) -> Result<()> {
        self.lifecycle.check_idle("open")?;
        if self.bindings.is_none() {
            return Err(Error::NoBindings { cursor: NAME });
        }
        self.outer.open()?;
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
        loop {
            if self.activation.is_some() {
                if let Some(row) = self.inner.next()? {
                    if self.context.log_execution() {
                        tracing::debug!("MapNestedLoops: yield {}", row);
                    }
                    return Ok(Some(row));
                }
                self.finish_inner()?;
            }
            match self.outer.next()? {
                Some(row) => self.start_inner(&bindings, row)?,
                None => {
                    self.close()?;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.lifecycle.check_idle_or_active("close")?;
        self.finish_inner()?;
        if self.outer.is_active() {
            self.outer.close()?;
        }
        self.lifecycle.set_idle();
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.lifecycle.is_destroyed() {
            return Ok(());
        }
        self.close()?;
        self.outer.destroy()?;
        self.inner.destroy()?;
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
        self.outer.open_bindings()
    }

    fn next_bindings(&mut self) -> Result<Option<Rc<QueryBindings>>> {
        self.bindings = self.outer.next_bindings()?;
        Ok(self.bindings.clone())
    }

    fn close_bindings(&mut self) -> Result<()> {
        self.outer.close_bindings()
    }

    fn cancel_bindings(&mut self, bindings: &Rc<QueryBindings>) -> Result<()> {
        let current = match &self.bindings {
            Some(current) => current.descends_from(bindings),
            None => false,
        };
        if current && self.lifecycle.is_active() {
            self.close()?;
        }
        self.outer.cancel_bindings(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::testing::{
        bind, collect, firsts, int_rows, int_type, History, Op, TraceScan,
    };
    use crate::operator::{predicate, Filter, UnionAll, ValuesScan};
    use crate::row::Row;
    use crate::rowtype::Schema;
    use crate::value::Value;
    use std::cell::RefCell;
    use std::cmp::Ordering;

    fn greater_than_outer(position: usize) -> crate::operator::Predicate {
        predicate(move |row, bindings| {
            let outer = bindings.row(position)?;
            Ok(row.value(0).compare(outer.value(0)) == Ordering::Greater)
        })
    }

    fn root_cursor(op: &dyn Operator) -> BoxCursor {
        let bindings = SingletonBindingsCursor::new(Some(QueryBindings::new()));
        op.cursor(&QueryContext::default(), Box::new(bindings))
            .unwrap()
    }

    #[test]
    fn correlated_inner_test() {
        let schema = Schema::new();
        let t = int_type(&schema, 1);
        let outer = ValuesScan::new(int_rows(&t, &[&[1], &[2], &[9]]), t.clone()).unwrap();
        let scan = ValuesScan::new(int_rows(&t, &[&[1], &[2], &[3], &[4]]), t).unwrap();
        let inner = Filter::new(Rc::new(scan), "x > $0", greater_than_outer(0));
        let plan = MapNestedLoops::new(Rc::new(outer), Rc::new(inner), 0);

        let mut cursor = root_cursor(&plan);
        bind(&mut cursor).unwrap();
        assert_eq!(
            firsts(&collect(&mut cursor).unwrap()),
            vec![2, 3, 4, 3, 4]
        );
        assert!(cursor.is_idle());
        cursor.destroy().unwrap();
    }

    #[test]
    fn union_under_repeated_activations_test() {
        let schema = Schema::new();
        let t = int_type(&schema, 1);
        let outer = ValuesScan::new(int_rows(&t, &[&[0], &[2]]), t.clone()).unwrap();
        let left = ValuesScan::new(int_rows(&t, &[&[1], &[3]]), t.clone()).unwrap();
        let right = ValuesScan::new(int_rows(&t, &[&[2], &[4]]), t.clone()).unwrap();
        let union = UnionAll::of(&schema, Rc::new(left), Rc::new(right), false).unwrap();
        let inner = Filter::new(Rc::new(union), "x > $1", greater_than_outer(1));
        let plan = MapNestedLoops::new(Rc::new(outer), Rc::new(inner), 1);

        let mut cursor = root_cursor(&plan);
        bind(&mut cursor).unwrap();
        assert_eq!(
            firsts(&collect(&mut cursor).unwrap()),
            vec![1, 3, 2, 4, 3, 4]
        );
    }

    #[test]
    fn outer_binding_visible_to_inner_test() {
        let schema = Schema::new();
        let t = int_type(&schema, 1);
        let outer = ValuesScan::new(int_rows(&t, &[&[5]]), t.clone()).unwrap();
        let scan = ValuesScan::new(int_rows(&t, &[&[1], &[7]]), t).unwrap();
        // slot 3 lives in the root activation, slot 0 in the child
        let inner = Filter::new(
            Rc::new(scan),
            "x > $0 and $3",
            predicate(|row, bindings| {
                let outer = bindings.row(0)?;
                let flag = bindings.value(3)?;
                Ok(flag == Value::Boolean(true) && row.value(0).compare(outer.value(0)) == Ordering::Greater)
            }),
        );
        let plan = MapNestedLoops::new(Rc::new(outer), Rc::new(inner), 0);

        let mut cursor = root_cursor(&plan);
        let root = bind(&mut cursor).unwrap();
        root.set_value(3, Value::Boolean(true));
        assert_eq!(firsts(&collect(&mut cursor).unwrap()), vec![7]);
    }

    #[test]
    fn close_mid_inner_test() {
        let schema = Schema::new();
        let t = int_type(&schema, 1);
        let outer = ValuesScan::new(int_rows(&t, &[&[1], &[2]]), t.clone()).unwrap();
        let scan = ValuesScan::new(int_rows(&t, &[&[10], &[20]]), t).unwrap();
        let plan = MapNestedLoops::new(Rc::new(outer), Rc::new(scan), 0);

        let mut cursor = root_cursor(&plan);
        bind(&mut cursor).unwrap();
        cursor.open().unwrap();
        assert!(cursor.next().unwrap().is_some());
        cursor.close().unwrap();
        assert!(cursor.is_idle());
        // a fresh open starts over from the first outer row
        assert_eq!(firsts(&collect(&mut cursor).unwrap()), vec![10, 20, 10, 20]);
    }

    #[test]
    fn inner_released_after_mismatch_test() {
        let h: History = Rc::new(RefCell::new(vec![]));
        let schema = Schema::new();
        let t = int_type(&schema, 1);
        let outer = ValuesScan::new(int_rows(&t, &[&[1]]), t.clone()).unwrap();
        let inner = TraceScan::new("inner", int_rows(&t, &[&[2]]), t, &h).detached();
        let plan = MapNestedLoops::new(Rc::new(outer), inner.into_ref(), 0);

        let mut cursor = root_cursor(&plan);
        bind(&mut cursor).unwrap();
        cursor.open().unwrap();
        assert!(matches!(
            cursor.next(),
            Err(Error::BindingsMismatch {
                cursor: "MapNestedLoops",
                ..
            })
        ));
        assert!(h.borrow().is_empty());

        cursor.close().unwrap();
        assert_eq!(
            *h.borrow(),
            vec![Op::CancelBindings("inner"), Op::CloseBindings("inner")]
        );
        // released once, not again on destroy
        cursor.destroy().unwrap();
        assert_eq!(h.borrow().last(), Some(&Op::Destroy("inner")));
        assert_eq!(h.borrow().len(), 3);
    }

    #[test]
    fn explain_test() {
        let schema = Schema::new();
        let t = int_type(&schema, 1);
        let outer = ValuesScan::new(vec![], t.clone()).unwrap();
        let inner = ValuesScan::new(vec![], t).unwrap();
        let plan = MapNestedLoops::new(Rc::new(outer), Rc::new(inner), 2);
        let explainer = plan.explain();
        let att = explainer.attributes().unwrap();
        assert_eq!(att.get(Label::BindingPosition), vec![&Explainer::long(2)]);
        assert_eq!(att.get(Label::OuterInput).len(), 1);
        assert_eq!(att.get(Label::InnerInput).len(), 1);
        assert_eq!(plan.input_operators().len(), 2);
    }
}
