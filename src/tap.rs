use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Default)]
struct TapStats {
    ins: Cell<u64>,
    outs: Cell<u64>,
    elapsed: Cell<Duration>,
}

#[derive(Debug, Clone)]
pub struct InOutTap {
    name: &'static str,
    stats: Option<Rc<TapStats>>,
}

impl InOutTap {
    pub fn disabled(name: &'static str) -> Self {
        Self { name, stats: None }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.stats.is_some()
    }

    pub fn enter(&self) -> TapGuard {
        match &self.stats {
            Some(stats) => {
                stats.ins.set(stats.ins.get() + 1);
                TapGuard {
                    stats: Some((stats.clone(), Instant::now())),
                }
            }
            None => TapGuard { stats: None },
        }
    }
}

#[must_use]
pub struct TapGuard {
    stats: Option<(Rc<TapStats>, Instant)>,
}

impl Drop for TapGuard {
    fn drop(&mut self) {
        if let Some((stats, start)) = self.stats.take() {
            stats.outs.set(stats.outs.get() + 1);
            stats.elapsed.set(stats.elapsed.get() + start.elapsed());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TapReport {
    pub name: String,
    pub ins: u64,
    pub outs: u64,
    pub elapsed_nanos: u128,
}

/// Metrics collaborator owned by whoever runs the query. Cursors built from
/// the same context share stats for taps of the same name.
#[derive(Debug, Clone, Default)]
pub struct TapRegistry {
    taps: Rc<RefCell<BTreeMap<&'static str, Rc<TapStats>>>>,
}

impl TapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tap(&self, name: &'static str) -> InOutTap {
        let stats = self
            .taps
            .borrow_mut()
            .entry(name)
            .or_insert_with(Default::default)
            .clone();
        InOutTap {
            name,
            stats: Some(stats),
        }
    }

    pub fn report(&self) -> Vec<TapReport> {
        self.taps
            .borrow()
            .iter()
            .map(|(name, stats)| TapReport {
                name: name.to_string(),
                ins: stats.ins.get(),
                outs: stats.outs.get(),
                elapsed_nanos: stats.elapsed.get().as_nanos(),
            })
            .collect()
    }

    pub fn reset(&self) {
        for stats in self.taps.borrow().values() {
            stats.ins.set(0);
            stats.outs.set(0);
            stats.elapsed.set(Duration::default());
        }
    }
}
