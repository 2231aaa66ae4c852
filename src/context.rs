use std::rc::Rc;

use crate::config::ExecutionConfig;
use crate::tap::{InOutTap, TapRegistry};

struct Inner {
    config: ExecutionConfig,
    taps: Option<TapRegistry>,
}

/// Execution environment handed unchanged to every cursor of a plan.
#[derive(Clone)]
pub struct QueryContext {
    inner: Rc<Inner>,
}

impl QueryContext {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            inner: Rc::new(Inner { config, taps: None }),
        }
    }

    pub fn with_taps(config: ExecutionConfig, taps: TapRegistry) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                taps: Some(taps),
            }),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.inner.config
    }

    pub fn log_execution(&self) -> bool {
        self.inner.config.log_execution
    }

    pub fn taps(&self) -> Option<&TapRegistry> {
        self.inner.taps.as_ref()
    }

    pub fn tap(&self, name: &'static str) -> InOutTap {
        match &self.inner.taps {
            Some(registry) if self.inner.config.taps_enabled => registry.tap(name),
            _ => InOutTap::disabled(name),
        }
    }

    pub fn next_tap(&self, name: &'static str) -> InOutTap {
        if self.inner.config.tap_next_enabled {
            self.tap(name)
        } else {
            InOutTap::disabled(name)
        }
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new(ExecutionConfig::default())
    }
}
