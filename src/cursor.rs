//! The cursor contract driven by the executor.
//!
//! A cursor is IDLE until opened, ACTIVE while rows may be pulled, back to
//! IDLE when drained or closed, and DESTROYED for good after `destroy()`.
//! Idle cursors are reusable; destroyed ones are not.

use std::fmt;

use crate::bindings::QueryBindingsCursor;
use crate::error::{Error, Result};
use crate::row::RowRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    Active,
    Destroyed,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CursorState::Idle => "IDLE",
            CursorState::Active => "ACTIVE",
            CursorState::Destroyed => "DESTROYED",
        };
        f.write_str(name)
    }
}

/// Lifecycle bookkeeping shared by every cursor implementation.
#[derive(Debug, Clone)]
pub struct CursorLifecycle {
    cursor: &'static str,
    state: CursorState,
}

impl CursorLifecycle {
    pub fn new(cursor: &'static str) -> Self {
        Self {
            cursor,
            state: CursorState::Idle,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    fn violation(&self, operation: &'static str) -> Error {
        Error::Lifecycle {
            cursor: self.cursor,
            operation,
            state: self.state,
        }
    }

    pub fn check_idle(&self, operation: &'static str) -> Result<()> {
        match self.state {
            CursorState::Idle => Ok(()),
            _ => Err(self.violation(operation)),
        }
    }

    pub fn check_idle_or_active(&self, operation: &'static str) -> Result<()> {
        match self.state {
            CursorState::Destroyed => Err(self.violation(operation)),
            _ => Ok(()),
        }
    }

    pub fn set_active(&mut self) {
        self.state = CursorState::Active;
    }

    pub fn set_idle(&mut self) {
        self.state = CursorState::Idle;
    }

    pub fn set_destroyed(&mut self) {
        self.state = CursorState::Destroyed;
    }

    pub fn is_idle(&self) -> bool {
        self.state == CursorState::Idle
    }

    pub fn is_active(&self) -> bool {
        self.state == CursorState::Active
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == CursorState::Destroyed
    }
}

pub trait RowProducer {
    fn open(&mut self) -> Result<()>;

    #[allow(clippy::should_implement_trait)]
    fn next(&mut self) -> Result<Option<RowRef>>;

    fn close(&mut self) -> Result<()>;

    fn destroy(&mut self) -> Result<()>;

    fn is_idle(&self) -> bool;
    fn is_active(&self) -> bool;
    fn is_destroyed(&self) -> bool;
}

pub trait Cursor: RowProducer + QueryBindingsCursor {}

impl<T: RowProducer + QueryBindingsCursor + ?Sized> Cursor for T {}

pub type BoxCursor = Box<dyn Cursor>;
