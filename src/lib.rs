//! Pull-based query execution core: row types, cursors, bindings and the
//! operators that stream rows through them.

pub mod bindings;
pub mod config;
pub mod context;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod explain;
pub mod operator;
pub mod row;
pub mod rowtype;
pub mod tap;
pub mod value;

pub use error::{Error, Result};
