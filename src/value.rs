//! Scalar values and type instances as seen by the operator core.
//!
//! The real type/cast system lives elsewhere; the core only needs equality of
//! type instances (for row type unification) and a total order over values
//! (for row comparison).

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeClass {
    Boolean,
    BigInt,
    Double,
    Varchar,
    Varbinary,
    Date,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeClass::Boolean => "BOOLEAN",
            TypeClass::BigInt => "BIGINT",
            TypeClass::Double => "DOUBLE",
            TypeClass::Varchar => "VARCHAR",
            TypeClass::Varbinary => "VARBINARY",
            TypeClass::Date => "DATE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScalarType {
    pub class: TypeClass,
    pub nullable: bool,
}

impl ScalarType {
    pub fn new(class: TypeClass, nullable: bool) -> Self {
        Self { class, nullable }
    }

    pub fn not_null(class: TypeClass) -> Self {
        Self::new(class, false)
    }

    pub fn nullable(class: TypeClass) -> Self {
        Self::new(class, true)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{} NULL", self.class)
        } else {
            write!(f, "{} NOT NULL", self.class)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    BigInt(i64),
    Double(f64),
    Varchar(String),
    Varbinary(Vec<u8>),
    // days since 1970-01-01
    Date(i32),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::BigInt(_) => 2,
            Value::Double(_) => 3,
            Value::Varchar(_) => 4,
            Value::Varbinary(_) => 5,
            Value::Date(_) => 6,
        }
    }

    /// Total order: NULL sorts first, then values of different classes by
    /// class, then values of the same class naturally.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Varchar(a), Value::Varchar(b)) => a.cmp(b),
            (Value::Varbinary(a), Value::Varbinary(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Varchar(v) => write!(f, "'{}'", v),
            Value::Varbinary(v) => write!(f, "{:02x?}", v),
            Value::Date(v) => write!(f, "DATE({})", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}
