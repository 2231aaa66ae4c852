//! Read-only plan descriptions.
//!
//! Every operator can describe itself as an [`Explainer`] tree; printing it
//! (as text or JSON) never touches execution state.

use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::operator::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Name,
    UnionOption,
    InputOperator,
    InputType,
    OutputType,
    Pipeline,
    Predicate,
    RowCount,
    OuterInput,
    InnerInput,
    BindingPosition,
    FieldTypes,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Label::Name => "name",
            Label::UnionOption => "union_option",
            Label::InputOperator => "input_operator",
            Label::InputType => "input_type",
            Label::OutputType => "output_type",
            Label::Pipeline => "pipeline",
            Label::Predicate => "predicate",
            Label::RowCount => "row_count",
            Label::OuterInput => "outer_input",
            Label::InnerInput => "inner_input",
            Label::BindingPosition => "binding_position",
            Label::FieldTypes => "field_types",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainType {
    Union,
    Scan,
    Select,
    Map,
    RowType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrimitiveValue {
    String(String),
    Bool(bool),
    Long(i64),
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::String(s) => f.write_str(s),
            PrimitiveValue::Bool(b) => write!(f, "{}", b),
            PrimitiveValue::Long(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attributes(Vec<(Label, Explainer)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, label: Label, value: Explainer) {
        self.0.push((label, value));
    }

    pub fn get(&self, label: Label) -> Vec<&Explainer> {
        self.0
            .iter()
            .filter(|(l, _)| *l == label)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Label, Explainer)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Explainer {
    Primitive(PrimitiveValue),
    Compound {
        kind: ExplainType,
        attributes: Attributes,
    },
}

impl Explainer {
    pub fn string(value: impl Into<String>) -> Self {
        Explainer::Primitive(PrimitiveValue::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Explainer::Primitive(PrimitiveValue::Bool(value))
    }

    pub fn long(value: i64) -> Self {
        Explainer::Primitive(PrimitiveValue::Long(value))
    }

    pub fn compound(kind: ExplainType, attributes: Attributes) -> Self {
        Explainer::Compound { kind, attributes }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Explainer::Compound { attributes, .. } => Some(attributes),
            Explainer::Primitive(_) => None,
        }
    }

    fn name(&self) -> String {
        match self {
            Explainer::Primitive(p) => p.to_string(),
            Explainer::Compound { kind, attributes } => match attributes.get(Label::Name).first() {
                Some(Explainer::Primitive(p)) => p.to_string(),
                _ => format!("{:?}", kind),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Indented text rendering of an operator tree.
///
/// ```text
/// UnionAll(union_option=ALL, input_type=values(1), ..., pipeline=false)
///   ValuesScan(row_count=2, output_type=values(1))
///   ValuesScan(row_count=2, output_type=values(2))
/// ```
pub fn format_plan(op: &dyn Operator) -> String {
    let mut out = String::new();
    format_explainer(&op.explain(), 0, &mut out);
    out
}

fn format_explainer(explainer: &Explainer, indent: usize, out: &mut String) {
    let prefix = "  ".repeat(indent);
    let attributes = match explainer.attributes() {
        Some(attributes) => attributes,
        None => {
            out.push_str(&format!("{}{}\n", prefix, explainer.name()));
            return;
        }
    };
    let mut inline = vec![];
    let mut children = vec![];
    for (label, value) in attributes.iter() {
        match (label, value) {
            (Label::Name, _) => {}
            (_, Explainer::Primitive(p)) => inline.push(format!("{}={}", label, p)),
            (
                _,
                Explainer::Compound {
                    kind: ExplainType::RowType,
                    ..
                },
            ) => inline.push(format!("{}={}", label, value.name())),
            (_, child) => children.push(child),
        }
    }
    if inline.is_empty() {
        out.push_str(&format!("{}{}\n", prefix, explainer.name()));
    } else {
        out.push_str(&format!(
            "{}{}({})\n",
            prefix,
            explainer.name(),
            inline.join(", ")
        ));
    }
    for child in children {
        format_explainer(child, indent + 1, out);
    }
}
