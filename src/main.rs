use std::cmp::Ordering;
use std::rc::Rc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use rowflow::bindings::QueryBindings;
use rowflow::config::ExecutionConfig;
use rowflow::context::QueryContext;
use rowflow::executor;
use rowflow::explain::format_plan;
use rowflow::operator::{predicate, Filter, Operator, UnionAll, ValuesScan};
use rowflow::row::{Pretty, Row, ValuesRow};
use rowflow::rowtype::Schema;
use rowflow::tap::TapRegistry;
use rowflow::value::{ScalarType, TypeClass, Value};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rowflow=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // config
    let config = match std::env::args().nth(1) {
        Some(path) => ExecutionConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path))?,
        None => ExecutionConfig {
            log_execution: true,
            tap_next_enabled: true,
            ..ExecutionConfig::default()
        },
    };
    let taps = TapRegistry::new();
    let context = QueryContext::with_taps(config, taps.clone());

    // two sources of the same shape, one with a nullable name column
    let schema = Schema::new();
    let customers = schema.new_values_type(vec![
        Some(ScalarType::not_null(TypeClass::BigInt)),
        Some(ScalarType::not_null(TypeClass::Varchar)),
    ]);
    let prospects = schema.new_values_type(vec![
        Some(ScalarType::not_null(TypeClass::BigInt)),
        None,
    ]);
    let customer_rows = vec![
        ValuesRow::new(customers.clone(), vec![Value::BigInt(1), Value::from("Alice")])?.into_ref(),
        ValuesRow::new(customers.clone(), vec![Value::BigInt(4), Value::from("Dave")])?.into_ref(),
    ];
    let prospect_rows = vec![
        ValuesRow::new(prospects.clone(), vec![Value::BigInt(2), Value::Null])?.into_ref(),
        ValuesRow::new(prospects.clone(), vec![Value::BigInt(7), Value::from("Grace")])?.into_ref(),
    ];

    // query
    let union = UnionAll::of(
        &schema,
        Rc::new(ValuesScan::new(customer_rows, customers)?),
        Rc::new(ValuesScan::new(prospect_rows, prospects)?),
        false,
    )?;
    println!("output type: {} {}", union.row_type(), union.row_type().type_string());
    let plan = Filter::new(
        Rc::new(union),
        "id < $0",
        predicate(|row, bindings| {
            let limit = bindings.value(0)?;
            Ok(row.value(0).compare(&limit) == Ordering::Less)
        }),
    );
    print!("{}", format_plan(&plan));

    let bindings = QueryBindings::new();
    bindings.set_value(0, Value::BigInt(5));
    let rows = executor::execute(&plan, &context, bindings)?;
    println!("{}", Pretty(&rows));

    println!("{}", serde_json::to_string_pretty(&taps.report())?);

    Ok(())
}
