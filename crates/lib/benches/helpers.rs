//! Shared helpers for benchmarks

use formstate::{
    Schema, SchemaExt, Value,
    schema::{array, number, object, string},
};
use serde_json::json;

/// Schema of an order form with a list of line items.
pub fn order_schema() -> Schema {
    let sku = regex::Regex::new("^[A-Z]{3}-[0-9]+$").unwrap();
    object()
        .field("customer", string().min(2))
        .field("email", string().email())
        .field(
            "items",
            array(
                object()
                    .field("sku", string().regex(sku))
                    .field("quantity", number().int().positive()),
            )
            .min(1),
        )
        .into_schema()
}

/// Order form values with `line_count` items; every `invalid_every`th item
/// fails validation (0 means all items are valid).
pub fn order_values(line_count: usize, invalid_every: usize) -> Value {
    let items: Vec<serde_json::Value> = (0..line_count)
        .map(|i| {
            let invalid = invalid_every != 0 && i % invalid_every == 0;
            let (sku, quantity) = if invalid {
                (format!("bad{i}"), -1)
            } else {
                (format!("ABC-{i}"), 1 + i as i64)
            };
            json!({"sku": sku, "quantity": quantity})
        })
        .collect();
    Value::from(json!({
        "customer": "Ada Lovelace",
        "email": "ada@example.com",
        "items": items,
    }))
}

/// Dotted paths to every leaf of `order_values(line_count, _)`.
pub fn order_leaf_paths(line_count: usize) -> Vec<String> {
    let mut paths = vec!["customer".to_string(), "email".to_string()];
    for i in 0..line_count {
        paths.push(format!("items.{i}.sku"));
        paths.push(format!("items.{i}.quantity"));
    }
    paths
}
