//! Canonical JSON projection of a compiled product.
//!
//! The serialized shape is the equivalence surface: two source texts compile
//! to the same product exactly when their canonical values are equal. Field
//! order is declaration order and map keys keep insertion order, so the
//! projection is byte-stable for a given product.

use serde_json::Value;

use crate::error::SemanticError;
use crate::model::Product;

/// Project a product to its canonical JSON value.
pub fn to_canonical(product: &Product) -> Result<Value, SemanticError> {
    serde_json::to_value(product)
        .map_err(|err| SemanticError::malformed("product", err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_optionals_do_not_serialize() {
        let product = Product::new("demo", "4326");
        let value = to_canonical(&product).unwrap();
        assert_eq!(value["name"], "demo");
        assert_eq!(value["srid"], "4326");
        assert!(value.get("center").is_none());
        assert!(value["maps"].as_object().unwrap().is_empty());
    }

    #[test]
    fn equal_products_project_to_equal_values() {
        let a = Product::new("demo", "4326");
        let b = Product::new("demo", "4326");
        assert_eq!(to_canonical(&a).unwrap(), to_canonical(&b).unwrap());
    }
}
