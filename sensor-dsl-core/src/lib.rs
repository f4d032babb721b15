//! Compiler for the sensor product language.
//!
//! A source text declares a product, its dimensions, ranges, sensors, and
//! deployment properties. Compilation runs in two phases: a parser builds a
//! generic parse tree, then a tree-walking visitor performs semantic analysis
//! and assembles the normalized [`Product`] model. The model serializes to a
//! canonical JSON shape used to decide whether two source texts are
//! semantically equivalent.
//!
//! ```no_run
//! let source = "CREATE PRODUCT demo USING 4326;";
//! let product = sensor_dsl_core::compile(source)?;
//! let canonical = sensor_dsl_core::to_canonical(&product)?;
//! # Ok::<(), sensor_dsl_core::CompileError>(())
//! ```

pub mod ast;
pub mod context;
pub mod error;
pub mod map;
pub mod model;
pub mod parser;
pub mod styles;
pub mod transform;
pub mod visitor;

pub use error::{CompileError, RefKind, SemanticError};
pub use model::Product;
pub use transform::to_canonical;

/// Compile a source text to its product model.
///
/// Each call runs against a fresh context, so compilations are independent
/// and the result depends only on the source text.
pub fn compile(source: &str) -> Result<Product, CompileError> {
    let tree = parser::parse_source(source).map_err(CompileError::Syntax)?;
    let mut ctx = context::Context::new();
    visitor::analyze(&tree, &mut ctx)?;
    Ok(ctx.into_product()?)
}
