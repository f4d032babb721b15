//! Per-compilation mutable state.
//!
//! A `Context` owns exactly one in-progress [`Product`], the id registries
//! for dimensions and ranges, and the "current" slots the visitor threads
//! through nested constructs. It is constructed fresh inside every `compile`
//! call, never shared between compilations, so concurrent compilations
//! cannot observe each other's state.

use std::collections::HashMap;

use crate::error::{RefKind, SemanticError};
use crate::model::{Dimension, Entity, Product, Range, Sensor};

#[derive(Debug, Default)]
pub struct Context {
    product: Option<Product>,
    /// Dimension id -> index into `product.dimensions`. One registry across
    /// both dimension kinds, so spatial and categorical ids cannot collide.
    dimension_index: HashMap<String, usize>,
    /// Range id -> index into `product.ranges`.
    range_index: HashMap<String, usize>,
    current_dimension: Option<String>,
    current_entity: Option<String>,
    current_sensor: Option<String>,
    current_range: Option<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Product ──

    pub fn set_product(&mut self, product: Product) {
        self.product = Some(product);
    }

    pub fn product(&self) -> Result<&Product, SemanticError> {
        self.product
            .as_ref()
            .ok_or_else(|| SemanticError::malformed("product", "no product declared"))
    }

    pub fn product_mut(&mut self) -> Result<&mut Product, SemanticError> {
        self.product
            .as_mut()
            .ok_or_else(|| SemanticError::malformed("product", "no product declared"))
    }

    pub fn into_product(self) -> Result<Product, SemanticError> {
        self.product
            .ok_or_else(|| SemanticError::malformed("product", "no product declared"))
    }

    // ── Dimension registry ──

    pub fn add_spatial_dimension(
        &mut self,
        id: &str,
        geom_type: String,
    ) -> Result<(), SemanticError> {
        self.register_dimension(Dimension::Spatial {
            id: id.to_string(),
            geom_type,
            properties: Vec::new(),
        })
    }

    pub fn add_categorical_dimension(
        &mut self,
        id: &str,
        field: String,
    ) -> Result<(), SemanticError> {
        self.register_dimension(Dimension::Categorical {
            id: id.to_string(),
            field,
        })
    }

    fn register_dimension(&mut self, dimension: Dimension) -> Result<(), SemanticError> {
        let id = dimension.id().to_string();
        if self.dimension_index.contains_key(&id) {
            return Err(SemanticError::duplicate(RefKind::Dimension, id));
        }
        let product = self.product_mut()?;
        product.dimensions.push(dimension);
        self.dimension_index
            .insert(id, self.product()?.dimensions.len() - 1);
        Ok(())
    }

    pub fn dimension(&self, id: &str) -> Option<&Dimension> {
        let index = *self.dimension_index.get(id)?;
        self.product.as_ref()?.dimensions.get(index)
    }

    // ── Range registry ──

    pub fn add_range(&mut self, id: &str) -> Result<(), SemanticError> {
        if self.range_index.contains_key(id) {
            return Err(SemanticError::duplicate(RefKind::Range, id));
        }
        let product = self.product_mut()?;
        product.ranges.push(Range::new(id));
        self.range_index
            .insert(id.to_string(), self.product()?.ranges.len() - 1);
        Ok(())
    }

    pub fn range(&self, id: &str) -> Option<&Range> {
        let index = *self.range_index.get(id)?;
        self.product.as_ref()?.ranges.get(index)
    }

    // ── Current slots ──

    pub fn set_current_dimension(&mut self, id: Option<&str>) {
        self.current_dimension = id.map(str::to_string);
    }

    pub fn set_current_entity(&mut self, name: Option<&str>) {
        self.current_entity = name.map(str::to_string);
    }

    pub fn set_current_sensor(&mut self, id: Option<&str>) {
        self.current_sensor = id.map(str::to_string);
    }

    pub fn set_current_range(&mut self, id: Option<&str>) {
        self.current_range = id.map(str::to_string);
    }

    pub fn current_dimension_mut(&mut self) -> Result<&mut Dimension, SemanticError> {
        let id = self
            .current_dimension
            .clone()
            .ok_or_else(|| SemanticError::malformed("dimension", "no active dimension"))?;
        let index = *self
            .dimension_index
            .get(&id)
            .ok_or_else(|| SemanticError::undefined(RefKind::Dimension, &id))?;
        Ok(&mut self.product_mut()?.dimensions[index])
    }

    pub fn current_entity_mut(&mut self) -> Result<&mut Entity, SemanticError> {
        let name = self
            .current_entity
            .clone()
            .ok_or_else(|| SemanticError::malformed("entity", "no active entity"))?;
        self.product_mut()?
            .entity_mut(&name)
            .ok_or_else(|| SemanticError::malformed("entity", format!("entity '{name}' not found")))
    }

    pub fn current_entity_name(&self) -> Result<&str, SemanticError> {
        self.current_entity
            .as_deref()
            .ok_or_else(|| SemanticError::malformed("entity", "no active entity"))
    }

    pub fn current_sensor(&self) -> Result<&Sensor, SemanticError> {
        let id = self
            .current_sensor
            .as_deref()
            .ok_or_else(|| SemanticError::malformed("sensor", "no active sensor"))?;
        self.product()?
            .sensors
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SemanticError::malformed("sensor", format!("sensor '{id}' not found")))
    }

    pub fn current_sensor_mut(&mut self) -> Result<&mut Sensor, SemanticError> {
        let id = self
            .current_sensor
            .clone()
            .ok_or_else(|| SemanticError::malformed("sensor", "no active sensor"))?;
        self.product_mut()?
            .sensor_mut(&id)
            .ok_or_else(|| SemanticError::malformed("sensor", format!("sensor '{id}' not found")))
    }

    pub fn current_range_mut(&mut self) -> Result<&mut Range, SemanticError> {
        let id = self
            .current_range
            .clone()
            .ok_or_else(|| SemanticError::malformed("range", "no active range"))?;
        let index = *self
            .range_index
            .get(&id)
            .ok_or_else(|| SemanticError::undefined(RefKind::Range, &id))?;
        Ok(&mut self.product_mut()?.ranges[index])
    }

    pub fn current_range_id(&self) -> Result<&str, SemanticError> {
        self.current_range
            .as_deref()
            .ok_or_else(|| SemanticError::malformed("range", "no active range"))
    }
}
