//! Semantic analysis: a tree walk over the parse tree that builds and
//! cross-validates the product model.
//!
//! Dispatch is one exhaustive match on the node kind; each construct has a
//! dedicated handler that extracts its fixed-position tokens, validates
//! referenced names, mutates the model through the context, and recurses into
//! nested constructs. The first error aborts the walk.

use tracing::debug;

use crate::ast::{Node, NodeKind};
use crate::context::Context;
use crate::error::{RefKind, SemanticError};
use crate::map::{GeoJsonLayer, Layer, Map, Style, TileLayer};
use crate::model::{
    Dimension, DimensionProperty, MeasureData, Product, Property, RangeBreakpoint,
    RelationshipEnd, Sensor, SensorDimension,
};
use crate::styles;

const BASE_LAYER_URL: &str = "http://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Walk the tree and populate the context's product.
pub fn analyze(root: &Node, ctx: &mut Context) -> Result<(), SemanticError> {
    Visitor { ctx }.visit(root)
}

struct Visitor<'c> {
    ctx: &'c mut Context,
}

impl Visitor<'_> {
    fn visit(&mut self, node: &Node) -> Result<(), SemanticError> {
        match node.kind {
            NodeKind::Parse => self.visit_children(node),
            NodeKind::CreateProduct => self.visit_create_product(node),
            NodeKind::CreateSensorGroup => self.visit_create_sensor_group(node),
            NodeKind::CreateSpatialDimension => self.visit_create_spatial_dimension(node),
            NodeKind::CreateCategoricalDimension => self.visit_create_categorical_dimension(node),
            NodeKind::DimProperty => self.visit_dim_property(node),
            NodeKind::ParentDimension => self.visit_parent_dimension(node),
            NodeKind::CreateRange => self.visit_create_range(node),
            NodeKind::RangeBreakpoint => self.visit_range_breakpoint(node),
            NodeKind::CreateSensor => self.visit_create_sensor(node),
            NodeKind::SensorProperties => self.visit_sensor_properties(node),
            NodeKind::SensorProperty => self.visit_sensor_property(node),
            NodeKind::AddSpatialDimensions => self.visit_add_spatial_dimensions(node),
            NodeKind::AddCategoricalDimensions => self.visit_add_categorical_dimensions(node),
            NodeKind::MeasurementData => self.visit_children(node),
            NodeKind::MeasurementProperty => self.visit_measurement_property(node),
            NodeKind::Bbox => self.visit_bbox(node),
            NodeKind::Deployment => self.visit_children(node),
            NodeKind::DeploymentProperty => self.visit_deployment_property(node),
            NodeKind::Token => Ok(()),
        }
    }

    /// Default traversal: visit every non-token child in order.
    fn visit_children(&mut self, node: &Node) -> Result<(), SemanticError> {
        for child in &node.children {
            if child.kind != NodeKind::Token {
                self.visit(child)?;
            }
        }
        Ok(())
    }

    // ── Product ──

    fn visit_create_product(&mut self, node: &Node) -> Result<(), SemanticError> {
        let name = token(node, 0, "product")?;
        let srid = token(node, 1, "product")?;
        debug!(name, srid, "create product");

        self.ctx.set_product(Product::new(name, srid));
        let product = self.ctx.product_mut()?;
        for style in styles::base_styles() {
            product.add_style(Style::GeoJson(style));
        }
        Ok(())
    }

    fn visit_create_sensor_group(&mut self, node: &Node) -> Result<(), SemanticError> {
        let name = token(node, 0, "sensor group")?;
        let sensors: Vec<String> = (1..node.child_count())
            .filter_map(|index| node.token_text(index))
            .map(str::to_string)
            .collect();
        self.ctx
            .product_mut()?
            .add_sensor_group(name, sensors);
        Ok(())
    }

    // ── Dimensions ──

    fn visit_create_spatial_dimension(&mut self, node: &Node) -> Result<(), SemanticError> {
        let name = token(node, 0, "spatial dimension")?.to_string();
        let geom_type = normalize_geom(token(node, 1, "spatial dimension")?);
        debug!(name, geom_type, "create spatial dimension");

        self.ctx.add_spatial_dimension(&name, geom_type.clone())?;

        // The dimension also names a generated entity.
        let entity = self.ctx.product_mut()?.add_entity(&name);
        entity.add_property(
            Property::new("id", "Long").with_modifiers(["identifier", "required", "unique"]),
        );
        entity.add_property(Property::new("geometry", geom_type));

        self.ctx.set_current_dimension(Some(name.as_str()));
        self.ctx.set_current_entity(Some(name.as_str()));
        self.visit_children(node)?;
        self.ctx.set_current_dimension(None);
        self.ctx.set_current_entity(None);
        Ok(())
    }

    fn visit_create_categorical_dimension(&mut self, node: &Node) -> Result<(), SemanticError> {
        let name = token(node, 0, "categorical dimension")?.to_string();
        let field = token(node, 1, "categorical dimension")?.to_string();
        debug!(name, field, "create categorical dimension");

        self.ctx.add_categorical_dimension(&name, field)?;
        self.ctx.set_current_dimension(Some(name.as_str()));
        self.visit_children(node)?;
        self.ctx.set_current_dimension(None);
        Ok(())
    }

    fn visit_dim_property(&mut self, node: &Node) -> Result<(), SemanticError> {
        let name = token(node, 0, "dimension property")?.to_string();
        let data_type = token(node, 1, "dimension property")?.to_string();
        let modifiers: Vec<String> = (2..node.child_count())
            .filter_map(|index| node.token_text(index))
            .map(str::to_string)
            .collect();
        let display_string = node.token_text(2).map(str::to_string);

        self.ctx
            .current_entity_mut()?
            .add_property(Property::new(&name, &data_type).with_modifiers(&modifiers));

        match self.ctx.current_dimension_mut()? {
            Dimension::Spatial { properties, .. } => {
                properties.push(DimensionProperty {
                    id: name,
                    data_type,
                    display_string,
                });
                Ok(())
            }
            Dimension::Categorical { id, .. } => Err(SemanticError::malformed(
                "dimension property",
                format!("dimension '{id}' is not spatial"),
            )),
        }
    }

    fn visit_parent_dimension(&mut self, node: &Node) -> Result<(), SemanticError> {
        let parent_name = token(node, 0, "parent dimension")?;
        let parent_id = self
            .ctx
            .dimension(parent_name)
            .ok_or_else(|| SemanticError::undefined(RefKind::Dimension, parent_name))?
            .id()
            .to_string();
        let source = self.ctx.current_entity_name()?.to_string();

        self.ctx.product_mut()?.add_relationship(
            source,
            parent_id,
            RelationshipEnd::new("belongs", "0..1"),
            RelationshipEnd::new("contains", "0..*"),
        );
        Ok(())
    }

    // ── Ranges ──

    fn visit_create_range(&mut self, node: &Node) -> Result<(), SemanticError> {
        let name = token(node, 0, "range")?.to_string();
        debug!(name, "create range");

        self.ctx.add_range(&name)?;
        self.ctx.set_current_range(Some(name.as_str()));
        self.visit_children(node)?;
        self.ctx.set_current_range(None);
        Ok(())
    }

    fn visit_range_breakpoint(&mut self, node: &Node) -> Result<(), SemanticError> {
        let range_id = self.ctx.current_range_id()?.to_string();
        let is_interval = node.token_text(1) == Some("TO");

        let breakpoint = if is_interval {
            let min = token(node, 0, "range breakpoint")?.to_string();
            let max = token(node, 2, "range breakpoint")?.to_string();
            let label = unquote(token(node, 3, "range breakpoint")?);
            let color = node.token_text(4).map(str::to_string);
            RangeBreakpoint {
                value: None,
                min_value: Some(min),
                max_value: Some(max),
                style: styles::breakpoint_style(&range_id, &label, color.as_deref()),
                label,
                color,
            }
        } else {
            let value = token(node, 0, "range breakpoint")?.to_string();
            let label = unquote(token(node, 1, "range breakpoint")?);
            let color = node.token_text(2).map(str::to_string);
            RangeBreakpoint {
                value: Some(value),
                min_value: None,
                max_value: None,
                style: styles::breakpoint_style(&range_id, &label, color.as_deref()),
                label,
                color,
            }
        };

        self.ctx.current_range_mut()?.properties.push(breakpoint);
        Ok(())
    }

    // ── Sensors ──

    fn visit_create_sensor(&mut self, node: &Node) -> Result<(), SemanticError> {
        let moving = node.token_text(0) == Some("MOVING");
        let offset = usize::from(moving);
        let name = token(node, offset, "sensor")?.to_string();
        let interval = token(node, offset + 1, "sensor")?
            .parse::<u64>()
            .map_err(|_| {
                SemanticError::malformed("sensor", format!("invalid interval for '{name}'"))
            })?;
        let geom = token(node, offset + 2, "sensor")?.to_string();
        debug!(name, interval, moving, geom, "create sensor");

        self.ctx
            .product_mut()?
            .add_sensor(Sensor::new(&name, Some(interval), moving, Some(geom)));

        self.ctx.set_current_sensor(Some(name.as_str()));
        self.visit_children(node)?;
        self.ctx.set_current_sensor(None);
        self.ctx.set_current_entity(None);
        Ok(())
    }

    fn visit_sensor_properties(&mut self, node: &Node) -> Result<(), SemanticError> {
        let sensor = self.ctx.current_sensor()?.clone();
        let product = self.ctx.product_mut()?;

        // Owning entity. A stationary sensor's position is per-device.
        let entity = product.add_entity(&sensor.entity);
        entity.add_property(
            Property::new("id", "Long").with_modifiers(["identifier", "required", "unique"]),
        );
        if !sensor.is_moving {
            entity.add_property(Property::new("geometry", &sensor.geom));
        }

        // Fact entity. A moving sensor's position is per-reading.
        let fact = product.add_entity(&sensor.fact_table_entity);
        fact.add_property(
            Property::new("id", "Long").with_modifiers(["identifier", "required", "unique"]),
        );
        if sensor.is_moving {
            fact.add_property(Property::new("geometry", &sensor.geom));
        }
        fact.add_property(Property::new("date", "DateTime").with_modifiers(["required"]));

        product.add_relationship(
            &sensor.entity,
            &sensor.fact_table_entity,
            RelationshipEnd::new("sensors", "0..*"),
            RelationshipEnd::new("sensor_id", "0..1"),
        );

        // Base tile layer, shared across sensors.
        if product.layer("base").is_none() {
            product.add_layer(Layer::Tile(TileLayer {
                name: "base".to_string(),
                source: "base".to_string(),
                url: BASE_LAYER_URL.to_string(),
            }));
        }

        // The sensor's own layer reads from whichever entity carries the
        // geometry.
        let (table, geometry_field) = if sensor.is_moving {
            (
                sensor.fact_table_entity.clone(),
                sensor.fact_table_entity.clone(),
            )
        } else {
            (sensor.entity.clone(), format!("{}-geometry", sensor.entity))
        };
        product.add_layer(Layer::GeoJson(
            GeoJsonLayer::new(&sensor.default_layer, table, geometry_field, false)
                .with_styles(styles::base_style_names()),
        ));

        let mut map = Map::new(&sensor.default_map, format!("{} Map", sensor.id));
        map.bind_layer("base", true, None, true);
        map.bind_layer(
            &sensor.default_layer,
            false,
            Some("grayPoint".to_string()),
            true,
        );
        product.add_map(map);

        self.ctx.set_current_entity(Some(sensor.entity.as_str()));
        self.visit_children(node)?;
        self.ctx.set_current_entity(None);
        Ok(())
    }

    fn visit_sensor_property(&mut self, node: &Node) -> Result<(), SemanticError> {
        let name = token(node, 0, "sensor property")?;
        let data_type = token(node, 1, "sensor property")?;
        let modifiers: Vec<String> = (2..node.child_count())
            .filter_map(|index| node.token_text(index))
            .map(str::to_string)
            .collect();

        self.ctx
            .current_entity_mut()?
            .add_property(Property::new(name, data_type).with_modifiers(&modifiers));
        Ok(())
    }

    fn visit_add_spatial_dimensions(&mut self, node: &Node) -> Result<(), SemanticError> {
        let rel_name = token(node, 0, "spatial dimension attachment")?.to_string();
        let sensor = self.ctx.current_sensor()?.clone();

        for index in 1..node.child_count() {
            let dim_name = token(node, index, "spatial dimension attachment")?.to_string();
            let dimension = self
                .ctx
                .dimension(&dim_name)
                .ok_or_else(|| SemanticError::undefined(RefKind::Dimension, &dim_name))?;
            let geom_type = match dimension {
                Dimension::Spatial { geom_type, .. } => geom_type.clone(),
                Dimension::Categorical { .. } => {
                    return Err(SemanticError::malformed(
                        "spatial dimension attachment",
                        format!("dimension '{dim_name}' is not spatial"),
                    ))
                }
            };

            self.ctx
                .current_sensor_mut()?
                .attach_spatial(&rel_name, &dim_name);

            let product = self.ctx.product_mut()?;
            if !sensor.is_moving {
                product.add_relationship(
                    &sensor.entity,
                    &dim_name,
                    RelationshipEnd::new(format!("{}_id", dim_name.to_lowercase()), "0..1"),
                    RelationshipEnd::new(&sensor.entity, "0..*"),
                );
            }

            // Layer for the dimension: gray base plus one entry per
            // measurement, doubled with the polygon variant for area
            // geometries.
            let mut layer = GeoJsonLayer::new(
                &dim_name,
                &dim_name,
                format!("{dim_name}-geometry"),
                false,
            )
            .with_styles(["grayPolygon"]);
            for measure in &sensor.measure_data {
                layer.available_styles.insert(measure.name.clone());
                if geom_type == "Polygon" || geom_type == "Geometry" {
                    layer
                        .available_styles
                        .insert(format!("{}_POLYGON", measure.name));
                }
            }

            let binding_style = if geom_type == "Point" {
                "grayPoint"
            } else {
                "grayPolygon"
            };
            let map = product.map_mut(&sensor.default_map).ok_or_else(|| {
                SemanticError::malformed(
                    "spatial dimension attachment",
                    format!("map '{}' not found", sensor.default_map),
                )
            })?;
            map.bind_layer(&dim_name, false, Some(binding_style.to_string()), false);

            product.add_layer(Layer::GeoJson(layer));
        }
        Ok(())
    }

    fn visit_add_categorical_dimensions(&mut self, node: &Node) -> Result<(), SemanticError> {
        let mut index = 0;
        let mut group_id = None;
        if node.token_text(0) == Some("GROUP") {
            group_id = Some(token(node, 1, "categorical dimension attachment")?.to_string());
            index = 2;
        }

        while index < node.child_count() {
            let dim_name = token(node, index, "categorical dimension attachment")?.to_string();
            let dimension = self
                .ctx
                .dimension(&dim_name)
                .ok_or_else(|| SemanticError::undefined(RefKind::Dimension, &dim_name))?;
            let field = match dimension {
                Dimension::Categorical { field, .. } => field.clone(),
                Dimension::Spatial { .. } => {
                    return Err(SemanticError::malformed(
                        "categorical dimension attachment",
                        format!("dimension '{dim_name}' is not categorical"),
                    ))
                }
            };

            let categories = if node.token_text(index + 1) == Some("RANGE") {
                let range_name = token(node, index + 2, "categorical dimension attachment")?;
                let range = self
                    .ctx
                    .range(range_name)
                    .ok_or_else(|| SemanticError::undefined(RefKind::Range, range_name))?;
                index += 3;
                Some(styles::categories_from_range(range))
            } else {
                index += 1;
                None
            };

            let data_type = if categories.is_some() { "Double" } else { "String" };
            self.ctx
                .current_sensor_mut()?
                .attach_categorical(SensorDimension::Categorical {
                    id: dim_name,
                    field: field.clone(),
                    group_id: group_id.clone(),
                    categories,
                });
            self.ctx
                .current_entity_mut()?
                .add_property(Property::new(field, data_type));
        }
        Ok(())
    }

    // ── Measurements ──

    fn visit_measurement_property(&mut self, node: &Node) -> Result<(), SemanticError> {
        let sensor = self.ctx.current_sensor()?.clone();
        self.ctx
            .set_current_entity(Some(sensor.fact_table_entity.as_str()));

        let name = token(node, 0, "measurement")?.to_lowercase();
        let data_type = token(node, 1, "measurement")?.to_string();

        let mut units = None;
        let mut icon = None;
        let mut range_name = None;
        let mut index = 2;
        while let (Some(keyword), Some(value)) =
            (node.token_text(index), node.token_text(index + 1))
        {
            match keyword {
                "UNITS" => units = Some(unquote(value)),
                "ICON" => icon = Some(unquote(value)),
                "RANGE" => range_name = Some(unquote(value)),
                _ => {}
            }
            index += 2;
        }

        self.ctx.current_sensor_mut()?.add_measure_data(MeasureData {
            name: name.clone(),
            data_type: data_type.clone(),
            units,
            icon,
            range: range_name.clone(),
        });
        self.ctx
            .current_entity_mut()?
            .add_property(Property::new(&name, &data_type));

        match self.ctx.product_mut()?.layer_mut(&sensor.default_layer) {
            Some(Layer::GeoJson(layer)) => {
                layer.available_styles.insert(name.clone());
            }
            _ => {
                return Err(SemanticError::malformed(
                    "measurement",
                    format!("layer '{}' not found", sensor.default_layer),
                ))
            }
        }

        if let Some(range_name) = &range_name {
            let range = self
                .ctx
                .range(range_name)
                .ok_or_else(|| SemanticError::undefined(RefKind::Range, range_name))?
                .clone();
            let product = self.ctx.product_mut()?;
            for breakpoint in &range.properties {
                product.add_style(Style::GeoJson(breakpoint.style.clone()));
            }
            for style in styles::range_interval_styles(&name, &range) {
                product.add_style(Style::StaticIntervals(style));
            }
        } else {
            let product = self.ctx.product_mut()?;
            for style in styles::default_interval_styles(&name) {
                product.add_style(Style::StaticIntervals(style));
            }
        }
        Ok(())
    }

    // ── Map viewport ──

    fn visit_bbox(&mut self, node: &Node) -> Result<(), SemanticError> {
        let sensor = self.ctx.current_sensor()?.clone();
        let latitude = parse_number(node, 0, "bbox")?;
        let longitude = parse_number(node, 1, "bbox")?;
        let zoom = token(node, 2, "bbox")?
            .parse::<u32>()
            .map_err(|_| SemanticError::malformed("bbox", "invalid zoom level"))?;

        let map = self
            .ctx
            .product_mut()?
            .map_mut(&sensor.default_map)
            .ok_or_else(|| {
                SemanticError::malformed("bbox", format!("map '{}' not found", sensor.default_map))
            })?;
        map.set_center(latitude, longitude, zoom);
        Ok(())
    }

    // ── Deployment ──

    fn visit_deployment_property(&mut self, node: &Node) -> Result<(), SemanticError> {
        let key = unquote(token(node, 0, "deployment property")?);
        let value = unquote(token(node, 1, "deployment property")?);
        self.ctx.product_mut()?.add_deployment_property(key, value);
        Ok(())
    }
}

fn token<'n>(
    node: &'n Node,
    index: usize,
    construct: &'static str,
) -> Result<&'n str, SemanticError> {
    node.token_text(index).ok_or_else(|| {
        SemanticError::malformed(construct, format!("missing element at position {index}"))
    })
}

fn parse_number(node: &Node, index: usize, construct: &'static str) -> Result<f64, SemanticError> {
    let text = token(node, index, construct)?;
    text.parse::<f64>()
        .map_err(|_| SemanticError::malformed(construct, format!("invalid number '{text}'")))
}

/// Strip quote characters. Single and double quotes compile identically.
fn unquote(text: &str) -> String {
    text.chars().filter(|c| *c != '\'' && *c != '"').collect()
}

/// Geometry type names are normalized to leading-uppercase form.
fn normalize_geom(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
