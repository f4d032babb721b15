//! The product domain model and its mutation surface.
//!
//! `Product` is the root aggregate built up during one compilation. All
//! mutation goes through the methods here, which enforce the model's merge
//! semantics: entities and relationships are append-only, styles are
//! idempotent by name, layers are id-keyed with style-set union on conflict,
//! and maps are created on first reference.

use indexmap::IndexMap;
use serde::Serialize;

use crate::map::{Bound, GeoJsonLayerStyle, Layer, Map, Style};

pub const DEFAULT_INTERVAL: u64 = 1000;
pub const DEFAULT_GEOMETRY: &str = "Point";

/// A property of a generated entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub identifier: bool,
    pub required: bool,
    pub unique: bool,
    pub display_string: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            identifier: false,
            required: false,
            unique: false,
            display_string: false,
        }
    }

    /// Apply trailing modifier keywords (case-insensitive). Unknown
    /// modifiers are ignored.
    pub fn with_modifiers<I, S>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for modifier in modifiers {
            match modifier.as_ref().to_lowercase().as_str() {
                "identifier" => self.identifier = true,
                "required" => self.required = true,
                "unique" => self.unique = true,
                "display_string" => self.display_string = true,
                _ => {}
            }
        }
        self
    }
}

/// A generated relational-like entity. Properties are never removed once
/// added.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub name: String,
    pub properties: Vec<Property>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }
}

/// One side of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipEnd {
    pub label: String,
    pub multiplicity: String,
}

impl RelationshipEnd {
    pub fn new(label: impl Into<String>, multiplicity: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            multiplicity: multiplicity.into(),
        }
    }
}

/// A directed edge between two entities, with a label and multiplicity on
/// each side. Append-only; the same pair may carry several distinct edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub source_opts: RelationshipEnd,
    pub target_opts: RelationshipEnd,
}

/// A property descriptor recorded on a spatial dimension, parallel to the
/// entity property the visitor creates for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionProperty {
    pub id: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_string: Option<String>,
}

/// A classification axis: geometry-bearing or field-valued. Ids are unique
/// across both kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Dimension {
    #[serde(rename = "SPATIAL", rename_all = "camelCase")]
    Spatial {
        id: String,
        geom_type: String,
        properties: Vec<DimensionProperty>,
    },
    #[serde(rename = "CATEGORICAL")]
    Categorical { id: String, field: String },
}

impl Dimension {
    pub fn id(&self) -> &str {
        match self {
            Dimension::Spatial { id, .. } => id,
            Dimension::Categorical { id, .. } => id,
        }
    }
}

/// One breakpoint of a range: a discrete value match or an interval match,
/// each carrying the style generated for it. `value == "DEFAULT"` marks the
/// fallback breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeBreakpoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<String>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub style: GeoJsonLayerStyle,
}

impl RangeBreakpoint {
    pub fn is_default(&self) -> bool {
        self.value.as_deref() == Some("DEFAULT")
    }
}

/// A named ordered set of breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Range {
    pub id: String,
    pub properties: Vec<RangeBreakpoint>,
}

impl Range {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: Vec::new(),
        }
    }
}

/// A measurement declared on a sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureData {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

/// A categorical category expanded from a range breakpoint. Bounds are
/// numeric where they parse, symbolic for the infinity sentinels, and absent
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Bound>,
    pub label: String,
}

/// A dimension attachment recorded on a sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SensorDimension {
    #[serde(rename = "SPATIAL")]
    Spatial { id: String, entities: Vec<String> },
    #[serde(rename = "CATEGORICAL", rename_all = "camelCase")]
    Categorical {
        id: String,
        field: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        categories: Option<Vec<Category>>,
    },
}

/// A sensor declaration and the artifact names derived from its id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: String,
    pub entity: String,
    pub default_map: String,
    pub default_layer: String,
    pub interval: u64,
    pub is_moving: bool,
    pub fact_table_entity: String,
    pub geom: String,
    pub measure_data: Vec<MeasureData>,
    pub dimensions: Vec<SensorDimension>,
}

impl Sensor {
    pub fn new(id: impl Into<String>, interval: Option<u64>, moving: bool, geom: Option<String>) -> Self {
        let id = id.into();
        Self {
            entity: format!("{id}Entity"),
            default_map: format!("{}-map", id.to_lowercase()),
            default_layer: format!("{}-layer", id.to_lowercase()),
            interval: interval.unwrap_or(DEFAULT_INTERVAL),
            is_moving: moving,
            fact_table_entity: format!("{id}Measurement"),
            geom: geom.unwrap_or_else(|| DEFAULT_GEOMETRY.to_string()),
            measure_data: Vec::new(),
            dimensions: Vec::new(),
            id,
        }
    }

    pub fn add_measure_data(&mut self, measure: MeasureData) {
        self.measure_data.push(measure);
    }

    /// Record a spatial attachment keyed by the relationship label, merging
    /// into an existing record for the same label.
    pub fn attach_spatial(&mut self, rel_id: &str, dimension_id: &str) {
        for dimension in &mut self.dimensions {
            if let SensorDimension::Spatial { id, entities } = dimension {
                if id == rel_id {
                    entities.push(dimension_id.to_string());
                    return;
                }
            }
        }
        self.dimensions.push(SensorDimension::Spatial {
            id: rel_id.to_string(),
            entities: vec![dimension_id.to_string()],
        });
    }

    pub fn attach_categorical(&mut self, attachment: SensorDimension) {
        self.dimensions.push(attachment);
    }
}

/// The root aggregate: everything one compilation produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    pub srid: String,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub sensors: Vec<Sensor>,
    pub sensor_groups: IndexMap<String, Vec<String>>,
    pub dimensions: Vec<Dimension>,
    pub ranges: Vec<Range>,
    pub styles: Vec<Style>,
    pub layers: Vec<Layer>,
    pub maps: IndexMap<String, Map>,
    pub deployment_properties: IndexMap<String, String>,
}

impl Product {
    pub fn new(name: impl Into<String>, srid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            srid: srid.into(),
            entities: Vec::new(),
            relationships: Vec::new(),
            sensors: Vec::new(),
            sensor_groups: IndexMap::new(),
            dimensions: Vec::new(),
            ranges: Vec::new(),
            styles: Vec::new(),
            layers: Vec::new(),
            maps: IndexMap::new(),
            deployment_properties: IndexMap::new(),
        }
    }

    // ── Entities ──

    /// Add an entity if it does not exist yet, and return a mutable handle
    /// to it either way.
    pub fn add_entity(&mut self, name: &str) -> &mut Entity {
        if let Some(index) = self.entities.iter().position(|e| e.name == name) {
            return &mut self.entities[index];
        }
        self.entities.push(Entity::new(name));
        self.entities.last_mut().unwrap()
    }

    pub fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.name == name)
    }

    // ── Relationships ──

    pub fn add_relationship(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        source_opts: RelationshipEnd,
        target_opts: RelationshipEnd,
    ) {
        self.relationships.push(Relationship {
            source: source.into(),
            target: target.into(),
            source_opts,
            target_opts,
        });
    }

    // ── Sensors ──

    pub fn add_sensor(&mut self, sensor: Sensor) -> &mut Sensor {
        self.sensors.push(sensor);
        self.sensors.last_mut().unwrap()
    }

    pub fn sensor_mut(&mut self, id: &str) -> Option<&mut Sensor> {
        self.sensors.iter_mut().find(|s| s.id == id)
    }

    pub fn add_sensor_group(&mut self, name: impl Into<String>, sensors: Vec<String>) {
        self.sensor_groups.insert(name.into(), sensors);
    }

    // ── Styles ──

    /// Idempotent add: a style whose name is already registered is skipped.
    pub fn add_style(&mut self, style: Style) {
        if self.styles.iter().any(|s| s.name() == style.name()) {
            return;
        }
        self.styles.push(style);
    }

    // ── Layers ──

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name() == name)
    }

    /// Id-keyed add. Re-adding an existing GeoJSON layer unions the incoming
    /// available-style set into the registered layer; anything else is a
    /// no-op.
    pub fn add_layer(&mut self, layer: Layer) {
        match self.layer_mut(layer.name()) {
            None => self.layers.push(layer),
            Some(Layer::GeoJson(existing)) => {
                if let Layer::GeoJson(incoming) = layer {
                    existing
                        .available_styles
                        .extend(incoming.available_styles);
                }
            }
            Some(Layer::Tile(_)) => {}
        }
    }

    // ── Maps ──

    /// First reference wins: an existing map id keeps its map.
    pub fn add_map(&mut self, map: Map) {
        self.maps.entry(map.id.clone()).or_insert(map);
    }

    pub fn map_mut(&mut self, id: &str) -> Option<&mut Map> {
        self.maps.get_mut(id)
    }

    // ── Deployment ──

    pub fn add_deployment_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.deployment_properties.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::GeoJsonLayer;

    #[test]
    fn add_entity_is_idempotent_and_properties_monotonic() {
        let mut product = Product::new("p", "4326");
        product
            .add_entity("A")
            .add_property(Property::new("id", "Long").with_modifiers(["IDENTIFIER"]));
        product.add_entity("A").add_property(Property::new("x", "String"));

        assert_eq!(product.entities.len(), 1);
        assert_eq!(product.entities[0].properties.len(), 2);
        assert!(product.entities[0].properties[0].identifier);
    }

    #[test]
    fn add_style_skips_duplicate_names() {
        let mut product = Product::new("p", "4326");
        let style = Style::GeoJson(GeoJsonLayerStyle::new("redPoint", "#FF0000", "#FF0000", 1.0, 1.0));
        product.add_style(style.clone());
        product.add_style(style);
        assert_eq!(product.styles.len(), 1);
    }

    #[test]
    fn add_layer_unions_styles_on_conflict() {
        let mut product = Product::new("p", "4326");
        product.add_layer(Layer::GeoJson(
            GeoJsonLayer::new("dim", "dim", "dim-geometry", false).with_styles(["a", "b"]),
        ));
        product.add_layer(Layer::GeoJson(
            GeoJsonLayer::new("dim", "dim", "dim-geometry", false).with_styles(["b", "c"]),
        ));

        match product.layer("dim").unwrap() {
            Layer::GeoJson(layer) => {
                let styles: Vec<&String> = layer.available_styles.iter().collect();
                assert_eq!(styles, ["a", "b", "c"]);
            }
            Layer::Tile(_) => panic!("expected geojson layer"),
        }
    }

    #[test]
    fn add_map_keeps_first_registration() {
        let mut product = Product::new("p", "4326");
        let mut first = Map::new("m", "First");
        first.bind_layer("base", true, None, true);
        product.add_map(first);
        product.add_map(Map::new("m", "Second"));

        assert_eq!(product.maps["m"].name, "First");
        assert_eq!(product.maps["m"].layers.len(), 1);
    }

    #[test]
    fn spatial_attachments_merge_by_relationship_label() {
        let mut sensor = Sensor::new("Temp", None, false, None);
        sensor.attach_spatial("location", "Province");
        sensor.attach_spatial("location", "Municipality");

        assert_eq!(sensor.dimensions.len(), 1);
        match &sensor.dimensions[0] {
            SensorDimension::Spatial { id, entities } => {
                assert_eq!(id, "location");
                assert_eq!(entities, &["Province", "Municipality"]);
            }
            _ => panic!("expected spatial attachment"),
        }
    }

    #[test]
    fn sensor_derives_artifact_names() {
        let sensor = Sensor::new("AirQuality", None, false, None);
        assert_eq!(sensor.entity, "AirQualityEntity");
        assert_eq!(sensor.default_map, "airquality-map");
        assert_eq!(sensor.default_layer, "airquality-layer");
        assert_eq!(sensor.fact_table_entity, "AirQualityMeasurement");
        assert_eq!(sensor.interval, 1000);
        assert_eq!(sensor.geom, "Point");
    }
}
