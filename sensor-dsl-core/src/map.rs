//! Map, layer, and style types of the product model.
//!
//! Layers and styles are id-keyed within the product; re-adding an existing
//! id is a no-op, except that re-adding a GeoJSON layer unions its available
//! style set into the existing layer. The style set is a sorted set, so the
//! union is commutative and idempotent and serializes deterministically.

use std::collections::BTreeSet;

use serde::Serialize;

/// A numeric bound that may be the unbounded sentinel. The literal tokens
/// `-Infinity` / `Infinity` stay symbolic instead of being forced through a
/// float parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Number(f64),
    Sentinel(String),
}

impl Bound {
    /// Parse a bound token. Sentinels pass through; anything that does not
    /// parse as a finite number yields `None` and the caller drops the bound.
    pub fn parse(text: &str) -> Option<Bound> {
        if text == "-Infinity" || text == "Infinity" {
            return Some(Bound::Sentinel(text.to_string()));
        }
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(Bound::Number(value)),
            _ => None,
        }
    }
}

/// Fixed-appearance style for a GeoJSON layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoJsonLayerStyle {
    pub name: String,
    pub stroke_color: String,
    pub fill_color: String,
    pub opacity: f64,
    pub weight: f64,
}

impl GeoJsonLayerStyle {
    pub fn new(
        name: impl Into<String>,
        stroke_color: impl Into<String>,
        fill_color: impl Into<String>,
        opacity: f64,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            stroke_color: stroke_color.into(),
            fill_color: fill_color.into(),
            opacity,
            weight,
        }
    }
}

/// One classification rule of a [`StaticIntervalsStyle`]: either a discrete
/// value match or an interval match, mapped to a style id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub style: String,
}

/// Value-driven classification style targeting a property path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticIntervalsStyle {
    pub name: String,
    pub property: String,
    pub intervals: Vec<StyleRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_style: Option<String>,
}

/// A visual rendering rule owned by the product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Style {
    #[serde(rename = "GeoJSONLayerStyle")]
    GeoJson(GeoJsonLayerStyle),
    #[serde(rename = "StaticIntervalsStyle")]
    StaticIntervals(StaticIntervalsStyle),
}

impl Style {
    pub fn name(&self) -> &str {
        match self {
            Style::GeoJson(style) => &style.name,
            Style::StaticIntervals(style) => &style.name,
        }
    }
}

/// Raster tile layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayer {
    pub name: String,
    pub source: String,
    pub url: String,
}

/// Vector layer backed by an entity table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoJsonLayer {
    pub name: String,
    pub table: String,
    pub geometry_field: String,
    pub clustering: bool,
    pub available_styles: BTreeSet<String>,
}

impl GeoJsonLayer {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        geometry_field: impl Into<String>,
        clustering: bool,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            geometry_field: geometry_field.into(),
            clustering,
            available_styles: BTreeSet::new(),
        }
    }

    pub fn with_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_styles
            .extend(styles.into_iter().map(Into::into));
        self
    }
}

/// A named renderable data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Layer {
    #[serde(rename = "TileLayer")]
    Tile(TileLayer),
    #[serde(rename = "GeoJSONLayer")]
    GeoJson(GeoJsonLayer),
}

impl Layer {
    pub fn name(&self) -> &str {
        match self {
            Layer::Tile(layer) => &layer.name,
            Layer::GeoJson(layer) => &layer.name,
        }
    }
}

/// A layer's entry in a map: visibility, default style, z-order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerBinding {
    pub name: String,
    pub base_layer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub selected: bool,
    pub order: usize,
}

/// Initial viewport of a map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapCenter {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u32,
}

/// A named collection of layer bindings shown together.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Map {
    pub id: String,
    pub name: String,
    pub layers: Vec<LayerBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<MapCenter>,
}

impl Map {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            layers: Vec::new(),
            center: None,
        }
    }

    /// Append a layer binding with z-order equal to the current layer count.
    pub fn bind_layer(&mut self, name: impl Into<String>, base_layer: bool, style: Option<String>, selected: bool) {
        let order = self.layers.len();
        self.layers.push(LayerBinding {
            name: name.into(),
            base_layer,
            style,
            selected,
            order,
        });
    }

    pub fn set_center(&mut self, latitude: f64, longitude: f64, zoom: u32) {
        self.center = Some(MapCenter {
            latitude,
            longitude,
            zoom,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_parses_sentinels_and_numbers() {
        assert_eq!(
            Bound::parse("-Infinity"),
            Some(Bound::Sentinel("-Infinity".to_string()))
        );
        assert_eq!(Bound::parse("20"), Some(Bound::Number(20.0)));
        assert_eq!(Bound::parse("-3.5"), Some(Bound::Number(-3.5)));
        assert_eq!(Bound::parse("DEFAULT"), None);
    }

    #[test]
    fn bind_layer_assigns_monotonic_order() {
        let mut map = Map::new("m", "M");
        map.bind_layer("base", true, None, true);
        map.bind_layer("sensor", false, Some("grayPoint".to_string()), true);
        assert_eq!(map.layers[0].order, 0);
        assert_eq!(map.layers[1].order, 1);
    }

    #[test]
    fn style_set_is_sorted_and_deduplicated() {
        let layer = GeoJsonLayer::new("l", "t", "t-geometry", false)
            .with_styles(["redPoint", "grayPoint", "redPoint"]);
        let names: Vec<&String> = layer.available_styles.iter().collect();
        assert_eq!(names, ["grayPoint", "redPoint"]);
    }
}
