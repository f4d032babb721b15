//! Style and range resolution policies.
//!
//! Pure functions deriving generated styles: the fixed base palette seeded by
//! every product, the per-breakpoint styles of a range, and the two
//! classification policies for measurements (range-driven and
//! fixed-threshold). Absent values stay absent in the generated payloads so
//! two compilations of equivalent input serialize identically.

use crate::map::{Bound, GeoJsonLayerStyle, StaticIntervalsStyle, StyleRule};
use crate::model::{Category, Range, RangeBreakpoint};

pub const DEFAULT_COLOR: &str = "#808080";

const RED: &str = "#FF0000";
const GREEN: &str = "#008000";
const GRAY: &str = "#808080";
const ORANGE: &str = "#FFA500";

/// The 8 fixed base styles every product starts with: point/polygon in red,
/// green, gray, and orange. Points are opaque, polygons half-opaque.
pub fn base_styles() -> Vec<GeoJsonLayerStyle> {
    vec![
        GeoJsonLayerStyle::new("redPoint", RED, RED, 1.0, 1.0),
        GeoJsonLayerStyle::new("greenPoint", GREEN, GREEN, 1.0, 1.0),
        GeoJsonLayerStyle::new("grayPoint", GRAY, GRAY, 1.0, 1.0),
        GeoJsonLayerStyle::new("orangePoint", ORANGE, ORANGE, 1.0, 1.0),
        GeoJsonLayerStyle::new("redPolygon", RED, RED, 0.5, 1.0),
        GeoJsonLayerStyle::new("greenPolygon", GREEN, GREEN, 0.5, 1.0),
        GeoJsonLayerStyle::new("grayPolygon", GRAY, GRAY, 0.5, 1.0),
        GeoJsonLayerStyle::new("orangePolygon", ORANGE, ORANGE, 0.5, 1.0),
    ]
}

pub fn base_style_names() -> impl Iterator<Item = &'static str> {
    [
        "greenPoint",
        "grayPoint",
        "redPoint",
        "orangePoint",
        "greenPolygon",
        "grayPolygon",
        "redPolygon",
        "orangePolygon",
    ]
    .into_iter()
}

/// The style generated for one range breakpoint, keyed `<rangeId>-<label>`.
/// Falls back to mid-gray when the breakpoint declares no color.
pub fn breakpoint_style(range_id: &str, label: &str, color: Option<&str>) -> GeoJsonLayerStyle {
    let color = color.unwrap_or(DEFAULT_COLOR);
    GeoJsonLayerStyle::new(format!("{range_id}-{label}"), color, color, 1.0, 1.0)
}

/// The Point and `_POLYGON` classification styles for a measurement with a
/// custom range: one rule per non-DEFAULT breakpoint, the DEFAULT
/// breakpoint's style (if any) as the fallback.
pub fn range_interval_styles(measure: &str, range: &Range) -> [StaticIntervalsStyle; 2] {
    let intervals: Vec<StyleRule> = range
        .properties
        .iter()
        .filter(|breakpoint| !breakpoint.is_default())
        .map(breakpoint_rule)
        .collect();
    let default_style = range
        .properties
        .iter()
        .find(|breakpoint| breakpoint.is_default())
        .map(|breakpoint| breakpoint.style.name.clone());

    let property = format!("data.{measure}");
    [
        StaticIntervalsStyle {
            name: measure.to_string(),
            property: property.clone(),
            intervals: intervals.clone(),
            default_style: default_style.clone(),
        },
        StaticIntervalsStyle {
            name: format!("{measure}_POLYGON"),
            property,
            intervals,
            default_style,
        },
    ]
}

fn breakpoint_rule(breakpoint: &RangeBreakpoint) -> StyleRule {
    if let Some(value) = &breakpoint.value {
        StyleRule {
            value: Some(value.clone()),
            min_value: None,
            max_value: None,
            label: Some(breakpoint.label.clone()),
            style: breakpoint.style.name.clone(),
        }
    } else {
        StyleRule {
            value: None,
            min_value: breakpoint.min_value.as_deref().and_then(Bound::parse),
            max_value: breakpoint.max_value.as_deref().and_then(Bound::parse),
            label: Some(breakpoint.label.clone()),
            style: breakpoint.style.name.clone(),
        }
    }
}

/// The fixed-threshold classification used when a measurement names no
/// range: below 20 green, 20 to 40 orange, 40 and above red, gray fallback.
pub fn default_interval_styles(measure: &str) -> [StaticIntervalsStyle; 2] {
    let property = format!("data.{measure}");
    [
        fixed_buckets(measure.to_string(), property.clone(), "Point"),
        fixed_buckets(format!("{measure}_POLYGON"), property, "Polygon"),
    ]
}

fn fixed_buckets(name: String, property: String, shape: &str) -> StaticIntervalsStyle {
    let styled = |color: &str| format!("{color}{shape}");
    let rule = |min: Bound, max: Bound, color: &str| StyleRule {
        value: None,
        min_value: Some(min),
        max_value: Some(max),
        label: None,
        style: styled(color),
    };
    StaticIntervalsStyle {
        name,
        property,
        intervals: vec![
            rule(
                Bound::Sentinel("-Infinity".to_string()),
                Bound::Number(20.0),
                "green",
            ),
            rule(Bound::Number(20.0), Bound::Number(40.0), "orange"),
            rule(
                Bound::Number(40.0),
                Bound::Sentinel("Infinity".to_string()),
                "red",
            ),
        ],
        default_style: Some(styled("gray")),
    }
}

/// Expand a range's breakpoints into categorical category descriptors.
/// Bounds keep the infinity sentinels symbolic; bounds that do not parse as
/// numbers are omitted from the category.
pub fn categories_from_range(range: &Range) -> Vec<Category> {
    range
        .properties
        .iter()
        .map(|breakpoint| Category {
            value: breakpoint.value.clone(),
            from: breakpoint.min_value.as_deref().and_then(Bound::parse),
            to: breakpoint.max_value.as_deref().and_then(Bound::parse),
            label: breakpoint.label.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval_breakpoint(range_id: &str, min: &str, max: &str, label: &str) -> RangeBreakpoint {
        RangeBreakpoint {
            value: None,
            min_value: Some(min.to_string()),
            max_value: Some(max.to_string()),
            label: label.to_string(),
            color: None,
            style: breakpoint_style(range_id, label, None),
        }
    }

    fn discrete_breakpoint(range_id: &str, value: &str, label: &str) -> RangeBreakpoint {
        RangeBreakpoint {
            value: Some(value.to_string()),
            min_value: None,
            max_value: None,
            label: label.to_string(),
            color: None,
            style: breakpoint_style(range_id, label, None),
        }
    }

    #[test]
    fn base_palette_has_eight_styles() {
        let styles = base_styles();
        assert_eq!(styles.len(), 8);
        assert_eq!(styles[0].name, "redPoint");
        assert_eq!(styles[0].opacity, 1.0);
        assert_eq!(styles[4].name, "redPolygon");
        assert_eq!(styles[4].opacity, 0.5);
    }

    #[test]
    fn breakpoint_style_defaults_to_gray() {
        let style = breakpoint_style("aq", "Low", None);
        assert_eq!(style.name, "aq-Low");
        assert_eq!(style.stroke_color, DEFAULT_COLOR);

        let colored = breakpoint_style("aq", "High", Some("#FF0000"));
        assert_eq!(colored.fill_color, "#FF0000");
    }

    #[test]
    fn range_styles_split_default_breakpoint_into_fallback() {
        let mut range = Range::new("aq");
        range
            .properties
            .push(interval_breakpoint("aq", "-Infinity", "20", "Low"));
        range
            .properties
            .push(discrete_breakpoint("aq", "DEFAULT", "Other"));

        let [point, polygon] = range_interval_styles("temperature", &range);
        assert_eq!(point.name, "temperature");
        assert_eq!(point.property, "data.temperature");
        assert_eq!(point.intervals.len(), 1);
        assert_eq!(
            point.intervals[0].min_value,
            Some(Bound::Sentinel("-Infinity".to_string()))
        );
        assert_eq!(point.intervals[0].max_value, Some(Bound::Number(20.0)));
        assert_eq!(point.intervals[0].style, "aq-Low");
        assert_eq!(point.default_style.as_deref(), Some("aq-Other"));
        assert_eq!(polygon.name, "temperature_POLYGON");
    }

    #[test]
    fn default_styles_use_fixed_buckets() {
        let [point, polygon] = default_interval_styles("humidity");
        assert_eq!(point.intervals.len(), 3);
        assert_eq!(point.intervals[0].style, "greenPoint");
        assert_eq!(point.intervals[1].style, "orangePoint");
        assert_eq!(point.intervals[2].style, "redPoint");
        assert_eq!(point.default_style.as_deref(), Some("grayPoint"));
        assert_eq!(polygon.intervals[2].style, "redPolygon");
        assert_eq!(polygon.default_style.as_deref(), Some("grayPolygon"));
    }

    #[test]
    fn categories_drop_unparseable_bounds() {
        let mut range = Range::new("aq");
        range
            .properties
            .push(interval_breakpoint("aq", "-Infinity", "20", "Low"));
        range
            .properties
            .push(interval_breakpoint("aq", "abc", "40", "Mid"));

        let categories = categories_from_range(&range);
        assert_eq!(
            categories[0].from,
            Some(Bound::Sentinel("-Infinity".to_string()))
        );
        assert_eq!(categories[0].to, Some(Bound::Number(20.0)));
        assert_eq!(categories[0].label, "Low");
        assert_eq!(categories[1].from, None);
        assert_eq!(categories[1].to, Some(Bound::Number(40.0)));
    }
}
