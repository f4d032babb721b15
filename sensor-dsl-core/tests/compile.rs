//! End-to-end compilation tests: source text in, product model out.

use pretty_assertions::assert_eq;

use sensor_dsl_core::map::{Bound, Layer, Style};
use sensor_dsl_core::model::{Product, SensorDimension};
use sensor_dsl_core::{compile, to_canonical, CompileError, RefKind, SemanticError};

fn compile_ok(source: &str) -> Product {
    match compile(source) {
        Ok(product) => product,
        Err(err) => panic!("compilation failed: {err}"),
    }
}

fn style<'p>(product: &'p Product, name: &str) -> &'p Style {
    product
        .styles
        .iter()
        .find(|s| s.name() == name)
        .unwrap_or_else(|| panic!("style '{name}' not found"))
}

fn geojson_layer<'p>(product: &'p Product, name: &str) -> &'p sensor_dsl_core::map::GeoJsonLayer {
    match product.layers.iter().find(|l| l.name() == name) {
        Some(Layer::GeoJson(layer)) => layer,
        Some(Layer::Tile(_)) => panic!("layer '{name}' is a tile layer"),
        None => panic!("layer '{name}' not found"),
    }
}

const WEATHER: &str = "
CREATE PRODUCT demo USING 4326;
CREATE RANGE myrange (
    -Infinity TO 20 'Low' #00FF00,
    20 TO Infinity 'High' #FF0000,
    DEFAULT 'Other'
);
CREATE SENSOR Weather (
    INTERVAL: 60000,
    GEOMETRY: Point,
    PROPERTIES: (name String DISPLAY_STRING),
    MEASUREMENT DATA: (Temperature Double UNITS 'C' RANGE myrange)
);
";

#[test]
fn compiles_a_minimal_weather_product() {
    let product = compile_ok(WEATHER);

    assert_eq!(product.name, "demo");
    assert_eq!(product.srid, "4326");

    let entity_names: Vec<&str> = product.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(entity_names, ["WeatherEntity", "WeatherMeasurement"]);

    let owner = &product.entities[0];
    let owner_props: Vec<&str> = owner.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(owner_props, ["id", "geometry", "name"]);
    assert!(owner.properties[0].identifier);
    assert!(owner.properties[2].display_string);

    let fact = &product.entities[1];
    let fact_props: Vec<&str> = fact.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(fact_props, ["id", "date", "temperature"]);

    assert_eq!(product.relationships.len(), 1);
    let rel = &product.relationships[0];
    assert_eq!(rel.source, "WeatherEntity");
    assert_eq!(rel.target, "WeatherMeasurement");
    assert_eq!(rel.source_opts.label, "sensors");
    assert_eq!(rel.source_opts.multiplicity, "0..*");
    assert_eq!(rel.target_opts.label, "sensor_id");
    assert_eq!(rel.target_opts.multiplicity, "0..1");

    let sensor = &product.sensors[0];
    assert_eq!(sensor.entity, "WeatherEntity");
    assert_eq!(sensor.fact_table_entity, "WeatherMeasurement");
    assert_eq!(sensor.default_map, "weather-map");
    assert_eq!(sensor.default_layer, "weather-layer");
    assert_eq!(sensor.interval, 60000);
    assert!(!sensor.is_moving);
    assert_eq!(sensor.measure_data[0].name, "temperature");
    assert_eq!(sensor.measure_data[0].units.as_deref(), Some("C"));
    assert_eq!(sensor.measure_data[0].range.as_deref(), Some("myrange"));
}

#[test]
fn weather_product_maps_and_layers() {
    let product = compile_ok(WEATHER);

    match product.layers.iter().find(|l| l.name() == "base") {
        Some(Layer::Tile(tile)) => {
            assert_eq!(tile.url, "http://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png");
        }
        _ => panic!("expected a base tile layer"),
    }

    let layer = geojson_layer(&product, "weather-layer");
    assert_eq!(layer.table, "WeatherEntity");
    assert_eq!(layer.geometry_field, "WeatherEntity-geometry");
    assert!(layer.available_styles.contains("grayPoint"));
    assert!(layer.available_styles.contains("orangePolygon"));
    assert!(layer.available_styles.contains("temperature"));
    assert_eq!(layer.available_styles.len(), 9);

    let map = &product.maps["weather-map"];
    assert_eq!(map.name, "Weather Map");
    assert_eq!(map.layers.len(), 2);
    assert_eq!(map.layers[0].name, "base");
    assert!(map.layers[0].base_layer);
    assert_eq!(map.layers[0].order, 0);
    assert_eq!(map.layers[1].name, "weather-layer");
    assert_eq!(map.layers[1].style.as_deref(), Some("grayPoint"));
    assert_eq!(map.layers[1].order, 1);
}

#[test]
fn range_measurement_generates_breakpoint_and_interval_styles() {
    let product = compile_ok(WEATHER);

    // 8 base styles, 3 breakpoint styles, 2 classification styles.
    assert_eq!(product.styles.len(), 13);

    match style(&product, "myrange-Low") {
        Style::GeoJson(s) => {
            assert_eq!(s.stroke_color, "#00FF00");
            assert_eq!(s.opacity, 1.0);
        }
        _ => panic!("expected a plain style"),
    }

    match style(&product, "temperature") {
        Style::StaticIntervals(s) => {
            assert_eq!(s.property, "data.temperature");
            assert_eq!(s.intervals.len(), 2);
            assert_eq!(
                s.intervals[0].min_value,
                Some(Bound::Sentinel("-Infinity".to_string()))
            );
            assert_eq!(s.intervals[0].max_value, Some(Bound::Number(20.0)));
            assert_eq!(s.intervals[0].style, "myrange-Low");
            assert_eq!(s.intervals[1].style, "myrange-High");
            assert_eq!(s.default_style.as_deref(), Some("myrange-Other"));
        }
        _ => panic!("expected a classification style"),
    }
    assert!(matches!(
        style(&product, "temperature_POLYGON"),
        Style::StaticIntervals(_)
    ));
}

#[test]
fn measurement_without_range_uses_fixed_buckets() {
    let product = compile_ok(
        "CREATE PRODUCT p USING 4326;
         CREATE SENSOR Air (
             INTERVAL: 1000,
             GEOMETRY: Point,
             PROPERTIES: (serial String UNIQUE),
             MEASUREMENT DATA: (Humidity Double)
         );",
    );

    match style(&product, "humidity") {
        Style::StaticIntervals(s) => {
            assert_eq!(s.intervals.len(), 3);
            assert_eq!(s.intervals[0].style, "greenPoint");
            assert_eq!(s.intervals[1].style, "orangePoint");
            assert_eq!(s.intervals[2].style, "redPoint");
            assert_eq!(s.default_style.as_deref(), Some("grayPoint"));
        }
        _ => panic!("expected a classification style"),
    }
}

#[test]
fn moving_sensor_keeps_geometry_on_the_fact_entity() {
    let product = compile_ok(
        "CREATE PRODUCT p USING 4326;
         CREATE SPATIAL DIMENSION Province (GEOMETRY: Polygon);
         CREATE MOVING SENSOR Bus (
             INTERVAL: 5000,
             GEOMETRY: Point,
             PROPERTIES: (plate String REQUIRED UNIQUE),
             MEASUREMENT DATA: (Speed Double),
             SPATIAL DIMENSIONS location (Province)
         );",
    );

    let owner = product.entities.iter().find(|e| e.name == "BusEntity").unwrap();
    assert!(!owner.properties.iter().any(|p| p.name == "geometry"));
    let fact = product
        .entities
        .iter()
        .find(|e| e.name == "BusMeasurement")
        .unwrap();
    assert!(fact.properties.iter().any(|p| p.name == "geometry"));

    let layer = geojson_layer(&product, "bus-layer");
    assert_eq!(layer.table, "BusMeasurement");
    assert_eq!(layer.geometry_field, "BusMeasurement");

    // Moving sensors get no foreign key into the dimension entity.
    assert!(!product
        .relationships
        .iter()
        .any(|r| r.target == "Province"));
    assert_eq!(
        product.sensors[0].dimensions,
        vec![SensorDimension::Spatial {
            id: "location".to_string(),
            entities: vec!["Province".to_string()],
        }]
    );
}

#[test]
fn stationary_sensor_links_to_spatial_dimensions() {
    let product = compile_ok(
        "CREATE PRODUCT p USING 4326;
         CREATE SPATIAL DIMENSION Province (GEOMETRY: Polygon);
         CREATE SPATIAL DIMENSION Station (GEOMETRY: Point);
         CREATE SENSOR Temp (
             INTERVAL: 1000,
             GEOMETRY: Point,
             PROPERTIES: (serial String),
             MEASUREMENT DATA: (Temperature Double),
             SPATIAL DIMENSIONS location (Province, Station)
         );",
    );

    let rel = product
        .relationships
        .iter()
        .find(|r| r.target == "Province")
        .unwrap();
    assert_eq!(rel.source, "TempEntity");
    assert_eq!(rel.source_opts.label, "province_id");
    assert_eq!(rel.source_opts.multiplicity, "0..1");
    assert_eq!(rel.target_opts.label, "TempEntity");
    assert_eq!(rel.target_opts.multiplicity, "0..*");

    // Both dimensions merge into one attachment under the shared label.
    assert_eq!(
        product.sensors[0].dimensions,
        vec![SensorDimension::Spatial {
            id: "location".to_string(),
            entities: vec!["Province".to_string(), "Station".to_string()],
        }]
    );

    // Polygon dimensions carry the polygon style variants, point ones do not.
    let province = geojson_layer(&product, "Province");
    assert_eq!(province.geometry_field, "Province-geometry");
    assert!(province.available_styles.contains("grayPolygon"));
    assert!(province.available_styles.contains("temperature"));
    assert!(province.available_styles.contains("temperature_POLYGON"));
    let station = geojson_layer(&product, "Station");
    assert!(station.available_styles.contains("temperature"));
    assert!(!station.available_styles.contains("temperature_POLYGON"));

    let map = &product.maps["temp-map"];
    assert_eq!(map.layers[2].name, "Province");
    assert_eq!(map.layers[2].style.as_deref(), Some("grayPolygon"));
    assert!(!map.layers[2].selected);
    assert_eq!(map.layers[3].name, "Station");
    assert_eq!(map.layers[3].style.as_deref(), Some("grayPoint"));
}

#[test]
fn shared_dimension_layer_unions_styles_across_sensors() {
    let product = compile_ok(
        "CREATE PRODUCT p USING 4326;
         CREATE SPATIAL DIMENSION Province (GEOMETRY: Polygon);
         CREATE SENSOR A (
             INTERVAL: 1000,
             GEOMETRY: Point,
             PROPERTIES: (serial String),
             MEASUREMENT DATA: (Temperature Double),
             SPATIAL DIMENSIONS location (Province)
         );
         CREATE SENSOR B (
             INTERVAL: 1000,
             GEOMETRY: Point,
             PROPERTIES: (serial String),
             MEASUREMENT DATA: (Humidity Double),
             SPATIAL DIMENSIONS location (Province)
         );",
    );

    let layer = geojson_layer(&product, "Province");
    assert!(layer.available_styles.contains("temperature"));
    assert!(layer.available_styles.contains("humidity"));
    assert!(layer.available_styles.contains("temperature_POLYGON"));
    assert!(layer.available_styles.contains("humidity_POLYGON"));
}

#[test]
fn categorical_dimensions_attach_with_group_and_categories() {
    let product = compile_ok(
        "CREATE PRODUCT p USING 4326;
         CREATE CATEGORICAL DIMENSION Line (FIELD: line);
         CREATE RANGE lines (
             -Infinity TO 0 'Inbound',
             0 TO Infinity 'Outbound'
         );
         CREATE SENSOR Bus (
             INTERVAL: 1000,
             GEOMETRY: Point,
             PROPERTIES: (plate String),
             MEASUREMENT DATA: (Speed Double),
             CATEGORICAL DIMENSIONS GROUP fleet (Line RANGE lines)
         );",
    );

    match &product.sensors[0].dimensions[0] {
        SensorDimension::Categorical {
            id,
            field,
            group_id,
            categories,
        } => {
            assert_eq!(id, "Line");
            assert_eq!(field, "line");
            assert_eq!(group_id.as_deref(), Some("fleet"));
            let categories = categories.as_ref().unwrap();
            assert_eq!(categories.len(), 2);
            assert_eq!(
                categories[0].from,
                Some(Bound::Sentinel("-Infinity".to_string()))
            );
            assert_eq!(categories[0].to, Some(Bound::Number(0.0)));
            assert_eq!(categories[0].label, "Inbound");
        }
        other => panic!("expected a categorical attachment, got {other:?}"),
    }

    // The field lands on the fact entity, typed for the ranged values.
    let fact = product
        .entities
        .iter()
        .find(|e| e.name == "BusMeasurement")
        .unwrap();
    let field = fact.properties.iter().find(|p| p.name == "line").unwrap();
    assert_eq!(field.data_type, "Double");
}

#[test]
fn spatial_dimension_hierarchy_and_groups_and_deployment() {
    let product = compile_ok(
        "CREATE PRODUCT p USING 4326;
         CREATE SPATIAL DIMENSION Province (GEOMETRY: Polygon);
         CREATE SPATIAL DIMENSION Municipality (
             GEOMETRY: polygon,
             PROPERTIES: (name String DISPLAY_STRING),
             PARENT: Province
         );
         CREATE SENSOR T (
             INTERVAL: 1000,
             GEOMETRY: Point,
             PROPERTIES: (serial String),
             BBOX: [43.36, -8.41] ZOOM 12
         );
         CREATE SENSOR GROUP meteo (T);
         DEPLOYMENT ('spring.port' '8080');",
    );

    // Geometry names normalize regardless of source casing.
    let value = to_canonical(&product).unwrap();
    assert_eq!(value["dimensions"][1]["geomType"], "Polygon");

    let rel = product
        .relationships
        .iter()
        .find(|r| r.source == "Municipality")
        .unwrap();
    assert_eq!(rel.target, "Province");
    assert_eq!(rel.source_opts.label, "belongs");
    assert_eq!(rel.source_opts.multiplicity, "0..1");
    assert_eq!(rel.target_opts.label, "contains");
    assert_eq!(rel.target_opts.multiplicity, "0..*");

    assert_eq!(product.sensor_groups["meteo"], vec!["T".to_string()]);
    assert_eq!(product.deployment_properties["spring.port"], "8080");

    let center = product.maps["t-map"].center.as_ref().unwrap();
    assert_eq!(center.latitude, 43.36);
    assert_eq!(center.longitude, -8.41);
    assert_eq!(center.zoom, 12);
}

#[test]
fn compilation_is_deterministic() {
    let first = compile_ok(WEATHER);
    let second = compile_ok(WEATHER);
    assert_eq!(first, second);
    assert_eq!(
        to_canonical(&first).unwrap(),
        to_canonical(&second).unwrap()
    );
}

#[test]
fn quote_style_and_whitespace_do_not_change_the_product() {
    let reformatted = WEATHER
        .replace('\'', "\"")
        .replace('\n', " ")
        .replace(", ", " ,  ");
    assert_eq!(
        to_canonical(&compile_ok(WEATHER)).unwrap(),
        to_canonical(&compile_ok(&reformatted)).unwrap()
    );
}

#[test]
fn undeclared_measurement_range_is_rejected() {
    let err = compile(
        "CREATE PRODUCT p USING 4326;
         CREATE SENSOR S (
             INTERVAL: 1000,
             GEOMETRY: Point,
             PROPERTIES: (serial String),
             MEASUREMENT DATA: (Temperature Double RANGE missing)
         );",
    )
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::Semantic(SemanticError::undefined(RefKind::Range, "missing"))
    );
}

#[test]
fn undeclared_spatial_dimension_is_rejected() {
    let err = compile(
        "CREATE PRODUCT p USING 4326;
         CREATE SENSOR S (
             INTERVAL: 1000,
             GEOMETRY: Point,
             PROPERTIES: (serial String),
             SPATIAL DIMENSIONS location (Nowhere)
         );",
    )
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::Semantic(SemanticError::undefined(RefKind::Dimension, "Nowhere"))
    );
}

#[test]
fn duplicate_dimension_declaration_is_rejected() {
    let err = compile(
        "CREATE PRODUCT p USING 4326;
         CREATE SPATIAL DIMENSION Province (GEOMETRY: Polygon);
         CREATE CATEGORICAL DIMENSION Province (FIELD: name);",
    )
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::Semantic(SemanticError::duplicate(RefKind::Dimension, "Province"))
    );
}

#[test]
fn syntax_errors_surface_as_syntax_variant() {
    match compile("CREATE PRODUCT USING 4326;") {
        Err(CompileError::Syntax(message)) => assert!(!message.is_empty()),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}
