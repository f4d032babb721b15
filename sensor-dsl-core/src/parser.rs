//! Frontend for the Sensor Product Language.
//!
//! Produces the generic parse tree consumed by the semantic analyzer. The
//! parser establishes syntactic validity only; all cross-construct checks
//! (references, uniqueness) belong to the visitor. Pure punctuation (commas,
//! parens, colons) is elided from the tree, while every significant token
//! (identifiers, literals, and the keywords handlers dispatch on) is kept in
//! its construct's fixed position. Quoted strings keep their quote characters
//! so that stripping them stays a visitor concern and `'x'` and `"x"`
//! compile identically.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, digit1, hex_digit1, multispace0, satisfy},
    combinator::{all_consuming, map, not, opt, peek, recognize},
    error::VerboseError,
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::{Node, NodeKind};

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Parse a complete SPL source text into its parse tree.
pub fn parse_source(input: &str) -> Result<Node, String> {
    match all_consuming(terminated(root, multispace0))(input) {
        Ok((_, tree)) => Ok(tree),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(nom::error::convert_error(input, e))
        }
        Err(nom::Err::Incomplete(_)) => Err("incomplete input".to_string()),
    }
}

fn root(input: &str) -> PResult<Node> {
    let (input, constructs) = many0(top_level)(input)?;
    Ok((input, Node::new(NodeKind::Parse, constructs)))
}

fn top_level(input: &str) -> PResult<Node> {
    alt((
        create_product,
        create_sensor_group,
        create_spatial_dimension,
        create_categorical_dimension,
        create_range,
        create_sensor,
        deployment,
    ))(input)
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn kw<'a>(keyword: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(
        multispace0,
        terminated(
            tag(keyword),
            peek(not(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_'))),
        ),
    )
}

fn sym<'a>(symbol: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    preceded(multispace0, char(symbol))
}

fn ident(input: &str) -> PResult<&str> {
    preceded(
        multispace0,
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
    )(input)
}

fn number(input: &str) -> PResult<&str> {
    preceded(
        multispace0,
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
    )(input)
}

fn color(input: &str) -> PResult<&str> {
    preceded(multispace0, recognize(pair(char('#'), hex_digit1)))(input)
}

/// A quoted string, quotes included in the token text.
fn quoted(input: &str) -> PResult<&str> {
    preceded(
        multispace0,
        alt((
            recognize(delimited(
                char('\''),
                take_while(|c| c != '\''),
                char('\''),
            )),
            recognize(delimited(char('"'), take_while(|c| c != '"'), char('"'))),
        )),
    )(input)
}

/// A range bound or discrete value: a number, an infinity sentinel, or the
/// DEFAULT marker.
fn range_value(input: &str) -> PResult<&str> {
    alt((
        number,
        kw("-Infinity"),
        kw("Infinity"),
        kw("DEFAULT"),
        ident,
    ))(input)
}

fn modifier(input: &str) -> PResult<&str> {
    alt((
        kw("IDENTIFIER"),
        kw("REQUIRED"),
        kw("UNIQUE"),
        kw("DISPLAY_STRING"),
    ))(input)
}

/// An UPPERCASE keyword of a measurement keyword/value pair (UNITS, ICON,
/// RANGE, or any future keyword; unknown pairs are skipped semantically).
fn upper_keyword(input: &str) -> PResult<&str> {
    preceded(
        multispace0,
        terminated(
            recognize(many1(satisfy(|c: char| c.is_ascii_uppercase() || c == '_'))),
            peek(not(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_'))),
        ),
    )(input)
}

fn semicolon(input: &str) -> PResult<char> {
    sym(';')(input)
}

// ============================================================================
// Top-level constructs
// ============================================================================

fn create_product(input: &str) -> PResult<Node> {
    let (input, _) = kw("CREATE")(input)?;
    let (input, _) = kw("PRODUCT")(input)?;
    let (input, name) = ident(input)?;
    let (input, _) = kw("USING")(input)?;
    let (input, srid) = number(input)?;
    let (input, _) = semicolon(input)?;
    Ok((
        input,
        Node::new(
            NodeKind::CreateProduct,
            vec![Node::token(name), Node::token(srid)],
        ),
    ))
}

fn create_sensor_group(input: &str) -> PResult<Node> {
    let (input, _) = kw("CREATE")(input)?;
    let (input, _) = kw("SENSOR")(input)?;
    let (input, _) = kw("GROUP")(input)?;
    let (input, name) = ident(input)?;
    let (input, sensors) = delimited(
        sym('('),
        separated_list1(sym(','), ident),
        sym(')'),
    )(input)?;
    let (input, _) = semicolon(input)?;

    let mut children = vec![Node::token(name)];
    children.extend(sensors.into_iter().map(Node::token));
    Ok((input, Node::new(NodeKind::CreateSensorGroup, children)))
}

fn create_spatial_dimension(input: &str) -> PResult<Node> {
    let (input, _) = kw("CREATE")(input)?;
    let (input, _) = kw("SPATIAL")(input)?;
    let (input, _) = kw("DIMENSION")(input)?;
    let (input, name) = ident(input)?;
    let (input, _) = sym('(')(input)?;
    let (input, _) = kw("GEOMETRY")(input)?;
    let (input, _) = sym(':')(input)?;
    let (input, geom_type) = ident(input)?;
    let (input, properties) = opt(preceded(
        tuple((sym(','), kw("PROPERTIES"), sym(':'), sym('('))),
        terminated(separated_list1(sym(','), dim_property), sym(')')),
    ))(input)?;
    let (input, parent) = opt(preceded(
        tuple((sym(','), kw("PARENT"), sym(':'))),
        ident,
    ))(input)?;
    let (input, _) = sym(')')(input)?;
    let (input, _) = semicolon(input)?;

    let mut children = vec![Node::token(name), Node::token(geom_type)];
    children.extend(properties.unwrap_or_default());
    if let Some(parent) = parent {
        children.push(Node::new(
            NodeKind::ParentDimension,
            vec![Node::token(parent)],
        ));
    }
    Ok((input, Node::new(NodeKind::CreateSpatialDimension, children)))
}

fn dim_property(input: &str) -> PResult<Node> {
    let (input, name) = ident(input)?;
    let (input, data_type) = ident(input)?;
    let (input, modifiers) = many0(modifier)(input)?;

    let mut children = vec![Node::token(name), Node::token(data_type)];
    children.extend(modifiers.into_iter().map(Node::token));
    Ok((input, Node::new(NodeKind::DimProperty, children)))
}

fn create_categorical_dimension(input: &str) -> PResult<Node> {
    let (input, _) = kw("CREATE")(input)?;
    let (input, _) = kw("CATEGORICAL")(input)?;
    let (input, _) = kw("DIMENSION")(input)?;
    let (input, name) = ident(input)?;
    let (input, _) = sym('(')(input)?;
    let (input, _) = kw("FIELD")(input)?;
    let (input, _) = sym(':')(input)?;
    let (input, field) = ident(input)?;
    let (input, _) = sym(')')(input)?;
    let (input, _) = semicolon(input)?;

    Ok((
        input,
        Node::new(
            NodeKind::CreateCategoricalDimension,
            vec![Node::token(name), Node::token(field)],
        ),
    ))
}

fn create_range(input: &str) -> PResult<Node> {
    let (input, _) = kw("CREATE")(input)?;
    let (input, _) = kw("RANGE")(input)?;
    let (input, name) = ident(input)?;
    let (input, breakpoints) = delimited(
        sym('('),
        separated_list1(sym(','), range_breakpoint),
        sym(')'),
    )(input)?;
    let (input, _) = semicolon(input)?;

    let mut children = vec![Node::token(name)];
    children.extend(breakpoints);
    Ok((input, Node::new(NodeKind::CreateRange, children)))
}

fn range_breakpoint(input: &str) -> PResult<Node> {
    alt((interval_breakpoint, discrete_breakpoint))(input)
}

fn interval_breakpoint(input: &str) -> PResult<Node> {
    let (input, min) = range_value(input)?;
    let (input, to) = kw("TO")(input)?;
    let (input, max) = range_value(input)?;
    let (input, label) = quoted(input)?;
    let (input, bp_color) = opt(color)(input)?;

    let mut children = vec![
        Node::token(min),
        Node::token(to),
        Node::token(max),
        Node::token(label),
    ];
    if let Some(bp_color) = bp_color {
        children.push(Node::token(bp_color));
    }
    Ok((input, Node::new(NodeKind::RangeBreakpoint, children)))
}

fn discrete_breakpoint(input: &str) -> PResult<Node> {
    let (input, value) = range_value(input)?;
    let (input, label) = quoted(input)?;
    let (input, bp_color) = opt(color)(input)?;

    let mut children = vec![Node::token(value), Node::token(label)];
    if let Some(bp_color) = bp_color {
        children.push(Node::token(bp_color));
    }
    Ok((input, Node::new(NodeKind::RangeBreakpoint, children)))
}

// ============================================================================
// Sensors
// ============================================================================

fn create_sensor(input: &str) -> PResult<Node> {
    let (input, _) = kw("CREATE")(input)?;
    let (input, moving) = opt(kw("MOVING"))(input)?;
    let (input, _) = kw("SENSOR")(input)?;
    let (input, name) = ident(input)?;
    let (input, _) = sym('(')(input)?;
    let (input, _) = kw("INTERVAL")(input)?;
    let (input, _) = sym(':')(input)?;
    let (input, interval) = number(input)?;
    let (input, _) = sym(',')(input)?;
    let (input, _) = kw("GEOMETRY")(input)?;
    let (input, _) = sym(':')(input)?;
    let (input, geom_type) = ident(input)?;
    let (input, _) = sym(',')(input)?;
    let (input, properties) = sensor_properties(input)?;
    let (input, blocks) = many0(preceded(sym(','), sensor_block))(input)?;
    let (input, _) = sym(')')(input)?;
    let (input, _) = semicolon(input)?;

    let mut children = Vec::new();
    if let Some(moving) = moving {
        children.push(Node::token(moving));
    }
    children.push(Node::token(name));
    children.push(Node::token(interval));
    children.push(Node::token(geom_type));
    children.push(properties);
    children.extend(blocks);
    Ok((input, Node::new(NodeKind::CreateSensor, children)))
}

fn sensor_block(input: &str) -> PResult<Node> {
    alt((
        measurement_data,
        add_spatial_dimensions,
        add_categorical_dimensions,
        bbox,
    ))(input)
}

fn sensor_properties(input: &str) -> PResult<Node> {
    let (input, _) = kw("PROPERTIES")(input)?;
    let (input, _) = sym(':')(input)?;
    let (input, properties) = delimited(
        sym('('),
        separated_list1(sym(','), sensor_property),
        sym(')'),
    )(input)?;
    Ok((input, Node::new(NodeKind::SensorProperties, properties)))
}

fn sensor_property(input: &str) -> PResult<Node> {
    let (input, name) = ident(input)?;
    let (input, data_type) = ident(input)?;
    let (input, modifiers) = many0(modifier)(input)?;

    let mut children = vec![Node::token(name), Node::token(data_type)];
    children.extend(modifiers.into_iter().map(Node::token));
    Ok((input, Node::new(NodeKind::SensorProperty, children)))
}

fn measurement_data(input: &str) -> PResult<Node> {
    let (input, _) = kw("MEASUREMENT")(input)?;
    let (input, _) = kw("DATA")(input)?;
    let (input, _) = sym(':')(input)?;
    let (input, properties) = delimited(
        sym('('),
        separated_list1(sym(','), measurement_property),
        sym(')'),
    )(input)?;
    Ok((input, Node::new(NodeKind::MeasurementData, properties)))
}

fn measurement_property(input: &str) -> PResult<Node> {
    let (input, name) = ident(input)?;
    let (input, data_type) = ident(input)?;
    let (input, pairs) = many0(pair(
        upper_keyword,
        alt((quoted, color, number, ident)),
    ))(input)?;

    let mut children = vec![Node::token(name), Node::token(data_type)];
    for (keyword, value) in pairs {
        children.push(Node::token(keyword));
        children.push(Node::token(value));
    }
    Ok((input, Node::new(NodeKind::MeasurementProperty, children)))
}

fn add_spatial_dimensions(input: &str) -> PResult<Node> {
    let (input, _) = kw("SPATIAL")(input)?;
    let (input, _) = kw("DIMENSIONS")(input)?;
    let (input, rel_name) = ident(input)?;
    let (input, dimensions) = delimited(
        sym('('),
        separated_list1(sym(','), ident),
        sym(')'),
    )(input)?;

    let mut children = vec![Node::token(rel_name)];
    children.extend(dimensions.into_iter().map(Node::token));
    Ok((input, Node::new(NodeKind::AddSpatialDimensions, children)))
}

fn add_categorical_dimensions(input: &str) -> PResult<Node> {
    let (input, _) = kw("CATEGORICAL")(input)?;
    let (input, _) = kw("DIMENSIONS")(input)?;
    let (input, group) = opt(preceded(kw("GROUP"), ident))(input)?;
    let (input, refs) = delimited(
        sym('('),
        separated_list1(sym(','), categorical_ref),
        sym(')'),
    )(input)?;

    let mut children = Vec::new();
    if let Some(group) = group {
        children.push(Node::token("GROUP"));
        children.push(Node::token(group));
    }
    for (dim, range) in refs {
        children.push(Node::token(dim));
        if let Some(range) = range {
            children.push(Node::token("RANGE"));
            children.push(Node::token(range));
        }
    }
    Ok((
        input,
        Node::new(NodeKind::AddCategoricalDimensions, children),
    ))
}

fn categorical_ref(input: &str) -> PResult<(&str, Option<&str>)> {
    pair(ident, opt(preceded(kw("RANGE"), ident)))(input)
}

fn bbox(input: &str) -> PResult<Node> {
    let (input, _) = kw("BBOX")(input)?;
    let (input, _) = sym(':')(input)?;
    let (input, bracket) = opt(sym('['))(input)?;
    let (input, lat) = number(input)?;
    let (input, _) = sym(',')(input)?;
    let (input, lon) = number(input)?;
    let (input, _) = if bracket.is_some() {
        map(sym(']'), Some)(input)?
    } else {
        (input, None)
    };
    let (input, _) = kw("ZOOM")(input)?;
    let (input, zoom) = number(input)?;

    Ok((
        input,
        Node::new(
            NodeKind::Bbox,
            vec![Node::token(lat), Node::token(lon), Node::token(zoom)],
        ),
    ))
}

// ============================================================================
// Deployment
// ============================================================================

fn deployment(input: &str) -> PResult<Node> {
    let (input, _) = kw("DEPLOYMENT")(input)?;
    let (input, properties) = delimited(
        sym('('),
        many0(preceded(opt(sym(',')), deployment_property)),
        sym(')'),
    )(input)?;
    let (input, _) = semicolon(input)?;
    Ok((input, Node::new(NodeKind::Deployment, properties)))
}

fn deployment_property(input: &str) -> PResult<Node> {
    let (input, key) = quoted(input)?;
    let (input, value) = quoted(input)?;
    Ok((
        input,
        Node::new(
            NodeKind::DeploymentProperty,
            vec![Node::token(key), Node::token(value)],
        ),
    ))
}

// ============================================================================
// Tests
// ============================================================================
