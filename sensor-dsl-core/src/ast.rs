//! Generic parse-tree types produced by the frontend.
//!
//! The semantic analyzer never re-parses text: it consumes this tree through
//! three operations only: a node's construct kind, its ordered children, and
//! the source text it covers. Each construct kind fixes the positions of its
//! significant tokens, so handlers extract literals by index.

/// Construct kinds. One variant per grammar construct, plus `Token` for
/// terminal leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Root: product declaration followed by top-level constructs.
    Parse,
    /// `CREATE PRODUCT <name> USING <srid>;` with children name, srid.
    CreateProduct,
    /// `CREATE SENSOR GROUP <name> (...);` with children name, sensor ids.
    CreateSensorGroup,
    /// Children: name, geometry type, then `DimProperty`* and an optional
    /// `ParentDimension`.
    CreateSpatialDimension,
    /// Children: name, backing field.
    CreateCategoricalDimension,
    /// Children: name, type, modifier tokens.
    DimProperty,
    /// Children: parent dimension name.
    ParentDimension,
    /// Children: name, then `RangeBreakpoint`*.
    CreateRange,
    /// Interval form `min TO max label [color]` or discrete form
    /// `value label [color]`; the `TO` keyword token is kept so the visitor
    /// can distinguish the two.
    RangeBreakpoint,
    /// Children: optional `MOVING` token, name, interval, geometry type,
    /// then the nested blocks in source order.
    CreateSensor,
    /// Children: `SensorProperty`*.
    SensorProperties,
    /// Children: name, type, modifier tokens.
    SensorProperty,
    /// Children: relationship label, dimension ids.
    AddSpatialDimensions,
    /// Children: optional (`GROUP`, group id), then per dimension its id
    /// optionally followed by (`RANGE`, range id).
    AddCategoricalDimensions,
    /// Children: `MeasurementProperty`*.
    MeasurementData,
    /// Children: name, type, then keyword/value token pairs.
    MeasurementProperty,
    /// Children: latitude, longitude, zoom.
    Bbox,
    /// Children: `DeploymentProperty`*.
    Deployment,
    /// Children: quoted key, quoted value.
    DeploymentProperty,
    /// Terminal token.
    Token,
}

/// A parse-tree node. Tokens carry their source text directly; inner nodes
/// derive theirs from their children.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    text: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, children: Vec<Node>) -> Self {
        Self {
            kind,
            text: String::new(),
            children,
        }
    }

    pub fn token(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Token,
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Source text covered by this node (token text, or the concatenation of
    /// the children's text for inner nodes).
    pub fn text(&self) -> String {
        if self.kind == NodeKind::Token {
            self.text.clone()
        } else {
            self.children.iter().map(Node::text).collect()
        }
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Text of the token child at `index`, if it exists and is a token.
    pub fn token_text(&self, index: usize) -> Option<&str> {
        match self.children.get(index) {
            Some(node) if node.kind == NodeKind::Token => Some(node.text.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_text_only_matches_tokens() {
        let node = Node::new(
            NodeKind::CreateProduct,
            vec![Node::token("demo"), Node::token("4326")],
        );
        assert_eq!(node.token_text(0), Some("demo"));
        assert_eq!(node.token_text(2), None);

        let wrapped = Node::new(NodeKind::Parse, vec![node]);
        assert_eq!(wrapped.token_text(0), None);
    }

    #[test]
    fn inner_text_concatenates_children() {
        let node = Node::new(
            NodeKind::DeploymentProperty,
            vec![Node::token("'host'"), Node::token("'localhost'")],
        );
        assert_eq!(node.text(), "'host''localhost'");
    }
}
