//! Resource tree provider contract.
//!
//! The engine never builds or resolves infrastructure definitions itself. A host
//! hands over something implementing [`ResourceTree`]; every node exposes a stable
//! path, a subtype tag and an already-resolved property bag. [`Tree`] is the
//! in-memory provider used by hosts that load trees from JSON or YAML.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Marker key for a deferred value the provider could not resolve:
/// `{"$unresolved": "<token>"}`.
pub const UNRESOLVED_KEY: &str = "$unresolved";

/// Logical identifier path of a node, compared segment by segment.
///
/// Ordering is lexicographic over segments, which is the order the walker
/// visits nodes in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// Parse a `/`-separated path. Empty segments are dropped.
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw
                .split(PATH_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(id.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment (the node's own id).
    pub fn id(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True when `self` is a proper ancestor of `other`.
    ///
    /// Segments are compared whole, so `rVpc` is not an ancestor of
    /// `rVpcExtra/rSubnet`.
    pub fn is_strict_ancestor_of(&self, other: &ResourcePath) -> bool {
        self.segments.len() < other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PATH_SEPARATOR)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<&str> for ResourcePath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl Serialize for ResourcePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourcePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Result of looking up a property on a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Property<'a> {
    /// Concrete value delivered by the provider.
    Resolved(&'a Value),
    /// Present, but the provider could not resolve it.
    Unresolved,
    /// Absent or `null`.
    Missing,
}

impl<'a> Property<'a> {
    pub fn resolved(self) -> Option<&'a Value> {
        match self {
            Property::Resolved(v) => Some(v),
            _ => None,
        }
    }
}

fn is_unresolved_marker(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.len() == 1 && map.contains_key(UNRESOLVED_KEY))
}

/// One element of the resource tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode {
    path: ResourcePath,
    kind: String,
    properties: Map<String, Value>,
}

impl ResourceNode {
    pub fn new(path: ResourcePath, kind: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            path,
            kind: kind.into(),
            properties,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Subtype tag used for applicability dispatch (e.g. `AWS::S3::Bucket`).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Look up a property. Dotted keys (`BucketEncryption.Enabled`) descend
    /// into nested objects.
    pub fn property(&self, key: &str) -> Property<'_> {
        let mut parts = key.split('.');
        let first = match parts.next() {
            Some(first) => first,
            None => return Property::Missing,
        };
        let mut current = match self.properties.get(first) {
            Some(value) => value,
            None => return Property::Missing,
        };
        for part in parts {
            if is_unresolved_marker(current) {
                return Property::Unresolved;
            }
            current = match current.get(part) {
                Some(value) => value,
                None => return Property::Missing,
            };
        }
        if is_unresolved_marker(current) {
            Property::Unresolved
        } else if current.is_null() {
            Property::Missing
        } else {
            Property::Resolved(current)
        }
    }
}

/// Read-only access to a tree of resource nodes.
pub trait ResourceTree {
    /// Every node in the tree. Order is not significant; the walker sorts.
    fn nodes(&self) -> Box<dyn Iterator<Item = &ResourceNode> + '_>;

    fn node(&self, path: &ResourcePath) -> Option<&ResourceNode> {
        self.nodes().find(|n| n.path() == path)
    }

    fn children(&self, path: &ResourcePath) -> Vec<&ResourceNode> {
        self.nodes()
            .filter(|n| n.path().parent().as_ref() == Some(path))
            .collect()
    }

    fn nodes_of_kind<'a>(&'a self, kind: &'a str) -> Box<dyn Iterator<Item = &'a ResourceNode> + 'a> {
        Box::new(self.nodes().filter(move |n| n.kind() == kind))
    }
}

/// Nested tree description, the shape hosts serialize trees in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub children: Vec<TreeSpec>,
}

impl TreeSpec {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            properties: Map::new(),
            children: Vec::new(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn child(mut self, child: TreeSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Tree construction error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("node under '{parent}' has an empty id")]
    EmptyId { parent: String },

    #[error("node id '{id}' contains the path separator '{}'", PATH_SEPARATOR)]
    SeparatorInId { id: String },

    #[error("duplicate node path '{path}'")]
    DuplicatePath { path: String },
}

/// In-memory tree provider.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<ResourceNode>,
    index: BTreeMap<ResourcePath, usize>,
}

impl Tree {
    /// Flatten a nested spec. The root itself is a node.
    pub fn from_spec(root: TreeSpec) -> Result<Self, TreeError> {
        let mut tree = Tree::default();
        tree.insert_spec(&ResourcePath::default(), root)?;
        Ok(tree)
    }

    /// Build from already-flattened nodes.
    pub fn from_nodes(nodes: impl IntoIterator<Item = ResourceNode>) -> Result<Self, TreeError> {
        let mut tree = Tree::default();
        for node in nodes {
            tree.push(node)?;
        }
        Ok(tree)
    }

    /// Parse a JSON tree document (a serialized [`TreeSpec`]).
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let spec: TreeSpec = serde_json::from_str(content)?;
        Ok(Self::from_spec(spec)?)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert_spec(&mut self, parent: &ResourcePath, spec: TreeSpec) -> Result<(), TreeError> {
        if spec.id.is_empty() {
            return Err(TreeError::EmptyId {
                parent: parent.to_string(),
            });
        }
        if spec.id.contains(PATH_SEPARATOR) {
            return Err(TreeError::SeparatorInId { id: spec.id });
        }
        let path = parent.child(spec.id);
        self.push(ResourceNode::new(path.clone(), spec.kind, spec.properties))?;
        for child in spec.children {
            self.insert_spec(&path, child)?;
        }
        Ok(())
    }

    fn push(&mut self, node: ResourceNode) -> Result<(), TreeError> {
        if self.index.contains_key(node.path()) {
            return Err(TreeError::DuplicatePath {
                path: node.path().to_string(),
            });
        }
        self.index.insert(node.path().clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }
}

impl ResourceTree for Tree {
    fn nodes(&self) -> Box<dyn Iterator<Item = &ResourceNode> + '_> {
        Box::new(self.nodes.iter())
    }

    fn node(&self, path: &ResourcePath) -> Option<&ResourceNode> {
        self.index.get(path).map(|&i| &self.nodes[i])
    }
}
