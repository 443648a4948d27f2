//! Scene graph lookups and object transforms.

use std::collections::HashMap;

use glam::{DMat4, DQuat, DVec3};

/// Read access to world positions of named scene graph nodes.
pub trait SceneGraph {
    /// World position of `node` at `time` (seconds past the scene epoch),
    /// or `None` when the node does not exist.
    fn world_position(&self, node: &str, time: f64) -> Option<DVec3>;
}

/// A flat map of node names to fixed world positions.
#[derive(Debug, Clone, Default)]
pub struct SceneNodes {
    nodes: HashMap<String, DVec3>,
}

impl SceneNodes {
    /// Creates an empty node map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or moves a node.
    pub fn insert(&mut self, name: impl Into<String>, position: DVec3) {
        self.nodes.insert(name.into(), position);
    }

    /// Removes a node, returning its last position.
    pub fn remove(&mut self, name: &str) -> Option<DVec3> {
        self.nodes.remove(name)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the map has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl SceneGraph for SceneNodes {
    fn world_position(&self, node: &str, _time: f64) -> Option<DVec3> {
        self.nodes.get(node).copied()
    }
}

/// World transform of the object being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }
}

impl ModelTransform {
    /// A pure translation.
    #[must_use]
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    /// Model-to-world matrix.
    #[must_use]
    pub fn matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}
