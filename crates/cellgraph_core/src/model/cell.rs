//! Cell domain record.
//!
//! # Responsibility
//! - Define the node stored in the ownership tree and its caller-visible fields.
//! - Provide builders for vertex, edge and container cells.
//!
//! # Invariants
//! - `parent`, `children`, `source` and `target` are handles into the owning
//!   model's arena; they are only rewritten by the arena/change machinery.
//! - `value`, `geometry` and `style` are opaque to the core.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Stable handle of one cell inside a [`GraphModel`](crate::GraphModel) arena.
///
/// Handles are never reused: a cell stays addressable for the lifetime of
/// the model even while detached, so undo history can reattach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellRef(pub(crate) u32);

impl CellRef {
    /// Arena slot of this handle.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for CellRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bounds of one cell as handed to rendering collaborators.
///
/// For edges `relative` marks label placement relative to the edge path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub relative: bool,
}

impl Geometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            relative: false,
        }
    }

    /// Relative geometry used by edges.
    pub fn relative() -> Self {
        Self {
            relative: true,
            ..Self::default()
        }
    }
}

/// One node of the ownership tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub(crate) id: Option<String>,
    pub(crate) value: Value,
    pub(crate) geometry: Option<Geometry>,
    pub(crate) style: Option<String>,
    pub(crate) vertex: bool,
    pub(crate) edge: bool,
    pub(crate) connectable: bool,
    pub(crate) visible: bool,
    pub(crate) collapsed: bool,
    pub(crate) parent: Option<CellRef>,
    pub(crate) children: Vec<CellRef>,
    pub(crate) source: Option<CellRef>,
    pub(crate) target: Option<CellRef>,
}

impl Default for Cell {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl Cell {
    /// Creates a plain container cell (neither vertex nor edge).
    ///
    /// Root and layer cells are built this way.
    pub fn new(value: Value) -> Self {
        Self {
            id: None,
            value,
            geometry: None,
            style: None,
            vertex: false,
            edge: false,
            connectable: true,
            visible: true,
            collapsed: false,
            parent: None,
            children: Vec::new(),
            source: None,
            target: None,
        }
    }

    /// Creates a vertex cell.
    pub fn vertex(value: Value) -> Self {
        Self {
            vertex: true,
            ..Self::new(value)
        }
    }

    /// Creates an edge cell. Terminals are connected through the model.
    pub fn edge(value: Value) -> Self {
        Self {
            edge: true,
            geometry: Some(Geometry::relative()),
            ..Self::new(value)
        }
    }

    /// Pre-assigns an id; the model may still replace it on collision.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_connectable(mut self, connectable: bool) -> Self {
        self.connectable = connectable;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn is_vertex(&self) -> bool {
        self.vertex
    }

    pub fn is_edge(&self) -> bool {
        self.edge
    }

    pub fn is_connectable(&self) -> bool {
        self.connectable
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn parent(&self) -> Option<CellRef> {
        self.parent
    }

    /// Children in z-order.
    pub fn children(&self) -> &[CellRef] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Source (`is_source == true`) or target terminal of an edge.
    pub fn terminal(&self, is_source: bool) -> Option<CellRef> {
        if is_source {
            self.source
        } else {
            self.target
        }
    }

    pub(crate) fn set_terminal(&mut self, terminal: Option<CellRef>, is_source: bool) {
        if is_source {
            self.source = terminal;
        } else {
            self.target = terminal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cell, CellRef, Geometry};
    use serde_json::json;

    #[test]
    fn builders_set_kind_flags() {
        let vertex = Cell::vertex(json!("A"));
        assert!(vertex.is_vertex());
        assert!(!vertex.is_edge());
        assert!(vertex.is_visible());
        assert!(vertex.is_connectable());
        assert_eq!(vertex.geometry(), None);

        let edge = Cell::edge(json!(null));
        assert!(edge.is_edge());
        assert_eq!(edge.geometry(), Some(&Geometry::relative()));
        assert_eq!(edge.terminal(true), None);
    }

    #[test]
    fn terminal_setter_targets_one_end() {
        let mut edge = Cell::edge(json!(null));
        edge.set_terminal(Some(CellRef(3)), true);
        edge.set_terminal(Some(CellRef(4)), false);
        assert_eq!(edge.terminal(true), Some(CellRef(3)));
        assert_eq!(edge.terminal(false), Some(CellRef(4)));
    }

    #[test]
    fn cell_ref_serializes_as_plain_index() {
        let encoded = serde_json::to_value(CellRef(12)).unwrap();
        assert_eq!(encoded, json!(12));
        assert_eq!(CellRef(12).to_string(), "#12");
    }
}
