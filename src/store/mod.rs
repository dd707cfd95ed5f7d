//! Vector-dataset store: layers of polygon or point features with a flat
//! attribute schema, and the backends that read and write them.

mod convert;
mod esri;
mod layer;
mod memory;

use std::path::Path;

use geo::{MultiPolygon, Point};

use crate::Result;

pub use esri::ShapefileStore;
pub use layer::Layer;
pub use memory::MemoryStore;

/// Geometry family carried by every feature of a layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GeometryKind { Polygon, Point }

/// Feature geometry. Polygons are always held as (possibly single-part) MultiPolygons.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Polygon(MultiPolygon<f64>),
    Point(Point<f64>),
}

impl Geometry {
    #[inline]
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::Point(_) => GeometryKind::Point,
        }
    }

    #[inline]
    pub fn as_polygon(&self) -> Option<&MultiPolygon<f64>> {
        match self {
            Geometry::Polygon(polygon) => Some(polygon),
            Geometry::Point(_) => None,
        }
    }

    #[inline]
    pub fn as_point(&self) -> Option<&Point<f64>> {
        match self {
            Geometry::Point(point) => Some(point),
            Geometry::Polygon(_) => None,
        }
    }
}

/// Attribute column type, one per dBASE field type this crate can round-trip.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// `C`
    Text,
    /// `N`, decimal text with a fixed width and decimal count
    Numeric,
    /// `F`, like `Numeric` but stored as a float
    Float,
    /// `O`, binary double
    Double,
    /// `Y`, binary currency
    Currency,
    /// `I`, binary 32-bit integer
    Integer,
    /// `L`
    Bool,
    /// `D`
    Date,
    /// `T`, binary date and time
    DateTime,
}

impl FieldKind {
    /// Binary columns have no encoding for a missing value.
    #[inline]
    pub fn is_nullable(self) -> bool {
        !matches!(self, FieldKind::Double | FieldKind::Currency | FieldKind::Integer | FieldKind::DateTime)
    }

    /// Columns that can store a fractional number without rounding it to an integer.
    #[inline]
    pub fn is_real(self) -> bool {
        matches!(self, FieldKind::Numeric | FieldKind::Float | FieldKind::Double | FieldKind::Currency)
    }

    /// Whether a value of this shape can be stored in a column of this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match value {
            Value::Null => self.is_nullable(),
            Value::Text(_) => self == FieldKind::Text,
            Value::Real(_) => self == FieldKind::Text || self.is_real(),
            Value::Integer(_) => self == FieldKind::Text || self == FieldKind::Integer || self.is_real(),
            Value::Bool(_) => self == FieldKind::Bool,
            Value::Date { .. } => self == FieldKind::Date,
            Value::DateTime { .. } => self == FieldKind::DateTime,
        }
    }
}

/// Attribute column definition. `width` and `decimals` are kept as read so
/// rewriting a dataset reproduces its schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub width: u8,
    pub decimals: u8,
}

impl FieldDef {
    pub fn new(name: &str, kind: FieldKind, width: u8, decimals: u8) -> Self {
        Self { name: name.to_string(), kind, width, decimals }
    }

    pub fn text(name: &str, width: u8) -> Self {
        Self::new(name, FieldKind::Text, width, 0)
    }

    /// Real-valued column, 24.15 like OGR's default `OFTReal` width.
    pub fn real(name: &str) -> Self {
        Self::new(name, FieldKind::Numeric, 24, 15)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer, 4, 0)
    }
}

/// A single attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Real(f64),
    Integer(i64),
    Bool(bool),
    Date { year: u32, month: u32, day: u32 },
    DateTime { year: u32, month: u32, day: u32, hours: u32, minutes: u32, seconds: u32 },
}

/// Shared null for lookups that fall off the end of a record.
pub(crate) static NULL: Value = Value::Null;

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(x) => Some(*x),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A feature record: a stable id, a geometry and one value per layer field.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: usize,
    pub geometry: Geometry,
    pub values: Vec<Value>,
}

/// Read/write access to named datasets.
///
/// Layers are immutable snapshots: backends load a whole dataset on open and
/// replace it whole on write, so callers never iterate a cursor they are mutating.
pub trait VectorStore {
    /// Load the dataset at `path`. Fails with [`crate::Error::DatasetOpen`] if it is
    /// missing or unreadable.
    fn open_layer(&self, path: &Path) -> Result<Layer>;

    /// Create or replace the dataset at `path` with `layer`.
    fn write_layer(&self, path: &Path, layer: &Layer) -> Result<()>;
}
