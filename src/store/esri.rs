use std::{
    fs,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use shapefile::{self as shp, dbase, Shape};

use crate::{Error, Result};

use super::{
    convert::{point_from_shp, point_to_shp, polygon_from_shp, polygon_to_shp},
    Feature, FieldDef, FieldKind, Geometry, GeometryKind, Layer, Value, VectorStore,
};

/// Sidecar files rewritten together with the `.shp`.
const SIDECARS: [&str; 3] = ["shp", "shx", "dbf"];

/// ESRI Shapefile backend. Other sidecars (`.prj`, `.cpg`) are left untouched.
///
/// Polygons and points are read in two dimensions; Z and M ordinates are dropped
/// and the dataset is written back as plain `Polygon` / `Point`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapefileStore;

impl ShapefileStore {
    pub fn new() -> Self { Self }
}

impl VectorStore for ShapefileStore {
    fn open_layer(&self, path: &Path) -> Result<Layer> {
        let open_error = |reason: String| Error::DatasetOpen { path: path.to_path_buf(), reason };

        if !path.is_file() {
            return Err(open_error("file does not exist".to_string()));
        }

        let fields = read_schema(path).map_err(|e| open_error(e.to_string()))?;
        let mut reader = shp::Reader::from_path(path).map_err(|e| open_error(e.to_string()))?;

        let name = layer_name(path);
        let header_type = reader.header().shape_type;
        let kind = header_kind(header_type).ok_or_else(|| Error::Geometry {
            layer: name.clone(),
            feature: 0,
            reason: format!("unsupported shape type {header_type:?}"),
        })?;
        if header_type != shp::ShapeType::Polygon && header_type != shp::ShapeType::Point {
            warn!("[store] {} is {header_type:?}; Z/M ordinates are ignored and not written back", path.display());
        }

        let mut layer = Layer::new(&name, kind, fields);
        for (id, item) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) = item.map_err(|e| open_error(e.to_string()))?;
            let geometry = shape_to_geometry(shape).map_err(|reason| Error::Geometry {
                layer: name.clone(),
                feature: id,
                reason,
            })?;
            let values = layer.fields().iter().map(|field| read_value(&record, field)).collect();
            layer.create_feature(geometry, values)?;
        }
        debug!("[store] read {} features from {}", layer.len(), path.display());
        Ok(layer)
    }

    /// Writes into a staging directory beside `path`, then renames the sidecars into
    /// place, so a failed write never leaves a half-written dataset at `path`.
    fn write_layer(&self, path: &Path, layer: &Layer) -> Result<()> {
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let staging = tempfile::Builder::new().prefix(".fracimperv-").tempdir_in(&parent)?;
        let staged = staging.path().join(path.file_name().unwrap_or_else(|| "layer.shp".as_ref()));
        write_shapefile(&staged, layer)?;

        for ext in SIDECARS {
            fs::rename(staged.with_extension(ext), path.with_extension(ext))?;
        }
        debug!("[store] wrote {} features to {}", layer.len(), path.display());
        Ok(())
    }
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn header_kind(shape_type: shp::ShapeType) -> Option<GeometryKind> {
    use shp::ShapeType as T;
    match shape_type {
        T::Point | T::PointM | T::PointZ => Some(GeometryKind::Point),
        T::Polygon | T::PolygonM | T::PolygonZ => Some(GeometryKind::Polygon),
        _ => None,
    }
}

fn shape_to_geometry(shape: Shape) -> std::result::Result<Geometry, String> {
    match shape {
        Shape::Polygon(polygon) => Ok(Geometry::Polygon(polygon_from_shp(&polygon))),
        Shape::PolygonM(polygon) => Ok(Geometry::Polygon(polygon_from_shp(&polygon))),
        Shape::PolygonZ(polygon) => Ok(Geometry::Polygon(polygon_from_shp(&polygon))),
        Shape::Point(point) => Ok(Geometry::Point(point_from_shp(&point))),
        Shape::PointM(point) => Ok(Geometry::Point(point_from_shp(&point))),
        Shape::PointZ(point) => Ok(Geometry::Point(point_from_shp(&point))),
        other => Err(format!("found {:?} shape; only polygons and points are supported", other.shapetype())),
    }
}

/// Field definitions from the `.dbf` header, in column order, with widths and
/// decimal counts as stored.
fn read_schema(path: &Path) -> Result<Vec<FieldDef>> {
    let dbf = path.with_extension("dbf");
    let reader = dbase::Reader::from_path(&dbf).map_err(shp::Error::from)?;
    let decimals = decimal_counts(&dbf)?;

    reader.fields().iter().enumerate()
        .map(|(idx, info)| {
            let kind = match info.field_type() {
                dbase::FieldType::Character => FieldKind::Text,
                dbase::FieldType::Numeric => FieldKind::Numeric,
                dbase::FieldType::Float => FieldKind::Float,
                dbase::FieldType::Double => FieldKind::Double,
                dbase::FieldType::Currency => FieldKind::Currency,
                dbase::FieldType::Integer => FieldKind::Integer,
                dbase::FieldType::Logical => FieldKind::Bool,
                dbase::FieldType::Date => FieldKind::Date,
                dbase::FieldType::DateTime => FieldKind::DateTime,
                dbase::FieldType::Memo => {
                    return Err(Error::Schema(format!("memo field '{}' is not supported", info.name())));
                }
            };
            let decimals = decimals.get(idx).copied().unwrap_or(0);
            Ok(FieldDef::new(info.name(), kind, info.length(), decimals))
        })
        .collect()
}

/// Decimal count of every field, read from the descriptor array that follows the
/// 32-byte table header (one 32-byte descriptor per field, count at byte 17,
/// terminated by 0x0D). `dbase` reads but does not expose this value.
fn decimal_counts(dbf: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = fs::File::open(dbf)?;
    let mut header = [0u8; 32];
    file.read_exact(&mut header)?;

    let header_len = usize::from(u16::from_le_bytes([header[8], header[9]]));
    let mut descriptors = vec![0u8; header_len.saturating_sub(header.len())];
    file.read_exact(&mut descriptors)?;

    Ok(descriptors.chunks_exact(32)
        .take_while(|descriptor| descriptor[0] != 0x0D)
        .map(|descriptor| descriptor[17])
        .collect())
}

fn read_value(record: &dbase::Record, field: &FieldDef) -> Value {
    use dbase::FieldValue as F;
    match record.get(&field.name) {
        Some(F::Character(Some(s))) => Value::Text(s.trim().to_string()),
        Some(F::Numeric(Some(x))) => Value::Real(*x),
        Some(F::Float(Some(x))) => Value::Real(f64::from(*x)),
        Some(F::Double(x)) | Some(F::Currency(x)) => Value::Real(*x),
        Some(F::Integer(i)) => Value::Integer(i64::from(*i)),
        Some(F::Logical(Some(b))) => Value::Bool(*b),
        Some(F::Date(Some(d))) => Value::Date { year: d.year(), month: d.month(), day: d.day() },
        Some(F::DateTime(dt)) => {
            let (date, time) = (dt.date(), dt.time());
            Value::DateTime {
                year: date.year(),
                month: date.month(),
                day: date.day(),
                hours: time.hours(),
                minutes: time.minutes(),
                seconds: time.seconds(),
            }
        }
        _ => Value::Null,
    }
}

fn write_value(value: &Value, field: &FieldDef) -> Result<dbase::FieldValue> {
    use dbase::FieldValue as F;
    let mismatch = || Error::Schema(format!("value {value:?} does not fit field '{}' ({:?})", field.name, field.kind));
    let real = || value.as_f64().ok_or_else(mismatch);
    Ok(match (field.kind, value) {
        (FieldKind::Text, Value::Null) => F::Character(None),
        (FieldKind::Text, Value::Text(s)) => F::Character(Some(s.clone())),
        (FieldKind::Text, Value::Real(x)) => F::Character(Some(x.to_string())),
        (FieldKind::Text, Value::Integer(i)) => F::Character(Some(i.to_string())),
        (FieldKind::Numeric, Value::Null) => F::Numeric(None),
        (FieldKind::Numeric, _) => F::Numeric(Some(real()?)),
        (FieldKind::Float, Value::Null) => F::Float(None),
        (FieldKind::Float, _) => F::Float(Some(real()? as f32)),
        (FieldKind::Double, Value::Real(_) | Value::Integer(_)) => F::Double(real()?),
        (FieldKind::Currency, Value::Real(_) | Value::Integer(_)) => F::Currency(real()?),
        (FieldKind::Integer, Value::Integer(i)) => F::Integer(i32::try_from(*i).map_err(|_| mismatch())?),
        (FieldKind::Bool, Value::Null) => F::Logical(None),
        (FieldKind::Bool, Value::Bool(b)) => F::Logical(Some(*b)),
        (FieldKind::Date, Value::Null) => F::Date(None),
        (FieldKind::Date, &Value::Date { year, month, day }) => F::Date(Some(date(year, month, day).ok_or_else(mismatch)?)),
        (FieldKind::DateTime, &Value::DateTime { year, month, day, hours, minutes, seconds }) => {
            let date = date(year, month, day).ok_or_else(mismatch)?;
            if hours > 24 || minutes > 60 || seconds > 60 {
                return Err(mismatch());
            }
            F::DateTime(dbase::DateTime::new(date, dbase::Time::new(hours, minutes, seconds)))
        }
        _ => return Err(mismatch()),
    })
}

/// `dbase::Date::new` and `dbase::Time::new` panic out of range, so dates are checked first.
fn date(year: u32, month: u32, day: u32) -> Option<dbase::Date> {
    (year <= 9999 && month <= 12 && day <= 31).then(|| dbase::Date::new(day, month, year))
}

fn table_builder(fields: &[FieldDef]) -> Result<dbase::TableWriterBuilder> {
    let mut builder = dbase::TableWriterBuilder::new();
    for field in fields {
        let name = dbase::FieldName::try_from(field.name.as_str())
            .map_err(|_| Error::Schema(format!("'{}' is not a valid dBASE field name", field.name)))?;
        builder = match field.kind {
            FieldKind::Text => builder.add_character_field(name, field.width),
            FieldKind::Numeric => builder.add_numeric_field(name, field.width, field.decimals),
            FieldKind::Float => builder.add_float_field(name, field.width, field.decimals),
            FieldKind::Double => builder.add_double_field(name),
            FieldKind::Currency => builder.add_currency_field(name),
            FieldKind::Integer => builder.add_integer_field(name),
            FieldKind::Bool => builder.add_logical_field(name),
            FieldKind::Date => builder.add_date_field(name),
            FieldKind::DateTime => builder.add_datetime_field(name),
        };
    }
    Ok(builder)
}

fn write_shapefile(path: &Path, layer: &Layer) -> Result<()> {
    {
        let mut writer = shp::Writer::from_path(path, table_builder(layer.fields())?)?;
        for feature in layer.iter() {
            let mut record = dbase::Record::default();
            for (field, value) in layer.fields().iter().zip(&feature.values) {
                record.insert(field.name.clone(), write_value(value, field)?);
            }
            match &feature.geometry {
                Geometry::Polygon(polygon) => writer.write_shape_and_record(&polygon_to_shp(polygon), &record)?,
                Geometry::Point(point) => writer.write_shape_and_record(&point_to_shp(point), &record)?,
            }
        }
    }
    if layer.is_empty() {
        stamp_shape_type(path, layer.kind())?;
    }
    Ok(())
}

/// The writer takes the header's shape type from the first record, leaving an
/// empty dataset as `NullShape`. Set it from the layer kind instead (an i32 LE at
/// byte 32 of both `.shp` and `.shx`).
fn stamp_shape_type(path: &Path, kind: GeometryKind) -> Result<()> {
    let shape_type = match kind {
        GeometryKind::Polygon => shp::ShapeType::Polygon,
        GeometryKind::Point => shp::ShapeType::Point,
    };
    for ext in ["shp", "shx"] {
        let mut file = fs::OpenOptions::new().write(true).open(path.with_extension(ext))?;
        file.seek(SeekFrom::Start(32))?;
        file.write_all(&(shape_type as i32).to_le_bytes())?;
    }
    Ok(())
}
