use crate::{Error, Result};

use super::{Feature, FieldDef, Geometry, GeometryKind, Value, NULL};

/// An in-memory snapshot of one dataset: schema plus features.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    name: String,
    kind: GeometryKind,
    fields: Vec<FieldDef>,
    features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: &str, kind: GeometryKind, fields: Vec<FieldDef>) -> Self {
        Self { name: name.to_string(), kind, fields, features: Vec::new() }
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn kind(&self) -> GeometryKind { self.kind }

    #[inline] pub fn fields(&self) -> &[FieldDef] { &self.fields }

    #[inline] pub fn len(&self) -> usize { self.features.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }

    /// Iterate the features in id order. Can be called any number of times.
    #[inline] pub fn iter(&self) -> std::slice::Iter<'_, Feature> { self.features.iter() }

    #[inline] pub fn features(&self) -> &[Feature] { &self.features }

    /// Index of the field called `name`, if present.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Index of the field called `name`. A missing column is reported against the
    /// first feature, since no feature can supply it.
    pub fn require_field(&self, name: &str) -> Result<usize> {
        self.field_index(name).ok_or_else(|| Error::MissingField {
            field: name.to_string(),
            feature: self.features.first().map_or(0, |feature| feature.id),
        })
    }

    /// Add a field unless one with the same name exists; returns its index either way.
    /// Existing features get a null value in the new column.
    ///
    /// Reusing a column requires it to hold what `field` would: text for text,
    /// any fractional numeric kind for a numeric field.
    pub fn add_field(&mut self, field: FieldDef) -> Result<usize> {
        if let Some(idx) = self.field_index(&field.name) {
            let existing = self.fields[idx].kind;
            let compatible = existing == field.kind || (existing.is_real() && field.kind.is_real());
            if !compatible {
                return Err(Error::Schema(format!(
                    "layer '{}' already has field '{}' as {existing:?}, expected {:?}",
                    self.name, field.name, field.kind
                )));
            }
            return Ok(idx);
        }
        if !field.kind.is_nullable() && !self.features.is_empty() {
            return Err(Error::Schema(format!(
                "cannot add {:?} field '{}' to non-empty layer '{}'", field.kind, field.name, self.name
            )));
        }

        self.fields.push(field);
        for feature in &mut self.features {
            feature.values.push(Value::Null);
        }
        Ok(self.fields.len() - 1)
    }

    /// Append a feature, assigning it the next id.
    pub fn create_feature(&mut self, geometry: Geometry, values: Vec<Value>) -> Result<usize> {
        self.check(&geometry, &values)?;
        let id = self.features.last().map_or(0, |feature| feature.id + 1);
        self.features.push(Feature { id, geometry, values });
        Ok(id)
    }

    /// Replace the feature with the same id.
    pub fn set_feature(&mut self, feature: Feature) -> Result<()> {
        self.check(&feature.geometry, &feature.values)?;
        let slot = self.features.iter_mut()
            .find(|existing| existing.id == feature.id)
            .ok_or_else(|| Error::Schema(format!("layer '{}' has no feature {}", self.name, feature.id)))?;
        *slot = feature;
        Ok(())
    }

    /// Overwrite a single value in place.
    pub fn set_value(&mut self, feature: usize, field: usize, value: Value) -> Result<()> {
        let Some(def) = self.fields.get(field) else {
            return Err(Error::Schema(format!("layer '{}' has no field #{field}", self.name)));
        };
        if !def.kind.accepts(&value) {
            return Err(self.mismatch(def, &value));
        }
        let slot = self.features.iter_mut()
            .find(|existing| existing.id == feature)
            .ok_or_else(|| Error::Schema(format!("layer '{}' has no feature {feature}", self.name)))?;
        slot.values[field] = value;
        Ok(())
    }

    /// Value of `field` on `feature` (by position in this layer's schema).
    #[inline]
    pub fn value<'a>(&self, feature: &'a Feature, field: usize) -> &'a Value {
        feature.values.get(field).unwrap_or(&NULL)
    }

    fn check(&self, geometry: &Geometry, values: &[Value]) -> Result<()> {
        if geometry.kind() != self.kind {
            return Err(Error::Schema(format!(
                "layer '{}' holds {:?} features, got {:?}", self.name, self.kind, geometry.kind()
            )));
        }
        if values.len() != self.fields.len() {
            return Err(Error::Schema(format!(
                "layer '{}' has {} fields, feature carries {} values", self.name, self.fields.len(), values.len()
            )));
        }
        match self.fields.iter().zip(values).find(|(def, value)| !def.kind.accepts(value)) {
            Some((def, value)) => Err(self.mismatch(def, value)),
            None => Ok(()),
        }
    }

    fn mismatch(&self, field: &FieldDef, value: &Value) -> Error {
        Error::Schema(format!(
            "value {value:?} does not fit field '{}' ({:?}) of layer '{}'", field.name, field.kind, self.name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldKind;
    use geo::{point, Point};

    fn points() -> Layer {
        let mut layer = Layer::new("centroids", GeometryKind::Point, vec![FieldDef::text("name", 16)]);
        layer.create_feature(Geometry::Point(point!(x: 1.0, y: 1.0)), vec![Value::Text("a".into())]).unwrap();
        layer.create_feature(Geometry::Point(point!(x: 2.0, y: 2.0)), vec![Value::Text("b".into())]).unwrap();
        layer
    }

    #[test]
    fn ids_are_sequential() {
        let layer = points();
        let ids: Vec<usize> = layer.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(layer.require_field("name").unwrap(), 0);
        assert!(matches!(layer.require_field("missing"), Err(Error::MissingField { ref field, .. }) if field == "missing"));
    }

    #[test]
    fn add_field_is_idempotent() {
        let mut layer = points();
        let first = layer.add_field(FieldDef::real("fi")).unwrap();
        let second = layer.add_field(FieldDef::real("fi")).unwrap();
        assert_eq!(first, second);
        assert_eq!(layer.fields().len(), 2);
        assert!(layer.iter().all(|f| f.values.len() == 2 && f.values[1].is_null()));
    }

    #[test]
    fn iteration_is_restartable() {
        let layer = points();
        assert_eq!(layer.iter().count(), 2);
        assert_eq!(layer.iter().count(), 2);
    }

    #[test]
    fn rejects_wrong_geometry_kind() {
        let mut layer = points();
        let square = geo::MultiPolygon(vec![geo::Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon()]);
        let err = layer.create_feature(Geometry::Polygon(square), vec![Value::Null]).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn set_feature_replaces_by_id() {
        let mut layer = points();
        let mut feature = layer.features()[1].clone();
        feature.geometry = Geometry::Point(Point::new(9.0, 9.0));
        layer.set_feature(feature).unwrap();
        assert_eq!(layer.features()[1].geometry.as_point(), Some(&Point::new(9.0, 9.0)));
        assert!(layer.set_value(7, 0, Value::Null).is_err());
    }

    #[test]
    fn reused_field_must_hold_the_same_kind_of_value() {
        let mut layer = points();
        assert!(matches!(layer.add_field(FieldDef::real("name")), Err(Error::Schema(_))));

        let float = layer.add_field(FieldDef::new("fi", FieldKind::Float, 12, 3)).unwrap();
        assert_eq!(layer.add_field(FieldDef::real("fi")).unwrap(), float);

        layer.add_field(FieldDef::integer("count")).unwrap_err();
        assert_eq!(layer.fields().len(), 2);
    }

    #[test]
    fn values_must_fit_their_column() {
        let mut layer = Layer::new("centroids", GeometryKind::Point, vec![FieldDef::integer("fi")]);
        let point = || Geometry::Point(point!(x: 0.0, y: 0.0));

        let id = layer.create_feature(point(), vec![Value::Integer(1)]).unwrap();
        assert!(matches!(layer.set_value(id, 0, Value::Real(0.95)), Err(Error::Schema(_))));
        assert!(layer.create_feature(point(), vec![Value::Null]).is_err());
        assert_eq!(layer.value(&layer.features()[0], 0), &Value::Integer(1));
    }
}
