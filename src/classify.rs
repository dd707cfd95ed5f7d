use log::{debug, info};

use crate::{
    store::{Feature, FieldDef, Layer, Value, NULL},
    zone::{FractionTable, ZoneCode},
    Error, Result,
};

/// Assigns fraction impervious to land-use parcels from their zone code.
#[derive(Debug, Clone, Copy)]
pub struct ParcelClassifier<'a> {
    table: &'a FractionTable,
    zone_name: &'a str,
    zone_field: usize,
}

impl<'a> ParcelClassifier<'a> {
    /// Bind a table to the zone column of `layer`.
    pub fn for_layer(table: &'a FractionTable, layer: &Layer, zone_field: &'a str) -> Result<Self> {
        let idx = layer.require_field(zone_field)?;
        Ok(Self { table, zone_name: zone_field, zone_field: idx })
    }

    /// Zone code of a parcel, normalized to the table's key form.
    pub fn zone(&self, parcel: &Feature) -> Result<ZoneCode> {
        let value = parcel.values.get(self.zone_field).unwrap_or(&NULL);
        ZoneCode::from_value(value).ok_or_else(|| Error::MissingField {
            field: self.zone_name.to_string(),
            feature: parcel.id,
        })
    }

    /// Fraction impervious of a single parcel.
    pub fn classify(&self, parcel: &Feature) -> Result<f64> {
        let zone = self.zone(parcel)?;
        self.table.lookup(&zone, parcel.id)
    }
}

/// Classify every parcel of `land_use`, returning the layer with `fraction_field`
/// populated (added if absent). Fails as a whole on the first unclassifiable parcel.
pub fn classify_layer(table: &FractionTable, mut land_use: Layer, zone_field: &str, fraction_field: &str) -> Result<Layer> {
    let classifier = ParcelClassifier::for_layer(table, &land_use, zone_field)?;

    let fractions = land_use.iter()
        .map(|parcel| classifier.classify(parcel).map(|fi| (parcel.id, fi)))
        .collect::<Result<Vec<_>>>()?;

    let fi_field = land_use.add_field(FieldDef::real(fraction_field))?;
    for (id, fi) in fractions {
        debug!("[classify] parcel {id} -> fi={fi}");
        land_use.set_value(id, fi_field, Value::Real(fi))?;
    }

    info!("[classify] assigned '{fraction_field}' to {} parcels", land_use.len());
    Ok(land_use)
}
