use log::{info, warn};

use crate::{
    config::FieldNames,
    overlay::AggregateResult,
    store::{Feature, FieldDef, GeometryKind, Layer, Value},
    Error, Result,
};

/// Widest text column a dBASE table allows; zone-id lists are cut to fit.
pub const ZONE_IDS_WIDTH: u8 = 254;

/// Schema of the derived basin layer: the basin schema followed by the zone-id
/// and impervious-area columns.
pub fn derived_schema(basin_fields: &[FieldDef], fields: &FieldNames) -> Result<Vec<FieldDef>> {
    for name in [&fields.zone_ids, &fields.impervious_area] {
        if basin_fields.iter().any(|field| &field.name == name) {
            return Err(Error::Schema(format!("basin layer already has a field named '{name}'")));
        }
    }

    let mut schema = basin_fields.to_vec();
    schema.push(FieldDef::text(&fields.zone_ids, ZONE_IDS_WIDTH));
    schema.push(FieldDef::real(&fields.impervious_area));
    Ok(schema)
}

/// Derived basin record: the basin's geometry and attributes, then the joined
/// zone ids and the impervious area.
pub fn build(basin: &Feature, result: &AggregateResult, separator: &str) -> Feature {
    let mut values = basin.values.clone();
    values.push(Value::Text(result.zone_ids(separator)));
    values.push(Value::Real(result.impervious_area));
    Feature { id: basin.id, geometry: basin.geometry.clone(), values }
}

/// Build the derived basin layer from `basins` and one aggregate per basin.
pub fn build_layer(name: &str, basins: &Layer, results: &[AggregateResult], fields: &FieldNames, separator: &str) -> Result<Layer> {
    if basins.len() != results.len() {
        return Err(Error::Schema(format!(
            "{} basins but {} aggregate results", basins.len(), results.len()
        )));
    }

    let mut derived = Layer::new(name, GeometryKind::Polygon, derived_schema(basins.fields(), fields)?);
    for (basin, result) in basins.iter().zip(results) {
        let mut feature = build(basin, result, separator);
        if let Some(Value::Text(ids)) = feature.values.get_mut(basins.fields().len()) {
            truncate_on_boundary(ids, ZONE_IDS_WIDTH as usize);
        }
        derived.create_feature(feature.geometry, feature.values)?;
    }

    info!("[derive] built {} derived basins", derived.len());
    Ok(derived)
}

fn truncate_on_boundary(text: &mut String, max: usize) {
    if text.len() <= max { return }
    let mut end = max;
    while !text.is_char_boundary(end) { end -= 1; }
    warn!("[derive] zone id list '{text}' truncated to {max} bytes");
    text.truncate(end);
}
