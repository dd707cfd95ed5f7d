use std::collections::BTreeSet;

use geo::{Area, BooleanOps, MultiPolygon};
use log::{debug, info};
use rayon::prelude::*;

use crate::{
    geom::PolygonIndex,
    store::Layer,
    zone::ZoneCode,
    Error, Result,
};

/// A land-use parcel ready for overlay: classified and with its area precomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub id: usize,
    pub zone: ZoneCode,
    pub fraction: f64,
    pub area: f64,
}

impl Parcel {
    /// Impervious area of the whole parcel.
    #[inline] pub fn impervious_area(&self) -> f64 { self.area * self.fraction }
}

/// Classified parcels with a spatial index over their geometry.
#[derive(Debug, Clone)]
pub struct ParcelIndex {
    parcels: Vec<Parcel>,
    geoms: PolygonIndex,
}

impl ParcelIndex {
    /// `shapes[i]` is the geometry of `parcels[i]`.
    pub fn new(parcels: Vec<Parcel>, shapes: Vec<MultiPolygon<f64>>) -> Result<Self> {
        if parcels.len() != shapes.len() {
            return Err(Error::Schema(format!("{} parcels but {} shapes", parcels.len(), shapes.len())));
        }
        Ok(Self { parcels, geoms: PolygonIndex::new(shapes) })
    }

    /// Build from a classified land-use layer. The fraction is read from
    /// `fraction_field`, not recomputed, so classification must have run first.
    pub fn from_layer(land_use: &Layer, zone_field: &str, fraction_field: &str) -> Result<Self> {
        let zone_idx = land_use.require_field(zone_field)?;
        let fi_idx = land_use.require_field(fraction_field)?;

        let mut parcels = Vec::with_capacity(land_use.len());
        let mut shapes = Vec::with_capacity(land_use.len());
        for feature in land_use.iter() {
            let shape = feature.geometry.as_polygon().ok_or_else(|| Error::Geometry {
                layer: land_use.name().to_string(),
                feature: feature.id,
                reason: "land-use parcels must be polygons".to_string(),
            })?;
            let zone = ZoneCode::from_value(land_use.value(feature, zone_idx))
                .ok_or_else(|| Error::MissingField { field: zone_field.to_string(), feature: feature.id })?;
            let fraction = land_use.value(feature, fi_idx).as_f64()
                .ok_or_else(|| Error::MissingField { field: fraction_field.to_string(), feature: feature.id })?;

            parcels.push(Parcel { id: feature.id, zone, fraction, area: shape.unsigned_area() });
            shapes.push(shape.clone());
        }
        Self::new(parcels, shapes)
    }

    #[inline] pub fn len(&self) -> usize { self.parcels.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.parcels.is_empty() }

    #[inline] pub fn parcels(&self) -> &[Parcel] { &self.parcels }
}

/// Impervious area and contributing zones accumulated for one basin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    pub impervious_area: f64,
    pub contributing_zones: BTreeSet<ZoneCode>,
}

impl AggregateResult {
    /// Zone codes in sorted order joined by `separator`.
    pub fn zone_ids(&self, separator: &str) -> String {
        self.contributing_zones.iter()
            .map(ZoneCode::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// Sum the impervious area of every parcel whose intersection with `basin` has
/// area strictly greater than `threshold`. A qualifying parcel contributes its
/// full impervious area, not just the clipped part; parcels at or under the
/// threshold contribute nothing.
pub fn aggregate(basin: &MultiPolygon<f64>, parcels: &ParcelIndex, threshold: f64) -> AggregateResult {
    let mut result = AggregateResult::default();

    for idx in parcels.geoms.candidates_for(basin) {
        let overlap = basin.intersection(parcels.geoms.shape(idx)).unsigned_area();
        let parcel = &parcels.parcels[idx];
        if overlap > threshold {
            result.impervious_area += parcel.impervious_area();
            result.contributing_zones.insert(parcel.zone.clone());
        } else {
            debug!("[overlay] parcel {} overlap {overlap:.3} <= {threshold}, skipped", parcel.id);
        }
    }
    result
}

/// Aggregate every basin of `basins`, in feature order. Basins are independent,
/// so the work is spread across threads; the output order does not depend on it.
pub fn aggregate_all(basins: &Layer, parcels: &ParcelIndex, threshold: f64) -> Result<Vec<AggregateResult>> {
    let shapes = basins.iter()
        .map(|feature| feature.geometry.as_polygon().ok_or_else(|| Error::Geometry {
            layer: basins.name().to_string(),
            feature: feature.id,
            reason: "basins must be polygons".to_string(),
        }))
        .collect::<Result<Vec<_>>>()?;

    let results: Vec<AggregateResult> = shapes.par_iter()
        .map(|basin| aggregate(basin, parcels, threshold))
        .collect();

    let contributing = results.iter().filter(|r| !r.contributing_zones.is_empty()).count();
    info!("[overlay] aggregated {} basins ({contributing} with contributing parcels)", results.len());
    Ok(results)
}
