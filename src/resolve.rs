use geo::{Area, Contains, MultiPolygon, Point};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    geom::PolygonIndex,
    store::{FieldDef, Layer, Value},
    Error, Result,
};

/// What to do when more than one derived basin contains a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainmentPolicy {
    /// Take the first containing basin in feature order and stop looking.
    #[default]
    FirstMatch,
    /// Test every candidate; a point inside several basins is left unwritten and reported.
    Unique,
}

/// The numbers the resolver needs from a derived basin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedBasin {
    pub id: usize,
    pub impervious_area: f64,
    pub area: f64,
}

impl DerivedBasin {
    /// Impervious fraction, or `None` when the basin has no area to divide by.
    #[inline]
    pub fn fraction(&self) -> Option<f64> {
        (self.area > 0.0 && self.area.is_finite()).then(|| self.impervious_area / self.area)
    }
}

/// Derived basins with a spatial index over their geometry.
#[derive(Debug, Clone)]
pub struct BasinIndex {
    basins: Vec<DerivedBasin>,
    geoms: PolygonIndex,
}

impl BasinIndex {
    /// Basins must be listed in feature order; first-match resolution follows it.
    pub fn new(basins: Vec<DerivedBasin>, shapes: Vec<MultiPolygon<f64>>) -> Result<Self> {
        if basins.len() != shapes.len() {
            return Err(Error::Schema(format!("{} basins but {} shapes", basins.len(), shapes.len())));
        }
        Ok(Self { basins, geoms: PolygonIndex::new(shapes) })
    }

    /// Index a derived basin layer, reading the aggregated area from `impervious_area_field`.
    pub fn from_layer(derived: &Layer, impervious_area_field: &str) -> Result<Self> {
        let area_idx = derived.require_field(impervious_area_field)?;

        let mut basins = Vec::with_capacity(derived.len());
        let mut shapes = Vec::with_capacity(derived.len());
        for feature in derived.iter() {
            let shape = feature.geometry.as_polygon().ok_or_else(|| Error::Geometry {
                layer: derived.name().to_string(),
                feature: feature.id,
                reason: "derived basins must be polygons".to_string(),
            })?;
            let impervious_area = derived.value(feature, area_idx).as_f64()
                .ok_or_else(|| Error::MissingField { field: impervious_area_field.to_string(), feature: feature.id })?;

            basins.push(DerivedBasin { id: feature.id, impervious_area, area: shape.unsigned_area() });
            shapes.push(shape.clone());
        }
        Self::new(basins, shapes)
    }

    #[inline] pub fn len(&self) -> usize { self.basins.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.basins.is_empty() }

    #[inline] pub fn basins(&self) -> &[DerivedBasin] { &self.basins }
}

/// Outcome of resolving one point against the derived basins.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched { basin: usize, fraction: f64 },
    Unmatched,
    Degenerate { basin: usize },
    Ambiguous { basins: Vec<usize> },
}

impl Resolution {
    /// The non-fatal diagnostic for anything other than a match.
    pub fn diagnostic(&self, feature: usize) -> Option<Error> {
        match self {
            Resolution::Matched { .. } => None,
            Resolution::Unmatched => Some(Error::UnmatchedPoint { feature }),
            Resolution::Degenerate { basin } => Some(Error::DegenerateBasin { basin: *basin, feature }),
            Resolution::Ambiguous { basins } => Some(Error::AmbiguousPoint { feature, basins: basins.clone() }),
        }
    }
}

/// Find the derived basin enclosing `point` and its impervious fraction.
///
/// Candidates come from the envelope index and are tested with a strict
/// `Contains` in feature order, so a point on a shared boundary matches nothing.
pub fn resolve(point: &Point<f64>, index: &BasinIndex, policy: ContainmentPolicy) -> Resolution {
    let mut containing = index.geoms.candidates_at(point).into_iter()
        .filter(|&idx| index.geoms.shape(idx).contains(point));

    let idx = match policy {
        ContainmentPolicy::FirstMatch => match containing.next() {
            Some(idx) => idx,
            None => return Resolution::Unmatched,
        },
        ContainmentPolicy::Unique => {
            let all: Vec<usize> = containing.collect();
            match all.as_slice() {
                [] => return Resolution::Unmatched,
                [idx] => *idx,
                _ => return Resolution::Ambiguous {
                    basins: all.iter().map(|&idx| index.basins[idx].id).collect(),
                },
            }
        }
    };

    let basin = &index.basins[idx];
    match basin.fraction() {
        Some(fraction) => Resolution::Matched { basin: basin.id, fraction },
        None => Resolution::Degenerate { basin: basin.id },
    }
}

/// Counts and non-fatal diagnostics from a resolution pass.
#[derive(Debug, Default)]
pub struct ResolveSummary {
    pub matched: usize,
    pub diagnostics: Vec<Error>,
}

impl ResolveSummary {
    pub fn count(&self, pred: impl Fn(&Error) -> bool) -> usize {
        self.diagnostics.iter().filter(|e| pred(*e)).count()
    }

    #[inline]
    pub fn unmatched(&self) -> usize { self.count(|e| matches!(e, Error::UnmatchedPoint { .. })) }

    #[inline]
    pub fn degenerate(&self) -> usize { self.count(|e| matches!(e, Error::DegenerateBasin { .. })) }

    #[inline]
    pub fn ambiguous(&self) -> usize { self.count(|e| matches!(e, Error::AmbiguousPoint { .. })) }
}

/// Stamp every point of `points` with its enclosing basin's impervious fraction.
/// The field is added if absent; points without a usable basin keep their old value.
pub fn resolve_all(mut points: Layer, index: &BasinIndex, fraction_field: &str, policy: ContainmentPolicy) -> Result<(Layer, ResolveSummary)> {
    let resolutions = points.iter()
        .map(|feature| match feature.geometry.as_point() {
            Some(point) => Ok((feature.id, resolve(point, index, policy))),
            None => Err(Error::Geometry {
                layer: points.name().to_string(),
                feature: feature.id,
                reason: "centroids must be points".to_string(),
            }),
        })
        .collect::<Result<Vec<_>>>()?;

    let fi_field = points.add_field(FieldDef::real(fraction_field))?;
    let mut summary = ResolveSummary::default();
    for (id, resolution) in resolutions {
        match resolution {
            Resolution::Matched { basin, fraction } => {
                debug!("[resolve] point {id} in basin {basin} -> {fraction}");
                points.set_value(id, fi_field, Value::Real(fraction))?;
                summary.matched += 1;
            }
            other => {
                if let Some(diagnostic) = other.diagnostic(id) {
                    warn!("[resolve] {diagnostic}");
                    summary.diagnostics.push(diagnostic);
                }
            }
        }
    }

    info!(
        "[resolve] {} of {} points matched ({} unmatched, {} degenerate, {} ambiguous)",
        summary.matched, points.len(), summary.unmatched(), summary.degenerate(), summary.ambiguous()
    );
    Ok((points, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Geometry, GeometryKind};
    use geo::Rect;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new((x0, y0), (x1, y1)).to_polygon()])
    }

    fn index(items: &[(f64, MultiPolygon<f64>)]) -> BasinIndex {
        let basins = items.iter().enumerate()
            .map(|(id, (impervious_area, shape))| DerivedBasin { id, impervious_area: *impervious_area, area: shape.unsigned_area() })
            .collect();
        BasinIndex::new(basins, items.iter().map(|(_, shape)| shape.clone()).collect()).unwrap()
    }

    #[test]
    fn point_inside_basin_gets_area_ratio() {
        let basins = index(&[(1.0, square(0.0, 0.0, 10.0, 10.0))]);
        let resolution = resolve(&Point::new(5.0, 5.0), &basins, ContainmentPolicy::FirstMatch);
        match resolution {
            Resolution::Matched { basin: 0, fraction } => assert!((fraction - 0.01).abs() < 1e-12),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn point_outside_or_on_boundary_is_unmatched() {
        let basins = index(&[(1.0, square(0.0, 0.0, 10.0, 10.0))]);
        assert_eq!(resolve(&Point::new(50.0, 5.0), &basins, ContainmentPolicy::FirstMatch), Resolution::Unmatched);
        assert_eq!(resolve(&Point::new(10.0, 5.0), &basins, ContainmentPolicy::FirstMatch), Resolution::Unmatched);
    }

    #[test]
    fn first_match_follows_feature_order() {
        // Inserted so that the later, larger basin has the smaller envelope origin.
        let basins = index(&[
            (10.0, square(4.0, 4.0, 6.0, 6.0)),
            (50.0, square(0.0, 0.0, 10.0, 10.0)),
        ]);
        let resolution = resolve(&Point::new(5.0, 5.0), &basins, ContainmentPolicy::FirstMatch);
        assert!(matches!(resolution, Resolution::Matched { basin: 0, .. }));
    }

    #[test]
    fn unique_policy_reports_overlap() {
        let basins = index(&[
            (10.0, square(4.0, 4.0, 6.0, 6.0)),
            (50.0, square(0.0, 0.0, 10.0, 10.0)),
        ]);
        assert_eq!(
            resolve(&Point::new(5.0, 5.0), &basins, ContainmentPolicy::Unique),
            Resolution::Ambiguous { basins: vec![0, 1] }
        );
        assert!(matches!(
            resolve(&Point::new(1.0, 1.0), &basins, ContainmentPolicy::Unique),
            Resolution::Matched { basin: 1, .. }
        ));
    }

    #[test]
    fn shapes_must_match_basins() {
        let err = BasinIndex::new(Vec::new(), vec![square(0.0, 0.0, 1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn zero_area_basin_is_degenerate() {
        let basins = BasinIndex::new(
            vec![DerivedBasin { id: 3, impervious_area: 1.0, area: 0.0 }],
            vec![square(0.0, 0.0, 10.0, 10.0)],
        ).unwrap();
        assert_eq!(resolve(&Point::new(5.0, 5.0), &basins, ContainmentPolicy::FirstMatch), Resolution::Degenerate { basin: 3 });
    }

    #[test]
    fn resolve_all_writes_matches_and_collects_diagnostics() {
        let mut points = Layer::new("centroids", GeometryKind::Point, vec![FieldDef::real("fi")]);
        points.create_feature(Geometry::Point(Point::new(5.0, 5.0)), vec![Value::Null]).unwrap();
        points.create_feature(Geometry::Point(Point::new(50.0, 50.0)), vec![Value::Real(0.3)]).unwrap();

        let basins = index(&[(1.0, square(0.0, 0.0, 10.0, 10.0))]);
        let (points, summary) = resolve_all(points, &basins, "fi", ContainmentPolicy::FirstMatch).unwrap();

        assert_eq!(points.fields().len(), 1);
        assert!((points.features()[0].values[0].as_f64().unwrap() - 0.01).abs() < 1e-12);
        assert_eq!(points.features()[1].values[0], Value::Real(0.3));
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.unmatched(), 1);
        assert!(summary.diagnostics.iter().all(|e| !e.is_fatal()));
    }
}
