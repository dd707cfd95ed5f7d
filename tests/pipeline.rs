// End-to-end runs against the in-memory store:
//   scenario from the drainage model (two parcels, one basin, one centroid),
//   fatal errors leave every dataset untouched, basin independence, and
//   the round trip between derived basins and stamped centroids.

use std::path::Path;

use fracimperv::{
    store::{FieldDef, Geometry, GeometryKind, Layer, MemoryStore, Value, VectorStore},
    Config, ContainmentPolicy, Error,
};
use geo::{Area, Contains, MultiPolygon, Point, Rect};

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry {
    Geometry::Polygon(MultiPolygon(vec![Rect::new((x0, y0), (x1, y1)).to_polygon()]))
}

fn basins(shapes: &[(&str, Geometry)]) -> Layer {
    let mut layer = Layer::new("basin", GeometryKind::Polygon, vec![FieldDef::text("name", 16)]);
    for (name, shape) in shapes {
        layer.create_feature(shape.clone(), vec![Value::Text(name.to_string())]).unwrap();
    }
    layer
}

fn land_use(parcels: &[(i64, Geometry)]) -> Layer {
    let mut layer = Layer::new("land_use", GeometryKind::Polygon, vec![FieldDef::integer("zone_no")]);
    for (zone, shape) in parcels {
        layer.create_feature(shape.clone(), vec![Value::Integer(*zone)]).unwrap();
    }
    layer
}

fn centroids(points: &[(f64, f64)]) -> Layer {
    let mut layer = Layer::new("centroids", GeometryKind::Point, vec![FieldDef::text("label", 8)]);
    for (i, (x, y)) in points.iter().enumerate() {
        layer.create_feature(Geometry::Point(Point::new(*x, *y)), vec![Value::Text(format!("c{i}"))]).unwrap();
    }
    layer
}

fn config(threshold: f64) -> Config {
    Config {
        area_threshold: threshold,
        ..Config::default()
    }
}

fn seed(config: &Config, basin: Layer, parcels: Layer, points: Layer) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(&config.basin_path, basin);
    store.insert(&config.land_use_path, parcels);
    store.insert(&config.centroid_path, points);
    store
}

fn scenario(config: &Config) -> MemoryStore {
    seed(
        config,
        basins(&[("B1", square(0.0, 0.0, 10.0, 10.0))]),
        land_use(&[(1, square(0.0, 0.0, 10.0, 5.0)), (20, square(0.0, 5.0, 10.0, 10.0))]),
        centroids(&[(5.0, 5.0)]),
    )
}

fn real(layer: &Layer, feature: usize, field: &str) -> f64 {
    let idx = layer.field_index(field).unwrap();
    layer.features()[feature].values[idx].as_f64().unwrap()
}

#[test]
fn scenario_basin_and_centroid() {
    let config = config(10.0);
    let store = scenario(&config);

    let report = fracimperv::run(&config, &store).unwrap();
    assert_eq!((report.parcels, report.basins, report.points, report.matched), (2, 1, 1, 1));
    assert_eq!(report.committed.len(), 3);

    let derived = store.get(&config.output_path).unwrap();
    let names: Vec<&str> = derived.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "use_id", "imp_area"]);
    assert_eq!(derived.features()[0].values[0], Value::Text("B1".into()));
    assert_eq!(derived.features()[0].values[1], Value::Text("1, 20".into()));
    assert!((real(&derived, 0, "imp_area") - 1.0).abs() < 1e-12);

    let land_use = store.get(&config.land_use_path).unwrap();
    assert_eq!(real(&land_use, 0, "fi"), 0.02);
    assert_eq!(real(&land_use, 1, "fi"), 0.0);

    let points = store.get(&config.centroid_path).unwrap();
    assert!((real(&points, 0, "fi") - 0.01).abs() < 1e-12);
}

#[test]
fn default_threshold_drops_small_parcels() {
    // At the default 500 threshold neither 50-unit parcel qualifies.
    let config = config(500.0);
    let store = scenario(&config);
    fracimperv::run(&config, &store).unwrap();

    let derived = store.get(&config.output_path).unwrap();
    assert_eq!(derived.features()[0].values[1], Value::Text(String::new()));
    assert_eq!(real(&derived, 0, "imp_area"), 0.0);
    assert_eq!(real(&store.get(&config.centroid_path).unwrap(), 0, "fi"), 0.0);
}

#[test]
fn unknown_zone_aborts_before_any_write() {
    let config = config(10.0);
    let store = seed(
        &config,
        basins(&[("B1", square(0.0, 0.0, 10.0, 10.0))]),
        land_use(&[(1, square(0.0, 0.0, 10.0, 5.0)), (999, square(0.0, 5.0, 10.0, 10.0))]),
        centroids(&[(5.0, 5.0)]),
    );
    let before = store.get(&config.land_use_path).unwrap();

    let err = fracimperv::run(&config, &store).unwrap_err();
    assert!(matches!(err, Error::UnknownZone { ref zone, .. } if zone == "999"));
    assert!(err.is_fatal());
    assert!(!store.contains(&config.output_path));
    assert_eq!(store.get(&config.land_use_path).unwrap(), before);
}

#[test]
fn missing_dataset_aborts_before_any_write() {
    let config = config(10.0);
    let store = MemoryStore::new();
    store.insert(&config.basin_path, basins(&[("B1", square(0.0, 0.0, 10.0, 10.0))]));
    store.insert(&config.land_use_path, land_use(&[(1, square(0.0, 0.0, 10.0, 5.0))]));

    let err = fracimperv::run(&config, &store).unwrap_err();
    assert!(matches!(err, Error::DatasetOpen { ref path, .. } if path == Path::new("vectors/centroids.shp")));
    assert!(!store.contains(&config.output_path));
    assert!(store.get(&config.land_use_path).unwrap().field_index("fi").is_none());
}

#[test]
fn integer_fraction_column_on_centroids_aborts_before_any_write() {
    let config = config(10.0);
    let mut points = Layer::new("centroids", GeometryKind::Point, vec![FieldDef::integer("fi")]);
    points.create_feature(Geometry::Point(Point::new(5.0, 5.0)), vec![Value::Integer(0)]).unwrap();
    let store = seed(
        &config,
        basins(&[("B1", square(0.0, 0.0, 10.0, 10.0))]),
        land_use(&[(2, square(0.0, 0.0, 10.0, 10.0))]),
        points,
    );
    let before = store.get(&config.land_use_path).unwrap();

    let err = fracimperv::run(&config, &store).unwrap_err();
    assert!(matches!(err, Error::Schema(ref msg) if msg.contains("'fi'")), "{err:?}");
    assert!(!store.contains(&config.output_path));
    assert_eq!(store.get(&config.land_use_path).unwrap(), before);
}

#[test]
fn failed_commit_reports_written_datasets() {
    let config = config(10.0);
    let store = scenario(&config);
    store.set_read_only(&config.centroid_path);

    match fracimperv::run(&config, &store).unwrap_err() {
        Error::PartialCommit { committed, .. } => {
            assert_eq!(committed, vec![config.output_path.clone(), config.land_use_path.clone()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn dry_run_writes_nothing() {
    let config = config(10.0);
    let store = scenario(&config);
    let report = fracimperv::dry_run(&config, &store).unwrap();
    assert_eq!(report.matched, 1);
    assert!(report.committed.is_empty());
    assert!(!store.contains(&config.output_path));
}

#[test]
fn disjoint_basin_does_not_change_result() {
    let parcels = land_use(&[
        (2, square(0.0, 0.0, 40.0, 40.0)),
        (26, square(40.0, 0.0, 100.0, 100.0)),
        (31, square(500.0, 500.0, 600.0, 600.0)),
    ]);
    let config = config(500.0);

    let alone = seed(&config, basins(&[("A", square(0.0, 0.0, 100.0, 100.0))]), parcels.clone(), centroids(&[]));
    fracimperv::run(&config, &alone).unwrap();

    let together = seed(
        &config,
        basins(&[("A", square(0.0, 0.0, 100.0, 100.0)), ("Far", square(500.0, 500.0, 600.0, 600.0))]),
        parcels,
        centroids(&[]),
    );
    fracimperv::run(&config, &together).unwrap();

    let a = store_row(&alone, &config, 0);
    let b = store_row(&together, &config, 0);
    assert_eq!(a, b);
    assert_eq!(a.0, "2, 26");
    assert!((a.1 - (1600.0 * 0.95 + 6000.0 * 0.5)).abs() < 1e-9);

    fn store_row(store: &MemoryStore, config: &Config, feature: usize) -> (String, f64) {
        let derived = store.get(&config.output_path).unwrap();
        let ids = match &derived.features()[feature].values[1] {
            Value::Text(s) => s.clone(),
            other => panic!("unexpected {other:?}"),
        };
        (ids, real(&derived, feature, "imp_area"))
    }
}

#[test]
fn stamped_fraction_equals_basin_ratio() {
    let config = config(100.0);
    let store = seed(
        &config,
        basins(&[
            ("West", square(0.0, 0.0, 100.0, 100.0)),
            ("East", square(100.0, 0.0, 250.0, 100.0)),
        ]),
        land_use(&[
            (2, square(0.0, 0.0, 60.0, 100.0)),
            (3, square(60.0, 0.0, 180.0, 100.0)),
            (18, square(180.0, 0.0, 250.0, 100.0)),
        ]),
        centroids(&[(50.0, 50.0), (200.0, 50.0), (100.0, 50.0), (400.0, 400.0)]),
    );

    let report = fracimperv::run(&config, &store).unwrap();
    assert_eq!(report.matched, 2);
    assert_eq!(report.unmatched, 2); // one on the shared boundary, one outside

    let derived = store.get(&config.output_path).unwrap();
    let points = store.get(&config.centroid_path).unwrap();
    for (p, point) in points.iter().enumerate() {
        let Some(pt) = point.geometry.as_point() else { unreachable!() };
        for (b, basin) in derived.iter().enumerate() {
            let shape = basin.geometry.as_polygon().unwrap();
            if shape.contains(pt) {
                let expected = real(&derived, b, "imp_area") / shape.unsigned_area();
                assert!((real(&points, p, "fi") - expected).abs() < 1e-12);
            }
        }
    }
    let fi = points.field_index("fi").unwrap();
    assert!(points.features()[2].values[fi].is_null());
    assert!(points.features()[3].values[fi].is_null());
}

#[test]
fn unique_policy_leaves_overlapping_points_alone() {
    let mut config = config(10.0);
    config.containment = ContainmentPolicy::Unique;
    let store = seed(
        &config,
        basins(&[("Outer", square(0.0, 0.0, 10.0, 10.0)), ("Inner", square(4.0, 4.0, 6.0, 6.0))]),
        land_use(&[(2, square(0.0, 0.0, 10.0, 10.0))]),
        centroids(&[(5.0, 5.0), (1.0, 1.0)]),
    );

    let report = fracimperv::run(&config, &store).unwrap();
    assert_eq!((report.matched, report.ambiguous), (1, 1));

    let points = store.get(&config.centroid_path).unwrap();
    let fi = points.field_index("fi").unwrap();
    assert!(points.features()[0].values[fi].is_null());
    assert!((real(&points, 1, "fi") - 0.95).abs() < 1e-12);
}

#[test]
fn reruns_are_stable() {
    let config = config(10.0);
    let store = scenario(&config);
    fracimperv::run(&config, &store).unwrap();
    let first = (store.get(&config.land_use_path), store.get(&config.output_path), store.get(&config.centroid_path));
    fracimperv::run(&config, &store).unwrap();
    let second = (store.get(&config.land_use_path), store.get(&config.output_path), store.get(&config.centroid_path));
    assert_eq!(first, second);
    assert_eq!(store.open_layer(&config.land_use_path).unwrap().fields().len(), 2);
}
