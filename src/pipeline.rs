//! End-to-end run: classify parcels, aggregate basins, build derived basins,
//! stamp centroids, then write everything.

use std::path::{Path, PathBuf};

use log::info;

use crate::{
    classify::classify_layer,
    config::Config,
    derived::build_layer,
    overlay::{aggregate_all, ParcelIndex},
    resolve::{resolve_all, BasinIndex, ResolveSummary},
    store::{Layer, VectorStore},
    Error, Result,
};

/// Everything a run computes, held in memory until committed.
#[derive(Debug)]
pub struct Outputs {
    pub land_use: Layer,
    pub derived: Layer,
    pub centroids: Layer,
    pub summary: ResolveSummary,
}

/// What a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    pub parcels: usize,
    pub basins: usize,
    pub points: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub degenerate: usize,
    pub ambiguous: usize,
    pub committed: Vec<PathBuf>,
}

impl RunReport {
    fn new(outputs: &Outputs) -> Self {
        let summary = &outputs.summary;
        Self {
            parcels: outputs.land_use.len(),
            basins: outputs.derived.len(),
            points: outputs.centroids.len(),
            matched: summary.matched,
            unmatched: summary.unmatched(),
            degenerate: summary.degenerate(),
            ambiguous: summary.ambiguous(),
            committed: Vec::new(),
        }
    }
}

/// Run every phase without writing anything.
///
/// All three inputs are opened before any computation, and every fatal error
/// (missing dataset, unknown zone, schema clash) surfaces here.
pub fn compute(config: &Config, store: &dyn VectorStore) -> Result<Outputs> {
    config.validate()?;
    let table = config.fraction_table()?;
    let fields = &config.fields;

    let basins = store.open_layer(&config.basin_path)?;
    let land_use = store.open_layer(&config.land_use_path)?;
    let centroids = store.open_layer(&config.centroid_path)?;
    info!(
        "[run] {} basins, {} parcels, {} centroids; threshold {}",
        basins.len(), land_use.len(), centroids.len(), config.area_threshold
    );

    let land_use = classify_layer(&table, land_use, &fields.zone, &fields.parcel_fraction)?;

    let parcels = ParcelIndex::from_layer(&land_use, &fields.zone, &fields.parcel_fraction)?;
    let results = aggregate_all(&basins, &parcels, config.area_threshold)?;

    let derived = build_layer(&output_name(&config.output_path), &basins, &results, fields, &config.zone_id_separator)?;

    let index = BasinIndex::from_layer(&derived, &fields.impervious_area)?;
    let (centroids, summary) = resolve_all(centroids, &index, &fields.point_fraction, config.containment)?;

    Ok(Outputs { land_use, derived, centroids, summary })
}

/// Write the outputs: the new derived basin dataset first, then the in-place
/// updates. If a later write fails, the error lists what was already written.
pub fn commit(config: &Config, store: &dyn VectorStore, outputs: &Outputs) -> Result<Vec<PathBuf>> {
    let writes = [
        (&config.output_path, &outputs.derived),
        (&config.land_use_path, &outputs.land_use),
        (&config.centroid_path, &outputs.centroids),
    ];

    let mut committed = Vec::with_capacity(writes.len());
    for (path, layer) in writes {
        if let Err(source) = store.write_layer(path, layer) {
            if committed.is_empty() { return Err(source) }
            return Err(Error::PartialCommit { committed, source: Box::new(source) });
        }
        info!("[run] wrote {}", path.display());
        committed.push(path.clone());
    }
    Ok(committed)
}

/// Compute and commit.
pub fn run(config: &Config, store: &dyn VectorStore) -> Result<RunReport> {
    let outputs = compute(config, store)?;
    let mut report = RunReport::new(&outputs);
    report.committed = commit(config, store, &outputs)?;
    Ok(report)
}

/// Compute only, reporting what a run would do.
pub fn dry_run(config: &Config, store: &dyn VectorStore) -> Result<RunReport> {
    let outputs = compute(config, store)?;
    Ok(RunReport::new(&outputs))
}

fn output_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "updated_basin".to_string())
}
