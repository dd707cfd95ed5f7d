use anyhow::{Context, Result};
use fracimperv::{store::ShapefileStore, Config, ContainmentPolicy, RunReport};

use crate::cli::{Cli, Containment, RunArgs};

pub fn run(_cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    config.validate().context("Invalid run configuration")?;

    log::info!(
        "[run] basins={} land_use={} centroids={} -> {}",
        config.basin_path.display(),
        config.land_use_path.display(),
        config.centroid_path.display(),
        config.output_path.display()
    );

    let store = ShapefileStore::new();
    let report = if args.dry_run {
        fracimperv::dry_run(&config, &store)
    } else {
        fracimperv::run(&config, &store)
    }
    .context("Impervious-area run failed")?;

    print_report(&report, args.dry_run);
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(path) = &args.basins { config.basin_path = path.clone() }
    if let Some(path) = &args.land_use { config.land_use_path = path.clone() }
    if let Some(path) = &args.centroids { config.centroid_path = path.clone() }
    if let Some(path) = &args.output { config.output_path = path.clone() }
    if let Some(threshold) = args.threshold { config.area_threshold = threshold }
    if let Some(containment) = args.containment {
        config.containment = match containment {
            Containment::FirstMatch => ContainmentPolicy::FirstMatch,
            Containment::Unique => ContainmentPolicy::Unique,
        };
    }
}

fn print_report(report: &RunReport, dry_run: bool) {
    println!("Classified {} parcels, aggregated {} basins", report.parcels, report.basins);
    println!("Centroids: {} of {} stamped", report.matched, report.points);
    if report.unmatched > 0 { println!("  - {} outside every basin", report.unmatched) }
    if report.degenerate > 0 { println!("  - {} inside zero-area basins", report.degenerate) }
    if report.ambiguous > 0 { println!("  - {} inside overlapping basins", report.ambiguous) }

    if dry_run {
        println!("Dry run: nothing written");
    } else {
        for path in &report.committed {
            println!("Wrote {}", path.display());
        }
    }
}
