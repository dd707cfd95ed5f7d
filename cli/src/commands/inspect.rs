use anyhow::{Context, Result};
use fracimperv::store::{GeometryKind, ShapefileStore, VectorStore};

use crate::cli::{Cli, InspectArgs};

pub fn run(_cli: &Cli, args: &InspectArgs) -> Result<()> {
    let layer = ShapefileStore::new().open_layer(&args.dataset)
        .with_context(|| format!("Failed to inspect {}", args.dataset.display()))?;

    let kind = match layer.kind() {
        GeometryKind::Polygon => "Polygon",
        GeometryKind::Point => "Point",
    };
    println!("Layer: {}", layer.name());
    println!("Geometry: {kind}");
    println!("Number of records: {}", layer.len());
    println!("Attribute columns:");
    for field in layer.fields() {
        println!("  - {} ({:?}, {}.{})", field.name, field.kind, field.width, field.decimals);
    }
    Ok(())
}
