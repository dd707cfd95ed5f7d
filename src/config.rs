use std::{collections::{BTreeMap, HashSet}, fs, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use crate::{resolve::ContainmentPolicy, Error, FractionTable, Result};

/// Minimum intersection area (in squared map units) for a parcel to count toward a basin.
pub const DEFAULT_AREA_THRESHOLD: f64 = 500.0;

/// Attribute names read and written by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldNames {
    /// Zone code on land-use parcels.
    pub zone: String,
    /// Fraction impervious written onto land-use parcels.
    pub parcel_fraction: String,
    /// Contributing zone ids on derived basins.
    pub zone_ids: String,
    /// Aggregated impervious area on derived basins.
    pub impervious_area: String,
    /// Fraction impervious written onto centroids.
    pub point_fraction: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            zone: "zone_no".to_string(),
            parcel_fraction: "fi".to_string(),
            zone_ids: "use_id".to_string(),
            impervious_area: "imp_area".to_string(),
            point_fraction: "fi".to_string(),
        }
    }
}

/// Run configuration. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Zone code -> fraction impervious. `None` uses [`FractionTable::standard`].
    pub fraction_table: Option<BTreeMap<String, f64>>,
    pub area_threshold: f64,
    pub basin_path: PathBuf,
    pub land_use_path: PathBuf,
    pub centroid_path: PathBuf,
    pub output_path: PathBuf,
    pub fields: FieldNames,
    pub zone_id_separator: String,
    pub containment: ContainmentPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fraction_table: None,
            area_threshold: DEFAULT_AREA_THRESHOLD,
            basin_path: PathBuf::from("vectors/basin.shp"),
            land_use_path: PathBuf::from("vectors/land_use.shp"),
            centroid_path: PathBuf::from("vectors/centroids.shp"),
            output_path: PathBuf::from("vectors/updated_basin.shp"),
            fields: FieldNames::default(),
            zone_id_separator: ", ".to_string(),
            containment: ContainmentPolicy::default(),
        }
    }
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.area_threshold.is_finite() || self.area_threshold < 0.0 {
            return Err(Error::Config(format!(
                "area_threshold must be a finite, non-negative number (got {})", self.area_threshold
            )));
        }
        if self.zone_id_separator.is_empty() {
            return Err(Error::Config("zone_id_separator must not be empty".to_string()));
        }

        let fields = &self.fields;
        let names = [&fields.zone, &fields.parcel_fraction, &fields.zone_ids, &fields.impervious_area, &fields.point_fraction];
        if let Some(empty) = names.iter().find(|name| name.trim().is_empty()) {
            return Err(Error::Config(format!("field name {empty:?} is empty")));
        }
        if fields.zone == fields.parcel_fraction {
            return Err(Error::Config(format!("zone and fraction fields are both '{}'", fields.zone)));
        }
        if fields.zone_ids == fields.impervious_area {
            return Err(Error::Config(format!("derived basin fields are both '{}'", fields.zone_ids)));
        }

        let paths = [&self.basin_path, &self.land_use_path, &self.centroid_path, &self.output_path];
        let distinct: HashSet<_> = paths.iter().collect();
        if distinct.len() != paths.len() {
            return Err(Error::Config("basin, land use, centroid and output paths must all differ".to_string()));
        }

        if let Some(table) = &self.fraction_table {
            if table.is_empty() {
                return Err(Error::Config("fraction_table is empty".to_string()));
            }
        }
        Ok(())
    }

    /// The fraction table this config selects.
    pub fn fraction_table(&self) -> Result<FractionTable> {
        match &self.fraction_table {
            Some(entries) => FractionTable::new(entries.iter().map(|(zone, fi)| (zone.as_str(), *fi))),
            None => Ok(FractionTable::standard()),
        }
    }
}
