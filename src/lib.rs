#![doc = "Basin impervious-area overlay and centroid stamping"]
mod classify;
mod config;
mod derived;
mod error;
mod geom;
mod overlay;
mod pipeline;
mod resolve;
pub mod store;
mod zone;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use config::{Config, FieldNames, DEFAULT_AREA_THRESHOLD};

#[doc(inline)]
pub use zone::{FractionTable, ZoneCode};

#[doc(inline)]
pub use classify::{classify_layer, ParcelClassifier};

#[doc(inline)]
pub use overlay::{aggregate, aggregate_all, AggregateResult, Parcel, ParcelIndex};

#[doc(inline)]
pub use derived::{build, build_layer, derived_schema};

#[doc(inline)]
pub use resolve::{resolve, resolve_all, BasinIndex, ContainmentPolicy, DerivedBasin, Resolution, ResolveSummary};

#[doc(inline)]
pub use pipeline::{commit, compute, dry_run, run, Outputs, RunReport};
