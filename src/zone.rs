use std::{collections::BTreeMap, fmt, sync::Arc};

use ahash::AHashMap;
use log::warn;
use crate::{store::Value, Error, Result};

/// Land-use zone identifier, kept in its normalized text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneCode(Arc<str>);

impl ZoneCode {
    pub fn new(code: &str) -> Self {
        Self(Arc::from(code.trim()))
    }

    /// Normalize an attribute value to a zone code: integral numbers lose their
    /// fractional part (`1.0` -> `"1"`), text is trimmed. Nulls and empty text
    /// have no zone.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) if !s.trim().is_empty() => Some(Self::new(s)),
            Value::Integer(i) => Some(Self::new(&i.to_string())),
            Value::Real(x) if x.is_finite() && x.fract() == 0.0 => Some(Self::new(&format!("{x:.0}"))),
            Value::Real(x) if x.is_finite() => Some(Self::new(&x.to_string())),
            _ => None,
        }
    }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ZoneCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ZoneCode {
    fn from(code: &str) -> Self { Self::new(code) }
}

/// Immutable mapping from zone code to fraction impervious.
#[derive(Debug, Clone, PartialEq)]
pub struct FractionTable {
    fractions: AHashMap<ZoneCode, f64>,
}

impl FractionTable {
    /// Build a table from `(zone, fraction)` pairs. Fractions outside [0, 1] are
    /// accepted but logged; non-finite fractions are rejected.
    pub fn new<I, Z>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Z, f64)>,
        Z: Into<ZoneCode>,
    {
        let mut fractions = AHashMap::new();
        for (zone, fi) in entries {
            let zone = zone.into();
            if !fi.is_finite() {
                return Err(Error::Config(format!("fraction for zone '{zone}' is not finite")));
            }
            if !(0.0..=1.0).contains(&fi) {
                warn!("[table] zone '{zone}' has fraction {fi}, outside [0, 1]");
            }
            if fractions.insert(zone.clone(), fi).is_some() {
                return Err(Error::Config(format!("zone '{zone}' appears twice in the fraction table")));
            }
        }
        Ok(Self { fractions })
    }

    /// The zone table the drainage model has shipped with.
    pub fn standard() -> Self {
        const ZONES: [(&str, f64); 11] = [
            ("1", 0.02),
            ("2", 0.95),
            ("3", 0.05),
            ("11", 0.05),
            ("18", 0.9),
            ("20", 0.0),
            ("22", 0.0),
            ("26", 0.5),
            ("28", 0.05),
            ("29", 0.0),
            ("31", 0.9), // commercial
        ];
        Self {
            fractions: ZONES.iter().map(|&(zone, fi)| (ZoneCode::new(zone), fi)).collect(),
        }
    }

    /// Fraction impervious for `zone`; `feature` is only used to label the error.
    pub fn lookup(&self, zone: &ZoneCode, feature: usize) -> Result<f64> {
        self.fractions.get(zone).copied().ok_or_else(|| Error::UnknownZone {
            zone: zone.to_string(),
            feature,
        })
    }

    #[inline] pub fn contains(&self, zone: &ZoneCode) -> bool { self.fractions.contains_key(zone) }

    #[inline] pub fn len(&self) -> usize { self.fractions.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.fractions.is_empty() }

    /// Entries ordered by zone code, for display and serialization.
    pub fn sorted(&self) -> BTreeMap<ZoneCode, f64> {
        self.fractions.iter().map(|(zone, fi)| (zone.clone(), *fi)).collect()
    }
}

impl Default for FractionTable {
    fn default() -> Self { Self::standard() }
}
