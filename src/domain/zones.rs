//! Zone catalog - the fixed, ordered set of directional zones
//!
//! Crossing labels reported by the upstream analytics stage have the form
//! `<ZONE>-<suffix>` (e.g. `"N-exit"`, `"SE-entry"`). The catalog maps the
//! zone prefix to a stable index used by the crossing matrix.

use crate::error::TransitError;
use serde::Serialize;

/// Separator between the zone prefix and the rest of a crossing label
pub const LABEL_SEPARATOR: char = '-';

/// Default directional zones, in matrix order
pub const DEFAULT_ZONES: [&str; 5] = ["N", "NE", "SE", "SW", "NW"];

/// Index of a zone within its catalog, always in `[0, catalog.len())`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct ZoneIndex(pub usize);

impl std::fmt::Display for ZoneIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered zone labels with a stable label <-> index mapping
///
/// Built once from configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneCatalog {
    labels: Vec<String>,
}

impl Default for ZoneCatalog {
    fn default() -> Self {
        Self { labels: DEFAULT_ZONES.iter().map(|s| s.to_string()).collect() }
    }
}

impl ZoneCatalog {
    /// Build a catalog from an ordered list of labels
    ///
    /// Rejects empty catalogs, empty labels, labels containing the separator
    /// and duplicates, since any of those would make prefix lookup ambiguous.
    pub fn new<I, S>(labels: I) -> Result<Self, TransitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();

        if labels.is_empty() {
            return Err(TransitError::invalid_catalog("no zones configured"));
        }

        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(TransitError::invalid_catalog(format!("zone {} has an empty label", i)));
            }
            if label.contains(LABEL_SEPARATOR) {
                return Err(TransitError::invalid_catalog(format!(
                    "zone label '{}' contains separator '{}'",
                    label, LABEL_SEPARATOR
                )));
            }
            if labels[..i].contains(label) {
                return Err(TransitError::invalid_catalog(format!(
                    "duplicate zone label '{}'",
                    label
                )));
            }
        }

        Ok(Self { labels })
    }

    /// Number of zones (N)
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Look up the index of an exact zone label
    pub fn index_of(&self, label: &str) -> Option<ZoneIndex> {
        self.labels.iter().position(|l| l == label).map(ZoneIndex)
    }

    /// Look up the label for an index
    pub fn label(&self, index: ZoneIndex) -> Option<&str> {
        self.labels.get(index.0).map(String::as_str)
    }

    /// Resolve the zone of a crossing label such as `"NE-exit"`
    ///
    /// The prefix is everything before the first separator; a label without a
    /// separator is treated as a bare zone name.
    pub fn parse_crossing(&self, crossing: &str) -> Result<ZoneIndex, TransitError> {
        let prefix = crossing.split(LABEL_SEPARATOR).next().unwrap_or(crossing);
        self.index_of(prefix)
            .ok_or_else(|| TransitError::UnknownZoneLabel { label: crossing.to_string() })
    }
}
