//! Entry × exit crossing counts

use crate::domain::zones::{ZoneCatalog, ZoneIndex};
use serde::Serialize;
use std::fmt;

/// N×N counter matrix, row = entry zone, column = exit zone
///
/// Counts only ever increase; there is no reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossingMatrix {
    zones: usize,
    cells: Vec<u64>,
}

impl CrossingMatrix {
    pub fn new(zones: usize) -> Self {
        Self { zones, cells: vec![0; zones * zones] }
    }

    pub fn zones(&self) -> usize {
        self.zones
    }

    #[inline]
    pub fn get(&self, entry: ZoneIndex, exit: ZoneIndex) -> u64 {
        self.cells[entry.0 * self.zones + exit.0]
    }

    #[inline]
    pub(crate) fn increment(&mut self, entry: ZoneIndex, exit: ZoneIndex) {
        let cell = &mut self.cells[entry.0 * self.zones + exit.0];
        *cell = cell.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().sum()
    }

    pub fn rows(&self) -> Vec<Vec<u64>> {
        self.cells.chunks(self.zones.max(1)).map(<[u64]>::to_vec).collect()
    }

    pub fn view(&self, catalog: &ZoneCatalog) -> CrossingMatrixView {
        CrossingMatrixView { zones: catalog.labels().to_vec(), counts: self.rows() }
    }
}

/// Detached copy of the matrix with row/column labels
///
/// `Display` renders the textual report; `Serialize` gives the published form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossingMatrixView {
    pub zones: Vec<String>,
    /// `counts[entry][exit]`
    pub counts: Vec<Vec<u64>>,
}

impl CrossingMatrixView {
    /// Count for a labelled (entry, exit) pair
    pub fn get(&self, entry: &str, exit: &str) -> Option<u64> {
        let row = self.zones.iter().position(|z| z == entry)?;
        let col = self.zones.iter().position(|z| z == exit)?;
        Some(self.counts[row][col])
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}

impl fmt::Display for CrossingMatrixView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self.zones.iter().map(String::len).max().unwrap_or(0);
        let cell_width = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .chain(self.zones.iter().map(String::len))
            .max()
            .unwrap_or(1);

        write!(f, "{:label_width$}", "")?;
        for zone in &self.zones {
            write!(f, " {:>cell_width$}", zone)?;
        }
        writeln!(f)?;

        for (zone, row) in self.zones.iter().zip(&self.counts) {
            write!(f, "{:label_width$}", zone)?;
            for count in row {
                write!(f, " {:>cell_width$}", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
