//! Marker pattern files and the id registry
//!
//! A `.patt` file is the ARToolKit template format: four orientations of the
//! pattern, each stored as three colour planes of an `N x N` grid of 0-255
//! intensities, written as whitespace-separated integers. Loading a file
//! registers it and hands back the numeric id the detector reports for it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::PatternError;

/// Numeric identity of a registered pattern, as reported by the detector.
pub type PatternId = u32;

/// Orientations stored per pattern (0, 90, 180, 270 degrees)
pub const ORIENTATIONS: usize = 4;
/// Colour planes per orientation
pub const CHANNELS: usize = 3;

/// A parsed pattern template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Grid side length (16 for the stock ARToolKit templates)
    pub resolution: usize,
    /// Intensities in file order: orientation, channel, row, column
    pub data: Vec<u8>,
}

impl Pattern {
    /// Parse the text of a `.patt` file. The grid resolution is inferred from
    /// the value count, which must be `4 * 3 * N * N`.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let mut data = Vec::with_capacity(ORIENTATIONS * CHANNELS * 16 * 16);
        for (index, token) in text.split_whitespace().enumerate() {
            let value: i64 = token.parse().map_err(|_| PatternError::NotANumber {
                token: token.to_string(),
            })?;
            let value =
                u8::try_from(value).map_err(|_| PatternError::ValueOutOfRange { index, value })?;
            data.push(value);
        }

        let found = data.len();
        let per_grid = found / (ORIENTATIONS * CHANNELS);
        let resolution = (per_grid as f64).sqrt().round() as usize;
        if found == 0
            || found % (ORIENTATIONS * CHANNELS) != 0
            || resolution * resolution != per_grid
        {
            return Err(PatternError::ValueCount { found });
        }

        Ok(Self { resolution, data })
    }

    /// Read and parse a pattern file from disk
    pub fn from_file(path: &Path) -> Result<Self, PatternError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// One colour plane of one orientation, row-major
    pub fn plane(&self, orientation: usize, channel: usize) -> &[u8] {
        let len = self.resolution * self.resolution;
        let start = (orientation * CHANNELS + channel) * len;
        &self.data[start..start + len]
    }
}

/// Registry of loaded patterns. Ids are assigned sequentially from 0 in load
/// order; loading the same path twice returns the existing id.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    patterns: Vec<Pattern>,
    by_path: HashMap<PathBuf, PatternId>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a pattern file and return its id
    pub fn load(&mut self, path: &Path) -> Result<PatternId, PatternError> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }
        let pattern = Pattern::from_file(path)?;
        let id = self.insert(pattern);
        self.by_path.insert(path.to_path_buf(), id);
        log::info!("Loaded pattern {} as id {}", path.display(), id);
        Ok(id)
    }

    /// Register an already-parsed pattern under a fresh id
    pub fn insert(&mut self, pattern: Pattern) -> PatternId {
        let id = self.patterns.len() as PatternId;
        self.patterns.push(pattern);
        id
    }

    pub fn get(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
