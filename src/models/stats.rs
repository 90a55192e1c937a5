//! Base stats: the five-slot stat vector and the read-only table loaded from CSV.

use crate::models::contestant::ContestantId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of stat slots per contestant.
pub const STAT_SLOTS: usize = 5;

/// Value a modifier raises a stat slot to.
pub const MAX_STAT: u32 = 10;

/// First contestant id; row `n` of the stat file belongs to id `FIRST_ID + n`.
pub const FIRST_ID: ContestantId = 1;

/// Hit points, attack, defense, intellect, special.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct StatVector(pub [u32; STAT_SLOTS]);

impl StatVector {
    pub fn new(hp: u32, attack: u32, defense: u32, intellect: u32, special: u32) -> Self {
        Self([hp, attack, defense, intellect, special])
    }

    pub fn hp(&self) -> u32 {
        self.0[0]
    }

    pub fn attack(&self) -> u32 {
        self.0[1]
    }

    pub fn defense(&self) -> u32 {
        self.0[2]
    }

    pub fn intellect(&self) -> u32 {
        self.0[3]
    }

    pub fn special(&self) -> u32 {
        self.0[4]
    }

    /// Total power: sum of all slots.
    pub fn power(&self) -> u64 {
        self.0.iter().map(|&v| u64::from(v)).sum()
    }

    pub fn set_slot(&mut self, slot: usize, value: u32) {
        if let Some(s) = self.0.get_mut(slot) {
            *s = value;
        }
    }

    pub fn maximize(&mut self) {
        self.0 = [MAX_STAT; STAT_SLOTS];
    }
}

/// Errors loading the stat table. All of them are fatal at startup.
#[derive(Debug)]
pub enum StatTableError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// A row did not have exactly five columns.
    ColumnCount { row: usize, found: usize },
    /// A column was not a non-negative integer.
    InvalidValue { row: usize, column: usize, value: String },
    /// The file contained no rows.
    Empty,
}

impl std::fmt::Display for StatTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatTableError::Io(e) => write!(f, "Cannot read stat table: {}", e),
            StatTableError::Csv(e) => write!(f, "Malformed stat table: {}", e),
            StatTableError::ColumnCount { row, found } => {
                write!(f, "Stat row {} has {} columns, expected {}", row, found, STAT_SLOTS)
            }
            StatTableError::InvalidValue { row, column, value } => {
                write!(f, "Stat row {} column {} is not a stat value: {:?}", row, column, value)
            }
            StatTableError::Empty => write!(f, "Stat table has no rows"),
        }
    }
}

impl std::error::Error for StatTableError {}

impl From<std::io::Error> for StatTableError {
    fn from(e: std::io::Error) -> Self {
        StatTableError::Io(e)
    }
}

impl From<csv::Error> for StatTableError {
    fn from(e: csv::Error) -> Self {
        StatTableError::Csv(e)
    }
}

/// Immutable base stats for the whole population, indexed by contestant id.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StatTable {
    rows: Vec<StatVector>,
}

impl StatTable {
    pub fn from_rows(rows: Vec<StatVector>) -> Self {
        Self { rows }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StatTableError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse headerless `hp,attack,defense,intellect,special` rows.
    pub fn from_reader(reader: impl Read) -> Result<Self, StatTableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let record = record?;
            let row = i + 1;
            if record.len() != STAT_SLOTS {
                return Err(StatTableError::ColumnCount {
                    row,
                    found: record.len(),
                });
            }
            let mut stats = [0u32; STAT_SLOTS];
            for (column, field) in record.iter().enumerate() {
                stats[column] = field.parse().map_err(|_| StatTableError::InvalidValue {
                    row,
                    column: column + 1,
                    value: field.to_string(),
                })?;
            }
            rows.push(StatVector(stats));
        }

        if rows.is_empty() {
            return Err(StatTableError::Empty);
        }
        Ok(Self { rows })
    }

    pub fn get(&self, id: ContestantId) -> Option<StatVector> {
        let index = id.checked_sub(FIRST_ID)? as usize;
        self.rows.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every id with a stat row, ascending.
    pub fn ids(&self) -> impl Iterator<Item = ContestantId> + '_ {
        (0..self.rows.len()).map(|i| FIRST_ID + i as ContestantId)
    }
}
