//! Sheet and cell identity.
//!
//! A `CellId` uniquely identifies a cell across all sheets of a model.

use serde::{Deserialize, Serialize};

use crate::zone::{col_to_letters, Position};

/// Stable sheet identifier. Never reused after the sheet is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetId(u64);

impl SheetId {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SheetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for a cell in a model.
///
/// The derived ordering is (sheet, row, col). Every deterministic traversal
/// in the engine breaks ties with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    /// The sheet this cell belongs to
    pub sheet: SheetId,
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl CellId {
    #[inline]
    pub fn new(sheet: SheetId, row: usize, col: usize) -> Self {
        Self { sheet, row, col }
    }

    #[inline]
    pub fn at(sheet: SheetId, position: Position) -> Self {
        Self { sheet, row: position.row, col: position.col }
    }

    #[inline]
    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sheet{}!{}{}", self.sheet.raw(), col_to_letters(self.col), self.row + 1)
    }
}
