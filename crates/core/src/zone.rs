//! Positions, rectangular zones and structural axis changes.

use serde::{Deserialize, Serialize};

/// A cell position inside one sheet (0-based). Ordered row-major.
/// Deserializes from `{"row":0,"col":0}` or an A1 string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PositionRepr")]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style address. `$` markers are accepted and ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut letters = String::new();
        let mut digits = String::new();
        for ch in s.chars() {
            match ch {
                '$' => continue,
                c if c.is_ascii_alphabetic() && digits.is_empty() => letters.push(c.to_ascii_uppercase()),
                c if c.is_ascii_digit() && !letters.is_empty() => digits.push(c),
                _ => return None,
            }
        }
        let col = letters_to_col(&letters)?;
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, col))
    }

    /// Move by a signed offset. Returns `None` when the result leaves the grid.
    pub fn offset(self, d_row: i64, d_col: i64) -> Option<Self> {
        let row = i64::try_from(self.row).ok()?.checked_add(d_row)?;
        let col = i64::try_from(self.col).ok()?.checked_add(d_col)?;
        if row < 0 || col < 0 {
            return None;
        }
        Some(Self::new(row as usize, col as usize))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row.saturating_add(1))
    }
}

/// An inclusive rectangle of cells.
///
/// Deserializes from fields (normalized) or an A1 string such as `"A1:B3"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "ZoneRepr")]
pub struct Zone {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl Zone {
    /// Build a zone from two corners in any order.
    pub fn new(top: usize, left: usize, bottom: usize, right: usize) -> Self {
        Self {
            top: top.min(bottom),
            left: left.min(right),
            bottom: top.max(bottom),
            right: left.max(right),
        }
    }

    pub fn from_positions(a: Position, b: Position) -> Self {
        Self::new(a.row, a.col, b.row, b.col)
    }

    pub fn single(p: Position) -> Self {
        Self::new(p.row, p.col, p.row, p.col)
    }

    /// Parse `"A1:B3"` or `"A1"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once(':') {
            Some((a, b)) => Some(Self::from_positions(Position::parse(a)?, Position::parse(b)?)),
            None => Position::parse(s).map(Self::single),
        }
    }

    #[inline]
    pub fn top_left(&self) -> Position {
        Position::new(self.top, self.left)
    }

    #[inline]
    pub fn bottom_right(&self) -> Position {
        Position::new(self.bottom, self.right)
    }

    /// Saturates at `usize::MAX` for zones spanning the whole index range.
    pub fn rows(&self) -> usize {
        (self.bottom - self.top).saturating_add(1)
    }

    pub fn cols(&self) -> usize {
        (self.right - self.left).saturating_add(1)
    }

    pub fn size(&self) -> usize {
        self.rows().saturating_mul(self.cols())
    }

    pub fn is_single_cell(&self) -> bool {
        self.top == self.bottom && self.left == self.right
    }

    pub fn contains(&self, p: Position) -> bool {
        p.row >= self.top && p.row <= self.bottom && p.col >= self.left && p.col <= self.right
    }

    pub fn contains_zone(&self, other: &Zone) -> bool {
        self.contains(other.top_left()) && self.contains(other.bottom_right())
    }

    pub fn intersects(&self, other: &Zone) -> bool {
        self.top <= other.bottom
            && other.top <= self.bottom
            && self.left <= other.right
            && other.left <= self.right
    }

    /// Smallest zone covering both.
    pub fn union(&self, other: &Zone) -> Zone {
        Zone {
            top: self.top.min(other.top),
            left: self.left.min(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.max(other.right),
        }
    }

    /// Clip to a sheet of `rows` x `cols`. `None` when nothing remains.
    pub fn clamp_to(&self, rows: usize, cols: usize) -> Option<Zone> {
        if rows == 0 || cols == 0 || self.top >= rows || self.left >= cols {
            return None;
        }
        Some(Zone {
            top: self.top,
            left: self.left,
            bottom: self.bottom.min(rows - 1),
            right: self.right.min(cols - 1),
        })
    }

    /// All positions, row-major.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (self.top..=self.bottom)
            .flat_map(move |row| (self.left..=self.right).map(move |col| Position::new(row, col)))
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.top_left())
        } else {
            write!(f, "{}:{}", self.top_left(), self.bottom_right())
        }
    }
}

/// Convert column index to letter(s): 0 -> A, 25 -> Z, 26 -> AA, etc.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col.saturating_add(1);
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// Convert column letters to a 0-based index. Case-insensitive.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let n = letters.chars().try_fold(0usize, |acc, c| {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })?;
    Some(n - 1)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PositionRepr {
    A1(String),
    Fields { row: usize, col: usize },
}

impl TryFrom<PositionRepr> for Position {
    type Error = String;

    fn try_from(repr: PositionRepr) -> Result<Self, Self::Error> {
        match repr {
            PositionRepr::A1(s) => Position::parse(&s).ok_or_else(|| format!("invalid cell address '{}'", s)),
            PositionRepr::Fields { row, col } => Ok(Position::new(row, col)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ZoneRepr {
    A1(String),
    Fields { top: usize, left: usize, bottom: usize, right: usize },
}

impl TryFrom<ZoneRepr> for Zone {
    type Error = String;

    fn try_from(repr: ZoneRepr) -> Result<Self, Self::Error> {
        match repr {
            ZoneRepr::A1(s) => Zone::parse(&s).ok_or_else(|| format!("invalid range '{}'", s)),
            ZoneRepr::Fields { top, left, bottom, right } => Ok(Zone::new(top, left, bottom, right)),
        }
    }
}

/// Which axis a structural change applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Row,
    Col,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Delete,
}

/// Insertion or deletion of `count` rows/columns starting at `start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisChange {
    pub axis: Axis,
    pub kind: ChangeKind,
    pub start: usize,
    pub count: usize,
}

impl AxisChange {
    pub fn insert(axis: Axis, start: usize, count: usize) -> Self {
        Self { axis, kind: ChangeKind::Insert, start, count }
    }

    pub fn delete(axis: Axis, start: usize, count: usize) -> Self {
        Self { axis, kind: ChangeKind::Delete, start, count }
    }

    /// The change that undoes this one.
    pub fn inverse(&self) -> Self {
        let kind = match self.kind {
            ChangeKind::Insert => ChangeKind::Delete,
            ChangeKind::Delete => ChangeKind::Insert,
        };
        Self { kind, ..*self }
    }

    /// Map a single coordinate along the changed axis.
    pub fn map_index(&self, index: usize) -> Option<usize> {
        match self.kind {
            ChangeKind::Insert if index >= self.start => Some(index + self.count),
            ChangeKind::Insert => Some(index),
            ChangeKind::Delete if index < self.start => Some(index),
            ChangeKind::Delete if index < self.start + self.count => None,
            ChangeKind::Delete => Some(index - self.count),
        }
    }

    pub fn map_position(&self, p: Position) -> Option<Position> {
        match self.axis {
            Axis::Row => self.map_index(p.row).map(|row| Position::new(row, p.col)),
            Axis::Col => self.map_index(p.col).map(|col| Position::new(p.row, col)),
        }
    }

    /// Map an inclusive span. Insertions strictly inside the span grow it;
    /// deletions shrink it, and a fully deleted span maps to `None`.
    pub fn map_span(&self, lo: usize, hi: usize) -> Option<(usize, usize)> {
        match self.kind {
            ChangeKind::Insert => {
                if self.start <= lo {
                    Some((lo + self.count, hi + self.count))
                } else if self.start <= hi {
                    Some((lo, hi + self.count))
                } else {
                    Some((lo, hi))
                }
            }
            ChangeKind::Delete => {
                let end = self.start + self.count;
                if lo >= self.start && hi < end {
                    return None;
                }
                let new_lo = if lo < self.start {
                    lo
                } else if lo < end {
                    self.start
                } else {
                    lo - self.count
                };
                let new_hi = if hi < self.start {
                    hi
                } else if hi < end {
                    self.start - 1
                } else {
                    hi - self.count
                };
                Some((new_lo, new_hi))
            }
        }
    }

    pub fn map_zone(&self, z: &Zone) -> Option<Zone> {
        match self.axis {
            Axis::Row => self
                .map_span(z.top, z.bottom)
                .map(|(top, bottom)| Zone { top, bottom, ..*z }),
            Axis::Col => self
                .map_span(z.left, z.right)
                .map(|(left, right)| Zone { left, right, ..*z }),
        }
    }
}
