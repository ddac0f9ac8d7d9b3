//! Shared coordinate types for the cellgrid workspace.

pub mod cell_id;
pub mod zone;

pub use cell_id::{CellId, SheetId};
pub use zone::{col_to_letters, letters_to_col, Axis, AxisChange, ChangeKind, Position, Zone};
