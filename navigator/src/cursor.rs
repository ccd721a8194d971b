//! Keyboard cursor over the active result list laid out as a grid.
//!
//! The list of length `len` is read row-major with `columns` cells per row.
//! Every arrow key wraps within its row or column instead of stopping at an
//! edge. With `columns == 1` the grid degenerates to a list with up/down
//! cycling and horizontal keys are ignored.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
}

impl FromStr for NavKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" | "arrowup" => Ok(Self::Up),
            "down" | "arrowdown" => Ok(Self::Down),
            "left" | "arrowleft" => Ok(Self::Left),
            "right" | "arrowright" => Ok(Self::Right),
            "enter" | "return" => Ok(Self::Enter),
            "esc" | "escape" => Ok(Self::Escape),
            other => Err(format!("unknown key `{other}`")),
        }
    }
}

impl fmt::Display for NavKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Enter => "enter",
            Self::Escape => "escape",
        };
        f.write_str(name)
    }
}

/// Result of feeding one key to the [`Cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    Moved(usize),
    Commit(usize),
    /// Escape: the caller clears the query.
    Clear,
    Ignored,
}

/// `None` is the unselected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    selected: Option<usize>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Returns whether the selection changed.
    pub fn reset(&mut self) -> bool {
        self.selected.take().is_some()
    }

    /// Drops a selection that no longer fits a list of `len` items.
    pub fn clamp_to(&mut self, len: usize) -> bool {
        match self.selected {
            Some(index) if index >= len => self.reset(),
            _ => false,
        }
    }

    pub fn step(&mut self, key: NavKey, len: usize, columns: usize) -> CursorStep {
        let columns = columns.max(1);
        match key {
            NavKey::Escape => {
                self.selected = None;
                CursorStep::Clear
            }
            NavKey::Enter => match self.selected {
                Some(index) if index < len => CursorStep::Commit(index),
                _ => CursorStep::Ignored,
            },
            NavKey::Left | NavKey::Right if columns == 1 => CursorStep::Ignored,
            _ if len == 0 => CursorStep::Ignored,
            arrow => {
                let next = match self.selected.filter(|index| *index < len) {
                    None => 0,
                    Some(index) => match arrow {
                        NavKey::Down => move_down(index, len, columns),
                        NavKey::Up => move_up(index, len, columns),
                        NavKey::Right => move_right(index, len, columns),
                        NavKey::Left => move_left(index, len, columns),
                        NavKey::Enter | NavKey::Escape => index,
                    },
                };
                self.selected = Some(next);
                CursorStep::Moved(next)
            }
        }
    }
}

/// Next row in the same column, or the top of the column.
pub fn move_down(index: usize, len: usize, columns: usize) -> usize {
    let next = index + columns;
    if next < len { next } else { index % columns }
}

/// Previous row in the same column, or the last populated row of it.
pub fn move_up(index: usize, len: usize, columns: usize) -> usize {
    if index >= columns {
        return index - columns;
    }
    let col = index % columns;
    let target = (len - 1) / columns * columns + col;
    // A short last row may not reach this column.
    if target >= len {
        target - columns
    } else {
        target
    }
}

/// Next cell in the row, or the first cell of the row.
pub fn move_right(index: usize, len: usize, columns: usize) -> usize {
    let row_start = index / columns * columns;
    let col = index % columns;
    if col + 1 < columns && index + 1 < len {
        index + 1
    } else {
        row_start
    }
}

/// Previous cell in the row, or the last populated cell of the row.
pub fn move_left(index: usize, len: usize, columns: usize) -> usize {
    let row_start = index / columns * columns;
    if index > row_start {
        index - 1
    } else {
        (row_start + columns - 1).min(len - 1)
    }
}
