use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

// Crate wide error type. Every failure a file can produce on its way to
// becoming a table ends up as one of these variants; all of them are
// absorbed at the per-file processing boundary in the model.
#[derive(Debug)]
pub enum ViewerError {
    IoError(Error),
    // Input text was empty, no header line available.
    MalformedInput(String),
    // Sort requested on a table with fewer columns than the sort key needs.
    ColumnBounds { columns: usize, required: usize },
    // Group placement counter and group list disagree. Caller sequencing bug.
    InvariantViolation(String),
}

impl From<Error> for ViewerError {
    fn from(err: Error) -> Self {
        ViewerError::IoError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct ViewerConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub page_step: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 32,
            page_step: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    PrimaryActivate,
    SecondaryActivate,
    ToggleCollapse,
    ResetHidden,
    CopyRow,
    OpenFile,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "tierview key bindings

  Up/k, Down/j     move row selection
  PgUp, PgDn       move selection by a page
  Home, End        jump to first / last row
  Space, Enter     mark selected row; mark again to hide it
  u                restore selected row to normal
  c                collapse / expand the selected row's group
  r                reset all hidden rows everywhere
  y                copy selected row as CSV to the clipboard
  o                open another CSV file
  ?                this help
  Esc              close help / cancel prompt
  q                quit
";
