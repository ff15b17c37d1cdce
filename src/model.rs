use std::path::Path;
use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace};

use crate::domain::{HELP_TEXT, Message, ViewerConfig, ViewerError};
use crate::group::GroupController;
use crate::inputter::{InputResult, Inputter};
use crate::parser;
use crate::source::{TextSource, expand_path, table_id};
use crate::table::{RowState, render, resolve_columns};
use crate::ui::{FRAME_MARGIN, STATUSLINE_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy)]
enum Modus {
    TABLE,
    PROMPT,
    POPUP,
}

/// Position of a selectable row: group, table within the group, row
/// within the table.
type RowRef = (usize, usize, usize);

/// One line of the rendered view. The model flattens every group into
/// this sequence so the UI only has to pad and style.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayLine {
    GroupHeader {
        title: String,
        collapsed: bool,
    },
    ColumnHeader {
        id: String,
        cells: Vec<String>,
        widths: Vec<usize>,
    },
    Row {
        cells: Vec<String>,
        widths: Vec<usize>,
        state: RowState,
        selected: bool,
    },
    Blank,
}

/// Snapshot of everything the UI needs for one frame.
pub struct UIData {
    pub lines: Vec<DisplayLine>,
    pub offset: usize,
    pub layout: UILayout,
    pub show_popup: bool,
    pub popup_message: String,
    pub prompt: Option<InputResult>,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            lines: Vec::new(),
            offset: 0,
            layout: UILayout::default(),
            show_popup: false,
            popup_message: String::new(),
            prompt: None,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(width: usize, height: usize) -> Self {
        let layout = UILayout {
            width,
            height,
            table_height: height.saturating_sub(STATUSLINE_HEIGHT + FRAME_MARGIN),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: ViewerConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    groups: GroupController,
    source: Box<dyn TextSource>,
    curser_row: usize,
    offset_row: usize,
    uilayout: UILayout,
    uidata: UIData,
    input: Inputter,
    last_input: InputResult,
    active_prompt: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &ViewerConfig,
        source: Box<dyn TextSource>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            groups: GroupController::new(),
            source,
            curser_row: 0,
            offset_row: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            input: Inputter::default(),
            last_input: InputResult::default(),
            active_prompt: false,
            status_message: "Started tierview!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.update_uidata();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_prompt
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// The per-file processing boundary. Read, parse, resolve, render,
    /// sort and place one file to completion before the caller moves on
    /// to the next. Every failure is logged and swallowed here: the file
    /// simply produces no table and previously placed tables stay
    /// untouched.
    pub fn open_file(&mut self, path: &Path) {
        match self.build_table(path) {
            Ok(id) => {
                info!("Loaded \"{}\" as table \"{}\"", path.display(), id);
                self.set_status_message(format!("Loaded {}", path.display()));
            }
            Err(e) => {
                error!("Failed to load \"{}\": {:?}", path.display(), e);
                self.set_status_message(format!("Could not load {}", path.display()));
            }
        }
        self.update_uidata();
    }

    fn build_table(&mut self, path: &Path) -> Result<String, ViewerError> {
        let text = self.source.read_text(path)?;
        let records = parser::parse(&text)?;
        let columns = resolve_columns(&records);
        let mut table = render(&records, columns, &table_id(path));
        table.sort_rows()?;
        let id = table.id.clone();
        self.groups.place_table(table)?;
        Ok(id)
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), ViewerError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MovePageUp => self.move_selection_up(self.config.page_step),
                    Message::MovePageDown => self.move_selection_down(self.config.page_step),
                    Message::MoveBeginning => self.move_selection_beginning(),
                    Message::MoveEnd => self.move_selection_end(),
                    Message::PrimaryActivate => self.primary_activate(),
                    Message::SecondaryActivate => self.secondary_activate(),
                    Message::ToggleCollapse => self.toggle_collapse(),
                    Message::ResetHidden => self.reset_hidden(),
                    Message::CopyRow => self.copy_row(),
                    Message::OpenFile => self.enter_prompt(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::PROMPT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key);
                    } else if let Message::Resize(width, height) = msg {
                        self.ui_resize(width, height);
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------- Control handling functions -------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {}
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
            }
            Modus::PROMPT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    fn enter_prompt(&mut self) {
        trace!("Entering open-file prompt ...");
        self.previous_modus = self.modus;
        self.modus = Modus::PROMPT;
        self.active_prompt = true;
        self.input.clear();
        self.last_input = self.input.get();
        self.uidata.prompt = Some(self.last_input.clone());
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_prompt {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_prompt_input();
            }
            self.uidata.prompt = if self.active_prompt {
                Some(self.last_input.clone())
            } else {
                None
            };
        }
    }

    fn handle_prompt_input(&mut self) {
        self.active_prompt = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::PROMPT;

        let result = self.last_input.clone();
        if result.canceled || result.input.is_empty() {
            self.set_status_message("Open canceled");
            return;
        }
        let path = expand_path(&result.input);
        self.open_file(&path);
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.update_uidata();
    }

    // Selectable rows in display order: every non-hidden row of every
    // table of every non-collapsed group.
    fn visible_rows(&self) -> Vec<RowRef> {
        let mut rows = Vec::new();
        for (gidx, group) in self.groups.groups.iter().enumerate() {
            if group.collapsed {
                continue;
            }
            for (tidx, table) in group.tables.iter().enumerate() {
                for (ridx, row) in table.rows.iter().enumerate() {
                    if row.state != RowState::Hidden {
                        rows.push((gidx, tidx, ridx));
                    }
                }
            }
        }
        rows
    }

    fn clamp_curser(&mut self) {
        let nrows = self.visible_rows().len();
        if nrows == 0 {
            self.curser_row = 0;
        } else if self.curser_row >= nrows {
            self.curser_row = nrows - 1;
        }
    }

    fn move_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
        self.update_uidata();
    }

    fn move_selection_down(&mut self, size: usize) {
        let nrows = self.visible_rows().len();
        if nrows > 0 {
            self.curser_row = std::cmp::min(self.curser_row + size, nrows - 1);
        }
        self.update_uidata();
    }

    fn move_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.update_uidata();
    }

    fn move_selection_end(&mut self) {
        let nrows = self.visible_rows().len();
        if nrows > 0 {
            self.curser_row = nrows - 1;
        }
        self.update_uidata();
    }

    fn selected_row(&self) -> Option<RowRef> {
        self.visible_rows().get(self.curser_row).copied()
    }

    fn primary_activate(&mut self) {
        if let Some((gidx, tidx, ridx)) = self.selected_row() {
            let row = &mut self.groups.groups[gidx].tables[tidx].rows[ridx];
            row.state = row.state.primary_activation();
            debug!("Primary activation: row {:?} is now {:?}", (gidx, tidx, ridx), row.state);
            self.clamp_curser();
            self.update_uidata();
        }
    }

    fn secondary_activate(&mut self) {
        if let Some((gidx, tidx, ridx)) = self.selected_row() {
            let row = &mut self.groups.groups[gidx].tables[tidx].rows[ridx];
            row.state = row.state.secondary_activation();
            debug!("Secondary activation: row {:?} is now {:?}", (gidx, tidx, ridx), row.state);
            self.update_uidata();
        }
    }

    fn toggle_collapse(&mut self) {
        let gidx = match self.selected_row() {
            Some((gidx, _, _)) => Some(gidx),
            // With everything collapsed there is no selectable row left;
            // reopen the first group so the user is not locked out.
            None => (!self.groups.groups.is_empty()).then_some(0),
        };
        if let Some(gidx) = gidx {
            self.groups.toggle_collapse(gidx);
            self.clamp_curser();
            self.update_uidata();
        }
    }

    fn reset_hidden(&mut self) {
        let reset = self.groups.reset_hidden();
        self.set_status_message(format!("Restored {} hidden rows", reset));
        self.update_uidata();
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_row(&mut self) {
        let Some((gidx, tidx, ridx)) = self.selected_row() else {
            return;
        };
        let row = &self.groups.groups[gidx].tables[tidx].rows[ridx];
        let content = row
            .cells
            .iter()
            .map(|c| Model::wrap_cell_content(c))
            .collect::<Vec<String>>()
            .join(",");
        trace!("Row content: {}", content);

        match Clipboard::new().and_then(|mut cb| cb.set_text(content)) {
            Ok(_) => self.set_status_message("Copied row to clipboard"),
            Err(e) => {
                trace!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Clipboard not available");
            }
        }
    }

    // ----------------------- UIData construction ----------------------- //

    fn column_widths(&self, columns: &[String], rows: &[crate::table::RenderedRow]) -> Vec<usize> {
        columns
            .iter()
            .enumerate()
            .map(|(cidx, name)| {
                let widest_cell = rows
                    .iter()
                    .map(|r| r.cells[cidx].chars().count())
                    .max()
                    .unwrap_or(0);
                std::cmp::min(
                    std::cmp::max(name.chars().count(), widest_cell),
                    self.config.max_column_width,
                )
            })
            .collect()
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        let mut reduced_name: String = name.chars().take(width).collect();
        if name.chars().count() > width {
            reduced_name.truncate(
                reduced_name
                    .char_indices()
                    .nth(width - 3)
                    .map(|(b, _)| b)
                    .unwrap_or(reduced_name.len()),
            );
            reduced_name.push_str("...");
        }
        reduced_name
    }

    fn update_uidata(&mut self) {
        self.clamp_curser();

        let mut lines = Vec::new();
        let mut selected_line = None;
        let mut visible_ordinal = 0;

        for group in self.groups.groups.iter() {
            let ids = group
                .tables
                .iter()
                .map(|t| t.id.as_str())
                .collect::<Vec<&str>>()
                .join(" / ");
            lines.push(DisplayLine::GroupHeader {
                title: ids,
                collapsed: group.collapsed,
            });
            if group.collapsed {
                lines.push(DisplayLine::Blank);
                continue;
            }

            for table in &group.tables {
                let widths = self.column_widths(&table.columns, &table.rows);
                let header_cells = table
                    .columns
                    .iter()
                    .zip(&widths)
                    .map(|(name, &w)| Self::get_visible_name(name, w))
                    .collect();
                lines.push(DisplayLine::ColumnHeader {
                    id: table.id.clone(),
                    cells: header_cells,
                    widths: widths.clone(),
                });

                for row in &table.rows {
                    if row.state == RowState::Hidden {
                        continue;
                    }
                    let selected = visible_ordinal == self.curser_row;
                    if selected {
                        selected_line = Some(lines.len());
                    }
                    lines.push(DisplayLine::Row {
                        cells: row.cells.clone(),
                        widths: widths.clone(),
                        state: row.state,
                        selected,
                    });
                    visible_ordinal += 1;
                }
                lines.push(DisplayLine::Blank);
            }
        }

        // Scroll so the selected line stays inside the viewport.
        let height = std::cmp::max(self.uilayout.table_height, 1);
        if let Some(line) = selected_line {
            if line < self.offset_row {
                self.offset_row = line;
            } else if line >= self.offset_row + height {
                self.offset_row = line + 1 - height;
            }
        }
        self.offset_row = std::cmp::min(self.offset_row, lines.len().saturating_sub(1));

        self.uidata = UIData {
            lines,
            offset: self.offset_row,
            layout: self.uilayout.clone(),
            show_popup: self.uidata.show_popup,
            popup_message: self.uidata.popup_message.clone(),
            prompt: self.uidata.prompt.clone(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TextSource;
    use pretty_assertions::assert_eq;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::collections::HashMap;
    use std::path::PathBuf;

    // Canned in-memory text source standing in for the filesystem.
    struct StaticSource(HashMap<PathBuf, String>);

    impl TextSource for StaticSource {
        fn read_text(&self, file: &Path) -> Result<String, ViewerError> {
            self.0
                .get(file)
                .cloned()
                .ok_or_else(|| ViewerError::IoError(std::io::Error::other("no such file")))
        }
    }

    const QB: &str = "a,b,c,d,e\r\nv1,v2,v3,v4,b\r\nw1,w2,w3,w4,a\r\n";

    fn model_with(files: &[(&str, &str)]) -> Model {
        let source = StaticSource(
            files
                .iter()
                .map(|(p, t)| (PathBuf::from(p), t.to_string()))
                .collect(),
        );
        let mut model = Model::init(&ViewerConfig::default(), Box::new(source), 80, 24);
        for (path, _) in files {
            model.open_file(Path::new(path));
        }
        model
    }

    fn selected_cells(model: &Model) -> Vec<String> {
        model
            .get_uidata()
            .lines
            .iter()
            .find_map(|l| match l {
                DisplayLine::Row { cells, selected: true, .. } => Some(cells.clone()),
                _ => None,
            })
            .expect("a selected row")
    }

    #[test]
    fn end_to_end_file_becomes_a_sorted_table() {
        let model = model_with(&[("QB01.csv", QB)]);
        assert_eq!(model.groups.groups.len(), 1);

        let table = &model.groups.groups[0].tables[0];
        assert_eq!(table.id, "QB");
        assert_eq!(table.rows.len(), 2);
        // Sorted on the 5th column: "a" before "b".
        assert_eq!(table.rows[0].cells[4], "a");
        assert_eq!(table.rows[1].cells[4], "b");
    }

    #[test]
    fn files_group_pairwise_in_arrival_order() {
        let model = model_with(&[
            ("QB01.csv", QB),
            ("RB01.csv", QB),
            ("WR01.csv", QB),
        ]);
        assert_eq!(model.groups.groups.len(), 2);
        assert_eq!(model.groups.groups[0].tables[0].id, "QB");
        assert_eq!(model.groups.groups[0].tables[1].id, "RB");
        assert_eq!(model.groups.groups[1].tables[0].id, "WR");
    }

    #[test]
    fn read_failure_leaves_existing_groups_untouched() {
        let mut model = model_with(&[("QB01.csv", QB)]);
        model.open_file(Path::new("missing.csv"));
        assert_eq!(model.groups.groups.len(), 1);
        assert_eq!(model.groups.groups[0].tables.len(), 1);
    }

    #[test]
    fn empty_file_produces_no_table() {
        let model = model_with(&[("QB01.csv", "")]);
        assert!(model.groups.groups.is_empty());
    }

    #[test]
    fn narrow_file_fails_sort_and_produces_no_table() {
        let model = model_with(&[("QB01.csv", "a,b\r\n1,2\r\n")]);
        assert!(model.groups.groups.is_empty());
    }

    #[test]
    fn primary_activation_marks_then_hides_the_selected_row() {
        let mut model = model_with(&[("QB01.csv", QB)]);
        assert_eq!(selected_cells(&model)[4], "a");

        model.update(Some(Message::PrimaryActivate)).unwrap();
        let table = &model.groups.groups[0].tables[0];
        assert_eq!(table.rows[0].state, RowState::Marked);

        model.update(Some(Message::PrimaryActivate)).unwrap();
        let table = &model.groups.groups[0].tables[0];
        assert_eq!(table.rows[0].state, RowState::Hidden);
        // Hidden rows stay in the model but leave the visible set.
        assert_eq!(table.rows.len(), 2);
        assert_eq!(model.visible_rows().len(), 1);
        // The cursor lands on the next visible row, never a hidden one.
        assert_eq!(selected_cells(&model)[4], "b");
    }

    #[test]
    fn secondary_activation_restores_a_marked_row() {
        let mut model = model_with(&[("QB01.csv", QB)]);
        model.update(Some(Message::PrimaryActivate)).unwrap();
        model.update(Some(Message::SecondaryActivate)).unwrap();
        assert_eq!(model.groups.groups[0].tables[0].rows[0].state, RowState::Normal);
    }

    #[test]
    fn reset_restores_hidden_rows_across_groups() {
        let mut model = model_with(&[
            ("QB01.csv", QB),
            ("RB01.csv", QB),
            ("WR01.csv", QB),
        ]);
        // Hide the first row of the first table, mark one in the last.
        model.update(Some(Message::PrimaryActivate)).unwrap();
        model.update(Some(Message::PrimaryActivate)).unwrap();
        model.update(Some(Message::MoveEnd)).unwrap();
        model.update(Some(Message::PrimaryActivate)).unwrap();

        model.update(Some(Message::ResetHidden)).unwrap();
        assert_eq!(model.groups.groups[0].tables[0].rows[0].state, RowState::Normal);
        // Marked rows survive the reset.
        let last = model.groups.groups[1].tables[0].rows.last().unwrap();
        assert_eq!(last.state, RowState::Marked);
    }

    #[test]
    fn collapse_removes_group_rows_from_the_visible_set() {
        let mut model = model_with(&[("QB01.csv", QB), ("RB01.csv", QB)]);
        assert_eq!(model.visible_rows().len(), 4);

        model.update(Some(Message::ToggleCollapse)).unwrap();
        assert_eq!(model.visible_rows().len(), 0);

        model.update(Some(Message::ToggleCollapse)).unwrap();
        assert_eq!(model.visible_rows().len(), 4);
    }

    #[test]
    fn open_prompt_feeds_the_same_file_boundary() {
        let mut model = model_with(&[("RB01.csv", QB)]);
        // "RB01.csv" was already loaded once; open it again via the prompt.
        model.update(Some(Message::OpenFile)).unwrap();
        assert!(model.raw_keyevents());
        for c in "RB01.csv".chars() {
            model
                .update(Some(Message::RawKey(KeyEvent::new(
                    KeyCode::Char(c),
                    KeyModifiers::NONE,
                ))))
                .unwrap();
        }
        model
            .update(Some(Message::RawKey(KeyEvent::new(
                KeyCode::Enter,
                KeyModifiers::NONE,
            ))))
            .unwrap();

        assert!(!model.raw_keyevents());
        // Same id twice, still two distinct tables in one group.
        assert_eq!(model.groups.groups[0].tables.len(), 2);
        assert_eq!(model.groups.groups[0].tables[1].id, "RB");
    }

    #[test]
    fn fixture_file_loads_through_the_fs_source() {
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/QB01.csv");
        let mut model = Model::init(
            &ViewerConfig::default(),
            Box::new(crate::source::FsTextSource),
            80,
            24,
        );
        model.open_file(&fixture);

        let table = &model.groups.groups[0].tables[0];
        assert_eq!(table.id, "QB");
        assert_eq!(table.columns, ["name", "team", "bye", "rank", "tier"]);
        // Stable case-insensitive sort on the tier column.
        let tiers: Vec<&str> = table.rows.iter().map(|r| r.cells[4].as_str()).collect();
        assert_eq!(tiers, ["A", "a", "B"]);
    }

    #[test]
    fn csv_cell_wrapping_escapes_delimiters() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(Model::wrap_cell_content("say\"hi\""), "say\"\"hi\"\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(Model::wrap_cell_content("two words"), "\"two words\"");
    }
}
