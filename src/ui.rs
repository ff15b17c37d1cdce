use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Clear, Paragraph, Widget},
};

use crate::domain::ViewerConfig;
use crate::model::{DisplayLine, Model, UIData};
use crate::table::RowState;

pub const STATUSLINE_HEIGHT: usize = 1;
// Top and bottom border of the table frame.
pub const FRAME_MARGIN: usize = 2;

pub struct TableUI {
    _config: ViewerConfig,
}

impl TableUI {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            _config: config.clone(),
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_tables(uidata, table_area, frame);
        self.draw_statusline(uidata, status_area, frame);
        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_tables(&self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        let title = Line::from(" tierview ".bold());
        let instructions = Line::from(vec![
            " Mark/Hide ".into(),
            "<Space>".blue().bold(),
            " Restore ".into(),
            "<u>".blue().bold(),
            " Reset ".into(),
            "<r>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);

        let height = area.height.saturating_sub(FRAME_MARGIN as u16) as usize;
        let end = std::cmp::min(uidata.offset + height, uidata.lines.len());
        let visible = uidata
            .lines
            .get(uidata.offset..end)
            .unwrap_or_default()
            .iter()
            .map(Self::style_line)
            .collect::<Vec<Line>>();

        Paragraph::new(Text::from(visible))
            .block(block)
            .render(area, frame.buffer_mut());
    }

    fn style_line(line: &DisplayLine) -> Line<'static> {
        match line {
            DisplayLine::GroupHeader { title, collapsed } => {
                let arrow = if *collapsed { "▸" } else { "▾" };
                Line::from(format!("{arrow} {title}").bold().yellow())
            }
            DisplayLine::ColumnHeader { id, cells, widths } => {
                let mut spans = vec![Span::from(format!("[{id}] ")).bold().cyan()];
                spans.push(Span::from(Self::pad_cells(cells, widths)).bold().underlined());
                Line::from(spans)
            }
            DisplayLine::Row {
                cells,
                widths,
                state,
                selected,
            } => {
                let mut style = match state {
                    RowState::Marked => Style::new().fg(Color::Red),
                    // Hidden rows are filtered out before they reach the UI.
                    RowState::Hidden => Style::new().dim(),
                    RowState::Normal => Style::new(),
                };
                if *selected {
                    style = style.reversed();
                }
                Line::from(Span::styled(
                    format!("     {}", Self::pad_cells(cells, widths)),
                    style,
                ))
            }
            DisplayLine::Blank => Line::from(""),
        }
    }

    fn pad_cells(cells: &[String], widths: &[usize]) -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, &w)| {
                let truncated: String = cell.chars().take(w).collect();
                format!("{truncated:<w$}")
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    fn draw_statusline(&self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        let line = match &uidata.prompt {
            Some(prompt) => Line::from(vec![
                Span::from("Open file: ").bold(),
                Span::from(prompt.input.clone()),
                Span::from("█"),
            ]),
            None => Line::from(uidata.status_message.clone().italic()),
        };
        Paragraph::new(line).render(area, frame.buffer_mut());
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = Self::centered_rect(frame.area(), 60, 80);
        let block = Block::bordered().title(" Help ".bold());
        Clear.render(area, frame.buffer_mut());
        Paragraph::new(uidata.popup_message.clone())
            .block(block)
            .render(area, frame.buffer_mut());
    }

    fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let [_, vertical, _] = Layout::vertical([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .areas(area);
        let [_, horizontal, _] = Layout::horizontal([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .areas(vertical);
        horizontal
    }
}
