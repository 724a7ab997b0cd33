// ABOUTME: Draws the active session's VT100 screen
// Converts emulator cells into styled ratatui spans, marks the current search match and places the cursor

use crate::session::{Highlight, Session};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

pub struct TerminalViewComponent;

impl TerminalViewComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, session: Option<&Session>, bordered: bool) {
        let inner = if bordered {
            let title = match session {
                Some(session) => format!(" {} ({}) ", session.label, session.viewport),
                None => " No session ".to_string(),
            };
            let block = Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan));
            let inner = block.inner(area);
            frame.render_widget(block, area);
            inner
        } else {
            area
        };

        let Some(session) = session else {
            let hint = Paragraph::new("Alt+T opens a session")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
            frame.render_widget(hint, inner);
            return;
        };

        match session.sink.screen() {
            Some(screen) => {
                let text = Self::screen_to_text(screen, session.sink.highlight());
                frame.render_widget(Paragraph::new(text), inner);
                // Scrolled back to a match, the live cursor is off screen
                if screen.scrollback() == 0
                    && !screen.hide_cursor()
                    && inner.width > 0
                    && inner.height > 0
                {
                    let (row, col) = screen.cursor_position();
                    frame.set_cursor(
                        inner.x + col.min(inner.width - 1),
                        inner.y + row.min(inner.height - 1),
                    );
                }
            }
            None => frame.render_widget(Paragraph::new(session.sink.contents()), inner),
        }
    }

    /// Convert a VT100 screen to ratatui Text, merging runs of equal style.
    ///
    /// `highlight` columns count characters, so wide-character continuation
    /// cells do not advance it.
    pub fn screen_to_text(screen: &vt100::Screen, highlight: Option<Highlight>) -> Text<'static> {
        let (rows, cols) = screen.size();
        let mut lines = Vec::with_capacity(rows as usize);

        for row in 0..rows {
            let mut spans = Vec::new();
            let mut current_style = Style::default();
            let mut current_text = String::new();
            let marked = highlight
                .filter(|h| h.row == row)
                .map(|h| h.col..h.col.saturating_add(h.len));
            let mut char_col: u16 = 0;

            for col in 0..cols {
                let Some(cell) = screen.cell(row, col) else {
                    current_text.push(' ');
                    char_col = char_col.saturating_add(1);
                    continue;
                };
                if cell.is_wide_continuation() {
                    continue;
                }

                let mut cell_style = Self::cell_to_style(cell);
                if marked.as_ref().is_some_and(|range| range.contains(&char_col)) {
                    cell_style = cell_style.fg(Color::Black).bg(Color::Yellow);
                }
                let width = if cell.has_contents() {
                    cell.contents().chars().count().max(1) as u16
                } else {
                    1
                };
                char_col = char_col.saturating_add(width);
                if cell_style != current_style && !current_text.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut current_text), current_style));
                }
                current_style = cell_style;

                if cell.has_contents() {
                    current_text.push_str(&cell.contents());
                } else {
                    current_text.push(' ');
                }
            }

            if !current_text.is_empty() {
                spans.push(Span::styled(current_text, current_style));
            }
            lines.push(Line::from(spans));
        }

        Text::from(lines)
    }

    fn cell_to_style(cell: &vt100::Cell) -> Style {
        let mut style = Style::default();

        style = match cell.fgcolor() {
            vt100::Color::Default => style,
            vt100::Color::Idx(n) => style.fg(Self::ansi_to_ratatui_color(n)),
            vt100::Color::Rgb(r, g, b) => style.fg(Color::Rgb(r, g, b)),
        };
        style = match cell.bgcolor() {
            vt100::Color::Default => style,
            vt100::Color::Idx(n) => style.bg(Self::ansi_to_ratatui_color(n)),
            vt100::Color::Rgb(r, g, b) => style.bg(Color::Rgb(r, g, b)),
        };

        if cell.bold() {
            style = style.add_modifier(Modifier::BOLD);
        }
        if cell.italic() {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if cell.underline() {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        if cell.inverse() {
            style = style.add_modifier(Modifier::REVERSED);
        }
        style
    }

    fn ansi_to_ratatui_color(idx: u8) -> Color {
        match idx {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::Gray,
            8 => Color::DarkGray,
            9 => Color::LightRed,
            10 => Color::LightGreen,
            11 => Color::LightYellow,
            12 => Color::LightBlue,
            13 => Color::LightMagenta,
            14 => Color::LightCyan,
            15 => Color::White,
            // 256-colour palette entries map directly
            n => Color::Indexed(n),
        }
    }
}

impl Default for TerminalViewComponent {
    fn default() -> Self {
        Self::new()
    }
}
