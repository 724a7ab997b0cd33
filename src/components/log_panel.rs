// ABOUTME: Overlay listing the recent timestamped connection log, newest at the bottom

use crate::app::{LogEntry, NoticeLevel};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem},
};

pub struct LogPanelComponent;

impl LogPanelComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render<'a>(
        &self,
        frame: &mut Frame,
        area: Rect,
        entries: impl DoubleEndedIterator<Item = &'a LogEntry> + ExactSizeIterator,
    ) {
        let popup_area = Self::centered_rect(70, 60, area);
        frame.render_widget(Clear, popup_area);

        // Only the newest entries that fit inside the border
        let visible = popup_area.height.saturating_sub(2) as usize;
        let skip = entries.len().saturating_sub(visible);
        let items: Vec<ListItem> = entries.skip(skip).map(Self::item).collect();

        let list = List::new(items).block(
            Block::default()
                .title(" Log - Alt+L to close ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(list, popup_area);
    }

    fn item(entry: &LogEntry) -> ListItem<'static> {
        let color = match entry.level {
            NoticeLevel::Success => Color::Green,
            NoticeLevel::Info => Color::Gray,
            NoticeLevel::Warning => Color::Yellow,
            NoticeLevel::Error => Color::Red,
        };
        ListItem::new(entry.line()).style(Style::default().fg(color))
    }

    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(r);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }
}

impl Default for LogPanelComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Notices;
    use ratatui::{backend::TestBackend, Terminal};

    #[tokio::test]
    async fn shows_the_newest_entries_that_fit() {
        let mut notices = Notices::default();
        for n in 0..30 {
            notices.push(crate::app::Notice::info(format!("event {n}")));
        }

        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.size();
                LogPanelComponent::new().render(frame, area, notices.log());
            })
            .unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("event 29"));
        assert!(!screen.contains("event 0 "));
    }
}
