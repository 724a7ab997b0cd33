// ABOUTME: One-line tab strip listing sessions in creation order

use crate::session::SessionRegistry;
use ratatui::{prelude::*, widgets::Tabs};

pub struct TabBarComponent;

impl TabBarComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, sessions: &SessionRegistry) {
        let titles: Vec<Line> = sessions
            .iter()
            .enumerate()
            .map(|(index, session)| Line::from(format!("{}:{}", index + 1, session.label)))
            .collect();
        let selected = sessions
            .active_id()
            .and_then(|id| sessions.iter().position(|session| session.id == id));

        let mut tabs = Tabs::new(titles)
            .style(Style::default().fg(Color::Gray))
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED),
            )
            .divider("|");
        if let Some(selected) = selected {
            tabs = tabs.select(selected);
        }
        frame.render_widget(tabs, area);
    }
}

impl Default for TabBarComponent {
    fn default() -> Self {
        Self::new()
    }
}
