// ABOUTME: Bottom status line with connection state, latency, reconnect countdown and the latest notice
// Turns into the search bar while a search is open

use crate::app::{Notice, NoticeLevel, SearchState};
use crate::transport::{ConnectionState, ConnectionStatus};
use ratatui::{prelude::*, widgets::Paragraph};

pub struct StatusBarComponent;

impl StatusBarComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        status: &ConnectionStatus,
        notice: Option<&Notice>,
    ) {
        frame.render_widget(Paragraph::new(Self::status_line(status, notice)), area);
    }

    pub fn render_search(&self, frame: &mut Frame, area: Rect, search: &SearchState) {
        frame.render_widget(Paragraph::new(Self::search_line(search)), area);
    }

    pub fn search_line(search: &SearchState) -> Line<'static> {
        let mut spans = vec![
            Span::styled(" Find: ", Style::default().fg(Color::Yellow)),
            Span::raw(search.query.clone()),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
        ];
        if search.missed {
            spans.push(Span::styled("  no matches", Style::default().fg(Color::Red)));
        } else if let Some(found) = search.found {
            spans.push(Span::styled(
                format!("  line {}", found.line + 1),
                Style::default().fg(Color::DarkGray),
            ));
        }
        spans.push(Span::styled(
            "  Enter next · Shift+Enter previous · Esc close",
            Style::default().fg(Color::DarkGray),
        ));
        Line::from(spans)
    }

    pub fn status_line(status: &ConnectionStatus, notice: Option<&Notice>) -> Line<'static> {
        let state_color = match status.state {
            ConnectionState::Open => Color::Green,
            ConnectionState::Connecting | ConnectionState::Reconnecting => Color::Yellow,
            ConnectionState::Failed => Color::Red,
            ConnectionState::Idle => Color::DarkGray,
        };

        let mut state_text = format!(" ● {}", status.state.label());
        if let Some(seconds) = status.reconnect_in {
            state_text.push_str(&format!(" in {seconds}s"));
        }

        let mut spans = vec![
            Span::styled(state_text, Style::default().fg(state_color)),
            Span::raw("  "),
            Span::styled(status.latency.to_string(), Style::default().fg(Color::Cyan)),
        ];

        if status.reconnect_attempts > 0 {
            spans.push(Span::styled(
                format!("  attempt {}", status.reconnect_attempts),
                Style::default().fg(Color::DarkGray),
            ));
        }

        if let Some(notice) = notice {
            let color = match notice.level {
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Info => Color::Blue,
                NoticeLevel::Warning => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            spans.push(Span::raw("  "));
            spans.push(Span::styled(notice.message.clone(), Style::default().fg(color)));
        } else if let Some(error) = &status.last_error {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(error.clone(), Style::default().fg(Color::Red)));
        }

        Line::from(spans)
    }
}

impl Default for StatusBarComponent {
    fn default() -> Self {
        Self::new()
    }
}
