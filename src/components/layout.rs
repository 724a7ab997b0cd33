// ABOUTME: Main layout: tab bar, bordered terminal and status bar, or the bare terminal in fullscreen
// Row and column reservations here must match the chrome the resize notifier subtracts
// The search bar and log panel are overlays so they never change the terminal's size

use super::{LogPanelComponent, StatusBarComponent, TabBarComponent, TerminalViewComponent};
use crate::app::App;
use ratatui::prelude::*;

pub struct LayoutComponent {
    tab_bar: TabBarComponent,
    terminal: TerminalViewComponent,
    status_bar: StatusBarComponent,
    log_panel: LogPanelComponent,
}

impl LayoutComponent {
    pub fn new() -> Self {
        Self {
            tab_bar: TabBarComponent::new(),
            terminal: TerminalViewComponent::new(),
            status_bar: StatusBarComponent::new(),
            log_panel: LogPanelComponent::new(),
        }
    }

    pub fn render(&mut self, frame: &mut Frame, app: &App) {
        let area = frame.size();

        if app.is_fullscreen() {
            self.terminal
                .render(frame, area, app.sessions.active(), false);
            if let Some(search) = app.search() {
                let last_row = Rect {
                    y: area.bottom().saturating_sub(1),
                    height: area.height.min(1),
                    ..area
                };
                self.status_bar.render_search(frame, last_row, search);
            }
            self.render_log(frame, area, app);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Tab bar
                Constraint::Min(0),    // Terminal
                Constraint::Length(1), // Status bar
            ])
            .split(area);

        self.tab_bar.render(frame, chunks[0], &app.sessions);
        self.terminal
            .render(frame, chunks[1], app.sessions.active(), true);
        match app.search() {
            Some(search) => self.status_bar.render_search(frame, chunks[2], search),
            None => self
                .status_bar
                .render(frame, chunks[2], &app.status(), app.notices.latest()),
        }
        self.render_log(frame, area, app);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect, app: &App) {
        if app.is_log_visible() {
            self.log_panel.render(frame, area, app.notices.log());
        }
    }
}

impl Default for LayoutComponent {
    fn default() -> Self {
        Self::new()
    }
}
