// ABOUTME: Keyboard handling for the TUI
// Maps key presses to application actions and encodes everything else as terminal input

use crate::app::{App, KeyContext};
use crate::session::{CycleDirection, SearchDirection};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Quit,
    NextSession,
    PreviousSession,
    NewSession,
    CloseSession,
    ClearScreen,
    ToggleFullscreen,
    ExitFullscreen,
    ReconnectNow,
    Disconnect,
    ToggleLog,
    OpenSearch,
    CloseSearch,
    SearchInput(char),
    SearchBackspace,
    SearchNext,
    SearchPrevious,
    /// Bytes to type into the active session
    Input(String),
}

pub struct EventHandler;

impl EventHandler {
    /// Translate a key press.
    ///
    /// Control chords other than Ctrl+Q, Ctrl+K and Ctrl+F go to the remote
    /// shell; session management lives on Alt. While the search bar is open
    /// it takes printable keys and never forwards anything to the shell.
    pub fn handle_key_event(key_event: KeyEvent, ctx: KeyContext) -> Option<AppEvent> {
        let modifiers = key_event.modifiers;

        if ctx.searching {
            if let Some(event) = Self::search_key(key_event) {
                return Some(event);
            }
        }

        if modifiers.contains(KeyModifiers::ALT) {
            match key_event.code {
                KeyCode::Left | KeyCode::Up => return Some(AppEvent::PreviousSession),
                KeyCode::Right | KeyCode::Down => return Some(AppEvent::NextSession),
                KeyCode::Char('t') => return Some(AppEvent::NewSession),
                KeyCode::Char('w') => return Some(AppEvent::CloseSession),
                KeyCode::Char('r') => return Some(AppEvent::ReconnectNow),
                KeyCode::Char('d') => return Some(AppEvent::Disconnect),
                KeyCode::Char('l') => return Some(AppEvent::ToggleLog),
                _ => {}
            }
        }

        if modifiers.contains(KeyModifiers::CONTROL) {
            match key_event.code {
                KeyCode::Char('q') => return Some(AppEvent::Quit),
                KeyCode::Char('k') => return Some(AppEvent::ClearScreen),
                KeyCode::Char('f') => return Some(AppEvent::OpenSearch),
                _ => {}
            }
        }

        match key_event.code {
            KeyCode::F(11) => Some(AppEvent::ToggleFullscreen),
            KeyCode::Esc if ctx.fullscreen => Some(AppEvent::ExitFullscreen),
            _ if ctx.searching => None,
            _ => Self::encode_input(key_event).map(AppEvent::Input),
        }
    }

    fn search_key(key_event: KeyEvent) -> Option<AppEvent> {
        let modifiers = key_event.modifiers;
        match key_event.code {
            KeyCode::Esc => Some(AppEvent::CloseSearch),
            KeyCode::Enter if modifiers.contains(KeyModifiers::SHIFT) => {
                Some(AppEvent::SearchPrevious)
            }
            KeyCode::Enter | KeyCode::Down => Some(AppEvent::SearchNext),
            KeyCode::Up => Some(AppEvent::SearchPrevious),
            KeyCode::Backspace => Some(AppEvent::SearchBackspace),
            KeyCode::Char(c)
                if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                Some(AppEvent::SearchInput(c))
            }
            _ => None,
        }
    }

    pub fn process_event(event: AppEvent, app: &mut App) {
        match event {
            AppEvent::Quit => app.quit(),
            AppEvent::NextSession => {
                app.cycle_sessions(CycleDirection::Next);
            }
            AppEvent::PreviousSession => {
                app.cycle_sessions(CycleDirection::Previous);
            }
            AppEvent::NewSession => {
                app.new_session(None);
            }
            AppEvent::CloseSession => {
                app.close_active_session();
            }
            AppEvent::ClearScreen => {
                app.clear_active();
            }
            AppEvent::ToggleFullscreen => {
                app.toggle_fullscreen();
            }
            AppEvent::ExitFullscreen => {
                app.exit_fullscreen();
            }
            AppEvent::ReconnectNow => {
                // Outcome surfaces through the status bar
                drop(app.reconnect_now());
            }
            AppEvent::Disconnect => app.disconnect(),
            AppEvent::ToggleLog => {
                app.toggle_log();
            }
            AppEvent::OpenSearch => app.open_search(),
            AppEvent::CloseSearch => app.close_search(),
            AppEvent::SearchInput(c) => app.search_push(c),
            AppEvent::SearchBackspace => app.search_pop(),
            AppEvent::SearchNext => {
                app.search_step(SearchDirection::Next);
            }
            AppEvent::SearchPrevious => {
                app.search_step(SearchDirection::Previous);
            }
            AppEvent::Input(data) => {
                app.type_input(&data);
            }
        }
    }

    /// Terminal byte sequence for a key
    pub fn encode_input(key: KeyEvent) -> Option<String> {
        let data = match key.code {
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii() {
                    // Control character
                    ((c as u8 & 0x1f) as char).to_string()
                } else if key.modifiers.contains(KeyModifiers::ALT) {
                    format!("\x1b{c}")
                } else {
                    c.to_string()
                }
            }
            KeyCode::Enter => "\r".to_string(),
            KeyCode::Tab => "\t".to_string(),
            KeyCode::BackTab => "\x1b[Z".to_string(),
            KeyCode::Backspace => "\x7f".to_string(),
            KeyCode::Esc => "\x1b".to_string(),
            KeyCode::Up => "\x1b[A".to_string(),
            KeyCode::Down => "\x1b[B".to_string(),
            KeyCode::Right => "\x1b[C".to_string(),
            KeyCode::Left => "\x1b[D".to_string(),
            KeyCode::Home => "\x1b[H".to_string(),
            KeyCode::End => "\x1b[F".to_string(),
            KeyCode::PageUp => "\x1b[5~".to_string(),
            KeyCode::PageDown => "\x1b[6~".to_string(),
            KeyCode::Delete => "\x1b[3~".to_string(),
            KeyCode::Insert => "\x1b[2~".to_string(),
            KeyCode::F(n) => match n {
                1 => "\x1bOP",
                2 => "\x1bOQ",
                3 => "\x1bOR",
                4 => "\x1bOS",
                5 => "\x1b[15~",
                6 => "\x1b[17~",
                7 => "\x1b[18~",
                8 => "\x1b[19~",
                9 => "\x1b[20~",
                10 => "\x1b[21~",
                12 => "\x1b[24~",
                _ => return None,
            }
            .to_string(),
            _ => return None,
        };
        Some(data)
    }
}
