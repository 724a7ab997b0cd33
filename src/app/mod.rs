// ABOUTME: Application root, keyboard handling and user notices for the TUI

pub mod events;
pub mod notification;
pub mod state;

pub use events::{AppEvent, EventHandler};
pub use notification::{LogEntry, Notice, NoticeLevel, Notices};
pub use state::{App, AppMessage, KeyContext, SearchState};
