// ABOUTME: UI components for the TUI: tab bar, terminal view, status and search bar, log panel and the layout tying them together

pub mod layout;
pub mod log_panel;
pub mod status_bar;
pub mod tab_bar;
pub mod terminal_view;

pub use layout::LayoutComponent;
pub use log_panel::LogPanelComponent;
pub use status_bar::StatusBarComponent;
pub use tab_bar::TabBarComponent;
pub use terminal_view::TerminalViewComponent;
