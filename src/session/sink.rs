// ABOUTME: Render sink capability behind every terminal session
// EmulatorSink processes ANSI output with a VT100 parser sized to its container

use super::search::{self, SearchDirection, SearchMatch};
use std::fmt;
use tracing::trace;

pub const MIN_ROWS: u16 = 1;
pub const MIN_COLS: u16 = 2;
pub const DEFAULT_SCROLLBACK: usize = 10_000;

/// Terminal geometry in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub rows: u16,
    pub cols: u16,
}

impl Viewport {
    pub const fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Cells of the current search match as laid out on the visible screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub row: u16,
    pub col: u16,
    pub len: u16,
}

/// Called with every chunk of user input typed into a sink
pub type DataCallback = Box<dyn FnMut(&str) + Send>;

/// A surface that displays terminal output and captures user input
pub trait RenderSink: Send {
    /// Attach to a container and take its geometry
    fn open(&mut self, container: Viewport);

    /// Feed remote output
    fn write(&mut self, bytes: &[u8]);

    /// Register the input callback, replacing any previous one
    fn on_data(&mut self, callback: DataCallback);

    /// User typed `data` into this sink
    fn input(&mut self, data: &str);

    fn size(&self) -> Viewport;

    /// Resize to the best fit for `container` and return the new geometry
    fn fit(&mut self, container: Viewport) -> Viewport;

    /// Visible text, one line per row
    fn contents(&self) -> String;

    fn clear(&mut self);

    /// Release the sink. Writes and input after this are ignored.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;

    /// Parsed screen for renderers that draw cells themselves
    fn screen(&self) -> Option<&vt100::Screen> {
        None
    }

    /// Move to the next or previous occurrence of `query` and bring it into view
    fn search(&mut self, _query: &str, _direction: SearchDirection) -> Option<SearchMatch> {
        None
    }

    /// Forget the current match and return to the live screen
    fn clear_search(&mut self) {}

    fn highlight(&self) -> Option<Highlight> {
        None
    }
}

/// VT100 emulator sink used by the TUI
pub struct EmulatorSink {
    parser: vt100::Parser,
    scrollback: usize,
    viewport: Viewport,
    callback: Option<DataCallback>,
    disposed: bool,
    /// Current search match and the scrollback depth it was found at
    found: Option<(SearchMatch, usize)>,
}

impl EmulatorSink {
    pub fn new(scrollback: usize) -> Self {
        let viewport = Viewport::default();
        Self {
            parser: vt100::Parser::new(viewport.rows, viewport.cols, scrollback),
            scrollback,
            viewport,
            callback: None,
            disposed: false,
            found: None,
        }
    }

    /// Scrollback lines followed by the screen rows, oldest first.
    /// Returns the lines and the scrollback depth.
    fn history(&mut self) -> (Vec<String>, usize) {
        let saved = self.parser.screen().scrollback();
        let (rows, cols) = self.parser.screen().size();
        let rows = usize::from(rows);

        self.parser.screen_mut().set_scrollback(usize::MAX);
        let depth = self.parser.screen().scrollback();

        let mut lines = Vec::with_capacity(depth + rows);
        let mut offset = depth;
        loop {
            self.parser.screen_mut().set_scrollback(offset);
            // Scrolled back by `offset`, the top rows are the scrollback lines starting at depth - offset
            let take = if offset == 0 { rows } else { offset.min(rows) };
            lines.extend(self.parser.screen().rows(0, cols).take(take));
            if offset == 0 {
                break;
            }
            offset -= take;
        }

        self.parser.screen_mut().set_scrollback(saved);
        (lines, depth)
    }

    fn best_fit(container: Viewport) -> Viewport {
        Viewport::new(container.rows.max(MIN_ROWS), container.cols.max(MIN_COLS))
    }
}

impl Default for EmulatorSink {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK)
    }
}

impl fmt::Debug for EmulatorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmulatorSink")
            .field("viewport", &self.viewport)
            .field("scrollback", &self.scrollback)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl RenderSink for EmulatorSink {
    fn open(&mut self, container: Viewport) {
        self.fit(container);
    }

    fn write(&mut self, bytes: &[u8]) {
        if self.disposed {
            return;
        }
        trace!("Emulator processing {} bytes of output", bytes.len());
        // New output shifts buffer lines, so the match position no longer holds
        if self.found.take().is_some() {
            self.parser.screen_mut().set_scrollback(0);
        }
        self.parser.process(bytes);
    }

    fn on_data(&mut self, callback: DataCallback) {
        self.callback = Some(callback);
    }

    fn input(&mut self, data: &str) {
        if self.disposed {
            return;
        }
        if let Some(callback) = self.callback.as_mut() {
            callback(data);
        }
    }

    fn size(&self) -> Viewport {
        self.viewport
    }

    fn fit(&mut self, container: Viewport) -> Viewport {
        let fitted = Self::best_fit(container);
        if fitted != self.viewport {
            self.parser.screen_mut().set_size(fitted.rows, fitted.cols);
            self.viewport = fitted;
        }
        fitted
    }

    fn contents(&self) -> String {
        self.parser.screen().contents()
    }

    fn clear(&mut self) {
        self.parser = vt100::Parser::new(self.viewport.rows, self.viewport.cols, self.scrollback);
        self.found = None;
    }

    fn dispose(&mut self) {
        self.callback = None;
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn screen(&self) -> Option<&vt100::Screen> {
        Some(self.parser.screen())
    }

    fn search(&mut self, query: &str, direction: SearchDirection) -> Option<SearchMatch> {
        let (lines, depth) = self.history();
        let current = self.found.map(|(found, _)| found);
        let Some(found) = search::step(&lines, query, current, direction) else {
            self.found = None;
            return None;
        };

        // Put the match on the top row, or show the live screen when it is already there
        self.parser.screen_mut().set_scrollback(depth.saturating_sub(found.line));
        self.found = Some((found, depth));
        Some(found)
    }

    fn clear_search(&mut self) {
        self.found = None;
        self.parser.screen_mut().set_scrollback(0);
    }

    fn highlight(&self) -> Option<Highlight> {
        let (found, depth) = self.found?;
        let top = depth - self.parser.screen().scrollback();
        let row = found.line.checked_sub(top)?;
        let (rows, _) = self.parser.screen().size();
        if row >= usize::from(rows) {
            return None;
        }
        Some(Highlight {
            row: u16::try_from(row).ok()?,
            col: u16::try_from(found.col).ok()?,
            len: u16::try_from(found.len).ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn fit_never_goes_below_minimum() {
        let mut sink = EmulatorSink::default();
        assert_eq!(sink.fit(Viewport::new(0, 0)), Viewport::new(MIN_ROWS, MIN_COLS));
        assert_eq!(sink.fit(Viewport::new(40, 120)), Viewport::new(40, 120));
        assert_eq!(sink.size(), Viewport::new(40, 120));
        assert_eq!(sink.screen().map(|screen| screen.size()), Some((40, 120)));
    }

    #[test]
    fn output_lands_on_screen_until_cleared() {
        let mut sink = EmulatorSink::default();
        sink.open(Viewport::new(5, 20));
        sink.write(b"\x1b[1mhello\x1b[0m world");
        assert!(sink.contents().starts_with("hello world"));

        sink.clear();
        assert_eq!(sink.contents().trim(), "");
        assert_eq!(sink.size(), Viewport::new(5, 20));
    }

    #[test]
    fn input_reaches_the_callback_until_disposed() {
        let typed = Arc::new(Mutex::new(Vec::new()));
        let mut sink = EmulatorSink::default();
        let seen = Arc::clone(&typed);
        sink.on_data(Box::new(move |data| seen.lock().unwrap().push(data.to_string())));

        sink.input("ls\r");
        sink.dispose();
        sink.input("exit\r");
        sink.write(b"ignored");

        assert_eq!(*typed.lock().unwrap(), vec!["ls\r".to_string()]);
        assert!(sink.is_disposed());
        assert_eq!(sink.contents().trim(), "");
    }

    /// Sink with `count` numbered lines, most of them scrolled off a 3-row screen
    fn scrolled_sink(count: usize) -> EmulatorSink {
        let mut sink = EmulatorSink::new(100);
        sink.open(Viewport::new(3, 20));
        let output: Vec<String> = (0..count).map(|n| format!("line {n}")).collect();
        sink.write(output.join("\r\n").as_bytes());
        sink
    }

    #[test]
    fn search_reaches_into_scrollback() {
        let mut sink = scrolled_sink(10);

        let found = sink.search("line 2", SearchDirection::Next);
        assert_eq!(found, Some(SearchMatch { line: 2, col: 0, len: 6 }));
        // The match is scrolled to the top row and highlighted there
        assert!(sink.contents().starts_with("line 2"));
        assert_eq!(sink.highlight(), Some(Highlight { row: 0, col: 0, len: 6 }));

        sink.clear_search();
        assert!(sink.contents().starts_with("line 7"));
        assert_eq!(sink.highlight(), None);
    }

    #[test]
    fn next_and_previous_move_between_matches() {
        let mut sink = scrolled_sink(10);

        let newest = sink.search("line", SearchDirection::Previous);
        assert_eq!(newest.map(|m| m.line), Some(9));
        assert_eq!(sink.highlight().map(|h| h.row), Some(2));

        let older = sink.search("line", SearchDirection::Previous);
        assert_eq!(older.map(|m| m.line), Some(8));

        let newer = sink.search("line", SearchDirection::Next);
        assert_eq!(newer.map(|m| m.line), Some(9));
        // Wraps to the oldest line
        let wrapped = sink.search("line", SearchDirection::Next);
        assert_eq!(wrapped.map(|m| m.line), Some(0));
        assert!(sink.contents().starts_with("line 0"));
    }

    #[test]
    fn missing_text_and_new_output_drop_the_match() {
        let mut sink = scrolled_sink(5);
        assert!(sink.search("line 1", SearchDirection::Next).is_some());
        sink.write(b"\r\nmore");
        assert_eq!(sink.highlight(), None);
        assert_eq!(sink.screen().map(|screen| screen.scrollback()), Some(0));
        assert!(sink.contents().ends_with("more"));

        assert_eq!(sink.search("absent", SearchDirection::Next), None);
        assert_eq!(sink.highlight(), None);
    }
}
