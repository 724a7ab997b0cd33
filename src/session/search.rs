// ABOUTME: Text search over a terminal's scrollback and screen lines
// Finds the next or previous occurrence relative to the current match, wrapping at either end

/// Which way to move from the current match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// Towards newer output
    Next,
    /// Towards older output
    Previous,
}

/// One occurrence, in buffer coordinates.
///
/// `line` counts from the oldest scrollback line, `col` and `len` are in
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchMatch {
    pub line: usize,
    pub col: usize,
    pub len: usize,
}

/// Every case-insensitive occurrence of `query`, oldest first
pub fn find_all(lines: &[String], query: &str) -> Vec<SearchMatch> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let len = needle.chars().count();

    let mut found = Vec::new();
    for (line, text) in lines.iter().enumerate() {
        let haystack = text.to_lowercase();
        let mut from = 0;
        while let Some(offset) = haystack[from..].find(&needle) {
            let start = from + offset;
            found.push(SearchMatch {
                line,
                col: haystack[..start].chars().count(),
                len,
            });
            // Step one character so overlapping occurrences are found too
            from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
        }
    }
    found
}

/// The occurrence after (or before) `current`, wrapping around.
///
/// Without a current match, `Next` starts at the oldest line and
/// `Previous` at the newest.
pub fn step(
    lines: &[String],
    query: &str,
    current: Option<SearchMatch>,
    direction: SearchDirection,
) -> Option<SearchMatch> {
    let matches = find_all(lines, query);
    let position = |m: &SearchMatch| (m.line, m.col);

    match (direction, current) {
        (SearchDirection::Next, Some(current)) => matches
            .iter()
            .find(|m| position(m) > position(&current))
            .or_else(|| matches.first())
            .copied(),
        (SearchDirection::Next, None) => matches.first().copied(),
        (SearchDirection::Previous, Some(current)) => matches
            .iter()
            .rev()
            .find(|m| position(m) < position(&current))
            .or_else(|| matches.last())
            .copied(),
        (SearchDirection::Previous, None) => matches.last().copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|line| line.to_string()).collect()
    }

    fn at(line: usize, col: usize, len: usize) -> SearchMatch {
        SearchMatch { line, col, len }
    }

    #[test]
    fn finds_every_occurrence_ignoring_case() {
        let buffer = lines(&["error: disk", "ok", "Error again, ERROR"]);
        assert_eq!(
            find_all(&buffer, "error"),
            vec![at(0, 0, 5), at(2, 0, 5), at(2, 13, 5)]
        );
        assert!(find_all(&buffer, "").is_empty());
    }

    #[test]
    fn next_walks_forward_and_wraps() {
        let buffer = lines(&["a x", "x", "b x"]);
        let first = step(&buffer, "x", None, SearchDirection::Next);
        assert_eq!(first, Some(at(0, 2, 1)));
        let second = step(&buffer, "x", first, SearchDirection::Next);
        assert_eq!(second, Some(at(1, 0, 1)));
        let third = step(&buffer, "x", second, SearchDirection::Next);
        assert_eq!(third, Some(at(2, 2, 1)));
        assert_eq!(step(&buffer, "x", third, SearchDirection::Next), first);
    }

    #[test]
    fn previous_walks_backward_and_wraps() {
        let buffer = lines(&["x1", "x2", "x3"]);
        let newest = step(&buffer, "x", None, SearchDirection::Previous);
        assert_eq!(newest, Some(at(2, 0, 1)));
        let older = step(&buffer, "x", newest, SearchDirection::Previous);
        assert_eq!(older, Some(at(1, 0, 1)));
        let oldest = step(&buffer, "x", older, SearchDirection::Previous);
        assert_eq!(
            step(&buffer, "x", oldest, SearchDirection::Previous),
            newest
        );
    }

    #[test]
    fn columns_count_characters_not_bytes() {
        let buffer = lines(&["café latte"]);
        assert_eq!(find_all(&buffer, "latte"), vec![at(0, 5, 5)]);
    }

    #[test]
    fn no_occurrence_is_none() {
        let buffer = lines(&["nothing here"]);
        assert_eq!(step(&buffer, "missing", None, SearchDirection::Next), None);
    }
}
