/// Lines of scrollback kept per tab.
pub const SCROLLBACK_LINES: usize = 5_000;

/// Screen model for a single tab, backed by a `vt100` parser.
///
/// The host feeds every output chunk of a session into its `Screen`, whether
/// or not the tab is selected, and redraws from it when the tab is shown.
pub struct Screen {
    parser: vt100::Parser,
    rows: u16,
    cols: u16,
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            parser: vt100::Parser::new(rows, cols, SCROLLBACK_LINES),
            rows,
            cols,
        }
    }

    /// Feed raw PTY output bytes.
    pub fn write(&mut self, bytes: &[u8]) {
        self.parser.process(bytes);
    }

    /// Resize the screen. Contents are dropped; the shell repaints after
    /// it receives the PTY resize.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.parser = vt100::Parser::new(rows, cols, SCROLLBACK_LINES);
        self.rows = rows;
        self.cols = cols;
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Each visible row as bytes ready to be written to a real terminal,
    /// with colours and attributes re-encoded.
    pub fn formatted_rows(&self) -> Vec<Vec<u8>> {
        self.parser.screen().rows_formatted(0, self.cols).collect()
    }

    /// Plain text of each visible row.
    pub fn text_rows(&self) -> Vec<String> {
        self.parser.screen().rows(0, self.cols).collect()
    }

    /// Cursor as `(row, col)`.
    pub fn cursor(&self) -> (u16, u16) {
        self.parser.screen().cursor_position()
    }

    pub fn cursor_visible(&self) -> bool {
        !self.parser.screen().hide_cursor()
    }
}
