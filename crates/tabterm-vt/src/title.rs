use vte::{Parser, Perform};

/// Scans PTY output for OSC 0 / OSC 2 (set window title) sequences.
///
/// The parser state survives across `feed` calls, so a sequence split over
/// two reads is still recognised.
pub struct TitleTracker {
    parser: Parser,
    sink: TitleSink,
}

#[derive(Default)]
struct TitleSink {
    pending: Option<String>,
}

impl Perform for TitleSink {
    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some((&kind, rest)) = params.split_first() else {
            return;
        };

        // OSC 1 only sets the icon name.
        if kind != b"0" && kind != b"2" {
            return;
        }

        // The title itself may contain ';', which the parser splits on.
        let title = rest
            .iter()
            .map(|part| String::from_utf8_lossy(part))
            .collect::<Vec<_>>()
            .join(";");
        self.pending = Some(title);
    }
}

impl TitleTracker {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            sink: TitleSink::default(),
        }
    }

    /// Feed a chunk of PTY output.
    ///
    /// Returns the last title set within the chunk, if any.
    pub fn feed(&mut self, bytes: &[u8]) -> Option<String> {
        self.parser.advance(&mut self.sink, bytes);
        self.sink.pending.take()
    }
}

impl Default for TitleTracker {
    fn default() -> Self {
        Self::new()
    }
}
