//! tabterm-vt: terminal engine pieces used around the tab manager.
//!
//! Two small building blocks, both fed raw PTY output:
//!
//! - [`TitleTracker`]: watches the byte stream for OSC window-title
//!   sequences so the transport can report title changes as they happen.
//! - [`Screen`]: a `vt100` screen model the host draws from. Each tab keeps
//!   its own so switching tabs redraws the full screen of the new selection.

pub mod screen;
pub mod title;

pub use screen::Screen;
pub use title::TitleTracker;
