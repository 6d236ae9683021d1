//! The host's picture of the tabs, and drawing it.
//!
//! `View` mirrors the manager's tab list from [`UiEvent`]s and keeps a
//! [`Screen`] per tab. Row 0 is the tab bar; the selected tab's screen fills
//! the rows below it.

use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use crossterm::queue;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use tabterm_core::{TabEvent, UiEvent};
use tabterm_pty::SessionId;
use tabterm_vt::Screen;

/// Label for a tab whose shell has not set a title.
const UNTITLED: &str = "shell";

/// Drawn at the end of every tab label; clicking it closes the tab.
const CLOSE_MARK: char = '×';

/// Rows taken by the tab bar.
pub const TAB_BAR_ROWS: u16 = 1;

struct Tab {
    id: SessionId,
    title: String,
    screen: Screen,
}

pub struct View {
    tabs: Vec<Tab>,
    selected: Option<SessionId>,
    cols: u16,
    rows: u16,
    /// Last spawn failure, shown in the tab bar until the next tab opens.
    message: Option<String>,
}

impl View {
    /// `cols` x `rows` is the area available to sessions.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            tabs: Vec::new(),
            selected: None,
            cols,
            rows,
            message: None,
        }
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::TabOpened { id, position, title } => {
                let tab = Tab {
                    id,
                    title,
                    screen: Screen::new(self.cols, self.rows),
                };
                let position = position.min(self.tabs.len());
                self.tabs.insert(position, tab);
                self.message = None;
            }
            UiEvent::TabClosed { id, .. } => {
                self.tabs.retain(|tab| tab.id != id);
                if self.selected == Some(id) {
                    self.selected = None;
                }
            }
            UiEvent::TitleChanged { id, title, .. } => {
                if let Some(tab) = self.tab_mut(id) {
                    tab.title = title;
                }
            }
            UiEvent::Focus { id, .. } => self.selected = Some(id),
            UiEvent::Output { id, bytes } => {
                if let Some(tab) = self.tab_mut(id) {
                    tab.screen.write(&bytes);
                }
            }
            UiEvent::SpawnFailed { message } => self.message = Some(message),
            UiEvent::AllSessionsClosed => {}
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        for tab in &mut self.tabs {
            tab.screen.resize(cols, rows);
        }
    }

    fn tab_mut(&mut self, id: SessionId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }

    fn selected_tab(&self) -> Option<&Tab> {
        let id = self.selected?;
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn draw(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, Hide)?;
        self.draw_tab_bar(out)?;

        match self.selected_tab() {
            Some(tab) => {
                for (row, bytes) in tab.screen.formatted_rows().iter().enumerate() {
                    queue!(
                        out,
                        MoveTo(0, row as u16 + TAB_BAR_ROWS),
                        SetAttribute(Attribute::Reset),
                        Clear(ClearType::CurrentLine)
                    )?;
                    out.write_all(bytes)?;
                }
                queue!(out, SetAttribute(Attribute::Reset))?;
                let (row, col) = tab.screen.cursor();
                queue!(out, MoveTo(col, row + TAB_BAR_ROWS))?;
                if tab.screen.cursor_visible() {
                    queue!(out, Show)?;
                }
            }
            None => {
                queue!(out, MoveTo(0, TAB_BAR_ROWS), Clear(ClearType::FromCursorDown))?;
            }
        }

        out.flush()
    }

    fn draw_tab_bar(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(
            out,
            MoveTo(0, 0),
            SetAttribute(Attribute::Reset),
            Clear(ClearType::CurrentLine)
        )?;

        let slots = self.layout();
        for slot in &slots {
            let attribute = if self.selected == Some(slot.id) {
                Attribute::Reverse
            } else {
                Attribute::Dim
            };
            queue!(
                out,
                SetAttribute(attribute),
                Print(&slot.label),
                SetAttribute(Attribute::Reset)
            )?;
        }

        if let Some(message) = &self.message {
            let used = slots.last().map_or(0, |slot| slot.start + slot.width);
            let remaining = usize::from(self.cols).saturating_sub(used);
            let text = truncate(&format!(" {message}"), remaining);
            queue!(out, SetAttribute(Attribute::Bold), Print(text), SetAttribute(Attribute::Reset))?;
        }
        Ok(())
    }

    /// Where each tab label sits in the tab bar, cut off at the bar's width.
    fn layout(&self) -> Vec<TabSlot> {
        let width = usize::from(self.cols);
        let mut slots = Vec::new();
        let mut col = 0;
        for (position, tab) in self.tabs.iter().enumerate() {
            let title = if tab.title.is_empty() {
                UNTITLED
            } else {
                tab.title.as_str()
            };
            let full = format!(" {}:{} {CLOSE_MARK} ", position + 1, title);
            let label = truncate(&full, width.saturating_sub(col));
            if label.is_empty() {
                break;
            }
            let label_width = label.chars().count();
            slots.push(TabSlot {
                position,
                id: tab.id,
                start: col,
                width: label_width,
                complete: label_width == full.chars().count(),
                label,
            });
            col += label_width;
        }
        slots
    }

    /// What a mouse event on the tab bar asks the tab manager to do.
    ///
    /// Left click selects a tab, or closes it on its close mark. Middle click
    /// closes. The wheel moves to the next or previous tab.
    pub fn on_mouse(&self, event: &MouseEvent) -> Option<TabEvent> {
        if event.row >= TAB_BAR_ROWS {
            return None;
        }
        let button = match event.kind {
            MouseEventKind::ScrollDown => return Some(TabEvent::SelectNext),
            MouseEventKind::ScrollUp => return Some(TabEvent::SelectPrevious),
            MouseEventKind::Down(button) => button,
            _ => return None,
        };

        let col = usize::from(event.column);
        let slot = self
            .layout()
            .into_iter()
            .find(|slot| col >= slot.start && col < slot.start + slot.width)?;
        match button {
            MouseButton::Left if slot.complete && col == slot.start + slot.width - 2 => {
                Some(TabEvent::CloseRequested(slot.id))
            }
            MouseButton::Left => Some(TabEvent::Select(slot.position)),
            MouseButton::Middle => Some(TabEvent::CloseSession(slot.id)),
            MouseButton::Right => None,
        }
    }
}

struct TabSlot {
    position: usize,
    id: SessionId,
    start: usize,
    width: usize,
    /// The label was not cut off, so its close mark is visible.
    complete: bool,
    label: String,
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn opened(id: SessionId, position: usize) -> UiEvent {
        UiEvent::TabOpened {
            id,
            position,
            title: String::new(),
        }
    }

    fn drawn(view: &View) -> String {
        let mut out = Vec::new();
        view.draw(&mut out).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn test_tab_bar_lists_tabs_in_order() {
        let mut view = View::new(80, 10);
        view.apply(opened(1, 0));
        view.apply(opened(2, 1));
        view.apply(UiEvent::TitleChanged {
            id: 2,
            title: "vim".into(),
        });
        view.apply(UiEvent::Focus { id: 2, position: 1 });

        let out = drawn(&view);
        let first = out.find(" 1:shell ").unwrap();
        let second = out.find(" 2:vim ").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_output_goes_to_its_own_tab() {
        let mut view = View::new(80, 10);
        view.apply(opened(1, 0));
        view.apply(opened(2, 1));
        view.apply(UiEvent::Output {
            id: 1,
            bytes: b"first".to_vec(),
        });
        view.apply(UiEvent::Output {
            id: 2,
            bytes: b"second".to_vec(),
        });

        view.apply(UiEvent::Focus { id: 1, position: 0 });
        let out = drawn(&view);
        assert!(out.contains("first"));
        assert!(!out.contains("second"));
    }

    #[test]
    fn test_closed_tab_disappears() {
        let mut view = View::new(80, 10);
        view.apply(opened(1, 0));
        view.apply(opened(2, 1));
        view.apply(UiEvent::TabClosed { id: 1, position: 0 });
        view.apply(UiEvent::Focus { id: 2, position: 0 });

        let out = drawn(&view);
        assert!(out.contains(" 1:shell "));
        assert!(!out.contains(" 2:shell "));
        assert_eq!(view.tabs.len(), 1);
    }

    #[test]
    fn test_spawn_failure_is_shown_until_next_tab() {
        let mut view = View::new(80, 10);
        view.apply(UiEvent::SpawnFailed {
            message: "shell not found: /bin/nope".into(),
        });
        assert!(drawn(&view).contains("shell not found: /bin/nope"));

        view.apply(opened(3, 0));
        assert!(!drawn(&view).contains("shell not found"));
    }

    #[test]
    fn test_tab_bar_is_truncated_to_width() {
        let mut view = View::new(12, 4);
        for id in 1..=5 {
            view.apply(opened(id, usize::try_from(id - 1).unwrap()));
        }
        let out = drawn(&view);
        assert!(out.contains(" 1:shell "));
        assert!(!out.contains(" 3:"));
    }

    fn click(view: &View, kind: MouseEventKind, column: u16, row: u16) -> Option<TabEvent> {
        view.on_mouse(&MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn two_tabs() -> View {
        // " 1:shell × " is 11 columns wide, so tab 2 starts at column 11.
        let mut view = View::new(80, 10);
        view.apply(opened(1, 0));
        view.apply(opened(2, 1));
        view
    }

    #[test]
    fn test_left_click_selects_tab() {
        let view = two_tabs();
        let left = MouseEventKind::Down(MouseButton::Left);
        assert!(matches!(click(&view, left, 3, 0), Some(TabEvent::Select(0))));
        assert!(matches!(click(&view, left, 13, 0), Some(TabEvent::Select(1))));
    }

    #[test]
    fn test_close_mark_requests_close() {
        let view = two_tabs();
        let left = MouseEventKind::Down(MouseButton::Left);
        assert!(matches!(click(&view, left, 9, 0), Some(TabEvent::CloseRequested(1))));
        assert!(matches!(click(&view, left, 20, 0), Some(TabEvent::CloseRequested(2))));
    }

    #[test]
    fn test_middle_click_closes_tab() {
        let view = two_tabs();
        let middle = MouseEventKind::Down(MouseButton::Middle);
        assert!(matches!(click(&view, middle, 12, 0), Some(TabEvent::CloseSession(2))));
    }

    #[test]
    fn test_wheel_on_tab_bar_cycles_tabs() {
        let view = two_tabs();
        assert!(matches!(
            click(&view, MouseEventKind::ScrollDown, 40, 0),
            Some(TabEvent::SelectNext)
        ));
        assert!(matches!(
            click(&view, MouseEventKind::ScrollUp, 40, 0),
            Some(TabEvent::SelectPrevious)
        ));
    }

    #[test]
    fn test_clicks_outside_labels_are_ignored() {
        let view = two_tabs();
        let left = MouseEventKind::Down(MouseButton::Left);
        assert!(click(&view, left, 50, 0).is_none());
        assert!(click(&view, left, 3, 4).is_none());
    }
}
