//! Live view of a streaming turn.
//!
//! [`InlineView`] draws a small ratatui inline viewport below the prompt and
//! clears it when the turn ends; the chat loop then prints the final text in
//! the normal scrollback.

use std::io::{self, IsTerminal, Stdout};

use ratatui::backend::CrosstermBackend;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Paragraph, Wrap};
use ratatui::{Terminal, TerminalOptions, Viewport};
use tracing::warn;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::streamer::TurnPhase;

/// Receives turn progress from the streamer.
pub trait LiveView {
    fn phase(&mut self, phase: TurnPhase, detail: &str);
    /// Full text so far; called at most once per refresh interval.
    fn refresh(&mut self, text: &str);
    fn finish(&mut self);
}

/// Shows nothing. Used when stdout is not a terminal.
#[derive(Debug, Default)]
pub struct SilentView;

impl LiveView for SilentView {
    fn phase(&mut self, _phase: TurnPhase, _detail: &str) {}
    fn refresh(&mut self, _text: &str) {}
    fn finish(&mut self) {}
}

const VIEW_HEIGHT: u16 = 12;

pub struct InlineView {
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    title: String,
    text: String,
}

impl InlineView {
    pub fn new() -> io::Result<Self> {
        let terminal = Terminal::with_options(
            CrosstermBackend::new(io::stdout()),
            TerminalOptions {
                viewport: Viewport::Inline(VIEW_HEIGHT),
            },
        )?;
        Ok(Self {
            terminal: Some(terminal),
            title: String::new(),
            text: String::new(),
        })
    }

    fn draw(&mut self) {
        let Some(terminal) = self.terminal.as_mut() else {
            return;
        };
        let title = self.title.clone();
        let text = &self.text;
        let drawn = terminal.draw(|frame| {
            let area = frame.area();
            let inner_width = area.width.saturating_sub(2) as usize;
            let inner_height = area.height.saturating_sub(2) as usize;
            let body = tail_lines(text, inner_width, inner_height);
            let block = Block::bordered()
                .title(title)
                .border_style(Style::default().fg(Color::DarkGray));
            let paragraph = Paragraph::new(body)
                .block(block)
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        })
        .map(|_| ());
        if let Err(e) = drawn {
            warn!(error = %e, "live view draw failed; disabling");
            self.terminal = None;
        }
    }
}

impl LiveView for InlineView {
    fn phase(&mut self, phase: TurnPhase, detail: &str) {
        self.title = if detail.is_empty() {
            format!(" {} ", phase.label())
        } else {
            let detail: String = detail
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(60)
                .collect();
            format!(" {} · {detail} ", phase.label())
        };
        self.draw();
    }

    fn refresh(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        self.draw();
    }

    fn finish(&mut self) {
        if let Some(mut terminal) = self.terminal.take() {
            if let Err(e) = terminal.clear() {
                warn!(error = %e, "failed to clear live view");
            }
        }
    }
}

impl Drop for InlineView {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Inline viewport when stdout is a terminal, otherwise a silent view.
pub fn terminal_view() -> Box<dyn LiveView> {
    if !io::stdout().is_terminal() {
        return Box::new(SilentView);
    }
    match InlineView::new() {
        Ok(view) => Box::new(view),
        Err(e) => {
            warn!(error = %e, "inline viewport unavailable");
            Box::new(SilentView)
        }
    }
}

/// The trailing lines of `text` that fit in `height` rows of `width`
/// columns once wrapped. A last line too long for the whole view is cut to
/// its final `width * height` columns.
pub fn tail_lines(text: &str, width: usize, height: usize) -> String {
    if width == 0 || height == 0 {
        return String::new();
    }
    let mut rows = 0;
    let mut kept = Vec::new();
    for line in text.lines().rev() {
        let needed = UnicodeWidthStr::width(line).div_ceil(width).max(1);
        if rows + needed > height {
            if kept.is_empty() {
                kept.push(tail_columns(line, width * height));
            }
            break;
        }
        rows += needed;
        kept.push(line);
    }
    kept.reverse();
    kept.join("\n")
}

/// Longest suffix of `line` no wider than `columns`.
fn tail_columns(line: &str, columns: usize) -> &str {
    let mut used = 0;
    let mut start = line.len();
    for (at, ch) in line.char_indices().rev() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width > columns {
            break;
        }
        used += width;
        start = at;
    }
    &line[start..]
}
