//! Terminal renderer using crossterm
//!
//! Draws the shell as a title row, the transcript viewport and a prompt line.

use std::io::{self, Write};
use std::time::Instant;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Theme;
use crate::shell::SessionShell;
use crate::ui::input::InputLine;

const PROMPT: &str = "💭 You: ";
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_FRAME_MS: u128 = 80;

/// Rows used by everything except the transcript
const CHROME_ROWS: u16 = 4;

/// Terminal renderer
pub struct Renderer {
    theme: Theme,
    title: String,
    /// Whether the terminal has been initialized
    initialized: bool,
    /// Spinner clock
    started: Instant,
}

impl Renderer {
    pub fn new(title: impl Into<String>, theme: Theme) -> Self {
        Self {
            theme,
            title: title.into(),
            initialized: false,
            started: Instant::now(),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;

        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();

        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show);
        let _ = execute!(stdout, EnableLineWrap);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;

        Ok(())
    }

    /// Draw the whole frame
    pub fn render(&mut self, shell: &SessionShell, input: &InputLine) -> io::Result<()> {
        let (cols, rows) = Self::size()?;
        let width = cols as usize;

        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());

        // Begin synchronized update (reduces flicker)
        write!(stdout, "\x1b[?2026h")?;
        queue!(stdout, Hide, Clear(ClearType::All))?;

        // Title
        let title = format!("🧠 {}", self.title);
        queue!(
            stdout,
            MoveTo(0, 0),
            SetForegroundColor(self.theme.title.to_crossterm()),
            Print(truncate_to_width(&title, width)),
            ResetColor
        )?;

        // Transcript viewport
        let height = rows.saturating_sub(CHROME_ROWS).max(1) as usize;
        let mut lines: Vec<(String, Option<crossterm::style::Color>)> = shell
            .snapshot()
            .iter()
            .map(|line| (sanitize(line), None))
            .collect();
        if let Some(e) = shell.spawn_error() {
            lines.push((format!("⚠ {}", e), Some(self.theme.error.to_crossterm())));
        }

        let start = lines.len().saturating_sub(height);
        for (i, (text, color)) in lines[start..].iter().enumerate() {
            queue!(stdout, MoveTo(0, 2 + i as u16))?;
            if let Some(color) = color {
                queue!(stdout, SetForegroundColor(*color))?;
            }
            queue!(stdout, Print(truncate_to_width(text, width)), ResetColor)?;
        }

        // Prompt line
        let prompt_row = rows.saturating_sub(1);
        queue!(
            stdout,
            MoveTo(0, prompt_row),
            SetForegroundColor(self.theme.prompt.to_crossterm()),
            Print(PROMPT),
            ResetColor
        )?;
        let prompt_width = PROMPT.width();
        let room = width.saturating_sub(prompt_width);
        queue!(stdout, Print(truncate_to_width(input.value(), room)))?;

        let used = prompt_width + input.value().width();
        if shell.is_busy() {
            let status = format!(" {} Sending", self.spinner_frame());
            if used + status.width() <= width {
                queue!(
                    stdout,
                    SetForegroundColor(self.theme.busy.to_crossterm()),
                    Print(status),
                    ResetColor
                )?;
            }
        } else if shell.is_terminated() {
            let status = " (backend not running, Esc to quit)";
            if used + status.width() <= width {
                queue!(
                    stdout,
                    SetForegroundColor(self.theme.sentinel.to_crossterm()),
                    Print(status),
                    ResetColor
                )?;
            }
        }

        let cursor_col = (prompt_width + input.cursor_width()).min(width.saturating_sub(1));
        queue!(stdout, MoveTo(cursor_col as u16, prompt_row), Show)?;

        // End synchronized update
        write!(stdout, "\x1b[?2026l")?;
        stdout.flush()
    }

    fn spinner_frame(&self) -> &'static str {
        let idx = (self.started.elapsed().as_millis() / SPINNER_FRAME_MS) as usize;
        SPINNER_FRAMES[idx % SPINNER_FRAMES.len()]
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Cut `text` to at most `width` display columns
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Make backend output safe to print on one row.
///
/// Tabs become spaces. CSI and OSC sequences, two-character escapes
/// and other control characters are dropped.
pub fn sanitize(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\t' => out.push_str("    "),
            '\x1b' => match chars.next() {
                // CSI: parameters until the final byte
                Some('[') => {
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ST (ESC \)
                Some(']') => {
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' {
                            if chars.peek() == Some(&'\\') {
                                chars.next();
                            }
                            break;
                        }
                    }
                }
                // Two-character escape, e.g. ESC 7 / ESC =
                _ => {}
            },
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
