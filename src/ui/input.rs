//! Single-line input editor
//!
//! Turns crossterm key events into edits of the prompt line.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthStr;

/// What a key press asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Nothing visible happened
    None,
    /// Buffer or cursor changed
    Edited,
    /// Enter pressed; the committed text, buffer already cleared
    Submit(String),
    /// User asked to leave
    Quit,
}

/// Prompt line with a character cursor
#[derive(Debug, Default)]
pub struct InputLine {
    buffer: String,
    /// Cursor position in chars
    cursor: usize,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.buffer
    }

    /// Display columns before the cursor
    pub fn cursor_width(&self) -> usize {
        self.buffer[..self.byte_index(self.cursor)].width()
    }

    /// Take the current value, leaving the line empty
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> InputAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => InputAction::Quit,
            KeyCode::Char('c') if ctrl => InputAction::Quit,
            KeyCode::Char('d') if ctrl && self.buffer.is_empty() => InputAction::Quit,
            KeyCode::Char('u') if ctrl => {
                self.take();
                InputAction::Edited
            }
            KeyCode::Char('a') if ctrl => self.move_to(0),
            KeyCode::Char('e') if ctrl => self.move_to(self.len()),
            KeyCode::Enter => InputAction::Submit(self.take()),
            KeyCode::Char(ch) if !ctrl => {
                let at = self.byte_index(self.cursor);
                self.buffer.insert(at, ch);
                self.cursor += 1;
                InputAction::Edited
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return InputAction::None;
                }
                self.cursor -= 1;
                let at = self.byte_index(self.cursor);
                self.buffer.remove(at);
                InputAction::Edited
            }
            KeyCode::Delete => {
                if self.cursor >= self.len() {
                    return InputAction::None;
                }
                let at = self.byte_index(self.cursor);
                self.buffer.remove(at);
                InputAction::Edited
            }
            KeyCode::Left => self.move_to(self.cursor.saturating_sub(1)),
            KeyCode::Right => self.move_to((self.cursor + 1).min(self.len())),
            KeyCode::Home => self.move_to(0),
            KeyCode::End => self.move_to(self.len()),
            _ => InputAction::None,
        }
    }

    fn move_to(&mut self, pos: usize) -> InputAction {
        if pos == self.cursor {
            return InputAction::None;
        }
        self.cursor = pos;
        InputAction::Edited
    }

    fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_str(input: &mut InputLine, text: &str) {
        for ch in text.chars() {
            input.handle_key(&key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn test_type_and_submit() {
        let mut input = InputLine::new();
        type_str(&mut input, "hello");
        assert_eq!(input.value(), "hello");

        assert_eq!(
            input.handle_key(&key(KeyCode::Enter)),
            InputAction::Submit("hello".to_string())
        );
        assert_eq!(input.value(), "");
        assert_eq!(input.cursor_width(), 0);
    }

    #[test]
    fn test_cursor_editing() {
        let mut input = InputLine::new();
        type_str(&mut input, "ac");
        input.handle_key(&key(KeyCode::Left));
        type_str(&mut input, "b");
        assert_eq!(input.value(), "abc");

        input.handle_key(&key(KeyCode::Home));
        assert_eq!(input.handle_key(&key(KeyCode::Backspace)), InputAction::None);
        input.handle_key(&key(KeyCode::Delete));
        assert_eq!(input.value(), "bc");

        input.handle_key(&key(KeyCode::End));
        input.handle_key(&key(KeyCode::Backspace));
        assert_eq!(input.value(), "b");
    }

    #[test]
    fn test_wide_chars() {
        let mut input = InputLine::new();
        type_str(&mut input, "日本");
        assert_eq!(input.cursor_width(), 4);
        input.handle_key(&key(KeyCode::Backspace));
        assert_eq!(input.value(), "日");
    }

    #[test]
    fn test_control_keys() {
        let mut input = InputLine::new();
        assert_eq!(input.handle_key(&ctrl('d')), InputAction::Quit);

        type_str(&mut input, "text");
        assert_eq!(input.handle_key(&ctrl('d')), InputAction::None);
        assert_eq!(input.handle_key(&ctrl('u')), InputAction::Edited);
        assert_eq!(input.value(), "");

        assert_eq!(input.handle_key(&ctrl('c')), InputAction::Quit);
        assert_eq!(input.handle_key(&key(KeyCode::Esc)), InputAction::Quit);
    }
}
