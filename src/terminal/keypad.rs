use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::AppError;

pub const ZERO_DISPLAY: &str = "0.00";
pub const MAX_DISPLAY_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(char),
    Point,
    Delete,
    Clear,
}

impl FromStr for Key {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "." => Ok(Key::Point),
            "del" | "delete" | "backspace" => Ok(Key::Delete),
            "clear" => Ok(Key::Clear),
            digit if digit.len() == 1 && digit.chars().all(|c| c.is_ascii_digit()) => {
                Ok(Key::Digit(digit.chars().next().unwrap_or('0')))
            }
            other => Err(AppError::InvalidRequest(format!("unknown key `{other}`"))),
        }
    }
}

/// Keypad display. Starts at `0.00`, keeps a single decimal point and never
/// grows past `MAX_DISPLAY_LEN` characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountEntry {
    display: String,
}

impl Default for AmountEntry {
    fn default() -> Self {
        Self {
            display: ZERO_DISPLAY.to_string(),
        }
    }
}

impl AmountEntry {
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn press(&mut self, key: Key) {
        match key {
            Key::Digit(_) | Key::Point if self.display == ZERO_DISPLAY => {
                self.display = match key {
                    Key::Digit(d) => d.to_string(),
                    _ => "0.".to_string(),
                };
            }
            Key::Point if self.display.contains('.') => {}
            Key::Digit(d) => self.append(d),
            Key::Point => self.append('.'),
            Key::Delete => self.delete(),
            Key::Clear => self.clear(),
        }
    }

    pub fn clear(&mut self) {
        self.display = ZERO_DISPLAY.to_string();
    }

    /// Numeric value of the display; a trailing point reads as a whole number.
    pub fn value(&self) -> Decimal {
        self.display
            .trim_end_matches('.')
            .parse::<Decimal>()
            .unwrap_or(Decimal::ZERO)
    }

    fn append(&mut self, c: char) {
        self.display.push(c);
        self.display.truncate(MAX_DISPLAY_LEN);
    }

    fn delete(&mut self) {
        if self.display.len() <= 1 || self.display == ZERO_DISPLAY {
            self.clear();
            return;
        }
        self.display.pop();
        if self.display.is_empty() {
            self.clear();
        }
    }
}
