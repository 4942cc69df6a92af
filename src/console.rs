//! Text console facade
//!
//! The only surface an application touches: clear, position, write, display
//! commands, contrast. Adds no protocol logic of its own — every call passes
//! straight through to the [`Oled`] layer. The console owns the one
//! general-purpose line buffer, used as scratch for the identification
//! string during init and available to the caller afterwards.

use core::fmt;
use core::fmt::Write;

use crate::oled::{Command, DisplayConfig, Oled};
use crate::twi::TwiBus;

/// Line buffer capacity: one full character line
pub const BUF_LEN: usize = 21;

/// Text console over an OLED display
pub struct Console<B, W> {
    oled: Oled<B, W>,
    buf: heapless::String<BUF_LEN>,
}

impl<B: TwiBus, W: Write> Console<B, W> {
    pub fn new(bus: B, diag: W, config: DisplayConfig) -> Self {
        Self {
            oled: Oled::new(bus, diag, config),
            buf: heapless::String::new(),
        }
    }

    /// Initialize the display and show the chip/geometry identification
    ///
    /// The identification line doubles as a self-test: if the display shows
    /// "128x64 SSD1306" the whole path down to the panel works. The line is
    /// left in the buffer.
    pub fn init(&mut self) {
        self.oled.init();
        let config = *self.oled.config();
        self.buf.clear();
        let _ = write!(
            self.buf,
            "{} {}",
            config.height.label(),
            config.variant.name()
        );
        self.oled.put_str(self.buf.as_str());
    }

    /// Clear the screen; cursor returns to (0,0)
    pub fn clear(&mut self) {
        self.oled.clear_screen();
    }

    /// Move the cursor; `None` keeps the previous value for that axis
    pub fn set_cursor(&mut self, col: Option<u8>, row: Option<u8>) {
        self.oled.set_cursor(col, row);
    }

    /// Write one character at the cursor
    pub fn put_char(&mut self, code: u8) {
        self.oled.write_char(code);
    }

    /// Write a string at the cursor
    pub fn put_str(&mut self, text: &str) {
        self.oled.put_str(text);
    }

    /// Position the cursor, then write a string
    pub fn put_at(&mut self, text: &str, col: Option<u8>, row: Option<u8>) {
        self.oled.set_cursor(col, row);
        self.oled.put_str(text);
    }

    /// Display the line buffer contents at the cursor
    pub fn put_buffer(&mut self) {
        self.oled.put_str(self.buf.as_str());
    }

    /// Execute a display-level command (normal/inverse, sleep/wake)
    pub fn execute(&mut self, command: Command) {
        self.oled.execute(command);
    }

    /// Set the contrast level
    pub fn set_contrast(&mut self, level: u8) {
        self.oled.set_contrast(level);
    }

    /// Current cursor position as (column, row)
    pub fn cursor(&self) -> (u8, u8) {
        self.oled.cursor()
    }

    /// The general-purpose line buffer
    pub fn buffer(&mut self) -> &mut heapless::String<BUF_LEN> {
        &mut self.buf
    }

    /// Release the bus and the diagnostic sink
    pub fn release(self) -> (B, W) {
        self.oled.release()
    }
}

impl<B: TwiBus, W: Write> fmt::Write for Console<B, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_str(s);
        Ok(())
    }
}
