//! OLED display protocol layer
//!
//! Frames logical display operations into the chip's command/data byte
//! streams over a [`TwiBus`] and owns the cursor bookkeeping for the
//! character grid. Supports the SSD1306, SSD1309 and SH1106 controller
//! families, which differ only in how a pixel column is addressed: the
//! SSD1306/SSD1309 take the column directly, the SH1106 takes it split into
//! low/high nibbles with a 2-pixel panel offset.
//!
//! Bus faults never abort an operation. After every transaction the sticky
//! fault is taken from the bus, written as one line to the diagnostic sink,
//! and thereby cleared.

use core::fmt::Write;

use crate::font;
use crate::twi::TwiBus;

/// Horizontal pixel count; the supported panels are all 128 wide
pub const WIDTH_PX: u8 = 128;

/// Default 7-bit target address (0x78 on the wire)
pub const DEFAULT_ADDRESS: u8 = 0x3C;

/// Controller command bytes
mod cmd {
    pub const CONTROL_COMMAND: u8 = 0x00;
    pub const CONTROL_DATA: u8 = 0x40;
    pub const MEMORY_MODE: u8 = 0x20;
    pub const SET_COLUMN_RANGE: u8 = 0x21;
    pub const START_LINE: u8 = 0x40;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const CHARGE_PUMP: u8 = 0x8D;
    pub const SEG_REMAP: u8 = 0xA1;
    pub const RAM_CONTENT: u8 = 0xA4;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_PAGE: u8 = 0xB0;
    pub const COM_SCAN_DEC: u8 = 0xC8;
    pub const SET_DISPLAY_OFFSET: u8 = 0xD3;
    pub const SET_CLOCK_DIV: u8 = 0xD5;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_VCOM_LEVEL: u8 = 0xDB;
    pub const SET_LOW_COLUMN: u8 = 0x00;
    pub const SET_HIGH_COLUMN: u8 = 0x10;
}

/// SH1106 RAM is 132 columns wide; a 128-wide panel sits 2 columns in
const SH1106_COLUMN_OFFSET: u8 = 2;

/// Display controller family, selected once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipVariant {
    Ssd1306,
    Ssd1309,
    Sh1106,
}

impl ChipVariant {
    /// Controller name as printed in the identification string
    pub fn name(&self) -> &'static str {
        match self {
            ChipVariant::Ssd1306 => "SSD1306",
            ChipVariant::Ssd1309 => "SSD1309",
            ChipVariant::Sh1106 => "SH1106",
        }
    }
}

/// Panel pixel height
///
/// Width is fixed at 128; any other vertical geometry is a configuration
/// error, which this enum makes unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelHeight {
    Px32,
    Px64,
}

impl PanelHeight {
    pub fn px(&self) -> u8 {
        match self {
            PanelHeight::Px32 => 32,
            PanelHeight::Px64 => 64,
        }
    }

    /// Pixel geometry as printed in the identification string
    pub fn label(&self) -> &'static str {
        match self {
            PanelHeight::Px32 => "128x32",
            PanelHeight::Px64 => "128x64",
        }
    }

    fn mux_ratio(&self) -> u8 {
        self.px() - 1
    }

    fn com_pins(&self) -> u8 {
        match self {
            PanelHeight::Px32 => 0x02,
            PanelHeight::Px64 => 0x12,
        }
    }
}

/// Build-time display selection: chip family, panel height, bus address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayConfig {
    pub variant: ChipVariant,
    pub height: PanelHeight,
    pub address: u8,
}

impl DisplayConfig {
    pub fn new(variant: ChipVariant, height: PanelHeight) -> Self {
        Self {
            variant,
            height,
            address: DEFAULT_ADDRESS,
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Characters per line (6-pixel cells across 128 columns)
    pub const fn chars_wide(&self) -> u8 {
        WIDTH_PX / font::GLYPH_WIDTH as u8
    }

    /// Character lines (8-pixel pages)
    pub fn chars_high(&self) -> u8 {
        self.height.px() / 8
    }
}

/// Display-level commands executed as single command bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Normal = 0xA6,
    Inverse = 0xA7,
    Sleep = 0xAE,
    Wake = 0xAF,
}

/// Initialization sequence, replayed verbatim as one command transaction
///
/// Ends in wake; only the multiplex ratio and COM pin layout depend on the
/// panel height.
fn init_sequence(height: PanelHeight) -> [u8; 28] {
    [
        Command::Sleep as u8,
        cmd::MEMORY_MODE,
        0x00, // horizontal addressing
        cmd::SET_PAGE,
        cmd::COM_SCAN_DEC,
        cmd::SET_LOW_COLUMN,
        cmd::SET_HIGH_COLUMN,
        cmd::START_LINE,
        cmd::SET_CONTRAST,
        0x3F,
        cmd::SEG_REMAP,
        Command::Normal as u8,
        cmd::SET_MUX_RATIO,
        height.mux_ratio(),
        cmd::RAM_CONTENT,
        cmd::SET_DISPLAY_OFFSET,
        0x00,
        cmd::SET_CLOCK_DIV,
        0xF0,
        cmd::SET_PRECHARGE,
        0x22,
        cmd::SET_COM_PINS,
        height.com_pins(),
        cmd::SET_VCOM_LEVEL,
        0x20, // 0.77 x Vcc
        cmd::CHARGE_PUMP,
        0x14,
        Command::Wake as u8,
    ]
}

/// Display protocol driver: framing plus cursor state
///
/// The cursor lives in a character grid of `chars_wide() x chars_high()`
/// cells. Writes advance the column by one and saturate at the right edge
/// with no wrap; out-of-range cursor targets and unprintable characters are
/// silent no-ops.
pub struct Oled<B, W> {
    bus: B,
    diag: W,
    config: DisplayConfig,
    col: u8,
    row: u8,
}

impl<B: TwiBus, W: Write> Oled<B, W> {
    /// Create a driver over `bus`, reporting faults to `diag`
    pub fn new(bus: B, diag: W, config: DisplayConfig) -> Self {
        Self {
            bus,
            diag,
            config,
            col: 0,
            row: 0,
        }
    }

    /// Configure the bus, replay the init sequence and clear the screen
    ///
    /// Leaves the display awake with the cursor at (0,0).
    pub fn init(&mut self) {
        self.bus.configure();
        let seq = init_sequence(self.config.height);
        self.tx_cmd(&seq);
        self.clear_screen();
    }

    /// Move the cursor; `None` keeps the previous value for that axis
    ///
    /// Targets outside the character grid leave the cursor unchanged and
    /// send nothing.
    pub fn set_cursor(&mut self, col: Option<u8>, row: Option<u8>) {
        let col = col.unwrap_or(self.col);
        let row = row.unwrap_or(self.row);
        if col >= self.config.chars_wide() || row >= self.config.chars_high() {
            return;
        }
        self.col = col;
        self.row = row;

        let px = col * font::GLYPH_WIDTH as u8;
        match self.config.variant {
            ChipVariant::Ssd1306 | ChipVariant::Ssd1309 => {
                self.tx_cmd(&[cmd::SET_PAGE + row, cmd::SET_COLUMN_RANGE, px, WIDTH_PX - 1]);
            }
            ChipVariant::Sh1106 => {
                let px = px + SH1106_COLUMN_OFFSET;
                self.tx_cmd(&[
                    cmd::SET_PAGE + row,
                    cmd::SET_LOW_COLUMN | (px & 0x0F),
                    cmd::SET_HIGH_COLUMN | (px >> 4),
                ]);
            }
        }
    }

    /// Write one character at the cursor and advance the column
    ///
    /// No-op when the line is full or `code` has no glyph; characters past
    /// the right edge are dropped until the caller repositions.
    pub fn write_char(&mut self, code: u8) {
        if self.col >= self.config.chars_wide() {
            return;
        }
        let Some(cell) = font::glyph(code) else {
            return;
        };
        self.col += 1;
        self.tx_dat(cell);
    }

    /// Write a string at the cursor, dropping what does not fit the line
    pub fn put_str(&mut self, text: &str) {
        for byte in text.bytes() {
            self.write_char(byte);
        }
    }

    /// Blank every page and return the cursor to (0,0)
    pub fn clear_screen(&mut self) {
        const BLANK_ROW: [u8; WIDTH_PX as usize] = [0; WIDTH_PX as usize];
        for row in 0..self.config.chars_high() {
            self.set_cursor(Some(0), Some(row));
            self.tx_dat(&BLANK_ROW);
        }
        self.set_cursor(Some(0), Some(0));
    }

    /// Execute a display-level command (normal/inverse, sleep/wake)
    pub fn execute(&mut self, command: Command) {
        self.tx_cmd(&[command as u8]);
    }

    /// Set the contrast level
    pub fn set_contrast(&mut self, level: u8) {
        self.tx_cmd(&[cmd::SET_CONTRAST, level]);
    }

    /// Current cursor position as (column, row)
    pub fn cursor(&self) -> (u8, u8) {
        (self.col, self.row)
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Release the bus and the diagnostic sink
    pub fn release(self) -> (B, W) {
        (self.bus, self.diag)
    }

    fn tx_cmd(&mut self, bytes: &[u8]) {
        self.transfer(cmd::CONTROL_COMMAND, bytes);
    }

    fn tx_dat(&mut self, bytes: &[u8]) {
        self.transfer(cmd::CONTROL_DATA, bytes);
    }

    fn transfer(&mut self, control: u8, bytes: &[u8]) {
        self.bus.begin(self.config.address);
        self.bus.send(control);
        for &byte in bytes {
            self.bus.send(byte);
        }
        self.bus.end();
        self.report();
    }

    /// Report-and-clear: one diagnostic line per faulted transaction
    fn report(&mut self) {
        if let Some(fault) = self.bus.take_fault() {
            #[cfg(feature = "defmt")]
            defmt::warn!("twi fault: {}", fault);
            let _ = writeln!(self.diag, "TWI fault: {}", fault.as_str());
        }
    }
}
