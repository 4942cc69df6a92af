//! Text console driver for SSD1306/SSD1309/SH1106 OLED displays
//!
//! A lightweight, text-only driver for 128x32 and 128x64 monochrome OLED
//! panels on a two-wire serial bus. No graphics, no frame buffer — just a
//! 21-character grid with a cursor, written straight to display RAM through
//! a monospaced 6x8 font.
//!
//! # Architecture
//!
//! - [`twi`]: the bus driver. Start/address/byte/acknowledge primitives with
//!   bounded-wait timeout detection and per-instance sticky faults; a
//!   [`TwiPort`] register seam for raw two-wire peripherals and an
//!   [`EhalBus`] adapter for any `embedded-hal` 1.0 I2C bus.
//! - [`oled`]: the protocol layer. Frames logical operations into command
//!   and data transactions for the selected chip variant and tracks the
//!   cursor.
//! - [`console`]: the facade applications talk to.
//!
//! Faults never abort anything: a disconnected or glitching panel is
//! reported as one line on the diagnostic sink and the program keeps going.
//!
//! # Example
//!
//! ```ignore
//! use oled_console::{ChipVariant, Console, DisplayConfig, EhalBus, PanelHeight};
//!
//! let bus = EhalBus::new(i2c); // any embedded-hal I2C bus
//! let config = DisplayConfig::new(ChipVariant::Ssd1306, PanelHeight::Px64);
//! let mut console = Console::new(bus, diag, config);
//! console.init(); // shows "128x64 SSD1306" as a self-test
//! console.put_at("Hello", Some(0), Some(2));
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod console;
pub mod font;
pub mod oled;
pub mod twi;

pub use console::Console;
pub use oled::{ChipVariant, Command, DisplayConfig, Oled, PanelHeight, DEFAULT_ADDRESS};
pub use twi::{BusError, EhalBus, TwiBus, TwiMaster, TwiPort};
