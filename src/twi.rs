//! Two-wire (I2C) bus driver
//!
//! Implements the four bus primitives — start/address, byte send, byte read
//! with/without acknowledge, stop — on top of a small hardware register seam
//! ([`TwiPort`]). Every primitive busy-waits for the transfer-complete flag
//! up to a fixed retry budget; on exhaustion it records a [`BusError`] in
//! per-driver sticky state instead of returning an error, so a disconnected
//! or glitching display never halts the host program.
//!
//! The protocol layer consumes the bus through the [`TwiBus`] trait. Two
//! implementations are provided:
//!
//! - [`TwiMaster`]: the register-level driver for targets exposing a raw
//!   two-wire peripheral
//! - [`EhalBus`]: an adapter over any [`embedded_hal::i2c::I2c`] bus

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};

/// Default bus clock: 100 kHz standard mode
pub const DEFAULT_BUS_HZ: u32 = 100_000;

/// Poll iterations before a primitive is declared timed out
const READY_RETRIES: u32 = 10_000;

/// Covers the largest frame the protocol layer emits (control byte plus one
/// full 128-column pixel row)
const FRAME_CAPACITY: usize = 132;

/// Bus fault, tagged by the primitive that timed out
///
/// The tag is diagnostic only; it never changes behaviour. Faults are sticky
/// per driver instance and must be consumed with `take_fault`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Start condition never completed
    StartTimeout,
    /// Address byte was not acknowledged in time
    AddressTimeout,
    /// Data byte send was not acknowledged in time
    ByteTimeout,
    /// Read with acknowledge never completed
    ReadAckTimeout,
    /// Read without acknowledge never completed
    ReadNackTimeout,
}

impl BusError {
    /// Human-readable tag for diagnostic output
    pub fn as_str(&self) -> &'static str {
        match self {
            BusError::StartTimeout => "start timeout",
            BusError::AddressTimeout => "address timeout",
            BusError::ByteTimeout => "byte timeout",
            BusError::ReadAckTimeout => "read-ack timeout",
            BusError::ReadNackTimeout => "read-nack timeout",
        }
    }
}

/// Hardware register seam for a raw two-wire peripheral
///
/// Implemented by target-specific glue; each trigger method starts one bus
/// action and `ready` reports its completion. Mock implementations drive the
/// driver tests on the host.
pub trait TwiPort {
    /// Program the bus clock divider
    fn set_divider(&mut self, divider: u8);

    /// Trigger a start (or repeated start) condition
    fn start(&mut self);

    /// Trigger a stop condition and release the bus
    fn stop(&mut self);

    /// Load one byte and trigger its transmission
    fn write(&mut self, byte: u8);

    /// Trigger reception of one byte, acknowledging it or not
    fn read(&mut self, ack: bool);

    /// Last received byte
    fn data(&self) -> u8;

    /// Whether the previously triggered action has completed
    fn ready(&self) -> bool;
}

/// Bus interface consumed by the display protocol layer
///
/// Write-only from the display's perspective. Byte operations are only valid
/// between `begin` and `end`; every `begin` must be matched by exactly one
/// `end` before the bus is reused, including after a fault.
pub trait TwiBus {
    /// Apply bus timing; idempotent, must run before the first transaction
    fn configure(&mut self);

    /// Start condition plus 7-bit target address (write direction implied)
    fn begin(&mut self, address: u8);

    /// Clock out one byte
    fn send(&mut self, byte: u8);

    /// Stop condition; always safe, always returns the bus to idle
    fn end(&mut self);

    /// Current sticky fault, if any
    fn fault(&self) -> Option<BusError>;

    /// Consume and clear the sticky fault
    fn take_fault(&mut self) -> Option<BusError>;
}

/// Compute the clock divider for a target bus frequency (prescaler 1)
pub fn clock_divider(cpu_hz: u32, bus_hz: u32) -> u8 {
    let divider = (cpu_hz / bus_hz).saturating_sub(16) / 2;
    divider.min(u8::MAX as u32) as u8
}

/// Register-level two-wire master with bounded-wait fault detection
///
/// All primitives are non-failing from the caller's point of view; a timeout
/// sets the sticky fault (first fault wins) and control returns to the
/// caller, which decides whether to continue. There is no retry — a timed
/// out byte is considered sent regardless of acknowledgement.
pub struct TwiMaster<P: TwiPort> {
    port: P,
    divider: u8,
    fault: Option<BusError>,
}

impl<P: TwiPort> TwiMaster<P> {
    /// Create a master clocking the bus at `bus_hz` from a `cpu_hz` base
    pub fn new(port: P, cpu_hz: u32, bus_hz: u32) -> Self {
        Self {
            port,
            divider: clock_divider(cpu_hz, bus_hz),
            fault: None,
        }
    }

    /// Create a master at the default 100 kHz bus clock
    pub fn standard(port: P, cpu_hz: u32) -> Self {
        Self::new(port, cpu_hz, DEFAULT_BUS_HZ)
    }

    /// Read one byte, acknowledging it (more bytes follow)
    pub fn read_ack(&mut self) -> u8 {
        self.port.read(true);
        if !self.wait_ready() {
            self.note(BusError::ReadAckTimeout);
        }
        self.port.data()
    }

    /// Read one byte without acknowledge (last byte of a transfer)
    pub fn read_nack(&mut self) -> u8 {
        self.port.read(false);
        if !self.wait_ready() {
            self.note(BusError::ReadNackTimeout);
        }
        self.port.data()
    }

    /// Release the underlying port
    pub fn release(self) -> P {
        self.port
    }

    fn wait_ready(&mut self) -> bool {
        for _ in 0..READY_RETRIES {
            if self.port.ready() {
                return true;
            }
        }
        false
    }

    fn note(&mut self, error: BusError) {
        if self.fault.is_none() {
            self.fault = Some(error);
        }
    }
}

impl<P: TwiPort> TwiBus for TwiMaster<P> {
    fn configure(&mut self) {
        self.port.set_divider(self.divider);
    }

    fn begin(&mut self, address: u8) {
        self.port.start();
        if !self.wait_ready() {
            // Bus is half-open here; the caller still owes an end()
            self.note(BusError::StartTimeout);
            return;
        }
        self.port.write(address << 1);
        if !self.wait_ready() {
            self.note(BusError::AddressTimeout);
        }
    }

    fn send(&mut self, byte: u8) {
        self.port.write(byte);
        if !self.wait_ready() {
            self.note(BusError::ByteTimeout);
        }
    }

    fn end(&mut self) {
        self.port.stop();
    }

    fn fault(&self) -> Option<BusError> {
        self.fault
    }

    fn take_fault(&mut self) -> Option<BusError> {
        self.fault.take()
    }
}

/// [`TwiBus`] adapter over any embedded-hal 1.0 I2C implementation
///
/// Buffers one begin..end span and issues it as a single addressed write, so
/// the transaction stays atomic on shared host buses. Transport errors are
/// folded onto the timeout taxonomy: an address NACK becomes
/// [`BusError::AddressTimeout`], anything else [`BusError::ByteTimeout`].
pub struct EhalBus<I2C> {
    i2c: I2C,
    frame: heapless::Vec<u8, FRAME_CAPACITY>,
    target: u8,
    fault: Option<BusError>,
}

impl<I2C: I2c> EhalBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            frame: heapless::Vec::new(),
            target: 0,
            fault: None,
        }
    }

    /// Release the underlying bus
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> TwiBus for EhalBus<I2C> {
    fn configure(&mut self) {
        // Host bus timing is owned by the HAL that built `i2c`
    }

    fn begin(&mut self, address: u8) {
        self.target = address;
        self.frame.clear();
    }

    fn send(&mut self, byte: u8) {
        // Capacity covers the largest frame the protocol emits
        let _ = self.frame.push(byte);
    }

    fn end(&mut self) {
        if let Err(e) = self.i2c.write(self.target, &self.frame) {
            let fault = match e.kind() {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => BusError::AddressTimeout,
                _ => BusError::ByteTimeout,
            };
            if self.fault.is_none() {
                self.fault = Some(fault);
            }
        }
        self.frame.clear();
    }

    fn fault(&self) -> Option<BusError> {
        self.fault
    }

    fn take_fault(&mut self) -> Option<BusError> {
        self.fault.take()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use std::collections::VecDeque;
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum PortOp {
        Start,
        Stop,
        Write(u8),
        Read(bool),
    }

    /// Scripted port: each triggered action consumes one completion entry;
    /// a `false` entry makes that action time out. An empty script completes
    /// everything immediately.
    #[derive(Default)]
    struct MockPort {
        completions: VecDeque<bool>,
        reads: VecDeque<u8>,
        ops: Vec<PortOp>,
        divider: Option<u8>,
        current: bool,
        last_read: u8,
    }

    impl MockPort {
        fn with_completions(completions: &[bool]) -> Self {
            Self {
                completions: completions.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn advance(&mut self) {
            self.current = self.completions.pop_front().unwrap_or(true);
        }
    }

    impl TwiPort for MockPort {
        fn set_divider(&mut self, divider: u8) {
            self.divider = Some(divider);
        }

        fn start(&mut self) {
            self.ops.push(PortOp::Start);
            self.advance();
        }

        fn stop(&mut self) {
            self.ops.push(PortOp::Stop);
        }

        fn write(&mut self, byte: u8) {
            self.ops.push(PortOp::Write(byte));
            self.advance();
        }

        fn read(&mut self, ack: bool) {
            self.ops.push(PortOp::Read(ack));
            self.last_read = self.reads.pop_front().unwrap_or(0);
            self.advance();
        }

        fn data(&self) -> u8 {
            self.last_read
        }

        fn ready(&self) -> bool {
            self.current
        }
    }

    #[test]
    fn divider_for_16mhz_at_100khz() {
        assert_eq!(clock_divider(16_000_000, 100_000), 72);
    }

    #[test]
    fn divider_saturates_for_slow_cpu() {
        assert_eq!(clock_divider(1_000_000, 100_000), 0);
    }

    #[test]
    fn configure_programs_divider() {
        let mut bus = TwiMaster::standard(MockPort::default(), 16_000_000);
        bus.configure();
        assert_eq!(bus.release().divider, Some(72));
    }

    #[test]
    fn transaction_shifts_address_and_frames_bytes() {
        let mut bus = TwiMaster::standard(MockPort::default(), 16_000_000);
        bus.begin(0x3C);
        bus.send(0x00);
        bus.send(0xAE);
        bus.end();
        assert_eq!(bus.fault(), None);
        assert_eq!(
            bus.release().ops,
            vec![
                PortOp::Start,
                PortOp::Write(0x78),
                PortOp::Write(0x00),
                PortOp::Write(0xAE),
                PortOp::Stop,
            ]
        );
    }

    #[test]
    fn start_timeout_is_sticky_and_stop_still_issued() {
        let port = MockPort::with_completions(&[false]);
        let mut bus = TwiMaster::standard(port, 16_000_000);
        bus.begin(0x3C);
        bus.end();
        assert_eq!(bus.fault(), Some(BusError::StartTimeout));
        // begin() bailed before the address byte; end() forced a clean stop
        assert_eq!(bus.release().ops, vec![PortOp::Start, PortOp::Stop]);
    }

    #[test]
    fn address_timeout_tagged_separately_from_start() {
        let port = MockPort::with_completions(&[true, false]);
        let mut bus = TwiMaster::standard(port, 16_000_000);
        bus.begin(0x3C);
        bus.end();
        assert_eq!(bus.fault(), Some(BusError::AddressTimeout));
    }

    #[test]
    fn byte_timeout_does_not_abort_remaining_sequence() {
        // start ok, address ok, first data byte times out, second completes
        let port = MockPort::with_completions(&[true, true, false, true]);
        let mut bus = TwiMaster::standard(port, 16_000_000);
        bus.begin(0x3C);
        bus.send(0x00);
        bus.send(0xA7);
        bus.end();
        assert_eq!(bus.fault(), Some(BusError::ByteTimeout));
        // both bytes were still clocked out
        let ops = bus.release().ops;
        let writes = ops.iter().filter(|op| matches!(op, PortOp::Write(_)));
        assert_eq!(writes.count(), 3);
    }

    #[test]
    fn first_fault_wins_until_taken() {
        let port = MockPort::with_completions(&[false, true, false]);
        let mut bus = TwiMaster::standard(port, 16_000_000);
        bus.begin(0x3C); // start timeout
        bus.send(0xFF); // completes
        bus.send(0xFF); // byte timeout, masked by earlier fault
        bus.end();
        assert_eq!(bus.take_fault(), Some(BusError::StartTimeout));
        assert_eq!(bus.fault(), None);
    }

    #[test]
    fn read_primitives_return_data_and_tag_timeouts() {
        let mut port = MockPort::default();
        port.reads = VecDeque::from(vec![0x42, 0x43]);
        let mut bus = TwiMaster::standard(port, 16_000_000);
        bus.begin(0x3C);
        assert_eq!(bus.read_ack(), 0x42);
        assert_eq!(bus.read_nack(), 0x43);
        bus.end();
        assert_eq!(bus.fault(), None);

        let port = MockPort::with_completions(&[true, true, false]);
        let mut bus = TwiMaster::standard(port, 16_000_000);
        bus.begin(0x3C);
        bus.read_ack();
        bus.end();
        assert_eq!(bus.fault(), Some(BusError::ReadAckTimeout));

        let port = MockPort::with_completions(&[true, true, false]);
        let mut bus = TwiMaster::standard(port, 16_000_000);
        bus.begin(0x3C);
        bus.read_nack();
        bus.end();
        assert_eq!(bus.fault(), Some(BusError::ReadNackTimeout));
    }

    #[test]
    fn ehal_bus_issues_one_write_per_span() {
        let i2c = I2cMock::new(&[I2cTransaction::write(0x3C, vec![0x00, 0xAE])]);
        let mut bus = EhalBus::new(i2c);
        bus.configure();
        bus.begin(0x3C);
        bus.send(0x00);
        bus.send(0xAE);
        bus.end();
        assert_eq!(bus.fault(), None);
        bus.release().done();
    }

    #[test]
    fn ehal_bus_maps_nack_errors_onto_fault_tags() {
        let i2c = I2cMock::new(&[I2cTransaction::write(0x3C, vec![0x00])
            .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))]);
        let mut bus = EhalBus::new(i2c);
        bus.begin(0x3C);
        bus.send(0x00);
        bus.end();
        assert_eq!(bus.take_fault(), Some(BusError::AddressTimeout));
        bus.release().done();

        let i2c = I2cMock::new(&[I2cTransaction::write(0x3C, vec![0x00])
            .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data))]);
        let mut bus = EhalBus::new(i2c);
        bus.begin(0x3C);
        bus.send(0x00);
        bus.end();
        assert_eq!(bus.take_fault(), Some(BusError::ByteTimeout));
        bus.release().done();
    }
}
