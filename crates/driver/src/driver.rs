//! Codec lifecycle driver.
//!
//! [`CodecDriver`] runs the lifecycle state machine around a chip backend
//! implementing [`Codec`]. The driver owns no hardware: the control bus,
//! the platform GPIO/bus seam and the pin registry are borrowed per call,
//! so a single bus instance can serve several codecs.

use crate::error::DriverError;
use crate::format::{AudioFormat, OperatingMode, OutputRoute};
use crate::pins::{BusActivation, PinFunction, PinRegistry, PinState};

/// Register-oriented control-bus transactions.
///
/// The one primitive the backends need: register-addressed reads and
/// writes against a 7-bit device address. Implemented for every blocking
/// `embedded-hal` I2C bus.
pub trait CodecTransport {
    /// Bus error type.
    type Error;

    /// Write `data` to the register at `reg`.
    fn write_bytes(&mut self, address: u8, reg: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Read `buf.len()` bytes starting at the register at `reg`.
    fn read_bytes(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<I: embedded_hal::i2c::I2c> CodecTransport for I {
    type Error = I::Error;

    fn write_bytes(&mut self, address: u8, reg: u8, data: &[u8]) -> Result<(), Self::Error> {
        // Adjacent writes in one transaction are sent as a single
        // continuous write, so the register byte and payload share a
        // start condition.
        self.transaction(
            address,
            &mut [
                embedded_hal::i2c::Operation::Write(&[reg]),
                embedded_hal::i2c::Operation::Write(data),
            ],
        )
    }

    fn read_bytes(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.write_read(address, &[reg], buf)
    }
}

/// A transport paired with the device address resolved for this codec.
///
/// Backends receive one of these instead of a raw transport so they never
/// deal in addressing.
pub struct Bus<'a, T: CodecTransport> {
    transport: &'a mut T,
    address: u8,
}

impl<'a, T: CodecTransport> Bus<'a, T> {
    /// Bind a transport to a device address.
    pub fn new(transport: &'a mut T, address: u8) -> Self {
        Self { transport, address }
    }

    /// Device address transactions are issued against.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Write one register.
    pub fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), T::Error> {
        self.transport.write_bytes(self.address, reg, &[value])
    }

    /// Read one register.
    pub fn read_reg(&mut self, reg: u8) -> Result<u8, T::Error> {
        let mut buf = [0u8];
        self.transport.read_bytes(self.address, reg, &mut buf)?;
        Ok(buf[0])
    }

    /// Read-modify-write one register.
    pub fn update_reg(
        &mut self,
        reg: u8,
        f: impl FnOnce(u8) -> u8,
    ) -> Result<(), T::Error> {
        let value = self.read_reg(reg)?;
        self.write_reg(reg, f(value))
    }
}

/// Capability interface a chip backend implements.
///
/// Methods taking a [`Bus`] are generic over the transport so backends
/// stay object-free and monomorphize per bus type. Optional capabilities
/// default to [`DriverError::Unsupported`].
pub trait Codec {
    /// Factory-default 7-bit control address of the chip.
    fn default_address(&self) -> u8;

    /// Full chip initialization for `format`.
    ///
    /// The registry is available for backends that depend on board wiring
    /// (master clock source selection, reset lines).
    fn init<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        registry: &PinRegistry,
        format: &AudioFormat,
    ) -> Result<(), DriverError<T::Error>>;

    /// Power the chip down.
    fn deinit<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
    ) -> Result<(), DriverError<T::Error>>;

    /// Start or stop the signal paths for `mode`.
    fn control_state<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        mode: OperatingMode,
        active: bool,
    ) -> Result<(), DriverError<T::Error>>;

    /// Configure the digital interface (framing, bit depth, role).
    fn configure_interface<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        mode: OperatingMode,
        format: &AudioFormat,
    ) -> Result<(), DriverError<T::Error>>;

    /// Set playback volume, 0..=100.
    fn set_volume<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        volume: u8,
    ) -> Result<(), DriverError<T::Error>>;

    /// Read back playback volume, 0..=100.
    fn volume<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
    ) -> Result<u8, DriverError<T::Error>>;

    /// Mute or unmute every output.
    fn set_mute<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        mute: bool,
    ) -> Result<(), DriverError<T::Error>>;

    /// Mute or unmute a single output line.
    fn set_line_mute<T: CodecTransport>(
        &mut self,
        _bus: &mut Bus<'_, T>,
        _mute: bool,
        _line: OutputRoute,
    ) -> Result<(), DriverError<T::Error>> {
        Err(DriverError::Unsupported)
    }

    /// Set capture gain, 0..=100.
    fn set_input_volume<T: CodecTransport>(
        &mut self,
        _bus: &mut Bus<'_, T>,
        _volume: u8,
    ) -> Result<(), DriverError<T::Error>> {
        Err(DriverError::Unsupported)
    }

    /// Whether playback volume control is implemented.
    fn is_volume_supported(&self) -> bool {
        true
    }

    /// Whether capture gain control is implemented.
    fn is_input_volume_supported(&self) -> bool {
        false
    }
}

/// Lifecycle state of a [`CodecDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    /// No hardware configured yet, or a failed `begin`.
    #[default]
    Uninitialized,
    /// Chip configured, signal paths stopped.
    Configured,
    /// Signal paths running.
    Running,
    /// `end` has run; `begin` may run again.
    Stopped,
}

/// Drives one codec chip through its lifecycle.
pub struct CodecDriver<C: Codec> {
    codec: C,
    state: DriverState,
    format: AudioFormat,
    address_override: Option<u8>,
}

impl<C: Codec> CodecDriver<C> {
    /// Wrap a backend; the driver starts [`DriverState::Uninitialized`].
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            state: DriverState::Uninitialized,
            format: AudioFormat::default(),
            address_override: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Copy of the last applied format.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Borrow the backend.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Override the control address; takes precedence over the registry
    /// binding and the backend default.
    pub fn set_i2c_address(&mut self, address: u8) {
        self.address_override = Some(address);
    }

    /// Control address that transactions will use.
    ///
    /// Resolution order: explicit override, then the codec control-bus
    /// binding, then the backend default.
    pub fn i2c_address(&self, registry: &PinRegistry) -> u8 {
        self.address_override
            .or_else(|| {
                registry
                    .i2c_bus(PinFunction::Codec)
                    .and_then(|bus| bus.address)
            })
            .unwrap_or_else(|| self.codec.default_address())
    }

    /// Bring up pins and chip, then start the signal paths.
    ///
    /// Steps run in order: stamp the resolved address onto the codec
    /// control binding, bring up the registry, configure the chip, enable
    /// the power amplifier. The first failure aborts the sequence and
    /// leaves earlier steps applied; the driver stays `Uninitialized`.
    pub fn begin<T, P>(
        &mut self,
        transport: &mut T,
        platform: &mut P,
        registry: &mut PinRegistry,
        format: AudioFormat,
    ) -> Result<(), DriverError<T::Error>>
    where
        T: CodecTransport,
        P: BusActivation,
    {
        match self.state {
            DriverState::Uninitialized | DriverState::Stopped => {}
            _ => return Err(DriverError::WrongState),
        }
        let address = self.i2c_address(registry);
        if let Some(bus) = registry.i2c_bus_mut(PinFunction::Codec) {
            if bus.address.is_none() {
                bus.address = Some(address);
            }
        }
        if !registry.begin(platform) {
            #[cfg(feature = "defmt")]
            defmt::warn!("pin registry bring-up reported failures");
            return Err(DriverError::ConfigStep("pins"));
        }
        self.apply_config(transport, registry, format)?;
        self.set_pa_power(platform, registry, true)?;
        self.state = DriverState::Running;
        Ok(())
    }

    /// Reconfigure a running or configured chip.
    pub fn set_config<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
        format: AudioFormat,
    ) -> Result<(), DriverError<T::Error>> {
        match self.state {
            DriverState::Configured | DriverState::Running => {}
            _ => return Err(DriverError::WrongState),
        }
        self.apply_config(transport, registry, format)?;
        self.state = DriverState::Running;
        Ok(())
    }

    fn apply_config<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
        format: AudioFormat,
    ) -> Result<(), DriverError<T::Error>> {
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        let mode = format.operating_mode();
        if let Err(err) = self.codec.init(&mut bus, registry, &format) {
            #[cfg(feature = "defmt")]
            defmt::warn!("codec init failed");
            return Err(err);
        }
        if let Err(err) = self.codec.control_state(&mut bus, mode, true) {
            #[cfg(feature = "defmt")]
            defmt::warn!("codec start failed");
            return Err(err);
        }
        if let Err(err) = self.codec.configure_interface(&mut bus, mode, &format) {
            #[cfg(feature = "defmt")]
            defmt::warn!("codec interface configuration failed");
            return Err(err);
        }
        self.format = format;
        Ok(())
    }

    /// Stop the signal paths without losing the configuration.
    pub fn stop<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
    ) -> Result<(), DriverError<T::Error>> {
        if self.state != DriverState::Running {
            return Err(DriverError::WrongState);
        }
        let mode = self.format.operating_mode();
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        self.codec.control_state(&mut bus, mode, false)?;
        self.state = DriverState::Configured;
        Ok(())
    }

    /// Restart the signal paths after [`Self::stop`].
    pub fn start<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
    ) -> Result<(), DriverError<T::Error>> {
        if self.state != DriverState::Configured {
            return Err(DriverError::WrongState);
        }
        let mode = self.format.operating_mode();
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        self.codec.control_state(&mut bus, mode, true)?;
        self.state = DriverState::Running;
        Ok(())
    }

    /// Power the chip down and release the buses.
    ///
    /// Stable under repetition: a second `end` on a stopped driver is a
    /// no-op.
    pub fn end<T, P>(
        &mut self,
        transport: &mut T,
        platform: &mut P,
        registry: &mut PinRegistry,
    ) -> Result<(), DriverError<T::Error>>
    where
        T: CodecTransport,
        P: BusActivation,
    {
        match self.state {
            DriverState::Uninitialized | DriverState::Stopped => return Ok(()),
            _ => {}
        }
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        self.codec.deinit(&mut bus)?;
        registry.end(platform);
        self.state = DriverState::Stopped;
        Ok(())
    }

    /// Drive the power-amplifier enable pin.
    ///
    /// A board without a power amplifier binding is fine; the call logs
    /// and succeeds.
    pub fn set_pa_power<T, P>(
        &mut self,
        platform: &mut P,
        registry: &PinRegistry,
        enable: bool,
    ) -> Result<(), DriverError<T>>
    where
        P: BusActivation,
    {
        let Some(pin) = registry.pin_id(PinFunction::PowerAmp) else {
            #[cfg(feature = "defmt")]
            defmt::info!("no power amplifier pin registered");
            return Ok(());
        };
        let state = if enable { PinState::High } else { PinState::Low };
        platform.write_pin(pin, state);
        Ok(())
    }

    /// Set playback volume, 0..=100. Values above 100 are clamped.
    pub fn set_volume<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
        volume: u8,
    ) -> Result<(), DriverError<T::Error>> {
        self.check_configured()?;
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        self.codec.set_volume(&mut bus, volume.min(100))
    }

    /// Read playback volume from the chip, 0..=100.
    pub fn volume<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
    ) -> Result<u8, DriverError<T::Error>> {
        self.check_configured()?;
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        self.codec.volume(&mut bus)
    }

    /// Mute or unmute every output.
    pub fn set_mute<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
        mute: bool,
    ) -> Result<(), DriverError<T::Error>> {
        self.check_configured()?;
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        self.codec.set_mute(&mut bus, mute)
    }

    /// Mute or unmute one output line, when the chip supports it.
    pub fn set_line_mute<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
        mute: bool,
        line: OutputRoute,
    ) -> Result<(), DriverError<T::Error>> {
        self.check_configured()?;
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        self.codec.set_line_mute(&mut bus, mute, line)
    }

    /// Set capture gain, 0..=100, when the chip supports it.
    pub fn set_input_volume<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        registry: &PinRegistry,
        volume: u8,
    ) -> Result<(), DriverError<T::Error>> {
        self.check_configured()?;
        let mut bus = Bus::new(transport, self.i2c_address(registry));
        self.codec.set_input_volume(&mut bus, volume.min(100))
    }

    fn check_configured<E>(&self) -> Result<(), DriverError<E>> {
        match self.state {
            DriverState::Configured | DriverState::Running => Ok(()),
            _ => Err(DriverError::WrongState),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Transport that records register writes and serves scripted reads.
    #[derive(Default)]
    pub struct MockTransport {
        pub writes: std::vec::Vec<(u8, u8, std::vec::Vec<u8>)>,
        pub regs: std::collections::HashMap<u8, u8>,
        pub fail: bool,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MockBusError;

    impl CodecTransport for MockTransport {
        type Error = MockBusError;

        fn write_bytes(&mut self, address: u8, reg: u8, data: &[u8]) -> Result<(), MockBusError> {
            if self.fail {
                return Err(MockBusError);
            }
            if let Some(value) = data.first() {
                self.regs.insert(reg, *value);
            }
            self.writes.push((address, reg, data.to_vec()));
            Ok(())
        }

        fn read_bytes(
            &mut self,
            _address: u8,
            reg: u8,
            buf: &mut [u8],
        ) -> Result<(), MockBusError> {
            if self.fail {
                return Err(MockBusError);
            }
            for (offset, slot) in buf.iter_mut().enumerate() {
                *slot = *self.regs.get(&(reg + offset as u8)).unwrap_or(&0);
            }
            Ok(())
        }
    }

    impl MockTransport {
        /// Register values written to `reg`, in order.
        pub fn reg_writes(&self, reg: u8) -> std::vec::Vec<u8> {
            self.writes
                .iter()
                .filter(|(_, r, _)| *r == reg)
                .filter_map(|(_, _, data)| data.first().copied())
                .collect()
        }
    }

    #[test]
    fn bus_update_reads_then_writes() {
        let mut transport = MockTransport::default();
        transport.regs.insert(0x17, 0b1111_0000);
        let mut bus = Bus::new(&mut transport, 0x10);
        bus.update_reg(0x17, |v| v | 0x06).unwrap();
        assert_eq!(transport.reg_writes(0x17), vec![0b1111_0110]);
    }

    #[test]
    fn bus_carries_device_address() {
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, 0x18);
        bus.write_reg(0x00, 0x80).unwrap();
        assert_eq!(transport.writes, vec![(0x18, 0x00, vec![0x80])]);
    }
}
