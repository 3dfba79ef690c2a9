//! Pin and bus resource registry.
//!
//! A [`PinRegistry`] maps logical roles ([`PinFunction`]) to physical pin
//! assignments for audio buses, SPI buses, control (I2C) buses and plain
//! GPIO pins. The registry never touches hardware itself; bring-up and
//! teardown are delegated to a [`BusActivation`] implementation supplied by
//! the platform layer, keeping this crate free of HAL dependencies beyond
//! the bus traits.

use heapless::Vec;

use crate::error::PinsError;

/// Physical pin identifier as numbered by the platform.
pub type GpioPin = u8;

/// Logical role a pin or bus plays on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinFunction {
    /// Headphone jack insertion detect.
    HeadphoneDetect,
    /// Auxiliary input insertion detect.
    AuxInDetect,
    /// Power amplifier enable.
    PowerAmp,
    /// Status LED.
    Led,
    /// User button.
    Key,
    /// SD card bus.
    Sd,
    /// Primary codec.
    Codec,
    /// Secondary ADC-only codec.
    CodecAdc,
    /// Master clock source select.
    MclkSource,
    /// Chip reset line.
    Reset,
    /// Latch line for shift-register expanders.
    Latch,
    /// GPIO expander chip.
    Expander,
}

/// Electrical behavior of a GPIO function pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinLogic {
    /// Input, asserted when high.
    InputActiveHigh,
    /// Input with pull-up, asserted when low.
    InputActiveLow,
    /// Plain input, no assertion polarity.
    Input,
    /// Output.
    Output,
}

/// Logic level written to an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    /// Logic low.
    Low,
    /// Logic high.
    High,
}

/// Pin assignment for a digital audio (I2S-style) bus.
///
/// Missing lines are `None`; a capture-only bus has no `data_out`, for
/// example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioBusPins {
    /// Role of this bus.
    pub function: PinFunction,
    /// Master clock output.
    pub mclk: Option<GpioPin>,
    /// Bit clock.
    pub bck: Option<GpioPin>,
    /// Word select / LR clock.
    pub ws: Option<GpioPin>,
    /// Host-to-codec data.
    pub data_out: Option<GpioPin>,
    /// Codec-to-host data.
    pub data_in: Option<GpioPin>,
    /// Peripheral port number on the host.
    pub port: u8,
}

/// Pin assignment for an SPI bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiBusPins {
    /// Role of this bus.
    pub function: PinFunction,
    /// Clock line.
    pub clk: GpioPin,
    /// Controller-in line.
    pub miso: GpioPin,
    /// Controller-out line.
    pub mosi: GpioPin,
    /// Chip select.
    pub cs: GpioPin,
    /// Peripheral port number on the host.
    pub bus: u8,
    /// Whether this bus participates in `begin`/`end`.
    pub active: bool,
}

impl SpiBusPins {
    fn uses_pin(&self, pin: GpioPin) -> bool {
        self.clk == pin || self.miso == pin || self.mosi == pin || self.cs == pin
    }
}

/// Pin assignment for a control (I2C) bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cBusPins {
    /// Role of this bus.
    pub function: PinFunction,
    /// Clock line.
    pub scl: GpioPin,
    /// Data line.
    pub sda: GpioPin,
    /// 7-bit device address, when known at registration time.
    pub address: Option<u8>,
    /// Bus frequency.
    pub frequency_hz: u32,
    /// Peripheral port number on the host.
    pub bus: u8,
    /// Whether this bus participates in `begin`/`end`.
    pub active: bool,
}

impl I2cBusPins {
    /// Binding with the conventional 100 kHz frequency on port 0.
    pub fn new(function: PinFunction, scl: GpioPin, sda: GpioPin, address: Option<u8>) -> Self {
        Self {
            function,
            scl,
            sda,
            address,
            frequency_hz: 100_000,
            bus: 0,
            active: true,
        }
    }

    fn uses_pin(&self, pin: GpioPin) -> bool {
        self.scl == pin || self.sda == pin
    }
}

/// A single general-purpose pin with a logical role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionPin {
    /// Role of this pin.
    pub function: PinFunction,
    /// Physical pin.
    pub pin: GpioPin,
    /// Electrical behavior.
    pub logic: PinLogic,
    /// Disambiguates multiple pins of the same role (key 1..6, led 1..2).
    pub index: u8,
    /// Whether this pin participates in `begin`.
    pub active: bool,
}

impl FunctionPin {
    /// Active pin with index 0.
    pub fn new(function: PinFunction, pin: GpioPin, logic: PinLogic) -> Self {
        Self::with_index(function, pin, logic, 0)
    }

    /// Active pin with an explicit index.
    pub fn with_index(function: PinFunction, pin: GpioPin, logic: PinLogic, index: u8) -> Self {
        Self {
            function,
            pin,
            logic,
            index,
            active: true,
        }
    }
}

/// Platform seam for bus bring-up, teardown and GPIO access.
///
/// Implementations own the real peripherals. Each setup/teardown reports
/// success as a `bool`; the registry accumulates results and never aborts
/// half-way through a bring-up pass.
pub trait BusActivation {
    /// Configure a GPIO pin per its [`PinLogic`].
    fn setup_pin(&mut self, pin: &FunctionPin) -> bool;
    /// Drive an output pin.
    fn write_pin(&mut self, pin: GpioPin, state: PinState) -> bool;
    /// Bring up an I2C bus.
    fn setup_i2c(&mut self, bus: &I2cBusPins) -> bool;
    /// Tear down an I2C bus.
    fn teardown_i2c(&mut self, bus: &I2cBusPins) -> bool;
    /// Bring up an SPI bus.
    fn setup_spi(&mut self, bus: &SpiBusPins) -> bool;
    /// Tear down an SPI bus.
    fn teardown_spi(&mut self, bus: &SpiBusPins) -> bool;
}

const MAX_AUDIO_BUSES: usize = 2;
const MAX_SPI_BUSES: usize = 2;
const MAX_I2C_BUSES: usize = 2;
const MAX_FUNCTION_PINS: usize = 16;

/// Registry of every pin and bus binding on a board.
///
/// Bindings are added once, then looked up by function. `begin` and `end`
/// sequence bus bring-up through a [`BusActivation`].
#[derive(Debug, Default)]
pub struct PinRegistry {
    audio: Vec<AudioBusPins, MAX_AUDIO_BUSES>,
    spi: Vec<SpiBusPins, MAX_SPI_BUSES>,
    i2c: Vec<I2cBusPins, MAX_I2C_BUSES>,
    pins: Vec<FunctionPin, MAX_FUNCTION_PINS>,
    sd_active: bool,
    started: bool,
}

impl PinRegistry {
    /// Empty registry with SD auto-activation enabled.
    pub fn new() -> Self {
        Self {
            sd_active: true,
            ..Self::default()
        }
    }

    /// Register an audio bus binding.
    pub fn add_audio(&mut self, binding: AudioBusPins) -> Result<(), PinsError> {
        if self.audio.iter().any(|b| b.function == binding.function) {
            return Err(PinsError::AlreadyBound);
        }
        self.audio.push(binding).map_err(|_| PinsError::Capacity)
    }

    /// Register an SPI bus binding.
    pub fn add_spi(&mut self, binding: SpiBusPins) -> Result<(), PinsError> {
        if self.spi.iter().any(|b| b.function == binding.function) {
            return Err(PinsError::AlreadyBound);
        }
        self.spi.push(binding).map_err(|_| PinsError::Capacity)
    }

    /// Register a control bus binding.
    ///
    /// Two control buses may share physical pins as long as at most one of
    /// them is active, so no pin-level uniqueness is enforced here.
    pub fn add_i2c(&mut self, binding: I2cBusPins) -> Result<(), PinsError> {
        if self.i2c.iter().any(|b| b.function == binding.function) {
            return Err(PinsError::AlreadyBound);
        }
        self.i2c.push(binding).map_err(|_| PinsError::Capacity)
    }

    /// Register a general-purpose pin binding.
    pub fn add_pin(&mut self, binding: FunctionPin) -> Result<(), PinsError> {
        if self
            .pins
            .iter()
            .any(|p| p.function == binding.function && p.index == binding.index)
        {
            return Err(PinsError::AlreadyBound);
        }
        self.pins.push(binding).map_err(|_| PinsError::Capacity)
    }

    /// Replace an existing audio bus binding.
    pub fn set_audio(&mut self, binding: AudioBusPins) -> Result<(), PinsError> {
        match self
            .audio
            .iter_mut()
            .find(|b| b.function == binding.function)
        {
            Some(slot) => {
                *slot = binding;
                Ok(())
            }
            None => Err(PinsError::NotBound),
        }
    }

    /// Replace an existing SPI bus binding.
    pub fn set_spi(&mut self, binding: SpiBusPins) -> Result<(), PinsError> {
        match self.spi.iter_mut().find(|b| b.function == binding.function) {
            Some(slot) => {
                *slot = binding;
                Ok(())
            }
            None => Err(PinsError::NotBound),
        }
    }

    /// Replace an existing control bus binding.
    pub fn set_i2c(&mut self, binding: I2cBusPins) -> Result<(), PinsError> {
        match self.i2c.iter_mut().find(|b| b.function == binding.function) {
            Some(slot) => {
                *slot = binding;
                Ok(())
            }
            None => Err(PinsError::NotBound),
        }
    }

    /// Replace an existing general-purpose pin binding.
    pub fn set_pin(&mut self, binding: FunctionPin) -> Result<(), PinsError> {
        match self
            .pins
            .iter_mut()
            .find(|p| p.function == binding.function && p.index == binding.index)
        {
            Some(slot) => {
                *slot = binding;
                Ok(())
            }
            None => Err(PinsError::NotBound),
        }
    }

    /// Audio bus for a function.
    pub fn audio_bus(&self, function: PinFunction) -> Option<&AudioBusPins> {
        self.audio.iter().find(|b| b.function == function)
    }

    /// Audio bus by host port number.
    pub fn audio_bus_by_port(&self, port: u8) -> Option<&AudioBusPins> {
        self.audio.iter().find(|b| b.port == port)
    }

    /// SPI bus for a function.
    pub fn spi_bus(&self, function: PinFunction) -> Option<&SpiBusPins> {
        self.spi.iter().find(|b| b.function == function)
    }

    /// Control bus for a function.
    pub fn i2c_bus(&self, function: PinFunction) -> Option<&I2cBusPins> {
        self.i2c.iter().find(|b| b.function == function)
    }

    /// Mutable control bus for a function.
    pub fn i2c_bus_mut(&mut self, function: PinFunction) -> Option<&mut I2cBusPins> {
        self.i2c.iter_mut().find(|b| b.function == function)
    }

    /// General-purpose pin binding for a function and index.
    pub fn pin(&self, function: PinFunction, index: u8) -> Option<&FunctionPin> {
        self.pins
            .iter()
            .find(|p| p.function == function && p.index == index)
    }

    /// Physical pin of the first binding for a function, any index.
    pub fn pin_id(&self, function: PinFunction) -> Option<GpioPin> {
        self.pins
            .iter()
            .find(|p| p.function == function)
            .map(|p| p.pin)
    }

    /// True if any general-purpose pins are registered.
    pub fn has_pins(&self) -> bool {
        !self.pins.is_empty()
    }

    /// Control whether the SD bus is brought up by `begin`.
    pub fn set_sd_active(&mut self, active: bool) {
        self.sd_active = active;
    }

    /// Whether the SD bus is brought up by `begin`.
    pub fn sd_active(&self) -> bool {
        self.sd_active
    }

    /// True once `begin` has run and `end` has not.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Bring up every active bus and configure every function pin.
    ///
    /// Function pins whose physical pin collides with an active bus line
    /// are deactivated with a warning rather than failing the call; the
    /// bus keeps the pin. Bus bring-up results are accumulated, so a
    /// failing bus does not stop later buses from being attempted.
    /// Returns true only when every attempted bring-up succeeded.
    pub fn begin<P: BusActivation>(&mut self, platform: &mut P) -> bool {
        let mut result = true;
        for bus in &self.spi {
            if bus.function == PinFunction::Sd && !self.sd_active {
                continue;
            }
            if bus.active {
                result &= platform.setup_spi(bus);
            }
        }
        for bus in &self.i2c {
            if bus.active {
                result &= platform.setup_i2c(bus);
            }
        }
        for idx in 0..self.pins.len() {
            let Some(pin) = self.pins.get(idx).copied() else {
                break;
            };
            if !pin.active {
                continue;
            }
            if self.bus_conflict(pin.pin) {
                #[cfg(feature = "defmt")]
                defmt::warn!("pin {} not set up because of bus conflict", pin.pin);
                if let Some(slot) = self.pins.get_mut(idx) {
                    slot.active = false;
                }
                continue;
            }
            result &= platform.setup_pin(&pin);
        }
        self.started = true;
        result
    }

    /// Tear down every active bus. GPIO pins are left as configured.
    ///
    /// Safe to call repeatedly; teardown of an already-stopped registry is
    /// a no-op.
    pub fn end<P: BusActivation>(&mut self, platform: &mut P) {
        if !self.started {
            return;
        }
        for bus in &self.spi {
            if bus.active {
                let _ = platform.teardown_spi(bus);
            }
        }
        for bus in &self.i2c {
            if bus.active {
                let _ = platform.teardown_i2c(bus);
            }
        }
        self.started = false;
    }

    fn bus_conflict(&self, pin: GpioPin) -> bool {
        let spi_hit = self.spi.iter().any(|b| {
            b.active && b.uses_pin(pin) && (b.function != PinFunction::Sd || self.sd_active)
        });
        let i2c_hit = self.i2c.iter().any(|b| b.active && b.uses_pin(pin));
        spi_hit || i2c_hit
    }
}

pub mod presets {
    //! Ready-made registries for common codec dev boards.
    //!
    //! Each preset is a constructor returning an owned registry, so two
    //! boards in one process never share state.

    use super::{
        AudioBusPins, FunctionPin, I2cBusPins, PinFunction, PinLogic, PinRegistry, SpiBusPins,
    };

    /// Shared SD-card SPI wiring on ESP32-style audio kits.
    fn sd_spi() -> SpiBusPins {
        SpiBusPins {
            function: PinFunction::Sd,
            clk: 14,
            miso: 2,
            mosi: 15,
            cs: 13,
            bus: 0,
            active: true,
        }
    }

    fn audiokit_keys(registry: &mut PinRegistry) {
        for (index, pin) in [(1u8, 36u8), (2, 13), (3, 19), (4, 23), (5, 18), (6, 5)] {
            // Capacity is sized for the full preset; errors cannot occur
            // while building from empty.
            let _ = registry.add_pin(FunctionPin::with_index(
                PinFunction::Key,
                pin,
                PinLogic::InputActiveLow,
                index,
            ));
        }
    }

    /// AudioKit v1 wiring for the ES8388 (AC-plug variant).
    pub fn audiokit_es8388_v1() -> PinRegistry {
        let mut registry = PinRegistry::new();
        let _ = registry.add_spi(sd_spi());
        let _ = registry.add_i2c(I2cBusPins::new(PinFunction::Codec, 32, 33, Some(0x10)));
        let _ = registry.add_audio(AudioBusPins {
            function: PinFunction::Codec,
            mclk: Some(0),
            bck: Some(27),
            ws: Some(25),
            data_out: Some(26),
            data_in: Some(35),
            port: 0,
        });
        audiokit_keys(&mut registry);
        let _ = registry.add_pin(FunctionPin::new(
            PinFunction::AuxInDetect,
            12,
            PinLogic::InputActiveLow,
        ));
        let _ = registry.add_pin(FunctionPin::new(
            PinFunction::HeadphoneDetect,
            39,
            PinLogic::InputActiveLow,
        ));
        let _ = registry.add_pin(FunctionPin::new(PinFunction::PowerAmp, 21, PinLogic::Output));
        let _ = registry.add_pin(FunctionPin::new(PinFunction::Led, 22, PinLogic::Output));
        registry
    }

    /// AudioKit v2 wiring for the ES8388 (alternate I2C/I2S routing).
    pub fn audiokit_es8388_v2() -> PinRegistry {
        let mut registry = PinRegistry::new();
        let _ = registry.add_spi(sd_spi());
        let _ = registry.add_i2c(I2cBusPins::new(PinFunction::Codec, 23, 18, Some(0x10)));
        let _ = registry.add_audio(AudioBusPins {
            function: PinFunction::Codec,
            mclk: Some(0),
            bck: Some(5),
            ws: Some(25),
            data_out: Some(26),
            data_in: Some(35),
            port: 0,
        });
        audiokit_keys(&mut registry);
        let _ = registry.add_pin(FunctionPin::new(
            PinFunction::AuxInDetect,
            12,
            PinLogic::InputActiveLow,
        ));
        let _ = registry.add_pin(FunctionPin::new(
            PinFunction::HeadphoneDetect,
            39,
            PinLogic::InputActiveLow,
        ));
        let _ = registry.add_pin(FunctionPin::new(PinFunction::PowerAmp, 21, PinLogic::Output));
        let _ = registry.add_pin(FunctionPin::new(PinFunction::Led, 22, PinLogic::Output));
        registry
    }
}
