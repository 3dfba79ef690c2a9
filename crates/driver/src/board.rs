//! Board composition: one codec driver plus one pin registry.
//!
//! [`Board`] is a thin pairing layer. It owns the registry and the
//! driver, remembers the volume the caller asked for so reads are not
//! distorted by register rounding, and couples the power-amplifier line
//! into line mutes.

use crate::driver::{Codec, CodecDriver, CodecTransport, DriverState};
use crate::error::DriverError;
use crate::format::{AudioFormat, OutputRoute};
use crate::pins::{BusActivation, PinRegistry};

/// Board-level options, read once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    /// Volume applied right after a successful `begin`.
    pub default_volume: u8,
    /// Output line wired to the power amplifier; muting this line also
    /// drops the amplifier enable pin.
    pub pa_line: OutputRoute,
    /// Whether the SD bus is brought up together with the codec buses.
    pub sd_active: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            default_volume: 70,
            pa_line: OutputRoute::Line1,
            sd_active: true,
        }
    }
}

/// A codec driver bound to the registry describing its board.
pub struct Board<C: Codec> {
    driver: CodecDriver<C>,
    registry: PinRegistry,
    config: DriverConfig,
    format: AudioFormat,
    /// Last requested volume, reported back without register rounding.
    volume: Option<u8>,
}

impl<C: Codec> Board<C> {
    /// Compose a board with default options.
    pub fn new(codec: C, registry: PinRegistry) -> Self {
        Self::with_config(codec, registry, DriverConfig::default())
    }

    /// Compose a board with explicit options.
    pub fn with_config(codec: C, registry: PinRegistry, config: DriverConfig) -> Self {
        Self {
            driver: CodecDriver::new(codec),
            registry,
            config,
            format: AudioFormat::default(),
            volume: None,
        }
    }

    /// Borrow the pin registry.
    pub fn pins(&self) -> &PinRegistry {
        &self.registry
    }

    /// Mutably borrow the pin registry.
    pub fn pins_mut(&mut self) -> &mut PinRegistry {
        &mut self.registry
    }

    /// Borrow the codec driver.
    pub fn driver(&self) -> &CodecDriver<C> {
        &self.driver
    }

    /// Mutably borrow the codec driver.
    pub fn driver_mut(&mut self) -> &mut CodecDriver<C> {
        &mut self.driver
    }

    /// True while the board is between a successful `begin` and `end`.
    pub fn is_active(&self) -> bool {
        matches!(
            self.driver.state(),
            DriverState::Configured | DriverState::Running
        )
    }

    /// Bring the board up with the last (or default) format.
    pub fn begin<T, P>(
        &mut self,
        transport: &mut T,
        platform: &mut P,
    ) -> Result<(), DriverError<T::Error>>
    where
        T: CodecTransport,
        P: BusActivation,
    {
        let format = self.format;
        self.begin_with(transport, platform, format)
    }

    /// Bring the board up with an explicit format.
    ///
    /// On success the default (or previously requested) volume is
    /// applied.
    pub fn begin_with<T, P>(
        &mut self,
        transport: &mut T,
        platform: &mut P,
        format: AudioFormat,
    ) -> Result<(), DriverError<T::Error>>
    where
        T: CodecTransport,
        P: BusActivation,
    {
        self.format = format;
        self.registry.set_sd_active(self.config.sd_active);
        self.driver
            .begin(transport, platform, &mut self.registry, format)?;
        let volume = self.volume.unwrap_or(self.config.default_volume);
        self.set_volume(transport, volume)
    }

    /// Reconfigure the codec without a full restart.
    pub fn set_config<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        format: AudioFormat,
    ) -> Result<(), DriverError<T::Error>> {
        self.format = format;
        self.driver.set_config(transport, &self.registry, format)
    }

    /// Power down the codec and release the buses.
    pub fn end<T, P>(
        &mut self,
        transport: &mut T,
        platform: &mut P,
    ) -> Result<(), DriverError<T::Error>>
    where
        T: CodecTransport,
        P: BusActivation,
    {
        self.driver.end(transport, platform, &mut self.registry)
    }

    /// Set playback volume, 0..=100; the requested value is cached.
    pub fn set_volume<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        volume: u8,
    ) -> Result<(), DriverError<T::Error>> {
        // Cache first so the request survives an inactive board.
        self.volume = Some(volume.min(100));
        self.driver.set_volume(transport, &self.registry, volume)
    }

    /// Volume as last requested, falling back to a chip read.
    pub fn volume<T: CodecTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<u8, DriverError<T::Error>> {
        match self.volume {
            Some(volume) => Ok(volume),
            None => self.driver.volume(transport, &self.registry),
        }
    }

    /// Mute or unmute every output.
    pub fn set_mute<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        mute: bool,
    ) -> Result<(), DriverError<T::Error>> {
        self.driver.set_mute(transport, &self.registry, mute)
    }

    /// Mute one output line, dropping the power amplifier with it when
    /// the line feeds the amplifier.
    pub fn set_mute_line<T, P>(
        &mut self,
        transport: &mut T,
        platform: &mut P,
        mute: bool,
        line: OutputRoute,
    ) -> Result<(), DriverError<T::Error>>
    where
        T: CodecTransport,
        P: BusActivation,
    {
        if line == self.config.pa_line {
            self.driver
                .set_pa_power::<T::Error, P>(platform, &self.registry, !mute)?;
        }
        self.driver
            .set_line_mute(transport, &self.registry, mute, line)
    }

    /// Set capture gain, 0..=100, when the chip supports it.
    pub fn set_input_volume<T: CodecTransport>(
        &mut self,
        transport: &mut T,
        volume: u8,
    ) -> Result<(), DriverError<T::Error>> {
        self.driver
            .set_input_volume(transport, &self.registry, volume)
    }

    /// Drive the power-amplifier pin directly.
    pub fn set_pa_power<T, P>(
        &mut self,
        platform: &mut P,
        enable: bool,
    ) -> Result<(), DriverError<T>>
    where
        P: BusActivation,
    {
        if !self.is_active() {
            return Err(DriverError::WrongState);
        }
        self.driver
            .set_pa_power::<T, P>(platform, &self.registry, enable)
    }
}
