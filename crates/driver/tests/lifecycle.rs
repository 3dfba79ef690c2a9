//! End-to-end lifecycle tests driving a codec through begin, stop,
//! start, reconfiguration and end against mock bus and platform layers.

#![allow(clippy::unwrap_used)]

use audio_driver::backends::es8388::ES8388_I2C_ADDR;
use audio_driver::pins::{
    presets, BusActivation, FunctionPin, GpioPin, I2cBusPins, PinFunction, PinState, SpiBusPins,
};
use audio_driver::{
    AudioFormat, CodecDriver, CodecTransport, DriverError, DriverState, Es8311, Es8388,
};

/// Register-level I2C mock shared by the lifecycle tests.
#[derive(Default)]
struct ScriptedBus {
    writes: Vec<(u8, u8, Vec<u8>)>,
    regs: std::collections::HashMap<u8, u8>,
    fail_after: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BusError;

impl CodecTransport for ScriptedBus {
    type Error = BusError;

    fn write_bytes(&mut self, address: u8, reg: u8, data: &[u8]) -> Result<(), BusError> {
        if let Some(limit) = self.fail_after {
            if self.writes.len() >= limit {
                return Err(BusError);
            }
        }
        if let Some(value) = data.first() {
            self.regs.insert(reg, *value);
        }
        self.writes.push((address, reg, data.to_vec()));
        Ok(())
    }

    fn read_bytes(&mut self, _address: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        for (offset, slot) in buf.iter_mut().enumerate() {
            *slot = *self.regs.get(&(reg + offset as u8)).unwrap_or(&0);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Platform {
    pin_writes: Vec<(GpioPin, PinState)>,
    i2c_setups: usize,
    i2c_teardowns: usize,
}

impl BusActivation for Platform {
    fn setup_pin(&mut self, _pin: &FunctionPin) -> bool {
        true
    }
    fn write_pin(&mut self, pin: GpioPin, state: PinState) -> bool {
        self.pin_writes.push((pin, state));
        true
    }
    fn setup_i2c(&mut self, _bus: &I2cBusPins) -> bool {
        self.i2c_setups += 1;
        true
    }
    fn teardown_i2c(&mut self, _bus: &I2cBusPins) -> bool {
        self.i2c_teardowns += 1;
        true
    }
    fn setup_spi(&mut self, _bus: &SpiBusPins) -> bool {
        true
    }
    fn teardown_spi(&mut self, _bus: &SpiBusPins) -> bool {
        true
    }
}

#[test]
fn begin_walks_through_running() {
    let mut driver = CodecDriver::new(Es8388::default());
    let mut bus = ScriptedBus::default();
    let mut platform = Platform::default();
    let mut registry = presets::audiokit_es8388_v1();

    assert_eq!(driver.state(), DriverState::Uninitialized);
    driver
        .begin(&mut bus, &mut platform, &mut registry, AudioFormat::default())
        .unwrap();
    assert_eq!(driver.state(), DriverState::Running);
    assert_eq!(platform.i2c_setups, 1);
    // Every chip transaction used the codec address.
    assert!(bus.writes.iter().all(|(addr, _, _)| *addr == ES8388_I2C_ADDR));
}

#[test]
fn begin_twice_is_a_state_error() {
    let mut driver = CodecDriver::new(Es8388::default());
    let mut bus = ScriptedBus::default();
    let mut platform = Platform::default();
    let mut registry = presets::audiokit_es8388_v1();

    driver
        .begin(&mut bus, &mut platform, &mut registry, AudioFormat::default())
        .unwrap();
    assert!(matches!(
        driver.begin(&mut bus, &mut platform, &mut registry, AudioFormat::default()),
        Err(DriverError::WrongState)
    ));
}

#[test]
fn stop_and_start_toggle_running() {
    let mut driver = CodecDriver::new(Es8388::default());
    let mut bus = ScriptedBus::default();
    let mut platform = Platform::default();
    let mut registry = presets::audiokit_es8388_v1();

    driver
        .begin(&mut bus, &mut platform, &mut registry, AudioFormat::default())
        .unwrap();
    driver.stop(&mut bus, &registry).unwrap();
    assert_eq!(driver.state(), DriverState::Configured);
    // Volume still allowed while configured.
    driver.set_volume(&mut bus, &registry, 50).unwrap();
    driver.start(&mut bus, &registry).unwrap();
    assert_eq!(driver.state(), DriverState::Running);
}

#[test]
fn end_reaches_stopped_and_is_stable() {
    let mut driver = CodecDriver::new(Es8388::default());
    let mut bus = ScriptedBus::default();
    let mut platform = Platform::default();
    let mut registry = presets::audiokit_es8388_v1();

    driver
        .begin(&mut bus, &mut platform, &mut registry, AudioFormat::default())
        .unwrap();
    driver.end(&mut bus, &mut platform, &mut registry).unwrap();
    assert_eq!(driver.state(), DriverState::Stopped);
    assert_eq!(platform.i2c_teardowns, 1);

    // A second end is a no-op.
    driver.end(&mut bus, &mut platform, &mut registry).unwrap();
    assert_eq!(platform.i2c_teardowns, 1);

    // And the driver can be brought up again.
    driver
        .begin(&mut bus, &mut platform, &mut registry, AudioFormat::default())
        .unwrap();
    assert_eq!(driver.state(), DriverState::Running);
}

#[test]
fn volume_outside_lifecycle_is_rejected() {
    let mut driver = CodecDriver::new(Es8388::default());
    let mut bus = ScriptedBus::default();
    let registry = presets::audiokit_es8388_v1();

    assert!(matches!(
        driver.set_volume(&mut bus, &registry, 10),
        Err(DriverError::WrongState)
    ));
    assert!(matches!(
        driver.set_mute(&mut bus, &registry, true),
        Err(DriverError::WrongState)
    ));
}

#[test]
fn failed_begin_leaves_driver_uninitialized() {
    let mut driver = CodecDriver::new(Es8388::default());
    let mut bus = ScriptedBus {
        fail_after: Some(4),
        ..ScriptedBus::default()
    };
    let mut platform = Platform::default();
    let mut registry = presets::audiokit_es8388_v1();

    let result = driver.begin(&mut bus, &mut platform, &mut registry, AudioFormat::default());
    assert!(matches!(result, Err(DriverError::Transport(_))));
    assert_eq!(driver.state(), DriverState::Uninitialized);
    // No rollback: the writes that succeeded stay applied.
    assert_eq!(bus.writes.len(), 4);
}

#[test]
fn begin_stamps_address_onto_registry_binding() {
    let mut driver = CodecDriver::new(Es8388::default());
    let mut bus = ScriptedBus::default();
    let mut platform = Platform::default();
    let mut registry = presets::audiokit_es8388_v1();
    // Simulate a board description without a known address.
    let mut binding = *registry.i2c_bus(PinFunction::Codec).unwrap();
    binding.address = None;
    registry.set_i2c(binding).unwrap();

    driver
        .begin(&mut bus, &mut platform, &mut registry, AudioFormat::default())
        .unwrap();
    assert_eq!(
        registry.i2c_bus(PinFunction::Codec).unwrap().address,
        Some(ES8388_I2C_ADDR)
    );
}

#[test]
fn address_override_wins_over_binding_and_default() {
    let mut driver = CodecDriver::new(Es8388::default());
    let registry = presets::audiokit_es8388_v1();
    assert_eq!(driver.i2c_address(&registry), 0x10);
    driver.set_i2c_address(0x11);
    assert_eq!(driver.i2c_address(&registry), 0x11);
}

#[test]
fn es8311_begin_requires_mclk_source_binding() {
    let mut driver = CodecDriver::new(Es8311::new());
    let mut bus = ScriptedBus::default();
    let mut platform = Platform::default();
    // AudioKit wiring has no MCLK source selector.
    let mut registry = presets::audiokit_es8388_v1();

    let result = driver.begin(&mut bus, &mut platform, &mut registry, AudioFormat::default());
    assert!(matches!(
        result,
        Err(DriverError::MissingPin(PinFunction::MclkSource))
    ));
    assert_eq!(driver.state(), DriverState::Uninitialized);
}
