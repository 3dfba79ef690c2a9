//! ES8311 mono codec backend.
//!
//! Reference: Everest Semiconductor ES8311 datasheet. The chip derives
//! its whole clock tree from MCLK (or, optionally, from the bit clock),
//! so initialization resolves divider coefficients through the shared
//! clock table before anything else is configured.
//!
//! The board selects the clock source through the
//! [`PinFunction::MclkSource`] binding: pin 0 means the dedicated MCLK
//! pin, any other value means the bit clock. A board without that
//! binding cannot run this chip.

use crate::clock::{self, ES8311_COEFFS};
use crate::driver::{Bus, Codec, CodecTransport};
use crate::error::DriverError;
use crate::format::{AudioFormat, BitDepth, FrameFormat, OperatingMode, Role};
use crate::pins::{PinFunction, PinRegistry};

/// Factory 7-bit I2C address (CE pin low).
pub const ES8311_I2C_ADDR: u8 = 0x18;

/// Register 0x00: reset and master-mode control.
pub const REG_RESET: u8 = 0x00;
/// Register 0x01: clock manager, MCLK source and gates.
pub const REG_CLK_MANAGER1: u8 = 0x01;
/// Register 0x02: clock manager, pre-divider and multiplier.
pub const REG_CLK_MANAGER2: u8 = 0x02;
/// Register 0x03: clock manager, fs mode and ADC OSR.
pub const REG_CLK_MANAGER3: u8 = 0x03;
/// Register 0x04: clock manager, DAC OSR.
pub const REG_CLK_MANAGER4: u8 = 0x04;
/// Register 0x05: clock manager, ADC/DAC clock dividers.
pub const REG_CLK_MANAGER5: u8 = 0x05;
/// Register 0x06: clock manager, BCLK divider and inversion.
pub const REG_CLK_MANAGER6: u8 = 0x06;
/// Register 0x07: clock manager, LRCK divider high bits.
pub const REG_CLK_MANAGER7: u8 = 0x07;
/// Register 0x08: clock manager, LRCK divider low bits.
pub const REG_CLK_MANAGER8: u8 = 0x08;
/// Register 0x09: serial data port, DAC side (format, word length, gate).
pub const REG_SDP_IN: u8 = 0x09;
/// Register 0x0A: serial data port, ADC side (format, word length, gate).
pub const REG_SDP_OUT: u8 = 0x0a;
/// Register 0x0B: system, power control.
pub const REG_SYSTEM_0B: u8 = 0x0b;
/// Register 0x0C: system, power control.
pub const REG_SYSTEM_0C: u8 = 0x0c;
/// Register 0x0D: system, analog power.
pub const REG_SYSTEM_0D: u8 = 0x0d;
/// Register 0x0E: system, analog enables.
pub const REG_SYSTEM_0E: u8 = 0x0e;
/// Register 0x10: system, bias configuration.
pub const REG_SYSTEM_10: u8 = 0x10;
/// Register 0x11: system, bias configuration.
pub const REG_SYSTEM_11: u8 = 0x11;
/// Register 0x12: system, DAC enable gate.
pub const REG_SYSTEM_12: u8 = 0x12;
/// Register 0x13: system, headphone driver.
pub const REG_SYSTEM_13: u8 = 0x13;
/// Register 0x14: system, analog input select and PGA.
pub const REG_SYSTEM_14: u8 = 0x14;
/// Register 0x15: ADC, ramp rate.
pub const REG_ADC_15: u8 = 0x15;
/// Register 0x16: ADC, microphone gain scale.
pub const REG_ADC_16: u8 = 0x16;
/// Register 0x17: ADC, digital volume.
pub const REG_ADC_17: u8 = 0x17;
/// Register 0x1B: ADC, soft mute and HPF.
pub const REG_ADC_1B: u8 = 0x1b;
/// Register 0x1C: ADC, equalizer bypass.
pub const REG_ADC_1C: u8 = 0x1c;
/// Register 0x31: DAC, mute control bits 6:5.
pub const REG_DAC_31: u8 = 0x31;
/// Register 0x32: DAC, digital volume.
pub const REG_DAC_32: u8 = 0x32;
/// Register 0x37: DAC, ramp and offset control.
pub const REG_DAC_37: u8 = 0x37;
/// Register 0x45: general purpose control.
pub const REG_GP_45: u8 = 0x45;

/// MCLK is synthesized at 256 * fs.
const MCLK_RATE_RATIO: u32 = 256;

/// Where the chip takes its master clock from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum MclkSource {
    MclkPin,
    SclkPin,
}

/// ES8311 backend.
#[derive(Debug, Default)]
pub struct Es8311;

impl Es8311 {
    /// Backend with default settings.
    pub fn new() -> Self {
        Self
    }

    fn mclk_source(registry: &PinRegistry) -> Result<MclkSource, PinFunction> {
        match registry.pin_id(PinFunction::MclkSource) {
            Some(0) => Ok(MclkSource::MclkPin),
            Some(_) => Ok(MclkSource::SclkPin),
            None => Err(PinFunction::MclkSource),
        }
    }

    fn pre_multi_bits(pre_multi: u8) -> u8 {
        match pre_multi {
            2 => 1,
            4 => 2,
            8 => 3,
            _ => 0,
        }
    }

    fn apply_clock<T: CodecTransport>(
        &self,
        bus: &mut Bus<'_, T>,
        source: MclkSource,
        rate_hz: u32,
    ) -> Result<(), DriverError<T::Error>> {
        let mclk_hz = rate_hz * MCLK_RATE_RATIO;
        let solution = clock::resolve(&ES8311_COEFFS, mclk_hz, rate_hz)?;
        let coeffs = solution.coefficients;

        let mut multi = Self::pre_multi_bits(coeffs.pre_multi);
        if source == MclkSource::SclkPin {
            // DIG_MCLK = LRCK * 256 = BCLK * 8.
            multi = 3;
        }
        bus.update_reg(REG_CLK_MANAGER2, |reg| {
            (reg & 0x07) | ((coeffs.pre_div - 1) << 5) | (multi << 3)
        })
        .map_err(DriverError::transport)?;
        bus.write_reg(
            REG_CLK_MANAGER5,
            ((coeffs.adc_div - 1) << 4) | (coeffs.dac_div - 1),
        )
        .map_err(DriverError::transport)?;
        bus.update_reg(REG_CLK_MANAGER3, |reg| {
            (reg & 0x80) | (coeffs.fs_mode << 6) | coeffs.adc_osr
        })
        .map_err(DriverError::transport)?;
        bus.update_reg(REG_CLK_MANAGER4, |reg| (reg & 0x80) | coeffs.dac_osr)
            .map_err(DriverError::transport)?;
        bus.update_reg(REG_CLK_MANAGER7, |reg| (reg & 0xC0) | coeffs.lrck_h)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_CLK_MANAGER8, coeffs.lrck_l)
            .map_err(DriverError::transport)?;
        let bclk_bits = if coeffs.bclk_div < 19 {
            coeffs.bclk_div - 1
        } else {
            coeffs.bclk_div
        };
        bus.update_reg(REG_CLK_MANAGER6, |reg| (reg & 0xE0) | bclk_bits)
            .map_err(DriverError::transport)?;
        Ok(())
    }
}

impl Codec for Es8311 {
    fn default_address(&self) -> u8 {
        ES8311_I2C_ADDR
    }

    fn init<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        registry: &PinRegistry,
        format: &AudioFormat,
    ) -> Result<(), DriverError<T::Error>> {
        let source = Self::mclk_source(registry).map_err(DriverError::MissingPin)?;

        bus.write_reg(REG_CLK_MANAGER1, 0x30)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_CLK_MANAGER2, 0x00)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_CLK_MANAGER3, 0x10)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADC_16, 0x24)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_CLK_MANAGER4, 0x10)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_CLK_MANAGER5, 0x00)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_SYSTEM_0B, 0x00)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_SYSTEM_0C, 0x00)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_SYSTEM_10, 0x1F)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_SYSTEM_11, 0x7F)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_RESET, 0x80)
            .map_err(DriverError::transport)?;

        bus.update_reg(REG_RESET, |reg| match format.role {
            Role::Master => reg | 0x40,
            Role::Slave => reg & 0xBF,
        })
        .map_err(DriverError::transport)?;
        bus.write_reg(REG_CLK_MANAGER1, 0x3F)
            .map_err(DriverError::transport)?;
        bus.update_reg(REG_CLK_MANAGER1, |reg| match source {
            MclkSource::MclkPin => reg & 0x7F,
            MclkSource::SclkPin => reg | 0x80,
        })
        .map_err(DriverError::transport)?;

        self.apply_clock(bus, source, format.rate_hz())?;

        // MCLK and SCLK not inverted.
        bus.update_reg(REG_CLK_MANAGER1, |reg| reg & !0x40)
            .map_err(DriverError::transport)?;
        bus.update_reg(REG_CLK_MANAGER6, |reg| reg & !0x20)
            .map_err(DriverError::transport)?;

        bus.write_reg(REG_SYSTEM_13, 0x10)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADC_1B, 0x0A)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADC_1C, 0x6A)
            .map_err(DriverError::transport)?;
        Ok(())
    }

    fn deinit<T: CodecTransport>(
        &mut self,
        _bus: &mut Bus<'_, T>,
    ) -> Result<(), DriverError<T::Error>> {
        Ok(())
    }

    fn control_state<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        mode: OperatingMode,
        active: bool,
    ) -> Result<(), DriverError<T::Error>> {
        if active {
            // Gate both serial ports, then open the paths the mode needs.
            let mut dac_gate = true;
            let mut adc_gate = true;
            if matches!(mode, OperatingMode::Encode | OperatingMode::Both) {
                adc_gate = false;
            }
            if matches!(mode, OperatingMode::Decode | OperatingMode::Both) {
                dac_gate = false;
            }
            bus.update_reg(REG_SDP_IN, |reg| {
                let reg = reg & 0xBF;
                if dac_gate {
                    reg | 0x40
                } else {
                    reg
                }
            })
            .map_err(DriverError::transport)?;
            bus.update_reg(REG_SDP_OUT, |reg| {
                let reg = reg & 0xBF;
                if adc_gate {
                    reg | 0x40
                } else {
                    reg
                }
            })
            .map_err(DriverError::transport)?;

            bus.write_reg(REG_ADC_17, 0xBF)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_0E, 0x02)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_12, 0x00)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_14, 0x1A)
                .map_err(DriverError::transport)?;
            // Analog microphone; the PDM path stays off.
            bus.update_reg(REG_SYSTEM_14, |reg| reg & !0x40)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_0D, 0x01)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_ADC_15, 0x40)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_DAC_37, 0x48)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_GP_45, 0x00)
                .map_err(DriverError::transport)?;
        } else {
            // Suspend sequence.
            bus.write_reg(REG_DAC_32, 0x00)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_ADC_17, 0x00)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_0E, 0xFF)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_12, 0x02)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_14, 0x00)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_0D, 0xFA)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_ADC_15, 0x00)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_DAC_37, 0x08)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_GP_45, 0x01)
                .map_err(DriverError::transport)?;
        }
        Ok(())
    }

    fn configure_interface<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        _mode: OperatingMode,
        format: &AudioFormat,
    ) -> Result<(), DriverError<T::Error>> {
        // Word length first, then framing, both serial ports together.
        let depth_bits = match format.bits {
            BitDepth::Bits24 => 0x00,
            BitDepth::Bits32 => 0x10,
            _ => 0x0c,
        };
        bus.update_reg(REG_SDP_IN, |reg| reg | depth_bits)
            .map_err(DriverError::transport)?;
        bus.update_reg(REG_SDP_OUT, |reg| reg | depth_bits)
            .map_err(DriverError::transport)?;

        let apply_frame = |reg: u8| match format.frame {
            FrameFormat::Standard | FrameFormat::Tdm => reg & 0xFC,
            FrameFormat::LeftJustified | FrameFormat::RightJustified => (reg & 0xFC) | 0x01,
            FrameFormat::Dsp => (reg & 0xDC) | 0x03,
        };
        bus.update_reg(REG_SDP_IN, apply_frame)
            .map_err(DriverError::transport)?;
        bus.update_reg(REG_SDP_OUT, apply_frame)
            .map_err(DriverError::transport)?;
        Ok(())
    }

    fn set_volume<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        volume: u8,
    ) -> Result<(), DriverError<T::Error>> {
        let volume = u32::from(volume.min(100));
        #[allow(clippy::cast_possible_truncation)]
        let value = (volume * 2550 / 1000) as u8;
        bus.write_reg(REG_DAC_32, value)
            .map_err(DriverError::transport)
    }

    fn volume<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
    ) -> Result<u8, DriverError<T::Error>> {
        let reg = bus.read_reg(REG_DAC_32).map_err(DriverError::transport)?;
        #[allow(clippy::cast_possible_truncation)]
        let volume = (u16::from(reg) * 100 / 256) as u8;
        Ok(volume)
    }

    fn set_mute<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        mute: bool,
    ) -> Result<(), DriverError<T::Error>> {
        let regv = bus.read_reg(REG_DAC_31).map_err(DriverError::transport)? & 0x9f;
        if mute {
            bus.write_reg(REG_SYSTEM_12, 0x02)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_DAC_31, regv | 0x60)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_DAC_32, 0x00)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_DAC_37, 0x08)
                .map_err(DriverError::transport)?;
        } else {
            bus.write_reg(REG_DAC_31, regv)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_SYSTEM_12, 0x00)
                .map_err(DriverError::transport)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::tests::MockTransport;
    use crate::error::ClockError;
    use crate::pins::{FunctionPin, PinLogic};

    fn registry_with_mclk_pin(pin: u8) -> PinRegistry {
        let mut registry = PinRegistry::new();
        registry
            .add_pin(FunctionPin::new(
                PinFunction::MclkSource,
                pin,
                PinLogic::Output,
            ))
            .unwrap();
        registry
    }

    #[test]
    fn init_without_mclk_source_binding_fails() {
        let mut codec = Es8311::new();
        let mut transport = MockTransport::default();
        let registry = PinRegistry::new();
        let mut bus = Bus::new(&mut transport, ES8311_I2C_ADDR);
        let err = codec
            .init(&mut bus, &registry, &AudioFormat::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::MissingPin(PinFunction::MclkSource)
        ));
    }

    #[test]
    fn init_applies_clock_coefficients_for_the_rate() {
        let mut codec = Es8311::new();
        let mut transport = MockTransport::default();
        let registry = registry_with_mclk_pin(0);
        let mut bus = Bus::new(&mut transport, ES8311_I2C_ADDR);
        codec
            .init(&mut bus, &registry, &AudioFormat::default())
            .unwrap();
        // 44.1 kHz at 256*fs matches the 11.2896 MHz row: pre_div 1,
        // pre_multi x1, so the divider field ends up zeroed.
        let writes = transport.reg_writes(REG_CLK_MANAGER2);
        assert_eq!(writes.last().copied(), Some(0x00));
        // adc_div = dac_div = 1.
        assert_eq!(transport.reg_writes(REG_CLK_MANAGER5), vec![0x00, 0x00]);
        // bclk_div 0x04 lands as 0x03.
        assert_eq!(
            transport.reg_writes(REG_CLK_MANAGER6).last().copied(),
            Some(0x03)
        );
    }

    #[test]
    fn init_unreachable_rate_reports_clock_error() {
        let mut codec = Es8311::new();
        let mut transport = MockTransport::default();
        let registry = registry_with_mclk_pin(0);
        let mut format = AudioFormat::default();
        format.set_rate_hz(192_000);
        let mut bus = Bus::new(&mut transport, ES8311_I2C_ADDR);
        let err = codec.init(&mut bus, &registry, &format).unwrap_err();
        assert!(matches!(err, DriverError::Clock(ClockError::NoMatch { .. })));
    }

    #[test]
    fn sclk_sourced_clock_forces_multiplier_x8() {
        let mut codec = Es8311::new();
        let mut transport = MockTransport::default();
        let registry = registry_with_mclk_pin(1);
        let mut bus = Bus::new(&mut transport, ES8311_I2C_ADDR);
        codec
            .init(&mut bus, &registry, &AudioFormat::default())
            .unwrap();
        // Clock source bit set and the multiplier field pinned to 3.
        let clk1 = transport.regs.get(&REG_CLK_MANAGER1).copied().unwrap();
        assert_eq!(clk1 & 0x80, 0x80);
        let clk2 = transport.regs.get(&REG_CLK_MANAGER2).copied().unwrap();
        assert_eq!((clk2 >> 3) & 0x03, 3);
    }

    #[test]
    fn volume_scales_to_the_full_register_range() {
        let mut codec = Es8311::new();
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, ES8311_I2C_ADDR);
        codec.set_volume(&mut bus, 100).unwrap();
        codec.set_volume(&mut bus, 0).unwrap();
        assert_eq!(transport.reg_writes(REG_DAC_32), vec![255, 0]);
    }

    #[test]
    fn mute_preserves_unrelated_dac_bits() {
        let mut codec = Es8311::new();
        let mut transport = MockTransport::default();
        transport.regs.insert(REG_DAC_31, 0x9f);
        let mut bus = Bus::new(&mut transport, ES8311_I2C_ADDR);
        codec.set_mute(&mut bus, true).unwrap();
        assert_eq!(transport.reg_writes(REG_DAC_31), vec![0xff]);
        assert_eq!(transport.reg_writes(REG_SYSTEM_12), vec![0x02]);
    }

    #[test]
    fn start_opens_only_the_requested_paths() {
        let mut codec = Es8311::new();
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, ES8311_I2C_ADDR);
        codec
            .control_state(&mut bus, OperatingMode::Decode, true)
            .unwrap();
        // DAC port ungated, ADC port gated.
        assert_eq!(transport.reg_writes(REG_SDP_IN), vec![0x00]);
        assert_eq!(transport.reg_writes(REG_SDP_OUT), vec![0x40]);
    }

    #[test]
    fn suspend_sequence_matches_power_down_order() {
        let mut codec = Es8311::new();
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, ES8311_I2C_ADDR);
        codec
            .control_state(&mut bus, OperatingMode::Both, false)
            .unwrap();
        assert_eq!(transport.reg_writes(REG_SYSTEM_0D), vec![0xFA]);
        assert_eq!(transport.reg_writes(REG_GP_45), vec![0x01]);
    }
}
