//! ES8388 stereo codec backend.
//!
//! Reference: Everest Semiconductor ES8388 datasheet, register map section.
//! The chip has separate ADC and DAC register banks plus two stereo line
//! outputs; the board-level power amplifier usually hangs off line 2.

use crate::driver::{Bus, Codec, CodecTransport};
use crate::error::DriverError;
use crate::format::{AudioFormat, FrameFormat, InputRoute, OperatingMode, OutputRoute, Role};
use crate::pins::PinRegistry;

/// Factory 7-bit I2C address (CE pin low).
pub const ES8388_I2C_ADDR: u8 = 0x10;

/// Register 0x00: chip control 1 (play/record mode, reference enables).
pub const REG_CONTROL1: u8 = 0x00;
/// Register 0x01: chip control 2 (analog power, VREF buffering).
pub const REG_CONTROL2: u8 = 0x01;
/// Register 0x02: chip power management / state machine control.
pub const REG_CHIPPOWER: u8 = 0x02;
/// Register 0x03: ADC power management.
pub const REG_ADCPOWER: u8 = 0x03;
/// Register 0x04: DAC power management and line-out enables.
pub const REG_DACPOWER: u8 = 0x04;
/// Register 0x08: master/slave mode select.
pub const REG_MASTERMODE: u8 = 0x08;
/// Register 0x09: ADC control 1 (MIC PGA gain, one nibble per channel).
pub const REG_ADCCONTROL1: u8 = 0x09;
/// Register 0x0A: ADC control 2 (input select).
pub const REG_ADCCONTROL2: u8 = 0x0a;
/// Register 0x0B: ADC control 3.
pub const REG_ADCCONTROL3: u8 = 0x0b;
/// Register 0x0C: ADC control 4 (data format and word length).
pub const REG_ADCCONTROL4: u8 = 0x0c;
/// Register 0x0D: ADC control 5 (fs mode and MCLK ratio).
pub const REG_ADCCONTROL5: u8 = 0x0d;
/// Register 0x10: left ADC digital volume.
pub const REG_ADCCONTROL8: u8 = 0x10;
/// Register 0x11: right ADC digital volume.
pub const REG_ADCCONTROL9: u8 = 0x11;
/// Register 0x17: DAC control 1 (data format and word length).
pub const REG_DACCONTROL1: u8 = 0x17;
/// Register 0x18: DAC control 2 (fs mode and MCLK ratio).
pub const REG_DACCONTROL2: u8 = 0x18;
/// Register 0x19: DAC control 3 (soft ramp, mute bits 5:2).
pub const REG_DACCONTROL3: u8 = 0x19;
/// Register 0x1A: left DAC digital volume.
pub const REG_DACCONTROL4: u8 = 0x1a;
/// Register 0x1B: right DAC digital volume.
pub const REG_DACCONTROL5: u8 = 0x1b;
/// Register 0x1E: shelving filter coefficient, high bits.
pub const REG_DACCONTROL8: u8 = 0x1e;
/// Register 0x1F: shelving filter coefficient, low bits.
pub const REG_DACCONTROL9: u8 = 0x1f;
/// Register 0x26: mixer source select.
pub const REG_DACCONTROL16: u8 = 0x26;
/// Register 0x27: left mixer control.
pub const REG_DACCONTROL17: u8 = 0x27;
/// Register 0x2A: right mixer control.
pub const REG_DACCONTROL20: u8 = 0x2a;
/// Register 0x2B: DAC/ADC clock and enable control.
pub const REG_DACCONTROL21: u8 = 0x2b;
/// Register 0x2D: VROI output resistance select.
pub const REG_DACCONTROL23: u8 = 0x2d;
/// Register 0x2E: LOUT1 volume.
pub const REG_DACCONTROL24: u8 = 0x2e;
/// Register 0x2F: ROUT1 volume.
pub const REG_DACCONTROL25: u8 = 0x2f;
/// Register 0x30: LOUT2 volume.
pub const REG_DACCONTROL26: u8 = 0x30;
/// Register 0x31: ROUT2 volume.
pub const REG_DACCONTROL27: u8 = 0x31;

/// DACPOWER bit: LOUT1 enabled.
const OUT_LOUT1: u8 = 0x04;
/// DACPOWER bit: ROUT1 enabled.
const OUT_ROUT1: u8 = 0x08;
/// DACPOWER bit: LOUT2 enabled.
const OUT_LOUT2: u8 = 0x10;
/// DACPOWER bit: ROUT2 enabled.
const OUT_ROUT2: u8 = 0x20;

/// ADCCONTROL2 value: LINPUT1/RINPUT1 selected.
const IN_LINE1: u8 = 0x00;
/// ADCCONTROL2 value: LINPUT2/RINPUT2 selected.
const IN_LINE2: u8 = 0x50;
/// ADCCONTROL2 value: differential input.
const IN_DIFFERENTIAL: u8 = 0xf0;

/// Volume register mapping variant.
///
/// AI-Thinker AudioKit boards wire the outputs so that the stock volume
/// mapping is nearly inaudible; the two hacks shift the attenuation into
/// different register pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VolumeHack {
    /// Route volume through both the line-out and DAC digital registers.
    #[default]
    Hack1,
    /// Scale to the full 6-bit line-out range and preload the shelving
    /// filter coefficients.
    Hack2,
    /// Datasheet mapping, line-out registers only.
    Plain,
}

/// ES8388 backend state.
#[derive(Debug)]
pub struct Es8388 {
    volume_hack: VolumeHack,
    /// PGA gain in dB applied to the microphone inputs at init.
    input_gain_db: u8,
    /// Line-out enable bits chosen by the last init, reapplied on start.
    dac_power: u8,
}

impl Default for Es8388 {
    fn default() -> Self {
        Self::new(VolumeHack::Hack1, 25)
    }
}

impl Es8388 {
    /// Backend with an explicit volume mapping and initial PGA gain.
    pub fn new(volume_hack: VolumeHack, input_gain_db: u8) -> Self {
        Self {
            volume_hack,
            input_gain_db,
            dac_power: OUT_LOUT1 | OUT_ROUT1 | OUT_LOUT2 | OUT_ROUT2,
        }
    }

    fn output_power_bits(output: OutputRoute) -> u8 {
        match output {
            OutputRoute::Line1 => OUT_LOUT1 | OUT_ROUT1,
            OutputRoute::Line2 => OUT_LOUT2 | OUT_ROUT2,
            // None keeps the full enable mask at init; start/stop gates
            // the actual DAC power.
            OutputRoute::None | OutputRoute::All => {
                OUT_LOUT1 | OUT_ROUT1 | OUT_LOUT2 | OUT_ROUT2
            }
        }
    }

    fn input_select_bits(input: InputRoute) -> u8 {
        match input {
            InputRoute::Line1 => IN_LINE1,
            InputRoute::Line2 => IN_LINE2,
            _ => IN_DIFFERENTIAL,
        }
    }

    fn frame_bits(frame: FrameFormat) -> u8 {
        match frame {
            FrameFormat::Standard => 0,
            FrameFormat::LeftJustified => 1,
            FrameFormat::RightJustified => 2,
            FrameFormat::Dsp => 3,
            FrameFormat::Tdm => 4,
        }
    }

    fn write_mic_gain<T: CodecTransport>(
        &self,
        bus: &mut Bus<'_, T>,
        gain_db: u8,
    ) -> Result<(), T::Error> {
        // One 3 dB step per count, duplicated into both PGA nibbles.
        let steps = gain_db / 3;
        bus.write_reg(REG_ADCCONTROL1, (steps << 4) + steps)
    }

    fn write_mute<T: CodecTransport>(
        &self,
        bus: &mut Bus<'_, T>,
        mute: bool,
    ) -> Result<(), T::Error> {
        let bits = if mute { 0x3C } else { 0x00 };
        bus.update_reg(REG_DACCONTROL3, |reg| (reg & 0xC3) | bits)
    }
}

impl Codec for Es8388 {
    fn default_address(&self) -> u8 {
        ES8388_I2C_ADDR
    }

    fn init<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        _registry: &PinRegistry,
        format: &AudioFormat,
    ) -> Result<(), DriverError<T::Error>> {
        // Mute with soft-ramp disabled while the chip is reconfigured.
        bus.write_reg(REG_DACCONTROL3, 0x04)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_CONTROL2, 0x50)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_CHIPPOWER, 0x00)
            .map_err(DriverError::transport)?;
        // Disable the internal DLL to improve the 8 kHz rates.
        bus.write_reg(0x35, 0xA0).map_err(DriverError::transport)?;
        bus.write_reg(0x37, 0xD0).map_err(DriverError::transport)?;
        bus.write_reg(0x39, 0xD0).map_err(DriverError::transport)?;
        let role_bits = match format.role {
            Role::Slave => 0x00,
            Role::Master => 0x01,
        };
        bus.write_reg(REG_MASTERMODE, role_bits)
            .map_err(DriverError::transport)?;

        // DAC path.
        bus.write_reg(REG_DACPOWER, 0xC0)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_CONTROL1, 0x12)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_DACCONTROL1, 0x18)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_DACCONTROL2, 0x02)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_DACCONTROL16, 0x00)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_DACCONTROL17, 0x90)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_DACCONTROL20, 0x90)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_DACCONTROL21, 0x80)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_DACCONTROL23, 0x00)
            .map_err(DriverError::transport)?;
        // DAC digital volume to 0 dB.
        bus.write_reg(REG_DACCONTROL5, 0x00)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_DACCONTROL4, 0x00)
            .map_err(DriverError::transport)?;
        self.dac_power = Self::output_power_bits(format.output);
        bus.write_reg(REG_DACPOWER, self.dac_power)
            .map_err(DriverError::transport)?;

        // ADC path.
        bus.write_reg(REG_ADCPOWER, 0xFF)
            .map_err(DriverError::transport)?;
        self.write_mic_gain(bus, self.input_gain_db)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADCCONTROL2, Self::input_select_bits(format.input))
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADCCONTROL3, 0x02)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADCCONTROL4, 0x0d)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADCCONTROL5, 0x02)
            .map_err(DriverError::transport)?;
        // ADC digital volume to 0 dB.
        bus.write_reg(REG_ADCCONTROL8, 0x00)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADCCONTROL9, 0x00)
            .map_err(DriverError::transport)?;
        bus.write_reg(REG_ADCPOWER, 0x09)
            .map_err(DriverError::transport)?;
        Ok(())
    }

    fn deinit<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
    ) -> Result<(), DriverError<T::Error>> {
        // Reset and stop the chip.
        bus.write_reg(REG_CHIPPOWER, 0xFF)
            .map_err(DriverError::transport)
    }

    fn control_state<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        mode: OperatingMode,
        active: bool,
    ) -> Result<(), DriverError<T::Error>> {
        if active {
            let prev = bus
                .read_reg(REG_DACCONTROL21)
                .map_err(DriverError::transport)?;
            bus.write_reg(REG_DACCONTROL21, 0x80)
                .map_err(DriverError::transport)?;
            if prev != 0x80 {
                // Restart the internal state machine.
                bus.write_reg(REG_CHIPPOWER, 0xF0)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_CHIPPOWER, 0x00)
                    .map_err(DriverError::transport)?;
            }
            if matches!(mode, OperatingMode::Encode | OperatingMode::Both) {
                bus.write_reg(REG_ADCPOWER, 0x00)
                    .map_err(DriverError::transport)?;
            }
            if matches!(mode, OperatingMode::Decode | OperatingMode::Both) {
                bus.write_reg(REG_DACPOWER, self.dac_power)
                    .map_err(DriverError::transport)?;
                self.write_mute(bus, false).map_err(DriverError::transport)?;
            }
        } else {
            if matches!(mode, OperatingMode::Decode | OperatingMode::Both) {
                bus.write_reg(REG_DACPOWER, 0x00)
                    .map_err(DriverError::transport)?;
                self.write_mute(bus, true).map_err(DriverError::transport)?;
            }
            if matches!(mode, OperatingMode::Encode | OperatingMode::Both) {
                bus.write_reg(REG_ADCPOWER, 0xFF)
                    .map_err(DriverError::transport)?;
            }
            if mode == OperatingMode::Both {
                // Gate MCLK once both paths are down.
                bus.write_reg(REG_DACCONTROL21, 0x9C)
                    .map_err(DriverError::transport)?;
            }
        }
        Ok(())
    }

    fn configure_interface<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        mode: OperatingMode,
        format: &AudioFormat,
    ) -> Result<(), DriverError<T::Error>> {
        let frame = Self::frame_bits(format.frame);
        let bits = format.bits as u8;
        if matches!(mode, OperatingMode::Encode | OperatingMode::Both) {
            bus.update_reg(REG_ADCCONTROL4, |reg| (reg & 0xfc) | frame)
                .map_err(DriverError::transport)?;
        }
        if matches!(mode, OperatingMode::Decode | OperatingMode::Both) {
            bus.update_reg(REG_DACCONTROL1, |reg| (reg & 0xf9) | (frame << 1))
                .map_err(DriverError::transport)?;
        }
        if matches!(mode, OperatingMode::Encode | OperatingMode::Both) {
            bus.update_reg(REG_ADCCONTROL4, |reg| (reg & 0xe3) | (bits << 2))
                .map_err(DriverError::transport)?;
        }
        if matches!(mode, OperatingMode::Decode | OperatingMode::Both) {
            bus.update_reg(REG_DACCONTROL1, |reg| (reg & 0xc7) | (bits << 3))
                .map_err(DriverError::transport)?;
        }
        Ok(())
    }

    fn set_volume<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        volume: u8,
    ) -> Result<(), DriverError<T::Error>> {
        let volume = volume.min(100);
        match self.volume_hack {
            VolumeHack::Hack1 => {
                let steps = volume / 3;
                bus.write_reg(REG_DACCONTROL4, 0x00)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL5, 0x00)
                    .map_err(DriverError::transport)?;
                for reg in [
                    REG_DACCONTROL24,
                    REG_DACCONTROL25,
                    REG_DACCONTROL26,
                    REG_DACCONTROL27,
                ] {
                    bus.write_reg(reg, steps).map_err(DriverError::transport)?;
                }
            }
            VolumeHack::Hack2 => {
                let scaled = (u16::from(volume) * 63 / 100) as u8;
                bus.write_reg(REG_DACCONTROL24, scaled)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL25, scaled)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL26, 0x00)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL27, 0x00)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL8, 192 >> 2)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL9, 192 >> 2)
                    .map_err(DriverError::transport)?;
            }
            VolumeHack::Plain => {
                let steps = volume / 3;
                bus.write_reg(REG_DACCONTROL24, steps)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL25, steps)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL26, 0x00)
                    .map_err(DriverError::transport)?;
                bus.write_reg(REG_DACCONTROL27, 0x00)
                    .map_err(DriverError::transport)?;
            }
        }
        Ok(())
    }

    fn volume<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
    ) -> Result<u8, DriverError<T::Error>> {
        let reg = bus
            .read_reg(REG_DACCONTROL24)
            .map_err(DriverError::transport)?;
        let volume = reg.saturating_mul(3);
        // 33 steps * 3 = 99; report full scale.
        Ok(if volume == 99 { 100 } else { volume })
    }

    fn set_mute<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        mute: bool,
    ) -> Result<(), DriverError<T::Error>> {
        self.write_mute(bus, mute).map_err(DriverError::transport)
    }

    fn set_input_volume<T: CodecTransport>(
        &mut self,
        bus: &mut Bus<'_, T>,
        volume: u8,
    ) -> Result<(), DriverError<T::Error>> {
        // 0..=100 maps to the 0..=10 step range of the PGA ladder.
        let gain_db = volume.min(100) / 10;
        self.write_mic_gain(bus, gain_db)
            .map_err(DriverError::transport)
    }

    fn is_input_volume_supported(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::driver::tests::MockTransport;
    use crate::format::BitDepth;

    fn init_chip(codec: &mut Es8388, transport: &mut MockTransport, format: &AudioFormat) {
        let registry = PinRegistry::new();
        let mut bus = Bus::new(transport, ES8388_I2C_ADDR);
        codec.init(&mut bus, &registry, format).unwrap();
    }

    #[test]
    fn init_starts_with_hard_mute() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        init_chip(&mut codec, &mut transport, &AudioFormat::default());
        let (_, reg, data) = &transport.writes[0];
        assert_eq!(*reg, REG_DACCONTROL3);
        assert_eq!(data.as_slice(), &[0x04]);
    }

    #[test]
    fn init_selects_output_power_bits() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        let mut format = AudioFormat::default();
        format.output = OutputRoute::Line2;
        init_chip(&mut codec, &mut transport, &format);
        assert_eq!(transport.reg_writes(REG_DACPOWER), vec![0xC0, 0x30]);
    }

    #[test]
    fn init_selects_input_route() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        let mut format = AudioFormat::default();
        format.input = InputRoute::Differential;
        init_chip(&mut codec, &mut transport, &format);
        assert_eq!(transport.reg_writes(REG_ADCCONTROL2), vec![0xf0]);
    }

    #[test]
    fn init_applies_default_mic_gain() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        init_chip(&mut codec, &mut transport, &AudioFormat::default());
        // 25 dB default becomes 8 steps in each nibble.
        assert_eq!(transport.reg_writes(REG_ADCCONTROL1), vec![0x88]);
    }

    #[test]
    fn volume_hack1_mirrors_all_four_outputs() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, ES8388_I2C_ADDR);
        codec.set_volume(&mut bus, 70).unwrap();
        for reg in [
            REG_DACCONTROL24,
            REG_DACCONTROL25,
            REG_DACCONTROL26,
            REG_DACCONTROL27,
        ] {
            assert_eq!(transport.reg_writes(reg), vec![23]);
        }
        assert_eq!(transport.reg_writes(REG_DACCONTROL4), vec![0x00]);
    }

    #[test]
    fn volume_round_trip_reports_full_scale() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, ES8388_I2C_ADDR);
        codec.set_volume(&mut bus, 100).unwrap();
        let read_back = codec.volume(&mut bus).unwrap();
        // 33 steps read back as 99, reported as 100.
        assert_eq!(read_back, 100);
    }

    #[test]
    fn mute_touches_only_the_mute_bits() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        transport.regs.insert(REG_DACCONTROL3, 0b1100_0011);
        let mut bus = Bus::new(&mut transport, ES8388_I2C_ADDR);
        codec.set_mute(&mut bus, true).unwrap();
        codec.set_mute(&mut bus, false).unwrap();
        assert_eq!(
            transport.reg_writes(REG_DACCONTROL3),
            vec![0b1111_1111, 0b1100_0011]
        );
    }

    #[test]
    fn interface_configuration_sets_format_and_depth() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        let mut format = AudioFormat::default();
        format.bits = BitDepth::Bits24;
        format.frame = FrameFormat::LeftJustified;
        let mut bus = Bus::new(&mut transport, ES8388_I2C_ADDR);
        codec
            .configure_interface(&mut bus, OperatingMode::Both, &format)
            .unwrap();
        // Frame bits land first, depth second; Bits24 encodes as 0.
        assert_eq!(transport.reg_writes(REG_ADCCONTROL4), vec![0x01, 0x01]);
        assert_eq!(transport.reg_writes(REG_DACCONTROL1), vec![0x02, 0x02]);
    }

    #[test]
    fn stop_both_powers_down_and_gates_mclk() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, ES8388_I2C_ADDR);
        codec
            .control_state(&mut bus, OperatingMode::Both, false)
            .unwrap();
        assert_eq!(transport.reg_writes(REG_DACPOWER), vec![0x00]);
        assert_eq!(transport.reg_writes(REG_ADCPOWER), vec![0xFF]);
        assert_eq!(transport.reg_writes(REG_DACCONTROL21), vec![0x9C]);
    }

    #[test]
    fn start_restarts_state_machine_once() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, ES8388_I2C_ADDR);
        codec
            .control_state(&mut bus, OperatingMode::Decode, true)
            .unwrap();
        // A second start sees 0x80 already latched and skips the restart.
        codec
            .control_state(&mut bus, OperatingMode::Decode, true)
            .unwrap();
        assert_eq!(transport.reg_writes(REG_CHIPPOWER), vec![0xF0, 0x00]);
    }

    #[test]
    fn line_mute_is_unsupported() {
        let mut codec = Es8388::default();
        let mut transport = MockTransport::default();
        let mut bus = Bus::new(&mut transport, ES8388_I2C_ADDR);
        assert!(matches!(
            codec.set_line_mute(&mut bus, true, OutputRoute::Line2),
            Err(DriverError::Unsupported)
        ));
    }
}
