//! Raspberry Pi adapters: MCP3008 over SPI0 for the air sensor, memory-
//! mapped GPIO (BCM numbering) for the relay board.

use crate::domain::model::Level;
use crate::domain::ports::{Adc, Gpio};
use crate::utils::error::{CompressorError, Result};
use rppal::gpio::OutputPin;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::collections::HashMap;

fn hardware_err<E: std::fmt::Display>(err: E) -> CompressorError {
    CompressorError::HardwareError {
        message: err.to_string(),
    }
}

pub struct Mcp3008 {
    spi: Spi,
    channel: u8,
}

impl Mcp3008 {
    pub fn new(channel: u8) -> Result<Self> {
        if channel > 7 {
            return Err(CompressorError::SensorError {
                message: format!("MCP3008 has channels 0-7, got {}", channel),
            });
        }

        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 1_350_000, Mode::Mode0)
            .map_err(hardware_err)?;
        Ok(Self { spi, channel })
    }
}

impl Adc for Mcp3008 {
    fn read(&mut self) -> Result<f64> {
        // Start bit, then single-ended mode + channel in the top nibble.
        let tx = [0x01, (0x08 | self.channel) << 4, 0x00];
        let mut rx = [0u8; 3];
        self.spi.transfer(&mut rx, &tx).map_err(hardware_err)?;

        let raw = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        Ok(f64::from(raw) / 1023.0)
    }
}

pub struct PiGpio {
    gpio: rppal::gpio::Gpio,
    pins: HashMap<u8, OutputPin>,
}

impl PiGpio {
    pub fn new() -> Result<Self> {
        Ok(Self {
            gpio: rppal::gpio::Gpio::new().map_err(hardware_err)?,
            pins: HashMap::new(),
        })
    }
}

impl Gpio for PiGpio {
    fn setup_output(&mut self, pin: u8) -> Result<()> {
        if self.pins.contains_key(&pin) {
            return Ok(());
        }

        let output = self.gpio.get(pin).map_err(hardware_err)?.into_output();
        self.pins.insert(pin, output);
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<()> {
        let output = self
            .pins
            .get_mut(&pin)
            .ok_or_else(|| CompressorError::HardwareError {
                message: format!("pin {} was not configured as an output", pin),
            })?;

        match level {
            Level::Low => output.set_low(),
            Level::High => output.set_high(),
        }
        Ok(())
    }
}
