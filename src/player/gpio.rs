use super::input::{LineLevel, LineSource};
use crate::error::{KioskError, Result};
use rppal::gpio::{Gpio, InputPin, Level};
use std::collections::HashMap;
use tracing::{error, info};

/// Raspberry Pi BCM pins configured as inputs with pull-up bias, so a pressed
/// button (shorted to ground) reads low.
pub struct GpioLines {
    pins: HashMap<u8, InputPin>,
}

impl GpioLines {
    pub fn claim(lines: &[u8]) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| {
            error!("GPIO setup error: {}", e);
            KioskError::from(e)
        })?;

        let mut pins = HashMap::with_capacity(lines.len());
        for &line in lines {
            let pin = gpio.get(line).map_err(|e| {
                error!("GPIO setup error on pin {}: {}", line, e);
                KioskError::from(e)
            })?;
            pins.insert(line, pin.into_input_pullup());
        }

        info!("GPIO initialized successfully ({} lines)", pins.len());
        Ok(Self { pins })
    }
}

impl LineSource for GpioLines {
    fn read(&mut self, line: u8) -> Result<LineLevel> {
        let pin = self
            .pins
            .get(&line)
            .ok_or_else(|| KioskError::Gpio(format!("pin {} was not claimed", line)))?;
        Ok(match pin.read() {
            Level::Low => LineLevel::Low,
            Level::High => LineLevel::High,
        })
    }

    fn release(&mut self) {
        // Dropping an InputPin restores the pin's previous mode and bias
        self.pins.clear();
    }
}
