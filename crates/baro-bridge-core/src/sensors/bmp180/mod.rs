//! BMP180 barometric pressure and temperature driver
//!
//! The driver is generic over any [`I2c`] bus and [`DelayNs`] source. It
//! holds the factory calibration once acquired and refuses to convert
//! readings without it.
//!
//! ## Measurement cycle
//!
//! ```text
//!  acquire_calibration()      11 x (write [reg], read 2)
//!          |
//!  read_temperature()         write [F4, 2E], wait 5 ms, write [F6], read 2
//!          |
//!  read_pressure(T, oss)      write [F4, 34|oss<<6], wait, write [F6], read 3
//! ```
//!
//! Any bus failure during a reading drops the calibration so the caller has
//! to re-acquire it before trusting the device again.

pub mod calibration;
pub mod registers;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use super::SensorError;
use crate::error::ValidationError;

pub use calibration::{Calibration, CalibrationWords, Coefficients, raw_pressure};
pub use registers::ADDRESS;
use registers::{
    CALIBRATION_REGISTERS, COMMAND_PRESSURE, COMMAND_TEMPERATURE, PRESSURE_SETTLE_MS, Register,
    TEMPERATURE_SETTLE_MS,
};

/// Pressure oversampling level (`oss` in the datasheet).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    #[default]
    UltraLowPower = 0,
    Standard = 1,
    HighResolution = 2,
    UltraHighResolution = 3,
}

impl Oversampling {
    /// Control register value that starts a pressure conversion at this level
    pub const fn control_command(self) -> u8 {
        COMMAND_PRESSURE + ((self as u8) << 6)
    }

    pub const fn settle_delay_ms(self) -> u32 {
        PRESSURE_SETTLE_MS[self as usize]
    }
}

impl TryFrom<u8> for Oversampling {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::UltraLowPower),
            1 => Ok(Self::Standard),
            2 => Ok(Self::HighResolution),
            3 => Ok(Self::UltraHighResolution),
            other => Err(ValidationError::InvalidOversampling(other)),
        }
    }
}

impl From<Oversampling> for u8 {
    fn from(value: Oversampling) -> Self {
        value as u8
    }
}

pub struct Bmp180<I, D> {
    i2c: I,
    delay: D,
    calibration: Option<Calibration>,
}

impl<I, D> Bmp180<I, D>
where
    I: I2c,
    D: DelayNs,
{
    /// Create an uncalibrated driver. No I/O is performed.
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            calibration: None,
        }
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Give back the bus and delay source.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    /// Read all eleven calibration words and derive the coefficients.
    ///
    /// Either every word is read and the calibration replaced, or the
    /// previous state is left untouched.
    pub fn acquire_calibration(&mut self) -> Result<&Calibration, SensorError<I::Error>> {
        let mut raw = [[0u8; 2]; 11];
        for (register, word) in CALIBRATION_REGISTERS.iter().zip(raw.iter_mut()) {
            self.read_register(*register, word)
                .map_err(SensorError::Bus)?;
        }

        let words = CalibrationWords::from_be_words(&raw);
        let calibration = Calibration::from(words);
        debug!("BMP180 calibration words: {words:?}");
        debug!("BMP180 coefficients: {:?}", calibration.coefficients);
        info!("BMP180 calibrated");

        Ok(&*self.calibration.insert(calibration))
    }

    /// Run a temperature conversion and return the compensated value in °C.
    pub fn read_temperature(&mut self) -> Result<f64, SensorError<I::Error>> {
        let coefficients = self.coefficients()?;

        let mut raw = [0u8; 2];
        let measured = self.convert(COMMAND_TEMPERATURE, TEMPERATURE_SETTLE_MS, &mut raw);
        self.invalidate_on_error(measured)?;

        let raw = u16::from_be_bytes(raw);
        let temperature = coefficients.temperature(raw);
        debug!("BMP180 UT = {raw}, T = {temperature:.3}");
        Ok(temperature)
    }

    /// Run a pressure conversion and return the compensated value in millibar.
    ///
    /// `temperature` must be a reading taken just before this call;
    /// `oversampling` is validated before any bus traffic.
    pub fn read_pressure(
        &mut self,
        temperature: f64,
        oversampling: u8,
    ) -> Result<f64, SensorError<I::Error>> {
        let oversampling = Oversampling::try_from(oversampling)?;
        let coefficients = self.coefficients()?;

        let mut raw = [0u8; 3];
        let measured = self.convert(
            oversampling.control_command(),
            oversampling.settle_delay_ms(),
            &mut raw,
        );
        self.invalidate_on_error(measured)?;

        let pressure = coefficients.pressure(raw, temperature);
        debug!(
            "BMP180 UP = {}, P = {pressure:.3}",
            raw_pressure(raw, oversampling.into())
        );
        Ok(pressure)
    }

    /// Temperature then pressure, as one measurement cycle.
    pub fn read_temperature_and_pressure(
        &mut self,
        oversampling: Oversampling,
    ) -> Result<(f64, f64), SensorError<I::Error>> {
        let temperature = self.read_temperature()?;
        let pressure = self.read_pressure(temperature, oversampling.into())?;
        Ok((temperature, pressure))
    }

    fn coefficients(&self) -> Result<Coefficients, SensorError<I::Error>> {
        self.calibration
            .as_ref()
            .map(|calibration| calibration.coefficients)
            .ok_or(SensorError::NotCalibrated)
    }

    fn invalidate_on_error(&mut self, result: Result<(), I::Error>) -> Result<(), SensorError<I::Error>> {
        result.map_err(|e| {
            warn!("BMP180 reading failed, dropping calibration: {e:?}");
            self.calibration = None;
            SensorError::Bus(e)
        })
    }

    fn read_register(&mut self, register: Register, buf: &mut [u8]) -> Result<(), I::Error> {
        self.i2c.write(ADDRESS, &[register as u8])?;
        self.i2c.read(ADDRESS, buf)
    }

    fn convert(&mut self, command: u8, settle_ms: u32, buf: &mut [u8]) -> Result<(), I::Error> {
        self.i2c.write(ADDRESS, &[Register::Control as u8, command])?;
        self.delay.delay_ms(settle_ms);
        self.read_register(Register::Result, buf)
    }
}
