//! Sensor drivers for devices reachable through the bridge
//!
//! Drivers are written against [`embedded_hal::i2c::I2c`], which
//! [`crate::bridge::I2cBridge`] implements, so the same driver also runs on a
//! native bus.

pub mod bmp180;

use thiserror_no_std::Error;

use crate::error::ValidationError;

pub use bmp180::{Bmp180, Oversampling};

/// Devices the host knows how to drive, keyed by their 7-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownDevice {
    /// Bosch BMP180 barometric pressure/temperature sensor
    Bmp180,
}

impl KnownDevice {
    /// Identify the device behind a detected address.
    pub const fn from_address(address: u8) -> Option<Self> {
        match address {
            bmp180::ADDRESS => Some(Self::Bmp180),
            _ => None,
        }
    }

    pub const fn address(self) -> u8 {
        match self {
            Self::Bmp180 => bmp180::ADDRESS,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bmp180 => "BMP180",
        }
    }
}

/// Errors reported by sensor drivers.
///
/// `E` is the error type of the underlying I2C bus.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SensorError<E> {
    /// An I2C round trip failed
    #[error("I2C bus error: {0:?}")]
    Bus(E),

    /// Calibration has not been acquired, or was invalidated by a failed read
    #[error("Sensor not calibrated")]
    NotCalibrated,

    /// The request was rejected before any I/O
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_device_from_address() {
        assert_eq!(KnownDevice::from_address(0x77), Some(KnownDevice::Bmp180));
        assert_eq!(KnownDevice::from_address(0x76), None);
        assert_eq!(KnownDevice::Bmp180.address(), 0x77);
        assert_eq!(KnownDevice::Bmp180.name(), "BMP180");
    }

    #[test]
    fn test_sensor_error_display() {
        use alloc::string::ToString;
        use embedded_hal::i2c::ErrorKind;

        let bus: SensorError<ErrorKind> = SensorError::Bus(ErrorKind::Overrun);
        assert_eq!(bus.to_string(), "I2C bus error: Overrun");
        assert_eq!(
            SensorError::<ErrorKind>::NotCalibrated.to_string(),
            "Sensor not calibrated"
        );

        let invalid: SensorError<ErrorKind> = ValidationError::EmptyTransfer.into();
        assert_eq!(invalid, SensorError::Validation(ValidationError::EmptyTransfer));
    }
}
