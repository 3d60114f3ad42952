//! Cancellable polling loop
//!
//! [`Monitor::run`] drives a [`Bmp180`] until its [`CancellationToken`] is
//! cancelled:
//!
//! ```text
//!         ┌──────────────┐  fail: wait retry_interval
//!  ──────►│ Uncalibrated │◄─────────────┐
//!         └──────┬───────┘              │
//!                │ acquire_calibration  │ read failure
//!                ▼                      │
//!         ┌──────────────┐              │
//!         │  Calibrated  │──────────────┘
//!         └──────┬───────┘
//!                │ temperature, pressure, on_reading, wait poll_interval
//!                └──► (next iteration)
//! ```
//!
//! The token is only checked between iterations. An in-flight round trip
//! always completes or times out first.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::sensors::{Bmp180, Oversampling};

/// Shared stop flag, cancelled from a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub oversampling: Oversampling,
    /// Wait between two successful measurement cycles
    pub poll_interval: Duration,
    /// Wait after a failed calibration attempt
    pub retry_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            oversampling: Oversampling::UltraLowPower,
            poll_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// One measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// °C
    pub temperature: f64,
    /// Millibar; `None` when the pressure conversion failed after a good
    /// temperature reading
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Monitor {
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Poll `sensor` until `token` is cancelled, passing every reading to
    /// `on_reading`. Returns the number of readings reported.
    ///
    /// Failures never end the loop: a failed calibration is retried after
    /// `retry_interval`, a failed reading sends the sensor back to
    /// calibration.
    pub fn run<I, D, W, F>(
        &self,
        sensor: &mut Bmp180<I, D>,
        delay: &mut W,
        token: &CancellationToken,
        mut on_reading: F,
    ) -> usize
    where
        I: I2c,
        D: DelayNs,
        W: DelayNs,
        F: FnMut(Reading),
    {
        let mut readings = 0;

        while !token.is_cancelled() {
            if !sensor.is_calibrated() {
                info!("Acquiring BMP180 calibration");
                if let Err(e) = sensor.acquire_calibration() {
                    warn!("Calibration failed: {e}");
                    delay.delay_ms(millis(self.settings.retry_interval));
                    continue;
                }
            }

            let temperature = match sensor.read_temperature() {
                Ok(temperature) => temperature,
                Err(e) => {
                    warn!("Temperature reading failed: {e}");
                    continue;
                }
            };

            let pressure = match sensor.read_pressure(temperature, self.settings.oversampling.into())
            {
                Ok(pressure) => Some(pressure),
                Err(e) => {
                    warn!("Pressure reading failed: {e}");
                    None
                }
            };

            on_reading(Reading {
                temperature,
                pressure,
            });
            readings += 1;

            delay.delay_ms(millis(self.settings.poll_interval));
        }

        info!("Monitor stopped after {readings} readings");
        readings
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
