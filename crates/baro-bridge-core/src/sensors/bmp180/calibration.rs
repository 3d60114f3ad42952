//! BMP180 calibration words and floating-point compensation.
//!
//! The eleven factory words are turned into thirteen polynomial coefficients
//! once, following the floating-point formulation of the datasheet's integer
//! algorithm. Scale factors are kept as exact powers of two so results match
//! the published formulas bit for bit.

const TWO_POW_11: f64 = 2048.0;
const TWO_POW_15: f64 = 32768.0;
const TWO_POW_M13: f64 = 1.0 / 8192.0;
const TWO_POW_M15: f64 = 1.0 / 32768.0;
const TWO_POW_M20: f64 = 1.0 / 1_048_576.0;
const TWO_POW_M25: f64 = 1.0 / 33_554_432.0;
const TWO_POW_M30: f64 = 1.0 / 1_073_741_824.0;
const TWO_POW_M36: f64 = 1.0 / 68_719_476_736.0;

/// Raw factory calibration words, as read from the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationWords {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    /// Read for completeness; the floating-point formulation does not use it
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl CalibrationWords {
    /// Build from the eleven big-endian words in register order.
    pub fn from_be_words(words: &[[u8; 2]; 11]) -> Self {
        Self {
            ac1: i16::from_be_bytes(words[0]),
            ac2: i16::from_be_bytes(words[1]),
            ac3: i16::from_be_bytes(words[2]),
            ac4: u16::from_be_bytes(words[3]),
            ac5: u16::from_be_bytes(words[4]),
            ac6: u16::from_be_bytes(words[5]),
            b1: i16::from_be_bytes(words[6]),
            b2: i16::from_be_bytes(words[7]),
            mb: i16::from_be_bytes(words[8]),
            mc: i16::from_be_bytes(words[9]),
            md: i16::from_be_bytes(words[10]),
        }
    }
}

/// Polynomial coefficients derived from [`CalibrationWords`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub c5: f64,
    pub c6: f64,
    pub mc: f64,
    pub md: f64,
    pub x0: f64,
    pub x1: f64,
    pub x2: f64,
    pub y0: f64,
    pub y1: f64,
    pub y2: f64,
    pub p0: f64,
    pub p1: f64,
    pub p2: f64,
}

impl Coefficients {
    pub fn derive(words: &CalibrationWords) -> Self {
        let c3 = 160.0 * TWO_POW_M15 * f64::from(words.ac3);
        let c4 = 1e-3 * TWO_POW_M15 * f64::from(words.ac4);
        let b1 = 160.0 * 160.0 * TWO_POW_M30 * f64::from(words.b1);

        Self {
            c5: (TWO_POW_M15 / 160.0) * f64::from(words.ac5),
            c6: f64::from(words.ac6),
            mc: (TWO_POW_11 / (160.0 * 160.0)) * f64::from(words.mc),
            md: f64::from(words.md) / 160.0,
            x0: f64::from(words.ac1),
            x1: 160.0 * TWO_POW_M13 * f64::from(words.ac2),
            x2: 160.0 * 160.0 * TWO_POW_M25 * f64::from(words.b2),
            y0: c4 * TWO_POW_15,
            y1: c4 * c3,
            y2: c4 * b1,
            p0: (3791.0 - 8.0) / 1600.0,
            p1: 1.0 - 7357.0 * TWO_POW_M20,
            p2: 3038.0 * 100.0 * TWO_POW_M36,
        }
    }

    /// Compensated temperature in °C from the raw 16-bit temperature word.
    pub fn temperature(&self, raw: u16) -> f64 {
        let tu = f64::from(raw);
        let a = self.c5 * (tu - self.c6);
        a + self.mc / (a + self.md)
    }

    /// Compensated pressure in millibar from the three result bytes.
    ///
    /// `temperature` must come from the same conversion cycle; a stale value
    /// yields a wrong but plausible pressure.
    pub fn pressure(&self, raw: [u8; 3], temperature: f64) -> f64 {
        let pu = f64::from(raw[0]) * 256.0 + f64::from(raw[1]) + f64::from(raw[2]) / 256.0;
        let s = temperature - 25.0;
        let x = self.x2 * s * s + self.x1 * s + self.x0;
        let y = self.y2 * s * s + self.y1 * s + self.y0;
        let z = (pu - x) / y;
        self.p2 * z * z + self.p1 * z + self.p0
    }
}

/// One complete, atomically acquired calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub words: CalibrationWords,
    pub coefficients: Coefficients,
}

impl From<CalibrationWords> for Calibration {
    fn from(words: CalibrationWords) -> Self {
        Self {
            coefficients: Coefficients::derive(&words),
            words,
        }
    }
}

/// Raw pressure value (up to 19 bits) as the integer algorithm sees it.
pub fn raw_pressure(raw: [u8; 3], oversampling: u8) -> u32 {
    ((u32::from(raw[0]) << 16) | (u32::from(raw[1]) << 8) | u32::from(raw[2]))
        >> (8 - oversampling.min(3))
}
