/// BMP180 register map (Bosch Sensortec BMP180 datasheet, BST-BMP180-DS000).
///
/// Calibration words are big-endian 16-bit values starting at the listed
/// address. Conversion results are read from `Result` onwards (2 bytes for
/// temperature, 3 for pressure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Ac1 = 0xAA,
    Ac2 = 0xAC,
    Ac3 = 0xAE,
    Ac4 = 0xB0,
    Ac5 = 0xB2,
    Ac6 = 0xB4,
    B1 = 0xB6,
    B2 = 0xB8,
    Mb = 0xBA,
    Mc = 0xBC,
    Md = 0xBE,
    // Measurement control: write a conversion command here
    Control = 0xF4,
    // MSB of the conversion result
    Result = 0xF6,
}

/// Fixed 7-bit I2C address of the BMP180
pub const ADDRESS: u8 = 0x77;

/// Calibration words in acquisition order
pub const CALIBRATION_REGISTERS: [Register; 11] = [
    Register::Ac1,
    Register::Ac2,
    Register::Ac3,
    Register::Ac4,
    Register::Ac5,
    Register::Ac6,
    Register::B1,
    Register::B2,
    Register::Mb,
    Register::Mc,
    Register::Md,
];

/// Start a temperature conversion
pub const COMMAND_TEMPERATURE: u8 = 0x2E;

/// Start a pressure conversion; the oversampling level goes in bits 6-7
pub const COMMAND_PRESSURE: u8 = 0x34;

/// Wait after starting a temperature conversion (datasheet max 4.5 ms)
pub const TEMPERATURE_SETTLE_MS: u32 = 5;

/// Wait after starting a pressure conversion, per oversampling level 0..=3
/// (datasheet max 4.5, 7.5, 13.5 and 25.5 ms)
pub const PRESSURE_SETTLE_MS: [u32; 4] = [5, 8, 14, 26];
