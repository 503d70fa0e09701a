//! Prelude

pub use embedded_hal::i2c::I2c as _embedded_hal_i2c_I2c;

pub use fugit::{ExtU32 as _, RateExtU32 as _};
