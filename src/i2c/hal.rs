use embedded_hal::i2c;

use super::*;

impl i2c::Error for Error {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            Error::BusError => i2c::ErrorKind::Bus,
            Error::NotAcknowledged => {
                i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Unknown)
            }
            _ => i2c::ErrorKind::Other,
        }
    }
}

impl<I2C: Instance> i2c::ErrorType for I2c<I2C> {
    type Error = Error;
}

impl<I2C: Instance> i2c::I2c<i2c::SevenBitAddress> for I2c<I2C> {
    /// The controller generates a stop condition after every transfer and
    /// cannot hold the bus for a repeated start, so each operation runs as
    /// an independent, stop-terminated transfer.
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Read(buffer) => {
                    // Zero-length probes cannot be expressed on this
                    // controller; skip them rather than fail the whole
                    // transaction.
                    if !buffer.is_empty() {
                        self.read(address, buffer)?;
                    }
                }
                i2c::Operation::Write(bytes) => {
                    if !bytes.is_empty() {
                        self.write(address, bytes)?;
                    }
                }
            }
        }
        Ok(())
    }
}
