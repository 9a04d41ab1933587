use embedded_hal::i2c::SevenBitAddress;

use crate::utils;

/// Capabilities the driver needs from the board: 16-bit addressed register
/// access, a bounded blocking wait, and optionally a hardware reset.
///
/// None of these are transactional. A failure in the middle of a multi-byte
/// transfer leaves the sensor registers in an unspecified state and the
/// driver aborts the whole higher-level operation instead of retrying.
pub trait Platform {
    type Error;

    fn read_multi(&mut self, reg: u16, rbuf: &mut [u8]) -> Result<(), Self::Error>;

    fn write_multi(&mut self, reg: u16, wbuf: &[u8]) -> Result<(), Self::Error>;

    /// Block for `ms` milliseconds. Never called with more than 100.
    fn wait_ms(&mut self, ms: u32) -> Result<(), Self::Error>;

    fn read_byte(&mut self, reg: u16) -> Result<u8, Self::Error> {
        let mut value = [0u8; 1];
        self.read_multi(reg, &mut value)?;
        Ok(value[0])
    }

    fn write_byte(&mut self, reg: u16, value: u8) -> Result<(), Self::Error> {
        self.write_multi(reg, &[value])
    }

    /// Reorder each 4-byte group between sensor and host endianness.
    ///
    /// # Panics
    ///
    /// If the length is not a multiple of 4.
    fn swap_buffer(&mut self, buffer: &mut [u8]) {
        utils::swap_buffer(buffer);
    }

    /// Pulse the sensor's reset/LPN line. `None` means the board has no way
    /// to do it, which is not an error.
    fn reset_sensor(&mut self) -> Option<Result<(), Self::Error>> {
        None
    }

    /// Told after the sensor was reprogrammed to answer at `address`. Platforms
    /// that do not own addressing can ignore it.
    fn address_changed(&mut self, _address: SevenBitAddress) {}
}

impl<T: Platform + ?Sized> Platform for &mut T {
    type Error = T::Error;

    #[inline]
    fn read_multi(&mut self, reg: u16, rbuf: &mut [u8]) -> Result<(), Self::Error> {
        T::read_multi(self, reg, rbuf)
    }

    #[inline]
    fn write_multi(&mut self, reg: u16, wbuf: &[u8]) -> Result<(), Self::Error> {
        T::write_multi(self, reg, wbuf)
    }

    #[inline]
    fn wait_ms(&mut self, ms: u32) -> Result<(), Self::Error> {
        T::wait_ms(self, ms)
    }

    #[inline]
    fn read_byte(&mut self, reg: u16) -> Result<u8, Self::Error> {
        T::read_byte(self, reg)
    }

    #[inline]
    fn write_byte(&mut self, reg: u16, value: u8) -> Result<(), Self::Error> {
        T::write_byte(self, reg, value)
    }

    #[inline]
    fn swap_buffer(&mut self, buffer: &mut [u8]) {
        T::swap_buffer(self, buffer)
    }

    #[inline]
    fn reset_sensor(&mut self) -> Option<Result<(), Self::Error>> {
        T::reset_sensor(self)
    }

    #[inline]
    fn address_changed(&mut self, address: SevenBitAddress) {
        T::address_changed(self, address)
    }
}
