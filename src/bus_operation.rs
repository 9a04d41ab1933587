use core::convert::Infallible;

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, OutputPin},
    i2c::{I2c, SevenBitAddress},
    spi::{Operation, SpiDevice},
};

use crate::consts::{DEFAULT_I2C_ADDRESS, DEFAULT_I2C_BUFFER_LEN, DEFAULT_SPI_BUFFER_LEN, MAX_CHUNK_SIZE};
use crate::platform::Platform;

/// Failure of one of the bundled bus adapters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlatformError<E> {
    Bus(E),
    /// The LPN pin could not be driven.
    Pin,
}

/// Stand-in for boards that do not wire the LPN line.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn clamp_chunk(chunk_size: usize) -> usize {
    chunk_size.clamp(1, MAX_CHUNK_SIZE)
}

fn pulse_lpn<LPN: OutputPin, D: DelayNs, E>(lpn: &mut LPN, delay: &mut D) -> Result<(), PlatformError<E>> {
    lpn.set_low().map_err(|_| PlatformError::Pin)?;
    delay.delay_ms(10);
    lpn.set_high().map_err(|_| PlatformError::Pin)?;
    delay.delay_ms(10);
    Ok(())
}

pub struct I2cBus<P, D, LPN = NoPin> {
    i2c: P,
    delay: D,
    lpn: Option<LPN>,
    address: SevenBitAddress,
    chunk_size: usize,
}

impl<P: I2c, D: DelayNs> I2cBus<P, D, NoPin> {
    pub fn new(i2c: P, delay: D) -> Self {
        I2cBus {
            i2c,
            delay,
            lpn: None,
            address: DEFAULT_I2C_ADDRESS,
            chunk_size: DEFAULT_I2C_BUFFER_LEN,
        }
    }
}

impl<P: I2c, D: DelayNs, LPN: OutputPin> I2cBus<P, D, LPN> {
    /// Adapter with the LPN line wired, enabling [`Platform::reset_sensor`].
    pub fn with_lpn(i2c: P, delay: D, lpn: LPN) -> Self {
        I2cBus {
            i2c,
            delay,
            lpn: Some(lpn),
            address: DEFAULT_I2C_ADDRESS,
            chunk_size: DEFAULT_I2C_BUFFER_LEN,
        }
    }

    /// Talk to a sensor that already answers at `address`.
    pub fn with_address(mut self, address: SevenBitAddress) -> Self {
        self.address = address;
        self
    }

    /// Largest payload per bus transaction, clamped to `1..=MAX_CHUNK_SIZE`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = clamp_chunk(chunk_size);
        self
    }

    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    pub fn release(self) -> (P, D, Option<LPN>) {
        (self.i2c, self.delay, self.lpn)
    }
}

impl<P: I2c, D: DelayNs, LPN: OutputPin> Platform for I2cBus<P, D, LPN> {
    type Error = PlatformError<P::Error>;

    fn read_multi(&mut self, reg: u16, rbuf: &mut [u8]) -> Result<(), Self::Error> {
        let mut index = reg;
        for chunk in rbuf.chunks_mut(self.chunk_size) {
            self.i2c
                .write_read(self.address, &index.to_be_bytes(), chunk)
                .map_err(PlatformError::Bus)?;
            index = index.wrapping_add(chunk.len() as u16);
        }
        Ok(())
    }

    fn write_multi(&mut self, reg: u16, wbuf: &[u8]) -> Result<(), Self::Error> {
        let mut tmp: [u8; MAX_CHUNK_SIZE + 2] = [0; MAX_CHUNK_SIZE + 2];
        let mut index = reg;
        for chunk in wbuf.chunks(self.chunk_size) {
            tmp[..2].copy_from_slice(&index.to_be_bytes());
            tmp[2..2 + chunk.len()].copy_from_slice(chunk);
            self.i2c
                .write(self.address, &tmp[..2 + chunk.len()])
                .map_err(PlatformError::Bus)?;
            index = index.wrapping_add(chunk.len() as u16);
        }
        Ok(())
    }

    fn wait_ms(&mut self, ms: u32) -> Result<(), Self::Error> {
        self.delay.delay_ms(ms);
        Ok(())
    }

    fn reset_sensor(&mut self) -> Option<Result<(), Self::Error>> {
        let lpn = self.lpn.as_mut()?;
        Some(pulse_lpn(lpn, &mut self.delay))
    }

    fn address_changed(&mut self, address: SevenBitAddress) {
        self.address = address;
    }
}

pub struct SpiBus<P, D, LPN = NoPin> {
    spi: P,
    delay: D,
    lpn: Option<LPN>,
    chunk_size: usize,
}

impl<P: SpiDevice, D: DelayNs> SpiBus<P, D, NoPin> {
    pub fn new(spi: P, delay: D) -> Self {
        SpiBus {
            spi,
            delay,
            lpn: None,
            chunk_size: DEFAULT_SPI_BUFFER_LEN,
        }
    }
}

impl<P: SpiDevice, D: DelayNs, LPN: OutputPin> SpiBus<P, D, LPN> {
    pub fn with_lpn(spi: P, delay: D, lpn: LPN) -> Self {
        SpiBus {
            spi,
            delay,
            lpn: Some(lpn),
            chunk_size: DEFAULT_SPI_BUFFER_LEN,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = clamp_chunk(chunk_size);
        self
    }

    pub fn release(self) -> (P, D, Option<LPN>) {
        (self.spi, self.delay, self.lpn)
    }
}

impl<P: SpiDevice, D: DelayNs, LPN: OutputPin> Platform for SpiBus<P, D, LPN> {
    type Error = PlatformError<P::Error>;

    fn read_multi(&mut self, reg: u16, rbuf: &mut [u8]) -> Result<(), Self::Error> {
        let mut index = reg;
        for chunk in rbuf.chunks_mut(self.chunk_size) {
            let len = chunk.len() as u16;
            let [hi, lo] = index.to_be_bytes();
            self.spi
                .transaction(&mut [Operation::Write(&[hi & !0x80, lo]), Operation::Read(chunk)])
                .map_err(PlatformError::Bus)?;
            index = index.wrapping_add(len);
        }
        Ok(())
    }

    fn write_multi(&mut self, reg: u16, wbuf: &[u8]) -> Result<(), Self::Error> {
        let mut index = reg;
        for chunk in wbuf.chunks(self.chunk_size) {
            let [hi, lo] = index.to_be_bytes();
            self.spi
                .transaction(&mut [Operation::Write(&[hi | 0x80, lo]), Operation::Write(chunk)])
                .map_err(PlatformError::Bus)?;
            index = index.wrapping_add(chunk.len() as u16);
        }
        Ok(())
    }

    fn wait_ms(&mut self, ms: u32) -> Result<(), Self::Error> {
        self.delay.delay_ms(ms);
        Ok(())
    }

    fn reset_sensor(&mut self) -> Option<Result<(), Self::Error>> {
        let lpn = self.lpn.as_mut()?;
        Some(pulse_lpn(lpn, &mut self.delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    const ADDR: u8 = DEFAULT_I2C_ADDRESS;

    #[test]
    fn i2c_read_is_split_in_chunks_with_advancing_index() {
        let expectations = [
            I2cTransaction::write_read(ADDR, vec![0x2c, 0x00], vec![1, 2, 3, 4]),
            I2cTransaction::write_read(ADDR, vec![0x2c, 0x04], vec![5, 6]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = I2cBus::new(i2c.clone(), NoopDelay::new()).with_chunk_size(4);

        let mut buf = [0u8; 6];
        bus.read_multi(0x2c00, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
        i2c.done();
    }

    #[test]
    fn i2c_write_prefixes_each_chunk_with_register() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![0x00, 0x10, 0xaa, 0xbb, 0xcc]),
            I2cTransaction::write(ADDR, vec![0x00, 0x13, 0xdd]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = I2cBus::new(i2c.clone(), NoopDelay::new()).with_chunk_size(3);

        bus.write_multi(0x0010, &[0xaa, 0xbb, 0xcc, 0xdd]).unwrap();
        i2c.done();
    }

    #[test]
    fn i2c_follows_address_change() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![0x7f, 0xff, 0x00]),
            I2cTransaction::write(0x30, vec![0x7f, 0xff, 0x02]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = I2cBus::new(i2c.clone(), NoopDelay::new());

        bus.write_byte(0x7fff, 0x00).unwrap();
        bus.address_changed(0x30);
        assert_eq!(bus.address(), 0x30);
        bus.write_byte(0x7fff, 0x02).unwrap();
        i2c.done();
    }

    #[test]
    fn reset_without_lpn_is_unsupported() {
        let mut i2c = I2cMock::new(&[]);
        let mut bus = I2cBus::new(i2c.clone(), NoopDelay::new());
        assert!(bus.reset_sensor().is_none());
        i2c.done();
    }

    #[test]
    fn reset_pulses_lpn_low_then_high() {
        let mut i2c = I2cMock::new(&[]);
        let mut pin = PinMock::new(&[
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
        ]);
        let mut bus = I2cBus::with_lpn(i2c.clone(), NoopDelay::new(), pin.clone());
        assert_eq!(bus.reset_sensor(), Some(Ok(())));
        i2c.done();
        pin.done();
    }

    #[test]
    fn spi_write_sets_write_bit() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0xac, 0x34]),
            SpiTransaction::write_vec(vec![0x01, 0x02]),
            SpiTransaction::transaction_end(),
        ];
        let mut spi = SpiMock::new(&expectations);
        let mut bus = SpiBus::new(spi.clone(), NoopDelay::new());

        bus.write_multi(0x2c34, &[0x01, 0x02]).unwrap();
        spi.done();
    }

    #[test]
    fn spi_read_clears_write_bit() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x2c, 0x00]),
            SpiTransaction::read_vec(vec![0x00, 0x03, 0x00, 0x00]),
            SpiTransaction::transaction_end(),
        ];
        let mut spi = SpiMock::new(&expectations);
        let mut bus = SpiBus::new(spi.clone(), NoopDelay::new());

        let mut buf = [0u8; 4];
        bus.read_multi(0x2c00, &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x03, 0x00, 0x00]);
        spi.done();
    }
}
