#![no_std]
#![no_main]

use vl53l5cx_uld::{
    Firmware, I2cBus, Measurement, Model, RangingFrame, Resolution, TargetsPerZone, Vl53l5cx,
};

use panic_halt as _;
use cortex_m_rt::entry;

use core::{cell::RefCell, fmt::Write};

use stm32f4xx_hal::{
    gpio::{gpioa, gpiob, Alternate, Output, Pin, PinState::High},
    pac::{CorePeripherals, Peripherals, TIM1, USART2},
    prelude::*,
    rcc::{Clocks, Rcc},
    serial::{Config, Tx},
    timer::{Delay, SysDelay},
};

// I2C related imports
use embedded_hal_bus::i2c::RefCellDevice;
use stm32f4xx_hal::{
    i2c::{I2c as StmI2c, I2c1, Mode},
    pac::I2C1,
};

const FIRMWARE: Firmware = Firmware {
    image: include_bytes!("../fw/firmware.bin"),
    default_configuration: include_bytes!("../fw/default_configuration.bin"),
    default_xtalk: include_bytes!("../fw/default_xtalk.bin"),
    nvm_cmd: include_bytes!("../fw/nvm_cmd.bin"),
    checksum: None,
};

const RESOLUTION: Resolution = Resolution::R4x4;

fn write_results(tx: &mut Tx<USART2>, frame: &RangingFrame) {
    let width = frame.resolution.side();

    writeln!(tx, "\x1B[2H").unwrap();
    writeln!(tx, "VL53L5CX simple ranging demo, sensor at {} degC\n", frame.silicon_temp_degc).unwrap();
    writeln!(
        tx,
        "\x1b[96m{dis:>20}\x1b[0m \x1b[92m{sta:<20}\x1b[0m",
        dis = "Distance [mm]",
        sta = "Status"
    )
    .unwrap();

    for j in 0..width {
        for _ in 0..width {
            write!(tx, "+----------").unwrap();
        }
        writeln!(tx, "+").unwrap();

        for i in 0..width {
            let zone = width * j + i;
            match frame.measurement(zone, 0) {
                Some(Measurement::Valid(mm)) => write!(tx, "|\x1b[96m{:>5}\x1b[0m \x1b[92m{:<4}\x1b[0m", mm, 5),
                Some(Measurement::SemiValid(mm, status)) => {
                    write!(tx, "|\x1b[93m{:>5}\x1b[0m \x1b[92m{:<4}\x1b[0m", mm, status)
                }
                Some(Measurement::Invalid(_, status)) => write!(tx, "|{:>5} \x1b[91m{:<4}\x1b[0m", "-", status),
                _ => write!(tx, "|{:>5} {:<4}", "X", ""),
            }
            .unwrap();
        }
        writeln!(tx, "|").unwrap();
    }
    for _ in 0..width {
        write!(tx, "+----------").unwrap();
    }
    writeln!(tx, "+").unwrap();
}

#[entry]
fn main() -> ! {
    let dp: Peripherals = Peripherals::take().unwrap();
    let cp: CorePeripherals = CorePeripherals::take().unwrap();
    let rcc: Rcc = dp.RCC.constrain();
    let clocks: Clocks = rcc.cfgr.use_hse(8.MHz()).sysclk(48.MHz()).freeze();
    let _delay: SysDelay = cp.SYST.delay(&clocks);
    let tim_top: Delay<TIM1, 1000> = dp.TIM1.delay_ms(&clocks);

    let gpioa: gpioa::Parts = dp.GPIOA.split();
    let gpiob: gpiob::Parts = dp.GPIOB.split();

    let _pwr_pin: Pin<'A', 7, Output> = gpioa.pa7.into_push_pull_output_in_state(High);
    let lpn_pin: Pin<'B', 0, Output> = gpiob.pb0.into_push_pull_output_in_state(High);
    let tx_pin: Pin<'A', 2, Alternate<7>> = gpioa.pa2.into_alternate();

    let mut tx: Tx<USART2> = dp
        .USART2
        .tx(
            tx_pin,
            Config::default().baudrate(460800.bps()).wordlength_8().parity_none(),
            &clocks,
        )
        .unwrap();

    let scl: Pin<'B', 8> = gpiob.pb8;
    let sda: Pin<'B', 9> = gpiob.pb9;

    let i2c: StmI2c<I2C1> = I2c1::new(dp.I2C1, (scl, sda), Mode::Standard { frequency: 400.kHz() }, &clocks);
    let i2c_bus: RefCell<StmI2c<I2C1>> = RefCell::new(i2c);
    let bus = I2cBus::with_lpn(RefCellDevice::new(&i2c_bus), tim_top, lpn_pin);

    let mut sensor = Vl53l5cx::new(bus, Model::Vl53l5cx, TargetsPerZone::ONE, FIRMWARE).unwrap();
    sensor.reset().unwrap();
    if !sensor.is_alive().unwrap() {
        writeln!(tx, "no VL53L5CX found").unwrap();
        loop {}
    }

    sensor.init().unwrap();
    sensor.set_resolution(RESOLUTION).unwrap();
    sensor.set_frequency_hz(30).unwrap();
    sensor.start_ranging().unwrap();

    let mut frame = RangingFrame::new();
    loop {
        sensor.wait_for_data_ready(100, 5).unwrap();
        sensor.get_ranging_data_into(&mut frame).unwrap();
        write_results(&mut tx, &frame);
    }
}
