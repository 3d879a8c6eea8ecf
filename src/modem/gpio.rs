use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Linux errno for "device or resource busy", returned when a pin is
/// already exported.
const EBUSY: i32 = 16;

/// Power and reset lines of the radio module.
pub trait HardwarePort {
    fn set_power(&mut self, on: bool) -> io::Result<()>;
    /// Reset is active-low: asserting it drives the line to 0.
    fn set_reset(&mut self, asserted: bool) -> io::Result<()>;
    /// Return both lines to inputs and give them back to the kernel.
    fn release(&mut self) -> io::Result<()>;
}

/// GPIO lines driven through `/sys/class/gpio`.
pub struct SysfsGpio {
    base: PathBuf,
    power_pin: u32,
    reset_pin: u32,
    settle: Duration,
}

impl SysfsGpio {
    pub fn new(base: PathBuf, power_pin: u32, reset_pin: u32, settle: Duration) -> Self {
        Self {
            base,
            power_pin,
            reset_pin,
            settle,
        }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.base.join(format!("gpio{}", pin))
    }

    fn export_output(&self, pin: u32) -> io::Result<()> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            match fs::write(self.base.join("export"), pin.to_string()) {
                Ok(()) => {}
                Err(e) if e.raw_os_error() == Some(EBUSY) => {}
                Err(e) => return Err(e),
            }
            // The kernel creates the pin files asynchronously.
            thread::sleep(self.settle);
        }
        write_attr(&dir, "direction", "out")
    }

    fn unexport(&self, pin: u32) -> io::Result<()> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            return Ok(());
        }
        write_attr(&dir, "direction", "in")?;
        fs::write(self.base.join("unexport"), pin.to_string())
    }

    fn drive(&self, pin: u32, high: bool) -> io::Result<()> {
        self.export_output(pin)?;
        write_attr(&self.pin_dir(pin), "value", if high { "1" } else { "0" })
    }
}

fn write_attr(dir: &Path, attr: &str, value: &str) -> io::Result<()> {
    fs::write(dir.join(attr), value)
        .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", dir.join(attr).display(), e)))
}

impl HardwarePort for SysfsGpio {
    fn set_power(&mut self, on: bool) -> io::Result<()> {
        log::debug!("GPIO{} power {}", self.power_pin, if on { "on" } else { "off" });
        self.drive(self.power_pin, on)
    }

    fn set_reset(&mut self, asserted: bool) -> io::Result<()> {
        log::debug!(
            "GPIO{} reset {}",
            self.reset_pin,
            if asserted { "asserted" } else { "released" }
        );
        self.drive(self.reset_pin, !asserted)
    }

    fn release(&mut self) -> io::Result<()> {
        log::debug!("Releasing GPIO{} and GPIO{}", self.power_pin, self.reset_pin);
        let power = self.unexport(self.power_pin);
        let reset = self.unexport(self.reset_pin);
        power.and(reset)
    }
}

impl<T: HardwarePort + ?Sized> HardwarePort for Box<T> {
    fn set_power(&mut self, on: bool) -> io::Result<()> {
        (**self).set_power(on)
    }

    fn set_reset(&mut self, asserted: bool) -> io::Result<()> {
        (**self).set_reset(asserted)
    }

    fn release(&mut self) -> io::Result<()> {
        (**self).release()
    }
}
