use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};

use super::{GeoFix, PositionError, PositionSource};

const STARTED: &str = "Success!";
const ALREADY_STARTED: &str = "The GNSS device is already started";
const FIX_2D: &str = "Position state: 2D Fix";
const FIX_3D: &str = "Position state: 3D Fix";

/// Position source backed by the platform `gnss` command line tool.
pub struct GnssTool {
    program: PathBuf,
    poll_period: Duration,
    fix_timeout: Duration,
}

impl GnssTool {
    pub fn new(program: PathBuf, poll_period: Duration, fix_timeout: Duration) -> Self {
        Self {
            program,
            poll_period,
            fix_timeout,
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, PositionError> {
        let output = Command::new(&self.program).args(args).output()?;
        if !output.status.success() {
            return Err(PositionError::ToolFailed {
                command: format!("{} {}", self.program.display(), args.join(" ")),
                status: output.status.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn start(&self) -> Result<(), PositionError> {
        let out = self.run(&["start"])?;
        if out.lines().any(|l| l.trim() == STARTED) {
            log::info!("GNSS service started");
        } else if out.lines().any(|l| l.trim() == ALREADY_STARTED) {
            log::debug!("GNSS service already started");
        } else {
            log::warn!("Unexpected answer to gnss start: {:?}", out.trim());
        }
        Ok(())
    }

    fn wait_for_fix(&self) -> Result<(), PositionError> {
        let deadline = Instant::now() + self.fix_timeout;
        loop {
            match self.run(&["get", "posState"]) {
                Ok(out) if has_fix(&out) => return Ok(()),
                Ok(_) => {}
                Err(e) => log::warn!("Failed to query position state: {}", e),
            }
            if Instant::now() >= deadline {
                return Err(PositionError::NoFix(self.fix_timeout));
            }
            thread::sleep(self.poll_period);
        }
    }
}

impl PositionSource for GnssTool {
    fn fix(&mut self) -> Result<GeoFix, PositionError> {
        self.start()?;
        self.wait_for_fix()?;

        let date = parse_date(&self.run(&["get", "date"])?)?;
        let time = parse_time(&self.run(&["get", "time"])?)?;
        let (latitude, longitude, altitude) = parse_loc3d(&self.run(&["get", "loc3d"])?)?;

        let fix = GeoFix::new(latitude, longitude, altitude, date.and_time(time).and_utc());
        log::info!(
            "GNSS fix: lat {:.5} lon {:.5} alt {:.1} m at {:?}",
            fix.latitude,
            fix.longitude,
            fix.altitude,
            fix.timestamp()
        );
        Ok(fix)
    }
}

fn has_fix(output: &str) -> bool {
    output
        .lines()
        .map(str::trim)
        .any(|l| l == FIX_2D || l == FIX_3D)
}

/// `Date(YYYY-MM-DD) 2020-01-27`
fn parse_date(output: &str) -> Result<NaiveDate, PositionError> {
    let line = output.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let err = || PositionError::Parse {
        what: "date",
        line: line.to_string(),
    };
    let value = line.rsplit_once(')').ok_or_else(err)?.1.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| err())
}

/// `Time(HH:MM:SS:ms) 13:45:12:250`
fn parse_time(output: &str) -> Result<NaiveTime, PositionError> {
    let line = output.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let err = || PositionError::Parse {
        what: "time",
        line: line.to_string(),
    };
    let value = line.split_whitespace().nth(1).ok_or_else(err)?;
    let mut parts = value.split(':').map(|p| p.parse::<u32>());
    let mut next = || parts.next().and_then(Result::ok).ok_or_else(err);
    let (h, m, s) = (next()?, next()?, next()?);
    NaiveTime::from_hms_opt(h, m, s).ok_or_else(err)
}

/// Latitude, longitude and altitude from lines 0, 1 and 3 of `gnss get loc3d`.
/// A latitude or longitude header without "positive" flips the sign.
fn parse_loc3d(output: &str) -> Result<(f64, f64, f64), PositionError> {
    let lines: Vec<&str> = output.lines().collect();
    let field = |index: usize, what: &'static str| -> Result<(bool, f64), PositionError> {
        let line = lines.get(index).copied().unwrap_or("");
        let err = || PositionError::Parse {
            what,
            line: line.to_string(),
        };
        let mut tokens = line.split_whitespace();
        let header = tokens.next().ok_or_else(err)?;
        let _separator = tokens.next().ok_or_else(err)?;
        let value: f64 = tokens.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        Ok((header.contains("positive"), value))
    };
    let signed = |(positive, value): (bool, f64)| if positive { value } else { -value };

    let latitude = signed(field(0, "latitude")?);
    let longitude = signed(field(1, "longitude")?).rem_euclid(360.0);
    // Below sea level is reported as ground level.
    let altitude = field(3, "altitude")?.1.max(0.0);
    Ok((latitude, longitude, altitude))
}
