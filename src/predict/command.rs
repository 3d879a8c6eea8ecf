use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Serialize;

use super::error::PredictError;
use super::types::{DownlinkStatus, OrbitElement, PassWindow, PredictionConfig, UplinkStatus};
use super::PassPredictor;

#[derive(Serialize)]
struct PredictionRequest<'a> {
    config: &'a PredictionConfig,
    satellites: &'a [OrbitElement],
    downlink: DownlinkStatus,
    uplink: UplinkStatus,
}

/// Delegates the orbit computation to an external program: the request goes
/// to its stdin as JSON and one `PassWindow` (or `null`) is read back from
/// its stdout.
pub struct CommandPredictor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPredictor {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl PassPredictor for CommandPredictor {
    fn next_pass(
        &mut self,
        config: &PredictionConfig,
        satellites: &[OrbitElement],
        downlink: DownlinkStatus,
        uplink: UplinkStatus,
    ) -> Result<PassWindow, PredictError> {
        if satellites.is_empty() {
            return Err(PredictError::EmptyTable);
        }

        let request = serde_json::to_vec(&PredictionRequest {
            config,
            satellites,
            downlink,
            uplink,
        })?;

        log::debug!(
            "Requesting pass prediction from {} ({} satellites)",
            self.program.display(),
            satellites.len()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PredictError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request)?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(PredictError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let pass: Option<PassWindow> = serde_json::from_slice(&output.stdout)?;
        pass.ok_or(PredictError::NoPass {
            start: config.start,
            end: config.end,
        })
    }
}
