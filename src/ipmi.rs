/*
 * This file is part of fanctl.
 *
 * Copyright (C) 2025 fanctl contributors
 *
 * fanctl is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * fanctl is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with fanctl. If not, see <https://www.gnu.org/licenses/>.
 */

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Wall-clock limit for a single ipmitool invocation. A wedged BMC must not
/// stall the control loop indefinitely.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(8);

const CHILD_POLL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum IpmiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ipmitool timed out after {0:?}")]
    Timeout(Duration),
    #[error("ipmitool exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },
    #[error("unparsable ipmitool response: {0}")]
    Parse(String),
}

/// The management subsystem as the control loop sees it. Sensors and fan
/// channels are addressed by fixed IDs; the wire protocol stays behind this
/// seam.
#[cfg_attr(test, mockall::automock)]
pub trait Bmc {
    fn read_temperature(&self, sensor_id: u8) -> Result<f64, IpmiError>;
    fn set_duty(&self, fan_channel: u8, pct: u8) -> Result<(), IpmiError>;
}

/// Argument list for the OEM duty-set command
/// (`raw 0x2e 0x44 0xfd 0x19 0x00 <channel> 0x01 <pct>`).
pub fn duty_raw_args(fan_channel: u8, pct: u8) -> Vec<String> {
    vec![
        "raw".into(),
        "0x2e".into(),
        "0x44".into(),
        "0xfd".into(),
        "0x19".into(),
        "0x00".into(),
        format!("0x{:02x}", fan_channel),
        "0x01".into(),
        format!("0x{:02x}", pct.min(100)),
    ]
}

/// Argument list for Get Sensor Reading (`raw 0x04 0x2d <sensor>`).
pub fn sensor_raw_args(sensor_id: u8) -> Vec<String> {
    vec!["raw".into(), "0x04".into(), "0x2d".into(), format!("0x{:02x}", sensor_id)]
}

/// Extract the temperature from a Get Sensor Reading response. The first
/// response byte is the reading; the board's temperature sensors use a 1:1
/// linear conversion, so the raw byte is degrees Celsius.
pub fn parse_sensor_reading(stdout: &str) -> Result<f64, IpmiError> {
    let token = stdout
        .split_whitespace()
        .next()
        .ok_or_else(|| IpmiError::Parse("empty response".into()))?;
    let raw = u8::from_str_radix(token, 16)
        .map_err(|_| IpmiError::Parse(format!("bad reading byte '{}'", token)))?;
    Ok(raw as f64)
}

/// Production [`Bmc`] backed by the ipmitool binary.
pub struct IpmiTool {
    binary: String,
    timeout: Duration,
}

impl IpmiTool {
    pub fn new() -> Self {
        Self { binary: "ipmitool".into(), timeout: DEFAULT_CALL_TIMEOUT }
    }

    #[cfg(test)]
    fn with_binary(binary: &str, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }

    /// Run ipmitool with the given raw arguments, enforcing the call timeout
    /// by polling the child and killing it on expiry.
    fn run(&self, args: &[String]) -> Result<String, IpmiError> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(IpmiError::Timeout(self.timeout));
            }
            thread::sleep(CHILD_POLL);
        };

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)?;
        }
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr);
            }
            return Err(IpmiError::CommandFailed {
                status: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

impl Default for IpmiTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Bmc for IpmiTool {
    fn read_temperature(&self, sensor_id: u8) -> Result<f64, IpmiError> {
        let out = self.run(&sensor_raw_args(sensor_id))?;
        parse_sensor_reading(&out)
    }

    fn set_duty(&self, fan_channel: u8, pct: u8) -> Result<(), IpmiError> {
        self.run(&duty_raw_args(fan_channel, pct))?;
        Ok(())
    }
}
