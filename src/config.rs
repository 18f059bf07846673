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

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::curves::{
    default_chassis_curve, default_cpu_curve, default_hdd_curve, default_pcie_curve, Curve,
};

/// Default chassis soft cap in percent; can be raised via `--soft-cap`.
pub const DEFAULT_SOFT_CAP_PCT: u8 = 50;

/// Maximum duty change per tick in percent (0 disables slew limiting).
pub const DEFAULT_SMOOTH_STEP_PCT: u8 = 5;

/// Default tick interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Cpu,
    Chassis,
    Hdd,
    Pcie,
}

impl Zone {
    /// All zones in actuation order: chassis is driven first so airflow
    /// changes land before the per-device fans are adjusted.
    pub const ALL: [Zone; 4] = [Zone::Chassis, Zone::Pcie, Zone::Cpu, Zone::Hdd];

    pub fn name(&self) -> &'static str {
        match self {
            Zone::Cpu => "cpu",
            Zone::Chassis => "chassis",
            Zone::Hdd => "hdd",
            Zone::Pcie => "pcie",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Zone::Cpu),
            "chassis" => Ok(Zone::Chassis),
            "hdd" => Ok(Zone::Hdd),
            "pcie" => Ok(Zone::Pcie),
            other => Err(format!("unknown zone '{}' (expected cpu|chassis|hdd|pcie)", other)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown zone '{0}' in config")]
    UnknownZone(String),
    #[error("invalid curve for zone '{zone}': {reason}")]
    InvalidCurve { zone: Zone, reason: String },
}

/// Static wiring of one zone: which IPMI sensor it reads and which fan
/// channel it drives, plus its control curve.
#[derive(Clone, Debug)]
pub struct ZoneSetup {
    pub zone: Zone,
    /// IPMI sensor number for Get Sensor Reading.
    pub sensor_id: u8,
    /// Fan channel index in the OEM duty-set command.
    pub fan_channel: u8,
    pub curve: Curve,
    /// Computed duties never drop below this.
    pub floor_pct: u8,
    /// Temperatures above this lift the chassis soft cap (coupled zones only).
    pub override_temp_c: f64,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// One setup per zone, in actuation order.
    pub zones: Vec<ZoneSetup>,
    pub soft_cap_pct: u8,
    pub smooth_step_pct: u8,
}

impl Config {
    /// Built-in defaults for the target board. Sensor and channel numbers are
    /// fixed hardware addresses, not discovered.
    pub fn defaults() -> Self {
        let zone_defaults = |zone: Zone| -> (u8, u8, Curve, u8) {
            match zone {
                Zone::Cpu => (0x01, 0x00, default_cpu_curve(), 15),
                Zone::Chassis => (0x0b, 0x02, default_chassis_curve(), 15),
                Zone::Hdd => (0x17, 0x03, default_hdd_curve(), 20),
                Zone::Pcie => (0x0c, 0x04, default_pcie_curve(), 15),
            }
        };
        let zones = Zone::ALL
            .iter()
            .map(|&zone| {
                let (sensor_id, fan_channel, curve, floor_pct) = zone_defaults(zone);
                let override_temp_c = curve.top_temp();
                ZoneSetup { zone, sensor_id, fan_channel, curve, floor_pct, override_temp_c }
            })
            .collect();
        Self {
            zones,
            soft_cap_pct: DEFAULT_SOFT_CAP_PCT,
            smooth_step_pct: DEFAULT_SMOOTH_STEP_PCT,
        }
    }

    /// Build the effective configuration: defaults, then the optional JSON
    /// override file applied per zone. Every override curve is validated
    /// before it replaces a default; any failure aborts the load.
    ///
    /// The file is read once here at startup; edits require a restart.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = Self::defaults();
        let Some(path) = path else { return Ok(cfg) };

        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let overrides: BTreeMap<String, Vec<(f64, f64)>> = serde_json::from_str(&data)?;

        for (name, pairs) in overrides {
            let zone: Zone = name.parse().map_err(|_| ConfigError::UnknownZone(name.clone()))?;
            let curve = Curve::from_pairs(&pairs)
                .map_err(|reason| ConfigError::InvalidCurve { zone, reason })?;
            cfg.apply_curve(zone, curve);
        }
        Ok(cfg)
    }

    fn apply_curve(&mut self, zone: Zone, curve: Curve) {
        for setup in &mut self.zones {
            if setup.zone == zone {
                setup.override_temp_c = curve.top_temp();
                setup.curve = curve;
                return;
            }
        }
    }

    pub fn setup(&self, zone: Zone) -> Option<&ZoneSetup> {
        self.zones.iter().find(|s| s.zone == zone)
    }
}
