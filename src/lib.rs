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

//! fanctl - temperature-curve fan control loop for a fixed server board
//!
//! Reads per-zone temperatures from the BMC, maps them through
//! piecewise-linear curves, applies the chassis coupling policy, and issues
//! duty-cycle commands over IPMI raw bytes.

pub mod cli;
pub mod config;
pub mod curves;
pub mod ipmi;
pub mod logger;
pub mod policy;
pub mod service;

pub use config::{Config, ConfigError, Zone};
pub use curves::{Curve, CurvePoint};
pub use ipmi::{Bmc, IpmiError, IpmiTool};
pub use policy::{apply_policy, Command, PolicyState, Reading};
