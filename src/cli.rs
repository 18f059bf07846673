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

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Zone, DEFAULT_INTERVAL_SECS, DEFAULT_SOFT_CAP_PCT};
use crate::logger::DEFAULT_BACKUPS;

/// Fan curve control loop for server motherboards, driven via IPMI raw
/// commands. Without `--once` or `--set` it keeps running until
/// SIGINT/SIGTERM.
#[derive(Parser, Debug)]
#[command(name = "fanctl")]
#[command(about = "IPMI fan curve control loop")]
#[command(version)]
pub struct Args {
    /// Seconds between control ticks
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS, value_name = "SECS")]
    pub interval: u64,

    /// JSON file overriding built-in zone curves
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Compute and log commands without sending them to the BMC
    #[arg(long)]
    pub dry_run: bool,

    /// Run a single control tick and exit
    #[arg(long)]
    pub once: bool,

    /// Log debug detail (per-sensor sampling, raw duty targets)
    #[arg(short, long)]
    pub verbose: bool,

    /// Mirror log lines to stdout
    #[arg(long)]
    pub foreground: bool,

    /// Preferred log file (falls back to /var/log/fanctl.log, then
    /// ./fanctl.log)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Rotate the log once it exceeds this size
    #[arg(long, default_value_t = 5, value_name = "MB")]
    pub log_max_mb: u64,

    /// Rotated log files to keep
    #[arg(long, default_value_t = DEFAULT_BACKUPS)]
    pub log_backups: usize,

    /// Chassis duty cap in percent, absent an override condition
    #[arg(long, default_value_t = DEFAULT_SOFT_CAP_PCT, value_name = "PCT")]
    pub soft_cap: u8,

    /// Set one zone to a fixed duty immediately and exit, bypassing curve
    /// evaluation. The override is transient: it is not remembered, and any
    /// later control tick recomputes the zone from its curve.
    #[arg(long, num_args = 2, value_names = ["ZONE", "PCT"])]
    pub set: Option<Vec<String>>,
}

impl Args {
    /// Parse and validate the `--set ZONE PCT` pair, if given.
    pub fn manual_override(&self) -> Result<Option<(Zone, u8)>, String> {
        let Some(pair) = &self.set else { return Ok(None) };
        // clap guarantees exactly two values via num_args
        let zone: Zone = pair[0].parse()?;
        let pct: u8 = pair[1]
            .parse()
            .map_err(|_| format!("duty '{}' is not a number", pair[1]))?;
        if pct > 100 {
            return Err(format!("duty {} out of range (0..100)", pct));
        }
        Ok(Some((zone, pct)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["fanctl"]).unwrap();
        assert_eq!(args.interval, 5);
        assert_eq!(args.soft_cap, 50);
        assert_eq!(args.log_max_mb, 5);
        assert_eq!(args.log_backups, 2);
        assert!(!args.dry_run);
        assert!(!args.once);
        assert!(args.manual_override().unwrap().is_none());
    }

    #[test]
    fn test_set_pair_parses() {
        let args = Args::try_parse_from(["fanctl", "--set", "pcie", "80"]).unwrap();
        assert_eq!(args.manual_override().unwrap(), Some((Zone::Pcie, 80)));
    }

    #[test]
    fn test_set_rejects_unknown_zone() {
        let args = Args::try_parse_from(["fanctl", "--set", "gpu", "80"]).unwrap();
        assert!(args.manual_override().is_err());
    }

    #[test]
    fn test_set_rejects_out_of_range_duty() {
        let args = Args::try_parse_from(["fanctl", "--set", "cpu", "101"]).unwrap();
        assert!(args.manual_override().is_err());
    }

    #[test]
    fn test_set_requires_two_values() {
        assert!(Args::try_parse_from(["fanctl", "--set", "cpu"]).is_err());
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::try_parse_from([
            "fanctl",
            "--dry-run",
            "--once",
            "--foreground",
            "-v",
            "--interval",
            "10",
            "--soft-cap",
            "60",
        ])
        .unwrap();
        assert!(args.dry_run && args.once && args.foreground && args.verbose);
        assert_eq!(args.interval, 10);
        assert_eq!(args.soft_cap, 60);
    }
}
