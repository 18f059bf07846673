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

use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;

use fanctl::cli::Args;
use fanctl::config::Config;
use fanctl::ipmi::IpmiTool;
use fanctl::logger::{self, LogSettings};
use fanctl::service::{self, ControlLoop};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let manual = args.manual_override().map_err(|e| anyhow!(e))?;

    let mut log_settings = LogSettings::with_preferred(args.log_file.clone());
    log_settings.max_bytes = args.log_max_mb * 1024 * 1024;
    log_settings.backups = args.log_backups;
    log_settings.foreground = args.foreground;
    log_settings.verbose = args.verbose;
    let log_path = logger::init(log_settings).context("opening log sink")?;

    logger::info("==== fanctl started ====");
    logger::info(&format!(
        "log_file={} max_mb={} backups={} foreground={}",
        log_path.display(),
        args.log_max_mb,
        args.log_backups,
        args.foreground
    ));

    // local IPMI access needs root; dry runs proceed regardless
    if unsafe { libc::geteuid() } != 0 && !args.dry_run {
        logger::warn("not running as root; ipmitool commands will likely fail");
    }

    let mut cfg = match Config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            logger::error(&format!("configuration rejected: {}", e));
            return Err(e).context("loading configuration");
        }
    };
    cfg.soft_cap_pct = args.soft_cap;
    for setup in &cfg.zones {
        logger::info(&format!(
            "zone {}: sensor 0x{:02x} channel 0x{:02x} curve {:?} floor {}%",
            setup.zone,
            setup.sensor_id,
            setup.fan_channel,
            setup.curve.points().iter().map(|p| (p.temp_c, p.duty_pct)).collect::<Vec<_>>(),
            setup.floor_pct
        ));
    }
    logger::info(&format!(
        "soft_cap={}% smooth_step={}% interval={}s dry_run={}",
        cfg.soft_cap_pct, cfg.smooth_step_pct, args.interval, args.dry_run
    ));

    let bmc = IpmiTool::new();

    if let Some((zone, duty_pct)) = manual {
        service::manual_set(&cfg, &bmc, zone, duty_pct, args.dry_run)?;
        return Ok(());
    }

    service::install_signal_handler()?;
    let mut control = ControlLoop::new(cfg, bmc, args.dry_run);
    control.run(Duration::from_secs(args.interval.max(1)), args.once);
    logger::info("==== fanctl stopped ====");
    Ok(())
}
