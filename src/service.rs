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

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::config::{Config, Zone};
use crate::ipmi::Bmc;
use crate::logger;
use crate::policy::{self, PolicyState, Reading};

/// Global shutdown flag, set from the signal handler and honored at tick
/// boundaries only; an in-flight read or actuation always completes.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

pub fn install_signal_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
    })
    .context("installing SIGINT/SIGTERM handler")?;
    Ok(())
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Single-threaded read → evaluate → couple → actuate loop. One tick runs to
/// completion before the next is scheduled; there is no overlap.
pub struct ControlLoop<B: Bmc> {
    cfg: Config,
    bmc: B,
    state: PolicyState,
    dry_run: bool,
}

impl<B: Bmc> ControlLoop<B> {
    pub fn new(cfg: Config, bmc: B, dry_run: bool) -> Self {
        Self { cfg, bmc, state: PolicyState::new(), dry_run }
    }

    /// One control tick: sample every zone, run the coupling policy, issue
    /// the resulting commands. Per-zone sensor failures downgrade to
    /// last-known-good inside the policy; actuation failures are logged and
    /// retried naturally on the next tick.
    pub fn tick(&mut self) {
        logger::debug("tick: sampling begin");
        let mut readings: Vec<Reading> = Vec::with_capacity(self.cfg.zones.len());
        for setup in &self.cfg.zones {
            match self.bmc.read_temperature(setup.sensor_id) {
                Ok(temp_c) => {
                    logger::info(&format!(
                        "read {}: {:.1}°C (sensor 0x{:02x})",
                        setup.zone, temp_c, setup.sensor_id
                    ));
                    readings.push(Reading::now(setup.zone, temp_c));
                }
                Err(e) => {
                    logger::warn(&format!(
                        "read {} (sensor 0x{:02x}) failed: {}; holding previous duty",
                        setup.zone, setup.sensor_id, e
                    ));
                }
            }
        }

        let commands = policy::apply_policy(&self.cfg, &readings, &self.state);
        for cmd in &commands {
            if self.dry_run {
                logger::info(&format!(
                    "[dry-run] {} -> {}% (channel 0x{:02x})",
                    cmd.zone, cmd.duty_pct, cmd.fan_channel
                ));
                continue;
            }
            match self.bmc.set_duty(cmd.fan_channel, cmd.duty_pct) {
                Ok(()) => logger::info(&format!(
                    "set {} -> {}% (channel 0x{:02x})",
                    cmd.zone, cmd.duty_pct, cmd.fan_channel
                )),
                Err(e) => logger::error(&format!(
                    "set {} -> {}% (channel 0x{:02x}) failed: {}",
                    cmd.zone, cmd.duty_pct, cmd.fan_channel, e
                )),
            }
        }
        // Record even in dry-run so slew limiting sees the same history.
        self.state.observe(&commands);
        logger::debug("tick: sampling end");
    }

    /// Run until shutdown is requested, or for exactly one tick in one-shot
    /// mode.
    pub fn run(&mut self, interval: Duration, once: bool) {
        logger::info("control loop running");
        loop {
            self.tick();
            if once {
                logger::info("one-shot tick complete");
                break;
            }
            if !sleep_between_ticks(interval) {
                logger::info("shutdown requested, stopping");
                break;
            }
        }
        logger::info("control loop stopped");
    }

    #[cfg(test)]
    pub fn last_duty(&self, zone: Zone) -> Option<u8> {
        self.state.last_duty(zone)
    }
}

/// Sleep out the tick interval in short slices so a termination signal is
/// honored promptly. Returns false when shutdown was requested.
fn sleep_between_ticks(interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if shutdown_requested() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SHUTDOWN_POLL));
    }
}

/// Issue a one-shot manual duty override for a zone, bypassing curve
/// evaluation. The override is transient: nothing is persisted, and the next
/// scheduled tick recomputes the zone from its curve.
pub fn manual_set<B: Bmc>(
    cfg: &Config,
    bmc: &B,
    zone: Zone,
    duty_pct: u8,
    dry_run: bool,
) -> Result<()> {
    let setup = cfg
        .setup(zone)
        .with_context(|| format!("zone {} is not configured", zone))?;
    logger::info(&format!(
        "manual override: {} -> {}% (transient; the next tick recomputes from the curve)",
        zone, duty_pct
    ));
    if dry_run {
        logger::info(&format!(
            "[dry-run] {} -> {}% (channel 0x{:02x})",
            zone, duty_pct, setup.fan_channel
        ));
        return Ok(());
    }
    bmc.set_duty(setup.fan_channel, duty_pct.min(100))
        .with_context(|| format!("setting {} duty over IPMI", zone))?;
    Ok(())
}
