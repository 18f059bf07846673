/*
 * Integration tests for fanctl
 *
 * These drive the control loop end-to-end against a scripted BMC and check
 * the duty-cycle commands that reach the fan channels.
 */

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::rc::Rc;

use fanctl::config::{Config, Zone};
use fanctl::curves::Curve;
use fanctl::ipmi::{Bmc, IpmiError};
use fanctl::service::{manual_set, ControlLoop};

const CPU_SENSOR: u8 = 0x01;
const CHASSIS_SENSOR: u8 = 0x0b;
const PCIE_SENSOR: u8 = 0x0c;
const HDD_SENSOR: u8 = 0x17;

const CPU_FAN: u8 = 0x00;
const CHASSIS_FAN: u8 = 0x02;
const HDD_FAN: u8 = 0x03;
const PCIE_FAN: u8 = 0x04;

/// Scripted BMC: fixed temperatures per sensor, failures on demand, and a
/// record of every duty write. Clones share state so a test can keep a handle
/// while the control loop owns its copy.
#[derive(Clone, Default)]
struct FakeBmc {
    temps: Rc<RefCell<HashMap<u8, f64>>>,
    dead_sensors: Rc<RefCell<HashSet<u8>>>,
    writes: Rc<RefCell<Vec<(u8, u8)>>>,
}

impl FakeBmc {
    fn set_temp(&self, sensor: u8, temp_c: f64) {
        self.temps.borrow_mut().insert(sensor, temp_c);
    }

    fn kill_sensor(&self, sensor: u8) {
        self.dead_sensors.borrow_mut().insert(sensor);
    }

    fn writes_for(&self, channel: u8) -> Vec<u8> {
        self.writes
            .borrow()
            .iter()
            .filter(|(ch, _)| *ch == channel)
            .map(|(_, pct)| *pct)
            .collect()
    }

    fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }
}

impl Bmc for FakeBmc {
    fn read_temperature(&self, sensor_id: u8) -> Result<f64, IpmiError> {
        if self.dead_sensors.borrow().contains(&sensor_id) {
            return Err(IpmiError::Parse("sensor unavailable".into()));
        }
        self.temps
            .borrow()
            .get(&sensor_id)
            .copied()
            .ok_or_else(|| IpmiError::Parse("no such sensor".into()))
    }

    fn set_duty(&self, fan_channel: u8, pct: u8) -> Result<(), IpmiError> {
        self.writes.borrow_mut().push((fan_channel, pct));
        Ok(())
    }
}

fn cool_bmc() -> FakeBmc {
    let bmc = FakeBmc::default();
    bmc.set_temp(CPU_SENSOR, 40.0);
    bmc.set_temp(CHASSIS_SENSOR, 40.0);
    bmc.set_temp(PCIE_SENSOR, 40.0);
    bmc.set_temp(HDD_SENSOR, 30.0);
    bmc
}

fn quiet_config() -> Config {
    let mut cfg = Config::defaults();
    cfg.smooth_step_pct = 0;
    cfg
}

fn sample_curve() -> Curve {
    Curve::from_pairs(&[(40.0, 20.0), (65.0, 50.0), (75.0, 80.0), (80.0, 100.0)]).unwrap()
}

#[test]
fn scenario_interpolation_between_points() {
    // 50 + (80-50) * (70-65) / (75-65) = 65
    assert_eq!(sample_curve().evaluate(70.0), 65);
}

#[test]
fn scenario_below_first_point() {
    assert_eq!(sample_curve().evaluate(30.0), 20);
}

#[test]
fn scenario_above_last_point() {
    assert_eq!(sample_curve().evaluate(90.0), 100);
}

#[test]
fn scenario_chassis_soft_capped() {
    let bmc = cool_bmc();
    // default chassis curve gives 80% at 60°C; cpu/pcie stay cool
    bmc.set_temp(CHASSIS_SENSOR, 60.0);
    let mut ctl = ControlLoop::new(quiet_config(), bmc.clone(), false);
    ctl.tick();
    assert_eq!(bmc.writes_for(CHASSIS_FAN), vec![50]);
}

#[test]
fn scenario_chassis_uncapped_by_hot_cpu() {
    let bmc = cool_bmc();
    bmc.set_temp(CHASSIS_SENSOR, 60.0);
    bmc.set_temp(CPU_SENSOR, 85.0); // above the cpu override threshold (80°C)
    let mut ctl = ControlLoop::new(quiet_config(), bmc.clone(), false);
    ctl.tick();
    assert_eq!(bmc.writes_for(CHASSIS_FAN), vec![80]);
}

#[test]
fn scenario_manual_override_is_transient() {
    let bmc = cool_bmc();
    let cfg = quiet_config();

    // immediate command, regardless of current temperature
    manual_set(&cfg, &bmc, Zone::Pcie, 80, false).unwrap();
    assert_eq!(bmc.writes_for(PCIE_FAN), vec![80]);

    // the next scheduled tick recomputes pcie from its curve (40°C -> 20%)
    let mut ctl = ControlLoop::new(cfg, bmc.clone(), false);
    ctl.tick();
    assert_eq!(bmc.writes_for(PCIE_FAN), vec![80, 20]);
}

#[test]
fn missing_reading_repeats_previous_command() {
    let bmc = cool_bmc();
    let mut ctl = ControlLoop::new(quiet_config(), bmc.clone(), false);
    ctl.tick();
    bmc.kill_sensor(HDD_SENSOR);
    ctl.tick();
    assert_eq!(bmc.writes_for(HDD_FAN), vec![20, 20]);
}

#[test]
fn missing_reading_without_history_runs_full() {
    let bmc = cool_bmc();
    bmc.kill_sensor(HDD_SENSOR);
    let mut ctl = ControlLoop::new(quiet_config(), bmc.clone(), false);
    ctl.tick();
    assert_eq!(bmc.writes_for(HDD_FAN), vec![100]);
}

#[test]
fn dry_run_issues_no_commands() {
    let bmc = cool_bmc();
    let mut ctl = ControlLoop::new(quiet_config(), bmc.clone(), true);
    ctl.tick();
    assert_eq!(bmc.write_count(), 0);
}

#[test]
fn every_zone_gets_a_command_each_tick() {
    let bmc = cool_bmc();
    let mut ctl = ControlLoop::new(quiet_config(), bmc.clone(), false);
    ctl.tick();
    for channel in [CHASSIS_FAN, PCIE_FAN, CPU_FAN, HDD_FAN] {
        assert_eq!(bmc.writes_for(channel).len(), 1, "channel 0x{:02x}", channel);
    }
}

#[test]
fn config_file_overrides_reach_the_fans() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    // flat pcie curve pinned at 42%
    file.write_all(br#"{"pcie": [[0, 42]]}"#).unwrap();
    file.flush().unwrap();

    let mut cfg = Config::load(Some(file.path())).unwrap();
    cfg.smooth_step_pct = 0;

    let bmc = cool_bmc();
    let mut ctl = ControlLoop::new(cfg, bmc.clone(), false);
    ctl.tick();
    assert_eq!(bmc.writes_for(PCIE_FAN), vec![42]);
}

#[test]
fn slew_limits_successive_ticks() {
    let bmc = cool_bmc();
    let mut cfg = Config::defaults();
    cfg.smooth_step_pct = 5;
    let mut ctl = ControlLoop::new(cfg, bmc.clone(), false);

    ctl.tick(); // hdd 30°C -> 20%
    bmc.set_temp(HDD_SENSOR, 60.0); // curve says 100%
    ctl.tick();
    ctl.tick();
    assert_eq!(bmc.writes_for(HDD_FAN), vec![20, 25, 30]);
}
