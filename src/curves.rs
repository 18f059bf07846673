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

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub temp_c: f64,
    pub duty_pct: u8,
}

/// A piecewise-linear temperature-to-duty mapping.
///
/// Points are strictly increasing in temperature and validated once at load
/// time; evaluation afterwards cannot fail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    points: Vec<CurvePoint>,
}

impl Curve {
    /// Build a curve from `[temperature, duty]` pairs as they appear in the
    /// JSON config. Fails fast on anything that would make evaluation
    /// ambiguous; the caller wraps the reason into its own error type.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, String> {
        if pairs.is_empty() {
            return Err("curve must have at least one point".into());
        }
        let mut points = Vec::with_capacity(pairs.len());
        let mut last_t = f64::NEG_INFINITY;
        for &(temp_c, duty) in pairs {
            if !temp_c.is_finite() {
                return Err("curve temperature must be finite".into());
            }
            if !duty.is_finite() || !(0.0..=100.0).contains(&duty) {
                return Err(format!("duty {} out of range (0..100)", duty));
            }
            if temp_c <= last_t {
                return Err("curve temperatures must be strictly increasing".into());
            }
            last_t = temp_c;
            points.push(CurvePoint { temp_c, duty_pct: duty.round() as u8 });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Temperature of the highest bucket; used as the default override
    /// threshold for coupled zones.
    pub fn top_temp(&self) -> f64 {
        // non-empty by construction
        self.points[self.points.len() - 1].temp_c
    }

    /// Map a temperature to a duty percentage.
    ///
    /// Below the first point the first duty applies, above the last point the
    /// last duty applies; in between, the two bracketing points are linearly
    /// interpolated and the result rounded to the nearest integer.
    pub fn evaluate(&self, temp_c: f64) -> u8 {
        let first = &self.points[0];
        let last = &self.points[self.points.len() - 1];
        if temp_c <= first.temp_c {
            return first.duty_pct;
        }
        if temp_c >= last.temp_c {
            return last.duty_pct;
        }
        for w in self.points.windows(2) {
            let a = &w[0];
            let b = &w[1];
            if temp_c >= a.temp_c && temp_c <= b.temp_c {
                let t = (temp_c - a.temp_c) / (b.temp_c - a.temp_c);
                let v = (a.duty_pct as f64) + t * ((b.duty_pct as f64) - (a.duty_pct as f64));
                return v.round().clamp(0.0, 100.0) as u8;
            }
        }
        last.duty_pct
    }
}

pub fn default_cpu_curve() -> Curve {
    Curve::from_pairs(&[(40.0, 15.0), (55.0, 40.0), (70.0, 70.0), (80.0, 100.0)])
        .expect("built-in cpu curve is valid")
}

pub fn default_chassis_curve() -> Curve {
    Curve::from_pairs(&[(35.0, 15.0), (45.0, 30.0), (55.0, 60.0), (65.0, 100.0)])
        .expect("built-in chassis curve is valid")
}

pub fn default_hdd_curve() -> Curve {
    Curve::from_pairs(&[(30.0, 20.0), (40.0, 35.0), (50.0, 60.0), (55.0, 100.0)])
        .expect("built-in hdd curve is valid")
}

pub fn default_pcie_curve() -> Curve {
    Curve::from_pairs(&[(40.0, 20.0), (65.0, 50.0), (75.0, 80.0), (80.0, 100.0)])
        .expect("built-in pcie curve is valid")
}
