//! Classical orbital elements and orbit regions
//!
//! Element order: semi-major axis `a`, eccentricity `e`, inclination `i`,
//! right ascension of the ascending node `Ω`, argument of periapsis `ω`,
//! mean anomaly `M`. Angles in radians. Only elliptic orbits are handled.

use std::f64::consts::PI;
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};
use rand::Rng;

use crate::common::{PlannerError, PlannerResult, SampleBounds, State};
use crate::dynamics::central_body::EARTH_RADIUS;

const SMALL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub raan: f64,
    pub arg_periapsis: f64,
    pub mean_anomaly: f64,
}

impl OrbitalElements {
    pub fn new(
        semi_major_axis: f64,
        eccentricity: f64,
        inclination: f64,
        raan: f64,
        arg_periapsis: f64,
        mean_anomaly: f64,
    ) -> Self {
        OrbitalElements {
            semi_major_axis,
            eccentricity,
            inclination,
            raan,
            arg_periapsis,
            mean_anomaly,
        }
    }

    /// Inertial position/velocity `[r; v]`
    pub fn to_state(&self, mu: f64) -> PlannerResult<State> {
        let a = self.semi_major_axis;
        let e = self.eccentricity;
        if !(0.0..1.0).contains(&e) || a <= 0.0 {
            return Err(PlannerError::InvalidParameter(format!(
                "only elliptic orbits are supported (a = {}, e = {})",
                a, e
            )));
        }

        let ecc_anomaly = solve_kepler(self.mean_anomaly, e);
        let nu = 2.0 * ((1.0 + e).sqrt() * (ecc_anomaly / 2.0).sin())
            .atan2((1.0 - e).sqrt() * (ecc_anomaly / 2.0).cos());
        let p = a * (1.0 - e * e);
        let r = a * (1.0 - e * ecc_anomaly.cos());

        let r_pf = Vector3::new(r * nu.cos(), r * nu.sin(), 0.0);
        let v_pf = Vector3::new(-nu.sin(), e + nu.cos(), 0.0) * (mu / p).sqrt();

        let rot = perifocal_to_inertial(self.raan, self.inclination, self.arg_periapsis);
        let r_eci = rot * r_pf;
        let v_eci = rot * v_pf;

        Ok(State::from_vec(vec![
            r_eci.x, r_eci.y, r_eci.z, v_eci.x, v_eci.y, v_eci.z,
        ]))
    }

    /// Elements of an inertial state `[r; v]`
    pub fn from_state(state: &State, mu: f64) -> PlannerResult<Self> {
        if state.len() != 6 {
            return Err(PlannerError::dimension("orbital state", 6, state.len()));
        }
        let r = Vector3::new(state[0], state[1], state[2]);
        let v = Vector3::new(state[3], state[4], state[5]);
        let r_norm = r.norm();
        let v2 = v.norm_squared();

        let energy = 0.5 * v2 - mu / r_norm;
        if energy >= 0.0 {
            return Err(PlannerError::InvalidParameter(
                "state is not on an elliptic orbit".to_string(),
            ));
        }
        let a = -mu / (2.0 * energy);

        let h = r.cross(&v);
        let h_norm = h.norm();
        let node = Vector3::new(-h.y, h.x, 0.0);
        let node_norm = node.norm();
        let e_vec = (r * (v2 - mu / r_norm) - v * r.dot(&v)) / mu;
        let e = e_vec.norm();

        let inclination = (h.z / h_norm).clamp(-1.0, 1.0).acos();
        let equatorial = node_norm < SMALL * h_norm;
        let circular = e < SMALL;

        let raan = if equatorial { 0.0 } else { node.y.atan2(node.x) };

        let arg_periapsis = if circular {
            0.0
        } else if equatorial {
            let w = e_vec.y.atan2(e_vec.x);
            if h.z < 0.0 {
                -w
            } else {
                w
            }
        } else {
            let cos_w = (node.dot(&e_vec) / (node_norm * e)).clamp(-1.0, 1.0);
            let w = cos_w.acos();
            if e_vec.z < 0.0 {
                2.0 * PI - w
            } else {
                w
            }
        };

        // true anomaly, measured from the periapsis (or its substitute)
        let nu = if !circular {
            let cos_nu = (e_vec.dot(&r) / (e * r_norm)).clamp(-1.0, 1.0);
            let nu = cos_nu.acos();
            if r.dot(&v) < 0.0 {
                2.0 * PI - nu
            } else {
                nu
            }
        } else if !equatorial {
            let cos_u = (node.dot(&r) / (node_norm * r_norm)).clamp(-1.0, 1.0);
            let u = cos_u.acos();
            if r.z < 0.0 {
                2.0 * PI - u
            } else {
                u
            }
        } else {
            let l = r.y.atan2(r.x);
            if h.z < 0.0 {
                -l
            } else {
                l
            }
        };

        let ecc_anomaly = ((1.0 - e * e).sqrt() * nu.sin()).atan2(e + nu.cos());
        let mean_anomaly = ecc_anomaly - e * ecc_anomaly.sin();

        Ok(OrbitalElements {
            semi_major_axis: a,
            eccentricity: e,
            inclination,
            raan: wrap_two_pi(raan),
            arg_periapsis: wrap_two_pi(arg_periapsis),
            mean_anomaly: wrap_two_pi(mean_anomaly),
        })
    }
}

/// Solve Kepler's equation `M = E − e sin E` by Newton iteration
pub fn solve_kepler(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let m = wrap_two_pi(mean_anomaly);
    let mut ecc_anomaly = if eccentricity < 0.8 { m } else { PI };
    for _ in 0..50 {
        let f = ecc_anomaly - eccentricity * ecc_anomaly.sin() - m;
        let df = 1.0 - eccentricity * ecc_anomaly.cos();
        let step = f / df;
        ecc_anomaly -= step;
        if step.abs() < 1e-14 {
            break;
        }
    }
    ecc_anomaly
}

/// State on a circular orbit of the given radius.
/// `arg_latitude` is the angle from the ascending node along the orbit.
pub fn circular_orbit(
    mu: f64,
    radius: f64,
    inclination: f64,
    raan: f64,
    arg_latitude: f64,
) -> PlannerResult<State> {
    OrbitalElements::new(radius, 0.0, inclination, raan, 0.0, arg_latitude).to_state(mu)
}

fn perifocal_to_inertial(raan: f64, inclination: f64, arg_periapsis: f64) -> Matrix3<f64> {
    let (so, co) = raan.sin_cos();
    let (si, ci) = inclination.sin_cos();
    let (sw, cw) = arg_periapsis.sin_cos();
    Matrix3::new(
        co * cw - so * sw * ci, -co * sw - so * cw * ci, so * si,
        so * cw + co * sw * ci, -so * sw + co * cw * ci, -co * si,
        sw * si, cw * si, ci,
    )
}

fn wrap_two_pi(angle: f64) -> f64 {
    angle.rem_euclid(2.0 * PI)
}

/// Altitude band of an Earth orbit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitRegion {
    Leo,
    Meo,
    Geo,
}

impl OrbitRegion {
    /// Altitude range above the equatorial radius [km]
    pub fn altitude_range(&self) -> (f64, f64) {
        match self {
            OrbitRegion::Leo => (160.0, 2000.0),
            OrbitRegion::Meo => (2000.0, 35_586.0),
            OrbitRegion::Geo => (35_586.0, 35_986.0),
        }
    }

    /// Radius range from the Earth's center [km]
    pub fn radius_range(&self) -> (f64, f64) {
        let (lo, hi) = self.altitude_range();
        (EARTH_RADIUS + lo, EARTH_RADIUS + hi)
    }

    /// Draw random elements with perigee and apogee inside the band and
    /// convert them to an inertial state
    pub fn sample_orbit<R: Rng + ?Sized>(&self, mu: f64, rng: &mut R) -> PlannerResult<State> {
        let (r_min, r_max) = self.radius_range();
        let a = rng.gen_range(r_min..=r_max);
        let e_max = (1.0 - r_min / a).min(r_max / a - 1.0).max(0.0);
        let e = if e_max > 0.0 { rng.gen_range(0.0..=e_max) } else { 0.0 };
        let elements = OrbitalElements::new(
            a,
            e,
            rng.gen_range(0.0..=PI),
            rng.gen_range(0.0..2.0 * PI),
            rng.gen_range(0.0..2.0 * PI),
            rng.gen_range(0.0..2.0 * PI),
        );
        elements.to_state(mu)
    }

    /// Position/velocity box enclosing every orbit of the band
    pub fn sample_bounds(&self, mu: f64) -> SampleBounds {
        let (r_min, r_max) = self.radius_range();
        // fastest speed is at a perigee of r_min with apogee r_max
        let v_max = (2.0 * mu * r_max / (r_min * (r_min + r_max))).sqrt();
        let mut pairs = vec![(-r_max, r_max); 3];
        pairs.extend(std::iter::repeat((-v_max, v_max)).take(3));
        SampleBounds::from_pairs(&pairs)
    }
}

impl FromStr for OrbitRegion {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LEO" => Ok(OrbitRegion::Leo),
            "MEO" => Ok(OrbitRegion::Meo),
            "GEO" => Ok(OrbitRegion::Geo),
            other => Err(PlannerError::InvalidParameter(format!(
                "unknown orbit region: {}",
                other
            ))),
        }
    }
}
