//! Derived hydraulic quantities for one pipe, shared by the kinetic
//! variable bindings and the dispersion correlations.

use wq_chem::SegEnv;
use wq_core::{Real, KINEMATIC_VISCOSITY};
use wq_network::Link;

pub const LAMINAR_REYNOLDS: Real = 2300.0;

/// Mean flow speed (m/s) from a signed flow rate.
pub fn velocity(link: &Link, q: Real) -> Real {
    let area = link.area();
    if area > 0.0 { q.abs() / area } else { 0.0 }
}

pub fn reynolds(link: &Link, u: Real) -> Real {
    u * link.diameter / KINEMATIC_VISCOSITY
}

/// Darcy friction factor: 64/Re in the laminar range, Swamee-Jain above.
pub fn friction_factor(link: &Link, re: Real) -> Real {
    if re <= 0.0 {
        return 0.0;
    }
    if re < LAMINAR_REYNOLDS {
        return 64.0 / re;
    }
    let rel_rough = link.roughness / (3.7 * link.diameter);
    let arg = rel_rough + 5.74 / re.powf(0.9);
    let log = arg.log10();
    0.25 / (log * log)
}

pub fn shear_velocity(u: Real, friction: Real) -> Real {
    u * (friction / 8.0).sqrt()
}

/// Hydraulic variables visible to kinetic expressions in this pipe.
pub fn seg_env(link: &Link, q: Real) -> SegEnv {
    let u = velocity(link, q);
    let re = reynolds(link, u);
    let ff = friction_factor(link, re);
    SegEnv {
        diameter: link.diameter,
        flow: q,
        velocity: u,
        reynolds: re,
        shear_velocity: shear_velocity(u, ff),
        friction_factor: ff,
        // wetted surface area per unit volume: pi*d*L / (pi/4 d^2 L)
        av_ratio: if link.diameter > 0.0 {
            4.0 / link.diameter
        } else {
            0.0
        },
        roughness: link.roughness,
        length: link.length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wq_core::Id;

    fn pipe() -> Link {
        Link {
            name: "P".into(),
            from: Id::from_index(0),
            to: Id::from_index(1),
            diameter: 0.5,
            length: 200.0,
            roughness: 0.0005,
        }
    }

    #[test]
    fn laminar_friction() {
        let link = pipe();
        let f = friction_factor(&link, 1000.0);
        assert!((f - 0.064).abs() < 1e-12);
    }

    #[test]
    fn turbulent_friction_in_plausible_range() {
        let link = pipe();
        let f = friction_factor(&link, 1e5);
        assert!(f > 0.01 && f < 0.08, "f = {f}");
    }

    #[test]
    fn env_is_direction_independent() {
        let link = pipe();
        let fwd = seg_env(&link, 0.1);
        let rev = seg_env(&link, -0.1);
        assert_eq!(fwd.velocity, rev.velocity);
        assert_eq!(fwd.reynolds, rev.reynolds);
        assert!((fwd.av_ratio - 8.0).abs() < 1e-12);
    }

    #[test]
    fn stagnant_pipe_has_zero_velocity() {
        let link = pipe();
        let env = seg_env(&link, 0.0);
        assert_eq!(env.velocity, 0.0);
        assert_eq!(env.friction_factor, 0.0);
        assert_eq!(env.shear_velocity, 0.0);
    }
}
