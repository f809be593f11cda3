use std::{fmt::Display, iter::Sum};

use auto_ops::{impl_op_ex, impl_op_ex_commutative};
use serde::{Deserialize, Serialize};

use crate::utils::delta_phi;

/// A three-vector, used both for positions (cm) and momenta (GeV).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// The $`x`$ component.
    pub x: f64,
    /// The $`y`$ component.
    pub y: f64,
    /// The $`z`$ component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new [`Vec3`] from its components.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Attach a mass to this momentum, returning the on-shell four-momentum.
    pub fn with_mass(&self, mass: f64) -> Vec4 {
        let e = (mass * mass + self.mag2()).sqrt();
        Vec4::new(self.x, self.y, self.z, e)
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn mag2(&self) -> f64 {
        self.dot(self)
    }

    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }

    /// Transverse component $`\sqrt{x^2 + y^2}`$.
    pub fn rho(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Azimuthal angle of the transverse projection.
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// The transverse projection of this vector, with the $`z`$ component dropped.
    pub fn transverse(&self) -> Self {
        Self::new(self.x, self.y, 0.0)
    }

    /// Cosine of the opening angle between the transverse projections of two vectors.
    pub fn cos_transverse_angle(&self, other: &Self) -> f64 {
        self.transverse().dot(&other.transverse()) / (self.rho() * other.rho())
    }
}

impl Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:6.3}, {:6.3}, {:6.3}]", self.x, self.y, self.z)
    }
}

impl_op_ex!(+ |a: &Vec3, b: &Vec3| -> Vec3 { Vec3::new(a.x + b.x, a.y + b.y, a.z + b.z) });
impl_op_ex!(-|a: &Vec3, b: &Vec3| -> Vec3 { Vec3::new(a.x - b.x, a.y - b.y, a.z - b.z) });
impl_op_ex!(-|a: &Vec3| -> Vec3 { Vec3::new(-a.x, -a.y, -a.z) });
impl_op_ex_commutative!(*|a: &Vec3, b: &f64| -> Vec3 { Vec3::new(a.x * b, a.y * b, a.z * b) });
impl_op_ex!(/ |a: &Vec3, b: &f64| -> Vec3 { Vec3::new(a.x / b, a.y / b, a.z / b) });

/// A four-momentum $`(p_x, p_y, p_z, E)`$ in GeV.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    /// The $`p_x`$ component.
    pub x: f64,
    /// The $`p_y`$ component.
    pub y: f64,
    /// The $`p_z`$ component.
    pub z: f64,
    /// The energy component.
    pub t: f64,
}

impl Vec4 {
    /// Create a new [`Vec4`] from its components.
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self {
            x: px,
            y: py,
            z: pz,
            t: e,
        }
    }

    /// Build a four-momentum from collider coordinates, as ROOT's
    /// `TLorentzVector::SetPtEtaPhiM` does.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        let pt = pt.abs();
        Vec3::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh()).with_mass(m)
    }

    pub fn px(&self) -> f64 {
        self.x
    }

    pub fn py(&self) -> f64 {
        self.y
    }

    pub fn pz(&self) -> f64 {
        self.z
    }

    pub fn e(&self) -> f64 {
        self.t
    }

    pub fn vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Pseudorapidity. A vector along the beam axis gets $`\pm\infty`$.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0.0 {
            if self.z == 0.0 {
                return 0.0;
            }
            return self.z.signum() * f64::INFINITY;
        }
        (self.z / pt).asinh()
    }

    pub fn phi(&self) -> f64 {
        self.vec3().phi()
    }

    /// Squared invariant mass.
    pub fn m2(&self) -> f64 {
        self.t * self.t - self.vec3().mag2()
    }

    /// Invariant mass. Space-like vectors return $`-\sqrt{-m^2}`$ like ROOT does.
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        if m2 < 0.0 {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }

    /// Azimuthal separation to `other`, wrapped into $`[-\pi, \pi)`$.
    pub fn delta_phi(&self, other: &Self) -> f64 {
        delta_phi(self.phi(), other.phi())
    }

    /// String representation used in debug printouts.
    pub fn to_p4_string(&self) -> String {
        format!(
            "[e = {:.5}; p = ({:.5}, {:.5}, {:.5}); m = {:.5}]",
            self.t,
            self.x,
            self.y,
            self.z,
            self.m()
        )
    }
}

impl Display for Vec4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_p4_string())
    }
}

impl_op_ex!(+ |a: &Vec4, b: &Vec4| -> Vec4 { Vec4::new(a.x + b.x, a.y + b.y, a.z + b.z, a.t + b.t) });
impl_op_ex!(-|a: &Vec4, b: &Vec4| -> Vec4 { Vec4::new(a.x - b.x, a.y - b.y, a.z - b.z, a.t - b.t) });
impl_op_ex!(-|a: &Vec4| -> Vec4 { Vec4::new(-a.x, -a.y, -a.z, -a.t) });

impl Sum for Vec4 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Vec4::default(), |acc, p4| acc + p4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MUON_MASS;
    use approx::assert_relative_eq;

    #[test]
    fn test_pt_eta_phi_m_roundtrip() {
        let p4 = Vec4::from_pt_eta_phi_m(12.5, -1.3, 2.1, MUON_MASS);
        assert_relative_eq!(p4.pt(), 12.5, epsilon = 1e-12);
        assert_relative_eq!(p4.eta(), -1.3, epsilon = 1e-12);
        assert_relative_eq!(p4.phi(), 2.1, epsilon = 1e-12);
        assert_relative_eq!(p4.m(), MUON_MASS, epsilon = 1e-9);
    }

    #[test]
    fn test_back_to_back_mass() {
        let mu1 = Vec4::from_pt_eta_phi_m(5.0, 0.0, 0.0, MUON_MASS);
        let mu2 = Vec4::from_pt_eta_phi_m(5.0, 0.0, std::f64::consts::PI, MUON_MASS);
        let dimuon = mu1 + mu2;
        let e = (25.0 + MUON_MASS * MUON_MASS).sqrt();
        assert_relative_eq!(dimuon.m(), 2.0 * e, epsilon = 1e-9);
        assert_relative_eq!(dimuon.pt(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_spacelike_mass_is_negative() {
        let p4 = Vec4::new(3.0, 0.0, 4.0, 1.0);
        assert_relative_eq!(p4.m(), -(24.0_f64).sqrt());
    }

    #[test]
    fn test_sum_and_delta_phi() {
        let a = Vec4::from_pt_eta_phi_m(1.0, 0.0, 3.0, 0.0);
        let b = Vec4::from_pt_eta_phi_m(1.0, 0.0, -3.0, 0.0);
        assert_relative_eq!(
            a.delta_phi(&b),
            6.0 - 2.0 * std::f64::consts::PI,
            epsilon = 1e-12
        );
        let total: Vec4 = [a, b].into_iter().sum();
        assert_relative_eq!(total.px(), a.px() + b.px());
        assert_relative_eq!(total.e(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cos_transverse_angle() {
        let a = Vec3::new(1.0, 0.0, 5.0);
        let b = Vec3::new(1.0, 1.0, -2.0);
        assert_relative_eq!(a.cos_transverse_angle(&b), 1.0 / 2.0_f64.sqrt());
    }
}
