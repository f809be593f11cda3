use crate::utils::vectors::Vec3;

/// Solenoid field in Tesla.
pub const B_FIELD: f64 = 3.8;
/// Converts $`p_T`$ in GeV and $`B`$ in Tesla to a radius of curvature in cm.
pub const CURVATURE_CONSTANT: f64 = 0.0029979;

/// Radius of curvature in cm of a unit-charge track in the solenoid.
pub fn curvature_radius(pt: f64) -> f64 {
    pt / (CURVATURE_CONSTANT * B_FIELD)
}

/// Point of closest approach of a track to the reference origin, from its impact parameters.
///
/// `dxy` is the transverse impact parameter with respect to that origin, so the result is
/// expressed relative to it. Tracks with $`\lambda = 0`$ give non-finite coordinates.
pub fn track_reference_point(phi: f64, lambda: f64, dxy: f64, dsz: f64, dz: f64) -> Vec3 {
    let (sinphi, cosphi) = phi.sin_cos();
    let sinlmb = lambda.sin();
    let tanlmb = lambda.tan();
    let refz = dz;
    let refx = -sinphi * dxy - (cosphi / sinlmb) * dsz + (cosphi / tanlmb) * refz;
    let refy = cosphi * dxy - (sinphi / sinlmb) * dsz + (sinphi / tanlmb) * refz;
    Vec3::new(refx, refy, refz)
}

/// Azimuth of a track's momentum at its closest transverse approach to `target`.
///
/// The track starts at `reference` with `momentum` and bends in the solenoid field according
/// to `charge`. Neutral tracks, tracks without transverse momentum and non-finite inputs keep
/// their initial direction.
pub fn phi_at_vertex(reference: &Vec3, momentum: &Vec3, charge: i32, target: (f64, f64)) -> f64 {
    let phi0 = momentum.phi();
    let pt = momentum.rho();
    let finite = reference.x.is_finite()
        && reference.y.is_finite()
        && target.0.is_finite()
        && target.1.is_finite();
    if charge == 0 || pt <= 0.0 || !finite {
        return phi0;
    }
    let q = charge.signum() as f64;
    let radius = curvature_radius(pt);
    let (sin0, cos0) = phi0.sin_cos();
    let centre = (
        reference.x + q * radius * sin0,
        reference.y - q * radius * cos0,
    );
    let (dx, dy) = (target.0 - centre.0, target.1 - centre.1);
    let dist = dx.hypot(dy);
    if dist == 0.0 {
        return phi0;
    }
    let (ux, uy) = (dx / dist, dy / dist);
    let (tx, ty) = if q > 0.0 { (uy, -ux) } else { (-uy, ux) };
    ty.atan2(tx)
}
