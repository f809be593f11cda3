use std::f64::consts::PI;

/// Data-taking years and output formats.
pub mod enums;
/// Three- and four-vectors with the collider-physics accessors used by the reduction.
pub mod vectors;

/// Difference between two azimuthal angles, wrapped into $`[-\pi, \pi)`$.
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    (phi1 - phi2 + PI).rem_euclid(2.0 * PI) - PI
}

/// Angular distance $`\Delta R = \sqrt{\Delta\eta^2 + \Delta\phi^2}`$.
pub fn delta_r(eta1: f64, eta2: f64, phi1: f64, phi2: f64) -> f64 {
    (eta1 - eta2).hypot(delta_phi(phi1, phi2))
}

/// Index of the element minimizing `key`, ignoring `NaN` keys. Ties resolve to the first
/// element.
pub fn argmin_by_key<T, F>(items: &[T], mut key: F) -> Option<(usize, f64)>
where
    F: FnMut(&T) -> f64,
{
    items
        .iter()
        .enumerate()
        .map(|(index, item)| (index, key(item)))
        .filter(|(_, value)| !value.is_nan())
        .fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if best_value <= value => best,
            _ => Some((index, value)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_delta_phi_wraps() {
        assert_relative_eq!(delta_phi(0.1, -0.1), 0.2, epsilon = 1e-12);
        assert_relative_eq!(delta_phi(3.0, -3.0), 6.0 - 2.0 * PI, epsilon = 1e-12);
        assert_relative_eq!(delta_phi(-3.0, 3.0), 2.0 * PI - 6.0, epsilon = 1e-12);
        assert!(delta_phi(PI, 0.0) < PI);
    }

    #[test]
    fn test_delta_r() {
        assert_relative_eq!(delta_r(1.0, 1.3, 0.0, 0.4), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_argmin_by_key() {
        let values = [3.0, 1.0, f64::NAN, 1.0, 2.0];
        assert_eq!(argmin_by_key(&values, |v| *v), Some((1, 1.0)));
        let empty: [f64; 0] = [];
        assert_eq!(argmin_by_key(&empty, |v| *v), None);
    }
}
