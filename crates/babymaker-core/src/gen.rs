use crate::data::GenParticle;
use crate::utils::{argmin_by_key, delta_r};

/// Bosons and long-lived exotics recorded in the `GenOther_*` branches.
pub const GEN_OTHER_IDS: [i32; 6] = [23, 25, 6000211, 3000022, 999999, 1999999];
/// Mothers of the muons recorded in the `GenMuon_*` branches.
pub const GEN_MUON_MOTHER_IDS: [i32; 5] = [23, 6000211, 999999, 1999999, 3000022];
/// Maximum number of generations walked when looking for a non-muon ancestor.
pub const MAX_ANCESTOR_DEPTH: usize = 10;

pub fn mother_id(particle: &GenParticle, particles: &[GenParticle]) -> i32 {
    particle
        .mother(particles)
        .map(|mother| mother.pdg_id)
        .unwrap_or(0)
}

pub fn is_gen_other(particle: &GenParticle) -> bool {
    GEN_OTHER_IDS.contains(&particle.pdg_id.abs())
}

/// A muon from the decay of a signal particle. The mother id is compared with its sign.
pub fn is_gen_muon(particle: &GenParticle, particles: &[GenParticle]) -> bool {
    particle.pdg_id.abs() == 13 && GEN_MUON_MOTHER_IDS.contains(&mother_id(particle, particles))
}

/// First ancestor of `particles[index]` which is not a muon, looking through radiation
/// steps of the muon itself.
pub fn non_muon_ancestor(particles: &[GenParticle], index: usize) -> Option<&GenParticle> {
    let mut current = particles.get(index)?;
    for _ in 0..MAX_ANCESTOR_DEPTH {
        current = current.mother(particles)?;
        if current.pdg_id.abs() != 13 {
            return Some(current);
        }
    }
    None
}

/// Proper decay length of `mother` from the transverse production vertex of its daughter.
pub fn mother_ct(daughter: &GenParticle, mother: &GenParticle) -> f64 {
    let p4 = mother.p4();
    (daughter.vx * p4.px() + daughter.vy * p4.py()) * mother.mass / (p4.pt() * p4.pt())
}

/// Indices of the generator particles stored in the output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenSelection {
    pub others: Vec<usize>,
    pub muons: Vec<usize>,
}

impl GenSelection {
    pub fn new(particles: &[GenParticle]) -> Self {
        let mut selection = Self::default();
        for (index, particle) in particles.iter().enumerate() {
            if is_gen_other(particle) {
                selection.others.push(index);
            }
            if is_gen_muon(particle, particles) {
                selection.muons.push(index);
            }
        }
        selection
    }
}

/// Non-muon ancestor of a matched generator muon.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GenMother {
    pub pdg_id: i32,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub ct: f64,
}

/// The generator muon closest to a reconstructed muon.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GenMatch {
    pub index: usize,
    pub dr: f64,
    /// All zero when no non-muon ancestor was found.
    pub mother: GenMother,
}

/// Match a reconstructed direction to the closest of the selected generator muons.
pub fn match_muon(
    eta: f64,
    phi: f64,
    particles: &[GenParticle],
    selection: &GenSelection,
) -> Option<GenMatch> {
    let (position, dr) = argmin_by_key(&selection.muons, |&index| {
        let particle = &particles[index];
        delta_r(eta, particle.eta, phi, particle.phi)
    })?;
    let index = selection.muons[position];
    let daughter = &particles[index];
    let mother = non_muon_ancestor(particles, index)
        .map(|mother| GenMother {
            pdg_id: mother.pdg_id,
            vx: mother.vx,
            vy: mother.vy,
            vz: mother.vz,
            ct: mother_ct(daughter, mother),
        })
        .unwrap_or_default();
    Some(GenMatch { index, dr, mother })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn particle(pdg_id: i32, mother_idx: i32) -> GenParticle {
        GenParticle {
            pt: 10.0,
            mass: 0.1,
            pdg_id,
            mother_idx,
            status: 1,
            ..Default::default()
        }
    }

    /// h -> phi phi, phi -> mu mu with one radiating muon, plus an unrelated muon.
    fn cascade() -> Vec<GenParticle> {
        let higgs = particle(25, -1);
        let phi = GenParticle {
            pt: 20.0,
            eta: 0.0,
            phi: 0.0,
            mass: 2.0,
            vz: 0.1,
            ..particle(6000211, 0)
        };
        let mu_plus = GenParticle {
            eta: 0.5,
            phi: 0.3,
            vx: 1.0,
            vy: 0.5,
            ..particle(-13, 1)
        };
        let mu_minus = GenParticle {
            eta: -0.2,
            phi: -0.4,
            vx: 1.0,
            vy: 0.5,
            ..particle(13, 1)
        };
        let mu_minus_final = GenParticle {
            eta: -0.21,
            phi: -0.41,
            vx: 1.0,
            vy: 0.5,
            ..particle(13, 3)
        };
        let stray = GenParticle {
            eta: 2.0,
            phi: 2.0,
            ..particle(13, -1)
        };
        vec![higgs, phi, mu_plus, mu_minus, mu_minus_final, stray]
    }

    #[test]
    fn test_selection() {
        let particles = cascade();
        let selection = GenSelection::new(&particles);
        assert_eq!(selection.others, vec![0, 1]);
        assert_eq!(selection.muons, vec![2, 3]);
    }

    #[test]
    fn test_ancestor_walk_skips_muons() {
        let particles = cascade();
        assert_eq!(non_muon_ancestor(&particles, 4).map(|p| p.pdg_id), Some(6000211));
        assert_eq!(non_muon_ancestor(&particles, 5), None);
        assert_eq!(non_muon_ancestor(&particles, 0), None);
    }

    #[test]
    fn test_ancestor_walk_depth_limit() {
        let mut particles = vec![particle(25, -1)];
        for i in 0..12 {
            particles.push(particle(13, i));
        }
        assert!(non_muon_ancestor(&particles, 10).is_some());
        assert!(non_muon_ancestor(&particles, 12).is_none());
    }

    #[test]
    fn test_match_and_mother_ct() {
        let particles = cascade();
        let selection = GenSelection::new(&particles);
        let matched = match_muon(0.45, 0.3, &particles, &selection).unwrap();
        assert_eq!(matched.index, 2);
        assert_relative_eq!(matched.dr, 0.05, epsilon = 1e-12);
        assert_eq!(matched.mother.pdg_id, 6000211);
        // phi moves along x with pt 20 and mass 2
        assert_relative_eq!(matched.mother.ct, 1.0 * 20.0 * 2.0 / 400.0, epsilon = 1e-12);
        assert_relative_eq!(matched.mother.vz, 0.1);
        assert!(match_muon(0.0, 0.0, &particles, &GenSelection::default()).is_none());
    }
}
