use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::data::{Muon, Vertex};
use crate::utils::vectors::Vec3;

/// Runs before this one were reconstructed with association vectors which were never cleared
/// between muons.
pub const FIRST_CLEARED_RUN: u32 = 305405;

/// Whether the per-muon vertex-index lists of an event accumulate across muons.
///
/// This affects 2017 collision data up to the middle of era F. Simulation was produced with
/// the fixed reconstruction.
pub fn has_accumulating_indices(run: u32, is_mc: bool) -> bool {
    !is_mc && run > 100_000 && run < FIRST_CLEARED_RUN
}

/// Recover the per-muon vertex-index lists of one event.
///
/// When `accumulating` is set, each stored list also contains the entries of all previous
/// muons, so only the part beyond the running length is kept:
///
/// ```
/// use babymaker_core::selection::decode_vertex_indices;
///
/// let stored = vec![
///     vec![0],
///     vec![0, 1],
///     vec![0, 1, 0, 2],
///     vec![0, 1, 0, 2, 2],
///     vec![0, 1, 0, 2, 2, 1],
/// ];
/// let decoded = decode_vertex_indices(&stored, true);
/// assert_eq!(decoded, vec![vec![0], vec![1], vec![0, 2], vec![2], vec![1]]);
/// ```
pub fn decode_vertex_indices(lists: &[Vec<i32>], accumulating: bool) -> Vec<Vec<i32>> {
    if !accumulating {
        return lists.to_vec();
    }
    let mut offset = 0;
    lists
        .iter()
        .map(|list| {
            let tail = list.get(offset..).unwrap_or_default().to_vec();
            offset += tail.len();
            tail
        })
        .collect()
}

/// Quality requirements for a displaced vertex to be considered at all.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VertexQuality {
    pub max_x_error: f64,
    pub max_y_error: f64,
    pub max_z_error: f64,
    pub max_reduced_chi2: f64,
    /// Maximum transverse distance from the reference origin, in cm.
    pub max_rho_corr: f64,
}

impl Default for VertexQuality {
    fn default() -> Self {
        Self {
            max_x_error: 0.05,
            max_y_error: 0.05,
            max_z_error: 0.10,
            max_reduced_chi2: 5.0,
            max_rho_corr: 11.0,
        }
    }
}

impl VertexQuality {
    /// Apply the gate, with `origin` as the centre of the corrected radius.
    ///
    /// Written as positive comparisons so that a NaN anywhere fails, and a vertex without degrees
    /// of freedom fails through its NaN $`\chi^2/n_\text{dof}`$.
    pub fn passes(&self, vertex: &Vertex, origin: &Vec3) -> bool {
        vertex.x_error <= self.max_x_error
            && vertex.y_error <= self.max_y_error
            && vertex.z_error <= self.max_z_error
            && vertex.reduced_chi2() <= self.max_reduced_chi2
            && vertex.rho_corr(origin) <= self.max_rho_corr
    }
}

/// Vertex index to associated muon indices, muons in increasing index order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssociationMap {
    muons_by_vertex: HashMap<usize, Vec<usize>>,
}

impl AssociationMap {
    /// Invert decoded muon-to-vertex lists. Negative indices are dropped.
    pub fn from_lists(lists: &[Vec<i32>]) -> Self {
        let mut muons_by_vertex: HashMap<usize, Vec<usize>> = HashMap::new();
        for (imuon, list) in lists.iter().enumerate() {
            for &idv in list {
                let Ok(idv) = usize::try_from(idv) else {
                    continue;
                };
                muons_by_vertex.entry(idv).or_default().push(imuon);
            }
        }
        Self { muons_by_vertex }
    }

    /// Build the map straight from the muons of an event.
    pub fn from_muons(muons: &[Muon], accumulating: bool) -> Self {
        let stored = muons
            .iter()
            .map(|muon| muon.vtx_indices.clone())
            .collect::<Vec<_>>();
        Self::from_lists(&decode_vertex_indices(&stored, accumulating))
    }

    /// Muons associated with vertex `idv`, or `None` when no muon claims it.
    pub fn muons(&self, idv: usize) -> Option<&[usize]> {
        self.muons_by_vertex.get(&idv).map(Vec::as_slice)
    }

    /// Number of vertices each muon is associated with, for muons on more than one.
    pub fn shared_muons(&self) -> IndexMap<usize, usize> {
        let mut counts: IndexMap<usize, usize> = IndexMap::new();
        for muons in self.muons_by_vertex.values() {
            for &imuon in muons {
                *counts.entry(imuon).or_default() += 1;
            }
        }
        counts.retain(|_, count| *count > 1);
        counts.sort_keys();
        counts
    }
}

/// One displaced vertex with exactly two associated muons, the higher-pt muon first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub vertex: usize,
    pub leading: usize,
    pub subleading: usize,
}

impl Candidate {
    fn ordered(vertex: usize, pair: (usize, usize), muons: &[Muon]) -> Self {
        let (first, second) = pair;
        if muons[second].pt > muons[first].pt {
            Self {
                vertex,
                leading: second,
                subleading: first,
            }
        } else {
            Self {
                vertex,
                leading: first,
                subleading: second,
            }
        }
    }

    /// Whether the two candidates have no muon in common.
    pub fn is_disjoint(&self, other: &Candidate) -> bool {
        let mine = [self.leading, self.subleading];
        !mine.contains(&other.leading) && !mine.contains(&other.subleading)
    }
}

/// The best candidate of an event and, if present, a second one on a different muon pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub primary: Candidate,
    pub secondary: Option<Candidate>,
}

/// Reasons an event yields no candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionFailure {
    #[error("no displaced vertex passes the quality requirements")]
    NoGoodVertex,
    #[error("no muon is associated with the best vertex (index {vertex}, {tracks} tracks)")]
    NoAssociatedMuons { vertex: usize, tracks: i32 },
    #[error("{count} muon(s) associated with the best vertex (index {vertex}, {tracks} tracks)")]
    WrongMuonCount {
        vertex: usize,
        count: usize,
        tracks: i32,
    },
}

/// Choose the best vertex and its muon pair.
///
/// Among the vertices flagged in `passid`, the one with the smallest `max(xError, yError)` is
/// the primary; ties keep input order. It must have exactly two associated muons. A secondary
/// candidate is formed from the next-best vertex when the event has at least four muons and
/// that vertex carries exactly two muons, neither of which belongs to the primary.
pub fn pick_best_objects(
    vertices: &[Vertex],
    passid: &[bool],
    muons: &[Muon],
    run: u32,
    is_mc: bool,
) -> Result<Selection, SelectionFailure> {
    let association = AssociationMap::from_muons(muons, has_accumulating_indices(run, is_mc));

    let mut ranked = vertices
        .iter()
        .enumerate()
        .filter(|(idv, _)| passid.get(*idv).copied().unwrap_or(false))
        .map(|(idv, vertex)| (idv, vertex.x_error.max(vertex.y_error)))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let Some(&(best, _)) = ranked.first() else {
        return Err(SelectionFailure::NoGoodVertex);
    };
    let tracks = vertices[best].tracks_size;
    let pair = match association.muons(best) {
        None | Some([]) => {
            return Err(SelectionFailure::NoAssociatedMuons {
                vertex: best,
                tracks,
            })
        }
        Some(&[first, second]) => (first, second),
        Some(other) => {
            return Err(SelectionFailure::WrongMuonCount {
                vertex: best,
                count: other.len(),
                tracks,
            })
        }
    };
    let primary = Candidate::ordered(best, pair, muons);

    let shared = association.shared_muons();
    if shared.values().any(|&count| count > 2) {
        debug!(?shared, "muons shared by three or more vertices");
    }

    let mut secondary = None;
    if ranked.len() >= 2 && muons.len() >= 4 {
        let next = ranked[1].0;
        if let Some(&[first, second]) = association.muons(next) {
            let candidate = Candidate::ordered(next, (first, second), muons);
            if primary.is_disjoint(&candidate) {
                secondary = Some(candidate);
            } else {
                debug!(
                    vertex = next,
                    "second vertex shares a muon with the best vertex"
                );
            }
        }
    }

    Ok(Selection { primary, secondary })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(err: f64) -> Vertex {
        Vertex {
            x: 1.0,
            y: 1.0,
            z: 0.0,
            x_error: err,
            y_error: err / 2.0,
            z_error: 0.01,
            chi2: 1.0,
            ndof: 1,
            tracks_size: 2,
        }
    }

    fn muon(pt: f64, indices: Vec<i32>) -> Muon {
        Muon {
            pt,
            vtx_indices: indices,
            ..Default::default()
        }
    }

    #[test]
    fn test_accumulating_runs() {
        assert!(has_accumulating_indices(305000, false));
        assert!(!has_accumulating_indices(305000, true));
        assert!(!has_accumulating_indices(305405, false));
        assert!(!has_accumulating_indices(1, false));
    }

    #[test]
    fn test_decode_documented_sequence() {
        let stored = vec![
            vec![0],
            vec![0, 1],
            vec![0, 1, 0, 2],
            vec![0, 1, 0, 2, 2],
            vec![0, 1, 0, 2, 2, 1],
        ];
        assert_eq!(
            decode_vertex_indices(&stored, true),
            vec![vec![0], vec![1], vec![0, 2], vec![2], vec![1]]
        );
        assert_eq!(decode_vertex_indices(&stored, false), stored);
    }

    #[test]
    fn test_decode_short_list_is_empty() {
        let stored = vec![vec![0, 1], vec![0]];
        assert_eq!(
            decode_vertex_indices(&stored, true),
            vec![vec![0, 1], vec![]]
        );
    }

    #[test]
    fn test_quality_gate() {
        let gate = VertexQuality::default();
        let origin = Vec3::default();
        let good = vertex(0.01);
        assert!(gate.passes(&good, &origin));
        assert!(!gate.passes(&vertex(0.06), &origin));
        let far = Vertex {
            x: 11.5,
            ..good.clone()
        };
        assert!(!gate.passes(&far, &origin));
        assert!(gate.passes(&far, &Vec3::new(1.0, 0.0, 0.0)));
        let no_dof = Vertex {
            ndof: 0,
            ..good.clone()
        };
        assert!(!gate.passes(&no_dof, &origin));
        let nan = Vertex {
            z_error: f64::NAN,
            ..good
        };
        assert!(!gate.passes(&nan, &origin));
    }

    #[test]
    fn test_best_vertex_is_smallest_error() {
        let vertices = vec![vertex(0.03), vertex(0.01), vertex(0.02)];
        let muons = vec![
            muon(5.0, vec![0]),
            muon(6.0, vec![0, 1]),
            muon(7.0, vec![1, 2]),
            muon(8.0, vec![2]),
        ];
        let selection =
            pick_best_objects(&vertices, &[true, true, true], &muons, 320000, false).unwrap();
        assert_eq!(
            selection.primary,
            Candidate {
                vertex: 1,
                leading: 2,
                subleading: 1
            }
        );
        // vertex 2 is next best but shares muon 2
        assert_eq!(selection.secondary, None);
    }

    #[test]
    fn test_failing_vertex_is_never_chosen() {
        let vertices = vec![vertex(0.03), vertex(0.01)];
        let muons = vec![muon(5.0, vec![0, 1]), muon(6.0, vec![0, 1])];
        let selection = pick_best_objects(&vertices, &[true, false], &muons, 320000, false).unwrap();
        assert_eq!(selection.primary.vertex, 0);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let vertices = vec![vertex(0.02), vertex(0.02)];
        let muons = vec![muon(5.0, vec![0, 1]), muon(5.0, vec![0, 1])];
        let selection = pick_best_objects(&vertices, &[true, true], &muons, 320000, false).unwrap();
        assert_eq!(
            selection.primary,
            Candidate {
                vertex: 0,
                leading: 0,
                subleading: 1
            }
        );
    }

    #[test]
    fn test_failures() {
        let vertices = vec![vertex(0.01)];
        let two = vec![muon(5.0, vec![0]), muon(6.0, vec![0])];
        assert_eq!(
            pick_best_objects(&vertices, &[false], &two, 320000, false),
            Err(SelectionFailure::NoGoodVertex)
        );
        let unassociated = vec![muon(5.0, vec![]), muon(6.0, vec![])];
        assert_eq!(
            pick_best_objects(&vertices, &[true], &unassociated, 320000, false),
            Err(SelectionFailure::NoAssociatedMuons {
                vertex: 0,
                tracks: 2
            })
        );
        let three = vec![muon(5.0, vec![0]), muon(6.0, vec![0]), muon(7.0, vec![0])];
        assert_eq!(
            pick_best_objects(&vertices, &[true], &three, 320000, false),
            Err(SelectionFailure::WrongMuonCount {
                vertex: 0,
                count: 3,
                tracks: 2
            })
        );
    }

    #[test]
    fn test_secondary_candidate() {
        let vertices = vec![vertex(0.02), vertex(0.01)];
        let muons = vec![
            muon(5.0, vec![0]),
            muon(9.0, vec![1]),
            muon(6.0, vec![0]),
            muon(3.0, vec![1]),
        ];
        let selection = pick_best_objects(&vertices, &[true, true], &muons, 320000, false).unwrap();
        assert_eq!(
            selection.primary,
            Candidate {
                vertex: 1,
                leading: 1,
                subleading: 3
            }
        );
        assert_eq!(
            selection.secondary,
            Some(Candidate {
                vertex: 0,
                leading: 2,
                subleading: 0
            })
        );
    }

    #[test]
    fn test_secondary_requires_four_muons_and_two_vertices() {
        let vertices = vec![vertex(0.02), vertex(0.01)];
        let muons = vec![
            muon(5.0, vec![0]),
            muon(9.0, vec![1]),
            muon(6.0, vec![0]),
            muon(3.0, vec![1]),
        ];
        let only_one = pick_best_objects(&vertices, &[false, true], &muons, 320000, false).unwrap();
        assert_eq!(only_one.secondary, None);
        let three_muons = vec![muon(5.0, vec![0]), muon(9.0, vec![1]), muon(3.0, vec![1])];
        let selection =
            pick_best_objects(&vertices, &[true, true], &three_muons, 320000, false).unwrap();
        assert_eq!(selection.secondary, None);
    }

    #[test]
    fn test_accumulating_lists_are_decoded_before_association() {
        let vertices = vec![vertex(0.01), vertex(0.02), vertex(0.03)];
        let muons = vec![
            muon(5.0, vec![0]),
            muon(6.0, vec![0, 1]),
            muon(7.0, vec![0, 1, 0, 2]),
            muon(8.0, vec![0, 1, 0, 2, 2]),
            muon(9.0, vec![0, 1, 0, 2, 2, 1]),
        ];
        // decoded: [0] [1] [0, 2] [2] [1]
        let selection =
            pick_best_objects(&vertices, &[true, true, true], &muons, 304000, false).unwrap();
        assert_eq!(
            selection.primary,
            Candidate {
                vertex: 0,
                leading: 2,
                subleading: 0
            }
        );
        assert_eq!(
            selection.secondary,
            Some(Candidate {
                vertex: 1,
                leading: 4,
                subleading: 1
            })
        );
    }

    #[test]
    fn test_shared_muons() {
        let map = AssociationMap::from_lists(&[vec![0, 1, 2], vec![1], vec![-1]]);
        assert_eq!(map.muons(1), Some(&[0, 1][..]));
        assert_eq!(map.muons(5), None);
        let shared = map.shared_muons();
        assert_eq!(shared.get(&0), Some(&3));
        assert_eq!(shared.get(&1), None);
    }
}
