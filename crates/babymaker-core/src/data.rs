
use crate::utils::vectors::{Vec3, Vec4};
use crate::MUON_MASS;

pub mod io;

pub use io::{read_events, split_input_names};

/// Default name of the input tree.
pub const DEFAULT_TREE: &str = "Events";

/// The `(run, lumi, event)` triple identifying a collision.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventId {
    pub run: u32,
    pub lumi: u32,
    pub event: u64,
}

/// A displaced vertex fitted from a pair (or more) of muon tracks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub x_error: f64,
    pub y_error: f64,
    pub z_error: f64,
    pub chi2: f64,
    pub ndof: i32,
    pub tracks_size: i32,
}

impl Vertex {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Transverse distance from the detector axis.
    pub fn rho(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Transverse distance from `origin`, usually the beamspot.
    pub fn rho_corr(&self, origin: &Vec3) -> f64 {
        (self.x - origin.x).hypot(self.y - origin.y)
    }

    /// $`\chi^2/n_\text{dof}`$, or NaN for a vertex without degrees of freedom.
    pub fn reduced_chi2(&self) -> f64 {
        if self.ndof > 0 {
            self.chi2 / self.ndof as f64
        } else {
            f64::NAN
        }
    }
}

/// A primary vertex refitted with the muon tracks removed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimaryVertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub chi2: f64,
    pub ndof: i32,
}

impl PrimaryVertex {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// A scouting muon with its track parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Muon {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub charge: i32,
    pub track_iso: f64,
    pub chi2: f64,
    pub ndof: f64,
    pub dxy: f64,
    pub dz: f64,
    pub dxy_error: f64,
    pub dz_error: f64,
    pub trk_qoverp: f64,
    pub trk_lambda: f64,
    pub trk_qoverp_error: f64,
    pub trk_lambda_error: f64,
    pub trk_phi_error: f64,
    pub trk_dsz: f64,
    pub trk_dsz_error: f64,
    pub n_valid_muon_hits: i32,
    pub n_valid_pixel_hits: i32,
    pub n_matched_stations: i32,
    pub n_tracker_layers: i32,
    pub n_valid_strip_hits: i32,
    /// Only present in files produced with hit information.
    pub n_expected_pixel_hits: Option<i32>,
    /// Indices of the displaced vertices this muon was fitted into, as stored in the file.
    pub vtx_indices: Vec<i32>,
}

impl Muon {
    /// The four-momentum with the muon mass hypothesis.
    pub fn p4(&self) -> Vec4 {
        Vec4::from_pt_eta_phi_m(self.pt, self.eta, self.phi, MUON_MASS)
    }

    /// The four-momentum with the azimuth replaced by `phi`.
    pub fn p4_with_phi(&self, phi: f64) -> Vec4 {
        Vec4::from_pt_eta_phi_m(self.pt, self.eta, phi, MUON_MASS)
    }

    pub fn reduced_chi2(&self) -> f64 {
        self.chi2 / self.ndof
    }

    /// Pixel hits beyond the number the track pattern predicts, when known.
    pub fn excess_pixel_hits(&self) -> Option<i32> {
        self.n_expected_pixel_hits
            .map(|expected| self.n_valid_pixel_hits - expected)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Jet {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub m: f64,
    pub mva_discriminator: f64,
    pub btag_discriminator: f64,
}

/// A generator-level particle. `mother_idx` is negative for particles without a mother.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenParticle {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub pdg_id: i32,
    pub status: i32,
    pub mother_idx: i32,
}

impl GenParticle {
    pub fn p4(&self) -> Vec4 {
        Vec4::from_pt_eta_phi_m(self.pt, self.eta, self.phi, self.mass)
    }

    pub fn mother<'a>(&self, particles: &'a [GenParticle]) -> Option<&'a GenParticle> {
        usize::try_from(self.mother_idx)
            .ok()
            .and_then(|idx| particles.get(idx))
    }
}

/// Level-1 seed names and decisions, aligned by position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct L1Bits {
    pub names: Vec<String>,
    pub results: Vec<bool>,
}

/// Everything the babymaker needs to know about one input event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoutingEvent {
    pub id: EventId,
    pub vertices: Vec<Vertex>,
    pub primary_vertices: Vec<PrimaryVertex>,
    pub muons: Vec<Muon>,
    pub jets: Vec<Jet>,
    /// Empty for collision data.
    pub gen_particles: Vec<GenParticle>,
    /// `None` when the file carries no trigger information.
    pub l1: Option<L1Bits>,
    /// The per-event beamspot, when the file carries one.
    pub beamspot: Option<Vec3>,
    pub met_pt: f64,
    pub met_phi: f64,
    pub rho: f64,
}

/// Which optional branch groups an input file provides.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InputContent {
    /// Generator particles are stored, i.e. the file is simulation.
    pub has_gen_info: bool,
    pub has_trigger_info: bool,
    /// Expected pixel hits are stored for muons.
    pub has_hit_info: bool,
    pub has_bs_info: bool,
}

impl InputContent {
    /// Detect the optional groups from the branch names of a tree.
    pub fn from_branch_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut content = Self::default();
        for name in names {
            match name.as_ref() {
                "GenPart_pdgId" => content.has_gen_info = true,
                "L1_name" => content.has_trigger_info = true,
                "Muon_nExpectedPixelHits" => content.has_hit_info = true,
                "BS_x" => content.has_bs_info = true,
                _ => {}
            }
        }
        content
    }

    pub fn is_mc(&self) -> bool {
        self.has_gen_info
    }
}

/// The events of a single input file along with what the file contains.
#[derive(Clone, Debug, Default)]
pub struct EventFile {
    pub path: String,
    pub content: InputContent,
    pub events: Vec<ScoutingEvent>,
}

impl EventFile {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Options for reading input files.
///
/// # See Also
/// [`read_events`]
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Name of the tree to read.
    pub tree: String,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            tree: DEFAULT_TREE.to_string(),
        }
    }
}

impl ReadOptions {
    /// Create a new [`Default`] set of [`ReadOptions`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the tree to read.
    pub fn tree<S: AsRef<str>>(mut self, name: S) -> Self {
        self.tree = name.as_ref().to_string();
        self
    }
}

/// A data event with one good displaced vertex shared by two opposite-sign muons, a second
/// vertex with a worse position resolution sharing the same pair, and a nearby jet.
pub fn test_event() -> ScoutingEvent {
    let vertex = |x: f64, y: f64, err: f64| Vertex {
        x,
        y,
        z: 1.2,
        x_error: err,
        y_error: err,
        z_error: 0.02,
        chi2: 1.5,
        ndof: 1,
        tracks_size: 2,
    };
    let muon = |pt: f64, eta: f64, phi: f64, charge: i32, dxy: f64| Muon {
        pt,
        eta,
        phi,
        charge,
        track_iso: 0.05,
        chi2: 12.0,
        ndof: 10.0,
        dxy,
        dz: 0.8,
        dxy_error: 0.004,
        dz_error: 0.01,
        trk_qoverp: charge as f64 / (pt * eta.cosh()),
        trk_lambda: (eta.sinh()).atan(),
        trk_qoverp_error: 1e-4,
        trk_lambda_error: 1e-4,
        trk_phi_error: 1e-4,
        trk_dsz: 0.6,
        trk_dsz_error: 0.01,
        n_valid_muon_hits: 18,
        n_valid_pixel_hits: 2,
        n_matched_stations: 3,
        n_tracker_layers: 9,
        n_valid_strip_hits: 12,
        n_expected_pixel_hits: Some(2),
        vtx_indices: vec![0, 1],
    };
    ScoutingEvent {
        id: EventId {
            run: 316000,
            lumi: 42,
            event: 123456789,
        },
        vertices: vec![vertex(0.6, 0.45, 0.004), vertex(0.62, 0.44, 0.02)],
        primary_vertices: vec![PrimaryVertex {
            x: 0.01,
            y: 0.04,
            z: 1.0,
            chi2: 20.0,
            ndof: 30,
        }],
        muons: vec![
            muon(8.0, 0.3, 0.62, 1, 0.25),
            muon(12.0, 0.1, 0.68, -1, -0.2),
        ],
        jets: vec![Jet {
            pt: 35.0,
            eta: -1.0,
            phi: -2.5,
            m: 6.0,
            mva_discriminator: 0.2,
            btag_discriminator: 0.1,
        }],
        gen_particles: Vec::new(),
        l1: Some(L1Bits {
            names: vec![
                "L1_DoubleMu4_SQ_OS_dR_Max1p2".to_string(),
                "L1_DoubleMu4p5_SQ_OS_dR_Max1p2".to_string(),
                "L1_DoubleMu0er1p4_SQ_OS_dR_Max1p4".to_string(),
                "L1_DoubleMu_15_7".to_string(),
            ],
            results: vec![true, true, false, false],
        }),
        beamspot: None,
        met_pt: 14.0,
        met_phi: 1.1,
        rho: 3.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_input_content_detection() {
        let content = InputContent::from_branch_names([
            "run",
            "DV_x",
            "Muon_pt",
            "L1_name",
            "L1_result",
            "BS_x",
        ]);
        assert!(content.has_trigger_info);
        assert!(content.has_bs_info);
        assert!(!content.has_hit_info);
        assert!(!content.is_mc());
        let mc = InputContent::from_branch_names(["GenPart_pdgId", "Muon_nExpectedPixelHits"]);
        assert!(mc.is_mc());
        assert!(mc.has_hit_info);
    }

    #[test]
    fn test_vertex_radii() {
        let event = test_event();
        let vertex = &event.vertices[0];
        assert_relative_eq!(vertex.rho(), 0.75, epsilon = 1e-12);
        let origin = Vec3::new(0.6, 0.05, 0.0);
        assert_relative_eq!(vertex.rho_corr(&origin), 0.4, epsilon = 1e-12);
        assert_relative_eq!(vertex.reduced_chi2(), 1.5);
    }

    #[test]
    fn test_zero_ndof_reduced_chi2_is_nan() {
        let vertex = Vertex {
            chi2: 1.0,
            ndof: 0,
            ..Default::default()
        };
        assert!(vertex.reduced_chi2().is_nan());
    }

    #[test]
    fn test_muon_excess_hits() {
        let mut muon = test_event().muons[0].clone();
        assert_eq!(muon.excess_pixel_hits(), Some(0));
        muon.n_expected_pixel_hits = None;
        assert_eq!(muon.excess_pixel_hits(), None);
        assert_relative_eq!(muon.p4().pt(), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gen_mother_lookup() {
        let particles = vec![
            GenParticle {
                pdg_id: 6000211,
                mother_idx: -1,
                ..Default::default()
            },
            GenParticle {
                pdg_id: 13,
                mother_idx: 0,
                ..Default::default()
            },
        ];
        assert_eq!(particles[1].mother(&particles).map(|p| p.pdg_id), Some(6000211));
        assert!(particles[0].mother(&particles).is_none());
    }
}
