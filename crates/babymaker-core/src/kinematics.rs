use crate::data::{Jet, Muon, Vertex};
use crate::geometry::propagation::{phi_at_vertex, track_reference_point};
use crate::utils::{argmin_by_key, delta_phi, delta_r, vectors::Vec3, vectors::Vec4};
use crate::SENTINEL;

/// Transverse impact parameter of a muon with respect to `origin`, assuming it comes from
/// `vertex`.
pub fn dxy_corr(muon: &Muon, vertex: &Vertex, origin: &Vec3) -> f64 {
    let (sin, cos) = muon.phi.sin_cos();
    -(vertex.x - origin.x) * sin + (vertex.y - origin.y) * cos
}

/// $`\Delta R`$ to the closest jet, or the sentinel when there are no jets.
pub fn closest_jet_dr(eta: f64, phi: f64, jets: &[Jet]) -> f64 {
    argmin_by_key(jets, |jet| delta_r(eta, jet.eta, phi, jet.phi))
        .map(|(_, dr)| dr)
        .unwrap_or(SENTINEL as f64)
}

/// Muon identification. Station and muon-hit requirements are left out because those counts
/// are not filled in 2017 scouting data.
pub fn muon_passes_id(muon: &Muon) -> bool {
    muon.reduced_chi2() < 3.0 && muon.n_tracker_layers > 5
}

pub fn muon_passes_iso(muon: &Muon, drjet: f64) -> bool {
    muon.track_iso < 0.1 && drjet > 0.3
}

/// Opposite-sign pair.
pub fn is_opposite_sign(q1: i32, q2: i32) -> bool {
    q1 * q2 < 0
}

/// Same-sign pair.
pub fn is_same_sign(q1: i32, q2: i32) -> bool {
    q1 * q2 > 0
}

/// $`\log_{10}(|\Delta\eta| / |\Delta\phi|)`$ with both differences floored at $`10^{-6}`$.
pub fn log_abs_eta_phi(p1: &Vec4, p2: &Vec4) -> f64 {
    let deta = (p1.eta() - p2.eta()).abs().max(1e-6);
    let dphi = p1.delta_phi(p2).abs().max(1e-6);
    (deta / dphi).log10()
}

/// Quantities of a selected muon which depend on its vertex.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MuonQuantities {
    pub dxy_corr: f64,
    /// Track reference point relative to the reference origin.
    pub reference: Vec3,
    /// Azimuth of the momentum at the vertex.
    pub phi_corr: f64,
    pub drjet: f64,
    pub passid: bool,
    pub passiso: bool,
}

impl MuonQuantities {
    pub fn new(muon: &Muon, vertex: &Vertex, origin: &Vec3, jets: &[Jet]) -> Self {
        let dxy_corr = dxy_corr(muon, vertex, origin);
        let reference =
            track_reference_point(muon.phi, muon.trk_lambda, dxy_corr, muon.trk_dsz, muon.dz);
        let phi_corr = phi_at_vertex(
            &reference,
            &muon.p4().vec3(),
            muon.charge,
            (vertex.x - origin.x, vertex.y - origin.y),
        );
        let drjet = closest_jet_dr(muon.eta, muon.phi, jets);
        Self {
            dxy_corr,
            reference,
            phi_corr,
            drjet,
            passid: muon_passes_id(muon),
            passiso: muon_passes_iso(muon, drjet),
        }
    }
}

/// Derived quantities of the primary candidate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DimuonQuantities {
    /// Sum of the muon four-momenta as reconstructed.
    pub p4_raw: Vec4,
    /// Sum with each azimuth taken at the vertex.
    pub p4_corr: Vec4,
    pub lxy: f64,
    pub lxy_error: f64,
    pub cosphi: f64,
    pub ctau: f64,
    pub logabsetaphi: f64,
    pub absdphimumu: f64,
    pub absdphimudv: f64,
    pub minabsdxy: f64,
    pub isos: bool,
}

impl DimuonQuantities {
    pub fn new(
        muons: [&Muon; 2],
        quantities: [&MuonQuantities; 2],
        vertex: &Vertex,
        origin: &Vec3,
    ) -> Self {
        let [mu1, mu2] = muons;
        let [q1, q2] = quantities;
        let (p1, p2) = (mu1.p4(), mu2.p4());
        let p4_raw = p1 + p2;
        let p4_corr = mu1.p4_with_phi(q1.phi_corr) + mu2.p4_with_phi(q2.phi_corr);
        let displacement = (vertex.position() - origin).transverse();
        let lxy = displacement.rho();
        let dimuon_pt = p4_raw.vec3().transverse();
        let cosphi = displacement.cos_transverse_angle(&dimuon_pt);
        let lxy_error = (vertex.x_error * displacement.x).hypot(vertex.y_error * displacement.y)
            / lxy;
        Self {
            p4_raw,
            p4_corr,
            lxy,
            lxy_error,
            cosphi,
            ctau: lxy * cosphi * p4_corr.m() / p4_corr.pt(),
            logabsetaphi: log_abs_eta_phi(&p1, &p2),
            absdphimumu: p1.delta_phi(&p2).abs(),
            absdphimudv: delta_phi(displacement.phi(), dimuon_pt.phi()).abs(),
            minabsdxy: q1.dxy_corr.abs().min(q2.dxy_corr.abs()),
            isos: is_opposite_sign(mu1.charge, mu2.charge),
        }
    }

    /// The boost-scaled decay length $`L_{xy} M / p_T`$ used to normalise impact parameters.
    pub fn scaled_lxy(&self) -> f64 {
        self.lxy * self.p4_corr.m() / self.p4_corr.pt()
    }
}

/// The few quantities stored for the secondary candidate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SecondaryQuantities {
    pub isos: bool,
    pub mass_raw: f64,
    pub logabsetaphi: f64,
    pub lxy: f64,
}

impl SecondaryQuantities {
    pub fn new(muons: [&Muon; 2], vertex: &Vertex, origin: &Vec3) -> Self {
        let [mu1, mu2] = muons;
        let (p1, p2) = (mu1.p4(), mu2.p4());
        Self {
            isos: is_opposite_sign(mu1.charge, mu2.charge),
            mass_raw: (p1 + p2).m(),
            logabsetaphi: log_abs_eta_phi(&p1, &p2),
            lxy: vertex.rho_corr(origin),
        }
    }
}

/// Event-level inputs to the flags which do not come from the candidate itself.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FlagContext {
    pub pass_l1: bool,
    /// Distance of the vertex to the closest pixel module plane.
    pub dist_pixel: f64,
    /// ΔR of each muon to its generator match, `None` for collision data.
    pub gen_match_dr: Option<[f64; 2]>,
}

/// Selection flags of the primary candidate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionFlags {
    pub excesshits: bool,
    pub materialveto: bool,
    pub dxyscaled: bool,
    pub dxysig: bool,
    pub genmatch: bool,
    pub baseline: bool,
    pub baseline_iso: bool,
    pub baseline_isohalf: bool,
    pub baseline_extra: bool,
    pub baseline_extra_iso: bool,
    pub baseline_extra_isohalf: bool,
}

impl SelectionFlags {
    pub fn new(
        dimuon: &DimuonQuantities,
        muons: [&Muon; 2],
        quantities: [&MuonQuantities; 2],
        context: &FlagContext,
    ) -> Self {
        let [mu1, mu2] = muons;
        let [q1, q2] = quantities;
        // without hit information the veto cannot be evaluated and is not applied
        let excesshits = dimuon.lxy < 3.5
            || match (mu1.excess_pixel_hits(), mu2.excess_pixel_hits()) {
                (Some(excess1), Some(excess2)) => excess1 <= 0 && excess2 <= 0,
                _ => true,
            };
        let materialveto = context.dist_pixel > 0.05;
        let scaled = dimuon.scaled_lxy();
        let dxyscaled = (q1.dxy_corr / scaled).abs() > 0.1 && (q2.dxy_corr / scaled).abs() > 0.1;
        let dxysig = (q1.dxy_corr / mu1.dxy_error).abs() > 2.0
            && (q2.dxy_corr / mu2.dxy_error).abs() > 2.0;
        let genmatch = match context.gen_match_dr {
            Some([dr1, dr2]) => dr1 < 0.1 && dr2 < 0.1,
            None => true,
        };
        let baseline = q1.passid
            && q2.passid
            && dimuon.absdphimumu < 2.8
            && dimuon.absdphimudv < 0.02
            && dimuon.isos
            && context.pass_l1
            && dimuon.lxy < 11.0;
        let baseline_iso = baseline && q1.passiso && q2.passiso;
        let baseline_isohalf = baseline && (q1.passiso ^ q2.passiso);
        let extra = excesshits && materialveto && dimuon.logabsetaphi < 1.25;
        Self {
            excesshits,
            materialveto,
            dxyscaled,
            dxysig,
            genmatch,
            baseline,
            baseline_iso,
            baseline_isohalf,
            baseline_extra: baseline && extra,
            baseline_extra_iso: baseline_iso && extra,
            baseline_extra_isohalf: baseline_isohalf && extra,
        }
    }
}
