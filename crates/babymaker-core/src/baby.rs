use indexmap::IndexMap;

use crate::data::{GenParticle, Jet, Muon, Vertex};
use crate::gen::{mother_id, GenMatch};
use crate::geometry::PixelHit;
use crate::kinematics::{DimuonQuantities, MuonQuantities, SecondaryQuantities, SelectionFlags};
use crate::triggers::{L1Decision, SEEDS_TO_SAVE};
use crate::utils::vectors::Vec3;
use crate::{BabyError, BabyResult, MUON_MASS, SENTINEL};

pub mod io;

pub use io::{write_baby, JobCounters, WriteOptions};

const SENTINEL_INT: i32 = SENTINEL as i32;

/// A single value of one output branch.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    F32(f32),
    I32(i32),
    I64(i64),
    Bool(bool),
    VecF32(Vec<f32>),
    VecI32(Vec<i32>),
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<f32>> for Value {
    fn from(value: Vec<f32>) -> Self {
        Value::VecF32(value)
    }
}

impl From<Vec<i32>> for Value {
    fn from(value: Vec<i32>) -> Self {
        Value::VecI32(value)
    }
}

/// All values of one output branch.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    F32(Vec<f32>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
    VecF32(Vec<Vec<f32>>),
    VecI32(Vec<Vec<i32>>),
}

impl Column {
    /// An empty column of the same type.
    fn cleared(&self) -> Self {
        match self {
            Column::F32(_) => Column::F32(Vec::new()),
            Column::I32(_) => Column::I32(Vec::new()),
            Column::I64(_) => Column::I64(Vec::new()),
            Column::Bool(_) => Column::Bool(Vec::new()),
            Column::VecF32(_) => Column::VecF32(Vec::new()),
            Column::VecI32(_) => Column::VecI32(Vec::new()),
        }
    }

    fn empty_for(value: &Value) -> Self {
        match value {
            Value::F32(_) => Column::F32(Vec::new()),
            Value::I32(_) => Column::I32(Vec::new()),
            Value::I64(_) => Column::I64(Vec::new()),
            Value::Bool(_) => Column::Bool(Vec::new()),
            Value::VecF32(_) => Column::VecF32(Vec::new()),
            Value::VecI32(_) => Column::VecI32(Vec::new()),
        }
    }

    /// Append `value`, returning `false` if its type does not match the column.
    fn push(&mut self, value: Value) -> bool {
        match (self, value) {
            (Column::F32(values), Value::F32(value)) => values.push(value),
            (Column::I32(values), Value::I32(value)) => values.push(value),
            (Column::I64(values), Value::I64(value)) => values.push(value),
            (Column::Bool(values), Value::Bool(value)) => values.push(value),
            (Column::VecF32(values), Value::VecF32(value)) => values.push(value),
            (Column::VecI32(values), Value::VecI32(value)) => values.push(value),
            _ => return false,
        }
        true
    }

    pub fn len(&self) -> usize {
        match self {
            Column::F32(values) => values.len(),
            Column::I32(values) => values.len(),
            Column::I64(values) => values.len(),
            Column::Bool(values) => values.len(),
            Column::VecF32(values) => values.len(),
            Column::VecI32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// ROOT type name of the branch.
    pub fn type_name(&self) -> &'static str {
        match self {
            Column::F32(_) => "float",
            Column::I32(_) => "int",
            Column::I64(_) => "long",
            Column::Bool(_) => "bool",
            Column::VecF32(_) => "vector<float>",
            Column::VecI32(_) => "vector<int>",
        }
    }
}

/// Types which write themselves into a row of [`BabyColumns`] under a branch-name prefix.
pub trait FillColumns {
    fn fill_columns(&self, prefix: &str, columns: &mut BabyColumns);
}

/// Output branches in creation order, filled one record at a time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BabyColumns {
    columns: IndexMap<String, Column>,
    n_rows: usize,
}

impl BabyColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value to branch `prefix + name`, creating the branch on first use.
    pub fn put<V: Into<Value>>(&mut self, prefix: &str, name: &str, value: V) {
        let value = value.into();
        let column = self
            .columns
            .entry(format!("{prefix}{name}"))
            .or_insert_with(|| Column::empty_for(&value));
        // a mismatched type leaves the column short, which `push` reports
        column.push(value);
    }

    /// Append one record. Every branch must receive exactly one value.
    pub fn push<R: FillColumns>(&mut self, record: &R) -> BabyResult<()> {
        record.fill_columns("", self);
        self.n_rows += 1;
        for (name, column) in &self.columns {
            if column.len() != self.n_rows {
                return Err(BabyError::LengthMismatch {
                    context: format!("Output branch '{name}'"),
                    expected: self.n_rows,
                    actual: column.len(),
                });
            }
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), column))
    }

    /// Consume the buffer, yielding `(name, column)` pairs in creation order.
    pub fn into_columns(self) -> impl Iterator<Item = (String, Column)> {
        self.columns.into_iter()
    }

    /// The branch layout of an output file, taken from a sentinel record so that empty outputs
    /// still carry every branch.
    pub fn layout() -> Self {
        let mut layout = Self::new();
        BabyRecord::default().fill_columns("", &mut layout);
        for column in layout.columns.values_mut() {
            *column = column.cleared();
        }
        layout
    }
}

/// A displaced vertex as stored in the output.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub x_error: f32,
    pub y_error: f32,
    pub z_error: f32,
    pub chi2: f32,
    pub ndof: i32,
    pub rho: f32,
    pub rho_corr: f32,
    pub in_pixel: bool,
    pub dist_pixel: f32,
    pub layer_pixel: i32,
    pub passid: bool,
}

impl Default for VertexRecord {
    fn default() -> Self {
        Self {
            x: SENTINEL,
            y: SENTINEL,
            z: SENTINEL,
            x_error: SENTINEL,
            y_error: SENTINEL,
            z_error: SENTINEL,
            chi2: SENTINEL,
            ndof: SENTINEL_INT,
            rho: SENTINEL,
            rho_corr: SENTINEL,
            in_pixel: false,
            dist_pixel: SENTINEL,
            layer_pixel: SENTINEL_INT,
            passid: false,
        }
    }
}

impl VertexRecord {
    pub fn new(vertex: &Vertex, origin: &Vec3, pixel: Option<PixelHit>, passid: bool) -> Self {
        Self {
            x: vertex.x as f32,
            y: vertex.y as f32,
            z: vertex.z as f32,
            x_error: vertex.x_error as f32,
            y_error: vertex.y_error as f32,
            z_error: vertex.z_error as f32,
            chi2: vertex.chi2 as f32,
            ndof: vertex.ndof,
            rho: vertex.rho() as f32,
            rho_corr: vertex.rho_corr(origin) as f32,
            in_pixel: pixel.is_some(),
            dist_pixel: pixel.map_or(SENTINEL, |hit| hit.plane_distance as f32),
            layer_pixel: pixel.map_or(-1, |hit| hit.layer),
            passid,
        }
    }
}

impl FillColumns for VertexRecord {
    fn fill_columns(&self, prefix: &str, columns: &mut BabyColumns) {
        columns.put(prefix, "x", self.x);
        columns.put(prefix, "y", self.y);
        columns.put(prefix, "z", self.z);
        columns.put(prefix, "xError", self.x_error);
        columns.put(prefix, "yError", self.y_error);
        columns.put(prefix, "zError", self.z_error);
        columns.put(prefix, "chi2", self.chi2);
        columns.put(prefix, "ndof", self.ndof);
        columns.put(prefix, "rho", self.rho);
        columns.put(prefix, "rhoCorr", self.rho_corr);
        columns.put(prefix, "inPixel", self.in_pixel);
        columns.put(prefix, "distPixel", self.dist_pixel);
        columns.put(prefix, "layerPixel", self.layer_pixel);
        columns.put(prefix, "passid", self.passid);
    }
}

/// The generator muon matched to a reconstructed muon.
#[derive(Clone, Debug, PartialEq)]
pub struct GenMatchRecord {
    pub dr: f32,
    pub pt: f32,
    pub eta: f32,
    pub phi: f32,
    pub m: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub lxy: f32,
    pub status: i32,
    pub pdg_id: i32,
    pub mother_id: i32,
    pub mothervx: f32,
    pub mothervy: f32,
    pub mothervz: f32,
    pub motherct: f32,
}

impl Default for GenMatchRecord {
    fn default() -> Self {
        Self {
            dr: SENTINEL,
            pt: SENTINEL,
            eta: SENTINEL,
            phi: SENTINEL,
            m: SENTINEL,
            vx: SENTINEL,
            vy: SENTINEL,
            vz: SENTINEL,
            lxy: SENTINEL,
            status: SENTINEL_INT,
            pdg_id: SENTINEL_INT,
            mother_id: SENTINEL_INT,
            mothervx: SENTINEL,
            mothervy: SENTINEL,
            mothervz: SENTINEL,
            motherct: SENTINEL,
        }
    }
}

impl GenMatchRecord {
    pub fn new(matched: &GenMatch, particle: &GenParticle) -> Self {
        Self {
            dr: matched.dr as f32,
            pt: particle.pt as f32,
            eta: particle.eta as f32,
            phi: particle.phi as f32,
            m: particle.mass as f32,
            vx: particle.vx as f32,
            vy: particle.vy as f32,
            vz: particle.vz as f32,
            lxy: particle.vx.hypot(particle.vy) as f32,
            status: particle.status,
            pdg_id: particle.pdg_id,
            mother_id: matched.mother.pdg_id,
            mothervx: matched.mother.vx as f32,
            mothervy: matched.mother.vy as f32,
            mothervz: matched.mother.vz as f32,
            motherct: matched.mother.ct as f32,
        }
    }
}

impl FillColumns for GenMatchRecord {
    fn fill_columns(&self, prefix: &str, columns: &mut BabyColumns) {
        columns.put(prefix, "genMatch_dr", self.dr);
        columns.put(prefix, "genMatch_pt", self.pt);
        columns.put(prefix, "genMatch_eta", self.eta);
        columns.put(prefix, "genMatch_phi", self.phi);
        columns.put(prefix, "genMatch_m", self.m);
        columns.put(prefix, "genMatch_vx", self.vx);
        columns.put(prefix, "genMatch_vy", self.vy);
        columns.put(prefix, "genMatch_vz", self.vz);
        columns.put(prefix, "genMatch_lxy", self.lxy);
        columns.put(prefix, "genMatch_status", self.status);
        columns.put(prefix, "genMatch_pdgId", self.pdg_id);
        columns.put(prefix, "genMatch_motherId", self.mother_id);
        columns.put(prefix, "genMatch_mothervx", self.mothervx);
        columns.put(prefix, "genMatch_mothervy", self.mothervy);
        columns.put(prefix, "genMatch_mothervz", self.mothervz);
        columns.put(prefix, "genMatch_motherct", self.motherct);
    }
}

/// A selected muon as stored in the output.
#[derive(Clone, Debug, PartialEq)]
pub struct MuonRecord {
    pub pt: f32,
    pub eta: f32,
    pub phi: f32,
    pub m: f32,
    pub track_iso: f32,
    pub chi2: f32,
    pub ndof: f32,
    pub charge: i32,
    pub dxy: f32,
    pub dz: f32,
    pub n_valid_muon_hits: i32,
    pub n_valid_pixel_hits: i32,
    pub n_matched_stations: i32,
    pub n_tracker_layers: i32,
    pub n_valid_strip_hits: i32,
    pub dxy_error: f32,
    pub dz_error: f32,
    pub dxy_corr: f32,
    pub n_expected_pixel_hits: i32,
    pub drjet: f32,
    pub passid: bool,
    pub passiso: bool,
    pub gen_match: GenMatchRecord,
    pub trk_refx: f32,
    pub trk_refy: f32,
    pub trk_refz: f32,
    pub phi_corr: f32,
    pub trk_qoverp: f32,
    pub trk_lambda: f32,
    pub trk_qoverp_error: f32,
    pub trk_lambda_error: f32,
    pub trk_phi_error: f32,
    pub trk_dsz: f32,
    pub trk_dsz_error: f32,
}

impl Default for MuonRecord {
    fn default() -> Self {
        Self {
            pt: SENTINEL,
            eta: SENTINEL,
            phi: SENTINEL,
            m: SENTINEL,
            track_iso: SENTINEL,
            chi2: SENTINEL,
            ndof: SENTINEL,
            charge: SENTINEL_INT,
            dxy: SENTINEL,
            dz: SENTINEL,
            n_valid_muon_hits: SENTINEL_INT,
            n_valid_pixel_hits: SENTINEL_INT,
            n_matched_stations: SENTINEL_INT,
            n_tracker_layers: SENTINEL_INT,
            n_valid_strip_hits: SENTINEL_INT,
            dxy_error: SENTINEL,
            dz_error: SENTINEL,
            dxy_corr: SENTINEL,
            n_expected_pixel_hits: SENTINEL_INT,
            drjet: SENTINEL,
            passid: false,
            passiso: false,
            gen_match: GenMatchRecord::default(),
            trk_refx: SENTINEL,
            trk_refy: SENTINEL,
            trk_refz: SENTINEL,
            phi_corr: SENTINEL,
            trk_qoverp: SENTINEL,
            trk_lambda: SENTINEL,
            trk_qoverp_error: SENTINEL,
            trk_lambda_error: SENTINEL,
            trk_phi_error: SENTINEL,
            trk_dsz: SENTINEL,
            trk_dsz_error: SENTINEL,
        }
    }
}

impl MuonRecord {
    pub fn new(muon: &Muon, quantities: &MuonQuantities, gen_match: GenMatchRecord) -> Self {
        Self {
            pt: muon.pt as f32,
            eta: muon.eta as f32,
            phi: muon.phi as f32,
            m: MUON_MASS as f32,
            track_iso: muon.track_iso as f32,
            chi2: muon.chi2 as f32,
            ndof: muon.ndof as f32,
            charge: muon.charge,
            dxy: muon.dxy as f32,
            dz: muon.dz as f32,
            n_valid_muon_hits: muon.n_valid_muon_hits,
            n_valid_pixel_hits: muon.n_valid_pixel_hits,
            n_matched_stations: muon.n_matched_stations,
            n_tracker_layers: muon.n_tracker_layers,
            n_valid_strip_hits: muon.n_valid_strip_hits,
            dxy_error: muon.dxy_error as f32,
            dz_error: muon.dz_error as f32,
            dxy_corr: quantities.dxy_corr as f32,
            n_expected_pixel_hits: muon.n_expected_pixel_hits.unwrap_or(SENTINEL_INT),
            drjet: quantities.drjet as f32,
            passid: quantities.passid,
            passiso: quantities.passiso,
            gen_match,
            trk_refx: quantities.reference.x as f32,
            trk_refy: quantities.reference.y as f32,
            trk_refz: quantities.reference.z as f32,
            phi_corr: quantities.phi_corr as f32,
            trk_qoverp: muon.trk_qoverp as f32,
            trk_lambda: muon.trk_lambda as f32,
            trk_qoverp_error: muon.trk_qoverp_error as f32,
            trk_lambda_error: muon.trk_lambda_error as f32,
            trk_phi_error: muon.trk_phi_error as f32,
            trk_dsz: muon.trk_dsz as f32,
            trk_dsz_error: muon.trk_dsz_error as f32,
        }
    }
}

impl FillColumns for MuonRecord {
    fn fill_columns(&self, prefix: &str, columns: &mut BabyColumns) {
        columns.put(prefix, "pt", self.pt);
        columns.put(prefix, "eta", self.eta);
        columns.put(prefix, "phi", self.phi);
        columns.put(prefix, "m", self.m);
        columns.put(prefix, "trackIso", self.track_iso);
        columns.put(prefix, "chi2", self.chi2);
        columns.put(prefix, "ndof", self.ndof);
        columns.put(prefix, "charge", self.charge);
        columns.put(prefix, "dxy", self.dxy);
        columns.put(prefix, "dz", self.dz);
        columns.put(prefix, "nValidMuonHits", self.n_valid_muon_hits);
        columns.put(prefix, "nValidPixelHits", self.n_valid_pixel_hits);
        columns.put(prefix, "nMatchedStations", self.n_matched_stations);
        columns.put(prefix, "nTrackerLayersWithMeasurement", self.n_tracker_layers);
        columns.put(prefix, "nValidStripHits", self.n_valid_strip_hits);
        columns.put(prefix, "dxyError", self.dxy_error);
        columns.put(prefix, "dzError", self.dz_error);
        columns.put(prefix, "dxyCorr", self.dxy_corr);
        columns.put(prefix, "nExpectedPixelHits", self.n_expected_pixel_hits);
        columns.put(prefix, "drjet", self.drjet);
        columns.put(prefix, "passid", self.passid);
        columns.put(prefix, "passiso", self.passiso);
        self.gen_match.fill_columns(prefix, columns);
        columns.put(prefix, "trk_refx", self.trk_refx);
        columns.put(prefix, "trk_refy", self.trk_refy);
        columns.put(prefix, "trk_refz", self.trk_refz);
        columns.put(prefix, "phiCorr", self.phi_corr);
        columns.put(prefix, "trk_qoverp", self.trk_qoverp);
        columns.put(prefix, "trk_lambda", self.trk_lambda);
        columns.put(prefix, "trk_qoverpError", self.trk_qoverp_error);
        columns.put(prefix, "trk_lambdaError", self.trk_lambda_error);
        columns.put(prefix, "trk_phiError", self.trk_phi_error);
        columns.put(prefix, "trk_dsz", self.trk_dsz);
        columns.put(prefix, "trk_dszError", self.trk_dsz_error);
    }
}

/// Generator particles stored as parallel vectors (`GenOther_*`, `GenMuon_*`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenCollection {
    pub pt: Vec<f32>,
    pub eta: Vec<f32>,
    pub phi: Vec<f32>,
    pub m: Vec<f32>,
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub vz: Vec<f32>,
    pub lxy: Vec<f32>,
    pub status: Vec<i32>,
    pub pdg_id: Vec<i32>,
    pub mother_id: Vec<i32>,
}

impl GenCollection {
    pub fn from_indices(particles: &[GenParticle], indices: &[usize]) -> Self {
        let mut collection = Self::default();
        for particle in indices.iter().filter_map(|&index| particles.get(index)) {
            collection.pt.push(particle.pt as f32);
            collection.eta.push(particle.eta as f32);
            collection.phi.push(particle.phi as f32);
            collection.m.push(particle.mass as f32);
            collection.vx.push(particle.vx as f32);
            collection.vy.push(particle.vy as f32);
            collection.vz.push(particle.vz as f32);
            collection.lxy.push(particle.vx.hypot(particle.vy) as f32);
            collection.status.push(particle.status);
            collection.pdg_id.push(particle.pdg_id);
            collection.mother_id.push(mother_id(particle, particles));
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.pt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pt.is_empty()
    }
}

impl FillColumns for GenCollection {
    fn fill_columns(&self, prefix: &str, columns: &mut BabyColumns) {
        columns.put(prefix, "pt", self.pt.clone());
        columns.put(prefix, "eta", self.eta.clone());
        columns.put(prefix, "phi", self.phi.clone());
        columns.put(prefix, "m", self.m.clone());
        columns.put(prefix, "vx", self.vx.clone());
        columns.put(prefix, "vy", self.vy.clone());
        columns.put(prefix, "vz", self.vz.clone());
        columns.put(prefix, "lxy", self.lxy.clone());
        columns.put(prefix, "status", self.status.clone());
        columns.put(prefix, "pdgId", self.pdg_id.clone());
        columns.put(prefix, "motherId", self.mother_id.clone());
    }
}

/// Jets stored as parallel vectors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JetCollection {
    pub pt: Vec<f32>,
    pub eta: Vec<f32>,
    pub phi: Vec<f32>,
    pub m: Vec<f32>,
    pub mva_discriminator: Vec<f32>,
    pub btag_discriminator: Vec<f32>,
}

impl JetCollection {
    pub fn new(jets: &[Jet]) -> Self {
        let column = |f: fn(&Jet) -> f64| jets.iter().map(|jet| f(jet) as f32).collect();
        Self {
            pt: column(|jet| jet.pt),
            eta: column(|jet| jet.eta),
            phi: column(|jet| jet.phi),
            m: column(|jet| jet.m),
            mva_discriminator: column(|jet| jet.mva_discriminator),
            btag_discriminator: column(|jet| jet.btag_discriminator),
        }
    }

    pub fn len(&self) -> usize {
        self.pt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pt.is_empty()
    }
}

/// Derived quantities of the primary candidate as stored in the output.
#[derive(Clone, Debug, PartialEq)]
pub struct DimuonRecord {
    pub isos: bool,
    pub pt: f32,
    pub eta: f32,
    pub phi: f32,
    pub mass: f32,
    pub mass_raw: f32,
    pub absdphimumu: f32,
    pub absdphimudv: f32,
    pub minabsdxy: f32,
    pub ctau: f32,
    pub logabsetaphi: f32,
    pub lxy: f32,
    pub lxy_error: f32,
    pub cosphi: f32,
}

impl Default for DimuonRecord {
    fn default() -> Self {
        Self {
            isos: false,
            pt: SENTINEL,
            eta: SENTINEL,
            phi: SENTINEL,
            mass: SENTINEL,
            mass_raw: SENTINEL,
            absdphimumu: SENTINEL,
            absdphimudv: SENTINEL,
            minabsdxy: SENTINEL,
            ctau: SENTINEL,
            logabsetaphi: SENTINEL,
            lxy: SENTINEL,
            lxy_error: SENTINEL,
            cosphi: SENTINEL,
        }
    }
}

impl From<&DimuonQuantities> for DimuonRecord {
    fn from(dimuon: &DimuonQuantities) -> Self {
        Self {
            isos: dimuon.isos,
            pt: dimuon.p4_corr.pt() as f32,
            eta: dimuon.p4_corr.eta() as f32,
            phi: dimuon.p4_corr.phi() as f32,
            mass: dimuon.p4_corr.m() as f32,
            mass_raw: dimuon.p4_raw.m() as f32,
            absdphimumu: dimuon.absdphimumu as f32,
            absdphimudv: dimuon.absdphimudv as f32,
            minabsdxy: dimuon.minabsdxy as f32,
            ctau: dimuon.ctau as f32,
            logabsetaphi: dimuon.logabsetaphi as f32,
            lxy: dimuon.lxy as f32,
            lxy_error: dimuon.lxy_error as f32,
            cosphi: dimuon.cosphi as f32,
        }
    }
}

/// The quantities stored for the secondary candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct SubleadRecord {
    pub isos: bool,
    pub mass: f32,
    pub logabsetaphi: f32,
    pub lxy: f32,
}

impl Default for SubleadRecord {
    fn default() -> Self {
        Self {
            isos: false,
            mass: SENTINEL,
            logabsetaphi: SENTINEL,
            lxy: SENTINEL,
        }
    }
}

impl From<&SecondaryQuantities> for SubleadRecord {
    fn from(secondary: &SecondaryQuantities) -> Self {
        Self {
            isos: secondary.isos,
            mass: secondary.mass_raw as f32,
            logabsetaphi: secondary.logabsetaphi as f32,
            lxy: secondary.lxy as f32,
        }
    }
}

/// The muon-associated primary vertex used as the reference origin.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimaryVertexRecord {
    pub n_raw: i32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub chi2: f32,
    pub ndof: i32,
}

impl Default for PrimaryVertexRecord {
    fn default() -> Self {
        Self {
            n_raw: 0,
            x: SENTINEL,
            y: SENTINEL,
            z: SENTINEL,
            chi2: SENTINEL,
            ndof: SENTINEL_INT,
        }
    }
}

/// One row of the output tree.
#[derive(Clone, Debug, PartialEq)]
pub struct BabyRecord {
    pub run: i64,
    pub lumi: i64,
    pub event: i64,
    pub year: i32,
    pub l1: L1Decision,
    pub flags: SelectionFlags,
    pub dimuon: DimuonRecord,
    pub sublead: SubleadRecord,
    pub met_pt: f32,
    pub met_phi: f32,
    pub rho: f32,
    pub n_dv_raw: i32,
    pub n_dv: i32,
    pub dv: VertexRecord,
    pub sublead_dv: VertexRecord,
    pub pvm: PrimaryVertexRecord,
    pub jets: JetCollection,
    pub n_muon_raw: i32,
    pub n_muon: i32,
    /// Leading and subleading muon of the primary, then of the secondary candidate.
    pub muons: [MuonRecord; 4],
    pub gen_others: GenCollection,
    pub gen_muons: GenCollection,
    pub beamspot: [f32; 3],
}

impl Default for BabyRecord {
    fn default() -> Self {
        Self {
            run: SENTINEL as i64,
            lumi: SENTINEL as i64,
            event: SENTINEL as i64,
            year: SENTINEL_INT,
            l1: L1Decision::default(),
            flags: SelectionFlags::default(),
            dimuon: DimuonRecord::default(),
            sublead: SubleadRecord::default(),
            met_pt: SENTINEL,
            met_phi: SENTINEL,
            rho: SENTINEL,
            n_dv_raw: 0,
            n_dv: 0,
            dv: VertexRecord::default(),
            sublead_dv: VertexRecord::default(),
            pvm: PrimaryVertexRecord::default(),
            jets: JetCollection::default(),
            n_muon_raw: 0,
            n_muon: 0,
            muons: Default::default(),
            gen_others: GenCollection::default(),
            gen_muons: GenCollection::default(),
            beamspot: [SENTINEL; 3],
        }
    }
}

const MUON_PREFIXES: [&str; 4] = ["Muon1_", "Muon2_", "sublead_Muon1_", "sublead_Muon2_"];

impl FillColumns for BabyRecord {
    fn fill_columns(&self, prefix: &str, columns: &mut BabyColumns) {
        columns.put(prefix, "run", self.run);
        columns.put(prefix, "luminosityBlock", self.lumi);
        columns.put(prefix, "event", self.event);
        columns.put(prefix, "year", self.year);

        let flags = &self.flags;
        columns.put(prefix, "pass_l1", self.l1.pass_l1);
        columns.put(prefix, "pass_excesshits", flags.excesshits);
        columns.put(prefix, "pass_materialveto", flags.materialveto);
        columns.put(prefix, "pass_dxyscaled", flags.dxyscaled);
        columns.put(prefix, "pass_dxysig", flags.dxysig);
        columns.put(prefix, "pass_genmatch", flags.genmatch);

        let dimuon = &self.dimuon;
        columns.put(prefix, "dimuon_isos", dimuon.isos);
        columns.put(prefix, "dimuon_pt", dimuon.pt);
        columns.put(prefix, "dimuon_eta", dimuon.eta);
        columns.put(prefix, "dimuon_phi", dimuon.phi);
        columns.put(prefix, "dimuon_mass", dimuon.mass);
        columns.put(prefix, "mass", dimuon.mass);
        columns.put(prefix, "dimuon_massRaw", dimuon.mass_raw);
        columns.put(prefix, "absdphimumu", dimuon.absdphimumu);
        columns.put(prefix, "absdphimudv", dimuon.absdphimudv);
        columns.put(prefix, "minabsdxy", dimuon.minabsdxy);
        columns.put(prefix, "ctau", dimuon.ctau);
        columns.put(prefix, "logabsetaphi", dimuon.logabsetaphi);
        columns.put(prefix, "lxy", dimuon.lxy);
        columns.put(prefix, "lxyError", dimuon.lxy_error);
        columns.put(prefix, "cosphi", dimuon.cosphi);
        columns.put(prefix, "pass_baseline", flags.baseline);
        columns.put(prefix, "pass_baseline_iso", flags.baseline_iso);
        columns.put(prefix, "pass_baseline_isohalf", flags.baseline_isohalf);
        columns.put(prefix, "pass_baseline_extra", flags.baseline_extra);
        columns.put(prefix, "pass_baseline_extra_iso", flags.baseline_extra_iso);
        columns.put(prefix, "pass_baseline_extra_isohalf", flags.baseline_extra_isohalf);

        columns.put(prefix, "sublead_dimuon_isos", self.sublead.isos);
        columns.put(prefix, "sublead_dimuon_mass", self.sublead.mass);
        columns.put(prefix, "sublead_logabsetaphi", self.sublead.logabsetaphi);
        columns.put(prefix, "sublead_lxy", self.sublead.lxy);

        columns.put(prefix, "MET_pt", self.met_pt);
        columns.put(prefix, "MET_phi", self.met_phi);
        columns.put(prefix, "rho", self.rho);

        columns.put(prefix, "nDV_raw", self.n_dv_raw);
        columns.put(prefix, "nDV", self.n_dv);
        self.dv.fill_columns(&format!("{prefix}DV_"), columns);
        self.sublead_dv
            .fill_columns(&format!("{prefix}sublead_DV_"), columns);

        columns.put(prefix, "nPVM_raw", self.pvm.n_raw);
        columns.put(prefix, "PVM_x", self.pvm.x);
        columns.put(prefix, "PVM_y", self.pvm.y);
        columns.put(prefix, "PVM_z", self.pvm.z);
        columns.put(prefix, "PVM_chi2", self.pvm.chi2);
        columns.put(prefix, "PVM_ndof", self.pvm.ndof);

        columns.put(prefix, "nJet", self.jets.len() as i32);
        columns.put(prefix, "Jet_pt", self.jets.pt.clone());
        columns.put(prefix, "Jet_eta", self.jets.eta.clone());
        columns.put(prefix, "Jet_phi", self.jets.phi.clone());
        columns.put(prefix, "Jet_m", self.jets.m.clone());
        columns.put(prefix, "Jet_mvaDiscriminator", self.jets.mva_discriminator.clone());
        columns.put(prefix, "Jet_btagDiscriminator", self.jets.btag_discriminator.clone());

        columns.put(prefix, "nMuon_raw", self.n_muon_raw);
        columns.put(prefix, "nMuon", self.n_muon);
        for (muon_prefix, muon) in MUON_PREFIXES.iter().zip(self.muons.iter()) {
            muon.fill_columns(&format!("{prefix}{muon_prefix}"), columns);
        }

        self.gen_others
            .fill_columns(&format!("{prefix}GenOther_"), columns);
        columns.put(prefix, "nGenMuon", self.gen_muons.len() as i32);
        self.gen_muons.fill_columns(&format!("{prefix}GenMuon_"), columns);

        columns.put(prefix, "BS_x", self.beamspot[0]);
        columns.put(prefix, "BS_y", self.beamspot[1]);
        columns.put(prefix, "BS_z", self.beamspot[2]);

        for (seed, bit) in SEEDS_TO_SAVE.iter().zip(self.l1.bits) {
            columns.put(prefix, seed, bit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_record() {
        let record = BabyRecord::default();
        let mut columns = BabyColumns::new();
        columns.push(&record).unwrap();
        assert_eq!(columns.n_rows(), 1);
        assert_eq!(columns.get("DV_x"), Some(&Column::F32(vec![999.0])));
        assert_eq!(columns.get("run"), Some(&Column::I64(vec![999])));
        assert_eq!(
            columns.get("sublead_Muon2_genMatch_motherct"),
            Some(&Column::F32(vec![999.0]))
        );
        assert_eq!(
            columns.get("pass_baseline"),
            Some(&Column::Bool(vec![false]))
        );
        assert_eq!(columns.get("Jet_pt"), Some(&Column::VecF32(vec![vec![]])));
        assert_eq!(
            columns.get("GenMuon_pdgId"),
            Some(&Column::VecI32(vec![vec![]]))
        );
        assert_eq!(columns.get("DV_layerPixel"), Some(&Column::I32(vec![999])));
    }

    #[test]
    fn test_layout_is_fixed() {
        let layout = BabyColumns::layout();
        assert_eq!(layout.n_rows(), 0);
        let names = layout.names().collect::<Vec<_>>();
        assert_eq!(names[0], "run");
        assert!(names.contains(&"L1_DoubleMu_15_7"));
        assert!(names.contains(&"sublead_Muon1_phiCorr"));
        assert!(names.contains(&"GenOther_lxy"));
        // 38 event-level values, 2 vertex counts, 14 per vertex, 6 primary vertex, 7 jet,
        // 2 muon counts, 49 per muon, 11 per gen collection plus a count, 3 beamspot, 4 seeds
        assert_eq!(
            layout.n_columns(),
            38 + 2 + 2 * 14 + 6 + 7 + 2 + 4 * 49 + 23 + 3 + 4
        );
        assert!(layout.iter().all(|(_, column)| column.is_empty()));
    }

    #[test]
    fn test_rows_accumulate() {
        let mut columns = BabyColumns::new();
        let mut record = BabyRecord::default();
        columns.push(&record).unwrap();
        record.run = 316000;
        record.jets.pt = vec![20.0, 30.0];
        columns.push(&record).unwrap();
        assert_eq!(columns.get("run"), Some(&Column::I64(vec![999, 316000])));
        assert_eq!(
            columns.get("Jet_pt"),
            Some(&Column::VecF32(vec![vec![], vec![20.0, 30.0]]))
        );
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        struct Bad(bool);
        impl FillColumns for Bad {
            fn fill_columns(&self, prefix: &str, columns: &mut BabyColumns) {
                if self.0 {
                    columns.put(prefix, "value", 1.0_f32);
                } else {
                    columns.put(prefix, "value", 1_i32);
                }
            }
        }
        let mut columns = BabyColumns::new();
        columns.push(&Bad(true)).unwrap();
        let err = columns.push(&Bad(false)).unwrap_err();
        assert!(matches!(
            err,
            BabyError::LengthMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_vertex_record_without_pixel_module() {
        let vertex = Vertex {
            x: 3.0,
            y: 4.0,
            ndof: 1,
            ..Default::default()
        };
        let record = VertexRecord::new(&vertex, &Vec3::new(3.0, 0.0, 0.0), None, true);
        assert_eq!(record.rho, 5.0);
        assert_eq!(record.rho_corr, 4.0);
        assert!(!record.in_pixel);
        assert_eq!(record.dist_pixel, 999.0);
        assert_eq!(record.layer_pixel, -1);
    }
}
