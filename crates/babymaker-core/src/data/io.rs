//! Reading flat scouting trees with the oxyroot backend.

use super::*;
use crate::{BabyError, BabyResult};
use glob::glob;
use indexmap::IndexMap;
use oxyroot::{Branch, Named, RootFile};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn canonicalize_input_path(file_path: &str) -> BabyResult<PathBuf> {
    Ok(Path::new(&*shellexpand::full(file_path)?).canonicalize()?)
}

fn is_pattern(name: &str) -> bool {
    name.contains(['*', '?', '['])
}

/// Split comma-separated input arguments and expand `~` and environment variables in each path.
///
/// Names containing wildcards are replaced by the sorted list of files they match; a pattern
/// matching nothing contributes no inputs.
pub fn split_input_names<S: AsRef<str>>(names: &[S]) -> BabyResult<Vec<String>> {
    let mut expanded = Vec::new();
    for name in names {
        for part in name.as_ref().split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let part = shellexpand::full(part)?.into_owned();
            if !is_pattern(&part) {
                expanded.push(part);
                continue;
            }
            let mut matches = Vec::new();
            for entry in glob(&part)? {
                matches.push(entry?.display().to_string());
            }
            if matches.is_empty() {
                warn!(pattern = %part, "input pattern matched no files");
            }
            matches.sort();
            expanded.extend(matches);
        }
    }
    Ok(expanded)
}

type BranchLookup<'a> = IndexMap<&'a str, &'a Branch>;

macro_rules! read_branch {
    ($lookup:expr, $name:expr, $ty:ty) => {{
        let name: &str = $name;
        let branch = $lookup
            .get(name)
            .copied()
            .ok_or_else(|| BabyError::MissingColumn {
                name: name.to_string(),
            })?;
        branch
            .as_iter::<$ty>()
            .map_err(|err| map_root_error(&format!("Failed to read branch '{name}'"), err))?
            .collect::<Vec<$ty>>()
    }};
}

fn map_root_error<E: std::fmt::Display>(context: &str, err: E) -> BabyError {
    BabyError::Custom(format!("{context}: {err}"))
}

fn check_entries<T>(name: &str, values: &[T], n_entries: usize) -> BabyResult<()> {
    if values.len() != n_entries {
        return Err(BabyError::LengthMismatch {
            context: format!("Branch '{name}'"),
            expected: n_entries,
            actual: values.len(),
        });
    }
    Ok(())
}

fn read_f32_column(lookup: &BranchLookup, name: &str, n_entries: usize) -> BabyResult<Vec<f32>> {
    let values = read_branch!(lookup, name, f32);
    check_entries(name, &values, n_entries)?;
    Ok(values)
}

/// Per-object columns of one collection (`DV_*`, `Muon_*`, ...), checked so that every field
/// has the same number of objects in every event.
struct Collection {
    floats: IndexMap<&'static str, Vec<Vec<f32>>>,
    ints: IndexMap<&'static str, Vec<Vec<i32>>>,
    counts: Vec<usize>,
}

impl Collection {
    fn read(
        lookup: &BranchLookup,
        prefix: &str,
        float_fields: &[&'static str],
        int_fields: &[&'static str],
        n_entries: usize,
    ) -> BabyResult<Self> {
        let mut floats = IndexMap::with_capacity(float_fields.len());
        for &field in float_fields {
            let name = format!("{prefix}_{field}");
            let values = read_branch!(lookup, &name, Vec<f32>);
            check_entries(&name, &values, n_entries)?;
            floats.insert(field, values);
        }
        let mut ints = IndexMap::with_capacity(int_fields.len());
        for &field in int_fields {
            let name = format!("{prefix}_{field}");
            let values = read_branch!(lookup, &name, Vec<i32>);
            check_entries(&name, &values, n_entries)?;
            ints.insert(field, values);
        }
        let reference = floats
            .values()
            .next()
            .map(|column| column.iter().map(Vec::len).collect::<Vec<_>>())
            .unwrap_or_else(|| vec![0; n_entries]);
        let lengths = floats
            .iter()
            .map(|(field, column)| (*field, column.iter().map(Vec::len).collect::<Vec<_>>()))
            .chain(
                ints.iter()
                    .map(|(field, column)| (*field, column.iter().map(Vec::len).collect())),
            );
        for (field, column_lengths) in lengths {
            for (entry, (&expected, &actual)) in
                reference.iter().zip(column_lengths.iter()).enumerate()
            {
                if expected != actual {
                    return Err(BabyError::LengthMismatch {
                        context: format!("Entry {entry}, branch '{prefix}_{field}'"),
                        expected,
                        actual,
                    });
                }
            }
        }
        Ok(Self {
            floats,
            ints,
            counts: reference,
        })
    }

    fn count(&self, entry: usize) -> usize {
        self.counts[entry]
    }

    fn f(&self, field: &str, entry: usize, index: usize) -> f64 {
        self.floats[field][entry][index] as f64
    }

    fn i(&self, field: &str, entry: usize, index: usize) -> i32 {
        self.ints[field][entry][index]
    }
}

const DV_FLOATS: &[&str] = &["x", "y", "z", "xError", "yError", "zError", "chi2"];
const DV_INTS: &[&str] = &["ndof", "tracksSize"];
const PVM_FLOATS: &[&str] = &["x", "y", "z", "chi2"];
const PVM_INTS: &[&str] = &["ndof"];
const MUON_FLOATS: &[&str] = &[
    "pt",
    "eta",
    "phi",
    "trackIso",
    "chi2",
    "ndof",
    "dxy",
    "dz",
    "dxyError",
    "dzError",
    "trk_qoverp",
    "trk_lambda",
    "trk_qoverpError",
    "trk_lambdaError",
    "trk_phiError",
    "trk_dsz",
    "trk_dszError",
];
const MUON_INTS: &[&str] = &[
    "charge",
    "nValidMuonHits",
    "nValidPixelHits",
    "nMatchedStations",
    "nTrackerLayersWithMeasurement",
    "nValidStripHits",
    "nVtxIndx",
];
const JET_FLOATS: &[&str] = &[
    "pt",
    "eta",
    "phi",
    "m",
    "mvaDiscriminator",
    "btagDiscriminator",
];
const GEN_FLOATS: &[&str] = &["pt", "eta", "phi", "mass", "vx", "vy", "vz"];
const GEN_INTS: &[&str] = &["pdgId", "status", "motherIdx"];

/// Split the flattened association indices of one event back into one list per muon.
fn unflatten_indices(
    entry: usize,
    flat: &[i32],
    lengths: impl Iterator<Item = i32>,
) -> BabyResult<Vec<Vec<i32>>> {
    let lengths = lengths
        .map(|len| usize::try_from(len).unwrap_or(0))
        .collect::<Vec<_>>();
    let total: usize = lengths.iter().sum();
    if total != flat.len() {
        return Err(BabyError::LengthMismatch {
            context: format!("Entry {entry}, branch 'Muon_vtxIndx'"),
            expected: total,
            actual: flat.len(),
        });
    }
    let mut offset = 0;
    Ok(lengths
        .into_iter()
        .map(|len| {
            let indices = flat[offset..offset + len].to_vec();
            offset += len;
            indices
        })
        .collect())
}

/// Read every event of a flat scouting tree.
///
/// All per-event branches must have one entry per tree entry, and all fields of a collection
/// must agree on the number of objects, otherwise a [`BabyError::LengthMismatch`] is returned.
/// Optional branch groups are detected by name and recorded in [`EventFile::content`].
pub fn read_events(file_path: &str, options: &ReadOptions) -> BabyResult<EventFile> {
    let path = canonicalize_input_path(file_path)?;
    let mut file = RootFile::open(&path).map_err(|err| {
        BabyError::Custom(format!(
            "Failed to open ROOT file '{}': {err}",
            path.display()
        ))
    })?;
    let tree = file.get_tree(&options.tree).map_err(|err| {
        map_root_error(&format!("Failed to open ROOT tree '{}'", options.tree), err)
    })?;
    let lookup: BranchLookup<'_> = tree
        .branches()
        .map(|branch| (branch.name(), branch))
        .collect();
    let content = InputContent::from_branch_names(lookup.keys());
    debug!(path = %path.display(), ?content, "opened input tree");

    let runs = read_branch!(lookup, "run", u32);
    let n_entries = runs.len();
    let lumis = read_branch!(lookup, "luminosityBlock", u32);
    check_entries("luminosityBlock", &lumis, n_entries)?;
    let event_numbers = read_branch!(lookup, "event", u64);
    check_entries("event", &event_numbers, n_entries)?;
    let met_pt = read_f32_column(&lookup, "MET_pt", n_entries)?;
    let met_phi = read_f32_column(&lookup, "MET_phi", n_entries)?;
    let rho = read_f32_column(&lookup, "rho", n_entries)?;

    let dvs = Collection::read(&lookup, "DV", DV_FLOATS, DV_INTS, n_entries)?;
    let pvms = Collection::read(&lookup, "PVM", PVM_FLOATS, PVM_INTS, n_entries)?;
    let muons = Collection::read(&lookup, "Muon", MUON_FLOATS, MUON_INTS, n_entries)?;
    let jets = Collection::read(&lookup, "Jet", JET_FLOATS, &[], n_entries)?;
    let vtx_indices = read_branch!(lookup, "Muon_vtxIndx", Vec<i32>);
    check_entries("Muon_vtxIndx", &vtx_indices, n_entries)?;

    let expected_hits = if content.has_hit_info {
        let values = read_branch!(lookup, "Muon_nExpectedPixelHits", Vec<i32>);
        check_entries("Muon_nExpectedPixelHits", &values, n_entries)?;
        for (entry, hits) in values.iter().enumerate() {
            if hits.len() != muons.count(entry) {
                return Err(BabyError::LengthMismatch {
                    context: format!("Entry {entry}, branch 'Muon_nExpectedPixelHits'"),
                    expected: muons.count(entry),
                    actual: hits.len(),
                });
            }
        }
        Some(values)
    } else {
        None
    };
    let gen = if content.has_gen_info {
        Some(Collection::read(
            &lookup, "GenPart", GEN_FLOATS, GEN_INTS, n_entries,
        )?)
    } else {
        None
    };
    let l1 = if content.has_trigger_info {
        let names = read_branch!(lookup, "L1_name", Vec<String>);
        check_entries("L1_name", &names, n_entries)?;
        let results = read_branch!(lookup, "L1_result", Vec<bool>);
        check_entries("L1_result", &results, n_entries)?;
        Some((names, results))
    } else {
        None
    };
    let beamspots = if content.has_bs_info {
        Some((
            read_f32_column(&lookup, "BS_x", n_entries)?,
            read_f32_column(&lookup, "BS_y", n_entries)?,
            read_f32_column(&lookup, "BS_z", n_entries)?,
        ))
    } else {
        None
    };

    let mut events = Vec::with_capacity(n_entries);
    for entry in 0..n_entries {
        let vertices = (0..dvs.count(entry))
            .map(|i| Vertex {
                x: dvs.f("x", entry, i),
                y: dvs.f("y", entry, i),
                z: dvs.f("z", entry, i),
                x_error: dvs.f("xError", entry, i),
                y_error: dvs.f("yError", entry, i),
                z_error: dvs.f("zError", entry, i),
                chi2: dvs.f("chi2", entry, i),
                ndof: dvs.i("ndof", entry, i),
                tracks_size: dvs.i("tracksSize", entry, i),
            })
            .collect();
        let primary_vertices = (0..pvms.count(entry))
            .map(|i| PrimaryVertex {
                x: pvms.f("x", entry, i),
                y: pvms.f("y", entry, i),
                z: pvms.f("z", entry, i),
                chi2: pvms.f("chi2", entry, i),
                ndof: pvms.i("ndof", entry, i),
            })
            .collect();
        let n_muons = muons.count(entry);
        let mut association = unflatten_indices(
            entry,
            &vtx_indices[entry],
            (0..n_muons).map(|i| muons.i("nVtxIndx", entry, i)),
        )?
        .into_iter();
        let event_muons = (0..n_muons)
            .map(|i| Muon {
                pt: muons.f("pt", entry, i),
                eta: muons.f("eta", entry, i),
                phi: muons.f("phi", entry, i),
                charge: muons.i("charge", entry, i),
                track_iso: muons.f("trackIso", entry, i),
                chi2: muons.f("chi2", entry, i),
                ndof: muons.f("ndof", entry, i),
                dxy: muons.f("dxy", entry, i),
                dz: muons.f("dz", entry, i),
                dxy_error: muons.f("dxyError", entry, i),
                dz_error: muons.f("dzError", entry, i),
                trk_qoverp: muons.f("trk_qoverp", entry, i),
                trk_lambda: muons.f("trk_lambda", entry, i),
                trk_qoverp_error: muons.f("trk_qoverpError", entry, i),
                trk_lambda_error: muons.f("trk_lambdaError", entry, i),
                trk_phi_error: muons.f("trk_phiError", entry, i),
                trk_dsz: muons.f("trk_dsz", entry, i),
                trk_dsz_error: muons.f("trk_dszError", entry, i),
                n_valid_muon_hits: muons.i("nValidMuonHits", entry, i),
                n_valid_pixel_hits: muons.i("nValidPixelHits", entry, i),
                n_matched_stations: muons.i("nMatchedStations", entry, i),
                n_tracker_layers: muons.i("nTrackerLayersWithMeasurement", entry, i),
                n_valid_strip_hits: muons.i("nValidStripHits", entry, i),
                n_expected_pixel_hits: expected_hits.as_ref().map(|hits| hits[entry][i]),
                vtx_indices: association.next().unwrap_or_default(),
            })
            .collect();
        let event_jets = (0..jets.count(entry))
            .map(|i| Jet {
                pt: jets.f("pt", entry, i),
                eta: jets.f("eta", entry, i),
                phi: jets.f("phi", entry, i),
                m: jets.f("m", entry, i),
                mva_discriminator: jets.f("mvaDiscriminator", entry, i),
                btag_discriminator: jets.f("btagDiscriminator", entry, i),
            })
            .collect();
        let gen_particles = gen
            .as_ref()
            .map(|gen| {
                (0..gen.count(entry))
                    .map(|i| GenParticle {
                        pt: gen.f("pt", entry, i),
                        eta: gen.f("eta", entry, i),
                        phi: gen.f("phi", entry, i),
                        mass: gen.f("mass", entry, i),
                        vx: gen.f("vx", entry, i),
                        vy: gen.f("vy", entry, i),
                        vz: gen.f("vz", entry, i),
                        pdg_id: gen.i("pdgId", entry, i),
                        status: gen.i("status", entry, i),
                        mother_idx: gen.i("motherIdx", entry, i),
                    })
                    .collect()
            })
            .unwrap_or_default();
        events.push(ScoutingEvent {
            id: EventId {
                run: runs[entry],
                lumi: lumis[entry],
                event: event_numbers[entry],
            },
            vertices,
            primary_vertices,
            muons: event_muons,
            jets: event_jets,
            gen_particles,
            l1: l1.as_ref().map(|(names, results)| L1Bits {
                names: names[entry].clone(),
                results: results[entry].clone(),
            }),
            beamspot: beamspots.as_ref().map(|(x, y, z)| {
                Vec3::new(x[entry] as f64, y[entry] as f64, z[entry] as f64)
            }),
            met_pt: met_pt[entry] as f64,
            met_phi: met_phi[entry] as f64,
            rho: rho[entry] as f64,
        });
    }

    Ok(EventFile {
        path: path.display().to_string(),
        content,
        events,
    })
}

/// Add every branch [`read_events`] requires, plus `Muon_nExpectedPixelHits`, for `events`.
/// Branches named in `skip` are left out so callers can replace them.
#[cfg(test)]
pub(crate) fn fill_event_tree(
    tree: &mut oxyroot::WriterTree,
    events: &[ScoutingEvent],
    skip: &[&str],
) {
    macro_rules! scalar {
        ($name:expr, |$e:ident| $value:expr) => {
            if !skip.contains(&$name) {
                let values = events.iter().map(|$e| $value).collect::<Vec<_>>();
                tree.new_branch($name, values.into_iter());
            }
        };
    }
    macro_rules! objects {
        ($name:expr, $collection:ident, |$o:ident| $value:expr) => {
            if !skip.contains(&$name) {
                let values = events
                    .iter()
                    .map(|event| event.$collection.iter().map(|$o| $value).collect::<Vec<_>>())
                    .collect::<Vec<_>>();
                tree.new_branch($name, values.into_iter());
            }
        };
    }
    scalar!("run", |e| e.id.run);
    scalar!("luminosityBlock", |e| e.id.lumi);
    scalar!("event", |e| e.id.event);
    scalar!("MET_pt", |e| e.met_pt as f32);
    scalar!("MET_phi", |e| e.met_phi as f32);
    scalar!("rho", |e| e.rho as f32);

    objects!("DV_x", vertices, |v| v.x as f32);
    objects!("DV_y", vertices, |v| v.y as f32);
    objects!("DV_z", vertices, |v| v.z as f32);
    objects!("DV_xError", vertices, |v| v.x_error as f32);
    objects!("DV_yError", vertices, |v| v.y_error as f32);
    objects!("DV_zError", vertices, |v| v.z_error as f32);
    objects!("DV_chi2", vertices, |v| v.chi2 as f32);
    objects!("DV_ndof", vertices, |v| v.ndof);
    objects!("DV_tracksSize", vertices, |v| v.tracks_size);

    objects!("PVM_x", primary_vertices, |v| v.x as f32);
    objects!("PVM_y", primary_vertices, |v| v.y as f32);
    objects!("PVM_z", primary_vertices, |v| v.z as f32);
    objects!("PVM_chi2", primary_vertices, |v| v.chi2 as f32);
    objects!("PVM_ndof", primary_vertices, |v| v.ndof);

    objects!("Muon_pt", muons, |m| m.pt as f32);
    objects!("Muon_eta", muons, |m| m.eta as f32);
    objects!("Muon_phi", muons, |m| m.phi as f32);
    objects!("Muon_trackIso", muons, |m| m.track_iso as f32);
    objects!("Muon_chi2", muons, |m| m.chi2 as f32);
    objects!("Muon_ndof", muons, |m| m.ndof as f32);
    objects!("Muon_dxy", muons, |m| m.dxy as f32);
    objects!("Muon_dz", muons, |m| m.dz as f32);
    objects!("Muon_dxyError", muons, |m| m.dxy_error as f32);
    objects!("Muon_dzError", muons, |m| m.dz_error as f32);
    objects!("Muon_trk_qoverp", muons, |m| m.trk_qoverp as f32);
    objects!("Muon_trk_lambda", muons, |m| m.trk_lambda as f32);
    objects!("Muon_trk_qoverpError", muons, |m| m.trk_qoverp_error as f32);
    objects!("Muon_trk_lambdaError", muons, |m| m.trk_lambda_error as f32);
    objects!("Muon_trk_phiError", muons, |m| m.trk_phi_error as f32);
    objects!("Muon_trk_dsz", muons, |m| m.trk_dsz as f32);
    objects!("Muon_trk_dszError", muons, |m| m.trk_dsz_error as f32);
    objects!("Muon_charge", muons, |m| m.charge);
    objects!("Muon_nValidMuonHits", muons, |m| m.n_valid_muon_hits);
    objects!("Muon_nValidPixelHits", muons, |m| m.n_valid_pixel_hits);
    objects!("Muon_nMatchedStations", muons, |m| m.n_matched_stations);
    objects!("Muon_nTrackerLayersWithMeasurement", muons, |m| m.n_tracker_layers);
    objects!("Muon_nValidStripHits", muons, |m| m.n_valid_strip_hits);
    objects!("Muon_nExpectedPixelHits", muons, |m| m
        .n_expected_pixel_hits
        .unwrap_or(0));
    objects!("Muon_nVtxIndx", muons, |m| m.vtx_indices.len() as i32);
    scalar!("Muon_vtxIndx", |e| e
        .muons
        .iter()
        .flat_map(|m| m.vtx_indices.iter().copied())
        .collect::<Vec<i32>>());

    objects!("Jet_pt", jets, |j| j.pt as f32);
    objects!("Jet_eta", jets, |j| j.eta as f32);
    objects!("Jet_phi", jets, |j| j.phi as f32);
    objects!("Jet_m", jets, |j| j.m as f32);
    objects!("Jet_mvaDiscriminator", jets, |j| j.mva_discriminator as f32);
    objects!("Jet_btagDiscriminator", jets, |j| j.btag_discriminator as f32);
}

/// Write `events` to a new file holding an `Events` tree.
#[cfg(test)]
pub(crate) fn write_event_file(path: &Path, events: &[ScoutingEvent]) {
    let mut file = RootFile::create(path).unwrap();
    let mut tree = oxyroot::WriterTree::new("Events");
    fill_event_tree(&mut tree, events, &[]);
    tree.write(&mut file).unwrap();
    file.close().unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use oxyroot::WriterTree;

    fn two_events() -> Vec<ScoutingEvent> {
        let first = test_event();
        let mut second = test_event();
        second.id.event += 1;
        let third = Muon {
            pt: 5.0,
            vtx_indices: vec![0, 1, 1],
            ..second.muons[0].clone()
        };
        second.muons[0].vtx_indices = vec![1];
        second.muons[1].vtx_indices = vec![];
        second.muons.push(third);
        second.jets.clear();
        vec![first, second]
    }

    #[test]
    fn test_read_complete_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.root");
        write_event_file(&path, &two_events());

        let file = read_events(path.to_str().unwrap(), &ReadOptions::new()).unwrap();
        assert_eq!(file.len(), 2);
        assert!(file.content.has_hit_info);
        assert!(!file.content.has_gen_info);
        assert!(!file.content.has_trigger_info);

        let first = &file.events[0];
        assert_eq!(first.id.run, 316000);
        assert_eq!(first.id.event, 123456789);
        assert_eq!(first.vertices.len(), 2);
        assert_relative_eq!(first.vertices[0].x, 0.6, epsilon = 1e-6);
        assert_eq!(first.vertices[1].tracks_size, 2);
        assert_relative_eq!(first.primary_vertices[0].z, 1.0, epsilon = 1e-6);
        assert_eq!(first.jets.len(), 1);
        assert!(first.l1.is_none());
        assert!(first.beamspot.is_none());
        let muons = first
            .muons
            .iter()
            .map(|muon| (muon.pt as f32, muon.vtx_indices.clone()))
            .collect::<Vec<_>>();
        assert_eq!(muons, vec![(8.0, vec![0, 1]), (12.0, vec![0, 1])]);
        assert_eq!(first.muons[1].charge, -1);
        assert_eq!(first.muons[0].n_expected_pixel_hits, Some(2));

        let second = &file.events[1];
        assert_eq!(second.id.event, 123456790);
        assert!(second.jets.is_empty());
        let lists = second
            .muons
            .iter()
            .map(|muon| muon.vtx_indices.clone())
            .collect::<Vec<_>>();
        assert_eq!(lists, vec![vec![1], vec![], vec![0, 1, 1]]);
        assert_relative_eq!(second.muons[2].pt, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_collection_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mismatch.root");
        let events = two_events();
        let mut file = RootFile::create(&path).unwrap();
        let mut tree = WriterTree::new("Events");
        fill_event_tree(&mut tree, &events, &["DV_y"]);
        // one vertex short in the second entry
        let dv_y = vec![vec![0.45_f32, 0.44], vec![0.45]];
        tree.new_branch("DV_y", dv_y.into_iter());
        tree.write(&mut file).unwrap();
        file.close().unwrap();
        drop(file);

        let err = read_events(path.to_str().unwrap(), &ReadOptions::new()).unwrap_err();
        match err {
            BabyError::LengthMismatch {
                context,
                expected,
                actual,
            } => {
                assert_eq!(context, "Entry 1, branch 'DV_y'");
                assert_eq!((expected, actual), (2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_split_input_patterns() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["output_2.root", "output_1.root", "other.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pattern = dir.path().join("output_*.root");
        let plain = dir.path().join("other.txt");
        let names = split_input_names(&[format!(
            "{},{}",
            pattern.display(),
            plain.display()
        )])
        .unwrap();
        assert_eq!(
            names,
            vec![
                dir.path().join("output_1.root").display().to_string(),
                dir.path().join("output_2.root").display().to_string(),
                plain.display().to_string(),
            ]
        );

        let none = dir.path().join("missing_*.root");
        assert!(split_input_names(&[none.display().to_string()])
            .unwrap()
            .is_empty());
        assert!(matches!(
            split_input_names(&[dir.path().join("[").display().to_string()]),
            Err(BabyError::PatternError(_))
        ));
    }

    #[test]
    fn test_split_input_names() {
        std::env::set_var("BABYMAKER_TEST_STORE", "/store/user/scouting");
        let names = split_input_names(&[
            "a.root, b.root".to_string(),
            "$BABYMAKER_TEST_STORE/c.root".to_string(),
            ",".to_string(),
        ])
        .unwrap();
        assert_eq!(
            names,
            vec!["a.root", "b.root", "/store/user/scouting/c.root"]
        );
    }

    #[test]
    fn test_unflatten_indices() {
        let lists = unflatten_indices(0, &[0, 1, 1, 2], [1, 0, 3].into_iter()).unwrap();
        assert_eq!(lists, vec![vec![0], vec![], vec![1, 1, 2]]);
        let err = unflatten_indices(7, &[0, 1], [1, 2].into_iter()).unwrap_err();
        assert!(matches!(
            err,
            BabyError::LengthMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_input_file() {
        let err = read_events("/nonexistent/ntuple.root", &ReadOptions::new()).unwrap_err();
        assert!(matches!(err, BabyError::IOError(_)));
    }

    #[test]
    fn test_missing_branch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.root");
        let mut file = RootFile::create(&path).unwrap();
        let mut tree = WriterTree::new("Events");
        tree.new_branch("run", vec![316000_u32, 316000_u32].into_iter());
        tree.write(&mut file).unwrap();
        file.close().unwrap();
        drop(file);

        let err = read_events(path.to_str().unwrap(), &ReadOptions::new()).unwrap_err();
        match err {
            BabyError::MissingColumn { name } => assert_eq!(name, "luminosityBlock"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
