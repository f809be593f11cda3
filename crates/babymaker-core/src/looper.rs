use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::baby::{
    write_baby, BabyColumns, BabyRecord, GenCollection, GenMatchRecord, JetCollection,
    JobCounters, MuonRecord, PrimaryVertexRecord, SubleadRecord, VertexRecord, WriteOptions,
};
use crate::data::{
    read_events, InputContent, Muon, PrimaryVertex, ReadOptions, ScoutingEvent, Vertex,
    DEFAULT_TREE,
};
use crate::gen::{match_muon, GenMatch, GenSelection};
use crate::geometry::{BeamspotCache, PixelGeometry};
use crate::kinematics::{
    DimuonQuantities, FlagContext, MuonQuantities, SecondaryQuantities, SelectionFlags,
};
use crate::selection::{pick_best_objects, VertexQuality};
use crate::triggers::TriggerCache;
use crate::utils::enums::Year;
use crate::utils::vectors::Vec3;
use crate::{BabyError, BabyResult, SENTINEL};

/// Number of processed events between progress reports.
pub const PROGRESS_INTERVAL: usize = 1000;
/// Pixel module table looked up in the data directory. The nominal barrel is used without it.
pub const PIXEL_TABLE: &str = "pixel_modules.pkl";

/// Options for a babymaking job.
#[derive(Clone, Debug)]
pub struct LooperOptions {
    /// Input ROOT files, already split and expanded.
    pub inputs: Vec<String>,
    /// Output file; `.parquet` selects Parquet, anything else ROOT.
    pub output: String,
    /// Input tree name.
    pub tree: String,
    /// Stop after this many events.
    pub max_events: Option<usize>,
    /// Number of events the job is supposed to loop over.
    pub expected: Option<usize>,
    /// Year used unless the first input name says otherwise.
    pub year: Year,
    /// Directory holding the beamspot and pixel tables.
    pub data_dir: PathBuf,
    /// Parquet batch size.
    pub batch_size: usize,
}

impl Default for LooperOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: "output.root".to_string(),
            tree: DEFAULT_TREE.to_string(),
            max_events: None,
            expected: None,
            year: Year::default(),
            data_dir: PathBuf::from("data"),
            batch_size: WriteOptions::default().batch_size,
        }
    }
}

impl LooperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn output<S: Into<String>>(mut self, output: S) -> Self {
        self.output = output.into();
        self
    }

    pub fn tree<S: Into<String>>(mut self, tree: S) -> Self {
        self.tree = tree.into();
        self
    }

    pub fn max_events(mut self, max_events: Option<usize>) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn expected(mut self, expected: Option<usize>) -> Self {
        self.expected = expected;
        self
    }

    pub fn year(mut self, year: Year) -> Self {
        self.year = year;
        self
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Event counts and timing of a finished job.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub n_input: usize,
    pub n_processed: usize,
    pub n_output: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn counters(&self) -> JobCounters {
        JobCounters {
            n_input: self.n_input as u64,
            n_processed: self.n_processed as u64,
            n_output: self.n_output as u64,
        }
    }

    /// Check that every input event was looped over (up to `max_events`) and, if given, that
    /// this matches the `expected` count.
    pub fn check_integrity(
        &self,
        expected: Option<usize>,
        max_events: Option<usize>,
    ) -> BabyResult<()> {
        let target = max_events.map_or(self.n_input, |limit| limit.min(self.n_input));
        if self.n_processed != target {
            return Err(BabyError::Integrity {
                processed: self.n_processed,
                expected: target,
            });
        }
        if let Some(expected) = expected {
            if self.n_processed != expected {
                return Err(BabyError::Integrity {
                    processed: self.n_processed,
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Processing rate in events per second.
    pub fn rate(&self) -> f64 {
        self.n_processed as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

/// Per-muon output together with the values the candidate-level quantities need.
struct SelectedMuon {
    quantities: MuonQuantities,
    gen_match: Option<GenMatch>,
    record: MuonRecord,
}

/// The babymaking job: reads every input, selects candidates and writes the output.
pub struct Looper {
    options: LooperOptions,
    year: Year,
    quality: VertexQuality,
    beamspots: BeamspotCache,
    triggers: TriggerCache,
    pixels: PixelGeometry,
}

impl Looper {
    /// Set up the job. The year is taken from the first input name when it contains
    /// `Run2017` or `Run2018`.
    pub fn new(options: LooperOptions) -> BabyResult<Self> {
        let detected = options
            .inputs
            .first()
            .and_then(|name| Year::from_file_name(name));
        let year = match detected {
            Some(year) if year != options.year => {
                info!(configured = %options.year, detected = %year, "using year from input file name");
                year
            }
            _ => options.year,
        };
        let pixel_path = options.data_dir.join(PIXEL_TABLE);
        let pixels = if pixel_path.exists() {
            info!(path = %pixel_path.display(), "loading pixel module table");
            PixelGeometry::from_pickle(&pixel_path)?
        } else {
            debug!(path = %pixel_path.display(), "no pixel module table, using nominal barrel");
            PixelGeometry::nominal_barrel()
        };
        Ok(Self {
            beamspots: BeamspotCache::new(&options.data_dir),
            triggers: TriggerCache::new(year),
            quality: VertexQuality::default(),
            pixels,
            year,
            options,
        })
    }

    pub fn year(&self) -> Year {
        self.year
    }

    pub fn options(&self) -> &LooperOptions {
        &self.options
    }

    fn select_muon(
        &self,
        muon: &Muon,
        vertex: &Vertex,
        origin: &Vec3,
        event: &ScoutingEvent,
        gen: Option<&GenSelection>,
    ) -> SelectedMuon {
        let quantities = MuonQuantities::new(muon, vertex, origin, &event.jets);
        let gen_match =
            gen.and_then(|gen| match_muon(muon.eta, muon.phi, &event.gen_particles, gen));
        let gen_record = gen_match
            .map(|matched| GenMatchRecord::new(&matched, &event.gen_particles[matched.index]))
            .unwrap_or_default();
        SelectedMuon {
            record: MuonRecord::new(muon, &quantities, gen_record),
            quantities,
            gen_match,
        }
    }

    /// Reduce one event to an output record.
    ///
    /// Returns `Ok(None)` for events without a candidate: fewer than one vertex or two muons,
    /// no vertex with exactly two muons passing the quality gate, or a missing trigger bit.
    pub fn process_event(
        &mut self,
        event: &ScoutingEvent,
        content: &InputContent,
    ) -> BabyResult<Option<BabyRecord>> {
        if event.vertices.is_empty() || event.muons.len() < 2 {
            return Ok(None);
        }
        let id = event.id;
        let is_mc = content.is_mc();

        let beamspot = match event.beamspot {
            Some(beamspot) if content.has_bs_info => beamspot,
            _ => self.beamspots.lookup(self.year, is_mc, id.run, id.lumi)?,
        };
        let origin = event
            .primary_vertices
            .first()
            .map(PrimaryVertex::position)
            .unwrap_or(beamspot);
        let passid = event
            .vertices
            .iter()
            .map(|vertex| self.quality.passes(vertex, &origin))
            .collect::<Vec<_>>();

        let selection =
            match pick_best_objects(&event.vertices, &passid, &event.muons, id.run, is_mc) {
                Ok(selection) => selection,
                Err(failure) => {
                    info!(run = id.run, lumi = id.lumi, event = id.event, %failure, "skipping event");
                    return Ok(None);
                }
            };

        let l1 = match self.triggers.evaluate(event.l1.as_ref()) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(run = id.run, lumi = id.lumi, event = id.event, %err, "missing trigger bit, skipping event");
                return Ok(None);
            }
        };

        let gen = is_mc.then(|| GenSelection::new(&event.gen_particles));
        let primary = selection.primary;
        let vertex = &event.vertices[primary.vertex];
        let (mu1, mu2) = (
            &event.muons[primary.leading],
            &event.muons[primary.subleading],
        );
        let sel1 = self.select_muon(mu1, vertex, &origin, event, gen.as_ref());
        let sel2 = self.select_muon(mu2, vertex, &origin, event, gen.as_ref());
        let quantities = [&sel1.quantities, &sel2.quantities];
        let dimuon = DimuonQuantities::new([mu1, mu2], quantities, vertex, &origin);
        let pixel = self.pixels.locate(&vertex.position());
        let context = FlagContext {
            pass_l1: l1.pass_l1,
            dist_pixel: pixel.map_or(SENTINEL as f64, |hit| hit.plane_distance),
            gen_match_dr: gen.as_ref().map(|_| {
                [&sel1, &sel2].map(|sel| sel.gen_match.map_or(SENTINEL as f64, |m| m.dr))
            }),
        };
        let flags = SelectionFlags::new(&dimuon, [mu1, mu2], quantities, &context);

        let mut record = BabyRecord {
            run: id.run as i64,
            lumi: id.lumi as i64,
            event: id.event as i64,
            year: self.year.as_i32(),
            l1,
            flags,
            dimuon: (&dimuon).into(),
            met_pt: event.met_pt as f32,
            met_phi: event.met_phi as f32,
            rho: event.rho as f32,
            n_dv_raw: event.vertices.len() as i32,
            n_dv: 1,
            dv: VertexRecord::new(vertex, &origin, pixel, passid[primary.vertex]),
            jets: JetCollection::new(&event.jets),
            n_muon_raw: event.muons.len() as i32,
            n_muon: 2,
            beamspot: [beamspot.x as f32, beamspot.y as f32, beamspot.z as f32],
            ..Default::default()
        };
        record.pvm.n_raw = event.primary_vertices.len() as i32;
        if let Some(pv) = event.primary_vertices.first() {
            record.pvm = PrimaryVertexRecord {
                n_raw: record.pvm.n_raw,
                x: pv.x as f32,
                y: pv.y as f32,
                z: pv.z as f32,
                chi2: pv.chi2 as f32,
                ndof: pv.ndof,
            };
        }
        record.muons[0] = sel1.record;
        record.muons[1] = sel2.record;

        if let Some(secondary) = selection.secondary {
            let vertex = &event.vertices[secondary.vertex];
            let (mu3, mu4) = (
                &event.muons[secondary.leading],
                &event.muons[secondary.subleading],
            );
            let sel3 = self.select_muon(mu3, vertex, &origin, event, gen.as_ref());
            let sel4 = self.select_muon(mu4, vertex, &origin, event, gen.as_ref());
            record.sublead = SubleadRecord::from(&SecondaryQuantities::new(
                [mu3, mu4],
                vertex,
                &origin,
            ));
            record.sublead_dv = VertexRecord::new(
                vertex,
                &origin,
                self.pixels.locate(&vertex.position()),
                passid[secondary.vertex],
            );
            record.muons[2] = sel3.record;
            record.muons[3] = sel4.record;
            record.n_dv = 2;
            record.n_muon = 4;
        }

        if let Some(gen) = &gen {
            record.gen_others = GenCollection::from_indices(&event.gen_particles, &gen.others);
            record.gen_muons = GenCollection::from_indices(&event.gen_particles, &gen.muons);
        }
        Ok(Some(record))
    }

    /// Loop over every input, write the output and check that no event was lost.
    pub fn run(mut self) -> BabyResult<RunSummary> {
        let start = Instant::now();
        let read_options = ReadOptions::new().tree(&self.options.tree);
        let inputs = self.options.inputs.clone();
        let max_events = self.options.max_events;
        let mut columns = BabyColumns::layout();
        let mut summary = RunSummary::default();
        let (mut last_time, mut last_count) = (Instant::now(), 0);

        info!(files = inputs.len(), year = %self.year, "started babymaking");
        for path in &inputs {
            if let Some(limit) = max_events.filter(|&limit| summary.n_processed >= limit) {
                info!(limit, "event limit reached, skipping remaining inputs");
                break;
            }
            let file = read_events(path, &read_options)?;
            info!(path = %path, events = file.len(), content = ?file.content, "read input file");
            summary.n_input += file.len();
            for event in &file.events {
                if max_events.is_some_and(|limit| summary.n_processed >= limit) {
                    break;
                }
                summary.n_processed += 1;
                if let Some(record) = self.process_event(event, &file.content)? {
                    columns.push(&record)?;
                }
                if summary.n_processed % PROGRESS_INTERVAL == 0 {
                    let seconds = last_time.elapsed().as_secs_f64();
                    let count = summary.n_processed - last_count;
                    info!(
                        processed = summary.n_processed,
                        rate = %format!("{:.1}Hz", count as f64 / seconds.max(f64::EPSILON)),
                        "progress"
                    );
                    (last_time, last_count) = (Instant::now(), summary.n_processed);
                }
            }
        }

        summary.n_output = columns.n_rows();
        let write_options = WriteOptions::new().batch_size(self.options.batch_size);
        write_baby(
            columns,
            &summary.counters(),
            &self.options.output,
            &write_options,
        )?;
        summary.elapsed = start.elapsed();
        info!(
            input = summary.n_input,
            processed = summary.n_processed,
            output = summary.n_output,
            seconds = summary.elapsed.as_secs_f64(),
            rate = %format!("{:.1}Hz", summary.rate()),
            "finished babymaking"
        );
        summary.check_integrity(self.options.expected, max_events)?;
        Ok(summary)
    }
}
