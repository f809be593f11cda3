use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use serde_pickle::DeOptions;
use tracing::{info, warn};

use crate::{utils::enums::Year, utils::vectors::Vec3, BabyResult};

/// Key under which a table stores its mean position.
pub const MEAN_KEY: (u32, u32) = (0, 0);

/// Beamspot used for 2017 simulation (`94X_mc2017_realistic_v14`).
pub const MC_BEAMSPOT_2017: [f64; 3] = [-0.024793, 0.0692861, 0.789895];
/// Beamspot used for 2018 simulation (`102X_upgrade2018_realistic_v11`).
pub const MC_BEAMSPOT_2018: [f64; 3] = [0.0107796, 0.041893, 0.0248755];

/// Beamspot positions keyed by `(run, lumi)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeamspotTable {
    positions: HashMap<(u32, u32), Vec3>,
}

impl BeamspotTable {
    /// Build a table from `(run, lumi, x, y, z)` rows.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32, f64, f64, f64)>,
    {
        Self {
            positions: rows
                .into_iter()
                .map(|(run, lumi, x, y, z)| ((run, lumi), Vec3::new(x, y, z)))
                .collect(),
        }
    }

    /// The single-entry table used for simulation of a given year.
    pub fn simulation(year: Year) -> Self {
        let [x, y, z] = match year {
            Year::Y2017 => MC_BEAMSPOT_2017,
            Year::Y2018 => MC_BEAMSPOT_2018,
        };
        Self::from_rows([(MEAN_KEY.0, MEAN_KEY.1, x, y, z)])
    }

    /// Load a pickled list of `(run, lumi, x, y, z)` tuples.
    pub fn from_pickle<P: AsRef<Path>>(path: P) -> BabyResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let rows: Vec<(u32, u32, f64, f64, f64)> =
            serde_pickle::from_reader(reader, DeOptions::new())?;
        Ok(Self::from_rows(rows))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, run: u32, lumi: u32) -> Option<Vec3> {
        self.positions.get(&(run, lumi)).copied()
    }

    /// Look up `(run, lumi)`, falling back to the mean entry and then to the origin.
    pub fn lookup(&self, run: u32, lumi: u32) -> Vec3 {
        if let Some(position) = self.get(run, lumi) {
            return position;
        }
        let fallback = self.get(MEAN_KEY.0, MEAN_KEY.1).unwrap_or_default();
        warn!(
            run,
            lumi,
            fallback = %fallback,
            "no beamspot for this lumisection, falling back to the mean"
        );
        fallback
    }
}

/// Lazily loaded beamspot tables, one per `(year, is_mc)`.
#[derive(Clone, Debug)]
pub struct BeamspotCache {
    data_dir: PathBuf,
    tables: HashMap<(Year, bool), BeamspotTable>,
}

impl BeamspotCache {
    /// Data tables are read from `<data_dir>/beamspots_<year>.pkl`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            tables: HashMap::new(),
        }
    }

    pub fn table_path(&self, year: Year) -> PathBuf {
        self.data_dir.join(format!("beamspots_{year}.pkl"))
    }

    /// The table for `(year, is_mc)`, loading it on first use.
    ///
    /// A data table that does not exist on disk is replaced by an empty one, so every lookup
    /// falls back to the origin. A table that exists but cannot be read is an error.
    pub fn table(&mut self, year: Year, is_mc: bool) -> BabyResult<&BeamspotTable> {
        if !self.tables.contains_key(&(year, is_mc)) {
            let table = if is_mc {
                BeamspotTable::simulation(year)
            } else {
                let path = self.table_path(year);
                if path.exists() {
                    info!(path = %path.display(), "loading beamspot data");
                    let table = BeamspotTable::from_pickle(&path)?;
                    info!(rows = table.len(), "finished loading beamspot data");
                    table
                } else {
                    warn!(path = %path.display(), "beamspot table not found");
                    BeamspotTable::default()
                }
            };
            self.tables.insert((year, is_mc), table);
        }
        Ok(&self.tables[&(year, is_mc)])
    }

    /// Beamspot position for one lumisection. Simulation always uses the mean entry.
    pub fn lookup(&mut self, year: Year, is_mc: bool, run: u32, lumi: u32) -> BabyResult<Vec3> {
        let (run, lumi) = if is_mc { MEAN_KEY } else { (run, lumi) };
        Ok(self.table(year, is_mc)?.lookup(run, lumi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_pickle::SerOptions;

    #[test]
    fn test_lookup_and_fallback() {
        let table = BeamspotTable::from_rows([
            (0, 0, 0.1, 0.2, 0.3),
            (316000, 12, 0.09, 0.04, -0.5),
        ]);
        assert_eq!(table.lookup(316000, 12), Vec3::new(0.09, 0.04, -0.5));
        assert_eq!(table.lookup(316000, 13), Vec3::new(0.1, 0.2, 0.3));
        let empty = BeamspotTable::default();
        assert_eq!(empty.lookup(1, 1), Vec3::default());
    }

    #[test]
    fn test_simulation_tables() {
        let mut cache = BeamspotCache::new("/nonexistent");
        let bs = cache.lookup(Year::Y2017, true, 316000, 12).unwrap();
        assert_relative_eq!(bs.x, -0.024793);
        assert_relative_eq!(bs.z, 0.789895);
        let bs = cache.lookup(Year::Y2018, true, 1, 1).unwrap();
        assert_relative_eq!(bs.y, 0.041893);
    }

    #[test]
    fn test_pickle_table_is_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![(0_u32, 0_u32, 0.1, 0.1, 0.0), (305000, 7, 0.08, 0.03, 0.4)];
        let mut file = File::create(dir.path().join("beamspots_2017.pkl")).unwrap();
        serde_pickle::to_writer(&mut file, &rows, SerOptions::new()).unwrap();
        drop(file);

        let mut cache = BeamspotCache::new(dir.path());
        assert_eq!(
            cache.lookup(Year::Y2017, false, 305000, 7).unwrap(),
            Vec3::new(0.08, 0.03, 0.4)
        );
        std::fs::remove_file(dir.path().join("beamspots_2017.pkl")).unwrap();
        assert_eq!(
            cache.lookup(Year::Y2017, false, 305000, 8).unwrap(),
            Vec3::new(0.1, 0.1, 0.0)
        );
        assert_eq!(cache.table(Year::Y2017, false).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_data_table_falls_back_to_origin() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = BeamspotCache::new(dir.path());
        assert_eq!(
            cache.lookup(Year::Y2018, false, 320000, 1).unwrap(),
            Vec3::default()
        );
    }
}
