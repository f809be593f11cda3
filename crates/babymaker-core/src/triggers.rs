use indexmap::IndexMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::data::L1Bits;
use crate::utils::enums::Year;

/// Level-1 seeds whose decisions are stored in the output.
pub const SEEDS_TO_SAVE: [&str; 4] = [
    "L1_DoubleMu4_SQ_OS_dR_Max1p2",
    "L1_DoubleMu4p5_SQ_OS_dR_Max1p2",
    "L1_DoubleMu0er1p4_SQ_OS_dR_Max1p4",
    "L1_DoubleMu_15_7",
];

/// Seeds entering `pass_l1` for a given year. The dR-limited 4 GeV seed was prescaled in 2018
/// and replaced by its 4.5 GeV version.
pub fn seeds_to_or(year: Year) -> [&'static str; 3] {
    match year {
        Year::Y2017 => [
            "L1_DoubleMu4_SQ_OS_dR_Max1p2",
            "L1_DoubleMu0er1p4_SQ_OS_dR_Max1p4",
            "L1_DoubleMu_15_7",
        ],
        Year::Y2018 => [
            "L1_DoubleMu4p5_SQ_OS_dR_Max1p2",
            "L1_DoubleMu0er1p4_SQ_OS_dR_Max1p4",
            "L1_DoubleMu_15_7",
        ],
    }
}

/// A seed decision which could not be read for an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("seed \"{name}\" is not in the trigger menu")]
    MissingSeed { name: String },
    #[error("seed \"{name}\" sits at position {index} but only {len} results are stored")]
    ShortResults {
        name: String,
        index: usize,
        len: usize,
    },
}

/// The stored seed decisions of one event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct L1Decision {
    /// Decisions in the order of [`SEEDS_TO_SAVE`].
    pub bits: [bool; 4],
    pub pass_l1: bool,
}

impl L1Decision {
    pub fn bit(&self, name: &str) -> Option<bool> {
        SEEDS_TO_SAVE
            .iter()
            .position(|seed| *seed == name)
            .map(|index| self.bits[index])
    }
}

/// Position of every saved seed in the trigger-name list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerIndex {
    positions: IndexMap<&'static str, usize>,
}

impl TriggerIndex {
    pub fn build(names: &[String]) -> Result<Self, TriggerError> {
        let mut positions = IndexMap::with_capacity(SEEDS_TO_SAVE.len());
        for seed in SEEDS_TO_SAVE {
            let index = names
                .iter()
                .position(|name| name == seed)
                .ok_or_else(|| TriggerError::MissingSeed {
                    name: seed.to_string(),
                })?;
            positions.insert(seed, index);
        }
        Ok(Self { positions })
    }

    pub fn position(&self, seed: &str) -> Option<usize> {
        self.positions.get(seed).copied()
    }

    pub fn decide(&self, results: &[bool], year: Year) -> Result<L1Decision, TriggerError> {
        let or_seeds = seeds_to_or(year);
        let mut decision = L1Decision::default();
        for (slot, (&seed, &index)) in self.positions.iter().enumerate() {
            let bit = *results.get(index).ok_or_else(|| TriggerError::ShortResults {
                name: seed.to_string(),
                index,
                len: results.len(),
            })?;
            decision.bits[slot] = bit;
            if or_seeds.contains(&seed) {
                decision.pass_l1 |= bit;
            }
        }
        Ok(decision)
    }
}

/// The seed-position map, built once from the first event that carries trigger information.
#[derive(Clone, Debug)]
pub struct TriggerCache {
    year: Year,
    index: Option<TriggerIndex>,
    reported_missing: bool,
}

impl TriggerCache {
    pub fn new(year: Year) -> Self {
        Self {
            year,
            index: None,
            reported_missing: false,
        }
    }

    pub fn index(&self) -> Option<&TriggerIndex> {
        self.index.as_ref()
    }

    /// Decisions for one event.
    ///
    /// Events without trigger information get all bits false. When the map cannot be built from
    /// this event's names, the error is returned and the next event tries again.
    pub fn evaluate(&mut self, l1: Option<&L1Bits>) -> Result<L1Decision, TriggerError> {
        let Some(l1) = l1 else {
            if !self.reported_missing {
                warn!("no trigger information in the input, all L1 bits are set to false");
                self.reported_missing = true;
            }
            return Ok(L1Decision::default());
        };
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                let index = TriggerIndex::build(&l1.names)?;
                info!(positions = ?index.positions, "built L1 seed index");
                index
            }
        };
        let decision = index.decide(&l1.results, self.year);
        self.index = Some(index);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu() -> Vec<String> {
        [
            "L1_SingleMu22",
            "L1_DoubleMu_15_7",
            "L1_DoubleMu4_SQ_OS_dR_Max1p2",
            "L1_DoubleMu0er1p4_SQ_OS_dR_Max1p4",
            "L1_DoubleMu4p5_SQ_OS_dR_Max1p2",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect()
    }

    #[test]
    fn test_index_positions() {
        let index = TriggerIndex::build(&menu()).unwrap();
        assert_eq!(index.position("L1_DoubleMu_15_7"), Some(1));
        assert_eq!(index.position("L1_DoubleMu4p5_SQ_OS_dR_Max1p2"), Some(4));
        assert_eq!(index.position("L1_SingleMu22"), None);
    }

    #[test]
    fn test_year_dependent_or() {
        let index = TriggerIndex::build(&menu()).unwrap();
        // only the 4 GeV seed fired
        let results = [false, false, true, false, false];
        let d2017 = index.decide(&results, Year::Y2017).unwrap();
        let d2018 = index.decide(&results, Year::Y2018).unwrap();
        assert!(d2017.pass_l1);
        assert!(!d2018.pass_l1);
        assert_eq!(d2018.bit("L1_DoubleMu4_SQ_OS_dR_Max1p2"), Some(true));
        assert_eq!(d2018.bits, [true, false, false, false]);
    }

    #[test]
    fn test_missing_seed_and_short_results() {
        let mut names = menu();
        names.pop();
        assert_eq!(
            TriggerIndex::build(&names),
            Err(TriggerError::MissingSeed {
                name: "L1_DoubleMu4p5_SQ_OS_dR_Max1p2".to_string()
            })
        );
        let index = TriggerIndex::build(&menu()).unwrap();
        let err = index.decide(&[true, true, true], Year::Y2018).unwrap_err();
        assert!(matches!(err, TriggerError::ShortResults { len: 3, .. }));
    }

    #[test]
    fn test_cache_retries_until_built() {
        let mut cache = TriggerCache::new(Year::Y2018);
        let mut incomplete = menu();
        incomplete.truncate(2);
        let bad = L1Bits {
            names: incomplete,
            results: vec![true, true],
        };
        assert!(cache.evaluate(Some(&bad)).is_err());
        assert!(cache.index().is_none());

        let good = L1Bits {
            names: menu(),
            results: vec![false, true, false, false, false],
        };
        let decision = cache.evaluate(Some(&good)).unwrap();
        assert!(decision.pass_l1);
        assert!(cache.index().is_some());

        // names are not consulted once the index exists
        let later = L1Bits {
            names: Vec::new(),
            results: vec![false, false, false, false, true],
        };
        assert!(cache.evaluate(Some(&later)).unwrap().pass_l1);
    }

    #[test]
    fn test_no_trigger_information() {
        let mut cache = TriggerCache::new(Year::Y2017);
        assert_eq!(cache.evaluate(None).unwrap(), L1Decision::default());
    }
}
