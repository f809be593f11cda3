use std::path::PathBuf;

use babymaker_core::{data::split_input_names, BabyResult, LooperOptions, Year};
use clap::Parser;

fn parse_year(value: &str) -> Result<Year, String> {
    value.parse::<Year>().map_err(|err| err.to_string())
}

/// Values of `-1` (or anything non-positive) disable the limit.
fn positive(value: i64) -> Option<usize> {
    (value > 0).then_some(value as usize)
}

/// Reduce CMS scouting trees to displaced-dimuon baby ntuples.
#[derive(Parser, Debug)]
#[command(name = "babymaker", version, about)]
pub struct Cli {
    /// Input file(s); comma-separated lists are split and quoted wildcards expanded.
    #[arg(value_name = "FILE")]
    pub fnames: Vec<String>,

    /// Output file name; a `.parquet` extension writes Parquet, anything else ROOT.
    #[arg(short, long, default_value = "output.root")]
    pub output: String,

    /// Maximum number of events to process (-1 = all).
    #[arg(short = 'n', long, default_value_t = -1, allow_negative_numbers = true)]
    pub nevents: i64,

    /// Expected number of events (-1 = unchecked).
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub expected: i64,

    /// Data-taking year, overridden by Run2017/Run2018 in the first input name.
    #[arg(short, long, default_value = "2018", value_parser = parse_year)]
    pub year: Year,

    /// Input tree name.
    #[arg(long, default_value = "Events")]
    pub tree: String,

    /// Directory holding the beamspot and pixel tables.
    #[arg(long, value_name = "DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Rows per Parquet record batch.
    #[arg(long, default_value_t = 10_000)]
    pub batch_size: usize,

    /// Log filter, e.g. `info` or `babymaker_core=debug`. `BABYMAKER_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn looper_options(&self) -> BabyResult<LooperOptions> {
        Ok(LooperOptions::new()
            .inputs(split_input_names(&self.fnames)?)
            .output(self.output.as_str())
            .tree(self.tree.as_str())
            .max_events(positive(self.nevents))
            .expected(positive(self.expected))
            .year(self.year)
            .data_dir(&self.data_dir)
            .batch_size(self.batch_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_job_wrappers() {
        let cli = Cli::parse_from(["babymaker", "a.root,b.root", "c.root"]);
        let options = cli.looper_options().unwrap();
        assert_eq!(options.inputs, vec!["a.root", "b.root", "c.root"]);
        assert_eq!(options.output, "output.root");
        assert_eq!(options.max_events, None);
        assert_eq!(options.expected, None);
        assert_eq!(options.year, Year::Y2018);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "babymaker", "in.root", "-o", "out.parquet", "-n", "100", "-e", "-1", "-y", "2017",
        ]);
        let options = cli.looper_options().unwrap();
        assert_eq!(options.output, "out.parquet");
        assert_eq!(options.max_events, Some(100));
        assert_eq!(options.expected, None);
        assert_eq!(options.year, Year::Y2017);
    }

    #[test]
    fn test_bad_year() {
        assert!(Cli::try_parse_from(["babymaker", "-y", "2016"]).is_err());
    }
}
