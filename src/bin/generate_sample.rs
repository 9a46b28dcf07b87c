//! Write a synthetic release mirror for trying out the data access API.

use std::path::PathBuf;

use clap::Parser;
use sndata::sample::{SampleConfig, write_release};

#[derive(Debug, Parser)]
#[command(name = "generate_sample", about = "Write a synthetic supernova release mirror")]
struct Cli {
    /// Directory to write the mirror into.
    #[arg(default_value = "sample_release")]
    out_dir: PathBuf,

    /// Survey abbreviation, e.g. CSP.
    #[arg(default_value = "SAMPLE")]
    survey: String,

    #[arg(default_value = "DR1")]
    release: String,

    #[arg(long, default_value_t = 6)]
    n_objects: usize,

    /// Epochs per object; every epoch is observed in each band.
    #[arg(long, default_value_t = 20)]
    n_epochs: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Object ids are `<ID_PREFIX><NNN>`.
    #[arg(long, default_value = "sn")]
    id_prefix: String,
}

impl Cli {
    fn sample_config(&self) -> SampleConfig {
        SampleConfig {
            survey_abbrev: self.survey.clone(),
            release: self.release.clone(),
            id_prefix: self.id_prefix.clone(),
            n_objects: self.n_objects,
            n_epochs: self.n_epochs,
            seed: self.seed,
            ..SampleConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.sample_config();
    let ids = write_release(&cli.out_dir, &config)?;

    println!(
        "Wrote {} {} {} objects ({} bands each) to {}",
        ids.len(),
        config.survey_abbrev,
        config.release,
        config.bands.len(),
        cli.out_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_arguments_default() {
        let cli = Cli::try_parse_from(["generate_sample"]).unwrap();
        assert_eq!(cli.out_dir, PathBuf::from("sample_release"));
        assert_eq!((cli.survey.as_str(), cli.release.as_str()), ("SAMPLE", "DR1"));

        let config = cli.sample_config();
        let defaults = SampleConfig::default();
        assert_eq!(config.n_objects, defaults.n_objects);
        assert_eq!(config.n_epochs, defaults.n_epochs);
        assert_eq!(config.seed, defaults.seed);
    }

    #[test]
    fn arguments_reach_sample_config() {
        let cli = Cli::try_parse_from([
            "generate_sample", "out", "CSP", "DR3", "--n-objects", "3", "--seed", "7", "--id-prefix", "csp",
        ])
        .unwrap();
        let config = cli.sample_config();
        assert_eq!(cli.out_dir, PathBuf::from("out"));
        assert_eq!(config.survey_abbrev, "CSP");
        assert_eq!(config.release, "DR3");
        assert_eq!(config.n_objects, 3);
        assert_eq!(config.seed, 7);
        assert_eq!(config.object_id(0), "csp000");
    }
}
