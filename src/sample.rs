//! Deterministic synthetic photometric releases.
//!
//! [`write_release`] lays out a mirror directory readable by
//! [`DirectoryRelease::from_manifest`](crate::DirectoryRelease::from_manifest):
//! a manifest, one light curve per object (alternating parquet and CSV),
//! Gaussian filter curves and a summary table.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;

use crate::error::Result;
use crate::release::{Band, MANIFEST_FILE, ReleaseInfo, ReleaseManifest};

/// Zero point of every synthetic band.
pub const SAMPLE_ZERO_POINT: f64 = 25.0;

/// Shape of a synthetic release.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub survey_name: String,
    pub survey_abbrev: String,
    pub release: String,
    /// Object ids are `<id_prefix><NNN>`.
    pub id_prefix: String,
    pub n_objects: usize,
    pub n_epochs: usize,
    pub seed: u64,
    /// Band name and central wavelength (Å).
    pub bands: Vec<(String, f64)>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            survey_name: "Sample Survey".into(),
            survey_abbrev: "SAMPLE".into(),
            release: "DR1".into(),
            id_prefix: "sn".into(),
            n_objects: 6,
            n_epochs: 20,
            seed: 42,
            bands: vec![("g".into(), 4800.0), ("r".into(), 6200.0), ("i".into(), 7600.0)],
        }
    }
}

impl SampleConfig {
    /// Standardized name of a raw band, e.g. `sample_dr1_g`.
    pub fn band_name(&self, band: &str) -> String {
        format!(
            "{}_{}_{band}",
            self.survey_abbrev.to_lowercase(),
            self.release.to_lowercase()
        )
    }

    pub fn object_id(&self, i: usize) -> String {
        format!("{}{i:03}", self.id_prefix)
    }
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One synthetic target.
struct Target {
    obj_id: String,
    ra: f64,
    dec: f64,
    z: f64,
    time: Vec<f64>,
    band: Vec<String>,
    mag: Vec<f64>,
    mag_err: Vec<f64>,
}

fn simulate_target(config: &SampleConfig, i: usize, rng: &mut SimpleRng) -> Target {
    let t_peak = 20.0 + rng.next_f64() * 20.0;
    let peak_mag = 17.0 + rng.next_f64() * 3.0;
    let mut target = Target {
        obj_id: config.object_id(i),
        ra: rng.next_f64() * 360.0,
        dec: rng.next_f64() * 180.0 - 90.0,
        z: 0.01 + rng.next_f64() * 0.1,
        time: Vec::new(),
        band: Vec::new(),
        mag: Vec::new(),
        mag_err: Vec::new(),
    };

    for epoch in 0..config.n_epochs {
        let time = epoch as f64 * 3.0;
        for (band_idx, (band, _)) in config.bands.iter().enumerate() {
            // Redder bands peak later and fade slower.
            let width = 12.0 + 4.0 * band_idx as f64;
            let brightening = gaussian(time, t_peak + band_idx as f64, width, 2.5);
            let mag_err = 0.02 + rng.next_f64() * 0.03;
            target.time.push(time);
            target.band.push(band.clone());
            target.mag.push(peak_mag + 2.5 - brightening + rng.gauss(0.0, mag_err));
            target.mag_err.push(mag_err);
        }
    }
    target
}

fn write_parquet(path: &Path, target: &Target) -> Result<()> {
    let metadata = HashMap::from([
        ("obj_id".to_string(), target.obj_id.clone()),
        ("ra".to_string(), target.ra.to_string()),
        ("dec".to_string(), target.dec.to_string()),
        ("z".to_string(), target.z.to_string()),
    ]);
    let schema = Arc::new(
        Schema::new(vec![
            Field::new("time", DataType::Float64, false),
            Field::new("band", DataType::Utf8, false),
            Field::new("mag", DataType::Float64, false),
            Field::new("mag_err", DataType::Float64, false),
        ])
        .with_metadata(metadata),
    );

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(target.time.clone())),
            Arc::new(StringArray::from(
                target.band.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(target.mag.clone())),
            Arc::new(Float64Array::from(target.mag_err.clone())),
        ],
    )
    .context("building record batch")?;

    let file = fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_csv(path: &Path, target: &Target) -> Result<()> {
    let header = format!(
        "# obj_id: {}\n# ra: {}\n# dec: {}\n# z: {}\n",
        target.obj_id, target.ra, target.dec, target.z
    );

    let mut writer = csv::Writer::from_writer(header.into_bytes());
    writer
        .write_record(["time", "band", "mag", "mag_err"])
        .context("writing CSV header")?;
    for i in 0..target.time.len() {
        writer
            .write_record([
                target.time[i].to_string(),
                target.band[i].clone(),
                target.mag[i].to_string(),
                target.mag_err[i].to_string(),
            ])
            .context("writing CSV row")?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    fs::write(path, bytes)?;
    Ok(())
}

fn write_filter(path: &Path, center: f64) -> Result<()> {
    let rows: String = (0..200)
        .map(|step| {
            let wave = center - 1000.0 + step as f64 * 10.0;
            format!("{wave:.1} {:.6}\n", gaussian(wave, center, 300.0, 1.0))
        })
        .collect();
    fs::write(path, format!("# wavelength transmission\n{rows}"))?;
    Ok(())
}

/// Write a synthetic release mirror into `dir`; returns the object ids.
pub fn write_release(dir: &Path, config: &SampleConfig) -> Result<Vec<String>> {
    let objects_dir = dir.join("objects");
    let filters_dir = dir.join("filters");
    let tables_dir = dir.join("tables");
    for d in [&objects_dir, &filters_dir, &tables_dir] {
        fs::create_dir_all(d)?;
    }

    let manifest = ReleaseManifest {
        info: ReleaseInfo {
            survey_name: config.survey_name.clone(),
            survey_abbrev: config.survey_abbrev.clone(),
            release: config.release.clone(),
            ..ReleaseInfo::default()
        },
        bands: config
            .bands
            .iter()
            .map(|(band, _)| Band {
                name: config.band_name(band),
                zero_point: SAMPLE_ZERO_POINT,
                filter_file: Some(format!("{band}.dat")),
            })
            .collect(),
    };
    fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;

    for (band, center) in &config.bands {
        write_filter(&filters_dir.join(format!("{band}.dat")), *center)?;
    }

    let mut rng = SimpleRng::new(config.seed);
    let mut summary = csv::Writer::from_writer(Vec::new());
    summary
        .write_record(["obj_id", "ra", "dec", "z"])
        .context("writing summary header")?;

    let mut ids = Vec::with_capacity(config.n_objects);
    for i in 0..config.n_objects {
        let target = simulate_target(config, i, &mut rng);
        if i % 2 == 0 {
            write_parquet(&objects_dir.join(format!("{}.parquet", target.obj_id)), &target)?;
        } else {
            write_csv(&objects_dir.join(format!("{}.csv", target.obj_id)), &target)?;
        }
        summary
            .write_record([
                target.obj_id.clone(),
                target.ra.to_string(),
                target.dec.to_string(),
                target.z.to_string(),
            ])
            .context("writing summary row")?;
        ids.push(target.obj_id);
    }

    let summary = summary.into_inner().map_err(|e| e.into_error())?;
    fs::write(tables_dir.join("table1.csv"), summary)?;
    fs::write(
        tables_dir.join("descriptions.json"),
        r#"{"1": "Coordinates and redshifts of the sample targets"}"#,
    )?;

    info!(
        "wrote {} objects ({} epochs × {} bands) to {}",
        ids.len(),
        config.n_epochs,
        config.bands.len(),
        dir.display()
    );
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_is_deterministic() {
        let mut a = SimpleRng::new(7);
        let mut b = SimpleRng::new(7);
        for _ in 0..10 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let x = a.next_f64();
        assert!((0.0..1.0).contains(&x));
    }

    #[test]
    fn names_follow_release() {
        let config = SampleConfig::default();
        assert_eq!(config.band_name("g"), "sample_dr1_g");
        assert_eq!(config.object_id(4), "sn004");
    }

    #[test]
    fn writes_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = SampleConfig {
            n_objects: 3,
            n_epochs: 4,
            ..SampleConfig::default()
        };
        let ids = write_release(dir.path(), &config).unwrap();

        assert_eq!(ids, vec!["sn000", "sn001", "sn002"]);
        assert!(dir.path().join(MANIFEST_FILE).exists());
        assert!(dir.path().join("objects/sn000.parquet").exists());
        assert!(dir.path().join("objects/sn001.csv").exists());
        assert!(dir.path().join("filters/r.dat").exists());
        assert!(dir.path().join("tables/table1.csv").exists());
    }

    #[test]
    fn csv_header_and_filter_curves_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = SampleConfig {
            n_objects: 2,
            n_epochs: 3,
            ..SampleConfig::default()
        };
        write_release(dir.path(), &config).unwrap();

        let table = crate::data::loader::load_file(&dir.path().join("objects/sn001.csv")).unwrap();
        assert_eq!(table.obj_id(), Some("sn001"));
        assert!(table.meta["z"].as_f64().is_some());
        assert!(table.meta["ra"].as_f64().is_some());
        assert_eq!(table.len(), 3 * config.bands.len());

        let curve = fs::read_to_string(dir.path().join("filters/g.dat")).unwrap();
        assert!(curve.starts_with("# wavelength transmission\n"));
        assert_eq!(curve.lines().count(), 201);
    }
}
