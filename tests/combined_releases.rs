use std::path::Path;
use std::rc::Rc;

use sndata::sample::{SAMPLE_ZERO_POINT, SampleConfig, write_release};
use sndata::{
    CombinedDataset, Config, DataRelease, DirectoryRelease, IterOptions, MetaFilter,
    MetadataValue, OBJ_ID_KEY, ObjectId, SnDataError, non_empty,
};

const N_OBJECTS: usize = 4;
const N_EPOCHS: usize = 5;

fn sample(survey: &str, release: &str, prefix: &str, seed: u64) -> SampleConfig {
    SampleConfig {
        survey_abbrev: survey.into(),
        release: release.into(),
        id_prefix: prefix.into(),
        n_objects: N_OBJECTS,
        n_epochs: N_EPOCHS,
        seed,
        ..SampleConfig::default()
    }
}

/// Two synthetic release mirrors plus a combined dataset reading them into
/// `<root>/data`. Nothing is downloaded yet.
fn combined(root: &Path) -> CombinedDataset {
    let config = Config::new(root.join("data"));
    let mut releases: Vec<Rc<dyn DataRelease>> = Vec::new();
    for cfg in [sample("CSP", "DR3", "sn", 1), sample("DES", "SN3YR", "des", 2)] {
        let mirror = root.join(format!("mirror_{}", cfg.survey_abbrev));
        write_release(&mirror, &cfg).unwrap();
        releases.push(Rc::new(DirectoryRelease::from_manifest(&mirror, &config).unwrap()));
    }
    CombinedDataset::new(releases).unwrap()
}

fn csp(local_id: &str) -> ObjectId {
    ObjectId::new(local_id, "DR3", "CSP")
}

fn des(local_id: &str) -> ObjectId {
    ObjectId::new(local_id, "SN3YR", "DES")
}

#[test]
fn nothing_is_read_before_download() {
    let tmp = tempfile::tempdir().unwrap();
    let combined = combined(tmp.path());

    assert!(combined.get_available_ids().unwrap_err().is_not_downloaded());
    match combined.register_filters(false).unwrap_err() {
        SnDataError::NoDownloadedData(msg) => assert!(msg.contains("CSP DR3"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lists_ids_of_every_release() {
    let tmp = tempfile::tempdir().unwrap();
    let combined = combined(tmp.path());
    combined.download_module_data(false).unwrap();

    let ids = combined.get_available_ids().unwrap();
    assert_eq!(ids.len(), 2 * N_OBJECTS);
    assert_eq!(ids[0], des("des000"));
    assert_eq!(ids[N_OBJECTS], csp("sn000"));
    assert_eq!(combined.resolve_id("sn002").unwrap(), csp("sn002"));
}

#[test]
fn serves_parquet_and_csv_objects() {
    let tmp = tempfile::tempdir().unwrap();
    let combined = combined(tmp.path());
    combined.download_module_data(false).unwrap();

    for id in [csp("sn000"), csp("sn001")] {
        let table = combined.get_data_for_id(&id, true).unwrap();
        assert_eq!(table.len(), N_EPOCHS * 3);
        assert_eq!(table.obj_id(), Some(id.local_id.as_str()));
        assert!(table.meta["z"].as_f64().is_some());
        assert_eq!(table.value(0, "band").as_str(), Some("csp_dr3_g"));
        assert_eq!(table.value(0, "zp").as_f64(), Some(SAMPLE_ZERO_POINT));
        assert!(table.value(0, "flux").as_f64().unwrap() > 0.0);
    }
}

#[test]
fn unknown_id_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let combined = combined(tmp.path());
    combined.download_module_data(false).unwrap();

    let err = combined.get_data_for_id(&csp("no_such_id"), true).unwrap_err();
    assert!(matches!(err, SnDataError::InvalidObjId(_)));
}

#[test]
fn join_and_separate_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let mut combined = combined(tmp.path());
    combined.download_module_data(false).unwrap();

    let a = csp("sn000");
    let b = des("des001");
    let a_data = combined.get_data_for_id(&a, true).unwrap();
    let b_data = combined.get_data_for_id(&b, true).unwrap();

    combined.join_ids([a.clone(), b.clone()]).unwrap();
    let joined = combined.get_data_for_id(&a, true).unwrap();
    assert_eq!(joined, combined.get_data_for_id(&b, true).unwrap());

    // "des001" sorts before "sn000", so the DES record is the base.
    let mut expected_rows = b_data.rows.clone();
    expected_rows.extend(a_data.rows.iter().cloned());
    assert_eq!(joined.rows, expected_rows);
    assert_eq!(
        joined.meta[OBJ_ID_KEY],
        MetadataValue::List(vec![b.clone().into(), a.clone().into()])
    );
    let a_meta = joined.meta[&a.to_string()].as_map().unwrap();
    assert_eq!(a_meta["z"], a_data.meta["z"]);
    assert!(!a_meta.contains_key(OBJ_ID_KEY));

    combined.separate_ids([a.clone(), b.clone()]).unwrap();
    assert!(combined.get_joined_ids().is_empty());
    assert_eq!(combined.get_data_for_id(&a, true).unwrap(), a_data);
    assert_eq!(combined.get_data_for_id(&b, true).unwrap(), b_data);
}

#[test]
fn iter_data_honours_filters() {
    let tmp = tempfile::tempdir().unwrap();
    let combined = combined(tmp.path());
    combined.download_module_data(false).unwrap();

    let none = combined.iter_data(IterOptions::default().filter(|_| false));
    assert_eq!(none.count(), 0);

    let all: Vec<_> = combined
        .iter_data(IterOptions::default().filter(non_empty))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(all.len(), 2 * N_OBJECTS);

    let des_only = combined.iter_data(IterOptions::default().survey("DES").format_table(false));
    assert_eq!(des_only.count(), N_OBJECTS);

    let one = MetaFilter::new().select(OBJ_ID_KEY, "sn003");
    let mut options = IterOptions::default();
    options.filter = Some(one.into_fn());
    let picked: Vec<_> = combined.iter_data(options).map(Result::unwrap).collect();
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].obj_id(), Some("sn003"));
}

#[test]
fn photometric_metadata_and_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let combined = combined(tmp.path());
    combined.download_module_data(false).unwrap();
    combined.register_filters(false).unwrap();

    let bands = combined.band_names().unwrap();
    assert_eq!(bands.len(), 6);
    assert!(bands.contains(&"des_sn3yr_r".to_string()));
    assert!(combined
        .zero_point()
        .unwrap()
        .iter()
        .all(|zp| *zp == SAMPLE_ZERO_POINT));

    let tables = combined.get_available_tables().unwrap();
    assert_eq!(tables.len(), 2);
    let (survey, release, table_id) = &tables[0];
    let summary = combined.load_table(survey, release, table_id).unwrap();
    assert_eq!(summary.len(), N_OBJECTS);
    assert!(summary.meta.contains_key("description"));
}

#[test]
fn delete_removes_local_data() {
    let tmp = tempfile::tempdir().unwrap();
    let combined = combined(tmp.path());
    combined.download_module_data(false).unwrap();
    combined.delete_module_data().unwrap();

    assert!(!tmp.path().join("data/csp/dr3").exists());
    let err = combined.get_data_for_id(&csp("sn000"), true).unwrap_err();
    assert!(err.is_not_downloaded());
}
