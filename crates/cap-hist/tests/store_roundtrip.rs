use std::fs;

use proptest::prelude::*;

use cap_hist::{
    output_file, partial_file, partial_index_of, AccumulatorGroup, Histogram, JsonFileStore,
    KeyValueStore, MemoryStore, OpenMode, PartialSaveRecord, Tally,
};

fn filled_group() -> AccumulatorGroup {
    let mut group = AccumulatorGroup::new("Spectra");
    group
        .book(Histogram::new_1d("Spectra_All_pt", 0, 5, 0.0, 5.0).unwrap())
        .unwrap();
    group
        .book(Histogram::new_1d("Spectra_Pos_pt", 1, 3, 0.0, 3.0).unwrap())
        .unwrap();
    for (i, x) in [0.5, 1.5, 1.7, 4.2, 9.0].iter().enumerate() {
        group.fill("Spectra_All_pt", &[*x], 1.0 + i as f64).unwrap();
    }
    group.fill("Spectra_Pos_pt", &[2.5], 0.25).unwrap();
    group
}

fn tally() -> Tally {
    Tally {
        processed: 120,
        accepted: 97,
        accepted_by_category: vec![97, 41],
    }
}

fn roundtrip(store: &dyn KeyValueStore, path: &std::path::Path) {
    let record = PartialSaveRecord {
        index: 3,
        tally: tally(),
        group: filled_group(),
    };
    record.save(store, path).unwrap();
    let loaded = PartialSaveRecord::load(store, path, "Spectra").unwrap();

    assert_eq!(loaded.index, 3);
    assert_eq!(loaded.tally, tally());
    let original: Vec<_> = record.group.histograms().collect();
    let restored: Vec<_> = loaded.group.histograms().collect();
    assert_eq!(original, restored);
}

#[test]
fn json_file_store_roundtrip_is_bin_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = partial_file(dir.path(), "Spectra", 3);
    roundtrip(&JsonFileStore::new(), &path);
    assert!(JsonFileStore::new().exists(&path));
}

#[test]
fn memory_store_roundtrip_is_bin_identical() {
    let store = MemoryStore::new();
    let path = std::path::PathBuf::from("mem/Spectra.json");
    roundtrip(&store, &path);
    assert_eq!(store.paths(), vec![path]);
}

#[test]
fn reading_a_missing_document_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = JsonFileStore::new()
        .open(&dir.path().join("absent.json"), OpenMode::Read)
        .err()
        .unwrap();
    assert_eq!(err.info().code, "store-open");
    assert!(MemoryStore::new()
        .open(&dir.path().join("absent.json"), OpenMode::Read)
        .is_err());
}

#[test]
fn tampered_documents_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = output_file(dir.path(), "Spectra");
    let store = JsonFileStore::new();
    let mut handle = store.open(&path, OpenMode::Create).unwrap();
    handle.write_scalar("EventProcessed", 10).unwrap();
    handle.close().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("10", "11")).unwrap();
    let err = store.open(&path, OpenMode::Read).err().unwrap();
    assert_eq!(err.info().code, "store-digest");
}

#[test]
fn create_if_absent_keeps_existing_content() {
    let store = MemoryStore::new();
    let path = std::path::PathBuf::from("run/out.json");
    let mut handle = store.open(&path, OpenMode::CreateIfAbsent).unwrap();
    handle.write_scalar("a", 1).unwrap();
    handle.close().unwrap();

    let mut handle = store.open(&path, OpenMode::CreateIfAbsent).unwrap();
    handle.write_scalar("b", 2).unwrap();
    handle.close().unwrap();
    let handle = store.open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.read_scalar("a").unwrap(), 1);
    assert_eq!(handle.read_scalar("b").unwrap(), 2);

    let handle = store.open(&path, OpenMode::Create).unwrap();
    handle.close().unwrap();
    let handle = store.open(&path, OpenMode::Read).unwrap();
    assert!(handle.read_scalar("a").is_err());
}

#[test]
fn read_only_handles_refuse_writes() {
    let store = MemoryStore::new();
    let path = std::path::PathBuf::from("ro.json");
    store.open(&path, OpenMode::Create).unwrap().close().unwrap();
    let mut handle = store.open(&path, OpenMode::Read).unwrap();
    let err = handle.write_scalar("x", 1).unwrap_err();
    assert_eq!(err.info().code, "store-read-only");
}

#[test]
fn partial_file_names_parse_back() {
    let path = partial_file(std::path::Path::new("/out"), "Spectra", 12);
    let name = path.file_name().unwrap().to_str().unwrap();
    assert_eq!(name, "Spectra_Part012.json");
    assert_eq!(partial_index_of(name, "Spectra"), Some(12));
    assert_eq!(partial_index_of("Spectra.json", "Spectra"), None);
    assert_eq!(partial_index_of("Other_Part001.json", "Spectra"), None);
}

fn save_and_reload(group: &AccumulatorGroup, accepted: &[u64]) -> Result<AccumulatorGroup, String> {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = output_file(dir.path(), "Spectra");
    let counts: Vec<i64> = accepted.iter().map(|count| *count as i64).collect();
    let record = PartialSaveRecord {
        index: 0,
        tally: Tally {
            processed: counts.iter().sum(),
            accepted: counts.first().copied().unwrap_or(0),
            accepted_by_category: counts,
        },
        group: group.clone(),
    };
    let store = JsonFileStore::new();
    record.save(&store, &path).map_err(|err| err.to_string())?;
    PartialSaveRecord::load(&store, &path, group.name())
        .map(|loaded| loaded.group)
        .map_err(|err| err.to_string())
}

#[test]
fn scaled_groups_with_non_dyadic_bins_reload_exactly() {
    for n in 0..60u64 {
        let mut group = AccumulatorGroup::new("Spectra");
        group
            .book(Histogram::new_1d("Spectra_All_pt", 0, 6, 0.0, 6.0).unwrap())
            .unwrap();
        for i in 0..8 {
            let weight = (i + 1) as f64 * 0.37;
            group.fill("Spectra_All_pt", &[i as f64 * 0.8], weight).unwrap();
        }
        let accepted = [7 * n + 3];
        group.scale_by_category(&accepted);

        let reloaded = save_and_reload(&group, &accepted).unwrap();
        assert_eq!(
            reloaded.histograms().collect::<Vec<_>>(),
            group.histograms().collect::<Vec<_>>(),
            "accepted = {}",
            accepted[0]
        );
    }
}

#[test]
fn non_finite_weights_are_not_written() {
    let mut group = AccumulatorGroup::new("Spectra");
    group
        .book(Histogram::new_1d("Spectra_All_pt", 0, 3, 0.0, 3.0).unwrap())
        .unwrap();
    group.fill("Spectra_All_pt", &[1.0], f64::INFINITY).unwrap();

    let store = MemoryStore::new();
    let mut handle = store
        .open(std::path::Path::new("bad.json"), OpenMode::Create)
        .unwrap();
    let err = handle.write_group(&group).unwrap_err();
    assert_eq!(err.info().code, "store-non-finite");
}

#[test]
fn inconsistent_histogram_documents_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = output_file(dir.path(), "Spectra");
    let store = JsonFileStore::new();
    let mut handle = store.open(&path, OpenMode::Create).unwrap();
    handle.write_group(&filled_group()).unwrap();
    handle.close().unwrap();

    let mut document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let weights = document["groups"]["Spectra"]["histograms"]["Spectra_All_pt"]["sum_w"]
        .as_array_mut()
        .unwrap();
    weights.pop();
    fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

    let err = store.open(&path, OpenMode::Read).err().unwrap();
    assert_eq!(err.info().code, "json_deserialize");
    assert!(err.info().message.contains("histogram-layout"));
}

fn finite_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        proptest::num::f64::NORMAL,
        proptest::num::f64::SUBNORMAL,
        Just(0.0),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn json_file_store_preserves_arbitrary_finite_bins(
        cells in proptest::collection::vec((finite_value(), 0.0f64..1e150), 7),
        accepted in proptest::collection::vec(1u64..1_000_000, 2),
    ) {
        let mut all = Histogram::new_1d("Spectra_All_pt", 0, 5, 0.0, 5.0).unwrap();
        let mut positive = Histogram::new_1d("Spectra_Pos_pt", 1, 5, 0.0, 5.0).unwrap();
        for (cell, (value, error)) in cells.iter().enumerate() {
            all.set_cell(cell, *value, *error);
            positive.set_cell(cell, -*value / 3.0, *error * 0.37);
        }
        let mut group = AccumulatorGroup::new("Spectra");
        group.book(all).unwrap();
        group.book(positive).unwrap();
        group.scale_by_category(&accepted);

        let reloaded = save_and_reload(&group, &accepted);
        prop_assert!(reloaded.is_ok(), "{:?}", reloaded);
        let reloaded = reloaded.unwrap();
        prop_assert_eq!(
            reloaded.histograms().collect::<Vec<_>>(),
            group.histograms().collect::<Vec<_>>()
        );
    }
}
