use cap_hist::{AccumulatorGroup, GroupState, Histogram};

fn sample_group() -> AccumulatorGroup {
    let mut group = AccumulatorGroup::new("Analyzer");
    group
        .book(Histogram::new_1d("Analyzer_All_pt", 0, 4, 0.0, 4.0).unwrap())
        .unwrap();
    group
        .book(Histogram::new_1d("Analyzer_HighMult_pt", 1, 4, 0.0, 4.0).unwrap())
        .unwrap();
    group
}

#[test]
fn first_fill_starts_accumulating() {
    let mut group = sample_group();
    assert_eq!(group.state(), GroupState::Empty);
    group.fill("Analyzer_All_pt", &[0.5], 1.0).unwrap();
    assert_eq!(group.state(), GroupState::Accumulating);
    group.fill("Analyzer_All_pt", &[0.7], 2.0).unwrap();
    let h = group.get("Analyzer_All_pt").unwrap();
    assert_eq!(h.bin_content(1), 3.0);
    assert_eq!(h.entries(), 2);
}

#[test]
fn scaling_divides_by_category_count() {
    let mut group = sample_group();
    group.fill("Analyzer_All_pt", &[1.5], 10.0).unwrap();
    group.fill("Analyzer_HighMult_pt", &[1.5], 10.0).unwrap();
    let skipped = group.scale_by_category(&[5, 2]);
    assert!(skipped.is_empty());
    assert_eq!(group.state(), GroupState::Scaled);
    assert_eq!(group.get("Analyzer_All_pt").unwrap().bin_content(2), 2.0);
    assert_eq!(group.get("Analyzer_HighMult_pt").unwrap().bin_content(2), 5.0);
}

#[test]
fn scaling_twice_double_scales() {
    let mut group = sample_group();
    group.fill("Analyzer_All_pt", &[0.1], 8.0).unwrap();
    group.scale_by_category(&[2, 1]);
    group.scale_by_category(&[2, 1]);
    assert_eq!(group.get("Analyzer_All_pt").unwrap().bin_content(1), 2.0);
}

#[test]
fn zero_count_categories_are_left_alone() {
    let mut group = sample_group();
    group.fill("Analyzer_HighMult_pt", &[0.1], 3.0).unwrap();
    let skipped = group.scale_by_category(&[4, 0]);
    assert_eq!(skipped, vec![1]);
    assert_eq!(group.get("Analyzer_HighMult_pt").unwrap().bin_content(1), 3.0);
}

#[test]
fn scaled_groups_reject_fills() {
    let mut group = sample_group();
    group.fill("Analyzer_All_pt", &[0.1], 1.0).unwrap();
    group.scale(0.5);
    let err = group.fill("Analyzer_All_pt", &[0.1], 1.0).unwrap_err();
    assert_eq!(err.info().code, "fill-after-scale");
}

#[test]
fn persisted_groups_keep_accumulating() {
    let mut group = sample_group();
    group.fill("Analyzer_All_pt", &[0.1], 1.0).unwrap();
    group.mark_persisted();
    group.fill("Analyzer_All_pt", &[0.1], 1.0).unwrap();
    assert_eq!(group.state(), GroupState::Accumulating);
    assert_eq!(group.get("Analyzer_All_pt").unwrap().bin_content(1), 2.0);
}

#[test]
fn reset_zeroes_bins_and_returns_to_empty() {
    let mut group = sample_group();
    group.fill("Analyzer_All_pt", &[3.9], 4.0).unwrap();
    group.scale(2.0);
    group.reset();
    assert_eq!(group.state(), GroupState::Empty);
    assert!(group.histograms().all(|h| h.integral() == 0.0 && h.entries() == 0));
    group.fill("Analyzer_All_pt", &[3.9], 1.0).unwrap();
}

#[test]
fn duplicates_and_unknown_names_are_errors() {
    let mut group = sample_group();
    let dup = Histogram::new_1d("Analyzer_All_pt", 0, 2, 0.0, 1.0).unwrap();
    assert_eq!(group.book(dup).unwrap_err().info().code, "histogram-duplicate");
    let err = group.fill("nope", &[0.0], 1.0).unwrap_err();
    assert_eq!(err.info().code, "histogram-missing");
}
