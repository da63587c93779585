//! End-to-end tests over `.npy` fixtures on disk.

use std::sync::Arc;

use sequence_loader::{
    split_train_val_test, ConventionPolicy, DatasetConfig, GridConvention, LoaderConfig,
    LoaderError, SampleLoader, SequenceDataset, SplitFractions, StaticMaskProvider,
    WindowedDataset,
};
use test_utils::{decode_value, encoded_value, grid, PairedFixture};

const CHANNELS: usize = 3;

fn fixture(files: usize) -> PairedFixture {
    PairedFixture::write(files, CHANNELS, grid::WRF_NARROW, CHANNELS, grid::ERA).unwrap()
}

fn config(fixture: &PairedFixture) -> DatasetConfig {
    DatasetConfig {
        mask_path: fixture.mask_path.clone(),
        ..Default::default()
    }
}

fn dataset(fixture: &PairedFixture) -> WindowedDataset {
    WindowedDataset::builder()
        .config(config(fixture))
        .input_files(fixture.wrf_files.clone())
        .target_files(fixture.era_files.clone())
        .build()
        .unwrap()
}

/// `(file, time step)` of every step in a target sequence, read from channel 0.
fn target_steps(sample: &sequence_loader::Sample) -> Vec<(usize, usize)> {
    (0..sample.seq_len())
        .map(|i| {
            let (file, t, _, _) = decode_value(sample.target[[i, 0, 0, 0]]);
            (file, t)
        })
        .collect()
}

#[test]
fn test_single_file_last_window() {
    let fixture = fixture(1);
    let dataset = dataset(&fixture);
    assert_eq!(dataset.len(), 20);

    let sample = dataset.get(19).unwrap();
    assert_eq!(sample.input.dim(), (4, CHANNELS + 1, 210, 8));
    assert_eq!(sample.target.dim(), (4, CHANNELS + 1, 67, 215));
    assert_eq!(target_steps(&sample), vec![(0, 19), (0, 20), (0, 21), (0, 22)]);

    assert!(matches!(
        dataset.get(20),
        Err(LoaderError::IndexOutOfRange { index: 20, len: 20 })
    ));
}

#[test]
fn test_window_spans_two_files() {
    let fixture = fixture(2);
    let dataset = dataset(&fixture);
    assert_eq!(dataset.len(), 44);

    let sample = dataset.get(22).unwrap();
    assert_eq!(target_steps(&sample), vec![(0, 22), (0, 23), (1, 0), (1, 1)]);

    // The input source stitches the same steps, rows mirrored.
    assert_eq!(sample.input[[2, 1, 0, 0]], encoded_value(1, 0, 1, 209));
    assert_eq!(sample.input[[1, 2, 209, 5]], encoded_value(0, 23, 2, 0));
}

#[test]
fn test_every_sample_has_seq_len_steps() {
    let fixture = fixture(2);
    let dataset = dataset(&fixture);
    for i in (0..dataset.len()).step_by(5) {
        let sample = dataset.get(i).unwrap();
        assert_eq!(sample.input.shape()[0], 4);
        assert_eq!(sample.target.shape()[0], 4);
    }
}

#[test]
fn test_mask_channels_follow_grid_convention() {
    let fixture = fixture(1);
    let dataset = dataset(&fixture);
    let sample = dataset.get(0).unwrap();

    // Input grid has 210 rows: the land mask (1.0 on even rows) is stacked in,
    // then mirrored with the rest of the sequence.
    for h in 0..210 {
        let expected = if (209 - h) % 2 == 0 { 1.0 } else { 0.0 };
        assert_eq!(sample.input[[0, CHANNELS, h, 3]], expected, "row {}", h);
    }

    // Target grid is 67x215: a zero plane.
    assert!(sample
        .target
        .slice(ndarray::s![.., CHANNELS, .., ..])
        .iter()
        .all(|&v| v == 0.0));
}

#[test]
fn test_input_is_mirrored_target_is_not() {
    let fixture = fixture(1);
    let dataset = dataset(&fixture);
    let sample = dataset.get(7).unwrap();
    let raw = dataset.assemble_input_raw(7).unwrap();

    assert_eq!(sample.input, raw.slice(ndarray::s![.., .., ..;-1, ..]));
    for h in [0, 33, 66] {
        let (_, t, c, row) = decode_value(sample.target[[0, 1, h, 100]]);
        assert_eq!((t, c, row), (7, 1, h));
    }
}

#[test]
fn test_length_grows_with_files() {
    let fixture = fixture(4);
    let mut previous = 0;
    for n in 1..=4 {
        let dataset = WindowedDataset::builder()
            .config(config(&fixture))
            .input_files(fixture.wrf_files[..n].to_vec())
            .target_files(fixture.era_files[..n].to_vec())
            .build()
            .unwrap();
        assert_eq!(dataset.len(), n * 24 - 4);
        assert!(dataset.len() >= previous);
        previous = dataset.len();
    }
}

#[test]
fn test_mismatched_file_counts_rejected() {
    let fixture = fixture(2);
    let err = WindowedDataset::builder()
        .config(config(&fixture))
        .input_files(fixture.wrf_files.clone())
        .target_files(fixture.era_files[..1].to_vec())
        .build()
        .unwrap_err();
    assert!(matches!(err, LoaderError::Config(_)));
}

#[test]
fn test_spatiotemporal_variables_need_matching_stack() {
    let fixture = fixture(1);
    let dataset = WindowedDataset::builder()
        .config(DatasetConfig {
            use_spatiotemporal_encoding: true,
            ..config(&fixture)
        })
        .input_files(fixture.wrf_files.clone())
        .target_files(fixture.era_files.clone())
        .build()
        .unwrap();
    assert_eq!(dataset.input_variables().len(), 6);
    assert!(matches!(dataset.get(0), Err(LoaderError::Extraction { .. })));
}

#[test]
fn test_declared_convention_with_wrong_grid() {
    let fixture = fixture(1);
    let dataset = WindowedDataset::builder()
        .config(DatasetConfig {
            era_convention: ConventionPolicy::Declared(GridConvention::Wrf),
            ..config(&fixture)
        })
        .input_files(fixture.wrf_files.clone())
        .target_files(fixture.era_files.clone())
        .build()
        .unwrap();
    assert!(matches!(
        dataset.get(0),
        Err(LoaderError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_concurrent_gets_load_mask_once() {
    let fixture = fixture(2);
    let masks = Arc::new(StaticMaskProvider::from_npy(&fixture.mask_path));
    let dataset = WindowedDataset::builder()
        .config(config(&fixture))
        .input_files(fixture.wrf_files.clone())
        .target_files(fixture.era_files.clone())
        .masks(masks.clone())
        .build()
        .unwrap();
    assert!(!masks.is_loaded());

    let indices = [0usize, 5, 21, 22, 23, 30, 43];
    let expected: Vec<_> = indices.iter().map(|&i| dataset.get(i).unwrap()).collect();
    let reloads_before = masks.load_count();

    std::thread::scope(|scope| {
        let handles: Vec<_> = indices
            .iter()
            .map(|&i| {
                let dataset = &dataset;
                scope.spawn(move || dataset.get(i).unwrap())
            })
            .collect();
        for (handle, want) in handles.into_iter().zip(&expected) {
            let got = handle.join().unwrap();
            assert_eq!(got.input, want.input);
            assert_eq!(got.target, want.target);
        }
    });

    assert_eq!(reloads_before, 1);
    assert_eq!(masks.load_count(), 1);
}

#[test]
fn test_split_and_batch_end_to_end() {
    let fixture = fixture(4);
    let split = split_train_val_test(
        fixture.wrf_dir(),
        fixture.era_dir(),
        "*.npy",
        SplitFractions::new(0.5, 0.25, 0.25),
    )
    .unwrap();
    assert_eq!(split.train.len(), 2);
    assert_eq!(split.val.len(), 1);
    assert_eq!(split.test.len(), 1);

    let dataset = WindowedDataset::builder()
        .config(config(&fixture))
        .input_files(split.train.wrf)
        .target_files(split.train.era)
        .build()
        .unwrap();
    assert_eq!(dataset.len(), 44);

    let mut loader = SampleLoader::new(
        Arc::new(dataset),
        LoaderConfig::new().batch_size(8).seed(3).workers(2),
    )
    .unwrap();

    let mut seen = Vec::new();
    for batch in loader.epoch() {
        let batch = batch.unwrap();
        assert_eq!(batch.inputs.shape()[1..], [4, CHANNELS + 1, 210, 8]);
        assert_eq!(batch.targets.shape()[1..], [4, CHANNELS + 1, 67, 215]);
        seen.extend(batch.indices);
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..44).collect::<Vec<_>>());
}
