use std::fs;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use trip_import::{
    emit::{
        duplicates::{CsvDuplicateSink, MemoryDuplicateSink},
        MemoryLoader,
    },
    error::PipelineError,
    pipeline::{ImportStats, TripImportPipeline},
    source::delimited::DelimitedFileSource,
    types::StoreAndForward,
};

mod common;
use common::*;

async fn import(
    config: &trip_import::config::PipelineConfig,
) -> (Result<ImportStats, PipelineError>, MemoryLoader) {
    let loader = MemoryLoader::new();
    let sink = CsvDuplicateSink::new(config.duplicates_path.clone(), config.delimiter);
    let pipeline =
        TripImportPipeline::new(config, Box::new(loader.clone()), Box::new(sink)).unwrap();
    let mut source = DelimitedFileSource::open(&config.input_path, config.delimiter)
        .await
        .unwrap();
    let result = pipeline.run(&mut source, &CancellationToken::new()).await;
    (result, loader)
}

fn assert_accounting(stats: &ImportStats) {
    let parse_failures = stats.total_rows_read - stats.parsed_rows;
    let normalize_failures = stats.invalid_rows - parse_failures;
    let normalized = stats.parsed_rows - normalize_failures;
    assert_eq!(normalized, stats.duplicate_rows + stats.inserted_rows);
    assert!(stats.duplicates_file_rows <= stats.duplicate_rows);
}

#[tokio::test]
async fn test_thirty_thousand_row_file() {
    let temp_dir = TempDir::new().unwrap();

    let mut lines = Vec::with_capacity(30_000);
    let mut bad = 0;
    let mut dups = 0;
    for i in 0..30_000i64 {
        let passengers = 1 + (i % 4) as u8;
        if i % 200 == 7 && bad < 145 {
            bad += 1;
            lines.push(trip_line(i, passengers, "12.00").replacen(
                &format!(",{passengers},2.50,"),
                ",lots,2.50,",
                1,
            ));
        } else if i % 1000 == 500 && dups < 15 {
            // Same key as the previous row, different fare
            dups += 1;
            let prev = i - 1;
            lines.push(trip_line(prev, 1 + (prev % 4) as u8, "99.99"));
        } else {
            lines.push(trip_line(i, passengers, "12.00"));
        }
    }
    write_input(temp_dir.path(), &lines);

    let config = pipeline_config(temp_dir.path(), 5000);
    let (result, loader) = import(&config).await;
    let stats = result.unwrap();

    assert_eq!(
        stats,
        ImportStats {
            total_rows_read: 30_000,
            parsed_rows: 29_855,
            invalid_rows: 145,
            duplicate_rows: 15,
            inserted_rows: 29_840,
            duplicates_file_rows: 15,
        }
    );
    assert_accounting(&stats);

    let sizes: Vec<usize> = loader.batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![5000, 5000, 5000, 5000, 5000, 4840]);

    let written = fs::read_to_string(&config.duplicates_path).unwrap();
    assert_eq!(written.lines().count(), 16);
    assert!(written.lines().skip(1).all(|l| l.ends_with(",99.99,1.25")));
}

#[tokio::test]
async fn test_duplicate_ignores_amounts_and_keeps_first() {
    let temp_dir = TempDir::new().unwrap();
    let lines = vec![
        trip_line(0, 2, "10.00"),
        trip_line(5, 2, "11.00"),
        trip_line(0, 2, "55.00"),
        // different passenger count is a different trip
        trip_line(0, 3, "10.00"),
    ];
    write_input(temp_dir.path(), &lines);

    let config = pipeline_config(temp_dir.path(), 10);
    let (result, loader) = import(&config).await;
    let stats = result.unwrap();

    assert_eq!(stats.duplicate_rows, 1);
    assert_eq!(stats.inserted_rows, 3);
    let fares: Vec<String> = loader
        .records()
        .iter()
        .map(|t| t.fare_amount().to_string())
        .collect();
    assert_eq!(fares, vec!["10.00", "11.00", "10.00"]);

    let written = fs::read_to_string(&config.duplicates_path).unwrap();
    let rows: Vec<&str> = written.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("line_number,tpep_pickup_datetime"));
    assert_eq!(rows[1], format!("3,{}", lines[2]));
}

#[tokio::test]
async fn test_dropoff_before_pickup_is_never_loaded_or_deduplicated() {
    let temp_dir = TempDir::new().unwrap();
    let lines = vec![
        "2024-01-01 10:30:00,2024-01-01 10:00:00,1,2.50,N,100,200,10.00,1.00".to_string(),
        "2024-01-01 10:30:00,2024-01-01 10:00:00,1,2.50,N,100,200,10.00,1.00".to_string(),
        "2024-01-01 10:00:00,2024-01-01 10:00:00,1,0,Y,100,200,0,0".to_string(),
    ];
    write_input(temp_dir.path(), &lines);

    let config = pipeline_config(temp_dir.path(), 10);
    let (result, loader) = import(&config).await;
    let stats = result.unwrap();

    assert_eq!(stats.parsed_rows, 3);
    assert_eq!(stats.invalid_rows, 2);
    assert_eq!(stats.duplicate_rows, 0);
    assert_eq!(stats.inserted_rows, 1);
    assert_accounting(&stats);

    let loaded = loader.records();
    assert_eq!(loaded[0].travel_time_seconds(), 0);
    assert_eq!(loaded[0].store_and_fwd_flag(), StoreAndForward::Yes);
    assert!(!config.duplicates_path.exists());
}

#[tokio::test]
async fn test_time_zone_conversion_and_mixed_failures() {
    let temp_dir = TempDir::new().unwrap();
    let lines = vec![
        // EST, UTC-5
        "01/15/2024 08:00:00 PM,01/15/2024 08:20:00 PM,1,1.0,n,1,2,8.00,1.00".to_string(),
        // EDT, UTC-4
        "2024-07-04 12:00:00,2024-07-04 12:45:00,2,7.25,Y,3,4,30.00,6.00".to_string(),
        // already UTC, left alone
        "2024-07-04T16:00:00Z,2024-07-04T16:10:00Z,1,1.0,N,1,2,8.00,1.00".to_string(),
        // inside the spring-forward gap
        "2024-03-10 02:30:00,2024-03-10 03:15:00,1,1.0,N,1,2,8.00,1.00".to_string(),
        "2024-07-04 12:00:00,2024-07-04 12:45:00,-1,7.25,Y,3,4,30.00,6.00".to_string(),
        "2024-07-04 12:00:00,,2,7.25,Y,3,4,30.00,6.00".to_string(),
    ];
    write_input(temp_dir.path(), &lines);

    let mut config = pipeline_config(temp_dir.path(), 2);
    config.input_time_zone = Some("America/New_York".to_string());
    let (result, loader) = import(&config).await;
    let stats = result.unwrap();

    assert_eq!(stats.total_rows_read, 6);
    assert_eq!(stats.parsed_rows, 4);
    assert_eq!(stats.invalid_rows, 3);
    assert_eq!(stats.inserted_rows, 3);
    assert_accounting(&stats);

    let pickups: Vec<String> = loader
        .records()
        .iter()
        .map(|t| t.pickup().to_rfc3339())
        .collect();
    assert_eq!(
        pickups,
        vec![
            "2024-01-16T01:00:00+00:00",
            "2024-07-04T16:00:00+00:00",
            "2024-07-04T16:00:00+00:00",
        ]
    );
}

#[tokio::test]
async fn test_semicolon_files_round_trip_into_duplicates_file() {
    let temp_dir = TempDir::new().unwrap();
    let header = HEADER.replace(',', ";");
    let row = "\"2024-05-01 09:00:00\";2024-05-01 09:30:00;1;3.10;N;10;20;15.50;2.00";
    fs::write(
        temp_dir.path().join("trips.csv"),
        format!("{header}\n{row}\n\n{row}\n"),
    )
    .unwrap();

    let mut config = pipeline_config(temp_dir.path(), 10);
    config.delimiter = b';';
    let (result, _) = import(&config).await;
    let stats = result.unwrap();
    assert_eq!(stats.duplicate_rows, 1);

    let written = fs::read_to_string(&config.duplicates_path).unwrap();
    let rows: Vec<&str> = written.lines().collect();
    assert_eq!(rows[0], format!("line_number;{header}"));
    assert_eq!(
        rows[1],
        "2;2024-05-01 09:00:00;2024-05-01 09:30:00;1;3.10;N;10;20;15.50;2.00"
    );

    // a second run appends below the existing header
    let (result, _) = import(&config).await;
    assert_eq!(result.unwrap().duplicates_file_rows, 1);
    let written = fs::read_to_string(&config.duplicates_path).unwrap();
    assert_eq!(written.lines().count(), 3);
}

#[tokio::test]
async fn test_invalid_utf8_row_is_counted_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let mut contents = format!("{HEADER}\n{}\n", trip_line(0, 1, "5.00")).into_bytes();
    contents.extend_from_slice(
        b"2024-01-01 00:01:00,2024-01-01 00:11:00,1,2.50,N,100,200,5.00,\xff\n",
    );
    contents.extend_from_slice(format!("{}\n", trip_line(2, 1, "5.00")).as_bytes());
    fs::write(temp_dir.path().join("trips.csv"), contents).unwrap();

    let config = pipeline_config(temp_dir.path(), 10);
    let (result, loader) = import(&config).await;
    let stats = result.unwrap();

    assert_eq!(stats.total_rows_read, 3);
    assert_eq!(stats.invalid_rows, 1);
    assert_eq!(stats.inserted_rows, 2);
    assert_eq!(loader.records().len(), 2);
    assert_accounting(&stats);
}

#[tokio::test]
async fn test_loader_failure_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let lines: Vec<String> = (0..3).map(|i| trip_line(i, 1, "5.00")).collect();
    write_input(temp_dir.path(), &lines);

    let config = pipeline_config(temp_dir.path(), 2);
    let pipeline = TripImportPipeline::new(
        &config,
        Box::new(FailingLoader),
        Box::new(MemoryDuplicateSink::new()),
    )
    .unwrap();
    let mut source = DelimitedFileSource::open(&config.input_path, b',')
        .await
        .unwrap();

    let result = pipeline.run(&mut source, &CancellationToken::new()).await;
    assert!(matches!(result, Err(PipelineError::Load(_))));
    // the source stops at the failed batch
    assert_eq!(source_remaining(&mut source).await, 1);
}

async fn source_remaining<S: trip_import::source::RecordSource>(source: &mut S) -> usize {
    let mut remaining = 0;
    while source.next_row().await.unwrap().is_some() {
        remaining += 1;
    }
    remaining
}

#[tokio::test]
async fn test_sink_failure_only_skips_file_count() {
    let temp_dir = TempDir::new().unwrap();
    let lines = vec![
        trip_line(0, 1, "5.00"),
        trip_line(0, 1, "6.00"),
        trip_line(0, 1, "7.00"),
        trip_line(1, 1, "5.00"),
    ];
    write_input(temp_dir.path(), &lines);

    let config = pipeline_config(temp_dir.path(), 10);
    let loader = MemoryLoader::new();
    let pipeline =
        TripImportPipeline::new(&config, Box::new(loader.clone()), Box::new(FailingSink))
            .unwrap();
    let mut source = DelimitedFileSource::open(&config.input_path, b',')
        .await
        .unwrap();

    let stats = pipeline
        .run(&mut source, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.duplicate_rows, 2);
    assert_eq!(stats.duplicates_file_rows, 0);
    assert_eq!(stats.inserted_rows, 2);
    assert_eq!(loader.records().len(), 2);
}

#[tokio::test]
async fn test_cancellation_discards_buffered_batch() {
    let temp_dir = TempDir::new().unwrap();
    let lines: Vec<String> = (0..5).map(|i| trip_line(i, 1, "5.00")).collect();
    write_input(temp_dir.path(), &lines);

    let config = pipeline_config(temp_dir.path(), 2);
    let loader = MemoryLoader::new();
    let pipeline = TripImportPipeline::new(
        &config,
        Box::new(loader.clone()),
        Box::new(MemoryDuplicateSink::new()),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let mut source = CancellingSource {
        inner: DelimitedFileSource::open(&config.input_path, b',')
            .await
            .unwrap(),
        cancel: cancel.clone(),
        after: 3,
        yielded: 0,
    };

    let result = pipeline.run(&mut source, &cancel).await;
    assert!(matches!(result, Err(PipelineError::Cancelled)));

    // rows 1 and 2 were flushed, row 3 was buffered and dropped
    let batches = loader.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(source.yielded, 3);
}

#[tokio::test]
async fn test_missing_input_and_missing_columns_are_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let config = pipeline_config(temp_dir.path(), 10);
    assert!(DelimitedFileSource::open(&config.input_path, b',')
        .await
        .is_err());

    fs::write(
        &config.input_path,
        "tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count\n2024-01-01,2024-01-01,1\n",
    )
    .unwrap();
    let err = DelimitedFileSource::open(&config.input_path, b',')
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("trip_distance"));
}
