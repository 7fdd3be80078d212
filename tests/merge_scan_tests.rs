//! Ordered merge scan properties over in-memory sources.


use std::sync::Arc;

use mergescan_core::config::ScanConfig;
use mergescan_core::schema::{DataType, PhysicalType};
use mergescan_core::types::{Column, RowBatch, Scalar};
use mergescan_exec::{Engine, ExecError};
use mergescan_io::{CollectSink, LeafColumn, MemoryDecoderFactory, MemoryFile};
use mergescan_operators::OpError;
use test_data_gen::{
    assert_globally_sorted, concat, drain, i64_column, key_counts, key_file, nullable_key_file,
    register, sorted_keys, tagged_file,
};

fn engine(factory: &MemoryDecoderFactory, cfg: ScanConfig) -> Engine {
    Engine::new(cfg, Arc::new(factory.clone())).expect("engine")
}

fn small_config(cap: usize) -> ScanConfig {
    ScanConfig {
        batch_size: 2048,
        base_output_capacity: 2,
        max_rows_per_call: cap,
    }
}

/// Tags in merged order: rows sorted by (key, source, row position).
fn expected_tags(sources: &[Vec<i64>]) -> Vec<String> {
    let mut rows: Vec<(i64, usize, usize)> = sources
        .iter()
        .enumerate()
        .flat_map(|(src, keys)| keys.iter().enumerate().map(move |(row, &k)| (k, src, row)))
        .collect();
    rows.sort();
    rows.into_iter()
        .map(|(_, src, row)| format!("f{src}:{row}"))
        .collect()
}

fn tags(batch: &RowBatch) -> Vec<String> {
    batch
        .column("tag")
        .expect("tag column")
        .values
        .iter()
        .map(|v| match v {
            Scalar::Str(s) => s.clone(),
            other => panic!("expected string tag, got {other:?}"),
        })
        .collect()
}

#[test]
fn test_global_order_and_completeness() {
    let factory = MemoryDecoderFactory::new(7);
    let sources: Vec<Vec<i64>> = (0..5)
        .map(|i| sorted_keys(i, 200 + 37 * i as usize, (i as i64) * 3, 5))
        .collect();
    let files = register(
        &factory,
        sources
            .iter()
            .enumerate()
            .map(|(i, keys)| key_file(keys, 13 + i * 11))
            .collect(),
    );

    let engine = engine(&factory, small_config(64));
    let bind = engine.bind(&files, "key").expect("bind");
    let mut scan = engine.scan(&bind).expect("scan");
    let batches = drain(&mut scan);
    for b in &batches {
        assert!(!b.is_empty());
    }
    let all = concat(&bind, &batches);

    assert_globally_sorted(&all, "key");
    let expected = key_counts(sources.iter().flatten().copied());
    assert_eq!(key_counts(i64_column(&all, "key")), expected);
    assert_eq!(scan.stats().rows as usize, all.num_rows());
}

#[test]
fn test_equal_keys_follow_source_then_row_order() {
    let factory = MemoryDecoderFactory::new(3);
    let sources = vec![
        vec![1, 1, 2, 2, 2, 5],
        vec![0, 1, 2, 5, 5],
        vec![1, 1, 1, 1],
    ];
    let files = register(
        &factory,
        sources
            .iter()
            .enumerate()
            .map(|(i, keys)| tagged_file(&format!("f{i}"), keys, 4))
            .collect(),
    );

    let engine = engine(&factory, small_config(5));
    let bind = engine.bind(&files, "key").expect("bind");
    let all = engine.scan(&bind).expect("scan").collect_all().expect("collect");

    assert_eq!(tags(&all), expected_tags(&sources));
}

#[test]
fn test_batch_boundaries_do_not_change_output() {
    let sources: Vec<Vec<i64>> = (0..4).map(|i| sorted_keys(100 + i, 120, 0, 3)).collect();
    let expected = expected_tags(&sources);

    let mut outputs = Vec::new();
    for (batch_size, rows_per_group, cap) in [(1, 1, 1), (3, 7, 4), (16, 50, 32), (1024, 120, 2048)]
    {
        let factory = MemoryDecoderFactory::new(batch_size);
        let files = register(
            &factory,
            sources
                .iter()
                .enumerate()
                .map(|(i, keys)| tagged_file(&format!("f{i}"), keys, rows_per_group))
                .collect(),
        );
        let cfg = ScanConfig {
            batch_size,
            base_output_capacity: 1,
            max_rows_per_call: cap,
        };
        let engine = engine(&factory, cfg);
        let bind = engine.bind(&files, "key").expect("bind");
        let all = engine.scan(&bind).expect("scan").collect_all().expect("collect");
        assert_eq!(tags(&all), expected);
        outputs.push(all);
    }

    for pair in outputs.windows(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

#[test]
fn test_schema_union_fills_missing_columns_with_null() {
    let factory = MemoryDecoderFactory::new(8);
    let a = RowBatch::new(vec![
        Column::new("key", vec![Scalar::I64(1), Scalar::I64(3)]),
        Column::new("a", vec![Scalar::F64(0.5), Scalar::F64(1.5)]),
    ]);
    let b = RowBatch::new(vec![
        Column::new("tag", vec![Scalar::Str("x".into()), Scalar::Str("y".into())]),
        Column::new("key", vec![Scalar::I64(2), Scalar::I64(4)]),
    ]);
    factory.insert(
        "a",
        MemoryFile::new(vec![
            LeafColumn::new("key", PhysicalType::Int64),
            LeafColumn::new("a", PhysicalType::Double),
        ])
        .with_rows(&a, 2),
    );
    factory.insert(
        "b",
        MemoryFile::new(vec![
            LeafColumn::new("tag", PhysicalType::ByteArray),
            LeafColumn::new("key", PhysicalType::Int64),
        ])
        .with_rows(&b, 2),
    );

    let engine = engine(&factory, ScanConfig::default());
    let bind = engine
        .bind(&["a".to_string(), "b".to_string()], "key")
        .expect("bind");
    assert_eq!(bind.schema.names(), vec!["key", "a", "tag"]);
    assert_eq!(bind.schema.fields[1].data_type, DataType::Float64);
    assert!(bind.schema.fields.iter().all(|f| f.nullable));

    let all = engine.scan(&bind).expect("scan").collect_all().expect("collect");
    assert_eq!(i64_column(&all, "key"), vec![1, 2, 3, 4]);
    assert_eq!(
        all.column("a").expect("a").values,
        vec![Scalar::F64(0.5), Scalar::Null, Scalar::F64(1.5), Scalar::Null]
    );
    assert_eq!(
        all.column("tag").expect("tag").values,
        vec![
            Scalar::Null,
            Scalar::Str("x".into()),
            Scalar::Null,
            Scalar::Str("y".into())
        ]
    );
}

#[test]
fn test_incompatible_types_fail_bind() {
    let factory = MemoryDecoderFactory::new(8);
    let key = RowBatch::new(vec![
        Column::new("key", vec![Scalar::I64(1)]),
        Column::new("x", vec![Scalar::I32(1)]),
    ]);
    factory.insert(
        "a",
        MemoryFile::new(vec![
            LeafColumn::new("key", PhysicalType::Int64),
            LeafColumn::new("x", PhysicalType::Int32),
        ])
        .with_rows(&key, 1),
    );
    let other = RowBatch::new(vec![
        Column::new("key", vec![Scalar::I64(2)]),
        Column::new("x", vec![Scalar::F64(1.0)]),
    ]);
    factory.insert(
        "b",
        MemoryFile::new(vec![
            LeafColumn::new("key", PhysicalType::Int64),
            LeafColumn::new("x", PhysicalType::Double),
        ])
        .with_rows(&other, 1),
    );

    let engine = engine(&factory, ScanConfig::default());
    let err = engine
        .bind(&["a".to_string(), "b".to_string()], "key")
        .expect_err("types collide");
    match err {
        ExecError::Operator(OpError::IncompatibleSchema {
            column,
            existing,
            found,
            path,
        }) => {
            assert_eq!(column, "x");
            assert_eq!(existing, DataType::Int32);
            assert_eq!(found, DataType::Float64);
            assert_eq!(path, "b");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_order_column_fails_bind() {
    let factory = MemoryDecoderFactory::new(8);
    let files = register(&factory, vec![key_file(&[1, 2], 2)]);
    let engine = engine(&factory, ScanConfig::default());
    assert!(matches!(
        engine.bind(&files, "ts"),
        Err(ExecError::Operator(OpError::OrderColumnMissing { .. }))
    ));
    assert!(matches!(
        engine.bind(&[], "key"),
        Err(ExecError::Operator(OpError::NoInputs))
    ));
}

#[test]
fn test_single_source_passes_through_unchanged() {
    let factory = MemoryDecoderFactory::new(5);
    let keys = sorted_keys(9, 47, -10, 4);
    let file = tagged_file("f0", &keys, 11);
    let rows: Vec<RowBatch> = file.row_groups.clone();
    factory.insert("f0", file);

    let engine = engine(&factory, small_config(8));
    let bind = engine.bind(&["f0".to_string()], "key").expect("bind");
    let mut scan = engine.scan(&bind).expect("scan");
    let batches = drain(&mut scan);

    let mut expected = RowBatch::empty(&bind.schema);
    for group in &rows {
        expected.extend_from(group).expect("extend");
    }
    assert_eq!(concat(&bind, &batches), expected);
    assert_eq!(scan.stats().fast_path_batches, scan.stats().batches);
    assert_eq!(scan.stats().tournament_batches, 0);
}

#[test]
fn test_fast_path_emits_disjoint_source_first() {
    let factory = MemoryDecoderFactory::new(4);
    let lower: Vec<i64> = (1..=10).collect();
    let upper: Vec<i64> = (20..=25).collect();
    let files = register(&factory, vec![key_file(&upper, 6), key_file(&lower, 10)]);

    let engine = engine(&factory, ScanConfig::default());
    let bind = engine.bind(&files, "key").expect("bind");
    let mut scan = engine.scan(&bind).expect("scan");
    let batches = drain(&mut scan);

    let sizes: Vec<usize> = batches.iter().map(|b| b.num_rows()).collect();
    assert_eq!(sizes, vec![4, 4, 2, 4, 2]);
    let first_three: Vec<i64> = batches[..3]
        .iter()
        .flat_map(|b| i64_column(b, "key"))
        .collect();
    assert_eq!(first_three, lower);
    assert_eq!(scan.stats().fast_path_batches, 5);
    assert_eq!(scan.stats().tournament_batches, 0);
}

#[test]
fn test_tournament_batches_respect_cap() {
    let factory = MemoryDecoderFactory::new(256);
    let evens: Vec<i64> = (0..500).map(|i| i * 2).collect();
    let odds: Vec<i64> = (0..500).map(|i| i * 2 + 1).collect();
    let files = register(&factory, vec![key_file(&evens, 500), key_file(&odds, 500)]);

    let engine = engine(&factory, small_config(32));
    let bind = engine.bind(&files, "key").expect("bind");
    let mut scan = engine.scan(&bind).expect("scan");
    let batches = drain(&mut scan);

    assert!(batches.iter().all(|b| b.num_rows() <= 32));
    let all = concat(&bind, &batches);
    assert_eq!(i64_column(&all, "key"), (0..1000).collect::<Vec<_>>());
}

#[test]
fn test_terminal_batch_repeats() {
    let factory = MemoryDecoderFactory::new(4);
    let files = register(&factory, vec![key_file(&[1, 2], 2), key_file(&[], 2)]);
    let engine = engine(&factory, ScanConfig::default());
    let bind = engine.bind(&files, "key").expect("bind");
    let mut scan = engine.scan(&bind).expect("scan");

    assert_eq!(scan.next_batch().expect("batch").num_rows(), 2);
    for _ in 0..3 {
        let end = scan.next_batch().expect("batch");
        assert!(end.is_empty());
        assert_eq!(end.num_columns(), bind.schema.len());
    }
    assert_eq!(scan.active_sources(), 0);
}

#[test]
fn test_decoder_failure_aborts_scan() {
    let factory = MemoryDecoderFactory::new(2);
    let failing = key_file(&[1, 3, 5, 7], 2).fail_after(1);
    let files = register(&factory, vec![failing, key_file(&[2, 4, 6, 8], 2)]);

    let engine = engine(&factory, ScanConfig::default());
    let bind = engine.bind(&files, "key").expect("bind");
    let mut sink = CollectSink::new();
    let err = engine.run(&bind, &mut sink).expect_err("decoder fails");

    assert!(matches!(err, ExecError::Operator(OpError::Decode(_))));
    // Rows produced before the failure stay delivered.
    let delivered: Vec<i64> = sink
        .batches
        .iter()
        .flat_map(|b| i64_column(b, "key"))
        .collect();
    assert!(!delivered.is_empty());
    assert!(delivered.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_run_is_replayable() {
    let factory = MemoryDecoderFactory::new(16);
    let sources: Vec<Vec<i64>> = (0..3).map(|i| sorted_keys(40 + i, 90, 0, 2)).collect();
    let files = register(
        &factory,
        sources.iter().map(|keys| key_file(keys, 30)).collect(),
    );
    let engine = engine(&factory, ScanConfig::default());
    let bind = engine.bind(&files, "key").expect("bind");

    let mut first = CollectSink::new();
    let mut second = CollectSink::new();
    let m1 = engine.run(&bind, &mut first).expect("run");
    let m2 = engine.run(&bind, &mut second).expect("run");

    assert_eq!(m1.bind_hash, m2.bind_hash);
    assert_ne!(m1.id, m2.id);
    assert_eq!(m1.rows, 270);
    assert_eq!(m1.rows, m2.rows);
    assert_eq!(first.batches, second.batches);
}

#[test]
fn test_all_sources_empty() {
    let factory = MemoryDecoderFactory::new(4);
    let files = register(&factory, vec![key_file(&[], 4), key_file(&[], 4)]);
    let engine = engine(&factory, ScanConfig::default());
    let bind = engine.bind(&files, "key").expect("bind");
    let mut scan = engine.scan(&bind).expect("scan");
    assert!(scan.next_batch().expect("batch").is_empty());
    assert_eq!(scan.stats().batches, 0);
}

#[test]
fn test_null_keys_sort_first() {
    let factory = MemoryDecoderFactory::new(2);
    let files = register(
        &factory,
        vec![
            nullable_key_file(&[None, None, Some(3), Some(5)], 4),
            nullable_key_file(&[None, Some(1), Some(4)], 3),
        ],
    );
    let engine = engine(&factory, small_config(3));
    let bind = engine.bind(&files, "key").expect("bind");
    let all = engine.scan(&bind).expect("scan").collect_all().expect("collect");

    assert_globally_sorted(&all, "key");
    assert_eq!(
        all.column("key").expect("key").values,
        vec![
            Scalar::Null,
            Scalar::Null,
            Scalar::Null,
            Scalar::I64(1),
            Scalar::I64(3),
            Scalar::I64(4),
            Scalar::I64(5),
        ]
    );
}

#[test]
fn test_nulls_last_source_is_rejected() {
    // Whole file in one batch: rejected when the scan opens.
    let factory = MemoryDecoderFactory::new(4);
    let files = register(
        &factory,
        vec![
            nullable_key_file(&[Some(1), Some(2), None], 3),
            nullable_key_file(&[Some(3)], 1),
        ],
    );
    let engine = engine(&factory, ScanConfig::default());
    let bind = engine.bind(&files, "key").expect("bind");
    assert!(matches!(
        engine.scan(&bind),
        Err(ExecError::Operator(OpError::Unsorted { row: 2, .. }))
    ));

    // Null arrives in a later batch: rejected on refill.
    let factory = MemoryDecoderFactory::new(2);
    let files = register(
        &factory,
        vec![
            nullable_key_file(&[Some(1), Some(2), None], 3),
            nullable_key_file(&[Some(3)], 1),
        ],
    );
    let engine = self::engine(&factory, ScanConfig::default());
    let bind = engine.bind(&files, "key").expect("bind");
    let mut sink = CollectSink::new();
    let err = engine.run(&bind, &mut sink).expect_err("unsorted source");
    assert!(matches!(
        err,
        ExecError::Operator(OpError::Unsorted { ref path, row: 2 }) if path == "f0"
    ));
}
