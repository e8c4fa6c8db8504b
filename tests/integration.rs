mod common;

use {
    common::{file_names, read, wait_until},
    logspool::{LogSpoolBuilder, LogSpoolConfig},
    serde_json::json,
    std::{io::Write, path::PathBuf},
    tempfile::TempDir,
    tracing_subscriber::fmt::MakeWriter,
};

#[test]
fn config_record_uses_camel_case_keys() {
    let config: LogSpoolConfig = serde_json::from_value(json!({
        "path": "/var/log/orders",
        "fileName": "orders.log",
        "sizeThreshold": 1048576,
        "dailyRotation": true,
        "compress": true,
        "maxKeepFiles": 14,
        "fileMode": 416
    }))
    .unwrap();

    assert_eq!(
        config,
        LogSpoolConfig {
            path: Some(PathBuf::from("/var/log/orders")),
            file_name: Some("orders.log".to_string()),
            size_threshold: Some(1_048_576),
            daily_rotation: true,
            compress: true,
            max_keep_files: Some(14),
            file_mode: Some(0o640),
        }
    );
}

#[test]
fn empty_config_record_is_all_defaults() {
    let config: LogSpoolConfig = serde_json::from_value(json!({})).unwrap();
    assert_eq!(config, LogSpoolConfig::default());
}

#[test]
fn legacy_size_key_is_rejected() {
    let err = serde_json::from_value::<LogSpoolConfig>(json!({
        "path": "/var/log/orders",
        "fileSize": 100,
        "level": "info"
    }))
    .unwrap_err();
    assert!(err.to_string().contains("fileSize"), "{err}");
}

#[test]
fn spool_built_from_config_rotates() {
    let dir = TempDir::new().unwrap();
    let config: LogSpoolConfig = serde_json::from_value(json!({
        "path": dir.path(),
        "fileName": "svc.log",
        "sizeThreshold": 32
    }))
    .unwrap();

    let spool = LogSpoolBuilder::from_config(&config).build().unwrap();
    spool.append(b"0123456789abcdefghij\n");
    spool.append(b"0123456789abcdefghij\n");
    spool.flush_pending();

    let names = file_names(dir.path());
    assert_eq!(names.len(), 2);
    assert_eq!(names[0], "svc.log");
    assert!(names[1].starts_with("svc.log."));
    assert_eq!(read(dir.path().join("svc.log")), "");
}

#[test]
fn serves_as_fmt_subscriber_writer() {
    let dir = TempDir::new().unwrap();
    let spool = LogSpoolBuilder::new()
        .directory(dir.path())
        .file_name("tracing.log")
        .build()
        .unwrap();
    let mut handle = spool.make_writer();

    let subscriber = tracing_subscriber::fmt()
        .with_writer(spool)
        .with_ansi(false)
        .with_target(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(order_id = 42, "order accepted");
        tracing::warn!("inventory low");
    });
    handle.flush().unwrap();

    let content = read(dir.path().join("tracing.log"));
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("INFO") && lines[0].contains("order accepted") && lines[0].contains("order_id=42"));
    assert!(lines[1].contains("WARN") && lines[1].contains("inventory low"));
}

#[test]
fn sits_behind_non_blocking_appender() {
    let dir = TempDir::new().unwrap();
    let spool = LogSpoolBuilder::new()
        .directory(dir.path())
        .file_name("tracing.log")
        .build()
        .unwrap();

    let (non_blocking, guard) = tracing_appender::non_blocking(spool.writer());
    let subscriber = tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        for i in 0..10 {
            tracing::info!(i, "tick");
        }
    });
    drop(guard);

    let path = dir.path().join("tracing.log");
    assert!(wait_until(|| {
        spool.flush_pending();
        read(&path).lines().filter(|line| line.contains("tick")).count() == 10
    }));
}

#[cfg(unix)]
#[test]
fn file_mode_applies_to_active_and_compressed_files() {
    use {
        common::{date, ManualClock},
        logspool::RotationSize,
        std::{fs, os::unix::fs::PermissionsExt},
    };

    let dir = TempDir::new().unwrap();
    let spool = LogSpoolBuilder::new()
        .directory(dir.path())
        .file_name("app.log")
        .size_threshold(RotationSize::Bytes(4))
        .compress(true)
        .file_mode(0o640)
        .clock(ManualClock::new(date(2024, 5, 1)))
        .build()
        .unwrap();

    let mode = |name: &str| fs::metadata(dir.path().join(name)).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode("app.log"), 0o640);

    spool.append(b"abcd");
    spool.flush_pending();

    let compressed = dir.path().join("app.log.202405011.gz");
    assert!(wait_until(|| compressed.exists() && !dir.path().join("app.log.202405011").exists()));
    assert_eq!(mode("app.log.202405011.gz"), 0o640);
    assert_eq!(mode("app.log"), 0o640);
}
