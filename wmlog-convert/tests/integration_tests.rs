use std::{fs, path::Path};

use serde_json::json;
use tempfile::{tempdir, TempDir};
use wmlog_convert::{
    ConvertConfig, ConvertError, ConvertSession, EntriesFormat, LeadsMode, SUMMARY_FILENAME,
};
use wmlog_core::{ENTRIES_FILENAME, MASTER_FILENAME, UNUSED_SLOT, WMX64};

// ===========================================================================
// Helpers — синтетическое дерево исследований
// ===========================================================================

/// Начало записи в логах: 2024-01-01 00:00:00 UTC, миллисекунды.
const START_MS: u64 = 1_704_067_200_000;
const COLUMNS: usize = 6;

/// x64-лог: `I` на колонке 5, биполярное `CS 1-2` на колонках 3 и 5.
///
/// Строка `r` содержит `r * 10 + c` в колонке `c`, разрешение 1.
fn build_log(rows: usize) -> Vec<u8> {
    let log = &WMX64.log;
    let mut buf = vec![0u8; log.header.end];

    buf[log.timestamp.start..log.timestamp.end]
        .copy_from_slice(&START_MS.to_le_bytes()[..log.timestamp.len()]);
    buf[log.num_channels.start..log.num_channels.end]
        .copy_from_slice(&(COLUMNS as u16).to_le_bytes());
    buf[log.start_address.start..log.start_address.end]
        .copy_from_slice(&(log.header.end as u16).to_le_bytes());
    buf[log.amplifier.resolution.start..log.amplifier.resolution.end]
        .copy_from_slice(&1u16.to_le_bytes());
    buf[log.amplifier.sampling_freq.start..log.amplifier.sampling_freq.end]
        .copy_from_slice(&2000u16.to_le_bytes());

    for i in 0..log.sample_mapping.len() {
        buf[log.sample_mapping.start + i] = i as u8;
    }

    for (slot, name, ids) in [(0, "I", (0xFF, 5)), (1, "CS 1-2", (3, 5))] {
        let layout = &log.channel;
        let base = log.channels.start + slot * layout.subblock_size;

        buf[base..base + name.len()].copy_from_slice(name.as_bytes());
        buf[base + layout.ids.start] = ids.0;
        buf[base + layout.ids.start + 1] = ids.1;
        buf[base + layout.input_source.start] = 2;
        buf[base + layout.jbox_pins.start] = UNUSED_SLOT;
        buf[base + layout.jbox_pins.start + 1] = UNUSED_SLOT;
    }

    for r in 0..rows {
        for c in 0..COLUMNS {
            buf.extend_from_slice(&((r * 10 + c) as i32).to_le_bytes());
        }
    }

    buf
}

/// `(group, log id, timestamp ms, text)`
fn build_entries(records: &[(u16, u32, u64, &str)]) -> Vec<u8> {
    let layout = &WMX64.entries;
    let mut buf = vec![0u8; layout.header.end];

    buf[layout.header_timestamp.start..layout.header_timestamp.end]
        .copy_from_slice(&START_MS.to_le_bytes());

    for &(group, fid, ts, text) in records {
        let mut rec = vec![0u8; layout.record_size];

        rec[layout.group.start..layout.group.end].copy_from_slice(&group.to_le_bytes());
        rec[layout.log_id.start..layout.log_id.end].copy_from_slice(&fid.to_le_bytes());
        rec[layout.timestamp.start..layout.timestamp.end].copy_from_slice(&ts.to_le_bytes());
        rec[layout.text.start..layout.text.start + text.len()].copy_from_slice(text.as_bytes());
        buf.extend(rec);
    }

    buf
}

/// `input/STUDY1/{00000001.log, 00000002.log, entries.log, MASTER}`
fn build_study_tree(entries: Option<Vec<u8>>) -> TempDir {
    let root = tempdir().unwrap();
    let study = root.path().join("input").join("STUDY1");

    fs::create_dir_all(&study).unwrap();
    fs::write(study.join("00000001.log"), build_log(3)).unwrap();
    fs::write(study.join("00000002.log"), build_log(2)).unwrap();
    fs::write(study.join(MASTER_FILENAME), vec![0u8; 0x100]).unwrap();

    if let Some(bytes) = entries {
        fs::write(study.join(ENTRIES_FILENAME), bytes).unwrap();
    }

    root
}

fn default_entries() -> Vec<u8> {
    build_entries(&[
        (2, 1, START_MS + 1500, "ablation start"),
        (3, 2, START_MS + 2000, "note"),
        (1, 1, START_MS + 3000, "protocol"),
    ])
}

fn config_for(root: &Path) -> ConvertConfig {
    let mut cfg = ConvertConfig::default();

    cfg.paths.input_folder = root.join("input");
    cfg.paths.output_folder = root.join("output");
    cfg
}

fn read(root: &Path, file: &str) -> String {
    fs::read_to_string(root.join("output").join("STUDY1").join(file)).unwrap()
}

// ===========================================================================
// Данные
// ===========================================================================

#[test]
fn test_computed_leads_csv() {
    let root = build_study_tree(Some(default_entries()));
    let session = ConvertSession::new(config_for(root.path())).unwrap();

    let summary = session.run().unwrap();

    assert_eq!(summary.studies, 1);
    assert_eq!(summary.files_converted, 2);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.rows_written, 5);

    // I = col5, CS 1-2 = col5 - col3
    assert_eq!(read(root.path(), "00000001.csv"), "I,CS 1-2\n5,2\n15,2\n25,2\n");
    assert_eq!(read(root.path(), "00000002.csv"), "I,CS 1-2\n5,2\n15,2\n");
}

#[test]
fn test_raw_leads_and_channel_filter() {
    let root = build_study_tree(None);
    let mut cfg = config_for(root.path());

    cfg.data.leads = LeadsMode::Raw;
    cfg.data.delimiter = ";".to_string();
    ConvertSession::new(cfg.clone()).unwrap().run().unwrap();

    assert_eq!(
        read(root.path(), "00000002.csv"),
        "I;u+CS 1-2;u-CS 1-2\n5;3;5\n15;13;15\n"
    );

    cfg.data.leads = LeadsMode::Computed;
    cfg.data.delimiter = ",".to_string();
    cfg.data.channels = vec!["CS 1-2".to_string(), "missing".to_string()];
    ConvertSession::new(cfg).unwrap().run().unwrap();

    assert_eq!(read(root.path(), "00000002.csv"), "CS 1-2\n2\n2\n");
}

#[test]
fn test_custom_channels_appended() {
    let root = build_study_tree(None);
    let mut cfg = config_for(root.path());

    cfg.data.custom_channels = json!({"X": [0, 1]});
    ConvertSession::new(cfg).unwrap().run().unwrap();

    // X = (0, 1) -> col3 - col5
    assert_eq!(read(root.path(), "00000002.csv"), "I,CS 1-2,X\n5,2,-2\n15,2,-2\n");
}

#[test]
fn test_custom_channels_keep_config_order() {
    let root = build_study_tree(None);
    let config_path = root.path().join("config.json");
    let text = format!(
        r#"{{"paths": {{"input_folder": {:?}, "output_folder": {:?}}},
            "data": {{"custom_channels": {{"Z": [1], "A": [0]}}}}}}"#,
        root.path().join("input").to_string_lossy(),
        root.path().join("output").to_string_lossy(),
    );

    fs::write(&config_path, text).unwrap();

    let cfg = ConvertConfig::load(&config_path).unwrap();
    ConvertSession::new(cfg).unwrap().run().unwrap();

    assert_eq!(read(root.path(), "00000002.csv"), "I,CS 1-2,Z,A\n5,2,3,5\n15,2,13,15\n");
}

#[test]
fn test_out_of_range_custom_channel_skips_file() {
    let root = build_study_tree(None);
    let mut cfg = config_for(root.path());

    cfg.data.custom_channels = json!({"X": [7]});

    let summary = ConvertSession::new(cfg).unwrap().run().unwrap();

    assert_eq!(summary.files_converted, 0);
    assert_eq!(summary.files_failed, 2);
}

#[test]
fn test_study_and_data_file_filters() {
    let root = build_study_tree(None);
    fs::create_dir_all(root.path().join("input").join("STUDY2")).unwrap();

    let mut cfg = config_for(root.path());
    cfg.paths.studies = vec!["STUDY1".to_string()];
    cfg.data.data_files = vec!["00000002".to_string()];

    let summary = ConvertSession::new(cfg).unwrap().run().unwrap();

    assert_eq!(summary.studies, 1);
    assert_eq!(summary.files_converted, 1);

    let out = root.path().join("output");
    assert!(out.join("STUDY1").join("00000002.csv").exists());
    assert!(!out.join("STUDY1").join("00000001.csv").exists());
    assert!(!out.join("STUDY2").exists());
}

// ===========================================================================
// Аннотации
// ===========================================================================

#[test]
fn test_entries_csv_per_file_and_summary() {
    let root = build_study_tree(Some(default_entries()));
    let summary = ConvertSession::new(config_for(root.path()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(
        read(root.path(), "00000001_entries.csv"),
        "Group,FileId,Time(H:M:S),Annotation\n\
         EVENT,00000001,0:00:01.500000,ablation start\n\
         PROTOCOL,00000001,0:00:03,protocol\n"
    );
    assert_eq!(
        read(root.path(), "00000002_entries.csv"),
        "Group,FileId,Time(H:M:S),Annotation\n\
         NOTE,00000002,0:00:02,note\n"
    );
    assert_eq!(
        read(root.path(), SUMMARY_FILENAME),
        "Group,FileId,Time(Y-m-d_H:M:S),Annotation\n\
         EVENT,00000001,2024-01-01_00:00:01,ablation start\n\
         NOTE,00000002,2024-01-01_00:00:02,note\n\
         PROTOCOL,00000001,2024-01-01_00:00:03,protocol\n"
    );

    // 3 в сводке + 2 + 1 по файлам
    assert_eq!(summary.entries_written, 6);
}

#[test]
fn test_entries_group_filter() {
    let root = build_study_tree(Some(default_entries()));
    let mut cfg = config_for(root.path());

    cfg.entries.filter_annotation_type = vec!["protocol".to_string()];
    cfg.entries.summary_csv = false;
    ConvertSession::new(cfg).unwrap().run().unwrap();

    let per_file = read(root.path(), "00000001_entries.csv");

    assert!(per_file.contains("PROTOCOL,00000001"));
    assert!(!per_file.contains("EVENT"));
    assert!(!root
        .path()
        .join("output")
        .join("STUDY1")
        .join(SUMMARY_FILENAME)
        .exists());
}

#[test]
fn test_entries_sel_output() {
    let root = build_study_tree(Some(default_entries()));
    let mut cfg = config_for(root.path());

    cfg.entries.output_format = EntriesFormat::Sel;
    ConvertSession::new(cfg).unwrap().run().unwrap();

    let sel = read(root.path(), "00000001.sel");

    assert!(sel.starts_with("%SignalPlant ver.:"));
    assert!(sel.contains("%00000001.csv\n"));
    assert!(sel.contains("%SAMPLING_FREQ [Hz]:2000\n"));
    assert!(sel.contains("%I\t1\n%CS 1-2\t1\n"));
    assert!(sel.contains("1\t2000\t2000\tEVENT\t1\t0\tI\tablation start\n"));
    assert!(sel.contains("2\t6000\t6000\tPROTOCOL\t1\t0\tI\tprotocol\n"));
}

#[test]
fn test_entries_disabled() {
    let root = build_study_tree(Some(default_entries()));
    let mut cfg = config_for(root.path());

    cfg.entries.convert = false;

    let summary = ConvertSession::new(cfg).unwrap().run().unwrap();
    let out = root.path().join("output").join("STUDY1");

    assert_eq!(summary.entries_written, 0);
    assert!(!out.join("00000001_entries.csv").exists());
    assert!(!out.join(SUMMARY_FILENAME).exists());
    assert!(out.join("00000001.csv").exists());
}

#[test]
fn test_missing_entries_file_only_warns() {
    let root = build_study_tree(None);
    let summary = ConvertSession::new(config_for(root.path()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.files_converted, 2);
    assert_eq!(summary.entries_written, 0);
    assert!(!root
        .path()
        .join("output")
        .join("STUDY1")
        .join("00000001_entries.csv")
        .exists());
}

#[test]
fn test_corrupt_entries_abort_session() {
    let mut entries = default_entries();
    entries.push(0);

    let root = build_study_tree(Some(entries));
    let err = ConvertSession::new(config_for(root.path()))
        .unwrap()
        .run()
        .unwrap_err();

    assert!(err.is_fatal(), "{err}");
    assert!(matches!(err, ConvertError::Wm(_)));
}

// ===========================================================================
// Конфигурация
// ===========================================================================

#[test]
fn test_config_file_roundtrip_through_session() {
    let root = build_study_tree(None);
    let config_path = root.path().join("config.json");
    let text = json!({
        "global_settings": {"workmate_version": "4.3", "processing": {"chunk_size": 2048}},
        "paths": {
            "input_folder": root.path().join("input"),
            "output_folder": root.path().join("output")
        },
        "data": {"leads": "raw"}
    });

    fs::write(&config_path, text.to_string()).unwrap();

    let cfg = ConvertConfig::resolve(Some(&config_path)).unwrap();

    assert_eq!(cfg.global_settings.processing.chunk_size, 2048);
    assert_eq!(cfg.data.leads, LeadsMode::Raw);
    assert!(cfg.entries.convert);

    let summary = ConvertSession::new(cfg).unwrap().run().unwrap();
    assert_eq!(summary.files_converted, 2);
}

#[test]
fn test_unknown_version_rejected() {
    let mut cfg = ConvertConfig::default();

    cfg.global_settings.workmate_version = "5.0".to_string();

    assert!(ConvertSession::new(cfg).is_err());
}
