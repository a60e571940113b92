use assert_fs::TempDir;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

use mediasort::config::{CONFIG_ENV, load_config};
use mediasort::{Config, CopyTool, Layout, LogLevel, load_config_from_xml_path};

fn write_xml(path: &Path, body: &str) {
    fs::write(path, format!("<config>\n{body}\n</config>\n")).unwrap();
}

#[test]
fn xml_values_override_defaults() {
    let td = tempdir().unwrap();
    let path = td.path().join("config.xml");
    write_xml(
        &path,
        "  <source_dir>/media/incoming</source_dir>\n\
           <target_dir> /media/archive </target_dir>\n\
           <log_level>debug</log_level>\n\
           <layout>filename</layout>\n\
           <copy_tool>stream</copy_tool>\n\
           <extensions>JPG, .heic mp4</extensions>\n\
           <keep_duplicates>yes</keep_duplicates>\n\
           <copy_retries>1</copy_retries>\n\
           <retry_delay_seconds>2</retry_delay_seconds>",
    );

    let cfg = load_config_from_xml_path(&path).unwrap();

    assert_eq!(cfg.source_dir, Path::new("/media/incoming"));
    assert_eq!(cfg.target_dir.as_deref(), Some(Path::new("/media/archive")));
    assert_eq!(cfg.log_level, LogLevel::Debug);
    assert_eq!(cfg.layout, Layout::Filename);
    assert_eq!(cfg.copy_tool, CopyTool::Stream);
    assert_eq!(cfg.extensions, vec!["jpg", "heic", "mp4"]);
    assert!(cfg.keep_duplicates);
    assert_eq!(cfg.copy_retries, 1);
    assert_eq!(cfg.retry_delay, Duration::from_secs(2));
    assert!(!cfg.copy_mode);
}

#[test]
fn empty_elements_keep_defaults() {
    let td = tempdir().unwrap();
    let path = td.path().join("config.xml");
    write_xml(&path, "  <target_dir>  </target_dir>\n  <log_file></log_file>");

    let cfg = load_config_from_xml_path(&path).unwrap();
    let defaults = Config::default();

    assert!(cfg.target_dir.is_none());
    assert!(cfg.log_file.is_none());
    assert_eq!(cfg.max_collision_attempts, defaults.max_collision_attempts);
    assert_eq!(cfg.extensions, defaults.extensions);
}

#[test]
fn unknown_element_is_rejected() {
    let td = tempdir().unwrap();
    let path = td.path().join("config.xml");
    write_xml(&path, "  <sourc_dir>/typo</sourc_dir>");
    assert!(load_config_from_xml_path(&path).is_err());
}

#[test]
fn bad_boolean_names_the_field() {
    let td = tempdir().unwrap();
    let path = td.path().join("config.xml");
    write_xml(&path, "  <dry_run>maybe</dry_run>");
    let err = load_config_from_xml_path(&path).unwrap_err();
    assert!(format!("{err:#}").contains("dry_run"), "{err:#}");
}

#[test]
#[serial]
fn explicit_env_file_is_loaded() {
    let td = tempdir().unwrap();
    let path = td.path().join("explicit.xml");
    write_xml(&path, "  <copy_mode>true</copy_mode>");

    unsafe { env::set_var(CONFIG_ENV, &path) };
    let loaded = load_config();
    unsafe { env::remove_var(CONFIG_ENV) };

    let (cfg, _source) = loaded.unwrap();
    assert!(cfg.copy_mode);
}

#[test]
#[serial]
fn explicit_env_file_must_exist() {
    let td = tempdir().unwrap();
    unsafe { env::set_var(CONFIG_ENV, td.path().join("missing.xml")) };
    let loaded = load_config();
    unsafe { env::remove_var(CONFIG_ENV) };

    let err = loaded.unwrap_err();
    assert!(err.to_string().contains("does not exist"), "{err}");
}

#[test]
fn validation_rejects_missing_source() {
    let td = TempDir::new().unwrap();
    let mut cfg = Config::new(td.path().join("nope"), td.path().join("out"));
    let err = cfg.validate_and_normalize().unwrap_err();
    assert!(err.to_string().contains("source_dir"), "{err}");
}

#[test]
fn validation_rejects_zero_threads() {
    let td = TempDir::new().unwrap();
    let mut cfg = Config::new(td.path(), td.path().join("out"));
    cfg.max_threads = 0;
    assert!(cfg.validate_and_normalize().is_err());
}

#[test]
fn validation_rejects_target_inside_trash() {
    let td = TempDir::new().unwrap();
    let mut cfg = Config::new(td.path(), td.path().join(".trash/archive"));
    let err = cfg.validate_and_normalize().unwrap_err();
    assert!(err.to_string().contains(".trash"), "{err}");
}

#[test]
fn dry_run_validation_does_not_create_target() {
    let td = TempDir::new().unwrap();
    let target = td.path().join("out");
    let mut cfg = Config::new(td.path(), &target);
    cfg.dry_run = true;
    cfg.validate_and_normalize().unwrap();
    assert!(!target.exists());
}

#[test]
fn validation_creates_target_and_canonicalizes() {
    let td = TempDir::new().unwrap();
    let root = dunce::canonicalize(td.path()).unwrap();
    let mut cfg = Config::new(td.path(), td.path().join("archive/photos"));
    cfg.validate_and_normalize().expect("target is created");
    assert_eq!(cfg.source_dir, root);
    assert_eq!(cfg.target_root(), root.join("archive/photos"));
    assert!(cfg.target_root().is_dir());
}
