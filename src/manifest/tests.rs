//! Tests for manifest loading.

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::{ManifestError, load_manifest};
use crate::resource::floating_ip::FloatingIpConfig;

struct ManifestDir {
    _tmp: TempDir,
    root: Utf8PathBuf,
}

impl ManifestDir {
    fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
        path
    }
}

#[fixture]
fn manifest_dir() -> ManifestDir {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
    ManifestDir { _tmp: tmp, root }
}

#[rstest]
fn loads_floating_ip_config(manifest_dir: ManifestDir) {
    let path = manifest_dir.write("fip.json", r#"{ "name": "web", "zone": "us-south-1" }"#);

    let config: FloatingIpConfig = load_manifest(&path).expect("valid manifest");

    assert_eq!(config.name.as_deref(), Some("web"));
    assert_eq!(config.zone.as_deref(), Some("us-south-1"));
}

#[rstest]
fn unknown_fields_are_parse_errors(manifest_dir: ManifestDir) {
    let path = manifest_dir.write("fip.json", r#"{ "zone": "us-south-1", "size": 3 }"#);

    let err = load_manifest::<FloatingIpConfig>(&path).expect_err("unknown field");

    assert!(matches!(err, ManifestError::Parse { path: ref failed, .. } if *failed == path));
}

#[rstest]
fn missing_file_is_a_read_error(manifest_dir: ManifestDir) {
    let path = manifest_dir.root.join("absent.json");

    let err = load_manifest::<FloatingIpConfig>(&path).expect_err("missing file");

    assert!(matches!(err, ManifestError::Read { .. }));
    assert!(err.to_string().contains("absent.json"));
}
