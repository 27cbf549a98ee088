#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use stateguard::tooling::{ToolInvoker, ToolSettings};

/// Converter accepting files that start with a 3-byte `BIN` header and
/// printing what follows it
pub const FAKE_CONVERTER: &str = r#"
if [ "$(head -c 3 "$1")" != "BIN" ]; then
    echo "not a state file: $1" >&2
    exit 1
fi
tail -c +4 "$1"
"#;

/// Checker printing one feature header per feature file, failing every
/// feature when the input mentions "unencrypted"
pub const FAKE_CHECKER: &str = r#"
input="$2"
features="$4"
echo "terraform-compliance v1.3.0 initiated"
for f in "$features"/*.feature; do
    [ -e "$f" ] || continue
    echo "Feature: $(basename "$f" .feature)  # $f"
    if grep -q unencrypted "$input"; then
        echo "        Failure: resource is unencrypted"
    fi
done
exit 0
"#;

/// Temporary layout with an object store root, a data directory and the
/// fake tools as `sh` scripts
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = Self { temp_dir };
        fs::create_dir_all(env.objects_root()).unwrap();
        fs::create_dir_all(env.data_dir()).unwrap();
        fs::write(env.converter_script(), FAKE_CONVERTER).unwrap();
        fs::write(env.checker_script(), FAKE_CHECKER).unwrap();
        env
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn objects_root(&self) -> PathBuf {
        self.path().join("objects")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn converter_script(&self) -> PathBuf {
        self.path().join("converter.sh")
    }

    pub fn checker_script(&self) -> PathBuf {
        self.path().join("checker.sh")
    }

    /// Write an object into the store; the content length is part of the
    /// change token, so successive writes should differ in length
    pub fn put_object(&self, bucket: &str, key: &str, content: &[u8]) {
        let path = self.objects_root().join(bucket).join(key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            converter: vec!["sh".to_string(), self.converter_script().display().to_string()],
            checker: vec!["sh".to_string(), self.checker_script().display().to_string()],
            timeout: Duration::from_secs(20),
        }
    }

    pub fn tools(&self) -> ToolInvoker {
        ToolInvoker::new(self.tool_settings())
    }

    /// Write a config file pointing at this environment and return its path
    pub fn write_config(&self, extra: &str) -> PathBuf {
        let config = format!(
            r#"
[daemon]
log_level = "warn"

[storage]
data_dir = "{data}"

[objects]
root = "{objects}"

[tools]
converter = ["sh", "{converter}"]
checker = ["sh", "{checker}"]
timeout_secs = 20

{extra}
"#,
            data = self.data_dir().display(),
            objects = self.objects_root().display(),
            converter = self.converter_script().display(),
            checker = self.checker_script().display(),
            extra = extra,
        );
        let path = self.path().join("config.toml");
        fs::write(&path, config).unwrap();
        path
    }
}
