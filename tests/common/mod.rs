// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

pub const BINARY: &str = env!("CARGO_BIN_EXE_logtally");

/// Access-log line whose user agent is an app, not a browser
pub const APP_LINE: &str = "183.162.52.7 - - [10/Nov/2016:00:01:02 +0800] \"POST /api3/getadv HTTP/1.1\" 200 813 \"www.imooc.com\" \"-\" cid=0&timestamp=1478707261865&uid=2871142 \"mukewang/5.0.0 (Android 5.1.1; Xiaomi Redmi 3 Build/LMY47V),Network 2G/3G\" \"-\" 10.100.134.244:80 200 0.027 0.027";
pub const CHROME_LINE: &str = "10.100.0.1 - - [10/Nov/2016:00:01:02 +0800] \"HEAD / HTTP/1.1\" 301 0 \"117.121.101.40\" \"-\" - \"Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/54.0.2840.71 Safari/537.36\" \"-\" 10.100.16.243:80 301 0.002 0.002";
pub const FIREFOX_LINE: &str = "10.100.0.2 - - [10/Nov/2016:00:01:03 +0800] \"GET /course/list HTTP/1.1\" 200 5120 \"www.imooc.com\" \"http://www.imooc.com/\" - \"Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:49.0) Gecko/20100101 Firefox/49.0\" \"-\" 10.100.16.243:80 200 0.120 0.120";
/// Fewer than seven double quotes
pub const SHORT_LINE: &str = "10.100.0.3 - - [10/Nov/2016:00:01:04 +0800] \"GET / HTTP/1.1\" 200";

/// A scratch directory that also serves as HOME and working directory, so
/// that no user or project configuration leaks into a run
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create sandbox"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to a file inside the sandbox and return its path
    pub fn write(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write sandbox file");
        path
    }

    /// Run logtally with `args`, feeding `input` on stdin
    pub fn run(&self, args: &[&str], input: &str) -> (String, String, i32) {
        let mut cmd = Command::new(BINARY)
            .current_dir(self.path())
            .args(args)
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env("APPDATA", self.path())
            .env("USERPROFILE", self.path())
            .env_remove("LOGTALLY_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to start logtally");

        if let Some(mut stdin) = cmd.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .expect("Failed to write to stdin");
        }

        let output = cmd.wait_with_output().expect("Failed to read output");

        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code().unwrap_or(-1),
        )
    }
}

/// Helper function to run logtally with given arguments and input via stdin
pub fn run_logtally_with_input(args: &[&str], input: &str) -> (String, String, i32) {
    Sandbox::new().run(args, input)
}

/// Helper function to run logtally with a temporary file appended to `args`
pub fn run_logtally_with_file(args: &[&str], file_content: &str) -> (String, String, i32) {
    let sandbox = Sandbox::new();
    let path = sandbox.write("input.log", file_content);
    let path = path.to_str().expect("utf-8 temp path");

    let mut full_args = args.to_vec();
    full_args.push(path);
    sandbox.run(&full_args, "")
}

/// Parse `key\tcount` output lines into pairs, in output order
pub fn parse_tsv(stdout: &str) -> Vec<(String, u64)> {
    stdout
        .lines()
        .map(|line| {
            let (key, count) = line
                .rsplit_once('\t')
                .unwrap_or_else(|| panic!("not a key/count line: {:?}", line));
            (key.to_string(), count.parse().expect("count should be a number"))
        })
        .collect()
}

/// Helper to extract a counter from the `--stats` line, e.g. `"emissions"`
pub fn extract_stat(stderr: &str, label: &str) -> Option<u64> {
    let line = stderr.lines().find(|l| l.contains("Lines processed:"))?;
    let words: Vec<&str> = line
        .split(|c: char| c == ',' || c == ';' || c == ':' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();
    words
        .windows(2)
        .find(|pair| pair[1] == label)
        .and_then(|pair| pair[0].parse().ok())
}
