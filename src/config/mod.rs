//! YAML configuration accessor
//!
//! A thin path-based reader over a parsed YAML document. Lookups walk a
//! `/`-separated path through mapping and sequence nodes; every getter
//! takes a typed fallback so callers never deal with missing keys.
//!
//! The daemon reads the tree once at startup to create servers and
//! channels. A reload (`SIGUSR1`) only re-parses the file; it does not
//! reconcile live servers against the new tree.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::{Error, Result};

/// Parsed configuration document plus its source path
#[derive(Debug)]
pub struct Config {
    path: PathBuf,
    root: Value,
}

impl Config {
    /// Load and parse a YAML file. The path `-` reads from stdin.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let root = parse_file(&path)?;
        Ok(Self { path, root })
    }

    /// Re-parse the source file, replacing the document tree.
    ///
    /// On parse failure the previous tree is kept.
    pub fn reload(&mut self) -> Result<()> {
        self.root = parse_file(&self.path)?;
        Ok(())
    }

    /// Source file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root document node
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Resolve a `/`-separated path from the document root
    pub fn node(&self, path: &str) -> Option<&Value> {
        find_node(&self.root, path)
    }

    /// String value at `path`, or `fallback`
    pub fn get_str(&self, path: &str, fallback: &str) -> String {
        get_str_at(&self.root, path, fallback)
    }

    /// Integer value at `path`, or `fallback`
    pub fn get_int(&self, path: &str, fallback: i64) -> i64 {
        get_int_at(&self.root, path, fallback)
    }

    /// Float value at `path`, or `fallback`
    pub fn get_float(&self, path: &str, fallback: f64) -> f64 {
        get_float_at(&self.root, path, fallback)
    }

    /// Boolean value at `path`, or `fallback` (see [`parse_bool`])
    pub fn get_bool(&self, path: &str, fallback: bool) -> bool {
        get_bool_at(&self.root, path, fallback)
    }
}

fn parse_file(path: &Path) -> Result<Value> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())
            .map_err(|e| Error::Config(format!("reading stdin: {}", e)))?
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?
    };
    parse_str(&text)
}

fn parse_str(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(text).map_err(|e| Error::Config(format!("yaml parse error: {}", e)))
}

/// Resolve a `/`-separated path starting at `node`.
///
/// Mapping steps are key lookups, sequence steps are numeric indexes.
/// Empty path segments are skipped, so `servers/0` and `/servers/0/`
/// resolve the same node.
pub fn find_node<'a>(node: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = node;
    for tok in path.split('/').filter(|t| !t.is_empty()) {
        node = match node {
            Value::Sequence(_) => node.get(tok.parse::<usize>().ok()?)?,
            Value::Mapping(_) => node.get(tok)?,
            _ => return None,
        };
    }
    Some(node)
}

/// String value at `path` under `node`, or `fallback`.
///
/// Numeric and boolean scalars render to their string form.
pub fn get_str_at(node: &Value, path: &str, fallback: &str) -> String {
    match find_node(node, path).and_then(scalar_string) {
        Some(s) => s,
        None => fallback.to_string(),
    }
}

/// Integer value at `path` under `node`, or `fallback`
pub fn get_int_at(node: &Value, path: &str, fallback: i64) -> i64 {
    match find_node(node, path) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(fallback),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(fallback),
        _ => fallback,
    }
}

/// Float value at `path` under `node`, or `fallback`
pub fn get_float_at(node: &Value, path: &str, fallback: f64) -> f64 {
    match find_node(node, path) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(fallback),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(fallback),
        _ => fallback,
    }
}

/// Boolean value at `path` under `node`, or `fallback`
pub fn get_bool_at(node: &Value, path: &str, fallback: bool) -> bool {
    match find_node(node, path) {
        Some(Value::Bool(b)) => *b,
        Some(v) => match scalar_string(v) {
            Some(s) => parse_bool(&s),
            None => fallback,
        },
        None => fallback,
    }
}

/// Parse the word forms accepted for boolean config values.
///
/// Case-insensitive: `y…`/`t…` are true, `n…`/`f…` are false, `on` is
/// true and any other `o…` word is false. Anything else is read as a
/// number, non-zero meaning true. Empty input is false.
pub fn parse_bool(s: &str) -> bool {
    let s = s.trim();
    let first = match s.chars().next() {
        Some(c) => c.to_ascii_lowercase(),
        None => return false,
    };
    match first {
        'y' | 't' => true,
        'n' | 'f' => false,
        'o' => s.eq_ignore_ascii_case("on"),
        _ => s.parse::<i64>().map(|n| n != 0).unwrap_or(false),
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
logging:
  log_level: 2
servers:
  - address: "0.0.0.0"
    port: 8080
    channels:
      test:
        publish_key: xyz
      test2:
        max_clients: 3
  - port: 1234
    address: "localhost"
    log_level: 2
    channels: {a: {publish_key: xyz}, b: {}}
"#;

    fn sample() -> Value {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_find_node_paths() {
        let root = sample();
        assert!(find_node(&root, "servers").is_some());
        assert!(find_node(&root, "servers/0/channels/test").is_some());
        assert!(find_node(&root, "servers/2").is_none());
        assert!(find_node(&root, "servers/x").is_none());
        assert!(find_node(&root, "nope/deeper").is_none());
    }

    #[test]
    fn test_get_str() {
        let root = sample();
        assert_eq!(get_str_at(&root, "servers/0/address", "?"), "0.0.0.0");
        assert_eq!(
            get_str_at(&root, "servers/0/channels/test/publish_key", ""),
            "xyz"
        );
        assert_eq!(get_str_at(&root, "servers/0/missing", "dflt"), "dflt");
        // numeric scalar renders to its string form
        assert_eq!(get_str_at(&root, "servers/1/port", "?"), "1234");
    }

    #[test]
    fn test_get_int() {
        let root = sample();
        assert_eq!(get_int_at(&root, "servers/0/port", -1), 8080);
        assert_eq!(
            get_int_at(&root, "servers/0/channels/test2/max_clients", -1),
            3
        );
        assert_eq!(get_int_at(&root, "servers/0/address", -1), -1);
        assert_eq!(get_int_at(&root, "logging/log_level", -1), 2);
    }

    #[test]
    fn test_get_bool_words() {
        assert!(parse_bool("yes"));
        assert!(parse_bool("Y"));
        assert!(parse_bool("true"));
        assert!(parse_bool("T"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool("False"));
        assert!(parse_bool("on"));
        assert!(parse_bool("ON"));
        assert!(!parse_bool("off"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
        assert!(!parse_bool("banana"));
    }

    #[test]
    fn test_get_bool_at() {
        let root: Value = serde_yaml::from_str("a: yes\nb: 0\nc: {}\n").unwrap();
        assert!(get_bool_at(&root, "a", false));
        assert!(!get_bool_at(&root, "b", true));
        // non-scalar falls back
        assert!(get_bool_at(&root, "c", true));
        assert!(!get_bool_at(&root, "missing", false));
    }

    #[test]
    fn test_empty_document() {
        let root = parse_str("").unwrap();
        assert!(matches!(root, Value::Null));
        assert_eq!(get_str_at(&root, "anything", "fb"), "fb");
    }

    #[test]
    fn test_config_load_and_reload() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("cometps-conf-{}.yml", std::process::id()));
        std::fs::write(&path, "servers:\n  - port: 9000\n").unwrap();

        let mut config = Config::load(&path).unwrap();
        assert_eq!(config.get_int("servers/0/port", -1), 9000);

        std::fs::write(&path, "servers:\n  - port: 9001\n").unwrap();
        config.reload().unwrap();
        assert_eq!(config.get_int("servers/0/port", -1), 9001);

        std::fs::remove_file(&path).unwrap();
    }
}
