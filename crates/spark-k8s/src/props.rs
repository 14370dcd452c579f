use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{SparkK8sError, SparkK8sResult};

/// Keys whose values are `-Dname=value` option strings rather than plain
/// assignments.
const OPTIONS_LIKE_KEYS: &[&str] = &["spark.driver.extraJavaOptions"];

fn is_options_like(key: &str) -> bool {
    OPTIONS_LIKE_KEYS.contains(&key)
}

/// A single property entry. Option-set entries keep their parsed sub-options
/// so that merging dispatches on the variant instead of re-deriving key
/// membership from the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Plain(String),
    OptionSet(BTreeMap<String, String>),
}

impl PropertyValue {
    fn render(&self) -> String {
        match self {
            PropertyValue::Plain(v) => v.clone(),
            PropertyValue::OptionSet(options) => render_options(options),
        }
    }
}

/// Immutable key/value configuration container backed by a properties file.
///
/// Merging produces a new instance; inputs are never modified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyFile {
    props: BTreeMap<String, PropertyValue>,
}

impl PropertyFile {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a property file from raw string pairs, classifying each entry
    /// against the options-like allow-list.
    pub fn from_map(props: BTreeMap<String, String>) -> SparkK8sResult<Self> {
        let mut classified = BTreeMap::new();
        for (key, value) in props {
            let value = classify(&key, &value)?;
            classified.insert(key, value);
        }
        Ok(Self { props: classified })
    }

    /// Read a properties file, expanding `$VAR` / `${VAR}` references against
    /// the ambient process environment.
    pub fn read<P: AsRef<Path>>(path: P) -> SparkK8sResult<Self> {
        let environ: HashMap<String, String> = std::env::vars().collect();
        Self::read_with_env(path, &environ)
    }

    /// Read a properties file, expanding variable references against the
    /// given environment snapshot. Unresolvable references are left verbatim.
    pub fn read_with_env<P: AsRef<Path>>(
        path: P,
        environ: &HashMap<String, String>,
    ) -> SparkK8sResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                SparkK8sError::FileNotFound(path.display().to_string())
            }
            _ => SparkK8sError::IOError(e),
        })?;

        let mut props = BTreeMap::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (key, raw_value) = parse_line(trimmed).ok_or_else(|| {
                SparkK8sError::MalformedProperty {
                    file: path.display().to_string(),
                    line: index + 1,
                    reason: "no value token".to_string(),
                }
            })?;
            let expanded = expand_env(&raw_value, environ);
            let value = classify(&key, &expanded)?;
            props.insert(key, value);
        }

        Ok(Self { props })
    }

    /// Write out one `key=value` line per entry, values right-trimmed, in
    /// iteration order.
    pub fn write<W: Write>(&self, sink: &mut W) -> SparkK8sResult<()> {
        for (key, value) in &self.props {
            writeln!(sink, "{}={}", key, value.render().trim_end())?;
        }
        Ok(())
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> SparkK8sResult<()> {
        let mut file = File::create(path)?;
        self.write(&mut file)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Rendered value for a key, option sets serialized back to `-Dk=v` form.
    pub fn get(&self, key: &str) -> Option<String> {
        self.props.get(key).map(PropertyValue::render)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    /// Parsed option views of the options-like entries.
    pub fn options(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.props
            .iter()
            .filter_map(|(k, v)| match v {
                PropertyValue::OptionSet(options) => Some((k.clone(), options.clone())),
                PropertyValue::Plain(_) => None,
            })
            .collect()
    }

    /// All entries rendered to plain strings.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.props
            .iter()
            .map(|(k, v)| (k.clone(), v.render()))
            .collect()
    }

    /// Right-biased merge: priority increases left to right, so on conflict
    /// the last-listed file wins. Option-set entries are merged sub-option by
    /// sub-option rather than as whole strings.
    pub fn union(&self, others: &[&PropertyFile]) -> PropertyFile {
        let mut merged: BTreeMap<String, PropertyValue> = BTreeMap::new();
        for file in std::iter::once(self).chain(others.iter().copied()) {
            for (key, value) in &file.props {
                match value {
                    PropertyValue::OptionSet(incoming) => match merged.entry(key.clone()) {
                        Entry::Occupied(mut entry) => {
                            if let PropertyValue::OptionSet(existing) = entry.get_mut() {
                                existing
                                    .extend(incoming.iter().map(|(k, v)| (k.clone(), v.clone())));
                            } else {
                                entry.insert(value.clone());
                            }
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(value.clone());
                        }
                    },
                    PropertyValue::Plain(_) => {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        PropertyFile { props: merged }
    }

    /// Convenience for merging a single other file.
    pub fn merge(&self, other: &PropertyFile) -> PropertyFile {
        self.union(&[other])
    }

    /// Log every entry at info level.
    pub fn log(&self) -> &Self {
        for (key, value) in &self.props {
            spark_common::info!("{}={}", key, value.render());
        }
        self
    }
}

impl fmt::Display for PropertyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.props {
            writeln!(f, "{}={}", key, value.render().trim_end())?;
        }
        Ok(())
    }
}

/// Split one non-empty line into key and raw value. Options-like keys split
/// only on the first `=` so embedded `=` and spaces survive; plain keys split
/// on `=` or whitespace with repeats collapsed.
fn parse_line(line: &str) -> Option<(String, String)> {
    let mut tokens = line
        .split(|c: char| c == '=' || c.is_whitespace())
        .filter(|t| !t.is_empty());
    let key = tokens.next()?.trim().to_string();
    if is_options_like(&key) {
        let (_, rest) = line.split_once('=')?;
        Some((key, rest.trim().to_string()))
    } else {
        let value = tokens.next()?.trim().to_string();
        Some((key, value))
    }
}

fn classify(key: &str, value: &str) -> SparkK8sResult<PropertyValue> {
    if is_options_like(key) {
        Ok(PropertyValue::OptionSet(parse_options(value)?))
    } else {
        Ok(PropertyValue::Plain(value.to_string()))
    }
}

/// Parse a `-Dname=value ...` option string into a map. Surrounding quote
/// characters are stripped before tokenizing.
fn parse_options(options_string: &str) -> SparkK8sResult<BTreeMap<String, String>> {
    let mut options = BTreeMap::new();
    if options_string.is_empty() {
        return Ok(options);
    }

    let line: String = options_string
        .trim()
        .chars()
        .filter(|c| *c != '\'' && *c != '"')
        .collect();
    for arg in line.split("-D").skip(1) {
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| SparkK8sError::MalformedOption(arg.trim().to_string()))?;
        options.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(options)
}

fn render_options(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(k, v)| format!("-D{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Expand `$VAR` and `${VAR}` references against the given environment.
/// References to undefined variables are left literally unexpanded.
fn expand_env(value: &str, environ: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some((_, '{')) => {
                let rest = &value[start + 2..];
                match rest.find('}') {
                    Some(end) if is_var_name(&rest[..end]) => {
                        let name = &rest[..end];
                        match environ.get(name) {
                            Some(v) => result.push_str(v),
                            None => {
                                result.push_str(&value[start..start + 3 + end]);
                            }
                        }
                        // skip "{name}"
                        for _ in 0..end + 2 {
                            chars.next();
                        }
                    }
                    _ => result.push(c),
                }
            }
            Some((_, n)) if n.is_ascii_alphabetic() || *n == '_' => {
                let rest = &value[start + 1..];
                let end = rest
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());
                let name = &rest[..end];
                match environ.get(name) {
                    Some(v) => result.push_str(v),
                    None => result.push_str(&value[start..start + 1 + end]),
                }
                for _ in 0..end {
                    chars.next();
                }
            }
            _ => result.push(c),
        }
    }
    result
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}
