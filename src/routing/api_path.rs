//! RFC 8040 §3.5.3 data resource identifiers.
//!
//! ```text
//! api-path       = [ list-instance / api-identifier ] *( "/" ( list-instance / api-identifier ) )
//! api-identifier = [ module-name ":" ] identifier
//! list-instance  = api-identifier "=" key-value *( "," key-value )
//! ```
//!
//! Parsing works on the raw request path so that percent-encoded `/`, `,`
//! and `=` inside key values never change the structure.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters that are percent-encoded when a key value is written back out.
const KEY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A malformed `api-path`, with the byte offset of the problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset} of '{path}'")]
pub struct ApiPathError {
    pub path: String,
    pub offset: usize,
    pub message: String,
}

/// One step of an [`ApiPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub module: Option<String>,
    pub identifier: String,
    /// `None` for plain nodes, `Some` (possibly with empty values) for list
    /// instances and leaf-list entries.
    pub keys: Option<Vec<String>>,
}

impl Step {
    /// The qualified `module:identifier` form, or just the identifier.
    pub fn qualified_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{module}:{}", self.identifier),
            None => self.identifier.clone(),
        }
    }

    /// Whether this step is the `yang-ext:mount` mount-point marker.
    pub fn is_mount(&self) -> bool {
        self.module.as_deref() == Some("yang-ext") && self.identifier == "mount" && self.keys.is_none()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())?;
        if let Some(keys) = &self.keys {
            f.write_str("=")?;
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", utf8_percent_encode(key, KEY_VALUE))?;
            }
        }
        Ok(())
    }
}

/// A parsed, percent-decoded datastore node address. Empty addresses the
/// datastore (or operations) root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ApiPath {
    steps: Vec<Step>,
}

impl ApiPath {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Name of the targeted node qualified with the module it inherits from
    /// the nearest ancestor step that names one.
    pub fn target_name(&self) -> Option<String> {
        let last = self.steps.last()?;
        let module = self
            .steps
            .iter()
            .rev()
            .find_map(|step| step.module.as_deref());
        Some(match module {
            Some(module) => format!("{module}:{}", last.identifier),
            None => last.identifier.clone(),
        })
    }

    /// Parse a raw (percent-encoded) path without its leading `/`.
    pub fn parse(raw: &str) -> Result<Self, ApiPathError> {
        if raw.is_empty() {
            return Ok(Self::empty());
        }
        let mut steps = Vec::new();
        let mut offset = 0;
        for raw_step in raw.split('/') {
            steps.push(parse_step(raw, raw_step, offset)?);
            offset += raw_step.len() + 1;
        }
        Ok(Self { steps })
    }

    /// Parse the raw remainder handed over by the segment peeler, which is
    /// either empty or starts with `/`. A lone `/` addresses the root.
    pub fn parse_remainder(remaining: &str) -> Result<Self, ApiPathError> {
        Self::parse(remaining.strip_prefix('/').unwrap_or(remaining))
    }

    /// Split at the first `yang-ext:mount` step into the mount point and the
    /// path below it.
    pub fn split_mount(&self) -> Option<(ApiPath, ApiPath)> {
        let index = self.steps.iter().position(Step::is_mount)?;
        Some((
            ApiPath::from_steps(self.steps[..index].to_vec()),
            ApiPath::from_steps(self.steps[index + 1..].to_vec()),
        ))
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

fn parse_step(path: &str, raw: &str, offset: usize) -> Result<Step, ApiPathError> {
    let error = |at: usize, message: &str| ApiPathError {
        path: path.to_string(),
        offset: offset + at,
        message: message.to_string(),
    };

    if raw.is_empty() {
        return Err(error(0, "empty path step"));
    }
    let (name, keys) = match raw.split_once('=') {
        Some((name, keys)) => (name, Some(keys)),
        None => (raw, None),
    };

    let (module, identifier) = match name.split_once(':') {
        Some((module, identifier)) => {
            check_identifier(module).map_err(|at| error(at, "invalid module name"))?;
            check_identifier(identifier)
                .map_err(|at| error(module.len() + 1 + at, "invalid identifier"))?;
            (Some(module.to_string()), identifier.to_string())
        }
        None => {
            check_identifier(name).map_err(|at| error(at, "invalid identifier"))?;
            (None, name.to_string())
        }
    };

    let keys = match keys {
        Some(keys) => {
            let mut values = Vec::new();
            let mut at = name.len() + 1;
            for raw_value in keys.split(',') {
                values.push(decode_key(raw_value).map_err(|pos| error(at + pos, "invalid key value encoding"))?);
                at += raw_value.len() + 1;
            }
            Some(values)
        }
        None => None,
    };

    Ok(Step { module, identifier, keys })
}

/// Validate a YANG identifier, returning the offending offset on failure.
fn check_identifier(value: &str) -> Result<(), usize> {
    let mut chars = value.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return Err(0),
    }
    for (i, c) in chars {
        if !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            return Err(i);
        }
    }
    Ok(())
}

/// Strictly percent-decode a key value: every `%` must start a valid
/// escape and the result must be UTF-8.
fn decode_key(raw: &str) -> Result<String, usize> {
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(i);
            }
        }
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map(|value| value.into_owned())
        .map_err(|_| 0)
}
