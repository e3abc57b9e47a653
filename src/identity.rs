//! Composite identity
//!
//! Resources nested under a parent are addressed by an ordered tuple of ids
//! (`pipeline_id/trigger_id`). The tuple is stored by the host tool as one
//! string, so every part must be non-empty and free of [`SEPARATOR`].

use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;

pub const SEPARATOR: char = '/';

/// Ordered identity parts, joined with [`SEPARATOR`] when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    parts: Vec<String>,
}

impl CompositeId {
    /// Build an identity, rejecting empty parts and parts containing the
    /// separator.
    pub fn new<S: AsRef<str>>(parts: &[S]) -> Result<Self> {
        let parts = parts
            .iter()
            .map(|p| {
                let p = p.as_ref();
                if p.is_empty() || p.contains(SEPARATOR) {
                    Err(Error::InvalidIdentityPart {
                        part: p.to_string(),
                        separator: SEPARATOR,
                    })
                } else {
                    Ok(p.to_string())
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn arity(&self) -> usize {
        self.parts.len()
    }

    /// Identity of the last component (the resource's own id)
    pub fn last(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

impl Serialize for CompositeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Expected layout of a resource kind's identity: one label per part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityShape {
    pub labels: &'static [&'static str],
}

impl IdentityShape {
    pub const fn new(labels: &'static [&'static str]) -> Self {
        Self { labels }
    }

    pub fn arity(&self) -> usize {
        self.labels.len()
    }

    /// Build an identity of this shape from its parts.
    pub fn build(&self, parts: &[&str]) -> Result<CompositeId> {
        if parts.len() != self.arity() {
            return Err(Error::MalformedIdentity {
                identity: parts.join(&SEPARATOR.to_string()),
                expected: self.arity(),
            });
        }
        CompositeId::new(parts)
    }

    /// Parse a stored identity string; the part count must match exactly.
    pub fn parse(&self, raw: &str) -> Result<CompositeId> {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        if parts.len() != self.arity() || parts.iter().any(|p| p.is_empty()) {
            return Err(Error::MalformedIdentity {
                identity: raw.to_string(),
                expected: self.arity(),
            });
        }
        CompositeId::new(&parts)
    }

    /// Part of `id` stored under `label`
    pub fn get<'a>(&self, id: &'a CompositeId, label: &str) -> Option<&'a str> {
        let index = self.labels.iter().position(|l| *l == label)?;
        id.parts().get(index).map(String::as_str)
    }

    /// Human readable form, e.g. `pipeline_id/trigger_id`
    pub fn describe(&self) -> String {
        self.labels.join(&SEPARATOR.to_string())
    }
}
