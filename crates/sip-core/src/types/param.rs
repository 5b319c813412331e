//! Generic `;name[=value]` parameters shared by URIs, Via and name-addr headers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single parameter. Names compare case-insensitively, values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into),
        }
    }

    /// A parameter without a value, e.g. `;lr`
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn is_flag(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, ";{}={}", self.name, v),
            None => write!(f, ";{}", self.name),
        }
    }
}

/// Ordered parameter list
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if a parameter with this name exists, with or without a value
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Value of the named parameter. `None` both when absent and when present as a flag.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(|p| p.value.as_deref())
    }

    /// Sets or replaces a parameter, keeping its position if it already exists
    pub fn set(&mut self, name: &str, value: Option<String>) {
        match self.0.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.value = value,
            None => self.0.push(Param {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn push(&mut self, param: Param) {
        self.0.push(param);
    }

    pub fn remove(&mut self, name: &str) -> Option<Param> {
        let idx = self.0.iter().position(|p| p.name.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx))
    }
}

impl From<Vec<Param>> for Params {
    fn from(params: Vec<Param>) -> Self {
        Self(params)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.0 {
            write!(f, "{}", p)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut params = Params::new();
        params.push(Param::new("Branch", Some("z9hG4bK1")));
        params.push(Param::flag("rport"));
        assert_eq!(params.get("branch"), Some("z9hG4bK1"));
        assert!(params.contains("RPORT"));
        assert_eq!(params.get("rport"), None);
        assert_eq!(params.to_string(), ";Branch=z9hG4bK1;rport");
    }

    #[test]
    fn test_set_keeps_position() {
        let mut params = Params::new();
        params.push(Param::flag("rport"));
        params.push(Param::new("branch", Some("z9hG4bKa")));
        params.set("rport", Some("5062".to_string()));
        params.set("received", Some("10.0.0.1".to_string()));
        assert_eq!(params.to_string(), ";rport=5062;branch=z9hG4bKa;received=10.0.0.1");
        assert!(params.remove("branch").is_some());
        assert_eq!(params.len(), 2);
    }
}
