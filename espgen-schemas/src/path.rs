//! Key paths into the configuration tree, used to point errors at the
//! offending key (`switch[0].forced_addr`).

use std::fmt;

/// One step of a [`ConfigPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Mapping key
    Key(String),
    /// List index
    Index(usize),
}

/// Location of a value in the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    segments: Vec<PathSegment>,
}

impl ConfigPath {
    /// The document root
    pub fn root() -> Self {
        Self::default()
    }

    /// Path to a top-level section
    pub fn section(key: &str) -> Self {
        Self::root().key(key)
    }

    /// This path extended by a mapping key
    pub fn key(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Key(key.to_string()));
        next
    }

    /// This path extended by a list index
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Index(index));
        next
    }

    /// Segments from the root down
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether this is the document root
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Top-level section this path lives under
    pub fn domain(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Last mapping key of the path
    pub fn leaf(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        })
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl serde::Serialize for ConfigPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_like_yaml_access() {
        let path = ConfigPath::section("switch").index(0).key("forced_addr");
        assert_eq!(path.to_string(), "switch[0].forced_addr");
        assert_eq!(path.domain(), Some("switch"));
        assert_eq!(path.leaf(), Some("forced_addr"));
    }

    #[test]
    fn root_has_a_name() {
        assert_eq!(ConfigPath::root().to_string(), "<root>");
        assert!(ConfigPath::root().is_root());
    }

    #[test]
    fn nested_lists() {
        let path = ConfigPath::section("wifi").key("networks").index(2).key("ssid");
        assert_eq!(path.to_string(), "wifi.networks[2].ssid");
    }
}
