use std::fmt;
use std::str::FromStr;

// One path prefix -> one backend base address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub prefix: String,
    pub backend: String,
    pub protected: bool,
}

impl RouteEntry {
    pub fn new(prefix: &str, backend: &str, protected: bool) -> Self {
        let prefix = match prefix.trim_end_matches('/') {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        // add http:// if not present
        let backend = if backend.starts_with("http://") || backend.starts_with("https://") {
            backend.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", backend.trim_end_matches('/'))
        };
        Self {
            prefix,
            backend,
            protected,
        }
    }

    pub fn public(prefix: &str, backend: &str) -> Self {
        Self::new(prefix, backend, false)
    }

    pub fn protected(prefix: &str, backend: &str) -> Self {
        Self::new(prefix, backend, true)
    }

    // prefix match on whole path segments only
    fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRouteError(String);

impl fmt::Display for ParseRouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected PREFIX=URL, got `{}`", self.0)
    }
}

impl std::error::Error for ParseRouteError {}

// "PREFIX=URL" as given on the command line; protected by default
impl FromStr for RouteEntry {
    type Err = ParseRouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((prefix, backend))
                if prefix.starts_with('/') && !backend.trim().is_empty() =>
            {
                Ok(Self::protected(prefix.trim(), backend.trim()))
            }
            _ => Err(ParseRouteError(s.to_string())),
        }
    }
}

/// Static route table, built once at startup and read without locking.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    // longest prefix first
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(mut entries: Vec<RouteEntry>) -> Self {
        // stable sort keeps the first of two equal prefixes in front
        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { entries }
    }

    /// Longest matching prefix wins.
    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.matches(path))
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
