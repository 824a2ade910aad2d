//! Dotted numeric versions with an optional prerelease tag.
//!
//! Parsing is lenient: the first `major[.minor[.revision[.build]]][-pre]`
//! run found anywhere in the input wins, so assembly identities, package
//! folder names and hint paths all parse. Input without any number yields
//! the zero version.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|\.)(?P<major>\d+)(?:\.(?P<minor>\d+))?(?:\.(?P<revision>\d+))?(?:\.(?P<build>\d+))?(?:-(?P<prerelease>[^\\/]+))?",
    )
    .expect("version pattern is valid")
});

#[derive(Debug, Clone, Default)]
pub struct Version {
    major: u64,
    minor: Option<u64>,
    revision: Option<u64>,
    build: Option<u64>,
    prerelease: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, revision: u64, build: u64) -> Self {
        Self {
            major,
            minor: Some(minor),
            revision: Some(revision),
            build: Some(build),
            prerelease: None,
        }
    }

    pub fn parse(input: &str) -> Self {
        let Some(caps) = VERSION.captures(input) else {
            return Self::default();
        };
        let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u64>().ok());
        let Some(major) = number("major") else {
            return Self::default();
        };
        Self {
            major,
            minor: number("minor"),
            revision: number("revision"),
            build: number("build"),
            prerelease: caps
                .name("prerelease")
                .map(|m| m.as_str().to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor.unwrap_or(0)
    }

    pub fn revision(&self) -> u64 {
        self.revision.unwrap_or(0)
    }

    pub fn build(&self) -> u64 {
        self.build.unwrap_or(0)
    }

    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    pub fn is_zero(&self) -> bool {
        self.cmp(&Self::default()) == Ordering::Equal
    }

    /// Major and minor only. Two builds of the same release compare equal.
    pub fn compare_release(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor().cmp(&other.minor()))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_release(other)
            .then(self.revision().cmp(&other.revision()))
            .then(self.build().cmp(&other.build()))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{minor}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
                if let Some(build) = self.build {
                    write!(f, ".{build}")?;
                }
            }
        }
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl From<&str> for Version {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}
