//! Path types for addressing locations in a nested value tree.
//!
//! Paths are written in dotted notation (`user.profile.name`) and may use
//! bracket notation for indices or quoted keys (`items[0].name`,
//! `meta["display name"]`). Every path is normalized to its dotted form, so two
//! paths are equal exactly when their segment sequences are equal.
//!
//! # Core Types
//!
//! - [`Path`] - An unsized borrowed path type (always behind a reference)
//! - [`PathBuf`] - An owned path type that can be constructed and modified
//! - [`Segment`] - One key or index of a path
//!
//! # Usage
//!
//! ```rust
//! use formstate::path::{PathBuf, Segment};
//! use std::str::FromStr;
//!
//! let path = PathBuf::from_str("items[0].name").unwrap();
//! assert_eq!(path.as_str(), "items.0.name");
//!
//! let segments: Vec<Segment> = path.segments().collect();
//! assert_eq!(segments[1], Segment::Index(0));
//! ```

use std::{borrow::Borrow, fmt, ops::Deref, str::FromStr};

use thiserror::Error;

/// Error type for path validation failures.
///
/// Path strings are always normalized, so this is only produced when a single
/// segment is constructed explicitly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Invalid segment: keys cannot contain dots or brackets.
    #[error("Invalid segment '{segment}': {reason}")]
    InvalidSegment { segment: String, reason: String },
}

impl From<PathError> for crate::Error {
    fn from(err: PathError) -> Self {
        crate::Error::Path(err)
    }
}

/// Returns true when `input` is a single identifier-like key (`[A-Za-z0-9_]*`).
///
/// Such keys need no tokenization, which makes them the fast path of every
/// accessor.
pub fn is_simple_key(input: &str) -> bool {
    input.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Splits a path string into its raw segment strings.
///
/// Handles dotted keys, `[0]` indices and `["quoted"]` / `['quoted']` keys.
/// Empty segments are dropped.
pub fn tokenize(input: &str) -> Vec<String> {
    if is_simple_key(input) {
        return if input.is_empty() {
            Vec::new()
        } else {
            vec![input.to_string()]
        };
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let quote = match chars.peek() {
                    Some('"') | Some('\'') => chars.next(),
                    _ => None,
                };
                let mut inner = String::new();
                while let Some(c) = chars.next() {
                    match (quote, c) {
                        (Some(q), c) if c == q => {
                            if chars.peek() == Some(&']') {
                                chars.next();
                            }
                            break;
                        }
                        (None, ']') => break,
                        _ => inner.push(c),
                    }
                }
                if !inner.is_empty() {
                    segments.push(inner);
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Normalizes a path string into dotted form.
///
/// # Examples
///
/// ```rust
/// # use formstate::path::normalize_path;
/// assert_eq!(normalize_path(""), "");
/// assert_eq!(normalize_path(".user"), "user");
/// assert_eq!(normalize_path("user..profile"), "user.profile");
/// assert_eq!(normalize_path("items[2].name"), "items.2.name");
/// assert_eq!(normalize_path("meta['a b']"), "meta.a b");
/// ```
pub fn normalize_path(input: &str) -> String {
    if is_simple_key(input) {
        return input.to_string();
    }
    tokenize(input).join(".")
}

/// One key or index of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Mapping key
    Key(String),
    /// Sequence index
    Index(usize),
}

impl Segment {
    /// Creates a key segment, rejecting dots and brackets.
    pub fn key(s: impl Into<String>) -> Result<Self, PathError> {
        let s = s.into();
        if s.contains(['.', '[', ']']) {
            return Err(PathError::InvalidSegment {
                segment: s,
                reason: "keys cannot contain dots or brackets".to_string(),
            });
        }
        Ok(Segment::Key(s))
    }

    /// Classifies a raw segment string: canonical non-negative integers
    /// become indices. `"007"` or `"+5"` stay keys so they address the key
    /// as written.
    pub fn parse(raw: &str) -> Self {
        let canonical = !raw.is_empty()
            && raw.bytes().all(|b| b.is_ascii_digit())
            && (raw == "0" || !raw.starts_with('0'));
        match raw.parse::<usize>() {
            Ok(index) if canonical => Segment::Index(index),
            _ => Segment::Key(raw.to_string()),
        }
    }

    /// Returns the index if this is an index segment.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{k}"),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl serde::Serialize for Segment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Segment::Key(k) => serializer.serialize_str(k),
            Segment::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

/// An owned, normalized path.
///
/// # Examples
///
/// ```rust
/// # use formstate::path::PathBuf;
/// let path = PathBuf::new().push("user").push("emails").push_index(1);
/// assert_eq!(path.as_str(), "user.emails.1");
/// assert_eq!(path.parent().unwrap().as_str(), "user.emails");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathBuf {
    inner: String,
}

/// A borrowed, normalized path.
///
/// This type is unsized and must always be used behind a reference.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Path {
    inner: str,
}

impl PathBuf {
    /// Creates a new empty path.
    pub fn new() -> Self {
        Self {
            inner: String::new(),
        }
    }

    /// Creates a PathBuf by normalizing the input string.
    pub fn normalize(path: &str) -> Self {
        Self {
            inner: normalize_path(path),
        }
    }

    /// Creates a path from a slice of segments.
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> Self {
        segments
            .into_iter()
            .fold(PathBuf::new(), |path, segment| match segment {
                Segment::Key(k) => path.push(k),
                Segment::Index(i) => path.push_index(*i),
            })
    }

    /// Adds a path string to the end of this path, normalizing it.
    pub fn push(mut self, path: impl AsRef<str>) -> Self {
        let normalized = normalize_path(path.as_ref());
        if normalized.is_empty() {
            return self;
        }

        if self.inner.is_empty() {
            self.inner = normalized;
        } else {
            self.inner.push('.');
            self.inner.push_str(&normalized);
        }
        self
    }

    /// Adds an index segment to the end of this path.
    pub fn push_index(mut self, index: usize) -> Self {
        if !self.inner.is_empty() {
            self.inner.push('.');
        }
        self.inner.push_str(&index.to_string());
        self
    }

    /// Joins this path with another path.
    pub fn join(mut self, other: impl AsRef<Path>) -> Self {
        let other_path = other.as_ref();
        if self.inner.is_empty() {
            self.inner = other_path.inner.to_string();
        } else if !other_path.inner.is_empty() {
            self.inner.push('.');
            self.inner.push_str(&other_path.inner);
        }
        self
    }

    /// Returns the parent path, or `None` if this is a top-level key.
    pub fn parent(&self) -> Option<PathBuf> {
        self.inner.rfind('.').map(|last_dot| PathBuf {
            inner: self.inner[..last_dot].to_string(),
        })
    }
}

impl Path {
    /// Creates a Path from an already normalized string.
    fn from_normalized(s: &str) -> &Path {
        // SAFETY: Path is a transparent wrapper around str
        unsafe { &*(s as *const str as *const Path) }
    }

    /// Returns an iterator over the path components as string slices.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.inner.split('.').filter(|s| !s.is_empty())
    }

    /// Returns an iterator over the classified segments.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.components().map(Segment::parse)
    }

    /// Returns the number of components in the path.
    pub fn len(&self) -> usize {
        self.components().count()
    }

    /// Returns `true` if the path has no components.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the last component of the path, or `None` if empty.
    pub fn last_component(&self) -> Option<&str> {
        if self.inner.is_empty() {
            None
        } else {
            self.inner.split('.').next_back()
        }
    }

    /// Returns true if `self` lies strictly below `ancestor`.
    ///
    /// ```rust
    /// # use formstate::path::PathBuf;
    /// let child = PathBuf::normalize("items.0.name");
    /// assert!(child.is_descendant_of(&PathBuf::normalize("items")));
    /// assert!(!child.is_descendant_of(&PathBuf::normalize("item")));
    /// assert!(!child.is_descendant_of(&child));
    /// ```
    pub fn is_descendant_of(&self, ancestor: impl AsRef<Path>) -> bool {
        let ancestor = &ancestor.as_ref().inner;
        if ancestor.is_empty() {
            return !self.inner.is_empty();
        }
        self.inner.len() > ancestor.len()
            && self.inner.starts_with(ancestor)
            && self.inner.as_bytes()[ancestor.len()] == b'.'
    }

    /// Returns true if `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: impl AsRef<Path>) -> bool {
        self.inner == other.as_ref().inner || self.is_descendant_of(other)
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Converts this `Path` to an owned `PathBuf`.
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf {
            inner: self.inner.to_string(),
        }
    }
}

impl Default for PathBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for PathBuf {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        Path::from_normalized(self.inner.as_str())
    }
}

impl AsRef<Path> for PathBuf {
    fn as_ref(&self) -> &Path {
        self.deref()
    }
}

impl AsRef<Path> for Path {
    fn as_ref(&self) -> &Path {
        self
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl AsRef<str> for PathBuf {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl Borrow<Path> for PathBuf {
    fn borrow(&self) -> &Path {
        self.deref()
    }
}

impl FromStr for PathBuf {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

impl From<&str> for PathBuf {
    fn from(s: &str) -> Self {
        Self::normalize(s)
    }
}

impl From<String> for PathBuf {
    fn from(s: String) -> Self {
        Self::normalize(&s)
    }
}

impl From<&PathBuf> for PathBuf {
    fn from(path: &PathBuf) -> Self {
        path.clone()
    }
}

impl From<&Path> for PathBuf {
    fn from(path: &Path) -> Self {
        path.to_path_buf()
    }
}

impl From<&[Segment]> for PathBuf {
    fn from(segments: &[Segment]) -> Self {
        Self::from_segments(segments)
    }
}

impl fmt::Display for PathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.deref(), f)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inner.is_empty() {
            write!(f, "(empty path)")
        } else {
            write!(f, "{}", &self.inner)
        }
    }
}

/// Constructs a [`PathBuf`] from one or more components.
///
/// - `path!()` - Empty path
/// - `path!("items[0].name")` - Parsed and normalized string
/// - `path!("items", 0, "name")` - Components, including runtime values
///
/// ```rust
/// # use formstate::path;
/// let index = 3;
/// assert_eq!(path!("items", index, "name").as_str(), "items.3.name");
/// assert_eq!(path!("items[3].name"), path!("items", 3, "name"));
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::path::PathBuf::new()
    };

    ($first:expr $(, $rest:expr)* $(,)?) => {{
        let path = $crate::path::PathBuf::new().push($first.to_string());
        $(
            let path = path.push($rest.to_string());
        )*
        path
    }};
}
