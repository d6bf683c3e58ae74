//! Filesystem paths
//!
//! A [`Path`] addresses a folder or file inside a container:
//! `container://dir/subdir/identify.type`. The container prefix is optional
//! and defaults to the floating `current` container. A path whose last
//! segment carries a `.type` suffix is a file path; every other path is a
//! directory path.

use crate::error::PathError;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Placeholder container name of a floating path.
pub const CURRENT_CONTAINER: &str = "current";

/// Container name of the process-wide static container.
pub const STATIC_CONTAINER: &str = "static";

static CONTAINER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<container>[\w-]+):/(?P<url>.*)$").expect("valid regex"));

static SEGMENT_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\-\s.]*$").expect("valid regex"));

static FILE_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<identify>[\w\-\s]*)\.(?P<type>[\w]*)$").expect("valid regex")
});

static TYPE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").expect("valid regex"));

/// Immutable filesystem address.
///
/// Equality and hashing are structural over the container name, directory
/// vector, file identify and file type. The rendered forms are computed once
/// and cached.
#[derive(Clone)]
pub struct Path {
    container: String,
    directories: Vec<String>,
    identify: String,
    file_type: String,
    full: OnceCell<String>,
    short: OnceCell<String>,
}

/// Segments parsed out of the `/`-separated tail of a path string
struct ParsedSegments {
    directories: Vec<String>,
    identify: String,
    file_type: String,
}

impl Path {
    /// Parse a full (`container://a/b`) or short (`/a/b`, `a/b.int`) path.
    pub fn parse(input: &str) -> Result<Path, PathError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PathError::Format(
                "empty path can not be a valid path".to_string(),
            ));
        }

        let (container, url) = match CONTAINER_PREFIX.captures(input) {
            Some(caps) => {
                let url = caps.name("url").map(|m| m.as_str()).unwrap_or_default();
                if !url.starts_with('/') {
                    return Err(PathError::Format(format!(
                        "container and path must be linked by '://' in '{}'",
                        input
                    )));
                }
                (caps["container"].to_lowercase(), url.to_string())
            }
            None => {
                if input == "/" {
                    return Ok(Path::root_of(CURRENT_CONTAINER));
                }
                let url = if input.starts_with('/') {
                    input.to_string()
                } else {
                    format!("/{}", input)
                };
                (CURRENT_CONTAINER.to_string(), url)
            }
        };

        let parsed = parse_segments(&url, Vec::new())?;
        Ok(Path::from_parts(
            container,
            parsed.directories,
            parsed.identify,
            parsed.file_type,
        ))
    }

    /// The root directory of a container.
    pub fn root_of(container: &str) -> Path {
        Path::from_parts(container.to_lowercase(), Vec::new(), String::new(), String::new())
    }

    /// `static://`
    pub fn static_root() -> Path {
        Path::root_of(STATIC_CONTAINER)
    }

    /// `current://`
    pub fn current_root() -> Path {
        Path::root_of(CURRENT_CONTAINER)
    }

    fn from_parts(
        container: String,
        directories: Vec<String>,
        identify: String,
        file_type: String,
    ) -> Path {
        Path {
            container,
            directories,
            identify,
            file_type,
            full: OnceCell::new(),
            short: OnceCell::new(),
        }
    }

    /// Descend from this directory path by a relative path.
    pub fn forward(&self, relative: &str) -> Result<Path, PathError> {
        if self.is_file_path() {
            return Err(PathError::NotAFolderPath(self.full_path().to_string()));
        }
        let relative = relative.trim();
        if relative.is_empty() {
            return Err(PathError::Format(
                "relative path can not be empty".to_string(),
            ));
        }
        let url = if relative.starts_with('/') {
            relative.to_string()
        } else {
            format!("/{}", relative)
        };
        let parsed = parse_segments(&url, self.directories.clone())?;
        Ok(Path::from_parts(
            self.container.clone(),
            parsed.directories,
            parsed.identify,
            parsed.file_type,
        ))
    }

    /// Climb `distance` levels. A file path spends one step becoming its
    /// parent directory.
    pub fn backward(&self, distance: usize) -> Result<Path, PathError> {
        if distance < 1 {
            return Err(PathError::Format(
                "backward distance must be at least 1".to_string(),
            ));
        }
        let mut remaining = distance;
        if self.is_file_path() {
            remaining -= 1;
        }
        let keep = self.directories.len().saturating_sub(remaining);
        Ok(Path::from_parts(
            self.container.clone(),
            self.directories[..keep].to_vec(),
            String::new(),
            String::new(),
        ))
    }

    /// The directory path that contains this path's target.
    pub fn parent(&self) -> Result<Path, PathError> {
        self.backward(1)
    }

    /// Child folder path, validating `name` as a single directory segment.
    pub fn join_folder(&self, name: &str) -> Result<Path, PathError> {
        if self.is_file_path() {
            return Err(PathError::NotAFolderPath(self.full_path().to_string()));
        }
        validate_folder_name(name)?;
        let mut directories = self.directories.clone();
        directories.push(name.to_string());
        Ok(Path::from_parts(
            self.container.clone(),
            directories,
            String::new(),
            String::new(),
        ))
    }

    /// Child file path, validating `identify` and `type_tag`.
    pub fn join_file(&self, identify: &str, type_tag: &str) -> Result<Path, PathError> {
        if self.is_file_path() {
            return Err(PathError::NotAFolderPath(self.full_path().to_string()));
        }
        validate_file_parts(identify, type_tag)?;
        Ok(Path::from_parts(
            self.container.clone(),
            self.directories.clone(),
            identify.to_string(),
            type_tag.to_string(),
        ))
    }

    /// Replace the floating `current` container with a concrete one.
    ///
    /// Non-floating paths are returned unchanged.
    pub fn resolve_floating(self, container: &str) -> Result<Path, PathError> {
        let container = container.trim().to_lowercase();
        if container.is_empty() || container == CURRENT_CONTAINER {
            return Err(PathError::InvalidContainer(container));
        }
        if !self.is_floating() {
            return Ok(self);
        }
        Ok(Path::from_parts(
            container,
            self.directories,
            self.identify,
            self.file_type,
        ))
    }

    /// `true` when `sub` lives under the directory path `sup`.
    pub fn is_sub_of(sub: &Path, sup: &Path) -> bool {
        if sup.is_file_path() {
            return false;
        }
        if sub.container != sup.container {
            return false;
        }
        if sub.directories.len() < sup.directories.len() {
            return false;
        }
        sup.directories
            .iter()
            .zip(sub.directories.iter())
            .all(|(a, b)| a == b)
    }

    pub fn sub_of(&self, sup: &Path) -> bool {
        Path::is_sub_of(self, sup)
    }

    pub fn super_of(&self, sub: &Path) -> bool {
        Path::is_sub_of(sub, self)
    }

    pub fn container_name(&self) -> &str {
        &self.container
    }

    pub fn directory_vector(&self) -> &[String] {
        &self.directories
    }

    pub fn file_identify(&self) -> &str {
        &self.identify
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn is_file_path(&self) -> bool {
        !self.file_type.is_empty()
    }

    pub fn is_directory_path(&self) -> bool {
        self.file_type.is_empty()
    }

    pub fn is_floating(&self) -> bool {
        self.container == CURRENT_CONTAINER
    }

    pub fn is_static(&self) -> bool {
        self.container == STATIC_CONTAINER
    }

    /// Last directory segment, or the container name for a root path.
    pub fn directory_name(&self) -> &str {
        self.directories
            .last()
            .map(String::as_str)
            .unwrap_or(&self.container)
    }

    /// `identify.type` for file paths.
    pub fn file_name(&self) -> Option<String> {
        if self.is_file_path() {
            Some(format!("{}.{}", self.identify, self.file_type))
        } else {
            None
        }
    }

    /// Rendered path without the container prefix.
    pub fn short_path(&self) -> &str {
        self.short.get_or_init(|| self.render_tail())
    }

    /// Rendered `container://...` form.
    pub fn full_path(&self) -> &str {
        self.full
            .get_or_init(|| format!("{}:/{}", self.container, self.render_tail()))
    }

    fn render_tail(&self) -> String {
        let mut out = String::new();
        for dir in &self.directories {
            out.push('/');
            out.push_str(dir);
        }
        if self.is_file_path() {
            out.push('/');
            out.push_str(&self.identify);
            out.push('.');
            out.push_str(&self.file_type);
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }
}

fn parse_segments(url: &str, mut directories: Vec<String>) -> Result<ParsedSegments, PathError> {
    // Leading '/' yields an empty first element.
    let raw: Vec<&str> = url.split('/').skip(1).collect();
    let mut identify = String::new();
    let mut file_type = String::new();

    for (i, segment) in raw.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if segment.trim().is_empty() {
            return Err(PathError::Format(
                "directory name can not be blank".to_string(),
            ));
        }
        if !SEGMENT_CHARS.is_match(segment) {
            return Err(PathError::Format(format!(
                "segment '{}' contains invalid characters",
                segment
            )));
        }
        if segment.contains('.') {
            if i != raw.len() - 1 {
                return Err(PathError::Format(format!(
                    "directory name '{}' must not contain a dot",
                    segment
                )));
            }
            let caps = FILE_SEGMENT.captures(segment).ok_or_else(|| {
                PathError::Format(format!("file name '{}' must be 'identify.type'", segment))
            })?;
            if caps["type"].is_empty() {
                return Err(PathError::Format(format!(
                    "file '{}' must have a type",
                    segment
                )));
            }
            identify = caps["identify"].to_string();
            file_type = caps["type"].to_string();
            break;
        }
        directories.push(segment.to_string());
    }

    Ok(ParsedSegments {
        directories,
        identify,
        file_type,
    })
}

pub(crate) fn validate_folder_name(name: &str) -> Result<(), PathError> {
    if name.trim().is_empty() {
        return Err(PathError::Format(
            "directory name can not be blank".to_string(),
        ));
    }
    if name.contains('/') || name.contains('.') || !SEGMENT_CHARS.is_match(name) {
        return Err(PathError::Format(format!(
            "'{}' is not a valid directory name",
            name
        )));
    }
    Ok(())
}

pub(crate) fn validate_file_parts(identify: &str, type_tag: &str) -> Result<(), PathError> {
    if identify.contains('/') || identify.contains('.') || !SEGMENT_CHARS.is_match(identify) {
        return Err(PathError::Format(format!(
            "'{}' is not a valid file identify",
            identify
        )));
    }
    if !is_valid_type_tag(type_tag) {
        return Err(PathError::Format(format!(
            "'{}' is not a valid type tag",
            type_tag
        )));
    }
    Ok(())
}

/// Type tags are a single word: letters, digits and `_`.
pub(crate) fn is_valid_type_tag(tag: &str) -> bool {
    TYPE_TAG.is_match(tag)
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container
            && self.directories == other.directories
            && self.identify == other.identify
            && self.file_type == other.file_type
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container.hash(state);
        self.directories.hash(state);
        self.identify.hash(state);
        self.file_type.hash(state);
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.full_path())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_path())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}
