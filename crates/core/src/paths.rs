use regex::Regex;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::OnceLock;

const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Lexically cleans `path` (`.`/`..` segments, duplicate separators) and
/// converts host separators to `/`. An empty input cleans to `"."`.
pub fn normalize_path(path: &str) -> String {
    let slashed = if MAIN_SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace(MAIN_SEPARATOR, "/")
    };
    clean(&slashed)
}

fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

pub fn path_to_string(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

pub fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Final element of a `/`-separated path.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Everything but the final element, cleaned.
pub fn dir_name(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(index) => normalize_path(&path[..index]),
        None => ".".to_string(),
    }
}

/// Joins a rendered relative path below `root`. An empty root leaves the
/// relative path as-is.
pub fn join_destination(root: &str, relative: &str) -> String {
    if root.is_empty() {
        normalize_path(relative)
    } else {
        normalize_path(&format!("{root}/{relative}"))
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn date_basename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]{4}([-/][0-9]{2}([-/][0-9]{2})?)?)$").expect("static regex")
    })
}

fn date_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]{4}(/[0-9]{2}(/[0-9]{2})?)?)$").expect("static regex")
    })
}

/// A folder is a date folder when its own name looks like `YYYY`, `YYYY-MM`
/// or `YYYY-MM-DD`, or when the whole path ends in a `YYYY/MM/DD` style tree.
pub fn is_date_folder(folder: &str) -> bool {
    let folder = normalize_path(folder);
    date_basename_pattern().is_match(base_name(&folder)) || date_suffix_pattern().is_match(&folder)
}

/// Adds `candidate` to a set of start directories so that no listed
/// directory is nested inside another. Returns the new, sorted set.
pub fn add_start_directory(directories: &[String], candidate: &str) -> Vec<String> {
    let candidate = normalize_path(candidate);
    let candidate_prefix = format!("{}/", candidate.trim_end_matches('/'));

    let mut covered_by_parent = false;
    let mut out = Vec::with_capacity(directories.len() + 1);
    for existing in directories {
        let existing_prefix = format!("{}/", existing.trim_end_matches('/'));
        if candidate.starts_with(&existing_prefix) {
            covered_by_parent = true;
        }
        if existing.starts_with(&candidate_prefix) || *existing == candidate {
            continue;
        }
        out.push(existing.clone());
    }
    if !covered_by_parent {
        out.push(candidate);
    }
    out.sort();
    out
}
