//! Slash-separated path helpers shared by every adapter.
//!
//! Adapter paths are always `/`-separated strings regardless of the host
//! platform, so these helpers operate lexically and never touch the disk.

/// Separator used by every adapter path.
pub const SEPARATOR: char = '/';

/// Lexically normalise `path`: collapse repeated separators, drop `.`
/// segments and resolve `..` against preceding segments.
///
/// An empty input cleans to `.`; a rooted path never climbs above `/`.
#[must_use]
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with(SEPARATOR);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
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

/// Join the non-empty elements with `/` and clean the result.
///
/// Returns an empty string when every element is empty.
#[must_use]
pub fn join<S: AsRef<str>>(elements: &[S]) -> String {
    let parts: Vec<&str> = elements
        .iter()
        .map(AsRef::as_ref)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return String::new();
    }
    clean(&parts.join("/"))
}

/// Final element of `path`, ignoring trailing separators.
#[must_use]
pub fn base(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return "/".to_string();
    }
    trimmed
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Everything but the final element of `path`, cleaned.
#[must_use]
pub fn parent(path: &str) -> String {
    match path.rfind(SEPARATOR) {
        Some(index) => clean(&path[..=index]),
        None => ".".to_string(),
    }
}

/// Whether `path` is rooted.
#[must_use]
pub fn is_abs(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_and_resolves_segments() {
        assert_eq!(clean(""), ".");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("//a//b/"), "/a/b");
        assert_eq!(clean("/a/./b/../c"), "/a/c");
        assert_eq!(clean("/../a"), "/a");
        assert_eq!(clean("a/../../b"), "../b");
        assert_eq!(clean("./"), ".");
    }

    #[test]
    fn join_skips_empty_elements() {
        assert_eq!(join(&["/", "alice/", "in/report.csv"]), "/alice/in/report.csv");
        assert_eq!(join(&["/", "", "/in"]), "/in");
        assert_eq!(join(&["", ""]), "");
        assert_eq!(join(&["/home/bob", "../carol", "x"]), "/home/carol/x");
    }

    #[test]
    fn base_and_parent_follow_last_separator() {
        assert_eq!(base("/home/alice/report.csv"), "report.csv");
        assert_eq!(base("/home/alice/"), "alice");
        assert_eq!(base("///"), "/");
        assert_eq!(base(""), ".");
        assert_eq!(parent("/home/alice/report.csv"), "/home/alice");
        assert_eq!(parent("/report.csv"), "/");
        assert_eq!(parent("report.csv"), ".");
    }
}
