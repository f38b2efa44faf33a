//! Canonical package-name derivation from distribution archive filenames.
//!
//! Uploaded archives follow no single grammar: sdists (`pytz-2012b.tar.gz`),
//! eggs (`greenlet-0.3.4-py3.1-win-amd64.egg`), Windows installers
//! (`gevent-1.0b1.win32-py2.6.exe`) and wheels all encode the package name
//! differently, and package names themselves may contain hyphens
//! (`A100-200-XYZ-1.2.3.zip`). Derivation is a pure function of the basename:
//! wheels get the fixed wheel filename grammar, everything else goes through
//! an ordered list of heuristic split rules that approximate "find the
//! rightmost segment that looks like the start of a version string".
//!
//! The rules are deliberately kept bug-compatible with the index this one
//! replaces; installers resolve names against the produced listing, so any
//! change in derivation silently breaks existing package URLs.

use regex::Regex;
use std::sync::OnceLock;

/// Trailing suffixes stripped from non-wheel archive names before splitting.
///
/// `\.tar\.bz3` is kept verbatim even though bzip2 sdists end `.tar.bz2`;
/// those still derive correctly via the single-hyphen rule below, and
/// changing the literal would move multi-hyphen `.tar.bz2` names to a
/// different rule. Pending product review, do not "fix".
fn archive_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(\.zip|\.tar\.gz|\.tgz|\.tar\.bz3|-py[23]\.\d-.*|\.win-amd64-py[23]\.\d\..*|\.win32-py[23]\.\d\..*)$",
        )
        .unwrap()
    })
}

/// The wheel filename grammar:
/// `{name}-{version}[-{build}]-{pyver}-{abi}-{platform}.whl`.
fn wheel_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<name>.+?)-(?P<ver>\d.*?)(?:(?:-(?P<build>\d.*?))?-(?P<pyver>.+?)-(?P<abi>.+?)-(?P<plat>.+?)\.whl|\.dist-info)$",
        )
        .unwrap()
    })
}

/// A hyphen is a version boundary when the text after it starts like a
/// version: optional `v`, digits, then `.` or a letter.
fn version_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?i)v?\d+[.a-z]").unwrap())
}

/// Derive the canonical package name from an archive filename.
///
/// Returns `None` only for wheel-style names (`*.whl`) that do not match the
/// wheel grammar; callers treat those as absent from the index rather than
/// as errors. Every other input yields a best-effort name. Case is preserved
/// and separators are not normalized: grouping is by exact string equality.
pub fn derive_package_name(path: &str) -> Option<String> {
    let basename = path.rsplit('/').next().unwrap_or(path);

    if basename.ends_with(".whl") {
        return wheel_name(basename).map(str::to_string);
    }

    Some(legacy_name(basename))
}

/// Extract the name segment from a wheel filename, or `None` on no match.
fn wheel_name(basename: &str) -> Option<&str> {
    wheel_file_re()
        .captures(basename)
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str())
}

/// Ordered split rules for sdists, eggs and installers.
fn legacy_name(basename: &str) -> String {
    let stripped = archive_suffix_re().replace(basename, "");

    let hyphens = stripped.matches('-').count();
    if hyphens == 0 {
        // Bare name, e.g. "package" from "package.zip".
        return stripped.into_owned();
    }
    if hyphens == 1 {
        // Single hyphen separates name from version.
        return stripped.split('-').next().unwrap_or_default().to_string();
    }
    if !stripped.contains('.') {
        // Multiple hyphens but no dots: the last segment is the version.
        return stripped
            .rsplit_once('-')
            .map(|(name, _)| name.to_string())
            .unwrap_or_default();
    }

    // Hyphenated name with a dotted version somewhere: split at every
    // version-looking boundary and drop the final segment.
    let segments = split_at_version_boundaries(&stripped);
    segments[..segments.len() - 1].join("-")
}

/// Split at each `-` whose right side matches [`version_start_re`].
///
/// With no boundary at all this returns the whole input as one segment, and
/// the caller's drop-the-last-segment step yields the empty name; that
/// matches the behavior installers already depend on.
fn split_at_version_boundaries(s: &str) -> Vec<&str> {
    let re = version_start_re();
    let mut segments = Vec::new();
    let mut start = 0;

    for (i, _) in s.match_indices('-') {
        if re.is_match(&s[i + 1..]) {
            segments.push(&s[start..i]);
            start = i + 1;
        }
    }
    segments.push(&s[start..]);
    segments
}
