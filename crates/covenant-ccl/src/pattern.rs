// pattern.rs - Action and resource pattern matching.
//
// Actions are dotted names (`file.read`). In an action pattern `*` matches
// exactly one segment and `**` matches zero or more segments.
//
// Resources are slash-separated paths matched as globs: `*` stays inside a
// segment, `**` crosses segments. A pattern of `**` matches everything and
// `/prefix/**` also matches `/prefix` itself.
//
// Specificity ranks competing statements: `**` scores 0, any other
// wildcard segment 1, a literal segment 2.

use glob::{MatchOptions, Pattern};

const RESOURCE_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Test a dotted action against a dotted action pattern.
pub fn match_action(pattern: &str, action: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let action: Vec<&str> = action.split('.').collect();
    match_segments(&pattern, &action)
}

fn match_segments(pattern: &[&str], target: &[&str]) -> bool {
    match pattern.split_first() {
        None => target.is_empty(),
        Some((&"**", rest)) => (0..=target.len()).any(|skip| match_segments(rest, &target[skip..])),
        Some((&"*", rest)) => !target.is_empty() && match_segments(rest, &target[1..]),
        Some((literal, rest)) => {
            target.first() == Some(literal) && match_segments(rest, &target[1..])
        }
    }
}

/// Test a resource path against a resource glob.
///
/// An invalid glob never matches.
pub fn match_resource(pattern: &str, resource: &str) -> bool {
    if pattern == "**" || pattern == resource {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("/**") {
        if prefix == resource {
            return true;
        }
    }
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches_with(resource, RESOURCE_MATCH),
        Err(_) => false,
    }
}

/// Specificity of a single pattern split on `separator`.
pub fn pattern_specificity(pattern: &str, separator: char) -> u32 {
    pattern
        .split(separator)
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment {
            "**" => 0,
            s if s.contains(|c| matches!(c, '*' | '?' | '[')) => 1,
            _ => 2,
        })
        .sum()
}

/// Combined specificity of an action pattern and a resource pattern.
pub fn specificity(action_pattern: &str, resource_pattern: &str) -> u32 {
    pattern_specificity(action_pattern, '.') + pattern_specificity(resource_pattern, '/')
}
