//! Target filters for `plan` and `graph`

use declarative::{ResourceId, ResourceKind};

/// A parsed target such as `mount`, `services`, or `mount:/export/data`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub kind: Option<ResourceKind>,
    pub name: Option<String>,
}

/// Map a kind name, singular or plural, to a kind
pub fn parse_kind(name: &str) -> Option<ResourceKind> {
    let kind = match name.to_ascii_lowercase().trim_end_matches('s') {
        "package" => ResourceKind::Package,
        "service" => ResourceKind::Service,
        "file" | "dir" => ResourceKind::File,
        "mount" => ResourceKind::Mount,
        "exec" => ResourceKind::ExecGuarded,
        "fragment" => ResourceKind::TextFragment,
        "aggregate" => ResourceKind::AggregateFile,
        "config" => ResourceKind::ConfigEdit,
        _ => return None,
    };
    Some(kind)
}

/// Parse a target string
///
/// `kind:name` filters by both. A bare word that names a kind filters by
/// kind; anything else is a name substring.
pub fn parse_target(target: &str) -> Target {
    if let Some((kind, name)) = target.split_once(':')
        && let Some(kind) = parse_kind(kind)
    {
        return Target {
            kind: Some(kind),
            name: (!name.is_empty()).then(|| name.to_string()),
        };
    }

    match parse_kind(target) {
        Some(kind) => Target {
            kind: Some(kind),
            name: None,
        },
        None => Target {
            kind: None,
            name: Some(target.to_string()),
        },
    }
}

/// Check if a resource id matches the filter
pub fn matches_filter(id: &ResourceId, target: &Target) -> bool {
    if let Some(kind) = target.kind
        && id.kind != kind
    {
        return false;
    }

    if let Some(name) = &target.name
        && !id.name.contains(name.as_str())
    {
        return false;
    }

    true
}
