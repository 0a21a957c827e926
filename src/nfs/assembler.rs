//! `/etc/exports` assembly from per-export fragments

use declarative::{GraphError, ResourceId};

/// Where the NFS server reads its export table
pub const EXPORTS_PATH: &str = "/etc/exports";

/// First line of every rendered exports file
pub const MANAGED_HEADER: &str = "# Managed by nfsconv. Local changes will be overwritten.\n";

/// Ordered collection of export fragments
///
/// Fragments render in the order they were first added, which is export
/// declaration order. Rendering depends only on the fragment set, never on
/// the order resources are later applied in.
#[derive(Debug, Clone, Default)]
pub struct ExportFragmentAssembler {
    fragments: Vec<(String, String)>,
}

impl ExportFragmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment
    ///
    /// Re-adding a name with identical content is a no-op and returns
    /// `false`. Different content under an existing name is a contradiction.
    pub fn add_fragment(&mut self, name: &str, content: &str) -> Result<bool, GraphError> {
        if let Some((_, existing)) = self.fragments.iter().find(|(n, _)| n == name) {
            if existing == content {
                return Ok(false);
            }
            return Err(GraphError::ContradictoryDeclaration {
                id: ResourceId::fragment(format!("{EXPORTS_PATH}:{name}")),
                existing: existing.trim_end().to_string(),
                declared: content.trim_end().to_string(),
            });
        }

        self.fragments.push((name.to_string(), content.to_string()));
        Ok(true)
    }

    /// Fragment names in render order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(|(n, _)| n.as_str())
    }

    /// Full file content: header, then every fragment in order
    pub fn render(&self) -> String {
        let mut out = String::from(MANAGED_HEADER);
        for (_, content) in &self.fragments {
            out.push_str(content);
            if !content.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}
