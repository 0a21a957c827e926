//! Errors raised while building the resource graph

use declarative::GraphError;
use thiserror::Error;

/// Build-time failure; nothing on the host has been touched yet
#[derive(Debug, Error)]
pub enum BuildError {
    /// OS family has no package set
    #[error("unsupported platform '{family}' (supported: debian, ubuntu, redhat, centos, sles)")]
    UnsupportedPlatform { family: String },

    /// A declared feature has no implementation
    #[error("{feature} not implemented")]
    NotImplemented { feature: &'static str },

    /// An export cannot be expanded
    #[error("invalid export '{export}': {reason}")]
    InvalidExport { export: String, reason: String },

    /// Contradictory declaration, unknown edge target, or dependency cycle
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ResourceId;

    #[test]
    fn test_error_messages() {
        let err = BuildError::UnsupportedPlatform {
            family: "arch".into(),
        };
        assert!(err.to_string().starts_with("unsupported platform 'arch'"));

        let err = BuildError::NotImplemented {
            feature: "v3 export path",
        };
        assert_eq!(err.to_string(), "v3 export path not implemented");

        let err: BuildError = GraphError::CyclicDependency {
            cycle: vec![ResourceId::file("/a"), ResourceId::file("/a")],
        }
        .into();
        assert!(err.to_string().contains("file:/a -> file:/a"));
    }
}
