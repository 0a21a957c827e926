//! Text fragment resource - one ordered piece of an aggregate file
//!
//! Fragments are staged into an assembler while the graph is built, so they
//! have no host state of their own. They exist in the graph so the
//! aggregate file can require them, and so a contradictory fragment is a
//! build error like any other duplicate declaration.

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState};

#[derive(Debug, Clone)]
pub struct TextFragment {
    pub name: String,
    /// Name of the aggregate file this fragment belongs to
    pub target: String,
    pub content: String,
}

impl TextFragment {
    pub fn new(name: &str, target: &str, content: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            content: content.into(),
        }
    }

    fn staged(&self) -> ResourceState {
        ResourceState::present(self.content.trim_end())
    }
}

impl Resource for TextFragment {
    fn id(&self) -> ResourceId {
        ResourceId::fragment(format!("{}:{}", self.target, self.name))
    }

    fn description(&self) -> String {
        format!("Fragment {} of {}", self.name, self.target)
    }

    fn attributes(&self) -> Attributes {
        Attributes::from([
            ("target", self.target.clone()),
            ("content", self.content.clone()),
        ])
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(self.staged())
    }

    fn desired_state(&self) -> ResourceState {
        self.staged()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        Ok(ApplyResult::Unchanged)
    }
}
