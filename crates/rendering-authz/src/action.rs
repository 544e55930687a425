use serde::{Deserialize, Serialize};

/// Collection-level action gated by a rendering's permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionAction {
    Browse,
    Read,
    Edit,
    Add,
    Delete,
    Export,
}

impl CollectionAction {
    pub const ALL: [CollectionAction; 6] = [
        CollectionAction::Browse,
        CollectionAction::Read,
        CollectionAction::Edit,
        CollectionAction::Add,
        CollectionAction::Delete,
        CollectionAction::Export,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionAction::Browse => "browse",
            CollectionAction::Read => "read",
            CollectionAction::Edit => "edit",
            CollectionAction::Add => "add",
            CollectionAction::Delete => "delete",
            CollectionAction::Export => "export",
        }
    }
}

impl std::fmt::Display for CollectionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CollectionAction {
    type Err = crate::AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "browse" => Ok(CollectionAction::Browse),
            "read" => Ok(CollectionAction::Read),
            "edit" => Ok(CollectionAction::Edit),
            "add" => Ok(CollectionAction::Add),
            "delete" => Ok(CollectionAction::Delete),
            "export" => Ok(CollectionAction::Export),
            _ => Err(crate::AuthzError::InvalidAction(value.to_string())),
        }
    }
}
