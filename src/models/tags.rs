use serde::{Deserialize, Serialize};

use crate::models::patch::union_tags;

/// Per-user library of free-form tags, persisted as a local JSON blob and
/// used as the interest pool for plan suggestions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagLibrary {
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TagLibrary {
    pub fn absorb(&mut self, incoming: &[String]) {
        self.tags = union_tags(&self.tags, incoming);
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_unions_without_duplicates() {
        let mut library = TagLibrary {
            tags: vec!["hiking".to_string()],
        };
        library.absorb(&["rain".to_string(), "hiking".to_string()]);
        assert_eq!(library.tags, vec!["hiking", "rain"]);
    }
}
