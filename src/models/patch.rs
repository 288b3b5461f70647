use crate::models::entry::{DiaryEntry, DisplayChoice};

/// One field of a partial update. `Keep` means "the update does not touch
/// this field" — an explicit merge marker instead of spread-over semantics,
/// so an update can never clear a field by accident.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Keep,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Field::Set(_))
    }

    fn apply(&self, slot: &mut Option<T>)
    where
        T: Clone,
    {
        if let Field::Set(value) = self {
            *slot = Some(value.clone());
        }
    }
}

/// A partial update to a diary entry. Fields left at `Keep` preserve
/// whatever the remote entry already holds.
///
/// Tags are special: the persisted entry stores a single union of plan tags
/// and actual tags, while the plan/actual split only exists in transient UI
/// state. A save that carries either tag list replaces the union; a save
/// that carries neither leaves the stored tags alone.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub plan_text: Field<String>,
    pub actual_text: Field<String>,
    pub plan_image_url: Field<String>,
    pub actual_image_url: Field<String>,
    pub plan_uploaded_image_url: Field<String>,
    pub actual_uploaded_image_url: Field<String>,
    pub display_plan_image: Field<DisplayChoice>,
    pub display_actual_image: Field<DisplayChoice>,
    pub plan_input_prompt: Field<String>,
    pub actual_input_prompt: Field<String>,
    pub diff_text: Field<String>,
    pub plan_tags: Option<Vec<String>>,
    pub actual_tags: Option<Vec<String>>,
}

impl EntryPatch {
    pub fn merge_into(&self, entry: &mut DiaryEntry) {
        self.plan_text.apply(&mut entry.plan_text);
        self.actual_text.apply(&mut entry.actual_text);
        self.plan_image_url.apply(&mut entry.plan_image_url);
        self.actual_image_url.apply(&mut entry.actual_image_url);
        self.plan_uploaded_image_url.apply(&mut entry.plan_uploaded_image_url);
        self.actual_uploaded_image_url.apply(&mut entry.actual_uploaded_image_url);
        self.display_plan_image.apply(&mut entry.display_plan_image);
        self.display_actual_image.apply(&mut entry.display_actual_image);
        self.plan_input_prompt.apply(&mut entry.plan_input_prompt);
        self.actual_input_prompt.apply(&mut entry.actual_input_prompt);
        self.diff_text.apply(&mut entry.diff_text);

        if self.plan_tags.is_some() || self.actual_tags.is_some() {
            entry.tags = union_tags(
                self.plan_tags.as_deref().unwrap_or_default(),
                self.actual_tags.as_deref().unwrap_or_default(),
            );
        }
    }
}

/// planTags ∪ actualTags, order-preserving, deduplicated.
pub fn union_tags(plan_tags: &[String], actual_tags: &[String]) -> Vec<String> {
    let mut union: Vec<String> = Vec::new();
    for tag in plan_tags.iter().chain(actual_tags.iter()) {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if !union.iter().any(|t| t == tag) {
            union.push(tag.to_string());
        }
    }
    union
}
