//! Content-block and form-field discriminators
//!
//! Blocks arrive as JSON and stay JSON: templates are expanded against the
//! raw block value, so the model here is the set of tags the dispatcher
//! switches on, not a full struct mirror of the payload.

use serde_json::Value;

/// Discriminant of a content block (`type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Rich text
    Rte,
    /// Mixed media gallery (photo/audio/video sub-types)
    Media,
    /// Attached file list
    Files,
    /// Row-major table, row 0 is the header
    Table,
    /// Declarative form definition
    Form,
    /// Anything else is skipped, permitting partial template sets
    Unknown,
}

impl BlockKind {
    pub fn of(block: &Value) -> BlockKind {
        match block.get("type").and_then(Value::as_str) {
            Some("rte") => BlockKind::Rte,
            Some("media") => BlockKind::Media,
            Some("files") => BlockKind::Files,
            Some("table") => BlockKind::Table,
            Some("form") => BlockKind::Form,
            _ => BlockKind::Unknown,
        }
    }
}

/// Media sub-types; a gallery renders per sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Audio,
    Video,
}

impl MediaKind {
    /// Render order is fixed: photos, audio, videos.
    pub const ALL: [MediaKind; 3] = [MediaKind::Photo, MediaKind::Audio, MediaKind::Video];

    pub fn tag(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Members of `media` carrying this sub-type.
    pub fn members(&self, block: &Value) -> Vec<Value> {
        block
            .get("media")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.get("type").and_then(Value::as_str) == Some(self.tag()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Tagged form-field variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFieldKind {
    Header,
    Paragraph,
    Hr,
    Text,
    Textarea,
    Select,
    Checkbox,
    CheckboxGroup,
    RadioGroup,
    Date,
    File,
    Unknown,
}

impl FormFieldKind {
    pub fn of(field: &Value) -> FormFieldKind {
        match field.get("type").and_then(Value::as_str) {
            Some("header") => FormFieldKind::Header,
            Some("paragraph") => FormFieldKind::Paragraph,
            Some("hr") => FormFieldKind::Hr,
            Some("text") => FormFieldKind::Text,
            Some("textarea") => FormFieldKind::Textarea,
            Some("select") => FormFieldKind::Select,
            Some("checkbox") => FormFieldKind::Checkbox,
            Some("checkbox-group") => FormFieldKind::CheckboxGroup,
            Some("radio-group") => FormFieldKind::RadioGroup,
            Some("date") => FormFieldKind::Date,
            Some("file") => FormFieldKind::File,
            _ => FormFieldKind::Unknown,
        }
    }

    /// Group variants expand an `options` sub-template per option.
    pub fn has_options(&self) -> bool {
        matches!(
            self,
            FormFieldKind::Select | FormFieldKind::CheckboxGroup | FormFieldKind::RadioGroup
        )
    }

    /// Static markers whose templates carry entity-mutated placeholders.
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            FormFieldKind::Header | FormFieldKind::Paragraph | FormFieldKind::Hr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_kind_dispatch() {
        assert_eq!(BlockKind::of(&json!({"type": "rte"})), BlockKind::Rte);
        assert_eq!(BlockKind::of(&json!({"type": "media"})), BlockKind::Media);
        assert_eq!(BlockKind::of(&json!({"type": "widget"})), BlockKind::Unknown);
        assert_eq!(BlockKind::of(&json!({})), BlockKind::Unknown);
    }

    #[test]
    fn media_members_filter_by_sub_type() {
        let block = json!({
            "type": "media",
            "media": [
                {"type": "photo", "url": "a"},
                {"type": "audio", "url": "b"},
                {"type": "photo", "url": "c"},
            ]
        });
        assert_eq!(MediaKind::Photo.members(&block).len(), 2);
        assert_eq!(MediaKind::Audio.members(&block).len(), 1);
        assert_eq!(MediaKind::Video.members(&block).len(), 0);
    }

    #[test]
    fn form_field_kinds() {
        assert_eq!(
            FormFieldKind::of(&json!({"type": "checkbox-group"})),
            FormFieldKind::CheckboxGroup
        );
        assert!(FormFieldKind::CheckboxGroup.has_options());
        assert!(!FormFieldKind::Text.has_options());
        assert!(FormFieldKind::Hr.is_marker());
        assert_eq!(FormFieldKind::of(&json!({"type": "captcha"})), FormFieldKind::Unknown);
    }
}
