//! Externally authored template sets
//!
//! The core consumes templates, it never produces them. Each entry is an
//! opaque markup string. Absence of an optional template silently disables
//! that render path; absence of the container is a hard error surfaced to
//! the caller.

use crate::blocks::{FormFieldKind, MediaKind};

/// Template set for content rendering (pages, news, lists, blocks).
#[derive(Debug, Default, Clone)]
pub struct TemplateSet {
    /// Required outer template; may carry a slot for block/list output.
    pub container: Option<String>,
    /// Per-item template for list-shaped data (`data.list`).
    pub iterable: Option<String>,

    pub rte: Option<String>,
    pub photos: Option<String>,
    pub videos: Option<String>,
    pub audio: Option<String>,
    pub files: Option<String>,

    pub table: Option<String>,
    pub table_header_cell: Option<String>,
    pub table_body_cell: Option<String>,

    pub form: Option<String>,
    pub form_header: Option<String>,
    pub form_paragraph: Option<String>,
    pub form_hr: Option<String>,
    pub form_text: Option<String>,
    pub form_textarea: Option<String>,
    pub form_select: Option<String>,
    pub form_select_option: Option<String>,
    pub form_checkbox: Option<String>,
    pub form_checkbox_group: Option<String>,
    pub form_checkbox_group_option: Option<String>,
    pub form_radio_group: Option<String>,
    pub form_radio_group_option: Option<String>,
    pub form_date: Option<String>,
    pub form_file: Option<String>,
}

impl TemplateSet {
    pub fn with_container(container: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
            ..Self::default()
        }
    }

    /// Gallery template for a media sub-type.
    pub fn gallery(&self, kind: MediaKind) -> Option<&str> {
        match kind {
            MediaKind::Photo => self.photos.as_deref(),
            MediaKind::Audio => self.audio.as_deref(),
            MediaKind::Video => self.videos.as_deref(),
        }
    }

    /// Field template per form-field variant.
    pub fn form_field(&self, kind: FormFieldKind) -> Option<&str> {
        match kind {
            FormFieldKind::Header => self.form_header.as_deref(),
            FormFieldKind::Paragraph => self.form_paragraph.as_deref(),
            FormFieldKind::Hr => self.form_hr.as_deref(),
            FormFieldKind::Text => self.form_text.as_deref(),
            FormFieldKind::Textarea => self.form_textarea.as_deref(),
            FormFieldKind::Select => self.form_select.as_deref(),
            FormFieldKind::Checkbox => self.form_checkbox.as_deref(),
            FormFieldKind::CheckboxGroup => self.form_checkbox_group.as_deref(),
            FormFieldKind::RadioGroup => self.form_radio_group.as_deref(),
            FormFieldKind::Date => self.form_date.as_deref(),
            FormFieldKind::File => self.form_file.as_deref(),
            FormFieldKind::Unknown => None,
        }
    }

    /// Option sub-template for group variants.
    pub fn form_option(&self, kind: FormFieldKind) -> Option<&str> {
        match kind {
            FormFieldKind::Select => self.form_select_option.as_deref(),
            FormFieldKind::CheckboxGroup => self.form_checkbox_group_option.as_deref(),
            FormFieldKind::RadioGroup => self.form_radio_group_option.as_deref(),
            _ => None,
        }
    }
}

/// Template set for navigation trees.
///
/// The container and leaf are required; the branch is optional, items with
/// children fall back to the leaf without it.
#[derive(Debug, Default, Clone)]
pub struct NavTemplates {
    pub container: Option<String>,
    pub leaf: Option<String>,
    pub branch: Option<String>,
}
