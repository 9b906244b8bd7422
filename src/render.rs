//! Block Dispatcher - typed content blocks to ordered markup fragments
//!
//! Selects the matching sub-template per block, expands it, and assembles an
//! ordered fragment; recurses for iterable content and navigation trees.
//! Unknown block/field types and missing optional templates are skipped,
//! permitting partial template sets.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::blocks::{BlockKind, FormFieldKind, MediaKind};
use crate::context::value_to_string;
use crate::error::WeftError;
use crate::markup::{self, block_id};
use crate::poll::CompletionCoordinator;
use crate::template::expand;
use crate::templates::{NavTemplates, TemplateSet};

/// Ordered sequence of top-level markup nodes produced by one render.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Fragment {
    nodes: Vec<String>,
}

impl Fragment {
    pub fn from_markup(markup_str: &str) -> Self {
        Self {
            nodes: markup::split_top_level(markup_str),
        }
    }

    /// Nodes in document order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Nodes in splice order: reversed, so that sequential insertion at a
    /// single point reproduces document order.
    pub fn insertion_sequence(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().rev().map(String::as_str)
    }

    pub fn html(&self) -> String {
        self.nodes.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Skip policy for best-effort degradation paths.
///
/// The reference behavior silently drops sub-type galleries with fewer than
/// two members (no one-item carousels); the threshold is a policy knob here
/// rather than a constant.
#[derive(Debug, Clone)]
pub struct RenderPolicy {
    pub min_gallery_items: usize,
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self {
            min_gallery_items: 2,
        }
    }
}

/// Renders one data context through an authored template set.
pub struct Renderer {
    templates: TemplateSet,
    policy: RenderPolicy,
    coordinator: Option<Arc<CompletionCoordinator>>,
}

impl Renderer {
    pub fn new(templates: TemplateSet) -> Self {
        Self {
            templates,
            policy: RenderPolicy::default(),
            coordinator: None,
        }
    }

    pub fn with_policy(mut self, policy: RenderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Inject the completion barrier; successful renders signal it.
    pub fn with_coordinator(mut self, coordinator: Arc<CompletionCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    fn signal_ready(&self) {
        if let Some(coordinator) = &self.coordinator {
            coordinator.mark_ready();
        }
    }

    /// Render object-shaped data: container, then either the iterable list
    /// (`data.list`) or the typed content blocks (`data.blocks`), slotted
    /// into the container, then one final expansion against the whole
    /// context so outer placeholders resolve after inner substitution.
    pub fn render_content(&self, data: &Value) -> Result<Fragment, WeftError> {
        let container = self.templates.container.as_deref().ok_or_else(|| {
            WeftError::MissingTemplate {
                name: "container".to_string(),
            }
        })?;
        let list = data.get("list").and_then(Value::as_array);
        if self.templates.iterable.is_some() && list.is_none() {
            return Err(WeftError::NotIterable {
                expected: "array at data.list".to_string(),
            });
        }

        let mut output = expand(container, data, 0, &block_id(0));

        let inner = match (self.templates.iterable.as_deref(), list) {
            (Some(iterable), Some(items)) => Some(self.build_iterable_items(iterable, items)),
            _ => data
                .get("blocks")
                .and_then(Value::as_array)
                .map(|blocks| self.build_blocks(blocks, data)),
        };
        if let Some(inner) = inner {
            if let Some(replaced) = markup::replace_slot(&output, &inner) {
                output = replaced;
            }
        }

        let output = expand(&output, data, 0, &block_id(0));
        self.signal_ready();
        Ok(Fragment::from_markup(&output))
    }

    /// Render array-shaped data through the container's repeat node.
    pub fn render_list(&self, data: &Value) -> Result<Fragment, WeftError> {
        let container = self.templates.container.as_deref().ok_or_else(|| {
            WeftError::MissingTemplate {
                name: "container".to_string(),
            }
        })?;
        let Some(items) = data.as_array() else {
            return Err(WeftError::NotIterable {
                expected: "array".to_string(),
            });
        };

        let output = markup::expand_repeats(container, items);
        let output = expand(&output, data, 0, &block_id(0));
        self.signal_ready();
        Ok(Fragment::from_markup(&output))
    }

    /// Render a navigation tree: branch template for items with children
    /// (recursing through its slot), leaf template otherwise. Traversal
    /// order is input order at every level.
    pub fn render_navigation(
        &self,
        nav: &NavTemplates,
        items: &Value,
    ) -> Result<Fragment, WeftError> {
        let container = nav.container.as_deref().ok_or_else(|| {
            WeftError::MissingTemplate {
                name: "nav container".to_string(),
            }
        })?;
        let leaf = nav.leaf.as_deref().ok_or_else(|| WeftError::MissingTemplate {
            name: "nav leaf".to_string(),
        })?;
        let Some(items) = items.as_array() else {
            return Err(WeftError::NotIterable {
                expected: "array of navigation items".to_string(),
            });
        };

        let items_html = build_nav_items(items, leaf, nav.branch.as_deref());
        let output =
            markup::replace_slot(container, &items_html).unwrap_or_else(|| container.to_string());
        self.signal_ready();
        Ok(Fragment::from_markup(&output))
    }

    fn build_iterable_items(&self, iterable: &str, items: &[Value]) -> String {
        let mut out = String::new();
        for (index, item) in items.iter().enumerate() {
            let html = expand(iterable, item, index, &block_id(index));
            push_first_element(&mut out, &html);
        }
        out
    }

    fn build_blocks(&self, blocks: &[Value], data: &Value) -> String {
        let mut out = String::new();
        for (index, block) in blocks.iter().enumerate() {
            match BlockKind::of(block) {
                BlockKind::Rte => self.add_rte_block(&mut out, block, index),
                BlockKind::Media => {
                    for kind in MediaKind::ALL {
                        let members = kind.members(block);
                        if members.len() >= self.policy.min_gallery_items {
                            self.add_gallery_block(&mut out, kind, block, &members, index);
                        }
                    }
                }
                BlockKind::Files => self.add_files_block(&mut out, block, index),
                BlockKind::Table => self.add_table_block(&mut out, block, index),
                BlockKind::Form => self.add_form_block(&mut out, block, index, data),
                BlockKind::Unknown => {
                    debug!(index, "skipping block of unknown type");
                }
            }
        }
        out
    }

    fn add_rte_block(&self, out: &mut String, block: &Value, index: usize) {
        let Some(tpl) = self.templates.rte.as_deref() else {
            return;
        };
        let html = expand(tpl, block, index, &block_id(index));
        push_elements(out, &html);
    }

    fn add_gallery_block(
        &self,
        out: &mut String,
        kind: MediaKind,
        block: &Value,
        members: &[Value],
        index: usize,
    ) {
        let Some(tpl) = self.templates.gallery(kind) else {
            return;
        };
        let expanded = markup::expand_repeats(tpl, members);
        // block-level placeholders resolve against the raw block after the
        // members are in place
        for node in markup::split_top_level(&expanded) {
            if node.starts_with('<') {
                out.push_str(&expand(&node, block, index, &block_id(index)));
            }
        }
    }

    fn add_files_block(&self, out: &mut String, block: &Value, index: usize) {
        let Some(tpl) = self.templates.files.as_deref() else {
            return;
        };
        let Some(files) = block.get("files").and_then(Value::as_array) else {
            return;
        };
        let expanded = markup::expand_repeats(tpl, files);
        for node in markup::split_top_level(&expanded) {
            if node.starts_with('<') {
                out.push_str(&expand(&node, block, index, &block_id(index)));
            }
        }
    }

    fn add_table_block(&self, out: &mut String, block: &Value, index: usize) {
        let Some(rows) = block.get("table").and_then(Value::as_array) else {
            return;
        };
        // row 0 is the header; a table without body rows is skipped
        if rows.len() < 2 {
            return;
        }
        let (Some(tpl), Some(header_cell), Some(body_cell)) = (
            self.templates.table.as_deref(),
            self.templates.table_header_cell.as_deref(),
            self.templates.table_body_cell.as_deref(),
        ) else {
            return;
        };

        let mut rows_html = String::from("<thead><tr>");
        rows_html.push_str(&expand_cells(header_cell, &rows[0]));
        rows_html.push_str("</tr></thead><tbody>");
        for row in &rows[1..] {
            rows_html.push_str("<tr>");
            rows_html.push_str(&expand_cells(body_cell, row));
            rows_html.push_str("</tr>");
        }
        rows_html.push_str("</tbody>");

        let Some(with_rows) = markup::replace_slot(tpl, &rows_html)
            .or_else(|| markup::insert_before_close(tpl, "table", &rows_html))
        else {
            debug!("table template has neither a slot nor a table element");
            return;
        };
        // wrapper re-expanded against the block after row insertion
        let html = expand(&with_rows, block, index, &block_id(index));
        push_first_element(out, &html);
    }

    fn add_form_block(&self, out: &mut String, block: &Value, index: usize, data: &Value) {
        let Some(fields) = block.get("form").and_then(Value::as_array) else {
            return;
        };
        let Some(tpl) = self.templates.form.as_deref() else {
            return;
        };

        let mut fields_html = String::new();
        for (idx, field) in fields.iter().enumerate() {
            let kind = FormFieldKind::of(field);
            let Some(field_tpl) = self.templates.form_field(kind) else {
                continue;
            };
            let mut html = field_tpl.to_string();
            if kind.has_options() {
                let options_html = self.build_field_options(kind, field);
                html = html.replacen("{{ options }}", &options_html, 1);
            } else if kind.is_marker() {
                html = markup::fix_entity_markers(&html);
            }
            fields_html.push_str(&expand(&html, field, idx, &block_id(idx)));
        }

        // hidden key/token inputs come after all field markup
        for name in ["key", "token"] {
            let value = data.get(name).map(|v| value_to_string(Some(v)));
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                fields_html
                    .push_str(&format!(r#"<input type="hidden" name="{name}" value="{value}">"#));
            }
        }

        let Some(with_fields) = markup::insert_after_slot(tpl, &fields_html)
            .or_else(|| markup::insert_before_close(tpl, "form", &fields_html))
        else {
            debug!("form template has neither a slot nor a form element");
            return;
        };
        let html = expand(&with_fields, block, index, &block_id(index));
        push_first_element(out, &html);
    }

    fn build_field_options(&self, kind: FormFieldKind, field: &Value) -> String {
        let Some(option_tpl) = self.templates.form_option(kind) else {
            return String::new();
        };
        let Some(options) = field.get("options").and_then(Value::as_array) else {
            return String::new();
        };
        // options inherit the field's sibling properties
        let mut parent = field.clone();
        if let Some(map) = parent.as_object_mut() {
            map.remove("options");
        }
        let mut out = String::new();
        for (i, option) in options.iter().enumerate() {
            let mut merged = parent.clone();
            if let (Some(target), Some(source)) = (merged.as_object_mut(), option.as_object()) {
                for (key, value) in source {
                    target.insert(key.clone(), value.clone());
                }
            }
            out.push_str(&expand(option_tpl, &merged, i, &block_id(i)));
        }
        out
    }
}

fn build_nav_items(items: &[Value], leaf: &str, branch: Option<&str>) -> String {
    let mut out = String::new();
    for (index, item) in items.iter().enumerate() {
        let childs = item
            .get("childs")
            .and_then(Value::as_array)
            .filter(|childs| !childs.is_empty());
        match (childs, branch) {
            (Some(childs), Some(branch_tpl)) => {
                let branch_html = expand(branch_tpl, item, index, &block_id(index));
                let child_html = build_nav_items(childs, leaf, branch);
                let html =
                    markup::replace_slot(&branch_html, &child_html).unwrap_or(branch_html);
                push_first_element(&mut out, &html);
            }
            _ => {
                let html = expand(leaf, item, index, &block_id(index));
                push_first_element(&mut out, &html);
            }
        }
    }
    out
}

fn expand_cells(cell_tpl: &str, row: &Value) -> String {
    let mut out = String::new();
    if let Some(cells) = row.as_array() {
        for col in 0..cells.len() {
            out.push_str(&expand(cell_tpl, row, col, ""));
        }
    }
    out
}

fn push_first_element(out: &mut String, markup_str: &str) {
    if let Some(node) = markup::split_top_level(markup_str)
        .into_iter()
        .find(|node| node.starts_with('<'))
    {
        out.push_str(&node);
    }
}

fn push_elements(out: &mut String, markup_str: &str) {
    for node in markup::split_top_level(markup_str) {
        if node.starts_with('<') {
            out.push_str(&node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nav_templates() -> NavTemplates {
        NavTemplates {
            container: Some("<nav><slot></slot></nav>".to_string()),
            leaf: Some(r#"<a href="/{{ key }}">{{ subject }}</a>"#.to_string()),
            branch: Some(
                r#"<div class="branch"><a href="/{{ key }}">{{ subject }}</a><slot></slot></div>"#
                    .to_string(),
            ),
        }
    }

    #[test]
    fn nav_branch_wraps_children_in_input_order() {
        let renderer = Renderer::new(TemplateSet::default());
        let items = json!([
            {"key": "a", "subject": "A", "childs": [{"key": "b", "subject": "B"}]}
        ]);
        let fragment = renderer
            .render_navigation(&nav_templates(), &items)
            .unwrap();
        assert_eq!(
            fragment.html(),
            r#"<nav><div class="branch"><a href="/a">A</a><a href="/b">B</a></div></nav>"#
        );
    }

    #[test]
    fn nav_sibling_leaves_in_order() {
        let renderer = Renderer::new(TemplateSet::default());
        let items = json!([{"key": "a", "subject": "A"}, {"key": "b", "subject": "B"}]);
        let fragment = renderer
            .render_navigation(&nav_templates(), &items)
            .unwrap();
        assert_eq!(
            fragment.html(),
            r#"<nav><a href="/a">A</a><a href="/b">B</a></nav>"#
        );
    }

    #[test]
    fn nav_without_branch_falls_back_to_leaf() {
        let renderer = Renderer::new(TemplateSet::default());
        let nav = NavTemplates {
            branch: None,
            ..nav_templates()
        };
        let items = json!([
            {"key": "a", "subject": "A", "childs": [{"key": "b", "subject": "B"}]}
        ]);
        let fragment = renderer.render_navigation(&nav, &items).unwrap();
        assert_eq!(fragment.html(), r#"<nav><a href="/a">A</a></nav>"#);
    }

    #[test]
    fn nav_requires_container_and_leaf() {
        let renderer = Renderer::new(TemplateSet::default());
        let missing = renderer.render_navigation(&NavTemplates::default(), &json!([]));
        assert!(matches!(
            missing,
            Err(WeftError::MissingTemplate { name }) if name == "nav container"
        ));
    }

    #[test]
    fn media_block_skips_singleton_sub_types() {
        let templates = TemplateSet {
            container: Some("<article><slot></slot></article>".to_string()),
            photos: Some(
                r#"<div class="gallery"><img data-weft-iterable src="{{ url }}"></div>"#
                    .to_string(),
            ),
            audio: Some(
                r#"<div class="audio"><audio data-weft-iterable src="{{ url }}"></audio></div>"#
                    .to_string(),
            ),
            ..TemplateSet::default()
        };
        let data = json!({
            "blocks": [{
                "type": "media",
                "media": [
                    {"type": "photo", "url": "p1.jpg"},
                    {"type": "photo", "url": "p2.jpg"},
                    {"type": "audio", "url": "a1.mp3"},
                ]
            }]
        });
        let fragment = Renderer::new(templates).render_content(&data).unwrap();
        let html = fragment.html();
        assert!(html.contains(r#"<img src="p1.jpg">"#));
        assert!(html.contains(r#"<img src="p2.jpg">"#));
        // audio sub-type has a single member and is omitted
        assert!(!html.contains("audio"));
    }

    #[test]
    fn gallery_threshold_is_configurable() {
        let templates = TemplateSet {
            container: Some("<article><slot></slot></article>".to_string()),
            audio: Some(
                r#"<div class="audio"><audio data-weft-iterable src="{{ url }}"></audio></div>"#
                    .to_string(),
            ),
            ..TemplateSet::default()
        };
        let data = json!({
            "blocks": [{"type": "media", "media": [{"type": "audio", "url": "a1.mp3"}]}]
        });
        let fragment = Renderer::new(templates)
            .with_policy(RenderPolicy {
                min_gallery_items: 1,
            })
            .render_content(&data)
            .unwrap();
        assert!(fragment.html().contains(r#"<audio src="a1.mp3"></audio>"#));
    }

    #[test]
    fn unknown_block_types_are_skipped() {
        let templates = TemplateSet {
            container: Some("<article><slot></slot></article>".to_string()),
            rte: Some("<section>{{ html }}</section>".to_string()),
            ..TemplateSet::default()
        };
        let data = json!({
            "blocks": [
                {"type": "widget", "html": "ignored"},
                {"type": "rte", "html": "kept"},
            ]
        });
        let fragment = Renderer::new(templates).render_content(&data).unwrap();
        assert_eq!(
            fragment.html(),
            "<article><section>kept</section></article>"
        );
    }

    #[test]
    fn table_needs_header_and_body_rows() {
        let templates = TemplateSet {
            container: Some("<article><slot></slot></article>".to_string()),
            table: Some("<table><slot></slot></table>".to_string()),
            table_header_cell: Some("<th>{{ [*] }}</th>".to_string()),
            table_body_cell: Some("<td>{{ [*] }}</td>".to_string()),
            ..TemplateSet::default()
        };
        let renderer = Renderer::new(templates);

        let short = json!({"blocks": [{"type": "table", "table": [["only header"]]}]});
        assert_eq!(
            renderer.render_content(&short).unwrap().html(),
            "<article></article>"
        );

        let data = json!({
            "blocks": [{"type": "table", "table": [["Name", "Qty"], ["Bolt", "4"]]}]
        });
        assert_eq!(
            renderer.render_content(&data).unwrap().html(),
            "<article><table><thead><tr><th>Name</th><th>Qty</th></tr></thead>\
             <tbody><tr><td>Bolt</td><td>4</td></tr></tbody></table></article>"
        );
    }

    #[test]
    fn form_fields_render_with_options_and_hidden_inputs_last() {
        let templates = TemplateSet {
            container: Some("<article><slot></slot></article>".to_string()),
            form: Some("<form><slot></slot></form>".to_string()),
            form_text: Some(r#"<input name="{{ name }}">"#.to_string()),
            form_radio_group: Some(
                r#"<fieldset name="{{ name }}">{{ options }}</fieldset>"#.to_string(),
            ),
            form_radio_group_option: Some(
                r#"<input type="radio" name="{{ name }}" value="{{ label }}">"#.to_string(),
            ),
            ..TemplateSet::default()
        };
        let data = json!({
            "key": "contact",
            "token": "t0k3n",
            "blocks": [{
                "type": "form",
                "form": [
                    {"type": "text", "name": "email"},
                    {"type": "radio-group", "name": "color", "options": [
                        {"label": "red"}, {"label": "blue"}
                    ]},
                    {"type": "captcha"}
                ]
            }]
        });
        let html = Renderer::new(templates).render_content(&data).unwrap().html();
        // option contexts inherit the parent's name field
        assert!(html.contains(r#"<input type="radio" name="color" value="red">"#));
        assert!(html.contains(r#"<input type="radio" name="color" value="blue">"#));
        let key_pos = html.find(r#"name="key" value="contact""#).unwrap();
        let token_pos = html.find(r#"name="token" value="t0k3n""#).unwrap();
        let field_pos = html.find(r#"<input name="email">"#).unwrap();
        assert!(field_pos < key_pos && key_pos < token_pos);
    }

    #[test]
    fn iterable_container_renders_list_items_in_order() {
        let templates = TemplateSet {
            container: Some("<section><slot></slot></section>".to_string()),
            iterable: Some("<article>{{ subject }}</article>".to_string()),
            ..TemplateSet::default()
        };
        let data = json!({"list": [{"subject": "one"}, {"subject": "two"}]});
        let fragment = Renderer::new(templates).render_content(&data).unwrap();
        assert_eq!(
            fragment.html(),
            "<section><article>one</article><article>two</article></section>"
        );
    }

    #[test]
    fn iterable_template_with_non_list_data_is_an_error() {
        let templates = TemplateSet {
            container: Some("<section><slot></slot></section>".to_string()),
            iterable: Some("<article>{{ subject }}</article>".to_string()),
            ..TemplateSet::default()
        };
        let result = Renderer::new(templates).render_content(&json!({"subject": "x"}));
        assert!(matches!(result, Err(WeftError::NotIterable { .. })));
    }

    #[test]
    fn missing_container_is_a_hard_error() {
        let result = Renderer::new(TemplateSet::default()).render_content(&json!({}));
        assert!(matches!(
            result,
            Err(WeftError::MissingTemplate { name }) if name == "container"
        ));
    }

    #[test]
    fn render_list_expands_repeat_nodes_over_the_array() {
        let templates = TemplateSet {
            container: Some(
                r#"<ul><li data-weft-iterable>{{ subject }}</li></ul>"#.to_string(),
            ),
            ..TemplateSet::default()
        };
        let data = json!([{"subject": "first"}, {"subject": "second"}]);
        let fragment = Renderer::new(templates).render_list(&data).unwrap();
        assert_eq!(
            fragment.html(),
            "<ul><li>first</li><li>second</li></ul>"
        );
    }

    #[test]
    fn insertion_sequence_is_reversed_document_order() {
        let fragment = Fragment::from_markup("<p>a</p><p>b</p><p>c</p>");
        let spliced: Vec<_> = fragment.insertion_sequence().collect();
        assert_eq!(spliced, vec!["<p>c</p>", "<p>b</p>", "<p>a</p>"]);
        assert_eq!(fragment.nodes().len(), 3);
    }

    #[test]
    fn coordinator_observes_successful_renders_only() {
        let coordinator = Arc::new(CompletionCoordinator::new(2));
        let ok = Renderer::new(TemplateSet::with_container("<div>{{ a }}</div>"))
            .with_coordinator(Arc::clone(&coordinator));
        ok.render_content(&json!({"a": 1})).unwrap();

        let failing = Renderer::new(TemplateSet::default())
            .with_coordinator(Arc::clone(&coordinator));
        let _ = failing.render_content(&json!({}));

        assert_eq!(coordinator.observed_count(), 1);
    }

    #[test]
    fn outer_placeholders_resolve_after_inner_substitution() {
        let templates = TemplateSet {
            container: Some(
                "<section data-kind=\"{{ kind }}\"><slot></slot></section>".to_string(),
            ),
            rte: Some("<div>{{ html }}</div>".to_string()),
            ..TemplateSet::default()
        };
        let data = json!({
            "kind": "page",
            "blocks": [{"type": "rte", "html": "body {{ kind }}"}]
        });
        let html = Renderer::new(templates).render_content(&data).unwrap().html();
        // the second expansion pass catches placeholders introduced by content
        assert_eq!(
            html,
            "<section data-kind=\"page\"><div>body page</div></section>"
        );
    }
}
