//! Rendered structure of the component.
//!
//! ```text
//! div.vue-html2pdf
//! ├── section.layout-container[.show-layout][.unset-all]
//! │   └── section.content-wrapper[style="width: …;"]
//! │       └── …content…
//! └── section.pdf-preview            (only while a preview is shown)
//!     ├── button  "×"
//!     └── iframe[src=blob:…][width=100%][height=100%]
//! ```

use crate::config::Config;
use crate::dom::{DomNode, ElementNode, Tag};
use crate::preview::Preview;

pub const ROOT_CLASS: &str = "vue-html2pdf";
pub const LAYOUT_CONTAINER_CLASS: &str = "layout-container";
pub const CONTENT_WRAPPER_CLASS: &str = "content-wrapper";
pub const PREVIEW_CLASS: &str = "pdf-preview";
pub const CLOSE_LABEL: &str = "\u{d7}";

/// The element handed to the exporter: content children inside a wrapper
/// sized by `pdfContentWidth`.
pub fn content_wrapper(config: &Config, content: &ElementNode) -> ElementNode {
    let mut wrapper = ElementNode::new(Tag::Section)
        .with_class(CONTENT_WRAPPER_CLASS)
        .with_attr("style", format!("width: {};", config.pdf_content_width));
    wrapper.children = content.children.clone();
    wrapper
}

/// Build the full component tree for the current state.
pub fn render_markup(config: &Config, content: &ElementNode, preview: &Preview) -> ElementNode {
    let mut layout = ElementNode::new(Tag::Section).with_class(LAYOUT_CONTAINER_CLASS);
    if config.show_layout {
        layout.add_class("show-layout");
    }
    if !config.float_layout {
        layout.add_class("unset-all");
    }
    let layout = layout.with_child(DomNode::Element(content_wrapper(config, content)));

    let mut root = ElementNode::new(Tag::Div)
        .with_class(ROOT_CLASS)
        .with_child(DomNode::Element(layout));

    if let Some(url) = preview.url() {
        let panel = ElementNode::new(Tag::Section)
            .with_class(PREVIEW_CLASS)
            .with_child(DomNode::Element(
                ElementNode::new(Tag::Button).with_text(CLOSE_LABEL),
            ))
            .with_child(DomNode::Element(
                ElementNode::new(Tag::Iframe)
                    .with_attr("src", url)
                    .with_attr("width", "100%")
                    .with_attr("height", "100%"),
            ));
        root = root.with_child(DomNode::Element(panel));
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{Blob, BlobStore};
    use crate::dom::parse_fragment;

    #[test]
    fn layout_classes_follow_config() {
        let config = Config {
            show_layout: true,
            float_layout: false,
            ..Config::default()
        };
        let tree = render_markup(&config, &parse_fragment("<p>x</p>"), &Preview::Hidden);
        let layout = tree.element_children().next().expect("layout container");
        assert!(layout.has_class("show-layout"));
        assert!(layout.has_class("unset-all"));
        assert_eq!(tree.element_children().count(), 1);
    }

    #[test]
    fn wrapper_carries_the_content_width() {
        let config = Config {
            pdf_content_width: "640px".into(),
            ..Config::default()
        };
        let wrapper = content_wrapper(&config, &parse_fragment("<p>a</p><p>b</p>"));
        assert_eq!(wrapper.inline_style(), Some("width: 640px;"));
        assert_eq!(wrapper.element_children().count(), 2);
    }

    #[test]
    fn preview_panel_embeds_the_blob_url() {
        let store = BlobStore::new();
        let mut preview = Preview::default();
        preview.show(store.create(Blob::pdf(vec![0])));
        let tree = render_markup(&Config::default(), &parse_fragment(""), &preview);
        let panel = tree
            .element_children()
            .find(|e| e.has_class(PREVIEW_CLASS))
            .expect("preview panel");
        let iframe = panel
            .element_children()
            .find(|e| e.tag == Tag::Iframe)
            .expect("iframe");
        assert_eq!(iframe.src(), preview.url());
        assert_eq!(iframe.attributes.get("height").map(String::as_str), Some("100%"));
    }
}
