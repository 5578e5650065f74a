//! Markdown → sanitized HTML for assistant turns.
//!
//! Model output is untrusted: everything goes through ammonia after pulldown-cmark.
//! Both are configured once at startup and shared.

use pulldown_cmark::{html, Event, Options, Parser};

pub struct MarkdownRenderer {
    options: Options,
    sanitizer: ammonia::Builder<'static>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut sanitizer = ammonia::Builder::default();
        sanitizer
            .link_rel(Some("noopener noreferrer"))
            .set_tag_attribute_value("a", "target", "_blank");

        Self { options, sanitizer }
    }

    /// Renders model output into markup that is safe to inject into the page.
    pub fn render(&self, markdown: &str) -> String {
        // single newlines are line breaks in chat replies
        let events = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            other => other,
        });

        let mut unsafe_html = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut unsafe_html, events);

        self.sanitizer.clean(&unsafe_html).to_string()
    }
}
