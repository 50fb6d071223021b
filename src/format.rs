//! Channel-specific text formatting
//!
//! Channels that render rich text get markdown converted to HTML; every
//! other channel gets escaped newline sequences turned into real ones, since
//! some knowledge base answers are stored with literal `\n`.

use pulldown_cmark::{html, Options, Parser};

/// How a channel wants answer text rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    MarkdownToHtml,
    UnescapeNewlines,
}

/// Channels with a non-default style. Add a row to support a new one.
const CHANNEL_STYLES: &[(&str, TextStyle)] = &[("msteams", TextStyle::MarkdownToHtml)];

impl TextStyle {
    pub fn for_channel(channel_id: &str) -> Self {
        CHANNEL_STYLES
            .iter()
            .find(|(id, _)| *id == channel_id)
            .map_or(TextStyle::UnescapeNewlines, |(_, style)| *style)
    }

    pub fn apply(self, text: &str) -> String {
        match self {
            TextStyle::MarkdownToHtml => markdown_to_html(text),
            TextStyle::UnescapeNewlines => text.replace("\\r\\n", "\n").replace("\\n", "\n"),
        }
    }
}

/// Format text for the given channel
pub fn format_for_channel(text: &str, channel_id: &str) -> String {
    TextStyle::for_channel(channel_id).apply(text)
}

fn markdown_to_html(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, parser);
    out
}
