//! HTML for cover and body cards.
//!
//! Body cards are drawn with the same `StyleProfile` numbers the height estimator uses:
//! font size, line height, heading scales, block padding and the fixed chrome.

use std::collections::BTreeMap;

use pulldown_cmark::{html, Event, Options, Parser};

use crate::layout::{Page, StyleProfile};
use crate::render::themes::Theme;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One content block as HTML. Line breaks inside a paragraph are kept, matching the
/// line count the height estimator assumes. Raw HTML in the source is shown as text.
pub fn block_html(raw_text: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let events = Parser::new_ext(raw_text.trim(), options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::from("<section class=\"block\">");
    html::push_html(&mut out, events);
    out.push_str("</section>");
    out
}

fn base_css(style: &StyleProfile, theme: &Theme) -> String {
    let font = &style.font;
    let heading_css: String = style
        .heading_scale
        .iter()
        .enumerate()
        .map(|(i, scale)| {
            format!(
                "h{level} {{ font-size: {size:.1}px; line-height: {lh}; margin: 0; color: {accent}; }}\n",
                level = i + 1,
                size = font.font_size_px * scale,
                lh = font.line_height,
                accent = theme.accent_color,
            )
        })
        .collect();

    format!(
        r#"* {{ box-sizing: border-box; }}
html, body {{ margin: 0; padding: 0; width: {w}px; height: {h}px; overflow: hidden; }}
body {{ font-family: "Noto Sans SC", "PingFang SC", "Microsoft YaHei", sans-serif;
       font-size: {fs}px; line-height: {lh}; color: #222; }}
p, li, blockquote {{ margin: 0; overflow-wrap: anywhere; }}
ul, ol {{ margin: 0; padding-left: {indent:.1}px; }}
blockquote {{ margin: 0; padding-left: {indent:.1}px; color: {muted}; border-left: 6px solid {accent}; }}
code {{ font-family: inherit; background: rgba(0,0,0,0.06); border-radius: 6px; }}
a {{ color: {accent}; text-decoration: none; }}
.block {{ padding: {half_pad}px 0; }}
.block > * + * {{ margin-top: {gap}px; }}
{heading_css}"#,
        w = style.card_width_px,
        h = style.card_height_px,
        fs = font.font_size_px,
        lh = font.line_height,
        indent = style.marker_indent_units as f32 * font.font_size_px * font.narrow_advance_em,
        muted = theme.text_light,
        accent = theme.accent_color,
        gap = style.paragraph_gap_px,
        half_pad = style.block_padding_px / 2.0,
    )
}

/// Body card `page.index + 1` of `total`.
pub fn card_html(page: &Page, total: usize, style: &StyleProfile, theme: &Theme) -> String {
    let blocks: String = page.blocks.iter().map(|b| block_html(b.raw_text())).collect();
    let chrome = &style.chrome;

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><style>
{css}
body {{ background: {bg}; }}
.card {{ position: absolute; inset: {mt}px {pad}px {mb}px {pad}px; background: #fff;
         border-radius: 32px; display: flex; flex-direction: column; }}
.header {{ height: {header}px; flex: none; }}
.content {{ flex: 1; overflow: hidden; padding: 0 {inner}px; }}
.footer {{ height: {footer}px; flex: none; display: flex; align-items: center;
           justify-content: flex-end; padding-right: {inner}px; color: {muted}; }}
</style></head>
<body><div class="card">
<div class="header"></div>
<div class="content">{blocks}</div>
<div class="footer">{index}/{total}</div>
</div></body></html>
"#,
        css = base_css(style, theme),
        bg = theme.card_bg,
        mt = chrome.margin_top_px,
        mb = chrome.margin_bottom_px,
        pad = style.horizontal_padding_px / 2.0,
        inner = style.horizontal_padding_px / 2.0,
        header = chrome.header_px,
        footer = chrome.footer_px,
        muted = theme.text_light,
        index = page.index + 1,
    )
}

pub fn cover_html(metadata: &BTreeMap<String, String>, style: &StyleProfile, theme: &Theme) -> String {
    let field = |key: &str| metadata.get(key).map(|v| escape(v)).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><style>
{css}
body {{ background: {bg}; display: flex; align-items: center; justify-content: center; }}
.cover {{ width: {inner_w}px; height: {inner_h}px; background: #fff; border-radius: 40px;
          display: flex; flex-direction: column; justify-content: center; padding: 80px; }}
.emoji {{ font-size: 160px; line-height: 1.2; }}
.title {{ font-size: 96px; font-weight: 800; line-height: 1.3; color: {accent}; }}
.subtitle {{ font-size: 48px; margin-top: 32px; color: {muted}; }}
</style></head>
<body><div class="cover">
<div class="emoji">{emoji}</div>
<div class="title">{title}</div>
<div class="subtitle">{subtitle}</div>
</div></body></html>
"#,
        css = base_css(style, theme),
        bg = theme.cover_bg,
        inner_w = style.card_width_px * 0.88,
        inner_h = style.card_height_px * 0.9,
        accent = theme.accent_color,
        muted = theme.text_light,
        emoji = field("emoji"),
        title = field("title"),
        subtitle = field("subtitle"),
    )
}
