//! GitHub-flavored markdown to sanitized HTML.
//!
//! Rendering uses pulldown-cmark with the GFM extensions enabled. Bare URLs
//! are turned into links the way github.com does. The resulting HTML goes
//! through an ammonia allow-list; anything outside it is removed, and the
//! contents of `script` and `style` elements are dropped entirely.

use ammonia::{Builder, Url, UrlRelative};
use lazy_static::lazy_static;
use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::Regex;
use std::collections::{HashMap, HashSet};

lazy_static! {
    /// Bare `http(s)://` and `www.` URLs inside text
    static ref BARE_URL_REGEX: Regex = Regex::new(r"(?:https?://|www\.)[^\s<>]*").unwrap();
}

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "dd", "del", "details", "div", "dl", "dt",
    "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "input", "ins", "kbd", "li",
    "ol", "p", "pre", "q", "s", "samp", "span", "strike", "strong", "sub", "summary", "sup",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "tt", "ul", "var",
];

const ALLOWED_STYLE_PROPERTIES: &[&str] = &["text-align"];

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_GFM);
    options
}

/// Drop trailing punctuation from a URL candidate. A closing paren stays
/// while it has a matching opener inside the URL.
fn trim_autolink(candidate: &str) -> &str {
    let mut url = candidate;
    while let Some(last) = url.chars().last() {
        match last {
            '?' | '!' | '.' | ',' | ':' | ';' | '*' | '_' | '~' | '\'' | '"' | ']' => {
                url = &url[..url.len() - last.len_utf8()];
            }
            ')' if url.matches(')').count() > url.matches('(').count() => {
                url = &url[..url.len() - 1];
            }
            _ => break,
        }
    }
    url
}

/// Split a text run into plain text and autolinks.
fn autolink_text(text: &str, out: &mut Vec<Event<'static>>) {
    let mut last = 0;
    for m in BARE_URL_REGEX.find_iter(text) {
        let url = trim_autolink(m.as_str());
        let scheme_len = if m.as_str().starts_with("www.") {
            4
        } else {
            m.as_str().find("://").map_or(0, |i| i + 3)
        };
        if url.len() <= scheme_len {
            continue;
        }

        if m.start() > last {
            out.push(Event::Text(CowStr::from(text[last..m.start()].to_string())));
        }

        let shown = url.to_string();
        let dest = if shown.starts_with("www.") {
            format!("http://{}", shown)
        } else {
            shown.clone()
        };

        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(dest),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        out.push(Event::Text(CowStr::from(shown)));
        out.push(Event::End(TagEnd::Link));
        last = m.start() + url.len();
    }

    if last < text.len() {
        out.push(Event::Text(CowStr::from(text[last..].to_string())));
    }
}

/// Render markdown to unsanitized HTML.
fn render_unsafe(markdown: &str) -> String {
    let mut events: Vec<Event<'static>> = Vec::new();
    let mut link_depth = 0usize;
    let mut code_depth = 0usize;

    // Merged so a URL split at `_`, `*` or `[` is seen whole.
    for event in TextMergeStream::new(Parser::new_ext(markdown, markdown_options())) {
        match event {
            Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => {
                link_depth += 1;
                events.push(event.into_static());
            }
            Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                link_depth = link_depth.saturating_sub(1);
                events.push(event.into_static());
            }
            Event::Start(Tag::CodeBlock(_)) => {
                code_depth += 1;
                events.push(event.into_static());
            }
            Event::End(TagEnd::CodeBlock) => {
                code_depth = code_depth.saturating_sub(1);
                events.push(event.into_static());
            }
            Event::Text(text) if link_depth == 0 && code_depth == 0 => {
                autolink_text(&text, &mut events);
            }
            other => events.push(other.into_static()),
        }
    }

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

fn sanitizer<'a>(base: Option<Url>) -> Builder<'a> {
    let mut tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    tag_attributes.insert("a", ["href", "title", "id", "name"].into_iter().collect());
    tag_attributes.insert(
        "img",
        ["src", "alt", "title", "width", "height", "align"].into_iter().collect(),
    );
    tag_attributes.insert("input", ["type", "checked", "disabled"].into_iter().collect());
    tag_attributes.insert("code", ["class"].into_iter().collect());
    tag_attributes.insert("pre", ["lang"].into_iter().collect());
    tag_attributes.insert("ol", ["start"].into_iter().collect());
    tag_attributes.insert("td", ["align", "style", "colspan", "rowspan"].into_iter().collect());
    tag_attributes.insert("th", ["align", "style", "colspan", "rowspan"].into_iter().collect());
    tag_attributes.insert("li", ["id"].into_iter().collect());
    tag_attributes.insert("sup", ["id"].into_iter().collect());
    tag_attributes.insert("div", ["id", "align"].into_iter().collect());
    tag_attributes.insert("p", ["align"].into_iter().collect());
    tag_attributes.insert("details", ["open"].into_iter().collect());

    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .filter_style_properties(ALLOWED_STYLE_PROPERTIES.iter().copied().collect())
        .link_rel(Some("nofollow noopener noreferrer"));

    match base {
        Some(base) => builder.url_relative(UrlRelative::RewriteWithBase(base)),
        None => builder.url_relative(UrlRelative::PassThrough),
    };

    builder
}

/// Render markdown bytes to sanitized HTML.
///
/// Input that is not valid UTF-8 is decoded lossily. When `base_url` is the
/// address the file was fetched from, relative links and images resolve
/// against it.
pub fn render_markdown(source: &[u8], base_url: Option<&str>) -> String {
    let markdown = String::from_utf8_lossy(source);
    let unsafe_html = render_unsafe(&markdown);
    let base = base_url.and_then(|u| Url::parse(u).ok());

    sanitizer(base).clean(&unsafe_html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_script_is_removed() {
        let html = render_markdown(
            b"# Title\n\n<script>alert('owned')</script>\n\nText <script>x()</script> here",
            None,
        );
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert('owned')"));
        assert!(!html.contains("x()"));
        assert!(html.contains("<h1>Title</h1>"));
    }

    #[test]
    fn test_event_handlers_and_styles_are_stripped() {
        let html = render_markdown(
            b"<img src=\"a.png\" onerror=\"steal()\">\n\n<p style=\"position:fixed\" onclick=\"x()\">hi</p>\n\n<style>body{}</style>",
            None,
        );
        assert!(!html.contains("onerror"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("position"));
        assert!(!html.contains("body{}"));
        assert!(html.contains("<img src=\"a.png\">"));
    }

    #[test]
    fn test_javascript_links_are_dropped() {
        let html = render_markdown(b"[click](javascript:alert(1))", None);
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn test_table_with_alignment() {
        let html = render_markdown(b"| a | b |\n|:--|--:|\n| 1 | 2 |\n", None);
        assert!(html.contains("<table>"));
        assert!(html.contains("text-align: left") || html.contains("text-align:left"));
    }

    #[test]
    fn test_fenced_code_and_strikethrough() {
        let html = render_markdown(b"```rust\nfn main() {}\n```\n\n~~gone~~", None);
        assert!(html.contains("<pre><code class=\"language-rust\">"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_task_list_checkboxes_survive() {
        let html = render_markdown(b"- [x] done\n- [ ] todo\n", None);
        assert!(html.contains("<input"));
        assert!(html.contains("type=\"checkbox\""));
        assert!(html.contains("checked"));
    }

    #[test]
    fn test_bare_urls_are_autolinked() {
        let html = render_markdown(b"See https://example.com/docs, or www.example.org.", None);
        assert!(html.contains("href=\"https://example.com/docs\""));
        assert!(html.contains("href=\"http://www.example.org\""));
        assert!(html.contains("rel=\"nofollow noopener noreferrer\""));
    }

    #[test]
    fn test_autolinks_keep_underscores_and_balanced_parens() {
        let html = render_markdown(b"Go https://en.wikipedia.org/wiki/Foo_(bar) now", None);
        assert!(html.contains("href=\"https://en.wikipedia.org/wiki/Foo_(bar)\""));
        assert!(html.contains(">https://en.wikipedia.org/wiki/Foo_(bar)</a> now"));

        let html = render_markdown(b"Read https://example.com/_private/x today", None);
        assert!(html.contains("href=\"https://example.com/_private/x\""));

        let html = render_markdown(b"Path https://example.com/some_path_here/x*y end", None);
        assert!(html.contains("href=\"https://example.com/some_path_here/x*y\""));
    }

    #[test]
    fn test_autolink_trailing_punctuation_and_unbalanced_paren() {
        let html = render_markdown(b"(see https://example.com/a_b) and https://example.com/q?", None);
        assert!(html.contains("href=\"https://example.com/a_b\""));
        assert!(html.contains("</a>) and"));
        assert!(html.contains("href=\"https://example.com/q\""));

        let html = render_markdown(b"just https:// here", None);
        assert!(!html.contains("href="));

        let html = render_markdown(b"Type www. then a host.", None);
        assert!(!html.contains("href="));
    }

    #[test]
    fn test_trim_autolink() {
        assert_eq!(trim_autolink("https://x.io/Foo_(bar)"), "https://x.io/Foo_(bar)");
        assert_eq!(trim_autolink("https://x.io/a)"), "https://x.io/a");
        assert_eq!(trim_autolink("https://x.io/a.,"), "https://x.io/a");
        assert_eq!(trim_autolink("www.example.org."), "www.example.org");
    }

    #[test]
    fn test_urls_in_code_are_not_linked() {
        let html = render_markdown(b"```\nhttps://example.com\n```\n", None);
        assert!(!html.contains("href="));
    }

    #[test]
    fn test_relative_links_resolve_against_source() {
        let html = render_markdown(
            b"![logo](img/logo.png)",
            Some("https://raw.githubusercontent.com/acme/x/main/docs/readme.md"),
        );
        assert!(html.contains(
            "src=\"https://raw.githubusercontent.com/acme/x/main/docs/img/logo.png\""
        ));
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let html = render_markdown(b"caf\xe9 menu", None);
        assert!(html.contains("caf"));
        assert!(html.contains("menu"));
    }
}
