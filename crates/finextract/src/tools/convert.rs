//! HTML to plain text conversion for page tools

use serde::{Deserialize, Serialize};

/// Elements dropped entirely when cleaning a page
pub const PAGE_SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "noscript", "iframe", "svg",
];

/// Elements dropped when extracting an article (page list plus asides)
pub const ARTICLE_SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
];

/// Elements that never have a closing tag
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const NO_TITLE: &str = "No title found";
const NO_DESCRIPTION: &str = "No description found";
const NO_CONTENT: &str = "No content found";

/// Check if content is HTML based on content type and body
pub fn is_html(content_type: &Option<String>, body: &str) -> bool {
    if let Some(ct) = content_type {
        let ct_lower = ct.to_lowercase();
        if ct_lower.contains("text/html") || ct_lower.contains("application/xhtml") {
            return true;
        }
    }

    let trimmed = body.trim_start();
    let head: String = trimmed.chars().take(15).collect::<String>().to_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Convert HTML to a single line of plain text
///
/// Drops [`PAGE_SKIP_TAGS`], separates elements with spaces and
/// collapses every whitespace run to one space.
pub fn html_to_text(html: &str) -> String {
    let mut output = String::new();

    scan(html, PAGE_SKIP_TAGS, |node| match node {
        Node::Open { .. } | Node::Close { .. } => output.push(' '),
        Node::Text(c) => output.push(c),
    });

    collapse_whitespace(&output)
}

/// Join whitespace-separated words with single spaces
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title, description and main text of an article page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub meta_description: String,
    pub content: String,
}

/// Where the main content of a page may live, in priority order
#[derive(Debug, Clone, Copy)]
enum Selector {
    Tag(&'static str),
    Class(&'static str),
    Id(&'static str),
    Role(&'static str),
}

const CONTENT_SELECTORS: &[Selector] = &[
    Selector::Tag("article"),
    Selector::Tag("main"),
    Selector::Class("article"),
    Selector::Class("post"),
    Selector::Class("content"),
    Selector::Id("content"),
    Selector::Role("main"),
];

impl Selector {
    fn matches(&self, name: &str, tag: &str) -> bool {
        match self {
            Selector::Tag(t) => name == *t,
            Selector::Class(c) => extract_attribute(tag, "class")
                .map(|classes| classes.split_whitespace().any(|class| class == *c))
                .unwrap_or(false),
            Selector::Id(id) => extract_attribute(tag, "id").as_deref() == Some(*id),
            Selector::Role(role) => extract_attribute(tag, "role").as_deref() == Some(*role),
        }
    }
}

/// Text collected inside one element
#[derive(Debug, Default)]
struct Capture {
    /// Stack depth of the element once opened
    depth: usize,
    text: String,
    closed: bool,
}

impl Capture {
    fn push(&mut self, c: char) {
        if !self.closed {
            self.text.push(c);
        }
    }
}

/// Extract title, meta description and main text from an article page
///
/// The main text comes from the first element matching, in order:
/// `article`, `main`, `.article`, `.post`, `.content`, `#content`,
/// `[role="main"]`. Without any match (or when the match is empty) the
/// whole body is used.
pub fn extract_article(html: &str) -> Article {
    let mut stack: Vec<String> = Vec::new();
    let mut captures: Vec<Option<Capture>> = CONTENT_SELECTORS.iter().map(|_| None).collect();
    let mut body: Option<Capture> = None;
    let mut title: Option<Capture> = None;
    let mut description: Option<String> = None;

    scan(html, ARTICLE_SKIP_TAGS, |node| match node {
        Node::Open { name, tag } => {
            if name == "meta"
                && description.is_none()
                && extract_attribute(tag, "name")
                    .map(|n| n.eq_ignore_ascii_case("description"))
                    .unwrap_or(false)
            {
                description = Some(extract_attribute(tag, "content").unwrap_or_default());
            }

            for capture in open_captures(&mut captures, &mut body, &mut title) {
                capture.push(' ');
            }

            if VOID_TAGS.contains(&name) || tag.ends_with('/') {
                return;
            }
            stack.push(name.to_string());
            let depth = stack.len();

            if name == "body" && body.is_none() {
                body = Some(Capture { depth, ..Default::default() });
            }
            if name == "title" && title.is_none() {
                title = Some(Capture { depth, ..Default::default() });
            }
            for (selector, capture) in CONTENT_SELECTORS.iter().zip(captures.iter_mut()) {
                if capture.is_none() && selector.matches(name, tag) {
                    *capture = Some(Capture { depth, ..Default::default() });
                }
            }
        }
        Node::Close { name } => {
            for capture in open_captures(&mut captures, &mut body, &mut title) {
                capture.push(' ');
            }

            if let Some(pos) = stack.iter().rposition(|open| open == name) {
                stack.truncate(pos);
                for capture in captures
                    .iter_mut()
                    .chain(std::iter::once(&mut body))
                    .chain(std::iter::once(&mut title))
                    .flatten()
                {
                    if capture.depth > pos {
                        capture.closed = true;
                    }
                }
            }
        }
        Node::Text(c) => {
            for capture in open_captures(&mut captures, &mut body, &mut title) {
                capture.push(c);
            }
        }
    });

    let title = title
        .map(|t| t.text.trim().to_string())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let main = captures
        .into_iter()
        .flatten()
        .next()
        .map(|capture| collapse_whitespace(&capture.text))
        .filter(|text| !text.is_empty());

    let content = main.unwrap_or_else(|| {
        body.map(|capture| collapse_whitespace(&capture.text))
            .unwrap_or_else(|| NO_CONTENT.to_string())
    });

    Article {
        title,
        meta_description: description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        content,
    }
}

fn open_captures<'a>(
    captures: &'a mut [Option<Capture>],
    body: &'a mut Option<Capture>,
    title: &'a mut Option<Capture>,
) -> impl Iterator<Item = &'a mut Capture> {
    captures
        .iter_mut()
        .chain(std::iter::once(body))
        .chain(std::iter::once(title))
        .flatten()
        .filter(|capture| !capture.closed)
}

/// Markup event produced by [`scan`]
enum Node<'a> {
    Open { name: &'a str, tag: &'a str },
    Close { name: &'a str },
    Text(char),
}

/// Walk `html`, reporting tags and decoded text outside `skip_tags`
fn scan<F>(html: &str, skip_tags: &[&str], mut visit: F)
where
    F: FnMut(Node<'_>),
{
    let mut skip_elements: Vec<String> = Vec::new();
    let mut chars = html.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '<' {
            let mut tag = String::new();
            for next in chars.by_ref() {
                // Comments end at "-->", not at the first '>'
                if next == '>' && !(tag.starts_with("!--") && !tag.ends_with("--")) {
                    break;
                }
                tag.push(next);
            }

            // Comments, doctype, processing instructions
            if tag.starts_with('!') || tag.starts_with('?') {
                continue;
            }

            let tag_lower = tag.to_lowercase();
            let is_closing = tag_lower.starts_with('/');
            let tag_name = tag_lower
                .trim_start_matches('/')
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or("");

            if skip_tags.contains(&tag_name) {
                if is_closing {
                    if let Some(pos) = skip_elements.iter().rposition(|t| t == tag_name) {
                        skip_elements.remove(pos);
                    }
                } else if !tag.ends_with('/') {
                    skip_elements.push(tag_name.to_string());
                }
                continue;
            }

            if !skip_elements.is_empty() || tag_name.is_empty() {
                continue;
            }

            if is_closing {
                visit(Node::Close { name: tag_name });
            } else {
                visit(Node::Open {
                    name: tag_name,
                    tag: &tag,
                });
            }
        } else if skip_elements.is_empty() {
            visit(Node::Text(decode_entity(c, &mut chars)));
        }
    }
}

/// Extract attribute value from tag
fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let tag_lower = tag.to_ascii_lowercase();
    let pattern = format!("{}=", attr);

    // Require a word boundary so `class=` does not match `data-class=`
    let start = tag_lower.match_indices(&pattern).find_map(|(idx, _)| {
        let boundary = tag_lower[..idx]
            .chars()
            .next_back()
            .map(|c| c.is_whitespace())
            .unwrap_or(false);
        boundary.then_some(idx)
    })?;

    let rest = tag[start + pattern.len()..].trim_start();

    if let Some(rest) = rest.strip_prefix('"') {
        rest.find('"').map(|end| rest[..end].to_string())
    } else if let Some(rest) = rest.strip_prefix('\'') {
        rest.find('\'').map(|end| rest[..end].to_string())
    } else {
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

/// Decode HTML entity starting from ampersand
///
/// Unrecognised sequences leave the ampersand as-is and consume nothing.
fn decode_entity(c: char, chars: &mut std::iter::Peekable<std::str::Chars>) -> char {
    if c != '&' {
        return c;
    }

    let mut lookahead = chars.clone();
    let mut entity = String::new();
    loop {
        match lookahead.next() {
            Some(';') => break,
            Some(next) if next.is_alphanumeric() || next == '#' => {
                if entity.len() > 10 {
                    return '&';
                }
                entity.push(next);
            }
            _ => return '&',
        }
    }

    let decoded = match entity.as_str() {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "euro" => '\u{20ac}',
        "pound" => '\u{a3}',
        "cent" => '\u{a2}',
        "yen" => '\u{a5}',
        "rsquo" => '\u{2019}',
        "lsquo" => '\u{2018}',
        "rdquo" => '\u{201D}',
        "ldquo" => '\u{201C}',
        _ => {
            let code = entity.strip_prefix('#').and_then(|num| {
                match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                }
            });
            match code.and_then(char::from_u32) {
                Some(ch) => ch,
                None => return '&',
            }
        }
    };

    *chars = lookahead;
    decoded
}
