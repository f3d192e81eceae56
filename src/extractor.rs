//! Content extraction: node subtree → normalized text.
//!
//! Independent of role. A cascade of attempts, stopping at the first one that
//! yields non-empty text:
//!
//! 1. The union of the profile's content-subtype selectors (code, markdown,
//!    plain text), with containment dedup so a code block inside a matched
//!    markdown container renders once.
//! 2. Generic cross-application content containers.
//! 3. Full recursive traversal of the subtree with block/list/code
//!    formatting, skipping scripts, styles, and hidden elements.
//! 4. Raw flattened text of the node.
//!
//! Code blocks come out as fenced blocks with a best-effort language tag
//! sniffed from `language-*` / `lang-*` class names; list items get a bullet
//! marker; block elements are newline-separated. The result is passed through
//! a whitespace normalization pass that leaves fenced code untouched.

use crate::page;
use crate::profiles::Profile;
use scraper::ElementRef;

/// Cross-application content containers tried when no subtype selector matches
const GENERIC_CONTENT_SELECTORS: &[&str] =
    &[".markdown", ".prose", ".message-content", ".text-base", "p"];

/// Extract normalized text from a candidate node's subtree.
pub fn extract(el: ElementRef<'_>, profile: &Profile) -> String {
    let subtype_selectors: Vec<&str> = profile
        .content
        .code
        .iter()
        .chain(profile.content.markdown.iter())
        .chain(profile.content.text.iter())
        .copied()
        .collect();
    let text = assemble_matches(el, &subtype_selectors);
    if !text.is_empty() {
        return text;
    }

    let text = assemble_matches(el, GENERIC_CONTENT_SELECTORS);
    if !text.is_empty() {
        return text;
    }

    let mut rendered = String::new();
    render_blocks(el, &mut rendered);
    let text = normalize(&rendered);
    if !text.is_empty() {
        return text;
    }

    normalize(&page::flat_text(el))
}

/// Concatenate all matches of `selectors` under `el` in document order,
/// rendering each with the block/list/code formatting rules.
fn assemble_matches(el: ElementRef<'_>, selectors: &[&str]) -> String {
    let matched = page::select_all(el, selectors);
    let matched = page::keep_outermost(matched);

    let mut out = String::new();
    for m in matched {
        if !page::is_visible(m) {
            continue;
        }
        render_element(m, &mut out);
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    normalize(&out)
}

/// Render one element, dispatching on its tag
fn render_element(el: ElementRef<'_>, out: &mut String) {
    match el.value().name() {
        "pre" => render_code_fence(el, out),
        "code" => {
            // A bare matched code element is treated as a block
            let inside_pre = el
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| a.value().name() == "pre");
            if inside_pre {
                render_code_fence(el, out);
            } else {
                out.push_str(&code_text(el));
                out.push('\n');
            }
        }
        "li" => {
            out.push_str("- ");
            render_blocks(el, out);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        _ => render_blocks(el, out),
    }
}

/// Recursive traversal applying block/list/code formatting
fn render_blocks(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            // Inter-element whitespace separates inline runs but must not
            // open a blank line after a block break
            if text.trim().is_empty() {
                if !out.is_empty() && !out.ends_with(|c: char| c.is_whitespace()) {
                    out.push(' ');
                }
            } else {
                out.push_str(text);
            }
            continue;
        }
        let Some(ce) = ElementRef::wrap(child) else {
            continue;
        };
        let name = ce.value().name();
        if page::is_non_content_tag(name) || page::is_hidden_shallow(&ce) {
            continue;
        }
        match name {
            "pre" => render_code_fence(ce, out),
            "br" => out.push('\n'),
            "li" => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("- ");
                render_blocks(ce, out);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            "p" | "div" | "section" | "article" | "ul" | "ol" | "blockquote" | "table" | "tr"
            | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                render_blocks(ce, out);
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => render_blocks(ce, out),
        }
    }
}

/// Emit a fenced code block with a best-effort language tag
fn render_code_fence(el: ElementRef<'_>, out: &mut String) {
    // Prefer the inner <code> when rendering a <pre> wrapper
    let code_el = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|d| d.value().name() == "code")
        .unwrap_or(el);

    let language = language_of(code_el).or_else(|| language_of(el));
    let body = code_text(code_el);
    let body = body.trim_matches('\n');

    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```");
    if let Some(lang) = language {
        out.push_str(&lang);
    }
    out.push('\n');
    out.push_str(body);
    out.push_str("\n```\n");
}

/// Raw text of a code element, newlines preserved
fn code_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Sniff a language tag from `language-*` / `lang-*` class conventions
fn language_of(el: ElementRef<'_>) -> Option<String> {
    for class in el.value().classes() {
        if let Some(lang) = class.strip_prefix("language-") {
            if !lang.is_empty() {
                return Some(lang.to_string());
            }
        }
        if let Some(lang) = class.strip_prefix("lang-") {
            if !lang.is_empty() {
                return Some(lang.to_string());
            }
        }
    }
    None
}

/// A fence line as the code renderer emits them: three backticks, optionally
/// followed by a single language tag. Prose that merely starts with backticks
/// does not qualify.
fn is_fence_line(line: &str) -> bool {
    match line.strip_prefix("```") {
        Some(rest) => rest.chars().all(|c| !c.is_whitespace()),
        None => false,
    }
}

/// Normalization pass: trim, collapse horizontal whitespace runs to one
/// space, collapse runs of blank lines to one. Lines inside code fences are
/// left as rendered.
pub fn normalize(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut blank_pending = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if is_fence_line(trimmed) {
            in_fence = !in_fence;
            blank_pending = false;
            lines.push(trimmed.to_string());
            continue;
        }
        if in_fence {
            lines.push(line.trim_end().to_string());
            continue;
        }
        if trimmed.is_empty() {
            blank_pending = !lines.is_empty();
            continue;
        }
        if blank_pending {
            lines.push(String::new());
            blank_pending = false;
        }
        lines.push(trimmed.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    lines.join("\n").trim().to_string()
}
