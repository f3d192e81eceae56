//! Page snapshot handling and DOM helpers.
//!
//! The host embedding delivers the rendered chat page as HTML snapshots; this
//! module wraps a snapshot and provides the selector and node predicates the
//! rest of the engine is built on. Element references never outlive the parse
//! they came from, so roots are re-resolved on every scan rather than cached.

use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::warn;
use url::Url;

/// One immutable capture of the host page.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    html: String,
    url: Option<Url>,
    generation: u64,
}

impl PageSnapshot {
    pub fn new(html: String, url: Option<Url>, generation: u64) -> Self {
        Self {
            html,
            url,
            generation,
        }
    }

    /// Parse the snapshot into a queryable document
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Monotonic counter bumped on every new snapshot; a root resolved
    /// against an older generation is stale by definition.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Content hash of the raw markup, used to skip scans of unchanged pages
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.html.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// Compile a selector, logging and skipping on failure.
///
/// A malformed selector is never fatal; the cascade simply moves on to the
/// next one.
pub fn compile_selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("Skipping malformed selector '{}': {:?}", raw, e);
            None
        }
    }
}

/// Collect all descendants of `scope` matching any of `selectors`, in
/// document order, each element at most once.
pub fn select_all<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    let compiled: Vec<Selector> = selectors.iter().filter_map(|s| compile_selector(s)).collect();
    if compiled.is_empty() {
        return Vec::new();
    }

    scope
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.id() != scope.id())
        .filter(|el| compiled.iter().any(|sel| sel.matches(el)))
        .collect()
}

/// Whether this element itself carries a hidden marker (ancestors not checked)
pub fn is_hidden_shallow(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    if value.attr("aria-hidden") == Some("true") {
        return true;
    }
    if let Some(style) = value.attr("style") {
        let style: String = style.chars().filter(|c| !c.is_whitespace()).collect();
        let style = style.to_ascii_lowercase();
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }
    false
}

/// Visibility heuristic: hidden if the element or any ancestor carries a
/// hidden/display:none marker. Snapshots carry no layout, so this is the
/// closest portable equivalent of an on-screen check.
pub fn is_visible(el: ElementRef<'_>) -> bool {
    if is_hidden_shallow(&el) {
        return false;
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .all(|anc| !is_hidden_shallow(&anc))
}

const INTERACTIVE_TAGS: &[&str] = &["input", "textarea", "button", "a", "select", "option"];
const INTERACTIVE_ROLES: &[&str] = &["button", "link", "tab", "menuitem", "textbox"];

/// Interactive controls are never treated as message candidates.
pub fn is_interactive(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if INTERACTIVE_TAGS.contains(&value.name()) {
        return true;
    }
    if let Some(role) = value.attr("role") {
        if INTERACTIVE_ROLES.contains(&role) {
            return true;
        }
    }
    false
}

/// Tags whose subtrees carry no user-facing content
pub fn is_non_content_tag(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template" | "head")
}

/// Full text of an element's subtree, joined without any block formatting
pub fn flat_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Whether `outer` contains `inner` (strict: an element does not contain itself)
pub fn contains(outer: ElementRef<'_>, inner: ElementRef<'_>) -> bool {
    inner.id() != outer.id() && inner.ancestors().any(|anc| anc.id() == outer.id())
}

/// Containment dedup: when one matched node contains another, keep only the
/// outer one. Input and output are in document order.
pub fn keep_outermost<'a>(elements: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
    let mut kept: Vec<ElementRef<'a>> = Vec::with_capacity(elements.len());
    for el in elements {
        if kept.iter().any(|outer| contains(*outer, el)) {
            continue;
        }
        kept.push(el);
    }
    kept
}

/// Number of element children
pub fn child_element_count(el: ElementRef<'_>) -> usize {
    el.children().filter_map(ElementRef::wrap).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn test_compile_selector_malformed() {
        assert!(compile_selector("div..").is_none());
        assert!(compile_selector("div.message").is_some());
    }

    #[test]
    fn test_select_all_document_order() {
        let html = doc(
            r#"<div id="root">
                <p class="a">one</p>
                <span class="b">two</span>
                <p class="a">three</p>
            </div>"#,
        );
        let root = html.root_element();
        let found = select_all(root, &[".b", ".a"]);
        let texts: Vec<String> = found.iter().map(|el| flat_text(*el)).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_select_all_skips_bad_selector() {
        let html = doc(r#"<div><p class="a">one</p></div>"#);
        let found = select_all(html.root_element(), &["div..", ".a"]);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_is_visible_style_and_attrs() {
        let html = doc(
            r#"<div>
                <p id="plain">a</p>
                <p id="styled" style="display: none">b</p>
                <div hidden><p id="nested">c</p></div>
                <p id="aria" aria-hidden="true">d</p>
            </div>"#,
        );
        let by_id = |id: &str| {
            let sel = compile_selector(&format!("#{id}")).unwrap();
            html.select(&sel).next().unwrap()
        };
        assert!(is_visible(by_id("plain")));
        assert!(!is_visible(by_id("styled")));
        assert!(!is_visible(by_id("nested")));
        assert!(!is_visible(by_id("aria")));
    }

    #[test]
    fn test_is_interactive() {
        let html = doc(
            r#"<div>
                <button id="b">go</button>
                <div id="r" role="menuitem">item</div>
                <p id="p">text</p>
            </div>"#,
        );
        let by_id = |id: &str| {
            let sel = compile_selector(&format!("#{id}")).unwrap();
            html.select(&sel).next().unwrap()
        };
        assert!(is_interactive(by_id("b")));
        assert!(is_interactive(by_id("r")));
        assert!(!is_interactive(by_id("p")));
    }

    #[test]
    fn test_keep_outermost() {
        let html = doc(
            r#"<div class="m" id="outer">
                <div class="m" id="inner">text</div>
            </div>"#,
        );
        let sel = compile_selector(".m").unwrap();
        let all: Vec<_> = html.select(&sel).collect();
        assert_eq!(all.len(), 2);
        let kept = keep_outermost(all);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].value().attr("id"), Some("outer"));
    }

    #[test]
    fn test_snapshot_generation() {
        let snap = PageSnapshot::new("<html></html>".to_string(), None, 3);
        assert_eq!(snap.generation(), 3);
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_snapshot_digest_tracks_content() {
        let a = PageSnapshot::new("<p>one</p>".to_string(), None, 1);
        let b = PageSnapshot::new("<p>one</p>".to_string(), None, 2);
        let c = PageSnapshot::new("<p>two</p>".to_string(), None, 3);
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
    }
}
