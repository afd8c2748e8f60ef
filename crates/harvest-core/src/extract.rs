//! DOM queries: frontier anchors, listing pages, detail flattening and
//! structured book sections

use crate::render::Query;
use crate::{ExtractedContent, HarvestError, HierarchyRoot, Item, ListingPage, Result, Section};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

/// Parse a CSS selector, reporting the offending text on failure
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| HarvestError::QueryError(format!("Invalid selector `{}`: {:?}", selector, e)))
}

/// Resolve an anchor's href against the page URL; only http(s) targets survive
fn resolve_href(element: ElementRef, base: &Url) -> Option<Url> {
    let href = element.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Concatenated descendant text, like the DOM's `textContent`
fn text_content(element: ElementRef) -> String {
    element.text().collect()
}

/// Rendered-text approximation: descendant text with whitespace runs collapsed
fn inner_text(element: ElementRef) -> String {
    text_content(element)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Enumerates anchors matching a selector as hierarchy roots
pub struct FrontierQuery {
    anchors: Selector,
}

impl FrontierQuery {
    pub fn new(anchors: &str) -> Result<Self> {
        Ok(Self {
            anchors: parse_selector(anchors)?,
        })
    }
}

impl Query for FrontierQuery {
    type Output = Vec<HierarchyRoot>;

    fn evaluate(&self, document: &Html, base: &Url) -> Result<Self::Output> {
        let roots = document
            .select(&self.anchors)
            .filter_map(|anchor| {
                let label = text_content(anchor).trim().to_string();
                if label.is_empty() {
                    return None;
                }
                let entry_url = resolve_href(anchor, base)?;
                Some(HierarchyRoot { label, entry_url })
            })
            .collect();
        Ok(roots)
    }
}

/// Selectors describing one paginated listing
pub struct ListingQuery {
    items: Selector,
    label_link: Selector,
    keys: Selector,
    next: Selector,
}

impl ListingQuery {
    pub fn new(items: &str, label_link: &str, keys: &str, next: &str) -> Result<Self> {
        Ok(Self {
            items: parse_selector(items)?,
            label_link: parse_selector(label_link)?,
            keys: parse_selector(keys)?,
            next: parse_selector(next)?,
        })
    }
}

impl Query for ListingQuery {
    type Output = ListingPage;

    fn evaluate(&self, document: &Html, base: &Url) -> Result<Self::Output> {
        let items = document
            .select(&self.items)
            .map(|result| {
                let link = result.select(&self.label_link).next();
                let display_label = link
                    .map(|a| text_content(a).trim().to_string())
                    .unwrap_or_default();
                let detail_url = link.and_then(|a| resolve_href(a, base));
                let secondary_key = result
                    .select(&self.keys)
                    .map(|code| text_content(code).trim().to_string())
                    .collect::<Vec<_>>()
                    .join("_");
                Item {
                    display_label,
                    secondary_key,
                    detail_url,
                }
            })
            .collect::<Vec<_>>();

        let next = document
            .select(&self.next)
            .next()
            .and_then(|a| resolve_href(a, base));

        debug!("Listing {} yielded {} items, next: {:?}", base, items.len(), next);
        Ok(ListingPage { items, next })
    }
}

/// Flattens a single content container into newline-separated text
pub struct DetailQuery {
    container: Selector,
    preview: Selector,
}

impl DetailQuery {
    pub fn new(container: &str, preview: &str) -> Result<Self> {
        Ok(Self {
            container: parse_selector(container)?,
            preview: parse_selector(preview)?,
        })
    }
}

impl Query for DetailQuery {
    type Output = ExtractedContent;

    fn evaluate(&self, document: &Html, _base: &Url) -> Result<Self::Output> {
        let Some(container) = document.select(&self.container).next() else {
            return Ok(ExtractedContent::ContainerAbsent);
        };
        let previews: Vec<ElementRef> = container.select(&self.preview).collect();
        Ok(ExtractedContent::Content(flatten_children(container, &previews)))
    }
}

/// Each immediate child's text, trimmed, empties dropped, joined by `\n`.
/// Subtrees rooted at any element in `skip` contribute nothing.
pub fn flatten_children(container: ElementRef, skip: &[ElementRef]) -> String {
    let mut parts = Vec::new();
    for child in container.children() {
        let mut text = String::new();
        match child.value() {
            Node::Text(t) => text.push_str(&t.text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    if !skip.contains(&element) {
                        flatten_into(element, skip, &mut text);
                    }
                }
            }
            _ => {}
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }
    parts.join("\n")
}

fn flatten_into(element: ElementRef, skip: &[ElementRef], out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(t) => out.push_str(&t.text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !skip.contains(&child) {
                        flatten_into(child, skip, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Book section page: title plus sections with structural markers kept inline
pub struct SectionQuery {
    title: Selector,
    body: Selector,
    sections: Selector,
    list_items: Selector,
}

impl SectionQuery {
    pub fn new(title: &str, body: &str, sections: &str) -> Result<Self> {
        Ok(Self {
            title: parse_selector(title)?,
            body: parse_selector(body)?,
            sections: parse_selector(sections)?,
            list_items: parse_selector("li")?,
        })
    }

    fn render_section(&self, section: ElementRef) -> String {
        let id = section.value().id().unwrap_or_default();
        let mut lines = vec![format!("ID: {}", id)];

        for child in section.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "h2" => lines.push(format!("Header: {}", inner_text(child))),
                "p" => lines.push(inner_text(child)),
                "ul" => {
                    for li in child.select(&self.list_items) {
                        lines.push(format!("- {}", inner_text(li)));
                    }
                }
                _ => {}
            }
        }
        lines.join("\n")
    }
}

impl Query for SectionQuery {
    type Output = Section;

    fn evaluate(&self, document: &Html, _base: &Url) -> Result<Self::Output> {
        let title = document
            .select(&self.title)
            .next()
            .map(inner_text)
            .filter(|t| !t.is_empty());

        let content = match document.select(&self.body).next() {
            None => ExtractedContent::ContainerAbsent,
            Some(body) => ExtractedContent::Content(
                body.select(&self.sections)
                    .map(|section| self.render_section(section))
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            ),
        };

        Ok(Section { title, content })
    }
}
