use matchpulse_core::snapshot::{Node, Snapshot};
use matchpulse_core::traits::SnapshotParser;
use scraper::{ElementRef, Html, Selector};

/// Parses raw markup into an [`HtmlSnapshot`] with `scraper`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl SnapshotParser for HtmlParser {
    type Snapshot = HtmlSnapshot;

    fn parse(&self, html: &str) -> HtmlSnapshot {
        HtmlSnapshot::parse(html)
    }
}

/// A parsed HTML document.
///
/// Not `Send`: parse it, extract, and drop it before the next `.await`.
pub struct HtmlSnapshot {
    document: Html,
}

impl HtmlSnapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }
}

impl Snapshot for HtmlSnapshot {
    type Node<'a> = HtmlNode<'a>;

    fn select_all(&self, selector: &str) -> Vec<HtmlNode<'_>> {
        match compile(selector) {
            Some(sel) => self.document.select(&sel).map(HtmlNode).collect(),
            None => Vec::new(),
        }
    }
}

/// One element of an [`HtmlSnapshot`].
#[derive(Debug, Clone, Copy)]
pub struct HtmlNode<'a>(ElementRef<'a>);

impl Node for HtmlNode<'_> {
    fn find(&self, selector: &str) -> Option<Self> {
        let sel = compile(selector)?;
        self.0.select(&sel).next().map(HtmlNode)
    }

    fn closest(&self, selector: &str) -> Option<Self> {
        let sel = compile(selector)?;
        std::iter::once(self.0)
            .chain(self.0.ancestors().filter_map(ElementRef::wrap))
            .find(|el| sel.matches(el))
            .map(HtmlNode)
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.0.value().attr(name).map(str::to_string)
    }

    fn text(&self) -> String {
        self.0.text().collect()
    }

    fn classes(&self) -> Vec<String> {
        self.0.value().classes().map(str::to_string).collect()
    }

    fn outer_html(&self) -> String {
        self.0.html()
    }
}

fn compile(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::debug!(selector, error = %e, "Ignoring invalid selector");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="match-day">
            <div class="standard-headline">Saturday - 2024-05-11</div>
            <div class="match-wrapper live-match" data-match-id="42" live="true">
              <div class="match"><span class="match-teamname">FaZe</span></div>
            </div>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_select_and_walk() {
        let snapshot = HtmlParser.parse(PAGE);
        let containers = snapshot.select_all(".match-wrapper");
        assert_eq!(containers.len(), 1);

        let container = &containers[0];
        assert_eq!(container.attr("data-match-id").as_deref(), Some("42"));
        assert!(container.has_class("live-match"));
        assert_eq!(
            container.find(".match-teamname").and_then(|n| n.trimmed_text()).as_deref(),
            Some("FaZe")
        );
        assert!(container.outer_html().starts_with("<div class=\"match-wrapper"));
    }

    #[test]
    fn test_closest_includes_self_and_ancestors() {
        let snapshot = HtmlSnapshot::parse(PAGE);
        let name = snapshot.select_all(".match-teamname").remove(0);

        let section = name.closest(".match-day").unwrap();
        let headline = section.find(".standard-headline").unwrap();
        assert_eq!(headline.text(), "Saturday - 2024-05-11");

        assert!(name.closest(".match-teamname").is_some());
        assert!(name.closest(".ranked-team").is_none());
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let snapshot = HtmlSnapshot::parse(PAGE);
        assert!(snapshot.select_all("div[[").is_empty());
        assert!(snapshot.select_all(".match-wrapper")[0].find("::").is_none());
    }

    #[test]
    fn test_select_first_non_empty_uses_fallback() {
        let snapshot = HtmlSnapshot::parse(PAGE);
        let found = snapshot.select_first_non_empty(&[".upcomingMatch", ".match-wrapper"]);
        assert_eq!(found.len(), 1);
    }
}
