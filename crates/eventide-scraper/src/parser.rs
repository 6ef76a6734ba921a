//! Selector-driven listing parser shared by the HTML strategies.

use crate::error::{Result, ScrapeError};
use chrono::Utc;
use eventide_core::{RawEventData, SourceId};
use eventide_sources::Selectors;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Field selectors compiled once per page.
struct Compiled {
    container: Selector,
    title: Selector,
    description: Option<Selector>,
    start_time: Option<Selector>,
    end_time: Option<Selector>,
    location: Option<Selector>,
    price: Option<Selector>,
    image: Option<Selector>,
    link: Option<Selector>,
}

/// Extracts event records from a listing page.
pub struct ListingParser<'a> {
    selectors: &'a Selectors,
    source_id: &'a SourceId,
    base_url: Option<Url>,
}

impl<'a> ListingParser<'a> {
    /// Parser for pages of `source_id`, resolving relative links against `base_url`.
    #[must_use]
    pub fn new(selectors: &'a Selectors, source_id: &'a SourceId, base_url: &str) -> Self {
        Self {
            selectors,
            source_id,
            base_url: Url::parse(base_url).ok(),
        }
    }

    fn compile(&self, name: &str, selector: &str) -> Result<Selector> {
        Selector::parse(selector).map_err(|e| ScrapeError::Configuration {
            source_id: self.source_id.clone(),
            reason: format!("invalid {name} selector '{selector}': {e}"),
        })
    }

    fn compile_opt(&self, name: &str, selector: Option<&String>) -> Result<Option<Selector>> {
        selector.map(|s| self.compile(name, s)).transpose()
    }

    fn compiled(&self) -> Result<Compiled> {
        let s = self.selectors;
        Ok(Compiled {
            container: self.compile("event_container", &s.event_container)?,
            title: self.compile("title", &s.title)?,
            description: self.compile_opt("description", s.description.as_ref())?,
            start_time: self.compile_opt("start_time", s.start_time.as_ref())?,
            end_time: self.compile_opt("end_time", s.end_time.as_ref())?,
            location: self.compile_opt("location", s.location.as_ref())?,
            price: self.compile_opt("price", s.price.as_ref())?,
            image: self.compile_opt("image", s.image.as_ref())?,
            link: self.compile_opt("link", s.link.as_ref())?,
        })
    }

    /// Parse every event container on the page. Containers without a title
    /// are skipped.
    pub fn parse(&self, html: &str) -> Result<Vec<RawEventData>> {
        let compiled = self.compiled()?;
        let document = Html::parse_document(html);
        let extracted_at = Utc::now();

        let events = document
            .select(&compiled.container)
            .filter_map(|item| {
                let title = text_of(&item, Some(&compiled.title))?;
                let mut event = RawEventData::new(self.source_id.clone(), title);
                event.description = text_of(&item, compiled.description.as_ref());
                event.start_time = self.time_of(&item, compiled.start_time.as_ref());
                event.end_time = self.time_of(&item, compiled.end_time.as_ref());
                event.location = text_of(&item, compiled.location.as_ref());
                event.price = text_of(&item, compiled.price.as_ref());
                event.image_url = self.url_of(&item, compiled.image.as_ref(), "src");
                event.source_url = self.url_of(&item, compiled.link.as_ref(), "href");
                event.extracted_at = extracted_at;
                Some(event)
            })
            .collect();

        Ok(events)
    }

    fn time_of(&self, item: &ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
        let element = item.select(selector?).next()?;
        self.selectors
            .datetime_attribute
            .as_deref()
            .and_then(|attr| element.value().attr(attr))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| element_text(&element))
    }

    fn url_of(&self, item: &ElementRef<'_>, selector: Option<&Selector>, attr: &str) -> Option<String> {
        let raw = item.select(selector?).next()?.value().attr(attr)?.trim();
        if raw.is_empty() {
            return None;
        }
        match &self.base_url {
            Some(base) => base.join(raw).ok().map(String::from),
            None => Url::parse(raw).ok().map(String::from),
        }
    }
}

fn element_text(element: &ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn text_of(item: &ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    element_text(&item.select(selector?).next()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <ul class="events">
            <li class="event">
              <h2>Jazz Concert at Cultural Centre</h2>
              <time datetime="2026-03-09T19:00:00Z">Mon 9 March, 7pm</time>
              <span class="venue">Cultural Centre,
                 Main Hall</span>
              <span class="price">$15</span>
              <img src="/img/jazz.jpg">
              <a href="/events/jazz">Details</a>
            </li>
            <li class="event">
              <h2>Poetry Evening</h2>
              <time>March 10, 2026</time>
            </li>
            <li class="event"><span class="venue">No title here</span></li>
          </ul>
        </body></html>
    "#;

    fn selectors() -> Selectors {
        Selectors {
            event_container: "li.event".to_string(),
            title: "h2".to_string(),
            start_time: Some("time".to_string()),
            location: Some(".venue".to_string()),
            price: Some(".price".to_string()),
            image: Some("img".to_string()),
            link: Some("a".to_string()),
            datetime_attribute: Some("datetime".to_string()),
            ..Selectors::default()
        }
    }

    #[test]
    fn test_parse_listing() {
        let source = SourceId::new("city-arts").expect("valid id");
        let selectors = selectors();
        let parser = ListingParser::new(&selectors, &source, "https://arts.example.org/whats-on");

        let events = parser.parse(LISTING).expect("parse");
        assert_eq!(events.len(), 2);

        let jazz = &events[0];
        assert_eq!(jazz.title, "Jazz Concert at Cultural Centre");
        assert_eq!(jazz.start_time.as_deref(), Some("2026-03-09T19:00:00Z"));
        assert_eq!(jazz.location.as_deref(), Some("Cultural Centre, Main Hall"));
        assert_eq!(jazz.price.as_deref(), Some("$15"));
        assert_eq!(
            jazz.image_url.as_deref(),
            Some("https://arts.example.org/img/jazz.jpg")
        );
        assert_eq!(
            jazz.source_url.as_deref(),
            Some("https://arts.example.org/events/jazz")
        );
        assert_eq!(jazz.source_id, source);

        let poetry = &events[1];
        assert_eq!(poetry.start_time.as_deref(), Some("March 10, 2026"));
        assert!(poetry.location.is_none());
    }

    #[test]
    fn test_invalid_selector_is_configuration_error() {
        let source = SourceId::new("city-arts").expect("valid id");
        let selectors = Selectors {
            event_container: "li[".to_string(),
            title: "h2".to_string(),
            ..Selectors::default()
        };
        let parser = ListingParser::new(&selectors, &source, "https://arts.example.org");
        assert!(matches!(
            parser.parse(LISTING),
            Err(ScrapeError::Configuration { .. })
        ));
    }

    #[test]
    fn test_no_matches_is_empty() {
        let source = SourceId::new("city-arts").expect("valid id");
        let selectors = Selectors {
            event_container: ".nothing".to_string(),
            title: "h2".to_string(),
            ..Selectors::default()
        };
        let parser = ListingParser::new(&selectors, &source, "https://arts.example.org");
        assert!(parser.parse(LISTING).expect("parse").is_empty());
    }
}
