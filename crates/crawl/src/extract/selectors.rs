//! Ordered selector strategies.

use scraper::{ElementRef, Html, Selector};

use super::ExtractError;

/// Selectors tried in order; the first one that matches wins.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    strategies: Vec<(String, Selector)>,
}

impl SelectorChain {
    /// Compile a chain, rejecting the first selector that does not parse.
    pub fn parse<I, S>(selectors: I) -> Result<Self, ExtractError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let strategies = selectors
            .into_iter()
            .map(|raw| {
                let raw = raw.as_ref().trim();
                Selector::parse(raw)
                    .map(|sel| (raw.to_string(), sel))
                    .map_err(|e| ExtractError::InvalidSelector { selector: raw.to_string(), reason: e.to_string() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { strategies })
    }

    /// A chain holding a single configured selector.
    pub fn single(selector: &str) -> Result<Self, ExtractError> {
        Self::parse([selector])
    }

    /// All matches of the first strategy that matches anything in the document.
    pub fn select_all<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        for (raw, selector) in &self.strategies {
            let found: Vec<_> = doc.select(selector).collect();
            if !found.is_empty() {
                tracing::trace!(selector = %raw, count = found.len(), "container strategy matched");
                return found;
            }
        }
        Vec::new()
    }

    /// First descendant of `scope` matched by the earliest matching strategy.
    pub fn first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.strategies.iter().find_map(|(_, selector)| scope.select(selector).next())
    }

    /// Every descendant of `scope` matched by any strategy.
    pub fn all_within<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.strategies
            .iter()
            .flat_map(|(_, selector)| scope.select(selector))
            .collect()
    }
}
