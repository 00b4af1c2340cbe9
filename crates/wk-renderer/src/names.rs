//! Plural-aware page name matching.
//!
//! `[Widgets]` should find the page `Widget`, and `[categories]` the page
//! `Category`. [`PageNameMatcher`] generates the singular/plural variations
//! of a name; [`PageNameIndex`] precomputes them for a whole page list so a
//! lookup costs a few hash probes instead of a scan.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Generates name variations and compares names through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNameMatcher {
    match_english_plurals: bool,
}

impl Default for PageNameMatcher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PageNameMatcher {
    #[must_use]
    pub fn new(match_english_plurals: bool) -> Self {
        Self {
            match_english_plurals,
        }
    }

    pub fn match_english_plurals(&self) -> bool {
        self.match_english_plurals
    }

    pub fn normalize(name: &str) -> String {
        name.to_lowercase()
    }

    /// The normalized name followed by its singular/plural forms, deduplicated.
    pub fn variations(&self, name: &str) -> Vec<String> {
        if name.is_empty() {
            return Vec::new();
        }
        let normalized = Self::normalize(name);
        let mut variations = vec![normalized.clone()];
        if !self.match_english_plurals {
            return variations;
        }

        let n = normalized.as_str();
        if let Some(base) = n.strip_suffix("ies").filter(|b| !b.is_empty()) {
            variations.push(format!("{base}y"));
        } else if let Some(base) = n.strip_suffix('y').filter(|b| !b.is_empty()) {
            let before_y = base.chars().next_back();
            if !before_y.is_some_and(|c| "aeiou".contains(c)) {
                variations.push(format!("{base}ies"));
            }
        }

        if let Some(base) = n.strip_suffix("es").filter(|_| n.len() > 2) {
            variations.push(base.to_owned());
            variations.push(format!("{base}e"));
        }

        if n.ends_with('s') {
            if n.len() > 1 && !n.ends_with("ss") {
                variations.push(n[..n.len() - 1].to_owned());
            }
        } else {
            variations.push(format!("{n}s"));
            if n.ends_with(['x', 'z']) || n.ends_with("ch") || n.ends_with("sh") {
                variations.push(format!("{n}es"));
            }
        }

        let mut seen = HashSet::new();
        variations.retain(|v| seen.insert(v.clone()));
        variations
    }

    /// Whether two names share a variation.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        if a.is_empty() || b.is_empty() {
            return false;
        }
        let theirs = self.variations(b);
        self.variations(a).iter().any(|v| theirs.contains(v))
    }

    /// First existing name equal to `search` ignoring case, otherwise the
    /// first one sharing a variation with it.
    pub fn find_match<'a>(&self, search: &str, existing: &'a [String]) -> Option<&'a str> {
        if search.is_empty() || existing.is_empty() {
            return None;
        }
        let normalized = Self::normalize(search);
        if let Some(exact) = existing.iter().find(|n| Self::normalize(n) == normalized) {
            return Some(exact);
        }
        if !self.match_english_plurals {
            return None;
        }
        let wanted = self.variations(search);
        existing
            .iter()
            .find(|name| self.variations(name).iter().any(|v| wanted.contains(v)))
            .map(String::as_str)
    }

    /// Existing page a new page name would collide with.
    pub fn find_conflict<'a>(&self, new_name: &str, existing: &'a [String]) -> Option<&'a str> {
        self.find_match(new_name, existing)
    }
}

/// Precomputed lookup over one page list.
///
/// Resolves names exactly as [`PageNameMatcher::find_match`] would over the
/// same list in the same order.
#[derive(Debug, Clone, Default)]
pub struct PageNameIndex {
    matcher: PageNameMatcher,
    names: Vec<String>,
    /// Normalized name to position of its first occurrence.
    exact: HashMap<String, usize>,
    /// Variation to lowest position of a name producing it.
    variations: HashMap<String, usize>,
}

impl PageNameIndex {
    #[must_use]
    pub fn build(matcher: PageNameMatcher, names: Vec<String>) -> Self {
        let mut index = Self {
            matcher,
            names: Vec::new(),
            exact: HashMap::new(),
            variations: HashMap::new(),
        };
        for name in names {
            index.push(name);
        }
        index
    }

    fn push(&mut self, name: String) {
        let position = self.names.len();
        self.exact
            .entry(PageNameMatcher::normalize(&name))
            .or_insert(position);
        for variation in self.matcher.variations(&name) {
            self.variations.entry(variation).or_insert(position);
        }
        self.names.push(name);
    }

    pub fn matcher(&self) -> PageNameMatcher {
        self.matcher
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Case-sensitive membership.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Canonical page name for `search`, if any page matches it.
    pub fn find(&self, search: &str) -> Option<&str> {
        if search.is_empty() {
            return None;
        }
        if let Some(&position) = self.exact.get(&PageNameMatcher::normalize(search)) {
            return Some(&self.names[position]);
        }
        if !self.matcher.match_english_plurals() {
            return None;
        }
        self.matcher
            .variations(search)
            .iter()
            .filter_map(|v| self.variations.get(v).copied())
            .min()
            .map(|position| self.names[position].as_str())
    }

    fn with_name(&self, name: &str) -> Self {
        let mut index = self.clone();
        if !index.names.iter().any(|n| n == name) {
            index.push(name.to_owned());
        }
        index
    }

    fn without_name(&self, name: &str) -> Self {
        let names = self.names.iter().filter(|n| *n != name).cloned().collect();
        Self::build(self.matcher, names)
    }
}

/// Shared, swappable page-name index.
///
/// Readers take a snapshot and never block writers for longer than a
/// pointer swap.
#[derive(Debug, Default)]
pub struct PageNames {
    current: RwLock<Arc<PageNameIndex>>,
}

impl PageNames {
    #[must_use]
    pub fn new(matcher: PageNameMatcher) -> Self {
        Self {
            current: RwLock::new(Arc::new(PageNameIndex::build(matcher, Vec::new()))),
        }
    }

    pub fn snapshot(&self) -> Arc<PageNameIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the whole list.
    pub fn replace(&self, names: Vec<String>) {
        let matcher = self.snapshot().matcher();
        let index = Arc::new(PageNameIndex::build(matcher, names));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = index;
    }

    pub fn insert(&self, name: &str) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !current.names().iter().any(|n| n == name) {
            *current = Arc::new(current.with_name(name));
        }
    }

    pub fn remove(&self, name: &str) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.names().iter().any(|n| n == name) {
            *current = Arc::new(current.without_name(name));
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
