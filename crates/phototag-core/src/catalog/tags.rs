use std::collections::BTreeMap;

/// Reference counts of tags across all photos in a catalog.
///
/// Keys are kept in sorted order, which is the order `top` reports them in.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    counts: BTreeMap<String, usize>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, tag: &str) {
        *self.counts.entry(tag.to_string()).or_insert(0) += 1;
    }

    /// Decrement `tag`, dropping it once no photo carries it
    pub fn decrement(&mut self, tag: &str) {
        if let Some(count) = self.counts.get_mut(tag) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(tag);
            }
        }
    }

    pub fn count(&self, tag: &str) -> usize {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn all(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    /// First `n` tags in key order.
    ///
    /// This is alphabetical, not by usage; see `most_used`.
    pub fn top(&self, n: usize) -> Vec<String> {
        self.counts.keys().take(n).cloned().collect()
    }

    /// The `n` tags with the highest counts, ties broken alphabetically
    pub fn most_used(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<(&String, &usize)> = self.counts.iter().collect();
        // BTreeMap iteration is already alphabetical and sort_by is stable
        ranked.sort_by(|a, b| b.1.cmp(a.1));
        ranked.into_iter().take(n).map(|(tag, _)| tag.clone()).collect()
    }
}
