//! On-disk naming scheme: `<gallery>_<index>_<label>.<ext>`.

use std::cmp::Ordering;

/// Parsed form of a conforming image file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    pub index: u32,
    pub label: String,
    pub extension: String,
}

impl ImageName {
    pub fn new(index: u32, label: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            extension: extension.into(),
        }
    }

    /// Parse `file_name` as belonging to `gallery`. Returns `None` for names
    /// that do not follow the scheme and therefore need normalizing.
    pub fn parse(gallery: &str, file_name: &str) -> Option<Self> {
        let rest = file_name.strip_prefix(gallery)?.strip_prefix('_')?;
        let (stem, extension) = rest.rsplit_once('.')?;
        if extension.is_empty()
            || !extension
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return None;
        }

        let (index, label) = stem.split_once('_')?;
        if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let index: u32 = index.parse().ok()?;
        if index == 0 || label.is_empty() || label.contains(['_', '.']) {
            return None;
        }

        Some(Self::new(index, label, extension))
    }

    pub fn file_name(&self, gallery: &str) -> String {
        format!("{}_{}_{}.{}", gallery, self.index, self.label, self.extension)
    }
}

/// Keep only ASCII alphanumerics and CJK ideographs. Purely numeric results
/// (user ids) are kept whole, anything else is cut to `max_length` chars.
pub fn filter_label(text: &str, max_length: usize) -> String {
    let filtered: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ('\u{4e00}'..='\u{9fa5}').contains(c))
        .collect();

    if !filtered.is_empty() && filtered.chars().all(|c| c.is_ascii_digit()) {
        filtered
    } else {
        filtered.chars().take(max_length).collect()
    }
}

/// Smallest positive integer not present in `used`.
pub fn next_free_index(used: impl IntoIterator<Item = u32>) -> u32 {
    let mut used: Vec<u32> = used.into_iter().filter(|i| *i > 0).collect();
    used.sort_unstable();
    used.dedup();

    let mut candidate = 1;
    for index in used {
        if index != candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}

/// Deterministic listing order: conforming names by index ascending, then
/// everything else by name.
pub(crate) fn listing_order(
    a: (&Option<ImageName>, &str),
    b: (&Option<ImageName>, &str),
) -> Ordering {
    match (a.0, b.0) {
        (Some(x), Some(y)) => x.index.cmp(&y.index).then_with(|| a.1.cmp(b.1)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.1.cmp(b.1),
    }
}
