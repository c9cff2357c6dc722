//! Citation / bibliography cross-check.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Category, CitationGap, ContentUnit};

/// `(AUTHOR, 2020)` and `(AUTHOR; OTHER, 2020a)` on upper-cased text.
static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([A-Z][A-Z\s,;]*?)[,;]\s*(\d{4}[A-Z]?)\)").unwrap());

/// Citations in non-bibliographic units that no bibliographic unit mentions.
///
/// A citation is covered when some reference contains both the first
/// author's surname and the year (case-insensitive). Gaps come back sorted.
pub fn find_citation_gaps(units: &[ContentUnit]) -> Vec<CitationGap> {
    let mut references = Vec::new();
    let mut citations = BTreeSet::new();

    for unit in units.iter().filter(|u| u.is_textual()) {
        let text = unit.effective_text();
        if unit.category() == Category::Bibliographic {
            references.push(text.to_lowercase());
            continue;
        }

        let upper = text.to_uppercase();
        for caps in CITATION.captures_iter(&upper) {
            let author = caps[1]
                .split([',', ';'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            if author.is_empty() {
                continue;
            }
            citations.insert(CitationGap {
                author,
                year: caps[2].to_string(),
            });
        }
    }

    citations
        .into_iter()
        .filter(|citation| {
            let author = citation.author.to_lowercase();
            let year = citation.year.to_lowercase();
            !references
                .iter()
                .any(|reference| reference.contains(&author) && reference.contains(&year))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Anchor, UnitKind};

    fn unit(id: usize, text: &str, category: Category) -> ContentUnit {
        let mut unit = ContentUnit::text(
            id,
            UnitKind::Text,
            format!("Paragraph {}", id + 1),
            text.to_string(),
            Anchor::Body { paragraph: id },
        );
        unit.category = Some(category);
        unit
    }

    #[test]
    fn test_missing_reference_is_reported() {
        let units = vec![
            unit(0, "As shown by (Silva, 2020) and (Souza, 2019).", Category::Textual),
            unit(1, "SOUZA, M. Methods. Rio de Janeiro, 2019.", Category::Bibliographic),
        ];
        let gaps = find_citation_gaps(&units);
        assert_eq!(
            gaps,
            vec![CitationGap {
                author: "SILVA".into(),
                year: "2020".into()
            }]
        );
        assert_eq!(gaps[0].to_string(), "(SILVA, 2020)");
    }

    #[test]
    fn test_multiple_authors_use_first() {
        let units = vec![
            unit(0, "Prior work (Costa; Lima, 2018a) agrees.", Category::None),
            unit(1, "COSTA, A.; LIMA, B. Study. 2018a.", Category::Bibliographic),
        ];
        assert!(find_citation_gaps(&units).is_empty());
    }

    #[test]
    fn test_duplicates_collapse_and_sort() {
        let units = vec![
            unit(0, "(Zeta, 2001) then (Alpha, 1999)", Category::Textual),
            unit(1, "again (ZETA, 2001)", Category::Logical),
        ];
        let gaps = find_citation_gaps(&units);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].author, "ALPHA");
        assert_eq!(gaps[1].author, "ZETA");
    }

    #[test]
    fn test_corrected_reference_text_is_used() {
        let mut reference = unit(1, "garbled", Category::Bibliographic);
        reference.corrected_content = Some("SILVA, J. Book. 2020.".into());
        let units = vec![unit(0, "(Silva, 2020)", Category::Textual), reference];
        assert!(find_citation_gaps(&units).is_empty());
    }
}
