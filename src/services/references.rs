//! External checks for bibliographic references: DOI, ISBN and URLs.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

static DOI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)10\.\d{4,9}/[-._;()/:A-Z0-9]+").unwrap());

static ISBN_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ISBN(?:-1[03])?:?\s*)?((?:97[89][- ]?)?\d{1,5}[- ]?\d+[- ]?\d+[- ]?[\dX])\b")
        .unwrap()
});

static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`]+"#).unwrap());

/// Answers "what status does a HEAD request to this URL get?".
#[async_trait]
pub trait LinkProbe: Send + Sync {
    /// Final status after redirects, or `None` when the request fails.
    async fn head_status(&self, url: &str) -> Option<u16>;
}

/// `LinkProbe` over HTTP.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProbe for HttpProbe {
    async fn head_status(&self, url: &str) -> Option<u16> {
        match self.client.head(url).send().await {
            Ok(resp) => Some(resp.status().as_u16()),
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                None
            }
        }
    }
}

pub fn find_doi(text: &str) -> Option<&str> {
    DOI.find(text).map(|m| m.as_str())
}

/// True when the text contains a well-formed ISBN-10 or ISBN-13.
pub fn has_isbn(text: &str) -> bool {
    ISBN_CANDIDATE
        .captures_iter(text)
        .any(|caps| is_isbn_shape(&caps[1]))
}

fn is_isbn_shape(candidate: &str) -> bool {
    let compact: Vec<char> = candidate
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    match compact.len() {
        10 => {
            compact[..9].iter().all(|c| c.is_ascii_digit())
                && (compact[9].is_ascii_digit() || compact[9] == 'X')
        }
        13 => {
            compact.iter().all(|c| c.is_ascii_digit())
                && (compact.starts_with(&['9', '7', '8']) || compact.starts_with(&['9', '7', '9']))
        }
        _ => false,
    }
}

pub fn find_urls(text: &str) -> Vec<&str> {
    URL.find_iter(text).map(|m| m.as_str()).collect()
}

/// Outcome of the three reference checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceCheck {
    pub doi_valid: bool,
    pub isbn_found: bool,
    pub url_reachable: bool,
}

impl ReferenceCheck {
    /// Run every check against a corrected reference.
    pub async fn run(text: &str, probe: &dyn LinkProbe) -> Self {
        let doi_valid = match find_doi(text) {
            Some(doi) => probe.head_status(&format!("https://doi.org/{}", doi)).await == Some(200),
            None => false,
        };

        let mut url_reachable = false;
        for url in find_urls(text) {
            if matches!(probe.head_status(url).await, Some(status) if status < 400) {
                url_reachable = true;
                break;
            }
        }

        Self {
            doi_valid,
            isbn_found: has_isbn(text),
            url_reachable,
        }
    }

    /// Single-line summary stored with the revision record.
    pub fn notes(&self) -> String {
        [
            if self.doi_valid {
                "DOI valid"
            } else {
                "DOI invalid/not found"
            },
            if self.isbn_found {
                "ISBN found"
            } else {
                "ISBN not found"
            },
            if self.url_reachable {
                "URL reachable"
            } else {
                "URL broken/not found"
            },
        ]
        .join(" | ")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Probe answering from a fixed table; unknown URLs are unreachable.
    pub(crate) struct TableProbe {
        statuses: HashMap<String, u16>,
        pub(crate) requested: Mutex<Vec<String>>,
    }

    impl TableProbe {
        pub(crate) fn new(pairs: &[(&str, u16)]) -> Self {
            Self {
                statuses: pairs.iter().map(|(u, s)| (u.to_string(), *s)).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LinkProbe for TableProbe {
        async fn head_status(&self, url: &str) -> Option<u16> {
            self.requested.lock().unwrap().push(url.to_string());
            self.statuses.get(url).copied()
        }
    }

    #[test]
    fn test_find_doi() {
        assert_eq!(
            find_doi("SILVA. Título. DOI: 10.1590/S0102-311X2020000100001."),
            Some("10.1590/S0102-311X2020000100001.")
        );
        assert_eq!(find_doi("no identifier"), None);
    }

    #[test]
    fn test_has_isbn() {
        assert!(has_isbn("São Paulo: Atlas, 2019. ISBN 978-85-97-02135-6."));
        assert!(has_isbn("ISBN-10: 0-306-40615-2"));
        assert!(has_isbn("isbn 080442957X"));
        assert!(!has_isbn("Published in 2020, 123 p."));
        assert!(!has_isbn("ISBN 123-45"));
    }

    #[test]
    fn test_find_urls() {
        let urls = find_urls("See <https://example.org/a> and http://x.y/z?q=1 now");
        assert_eq!(urls, vec!["https://example.org/a", "http://x.y/z?q=1"]);
    }

    #[tokio::test]
    async fn test_run_all_valid() {
        let probe = TableProbe::new(&[
            ("https://doi.org/10.1000/xyz123", 200),
            ("https://broken.example/a", 404),
            ("https://ok.example/b", 301),
        ]);
        let check = ReferenceCheck::run(
            "Ref. 10.1000/xyz123 ISBN 0-306-40615-2 https://broken.example/a https://ok.example/b",
            &probe,
        )
        .await;
        assert_eq!(
            check,
            ReferenceCheck {
                doi_valid: true,
                isbn_found: true,
                url_reachable: true
            }
        );
        assert_eq!(check.notes(), "DOI valid | ISBN found | URL reachable");
    }

    #[tokio::test]
    async fn test_run_nothing_found() {
        let probe = TableProbe::new(&[]);
        let check = ReferenceCheck::run("SILVA, J. Livro. 2020.", &probe).await;
        assert_eq!(check, ReferenceCheck::default());
        assert_eq!(
            check.notes(),
            "DOI invalid/not found | ISBN not found | URL broken/not found"
        );
        assert!(probe.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_doi_requires_200() {
        let probe = TableProbe::new(&[("https://doi.org/10.1000/abc", 302)]);
        let check = ReferenceCheck::run("10.1000/abc", &probe).await;
        assert!(!check.doi_valid);
    }
}
