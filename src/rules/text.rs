//! Validators for free text: percentages, period of day, chronology.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::numbers::parse_percentage;
use crate::config::RuleConfig;
use crate::models::{Rule, Severity, ValidationFinding};

static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:[.,]\d+)?)\s*%").unwrap());

static TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").unwrap());

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2})/(\d{2})/(\d{4})\b").unwrap());

/// Flags every percentage above 100.
pub(super) fn impossible_percentages(text: &str) -> Vec<ValidationFinding> {
    PERCENTAGE
        .captures_iter(text)
        .filter_map(|caps| {
            let value = parse_percentage(&caps[1])?;
            (value > 100.0).then(|| {
                ValidationFinding::new(
                    Rule::ImpossiblePercentage,
                    &caps[0],
                    format!("Percentage {}% exceeds 100%", value),
                    Severity::High,
                )
            })
        })
        .collect()
}

/// Matches a time followed (lazily) by one of the given qualifiers.
pub(super) fn time_span_pattern(keywords: &[String]) -> Option<Regex> {
    if keywords.is_empty() {
        return None;
    }
    let alternatives = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b\d{{1,2}}:\d{{2}}\b.*?(?:{})", alternatives)).ok()
}

fn first_time(text: &str) -> Option<(u32, &str)> {
    let caps = TIME.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    (hour <= 23 && minute <= 59).then(|| (hour, caps.get(0).map_or("", |m| m.as_str())))
}

fn contains_any(lower: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
}

/// Flags a clock time whose hour contradicts its morning/afternoon qualifier.
pub(super) fn period_of_day(
    text: &str,
    config: &RuleConfig,
    morning_span: Option<&Regex>,
    late_span: Option<&Regex>,
) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    let Some((hour, time)) = first_time(text) else {
        return findings;
    };
    let lower = text.to_lowercase();

    let affected = |span: Option<&Regex>| {
        span.and_then(|re| re.find(text))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| time.to_string())
    };

    if hour >= 12 && contains_any(&lower, &config.morning_keywords) {
        findings.push(ValidationFinding::new(
            Rule::PeriodOfDayMismatch,
            affected(morning_span),
            format!("Time {} (hour >= 12) is qualified as morning", time),
            Severity::Medium,
        ));
    }
    if hour < 12 && contains_any(&lower, &config.late_keywords) {
        findings.push(ValidationFinding::new(
            Rule::PeriodOfDayMismatch,
            affected(late_span),
            format!("Time {} (hour < 12) is qualified as afternoon/evening", time),
            Severity::Medium,
        ));
    }
    findings
}

fn parse_date(token: &str) -> Option<NaiveDate> {
    let caps = DATE.captures(token)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Compares the first two DD/MM/YYYY dates against before/after wording.
pub(super) fn chronology(text: &str, config: &RuleConfig) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    let dates: Vec<&str> = DATE.find_iter(text).map(|m| m.as_str()).take(2).collect();
    if dates.len() < 2 {
        return findings;
    }
    let (Some(first), Some(second)) = (parse_date(dates[0]), parse_date(dates[1])) else {
        return findings;
    };
    let lower = text.to_lowercase();

    if contains_any(&lower, &config.after_keywords) && first <= second {
        findings.push(ValidationFinding::new(
            Rule::ChronologyMismatch,
            text.trim(),
            format!("'{}' does not occur after '{}'", dates[0], dates[1]),
            Severity::High,
        ));
    }
    if contains_any(&lower, &config.before_keywords) && first >= second {
        findings.push(ValidationFinding::new(
            Rule::ChronologyMismatch,
            text.trim(),
            format!("'{}' does not occur before '{}'", dates[0], dates[1]),
            Severity::High,
        ));
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_above_hundred() {
        let findings = impossible_percentages("A taxa de aprovação foi 101% no período.");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::ImpossiblePercentage);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].affected_text, "101%");
        assert!(findings[0].detail.contains("101%"));
    }

    #[test]
    fn test_percentage_at_or_below_hundred() {
        assert!(impossible_percentages("100% done, 99,9 % pending, 0%").is_empty());
        assert_eq!(impossible_percentages("100,5%").len(), 1);
    }

    fn spans(config: &RuleConfig) -> (Option<Regex>, Option<Regex>) {
        (
            time_span_pattern(&config.morning_keywords),
            time_span_pattern(&config.late_keywords),
        )
    }

    #[test]
    fn test_period_of_day_mismatch() {
        let config = RuleConfig::default();
        let (morning, late) = spans(&config);

        let findings = period_of_day(
            "A reunião começou às 14:30 da manhã.",
            &config,
            morning.as_ref(),
            late.as_ref(),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].affected_text, "14:30 da manhã");

        let findings = period_of_day(
            "We met at 09:00 in the evening.",
            &config,
            morning.as_ref(),
            late.as_ref(),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].affected_text, "09:00 in the evening");
    }

    #[test]
    fn test_period_of_day_consistent_or_invalid() {
        let config = RuleConfig::default();
        let (morning, late) = spans(&config);
        assert!(period_of_day("às 09:30 da manhã", &config, morning.as_ref(), late.as_ref())
            .is_empty());
        assert!(period_of_day("às 25:30 da manhã", &config, morning.as_ref(), late.as_ref())
            .is_empty());
        assert!(period_of_day("sem horário", &config, morning.as_ref(), late.as_ref()).is_empty());
    }

    #[test]
    fn test_chronology() {
        let config = RuleConfig::default();

        let findings = chronology("A entrega em 01/03/2024 ocorreu depois de 15/03/2024.", &config);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::ChronologyMismatch);
        assert_eq!(findings[0].severity, Severity::High);

        let findings = chronology("Signed on 20/03/2024, before 15/03/2024.", &config);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].detail.contains("before"));

        assert!(chronology("Depois: 20/03/2024 e 15/03/2024", &config).is_empty());
    }

    #[test]
    fn test_chronology_invalid_dates_skipped() {
        let config = RuleConfig::default();
        assert!(chronology("depois de 31/02/2024 e 01/03/2024", &config).is_empty());
        assert!(chronology("depois de 01/03/2024", &config).is_empty());
    }

    #[test]
    fn test_custom_keywords() {
        let config = RuleConfig {
            after_keywords: vec!["later than".into()],
            ..Default::default()
        };
        let findings = chronology("01/01/2024 is later than 02/01/2024", &config);
        assert_eq!(findings.len(), 1);
        assert!(chronology("01/01/2024 depois 02/01/2024", &config).is_empty());
    }
}
