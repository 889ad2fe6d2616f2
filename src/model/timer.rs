//! ISO-8601 timer expressions.
//!
//! Timer event definitions carry either a plain duration (`PT5M`) or a
//! repeating cycle (`R3/PT10S`, `R/PT1H` for unbounded).

use std::sync::OnceLock;

use regex::Regex;

use crate::{ProcflowError, Result};

static TIMER_RE: OnceLock<Regex> = OnceLock::new();

fn timer_re() -> &'static Regex {
    TIMER_RE.get_or_init(|| {
        Regex::new(r"^(?:R(\d*)/)?P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").unwrap()
    })
}

/// Parsed timer definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerDefinition {
    /// remaining occurrences; `None` for a one-shot timer, `Some(0)` for
    /// an unbounded cycle
    pub repeat: Option<u32>,
    /// interval between occurrences
    pub duration_millis: i64,
}

impl TimerDefinition {
    /// Parse an ISO-8601 duration or cycle expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let caps = timer_re().captures(expr.trim()).ok_or_else(|| ProcflowError::Definition(format!("invalid timer expression: {}", expr)))?;

        let repeat = caps.get(1).map(|m| {
            if m.as_str().is_empty() {
                0
            } else {
                m.as_str().parse::<u32>().unwrap_or(0)
            }
        });

        let days = caps.get(2).map_or(0, |m| m.as_str().parse::<i64>().unwrap_or(0));
        let hours = caps.get(3).map_or(0, |m| m.as_str().parse::<i64>().unwrap_or(0));
        let minutes = caps.get(4).map_or(0, |m| m.as_str().parse::<i64>().unwrap_or(0));
        let seconds = caps.get(5).map_or(0, |m| m.as_str().parse::<i64>().unwrap_or(0));

        let duration_millis = (((days * 24 + hours) * 60 + minutes) * 60 + seconds) * 1000;
        if duration_millis == 0 {
            return Err(ProcflowError::Definition(format!("timer expression has zero duration: {}", expr)));
        }

        Ok(Self {
            repeat,
            duration_millis,
        })
    }

    /// One-shot timers never repeat; cycles repeat while occurrences
    /// remain (or forever when unbounded).
    pub fn is_repeating(&self) -> bool {
        match self.repeat {
            None => false,
            Some(0) => true,
            Some(n) => n > 1,
        }
    }

    /// The definition for the occurrence after this one fires.
    pub fn next_occurrence(&self) -> Self {
        Self {
            repeat: self.repeat.map(|n| if n == 0 { 0 } else { n - 1 }),
            duration_millis: self.duration_millis,
        }
    }
}

#[cfg(test)]
mod test {
    use super::TimerDefinition;

    #[test]
    fn test_parse_duration() {
        let t = TimerDefinition::parse("PT5M").unwrap();
        assert_eq!(t.repeat, None);
        assert_eq!(t.duration_millis, 5 * 60 * 1000);
        assert!(!t.is_repeating());

        let t = TimerDefinition::parse("P1DT2H3M4S").unwrap();
        assert_eq!(t.duration_millis, ((26 * 60 + 3) * 60 + 4) * 1000);
    }

    #[test]
    fn test_parse_cycle() {
        let t = TimerDefinition::parse("R3/PT10S").unwrap();
        assert_eq!(t.repeat, Some(3));
        assert_eq!(t.duration_millis, 10_000);
        assert!(t.is_repeating());

        let next = t.next_occurrence().next_occurrence();
        assert_eq!(next.repeat, Some(1));
        assert!(!next.is_repeating());

        // unbounded cycle keeps repeating
        let t = TimerDefinition::parse("R/PT1H").unwrap();
        assert_eq!(t.repeat, Some(0));
        assert!(t.is_repeating());
        assert!(t.next_occurrence().is_repeating());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(TimerDefinition::parse("5 minutes").is_err());
        assert!(TimerDefinition::parse("P").is_err());
        assert!(TimerDefinition::parse("").is_err());
    }
}
