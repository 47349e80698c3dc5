//! Best-effort capability probing: a ranked list of strategies tried in
//! order, with every attempt recorded so a failure can be diagnosed.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    /// The strategy ran but found nothing usable.
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
}

/// Outcome of running a ranked strategy list.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport<T> {
    pub value: Option<T>,
    pub attempts: Vec<Attempt>,
}

impl<T> Default for ProbeReport<T> {
    fn default() -> Self {
        Self {
            value: None,
            attempts: Vec::new(),
        }
    }
}

impl<T> ProbeReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, strategy: impl Into<String>, outcome: AttemptOutcome) {
        self.attempts.push(Attempt {
            strategy: strategy.into(),
            outcome,
        });
    }

    pub fn succeeded(&self) -> bool {
        self.value.is_some()
    }

    /// Name of the strategy that produced the value, if any.
    pub fn winning_strategy(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.outcome == AttemptOutcome::Succeeded)
            .map(|a| a.strategy.as_str())
    }

    /// Run strategies in order until one yields a value.
    ///
    /// `Ok(None)` is recorded as not-found, `Err` as a failure; both move on
    /// to the next strategy. Each strategy runs at most once.
    pub fn run<'a, E, I, F>(strategies: I) -> Self
    where
        E: fmt::Display,
        I: IntoIterator<Item = (&'a str, F)>,
        F: FnOnce() -> Result<Option<T>, E>,
    {
        let mut report = Self::new();
        for (name, strategy) in strategies {
            match strategy() {
                Ok(Some(value)) => {
                    report.record(name, AttemptOutcome::Succeeded);
                    report.value = Some(value);
                    break;
                }
                Ok(None) => report.record(name, AttemptOutcome::NotFound),
                Err(e) => report.record(name, AttemptOutcome::Failed(e.to_string())),
            }
        }
        report
    }
}

impl<T> fmt::Display for ProbeReport<T> {
    /// One line per attempt: `strategy: outcome`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Succeeded => format!("{}: ok", a.strategy),
                AttemptOutcome::NotFound => format!("{}: not found", a.strategy),
                AttemptOutcome::Failed(e) => format!("{}: failed ({})", a.strategy, e),
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}
