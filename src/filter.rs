//! DNS query filtering hook.
//!
//! The relay defines the insertion point for policy evaluation and the
//! refusal mechanism around it; rule semantics are out of scope. The shipped
//! filter forwards everything.

use crate::dns::Question;

/// Outcome of evaluating one question against policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

/// Pluggable policy decision over the single question of a query.
///
/// A `Deny` verdict is surfaced to the client as REFUSED, sharing the code
/// path a structural violation takes.
pub trait QueryFilter: Send + Sync {
    fn evaluate(&self, question: &Question) -> Verdict;
}

/// Any `Fn(&Question) -> Verdict` is a filter.
impl<F> QueryFilter for F
where
    F: Fn(&Question) -> Verdict + Send + Sync,
{
    fn evaluate(&self, question: &Question) -> Verdict {
        self(question)
    }
}

/// Filter that forwards every query.
pub struct AllowAll;

impl QueryFilter for AllowAll {
    fn evaluate(&self, _question: &Question) -> Verdict {
        Verdict::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(name: &str) -> Question {
        Question {
            name: name.to_string(),
            qtype: 1,
            qclass: 1,
        }
    }

    #[test]
    fn allow_all_allows_everything() {
        assert_eq!(
            AllowAll.evaluate(&question("example.com")),
            Verdict::Allow
        );
    }

    #[test]
    fn closures_are_filters() {
        let filter = |q: &Question| {
            if q.name == "blocked.test" {
                Verdict::Deny
            } else {
                Verdict::Allow
            }
        };

        assert_eq!(filter.evaluate(&question("blocked.test")), Verdict::Deny);
        assert_eq!(filter.evaluate(&question("example.com")), Verdict::Allow);
    }
}
