//! Conversion diagnostics
//!
//! Events are forwarded to `tracing` as they happen; this module's own job
//! is the bookkeeping around them: counting warnings and errors against the
//! node currently being converted, producing its one-line summary when it
//! finishes, and keeping the per-node outcomes for the final run index.

/// The recorded outcome of one node's conversion.
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub nid: i64,
    pub title: String,
    pub warnings: u32,
    pub errors: u32,
    pub failed: bool,
}

#[derive(Debug, Default)]
struct NodeTally {
    nid: i64,
    title: String,
    warnings: u32,
    errors: u32,
}

/// Tallying log sink for a single migration run.
#[derive(Debug, Default)]
pub struct ConversionLog {
    current: Option<NodeTally>,
    outcomes: Vec<NodeOutcome>,
}

impl ConversionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a node scope: subsequent warnings and errors count against it.
    pub fn begin_node(&mut self, nid: i64, title: &str) {
        self.current = Some(NodeTally {
            nid,
            title: title.to_string(),
            ..NodeTally::default()
        });
    }

    /// Close the current node scope, recording and summarizing its outcome.
    pub fn end_node(&mut self, failed: bool) {
        let Some(tally) = self.current.take() else {
            return;
        };
        let outcome = NodeOutcome {
            nid: tally.nid,
            title: tally.title,
            warnings: tally.warnings,
            errors: tally.errors,
            failed,
        };
        let summary = format!(
            "Converted node {} '{}' [{} error(s), {} warning(s)]",
            outcome.nid, outcome.title, outcome.errors, outcome.warnings
        );
        if outcome.errors > 0 {
            tracing::error!("{summary}");
        } else if outcome.warnings > 0 {
            tracing::warn!("{summary}");
        } else {
            tracing::info!("{summary}");
        }
        self.outcomes.push(outcome);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!("{}", message.as_ref());
    }

    pub fn warning(&mut self, message: impl AsRef<str>) {
        tracing::warn!("{}", message.as_ref());
        if let Some(tally) = &mut self.current {
            tally.warnings += 1;
        }
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        tracing::error!("{}", message.as_ref());
        if let Some(tally) = &mut self.current {
            tally.errors += 1;
        }
    }

    pub fn outcomes(&self) -> &[NodeOutcome] {
        &self.outcomes
    }

    pub fn total_warnings(&self) -> u32 {
        self.outcomes.iter().map(|o| o.warnings).sum()
    }

    pub fn total_errors(&self) -> u32 {
        self.outcomes.iter().map(|o| o.errors).sum()
    }

    /// Emit the final index: one line per node with its outcome.
    pub fn write_index(&self) {
        for outcome in &self.outcomes {
            let status = if outcome.failed { "FAILED" } else { "ok" };
            tracing::info!(
                "node {} '{}': {} ({} error(s), {} warning(s))",
                outcome.nid,
                outcome.title,
                status,
                outcome.errors,
                outcome.warnings
            );
        }
        tracing::info!(
            "{} node(s) converted, {} error(s), {} warning(s)",
            self.outcomes.len(),
            self.total_errors(),
            self.total_warnings()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tallies_scope_to_current_node() {
        let mut log = ConversionLog::new();
        log.begin_node(1, "first");
        log.warning("w1");
        log.warning("w2");
        log.error("e1");
        log.end_node(false);

        log.begin_node(2, "second");
        log.warning("w3");
        log.end_node(true);

        let outcomes = log.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].warnings, 2);
        assert_eq!(outcomes[0].errors, 1);
        assert!(!outcomes[0].failed);
        assert_eq!(outcomes[1].warnings, 1);
        assert_eq!(outcomes[1].errors, 0);
        assert!(outcomes[1].failed);
        assert_eq!(log.total_warnings(), 3);
        assert_eq!(log.total_errors(), 1);
    }

    #[test]
    fn test_events_outside_a_node_scope_do_not_panic() {
        let mut log = ConversionLog::new();
        log.warning("setup warning");
        log.error("setup error");
        log.end_node(false);
        assert!(log.outcomes().is_empty());
    }
}
