use crate::{
    error::{Error, Result},
    MAX_DEPTH,
};

/// Tracks how deeply nested records are while decoding, so hostile input can't run the stack
/// out.
#[derive(Clone, Debug)]
pub struct DepthTracker {
    depth: usize,
    max: usize,
}

impl DepthTracker {
    /// Create a new depth tracker with the crate-wide limit.
    pub fn new() -> Self {
        Self::with_limit(MAX_DEPTH)
    }

    pub fn with_limit(max: usize) -> Self {
        Self { depth: 0, max }
    }

    /// Enter one nested record.
    pub fn descend(&mut self, entity: &str) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max {
            return Err(Error::ParseLimit(format!(
                "Depth limit of {} exceeded at entity '{}'",
                self.max, entity
            )));
        }
        Ok(())
    }

    /// Leave one nested record.
    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit() {
        let mut tracker = DepthTracker::with_limit(2);
        tracker.descend("a").unwrap();
        tracker.descend("b").unwrap();
        assert!(matches!(tracker.descend("c"), Err(Error::ParseLimit(_))));
        tracker.ascend();
        tracker.ascend();
        tracker.ascend();
        tracker.descend("a").unwrap();
        tracker.descend("b").unwrap();
    }
}
