use crate::graph::DEFAULT_SEARCH_BUDGET;

/// Tunables for a [`super::Session`].
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Cap on frontier pops per route search.
    pub search_budget: usize,
    /// Whether a stepped snake flips its heading when growth is cut short
    /// or another snake is touching it.
    pub bounce_on_block: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search_budget: DEFAULT_SEARCH_BUDGET,
            bounce_on_block: true,
        }
    }
}

impl SessionConfig {
    /// Profile for embedders that want partial moves reported as-is
    /// instead of bounced.
    pub fn strict() -> Self {
        Self {
            bounce_on_block: false,
            ..Self::default()
        }
    }
}
