/// What the fallback chain should do after a tier fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChainDisposition {
    /// Stop the chain for this ticker entirely. Used for invalid
    /// tickers - no amount of falling back will fix configuration.
    Abort,

    /// Move on to the next tier in priority order. The failed tier is
    /// not retried within the same cycle.
    NextTier,

    /// The tier cannot work until its credential is fixed. Skip it now
    /// and on every later cycle this process runs.
    TierDisabled,
}
