/// Result of processing a single sub-entity.
///
/// A stub outside the lookback window is a filtering outcome, not an error;
/// collectors count skips and failures separately so runs stay observable
/// even though both are omitted from aggregation.
#[derive(Debug)]
pub enum Outcome<T> {
    Fact(T),
    Skipped,
}
