use super::*;
use crate::common::*;

/// The generic dataset trait.
pub trait GenericDataset
where
    Self: Debug + Send + Sync,
{
    /// The number of color channels of the dataset.
    fn input_channels(&self) -> usize;

    /// The class vocabulary of the dataset, if one is provided.
    fn classes(&self) -> Option<&ClassVocabulary>;
}

/// The dataset that can be random accessed.
pub trait RandomAccessDataset
where
    Self: GenericDataset,
{
    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the nth record in the dataset.
    ///
    /// Implementations may offload the blocking work to the tokio blocking
    /// pool when a runtime is available.
    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<ClipSample>> + Send>>;
}
