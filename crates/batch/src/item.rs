//! Item-oriented pipeline stages.
//!
//! A chunk step pulls items from an [`ItemReader`] until it has a full chunk,
//! passes each through an [`ItemProcessor`] and hands the surviving items to
//! an [`ItemWriter`] in one call.

use async_trait::async_trait;

use crate::error::BatchResult;

/// Produces items one at a time. `Ok(None)` signals the end of input.
#[async_trait]
pub trait ItemReader<I: Send>: Send {
    async fn read(&mut self) -> BatchResult<Option<I>>;
}

/// Transforms an item. Returning `Ok(None)` filters the item out.
#[async_trait]
pub trait ItemProcessor<I: Send + 'static, O: Send + 'static>: Send + Sync {
    async fn process(&self, item: I) -> BatchResult<Option<O>>;
}

/// Receives one chunk of processed items.
#[async_trait]
pub trait ItemWriter<O: Send + 'static>: Send {
    async fn write(&mut self, items: Vec<O>) -> BatchResult<()>;
}

/// Reader over an in-memory sequence.
pub struct IteratorItemReader<I> {
    items: std::vec::IntoIter<I>,
}

impl<I> IteratorItemReader<I> {
    pub fn new(items: impl IntoIterator<Item = I>) -> Self {
        Self {
            items: items.into_iter().collect::<Vec<_>>().into_iter(),
        }
    }
}

#[async_trait]
impl<I: Send> ItemReader<I> for IteratorItemReader<I> {
    async fn read(&mut self) -> BatchResult<Option<I>> {
        Ok(self.items.next())
    }
}

/// Processor that forwards items unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughProcessor;

#[async_trait]
impl<I: Send + 'static> ItemProcessor<I, I> for PassThroughProcessor {
    async fn process(&self, item: I) -> BatchResult<Option<I>> {
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_iterator_reader_drains() {
        let mut reader = IteratorItemReader::new(vec![1, 2]);
        assert_eq!(reader.read().await.unwrap(), Some(1));
        assert_eq!(reader.read().await.unwrap(), Some(2));
        assert_eq!(reader.read().await.unwrap(), None);
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pass_through() {
        let out: Option<&str> = PassThroughProcessor.process("x").await.unwrap();
        assert_eq!(out, Some("x"));
    }
}
