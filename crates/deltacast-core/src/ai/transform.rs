//! Asynchronous transforms applied to each flushed buffer

use std::time::Duration;

use anyhow::Result;
use tracing::debug;

/// Delay used by the reference transform
pub const DEFAULT_TRANSFORM_DELAY: Duration = Duration::from_secs(1);

/// A unit of work applied to each flushed buffer.
///
/// Implementations may suspend (e.g. call another model). The pipeline awaits
/// each call to completion before it reads more input.
#[async_trait::async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, text: &str) -> Result<String>;
}

/// Uppercases the text after a fixed delay
#[derive(Debug, Clone)]
pub struct UppercaseTransform {
    delay: Duration,
}

impl UppercaseTransform {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// No artificial delay
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for UppercaseTransform {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSFORM_DELAY)
    }
}

#[async_trait::async_trait]
impl Transform for UppercaseTransform {
    async fn transform(&self, text: &str) -> Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        debug!("Uppercasing {} chars", text.len());
        Ok(text.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_immediate_uppercase() {
        let out = UppercaseTransform::immediate()
            .transform("hello, world")
            .await
            .unwrap();
        assert_eq!(out, "HELLO, WORLD");
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_waits_one_second() {
        let transform = UppercaseTransform::default();
        assert_eq!(transform.delay(), Duration::from_secs(1));

        let start = Instant::now();
        let out = transform.transform("abc").await.unwrap();
        assert_eq!(out, "ABC");
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
