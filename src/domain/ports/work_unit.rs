use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Port for the object-level work performed by the quality producer
///
/// Each call performs one discrete unit of progress on top of the previous
/// artifact and reports the quality of the result. Quality must be a finite,
/// non-negative number and should be non-decreasing across steps.
///
/// # Examples
///
/// ```no_run
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use metacontrol::domain::ports::WorkUnit;
///
/// struct Counter;
///
/// #[async_trait]
/// impl WorkUnit for Counter {
///     type Artifact = u64;
///
///     async fn step(&self, previous: Option<&u64>) -> Result<(u64, f64)> {
///         let next = previous.copied().unwrap_or(0) + 1;
///         Ok((next, next as f64))
///     }
/// }
/// ```
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// The quality-bearing artifact being improved
    type Artifact: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Perform one unit of work
    ///
    /// # Arguments
    ///
    /// * `previous` - Artifact produced by the previous step (None on the first step)
    ///
    /// # Returns
    ///
    /// * `Ok((artifact, quality))` - The improved artifact and its quality
    /// * `Err` - The work unit failed; the producer aborts
    async fn step(&self, previous: Option<&Self::Artifact>) -> Result<(Self::Artifact, f64)>;
}

/// Adapter turning a synchronous closure into a [`WorkUnit`].
pub struct FnWorkUnit<A, F> {
    f: F,
    _artifact: std::marker::PhantomData<fn() -> A>,
}

/// Wrap `f` as a work unit.
pub fn work_unit_fn<A, F>(f: F) -> FnWorkUnit<A, F>
where
    F: Fn(Option<&A>) -> Result<(A, f64)> + Send + Sync,
{
    FnWorkUnit {
        f,
        _artifact: std::marker::PhantomData,
    }
}

#[async_trait]
impl<A, F> WorkUnit for FnWorkUnit<A, F>
where
    A: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(Option<&A>) -> Result<(A, f64)> + Send + Sync,
{
    type Artifact = A;

    async fn step(&self, previous: Option<&A>) -> Result<(A, f64)> {
        (self.f)(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_work_unit_threads_artifact() {
        let unit = work_unit_fn(|prev: Option<&u32>| {
            let next = prev.copied().unwrap_or(0) + 1;
            Ok((next, f64::from(next)))
        });

        let (first, q1) = unit.step(None).await.unwrap();
        let (second, q2) = unit.step(Some(&first)).await.unwrap();
        assert_eq!(second, 2);
        assert!((q2 - q1 - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_fn_work_unit_propagates_errors() {
        let unit = work_unit_fn(|_: Option<&u32>| anyhow::bail!("no more work"));
        let err = unit.step(None).await.unwrap_err();
        assert_eq!(err.to_string(), "no more work");
    }
}
