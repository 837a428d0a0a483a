//! Scatter/gather that waits for every task and keeps each outcome.

use std::future::Future;

use futures_util::future::join_all;

/// Outcome of one gathered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settled<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::Rejected(err) => Err(err),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Fulfilled(value),
            Err(err) => Self::Rejected(err),
        }
    }
}

/// Drives all futures to completion and returns their outcomes in input
/// order. A rejection never short-circuits the others.
pub async fn settle_all<I, F, T, E>(futures: I) -> Vec<Settled<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    join_all(futures)
        .await
        .into_iter()
        .map(Settled::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn keeps_order_and_failures() {
        let outcomes = settle_all((0..5).map(|i| async move {
            if i % 2 == 0 { Ok(i) } else { Err(format!("odd {i}")) }
        }))
        .await;

        assert_eq!(
            outcomes,
            vec![
                Settled::Fulfilled(0),
                Settled::Rejected("odd 1".to_string()),
                Settled::Fulfilled(2),
                Settled::Rejected("odd 3".to_string()),
                Settled::Fulfilled(4),
            ]
        );
    }

    #[tokio::test]
    async fn early_rejection_does_not_cancel_others() {
        let finished = Arc::new(AtomicUsize::new(0));
        let tasks = (0..4).map(|i| {
            let finished = finished.clone();
            async move {
                if i == 0 {
                    return Err("first fails");
                }
                tokio::task::yield_now().await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        });

        let outcomes = settle_all(tasks).await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(outcomes.iter().filter(|o| o.is_fulfilled()).count(), 3);
        assert_eq!(outcomes[0].clone().into_result(), Err("first fails"));
    }

    #[tokio::test]
    async fn empty_input() {
        let outcomes: Vec<Settled<u8, ()>> =
            settle_all(Vec::<std::future::Ready<Result<u8, ()>>>::new()).await;
        assert!(outcomes.is_empty());
    }
}
