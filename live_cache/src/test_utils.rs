use std::time::Duration;

/// Assert that the given expression eventually converges to the expected value.
///
/// Background tasks may need a few polls to observe a change, so retry with a timeout instead of
/// asserting right away.
pub(crate) async fn assert_converge_eq<F, T>(f: F, expected: T)
where
    F: Fn() -> T + Send,
    T: Eq + std::fmt::Debug + Send,
{
    let start = tokio::time::Instant::now();

    loop {
        let actual = f();
        if actual == expected {
            return;
        }
        if start.elapsed() > Duration::from_secs(1) {
            assert_eq!(actual, expected);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
