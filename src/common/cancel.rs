use std::time::Duration;

use tokio_util::sync::CancellationToken;

const WAIT_STEP: Duration = Duration::from_millis(50);

/// Sleeps on a blocking thread while watching a cancellation token.
///
/// Producer threads use this for their fill delays and retry backoffs so a
/// stop request interrupts the wait instead of running it out. Returns
/// `false` if the token fired before the full duration elapsed.
pub fn wait_cancellable(cancel: &CancellationToken, total: Duration) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return false;
        }
        let step = remaining.min(WAIT_STEP);
        std::thread::sleep(step);
        remaining -= step;
    }
    !cancel.is_cancelled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn completes_when_not_cancelled() {
        let token = CancellationToken::new();
        assert!(wait_cancellable(&token, Duration::from_millis(20)));
    }

    #[test]
    fn returns_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(!wait_cancellable(&token, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn interrupted_mid_wait() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(80));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(!wait_cancellable(&token, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }
}
