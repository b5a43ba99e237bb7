use std::{
    thread,
    time::{Duration, Instant},
};

use log::trace;

use harness_api::error::HarnessError;

/// Call `condition` every `interval` until it returns a value or `timeout` has
/// elapsed. It runs at least once. Its errors abort the wait.
///
/// Returns `Ok(None)` on timeout.
pub fn wait_until<T, F>(
    timeout: Duration,
    interval: Duration,
    mut condition: F,
) -> Result<Option<T>, HarnessError>
where
    F: FnMut() -> Result<Option<T>, HarnessError>,
{
    let start_time = Instant::now();
    let mut attempt = 0;
    loop {
        attempt += 1;
        if let Some(value) = condition()? {
            trace!("Condition met after {attempt} attempt(s)");
            return Ok(Some(value));
        }

        let elapsed = start_time.elapsed();
        if elapsed >= timeout {
            trace!("Condition not met after {attempt} attempt(s) in {elapsed:?}");
            return Ok(None);
        }

        thread::sleep(interval.min(timeout - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use harness_api::error::InternalError;

    use super::*;

    #[test]
    fn test_met() {
        let mut calls = 0;
        let value = wait_until(Duration::from_secs(5), Duration::ZERO, || {
            calls += 1;
            Ok((calls == 3).then_some(calls))
        })
        .unwrap();
        assert_eq!(value, Some(3));
    }

    #[test]
    fn test_timeout() {
        let mut calls = 0;
        let value = wait_until(Duration::ZERO, Duration::from_secs(60), || {
            calls += 1;
            Ok(None::<()>)
        })
        .unwrap();
        assert_eq!(value, None);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_error() {
        wait_until::<(), _>(Duration::from_secs(5), Duration::ZERO, || {
            Err(HarnessError::new(InternalError::Internal("journal unreadable")))
        })
        .unwrap_err();
    }
}
