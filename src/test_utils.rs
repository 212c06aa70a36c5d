//! Helpers shared by unit tests.

use std::sync::Once;

static CAPTURE: Once = Once::new();

/// Route `log` records into `logtest`'s queue and drop anything already
/// captured.
///
/// `logtest::Logger::start` may only install itself once per process, so
/// every test goes through here. Callers must be `#[serial(logtest)]` and
/// filter on something unique to the test.
pub(crate) fn capture_logs() -> logtest::Logger {
    CAPTURE.call_once(|| {
        logtest::Logger::start();
    });
    let mut logger = logtest::Logger;
    while logger.pop().is_some() {}
    logger
}
