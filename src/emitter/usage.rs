//! Process CPU usage sampling for the throughput report.

use std::time::Duration;

/// Cumulative CPU time consumed by this process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub user: Duration,
    pub system: Duration,
}

impl ResourceUsage {
    /// Sample the current process. `None` where the platform offers no cheap
    /// source.
    pub fn sample() -> Option<Self> {
        #[cfg(unix)]
        {
            rusage::sample()
        }
        #[cfg(not(unix))]
        {
            None
        }
    }
}

impl std::fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cpu user/system: {}.{:06} / {}.{:06}",
            self.user.as_secs(),
            self.user.subsec_micros(),
            self.system.as_secs(),
            self.system.subsec_micros()
        )
    }
}

#[cfg(unix)]
mod rusage {
    use std::time::Duration;

    use log::debug;
    use nix::sys::{
        resource::{UsageWho, getrusage},
        time::TimeVal,
    };

    use super::ResourceUsage;

    pub(super) fn sample() -> Option<ResourceUsage> {
        let usage = getrusage(UsageWho::RUSAGE_SELF)
            .map_err(|err| debug!("getrusage failed: {err}"))
            .ok()?;
        Some(ResourceUsage {
            user: to_duration(usage.user_time()),
            system: to_duration(usage.system_time()),
        })
    }

    /// Negative components clamp to zero.
    pub(super) fn to_duration(tv: TimeVal) -> Duration {
        let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
        let micros = u64::try_from(tv.tv_usec()).unwrap_or(0);
        Duration::from_secs(secs) + Duration::from_micros(micros)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use rstest::rstest;

        #[rstest]
        #[case(TimeVal::new(2, 500_000), Duration::from_millis(2500))]
        #[case(TimeVal::new(0, 37), Duration::from_micros(37))]
        #[case(TimeVal::new(0, 0), Duration::ZERO)]
        fn converts_timeval_with_microsecond_precision(
            #[case] tv: TimeVal,
            #[case] expected: Duration,
        ) {
            assert_eq!(to_duration(tv), expected);
        }

        #[rstest]
        fn sampled_time_grows_with_work() {
            let before = sample().expect("getrusage on this process");
            let deadline = std::time::Instant::now() + Duration::from_millis(50);
            let mut spin = 0u64;
            while std::time::Instant::now() < deadline {
                spin = std::hint::black_box(spin.wrapping_add(1));
            }
            let after = sample().expect("getrusage on this process");
            assert!(after.user + after.system > before.user + before.system);
        }
    }
}
