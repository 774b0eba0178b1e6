use std::time::Duration;

use proptest::prelude::*;
use tokio::time::Instant;
use translation_proxy::dispatch::{Admission, RequestWindow};
use translation_proxy::settings::DispatchSettings;

const WINDOW: Duration = Duration::from_secs(60);

fn window_settings(max_per_window: usize, safety_margin_ms: u64) -> DispatchSettings {
    DispatchSettings {
        max_per_window,
        window: WINDOW,
        safety_margin: Duration::from_millis(safety_margin_ms),
        dispatch_delay: Duration::ZERO,
        max_pending: 0,
    }
}

proptest! {
    #[test]
    fn test_admitted_starts_never_exceed_window_property(
        max_per_window in 1usize..8,
        safety_margin_ms in 0u64..2000,
        gaps in prop::collection::vec(0u64..30_000, 1..60)
    ) {
        let mut window = RequestWindow::new(&window_settings(max_per_window, safety_margin_ms));
        let mut now = Instant::now();
        let mut starts = Vec::new();

        for gap in gaps {
            now += Duration::from_millis(gap);
            // a saturated window always asks for a positive wait, then admits
            while let Admission::Wait(wait) = window.admit(now) {
                prop_assert!(wait > Duration::ZERO);
                prop_assert!(wait <= WINDOW + Duration::from_millis(safety_margin_ms));
                now += wait;
            }
            window.record(now);
            starts.push(now);
        }

        for (i, start) in starts.iter().enumerate() {
            let in_window = starts[i..]
                .iter()
                .filter(|at| **at - *start < WINDOW)
                .count();
            prop_assert!(in_window <= max_per_window);
        }
    }

    #[test]
    fn test_recent_count_never_exceeds_max_property(
        max_per_window in 1usize..8,
        gaps in prop::collection::vec(0u64..20_000, 1..40)
    ) {
        let mut window = RequestWindow::new(&window_settings(max_per_window, 0));
        let mut now = Instant::now();

        for gap in gaps {
            now += Duration::from_millis(gap);
            if window.admit(now) == Admission::Ready {
                window.record(now);
            }
            prop_assert!(window.recent_count(now) <= max_per_window);
            prop_assert!(window.len() <= max_per_window);
        }
    }
}
