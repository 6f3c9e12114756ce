use proptest::prelude::*;
use strategy::indicators::{psar_series, PsarParams, PsarState};

fn bars_from(raw: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    raw.into_iter()
        .map(|(mid, half_range)| (mid + half_range, mid - half_range))
        .collect()
}

proptest! {
    /// The acceleration factor stays within [init_af, max_af] and snaps back
    /// to init_af on every reversal, whatever the price path.
    #[test]
    fn acceleration_factor_bounded_and_reset_on_reversal(
        raw in prop::collection::vec((100.0f64..10_000.0, 0.01f64..50.0), 3..300),
    ) {
        let params = PsarParams::default();
        let mut state = PsarState::new(params);
        let mut prev_trend = None;

        for (high, low) in bars_from(raw) {
            state.next(high, low);
            let af = state.acceleration_factor();
            prop_assert!(af >= params.init_af - 1e-12, "af {} below init", af);
            prop_assert!(af <= params.max_af + 1e-12, "af {} above max", af);

            let trend = state.trend();
            if prev_trend.is_some() && trend != prev_trend {
                prop_assert_eq!(af, params.init_af);
            }
            prev_trend = trend;
        }
    }

    /// Indicator evaluation on arbitrary finite bars must never panic and
    /// always yields one value per bar.
    #[test]
    fn series_has_one_value_per_bar(
        raw in prop::collection::vec((0.5f64..1_000_000.0, 0.0f64..0.25), 0..250),
    ) {
        let bars = bars_from(raw);
        let series = psar_series(PsarParams::default(), bars.iter().copied());
        prop_assert_eq!(series.len(), bars.len());
        prop_assert!(series.iter().skip(2).all(Option::is_some));
    }
}
