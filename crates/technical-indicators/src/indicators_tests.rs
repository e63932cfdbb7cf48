#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use analysis_core::{DailyClose, MaPoint};
    use chrono::{Duration, NaiveDate};

    // Helper to build consecutive calendar dates
    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(offset)
    }

    // Helper to build a close series on consecutive days
    fn closes(values: &[f64]) -> Vec<DailyClose> {
        values
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyClose {
                date: day(i as i64),
                close,
            })
            .collect()
    }

    #[test]
    fn percent_from_ma_basic() {
        let result = percent_from_ma(105.0, Some(100.0)).unwrap();
        assert!((result - 5.0).abs() < 0.001);

        let result = percent_from_ma(95.0, Some(100.0)).unwrap();
        assert!((result + 5.0).abs() < 0.001);
    }

    #[test]
    fn percent_from_ma_rounds_to_two_decimals() {
        let result = percent_from_ma(100.0, Some(3.0)).unwrap();
        assert!((result - 3233.33).abs() < 0.001);
    }

    #[test]
    fn percent_from_ma_missing_or_degenerate_average() {
        assert_eq!(percent_from_ma(100.0, None), None);
        assert_eq!(percent_from_ma(100.0, Some(f64::NAN)), None);
        assert_eq!(percent_from_ma(100.0, Some(0.0)), None);
    }

    #[test]
    fn volume_comparison_basic() {
        let result = volume_comparison(150.0, Some(100.0)).unwrap();
        assert!((result - 50.0).abs() < 0.001);
    }

    #[test]
    fn volume_comparison_needs_both_sides() {
        assert_eq!(volume_comparison(150.0, None), None);
        assert_eq!(volume_comparison(150.0, Some(0.0)), None);
        assert_eq!(volume_comparison(0.0, Some(100.0)), None);
    }

    #[test]
    fn price_sentiment_thresholds() {
        assert_eq!(price_sentiment_label(3.0), "Bullish");
        assert_eq!(price_sentiment_label(0.5), "Somewhat Bullish");
        assert_eq!(price_sentiment_label(-1.0), "Neutral");
        assert_eq!(price_sentiment_label(-4.0), "Somewhat Bearish");
        assert_eq!(price_sentiment_label(-6.0), "Bearish");
    }

    #[test]
    fn price_sentiment_boundaries_fall_to_lower_bucket() {
        assert_eq!(price_sentiment_label(2.0), "Somewhat Bullish");
        assert_eq!(price_sentiment_label(0.0), "Neutral");
        assert_eq!(price_sentiment_label(-2.0), "Somewhat Bearish");
        assert_eq!(price_sentiment_label(-5.0), "Bearish");
    }

    #[test]
    fn sma_series_aligns_with_warmup() {
        let series = sma_series(&closes(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3);
        assert_eq!(series.len(), 5);
        assert_eq!(series[0].value, None);
        assert_eq!(series[1].value, None);
        assert!((series[2].value.unwrap() - 2.0).abs() < 0.001);
        assert!((series[3].value.unwrap() - 3.0).abs() < 0.001);
        assert!((series[4].value.unwrap() - 4.0).abs() < 0.001);
        assert_eq!(series[4].date, day(4));
    }

    #[test]
    fn sma_series_shorter_than_period_stays_undefined() {
        let series = sma_series(&closes(&[1.0, 2.0]), 3);
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|p| p.value.is_none()));
    }

    #[test]
    fn sma_series_zero_period() {
        let series = sma_series(&closes(&[1.0, 2.0, 3.0]), 0);
        assert!(series.iter().all(|p| p.value.is_none()));
    }

    #[test]
    fn detects_upward_crossover() {
        let prices = closes(&[9.0, 11.0]);
        let ma = vec![
            MaPoint {
                date: day(0),
                value: Some(10.0),
            },
            MaPoint {
                date: day(1),
                value: Some(10.0),
            },
        ];
        let scan = detect_crossovers(&prices, &ma, day(1), 30);
        assert!(scan.up);
        assert_eq!(scan.up_date, Some(day(1)));
        assert!(!scan.down);
    }

    #[test]
    fn detects_downward_crossover() {
        let prices = closes(&[11.0, 9.0]);
        let ma = vec![
            MaPoint {
                date: day(0),
                value: Some(10.0),
            },
            MaPoint {
                date: day(1),
                value: Some(10.0),
            },
        ];
        let scan = detect_crossovers(&prices, &ma, day(1), 30);
        assert!(scan.down);
        assert_eq!(scan.down_date, Some(day(1)));
        assert!(!scan.up);
    }

    #[test]
    fn single_point_yields_no_crossover() {
        let prices = closes(&[11.0]);
        let ma = vec![MaPoint {
            date: day(0),
            value: Some(10.0),
        }];
        let scan = detect_crossovers(&prices, &ma, day(0), 30);
        assert_eq!(scan, CrossoverScan::default());
    }

    #[test]
    fn undefined_ma_points_are_skipped_in_the_join() {
        // Warmup Nones leave only one joined point, so no pair to compare.
        let prices = closes(&[9.0, 11.0]);
        let ma = vec![
            MaPoint {
                date: day(0),
                value: None,
            },
            MaPoint {
                date: day(1),
                value: Some(10.0),
            },
        ];
        let scan = detect_crossovers(&prices, &ma, day(1), 30);
        assert_eq!(scan, CrossoverScan::default());
    }

    #[test]
    fn most_recent_crossover_wins() {
        // Crosses up at day 1, back down at day 2, up again at day 3.
        let prices = closes(&[9.0, 11.0, 9.0, 11.0]);
        let ma: Vec<MaPoint> = (0..4)
            .map(|i| MaPoint {
                date: day(i),
                value: Some(10.0),
            })
            .collect();
        let scan = detect_crossovers(&prices, &ma, day(3), 30);
        assert!(scan.up);
        assert_eq!(scan.up_date, Some(day(3)));
        assert!(scan.down);
        assert_eq!(scan.down_date, Some(day(2)));
    }

    #[test]
    fn crossovers_outside_the_lookback_window_are_ignored() {
        let prices = closes(&[9.0, 11.0, 11.5, 11.6, 11.7]);
        let ma: Vec<MaPoint> = (0..5)
            .map(|i| MaPoint {
                date: day(i),
                value: Some(10.0),
            })
            .collect();
        // Cross happened at day 1; window only reaches back to day 2.
        let scan = detect_crossovers(&prices, &ma, day(4), 2);
        assert!(!scan.up);
        assert!(!scan.down);
    }

    #[test]
    fn lookback_window_boundary_is_inclusive() {
        let prices = closes(&[9.0, 11.0, 11.5]);
        let ma: Vec<MaPoint> = (0..3)
            .map(|i| MaPoint {
                date: day(i),
                value: Some(10.0),
            })
            .collect();
        // today - lookback lands exactly on day 0, keeping the day 0/1 pair.
        let scan = detect_crossovers(&prices, &ma, day(2), 2);
        assert!(scan.up);
        assert_eq!(scan.up_date, Some(day(1)));
    }

    #[test]
    fn lookback_longer_than_history_is_harmless() {
        let prices = closes(&[9.0, 11.0]);
        let ma = vec![
            MaPoint {
                date: day(0),
                value: Some(10.0),
            },
            MaPoint {
                date: day(1),
                value: Some(10.0),
            },
        ];
        let scan = detect_crossovers(&prices, &ma, day(1), 365);
        assert!(scan.up);
    }

    #[test]
    fn same_day_crossover_directions() {
        assert_eq!(same_day_crossover(95.0, 105.0, Some(100.0)), (true, false));
        assert_eq!(same_day_crossover(105.0, 95.0, Some(100.0)), (false, true));
        assert_eq!(same_day_crossover(101.0, 105.0, Some(100.0)), (false, false));
        assert_eq!(same_day_crossover(95.0, 105.0, None), (false, false));
    }
}
