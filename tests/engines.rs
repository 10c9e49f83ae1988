mod common;

use common::{day, snap};
use covid_stats::dates::{MIN_DAY, expand};
use covid_stats::models::StoredRecord;
use covid_stats::ranking::{Metric, rank_by_ratio, top_n};
use covid_stats::stats::{grouped_summary, summarize, summarize_present};
use covid_stats::trend::{fit, index_series};
use covid_stats::{Error, Observation};

#[test]
fn expand_length_and_bounds_hold_across_ranges() {
    let cases = [
        ("2020-01-22", "2020-01-22"),
        ("2020-01-22", "2020-02-01"),
        ("2020-02-25", "2020-03-05"),
        ("2020-12-30", "2021-01-02"),
        ("2021-01-01", "2021-12-31"),
    ];
    for (s, e) in cases {
        let (start, end) = (day(s), day(e));
        let days = expand(start, end, MIN_DAY);
        assert_eq!(days.len() as i64, (end - start).num_days() + 1, "{s}..{e}");
        assert_eq!(days.first(), Some(&start));
        assert_eq!(days.last(), Some(&end));
        assert!(days.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn expand_clamps_to_minimum() {
    let days = expand(day("2020-01-10"), day("2020-02-01"), day("2020-01-22"));
    assert_eq!(days[0].to_string(), "2020-01-22");
    assert_eq!(days.len(), 11);
}

#[test]
fn summarize_and_fit_are_idempotent() {
    let values = [3.5, 1.25, 9.0, 4.75, 100.0, 0.5];
    let a = summarize(&values);
    let b = summarize(&values);
    assert_eq!(a.std_dev.unwrap().to_bits(), b.std_dev.unwrap().to_bits());
    assert_eq!(a.average.unwrap().to_bits(), b.average.unwrap().to_bits());

    let pts: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| ((i + 1) as f64, *v))
        .collect();
    let m1 = fit(&pts).unwrap();
    let m2 = fit(&pts).unwrap();
    assert_eq!(m1.slope.to_bits(), m2.slope.to_bits());
    assert_eq!(m1.intercept.to_bits(), m2.intercept.to_bits());
}

#[test]
fn worked_examples() {
    let s = summarize(&[10.0, 20.0, 30.0]);
    assert_eq!(s.average, Some(20.0));
    assert_eq!(s.max, Some(30.0));
    assert_eq!(s.min, Some(10.0));
    assert!((s.std_dev.unwrap() - 8.1650).abs() < 1e-4);

    let m = fit(&[(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]).unwrap();
    assert!((m.project(4.0) - 40.0).abs() < 1e-9);

    let ranked = rank_by_ratio(&[snap("AA", None, 100, 10), snap("BB", None, 50, 10)], 20);
    assert_eq!(ranked[0].snapshot.region.as_str(), "BB");
}

#[test]
fn absent_values_keep_their_index_but_skip_the_fit() {
    let obs = |d: &str, c: Option<u64>| Observation {
        day: day(d),
        confirmed: c,
        deaths: Some(0),
    };
    let series = vec![
        obs("2020-03-01", Some(10)),
        obs("2020-03-02", None),
        obs("2020-03-03", Some(30)),
    ];
    let indexed = index_series(&series);
    let m = indexed.confirmed_trend.unwrap();
    assert!((m.slope - 10.0).abs() < 1e-9);
    assert_eq!(indexed.points[1].index, 2);
    assert_eq!(indexed.points[1].confirmed, None);
    assert!((indexed.points[1].confirmed_trend.unwrap() - 20.0).abs() < 1e-9);
    // deaths are all zero: a flat line, not a failure
    assert_eq!(indexed.deaths_trend.unwrap().slope, 0.0);

    let s = summarize_present(series.iter().map(|o| o.confirmed.map(|c| c as f64)));
    assert_eq!(s.count, 2);
    assert_eq!(s.missing, 1);
}

#[test]
fn fit_with_one_point_is_insufficient() {
    assert!(matches!(
        fit(&[(1.0, 3.0)]),
        Err(Error::InsufficientData { .. })
    ));
}

#[test]
fn top_n_leaves_input_untouched_and_handles_short_input() {
    let input = vec![snap("AA", None, 1, 9), snap("BB", None, 2, 3)];
    let copy = input.clone();
    let top = top_n(&input, Metric::Deaths, 10);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].region.as_str(), "AA");
    assert_eq!(input, copy);
    assert!(top_n(&input, Metric::Confirmed, 0).is_empty());
}

#[test]
fn grouped_summary_per_region() {
    let rec = |iso: &str, d: &str, c: Option<u64>| StoredRecord {
        id: None,
        iso: iso.parse().unwrap(),
        date: day(d),
        confirmed: c,
        deaths: Some(1),
    };
    let rows = vec![
        rec("USA", "2020-03-01", Some(10)),
        rec("DEU", "2020-03-01", Some(4)),
        rec("USA", "2020-03-02", Some(30)),
        rec("USA", "2020-03-03", None),
    ];
    let got = grouped_summary(&rows);
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].region.as_str(), "DEU");
    assert_eq!(got[1].region.as_str(), "USA");
    assert_eq!(got[1].days, 3);
    assert_eq!(got[1].confirmed.count, 2);
    assert_eq!(got[1].confirmed.missing, 1);
    assert_eq!(got[1].confirmed.average, Some(20.0));
    assert_eq!(got[1].deaths.std_dev, Some(0.0));
}
