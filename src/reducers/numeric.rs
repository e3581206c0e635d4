//! COUNT, SUM, MIN, MAX, AVG.

use super::Reducer;
use crate::error::AggResult;
use crate::value::RSValue;

#[derive(Debug, Default)]
pub struct CountReducer {
    count: u64,
}

impl Reducer for CountReducer {
    fn add(&mut self, _input: Option<&RSValue>) -> AggResult<()> {
        self.count += 1;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        Ok(RSValue::Number(self.count as f64))
    }
}

#[derive(Debug, Default)]
pub struct SumReducer {
    sum: f64,
}

impl Reducer for SumReducer {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        if let Some(n) = input.and_then(RSValue::to_number) {
            self.sum += n;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        Ok(RSValue::Number(self.sum))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinMaxKind {
    Min,
    Max,
}

#[derive(Debug)]
pub struct MinMaxReducer {
    kind: MinMaxKind,
    value: Option<f64>,
}

impl MinMaxReducer {
    pub fn new(kind: MinMaxKind) -> Self {
        MinMaxReducer { kind, value: None }
    }
}

impl Reducer for MinMaxReducer {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        let Some(n) = input.and_then(RSValue::to_number) else {
            return Ok(());
        };
        self.value = Some(match self.value {
            None => n,
            Some(current) => match self.kind {
                MinMaxKind::Min => current.min(n),
                MinMaxKind::Max => current.max(n),
            },
        });
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        Ok(RSValue::Number(self.value.unwrap_or(0.0)))
    }
}

/// AVG keeps count + sum rather than a running mean, so merging two
/// partial AVGs (coordinator + shard) stays exact instead of compounding
/// rounding error.
#[derive(Debug, Default)]
pub struct AvgReducer {
    count: u64,
    sum: f64,
}

impl Reducer for AvgReducer {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        if let Some(n) = input.and_then(RSValue::to_number) {
            self.count += 1;
            self.sum += n;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        if self.count == 0 {
            Ok(RSValue::Number(0.0))
        } else {
            Ok(RSValue::Number(self.sum / self.count as f64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_skips_non_numeric() {
        let mut r = SumReducer::default();
        r.add(Some(&RSValue::Number(1.0))).unwrap();
        r.add(Some(&RSValue::Null)).unwrap();
        r.add(Some(&RSValue::Number(2.0))).unwrap();
        assert_eq!(Box::new(r).finalize().unwrap(), RSValue::Number(3.0));
    }

    #[test]
    fn avg_over_three_values() {
        let mut r = AvgReducer::default();
        for v in [1.0, 2.0, 3.0] {
            r.add(Some(&RSValue::Number(v))).unwrap();
        }
        assert_eq!(Box::new(r).finalize().unwrap(), RSValue::Number(2.0));
    }

    #[test]
    fn min_max_track_extremes() {
        let mut min = MinMaxReducer::new(MinMaxKind::Min);
        let mut max = MinMaxReducer::new(MinMaxKind::Max);
        for v in [5.0, 1.0, 9.0, 3.0] {
            min.add(Some(&RSValue::Number(v))).unwrap();
            max.add(Some(&RSValue::Number(v))).unwrap();
        }
        assert_eq!(Box::new(min).finalize().unwrap(), RSValue::Number(1.0));
        assert_eq!(Box::new(max).finalize().unwrap(), RSValue::Number(9.0));
    }

    proptest::proptest! {
        #[test]
        fn min_max_stay_within_input_bounds(values in proptest::collection::vec(-1e6f64..1e6f64, 1..50)) {
            let mut min = MinMaxReducer::new(MinMaxKind::Min);
            let mut max = MinMaxReducer::new(MinMaxKind::Max);
            for &v in &values {
                min.add(Some(&RSValue::Number(v))).unwrap();
                max.add(Some(&RSValue::Number(v))).unwrap();
            }
            let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(Box::new(min).finalize().unwrap(), RSValue::Number(lo));
            prop_assert_eq!(Box::new(max).finalize().unwrap(), RSValue::Number(hi));
        }

        #[test]
        fn avg_times_count_matches_sum(values in proptest::collection::vec(-1e4f64..1e4f64, 1..50)) {
            let mut avg = AvgReducer::default();
            let mut sum = SumReducer::default();
            let mut count = CountReducer::default();
            for &v in &values {
                avg.add(Some(&RSValue::Number(v))).unwrap();
                sum.add(Some(&RSValue::Number(v))).unwrap();
                count.add(Some(&RSValue::Number(v))).unwrap();
            }
            let RSValue::Number(avg) = Box::new(avg).finalize().unwrap() else { unreachable!() };
            let RSValue::Number(sum) = Box::new(sum).finalize().unwrap() else { unreachable!() };
            let RSValue::Number(count) = Box::new(count).finalize().unwrap() else { unreachable!() };
            prop_assert!((avg * count - sum).abs() < 1e-6 * (sum.abs() + 1.0));
        }

        #[test]
        fn count_ignores_null_inputs(nulls in proptest::collection::vec(proptest::bool::ANY, 1..50)) {
            let mut count = CountReducer::default();
            let mut sum = SumReducer::default();
            for &is_null in &nulls {
                let value = if is_null { RSValue::Null } else { RSValue::Number(1.0) };
                count.add(Some(&value)).unwrap();
                sum.add(Some(&value)).unwrap();
            }
            let RSValue::Number(count) = Box::new(count).finalize().unwrap() else { unreachable!() };
            let RSValue::Number(sum) = Box::new(sum).finalize().unwrap() else { unreachable!() };
            prop_assert_eq!(count as usize, nulls.len());
            prop_assert_eq!(sum as usize, nulls.iter().filter(|&&n| !n).count());
        }
    }
}
