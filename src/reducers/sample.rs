//! STDDEV, RANDOM_SAMPLE, FIRST_VALUE.

use super::Reducer;
use crate::error::AggResult;
use crate::value::RSValue;
use rand::Rng;

/// Welford's online algorithm; yields `sqrt(M2/(n-1))` for n>=2, else 0.
#[derive(Debug, Default)]
pub struct StdDevReducer {
    n: u64,
    mean: f64,
    m2: f64,
}

impl Reducer for StdDevReducer {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        let Some(x) = input.and_then(RSValue::to_number) else {
            return Ok(());
        };
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        if self.n < 2 {
            Ok(RSValue::Number(0.0))
        } else {
            Ok(RSValue::Number((self.m2 / (self.n - 1) as f64).sqrt()))
        }
    }
}

/// Reservoir sample of size `capacity` (Algorithm R), shared by
/// RANDOM_SAMPLE and as the feeder for STDDEV/QUANTILE distribution.
#[derive(Debug)]
pub struct RandomSampleReducer {
    capacity: usize,
    seen: u64,
    reservoir: Vec<RSValue>,
}

impl RandomSampleReducer {
    pub fn new(capacity: usize) -> Self {
        RandomSampleReducer {
            capacity,
            seen: 0,
            reservoir: Vec::with_capacity(capacity),
        }
    }

    pub fn into_samples(self) -> Vec<RSValue> {
        self.reservoir
    }
}

impl Reducer for RandomSampleReducer {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        let Some(value) = input else { return Ok(()) };
        self.seen += 1;
        if self.reservoir.len() < self.capacity {
            self.reservoir.push(value.clone());
        } else {
            let j = rand::thread_rng().gen_range(0..self.seen);
            if (j as usize) < self.capacity {
                self.reservoir[j as usize] = value.clone();
            }
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        Ok(RSValue::array(self.reservoir))
    }
}

/// First value observed; optional BY/ORDER arguments are resolved by the
/// GROUPER before construction (it feeds rows in the already-sorted order).
#[derive(Debug, Default)]
pub struct FirstValueReducer {
    value: Option<RSValue>,
}

impl Reducer for FirstValueReducer {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        if self.value.is_none() {
            self.value = input.cloned();
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        Ok(self.value.unwrap_or(RSValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stddev_of_constant_series_is_zero() {
        let mut r = StdDevReducer::default();
        for _ in 0..5 {
            r.add(Some(&RSValue::Number(4.0))).unwrap();
        }
        assert_eq!(Box::new(r).finalize().unwrap(), RSValue::Number(0.0));
    }

    #[test]
    fn stddev_single_sample_is_zero() {
        let mut r = StdDevReducer::default();
        r.add(Some(&RSValue::Number(4.0))).unwrap();
        assert_eq!(Box::new(r).finalize().unwrap(), RSValue::Number(0.0));
    }

    #[test]
    fn random_sample_never_exceeds_capacity() {
        let mut r = RandomSampleReducer::new(3);
        for i in 0..50 {
            r.add(Some(&RSValue::Number(i as f64))).unwrap();
        }
        assert_eq!(r.into_samples().len(), 3);
    }

    #[test]
    fn first_value_keeps_earliest() {
        let mut r = FirstValueReducer::default();
        r.add(Some(&RSValue::Number(1.0))).unwrap();
        r.add(Some(&RSValue::Number(2.0))).unwrap();
        assert_eq!(Box::new(r).finalize().unwrap(), RSValue::Number(1.0));
    }
}
