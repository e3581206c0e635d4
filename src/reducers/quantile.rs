//! QUANTILE(x, q): reservoir-sampled quantile estimate.

use super::sample::RandomSampleReducer;
use super::Reducer;
use crate::error::AggResult;
use crate::value::RSValue;

#[derive(Debug)]
pub struct QuantileReducer {
    q: f64,
    sample: RandomSampleReducer,
}

impl QuantileReducer {
    pub fn new(q: f64, capacity: usize) -> Self {
        QuantileReducer {
            q,
            sample: RandomSampleReducer::new(capacity),
        }
    }
}

impl Reducer for QuantileReducer {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        self.sample.add(input)
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        let mut values: Vec<f64> = self
            .sample
            .into_samples()
            .iter()
            .filter_map(RSValue::to_number)
            .collect();
        if values.is_empty() {
            return Ok(RSValue::Null);
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = values.len();
        let pos = self.q * (n - 1) as f64;
        let lower = pos.floor() as usize;
        let upper = pos.ceil() as usize;
        if lower == upper {
            Ok(RSValue::Number(values[lower]))
        } else {
            let frac = pos - lower as f64;
            Ok(RSValue::Number(
                values[lower] + (values[upper] - values[lower]) * frac,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_series() {
        let mut r = QuantileReducer::new(0.5, 100);
        for v in [1.0, 3.0, 2.0, 5.0, 4.0] {
            r.add(Some(&RSValue::Number(v))).unwrap();
        }
        assert_eq!(Box::new(r).finalize().unwrap(), RSValue::Number(3.0));
    }

    #[test]
    fn empty_sample_yields_null() {
        let r = QuantileReducer::new(0.5, 100);
        assert_eq!(Box::new(r).finalize().unwrap(), RSValue::Null);
    }
}
