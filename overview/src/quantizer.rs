/// Resamples a piecewise-constant category signal into buckets of
/// `quant_duration` each.
///
/// Every call to [`append_interval`](Quantizer::append_interval) says "from
/// the previous time up to `time`, `category` was active". Whenever a bucket
/// fills up it is handed to the callback as a dense slice indexed by
/// category, holding the time each category was active within the bucket.
/// Time that does not fill a bucket is carried into the next one, so the
/// emitted buckets plus the one still being filled always add up to the
/// elapsed time.
pub struct Quantizer<F>
where
    F: FnMut(&[f64]),
{
    last_time: f64,
    quant_duration: f64,
    callback: F,
    counters: Vec<f64>,
    remainder: f64,
}

impl<F> Quantizer<F>
where
    F: FnMut(&[f64]),
{
    /// # Panics
    ///
    /// If `quant_duration` is not a positive number: buckets of no width
    /// would never fill up.
    pub fn new(start_time: f64, quant_duration: f64, callback: F) -> Quantizer<F> {
        assert!(
            quant_duration > 0.0,
            "bucket duration must be positive, got {}",
            quant_duration
        );
        Quantizer {
            last_time: start_time,
            quant_duration,
            callback,
            counters: Vec::new(),
            remainder: quant_duration,
        }
    }

    pub fn append_interval(&mut self, time: f64, category: usize) {
        let mut interval = time - self.last_time;
        if interval <= self.remainder {
            add(&mut self.counters, category, interval);
            self.remainder -= interval;
            self.last_time = time;
            return;
        }

        add(&mut self.counters, category, self.remainder);
        (self.callback)(&self.counters);
        interval -= self.remainder;

        if interval >= self.quant_duration {
            let mut whole = vec![0.0; category + 1];
            whole[category] = self.quant_duration;
            while interval >= self.quant_duration {
                (self.callback)(&whole);
                interval -= self.quant_duration;
            }
        }

        self.counters.clear();
        add(&mut self.counters, category, interval);
        self.last_time = time;
        self.remainder = self.quant_duration - interval;
    }

    /// The bucket that is being filled.
    pub fn pending(&self) -> &[f64] {
        &self.counters
    }

    pub fn quant_duration(&self) -> f64 {
        self.quant_duration
    }
}

fn add(counters: &mut Vec<f64>, category: usize, value: f64) {
    if counters.len() <= category {
        counters.resize(category + 1, 0.0);
    }
    counters[category] += value;
}
