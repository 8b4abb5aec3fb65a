use std::time::Duration;

/// Secuencia infinita de esperas que crece por un factor hasta un máximo.
///
/// Se usa para espaciar los `try_wait` sobre un proceso hijo cuando hay un
/// límite de tiempo; sin límite se usa directamente `wait()`.
pub struct ExponentialBackoff {
    curr: Duration,
    max: Duration,
    factor: u32,
}

impl ExponentialBackoff {
    pub fn new(start: Duration, max: Duration, factor: u32) -> ExponentialBackoff {
        ExponentialBackoff { curr: start,
                             max,
                             factor }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_secs(2), 2)
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.curr;
        self.curr = (self.curr * self.factor).min(self.max);
        Some(out)
    }
}
