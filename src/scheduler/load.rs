use rand::Rng;
use serde::Deserialize;

use crate::error::{Result, SchedulerError};
use crate::scheduler::task::TaskSpec;

/// Largest batch a single bulk load may generate.
pub const MAX_LOAD_COUNT: usize = 10_000;

/// Parameters for the bulk load generator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadRequest {
    pub count: usize,
    #[serde(alias = "minWork")]
    pub min_ms: u64,
    #[serde(alias = "maxWork")]
    pub max_ms: u64,
}

impl Default for LoadRequest {
    fn default() -> Self {
        Self {
            count: 100,
            min_ms: 100,
            max_ms: 2000,
        }
    }
}

impl LoadRequest {
    pub fn new(count: usize, min_ms: u64, max_ms: u64) -> Self {
        Self {
            count,
            min_ms,
            max_ms,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.count > MAX_LOAD_COUNT {
            return Err(SchedulerError::InvalidRequest(format!(
                "count ({}) exceeds the bulk load limit of {}",
                self.count, MAX_LOAD_COUNT
            )));
        }
        if self.min_ms == 0 {
            return Err(SchedulerError::InvalidRequest(
                "minMs must be positive".to_string(),
            ));
        }
        if self.min_ms > self.max_ms {
            return Err(SchedulerError::InvalidRequest(format!(
                "minMs ({}) exceeds maxMs ({})",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }

    /// Draw `count` task specs: work uniform in `[min_ms, max_ms]`, priority
    /// in `1..=10`, and a skewed mix of request types.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Vec<TaskSpec> {
        (0..self.count)
            .map(|_| {
                let work_ms = rng.gen_range(self.min_ms..=self.max_ms);
                let priority = rng.gen_range(1..=10);
                let task_type = if rng.gen_bool(0.2) {
                    "submit"
                } else if rng.gen_bool(0.4) {
                    "fetch"
                } else {
                    "login"
                };
                TaskSpec::new(task_type, priority, work_ms)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn defaults() {
        let req = LoadRequest::default();
        assert_eq!(req, LoadRequest::new(100, 100, 2000));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn deserializes_aliases() {
        let req: LoadRequest =
            serde_json::from_str(r#"{"count":5,"minWork":10,"maxWork":20}"#).unwrap();
        assert_eq!(req, LoadRequest::new(5, 10, 20));
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(LoadRequest::new(1, 500, 100).validate().is_err());
        assert!(LoadRequest::new(1, 0, 100).validate().is_err());
        assert!(LoadRequest::new(1, 100, 100).validate().is_ok());
    }

    #[test]
    fn rejects_oversized_count() {
        assert!(LoadRequest::new(MAX_LOAD_COUNT, 1, 2).validate().is_ok());
        assert!(matches!(
            LoadRequest::new(MAX_LOAD_COUNT + 1, 1, 2).validate(),
            Err(SchedulerError::InvalidRequest(_))
        ));
        assert!(matches!(
            LoadRequest::new(usize::MAX, 1, 2).validate(),
            Err(SchedulerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn generated_specs_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let specs = LoadRequest::new(500, 100, 2000).generate(&mut rng);
        assert_eq!(specs.len(), 500);
        for spec in &specs {
            assert!((100..=2000).contains(&spec.work_ms));
            assert!((1..=10).contains(&spec.priority));
            assert!(["submit", "fetch", "login"].contains(&spec.task_type.as_str()));
        }
        // With 500 draws every type shows up.
        for kind in ["submit", "fetch", "login"] {
            assert!(specs.iter().any(|s| s.task_type == kind));
        }
    }

    #[test]
    fn zero_count_generates_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(LoadRequest::new(0, 1, 2).generate(&mut rng).is_empty());
    }
}
