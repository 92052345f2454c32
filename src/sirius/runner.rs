use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::info;

use crate::sirius::client::{EngineError, SiriusApi};
use crate::sirius::job::JobConfig;
use crate::sirius::models::{Job, JobState};

/// Submits a job and polls it until it finishes.
pub struct JobRunner {
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(poll_interval: Duration, timeout: Option<Duration>) -> Self {
        JobRunner {
            poll_interval,
            timeout,
        }
    }

    pub fn run<A: SiriusApi + ?Sized>(
        &self,
        api: &A,
        project_id: &str,
        config: &JobConfig,
    ) -> Result<Job, EngineError> {
        let started = Instant::now();
        let mut job = api.start_job(project_id, config.submission())?;
        info!(job = %job.id, "Submitted SIRIUS job");

        loop {
            let state = job.state();
            match state {
                JobState::Done => {
                    info!(job = %job.id, seconds = started.elapsed().as_secs(), "SIRIUS job finished");
                    return Ok(job);
                }
                state if state.is_failure() => {
                    let message = job.progress.as_ref().and_then(|p| p.error_message.clone());
                    return Err(EngineError::JobFailed {
                        job_id: job.id,
                        state,
                        message,
                    });
                }
                _ => {}
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    return Err(EngineError::JobTimeout {
                        job_id: job.id,
                        seconds: timeout.as_secs(),
                    });
                }
            }

            if let Some(progress) = &job.progress {
                info!(
                    job = %job.id,
                    state = %progress.state,
                    current = progress.current_progress.unwrap_or(0),
                    max = progress.max_progress.unwrap_or(0),
                    "Waiting for SIRIUS job"
                );
            }
            sleep(self.poll_interval);
            job = api.job(project_id, &job.id)?;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::path::Path;

    use serde_json::{json, Value};

    use crate::sirius::client::{EngineError, SiriusApi};
    use crate::sirius::models::*;

    /// A job endpoint that walks through `states`, repeating the last one.
    pub struct ScriptedJobs {
        pub states: Vec<&'static str>,
        pub polls: Cell<usize>,
        pub submissions: RefCell<Vec<Value>>,
    }

    impl ScriptedJobs {
        pub fn new(states: Vec<&'static str>) -> Self {
            ScriptedJobs {
                states,
                polls: Cell::new(0),
                submissions: RefCell::new(Vec::new()),
            }
        }

        fn current(&self) -> Job {
            let index = self.polls.get().min(self.states.len() - 1);
            serde_json::from_value(json!({
                "id": "1",
                "progress": { "state": self.states[index], "errorMessage": "boom" }
            }))
            .unwrap()
        }
    }

    impl SiriusApi for ScriptedJobs {
        fn is_logged_in(&self) -> Result<bool, EngineError> {
            Ok(true)
        }

        fn login(&self, _: &Credentials) -> Result<(), EngineError> {
            Ok(())
        }

        fn create_project(&self, project_id: &str, _: &Path) -> Result<ProjectInfo, EngineError> {
            Ok(ProjectInfo {
                project_id: project_id.to_string(),
                location: None,
            })
        }

        fn import_features(&self, _: &str, _: &str, _: &[FeatureImport]) -> Result<(), EngineError> {
            Ok(())
        }

        fn default_job_config(&self) -> Result<Value, EngineError> {
            Ok(json!({}))
        }

        fn start_job(&self, _: &str, submission: &Value) -> Result<Job, EngineError> {
            self.submissions.borrow_mut().push(submission.clone());
            Ok(self.current())
        }

        fn job(&self, _: &str, _: &str) -> Result<Job, EngineError> {
            self.polls.set(self.polls.get() + 1);
            Ok(self.current())
        }

        fn aligned_features(&self, _: &str) -> Result<Vec<AlignedFeature>, EngineError> {
            Ok(Vec::new())
        }

        fn formula_candidates(&self, _: &str, _: &str) -> Result<Vec<Value>, EngineError> {
            Ok(Vec::new())
        }

        fn structure_candidates(&self, _: &str, _: &str) -> Result<Vec<Value>, EngineError> {
            Ok(Vec::new())
        }

        fn de_novo_candidates(&self, _: &str, _: &str) -> Result<Vec<Value>, EngineError> {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedJobs;
    use super::*;
    use crate::sirius::job::{JobConfigBuilder, JobParameters, StageFlags};

    fn config() -> JobConfig {
        let parameters = JobParameters {
            stages: StageFlags {
                formula_id: true,
                ..StageFlags::default()
            },
            profile: "ORBITRAP".to_string(),
            formula_candidates: 10,
            ms1_accuracy_ppm: 2.0,
            ms2_accuracy_ppm: 5.0,
            filter_by_isotope_pattern: true,
            enforce_lipid_formula: true,
            bottom_up_search: true,
            de_novo_below_mz: 400.0,
            formula_constraints: "HCNOP".to_string(),
            detectable_elements: Vec::new(),
            structure_dbs: Vec::new(),
            de_novo_candidates: 10,
        };
        JobConfigBuilder::new(&parameters).build()
    }

    fn runner() -> JobRunner {
        JobRunner::new(Duration::from_millis(1), None)
    }

    #[test]
    fn test_polls_until_done() {
        let api = ScriptedJobs::new(vec!["WAITING", "RUNNING", "RUNNING", "DONE"]);
        let job = runner().run(&api, "p", &config()).unwrap();

        assert_eq!(job.state(), JobState::Done);
        assert_eq!(api.polls.get(), 3);
        assert_eq!(api.submissions.borrow().len(), 1);
    }

    #[test]
    fn test_failed_job() {
        let api = ScriptedJobs::new(vec!["RUNNING", "FAILED"]);
        match runner().run(&api, "p", &config()) {
            Err(EngineError::JobFailed { state, message, .. }) => {
                assert_eq!(state, JobState::Failed);
                assert_eq!(message.as_deref(), Some("boom"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_canceled_job() {
        let api = ScriptedJobs::new(vec!["CANCELED"]);
        assert!(matches!(
            runner().run(&api, "p", &config()),
            Err(EngineError::JobFailed { state: JobState::Canceled, .. })
        ));
        assert_eq!(api.polls.get(), 0);
    }

    #[test]
    fn test_timeout() {
        let api = ScriptedJobs::new(vec!["RUNNING"]);
        let runner = JobRunner::new(Duration::from_millis(5), Some(Duration::from_millis(20)));
        assert!(matches!(
            runner.run(&api, "p", &config()),
            Err(EngineError::JobTimeout { .. })
        ));
    }
}
