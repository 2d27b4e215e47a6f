/// Events emitted while the engine works through a long-running operation.
#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// One objective evaluation of a relaxation.
    Step {
        evaluation: usize,
        energy: f64,
        gradient_norm: f64,
    },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(Progress::PhaseFinish);
    }

    #[test]
    fn reporter_forwards_events_in_order() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            let label = match event {
                Progress::PhaseStart { name } => name.to_string(),
                Progress::PhaseFinish => "finish".to_string(),
                Progress::Step { evaluation, .. } => format!("step {evaluation}"),
                Progress::Message(m) => m,
            };
            seen.lock().unwrap().push(label);
        }));

        reporter.report(Progress::PhaseStart { name: "Relax" });
        reporter.report(Progress::Step {
            evaluation: 1,
            energy: -1.0,
            gradient_norm: 0.1,
        });
        reporter.report(Progress::PhaseFinish);
        drop(reporter);

        assert_eq!(seen.into_inner().unwrap(), vec!["Relax", "step 1", "finish"]);
    }
}
