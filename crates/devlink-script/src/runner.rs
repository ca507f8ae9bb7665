use std::sync::atomic::{AtomicBool, Ordering};

use devlink_frame::{notify, CommandExchange, ExchangeObserver, FrameError};
use tracing::{info, warn};

use crate::error::RunError;
use crate::library::{ScriptLibrary, TestScript};

/// Callbacks fired while a script plays back.
///
/// Every step is reported through [`ExchangeObserver::on_exchange_complete`];
/// failed steps are additionally reported through `on_script_error`.
pub trait RunObserver: ExchangeObserver {
    fn on_run_started(&mut self, _script: &TestScript) {}

    fn on_script_error(&mut self, _command: &str, _error: &FrameError) {}

    fn on_run_finished(&mut self, _report: &RunReport) {}
}

impl RunObserver for devlink_frame::NoopObserver {}

/// Result of one command within a run.
#[derive(Debug)]
pub struct StepOutcome {
    pub command: String,
    pub result: Result<String, FrameError>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything that happened during one script run.
#[derive(Debug)]
pub struct RunReport {
    pub script: String,
    pub steps: Vec<StepOutcome>,
}

impl RunReport {
    /// Number of steps whose exchange failed.
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|step| !step.is_ok()).count()
    }

    pub fn succeeded(&self) -> bool {
        self.failures() == 0
    }
}

/// Replays scripts one at a time.
///
/// The runner is either idle or running exactly one script; a second
/// [`run`](Self::run) while busy fails with [`RunError::Busy`] instead of
/// queueing. A failed step never stops the run.
#[derive(Debug, Default)]
pub struct ScriptRunner {
    running: AtomicBool,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the script at `index` in `library`.
    pub fn run<E, O>(
        &self,
        library: &ScriptLibrary,
        index: usize,
        exchange: &E,
        observer: &mut O,
    ) -> Result<RunReport, RunError>
    where
        E: CommandExchange + ?Sized,
        O: RunObserver + ?Sized,
    {
        if self.is_running() {
            return Err(RunError::Busy);
        }
        let script = library.get(index).ok_or(RunError::IndexOutOfRange {
            index,
            len: library.len(),
        })?;
        self.run_script(script, exchange, observer)
    }

    /// Run `script` directly.
    pub fn run_script<E, O>(
        &self,
        script: &TestScript,
        exchange: &E,
        observer: &mut O,
    ) -> Result<RunReport, RunError>
    where
        E: CommandExchange + ?Sized,
        O: RunObserver + ?Sized,
    {
        let _guard = RunGuard::acquire(&self.running).ok_or(RunError::Busy)?;

        info!(
            script = script.name(),
            steps = script.commands().len(),
            "starting script"
        );
        observer.on_run_started(script);

        let mut steps = Vec::with_capacity(script.commands().len());
        for command in script.commands() {
            let result = exchange.exchange(command);
            notify(observer, command, &result);
            if let Err(err) = &result {
                warn!(script = script.name(), command = %command, error = %err, "script step failed");
                observer.on_script_error(command, err);
            }
            steps.push(StepOutcome {
                command: command.clone(),
                result,
            });
        }

        let report = RunReport {
            script: script.name().to_string(),
            steps,
        };
        info!(
            script = script.name(),
            failures = report.failures(),
            "script complete"
        );
        observer.on_run_finished(&report);
        Ok(report)
    }
}

/// Holds the running flag; clearing it on drop covers panicking observers too.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use devlink_transport::TransportError;

    use super::*;

    /// Answers `command` with `command!`, failing the listed commands.
    #[derive(Default)]
    struct ScriptedExchange {
        failing: Vec<&'static str>,
        sent: Mutex<Vec<String>>,
    }

    impl CommandExchange for ScriptedExchange {
        fn exchange(&self, command: &str) -> devlink_frame::Result<String> {
            self.sent.lock().unwrap().push(command.to_string());
            if self.failing.iter().any(|failing| *failing == command) {
                return Err(FrameError::Interrupted {
                    partial: b"par".to_vec(),
                    source: TransportError::Io(std::io::ErrorKind::TimedOut.into()),
                });
            }
            Ok(format!("{command}!"))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        started: Vec<String>,
        completed: Vec<(String, String, bool)>,
        errors: Vec<String>,
        finished: usize,
    }

    impl ExchangeObserver for RecordingObserver {
        fn on_exchange_complete(
            &mut self,
            command: &str,
            response: &str,
            error: Option<&FrameError>,
        ) {
            self.completed
                .push((command.to_string(), response.to_string(), error.is_some()));
        }
    }

    impl RunObserver for RecordingObserver {
        fn on_run_started(&mut self, script: &TestScript) {
            self.started.push(script.name().to_string());
        }

        fn on_script_error(&mut self, command: &str, _error: &FrameError) {
            self.errors.push(command.to_string());
        }

        fn on_run_finished(&mut self, _report: &RunReport) {
            self.finished += 1;
        }
    }

    fn library() -> ScriptLibrary {
        ScriptLibrary::new(vec![TestScript::new(
            "test_three.yaml",
            vec!["first".into(), "second".into(), "third".into()],
        )])
    }

    #[test]
    fn failed_step_does_not_abort_run() {
        let runner = ScriptRunner::new();
        let exchange = ScriptedExchange {
            failing: vec!["second"],
            ..ScriptedExchange::default()
        };
        let mut observer = RecordingObserver::default();

        let report = runner
            .run(&library(), 0, &exchange, &mut observer)
            .unwrap();

        assert_eq!(
            *exchange.sent.lock().unwrap(),
            ["first", "second", "third"]
        );
        assert_eq!(report.failures(), 1);
        assert!(!report.succeeded());
        assert_eq!(observer.errors, ["second"]);
        assert_eq!(
            observer.completed,
            [
                ("first".to_string(), "first!".to_string(), false),
                ("second".to_string(), "par".to_string(), true),
                ("third".to_string(), "third!".to_string(), false),
            ]
        );
        assert_eq!(observer.started, ["test_three.yaml"]);
        assert_eq!(observer.finished, 1);
        assert!(!runner.is_running());
    }

    #[test]
    fn invalid_index_is_out_of_range() {
        let runner = ScriptRunner::new();
        let exchange = ScriptedExchange::default();
        let err = runner
            .run(&library(), 5, &exchange, &mut devlink_frame::NoopObserver)
            .unwrap_err();
        assert_eq!(err, RunError::IndexOutOfRange { index: 5, len: 1 });
        assert!(exchange.sent.lock().unwrap().is_empty());
        assert!(!runner.is_running());
    }

    /// Blocks inside the first exchange until released.
    struct GatedExchange {
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<mpsc::Receiver<()>>,
        sent: Mutex<Vec<String>>,
    }

    impl CommandExchange for GatedExchange {
        fn exchange(&self, command: &str) -> devlink_frame::Result<String> {
            if let Some(entered) = self.entered.lock().unwrap().take() {
                entered.send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            self.sent.lock().unwrap().push(command.to_string());
            Ok(String::new())
        }
    }

    #[test]
    fn second_run_while_running_is_busy() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let exchange = Arc::new(GatedExchange {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
            sent: Mutex::new(Vec::new()),
        });
        let runner = Arc::new(ScriptRunner::new());
        let library = Arc::new(library());

        let background = {
            let exchange = Arc::clone(&exchange);
            let runner = Arc::clone(&runner);
            let library = Arc::clone(&library);
            thread::spawn(move || {
                runner.run(&library, 0, &*exchange, &mut devlink_frame::NoopObserver)
            })
        };

        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("first run should start");
        assert!(runner.is_running());

        let err = runner
            .run(&library, 0, &*exchange, &mut devlink_frame::NoopObserver)
            .unwrap_err();
        assert_eq!(err, RunError::Busy);

        release_tx.send(()).unwrap();
        let report = background.join().unwrap().unwrap();
        assert_eq!(report.steps.len(), 3);
        assert!(report.succeeded());
        assert_eq!(*exchange.sent.lock().unwrap(), ["first", "second", "third"]);
        assert!(!runner.is_running());
    }

    struct PanickingObserver;

    impl ExchangeObserver for PanickingObserver {
        fn on_exchange_complete(&mut self, _: &str, _: &str, _: Option<&FrameError>) {
            panic!("observer failure");
        }
    }

    impl RunObserver for PanickingObserver {}

    #[test]
    fn panic_mid_run_leaves_runner_idle() {
        let runner = ScriptRunner::new();
        let exchange = ScriptedExchange::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            runner.run(&library(), 0, &exchange, &mut PanickingObserver)
        }));
        assert!(outcome.is_err());
        assert!(!runner.is_running());
    }
}
