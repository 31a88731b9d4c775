//! Readiness probe
//!
//! A [`Probe`] polls a view-model for a set of fields that must all be
//! truthy. It reacts only to changes in readiness: the first poll, and any
//! poll whose outcome differs from the last reported direction. On a change
//! it may write a boolean flag back onto the view-model, either before
//! `check()` returns or after a delay on the host scheduler.
//!
//! ```rust
//! use serde_json::json;
//! use vm_ready::{create_probe_with_scheduler, ManualScheduler, SharedViewModel};
//!
//! let vm = SharedViewModel::from_value(json!({"a": 1, "b": 0})).unwrap();
//! let scheduler = ManualScheduler::new();
//! let mut probe = create_probe_with_scheduler(vm.clone(), ["a", "b"], scheduler.clone());
//! probe.with_flag("ready").with_assert_delay(0.0);
//!
//! assert!(!probe.check());
//! vm.set("b", 1);
//! assert!(probe.check());
//!
//! scheduler.advance(std::time::Duration::ZERO);
//! assert_eq!(vm.get("ready"), Some(json!(true)));
//! ```

use crate::config::ProbeConfig;
use crate::error::Result;
use crate::fields::FieldList;
use crate::logger::Logger;
use crate::options::{logger_from_value, Delay, Flag};
use crate::report::ReadinessReport;
use crate::scheduler::{Scheduler, TimerHandle, TokioScheduler};
use crate::view_model::ViewModel;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Last readiness direction a probe reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transition {
    /// Not polled yet
    #[default]
    None,
    Positive,
    Negative,
}

impl Transition {
    fn differs_from(self, is_ready: bool) -> bool {
        match self {
            Transition::None => true,
            Transition::Positive => !is_ready,
            Transition::Negative => is_ready,
        }
    }
}

/// The flag write performed on a readiness change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Assert,
    Negate,
}

impl FlagAction {
    fn value(self) -> bool {
        matches!(self, FlagAction::Assert)
    }

    fn verb(self) -> &'static str {
        match self {
            FlagAction::Assert => "assert",
            FlagAction::Negate => "negate",
        }
    }
}

struct FlagWrite<V> {
    view_model: V,
    field: String,
    action: FlagAction,
    logger: Logger,
}

impl<V: ViewModel> FlagWrite<V> {
    fn apply(&self) {
        let message = format!(
            "{} flag view-model flag \"{}\"",
            self.action.verb(),
            self.field
        );
        self.logger.log(&[message.as_str()]);
        tracing::debug!(flag = %self.field, value = self.action.value(), "writing readiness flag");
        self.view_model.set_flag(&self.field, self.action.value());
    }
}

/// Polls view-model fields for readiness
///
/// Builder methods take `&mut self` and return it, so configuration chains
/// on the probe in place. Dropping the probe cancels any pending write.
pub struct Probe<V: ViewModel> {
    view_model: V,
    fields: FieldList,
    flag: Flag,
    assert_delay: Delay,
    negate_delay: Delay,
    logger: Logger,
    last_transition: Transition,
    scheduler: Arc<dyn Scheduler>,
    // Bumped on every cancel and by each delayed write that lands. A delayed
    // write only runs while the epoch still matches the one it was armed at.
    epoch: Arc<Mutex<u64>>,
    armed: Option<u64>,
    timer: Option<TimerHandle>,
}

/// Create a probe on the tokio scheduler
pub fn create_probe<V: ViewModel>(view_model: V, fields: impl Into<FieldList>) -> Probe<V> {
    create_probe_with_scheduler(view_model, fields, TokioScheduler::new())
}

/// Create a probe whose delayed writes go to `scheduler`
pub fn create_probe_with_scheduler<V: ViewModel>(
    view_model: V,
    fields: impl Into<FieldList>,
    scheduler: impl Scheduler + 'static,
) -> Probe<V> {
    Probe {
        view_model,
        fields: fields.into(),
        flag: Flag::disabled(),
        assert_delay: Delay::Synchronous,
        negate_delay: Delay::Synchronous,
        logger: Logger::noop(),
        last_transition: Transition::None,
        scheduler: Arc::new(scheduler),
        epoch: Arc::new(Mutex::new(0)),
        armed: None,
        timer: None,
    }
}

fn lock_epoch(epoch: &Mutex<u64>) -> MutexGuard<'_, u64> {
    epoch.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V: ViewModel> Probe<V> {
    /// Poll whether every watched field is truthy
    ///
    /// Logs progress while waiting. On a readiness change, cancels any
    /// pending flag write and schedules the write for the new direction.
    pub fn check(&mut self) -> bool {
        let report = self.report();
        let is_ready = report.is_ready();

        if let Some([lead, waiting]) = report.progress_parts() {
            self.logger.log(&[lead.as_str(), waiting.as_str()]);
        }

        if self.last_transition.differs_from(is_ready) {
            tracing::debug!(
                ready = is_ready,
                obtained = ?report.obtained(),
                waiting = ?report.waiting(),
                "view-model readiness changed"
            );

            if is_ready {
                self.logger.log(&["view-model ready"]);
            }

            self.cancel();
            if is_ready {
                self.arm(FlagAction::Assert, self.assert_delay);
                self.last_transition = Transition::Positive;
            } else {
                self.arm(FlagAction::Negate, self.negate_delay);
                self.last_transition = Transition::Negative;
            }
        }

        is_ready
    }

    /// Partition the watched fields without logging or scheduling
    pub fn report(&self) -> ReadinessReport {
        ReadinessReport::evaluate(&self.view_model, &self.fields)
    }

    /// Cancel the pending flag write, if any
    pub fn cancel(&mut self) {
        *lock_epoch(&self.epoch) += 1;
        self.armed = None;
        if let Some(timer) = self.timer.take() {
            tracing::trace!(flag = %self.flag, "cancelled pending flag write");
            timer.cancel();
        }
    }

    /// Whether a delayed flag write is still outstanding
    pub fn is_pending(&self) -> bool {
        self.armed
            .map_or(false, |armed_at| *lock_epoch(&self.epoch) == armed_at)
    }

    /// Direction reported by the most recent readiness change
    pub fn last_transition(&self) -> Transition {
        self.last_transition
    }

    /// The watched fields, in poll order
    pub fn fields(&self) -> &FieldList {
        &self.fields
    }

    /// The flag field written on readiness changes
    pub fn flag(&self) -> &Flag {
        &self.flag
    }

    /// Delay before writing `true` once ready
    pub fn assert_delay(&self) -> Delay {
        self.assert_delay
    }

    /// Delay before writing `false` once no longer ready
    pub fn negate_delay(&self) -> Delay {
        self.negate_delay
    }

    /// Closure `Fn(&[&str])`, `Logger::noop()` or `Logger::tracing()`
    pub fn with_logger(&mut self, logger: impl Into<Logger>) -> &mut Self {
        self.logger = logger.into();
        self
    }

    /// Field name to write readiness into; empty or `Flag::disabled()` turns it off
    pub fn with_flag(&mut self, flag: impl Into<Flag>) -> &mut Self {
        self.flag = flag.into();
        self
    }

    /// Milliseconds as `f64` (negative or NaN for synchronous) or a `Duration`
    pub fn with_assert_delay(&mut self, delay: impl Into<Delay>) -> &mut Self {
        self.assert_delay = delay.into();
        self
    }

    /// Milliseconds as `f64` (negative or NaN for synchronous) or a `Duration`
    pub fn with_negate_delay(&mut self, delay: impl Into<Delay>) -> &mut Self {
        self.negate_delay = delay.into();
        self
    }

    /// Set the logger from a dynamic value
    ///
    /// Falsey values clear the logger and `"tracing"` selects the tracing
    /// sink. Anything else is an invalid argument.
    pub fn try_with_logger(&mut self, value: &Value) -> Result<&mut Self> {
        self.logger = logger_from_value(value)?;
        Ok(self)
    }

    /// Set the flag from a dynamic value, which must be a string or falsey
    pub fn try_with_flag(&mut self, value: &Value) -> Result<&mut Self> {
        self.flag = Flag::from_value(value)?;
        Ok(self)
    }

    /// Set the assert delay from a dynamic value, which must be a number
    pub fn try_with_assert_delay(&mut self, value: &Value) -> Result<&mut Self> {
        self.assert_delay = Delay::from_value(value, "assert_delay")?;
        Ok(self)
    }

    /// Set the negate delay from a dynamic value, which must be a number
    pub fn try_with_negate_delay(&mut self, value: &Value) -> Result<&mut Self> {
        self.negate_delay = Delay::from_value(value, "negate_delay")?;
        Ok(self)
    }

    /// Apply flag, delays and logger target from a config
    pub fn with_config(&mut self, config: &ProbeConfig) -> &mut Self {
        self.flag = config.flag();
        self.assert_delay = config.assert_delay();
        self.negate_delay = config.negate_delay();
        self.logger = config.logger.logger();
        self
    }

    /// Send later delayed writes to another scheduler
    ///
    /// A write already pending stays on the scheduler it was armed on.
    pub fn with_scheduler(&mut self, scheduler: impl Scheduler + 'static) -> &mut Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    fn arm(&mut self, action: FlagAction, delay: Delay) {
        let Some(field) = self.flag.field() else {
            return;
        };

        let write = FlagWrite {
            view_model: self.view_model.clone(),
            field: field.to_string(),
            action,
            logger: self.logger.clone(),
        };

        let Some(duration) = delay.as_duration() else {
            write.apply();
            return;
        };

        let epoch = self.epoch.clone();
        let armed_at = *lock_epoch(&epoch);
        tracing::trace!(
            flag = %field,
            action = action.verb(),
            delay_ms = delay.as_millis_f64(),
            "scheduling flag write"
        );

        self.armed = Some(armed_at);
        self.timer = Some(self.scheduler.schedule(
            duration,
            Box::new(move || {
                let mut current = lock_epoch(&epoch);
                if *current == armed_at {
                    write.apply();
                    *current += 1;
                }
            }),
        ));
    }
}

impl<V: ViewModel> Drop for Probe<V> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<V: ViewModel> fmt::Debug for Probe<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("fields", &self.fields)
            .field("flag", &self.flag)
            .field("assert_delay", &self.assert_delay)
            .field("negate_delay", &self.negate_delay)
            .field("logger", &self.logger)
            .field("last_transition", &self.last_transition)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::scheduler::{ManualScheduler, Task};
    use crate::view_model::SharedViewModel;
    use mockall::mock;
    use mockall::predicate::eq;
    use serde_json::json;
    use std::time::Duration;

    mock! {
        pub Timer {}

        impl Scheduler for Timer {
            fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
        }
    }

    fn recording() -> (Arc<Mutex<Vec<String>>>, Logger) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let logger = Logger::from(move |parts: &[&str]| {
            sink.lock().unwrap().push(parts.join(" "));
        });
        (lines, logger)
    }

    fn vm(value: Value) -> SharedViewModel {
        SharedViewModel::from_value(value).unwrap()
    }

    #[test]
    fn test_not_ready_then_ready() {
        let vm = vm(json!({"a": 1, "b": 0}));
        let mut probe = create_probe_with_scheduler(vm.clone(), ["a", "b"], ManualScheduler::new());

        assert!(!probe.check());
        assert_eq!(probe.last_transition(), Transition::Negative);

        vm.set("b", 1);
        assert!(probe.check());
        assert_eq!(probe.last_transition(), Transition::Positive);
    }

    #[test]
    fn test_logging_sequence() {
        let vm = vm(json!({"a": 1}));
        let (lines, logger) = recording();
        let mut probe = create_probe_with_scheduler(vm.clone(), ["a", "b"], ManualScheduler::new());
        probe.with_logger(logger).with_flag("ready");

        probe.check();
        vm.set("b", "loaded");
        probe.check();
        probe.check();

        assert_eq!(
            *lines.lock().unwrap(),
            vec![
                r#"obtained "a" still waiting on "b""#.to_string(),
                r#"negate flag view-model flag "ready""#.to_string(),
                "view-model ready".to_string(),
                r#"assert flag view-model flag "ready""#.to_string(),
            ]
        );
    }

    #[test]
    fn test_waiting_logged_on_every_poll() {
        let (lines, logger) = recording();
        let mut probe =
            create_probe_with_scheduler(vm(json!({})), "a", ManualScheduler::new());
        probe.with_logger(logger);

        probe.check();
        probe.check();

        assert_eq!(lines.lock().unwrap().len(), 2);
        assert!(lines
            .lock()
            .unwrap()
            .iter()
            .all(|l| l == r#"still waiting on "a""#));
    }

    #[test]
    fn test_synchronous_flag_writes() {
        let vm = vm(json!({"a": 0}));
        let mut probe = create_probe_with_scheduler(vm.clone(), "a", ManualScheduler::new());
        probe.with_flag("ready").with_assert_delay(-5.0);

        assert!(!probe.check());
        assert_eq!(vm.get("ready"), Some(json!(false)));

        vm.set("a", true);
        assert!(probe.check());
        assert_eq!(vm.get("ready"), Some(json!(true)));
        assert!(!probe.is_pending());
    }

    #[test]
    fn test_no_flag_no_write() {
        let vm = vm(json!({"a": 1}));
        let scheduler = ManualScheduler::new();
        let mut probe = create_probe_with_scheduler(vm.clone(), "a", scheduler.clone());
        probe.with_assert_delay(10.0);

        assert!(probe.check());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(vm.snapshot(), json!({"a": 1}));
        assert_eq!(probe.last_transition(), Transition::Positive);
    }

    #[test]
    fn test_delayed_assert() {
        let vm = vm(json!({"a": 1}));
        let scheduler = ManualScheduler::new();
        let mut probe = create_probe_with_scheduler(vm.clone(), "a", scheduler.clone());
        probe.with_flag("ready").with_assert_delay(100.0);

        assert!(probe.check());
        assert!(probe.is_pending());
        assert_eq!(vm.get("ready"), None);

        scheduler.advance(Duration::from_millis(99));
        assert_eq!(vm.get("ready"), None);

        scheduler.advance(Duration::from_millis(1));
        assert_eq!(vm.get("ready"), Some(json!(true)));
        assert!(!probe.is_pending());
    }

    #[test]
    fn test_repeated_polls_do_not_reschedule() {
        let vm = vm(json!({"a": 1}));
        let scheduler = ManualScheduler::new();
        let mut probe = create_probe_with_scheduler(vm.clone(), "a", scheduler.clone());
        probe.with_flag("ready").with_assert_delay(100.0);

        probe.check();
        scheduler.advance(Duration::from_millis(60));
        probe.check();
        probe.check();
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(40));
        assert_eq!(vm.get("ready"), Some(json!(true)));
    }

    #[test]
    fn test_flip_cancels_pending_write() {
        let vm = vm(json!({"a": 1}));
        let scheduler = ManualScheduler::new();
        let mut probe = create_probe_with_scheduler(vm.clone(), "a", scheduler.clone());
        probe
            .with_flag("ready")
            .with_assert_delay(100.0)
            .with_negate_delay(Duration::from_millis(500));

        assert!(probe.check());
        vm.set("a", 0);
        assert!(!probe.check());
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(vm.get("ready"), None);

        scheduler.advance(Duration::from_millis(400));
        assert_eq!(vm.get("ready"), Some(json!(false)));
    }

    #[test]
    fn test_negate_uses_negate_delay() {
        let vm = vm(json!({"a": 1}));
        let mut scheduler = MockTimer::new();
        scheduler
            .expect_schedule()
            .with(eq(Duration::from_millis(10)), mockall::predicate::always())
            .times(1)
            .returning(|_, _| TimerHandle::detached());
        scheduler
            .expect_schedule()
            .with(eq(Duration::from_millis(750)), mockall::predicate::always())
            .times(1)
            .returning(|_, _| TimerHandle::detached());

        let mut probe = create_probe_with_scheduler(vm.clone(), "a", scheduler);
        probe
            .with_flag("ready")
            .with_assert_delay(10.0)
            .with_negate_delay(750.0);

        probe.check();
        vm.remove("a");
        probe.check();
    }

    #[test]
    fn test_stale_write_after_cancel_is_ignored() {
        let vm = vm(json!({"a": 1}));
        let captured: Arc<Mutex<Option<Task>>> = Arc::new(Mutex::new(None));
        let slot = captured.clone();

        let mut scheduler = MockTimer::new();
        scheduler.expect_schedule().returning(move |_, task| {
            *slot.lock().unwrap() = Some(task);
            TimerHandle::detached()
        });

        let mut probe = create_probe_with_scheduler(vm.clone(), "a", scheduler);
        probe.with_flag("ready").with_assert_delay(10.0);
        probe.check();
        probe.cancel();

        let task = captured.lock().unwrap().take().unwrap();
        task();
        assert_eq!(vm.get("ready"), None);
    }

    #[test]
    fn test_drop_cancels_pending_write() {
        let vm = vm(json!({"a": 1}));
        let scheduler = ManualScheduler::new();
        {
            let mut probe = create_probe_with_scheduler(vm.clone(), "a", scheduler.clone());
            probe.with_flag("ready").with_assert_delay(5.0);
            probe.check();
            assert_eq!(scheduler.pending(), 1);
        }
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.run_all(), 0);
        assert_eq!(vm.get("ready"), None);
    }

    #[test]
    fn test_builders_return_same_probe() {
        let mut probe = create_probe_with_scheduler(vm(json!({})), "a", ManualScheduler::new());

        let chained: *const Probe<SharedViewModel> = probe.with_flag("x");
        assert!(std::ptr::eq(chained, &probe));

        let chained: *const Probe<SharedViewModel> = probe
            .with_logger(Logger::noop())
            .with_assert_delay(1.0)
            .with_negate_delay(2.0);
        assert!(std::ptr::eq(chained, &probe));

        let chained: *const Probe<SharedViewModel> =
            probe.try_with_flag(&json!("y")).unwrap();
        assert!(std::ptr::eq(chained, &probe));
    }

    #[test]
    fn test_dynamic_builders_reject_wrong_types() {
        let mut probe = create_probe_with_scheduler(vm(json!({})), "a", ManualScheduler::new());

        let err = probe.try_with_logger(&json!(42)).unwrap_err();
        assert_eq!(err, ProbeError::invalid_argument("logger", "function"));
        assert!(probe.try_with_flag(&json!(42)).unwrap_err().is_invalid_argument());
        assert!(probe
            .try_with_assert_delay(&json!("x"))
            .unwrap_err()
            .is_invalid_argument());
        assert!(probe
            .try_with_negate_delay(&json!("x"))
            .unwrap_err()
            .is_invalid_argument());

        // rejected arguments leave the probe untouched
        assert!(!probe.flag().is_enabled());
        assert!(probe.assert_delay().is_synchronous());
    }

    #[test]
    fn test_dynamic_builders_accept_nullish() {
        let mut probe = create_probe_with_scheduler(vm(json!({})), "a", ManualScheduler::new());
        probe
            .try_with_flag(&json!("ready"))
            .and_then(|p| p.try_with_assert_delay(&json!(-3)))
            .and_then(|p| p.try_with_negate_delay(&json!(20)))
            .and_then(|p| p.try_with_logger(&json!(null)))
            .unwrap();

        assert_eq!(probe.flag().field(), Some("ready"));
        assert!(probe.assert_delay().is_synchronous());
        assert_eq!(probe.negate_delay(), Delay::After(Duration::from_millis(20)));

        probe.try_with_flag(&json!(null)).unwrap();
        assert!(!probe.flag().is_enabled());
    }

    #[test]
    fn test_with_config() {
        let config = ProbeConfig::from_json_str(
            r#"{"flag": "ready", "assert_delay_ms": 30, "logger": "tracing"}"#,
        )
        .unwrap();
        let mut probe = create_probe_with_scheduler(vm(json!({})), "a", ManualScheduler::new());
        probe.with_config(&config);

        assert_eq!(probe.flag().field(), Some("ready"));
        assert_eq!(probe.assert_delay(), Delay::After(Duration::from_millis(30)));
        assert!(probe.negate_delay().is_synchronous());
    }

    #[test]
    fn test_flip_with_flag_disabled_still_cancels() {
        let vm = vm(json!({"a": 1}));
        let scheduler = ManualScheduler::new();
        let mut probe = create_probe_with_scheduler(vm.clone(), "a", scheduler.clone());
        probe.with_flag("ready").with_assert_delay(100.0);

        assert!(probe.check());
        assert_eq!(scheduler.pending(), 1);

        probe.with_flag(Flag::disabled());
        vm.set("a", 0);
        assert!(!probe.check());

        assert_eq!(scheduler.pending(), 0);
        assert!(!probe.is_pending());
        assert_eq!(probe.last_transition(), Transition::Negative);

        assert_eq!(scheduler.run_all(), 0);
        assert_eq!(vm.get("ready"), None);
    }

    #[test]
    fn test_with_scheduler_redirects_later_writes() {
        let vm = vm(json!({"a": 1}));
        let first = ManualScheduler::new();
        let second = ManualScheduler::new();
        let mut probe = create_probe_with_scheduler(vm.clone(), "a", first.clone());
        probe.with_flag("ready").with_assert_delay(10.0).with_negate_delay(10.0);

        probe.check();
        assert_eq!(first.pending(), 1);

        probe.with_scheduler(second.clone());
        vm.set("a", 0);
        probe.check();
        assert_eq!(first.pending(), 0);
        assert_eq!(second.pending(), 1);

        second.advance(Duration::from_millis(10));
        assert_eq!(vm.get("ready"), Some(json!(false)));
    }

    #[test]
    fn test_empty_field_list_is_ready() {
        let mut probe =
            create_probe_with_scheduler(vm(json!({})), json!([1, 2]), ManualScheduler::new());
        assert!(probe.fields().is_empty());
        assert!(probe.check());
    }
}
