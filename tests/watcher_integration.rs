//! End-to-end tests for the public watcher API

use labwatch::interception::OpenMode;
use labwatch::recording::{RecordStorage, StorageConfig};
use labwatch::{
    CaptureContext, ExecutionKey, KeyScheme, LogOptions, Notifier, NotifyError, Vault,
    WatchdogError, Watcher, WatcherConfig,
};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tempfile::tempdir;

fn experiment(io: &mut CaptureContext<'_>, (a, b, _c): (i64, i64, i64)) -> anyhow::Result<i64> {
    io.print(format!("a*b {}", a * b));
    Ok(a - b)
}

#[test]
fn test_wrapped_result_matches_direct_call() {
    let watcher = Watcher::new(WatcherConfig::default().with_multiple_calls(true)).unwrap();
    let mut t = watcher.wrap(experiment, LogOptions::new("t").collect_output(true));

    let returned = t.call((10, 30, 10)).unwrap();
    let key = t.last_key().unwrap().clone();
    let record = watcher.record(key.as_str()).unwrap();

    let mut vault = Vault::new();
    let core = labwatch::InterceptionCore::new();
    let scope = core.begin_capture(false, false).unwrap();
    let direct = experiment(&mut scope.context(&mut vault), (10, 30, 10)).unwrap();
    drop(scope);

    assert_eq!(returned, direct);
    assert_eq!(record.return_value, format!("{:?}", direct));
    assert_eq!(record.return_value, "-20");
    assert_eq!(record.prints, Some(vec!["a*b 300".to_string()]));
    assert_eq!(record.files, None);
}

#[test]
fn test_prints_kept_in_order() {
    let watcher = Watcher::new(WatcherConfig::default().with_key_scheme(KeyScheme::Plain)).unwrap();
    watcher
        .log(
            &LogOptions::new("ordered").collect_output(true),
            3,
            |io, n: usize| -> anyhow::Result<()> {
                for i in 0..n {
                    io.print(format!("line {}", i));
                }
                let mut out = io.stdout();
                writeln!(out, "via writer")?;
                Ok(())
            },
        )
        .unwrap();

    let record = watcher.record("ordered").unwrap();
    assert_eq!(
        record.prints.unwrap(),
        vec!["line 0", "line 1", "line 2", "via writer"]
    );
}

#[test]
fn test_core_restored_after_failure() {
    let dir = tempdir().unwrap();
    let watcher = Watcher::new(WatcherConfig::default().with_multiple_calls(true)).unwrap();

    let err = watcher
        .log(
            &LogOptions::new("fails").collect_output(true).collect_files(true),
            (),
            |io, ()| -> anyhow::Result<()> {
                writeln!(io.create("partial.log")?, "half written")?;
                anyhow::bail!("out of memory")
            },
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "out of memory");
    assert!(!watcher.core().is_active());
    assert!(watcher.logs().is_empty());

    // A non-capturing scope reaches the real filesystem.
    let path = dir.path().join("real.txt");
    let mut vault = Vault::new();
    let scope = watcher.core().begin_capture(false, false).unwrap();
    {
        let mut io = scope.context(&mut vault);
        let mut file = io.open(&path, OpenMode::Write).unwrap();
        assert!(!file.is_captured());
        write!(file, "on disk").unwrap();
    }
    scope.end();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "on disk");
    assert!(!watcher
        .core()
        .buffer_names()
        .contains(&path.to_string_lossy().to_string()));
}

#[test]
fn test_repeated_name_gets_distinct_keys() {
    let watcher = Watcher::new(WatcherConfig::default().with_multiple_calls(true)).unwrap();
    let mut t = watcher.wrap(experiment, LogOptions::new("t"));

    t.call((1, 2, 3)).unwrap();
    let first = t.last_key().unwrap().clone();
    t.call((5, 2, 3)).unwrap();
    let second = t.last_key().unwrap().clone();

    assert_ne!(first, second);
    assert_eq!(watcher.keys(), vec![first.clone(), second.clone()]);
    assert_eq!(watcher.record(first.as_str()).unwrap().return_value, "-1");
    assert_eq!(watcher.record(second.as_str()).unwrap().return_value, "3");
}

#[test]
fn test_timestamp_keys_carry_name() {
    let watcher = Watcher::new(WatcherConfig::default()).unwrap();
    watcher
        .log(&LogOptions::new("sweep"), (), |_, ()| -> anyhow::Result<()> { Ok(()) })
        .unwrap();

    let key = watcher.last_key().unwrap();
    assert!(key.as_str().starts_with("sweep_"));
    assert!(key.as_str().len() > "sweep_".len());
}

#[test]
fn test_panicking_call_then_success() {
    let watcher = Watcher::new(WatcherConfig::default().with_multiple_calls(true)).unwrap();
    let mut t = watcher.wrap(
        |_: &mut CaptureContext<'_>, x: i32| -> anyhow::Result<i32> {
            if x < 0 {
                panic!("negative input");
            }
            Ok(x)
        },
        LogOptions::new("maybe").collect_output(true),
    );

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| t.call(-1)));
    assert!(caught.is_err());
    assert!(!watcher.core().is_active());

    assert_eq!(t.call(4).unwrap(), 4);
    assert_eq!(watcher.keys(), vec![ExecutionKey::new("maybe_0")]);
}

#[test]
fn test_nested_wrapped_call_fails() {
    let watcher = Watcher::new(WatcherConfig::default()).unwrap();
    let inner = watcher.clone();

    let err = watcher
        .log(&LogOptions::new("outer"), (), move |_, ()| -> anyhow::Result<()> {
            inner.log(&LogOptions::new("inner"), (), |_, ()| -> anyhow::Result<()> { Ok(()) })
        })
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<WatchdogError>(),
        Some(WatchdogError::Reentrancy { .. })
    ));
    assert!(watcher.logs().is_empty());
}

struct RejectingNotifier {
    attempts: Mutex<u32>,
}

impl Notifier for RejectingNotifier {
    fn send(&self, _recipient: &str, _text: &str) -> Result<(), NotifyError> {
        *self.attempts.lock() += 1;
        Err(NotifyError::Unauthorized)
    }
}

#[test]
fn test_failing_notifier_does_not_change_result() {
    let notifier = Arc::new(RejectingNotifier {
        attempts: Mutex::new(0),
    });
    let watcher = Watcher::with_notifier(
        WatcherConfig::default().with_multiple_calls(true),
        notifier.clone(),
    )
    .unwrap();
    let mut t = watcher.wrap(
        experiment,
        LogOptions::new("t").collect_output(true).notify("1234"),
    );

    assert_eq!(t.call((10, 30, 10)).unwrap(), -20);
    assert_eq!(*notifier.attempts.lock(), 1);
    let record = watcher.record("t_0").unwrap();
    assert_eq!(record.return_value, "-20");
    assert_eq!(record.prints, Some(vec!["a*b 300".to_string()]));
}

#[test]
fn test_auto_persist_readable_by_storage() {
    let dir = tempdir().unwrap();
    let logs_dir = dir.path().join("exp_runs");
    let watcher = Watcher::new(
        WatcherConfig::default()
            .with_multiple_calls(true)
            .with_auto_save(&logs_dir),
    )
    .unwrap();

    watcher
        .log(
            &LogOptions::new("test").collect_files(true),
            10,
            |io, c: i32| -> anyhow::Result<i32> {
                writeln!(io.create("test.txt")?, "a b c {}", c)?;
                Ok(c)
            },
        )
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(logs_dir.join("test_0.json")).unwrap())
            .unwrap();
    let mut fields: Vec<&str> = raw.as_object().unwrap().keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(
        fields,
        vec![
            "elapsed time",
            "end time",
            "input values",
            "log files outputs",
            "prints",
            "return values",
            "start time",
        ]
    );
    assert_eq!(raw["log files outputs"]["test.txt"][0], "a b c 10");

    let storage = RecordStorage::open(StorageConfig { base_dir: logs_dir });
    let loaded = storage.load_records().unwrap();
    assert_eq!(loaded.get(&ExecutionKey::new("test_0")), watcher.record("test_0").as_ref());
}

#[test]
fn test_independent_watchers_do_not_interfere() {
    let a = Watcher::new(WatcherConfig::default().with_multiple_calls(true)).unwrap();
    let b = Watcher::new(WatcherConfig::default().with_multiple_calls(true)).unwrap();

    let nested = a
        .log(
            &LogOptions::new("outer").collect_output(true),
            (),
            |io, ()| -> anyhow::Result<i64> {
                io.print("outer line");
                let inner = b.log(
                    &LogOptions::new("inner").collect_output(true),
                    (2, 1, 0),
                    experiment,
                )?;
                Ok(inner)
            },
        )
        .unwrap();

    assert_eq!(nested, 1);
    assert_eq!(a.record("outer_0").unwrap().prints.unwrap(), vec!["outer line"]);
    assert_eq!(b.record("inner_0").unwrap().prints.unwrap(), vec!["a*b 2"]);
}
