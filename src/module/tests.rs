use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::*;
use crate::core::eventual::later;
use crate::identity::{unit, value};
use crate::instance::{Invoke, LifecycleState, On, Terminate};

#[derive(Default)]
struct History(RefCell<Vec<String>>);

impl History {
    fn log(&self, line: impl Into<String>) {
        self.0.borrow_mut().push(line.into());
    }

    fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

type Add = Box<dyn Fn(i32, i32) -> i32>;

/// Shared specs, so registering them on several modules dedupes by identity.
struct Fixture {
    logger: Spec,
    add: Spec,
    before_add: Spec,
    after_add: Spec,
}

impl Fixture {
    fn new() -> Self {
        let logger = Spec::bare(|_| value(History::default()));
        let add = Spec::with_deps(["logger"], |args: Args| {
            let logger = args.get::<History>(0)?;
            let add: Add = Box::new(move |a, b| {
                let result = a + b;
                logger.log(format!("add({a}, {b}) = {result}"));
                result
            });
            Ok::<_, Error>(value(add))
        });
        let before_add = Spec::with_deps(["logger"], |args: Args| {
            args.get::<History>(0)?.log("before add");
            Ok::<_, Error>(())
        });
        let after_add = Spec::with_deps(["add", "logger"], |args: Args| {
            let add = args.get::<Add>(0)?;
            assert_eq!(add(1, 2), 3);
            args.get::<History>(1)?.log("after add");
            Ok::<_, Error>(())
        });
        Self {
            logger,
            add,
            before_add,
            after_add,
        }
    }

    fn entry(&self, seen: &Rc<RefCell<Vec<String>>>) -> Spec {
        let seen = Rc::clone(seen);
        Spec::with_deps(["add", "logger"], move |args: Args| {
            let add = args.get::<Add>(0)?;
            let logger = args.get::<History>(1)?;
            assert_eq!(add(2, 3), 5);
            *seen.borrow_mut() = logger.lines();
            Ok::<_, Error>(())
        })
    }
}

fn expected_add_history() -> Vec<String> {
    ["before add", "add(1, 2) = 3", "after add", "add(2, 3) = 5"]
        .map(String::from)
        .to_vec()
}

#[tokio::test]
async fn simple_scheduling() {
    let history = Rc::new(RefCell::new(Vec::new()));
    let (h1, h2, h3) = (
        Rc::clone(&history),
        Rc::clone(&history),
        Rc::clone(&history),
    );
    let module = Module::new()
        .schedule(Spec::bare(move |_| h1.borrow_mut().push("first".to_string())))
        .unwrap()
        .schedule(Spec::bare(move |_| h2.borrow_mut().push("second".to_string())))
        .unwrap()
        .schedule(Spec::with_deps(["$invoke"], move |args: Args| {
            let invoke = args.get::<Invoke>(0)?;
            let sum = invoke.call(&Spec::bare(|_| later(async { Ok(1 + 2) })))?;
            let h = Rc::clone(&h3);
            Ok::<_, Error>(later(async move {
                let sum = sum.resolve_as::<i32>().await?;
                h.borrow_mut().push(sum.to_string());
                Ok(())
            }))
        }))
        .unwrap();

    module.initiate().await.unwrap();
    assert_eq!(*history.borrow(), vec!["first", "second", "3"]);
}

#[tokio::test]
async fn basic_factory() {
    let history = Rc::new(RefCell::new(Vec::new()));
    let h = Rc::clone(&history);
    let module = Module::new()
        .factory(
            "add",
            Spec::bare(|_| {
                let add: Add = Box::new(|a, b| a + b);
                value(add)
            }),
        )
        .unwrap()
        .schedule(Spec::with_deps(["add"], move |args: Args| {
            h.borrow_mut().push(args.get::<Add>(0)?(1, 2));
            Ok::<_, Error>(())
        }))
        .unwrap();

    module.initiate().await.unwrap();
    assert_eq!(*history.borrow(), vec![3]);
}

#[tokio::test]
async fn hooks_wrap_construction() {
    let f = Fixture::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let module = Module::new()
        .factory("add", f.add.clone())
        .unwrap()
        .factory("logger", f.logger.clone())
        .unwrap()
        .after("add", f.after_add.clone())
        .unwrap()
        .before("add", f.before_add.clone())
        .unwrap()
        .schedule(f.entry(&seen))
        .unwrap();

    module.initiate().await.unwrap();
    assert_eq!(*seen.borrow(), expected_add_history());
}

#[tokio::test]
async fn extending_dedupes_diamond() {
    let f = Fixture::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let logging = Module::new().factory("logger", f.logger.clone()).unwrap();
    let adder = Module::new()
        .extends(&logging)
        .unwrap()
        .factory("add", f.add.clone())
        .unwrap()
        .after("add", f.after_add.clone())
        .unwrap()
        .before("add", f.before_add.clone())
        .unwrap();
    let module = Module::new()
        .extends(&adder)
        .unwrap()
        .extends(&logging)
        .unwrap()
        .after("add", f.after_add.clone())
        .unwrap()
        .before("add", f.before_add.clone())
        .unwrap()
        .schedule(f.entry(&seen))
        .unwrap();

    let template = module.template();
    let add = template.descriptor(&"add".into()).unwrap();
    assert_eq!(add.before.len(), 1);
    assert_eq!(add.after.len(), 1);

    module.initiate().await.unwrap();
    assert_eq!(*seen.borrow(), expected_add_history());
}

#[tokio::test]
async fn extended_schedules_are_not_duplicated() {
    let runs = Rc::new(Cell::new(0));
    let r = Rc::clone(&runs);
    let base = Module::new()
        .schedule(Spec::bare(move |_| r.set(r.get() + 1)))
        .unwrap();
    let left = Module::new().extends(&base).unwrap();
    let right = Module::new().extends(&base).unwrap();
    let module = Module::new()
        .extends(&left)
        .unwrap()
        .extends(&right)
        .unwrap();
    module.initiate().await.unwrap();
    assert_eq!(runs.get(), 1);
}

#[tokio::test]
async fn failing_hook_still_runs_exit_work() {
    let f = Fixture::new();
    let history = Rc::new(RefCell::new(Vec::new()));
    let (h1, h2) = (Rc::clone(&history), Rc::clone(&history));
    let module = Module::new()
        .factory("add", f.add.clone())
        .unwrap()
        .factory("logger", f.logger.clone())
        .unwrap()
        .constant("secret", value(123))
        .unwrap()
        .after(
            "add",
            Spec::with_deps(["$on"], move |args: Args| {
                let on = args.get::<On>(0)?;
                let h = Rc::clone(&h1);
                on.call(
                    "exit",
                    Spec::with_deps(["secret"], move |args: Args| {
                        h.borrow_mut()
                            .push(format!("exit{}", args.get::<i32>(0)?));
                        Ok::<_, Error>(())
                    }),
                )?;
                Err::<(), _>(Error::fail("hook failed"))
            }),
        )
        .unwrap()
        .schedule(Spec::with_deps(["add"], move |args: Args| {
            h2.borrow_mut().push("schedule".to_string());
            assert_eq!(args.get::<Add>(0)?(2, 3), 5);
            Ok::<_, Error>(())
        }))
        .unwrap();

    let result = module.initiate().await;
    assert_eq!(result, Err(Error::fail("hook failed")));
    assert_eq!(history.borrow().join(", "), "exit123");
}

#[tokio::test]
async fn terminate_is_idempotent() {
    let exits = Rc::new(RefCell::new(Vec::new()));
    let e = Rc::clone(&exits);
    let module = Module::new()
        .schedule(Spec::with_deps(["$on", "$terminate"], move |args: Args| {
            let on = args.get::<On>(0)?;
            let terminate = args.get::<Terminate>(1)?;
            let e = Rc::clone(&e);
            on.call(
                "exit",
                Spec::bare(move |args: Args| {
                    e.borrow_mut().push(args.len());
                }),
            )?;
            terminate.call(vec![value("first")])?;
            terminate.call(vec![value("second"), value("extra")])
        }))
        .unwrap();

    let instance = module.instantiate();
    instance.run().await.unwrap();
    assert_eq!(*exits.borrow(), vec![1]);
    assert_eq!(instance.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn unit_factory_is_rejected() {
    let caught = Rc::new(RefCell::new(None));
    let c = Rc::clone(&caught);
    let module = Module::new()
        .factory("nothing", Spec::bare(|_| unit()))
        .unwrap()
        .schedule(Spec::with_deps(["$invoke"], move |args: Args| {
            let invoke = args.get::<Invoke>(0)?;
            let outcome = invoke.call(&Spec::with_deps(["nothing"], |_| ()));
            *c.borrow_mut() = outcome.err();
            Ok::<_, Error>(())
        }))
        .unwrap();

    module.initiate().await.unwrap();
    assert_eq!(
        *caught.borrow(),
        Some(Error::UndefinedConstructionResult {
            identity: "nothing".into()
        })
    );
}

#[tokio::test]
async fn missing_identity_fails_the_run() {
    let module = Module::new()
        .schedule(Spec::with_deps(["ghost"], |_| ()))
        .unwrap();
    assert_eq!(
        module.initiate().await,
        Err(Error::MissingIdentity {
            identity: "ghost".into()
        })
    );
}

#[tokio::test]
async fn factories_run_once_per_instance() {
    let calls = Rc::new(Cell::new(0));
    let c = Rc::clone(&calls);
    let module = Module::new()
        .factory(
            "db",
            Spec::bare(move |_| {
                c.set(c.get() + 1);
                later(async { Ok("conn") })
            }),
        )
        .unwrap()
        .schedule(Spec::with_deps(["db"], |_| ()))
        .unwrap()
        .schedule(Spec::with_deps(["db", "db"], |_| ()))
        .unwrap();

    module.initiate().await.unwrap();
    assert_eq!(calls.get(), 1);
    module.initiate().await.unwrap();
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn construct_builds_fresh_values() {
    let calls = Rc::new(Cell::new(0));
    let c = Rc::clone(&calls);
    let module = Module::new()
        .factory(
            "n",
            Spec::bare(move |_| {
                c.set(c.get() + 1);
                value(c.get())
            }),
        )
        .unwrap();
    let instance = module.instantiate();
    let shared = instance.get("n").unwrap().resolve_as::<i32>().await.unwrap();
    let fresh = instance
        .construct("n")
        .unwrap()
        .resolve_as::<i32>()
        .await
        .unwrap();
    let again = instance.get("n").unwrap().resolve_as::<i32>().await.unwrap();
    assert_eq!((*shared, *fresh, *again), (1, 2, 1));
}

#[test]
fn reserved_identities_are_rejected() {
    let err = Module::new()
        .factory("$get", Spec::bare(|_| value(1)))
        .unwrap_err();
    assert_eq!(err.as_label(), "invalid_factory");
    assert!(Module::new().constant("$isRunning", value(1)).is_err());
    assert!(Module::new().factory("get", Spec::bare(|_| value(1))).is_ok());
}

#[test]
fn hooks_on_reserved_identities_are_rejected() {
    let module = Module::new();
    let err = module.before("$get", Spec::bare(|_| ())).unwrap_err();
    assert_eq!(err.as_label(), "invalid_factory");
    assert!(module.after("$logger", Spec::bare(|_| ())).is_err());
    assert!(!module.has("$get"));
    assert!(module.before("get", Spec::bare(|_| ())).unwrap().has("get"));
}

#[test]
fn immutable_modules_are_untouched() {
    let base = Module::new();
    let derived = base.constant("a", value(1)).unwrap();
    assert!(!base.has("a"));
    assert!(derived.has("a"));
    assert!(derived.is_immutable());

    let deleted = derived.delete("a").unwrap();
    assert!(derived.has("a"));
    assert!(!deleted.has("a"));
}

#[test]
fn mutable_modules_change_in_place() {
    let module = Module::new().as_mutable();
    let same = module.constant("a", value(1)).unwrap();
    assert!(module.has("a"));
    assert!(same.has("a"));
    module.schedule(Spec::bare(|_| ())).unwrap();
    assert_eq!(module.template().schedule().len(), 1);

    let frozen = module.as_immutable();
    module.constant("b", value(2)).unwrap();
    assert!(!frozen.has("b"));
}

#[test]
fn extending_self_while_mutable() {
    let module = Module::new()
        .as_mutable()
        .constant("a", value(1))
        .unwrap();
    let merged = module.extends(&module).unwrap();
    assert!(merged.has("a"));
}

#[test]
fn factory_clears_constant() {
    let module = Module::new()
        .constant("a", value(1))
        .unwrap()
        .factory("a", Spec::bare(|_| value(2)))
        .unwrap();
    let template = module.template();
    let descriptor = template.descriptor(&"a".into()).unwrap();
    assert!(descriptor.value.is_none());
    assert!(descriptor.factory.is_some());
}

#[test]
fn extends_dyn_rejects_non_modules() {
    let module = Module::new();
    let err = module.extends_dyn(&42u8).unwrap_err();
    assert_eq!(err, Error::InvalidModule { got: "u8" });
    assert!(module.extends_dyn(&Module::new()).is_ok());
}

#[tokio::test]
async fn initiate_snapshots_mutable_modules() {
    let runs = Rc::new(Cell::new(0));
    let (r1, r2) = (Rc::clone(&runs), Rc::clone(&runs));
    let module = Module::new().as_mutable();
    module
        .schedule(Spec::bare(move |_| r1.set(r1.get() + 1)))
        .unwrap();
    let run = module.initiate();
    module
        .schedule(Spec::bare(move |_| r2.set(r2.get() + 10)))
        .unwrap();
    run.await.unwrap();
    assert_eq!(runs.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn exit_work_gets_the_grace_budget() {
    let flushed = Rc::new(Cell::new(false));
    let f = Rc::clone(&flushed);
    let module = Module::new()
        .schedule(Spec::with_deps(["$on"], move |args: Args| {
            let f = Rc::clone(&f);
            args.get::<On>(0)?.call(
                "exit",
                Spec::bare(move |_| {
                    let f = Rc::clone(&f);
                    later(async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        f.set(true);
                        Ok(())
                    })
                }),
            )?;
            Ok::<_, Error>(())
        }))
        .unwrap();
    let config = Config {
        grace: Duration::from_secs(1),
        ..Config::default()
    };
    module.initiate_with(config).await.unwrap();
    assert!(flushed.get());
}

#[tokio::test(start_paused = true)]
async fn failing_before_hook_lets_siblings_finish() {
    let finished = Rc::new(Cell::new(false));
    let f = Rc::clone(&finished);
    let module = Module::new()
        .constant("x", value(1))
        .unwrap()
        .before(
            "x",
            Spec::bare(move |_| {
                let f = Rc::clone(&f);
                later(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    f.set(true);
                    Ok(())
                })
            }),
        )
        .unwrap()
        .before("x", Spec::bare(|_| Err::<(), _>(Error::fail("fast"))))
        .unwrap()
        .schedule(Spec::with_deps(["x"], |_| ()))
        .unwrap();
    assert_eq!(module.initiate().await, Err(Error::fail("fast")));
    assert!(finished.get());
}

#[tokio::test]
async fn dependency_cycle_fails_the_run() {
    let module = Module::new()
        .factory("a", Spec::with_deps(["b"], |_| value(1)))
        .unwrap()
        .factory("b", Spec::with_deps(["a"], |_| value(2)))
        .unwrap()
        .schedule(Spec::with_deps(["a"], |_| ()))
        .unwrap();
    let err = module.initiate().await.unwrap_err();
    assert_eq!(err.as_label(), "dependency_cycle");
}
