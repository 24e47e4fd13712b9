//! # Example: Basic Module Lifecycle
//!
//! Demonstrates:
//! - composing a service out of two modules (`storage` extends into `app`);
//! - an asynchronous factory with a `before` hook and an `after` hook;
//! - scheduled entry points resolving dependencies through the root scope;
//! - an `exit` subscriber that releases the connection on termination;
//! - OS signals: Ctrl-C during the run terminates the instance early.
//!
//! ## Flow
//! ```text
//! schedule(report) ─► get("db") ─► before: "connecting"
//!                                 ├─ factory: sleep 50ms ─► Db
//!                                 └─ after: "connected" + on("exit", close)
//! report ─► db.query() ─► terminate()
//! exit   ─► close(db)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use taskscope::{Args, Config, Error, Logger, Module, On, Spec, Terminate, later, value};

struct Db {
    url: String,
    queries: Cell<u32>,
}

impl Db {
    fn query(&self, sql: &str) -> String {
        self.queries.set(self.queries.get() + 1);
        format!("{} rows from `{sql}`", self.queries.get())
    }
}

fn storage() -> Result<Module, Error> {
    Module::new()
        .constant("db.url", value("postgres://localhost/demo".to_string()))?
        .factory(
            "db",
            Spec::with_deps(["db.url"], |args: Args| {
                let url = args.get::<String>(0)?;
                Ok::<_, Error>(later(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Db {
                        url: url.to_string(),
                        queries: Cell::new(0),
                    })
                }))
            }),
        )?
        .before(
            "db",
            Spec::with_deps(["$logger"], |args: Args| {
                args.get::<Logger>(0)?.info("connecting");
                Ok::<_, Error>(())
            }),
        )?
        .after(
            "db",
            Spec::with_deps(["db", "$logger", "$on"], |args: Args| {
                let db = args.get::<Db>(0)?;
                let logger = args.get::<Logger>(1)?;
                logger.info(format!("connected to {}", db.url));
                args.get::<On>(2)?.call(
                    "exit",
                    Spec::with_deps(["db", "$logger"], |args: Args| {
                        let db = args.get::<Db>(0)?;
                        args.get::<Logger>(1)?
                            .info(format!("closing after {} queries", db.queries.get()));
                        Ok::<_, Error>(())
                    }),
                )?;
                Ok::<_, Error>(())
            }),
        )
}

fn app(storage: &Module) -> Result<Module, Error> {
    Module::new().extends(storage)?.schedule(Spec::with_deps(
        ["db", "$logger", "$terminate"],
        |args: Args| {
            let db = args.get::<Db>(0)?;
            let logger = args.get::<Logger>(1)?;
            logger.info(db.query("select * from users"));
            logger.info(db.query("select * from orders"));
            args.get::<Terminate>(2)?.call(vec![value(Rc::clone(&db))])
        },
    ))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let module = app(&storage()?)?;

    let config = Config {
        budget: Duration::from_secs(5),
        handle_signals: true,
        ..Config::default()
    };
    let instance = module.instantiate_with(config);
    instance.run().await?;

    for record in instance.logger().recent_logs() {
        println!("[{}] {}", record.level.as_str(), record.message);
    }
    println!("state: {:?}", instance.state());
    Ok(())
}
