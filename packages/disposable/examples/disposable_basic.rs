//! Example demonstrating observable, race-free teardown of a shared object.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use disposable::{Disposable, Error, Lifecycle, Phase};
use multicast::{ContextRef, Handler, ThreadContext};

/// A pretend database connection pool shared between threads.
#[derive(Debug)]
struct ConnectionPool {
    lifecycle: Lifecycle<Self>,
    name: &'static str,
    socket_open: AtomicBool,
}

impl ConnectionPool {
    fn new(name: &'static str) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            name,
            socket_open: AtomicBool::new(true),
        }
    }

    fn query(&self, sql: &str) -> Result<usize, Error> {
        self.guard_live()?;
        println!("[{}] executing: {sql}", self.name);
        Ok(sql.len())
    }
}

impl Disposable for ConnectionPool {
    fn lifecycle(&self) -> &Lifecycle<Self> {
        &self.lifecycle
    }

    fn release_managed(&self) {
        println!("[{}] returning pooled connections", self.name);
    }

    fn release_unmanaged(&self) {
        if self.socket_open.swap(false, Ordering::AcqRel) {
            println!("[{}] closing socket", self.name);
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.lifecycle.finalize(self);
    }
}

fn report(pool: &ConnectionPool, phase: &Phase) {
    println!(
        "[{}] {phase:?} (observed on thread '{}')",
        pool.name,
        thread::current().name().unwrap_or("<unnamed>")
    );
}

fn main() {
    println!("=== Explicit teardown from several threads ===");
    let pool = Arc::new(ConnectionPool::new("orders"));

    let monitor: ContextRef = Arc::new(ThreadContext::builder().name("monitor").build());
    pool.lifecycle()
        .tearing_down()
        .add_on(&Handler::function(report), &monitor)
        .unwrap();
    pool.lifecycle()
        .dead()
        .add_on(&Handler::function(report), &monitor)
        .unwrap();

    pool.query("SELECT 1").unwrap();

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.dispose())
        })
        .collect();

    for thread in threads {
        thread.join().unwrap();
    }

    match pool.query("SELECT 1") {
        Ok(_) => println!("unexpected: query succeeded after teardown"),
        Err(error) => println!("query rejected: {error}"),
    }

    println!("\n=== Dropped without explicit teardown ===");
    let scratch = ConnectionPool::new("scratch");
    scratch.query("SELECT 2").unwrap();
    drop(scratch);
}
