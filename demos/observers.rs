//! Attaches sync and async observers to a store, first from one thread and
//! then from five threads sharing the same store.
//!
//! Run with: RUST_LOG=sovran_anystore=trace cargo run --example observers

use sovran_anystore::{AnyStore, StoreError, StoreObserver};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct PrintingObserver;

impl StoreObserver<String> for PrintingObserver {
    fn on_value_changed(&self, key: &String) {
        println!("sync notification for key: {}", key);
    }
}

struct SlowObserver;

impl StoreObserver<String> for SlowObserver {
    fn on_value_changed(&self, key: &String) {
        println!("start async notification for key: {}", key);
        thread::sleep(Duration::from_millis(500));
        println!("stop async notification for key: {}", key);
    }
}

struct ThreadObserver {
    thread_ix: i32,
    store: Weak<AnyStore<i32>>,
    slow: bool,
}

impl StoreObserver<i32> for ThreadObserver {
    fn on_value_changed(&self, key: &i32) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let value = store.get_as::<i32>(key);
        if self.slow {
            println!(
                "thread#{}: start async notification for key: {}, value={:?}",
                self.thread_ix, key, value
            );
            thread::sleep(Duration::from_millis(200));
            println!("thread#{}: stop async notification for key: {}", self.thread_ix, key);
        } else {
            println!(
                "thread#{}: sync notification for key: {}, value={:?}",
                self.thread_ix, key, value
            );
        }
    }
}

fn single_thread() -> Result<(), StoreError> {
    let store = AnyStore::<String>::new();

    let observer_sync = Arc::new(PrintingObserver);
    let observer_async = Arc::new(SlowObserver);
    store.attach_sync(observer_sync.clone());
    store.attach_async(observer_async.clone());

    store.insert_or_assign("a".to_string(), 1)?;
    store.insert_or_assign("a".to_string(), 2)?;
    store.insert_or_assign("b".to_string(), 3)?;
    store.insert_or_assign("c".to_string(), 4)?;

    store.detach(&observer_sync)?;
    println!("waiting for async deliveries...");
    store.detach(&observer_async)?;
    println!("all deliveries finished");
    Ok(())
}

fn shared_between_threads() -> Result<(), StoreError> {
    let store = Arc::new(AnyStore::<i32>::new());

    let handles: Vec<_> = (0..5)
        .map(|thread_ix| {
            let store = Arc::clone(&store);
            thread::spawn(move || -> Result<(), StoreError> {
                println!("start thread #{}", thread_ix);

                let observer_sync = Arc::new(ThreadObserver {
                    thread_ix,
                    store: Arc::downgrade(&store),
                    slow: false,
                });
                let observer_async = Arc::new(ThreadObserver {
                    thread_ix,
                    store: Arc::downgrade(&store),
                    slow: true,
                });
                store.attach_sync(observer_sync.clone());
                store.attach_async(observer_async.clone());

                store.insert_or_assign(1, thread_ix)?;
                println!("thread#{}: value={}", thread_ix, store.get_as::<i32>(&1)?);

                store.detach(&observer_sync)?;
                store.detach(&observer_async)?;

                println!("stop thread #{}", thread_ix);
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => tracing::error!("worker thread panicked"),
        }
    }

    println!("final value={}", store.get_as::<i32>(&1)?);
    Ok(())
}

fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    single_thread()?;
    shared_between_threads()?;
    Ok(())
}
