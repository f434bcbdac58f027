//! # sovran-anystore
//!
//! A thread-safe heterogeneous keyed store with change observers.
//!
//! `sovran-anystore` stores values of different types under keys of a single
//! type, hands them back through a runtime-checked type assertion, and tells
//! interested parties whenever something changes. Observers are notified
//! either inline with the mutation or on a background thread.
//!
//! ## Key Features
//!
//! - **Type-safe**: Reads name the type they expect and fail cleanly on a mismatch
//! - **Thread-safe**: Every operation is serialized by one reentrant lock
//! - **Observable**: Sync observers run inline, async observers on their own thread
//! - **Reentrant**: Observer callbacks may read and write the store they observe
//! - **Detach barrier**: Once `detach` returns, the observer is never called again
//!
//! ## Usage Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use sovran_anystore::{AnyStore, StoreError};
//!
//! fn main() -> Result<(), StoreError> {
//!     let store = AnyStore::<i32>::new();
//!
//!     // Store values of different types
//!     store.insert_or_assign(1, "foo".to_string())?;
//!     store.insert_or_assign(2, 3.5f64)?;
//!
//!     // Retrieve values in a type-safe way
//!     assert_eq!(store.get_as::<String>(&1)?, "foo");
//!     assert_eq!(store.get_as::<f64>(&2)?, 3.5);
//!
//!     // Handle errors properly
//!     match store.get_as::<i32>(&1) {
//!         Ok(value) => println!("Value: {}", value),
//!         Err(StoreError::KeyNotFound(key)) => println!("Key ({}) doesn't exist", key),
//!         Err(StoreError::TypeMismatch { expected, found }) => {
//!             println!("Asked for {} but the store holds {}", expected, found)
//!         }
//!         Err(e) => println!("Other error: {}", e),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Transforming on Write and Read
//!
//! ```rust
//! use sovran_anystore::{AnyStore, StoreError};
//!
//! #[derive(Clone)]
//! struct FullName {
//!     first_name: String,
//!     last_name: String,
//! }
//!
//! fn main() -> Result<(), StoreError> {
//!     let store = AnyStore::<i32>::new();
//!
//!     // The operation runs first; only its result is stored
//!     store.insert_or_assign_with(3, 123, |n: i32| n.to_string())?;
//!     assert_eq!(store.get_as::<String>(&3)?, "123");
//!
//!     // Reading through an operation leaves the stored value alone
//!     let dotted = store.get_and_apply(&3, |s: &String| format!("{}.", s))?;
//!     assert_eq!(dotted, "123.");
//!     assert_eq!(store.get_as::<String>(&3)?, "123");
//!
//!     store.insert_or_assign(
//!         2,
//!         FullName {
//!             first_name: "John".to_string(),
//!             last_name: "Silver".to_string(),
//!         },
//!     )?;
//!     let last = store.get_and_apply(&2, |name: &FullName| name.last_name.clone())?;
//!     assert_eq!(last, "Silver");
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Observing Changes
//!
//! ```rust
//! use sovran_anystore::{AnyStore, StoreError, StoreObserver};
//! use std::sync::mpsc;
//! use std::sync::{Arc, Mutex};
//!
//! struct Forwarder(Mutex<mpsc::Sender<String>>);
//!
//! impl StoreObserver<String> for Forwarder {
//!     fn on_value_changed(&self, key: &String) {
//!         let _ = self.0.lock().unwrap().send(key.clone());
//!     }
//! }
//!
//! fn main() -> Result<(), StoreError> {
//!     let store = AnyStore::<String>::new();
//!
//!     let (tx, rx) = mpsc::channel();
//!     let background = Arc::new(Forwarder(Mutex::new(tx)));
//!     store.attach_async(background.clone());
//!
//!     let inline = Arc::new(|key: &String| println!("{} changed", key));
//!     store.attach_sync(inline.clone());
//!
//!     store.insert_or_assign("a".to_string(), 1)?;
//!     assert_eq!(rx.recv().unwrap(), "a");
//!
//!     // Waits for any delivery still in flight
//!     store.detach(&background)?;
//!     store.detach(&inline)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Sharing a Store Between Threads
//!
//! ```rust
//! use sovran_anystore::AnyStore;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let store = Arc::new(AnyStore::<i32>::new());
//!
//! let handles: Vec<_> = (0..5)
//!     .map(|ix| {
//!         let store = Arc::clone(&store);
//!         thread::spawn(move || store.insert_or_assign(1, ix).unwrap())
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! let last = store.get_as::<i32>(&1).unwrap();
//! assert!((0..5).contains(&last));
//! ```

mod any_value;
mod config;
mod error;
mod observer;
mod store;
mod type_tag;

pub use any_value::AnyValue;
pub use config::{StoreConfig, DEFAULT_THREAD_NAME};
pub use error::StoreError;
pub use observer::StoreObserver;
pub use store::AnyStore;
pub use type_tag::TypeTag;
