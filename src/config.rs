/// Default name given to asynchronous delivery threads
pub const DEFAULT_THREAD_NAME: &str = "anystore-notify";

/// Construction-time settings of an `AnyStore`.
///
/// # Examples
///
/// ```
/// use sovran_anystore::{AnyStore, StoreConfig};
///
/// let config = StoreConfig::default()
///     .thread_name("settings-notify")
///     .stack_size(256 * 1024);
/// let store = AnyStore::<String>::with_config(config);
/// assert_eq!(store.config().thread_name, "settings-notify");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name of the threads that run asynchronous deliveries
    pub thread_name: String,
    /// Stack size of delivery threads; the platform default when `None`
    pub stack_size: Option<usize>,
}

impl StoreConfig {
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}
