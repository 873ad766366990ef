//! File processors: per-extension operations for the file monitor.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use taskmill_core::OperationFuture;

/// Processes files of one extension on behalf of a file monitor.
///
/// Implementations run on pool workers and must honor the cancellation
/// token cooperatively.
pub trait FileProcessor: Send + Sync + 'static {
    /// File extension this processor handles, without the leading dot.
    fn extension(&self) -> &str;

    /// Job-type tag stamped on items this processor produces.
    fn job_type(&self) -> &str;

    /// Process one file.
    fn process(&self, path: PathBuf, token: CancellationToken) -> OperationFuture;
}

/// Registry mapping file extensions to processors.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn FileProcessor>>,
}

impl ProcessorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Register a processor under its extension (case-insensitive).
    pub fn register<P: FileProcessor>(&mut self, processor: P) {
        let extension = processor.extension().to_ascii_lowercase();
        self.processors.insert(extension, Arc::new(processor));
    }

    /// Get the processor for an extension.
    pub fn get(&self, extension: &str) -> Option<Arc<dyn FileProcessor>> {
        self.processors
            .get(&extension.to_ascii_lowercase())
            .cloned()
    }

    /// Check whether an extension has a processor.
    pub fn supports(&self, extension: &str) -> bool {
        self.processors
            .contains_key(&extension.to_ascii_lowercase())
    }

    /// List registered extensions.
    pub fn extensions(&self) -> Vec<&str> {
        self.processors.keys().map(|s| s.as_str()).collect()
    }
}
