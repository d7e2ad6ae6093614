//! Mock downloader for testing.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::downloader::{fail_without_metadata, Downloader, ProgressSink};
use crate::task::{Source, Task};

/// Mock implementation of [`Downloader`].
///
/// Honors the metadata precondition like the real downloaders, then walks
/// the task through `Downloading` to `Completed`, or to `Failed` when a
/// failure is configured.
#[derive(Debug)]
pub struct MockDownloader {
    source: Source,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    tasks: Mutex<Vec<String>>,
}

impl MockDownloader {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Fail every download with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Succeed again after `fail_with`.
    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Sleep while `Downloading`, to observe in-flight state.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Ids of the tasks that reached this downloader.
    pub fn recorded_tasks(&self) -> Vec<String> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    fn source(&self) -> Source {
        self.source
    }

    async fn download(&self, task: &mut Task, progress: &dyn ProgressSink) -> bool {
        self.tasks.lock().unwrap().push(task.id.clone());

        if fail_without_metadata(task) {
            progress.publish(task);
            return false;
        }

        let _ = task.start(0.0);
        progress.publish(task);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let _ = task.report_progress(50.0);
        progress.publish(task);

        let failure = self.failure.lock().unwrap().clone();
        let succeeded = match failure {
            Some(message) => {
                let _ = task.fail(message);
                false
            }
            None => {
                let _ = task.complete();
                true
            }
        };
        progress.publish(task);
        succeeded
    }
}
