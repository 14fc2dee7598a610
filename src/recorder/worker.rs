//! Worker-loop batching
//!
//! A queue worker runs many jobs without restarting. Recording starts when
//! a job from an asynchronous connection begins, and the queues are flushed
//! only once every job in flight has finished.

use super::Recorder;

/// Connection name of jobs run inline by the dispatching unit of work
pub const SYNC_CONNECTION: &str = "sync";

pub struct WorkerSession {
    recorder: Recorder,
    processing: usize,
}

impl WorkerSession {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            processing: 0,
        }
    }

    pub async fn job_processing(&mut self, connection: &str) {
        if connection == SYNC_CONNECTION {
            return;
        }

        self.recorder.start_recording().await;
        self.processing += 1;
    }

    pub async fn job_processed(&mut self, connection: &str) {
        self.processing = self.processing.saturating_sub(1);

        if self.processing == 0 && connection != SYNC_CONNECTION {
            self.recorder.flush().await;
            self.recorder.stop_recording();
        }
    }

    /// Jobs currently in flight
    pub fn depth(&self) -> usize {
        self.processing
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }
}
