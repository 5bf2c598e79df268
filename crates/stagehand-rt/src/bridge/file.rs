// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Whole-file reads on a background thread.

use std::fs;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use super::{Bridge, BridgeError, Completer};
use crate::cancel::CancelToken;
use crate::stage::Stage;
use crate::task::TaskId;

struct ReadJob {
    path: PathBuf,
    completer: Completer<Vec<u8>>,
}

/// Reads files off the scheduler thread. Results come back through a
/// `Bridge`, so a pump must be running (see [`FileLoader::run_on`]).
pub struct FileLoader {
    bridge: Bridge<Vec<u8>>,
    jobs: Option<Sender<ReadJob>>,
    worker: Option<JoinHandle<()>>,
}

impl FileLoader {
    pub fn new() -> io::Result<Self> {
        let (jobs, queue) = mpsc::channel::<ReadJob>();
        let worker = thread::Builder::new()
            .name("stagehand-file-io".to_string())
            .spawn(move || {
                for job in queue {
                    let result = fs::read(&job.path)
                        .map_err(|err| format!("{}: {}", job.path.display(), err));
                    job.completer.complete(result);
                }
            })?;
        Ok(Self {
            bridge: Bridge::new("file"),
            jobs: Some(jobs),
            worker: Some(worker),
        })
    }

    pub fn bridge(&self) -> &Bridge<Vec<u8>> {
        &self.bridge
    }

    /// Start the completion pump on `stage`.
    #[track_caller]
    pub fn run_on(&self, stage: Rc<Stage>, stop: CancelToken) -> TaskId {
        self.bridge.run_on(stage, stop)
    }

    /// Read the whole file at `path`.
    #[track_caller]
    pub fn read(
        &self,
        path: impl Into<PathBuf>,
    ) -> impl Future<Output = Result<Vec<u8>, BridgeError>> + '_ {
        let path = path.into();
        let jobs = self.jobs.clone();
        self.bridge.request(move |completer| {
            let Some(jobs) = jobs else {
                return Err("file worker is gone".to_string());
            };
            jobs.send(ReadJob { path, completer })
                .map_err(|_| "file worker is gone".to_string())
        })
    }
}

impl Drop for FileLoader {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("file worker panicked");
            }
        }
    }
}
