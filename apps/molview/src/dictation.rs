use std::sync::Arc;

use anyhow::Context;
use engine_integration::{
    CaptureConfig, CaptureHandle, CaptureSession, SpeechCapability, SpeechEvent,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin},
    runtime::Handle,
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, warn};

/// Speech capture for a terminal: each capture takes the next line read
/// from `R` as the utterance. End of input is reported as "no-speech".
pub struct LineDictation<R> {
    lines: Arc<Mutex<Lines<R>>>,
}

impl LineDictation<BufReader<Stdin>> {
    pub fn from_stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> LineDictation<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: Arc::new(Mutex::new(reader.lines())),
        }
    }
}

struct DictationHandle {
    task: JoinHandle<()>,
}

impl CaptureHandle for DictationHandle {
    fn stop(&mut self) {
        self.task.abort();
    }
}

impl<R> SpeechCapability for LineDictation<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn is_available(&self) -> bool {
        true
    }

    fn start(&self, config: &CaptureConfig) -> anyhow::Result<CaptureSession> {
        let runtime = Handle::try_current().context("dictation needs a running tokio runtime")?;
        let (tx, rx) = mpsc::unbounded_channel();
        let lines = Arc::clone(&self.lines);
        debug!(lang = %config.lang, "waiting for dictated line");

        let task = runtime.spawn(async move {
            let event = match lines.lock().await.next_line().await {
                Ok(Some(line)) => SpeechEvent::Result {
                    transcript: line.trim().to_string(),
                },
                Ok(None) => SpeechEvent::Error {
                    code: "no-speech".into(),
                },
                Err(err) => {
                    warn!("failed to read dictated line: {err}");
                    SpeechEvent::Error {
                        code: "audio-capture".into(),
                    }
                }
            };
            let _ = tx.send(event);
        });

        Ok(CaptureSession {
            events: rx,
            handle: Box::new(DictationHandle { task }),
        })
    }
}
