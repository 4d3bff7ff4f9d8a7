//! Alarm playback. A dedicated thread owns the rodio output objects
//! (they are not `Send`) and executes ring commands sent over a channel.
//! A ring plays the decoded sound a fixed number of times, each
//! repetition started only after the previous one finishes.

use std::io::Cursor;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{error, info};
use rodio::{Decoder, OutputStream, Sink};
use tokio::sync::oneshot;

/// Seam between the alert dispatcher and actual audio output, so the
/// ring-cycle logic can be exercised without an audio device.
#[async_trait]
pub trait RingtonePlayer: Send + Sync {
    /// Play `data` up to `times` repetitions and return how many actually
    /// completed (fewer if interrupted).
    async fn ring(&self, data: Vec<u8>, times: u32) -> Result<u32>;
}

enum AlarmCommand {
    Ring {
        data: Vec<u8>,
        times: u32,
        done: oneshot::Sender<Result<u32, String>>,
    },
    SetVolume(f32),
}

pub struct AlarmHandle {
    tx: Arc<Mutex<Option<Sender<AlarmCommand>>>>,
    interrupted: Arc<AtomicBool>,
}

impl AlarmHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AlarmCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| anyhow!("alarm handle poisoned: {e}"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AlarmCommand>();
        let interrupted = Arc::clone(&self.interrupted);

        thread::Builder::new()
            .name("alarm-playback".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;
                let mut volume: f32 = 1.0;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AlarmCommand::Ring { data, times, done } => {
                            interrupted.store(false, Ordering::SeqCst);

                            if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                let _ = done.send(Err(err));
                                continue;
                            }
                            let Some(ref s) = sink else {
                                let _ = done.send(Err("audio sink unavailable".to_string()));
                                continue;
                            };
                            s.set_volume(volume);

                            let mut played = 0u32;
                            let mut failure: Option<String> = None;
                            while played < times {
                                if interrupted.load(Ordering::SeqCst) {
                                    s.stop();
                                    break;
                                }
                                match Decoder::new(Cursor::new(data.clone())) {
                                    Ok(source) => {
                                        s.append(source);
                                        // Natural completion drives the chain.
                                        s.sleep_until_end();
                                        played += 1;
                                        info!("alarm repetition {played}/{times} finished");
                                    }
                                    Err(err) => {
                                        failure = Some(format!("undecodable sound data: {err}"));
                                        break;
                                    }
                                }
                            }

                            let _ = match failure {
                                Some(err) => done.send(Err(err)),
                                None => done.send(Ok(played)),
                            };
                        }
                        AlarmCommand::SetVolume(v) => {
                            volume = v.clamp(0.0, 1.0);
                            if let Some(ref s) = sink {
                                s.set_volume(volume);
                            }
                        }
                    }
                }
            })
            .map_err(|e| anyhow!("failed to spawn alarm thread: {e}"))?;

        let tx_clone = tx.clone();
        *guard = Some(tx);
        Ok(tx_clone)
    }

    /// Interrupt the ring in progress; repetitions stop at the next
    /// boundary.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(AlarmCommand::SetVolume(volume))
            .map_err(|e| anyhow!("alarm thread gone: {e}"))
    }
}

impl Default for AlarmHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RingtonePlayer for AlarmHandle {
    async fn ring(&self, data: Vec<u8>, times: u32) -> Result<u32> {
        let tx = self.ensure_thread()?;
        let (done_tx, done_rx) = oneshot::channel();
        tx.send(AlarmCommand::Ring {
            data,
            times,
            done: done_tx,
        })
        .map_err(|e| anyhow!("alarm thread gone: {e}"))?;

        match done_rx.await {
            Ok(Ok(played)) => Ok(played),
            Ok(Err(err)) => {
                error!("alarm playback failed: {err}");
                Err(anyhow!(err))
            }
            Err(_) => Err(anyhow!("alarm thread dropped the ring")),
        }
    }
}
