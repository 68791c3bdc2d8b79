//! Microphone capture feeding a LiveKit audio source.

use std::sync::mpsc as std_mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::prelude::AudioFrame;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::TransportError;

pub(crate) const SAMPLE_RATE: u32 = 48000;
pub(crate) const NUM_CHANNELS: u32 = 1;

/// Live capture of the default input device. Dropping it stops the cpal
/// stream and releases the device.
pub(crate) struct MicrophoneCapture {
    // Closing this channel ends the capture thread.
    _stop_tx: std_mpsc::Sender<()>,
    forward: JoinHandle<()>,
}

impl MicrophoneCapture {
    pub(crate) async fn start(source: NativeAudioSource) -> Result<Self, TransportError> {
        let (frame_tx, mut frame_rx) = mpsc::channel::<AudioFrame<'static>>(10);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

        // cpal streams are not Send; the stream lives and dies on this thread.
        std::thread::spawn(move || {
            let stream = match open_input_stream(frame_tx) {
                Ok(stream) => stream,
                Err(reason) => {
                    let _ = ready_tx.send(Err(reason));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            let _ = stop_rx.recv();
            drop(stream);
            info!("Microphone capture stopped");
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(TransportError::Other(reason)),
            Err(_) => {
                return Err(TransportError::Other(
                    "microphone capture thread exited".to_string(),
                ))
            }
        }

        let forward = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Err(err) = source.capture_frame(&frame).await {
                    warn!("Failed to capture microphone frame: {}", err);
                }
            }
        });

        info!("Microphone capture started");
        Ok(MicrophoneCapture {
            _stop_tx: stop_tx,
            forward,
        })
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.forward.abort();
    }
}

fn open_input_stream(frame_tx: mpsc::Sender<AudioFrame<'static>>) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "no default input device".to_string())?;
    let mut config: StreamConfig = device
        .default_input_config()
        .map_err(|err| err.to_string())?
        .into();

    config.channels = NUM_CHANNELS as u16;
    config.sample_rate = SampleRate(SAMPLE_RATE);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _| {
                // Normalized [-1.0, 1.0] floats to i16 PCM.
                let pcm_samples: Vec<i16> = data
                    .iter()
                    .map(|&sample| (sample * i16::MAX as f32) as i16)
                    .collect();
                let samples_per_channel = (pcm_samples.len() / NUM_CHANNELS as usize) as u32;

                let frame = AudioFrame {
                    data: pcm_samples.into(),
                    num_channels: NUM_CHANNELS,
                    sample_rate: SAMPLE_RATE,
                    samples_per_channel,
                };
                if frame_tx.try_send(frame).is_err() {
                    debug!("Dropping microphone frame, forwarder is behind");
                }
            },
            move |err| {
                error!("Microphone stream error: {}", err);
            },
            None,
        )
        .map_err(|err| err.to_string())?;

    stream.play().map_err(|err| err.to_string())?;
    Ok(stream)
}
