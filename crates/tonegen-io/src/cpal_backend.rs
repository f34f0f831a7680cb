//! cpal-based output backend.
//!
//! [`CpalBackend`] adapts [cpal](https://crates.io/crates/cpal)'s pull-style
//! output streams to the push-style [`OutputSink`] contract. Each sink owns a
//! device-side [`RingBuffer`] two blocks long: [`OutputSink::push`] writes
//! into it and the cpal data callback drains it, rendering silence whenever
//! it runs dry.
//!
//! cpal has no default-device notification, so
//! [`subscribe_default_changed`](OutputBackend::subscribe_default_changed)
//! starts a watcher thread that polls the default output device name.

use crate::backend::{
    DefaultChangedCallback, Endpoint, NotificationHandle, OutputBackend, OutputSink, SinkConfig,
};
use crate::signal::ShutdownSignal;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Host, HostId, SampleFormat, SizedSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tonegen_core::RingBuffer;
use tonegen_core::format::BYTES_PER_SAMPLE;

fn device_name(device: &cpal::Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// cpal output backend on the platform's default host.
///
/// Endpoints are identified by device name, which is also what cpal uses to
/// tell devices apart across enumerations.
pub struct CpalBackend {
    host: Host,
    default_poll: Duration,
}

impl CpalBackend {
    /// Backend on the default host, polling the default device every 500 ms.
    pub fn new() -> Self {
        Self::with_default_poll(Duration::from_millis(500))
    }

    /// Backend on the default host with a custom default-device poll interval.
    pub fn with_default_poll(default_poll: Duration) -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self { host, default_poll }
    }

    fn find_device(&self, endpoint: &Endpoint) -> Result<cpal::Device> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| Error::Backend(e.to_string()))?;
        for device in devices {
            if device_name(&device).is_ok_and(|name| name == endpoint.id.as_str()) {
                return Ok(device);
            }
        }
        Err(Error::DeviceUnavailable(format!(
            "'{}' is no longer present",
            endpoint.name
        )))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn output_endpoints(&self) -> Result<Vec<Endpoint>> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| Error::Backend(e.to_string()))?;
        Ok(devices
            .filter_map(|device| device_name(&device).ok())
            .map(|name| Endpoint::new(name.clone(), name))
            .collect())
    }

    fn default_output_endpoint(&self) -> Result<Option<Endpoint>> {
        Ok(self
            .host
            .default_output_device()
            .and_then(|device| device_name(&device).ok())
            .map(|name| Endpoint::new(name.clone(), name)))
    }

    fn open_output(
        &self,
        endpoint: &Endpoint,
        config: &SinkConfig,
    ) -> Result<Box<dyn OutputSink>> {
        let device = self.find_device(endpoint)?;
        let format = pick_sample_format(&device, config)?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::new(RingBuffer::new(config.buffer_bytes));
        let lost = Arc::new(AtomicBool::new(false));

        let stream = match format {
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, config, &buffer, &lost, endpoint)
            }
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, config, &buffer, &lost, endpoint)
            }
            other => Err(Error::UnsupportedFormat(format!("{other:?}"))),
        }?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        tracing::info!(
            endpoint = %endpoint.name,
            ?format,
            sample_rate = config.sample_rate,
            "output stream started"
        );

        Ok(Box::new(CpalSink {
            endpoint: endpoint.clone(),
            stream,
            buffer,
            lost,
        }))
    }

    fn subscribe_default_changed(
        &self,
        callback: DefaultChangedCallback,
    ) -> Result<NotificationHandle> {
        let watcher = DefaultWatcher::spawn(self.host.id(), self.default_poll, callback)?;
        Ok(NotificationHandle::new(watcher))
    }
}

/// Stereo at the requested rate, preferring native `i16`, then `f32`.
fn pick_sample_format(device: &cpal::Device, config: &SinkConfig) -> Result<SampleFormat> {
    let ranges: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
        .filter(|range| {
            range.channels() == config.channels
                && range.min_sample_rate() <= config.sample_rate
                && range.max_sample_rate() >= config.sample_rate
        })
        .collect();

    [SampleFormat::I16, SampleFormat::F32]
        .into_iter()
        .find(|format| ranges.iter().any(|r| r.sample_format() == *format))
        .ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "no {}-channel {} Hz i16/f32 output config",
                config.channels, config.sample_rate
            ))
        })
}

/// Whether a stream error means the stream will not play again.
fn is_fatal(err: &cpal::StreamError) -> bool {
    !matches!(err, cpal::StreamError::BufferUnderrun)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink_config: &SinkConfig,
    buffer: &Arc<RingBuffer>,
    lost: &Arc<AtomicBool>,
    endpoint: &Endpoint,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<i16> + Send + 'static,
{
    let source = Arc::clone(buffer);
    let lost_flag = Arc::clone(lost);
    let name = endpoint.name.clone();
    // Sized for the whole device buffer so the callback does not allocate.
    let mut bytes = vec![0u8; sink_config.buffer_bytes];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let wanted = data.len() * BYTES_PER_SAMPLE;
                if bytes.len() < wanted {
                    bytes.resize(wanted, 0);
                }
                let got = source.read(&mut bytes[..wanted]) / BYTES_PER_SAMPLE;
                let samples = bytes.chunks_exact(BYTES_PER_SAMPLE).take(got);
                for (out, pcm) in data.iter_mut().zip(samples) {
                    *out = T::from_sample(i16::from_le_bytes([pcm[0], pcm[1]]));
                }
                data[got..].fill(T::EQUILIBRIUM);
            },
            move |err| {
                if is_fatal(&err) {
                    lost_flag.store(true, Ordering::SeqCst);
                    tracing::warn!(endpoint = %name, error = %err, "output stream failed");
                } else {
                    tracing::debug!(endpoint = %name, error = %err, "output stream glitch");
                }
            },
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))
}

/// Playing cpal stream fed through a device-side ring buffer.
struct CpalSink {
    endpoint: Endpoint,
    stream: cpal::Stream,
    buffer: Arc<RingBuffer>,
    lost: Arc<AtomicBool>,
}

impl OutputSink for CpalSink {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn buffered_bytes(&self) -> usize {
        self.buffer.occupied()
    }

    fn push(&mut self, pcm: &[u8]) -> Result<()> {
        self.health()?;
        let room = self.buffer.free();
        self.buffer.write(&pcm[..pcm.len().min(room)]);
        Ok(())
    }

    fn health(&self) -> Result<()> {
        if self.lost.load(Ordering::SeqCst) {
            Err(Error::DeviceLost(self.endpoint.name.clone()))
        } else {
            Ok(())
        }
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Dropping the stream stops it either way.
        let paused = self
            .stream
            .pause()
            .map_err(|e| Error::DeviceLost(format!("{}: {e}", self.endpoint.name)));
        self.buffer.clear();
        paused
    }
}

/// Polls the default output device name and fires the callback on change.
struct DefaultWatcher {
    stop: ShutdownSignal,
    handle: Option<JoinHandle<()>>,
}

impl DefaultWatcher {
    fn spawn(host_id: HostId, poll: Duration, callback: DefaultChangedCallback) -> Result<Self> {
        let stop = ShutdownSignal::new();
        let signal = stop.clone();
        let handle = std::thread::Builder::new()
            .name("tonegen-default-watch".to_string())
            .spawn(move || {
                let host = match cpal::host_from_id(host_id) {
                    Ok(host) => host,
                    Err(e) => {
                        tracing::warn!(error = %e, "default device watcher has no host");
                        return;
                    }
                };
                let current = |host: &Host| {
                    host.default_output_device()
                        .and_then(|device| device_name(&device).ok())
                };
                let mut last = current(&host);
                while !signal.wait_timeout(poll) {
                    let now = current(&host);
                    if now != last {
                        tracing::info!(from = ?last, to = ?now, "default output device changed");
                        last = now;
                        callback();
                    }
                }
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for DefaultWatcher {
    fn drop(&mut self) {
        self.stop.request();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_name() {
        let backend = CpalBackend::new();
        assert_eq!(backend.name(), "cpal");
    }

    #[test]
    fn enumeration_does_not_panic() {
        let backend = CpalBackend::new();
        // Device availability depends on the system.
        let _ = backend.output_endpoints();
        let _ = backend.default_output_endpoint();
    }

    #[test]
    fn only_underruns_keep_the_stream_alive() {
        assert!(is_fatal(&cpal::StreamError::DeviceNotAvailable));
        assert!(is_fatal(&cpal::StreamError::StreamInvalidated));
        assert!(is_fatal(&cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "snd_pcm_writei: No such device".into(),
            },
        }));
        assert!(!is_fatal(&cpal::StreamError::BufferUnderrun));
    }

    #[test]
    fn watcher_stops_on_drop() {
        let backend = CpalBackend::with_default_poll(Duration::from_millis(5));
        let handle = backend.subscribe_default_changed(Box::new(|| {})).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        drop(handle);
    }
}
