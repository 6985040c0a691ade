// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use super::{AudioError, Mixer, Output};

/// Sample rate requested from the device.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Channel count of the device's default output config.
    channels: u16,
    /// Sample format of the device's default output config.
    sample_format: cpal::SampleFormat,
    sample_rate: u32,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}

impl Device {
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Result<Device, AudioError> {
        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;
        let name = device
            .name()
            .map_err(|e| AudioError::Host(e.to_string()))?;

        Ok(Device {
            name,
            host_id,
            device,
            channels: default_config.channels(),
            sample_format: default_config.sample_format(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        })
    }

    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can play audio.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id).map_err(|e| AudioError::Host(e.to_string()))?;
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                match Device::from_cpal(host_id, device) {
                    Ok(device) => devices.push(device),
                    Err(e) => debug!(err = %e, host = host_id.name(), "Skipping device"),
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(name: &str) -> Result<Device, AudioError> {
        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| AudioError::NoDevice(name.to_string()))
    }

    /// Overrides the sample rate the stream is opened at.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Device {
        self.sample_rate = sample_rate;
        self
    }

    /// Gets the default host's default output device.
    pub fn default_output() -> Result<Device, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDevice("default".to_string()))?;
        Device::from_cpal(host.id(), device)
    }
}

impl super::Device for Device {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn open(&self, mixer: Arc<Mixer>) -> Result<Box<dyn Output>, AudioError> {
        let output = CpalOutput::start(
            self.name.clone(),
            self.device.clone(),
            self.sample_format,
            mixer,
        )?;
        Ok(Box::new(output))
    }
}

enum Command {
    Resume(Sender<Result<(), AudioError>>),
    Close,
}

/// Output stream handle. The cpal stream is not Send, so it lives on its own thread
/// and is driven over a command channel.
struct CpalOutput {
    commands: Sender<Command>,
    suspended: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

/// Renders from the mixer and converts into the device's sample type.
fn create_callback<T>(
    mixer: Arc<Mixer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let mut scratch: Vec<f32> = Vec::new();

    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        scratch.resize(data.len(), 0.0);
        mixer.process_into_output(&mut scratch);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            create_callback::<T>(mixer),
            |err| error!(err = %err, "CPAL output stream error"),
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}

fn open_stream(
    device: &cpal::Device,
    sample_format: cpal::SampleFormat,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, AudioError> {
    let config = cpal::StreamConfig {
        channels: mixer.num_channels(),
        sample_rate: mixer.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, &config, mixer),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, &config, mixer),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, &config, mixer),
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn run_output_thread(
    name: String,
    device: cpal::Device,
    sample_format: cpal::SampleFormat,
    mixer: Arc<Mixer>,
    ready: Sender<Result<(), AudioError>>,
    commands: Receiver<Command>,
    suspended: Arc<AtomicBool>,
) {
    let stream = match open_stream(&device, sample_format, mixer) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    info!(device = name, "CPAL output stream created");

    // A dropped sender also ends the thread.
    while let Ok(command) = commands.recv() {
        match command {
            Command::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| AudioError::PlayStream(e.to_string()));
                if result.is_ok() {
                    suspended.store(false, Ordering::Release);
                }
                let _ = reply.send(result);
            }
            Command::Close => break,
        }
    }

    suspended.store(true, Ordering::Release);
    drop(stream);
    info!(device = name, "CPAL output stream closed");
}

impl CpalOutput {
    fn start(
        name: String,
        device: cpal::Device,
        sample_format: cpal::SampleFormat,
        mixer: Arc<Mixer>,
    ) -> Result<CpalOutput, AudioError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let suspended = Arc::new(AtomicBool::new(true));

        let thread = {
            let suspended = suspended.clone();
            thread::Builder::new()
                .name("airpiano-output".to_string())
                .spawn(move || {
                    run_output_thread(
                        name,
                        device,
                        sample_format,
                        mixer,
                        ready_tx,
                        command_rx,
                        suspended,
                    )
                })?
        };

        let ready = ready_rx
            .recv()
            .map_err(|_| AudioError::Thread("output thread exited before reporting".to_string()))?;
        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e);
        }

        Ok(CpalOutput {
            commands,
            suspended,
            thread: Some(thread),
        })
    }
}

impl Output for CpalOutput {
    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(Command::Resume(reply_tx))
            .map_err(|_| AudioError::Thread("output thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| AudioError::Thread("output thread did not reply".to_string()))?
    }

    fn close(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(Command::Close);
            if thread.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}
