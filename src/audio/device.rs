use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use log::info;
use rodio::{OutputStream, OutputStreamHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

pub fn list_output_devices() -> Result<Vec<OutputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .context("Failed to enumerate output devices")?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .map(|name| OutputDeviceInfo {
            is_default: Some(&name) == default_name.as_ref(),
            name,
        })
        .collect())
}

fn find_output_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match name {
        Some(wanted) => host
            .output_devices()
            .context("Failed to enumerate output devices")?
            .find(|device| device.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| anyhow!("Output device '{}' not found", wanted)),
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow!("No default output device available")),
    }
}

/// Opens the named device, or the system default when `name` is `None`.
///
/// The returned `OutputStream` must stay alive for as long as anything plays.
pub fn open_output(name: Option<&str>) -> Result<(OutputStream, OutputStreamHandle)> {
    let device = find_output_device(name)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    if let Ok(config) = device.default_output_config() {
        info!("Output config: {:?}", config);
    }

    let (stream, handle) = OutputStream::try_from_device(&device)
        .with_context(|| format!("Failed to open output device '{}'", device_name))?;
    info!("Using audio device: {}", device_name);

    Ok((stream, handle))
}
