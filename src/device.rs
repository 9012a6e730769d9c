//! hidraw device discovery and frame I/O

use std::fs::{read_dir, read_to_string, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::error::TransportError;
use crate::protocol::{Frame, Reply, PACKET_SIZE};
use crate::transaction::Transport;

/// Exclusively owned handle to the keyboard's vendor interface.
///
/// The node is closed when the handle is dropped, including after a failed
/// transaction.
pub struct Device {
    file: File,
    path: PathBuf,
}

impl Device {
    /// Open the device named in the config, or discover it through sysfs
    pub fn open(config: &Config) -> Result<Self> {
        let path = match &config.device_path {
            Some(path) => path.clone(),
            None => find_hidraw_device(config.vendor_id, config.product_id, config.interface)?,
        };
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        log::info!("Opened device: {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Get the device path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Output report length: report number plus one frame
const REPORT_SIZE: usize = PACKET_SIZE + 1;

/// hidraw output report for `frame`.
///
/// The keyboard uses unnumbered reports, so hidraw expects report number 0
/// up front and strips it; the frame's own tag byte then reaches the wire intact.
fn report(frame: &Frame) -> [u8; REPORT_SIZE] {
    let mut buf = [0u8; REPORT_SIZE];
    buf[1..].copy_from_slice(frame.as_bytes());
    buf
}

impl Transport for Device {
    fn write_frame(&mut self, frame: &Frame) -> std::result::Result<(), TransportError> {
        let sent = self.file.write(&report(frame))?;
        if sent != REPORT_SIZE {
            return Err(TransportError::ShortWrite {
                sent,
                expected: REPORT_SIZE,
            });
        }
        Ok(())
    }

    fn read_reply(&mut self, timeout: Duration) -> std::result::Result<Reply, TransportError> {
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };

        if ret < 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        if ret == 0 {
            return Err(TransportError::Timeout(timeout_ms as u64));
        }

        let mut buf = [0u8; PACKET_SIZE];
        let got = self.file.read(&mut buf)?;
        if got < PACKET_SIZE {
            return Err(TransportError::ShortReply {
                got,
                expected: PACKET_SIZE,
            });
        }
        Ok(buf)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::debug!("Released device: {}", self.path.display());
    }
}

/// Find the hidraw node for `interface` of the given USB device
fn find_hidraw_device(vendor_id: u16, product_id: u16, interface: u8) -> Result<PathBuf> {
    let interface_marker = format!(":1.{}/", interface);

    for entry in read_dir("/sys/class/hidraw").context("Failed to list /sys/class/hidraw")? {
        let entry = entry?;
        let hidraw_name = entry.file_name();
        let device_path = entry.path().join("device");

        let Ok(uevent) = read_to_string(device_path.join("uevent")) else {
            continue;
        };
        if !uevent.lines().any(|line| hid_id_matches(line, vendor_id, product_id)) {
            continue;
        }

        let real_path = std::fs::canonicalize(&device_path)?;
        if real_path.to_string_lossy().contains(&interface_marker) {
            return Ok(PathBuf::from(format!(
                "/dev/{}",
                hidraw_name.to_string_lossy()
            )));
        }
    }

    Err(TransportError::DeviceNotFound(format!(
        "{:04x}:{:04x} interface {}. Is the keyboard connected?",
        vendor_id, product_id, interface
    ))
    .into())
}

/// Match a uevent line such as `HID_ID=0003:00000C45:0000652F`
fn hid_id_matches(line: &str, vendor_id: u16, product_id: u16) -> bool {
    let Some(id) = line.strip_prefix("HID_ID=") else {
        return false;
    };
    let parts: Vec<&str> = id.split(':').collect();
    if parts.len() < 3 {
        return false;
    }
    let vendor = u32::from_str_radix(parts[1], 16).ok();
    let product = u32::from_str_radix(parts[2], 16).ok();
    vendor == Some(u32::from(vendor_id)) && product == Some(u32::from(product_id))
}
