/// NDJSON telemetry emitted on the serial console.
///
/// Health, power and restart events are written as one JSON object per line
/// alongside the human-readable log, so a host can scrape device health
/// without a separate interface. Uses `heapless` buffers for no-alloc
/// serialization.
use heapless::Vec;
use serde::Serialize;

use crate::supervisor::TaskMargin;

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 384;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Messages sent from the device over the serial console
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// Startup banner
    #[serde(rename = "boot")]
    Boot {
        board: &'static str,
        version: &'static str,
    },
    /// Supervisor health cycle
    #[serde(rename = "health")]
    Health {
        /// Uptime in seconds
        uptime: u32,
        heap_free: u32,
        heap_min_free: u32,
        tasks: &'a [TaskMargin],
    },
    /// Power monitor status
    #[serde(rename = "power")]
    Power {
        batt_mv: u16,
        usb_mv: u16,
        charging: bool,
        usb: bool,
        batt_ma: i32,
        draw_ma: i32,
    },
    /// Last words before a restart
    #[serde(rename = "restart")]
    Restart {
        /// "routine", "lock_timeout", "lock_poisoned", "resource_exhausted"
        reason: &'static str,
        uptime: u32,
    },
}

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Serialize and write a message to the log as a single line.
pub fn emit(msg: &DeviceMessage) {
    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok();
    match serialize_message(msg, &mut buf) {
        Some(len) => {
            buf.truncate(len);
            if let Ok(s) = core::str::from_utf8(&buf) {
                log::info!("{}", s.trim_end());
            }
        }
        None => log::warn!("telemetry message did not fit in {} bytes", MAX_MSG_LEN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::TaskId;

    fn to_json<'b>(msg: &DeviceMessage, buf: &'b mut [u8]) -> &'b str {
        let len = serde_json_core::to_slice(msg, buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap()
    }

    #[test]
    fn serialize_health_message() {
        let tasks = [
            TaskMargin {
                task: TaskId::Display,
                stack_free: 9000,
            },
            TaskMargin {
                task: TaskId::Radio,
                stack_free: 1200,
            },
        ];
        let msg = DeviceMessage::Health {
            uptime: 120,
            heap_free: 48000,
            heap_min_free: 30000,
            tasks: &tasks,
        };
        let mut buf = [0u8; 384];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"health""#));
        assert!(json.contains(r#""heap_min_free":30000"#));
        assert!(json.contains(r#"{"task":"display","stack_free":9000}"#));
        assert!(json.contains(r#"{"task":"radio","stack_free":1200}"#));
    }

    #[test]
    fn serialize_power_message() {
        let msg = DeviceMessage::Power {
            batt_mv: 4012,
            usb_mv: 0,
            charging: false,
            usb: false,
            batt_ma: -80,
            draw_ma: 80,
        };
        let mut buf = [0u8; 256];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"power""#));
        assert!(json.contains(r#""batt_mv":4012"#));
        assert!(json.contains(r#""batt_ma":-80"#));
        assert!(json.contains(r#""usb":false"#));
    }

    #[test]
    fn serialize_restart_message() {
        let msg = DeviceMessage::Restart {
            reason: "routine",
            uptime: 3600,
        };
        let mut buf = [0u8; 128];
        let json = to_json(&msg, &mut buf);
        assert_eq!(json, r#"{"type":"restart","reason":"routine","uptime":3600}"#);
    }

    #[test]
    fn serialize_message_appends_newline() {
        let msg = DeviceMessage::Boot {
            board: "test_board",
            version: "0.1.0",
        };
        let mut buf = [0u8; 128];
        let len = serialize_message(&msg, &mut buf).unwrap();
        assert_eq!(buf[len - 1], b'\n');
        assert!(core::str::from_utf8(&buf[..len])
            .unwrap()
            .contains(r#""board":"test_board""#));
    }

    #[test]
    fn serialize_message_reports_overflow() {
        let msg = DeviceMessage::Boot {
            board: "test_board",
            version: "0.1.0",
        };
        let mut buf = [0u8; 8];
        assert!(serialize_message(&msg, &mut buf).is_none());
    }

    #[test]
    fn boot_message_names_board_and_crate_version() {
        let msg = DeviceMessage::Boot {
            board: crate::board::BOARD_NAME,
            version: VERSION,
        };
        let mut buf = [0u8; 128];
        let json = to_json(&msg, &mut buf);
        let expected = format!(
            r#"{{"type":"boot","board":"{}","version":"{}"}}"#,
            crate::board::BOARD_NAME,
            env!("CARGO_PKG_VERSION")
        );
        assert_eq!(json, expected);
    }
}
