//! Datagram framing for the virtual-HID service protocol.
//!
//! Two frame kinds exist. A heartbeat is `[0x00][deadline-ms u32 LE]`; the
//! service treats a client whose deadline lapses as dead. User data is
//! `[0x01]['c']['p'][version u16 LE][request u8][payload...]`; the two magic
//! bytes and the version gate protocol compatibility on the service side.

/// Protocol version carried in every user-data frame.
pub const PROTOCOL_VERSION: u16 = 5;

/// Deadline the service applies to our heartbeats.
pub const HEARTBEAT_DEADLINE_MS: u32 = 5000;

const FRAME_HEARTBEAT: u8 = 0x00;
const FRAME_USER_DATA: u8 = 0x01;
const MAGIC: [u8; 2] = [b'c', b'p'];

/// Requests the service understands. Ids 8..=11 exist service-side but have
/// no use here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Request {
    InitKeyboard = 1,
    TerminateKeyboard = 2,
    ResetKeyboard = 3,
    InitPointing = 4,
    TerminatePointing = 5,
    ResetPointing = 6,
    PostKeyboardReport = 7,
    PostPointingReport = 12,
}

/// Acknowledgments observed on the client socket. The first byte of each
/// inbound datagram carries the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceResponse {
    DriverActivated = 1,
    DriverConnected = 2,
    DriverVersionMismatched = 3,
    KeyboardReady = 4,
    PointingReady = 5,
}

impl ServiceResponse {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::DriverActivated),
            2 => Some(Self::DriverConnected),
            3 => Some(Self::DriverVersionMismatched),
            4 => Some(Self::KeyboardReady),
            5 => Some(Self::PointingReady),
            _ => None,
        }
    }
}

/// The 5-byte heartbeat frame.
pub fn heartbeat(deadline_ms: u32) -> [u8; 5] {
    let mut out = [0u8; 5];
    out[0] = FRAME_HEARTBEAT;
    out[1..].copy_from_slice(&deadline_ms.to_le_bytes());
    out
}

/// A user-data frame wrapping `request` and its payload.
pub fn user_data(request: Request, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + payload.len());
    out.push(FRAME_USER_DATA);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    out.push(request as u8);
    out.extend_from_slice(payload);
    out
}
