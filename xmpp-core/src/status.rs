/// Connection status, passed to the status callback together with an
/// optional `condition` string and triggering element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionStatus {
    Error = 0,
    Connecting = 1,
    ConnFail = 2,
    Authenticating = 3,
    AuthFail = 4,
    Connected = 5,
    Disconnected = 6,
    Disconnecting = 7,
    Attached = 8,
    Redirect = 9,
    ConnTimeout = 10,
}

impl ConnectionStatus {
    /// The numeric status code, as used by callers that switch on an
    /// integer rather than match the enum.
    pub fn code(self) -> u8 {
        self as u8
    }
}
