/// Error codes used in TURN ERROR-CODE attributes.
///
/// <https://datatracker.ietf.org/doc/html/rfc8489#section-18.3>
/// <https://datatracker.ietf.org/doc/html/rfc8656#section-19>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    TryAlternate = 300,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    AllocationMismatch = 437,
    StaleNonce = 438,
    WrongCredentials = 441,
    UnsupportedTransportAddress = 442,
    AllocationQuotaReached = 486,
    ServerError = 500,
    InsufficientCapacity = 508,
}

/// Split an error code into `(class, number)` the way ERROR-CODE encodes it
/// on the wire: top 3 bits as a 100s-digit class, bottom 8 bits as the
/// number 0-99.
pub const fn errno(code: u16) -> (u8, u8) {
    ((code / 100) as u8, (code % 100) as u8)
}

impl From<ErrorType> for u16 {
    fn from(value: ErrorType) -> Self {
        value as u16
    }
}

impl TryFrom<u16> for ErrorType {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            300 => Self::TryAlternate,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            437 => Self::AllocationMismatch,
            438 => Self::StaleNonce,
            441 => Self::WrongCredentials,
            442 => Self::UnsupportedTransportAddress,
            486 => Self::AllocationQuotaReached,
            500 => Self::ServerError,
            508 => Self::InsufficientCapacity,
            _ => return Err(()),
        })
    }
}

impl From<ErrorType> for &'static str {
    fn from(value: ErrorType) -> Self {
        match value {
            ErrorType::TryAlternate => "Try Alternate",
            ErrorType::BadRequest => "Bad Request",
            ErrorType::Unauthorized => "Unauthorized",
            ErrorType::Forbidden => "Forbidden",
            ErrorType::AllocationMismatch => "Allocation Mismatch",
            ErrorType::StaleNonce => "Stale Nonce",
            ErrorType::WrongCredentials => "Wrong Credentials",
            ErrorType::UnsupportedTransportAddress => "Unsupported Transport Address",
            ErrorType::AllocationQuotaReached => "Allocation Quota Reached",
            ErrorType::ServerError => "Server Error",
            ErrorType::InsufficientCapacity => "Insufficient Capacity",
        }
    }
}
