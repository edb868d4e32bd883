use std::convert::TryFrom;
use std::fmt;

use crate::Error;

/// STUN/TURN method, independent of class.
///
/// <https://datatracker.ietf.org/doc/html/rfc8489#section-5>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodType {
    Binding,
    Allocate,
    Refresh,
    Send,
    Data,
    CreatePermission,
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Binding => "Binding",
                Self::Allocate => "Allocate",
                Self::Refresh => "Refresh",
                Self::Send => "Send",
                Self::Data => "Data",
                Self::CreatePermission => "CreatePermission",
            }
        )
    }
}

/// The 2-bit class carried in every STUN message type.
///
/// <https://datatracker.ietf.org/doc/html/rfc5389#section-6>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Request,
    Indication,
    Success,
    Error,
}

impl Class {
    const fn bits(self) -> u16 {
        match self {
            Self::Request => 0b00,
            Self::Indication => 0b01,
            Self::Success => 0b10,
            Self::Error => 0b11,
        }
    }

    const fn from_bits(bits: u16) -> Self {
        match bits {
            0b00 => Self::Request,
            0b01 => Self::Indication,
            0b10 => Self::Success,
            _ => Self::Error,
        }
    }
}

/// Full STUN/TURN message type: a (method, class) pair encoded as a 14-bit
/// value on the wire.
///
/// # Test
///
/// ```
/// use turn_server_codec::message::methods::*;
/// use std::convert::TryFrom;
///
/// assert_eq!(Method::try_from(0x0001).unwrap(), BINDING_REQUEST);
/// assert_eq!(u16::from(BINDING_REQUEST), 0x0001);
/// assert_eq!(Method::try_from(0x0003).unwrap(), ALLOCATE_REQUEST);
/// assert_eq!(Method::try_from(0x0103).unwrap(), ALLOCATE_RESPONSE);
/// assert_eq!(Method::try_from(0x0113).unwrap(), ALLOCATE_ERROR);
/// assert_eq!(u16::from(ALLOCATE_RESPONSE), 0x0103);
/// assert_eq!(u16::from(ALLOCATE_ERROR), 0x0113);
/// assert_eq!(u16::from(SEND_INDICATION), 0x0016);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method {
    pub kind: MethodType,
    pub class: Class,
}

impl Method {
    pub const fn is_request(&self) -> bool {
        matches!(self.class, Class::Request)
    }

    pub const fn is_indication(&self) -> bool {
        matches!(self.class, Class::Indication)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.class, Class::Success)
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.class, Class::Error)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        write!(
            f,
            "{}",
            match self.class {
                Class::Request => "Request",
                Class::Indication => "Indication",
                Class::Success => "Response",
                Class::Error => "Error",
            }
        )
    }
}

macro_rules! method_const {
    ($name:ident, $kind:expr, $class:expr) => {
        pub const $name: Method = Method {
            kind: $kind,
            class: $class,
        };
    };
}

method_const!(BINDING_REQUEST, MethodType::Binding, Class::Request);
method_const!(BINDING_RESPONSE, MethodType::Binding, Class::Success);
method_const!(BINDING_ERROR, MethodType::Binding, Class::Error);

method_const!(ALLOCATE_REQUEST, MethodType::Allocate, Class::Request);
method_const!(ALLOCATE_RESPONSE, MethodType::Allocate, Class::Success);
method_const!(ALLOCATE_ERROR, MethodType::Allocate, Class::Error);

method_const!(
    CREATE_PERMISSION_REQUEST,
    MethodType::CreatePermission,
    Class::Request
);
method_const!(
    CREATE_PERMISSION_RESPONSE,
    MethodType::CreatePermission,
    Class::Success
);
method_const!(
    CREATE_PERMISSION_ERROR,
    MethodType::CreatePermission,
    Class::Error
);

method_const!(REFRESH_REQUEST, MethodType::Refresh, Class::Request);
method_const!(REFRESH_RESPONSE, MethodType::Refresh, Class::Success);
method_const!(REFRESH_ERROR, MethodType::Refresh, Class::Error);

method_const!(SEND_INDICATION, MethodType::Send, Class::Indication);
method_const!(DATA_INDICATION, MethodType::Data, Class::Indication);

const fn raw_method(kind: MethodType) -> u16 {
    match kind {
        MethodType::Binding => 0x001,
        MethodType::Allocate => 0x003,
        MethodType::Refresh => 0x004,
        MethodType::Send => 0x006,
        MethodType::CreatePermission => 0x008,
        MethodType::Data => 0x007,
    }
}

const fn method_from_raw(raw: u16) -> Option<MethodType> {
    Some(match raw {
        0x001 => MethodType::Binding,
        0x003 => MethodType::Allocate,
        0x004 => MethodType::Refresh,
        0x006 => MethodType::Send,
        0x008 => MethodType::CreatePermission,
        0x007 => MethodType::Data,
        _ => return None,
    })
}

/// Spread the method's 12 bits across the 14-bit type field, leaving the two
/// class-bit gaps at positions 4 and 8 for the caller to OR in.
///
/// <https://datatracker.ietf.org/doc/html/rfc5389#section-6>
const fn spread_method(m: u16) -> u16 {
    (m & 0b0000_0000_1111) | ((m & 0b0000_0111_0000) << 1) | ((m & 0b1111_1000_0000) << 2)
}

const fn unspread_method(value: u16) -> u16 {
    (value & 0b0000_0000_0000_1111)
        | ((value & 0b0000_0000_1110_0000) >> 1)
        | ((value & 0b0011_1110_0000_0000) >> 2)
}

impl From<Method> for u16 {
    fn from(method: Method) -> Self {
        let class = method.class.bits();
        spread_method(raw_method(method.kind)) | ((class & 0b01) << 4) | ((class & 0b10) << 7)
    }
}

impl TryFrom<u16> for Method {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let m = unspread_method(value);
        let class_bits =
            ((value & 0b0000_0000_0001_0000) >> 4) | ((value & 0b0000_0001_0000_0000) >> 7);

        Ok(Method {
            kind: method_from_raw(m).ok_or(Error::UnknownMethod)?,
            class: Class::from_bits(class_bits),
        })
    }
}
