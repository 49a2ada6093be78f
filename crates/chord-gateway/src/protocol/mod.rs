//! Gateway protocol definitions
//!
//! Op codes, frame format, payloads and close codes.

/// Declares a fieldless enum whose discriminants are wire values.
///
/// Generates `code()`, `label()`, `TryFrom<repr>` (the unknown value is the error) and
/// `Display` as `label (code)`.
macro_rules! wire_codes {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $repr:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr($repr)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            #[must_use]
            pub const fn code(self) -> $repr {
                self as $repr
            }

            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl TryFrom<$repr> for $name {
            type Error = $repr;

            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$variant), )+
                    unknown => Err(unknown),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} ({})", self.label(), self.code())
            }
        }
    };
}

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, RECONNECT_CLOSE_CODE, REQUESTED_CLOSE_REASON};
pub use messages::{GatewayFrame, ServerFrame};
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, RequestGuildMembers, ResumePayload,
    UpdateStatus,
};
