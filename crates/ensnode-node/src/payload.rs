//! Closed set of concrete payloads and checked downcasts.

use ensnode_error::{EnsError, Result};
use ensnode_types::ImplKind;
use tracing::error;

use crate::kinds::fault::Fault;
use crate::kinds::field::Field;
use crate::kinds::gen_kw::GenKw;
use crate::kinds::static_kw::StaticKw;
use crate::kinds::summary::Summary;

/// The concrete state owned by a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    StaticKw(StaticKw),
    Field(Field),
    GenKw(GenKw),
    Fault(Fault),
    Summary(Summary),
}

impl Payload {
    #[must_use]
    pub const fn kind(&self) -> ImplKind {
        match self {
            Self::StaticKw(_) => ImplKind::StaticKw,
            Self::Field(_) => ImplKind::Field,
            Self::GenKw(_) => ImplKind::GenKw,
            Self::Fault(_) => ImplKind::Fault,
            Self::Summary(_) => ImplKind::Summary,
        }
    }
}

/// A concrete payload type with a fixed kind.
pub trait PayloadVariant: Sized {
    const KIND: ImplKind;

    fn from_payload(payload: &Payload) -> Option<&Self>;
    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self>;
    fn into_payload(self) -> Payload;
}

macro_rules! payload_variant {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl PayloadVariant for $variant {
                const KIND: ImplKind = ImplKind::$variant;

                fn from_payload(payload: &Payload) -> Option<&Self> {
                    match payload {
                        Payload::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
                    match payload {
                        Payload::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn into_payload(self) -> Payload {
                    Payload::$variant(self)
                }
            }

            impl From<$variant> for Payload {
                fn from(inner: $variant) -> Self {
                    Self::$variant(inner)
                }
            }
        )+
    };
}

payload_variant!(StaticKw, Field, GenKw, Fault, Summary);

/// Build (and log) a kind mismatch. Always a contract violation.
pub fn kind_mismatch(operation: &'static str, expected: ImplKind, found: ImplKind) -> EnsError {
    error!(
        operation,
        expected = %expected,
        found = %found,
        "kind mismatch"
    );
    EnsError::KindMismatch {
        operation,
        expected: expected.tag(),
        found: found.tag(),
    }
}

/// Borrow `payload` as `T`, or fail with `KindMismatch`.
pub fn downcast<'a, T: PayloadVariant>(payload: &'a Payload, operation: &'static str) -> Result<&'a T> {
    T::from_payload(payload).ok_or_else(|| kind_mismatch(operation, T::KIND, payload.kind()))
}

/// Mutable variant of [`downcast`].
pub fn downcast_mut<'a, T: PayloadVariant>(
    payload: &'a mut Payload,
    operation: &'static str,
) -> Result<&'a mut T> {
    let found = payload.kind();
    T::from_payload_mut(payload).ok_or_else(|| kind_mismatch(operation, T::KIND, found))
}
