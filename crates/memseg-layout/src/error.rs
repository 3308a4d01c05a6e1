use thiserror::Error;

/// Result type local to memseg-layout.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no member named '{name}' in group layout")]
    NoSuchMember { name: String },

    #[error("sequence index {index} out of range for {count} elements")]
    IndexOutOfRange { index: u64, count: u64 },

    #[error("path element expects a sequence layout")]
    NotASequence,

    #[error("path element expects a struct or union layout")]
    NotAGroup,

    #[error("path does not select a value layout")]
    NotAValue,

    #[error("carrier {carrier} is {carrier_bits} bits but the layout is {layout_bits} bits")]
    CarrierMismatch {
        carrier: memseg_core::PrimitiveKind,
        carrier_bits: u32,
        layout_bits: u64,
    },

    #[error("layout has no fixed size (unbounded sequence)")]
    UnboundedSequence,

    #[error("{bits} bits is not a whole number of bytes")]
    NotByteAligned { bits: u64 },

    #[error("invalid bit alignment {bits}: must be a power of two of at least 8")]
    InvalidAlignment { bits: u64 },

    #[error("access at offset {offset} is not aligned to {align} bytes")]
    Misaligned { offset: usize, align: usize },

    #[error("sequence range step must be non-zero")]
    ZeroStep,

    #[error("expected {expected} coordinates for the open path dimensions, got {got}")]
    Coordinates { expected: usize, got: usize },

    #[error("path has open sequence dimensions; offsets need a closed path")]
    OpenPath,

    #[error("layout arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Mem(#[from] memseg_mem::Error),
}
