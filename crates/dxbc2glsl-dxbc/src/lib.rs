//! A safe, bounds-checked reader for DirectX shader bytecode containers (`DXBC`).
//!
//! This crate is intended for parsing **untrusted** shader blobs without
//! panicking or reading out of bounds. Besides the container itself it decodes
//! the reflection chunks needed to cross-compile a shader:
//!
//! - signature chunks (`ISGN`/`ISG1`, `OSGN`/`OSG5`/`OSG1`, `PCSG`/`PSG1`),
//!   which map shader inputs/outputs to semantics and registers;
//! - resource definitions (`RDEF`/`RD11`): constant buffer layouts, variable
//!   types and resource bind points.
//!
//! Decoded data is owned; nothing returned by the chunk parsers borrows from
//! the input buffer.

#![forbid(unsafe_code)]

mod container;
mod error;
mod fourcc;
/// Parser for DXBC resource definition chunks (`RDEF`).
pub mod rdef;
mod reader;
/// Parsers for DXBC signature chunks (`ISGN`, `OSGN`, `PCSG`, ...).
pub mod signature;

/// Helpers for building synthetic DXBC blobs in tests.
///
/// This module is only available when compiling this crate's own tests, or when
/// the `test-utils` feature is enabled. It is **not** considered part of the
/// stable parsing API.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::container::{DxbcChunk, DxbcFile, DxbcHeader, SignatureKind};
pub use crate::error::DxbcError;
pub use crate::fourcc::*;
pub use crate::rdef::{
    parse_rdef_chunk, parse_rdef_chunk_with_fourcc, CbufferKind, RdefChunk, RdefConstantBuffer,
    RdefProgramType, RdefResourceBinding, RdefStructMember, RdefTarget, RdefType, RdefVariable,
    RegisterClass, ResourceReturnType, ShaderInputType, SrvDimension, VariableClass,
    VariableType,
};
pub use crate::signature::{
    parse_signature_chunk, parse_signature_chunk_with_fourcc, parse_signature_chunk_with_layout,
    ComponentType, SignatureChunk, SignatureEntry, SignatureLayout, SystemValue,
};
