//! Typed parameter slots attached to a job.
//!
//! A job carries a small, fixed number of tagged values instead of an
//! arbitrary argument tuple. The entry callback reads them back through
//! the typed accessors on [`Params`].

use crate::error::{Error, Result};
use arrayvec::ArrayVec;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Maximum number of parameters a single job can hold.
pub const MAX_JOB_PARAMS: usize = 8;

/// Type tag of a parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Float,
    Double,
    Vector4,
    Matrix4,
    Buffer,
}

/// Shared, opaque byte buffer handed to a job.
///
/// Cloning a `BufferRef` clones the reference, not the bytes, so a caller
/// can keep one clone and read back whatever the job wrote into it.
#[derive(Clone, Default)]
pub struct BufferRef {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl BufferRef {
    /// Wraps an existing byte vector.
    pub fn new(bytes: Vec<u8>) -> Self {
        BufferRef {
            bytes: Arc::new(Mutex::new(bytes)),
        }
    }

    /// Creates a zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    /// Locks the buffer for reading or writing.
    pub fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if both references point at the same buffer.
    pub fn same_buffer(&self, other: &BufferRef) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl fmt::Debug for BufferRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferRef").field("len", &self.len()).finish()
    }
}

impl PartialEq for BufferRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_buffer(other)
    }
}

/// A single tagged parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Float(f32),
    Double(f64),
    Vector4([f32; 4]),
    Matrix4([[f32; 4]; 4]),
    Buffer(BufferRef),
}

impl Param {
    /// Returns the type tag of this value.
    pub fn kind(&self) -> ParamType {
        match self {
            Param::Float(_) => ParamType::Float,
            Param::Double(_) => ParamType::Double,
            Param::Vector4(_) => ParamType::Vector4,
            Param::Matrix4(_) => ParamType::Matrix4,
            Param::Buffer(_) => ParamType::Buffer,
        }
    }
}

impl From<f32> for Param {
    fn from(value: f32) -> Self {
        Param::Float(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Double(value)
    }
}

impl From<[f32; 4]> for Param {
    fn from(value: [f32; 4]) -> Self {
        Param::Vector4(value)
    }
}

impl From<[[f32; 4]; 4]> for Param {
    fn from(value: [[f32; 4]; 4]) -> Self {
        Param::Matrix4(value)
    }
}

impl From<BufferRef> for Param {
    fn from(value: BufferRef) -> Self {
        Param::Buffer(value)
    }
}

/// Fixed-capacity, ordered list of job parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    slots: ArrayVec<Param, MAX_JOB_PARAMS>,
}

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    /// Appends a value. Fails without touching existing slots once the
    /// list holds [`MAX_JOB_PARAMS`] values.
    pub fn push(&mut self, value: impl Into<Param>) -> Result<()> {
        self.slots
            .try_push(value.into())
            .map_err(|_| Error::TooManyParameters {
                capacity: MAX_JOB_PARAMS,
            })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Param> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.slots.iter()
    }

    /// Type tags of all populated slots, in order.
    pub fn types(&self) -> impl Iterator<Item = ParamType> + '_ {
        self.slots.iter().map(Param::kind)
    }

    pub fn float(&self, index: usize) -> Option<f32> {
        match self.get(index)? {
            Param::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn double(&self, index: usize) -> Option<f64> {
        match self.get(index)? {
            Param::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn vector4(&self, index: usize) -> Option<[f32; 4]> {
        match self.get(index)? {
            Param::Vector4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn matrix4(&self, index: usize) -> Option<[[f32; 4]; 4]> {
        match self.get(index)? {
            Param::Matrix4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn buffer(&self, index: usize) -> Option<&BufferRef> {
        match self.get(index)? {
            Param::Buffer(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}
