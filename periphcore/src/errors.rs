// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Peripheral core errors
///
/// All of them are reported to the caller of the offending operation and
/// none are retried internally.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// Null handle, handle of another family, or index out of range
    InvalidHandle,
    /// Open was attempted on a slot that is not unused
    AlreadyInUse,
    /// No unused slot left in the family
    ResourceExhausted,
    /// Zero rate, unsupported word width and similar requests
    InvalidArgument,
    /// No legal prescaler combination approximates the request
    RateUnachievable,
    /// Operation was attempted in wrong state
    InvalidState,
    /// The registry was built without byte buffers
    NoBuffer,
    /// The binding does not provide this capability
    Unsupported,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "Invalid device handle"),
            Self::AlreadyInUse => write!(f, "Device already in use"),
            Self::ResourceExhausted => write!(f, "No free device"),
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::RateUnachievable => write!(f, "Rate cannot be achieved"),
            Self::InvalidState => write!(f, "Invalid state"),
            Self::NoBuffer => write!(f, "Device has no buffer"),
            Self::Unsupported => write!(f, "Not supported by the device"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
