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

/// Index that no family can have, used by [Handle::NULL].
pub(crate) const NULL_INDEX: u8 = 0xFF;

/// Peripheral family tag
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum Family {
    /// Capture/compare/PWM
    Ccp = 1,
    Spi = 2,
    Uart = 3,
    /// Quadrature encoder interface
    Qei = 4,
    Timer = 5,
    /// Output compare
    Oc = 6,
}

impl Family {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Ccp),
            2 => Some(Self::Spi),
            3 => Some(Self::Uart),
            4 => Some(Self::Qei),
            5 => Some(Self::Timer),
            6 => Some(Self::Oc),
            _ => None,
        }
    }
}

/// Device handle: family tag in the high byte, instance index in the low one.
///
/// Constructing a handle does not validate it. The registry of the family
/// checks the index on every call.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Handle(u16);

impl Handle {
    /// The "no device" handle
    pub const NULL: Handle = Handle(NULL_INDEX as u16);

    pub const fn new(family: Family, index: u8) -> Self {
        Handle(((family as u16) << 8) | index as u16)
    }

    /// Family of the handle, `None` for the null handle or an unknown tag
    pub fn family(self) -> Option<Family> {
        Family::from_tag((self.0 >> 8) as u8)
    }

    pub const fn index(self) -> u8 {
        self.0 as u8
    }

    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    /// Packed representation, e.g. for passing through a C ABI
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn from_raw(raw: u16) -> Self {
        Handle(raw)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NULL
    }
}

impl From<Handle> for u16 {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack() {
        let h = Handle::new(Family::Spi, 3);
        assert_eq!(h.raw(), 0x0203);
        assert_eq!(h.family(), Some(Family::Spi));
        assert_eq!(h.index(), 3);
        assert!(!h.is_null());
        assert_eq!(Handle::from_raw(0x0203), h);
    }

    #[test]
    fn test_null() {
        assert!(Handle::NULL.is_null());
        assert!(Handle::default().is_null());
        assert_eq!(Handle::NULL.family(), None);
        assert_eq!(Handle::NULL.index(), NULL_INDEX);
        // same index, real family: not the sentinel, but no registry accepts it
        assert!(!Handle::new(Family::Uart, NULL_INDEX).is_null());
    }

    #[test]
    fn test_families_differ() {
        assert_ne!(Handle::new(Family::Ccp, 0), Handle::new(Family::Timer, 0));
        for tag in 1..=6 {
            let family = Family::from_tag(tag).unwrap();
            assert_eq!(family as u8, tag);
        }
        assert_eq!(Family::from_tag(7), None);
    }
}
