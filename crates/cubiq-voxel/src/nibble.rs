//! Packed 4-bit per block light storage.

use cubiq_core::constants::CUBE_VOLUME;
use cubiq_core::coords::LocalPos;

/// Light channel of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightLayer {
    /// Light coming from the sky.
    Sky,
    /// Light emitted by blocks.
    Block,
}

/// One nibble (0-15) per block of a cube, two blocks per byte.
#[derive(Clone, PartialEq, Eq)]
pub struct NibbleArray {
    data: Box<[u8; CUBE_VOLUME / 2]>,
}

impl NibbleArray {
    /// Create an array with every value set to `value`.
    pub fn filled(value: u8) -> Self {
        let value = value & 0x0F;
        Self {
            data: Box::new([value | (value << 4); CUBE_VOLUME / 2]),
        }
    }

    /// Read the nibble at the given position.
    #[inline]
    pub fn get(&self, pos: LocalPos) -> u8 {
        let index = pos.to_index();
        let byte = self.data[index >> 1];
        if index & 1 == 0 {
            byte & 0x0F
        } else {
            byte >> 4
        }
    }

    /// Write the nibble at the given position. Values above 15 are truncated.
    #[inline]
    pub fn set(&mut self, pos: LocalPos, value: u8) {
        let index = pos.to_index();
        let value = value & 0x0F;
        let byte = &mut self.data[index >> 1];
        *byte = if index & 1 == 0 {
            (*byte & 0xF0) | value
        } else {
            (*byte & 0x0F) | (value << 4)
        };
    }

    /// Raw packed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }
}

impl std::fmt::Debug for NibbleArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NibbleArray")
            .field("len", &CUBE_VOLUME)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbouring_nibbles_are_independent() {
        let mut nibbles = NibbleArray::filled(0);
        let even = LocalPos::from_index(10);
        let odd = LocalPos::from_index(11);

        nibbles.set(even, 7);
        nibbles.set(odd, 12);

        assert_eq!(nibbles.get(even), 7);
        assert_eq!(nibbles.get(odd), 12);
        assert_eq!(nibbles.as_bytes()[5], 7 | (12 << 4));
    }

    #[test]
    fn filled_and_truncated() {
        let mut nibbles = NibbleArray::filled(15);
        let pos = LocalPos::new(3, 4, 5);
        assert_eq!(nibbles.get(pos), 15);

        nibbles.set(pos, 0x1F);
        assert_eq!(nibbles.get(pos), 15);
    }
}
