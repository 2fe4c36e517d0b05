//! Argument decomposition for function-property requests.
//!
//! Helper to decompose a command payload (one already-framed bus request)
//! into typed arguments: fixed-width fields and NUL-terminated paths.

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// An iterator that can be used to fetch typed arguments from a byte slice.
pub(crate) struct ArgumentIterator<'a> {
    data: &'a [u8],
}

impl<'a> ArgumentIterator<'a> {
    /// Create a new argument iterator for the given byte slice.
    pub(crate) fn new(data: &'a [u8]) -> ArgumentIterator<'a> {
        ArgumentIterator { data }
    }

    /// Returns the size of the remaining data.
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    /// Fetch a slice of all remaining bytes.
    pub(crate) fn fetch_all(&mut self) -> &'a [u8] {
        let bytes = self.data;
        self.data = &[];
        bytes
    }

    /// Fetch a typed argument. Returns `None` if there's not enough data
    /// left. All wire fields are byte-aligned, so `T` must be `Unaligned`.
    pub(crate) fn fetch<T: FromBytes + KnownLayout + Immutable + Unaligned>(
        &mut self,
    ) -> Option<&'a T> {
        let (value, rest) = zerocopy::Ref::<_, T>::from_prefix(self.data).ok()?;
        self.data = rest;
        Some(zerocopy::Ref::into_ref(value))
    }

    /// Fetch a NUL-terminated path. Returns `None` if no terminator is left
    /// in the data or the path is not valid UTF-8.
    pub(crate) fn fetch_path(&mut self) -> Option<&'a str> {
        let len = memchr::memchr(0, self.data)?;
        let (out, rest) = self.data.split_at(len);
        self.data = &rest[1..];
        std::str::from_utf8(out).ok()
    }
}

#[cfg(test)]
mod tests {
    use zerocopy::little_endian::U16;

    use super::*;

    const TEST_DATA: [u8; 10] = [0x01, 0x00, 0x08, 0x2f, 0x61, 0x62, 0x00, 0x2f, 0x63, 0x00];

    #[test]
    fn typed_arguments() {
        let mut it = ArgumentIterator::new(&TEST_DATA);
        let sequence: &U16 = it.fetch().unwrap();
        assert_eq!(sequence.get(), 1);
        let size: &u8 = it.fetch().unwrap();
        assert_eq!(*size, 8);
        assert_eq!(it.len(), 7);
    }

    #[test]
    fn path_arguments() {
        let mut it = ArgumentIterator::new(&TEST_DATA[3..]);
        assert_eq!(it.fetch_path().unwrap(), "/ab");
        assert_eq!(it.fetch_path().unwrap(), "/c");
        assert_eq!(it.len(), 0);
    }

    #[test]
    fn all_data() {
        let mut it = ArgumentIterator::new(&TEST_DATA);
        it.fetch::<U16>().unwrap();
        assert_eq!(it.fetch_all(), &TEST_DATA[2..]);
        assert_eq!(it.len(), 0);
    }

    #[test]
    fn out_of_data() {
        let mut it = ArgumentIterator::new(&TEST_DATA[..1]);
        assert!(it.fetch::<U16>().is_none());
        assert_eq!(it.len(), 1);
    }

    #[test]
    fn unterminated_path() {
        let mut it = ArgumentIterator::new(&[0x2f, 0x61]);
        assert!(it.fetch_path().is_none());
    }

    #[test]
    fn non_utf8_path() {
        let mut it = ArgumentIterator::new(&[0xff, 0xfe, 0x00]);
        assert!(it.fetch_path().is_none());
    }
}
