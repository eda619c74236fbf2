//! Growable output storage for the encoder.
//!
//! A [`WriteSession`] owns a set of byte storages and a table of blocks.
//! Each block windows a region of one storage (or borrows a caller slice
//! outright) and carries a forward link, so the logical output is the chain
//! of blocks starting at block zero. Keeping blocks as table indices instead
//! of a pointer-linked list sidesteps ownership gymnastics: splicing a
//! borrowed slice or carving a written region into two views is just pushing
//! a new table entry and rewiring two `Option<usize>` links.

pub(crate) const MIN_BUFFER_SIZE: usize = 256;
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 512;

pub(crate) enum Backing<'a> {
    /// Index into the session's storage table.
    Owned(usize),
    /// Caller-provided bytes spliced in without copying.
    Borrowed(&'a [u8]),
}

pub(crate) struct Block<'a> {
    pub backing: Backing<'a>,
    /// First byte of this block's window within its backing.
    pub start: usize,
    /// One past the last written byte. Writable space is `offset..capacity`.
    pub offset: usize,
    pub next: Option<usize>,
}

/// One encoding pass worth of output. Reusable via [`clear`](Self::clear).
pub struct WriteSession<'a> {
    storages: Vec<Box<[u8]>>,
    blocks: Vec<Block<'a>>,
    tail: usize,
    /// Total payload bytes across all blocks.
    pub(crate) size: usize,
    pub(crate) next_buffer_size: usize,
}

impl<'a> WriteSession<'a> {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
        let storages = vec![vec![0u8; buffer_size].into_boxed_slice()];
        let blocks = vec![Block { backing: Backing::Owned(0), start: 0, offset: 0, next: None }];
        WriteSession { storages, blocks, tail: 0, size: 0, next_buffer_size: buffer_size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Drops every block and storage but the first and rewinds for reuse.
    pub fn clear(&mut self) {
        self.storages.truncate(1);
        self.blocks.truncate(1);
        let first = &mut self.blocks[0];
        first.backing = Backing::Owned(0);
        first.start = 0;
        first.offset = 0;
        first.next = None;
        self.tail = 0;
        self.size = 0;
        self.next_buffer_size = self.storages[0].len();
    }

    /// Assembles the block chain into one contiguous buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        let mut cursor = Some(0);
        while let Some(i) = cursor {
            let block = &self.blocks[i];
            let bytes = match block.backing {
                Backing::Owned(s) => &self.storages[s][block.start..block.offset],
                Backing::Borrowed(slice) => &slice[block.start..block.offset],
            };
            out.extend_from_slice(bytes);
            cursor = block.next;
        }
        out
    }

    pub(crate) fn tail(&self) -> usize {
        self.tail
    }

    pub(crate) fn set_tail(&mut self, index: usize) {
        self.tail = index;
    }

    pub(crate) fn block(&self, index: usize) -> &Block<'a> {
        &self.blocks[index]
    }

    pub(crate) fn block_mut(&mut self, index: usize) -> &mut Block<'a> {
        &mut self.blocks[index]
    }

    pub(crate) fn capacity(&self, index: usize) -> usize {
        match self.blocks[index].backing {
            Backing::Owned(s) => self.storages[s].len(),
            Backing::Borrowed(slice) => slice.len(),
        }
    }

    pub(crate) fn remaining(&self, index: usize) -> usize {
        self.capacity(index) - self.blocks[index].offset
    }

    /// Writable bytes of a block together with its offset cursor. Only owned
    /// blocks are ever written through.
    pub(crate) fn block_buf_mut(&mut self, index: usize) -> (&mut [u8], &mut usize) {
        let block = &mut self.blocks[index];
        match block.backing {
            Backing::Owned(s) => (&mut self.storages[s], &mut block.offset),
            Backing::Borrowed(_) => unreachable!("write into borrowed block"),
        }
    }

    pub(crate) fn patch_byte(&mut self, index: usize, pos: usize, value: u8) {
        match self.blocks[index].backing {
            Backing::Owned(s) => self.storages[s][pos] = value,
            Backing::Borrowed(_) => unreachable!("patch into borrowed block"),
        }
    }

    fn fresh_storage(&mut self, capacity: usize) -> usize {
        self.storages.push(vec![0u8; capacity].into_boxed_slice());
        self.storages.len() - 1
    }

    /// New owned block, not yet linked into the chain.
    pub(crate) fn detached_block(&mut self, capacity: usize) -> usize {
        let storage = self.fresh_storage(capacity);
        self.blocks.push(Block { backing: Backing::Owned(storage), start: 0, offset: 0, next: None });
        self.blocks.len() - 1
    }

    /// Appends a fresh owned block after the tail and makes it the tail.
    pub(crate) fn grow(&mut self) -> usize {
        self.grow_with_capacity(self.next_buffer_size)
    }

    pub(crate) fn grow_with_capacity(&mut self, capacity: usize) -> usize {
        let index = self.detached_block(capacity);
        self.blocks[self.tail].next = Some(index);
        self.tail = index;
        index
    }

    /// New block windowing the same backing as `of`, not yet linked.
    pub(crate) fn view_block(&mut self, of: usize, start: usize, offset: usize) -> usize {
        let backing = match self.blocks[of].backing {
            Backing::Owned(s) => Backing::Owned(s),
            Backing::Borrowed(slice) => Backing::Borrowed(slice),
        };
        self.blocks.push(Block { backing, start, offset, next: None });
        self.blocks.len() - 1
    }

    /// New block borrowing caller bytes wholesale, not yet linked.
    pub(crate) fn borrowed_block(&mut self, bytes: &'a [u8]) -> usize {
        self.blocks.push(Block {
            backing: Backing::Borrowed(bytes),
            start: 0,
            offset: bytes.len(),
            next: None,
        });
        self.blocks.len() - 1
    }

    pub(crate) fn link(&mut self, from: usize, to: usize) {
        self.blocks[from].next = Some(to);
    }

    #[cfg(test)]
    pub(crate) fn is_borrowed(&self, index: usize) -> Option<&'a [u8]> {
        match self.blocks[index].backing {
            Backing::Borrowed(slice) => Some(slice),
            Backing::Owned(_) => None,
        }
    }
}

impl<'a> Default for WriteSession<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_size_floor() {
        let session = WriteSession::with_buffer_size(16);
        assert_eq!(MIN_BUFFER_SIZE, session.capacity(0));
        let session = WriteSession::with_buffer_size(4096);
        assert_eq!(4096, session.capacity(0));
    }

    #[test]
    fn grow_links_chain() {
        let mut session = WriteSession::with_buffer_size(256);
        {
            let (buf, offset) = session.block_buf_mut(0);
            buf[0] = 1;
            *offset = 1;
        }
        session.size = 1;
        let second = session.grow();
        assert_eq!(second, session.tail());
        assert_eq!(Some(second), session.block(0).next);
        {
            let (buf, offset) = session.block_buf_mut(second);
            buf[0] = 2;
            *offset = 1;
        }
        session.size = 2;
        assert_eq!(vec![1, 2], session.to_bytes());
    }

    #[test]
    fn borrowed_block_splices_without_copy() {
        let donor = [7u8; 16];
        let mut session = WriteSession::with_buffer_size(256);
        let spliced = session.borrowed_block(&donor);
        session.link(0, spliced);
        session.set_tail(spliced);
        session.size = 16;
        let bytes = session.to_bytes();
        assert_eq!(&donor[..], &bytes[..]);
        assert_eq!(donor.as_ptr(), session.is_borrowed(spliced).unwrap().as_ptr());
    }

    #[test]
    fn clear_rewinds_for_reuse() {
        let mut session = WriteSession::with_buffer_size(256);
        {
            let (buf, offset) = session.block_buf_mut(0);
            buf[0] = 9;
            *offset = 1;
        }
        session.size = 1;
        session.grow();
        session.clear();
        assert_eq!(0, session.size());
        assert_eq!(0, session.tail());
        assert!(session.to_bytes().is_empty());
    }
}
