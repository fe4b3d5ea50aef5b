// src/MPMC/packet.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Buffer::PacketBuffer;
use crate::Core::error::ChannelError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketMode {
    Read,
    Write,
}

impl PacketMode {
    fn name(self) -> &'static str {
        match self {
            PacketMode::Read => "read",
            PacketMode::Write => "write",
        }
    }
}

#[derive(Debug)]
struct OpenPacket {
    position: u64,
    mode: PacketMode,
    cursor: usize,
    /// Read side: total size, known once the writer has closed the packet.
    /// Write side: size committed through `set_size`.
    size: Option<usize>,
}

/// A per-worker packet context on one channel.
///
/// A `Packet` opens one packet at a time, for reading or for writing, and
/// transfers bytes through a cursor. [`map_read`](Packet::map_read) and
/// [`map_write`](Packet::map_write) hand out slices that point straight into
/// channel storage; they borrow the `Packet` mutably, so they cannot outlive
/// [`close`](Packet::close).
///
/// Dropping the context closes any packet still open.
pub struct Packet {
    buffer: Arc<PacketBuffer>,
    open: Option<OpenPacket>,
}

impl Packet {
    pub(crate) fn new(buffer: Arc<PacketBuffer>) -> Self {
        Self { buffer, open: None }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn mode(&self) -> Option<PacketMode> {
        self.open.as_ref().map(|open| open.mode)
    }

    /// Largest packet, header included, the channel accepts.
    pub fn max_packet_size(&self) -> usize {
        self.buffer.max_packet_size
    }

    /// Open the next packet for reading, blocking while the channel is empty.
    pub fn open_read(&mut self) -> Result<(), ChannelError> {
        self.open_read_until(None).map(|_| ())
    }

    /// Like [`open_read`](Packet::open_read) but gives up after `timeout`.
    /// Returns `Ok(false)` on timeout.
    pub fn open_read_timeout(&mut self, timeout: Duration) -> Result<bool, ChannelError> {
        self.open_read_until(Some(Instant::now() + timeout))
    }

    fn open_read_until(&mut self, deadline: Option<Instant>) -> Result<bool, ChannelError> {
        if self.open.is_some() {
            return Err(ChannelError::AlreadyOpen);
        }
        match self.buffer.claim_read(deadline)? {
            Some(position) => {
                self.open = Some(OpenPacket {
                    position,
                    mode: PacketMode::Read,
                    cursor: 0,
                    size: None,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Open the next packet for writing, blocking while the channel is full.
    pub fn open_write(&mut self) -> Result<(), ChannelError> {
        if self.open.is_some() {
            return Err(ChannelError::AlreadyOpen);
        }
        let position = self.buffer.claim_write()?;
        // Safety: claim_write just handed this slot to us.
        unsafe { self.buffer.slot_data(position) }.clear();
        self.open = Some(OpenPacket {
            position,
            mode: PacketMode::Write,
            cursor: 0,
            size: None,
        });
        Ok(())
    }

    /// Total packet size in bytes, header included.
    ///
    /// On a read packet this blocks until the writer has committed the size.
    /// On a write packet it is the committed size, or the bytes written so far.
    pub fn size(&mut self) -> Result<usize, ChannelError> {
        let open = self.open.as_mut().ok_or(ChannelError::NotOpen)?;
        match open.mode {
            PacketMode::Read => match open.size {
                Some(size) => Ok(size),
                None => self.buffer.committed_size(open.position),
            },
            PacketMode::Write => match open.size {
                Some(size) => Ok(size),
                // Safety: write side owns the slot while open.
                None => Ok(unsafe { self.buffer.slot_data(open.position) }.len()),
            },
        }
    }

    /// Commit the final size of a packet opened for writing. Readers blocked
    /// in [`size`](Packet::size) are released; reading the bytes still waits
    /// until the writer closes the packet.
    pub fn set_size(&mut self, total: usize) -> Result<(), ChannelError> {
        let open = self.open.as_mut().ok_or(ChannelError::NotOpen)?;
        if open.mode != PacketMode::Write {
            return Err(ChannelError::WrongMode(open.mode.name()));
        }
        if open.size.is_some() {
            return Err(ChannelError::SizeAlreadyCommitted);
        }
        self.buffer.commit_size(open.position, total)?;
        open.size = Some(total);
        Ok(())
    }

    /// Copy the next `buf.len()` bytes out of a read packet.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), ChannelError> {
        let src = self.map_read(buf.len())?;
        buf.copy_from_slice(src);
        Ok(())
    }

    /// Copy `buf` into a write packet at the cursor.
    pub fn write(&mut self, buf: &[u8]) -> Result<(), ChannelError> {
        let dst = self.map_write(buf.len())?;
        dst.copy_from_slice(buf);
        Ok(())
    }

    /// Borrow the next `len` bytes of a read packet in place and advance the
    /// cursor past them. Blocks until the writer has closed the packet.
    pub fn map_read(&mut self, len: usize) -> Result<&[u8], ChannelError> {
        let open = self.open.as_mut().ok_or(ChannelError::NotOpen)?;
        if open.mode != PacketMode::Read {
            return Err(ChannelError::WrongMode(open.mode.name()));
        }

        let size = match open.size {
            Some(size) => size,
            None => {
                let size = self.buffer.await_written(open.position)?;
                open.size = Some(size);
                size
            }
        };

        let start = open.cursor;
        let end = start + len;
        if end > size {
            return Err(ChannelError::OutOfBounds {
                offset: start,
                len,
                size,
            });
        }
        open.cursor = end;

        // Safety: await_written moved the slot to the reader.
        let data = unsafe { self.buffer.slot_data(open.position) };
        Ok(&data[start..end])
    }

    /// Borrow the next `len` bytes of a write packet in place and advance the
    /// cursor past them. The bytes start zeroed.
    pub fn map_write(&mut self, len: usize) -> Result<&mut [u8], ChannelError> {
        let open = self.open.as_mut().ok_or(ChannelError::NotOpen)?;
        if open.mode != PacketMode::Write {
            return Err(ChannelError::WrongMode(open.mode.name()));
        }

        let start = open.cursor;
        let end = start + len;
        let limit = open.size.unwrap_or(self.buffer.max_packet_size);
        if end > limit {
            return Err(match open.size {
                Some(size) => ChannelError::OutOfBounds {
                    offset: start,
                    len,
                    size,
                },
                None => ChannelError::PacketTooLarge {
                    requested: end,
                    max: limit,
                },
            });
        }
        open.cursor = end;

        // Safety: claim_write handed the slot to this writer.
        let data = unsafe { self.buffer.slot_data(open.position) };
        if data.len() < end {
            data.resize(end, 0);
        }
        Ok(&mut data[start..end])
    }

    /// Release the open packet. A write packet without a committed size is
    /// committed with the bytes written so far. Closing a context with no
    /// open packet is a no-op.
    pub fn close(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        match open.mode {
            PacketMode::Read => self.buffer.finish_read(open.position),
            PacketMode::Write => {
                // Safety: still the owning writer until finish_write returns.
                let written = unsafe { self.buffer.slot_data(open.position) }.len();
                self.buffer.finish_write(open.position, written);
            }
        }
    }

    /// Release the context, closing any open packet.
    pub fn destroy(mut self) {
        self.close();
    }
}

impl Drop for Packet {
    fn drop(&mut self) {
        self.close();
    }
}
