//! Binary persistence and network transfer for [`Area`].
//!
//! One writer produces both forms. The networking form is prefixed with the
//! area coordinates and never carries entities; the save form carries the
//! entity blobs handed in by the caller and trims unused top sections.
//!
//! ## Binary Layout
//!
//! All integers are big-endian.
//!
//! | Size | Field |
//! |------|-------|
//! | 4 + 4 | Area x, area z (`i32`, networking form only) |
//! | 4 | Height in sections (`i32`), negated when features are not generated; 0 = blank, nothing follows |
//! | 1024×4 | Heightmap (`i32` per column, `x + z*32`) |
//! | var | Block cells, signed RLE (see [`crate::rle`]) |
//! | 32768×H | Light bytes, raw |
//! | 2 | Entity count (`u16`) |
//! | 2 | Block data count (`u16`) |
//! | var | Entity blobs: `i32` length + bytes |
//! | var | Block data: `i32` cell index, `i32` length + bytes |

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::area::{Area, AreaError, AreaSettings, MAX_HEIGHT, block_index, index_to_local};
use crate::block_data::BlockDataEntry;
use crate::cell::{BlockCell, LightCell};
use crate::coords::{AreaCoord, SIZE_BLOCKS, SIZE_BLOCKS_CUBED};
use crate::registry::BlockRegistry;
use crate::rle::{read_rle, write_rle};

/// Errors that can occur while writing or reading an area.
#[derive(Debug, thiserror::Error)]
pub enum AreaSerError {
    /// The underlying stream failed or ended early.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The height header is larger than any area can be.
    #[error("invalid area height: {0}")]
    InvalidHeight(i32),
    /// A count does not fit the 16-bit header field.
    #[error("too many {what} to serialize: {count}")]
    TooManyEntries {
        /// Which list overflowed.
        what: &'static str,
        /// Its length.
        count: usize,
    },
    /// A blob length prefix was negative.
    #[error("negative blob length: {0}")]
    NegativeLength(i32),
    /// The target area cannot accept data.
    #[error(transparent)]
    Area(#[from] AreaError),
}

fn write_i32<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

fn write_u16<W: Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

fn write_blob<W: Write>(writer: &mut W, blob: &[u8]) -> Result<(), AreaSerError> {
    let len = i32::try_from(blob.len()).map_err(|_| AreaSerError::TooManyEntries {
        what: "blob bytes",
        count: blob.len(),
    })?;
    write_i32(writer, len)?;
    writer.write_all(blob)?;
    Ok(())
}

fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_blob<R: Read>(reader: &mut R) -> Result<Vec<u8>, AreaSerError> {
    let len = read_i32(reader)?;
    if len < 0 {
        return Err(AreaSerError::NegativeLength(len));
    }
    let mut blob = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut blob)?;
    if blob.len() != len as usize {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(blob)
}

fn count_u16(what: &'static str, count: usize) -> Result<u16, AreaSerError> {
    u16::try_from(count).map_err(|_| AreaSerError::TooManyEntries { what, count })
}

impl Area {
    /// Writes the networking form: coordinates, contents and extended data,
    /// no entities.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or if more than 65535 cells carry extended data.
    pub fn write_networking<W: Write>(&self, writer: &mut W) -> Result<(), AreaSerError> {
        self.write_to(writer, true, None).map(|_| ())
    }

    /// Writes the save form with the given entity blobs.
    ///
    /// Unused top sections are left out. If that makes the written area
    /// shorter than the loaded one and the area settings allow it, the area
    /// is shrunk on a background thread afterwards.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or if either list exceeds 65535 entries.
    pub fn write_save<W: Write>(self: &Arc<Self>, writer: &mut W, entities: &[Vec<u8>]) -> Result<(), AreaSerError> {
        let trimmed = self.write_to(writer, false, Some(entities))?;
        if trimmed && self.settings().shrink_after_save {
            let area = Arc::clone(self);
            std::thread::spawn(move || {
                if let Err(err) = area.shrink() {
                    tracing::debug!(area = %area.coord(), "skipped shrink after save: {err}");
                }
            });
        }
        Ok(())
    }

    /// Returns `true` if fewer sections were written than are allocated.
    fn write_to<W: Write>(
        &self,
        writer: &mut W,
        networking: bool,
        entities: Option<&[Vec<u8>]>,
    ) -> Result<bool, AreaSerError> {
        let storage = self.acquire_read_lock();
        if networking {
            write_i32(writer, self.area_x())?;
            write_i32(writer, self.area_z())?;
        }
        let Some(blocks) = storage.blocks.as_ref().filter(|_| storage.is_ready()) else {
            write_i32(writer, 0)?;
            return Ok(false);
        };

        let height = if networking {
            storage.height
        } else {
            storage.used_height().max(1)
        };
        let cells = SIZE_BLOCKS_CUBED * height;
        let max_y = height as i32 * SIZE_BLOCKS - 1;
        let block_data: Vec<_> = storage
            .block_data
            .iter()
            .filter(|entry| entry.y <= max_y)
            .collect();
        let entities = entities.unwrap_or(&[]);
        let entity_count = count_u16("entities", entities.len())?;
        let data_count = count_u16("block data entries", block_data.len())?;

        let signed_height = height as i32;
        write_i32(
            writer,
            if self.features_generated() {
                signed_height
            } else {
                -signed_height
            },
        )?;
        for &top in &storage.heightmap {
            write_i32(writer, top)?;
        }

        let raw: Vec<u32> = blocks[..cells].iter().map(|cell| cell.raw()).collect();
        write_rle(writer, &raw)?;
        let light: Vec<u8> = storage.light[..cells].iter().map(|cell| cell.0).collect();
        writer.write_all(&light)?;

        write_u16(writer, entity_count)?;
        write_u16(writer, data_count)?;
        for entity in entities {
            write_blob(writer, entity)?;
        }
        for entry in block_data {
            write_i32(writer, block_index(entry.x, entry.y, entry.z) as i32)?;
            write_blob(writer, &entry.data.write())?;
        }

        Ok(height < storage.height)
    }

    /// Replaces the contents of this area with a stream produced by
    /// [`write_save`](Self::write_save) or the body of
    /// [`write_networking`](Self::write_networking), returning the entity
    /// blobs for the caller to spawn.
    ///
    /// Cells naming unknown types or carrying stray bits are replaced by
    /// air, after which visibility and the heightmap are recomputed. A
    /// heightmap entry outside `-1..=max_y` also triggers a rebuild.
    /// Extended data for cells whose type does not own any is skipped.
    ///
    /// # Errors
    ///
    /// Fails if the area is unloaded, the stream is truncated, or a header
    /// value is impossible. The area may be partially filled afterwards.
    pub fn read<R: Read>(&self, reader: &mut R) -> Result<Vec<Vec<u8>>, AreaSerError> {
        let registry = Arc::clone(self.registry());
        let mut storage = self.acquire_write_lock();
        if storage.unloaded {
            return Err(AreaError::Unloaded { area: self.coord() }.into());
        }

        let header = read_i32(reader)?;
        if header == 0 {
            storage.clear_arrays();
            let mod_count = storage.mod_count;
            storage.save_mod_count = Some(mod_count);
            storage.saved_entities = 0;
            return Ok(Vec::new());
        }
        let height = header.unsigned_abs() as usize;
        if height > MAX_HEIGHT {
            return Err(AreaSerError::InvalidHeight(header));
        }
        if header > 0 {
            self.set_features_generated();
        }

        storage.allocate(height);
        storage.block_data.clear();
        for top in storage.heightmap.iter_mut() {
            *top = read_i32(reader)?;
        }

        let cells = SIZE_BLOCKS_CUBED * height;
        let mut invalid = 0usize;
        let decoded = read_rle(reader, cells, |raw| {
            if registry.is_valid_cell(raw) {
                raw
            } else {
                invalid += 1;
                BlockCell::AIR.raw()
            }
        })?;
        if decoded.overflowed {
            tracing::warn!(area = %self.coord(), "block run overflows the area, truncated");
        }
        storage.blocks = Some(decoded.cells.into_iter().map(BlockCell::from_raw).collect());

        let mut light = vec![0u8; cells];
        reader.read_exact(&mut light)?;
        storage.light = light.into_iter().map(LightCell).collect();

        let entity_count = read_u16(reader)? as usize;
        let data_count = read_u16(reader)? as usize;
        let entities = (0..entity_count)
            .map(|_| read_blob(reader))
            .collect::<Result<Vec<_>, _>>()?;

        for _ in 0..data_count {
            let index = read_i32(reader)?;
            let payload = read_blob(reader)?;
            if index < 0 || index as usize >= cells {
                tracing::warn!(area = %self.coord(), index, "block data outside the area, skipped");
                continue;
            }
            let (x, y, z) = index_to_local(index as usize);
            let cell = storage.block(x, y, z);
            let Some(behaviour) = registry.behaviour(cell.block_id()).filter(|b| b.has_block_data()) else {
                continue;
            };
            let Some(mut data) = behaviour.create_block_data(x, y, z, cell.meta()) else {
                continue;
            };
            if let Err(err) = data.read(&payload) {
                tracing::warn!(area = %self.coord(), x, y, z, "dropping block data: {err}");
                continue;
            }
            storage.take_block_data(x, y, z);
            storage.block_data.push(BlockDataEntry { x, y, z, data });
        }

        let max_y = storage.max_y();
        let bad_columns = storage.heightmap.iter().filter(|&&top| !(-1..=max_y).contains(&top)).count();
        if invalid > 0 || decoded.overflowed {
            tracing::warn!(area = %self.coord(), invalid, "invalid blocks replaced with air");
            storage.update_all(&registry);
            storage.rebuild_heightmap();
        } else if bad_columns > 0 {
            tracing::warn!(area = %self.coord(), bad_columns, "heightmap out of range, rebuilt");
            storage.rebuild_heightmap();
        }

        storage.saved_entities = entity_count;
        let mod_count = storage.mod_count;
        storage.save_mod_count = Some(mod_count);
        tracing::debug!(area = %self.coord(), height, entities = entity_count, "area read");
        Ok(entities)
    }

    /// Reads the networking form into a new, unattached area.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn read_area<R: Read>(
        reader: &mut R,
        registry: Arc<BlockRegistry>,
        settings: AreaSettings,
    ) -> Result<Area, AreaSerError> {
        let x = read_i32(reader)?;
        let z = read_i32(reader)?;
        let area = Area::with_settings(AreaCoord::new(x, z), registry, settings);
        area.read(reader)?;
        Ok(area)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
