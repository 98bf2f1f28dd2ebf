//! Plot file creation: forward propagation, backpropagation, compression,
//! and checkpoint emission, wired together and written to disk.

pub mod entry;
pub mod line_point;
pub mod park;

mod phase1;
mod phase2;
mod phase3;
pub(crate) mod phase4;

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::constants::{check_k, CP1, CP2, EPP, TABLES};
use crate::error::Result;
use crate::format::PlotHeader;

/// Parameters needed to create a new plot file.
#[derive(Clone, Debug)]
pub struct PlotterConfig {
    pub k: u8,
    pub seed: [u8; 32],
    pub memo: Vec<u8>,
}

/// Drives the four plotting phases and serializes the result to disk.
pub struct Plotter {
    config: PlotterConfig,
}

impl Plotter {
    pub fn new(config: PlotterConfig) -> Result<Self> {
        check_k(config.k)?;
        Ok(Self { config })
    }

    /// Run the full plotting pipeline and write the resulting plot file
    /// to `path`.
    pub fn create_plot_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let k = self.config.k;
        let seed = self.config.seed;

        let tables = phase1::run(k, &seed)?;
        let tables = phase2::run(tables);
        let t6_len = tables[(TABLES - 2) as usize].len();
        let (compressed, t7) = phase3::run(k, tables)?;
        let final_table = phase4::run(k, t6_len, t7)?;

        let file = File::create(path)?;
        let mut w = BufWriter::new(file);

        let mut header = PlotHeader::new(self.config.seed, k, self.config.memo.clone())?;
        header.write(&mut w)?;

        for (i, table) in compressed.iter().enumerate() {
            let offset = w.stream_position()?;
            header.patch_pointer(&mut w, i, offset)?;
            w.write_all(&(table.count as u32).to_le_bytes())?;
            for park in &table.parks {
                w.write_all(park)?;
            }
        }

        let p7_offset = w.stream_position()?;
        header.patch_pointer(&mut w, 6, p7_offset)?;
        w.write_all(&final_table.p7)?;

        let c1_offset = w.stream_position()?;
        header.patch_pointer(&mut w, 7, c1_offset)?;
        w.write_all(&final_table.c1)?;

        let c2_offset = w.stream_position()?;
        header.patch_pointer(&mut w, 8, c2_offset)?;
        w.write_all(&final_table.c2)?;

        let c3_offset = w.stream_position()?;
        header.patch_pointer(&mut w, 9, c3_offset)?;
        w.write_all(&final_table.c3)?;

        w.seek(SeekFrom::End(0))?;
        w.flush()?;
        Ok(())
    }
}

/// Number of entries covered by one C1 checkpoint window, re-exported for
/// callers (the prover) that need to size their own reads.
pub const fn c1_stride() -> u64 {
    CP1
}

/// Number of `C1` checkpoints covered by one `C2` checkpoint.
pub const fn c2_stride() -> u64 {
    CP2
}

/// Entries packed per park, re-exported for the prover.
pub const fn entries_per_park() -> u64 {
    EPP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_file_round_trips_header_and_pointers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.plot");

        let config = PlotterConfig {
            k: 15,
            seed: [42u8; 32],
            memo: b"test-memo".to_vec(),
        };
        let plotter = Plotter::new(config).unwrap();
        plotter.create_plot_file(&path).unwrap();

        let mut f = File::open(&path).unwrap();
        let header = PlotHeader::read(&mut f).unwrap();
        assert_eq!(header.k, 15);
        assert_eq!(header.memo, b"test-memo");
        assert!(header.table_pointers[9] > 0);
        // Pointers must be strictly increasing: each region is written
        // contiguously and in order.
        for w in header.table_pointers.windows(2) {
            assert!(w[1] > w[0], "pointers out of order: {:?}", header.table_pointers);
        }
    }
}
